//! Small in-memory Tennessee dataset shared by the unit tests.

use crate::config::AppConfig;
use crate::data::Dataset;
use crate::processing::{boundary_join_key, title_case};
use crate::types::{BoundaryRecord, MeasurementRecord};
use geo::{polygon, MultiPolygon};

pub fn test_config() -> AppConfig {
    toml::from_str(
        r#"
[input]
geometry = "tn_counties.json"
measurements = "RN Gender.xlsx"

[server]
port = 0
"#,
    )
    .unwrap()
}

fn county(name: &str, id: &str, lon: f64, lat: f64) -> BoundaryRecord {
    BoundaryRecord {
        id: id.to_string(),
        raw_name: name.to_string(),
        name: title_case(name.trim()),
        join_key: boundary_join_key(name),
        geometry: MultiPolygon::new(vec![polygon![
            (x: lon, y: lat),
            (x: lon + 0.4, y: lat),
            (x: lon + 0.4, y: lat + 0.3),
            (x: lon, y: lat + 0.3),
            (x: lon, y: lat),
        ]]),
    }
}

fn row(entity: &str, value: Option<f64>, year: i32) -> MeasurementRecord {
    MeasurementRecord { entity: entity.to_string(), value, year }
}

/// Davidson, Shelby, Knox and Unicoi; 2023 has no rows and Unicoi never appears.
pub fn tennessee_dataset() -> Dataset {
    let boundaries = vec![
        county("Davidson", "47037", -87.0, 36.0),
        county("Shelby", "47157", -90.0, 35.0),
        county("Knox", "47093", -84.0, 35.9),
        county("Unicoi", "47171", -82.5, 36.1),
    ];
    let measurements = vec![
        row("Davidson County, TN", Some(94.0), 2020),
        row("Shelby County, TN", Some(93.0), 2020),
        row("Knox County, TN", None, 2020),
        row("Davidson County, TN", Some(95.2), 2021),
        row("Shelby County, TN", Some(93.8), 2021),
        row("Knox County", Some(90.0), 2022),
        row("Knox County", Some(94.0), 2022),
        row("Shelby County", Some(92.5), 2022),
    ];
    Dataset::new(test_config(), boundaries, measurements)
}
