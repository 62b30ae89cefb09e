use crate::config::{AppConfig, BoundaryConfig, MeasurementConfig};
use crate::error::DataLoadError;
use crate::processing::{boundary_join_key, title_case};
use crate::sheets::{self, SheetSource};
use crate::types::{BoundaryRecord, MeasurementRecord};
use geo::MultiPolygon;
use shapefile::dbase::FieldValue;
use shapefile::Reader;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use tracing::{info, warn};

/// Both static inputs, loaded once at startup and shared read-only afterwards.
#[derive(Debug)]
pub struct Dataset {
    pub config: AppConfig,
    pub boundaries: Vec<BoundaryRecord>,
    pub measurements: Vec<MeasurementRecord>,
}

impl Dataset {
    pub fn load(config: AppConfig) -> Result<Self, DataLoadError> {
        let boundaries = load_boundaries(&config.input.geometry, &config.boundaries)?;
        info!("Loaded {} boundary regions", boundaries.len());

        let mut source = sheets::open_source(&config.input.measurements)?;
        let measurements = load_measurements(source.as_mut(), &config.measurements)?;
        info!(
            "Loaded {} measurement rows across {} years",
            measurements.len(),
            config.measurements.years.len()
        );

        Ok(Self::new(config, boundaries, measurements))
    }

    pub fn new(
        config: AppConfig,
        boundaries: Vec<BoundaryRecord>,
        measurements: Vec<MeasurementRecord>,
    ) -> Self {
        Self { config, boundaries, measurements }
    }
}

pub fn load_boundaries(path: &Path, config: &BoundaryConfig) -> Result<Vec<BoundaryRecord>, DataLoadError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s: &str| s.to_lowercase())
        .ok_or_else(|| DataLoadError::UnsupportedFormat(path.to_path_buf()))?;

    let boundaries = match extension.as_str() {
        "shp" => load_shapefile(path, config)?,
        "json" | "geojson" => load_geojson(path, config)?,
        _ => return Err(DataLoadError::UnsupportedFormat(path.to_path_buf())),
    };

    if boundaries.is_empty() {
        warn!("No features with {} = {} in {:?}", config.code_field, config.target_code, path);
    }

    let mut seen = HashSet::new();
    for boundary in &boundaries {
        if !seen.insert(boundary.join_key.as_str()) {
            warn!("Duplicate region name after normalization: {}", boundary.name);
        }
    }

    Ok(boundaries)
}

fn boundary_record(id: String, raw_name: String, geometry: MultiPolygon<f64>) -> BoundaryRecord {
    BoundaryRecord {
        id,
        name: title_case(raw_name.trim()),
        join_key: boundary_join_key(&raw_name),
        raw_name,
        geometry,
    }
}

fn load_geojson(path: &Path, config: &BoundaryConfig) -> Result<Vec<BoundaryRecord>, DataLoadError> {
    use geojson::GeoJson;
    use std::io::BufReader;

    info!("Loading GeoJSON from {:?}...", path);
    let file = File::open(path).map_err(|source| DataLoadError::Io { path: path.to_path_buf(), source })?;
    let geojson = GeoJson::from_reader(BufReader::new(file))
        .map_err(|e| DataLoadError::Geometry(e.to_string()))?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(DataLoadError::Geometry("GeoJSON must be a FeatureCollection".to_string())),
    };

    let mut boundaries = Vec::new();

    for (ordinal, feature) in collection.features.into_iter().enumerate() {
        let props = feature.properties.as_ref();
        let property = |field: &str| -> Option<String> {
            match props.and_then(|p| p.get(field)) {
                Some(serde_json::Value::String(s)) => Some(s.clone()),
                Some(serde_json::Value::Number(n)) => Some(n.to_string()),
                _ => None,
            }
        };

        // names stay raw; codes and ids compare trimmed
        let code = property(&config.code_field)
            .map(|c| c.trim().to_string())
            .ok_or_else(|| DataLoadError::MissingField {
                field: config.code_field.clone(),
                feature: ordinal,
            })?;
        if code != config.target_code {
            continue;
        }

        let raw_name = property(&config.name_field).ok_or_else(|| DataLoadError::MissingField {
            field: config.name_field.clone(),
            feature: ordinal,
        })?;
        let id = property(&config.id_field)
            .map(|id| id.trim().to_string())
            .unwrap_or_else(|| ordinal.to_string());

        let geometry = match feature.geometry {
            Some(geom) => {
                let geometry: geo::Geometry<f64> = geom
                    .value
                    .try_into()
                    .map_err(|e| DataLoadError::Geometry(format!("feature {}: {:?}", ordinal, e)))?;
                match geometry {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => {
                        warn!("Skipping {}: geometry is not areal", raw_name);
                        continue;
                    }
                }
            }
            None => {
                warn!("Skipping {}: no geometry", raw_name);
                continue;
            }
        };

        if geometry.0.is_empty() {
            warn!("Skipping {}: empty geometry", raw_name);
            continue;
        }

        boundaries.push(boundary_record(id, raw_name, geometry));
    }

    Ok(boundaries)
}

fn load_shapefile(path: &Path, config: &BoundaryConfig) -> Result<Vec<BoundaryRecord>, DataLoadError> {
    info!("Loading Shapefile from {:?}...", path);
    let mut reader = Reader::from_path(path)
        .map_err(|e| DataLoadError::Geometry(format!("{:?}: {}", path, e)))?;

    let mut boundaries = Vec::new();

    for (ordinal, result) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = result.map_err(|e| DataLoadError::Geometry(e.to_string()))?;

        let field = |name: &str| -> Option<String> {
            match record.get(name) {
                Some(FieldValue::Character(Some(s))) => Some(s.clone()),
                Some(FieldValue::Numeric(Some(n))) => Some(n.to_string()),
                _ => None,
            }
        };

        // names stay raw; codes and ids compare trimmed
        let code = field(&config.code_field)
            .map(|c| c.trim().to_string())
            .ok_or_else(|| DataLoadError::MissingField {
                field: config.code_field.clone(),
                feature: ordinal,
            })?;
        if code != config.target_code {
            continue;
        }

        let raw_name = field(&config.name_field).ok_or_else(|| DataLoadError::MissingField {
            field: config.name_field.clone(),
            feature: ordinal,
        })?;
        let id = field(&config.id_field)
            .map(|id| id.trim().to_string())
            .unwrap_or_else(|| ordinal.to_string());

        let geometry: MultiPolygon<f64> = match shape {
            shapefile::Shape::Polygon(polygon) => polygon
                .try_into()
                .map_err(|e| DataLoadError::Geometry(format!("Failed to convert polygon: {:?}", e)))?,
            shapefile::Shape::PolygonM(polygon) => polygon
                .try_into()
                .map_err(|e| DataLoadError::Geometry(format!("Failed to convert polygonM: {:?}", e)))?,
            shapefile::Shape::PolygonZ(polygon) => polygon
                .try_into()
                .map_err(|e| DataLoadError::Geometry(format!("Failed to convert polygonZ: {:?}", e)))?,
            _ => {
                warn!("Skipping {}: geometry is not areal", raw_name);
                continue;
            }
        };

        if geometry.0.is_empty() {
            warn!("Skipping {}: empty geometry", raw_name);
            continue;
        }

        boundaries.push(boundary_record(id, raw_name, geometry));
    }

    Ok(boundaries)
}

/// Reads every configured year's sheet into one long-form table, in configured year order.
pub fn load_measurements(
    source: &mut dyn SheetSource,
    config: &MeasurementConfig,
) -> Result<Vec<MeasurementRecord>, DataLoadError> {
    let mut all = Vec::new();

    for &year in &config.years {
        let sheet = year.to_string();
        let table = source
            .read_sheet(&sheet)?
            .ok_or_else(|| DataLoadError::MissingSheet(sheet.clone()))?;

        let column = |name: &str| {
            table
                .headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| DataLoadError::MissingColumn {
                    sheet: sheet.clone(),
                    column: name.to_string(),
                })
        };
        let entity_idx = column(&config.entity_column)?;
        let value_idx = column(&config.value_column)?;

        let before = all.len();
        for row in &table.rows {
            let Some(entity) = row.get(entity_idx).and_then(|c| c.as_text()) else {
                continue;
            };
            let value = row.get(value_idx).and_then(|c| c.as_number());
            all.push(MeasurementRecord { entity, value, year });
        }
        info!("Sheet {}: {} rows", sheet, all.len() - before);
    }

    Ok(all)
}
