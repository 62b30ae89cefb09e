use crate::figure::ColorScale;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub boundaries: BoundaryConfig,
    #[serde(default)]
    pub measurements: MeasurementConfig,
    #[serde(default)]
    pub figure: FigureConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub geometry: PathBuf,     // GeoJSON or Shapefile
    pub measurements: PathBuf, // Workbook or directory of <year>.csv
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BoundaryConfig {
    pub code_field: String,
    pub target_code: String,
    pub name_field: String,
    pub id_field: String,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            code_field: "STATEFP".to_string(),
            target_code: "47".to_string(), // Tennessee
            name_field: "NAME".to_string(),
            id_field: "GEOID".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MeasurementConfig {
    pub years: Vec<i32>,
    pub entity_column: String,
    pub value_column: String,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            years: (2020..=2023).collect(),
            entity_column: "County".to_string(),
            value_column: "Female(%)".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FigureConfig {
    pub page_title: String,
    pub title_prefix: String,
    pub colorbar_title: String,
    pub colorscale: String,
    pub zmin: f64,
    pub zmax: f64,
    pub width: u32,
    pub height: u32,
}

impl Default for FigureConfig {
    fn default() -> Self {
        Self {
            page_title: "Female Nurse - RN (%) by County in Tennessee (2020–2023)".to_string(),
            title_prefix: "Female (%) by County".to_string(),
            colorbar_title: "Female %".to_string(),
            colorscale: "Greens".to_string(),
            zmin: 80.0,
            zmax: 100.0,
            width: 960,
            height: 600,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.measurements.years.is_empty() {
            bail!("measurements.years must list at least one year");
        }
        if !(self.figure.zmin < self.figure.zmax) {
            bail!(
                "figure.zmin ({}) must be below figure.zmax ({})",
                self.figure.zmin,
                self.figure.zmax
            );
        }
        if ColorScale::named(&self.figure.colorscale).is_none() {
            bail!("Unknown color scale: {}", self.figure.colorscale);
        }
        if self.figure.width == 0 || self.figure.height == 0 {
            bail!("figure.width and figure.height must be non-zero");
        }
        Ok(())
    }

    pub fn supports_year(&self, year: i32) -> bool {
        self.measurements.years.contains(&year)
    }
}
