pub mod types;
pub mod config;
pub mod error;
pub mod sheets;
pub mod data;
pub mod processing;
pub mod projection;
pub mod figure;
pub mod render;
pub mod control;
pub mod server;

#[cfg(test)]
mod fixtures;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use control::{ControlSurface, Display};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the interactive map with its year selector
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Render the map for one year (or every configured year) to PNG and JSON
    Render {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[arg(short, long)]
        year: Option<i32>,
        #[arg(short, long, value_name = "DIR", default_value = "output")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve { config } => {
            info!("Serving map with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;

            // Both sources are read once, before anything is displayed.
            let dataset = data::Dataset::load(app_config).context("Failed to load input data")?;

            server::start_server(dataset).await?;
        }
        Commands::Render { config, year, out } => {
            info!("Rendering map with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;
            let dataset = data::Dataset::load(app_config).context("Failed to load input data")?;

            let years = match year {
                Some(year) => vec![*year],
                None => dataset.config.measurements.years.clone(),
            };

            fs::create_dir_all(out).with_context(|| format!("Failed to create output directory: {:?}", out))?;
            let mut surface = ControlSurface::new(&dataset);

            for year in years {
                let figure = match surface.select(year) {
                    Display::Figure(figure) => figure,
                    Display::Error(e) => bail!("Cannot render {}: {}", year, e),
                };

                let png_path = out.join(format!("{}.png", year));
                render::render_png(figure)
                    .save(&png_path)
                    .with_context(|| format!("Failed to save {:?}", png_path))?;

                let json_path = out.join(format!("{}.json", year));
                fs::write(&json_path, serde_json::to_string_pretty(figure)?)
                    .with_context(|| format!("Failed to write {:?}", json_path))?;

                info!("Wrote {:?} and {:?}", png_path, json_path);
            }

            info!("Rendering complete!");
        }
    }

    Ok(())
}
