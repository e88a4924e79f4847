pub mod types;
pub mod config;
pub mod data;
pub mod geocode;
pub mod filter;
pub mod aggregate;
pub mod correlation;
pub mod dashboard;
pub mod spatial;
pub mod render;
pub mod server;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the dashboard for one selection and write it to the output directory
    Generate {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        /// Category to include (repeatable; default: all)
        #[arg(long = "category")]
        categories: Vec<String>,
        /// Region to include (repeatable; default: all)
        #[arg(long = "region")]
        regions: Vec<String>,
        /// State to include, or the all-states label (repeatable; default: all)
        #[arg(long = "state")]
        states: Vec<String>,
        /// Leave the state multiselect empty
        #[arg(long, conflicts_with = "states")]
        no_states: bool,
    },
    /// Serve the dashboard API and static page
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { config, categories, regions, states, no_states } => {
            info!("Generating dashboard with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(&config)?;

            // 1. Load data
            let dataset = data::load_data(&app_config).await?;
            let postal_codes = geocode::PostalCodeTable::load_from_file(
                &app_config.geocode.postal_file,
                app_config.geocode.pad_width,
            )?;

            // 2. Build the selection; omitted flags keep the sidebar defaults
            let defaults = filter::FilterSelection::everything(&dataset.records);
            let label = &app_config.filter.all_states_label;
            let selection = filter::FilterSelection {
                categories: if categories.is_empty() { defaults.categories } else { categories.into_iter().collect() },
                regions: if regions.is_empty() { defaults.regions } else { regions.into_iter().collect() },
                states: if no_states {
                    Vec::new()
                } else if states.is_empty() {
                    defaults.states
                } else {
                    states.iter().map(|s| filter::StateSelector::parse(s, label)).collect()
                },
            };

            // 3. Recompute and write
            let dashboard = dashboard::render(
                &dataset,
                &selection,
                &postal_codes,
                app_config.filter.empty_states,
            );
            for warning in &dashboard.warnings {
                warn!("{}", warning);
            }
            if !dashboard.has_data() {
                warn!("No records match the current selection");
            }
            info!(
                "{} records matched, {} map points, {} states",
                dashboard.scatter.len(),
                dashboard.map.len(),
                dashboard.state_totals.len()
            );
            info!("{}", dashboard.summary);

            render::write_snapshot(&app_config, &dashboard)?;
        }
        Commands::Serve { config } => {
            info!("Serving dashboard with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(&config)?;

            let dataset = data::load_data(&app_config).await?;
            let postal_codes = geocode::PostalCodeTable::load_from_file(
                &app_config.geocode.postal_file,
                app_config.geocode.pad_width,
            )?;

            server::start_server(app_config, dataset, postal_codes).await?;
        }
    }

    Ok(())
}
