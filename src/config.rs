use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{Context, Result};

use crate::filter::EmptyStatesPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    pub geocode: GeocodeConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub presentation: PresentationConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    /// Local path or http(s) URL of the sales CSV.
    pub data_source: String,
    #[serde(default)]
    pub columns: ColumnConfig,
}

/// CSV header names. Defaults match the Portuguese Superstore sample.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ColumnConfig {
    pub category: String,
    pub region: String,
    pub state: String,
    pub city: String,
    pub postal_code: String,
    pub sales: String,
    pub profit: String,
    pub discount: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            category: "Categoria".to_string(),
            region: "Região".to_string(),
            state: "Estado".to_string(),
            city: "Cidade".to_string(),
            postal_code: "Código Postal".to_string(),
            sales: "Vendas".to_string(),
            profit: "Lucro".to_string(),
            discount: "Desconto".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeocodeConfig {
    /// GeoNames postal code dump (tab separated).
    pub postal_file: PathBuf,
    /// Zero-pad numeric codes to this width (5 for US ZIP codes).
    pub pad_width: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FilterConfig {
    pub empty_states: EmptyStatesPolicy,
    pub all_states_label: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            empty_states: EmptyStatesPolicy::AllEligible,
            all_states_label: "All".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PresentationConfig {
    /// (stop, hex colour) pairs for the map's continuous scale.
    pub map_color_scale: Vec<(f64, String)>,
    pub bar_color: String,
    pub category_colors: BTreeMap<String, String>,
    pub map_size_max: u32,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            map_color_scale: vec![
                (0.0, "#FFCCCC".to_string()),
                (0.3, "#FF9999".to_string()),
                (0.5, "#FF3333".to_string()),
                (0.8, "#CC0000".to_string()),
                (1.0, "#8B0000".to_string()),
            ],
            bar_color: "#FF0000".to_string(),
            category_colors: BTreeMap::from([
                ("Mobílias".to_string(), "#000000".to_string()),
                ("Itens de Escritório".to_string(), "#FF9896".to_string()),
                ("Técnologia".to_string(), "#8B0000".to_string()),
            ]),
            map_size_max: 40,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { dir: PathBuf::from("output") }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            static_dir: PathBuf::from("static"),
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
[input]
data_source = "data/superstore.csv"

[geocode]
postal_file = "data/US.txt"
pad_width = 5
"#;

    #[test]
    fn minimal_config_fills_defaults() {
        let config = AppConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.input.data_source, "data/superstore.csv");
        assert_eq!(config.input.columns.postal_code, "Código Postal");
        assert_eq!(config.geocode.pad_width, Some(5));
        assert_eq!(config.filter.empty_states, EmptyStatesPolicy::AllEligible);
        assert_eq!(config.filter.all_states_label, "All");
        assert_eq!(config.presentation.map_color_scale.len(), 5);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.output.dir, PathBuf::from("output"));
    }

    #[test]
    fn overrides_columns_and_policy() {
        let content = r#"
[input]
data_source = "https://example.com/superstore.csv"

[input.columns]
category = "Category"
sales = "Sales"

[geocode]
postal_file = "data/US.txt"

[filter]
empty_states = "empty"
all_states_label = "Select all"
"#;
        let config = AppConfig::from_toml(content).unwrap();
        assert_eq!(config.input.columns.category, "Category");
        assert_eq!(config.input.columns.sales, "Sales");
        assert_eq!(config.input.columns.region, "Região");
        assert_eq!(config.geocode.pad_width, None);
        assert_eq!(config.filter.empty_states, EmptyStatesPolicy::Empty);
        assert_eq!(config.filter.all_states_label, "Select all");
    }

    #[test]
    fn load_from_file_reports_missing_file() {
        let err = AppConfig::load_from_file(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn load_from_file_parses() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let config = AppConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.geocode.postal_file, PathBuf::from("data/US.txt"));
    }

    #[test]
    fn rejects_missing_input_section() {
        assert!(AppConfig::from_toml("[geocode]\npostal_file = \"x\"\n").is_err());
    }
}
