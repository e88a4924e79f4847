use crate::config::{AppConfig, ColumnConfig};
use crate::filter::unique_values;
use crate::types::SalesRecord;
use anyhow::{Context, Result, anyhow};
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use tracing::info;

/// The loaded sales table. Never mutated after load.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub records: Vec<SalesRecord>,
}

impl Dataset {
    pub fn new(records: Vec<SalesRecord>) -> Self {
        Self { records }
    }

    pub fn categories(&self) -> Vec<String> {
        unique_values(&self.records, |r| &r.category)
    }

    pub fn regions(&self) -> Vec<String> {
        unique_values(&self.records, |r| &r.region)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub async fn load_data(config: &AppConfig) -> Result<Dataset> {
    let source = &config.input.data_source;
    info!("Loading sales data from {}...", source);

    let content = if source.starts_with("http://") || source.starts_with("https://") {
        fetch_remote(source).await?
    } else {
        fs::read_to_string(source)
            .with_context(|| format!("Failed to read sales CSV: {}", source))?
    };

    let records = parse_records(content.as_bytes(), &config.input.columns)?;
    info!("Loaded {} sales records", records.len());
    Ok(Dataset::new(records))
}

async fn fetch_remote(url: &str) -> Result<String> {
    let response = reqwest::get(url)
        .await
        .with_context(|| format!("Failed to fetch sales CSV: {}", url))?
        .error_for_status()
        .with_context(|| format!("Sales CSV request failed: {}", url))?;
    response
        .text()
        .await
        .with_context(|| format!("Failed to read sales CSV body: {}", url))
}

struct ColumnIndices {
    category: usize,
    region: usize,
    state: usize,
    city: usize,
    postal_code: usize,
    sales: usize,
    profit: usize,
    discount: usize,
}

impl ColumnIndices {
    fn locate(headers: &StringRecord, columns: &ColumnConfig) -> Result<Self> {
        let col_indices: HashMap<&str, usize> = headers.iter().enumerate()
            .map(|(i, h)| (h.trim(), i))
            .collect();
        let find = |name: &str| {
            col_indices.get(name).copied()
                .ok_or_else(|| anyhow!("Column '{}' not found in sales CSV", name))
        };

        Ok(Self {
            category: find(&columns.category)?,
            region: find(&columns.region)?,
            state: find(&columns.state)?,
            city: find(&columns.city)?,
            postal_code: find(&columns.postal_code)?,
            sales: find(&columns.sales)?,
            profit: find(&columns.profit)?,
            discount: find(&columns.discount)?,
        })
    }
}

pub fn parse_records<R: Read>(reader: R, columns: &ColumnConfig) -> Result<Vec<SalesRecord>> {
    let mut rdr = ReaderBuilder::new().from_reader(reader);
    let headers = rdr.headers().context("Failed to read sales CSV headers")?.clone();
    let idx = ColumnIndices::locate(&headers, columns)?;

    let mut records = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        // header is line 1
        let line = line + 2;
        let row = result.with_context(|| format!("Malformed sales CSV row at line {}", line))?;
        let text = |i: usize| row.get(i).unwrap_or("").trim().to_string();
        let number = |i: usize, name: &str| -> Result<f64> {
            let raw = row.get(i).unwrap_or("").trim();
            raw.parse::<f64>()
                .with_context(|| format!("Invalid {} value '{}' at line {}", name, raw, line))
        };

        records.push(SalesRecord {
            category: text(idx.category),
            region: text(idx.region),
            state: text(idx.state),
            city: text(idx.city),
            postal_code: text(idx.postal_code),
            sales: number(idx.sales, &columns.sales)?,
            profit: number(idx.profit, &columns.profit)?,
            discount: number(idx.discount, &columns.discount)?,
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use std::io::Write;

    const CSV: &str = "\
Modo de Envio,Segmento,País,Cidade,Estado,Código Postal,Região,Categoria,Subcategoria,Vendas,Quantidade,Desconto,Lucro
Second Class,Consumer,United States,Henderson,Kentucky,42420,South,Mobílias,Bookcases,261.96,2,0,41.9136
Second Class,Consumer,United States,Los Angeles,California,90036,West,Itens de Escritório,Labels,14.62,2,0,6.8714
Standard Class,Consumer,United States,Fort Lauderdale,Florida,33311,South,Mobílias,Tables,957.5775,5,0.45,-383.031
Standard Class,Consumer,United States,Providence,Rhode Island,2920,East,Técnologia,Phones,100,1,0.2,-10
";

    fn columns() -> ColumnConfig {
        ColumnConfig::default()
    }

    #[test]
    fn parses_superstore_rows() {
        let records = parse_records(CSV.as_bytes(), &columns()).unwrap();
        assert_eq!(records.len(), 4);
        let first = &records[0];
        assert_eq!(first.category, "Mobílias");
        assert_eq!(first.region, "South");
        assert_eq!(first.state, "Kentucky");
        assert_eq!(first.city, "Henderson");
        assert_eq!(first.postal_code, "42420");
        assert_eq!(first.sales, 261.96);
        assert_eq!(first.profit, 41.9136);
        assert_eq!(first.discount, 0.0);
        assert_eq!(records[2].profit, -383.031);
        assert_eq!(records[3].postal_code, "2920");
    }

    #[test]
    fn dataset_options_keep_first_appearance_order() {
        let dataset = Dataset::new(parse_records(CSV.as_bytes(), &columns()).unwrap());
        assert_eq!(dataset.categories(), vec!["Mobílias", "Itens de Escritório", "Técnologia"]);
        assert_eq!(dataset.regions(), vec!["South", "West", "East"]);
    }

    #[test]
    fn missing_column_is_reported() {
        let mut cols = columns();
        cols.discount = "Discount".to_string();
        let err = parse_records(CSV.as_bytes(), &cols).unwrap_err();
        assert!(err.to_string().contains("Discount"));
    }

    #[test]
    fn bad_number_names_line() {
        let csv = CSV.replace("14.62", "n/a");
        let err = parse_records(csv.as_bytes(), &columns()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Vendas"));
        assert!(message.contains("line 3"));
    }

    #[tokio::test]
    async fn load_data_reads_local_file() {
        let mut csv = tempfile::NamedTempFile::new().unwrap();
        csv.write_all(CSV.as_bytes()).unwrap();
        let config = AppConfig::from_toml(&format!(
            "[input]\ndata_source = {:?}\n\n[geocode]\npostal_file = \"US.txt\"\n",
            csv.path().to_string_lossy()
        ))
        .unwrap();
        let dataset = load_data(&config).await.unwrap();
        assert_eq!(dataset.len(), 4);
    }

    #[tokio::test]
    async fn load_data_fails_for_missing_file() {
        let config = AppConfig::from_toml(
            "[input]\ndata_source = \"/nonexistent/superstore.csv\"\n\n[geocode]\npostal_file = \"US.txt\"\n",
        )
        .unwrap();
        assert!(load_data(&config).await.is_err());
    }
}
