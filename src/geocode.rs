use crate::types::GeoPoint;
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

// GeoNames postal code dump column positions.
const POSTAL_CODE_COL: usize = 1;
const LATITUDE_COL: usize = 9;
const LONGITUDE_COL: usize = 10;

/// Postal code to coordinates. Unknown or malformed codes give `None`.
pub trait GeocodeResolver {
    fn resolve(&self, postal_code: &str) -> Option<GeoPoint>;
}

#[cfg(test)]
impl GeocodeResolver for HashMap<String, GeoPoint> {
    fn resolve(&self, postal_code: &str) -> Option<GeoPoint> {
        self.get(postal_code).copied()
    }
}

/// Offline lookup table built from a GeoNames postal code file.
#[derive(Debug, Clone, Default)]
pub struct PostalCodeTable {
    entries: HashMap<String, GeoPoint>,
    pad_width: Option<usize>,
}

impl PostalCodeTable {
    pub fn load_from_file(path: &Path, pad_width: Option<usize>) -> Result<Self> {
        info!("Loading postal codes from {:?}...", path);
        let file = File::open(path)
            .with_context(|| format!("Failed to open postal code file: {:?}", path))?;
        let table = Self::from_reader(file, pad_width)?;
        info!("Indexed {} postal codes", table.len());
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R, pad_width: Option<usize>) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(reader);

        // Sum then average coordinates of duplicated codes.
        let mut sums: HashMap<String, (f64, f64, u32)> = HashMap::new();
        for result in rdr.records() {
            let record = result.context("Failed to read postal code row")?;
            let Some(code) = record.get(POSTAL_CODE_COL).and_then(|c| normalize(c, pad_width)) else {
                continue;
            };
            let lat = record.get(LATITUDE_COL).and_then(|v| v.trim().parse::<f64>().ok());
            let lon = record.get(LONGITUDE_COL).and_then(|v| v.trim().parse::<f64>().ok());
            let (Some(lat), Some(lon)) = (lat, lon) else { continue };

            let entry = sums.entry(code).or_insert((0.0, 0.0, 0));
            entry.0 += lat;
            entry.1 += lon;
            entry.2 += 1;
        }

        let entries = sums
            .into_iter()
            .map(|(code, (lat, lon, n))| (code, GeoPoint::new(lat / n as f64, lon / n as f64)))
            .collect();

        Ok(Self { entries, pad_width })
    }

    pub fn from_entries<I, S>(entries: I, pad_width: Option<usize>) -> Self
    where
        I: IntoIterator<Item = (S, GeoPoint)>,
        S: AsRef<str>,
    {
        let entries = entries
            .into_iter()
            .filter_map(|(code, point)| normalize(code.as_ref(), pad_width).map(|c| (c, point)))
            .collect();
        Self { entries, pad_width }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl GeocodeResolver for PostalCodeTable {
    fn resolve(&self, postal_code: &str) -> Option<GeoPoint> {
        let code = normalize(postal_code, self.pad_width)?;
        self.entries.get(&code).copied()
    }
}

/// Canonical form of a postal code, or `None` if it cannot be one.
///
/// Numeric codes shorter than `pad_width` get their leading zeros back, which
/// spreadsheet exports tend to drop (`2920` -> `02920`).
pub fn normalize(postal_code: &str, pad_width: Option<usize>) -> Option<String> {
    let code = postal_code.trim().to_ascii_uppercase();
    if code.is_empty()
        || !code.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-')
    {
        return None;
    }
    match pad_width {
        Some(width) if code.len() < width && code.chars().all(|c| c.is_ascii_digit()) => {
            Some(format!("{:0>width$}", code, width = width))
        }
        _ => Some(code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GEONAMES: &str = "US\t10001\tNew York\tNew York\tNY\tNew York\t061\t\t\t40.7484\t-73.9967\t4\n\
US\t02920\tCranston\tRhode Island\tRI\tProvidence\t007\t\t\t41.7663\t-71.4758\t4\n\
US\t99999\tNowhere\tAlaska\tAK\t\t\t\t\t\t\t\n\
US\t55555\tTwin A\tMinnesota\tMN\t\t\t\t\t45.0\t-93.0\t4\n\
US\t55555\tTwin B\tMinnesota\tMN\t\t\t\t\t47.0\t-95.0\t4\n";

    fn table() -> PostalCodeTable {
        PostalCodeTable::from_reader(GEONAMES.as_bytes(), Some(5)).unwrap()
    }

    #[test]
    fn resolves_known_code() {
        let point = table().resolve("10001").unwrap();
        assert_eq!(point, GeoPoint::new(40.7484, -73.9967));
    }

    #[test]
    fn restores_leading_zero() {
        let point = table().resolve("2920").unwrap();
        assert_eq!(point, GeoPoint::new(41.7663, -71.4758));
    }

    #[test]
    fn skips_rows_without_coordinates() {
        let table = table();
        assert_eq!(table.len(), 3);
        assert_eq!(table.resolve("99999"), None);
    }

    #[test]
    fn averages_duplicate_codes() {
        assert_eq!(table().resolve("55555"), Some(GeoPoint::new(46.0, -94.0)));
    }

    #[test]
    fn unknown_and_malformed_codes_resolve_to_none() {
        let table = table();
        assert_eq!(table.resolve("00000"), None);
        assert_eq!(table.resolve(""), None);
        assert_eq!(table.resolve("   "), None);
        assert_eq!(table.resolve("10001.5"), None);
        assert_eq!(table.resolve("abc$%"), None);
    }

    #[test]
    fn normalize_handles_alphanumeric_codes() {
        assert_eq!(normalize(" d02 x285 ", Some(5)), Some("D02 X285".to_string()));
        assert_eq!(normalize("123", None), Some("123".to_string()));
        assert_eq!(normalize("123456", Some(5)), Some("123456".to_string()));
    }

    #[test]
    fn from_entries_normalizes_keys() {
        let table = PostalCodeTable::from_entries([("1234", GeoPoint::new(1.0, 2.0))], Some(5));
        assert_eq!(table.resolve("01234"), Some(GeoPoint::new(1.0, 2.0)));
        assert_eq!(table.resolve("1234"), Some(GeoPoint::new(1.0, 2.0)));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(PostalCodeTable::load_from_file(Path::new("/nonexistent/US.txt"), None).is_err());
    }
}
