//! Market data seams
//!
//! Price lookup and the listed-stock catalog are external collaborators; the
//! trading core only sees these traits. The CSV catalog matches the
//! listed-stocks file the bot ships with (code,name per row); tests use the
//! in-memory implementations.

use crate::errors::{BotError, BotResult};
use std::collections::BTreeMap;
use std::path::Path;

/// Quote provider. `None` means the collaborator has no quote for the code.
pub trait PriceSource: Send + Sync {
    fn get_price(&self, stock_code: &str) -> Option<f64>;
}

/// Listed-stock catalog: code -> display name
pub trait StockCatalog: Send + Sync {
    fn get_catalog(&self) -> BTreeMap<String, String>;

    /// Resolve an identifier that may be a code or a display name
    fn lookup(&self, identifier: &str) -> Option<(String, String)> {
        let catalog = self.get_catalog();
        if let Some(name) = catalog.get(identifier) {
            return Some((identifier.to_string(), name.clone()));
        }
        catalog
            .into_iter()
            .find(|(_, name)| name == identifier)
    }
}

/// Catalog backed by a two-column CSV file (stock_code, stock_name)
pub struct CsvCatalog {
    stocks: BTreeMap<String, String>,
}

impl CsvCatalog {
    pub fn load<P: AsRef<Path>>(path: P) -> BotResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path.as_ref())?;

        let mut stocks = BTreeMap::new();
        for row in reader.records() {
            let record = row?;
            let code = record
                .get(0)
                .ok_or_else(|| BotError::Ledger("catalog row missing stock code".to_string()))?;
            let name = record
                .get(1)
                .ok_or_else(|| BotError::Ledger("catalog row missing stock name".to_string()))?;
            stocks.insert(code.trim().to_string(), name.trim().to_string());
        }
        Ok(Self { stocks })
    }

    pub fn len(&self) -> usize {
        self.stocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stocks.is_empty()
    }
}

impl StockCatalog for CsvCatalog {
    fn get_catalog(&self) -> BTreeMap<String, String> {
        self.stocks.clone()
    }
}

/// Quote table backed by a two-column CSV file (stock_code, price)
///
/// The file is re-read on every lookup so an operator can refresh quotes
/// while the bot runs. Unreadable files or rows simply yield no quote.
pub struct CsvQuotes {
    path: std::path::PathBuf,
}

impl CsvQuotes {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl PriceSource for CsvQuotes {
    fn get_price(&self, stock_code: &str) -> Option<f64> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)
            .ok()?;
        for row in reader.records() {
            let record = row.ok()?;
            if record.get(0).map(str::trim) == Some(stock_code) {
                return record.get(1)?.trim().parse().ok();
            }
        }
        None
    }
}

/// Fixed catalog for tests and offline runs
pub struct StaticCatalog {
    stocks: BTreeMap<String, String>,
}

impl StaticCatalog {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        Self {
            stocks: pairs
                .iter()
                .map(|(code, name)| (code.to_string(), name.to_string()))
                .collect(),
        }
    }
}

impl StockCatalog for StaticCatalog {
    fn get_catalog(&self) -> BTreeMap<String, String> {
        self.stocks.clone()
    }
}

/// Fixed price table for tests and offline runs
pub struct StaticPrices {
    prices: BTreeMap<String, f64>,
}

impl StaticPrices {
    pub fn new(pairs: &[(&str, f64)]) -> Self {
        Self {
            prices: pairs
                .iter()
                .map(|(code, price)| (code.to_string(), *price))
                .collect(),
        }
    }
}

impl PriceSource for StaticPrices {
    fn get_price(&self, stock_code: &str) -> Option<f64> {
        self.prices.get(stock_code).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_csv_catalog_load_and_lookup() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "stock_code,stock_name").unwrap();
        writeln!(file, "2330,TSMC").unwrap();
        writeln!(file, "0050, ETF50").unwrap();
        file.flush().unwrap();

        let catalog = CsvCatalog::load(file.path()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.lookup("2330"),
            Some(("2330".to_string(), "TSMC".to_string()))
        );
        assert_eq!(
            catalog.lookup("ETF50"),
            Some(("0050".to_string(), "ETF50".to_string()))
        );
        assert_eq!(catalog.lookup("nope"), None);
    }

    #[test]
    fn test_csv_quotes_reread_per_lookup() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "stock_code,price").unwrap();
        writeln!(file, "2330,55.5").unwrap();
        file.flush().unwrap();

        let quotes = CsvQuotes::new(file.path());
        assert_eq!(quotes.get_price("2330"), Some(55.5));
        assert_eq!(quotes.get_price("0050"), None);

        writeln!(file, "0050,120.0").unwrap();
        file.flush().unwrap();
        assert_eq!(quotes.get_price("0050"), Some(120.0));
    }

    #[test]
    fn test_static_prices() {
        let prices = StaticPrices::new(&[("2330", 50.0)]);
        assert_eq!(prices.get_price("2330"), Some(50.0));
        assert_eq!(prices.get_price("0050"), None);
    }
}
