//! Catalog loading and lookup.
//!
//! The catalog is a spreadsheet export with one item-name column and three
//! price-tier columns. Where it comes from (a local export or a sheet
//! published over HTTP) does not matter to the rest of the tool: every source
//! implements [`CatalogSource`] and hands back an in-memory [`Catalog`].

use regex::RegexBuilder;
use rust_decimal::Decimal;
use std::io::Read;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::error::{InvoiceError, Result};
use crate::model::{CatalogRow, PriceTier};

/// Column layout of the spreadsheet export.
#[derive(Debug, Clone)]
pub struct CatalogLayout {
    pub name_column: String,
    /// Column names in `PriceTier::ALL` order.
    pub tier_columns: [String; 3],
    pub delimiter: u8,
}

impl Default for CatalogLayout {
    fn default() -> Self {
        Self {
            name_column: "Denomination".to_string(),
            tier_columns: [
                "prix-super-gros".to_string(),
                "prix-gros".to_string(),
                "prix-detaille".to_string(),
            ],
            delimiter: b',',
        }
    }
}

pub trait CatalogSource {
    fn load_catalog(&self) -> Result<Catalog>;

    /// Short human description, used in log lines and error messages.
    fn describe(&self) -> String;
}

pub struct CsvFileSource {
    pub path: PathBuf,
    pub layout: CatalogLayout,
}

impl CatalogSource for CsvFileSource {
    fn load_catalog(&self) -> Result<Catalog> {
        let file = std::fs::File::open(&self.path).map_err(|e| {
            InvoiceError::DataUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        Catalog::from_csv(file, &self.layout)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// A sheet exported as CSV behind a URL (e.g. a "publish to web" link).
pub struct HttpCsvSource {
    pub url: String,
    pub layout: CatalogLayout,
}

impl CatalogSource for HttpCsvSource {
    fn load_catalog(&self) -> Result<Catalog> {
        let response = reqwest::blocking::get(&self.url)
            .and_then(|r| r.error_for_status())
            .map_err(|e| InvoiceError::DataUnavailable(format!("{}: {}", self.url, e)))?;
        let body = response
            .bytes()
            .map_err(|e| InvoiceError::DataUnavailable(format!("{}: {}", self.url, e)))?;
        debug!(url = %self.url, bytes = body.len(), "downloaded catalog export");
        Catalog::from_csv(body.as_ref(), &self.layout)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

#[derive(Debug, Clone)]
pub struct Catalog {
    rows: Vec<CatalogRow>,
    tier_columns: [String; 3],
}

impl Catalog {
    pub fn new(rows: Vec<CatalogRow>, tier_columns: [String; 3]) -> Self {
        Self { rows, tier_columns }
    }

    pub fn from_csv<R: Read>(reader: R, layout: &CatalogLayout) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(layout.delimiter)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()
            .map_err(|e| InvoiceError::DataUnavailable(format!("unreadable header row: {}", e)))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let column = |name: &str| headers.iter().position(|h| h == name.trim());

        let name_idx = column(&layout.name_column).ok_or_else(|| {
            InvoiceError::DataUnavailable(format!(
                "no '{}' column (found: {})",
                layout.name_column,
                headers.join(", ")
            ))
        })?;

        let tier_idx: Vec<Option<usize>> = layout.tier_columns.iter().map(|c| column(c)).collect();
        for (tier, idx) in PriceTier::ALL.iter().zip(&tier_idx) {
            if idx.is_none() {
                warn!(tier = %tier, column = %layout.tier_columns[tier.index()], "price column missing from catalog");
            }
        }

        let mut rows = Vec::new();
        for (line, record) in csv_reader.records().enumerate() {
            let record = record
                .map_err(|e| InvoiceError::DataUnavailable(format!("row {}: {}", line + 2, e)))?;

            let name = record.get(name_idx).unwrap_or("").trim();
            if name.is_empty() {
                continue;
            }

            let mut prices = [None; 3];
            for (slot, idx) in prices.iter_mut().zip(&tier_idx) {
                *slot = idx
                    .and_then(|i| record.get(i))
                    .and_then(parse_price);
            }

            rows.push(CatalogRow {
                name: name.to_string(),
                prices,
            });
        }

        info!(rows = rows.len(), "catalog loaded");
        Ok(Self::new(rows, layout.tier_columns.clone()))
    }

    pub fn rows(&self) -> &[CatalogRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows().is_empty()
    }

    pub fn tier_column(&self, tier: PriceTier) -> &str {
        &self.tier_columns[tier.index()]
    }

    /// Literal, case-insensitive substring match on the item name. An empty
    /// term returns every row.
    pub fn search(&self, term: &str) -> Vec<&CatalogRow> {
        if term.is_empty() {
            return self.rows.iter().collect();
        }
        // Escaped, so the term never acts as a pattern.
        let matcher = match RegexBuilder::new(&regex::escape(term))
            .case_insensitive(true)
            .build()
        {
            Ok(re) => re,
            Err(e) => {
                warn!(error = %e, "search term rejected by matcher");
                return Vec::new();
            }
        };
        self.rows.iter().filter(|row| matcher.is_match(&row.name)).collect()
    }

    /// Unit price of `row` under `tier`, or a configuration error naming the
    /// missing column.
    pub fn price(&self, row: &CatalogRow, tier: PriceTier) -> Result<Decimal> {
        row.prices[tier.index()].ok_or_else(|| InvoiceError::ConfigurationMismatch {
            item: row.name.clone(),
            column: self.tier_column(tier).to_string(),
        })
    }
}

/// Accepts `1200`, `1200.50`, `1 200,50`, `1,200.50` and `1,200`.
///
/// Without a dot, commas followed by groups of exactly three digits are
/// thousands separators; any other comma is the decimal comma.
fn parse_price(raw: &str) -> Option<Decimal> {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .collect();
    if compact.is_empty() {
        return None;
    }
    let normalized = if compact.contains('.') || is_comma_grouped(&compact) {
        compact.replace(',', "")
    } else {
        compact.replace(',', ".")
    };
    Decimal::from_str(&normalized).ok()
}

fn is_comma_grouped(s: &str) -> bool {
    let mut groups = s.trim_start_matches('-').split(',');
    let lead = groups.next().unwrap_or("");
    let mut rest = groups.peekable();
    rest.peek().is_some()
        && (1..=3).contains(&lead.len())
        && lead.chars().all(|c| c.is_ascii_digit())
        && rest.all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit()))
}
