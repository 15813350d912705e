use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{InvoiceError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriceTier {
    SuperGros,
    Gros,
    Detail,
}

impl PriceTier {
    pub const ALL: [PriceTier; 3] = [PriceTier::SuperGros, PriceTier::Gros, PriceTier::Detail];

    pub fn index(self) -> usize {
        match self {
            PriceTier::SuperGros => 0,
            PriceTier::Gros => 1,
            PriceTier::Detail => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PriceTier::SuperGros => "Prix super gros",
            PriceTier::Gros => "Prix gros",
            PriceTier::Detail => "Prix détail",
        }
    }
}

impl fmt::Display for PriceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogRow {
    pub name: String,
    /// Indexed by `PriceTier::index`; `None` when the cell or column is missing.
    pub prices: [Option<Decimal>; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl LineItem {
    pub fn new(name: impl Into<String>, quantity: u32, unit_price: Decimal) -> Result<Self> {
        if quantity == 0 {
            return Err(InvoiceError::ValidationFailure(
                "Quantity must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            name: name.into(),
            quantity,
            unit_price,
        })
    }

    pub fn line_total(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_price
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientInfo {
    pub client_name: String,
    pub company_name: String,
    pub address: String,
    pub phone: String,
}

impl ClientInfo {
    /// Labels of the fields that are still blank, in display order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("client name", &self.client_name),
            ("company name", &self.company_name),
            ("address", &self.address),
            ("phone", &self.phone),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(label, _)| label)
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionInfo {
    pub transaction_number: u64,
    pub transaction_date: NaiveDate,
    pub client_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Discount {
    Percentage(Decimal),
    Fixed(Decimal),
}

impl Default for Discount {
    fn default() -> Self {
        Discount::Fixed(Decimal::ZERO)
    }
}

impl Discount {
    pub fn value(&self) -> Decimal {
        match self {
            Discount::Percentage(v) | Discount::Fixed(v) => *v,
        }
    }

    /// Unit shown next to the discount in the totals block.
    pub fn unit_label<'a>(&self, currency: &'a str) -> &'a str {
        match self {
            Discount::Percentage(_) => "%",
            Discount::Fixed(_) => currency,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub subtotal_after_discount: Decimal,
    pub tax_amount: Decimal,
    pub grand_total: Decimal,
}

// issuer.toml
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IssuerConfig {
    pub name: String,
    pub activity: String,
    pub address: String,
    pub phones: Vec<String>,
    pub email: String,
    pub rc: String,
    pub nif: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// PNG or JPEG, relative to the data root.
    pub logo: Option<String>,
    #[serde(default)]
    pub terms: TermsConfig,
}

fn default_currency() -> String {
    "DA".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TermsConfig {
    pub deposit_percent: u32,
    pub lead_time: String,
    pub payment_modes: Vec<String>,
}

impl Default for TermsConfig {
    fn default() -> Self {
        Self {
            deposit_percent: 50,
            lead_time: "15 jours ouvrables".to_string(),
            payment_modes: vec![
                "espèces".to_string(),
                "chèque".to_string(),
                "virement bancaire".to_string(),
            ],
        }
    }
}
