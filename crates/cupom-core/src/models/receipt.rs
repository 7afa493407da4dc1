//! CF-e SAT receipt data model.
//!
//! Unset fields are `None` here; the `N/A` placeholder only appears at the
//! export boundary (see [`crate::export`]).

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::KeyError;
use crate::rules::amounts::{format_brl_amount, parse_brl_amount};

/// Number of digits in a CF-e access key.
pub const ACCESS_KEY_LEN: usize = 44;

/// Number of digits in an NCM classification code.
pub const NCM_LEN: usize = 8;

/// A validated 44-digit access key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AccessKey(String);

impl AccessKey {
    /// Validate an already-clean key. No characters are stripped.
    pub fn parse(key: &str) -> Result<Self, KeyError> {
        if key.is_empty() {
            return Err(KeyError::NonNumeric);
        }
        if !key.chars().all(|c| c.is_ascii_digit()) {
            return Err(KeyError::NonNumeric);
        }
        if key.len() != ACCESS_KEY_LEN {
            return Err(KeyError::InvalidLength { found: key.len() });
        }
        Ok(Self(key.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for listings: first 20 digits followed by `...`.
    pub fn abbreviated(&self) -> String {
        format!("{}...", &self.0[..20])
    }
}

impl fmt::Display for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AccessKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The establishment that issued the receipt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Issuer {
    /// Inscrição Estadual.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_registration: Option<String>,

    /// Inscrição Municipal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub municipal_registration: Option<String>,

    /// Extract (CF-e) number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract_number: Option<String>,

    /// SAT device serial number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sat_number: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cnpj: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,

    /// CEP.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,

    /// UF / municipality line as rendered by the portal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Purchaser identification, when the receipt carries one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Buyer {
    /// CPF or CNPJ.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,

    /// Name or corporate name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Buyer {
    /// True when at least one field is populated.
    pub fn is_present(&self) -> bool {
        self.tax_id.is_some() || self.name.is_some()
    }
}

/// Receipt-level totals and metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiptSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<String>,

    /// Approximate tax disclosure (Lei 12.741).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxes: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<String>,

    /// QR payload echoed by the portal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
}

impl ReceiptSummary {
    /// Total as a decimal, when it parses.
    pub fn total_amount(&self) -> Option<Decimal> {
        self.total.as_deref().and_then(parse_brl_amount)
    }
}

/// Alternate delivery address shown on its own tab.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryLocation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub municipality: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_number: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
}

impl DeliveryLocation {
    /// Present only when the address or the municipality is filled in.
    pub fn is_present(&self) -> bool {
        self.address.is_some() || self.municipality.is_some()
    }
}

/// A line-item validation failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ItemIssue {
    #[error("invalid NCM {0:?}: must have exactly 8 digits")]
    InvalidNcm(String),

    #[error("negative {field}: {value}")]
    NegativeValue { field: &'static str, value: Decimal },

    #[error("quantity must be positive, got {0}")]
    NonPositiveQuantity(Decimal),

    #[error("product code is empty")]
    EmptyProductCode,

    #[error("{field} is not a number: {raw:?}")]
    UnparseableAmount { field: &'static str, raw: String },
}

/// One purchased product or service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// NCM classification code.
    pub ncm: String,

    /// Net value (without taxes).
    pub net_value: Decimal,

    /// Store's internal product code.
    pub product_code: String,

    /// GTIN/EAN barcode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,

    /// Final value (with taxes).
    pub total_value: Decimal,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
}

/// Text of a products-table row before normalization.
#[derive(Debug, Clone, Default)]
pub struct RawLineItem {
    pub ncm: String,
    pub net_value: String,
    pub product_code: String,
    pub barcode: Option<String>,
    pub total_value: String,
    pub description: Option<String>,
    pub quantity: Option<String>,
}

impl LineItem {
    /// Normalize raw row text and validate the result.
    ///
    /// Returns every issue found; an item is only produced when there are none.
    pub fn from_raw(raw: RawLineItem) -> Result<Self, Vec<ItemIssue>> {
        let mut issues = Vec::new();

        let mut amount = |field: &'static str, raw: &str| match parse_brl_amount(raw) {
            Some(value) => Some(value),
            None => {
                issues.push(ItemIssue::UnparseableAmount {
                    field,
                    raw: raw.to_string(),
                });
                None
            }
        };

        let net_value = amount("net value", &raw.net_value);
        let total_value = amount("total value", &raw.total_value);
        let quantity = raw
            .quantity
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| amount("quantity", q));

        let (Some(net_value), Some(total_value)) = (net_value, total_value) else {
            return Err(issues);
        };
        let quantity = match quantity {
            Some(None) => return Err(issues),
            Some(Some(q)) => Some(q),
            None => None,
        };
        if !issues.is_empty() {
            return Err(issues);
        }

        let item = LineItem {
            ncm: raw.ncm.trim().to_string(),
            net_value,
            product_code: raw.product_code.trim().to_string(),
            barcode: clean_optional(raw.barcode),
            total_value,
            description: clean_optional(raw.description),
            quantity,
        };

        let issues = item.validate();
        if issues.is_empty() { Ok(item) } else { Err(issues) }
    }

    /// Check the item invariants and return any issues found.
    pub fn validate(&self) -> Vec<ItemIssue> {
        let mut issues = Vec::new();

        if self.ncm.len() != NCM_LEN || !self.ncm.chars().all(|c| c.is_ascii_digit()) {
            issues.push(ItemIssue::InvalidNcm(self.ncm.clone()));
        }

        if self.net_value.is_sign_negative() && !self.net_value.is_zero() {
            issues.push(ItemIssue::NegativeValue {
                field: "net value",
                value: self.net_value,
            });
        }

        if self.total_value.is_sign_negative() && !self.total_value.is_zero() {
            issues.push(ItemIssue::NegativeValue {
                field: "total value",
                value: self.total_value,
            });
        }

        if let Some(quantity) = self.quantity {
            if quantity <= Decimal::ZERO {
                issues.push(ItemIssue::NonPositiveQuantity(quantity));
            }
        }

        if self.product_code.trim().is_empty() {
            issues.push(ItemIssue::EmptyProductCode);
        }

        issues
    }
}

impl fmt::Display for LineItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (NCM {}, R$ {})",
            self.description.as_deref().unwrap_or(&self.product_code),
            self.ncm,
            format_brl_amount(self.total_value)
        )
    }
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Everything extracted from one receipt.
///
/// Built once at the end of a successful session and not modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptRecord {
    issuer: Issuer,
    summary: ReceiptSummary,
    items: Vec<LineItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    buyer: Option<Buyer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    delivery: Option<DeliveryLocation>,
}

/// Short digest of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordOverview {
    pub item_count: usize,
    pub total: Option<String>,
    pub has_buyer: bool,
    pub has_delivery: bool,
}

impl ReceiptRecord {
    pub fn new(issuer: Issuer, summary: ReceiptSummary, items: Vec<LineItem>) -> Self {
        Self {
            issuer,
            summary,
            items,
            buyer: None,
            delivery: None,
        }
    }

    /// Attach the buyer; one with no populated field is dropped.
    pub fn with_buyer(mut self, buyer: Option<Buyer>) -> Self {
        self.buyer = buyer.filter(Buyer::is_present);
        self
    }

    /// Attach the delivery location; one without address or municipality is dropped.
    pub fn with_delivery(mut self, delivery: Option<DeliveryLocation>) -> Self {
        self.delivery = delivery.filter(DeliveryLocation::is_present);
        self
    }

    pub fn issuer(&self) -> &Issuer {
        &self.issuer
    }

    pub fn summary(&self) -> &ReceiptSummary {
        &self.summary
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn buyer(&self) -> Option<&Buyer> {
        self.buyer.as_ref()
    }

    pub fn delivery(&self) -> Option<&DeliveryLocation> {
        self.delivery.as_ref()
    }

    pub fn overview(&self) -> RecordOverview {
        RecordOverview {
            item_count: self.items.len(),
            total: self.summary.total.clone(),
            has_buyer: self.buyer.is_some(),
            has_delivery: self.delivery.is_some(),
        }
    }
}

impl fmt::Display for ReceiptRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let na = |v: &Option<String>| v.clone().unwrap_or_else(|| "N/A".to_string());

        writeln!(f, "Issuer: {}", na(&self.issuer.name))?;
        writeln!(f, "CNPJ: {}", na(&self.issuer.cnpj))?;
        writeln!(f, "Total: {}", na(&self.summary.total))?;
        writeln!(f, "Issued at: {}", na(&self.summary.issued_at))?;
        writeln!(f, "Items: {}", self.items.len())?;

        if let Some(buyer) = &self.buyer {
            writeln!(f, "Buyer: {}", na(&buyer.name))?;
        }

        if let Some(delivery) = &self.delivery {
            writeln!(
                f,
                "Delivery: {}/{}",
                na(&delivery.municipality),
                na(&delivery.region)
            )?;
        }

        for item in &self.items {
            writeln!(f, "  - {}", item)?;
        }

        Ok(())
    }
}
