//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Public CF-e SAT query page of SEFAZ-SP.
pub const DEFAULT_PORTAL_URL: &str =
    "https://satsp.fazenda.sp.gov.br/COMSAT/Public/ConsultaPublica/ConsultaPublicaCfe.aspx";

/// Main configuration for the cupom pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CupomConfig {
    /// Portal location and wait budget.
    pub portal: PortalConfig,

    /// Browser launch options.
    pub browser: BrowserConfig,

    /// Which fields to extract.
    pub fields: ExtractionFields,

    /// Positional layout of the line-item rows.
    pub items: ItemColumns,

    /// CSV export options.
    pub export: ExportConfig,
}

/// Portal URL and wait durations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Query page URL.
    pub url: String,

    /// Bounded wait for required UI elements, in seconds.
    pub timeout_secs: u64,

    /// Short wait for optional UI regions (delivery tab), in seconds.
    pub short_timeout_secs: u64,

    /// Maximum time for the initial page load, in seconds.
    pub page_load_timeout_secs: u64,

    /// Idle delay after the operator confirms the challenge.
    pub challenge_settle_ms: u64,

    /// Delay after submitting the query.
    pub query_settle_ms: u64,

    /// Delay after opening the details view.
    pub details_settle_ms: u64,

    /// Delay after activating a tab.
    pub tab_settle_ms: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_PORTAL_URL.to_string(),
            timeout_secs: 10,
            short_timeout_secs: 5,
            page_load_timeout_secs: 30,
            challenge_settle_ms: 2000,
            query_settle_ms: 3000,
            details_settle_ms: 3000,
            tab_settle_ms: 2000,
        }
    }
}

impl PortalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn short_timeout(&self) -> Duration {
        Duration::from_secs(self.short_timeout_secs)
    }

    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }

    /// A configuration with every wait and settle delay set to zero.
    pub fn immediate() -> Self {
        Self {
            timeout_secs: 0,
            short_timeout_secs: 0,
            page_load_timeout_secs: 0,
            challenge_settle_ms: 0,
            query_settle_ms: 0,
            details_settle_ms: 0,
            tab_settle_ms: 0,
            ..Self::default()
        }
    }
}

/// Browser launch configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run without a visible window. The challenge needs a visible window,
    /// so this is only useful with a remote operator.
    pub headless: bool,

    /// Explicit Chrome/Chromium executable.
    pub chrome_executable: Option<PathBuf>,

    /// Extra command-line arguments.
    pub chrome_args: Vec<String>,

    /// User agent override.
    pub user_agent: Option<String>,
}

/// Per-entity and per-field extraction toggles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionFields {
    pub issuer: IssuerFields,
    pub buyer: BuyerFields,
    pub summary: SummaryFields,
    pub delivery: DeliveryFields,
    pub items: ItemFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerFields {
    pub state_registration: bool,
    pub municipal_registration: bool,
    pub extract_number: bool,
    pub sat_number: bool,
    pub name: bool,
    pub cnpj: bool,
    pub address: bool,
    pub neighborhood: bool,
    pub postal_code: bool,
    pub region: bool,
}

impl Default for IssuerFields {
    fn default() -> Self {
        Self {
            state_registration: true,
            municipal_registration: true,
            extract_number: true,
            sat_number: true,
            name: true,
            cnpj: true,
            address: true,
            neighborhood: true,
            postal_code: true,
            region: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuyerFields {
    /// When false no buyer field is read at all.
    pub active: bool,
    pub tax_id: bool,
    pub name: bool,
}

impl Default for BuyerFields {
    fn default() -> Self {
        Self {
            active: true,
            tax_id: true,
            name: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryFields {
    pub total: bool,
    pub payment_method: bool,
    pub change: bool,
    pub taxes: bool,
    pub issued_at: bool,
    pub qr_code: bool,
}

impl Default for SummaryFields {
    fn default() -> Self {
        Self {
            total: true,
            payment_method: true,
            change: true,
            taxes: true,
            issued_at: true,
            qr_code: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryFields {
    /// When false the delivery tab is never opened.
    pub active: bool,
    pub address: bool,
    pub neighborhood: bool,
    pub municipality: bool,
    pub region: bool,
    pub document_number: bool,
    pub access_key: bool,
}

impl Default for DeliveryFields {
    fn default() -> Self {
        Self {
            active: true,
            address: true,
            neighborhood: true,
            municipality: true,
            region: true,
            document_number: true,
            access_key: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemFields {
    /// When false the products tab is never opened.
    pub active: bool,
    pub ncm: bool,
    pub description: bool,
    pub quantity: bool,
    pub net_value: bool,
}

impl Default for ItemFields {
    fn default() -> Self {
        Self {
            active: true,
            ncm: true,
            description: true,
            quantity: true,
            net_value: true,
        }
    }
}

/// Cell positions in a products-table row for values without an element id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemColumns {
    /// Cell holding the GTIN/EAN barcode.
    pub barcode_column: usize,

    /// Cell holding the store's internal product code.
    pub product_code_column: usize,
}

impl Default for ItemColumns {
    fn default() -> Self {
        Self {
            barcode_column: 0,
            product_code_column: 5,
        }
    }
}

/// CSV export configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory receiving the CSV files.
    pub output_dir: PathBuf,

    /// Field delimiter.
    pub delimiter: char,

    /// Prefix files with a UTF-8 byte order mark (spreadsheet friendly).
    pub write_bom: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            delimiter: ';',
            write_bom: true,
        }
    }
}

impl CupomConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }

    /// Apply overrides from environment variables.
    ///
    /// Recognized: `HEADLESS_MODE`, `IMPLICIT_WAIT`, `PAGE_LOAD_TIMEOUT`,
    /// `USER_AGENT`, `CUPOM_OUTPUT_DIR`. Unparseable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("HEADLESS_MODE") {
            self.browser.headless = value.trim().eq_ignore_ascii_case("true");
        }
        if let Some(secs) = lookup("IMPLICIT_WAIT").and_then(|v| v.trim().parse().ok()) {
            self.portal.timeout_secs = secs;
        }
        if let Some(secs) = lookup("PAGE_LOAD_TIMEOUT").and_then(|v| v.trim().parse().ok()) {
            self.portal.page_load_timeout_secs = secs;
        }
        if let Some(agent) = lookup("USER_AGENT").filter(|v| !v.trim().is_empty()) {
            self.browser.user_agent = Some(agent);
        }
        if let Some(dir) = lookup("CUPOM_OUTPUT_DIR").filter(|v| !v.trim().is_empty()) {
            self.export.output_dir = PathBuf::from(dir);
        }
    }
}
