//! Core library for CF-e SAT receipt extraction.
//!
//! This crate provides:
//! - Access key resolution from typed text or QR code images
//! - An interactive extraction session against the SEFAZ-SP query portal,
//!   with a manual challenge step confirmed by an operator
//! - Receipt data models with line-item validation
//! - CSV export with one row per line item
//! - Single and batch orchestration

pub mod error;
pub mod export;
pub mod key;
pub mod models;
pub mod orchestrator;
pub mod rules;
pub mod session;

pub use error::{CupomError, DriverError, ExportError, KeyError, Result, SessionError};
pub use export::CsvExporter;
pub use key::{AccessKeyResolver, BarcodeDecoder, QrImageDecoder};
pub use models::config::CupomConfig;
pub use models::receipt::{
    AccessKey, Buyer, DeliveryLocation, ItemIssue, Issuer, LineItem, RawLineItem, ReceiptRecord,
    ReceiptSummary, RecordOverview,
};
pub use orchestrator::{BatchEntry, BatchReport, ExtractionOrchestrator, ProcessOutcome};
pub use session::{
    BrowserLauncher, ChallengeSignal, Interrupt, Locator, OperatorSignal, PortalDriver,
    ReceiptExtractionSession, SessionState,
};

#[cfg(feature = "browser")]
pub use session::{ChromiumDriver, ChromiumLauncher};
