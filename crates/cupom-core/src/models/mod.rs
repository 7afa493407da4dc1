//! Data models for receipts and configuration.

pub mod config;
pub mod receipt;

pub use config::CupomConfig;
pub use receipt::{
    AccessKey, Buyer, DeliveryLocation, ItemIssue, Issuer, LineItem, RawLineItem, ReceiptRecord,
    ReceiptSummary, RecordOverview,
};
