//! Error types for the cupom-core library.

use std::path::PathBuf;

use thiserror::Error;

use crate::session::SessionState;

/// Main error type for the cupom library.
#[derive(Error, Debug)]
pub enum CupomError {
    /// The access key could not be resolved.
    #[error("access key error: {0}")]
    Key(#[from] KeyError),

    /// The portal session failed.
    #[error("extraction error: {0}")]
    Session(#[from] SessionError),

    /// Writing the record failed.
    #[error("export error: {0}")]
    Export(#[from] ExportError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors produced while resolving an access key from typed text or an image.
#[derive(Error, Debug)]
pub enum KeyError {
    /// The digit sequence does not have exactly 44 digits.
    #[error("access key must have exactly 44 digits, found {found}")]
    InvalidLength { found: usize },

    /// The input holds no digits, or holds characters other than digits.
    #[error("access key must be numeric")]
    NonNumeric,

    /// No 44-digit key could be located in a decoded payload.
    #[error("no access key found in QR payload")]
    NotFound,

    /// The image file does not exist.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The image extension is not one of the recognized formats.
    #[error("unsupported image format: {0} (use png, jpg, jpeg, bmp or gif)")]
    UnsupportedFormat(String),

    /// The image contains no 2D barcode.
    #[error("no QR code found in image")]
    NoSymbolFound,

    /// A symbol was found but its payload could not be read as text.
    #[error("could not decode QR code: {0}")]
    DecodeError(String),

    /// The image could not be loaded.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Low-level browser failures reported by a [`crate::session::PortalDriver`].
#[derive(Error, Debug)]
pub enum DriverError {
    /// The browser could not be started.
    #[error("failed to launch browser: {0}")]
    Launch(String),

    /// Navigation failed.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// A bounded wait elapsed.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The browser rejected a command.
    #[error("browser protocol error: {0}")]
    Protocol(String),

    /// The browser was already closed.
    #[error("browser is closed")]
    Closed,
}

/// Structural failures that abort one extraction session.
#[derive(Error, Debug)]
pub enum SessionError {
    /// No browser instance could be acquired.
    #[error("could not start browser: {0}")]
    Launch(String),

    /// The portal page could not be loaded.
    #[error("portal unreachable at {url}: {reason}")]
    PortalUnreachable { url: String, reason: String },

    /// A required input field did not appear in time.
    #[error("field not found: {0}")]
    FieldNotFound(String),

    /// The query submit control did not appear.
    #[error("submit control not found")]
    SubmitNotFound,

    /// Submitting the query timed out.
    #[error("query timed out: {0}")]
    QueryTimeout(String),

    /// The operator signal was dropped before confirming the challenge.
    #[error("manual challenge was not confirmed: {0}")]
    ChallengeAborted(String),

    /// None of the Details lookup strategies matched.
    #[error("Details control not found (was the challenge solved?)")]
    DetailsControlNotFound,

    /// The products tab did not appear after opening the details view.
    #[error("products tab not found")]
    ProductsTabNotFound,

    /// The session was interrupted before completing.
    #[error("session interrupted during {state}")]
    Interrupted { state: SessionState },

    /// Unclassified browser failure.
    #[error("browser error: {0}")]
    Driver(#[from] DriverError),
}

/// Errors raised while persisting a record.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV writer failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The configured delimiter is not a single-byte character.
    #[error("delimiter must be an ASCII character, got {0:?}")]
    Delimiter(char),
}

/// Result type for the cupom library.
pub type Result<T> = std::result::Result<T, CupomError>;
