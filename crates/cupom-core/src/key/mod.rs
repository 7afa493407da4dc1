//! Access key resolution from typed text and QR code images.

mod qrcode;

pub use qrcode::{IMAGE_EXTENSIONS, QrImageDecoder, is_image_path};

use std::path::Path;

use tracing::{debug, warn};

use crate::error::KeyError;
use crate::models::receipt::{ACCESS_KEY_LEN, AccessKey};
use crate::rules::patterns::{DIGIT_RUN, KEY_BARE, KEY_DELIMITED, KEY_QUERY_PARAM};

/// Result type for key resolution.
pub type Result<T> = std::result::Result<T, KeyError>;

/// Trait for decoding the 2D barcode in an image file into its text payload.
pub trait BarcodeDecoder {
    fn decode(&self, path: &Path) -> Result<String>;
}

impl BarcodeDecoder for QrImageDecoder {
    fn decode(&self, path: &Path) -> Result<String> {
        QrImageDecoder::decode(self, path)
    }
}

/// Turns user input into a validated [`AccessKey`].
#[derive(Debug, Clone, Default)]
pub struct AccessKeyResolver<D = QrImageDecoder> {
    decoder: D,
}

impl AccessKeyResolver<QrImageDecoder> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<D: BarcodeDecoder> AccessKeyResolver<D> {
    /// Create a resolver with a custom barcode decoder.
    pub fn with_decoder(decoder: D) -> Self {
        Self { decoder }
    }

    /// Resolve a typed key. Every non-digit character is discarded first.
    pub fn resolve_typed(&self, text: &str) -> Result<AccessKey> {
        let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();

        if digits.is_empty() {
            return Err(KeyError::NonNumeric);
        }
        if digits.len() != ACCESS_KEY_LEN {
            return Err(KeyError::InvalidLength {
                found: digits.len(),
            });
        }

        AccessKey::parse(&digits)
    }

    /// Locate the access key inside a decoded QR payload.
    ///
    /// Patterns are tried in priority order: a bare 44-digit run, a
    /// `chave=`/`p=`/`key=` query parameter, a run followed by a field
    /// delimiter, and finally any maximal digit run of exactly 44 digits.
    pub fn resolve_from_payload(&self, payload: &str) -> Result<AccessKey> {
        let patterns = [
            ("bare", &*KEY_BARE),
            ("query parameter", &*KEY_QUERY_PARAM),
            ("delimited", &*KEY_DELIMITED),
        ];

        for (name, pattern) in patterns {
            if let Some(key) = pattern.captures(payload).and_then(|c| c.get(1)) {
                debug!("Access key matched {} pattern", name);
                return AccessKey::parse(key.as_str());
            }
        }

        if let Some(run) = DIGIT_RUN
            .find_iter(payload)
            .find(|m| m.as_str().len() == ACCESS_KEY_LEN)
        {
            debug!("Access key matched digit-run fallback");
            return AccessKey::parse(run.as_str());
        }

        warn!("No access key in QR payload: {}", payload);
        Err(KeyError::NotFound)
    }

    /// Resolve an image path through the decoder, anything else as typed text.
    pub fn dispatch(&self, entry: &str) -> Result<AccessKey> {
        let entry = entry.trim();
        let path = Path::new(entry);

        if is_image_path(path) {
            debug!("Decoding QR code from {}", path.display());
            let payload = self.decoder.decode(path)?;
            self.resolve_from_payload(&payload)
        } else {
            self.resolve_typed(entry)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const KEY: &str = "12345678901234567890123456789012345678901234";

    struct FixedPayload(&'static str);

    impl BarcodeDecoder for FixedPayload {
        fn decode(&self, _path: &Path) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_typed_strips_separators() {
        let resolver = AccessKeyResolver::new();
        let key = resolver
            .resolve_typed("1234 5678 9012 3456 7890 1234 5678 9012 3456 7890 1234")
            .unwrap();
        assert_eq!(key.as_str(), KEY);
    }

    #[test]
    fn test_typed_is_idempotent() {
        let resolver = AccessKeyResolver::new();
        let once = resolver.resolve_typed(KEY).unwrap();
        let twice = resolver.resolve_typed(once.as_str()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_typed_invalid_length() {
        let resolver = AccessKeyResolver::new();
        assert!(matches!(
            resolver.resolve_typed("123456789"),
            Err(KeyError::InvalidLength { found: 9 })
        ));
    }

    #[test]
    fn test_typed_without_digits() {
        let resolver = AccessKeyResolver::new();
        assert!(matches!(
            resolver.resolve_typed("abc-def"),
            Err(KeyError::NonNumeric)
        ));
    }

    #[test]
    fn test_payload_bare_run() {
        let resolver = AccessKeyResolver::new();
        let payload = format!("CFe{}|20240101|100.00", KEY);
        assert_eq!(resolver.resolve_from_payload(&payload).unwrap().as_str(), KEY);
    }

    #[test]
    fn test_payload_query_parameter() {
        let resolver = AccessKeyResolver::new();
        let payload = format!("https://portal.example/consulta?p={}9", KEY);
        // The trailing digit defeats the bare and delimited patterns
        assert_eq!(resolver.resolve_from_payload(&payload).unwrap().as_str(), KEY);
    }

    #[test]
    fn test_payload_skips_non_ascii_digit_runs() {
        let resolver = AccessKeyResolver::new();
        let payload = format!("{}|{}", "\u{0663}".repeat(44), KEY);
        assert_eq!(resolver.resolve_from_payload(&payload).unwrap().as_str(), KEY);
    }

    #[test]
    fn test_payload_not_found() {
        let resolver = AccessKeyResolver::new();
        assert!(matches!(
            resolver.resolve_from_payload("no key here 123"),
            Err(KeyError::NotFound)
        ));
    }

    #[test]
    fn test_dispatch_routes_images_to_decoder() {
        let resolver = AccessKeyResolver::with_decoder(FixedPayload(
            "35150812345678000190590000123450001234567890|x",
        ));
        let key = resolver.dispatch("scans/receipt.PNG").unwrap();
        assert_eq!(key.as_str(), "35150812345678000190590000123450001234567890");
    }

    #[test]
    fn test_dispatch_routes_text_to_typed() {
        let resolver = AccessKeyResolver::with_decoder(FixedPayload("ignored"));
        assert_eq!(resolver.dispatch(&format!(" {} ", KEY)).unwrap().as_str(), KEY);
    }
}
