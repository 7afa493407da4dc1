//! QR code decoding from image files.

use std::path::Path;

use tracing::{debug, warn};

use crate::error::KeyError;

use super::Result;

/// Image extensions accepted as QR code sources.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif"];

/// Whether the path ends in one of [`IMAGE_EXTENSIONS`] (case-insensitive).
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Decodes the single QR code expected in a receipt image.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrImageDecoder;

impl QrImageDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode the QR code in `path` into its text payload.
    ///
    /// When the image holds several symbols the first one detected is used.
    pub fn decode(&self, path: &Path) -> Result<String> {
        if !path.exists() {
            return Err(KeyError::FileNotFound(path.to_path_buf()));
        }

        if !is_image_path(path) {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_string();
            return Err(KeyError::UnsupportedFormat(ext));
        }

        let luma = image::open(path)?.to_luma8();
        let (width, height) = luma.dimensions();

        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
                luma.get_pixel(x as u32, y as u32).0[0]
            });
        let grids = prepared.detect_grids();

        let Some(grid) = grids.first() else {
            return Err(KeyError::NoSymbolFound);
        };
        if grids.len() > 1 {
            warn!(
                "{} QR codes found in {}, using the first",
                grids.len(),
                path.display()
            );
        }

        let (_meta, content) = grid
            .decode()
            .map_err(|e| KeyError::DecodeError(e.to_string()))?;

        debug!("Decoded {} bytes of QR payload", content.len());
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;
    use qrcode::QrCode;

    fn render(payload: &str) -> GrayImage {
        QrCode::new(payload.as_bytes())
            .unwrap()
            .render::<image::Luma<u8>>()
            .module_dimensions(4, 4)
            .build()
    }

    #[test]
    fn test_is_image_path() {
        assert!(is_image_path(Path::new("a/b.png")));
        assert!(is_image_path(Path::new("scan.JPEG")));
        assert!(!is_image_path(Path::new("keys.txt")));
        assert!(!is_image_path(Path::new("12345")));
    }

    #[test]
    fn test_missing_file() {
        let err = QrImageDecoder::new()
            .decode(Path::new("/nonexistent/receipt.png"))
            .unwrap_err();
        assert!(matches!(err, KeyError::FileNotFound(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.tiff");
        std::fs::write(&path, b"not an image").unwrap();

        let err = QrImageDecoder::new().decode(&path).unwrap_err();
        assert!(matches!(err, KeyError::UnsupportedFormat(ext) if ext == "tiff"));
    }

    #[test]
    fn test_blank_image_has_no_symbol() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.png");
        image::GrayImage::from_pixel(64, 64, image::Luma([255u8]))
            .save(&path)
            .unwrap();

        let err = QrImageDecoder::new().decode(&path).unwrap_err();
        assert!(matches!(err, KeyError::NoSymbolFound));
    }

    #[test]
    fn test_decodes_rendered_symbol() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cupom.png");
        let payload = "35230312345678000190590000123450001234567890|20230301120000|100.00";
        render(payload).save(&path).unwrap();

        assert_eq!(QrImageDecoder::new().decode(&path).unwrap(), payload);
    }

    #[test]
    fn test_several_symbols_use_the_first() {
        let top = render("first-symbol");
        let bottom = render("second-symbol");

        let width = top.width().max(bottom.width());
        let height = top.height() + bottom.height();
        let mut canvas = GrayImage::from_pixel(width, height, image::Luma([255u8]));
        image::imageops::replace(&mut canvas, &top, 0, 0);
        image::imageops::replace(&mut canvas, &bottom, 0, i64::from(top.height()));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two.png");
        canvas.save(&path).unwrap();

        assert_eq!(QrImageDecoder::new().decode(&path).unwrap(), "first-symbol");
    }
}
