//! Source document detection

use crate::error::{RedactError, Result};
use serde::Serialize;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Kind of document a batch carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Image,
}

impl DocumentKind {
    /// Sniff the kind from leading bytes
    pub fn detect(bytes: &[u8]) -> Result<Self> {
        // Readers tolerate junk before the header within the first 1024 bytes
        let head = &bytes[..bytes.len().min(1024)];
        if head.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC) {
            return Ok(DocumentKind::Pdf);
        }
        if is_image(bytes) {
            return Ok(DocumentKind::Image);
        }
        Err(RedactError::DocumentFormat(
            "neither a PDF nor a recognised image".to_string(),
        ))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Image => "image",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "raster")]
fn is_image(bytes: &[u8]) -> bool {
    image::guess_format(bytes).is_ok()
}

#[cfg(not(feature = "raster"))]
fn is_image(bytes: &[u8]) -> bool {
    const SIGNATURES: [&[u8]; 4] = [b"\x89PNG", b"\xFF\xD8\xFF", b"GIF8", b"II*\0"];
    SIGNATURES.iter().any(|sig| bytes.starts_with(sig))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_pdf() {
        assert_eq!(DocumentKind::detect(b"%PDF-1.7\n...").unwrap(), DocumentKind::Pdf);
        assert_eq!(DocumentKind::detect(b"\r\n%PDF-1.4").unwrap(), DocumentKind::Pdf);
    }

    #[test]
    fn test_detect_image() {
        let png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
        assert_eq!(DocumentKind::detect(png).unwrap(), DocumentKind::Image);
    }

    #[test]
    fn test_unknown_bytes() {
        let err = DocumentKind::detect(b"hello world").unwrap_err();
        assert!(matches!(err, RedactError::DocumentFormat(_)));
        assert!(DocumentKind::detect(b"").is_err());
    }
}
