//! Content sniffing for uploads.
//!
//! The MIME type is taken from the bytes, never from the client's filename or
//! multipart header.

use crate::error::{Error, Result};

/// Reported when the magic bytes match no known format.
pub const UNKNOWN_MIME_TYPE: &str = "application/octet-stream";

/// Detect the MIME type of `data` from its magic bytes.
pub fn sniff_mime_type(data: &[u8]) -> &'static str {
    infer::get(data)
        .map(|kind| kind.mime_type())
        .unwrap_or(UNKNOWN_MIME_TYPE)
}

/// Ensure `data` sniffs as `accepted`, returning the detected type.
pub fn ensure_accepted(data: &[u8], accepted: &str) -> Result<&'static str> {
    if data.is_empty() {
        return Err(Error::InvalidInput("Uploaded file is empty".into()));
    }
    let detected = sniff_mime_type(data);
    if !detected.eq_ignore_ascii_case(accepted) {
        return Err(Error::InvalidInput(format!(
            "Uploaded file is {}, only {} is accepted",
            detected, accepted
        )));
    }
    Ok(detected)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PDF: &[u8] = b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n1 0 obj\n<<>>\nendobj\n";

    #[test]
    fn test_sniff_pdf() {
        assert_eq!(sniff_mime_type(PDF), "application/pdf");
    }

    #[test]
    fn test_sniff_plain_text_is_unknown() {
        assert_eq!(sniff_mime_type(b"just some notes"), UNKNOWN_MIME_TYPE);
    }

    #[test]
    fn test_ensure_accepted_pdf() {
        assert_eq!(
            ensure_accepted(PDF, "application/pdf").unwrap(),
            "application/pdf"
        );
    }

    #[test]
    fn test_ensure_accepted_rejects_text() {
        let err = ensure_accepted(b"hello world", "application/pdf").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(err.to_string().contains("application/pdf"));
    }

    #[test]
    fn test_ensure_accepted_rejects_png_when_pdf_expected() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        let err = ensure_accepted(&png, "application/pdf").unwrap_err();
        assert!(err.to_string().contains("image/png"));
    }

    #[test]
    fn test_ensure_accepted_rejects_empty() {
        assert!(matches!(
            ensure_accepted(b"", "application/pdf"),
            Err(Error::InvalidInput(_))
        ));
    }
}
