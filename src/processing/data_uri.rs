//! # Data URIs
//!
//! Images travel to the API embedded in text as
//! `data:<mime type>;base64,<payload>`.

use base64::{engine::general_purpose, Engine as _};
use std::fmt;
use std::str::FromStr;

use crate::error::IngestError;

/// A base64 data URI with its decoded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    mime_type: String,
    bytes: Vec<u8>,
}

impl DataUri {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "data:{};base64,{}",
            self.mime_type,
            general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

impl FromStr for DataUri {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix("data:")
            .ok_or_else(|| IngestError::DecodeError("not a data URI".to_string()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| IngestError::DecodeError("data URI has no payload".to_string()))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| IngestError::DecodeError("data URI is not base64".to_string()))?;

        let bytes = general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| IngestError::DecodeError(format!("bad base64 payload: {}", e)))?;

        Ok(Self::new(mime_type, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        let uri = DataUri::new("image/png", b"hello".to_vec());
        assert_eq!(uri.to_string(), "data:image/png;base64,aGVsbG8=");
    }

    #[test]
    fn test_parse() {
        let uri: DataUri = "data:image/gif;base64,aGVsbG8=".parse().unwrap();
        assert_eq!(uri.mime_type(), "image/gif");
        assert_eq!(uri.bytes(), b"hello");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "image/png;base64,aGVsbG8=",
            "data:image/png;base64",
            "data:image/png,hello",
            "data:image/png;base64,@@@",
        ] {
            assert!(
                matches!(bad.parse::<DataUri>(), Err(IngestError::DecodeError(_))),
                "{}",
                bad
            );
        }
    }
}
