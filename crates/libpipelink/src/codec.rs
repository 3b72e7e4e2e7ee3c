//! UTF-8 message codec
//!
//! There is no framing: whatever one read returns is decoded as one message.

use crate::error::PipeError;

/// Converts between raw pipe bytes and text messages
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageCodec {
    lossy: bool,
}

impl MessageCodec {
    /// Strict codec; invalid UTF-8 is a decode error
    pub fn new() -> Self {
        Self { lossy: false }
    }

    /// Codec that replaces invalid sequences with U+FFFD
    pub fn lossy() -> Self {
        Self { lossy: true }
    }

    pub fn is_lossy(&self) -> bool {
        self.lossy
    }

    /// Decode one read's worth of bytes
    pub fn decode(&self, bytes: &[u8]) -> Result<String, PipeError> {
        if self.lossy {
            return Ok(String::from_utf8_lossy(bytes).into_owned());
        }
        Ok(std::str::from_utf8(bytes)?.to_owned())
    }

    /// Encode an outgoing message
    pub fn encode<'a>(&self, text: &'a str) -> &'a [u8] {
        text.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid_utf8() {
        let codec = MessageCodec::new();
        assert_eq!(codec.decode("héllo".as_bytes()).unwrap(), "héllo");
    }

    #[test]
    fn test_strict_rejects_split_code_point() {
        // First two bytes of a three-byte sequence, as left by a buffer boundary
        let bytes = "€".as_bytes();
        let codec = MessageCodec::new();
        assert!(matches!(
            codec.decode(&bytes[..2]),
            Err(PipeError::Decode(_))
        ));
    }

    #[test]
    fn test_lossy_replaces_invalid_bytes() {
        let codec = MessageCodec::lossy();
        assert!(codec.is_lossy());
        assert_eq!(codec.decode(&[b'o', b'k', 0xff]).unwrap(), "ok\u{fffd}");
    }

    #[test]
    fn test_encode_is_utf8_bytes() {
        assert_eq!(MessageCodec::new().encode("exit"), b"exit");
    }
}
