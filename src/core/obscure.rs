//! Reversible encoding for saved secrets.
//!
//! This is base64, not encryption. It keeps secrets from being readable at a
//! glance in `credentials.json`; anyone who can read the file can recover
//! them. The file itself is written owner-only.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub fn encode(secret: &str) -> String {
    STANDARD.encode(secret.as_bytes())
}

/// Reverse [`encode`]. Values that are not valid base64 UTF-8 are returned
/// unchanged, so hand-edited plain values still work.
pub fn decode(encoded: &str) -> String {
    match STANDARD.decode(encoded) {
        Ok(bytes) => String::from_utf8(bytes).unwrap_or_else(|_| encoded.to_string()),
        Err(_) => encoded.to_string(),
    }
}
