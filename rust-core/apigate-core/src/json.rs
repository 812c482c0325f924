//! # JSON Serialization Module
//!
//! Request bodies are parsed with simd-json.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;

/// Parse JSON bytes to a typed value using simd-json
///
/// simd-json parses in place, so the buffer is clobbered.
///
/// # Errors
///
/// Returns `Error::Json` if parsing fails
pub fn parse_json_bytes<T: DeserializeOwned>(bytes: &mut [u8]) -> Result<T> {
    simd_json::from_slice(bytes).map_err(|e| {
        Error::Json(serde::de::Error::custom(format!("Parse error: {e}")))
    })
}
