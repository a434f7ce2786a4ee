//! Serde helper functions for action payload deserialization.
//!
//! Mobile clients send blank strings for absent values and pad free text
//! with whitespace; these helpers normalize both at the boundary.

use serde::{Deserialize, Deserializer};

/// Deserialize an optional string, treating empty strings as None.
pub fn deserialize_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.filter(|s| !s.trim().is_empty()))
}

/// Deserialize a string, trimming surrounding whitespace.
pub fn deserialize_trimmed_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(s.trim().to_string())
}
