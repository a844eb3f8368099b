//! Value marshaling for route arguments and results
//!
//! Two wire forms are used:
//! - **values** (results): plain JSON text
//! - **args** (route data): JSON text, percent-encoded so it can sit in a route URI
//!
//! The `try_*` functions report failures; the plain `decode_*` functions log the
//! failure and yield `None`, which is how callers treat an undecodable payload.

use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{de::DeserializeOwned, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode value: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode value: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("route data is not valid UTF-8 after percent-decoding")]
    InvalidUtf8(#[source] std::str::Utf8Error),
}

pub fn encode_value<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    serde_json::to_string(value).map_err(CodecError::Encode)
}

pub fn try_decode_value<T: DeserializeOwned>(raw: &str) -> Result<T, CodecError> {
    serde_json::from_str(raw).map_err(CodecError::Decode)
}

pub fn decode_value<T: DeserializeOwned>(raw: &str) -> Option<T> {
    match try_decode_value(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            log::error!("Dropping undecodable value: {e}");
            None
        }
    }
}

pub fn encode_arg<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    let json = encode_value(value)?;
    Ok(utf8_percent_encode(&json, NON_ALPHANUMERIC).to_string())
}

pub fn try_decode_arg<T: DeserializeOwned>(raw: &str) -> Result<T, CodecError> {
    let json = percent_decode_str(raw)
        .decode_utf8()
        .map_err(CodecError::InvalidUtf8)?;
    try_decode_value(&json)
}

pub fn decode_arg<T: DeserializeOwned>(raw: &str) -> Option<T> {
    match try_decode_arg(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            log::error!("Dropping undecodable route data: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use pretty_assertions::assert_eq;
    use rstest::*;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct PriceRange {
        min: u32,
        max: u32,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct ProductFilter {
        query: Option<String>,
        price: PriceRange,
        categories: Vec<String>,
        ratings: BTreeMap<String, f64>,
    }

    #[fixture]
    fn filter() -> ProductFilter {
        ProductFilter {
            query: Some("phone & case / 50% off?".to_string()),
            price: PriceRange { min: 10, max: 50 },
            categories: vec!["smartphones".to_string(), "laptops".to_string()],
            ratings: BTreeMap::from([("min".to_string(), 4.5)]),
        }
    }

    #[rstest]
    fn test_value_round_trip_nested_record(filter: ProductFilter) -> Result<(), CodecError> {
        let raw = encode_value(&filter)?;
        assert_eq!(try_decode_value::<ProductFilter>(&raw)?, filter);
        Ok(())
    }

    #[rstest]
    fn test_arg_round_trip_nested_record(filter: ProductFilter) -> Result<(), CodecError> {
        let raw = encode_arg(&filter)?;
        assert!(raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '%'));
        assert_eq!(try_decode_arg::<ProductFilter>(&raw)?, filter);
        Ok(())
    }

    #[rstest]
    #[case(serde_json::json!(42))]
    #[case(serde_json::json!("Products"))]
    #[case(serde_json::json!(true))]
    #[case(serde_json::json!(null))]
    #[case(serde_json::json!([1, 2, 3]))]
    #[case(serde_json::json!([{"id": 1, "tags": ["a", "b"]}, {"id": 2, "tags": []}]))]
    fn test_arg_round_trip_shapes(#[case] value: serde_json::Value) -> Result<(), CodecError> {
        let raw = encode_arg(&value)?;
        assert_eq!(try_decode_arg::<serde_json::Value>(&raw)?, value);
        Ok(())
    }

    #[test]
    fn test_decode_failure_is_absent() {
        assert_eq!(decode_value::<PriceRange>("{\"min\": \"ten\"}"), None);
        assert_eq!(decode_arg::<PriceRange>("%7Bnot-json"), None);
    }

    #[test]
    fn test_invalid_utf8_is_reported() {
        let err = try_decode_arg::<String>("%FF%FE").err();
        assert!(matches!(err, Some(CodecError::InvalidUtf8(_))));
    }
}
