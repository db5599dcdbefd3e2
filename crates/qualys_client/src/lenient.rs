//! Deserializers for scalars Qualys sends as either JSON values or strings.
//!
//! The QPS endpoints report `"hasMoreRecords": "true"` and `"count": "3"` on
//! some platforms and plain booleans/numbers on others.

use serde::de::Error;
use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(u64),
    Float(f64),
    Text(String),
}

/// `true`/`false`, `"true"`/`"false"`, `1`/`0`; absent or null is `false`.
pub(crate) fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Scalar>::deserialize(deserializer)? {
        None => Ok(false),
        Some(Scalar::Bool(value)) => Ok(value),
        Some(Scalar::Int(value)) => Ok(value != 0),
        Some(Scalar::Float(value)) => Ok(value != 0.0),
        Some(Scalar::Text(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" | "" => Ok(false),
            other => Err(D::Error::custom(format!("invalid boolean '{}'", other))),
        },
    }
}

/// Number or numeric string; absent, null or empty is `None`.
pub(crate) fn opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Scalar>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Scalar::Int(value)) => Ok(Some(value)),
        Some(Scalar::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Scalar::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid number '{}'", text))),
        Some(Scalar::Float(value)) => Err(D::Error::custom(format!("expected integer, got {}", value))),
        Some(Scalar::Bool(value)) => Err(D::Error::custom(format!("expected integer, got {}", value))),
    }
}

/// Like [`opt_u64`], narrowed to `u8` (severity levels).
pub(crate) fn opt_u8<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    opt_u64(deserializer)?
        .map(|value| u8::try_from(value).map_err(|_| D::Error::custom(format!("{} out of range", value))))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "flag")]
        more: bool,
        #[serde(default, deserialize_with = "opt_u64")]
        count: Option<u64>,
        #[serde(default, deserialize_with = "opt_u8")]
        severity: Option<u8>,
    }

    fn probe(json: &str) -> Probe {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_string_and_native_values() {
        let p = probe(r#"{"more": "true", "count": "12", "severity": 4}"#);
        assert!(p.more);
        assert_eq!(p.count, Some(12));
        assert_eq!(p.severity, Some(4));

        let p = probe(r#"{"more": false, "count": 3, "severity": "5"}"#);
        assert!(!p.more);
        assert_eq!(p.count, Some(3));
        assert_eq!(p.severity, Some(5));
    }

    #[test]
    fn test_absent_and_null() {
        let p = probe(r#"{"count": null}"#);
        assert!(!p.more);
        assert_eq!(p.count, None);
        assert_eq!(p.severity, None);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(serde_json::from_str::<Probe>(r#"{"more": "maybe"}"#).is_err());
        assert!(serde_json::from_str::<Probe>(r#"{"count": "many"}"#).is_err());
        assert!(serde_json::from_str::<Probe>(r#"{"severity": 300}"#).is_err());
    }
}
