use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

static BATCH_CODE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^SCH-\d{8}-\d{4}$").expect("batch code pattern is valid"));

/// Validated batch business key, format `SCH-YYYYMMDD-XXXX`
/// (8-digit date, 4-digit sequence).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BatchCode(String);

impl BatchCode {
    pub fn parse(value: impl Into<String>) -> Result<Self, ServiceError> {
        let value = value.into();
        if BATCH_CODE_PATTERN.is_match(&value) {
            Ok(Self(value))
        } else {
            Err(ServiceError::ValidationError(format!(
                "Invalid batch code format: '{}'. Expected format: SCH-YYYYMMDD-XXXX",
                value
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for BatchCode {
    type Error = ServiceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<BatchCode> for String {
    fn from(code: BatchCode) -> Self {
        code.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_codes() {
        assert!(BatchCode::parse("SCH-20251204-0001").is_ok());
        assert!(BatchCode::parse("SCH-19990101-9999").is_ok());
    }

    #[test]
    fn rejects_malformed_codes() {
        for bad in [
            "SCH-2025124-0001",   // 7-digit date
            "SCH-20251204-001",   // 3-digit sequence
            "sch-20251204-0001",  // lowercase prefix
            "SCH-20251204-0001x", // trailing junk
            "ABC-20251204-0001",
            "",
        ] {
            assert!(BatchCode::parse(bad).is_err(), "should reject {:?}", bad);
        }
    }

    #[test]
    fn round_trips_through_serde() {
        let code = BatchCode::parse("SCH-20251204-0001").unwrap();
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"SCH-20251204-0001\"");
        let back: BatchCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, code);
    }
}
