//! State report ingestion
//!
//! Reports arrive as JSON objects `{"is_active": bool, "timestamp": number}`.
//! Parsing is all-or-nothing: a report is either fully valid or rejected
//! before it can touch session state.

use crate::error::EngineError;
use crate::types::StateReport;
use serde_json::Value;

/// Parse and validate one report body
pub fn parse_report(body: &[u8]) -> Result<StateReport, EngineError> {
    let value: Value = serde_json::from_slice(body)?;
    report_from_value(&value)
}

/// Validate an already-decoded JSON value
pub fn report_from_value(value: &Value) -> Result<StateReport, EngineError> {
    let object = value
        .as_object()
        .ok_or_else(|| EngineError::InvalidReport("report must be a JSON object".to_string()))?;

    let is_active = match object.get("is_active") {
        None | Some(Value::Null) => return Err(EngineError::MissingField("is_active".to_string())),
        Some(Value::Bool(b)) => *b,
        Some(other) => {
            return Err(EngineError::InvalidReport(format!(
                "is_active must be a boolean, got {other}"
            )))
        }
    };

    let timestamp = match object.get("timestamp") {
        None | Some(Value::Null) => return Err(EngineError::MissingField("timestamp".to_string())),
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| {
            EngineError::InvalidReport(format!("timestamp is not representable: {n}"))
        })?,
        Some(other) => {
            return Err(EngineError::InvalidReport(format!(
                "timestamp must be a number, got {other}"
            )))
        }
    };

    let report = StateReport {
        is_active,
        timestamp,
    };
    validate_report(&report)?;
    Ok(report)
}

/// Reject reports that would poison accounting arithmetic
pub fn validate_report(report: &StateReport) -> Result<(), EngineError> {
    if !report.timestamp.is_finite() {
        return Err(EngineError::InvalidReport(
            "timestamp must be finite".to_string(),
        ));
    }
    if report.timestamp < 0.0 {
        return Err(EngineError::InvalidReport(format!(
            "timestamp must be non-negative, got {}",
            report.timestamp
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_report() {
        let report = parse_report(br#"{"is_active": true, "timestamp": 1700000000.25}"#).unwrap();
        assert!(report.is_active);
        assert_eq!(report.timestamp, 1_700_000_000.25);
    }

    #[test]
    fn test_integer_timestamp_accepted() {
        let report = parse_report(br#"{"is_active": false, "timestamp": 42}"#).unwrap();
        assert_eq!(report.timestamp, 42.0);
    }

    #[test]
    fn test_missing_fields() {
        let err = parse_report(br#"{"timestamp": 1.0}"#).unwrap_err();
        assert!(matches!(err, EngineError::MissingField(ref f) if f == "is_active"));

        let err = parse_report(br#"{"is_active": true}"#).unwrap_err();
        assert!(matches!(err, EngineError::MissingField(ref f) if f == "timestamp"));

        let err = parse_report(br#"{"is_active": null, "timestamp": 1.0}"#).unwrap_err();
        assert!(matches!(err, EngineError::MissingField(_)));
    }

    #[test]
    fn test_wrong_types_rejected() {
        assert!(matches!(
            parse_report(br#"{"is_active": "yes", "timestamp": 1.0}"#),
            Err(EngineError::InvalidReport(_))
        ));
        assert!(matches!(
            parse_report(br#"{"is_active": true, "timestamp": "noon"}"#),
            Err(EngineError::InvalidReport(_))
        ));
        assert!(matches!(
            parse_report(br#"[true, 1.0]"#),
            Err(EngineError::InvalidReport(_))
        ));
    }

    #[test]
    fn test_negative_timestamp_rejected() {
        assert!(parse_report(br#"{"is_active": true, "timestamp": -5}"#).is_err());
    }

    #[test]
    fn test_malformed_json() {
        let err = parse_report(b"not json").unwrap_err();
        assert!(matches!(err, EngineError::JsonError(_)));
        assert!(err.is_validation());
    }
}
