//! Singer Message Decoding
//!
//! Only the `RECORD` message type is accepted on input. Every other type
//! (SCHEMA, STATE, ACTIVATE_VERSION, ...) is a protocol violation for this
//! target. Output is limited to `STATE` progress messages.
//!
//! The `record` payload is never interpreted: it is re-serialized to compact
//! JSON with its original key order and persisted as-is.

use serde::Serialize;
use serde_json::Value;

/// The only input message type this target accepts
pub const RECORD_TYPE: &str = "RECORD";

/// Why an input line was rejected
#[derive(Debug)]
pub enum DecodeError {
    /// Line is not a JSON object
    Malformed {
        line: String,
        source: Option<serde_json::Error>,
    },
    /// Line has no `type` key
    MissingType { line: String },
    /// `type` is anything other than `"RECORD"`
    UnsupportedType { line: String, message_type: String },
    /// RECORD line without a string `stream` key
    MissingStream { line: String },
    /// RECORD line without a `record` key
    MissingRecord { line: String },
}

impl DecodeError {
    /// The offending input line
    pub fn line(&self) -> &str {
        match self {
            DecodeError::Malformed { line, .. }
            | DecodeError::MissingType { line }
            | DecodeError::UnsupportedType { line, .. }
            | DecodeError::MissingStream { line }
            | DecodeError::MissingRecord { line } => line,
        }
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Malformed {
                line,
                source: Some(e),
            } => write!(f, "Unable to parse ({}): {}", e, line),
            DecodeError::Malformed { line, source: None } => {
                write!(f, "Line is not a JSON object: {}", line)
            }
            DecodeError::MissingType { line } => {
                write!(f, "Line is missing required key 'type': {}", line)
            }
            DecodeError::UnsupportedType { line, message_type } => write!(
                f,
                "Only \"RECORD\" messages are supported, got type {}: {}",
                message_type, line
            ),
            DecodeError::MissingStream { line } => {
                write!(f, "Line is missing required key 'stream': {}", line)
            }
            DecodeError::MissingRecord { line } => {
                write!(f, "Line is missing required key 'record': {}", line)
            }
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Malformed { source: Some(e), .. } => Some(e),
            _ => None,
        }
    }
}

/// A validated RECORD message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMessage {
    /// Stream name, used as the object key prefix
    pub stream: String,
    /// Compact JSON text of the `record` field
    pub payload: String,
}

/// Decode and validate one input line
pub fn decode_line(line: &str) -> Result<RecordMessage, DecodeError> {
    let value: Value = serde_json::from_str(line).map_err(|e| DecodeError::Malformed {
        line: line.to_string(),
        source: Some(e),
    })?;

    let Value::Object(mut message) = value else {
        return Err(DecodeError::Malformed {
            line: line.to_string(),
            source: None,
        });
    };

    match message.get("type") {
        None => {
            return Err(DecodeError::MissingType {
                line: line.to_string(),
            })
        }
        Some(Value::String(t)) if t == RECORD_TYPE => {}
        Some(other) => {
            return Err(DecodeError::UnsupportedType {
                line: line.to_string(),
                message_type: other.to_string(),
            })
        }
    }

    let stream = match message.get("stream") {
        Some(Value::String(stream)) => stream.clone(),
        _ => {
            return Err(DecodeError::MissingStream {
                line: line.to_string(),
            })
        }
    };

    let record = message
        .remove("record")
        .ok_or_else(|| DecodeError::MissingRecord {
            line: line.to_string(),
        })?;

    Ok(RecordMessage {
        stream,
        payload: record.to_string(),
    })
}

/// Body of a STATE message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateValue {
    /// Cumulative records durably written for `stream`
    pub count: u64,
    pub stream: String,
}

/// Progress acknowledgement emitted after every flush
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateMessage {
    #[serde(rename = "type")]
    message_type: &'static str,
    pub value: StateValue,
}

impl StateMessage {
    pub fn new(stream: impl Into<String>, count: u64) -> Self {
        StateMessage {
            message_type: "STATE",
            value: StateValue {
                count,
                stream: stream.into(),
            },
        }
    }

    /// Serialize to a single JSON line (without the trailing newline)
    pub fn to_line(&self) -> String {
        // Only strings and integers: serialization cannot fail
        serde_json::to_string(self).expect("STATE message must serialize")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_record() {
        let msg = decode_line(r#"{"type":"RECORD","stream":"users","record":{"id":1}}"#).unwrap();
        assert_eq!(msg.stream, "users");
        assert_eq!(msg.payload, r#"{"id":1}"#);
    }

    #[test]
    fn test_payload_preserves_key_order_and_nesting() {
        let msg = decode_line(
            r#"{"type": "RECORD", "stream": "s", "record": {"z": 1, "a": {"y": [1, "two", null]}, "m": 2.5}}"#,
        )
        .unwrap();
        assert_eq!(msg.payload, r#"{"z":1,"a":{"y":[1,"two",null]},"m":2.5}"#);
    }

    #[test]
    fn test_numbers_keep_their_exact_text() {
        let msg = decode_line(
            r#"{"type":"RECORD","stream":"s","record":{"id":12345678901234567890123,"neg":-98765432109876543210,"p":0.1000000000000000055511151231257827}}"#,
        )
        .unwrap();
        assert_eq!(
            msg.payload,
            r#"{"id":12345678901234567890123,"neg":-98765432109876543210,"p":0.1000000000000000055511151231257827}"#
        );

        let msg = decode_line(r#"{"type":"RECORD","stream":"s","record":18446744073709551616}"#)
            .unwrap();
        assert_eq!(msg.payload, "18446744073709551616");
    }

    #[test]
    fn test_scalar_and_list_payloads() {
        let msg = decode_line(r#"{"type":"RECORD","stream":"s","record":42}"#).unwrap();
        assert_eq!(msg.payload, "42");

        let msg = decode_line(r#"{"type":"RECORD","stream":"s","record":[1,2]}"#).unwrap();
        assert_eq!(msg.payload, "[1,2]");

        let msg = decode_line(r#"{"type":"RECORD","stream":"s","record":null}"#).unwrap();
        assert_eq!(msg.payload, "null");
    }

    #[test]
    fn test_extra_keys_ignored() {
        let msg = decode_line(
            r#"{"type":"RECORD","stream":"s","record":{"x":1},"time_extracted":"2024-01-01T00:00:00Z","version":3}"#,
        )
        .unwrap();
        assert_eq!(msg.payload, r#"{"x":1}"#);
    }

    #[test]
    fn test_malformed() {
        let err = decode_line("not-json").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { source: Some(_), .. }));
        assert_eq!(err.line(), "not-json");

        let err = decode_line("").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { .. }));
    }

    #[test]
    fn test_non_object_is_malformed() {
        let err = decode_line("[1,2,3]").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { source: None, .. }));
    }

    #[test]
    fn test_missing_type() {
        let err = decode_line(r#"{"stream":"s","record":{}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingType { .. }));
        assert!(err.to_string().contains(r#"{"stream":"s","record":{}}"#));
    }

    #[test]
    fn test_unsupported_types() {
        for line in [
            r#"{"type":"SCHEMA","stream":"s","schema":{},"key_properties":[]}"#,
            r#"{"type":"STATE","value":{}}"#,
            r#"{"type":"record","stream":"s","record":{}}"#,
            r#"{"type":1,"stream":"s","record":{}}"#,
        ] {
            let err = decode_line(line).unwrap_err();
            assert!(
                matches!(err, DecodeError::UnsupportedType { .. }),
                "{} should be unsupported",
                line
            );
            assert!(err.to_string().ends_with(line), "{}", err);
        }
    }

    #[test]
    fn test_unsupported_type_message_names_type_and_line() {
        let line = r#"{"type":"SCHEMA","stream":"s","schema":{}}"#;
        let err = decode_line(line).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "Only \"RECORD\" messages are supported, got type \"SCHEMA\": {}",
                line
            )
        );
    }

    #[test]
    fn test_missing_stream() {
        let err = decode_line(r#"{"type":"RECORD","record":{"x":1}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingStream { .. }));

        let err = decode_line(r#"{"type":"RECORD","stream":7,"record":{"x":1}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingStream { .. }));
    }

    #[test]
    fn test_missing_record() {
        let err = decode_line(r#"{"type":"RECORD","stream":"s"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingRecord { .. }));
    }

    #[test]
    fn test_state_message_line() {
        let state = StateMessage::new("users", 2);
        assert_eq!(
            state.to_line(),
            r#"{"type":"STATE","value":{"count":2,"stream":"users"}}"#
        );
    }
}
