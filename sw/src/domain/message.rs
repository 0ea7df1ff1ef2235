//! Outbound control message sent to a newly installed worker

use serde::{Deserialize, Serialize};

/// "Take over now" instruction
///
/// Serializes to exactly `{"updateServiceWorker":true}`. What the worker does
/// with it is up to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    #[serde(rename = "updateServiceWorker")]
    pub update_service_worker: bool,
}

impl ControlMessage {
    /// The take-over instruction
    pub fn take_over() -> Self {
        Self {
            update_service_worker: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_string(&ControlMessage::take_over()).unwrap();
        assert_eq!(json, r#"{"updateServiceWorker":true}"#);
    }

    #[test]
    fn test_parse_from_wire() {
        let msg: ControlMessage = serde_json::from_str(r#"{"updateServiceWorker": true}"#).unwrap();
        assert_eq!(msg, ControlMessage::take_over());
    }
}
