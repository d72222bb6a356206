//! Messages exchanged on the log streaming socket

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogMessage {
    /// A formatted log line, stamped with local wall-clock time
    Log { message: String, timestamp: String },
    /// Server keep-alive probe, unix seconds
    Ping { timestamp: i64 },
    /// Client reply to a ping
    Pong {
        #[serde(default)]
        timestamp: Option<i64>,
    },
}

impl LogMessage {
    pub fn log(message: impl Into<String>) -> Self {
        LogMessage::Log {
            message: message.into(),
            timestamp: chrono::Local::now().format("%H:%M:%S").to_string(),
        }
    }

    pub fn ping() -> Self {
        LogMessage::Ping {
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_wire_format() {
        let json = serde_json::to_value(LogMessage::Log {
            message: "hello".into(),
            timestamp: "12:00:00".into(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"type": "log", "message": "hello", "timestamp": "12:00:00"}));
    }

    #[test]
    fn test_pong_parses_with_or_without_timestamp() {
        let pong: LogMessage = serde_json::from_str(r#"{"type":"pong","timestamp":1700000000}"#).unwrap();
        assert_eq!(pong, LogMessage::Pong { timestamp: Some(1_700_000_000) });

        let bare: LogMessage = serde_json::from_str(r#"{"type":"pong"}"#).unwrap();
        assert_eq!(bare, LogMessage::Pong { timestamp: None });
    }

    #[test]
    fn test_ping_carries_unix_timestamp() {
        match LogMessage::ping() {
            LogMessage::Ping { timestamp } => assert!(timestamp > 1_600_000_000),
            other => panic!("unexpected {:?}", other),
        }
    }
}
