//! Key encoding and decoding for the storage layer.
//!
//! Key formats:
//! - turns: `turn:{hex(session_id)}:{sequence:010}`
//! - summaries: `summary:{hex(session_id)}`
//! - snapshots: `snap:{ended_at_ms:013}:{hex(session_id)}`
//!
//! Session ids are caller-chosen strings and may contain anything, `:`
//! included, so they are stored hex-encoded. Zero padding keeps
//! lexicographic order equal to numeric order, so turn replay is a forward
//! prefix scan and "newest snapshots" is a reverse scan.

use crate::error::StorageError;

fn encode_session_id(session_id: &str) -> String {
    hex::encode(session_id.as_bytes())
}

fn decode_session_id(encoded: &str) -> Result<String, StorageError> {
    let bytes = hex::decode(encoded)
        .map_err(|e| StorageError::Key(format!("Invalid session id encoding: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| StorageError::Key(format!("Invalid session id UTF-8: {}", e)))
}

fn key_str(bytes: &[u8]) -> Result<&str, StorageError> {
    std::str::from_utf8(bytes).map_err(|e| StorageError::Key(format!("Invalid UTF-8: {}", e)))
}

/// Key for one entry in a session's turn log
/// Format: turn:{hex(session_id)}:{sequence:010}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnKey {
    /// Owning session
    pub session_id: String,
    /// Position of the turn within the session, starting at 0
    pub sequence: u32,
}

impl TurnKey {
    /// Create a turn key
    pub fn new(session_id: impl Into<String>, sequence: u32) -> Self {
        Self {
            session_id: session_id.into(),
            sequence,
        }
    }

    /// Prefix shared by every turn of a session
    pub fn session_prefix(session_id: &str) -> Vec<u8> {
        format!("turn:{}:", encode_session_id(session_id)).into_bytes()
    }

    /// Encode key to bytes for storage
    pub fn to_bytes(&self) -> Vec<u8> {
        format!(
            "turn:{}:{:010}",
            encode_session_id(&self.session_id),
            self.sequence
        )
        .into_bytes()
    }

    /// Decode key from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let s = key_str(bytes)?;
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 3 || parts[0] != "turn" {
            return Err(StorageError::Key(format!("Invalid turn key format: {}", s)));
        }
        let sequence: u32 = parts[2]
            .parse()
            .map_err(|e| StorageError::Key(format!("Invalid sequence: {}", e)))?;
        Ok(Self::new(decode_session_id(parts[1])?, sequence))
    }
}

/// Key for the latest summary of a session
/// Format: summary:{hex(session_id)}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryKey {
    pub session_id: String,
}

impl SummaryKey {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format!("summary:{}", encode_session_id(&self.session_id)).into_bytes()
    }
}

/// Key for a write-once session snapshot
/// Format: snap:{ended_at_ms:013}:{hex(session_id)}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotKey {
    /// Session end time in milliseconds since Unix epoch
    pub ended_at_ms: i64,
    /// Session the snapshot belongs to
    pub session_id: String,
}

impl SnapshotKey {
    /// Create a snapshot key
    pub fn new(ended_at_ms: i64, session_id: impl Into<String>) -> Result<Self, StorageError> {
        if ended_at_ms < 0 {
            return Err(StorageError::Key(format!(
                "Negative snapshot timestamp: {}",
                ended_at_ms
            )));
        }
        Ok(Self {
            ended_at_ms,
            session_id: session_id.into(),
        })
    }

    /// Encode key to bytes for storage
    pub fn to_bytes(&self) -> Vec<u8> {
        format!(
            "snap:{:013}:{}",
            self.ended_at_ms,
            encode_session_id(&self.session_id)
        )
        .into_bytes()
    }

    /// Decode key from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let s = key_str(bytes)?;
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 3 || parts[0] != "snap" {
            return Err(StorageError::Key(format!(
                "Invalid snapshot key format: {}",
                s
            )));
        }
        let ended_at_ms: i64 = parts[1]
            .parse()
            .map_err(|e| StorageError::Key(format!("Invalid timestamp: {}", e)))?;
        Self::new(ended_at_ms, decode_session_id(parts[2])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_key_roundtrip() {
        let key = TurnKey::new("session-1", 42);
        let bytes = key.to_bytes();
        assert_eq!(bytes, b"turn:73657373696f6e2d31:0000000042".to_vec());
        assert_eq!(TurnKey::from_bytes(&bytes).unwrap(), key);
    }

    #[test]
    fn test_turn_keys_sort_by_sequence() {
        let k9 = TurnKey::new("s", 9).to_bytes();
        let k10 = TurnKey::new("s", 10).to_bytes();
        assert!(k9 < k10);
    }

    #[test]
    fn test_session_ids_with_separators() {
        let turn = TurnKey::new("user:42", 3);
        assert_eq!(TurnKey::from_bytes(&turn.to_bytes()).unwrap(), turn);

        let snapshot = SnapshotKey::new(7, "team:a:b").unwrap();
        let decoded = SnapshotKey::from_bytes(&snapshot.to_bytes()).unwrap();
        assert_eq!(decoded.session_id, "team:a:b");

        let empty = TurnKey::new("", 0);
        assert_eq!(TurnKey::from_bytes(&empty.to_bytes()).unwrap(), empty);

        // A session whose id is a prefix of another never shares its turns
        assert!(!TurnKey::new("user:420", 0)
            .to_bytes()
            .starts_with(&TurnKey::session_prefix("user:42")));
    }

    #[test]
    fn test_malformed_keys_rejected() {
        assert!(TurnKey::from_bytes(b"turn:zz:0000000001").is_err());
        assert!(SnapshotKey::from_bytes(b"snap:notatime:61").is_err());
        assert!(SnapshotKey::new(-1, "a").is_err());
    }

    #[test]
    fn test_snapshot_keys_sort_by_time() {
        let older = SnapshotKey::new(1_700_000_000_000, "zzz").unwrap().to_bytes();
        let newer = SnapshotKey::new(1_700_000_000_001, "aaa").unwrap().to_bytes();
        assert!(older < newer);

        let decoded = SnapshotKey::from_bytes(&newer).unwrap();
        assert_eq!(decoded.session_id, "aaa");
        assert_eq!(decoded.ended_at_ms, 1_700_000_000_001);
    }
}
