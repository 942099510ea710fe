//! Password hashing and stored identity records.
//!
//! Passwords are never stored. An account document keeps the SHA-256 of
//! the password as lowercase hex, and login compares hashes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::SessionError;

/// Hashes a password into 64 lowercase hex characters.
pub fn hash_password(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Returns `true` if `password` hashes to `expected_hash`.
pub fn verify_password(password: &str, expected_hash: &str) -> bool {
    hash_password(password) == expected_hash
}

/// An account as stored in the `Player` or `Developer` collection.
///
/// ```json
/// { "id": 1, "userName": "alice", "passwordHash": "5e88..." }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: u64,
    pub user_name: String,
    pub password_hash: String,
}

impl Identity {
    /// Parses a datastore document.
    pub fn from_document(doc: Value) -> Result<Self, SessionError> {
        serde_json::from_value(doc)
            .map_err(|e| SessionError::CorruptRecord(e.to_string()))
    }

    /// The fields safe to send back to a client.
    pub fn public_view(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "userName": self.user_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_known_vector() {
        // sha256("password")
        assert_eq!(
            hash_password("password"),
            "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8"
        );
    }

    #[test]
    fn test_verify_password_rejects_wrong_password() {
        let hash = hash_password("hunter2");
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
    }

    #[test]
    fn test_identity_from_document() {
        let doc = serde_json::json!({
            "id": 4,
            "userName": "alice",
            "passwordHash": "abc",
            "gamesPlayed": []
        });
        let identity = Identity::from_document(doc).unwrap();

        assert_eq!(identity.id, 4);
        assert_eq!(identity.user_name, "alice");
    }

    #[test]
    fn test_identity_missing_hash_is_corrupt() {
        let doc = serde_json::json!({"id": 4, "userName": "alice"});
        assert!(matches!(
            Identity::from_document(doc),
            Err(SessionError::CorruptRecord(_))
        ));
    }

    #[test]
    fn test_public_view_hides_hash() {
        let identity = Identity {
            id: 1,
            user_name: "a".into(),
            password_hash: "secret".into(),
        };
        let view = identity.public_view();
        assert!(view.get("passwordHash").is_none());
        assert_eq!(view["userName"], "a");
    }
}
