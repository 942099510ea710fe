//! The datastore's request shape.
//!
//! ```json
//! { "collection": "Player", "action": "QUERY", "data": { "filter": { "userName": "alice" } } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::StoreError;

/// Collection of player identities.
pub const PLAYER: &str = "Player";
/// Collection of developer identities.
pub const DEVELOPER: &str = "Developer";
/// Collection of published game versions.
pub const GAME: &str = "Game";

/// Every collection the store keeps.
pub const COLLECTIONS: [&str; 3] = [PLAYER, DEVELOPER, GAME];

/// The three operations the store understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreAction {
    Create,
    Query,
    Delete,
}

/// One datastore call.
///
/// `data` is the document for `CREATE` and `{"filter": {...}}` for
/// `QUERY` and `DELETE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRequest {
    pub collection: String,
    pub action: StoreAction,
    #[serde(default)]
    pub data: Value,
}

impl StoreRequest {
    pub fn create(collection: &str, document: Value) -> Self {
        Self {
            collection: collection.into(),
            action: StoreAction::Create,
            data: document,
        }
    }

    pub fn query(collection: &str, filter: Value) -> Self {
        Self {
            collection: collection.into(),
            action: StoreAction::Query,
            data: json!({ "filter": filter }),
        }
    }

    pub fn delete(collection: &str, filter: Value) -> Self {
        Self {
            collection: collection.into(),
            action: StoreAction::Delete,
            data: json!({ "filter": filter }),
        }
    }

    /// Extracts the filter of a `QUERY`/`DELETE`.
    ///
    /// A missing or `null` filter matches every document.
    pub fn filter(&self) -> Result<Map<String, Value>, StoreError> {
        match self.data.get("filter") {
            None | Some(Value::Null) => Ok(Map::new()),
            Some(Value::Object(filter)) => Ok(filter.clone()),
            Some(other) => Err(StoreError::BadRequest(format!(
                "filter must be an object, got {other}"
            ))),
        }
    }
}

/// Exact-match conjunction: every filter key must be present in `doc`
/// with an equal value.
pub fn matches(doc: &Value, filter: &Map<String, Value>) -> bool {
    filter
        .iter()
        .all(|(key, expected)| doc.get(key) == Some(expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_request_json_format() {
        let req = StoreRequest::query(PLAYER, json!({"userName": "alice"}));
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["collection"], "Player");
        assert_eq!(json["action"], "QUERY");
        assert_eq!(json["data"]["filter"]["userName"], "alice");
    }

    #[test]
    fn test_filter_missing_matches_everything() {
        let req = StoreRequest {
            collection: GAME.into(),
            action: StoreAction::Query,
            data: Value::Null,
        };
        let filter = req.filter().unwrap();
        assert!(filter.is_empty());
        assert!(matches(&json!({"name": "x"}), &filter));
    }

    #[test]
    fn test_filter_rejects_non_object() {
        let req = StoreRequest::query(GAME, json!([1, 2]));
        assert!(matches!(req.filter(), Err(StoreError::BadRequest(_))));
    }

    #[test]
    fn test_matches_requires_every_key() {
        let doc = json!({"name": "Duel", "version": "1.0.0"});
        let hit = json!({"name": "Duel", "version": "1.0.0"});
        let miss = json!({"name": "Duel", "version": "2.0.0"});
        let absent = json!({"author": "dev"});

        assert!(matches(&doc, hit.as_object().unwrap()));
        assert!(!matches(&doc, miss.as_object().unwrap()));
        assert!(!matches(&doc, absent.as_object().unwrap()));
    }
}
