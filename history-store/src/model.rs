//! Wire/document shape of a persisted session record (§3).

use llm_client::Report;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dialog {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct History {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// The originating chat session. Carries the store's uniqueness
    /// constraint (see the store's index setup) so an at-least-once
    /// redelivery can't double-insert.
    pub session_id: String,
    pub name: String,
    pub class: String,
    pub student_id: String,
    pub dialogs: Vec<Dialog>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<Report>,
    pub start_time: i64,
    pub end_time: i64,
}

impl History {
    pub fn new(
        session_id: impl Into<String>,
        name: impl Into<String>,
        class: impl Into<String>,
        student_id: impl Into<String>,
        dialogs: Vec<Dialog>,
        start_time: i64,
        end_time: i64,
    ) -> Self {
        Self {
            id: None,
            session_id: session_id.into(),
            name: name.into(),
            class: class.into(),
            student_id: student_id.into(),
            dialogs,
            report: None,
            start_time,
            end_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_omitted_when_dialogs_empty() {
        let history = History::new("sid-1", "Alice", "3A", "S-1", vec![], 100, 200);
        let json = serde_json::to_value(&history).unwrap();
        assert!(json.get("report").is_none());
    }

    #[test]
    fn id_field_serializes_as_mongo_underscore_id() {
        let history = History::new("sid-1", "Alice", "3A", "S-1", vec![], 100, 200);
        let json = serde_json::to_value(&history).unwrap();
        assert!(json.get("_id").is_none());
        assert!(json.get("id").is_none());
    }
}
