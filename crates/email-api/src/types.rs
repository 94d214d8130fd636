//! Backend payload types.

use serde::{Deserialize, Serialize};

/// One email row in the categorized snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSummary {
    /// Backend row ID.
    pub id: String,
    /// Gmail message ID (the key used for delete/unsubscribe/detail calls).
    pub gmail_message_id: String,
    /// Subject line.
    pub subject: String,
    /// AI-generated summary.
    pub summary: String,
    /// When the email was received.
    pub received_at: String,
    /// Owning category, if categorized.
    pub category_id: Option<String>,
}

/// Full detail for a single email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailDetail {
    pub user_id: String,
    pub gmail_message_id: String,
    pub thread_id: String,
    pub subject: String,
    pub body: String,
    pub received_at: String,
    pub archived: bool,
    pub unsubscribe_link: Option<String>,
    pub ai_summary: String,
    pub unsubscribed: bool,
    pub category_name: Option<String>,
    pub category_description: Option<String>,
}

/// A user-defined email category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created_at: String,
}

/// Request body for creating a category.
#[derive(Debug, Clone, Serialize)]
pub struct NewCategory {
    pub name: String,
    pub description: String,
}

/// A mailbox account linked to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedAccount {
    pub email: String,
    pub created_at: String,
}

/// Request body for the batch delete endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct DeleteEmailsRequest {
    pub gmail_message_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_summary_deserialization() {
        let json = r#"{
            "id": "42",
            "gmail_message_id": "msg-1",
            "subject": "Hello",
            "summary": "A greeting",
            "received_at": "2025-05-01T10:00:00Z",
            "category_id": null
        }"#;

        let email: EmailSummary = serde_json::from_str(json).unwrap();
        assert_eq!(email.gmail_message_id, "msg-1");
        assert!(email.category_id.is_none());
    }

    #[test]
    fn test_category_roundtrip() {
        let category = Category {
            id: "cat-1".to_string(),
            name: "Newsletters".to_string(),
            description: "Bulk mail".to_string(),
            created_at: "2025-05-01T10:00:00Z".to_string(),
        };

        let json = serde_json::to_string(&category).unwrap();
        let parsed: Category = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.name, "Newsletters");
    }

    #[test]
    fn test_delete_request_serialization() {
        let request = DeleteEmailsRequest {
            gmail_message_ids: vec!["m1".to_string(), "m2".to_string()],
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"gmail_message_ids":["m1","m2"]}"#);
    }

    #[test]
    fn test_email_detail_deserialization() {
        let json = r#"{
            "user_id": "user-1",
            "gmail_message_id": "msg-1",
            "thread_id": "thread-1",
            "subject": "Receipt",
            "body": "<html></html>",
            "received_at": "2025-05-01T10:00:00Z",
            "archived": false,
            "unsubscribe_link": "https://example.com/unsub",
            "ai_summary": "A receipt",
            "unsubscribed": false,
            "category_name": "Receipts",
            "category_description": "Purchases"
        }"#;

        let detail: EmailDetail = serde_json::from_str(json).unwrap();
        assert_eq!(detail.thread_id, "thread-1");
        assert_eq!(detail.unsubscribe_link.as_deref(), Some("https://example.com/unsub"));
    }
}
