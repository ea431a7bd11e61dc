//! JSON shapes mandated by the Redmine REST API.
//!
//! Responses are decoded leniently: unknown fields are ignored and anything
//! Redmine omits falls back to its default.

use serde::{Deserialize, Serialize};

/// Body of `POST /issues.json` and `PUT /issues/{id}.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RedmineIssueRequest {
    pub issue: RedmineIssuePayload,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RedmineIssuePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracker_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_notes: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub uploads: Vec<RedmineUpload>,
}

/// Reference to a previously uploaded file, attached on create/update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedmineUpload {
    pub token: String,
    pub filename: String,
    pub content_type: String,
}

/// Envelope returned by `GET /issues/{id}.json` and `POST /issues.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedmineResponse {
    pub issue: RedmineIssue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedmineIssue {
    pub id: i64,
    pub project: Option<NamedRef>,
    pub tracker: Option<NamedRef>,
    pub status: Option<NamedRef>,
    pub priority: Option<NamedRef>,
    pub author: Option<NamedRef>,
    pub assigned_to: Option<NamedRef>,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<String>,
    pub done_ratio: Option<i64>,
    pub is_private: bool,
    pub created_on: Option<String>,
    pub updated_on: Option<String>,
    pub closed_on: Option<String>,
    pub journals: Vec<RedmineJournal>,
    pub attachments: Vec<RedmineAttachment>,
}

/// The `{"id": .., "name": ..}` pairs Redmine uses for every association.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamedRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedmineJournal {
    pub id: i64,
    pub user: Option<NamedRef>,
    pub notes: Option<String>,
    pub created_on: Option<String>,
    pub private_notes: bool,
    pub details: Vec<RedmineJournalDetail>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedmineJournalDetail {
    pub property: String,
    pub name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedmineAttachment {
    pub id: i64,
    pub filename: String,
    pub filesize: i64,
    pub content_type: Option<String>,
    pub description: Option<String>,
    pub content_url: Option<String>,
    pub author: Option<NamedRef>,
    pub created_on: Option<String>,
}

/// Envelope returned by `POST /uploads.json`.
///
/// `message` never comes from Redmine; it carries the explanation attached
/// when an upload is refused for size.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub upload: UploadData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl UploadResponse {
    pub fn rejected(message: &str) -> Self {
        Self {
            upload: UploadData {
                message: Some(message.to_string()),
                ..UploadData::default()
            },
        }
    }
}
