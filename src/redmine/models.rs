use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::redmine::wire::{RedmineAttachment, RedmineJournal};
use crate::redmine::{ClientInfo, ClientType};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttachmentRequest {
    pub token: String,
    pub filename: String,
    pub content_type: Option<String>,
}

/// A new support ticket as submitted by a caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateIssueRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub mobile_number: Option<String>,
    pub email_address: Option<String>,
    pub category: Option<String>,
    pub subject: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentRequest>,
    pub user_id: Option<String>,
    pub user_type: Option<ClientType>,
    pub raised_by: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub private_notes: bool,
    pub is_private: Option<bool>,
}

impl CreateIssueRequest {
    /// The identity headers are authoritative; the body may only repeat them.
    pub fn validate_for(&self, client: &ClientInfo) -> AppResult<()> {
        if self.subject.trim().is_empty() {
            return Err(AppError::BadRequest("subject cannot be empty".to_string()));
        }

        if let Some(user_type) = self.user_type {
            if user_type != client.client_type {
                return Err(AppError::BadRequest(format!(
                    "user_type '{}' does not match X-Client-Type '{}'",
                    user_type.as_str(),
                    client.client_type.as_str()
                )));
            }
        }

        if let Some(raised_by) = self.raised_by.as_deref() {
            if raised_by != client.client_id {
                return Err(AppError::BadRequest(
                    "raised_by does not match X-Client-Id".to_string(),
                ));
            }
        }

        for attachment in &self.attachments {
            if attachment.token.trim().is_empty() || attachment.filename.trim().is_empty() {
                return Err(AppError::BadRequest(
                    "attachments require a token and a filename".to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateIssueRequest {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub private_notes: bool,
    pub status_id: Option<i64>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRequest>,
    #[serde(default)]
    pub resolve: bool,
}

impl UpdateIssueRequest {
    /// True when the update would move the issue to the resolved status.
    pub fn resolves(&self, resolve_status_id: i64) -> bool {
        self.resolve || self.status_id == Some(resolve_status_id)
    }
}

/// Remote issue content merged with the locally tracked workflow fields.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IssueResponse {
    pub id: Option<i64>,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub project: Option<String>,
    pub tracker: Option<String>,
    pub priority: Option<String>,
    pub author: Option<String>,
    pub redmine_status: Option<String>,
    pub status: Option<String>,
    pub is_private: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub mobile_number: Option<String>,
    pub email_address: Option<String>,
    pub category: Option<String>,
    pub user_id: Option<String>,
    pub user_type: Option<String>,
    pub raised_by: Option<String>,
    pub resolved_by: Option<String>,
    pub created_on: Option<String>,
    pub updated_on: Option<String>,
    pub closed_on: Option<String>,
    pub journals: Vec<RedmineJournal>,
    pub attachments: Vec<RedmineAttachment>,
}
