//! Pure mappings between the support desk's own shapes and Redmine's.

use crate::db::issues::NewIssueInput;
use crate::db::models::IssueRecord;
use crate::redmine::models::{
    AttachmentRequest, CreateIssueRequest, IssueResponse, UpdateIssueRequest,
};
use crate::redmine::wire::{
    NamedRef, RedmineIssue, RedmineIssuePayload, RedmineIssueRequest, RedmineUpload,
};

/// Process-wide Redmine constants merged into every outbound issue.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueDefaults {
    pub project_id: i64,
    pub tracker_id: i64,
    pub create_status_id: i64,
    pub create_status_name: String,
    pub resolve_status_id: i64,
    pub resolve_status_name: String,
}

pub fn create_issue_request(
    request: &CreateIssueRequest,
    defaults: &IssueDefaults,
) -> RedmineIssueRequest {
    RedmineIssueRequest {
        issue: RedmineIssuePayload {
            project_id: Some(defaults.project_id),
            tracker_id: Some(defaults.tracker_id),
            status_id: Some(defaults.create_status_id),
            subject: Some(request.subject.trim().to_string()),
            description: Some(request.description.clone()),
            notes: non_blank(request.notes.as_deref()),
            private_notes: Some(request.private_notes),
            is_private: request.is_private,
            uploads: uploads(&request.attachments),
        },
    }
}

/// A resolving update always moves the issue to the configured resolved status,
/// whatever status the caller asked for.
pub fn update_issue_request(
    request: &UpdateIssueRequest,
    defaults: &IssueDefaults,
) -> RedmineIssueRequest {
    let status_id = if request.resolve {
        Some(defaults.resolve_status_id)
    } else {
        request.status_id
    };

    let notes = non_blank(request.notes.as_deref());

    RedmineIssueRequest {
        issue: RedmineIssuePayload {
            status_id,
            subject: non_blank(request.subject.as_deref()),
            description: request.description.clone(),
            private_notes: notes.as_ref().map(|_| request.private_notes),
            notes,
            uploads: uploads(&request.attachments),
            ..RedmineIssuePayload::default()
        },
    }
}

pub fn new_issue_record(
    request: &CreateIssueRequest,
    issue_id: i64,
    status_name: &str,
    client_type: &str,
    client_id: &str,
) -> NewIssueInput {
    NewIssueInput {
        issue_id,
        first_name: request.first_name.clone(),
        last_name: request.last_name.clone(),
        mobile_number: request.mobile_number.clone(),
        email_address: request.email_address.clone(),
        category: request.category.clone(),
        subject: request.subject.trim().to_string(),
        user_id: request.user_id.clone(),
        user_type: client_type.to_string(),
        raised_by: client_id.to_string(),
        status: status_name.to_string(),
        is_private: request.is_private.unwrap_or(false),
    }
}

/// Content comes from Redmine; workflow metadata (status, raiser, resolver)
/// comes from the local record.
pub fn issue_response(issue: &RedmineIssue, record: &IssueRecord) -> IssueResponse {
    IssueResponse {
        id: Some(issue.id),
        subject: issue.subject.clone().or_else(|| Some(record.subject.clone())),
        description: issue.description.clone(),
        project: ref_name(issue.project.as_ref()),
        tracker: ref_name(issue.tracker.as_ref()),
        priority: ref_name(issue.priority.as_ref()),
        author: ref_name(issue.author.as_ref()),
        redmine_status: ref_name(issue.status.as_ref()),
        status: Some(record.status.clone()),
        is_private: issue.is_private,
        first_name: record.first_name.clone(),
        last_name: record.last_name.clone(),
        mobile_number: record.mobile_number.clone(),
        email_address: record.email_address.clone(),
        category: record.category.clone(),
        user_id: record.user_id.clone(),
        user_type: Some(record.user_type.clone()),
        raised_by: Some(record.raised_by.clone()),
        resolved_by: record.resolved_by.clone(),
        created_on: issue.created_on.clone(),
        updated_on: issue.updated_on.clone(),
        closed_on: issue.closed_on.clone(),
        journals: issue.journals.clone(),
        attachments: issue.attachments.clone(),
    }
}

fn uploads(attachments: &[AttachmentRequest]) -> Vec<RedmineUpload> {
    attachments
        .iter()
        .map(|attachment| RedmineUpload {
            token: attachment.token.clone(),
            filename: attachment.filename.clone(),
            content_type: attachment
                .content_type
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToOwned::to_owned)
                .unwrap_or_else(|| guess_mime_type(&attachment.filename)),
        })
        .collect()
}

fn guess_mime_type(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

fn ref_name(value: Option<&NamedRef>) -> Option<String> {
    value.map(|named| named.name.clone())
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .filter(|text| !text.trim().is_empty())
        .map(ToOwned::to_owned)
}
