pub mod models;
pub mod translate;
pub mod wire;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use sqlx::AnyPool;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::RedmineConfig;
use crate::db::issues;
use crate::db::models::IssueRecord;
use crate::error::AppError;
use crate::redmine::models::{CreateIssueRequest, IssueResponse};
use crate::redmine::translate::IssueDefaults;
use crate::redmine::wire::{RedmineIssueRequest, RedmineResponse, UploadResponse};

pub const API_KEY_HEADER: &str = "X-Redmine-API-Key";

pub const FILE_TOO_LARGE_MESSAGE: &str =
    "This file cannot be uploaded because it exceeds the maximum allowed file size (5 MB)";

/// Who is calling, which decides the Redmine identity used for the call.
///
/// Request bodies and the `X-Client-Type` header share the same lenient parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum ClientType {
    EndUser,
    Registered,
    System,
}

impl ClientType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EndUser => "END_USER",
            Self::Registered => "REGISTERED",
            Self::System => "SYSTEM",
        }
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientType {
    type Err = TrackerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "END_USER" | "UNREGISTERED" => Ok(Self::EndUser),
            "REGISTERED" => Ok(Self::Registered),
            "SYSTEM" => Ok(Self::System),
            _ => Err(TrackerError::UnknownClientType(value.to_string())),
        }
    }
}

impl TryFrom<String> for ClientType {
    type Error = TrackerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub client_type: ClientType,
    pub client_id: String,
}

/// Redmine API keys per client classification, fixed at startup.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ApiKeys {
    keys: BTreeMap<ClientType, String>,
}

impl ApiKeys {
    pub fn builder() -> ApiKeysBuilder {
        ApiKeysBuilder::default()
    }

    pub fn key_for(&self, client_type: ClientType) -> Result<&str, TrackerError> {
        self.keys
            .get(&client_type)
            .map(String::as_str)
            .ok_or_else(|| TrackerError::UnknownClientType(client_type.as_str().to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClientType, &str)> {
        self.keys
            .iter()
            .map(|(client_type, key)| (*client_type, key.as_str()))
    }
}

impl fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.keys.keys()).finish()
    }
}

#[derive(Default)]
pub struct ApiKeysBuilder {
    keys: BTreeMap<ClientType, String>,
}

impl ApiKeysBuilder {
    pub fn bind(mut self, client_type: ClientType, key: &str) -> Self {
        self.keys.insert(client_type, key.trim().to_string());
        self
    }

    pub fn build(self) -> ApiKeys {
        ApiKeys { keys: self.keys }
    }
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("unknown client type: {0}")]
    UnknownClientType(String),

    #[error("redmine request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed redmine response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("redmine responded with status {0}")]
    Remote(StatusCode),

    #[error("local issue store failed: {0}")]
    Storage(#[from] AppError),
}

/// Outcome of a tracker call: always a status, sometimes a body.
#[derive(Debug)]
pub struct TrackerReply<T> {
    pub status: StatusCode,
    pub body: Option<T>,
}

impl<T> TrackerReply<T> {
    pub fn new(status: StatusCode, body: T) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }

    pub fn empty(status: StatusCode) -> Self {
        Self { status, body: None }
    }

    pub fn internal_error() -> Self {
        Self::empty(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl<T: Serialize> IntoResponse for TrackerReply<T> {
    fn into_response(self) -> Response {
        match self.body {
            Some(body) => (self.status, Json(body)).into_response(),
            None => self.status.into_response(),
        }
    }
}

#[derive(Clone)]
pub struct RedmineClient {
    http: reqwest::Client,
    base_url: String,
    api_keys: Arc<ApiKeys>,
    defaults: Arc<IssueDefaults>,
    db: AnyPool,
}

impl RedmineClient {
    pub fn new(config: &RedmineConfig, db: AnyPool) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("support-desk/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build redmine http client")?;

        Ok(Self {
            http,
            base_url: config.base_url().to_string(),
            api_keys: Arc::new(config.api_keys()),
            defaults: Arc::new(IssueDefaults {
                project_id: config.project_id,
                tracker_id: config.tracker_id,
                create_status_id: config.create_status_id,
                create_status_name: config.create_status_name.clone(),
                resolve_status_id: config.resolve_status_id,
                resolve_status_name: config.resolve_status_name.clone(),
            }),
            db,
        })
    }

    pub fn api_keys(&self) -> &ApiKeys {
        &self.api_keys
    }

    pub fn defaults(&self) -> &IssueDefaults {
        &self.defaults
    }

    /// Fetches an issue with its journals and attachments and merges it with
    /// the local record.
    pub async fn issue_with_journals(
        &self,
        issue_id: i64,
        client_type: ClientType,
        record: &IssueRecord,
    ) -> TrackerReply<IssueResponse> {
        match self.fetch_issue(issue_id, client_type).await {
            Ok(Fetched::Issue(status, response)) => {
                TrackerReply::new(status, translate::issue_response(&response.issue, record))
            }
            Ok(Fetched::Rejected(status)) => TrackerReply::empty(status),
            Err(error) => {
                error!(issue_id, error = ?error, "failed to fetch redmine issue");
                TrackerReply::internal_error()
            }
        }
    }

    /// Same request as [`Self::issue_with_journals`], returned in Redmine's own shape.
    pub async fn redmine_issue_with_journals(
        &self,
        issue_id: i64,
        client_type: ClientType,
    ) -> TrackerReply<RedmineResponse> {
        match self.fetch_issue(issue_id, client_type).await {
            Ok(Fetched::Issue(status, response)) => TrackerReply::new(status, response),
            Ok(Fetched::Rejected(status)) => TrackerReply::empty(status),
            Err(error) => {
                error!(issue_id, error = ?error, "failed to fetch redmine issue");
                TrackerReply::internal_error()
            }
        }
    }

    pub async fn create_issue(
        &self,
        request: &CreateIssueRequest,
        client: &ClientInfo,
    ) -> TrackerReply<IssueResponse> {
        match self.try_create_issue(request, client).await {
            Ok(reply) => reply,
            Err(error) => {
                error!(
                    client_type = %client.client_type,
                    error = ?error,
                    "failed to create redmine issue"
                );
                TrackerReply::new(StatusCode::INTERNAL_SERVER_ERROR, IssueResponse::default())
            }
        }
    }

    /// Pushes an update to Redmine. The local record changes only when the
    /// update resolves the issue, either through `resolved` or by moving it to
    /// the configured resolved status.
    pub async fn update_issue(
        &self,
        record: IssueRecord,
        payload: &RedmineIssueRequest,
        client: &ClientInfo,
        resolved: bool,
    ) -> TrackerReply<()> {
        let issue_id = record.issue_id;
        match self.try_update_issue(record, payload, client, resolved).await {
            Ok(status) => TrackerReply::empty(status),
            Err(error) => {
                error!(issue_id, error = ?error, "failed to update redmine issue");
                TrackerReply::internal_error()
            }
        }
    }

    pub async fn upload_file(
        &self,
        filename: &str,
        content: Vec<u8>,
        client_type: ClientType,
    ) -> TrackerReply<UploadResponse> {
        match self.try_upload_file(filename, content, client_type).await {
            Ok(reply) => reply,
            Err(error) => {
                error!(filename, error = ?error, "failed to upload file to redmine");
                TrackerReply::internal_error()
            }
        }
    }

    async fn fetch_issue(
        &self,
        issue_id: i64,
        client_type: ClientType,
    ) -> Result<Fetched, TrackerError> {
        let key = self.api_keys.key_for(client_type)?;
        let response = self
            .http
            .get(format!(
                "{}/issues/{issue_id}.json?include=journals,attachments",
                self.base_url
            ))
            .header(API_KEY_HEADER, key)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(issue_id, status = status.as_u16(), "redmine refused issue fetch");
            return Ok(Fetched::Rejected(status));
        }

        let body = response.bytes().await?;
        let parsed = serde_json::from_slice::<RedmineResponse>(&body)?;
        Ok(Fetched::Issue(status, parsed))
    }

    async fn try_create_issue(
        &self,
        request: &CreateIssueRequest,
        client: &ClientInfo,
    ) -> Result<TrackerReply<IssueResponse>, TrackerError> {
        let key = self.api_keys.key_for(client.client_type)?;
        let payload = translate::create_issue_request(request, &self.defaults);

        let response = self
            .http
            .post(format!("{}/issues.json", self.base_url))
            .header(API_KEY_HEADER, key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "redmine rejected issue creation");
            return Ok(TrackerReply::new(status, IssueResponse::default()));
        }

        let body = response.bytes().await?;
        let created = serde_json::from_slice::<RedmineResponse>(&body)?;

        let record = issues::insert_issue(
            &self.db,
            translate::new_issue_record(
                request,
                created.issue.id,
                &self.defaults.create_status_name,
                client.client_type.as_str(),
                &client.client_id,
            ),
        )
        .await?;

        info!(
            issue_id = created.issue.id,
            client_type = %client.client_type,
            "redmine issue created"
        );
        Ok(TrackerReply::new(
            StatusCode::CREATED,
            translate::issue_response(&created.issue, &record),
        ))
    }

    async fn try_update_issue(
        &self,
        mut record: IssueRecord,
        payload: &RedmineIssueRequest,
        client: &ClientInfo,
        resolved: bool,
    ) -> Result<StatusCode, TrackerError> {
        let key = self.api_keys.key_for(client.client_type)?;
        let resolved =
            resolved || payload.issue.status_id == Some(self.defaults.resolve_status_id);
        let response = self
            .http
            .put(format!("{}/issues/{}.json", self.base_url, record.issue_id))
            .header(API_KEY_HEADER, key)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                issue_id = record.issue_id,
                status = status.as_u16(),
                "redmine rejected issue update"
            );
            return Ok(status);
        }

        if resolved {
            record.status = self.defaults.resolve_status_name.clone();
            record.resolved_by = Some(client.client_id.clone());
            issues::save_issue(&self.db, &record).await?;
            info!(issue_id = record.issue_id, "redmine issue resolved");
        }

        Ok(StatusCode::NO_CONTENT)
    }

    async fn try_upload_file(
        &self,
        filename: &str,
        content: Vec<u8>,
        client_type: ClientType,
    ) -> Result<TrackerReply<UploadResponse>, TrackerError> {
        let key = self.api_keys.key_for(client_type)?;
        let response = self
            .http
            .post(format!("{}/uploads.json", self.base_url))
            .query(&[("filename", filename)])
            .header(API_KEY_HEADER, key)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(content)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            warn!(filename, "redmine refused upload as too large");
            return Ok(TrackerReply::new(
                status,
                UploadResponse::rejected(FILE_TOO_LARGE_MESSAGE),
            ));
        }

        if status.is_client_error() {
            warn!(filename, status = status.as_u16(), "redmine rejected upload");
            return Ok(TrackerReply::empty(status));
        }

        if !status.is_success() {
            return Err(TrackerError::Remote(status));
        }

        let body = response.bytes().await?;
        let upload = serde_json::from_slice::<UploadResponse>(&body)?;
        Ok(TrackerReply::new(StatusCode::OK, upload))
    }
}

enum Fetched {
    Issue(StatusCode, RedmineResponse),
    Rejected(StatusCode),
}
