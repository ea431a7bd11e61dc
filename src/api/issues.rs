use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Deserialize;

use crate::api::ListQuery;
use crate::db::issues::{self, IssueFilters};
use crate::db::models::IssueRecord;
use crate::error::{AppError, AppResult};
use crate::redmine::models::{CreateIssueRequest, IssueResponse, UpdateIssueRequest};
use crate::redmine::wire::RedmineResponse;
use crate::redmine::{translate, ClientInfo, TrackerReply};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/issues", get(list_issues).post(create_issue))
        .route("/issues/{issue_id}", get(get_issue).put(update_issue))
        .route("/issues/{issue_id}/redmine", get(get_redmine_issue))
}

#[derive(Debug, Deserialize)]
struct IssueListQuery {
    limit: Option<i64>,
    offset: Option<i64>,
    raised_by: Option<String>,
    status: Option<String>,
}

async fn list_issues(
    State(state): State<AppState>,
    Query(query): Query<IssueListQuery>,
) -> AppResult<Json<Vec<IssueRecord>>> {
    let (limit, offset) = ListQuery {
        limit: query.limit,
        offset: query.offset,
    }
    .normalize()?;

    let records = issues::list_issues(
        &state.db,
        IssueFilters {
            raised_by: non_empty(query.raised_by),
            status: non_empty(query.status),
        },
        limit,
        offset,
    )
    .await?;

    Ok(Json(records))
}

async fn create_issue(
    State(state): State<AppState>,
    Extension(client): Extension<ClientInfo>,
    Json(payload): Json<CreateIssueRequest>,
) -> AppResult<TrackerReply<IssueResponse>> {
    payload.validate_for(&client)?;
    Ok(state.redmine.create_issue(&payload, &client).await)
}

async fn get_issue(
    State(state): State<AppState>,
    Extension(client): Extension<ClientInfo>,
    Path(issue_id): Path<i64>,
) -> AppResult<TrackerReply<IssueResponse>> {
    let record = issues::get_issue(&state.db, issue_id).await?;
    Ok(state
        .redmine
        .issue_with_journals(issue_id, client.client_type, &record)
        .await)
}

async fn get_redmine_issue(
    State(state): State<AppState>,
    Extension(client): Extension<ClientInfo>,
    Path(issue_id): Path<i64>,
) -> TrackerReply<RedmineResponse> {
    state
        .redmine
        .redmine_issue_with_journals(issue_id, client.client_type)
        .await
}

async fn update_issue(
    State(state): State<AppState>,
    Extension(client): Extension<ClientInfo>,
    Path(issue_id): Path<i64>,
    Json(payload): Json<UpdateIssueRequest>,
) -> AppResult<TrackerReply<()>> {
    let record = issues::get_issue(&state.db, issue_id).await?;
    let resolve = payload.resolves(state.redmine.defaults().resolve_status_id);

    if resolve && record.resolved_by.is_some() {
        return Err(AppError::Conflict(format!(
            "issue {issue_id} is already resolved"
        )));
    }

    let request = translate::update_issue_request(&payload, state.redmine.defaults());
    Ok(state
        .redmine
        .update_issue(record, &request, &client, resolve)
        .await)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
