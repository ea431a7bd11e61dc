use chrono::{SecondsFormat, Utc};
use sqlx::query_builder::QueryBuilder;
use sqlx::{Any, AnyPool};
use uuid::Uuid;

use crate::db::models::IssueRecord;
use crate::error::{AppError, AppResult};

const ISSUE_COLUMNS: &str = r#"
    id,
    issue_id,
    first_name,
    last_name,
    mobile_number,
    email_address,
    category,
    subject,
    user_id,
    user_type,
    raised_by,
    status,
    resolved_by,
    is_private,
    created_at,
    updated_at
"#;

#[derive(Debug, Clone, PartialEq)]
pub struct NewIssueInput {
    pub issue_id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub mobile_number: Option<String>,
    pub email_address: Option<String>,
    pub category: Option<String>,
    pub subject: String,
    pub user_id: Option<String>,
    pub user_type: String,
    pub raised_by: String,
    pub status: String,
    pub is_private: bool,
}

#[derive(Debug, Clone, Default)]
pub struct IssueFilters {
    pub raised_by: Option<String>,
    pub status: Option<String>,
}

pub async fn insert_issue(pool: &AnyPool, input: NewIssueInput) -> AppResult<IssueRecord> {
    if input.issue_id <= 0 {
        return Err(AppError::BadRequest(format!(
            "invalid redmine issue id {}",
            input.issue_id
        )));
    }

    let id = Uuid::new_v4().to_string();
    let now = now_timestamp();

    sqlx::query(
        r#"
        INSERT INTO issues (
            id,
            issue_id,
            first_name,
            last_name,
            mobile_number,
            email_address,
            category,
            subject,
            user_id,
            user_type,
            raised_by,
            status,
            resolved_by,
            is_private,
            created_at,
            updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(input.issue_id)
    .bind(input.first_name)
    .bind(input.last_name)
    .bind(input.mobile_number)
    .bind(input.email_address)
    .bind(input.category)
    .bind(input.subject)
    .bind(input.user_id)
    .bind(input.user_type)
    .bind(input.raised_by)
    .bind(input.status)
    .bind(i64::from(input.is_private))
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    get_issue(pool, input.issue_id).await
}

pub async fn find_issue(pool: &AnyPool, issue_id: i64) -> AppResult<Option<IssueRecord>> {
    let issue = sqlx::query_as::<Any, IssueRecord>(&format!(
        "SELECT {ISSUE_COLUMNS} FROM issues WHERE issue_id = ?"
    ))
    .bind(issue_id)
    .fetch_optional(pool)
    .await?;

    Ok(issue)
}

pub async fn get_issue(pool: &AnyPool, issue_id: i64) -> AppResult<IssueRecord> {
    find_issue(pool, issue_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("issue {issue_id} not found")))
}

/// Persists the mutable workflow fields of an existing record.
///
/// The remote id and the raiser are fixed at creation and never rewritten.
pub async fn save_issue(pool: &AnyPool, issue: &IssueRecord) -> AppResult<IssueRecord> {
    let result = sqlx::query(
        r#"
        UPDATE issues
        SET status = ?, resolved_by = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&issue.status)
    .bind(issue.resolved_by.as_deref())
    .bind(now_timestamp())
    .bind(&issue.id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "issue {} not found",
            issue.issue_id
        )));
    }

    get_issue(pool, issue.issue_id).await
}

pub async fn list_issues(
    pool: &AnyPool,
    filters: IssueFilters,
    limit: i64,
    offset: i64,
) -> AppResult<Vec<IssueRecord>> {
    let mut query = QueryBuilder::<Any>::new(format!(
        "SELECT {ISSUE_COLUMNS} FROM issues WHERE 1 = 1"
    ));

    if let Some(raised_by) = filters.raised_by {
        query.push(" AND raised_by = ");
        query.push_bind(raised_by);
    }

    if let Some(status) = filters.status {
        query.push(" AND status = ");
        query.push_bind(status);
    }

    query.push(" ORDER BY created_at DESC, issue_id DESC LIMIT ");
    query.push_bind(limit);
    query.push(" OFFSET ");
    query.push_bind(offset);

    let issues = query
        .build_query_as::<IssueRecord>()
        .fetch_all(pool)
        .await?;
    Ok(issues)
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use sqlx::AnyPool;
    use tempfile::tempdir;

    use crate::db;
    use crate::db::issues::{self, IssueFilters, NewIssueInput};
    use crate::error::AppError;

    async fn setup_db(db_name: &str) -> (tempfile::TempDir, AnyPool) {
        let temp_dir = tempdir().expect("tempdir should be created");
        let db_path = temp_dir.path().join(format!("{db_name}.db"));
        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = db::connect_and_migrate(&db_url)
            .await
            .expect("database should initialize");
        (temp_dir, pool)
    }

    fn new_issue(issue_id: i64, raised_by: &str) -> NewIssueInput {
        NewIssueInput {
            issue_id,
            first_name: Some("Ada".to_string()),
            last_name: None,
            mobile_number: Some("+15550100".to_string()),
            email_address: None,
            category: Some("billing".to_string()),
            subject: "cannot log in".to_string(),
            user_id: Some("u-1".to_string()),
            user_type: "END_USER".to_string(),
            raised_by: raised_by.to_string(),
            status: "New".to_string(),
            is_private: true,
        }
    }

    #[tokio::test]
    async fn inserted_issue_can_be_found_by_remote_id() {
        let (_temp_dir, pool) = setup_db("insert-test").await;

        let created = issues::insert_issue(&pool, new_issue(42, "15550100"))
            .await
            .expect("issue should be inserted");
        assert_eq!(created.issue_id, 42);
        assert_eq!(created.status, "New");
        assert_eq!(created.is_private, 1);
        assert!(created.resolved_by.is_none());

        let found = issues::find_issue(&pool, 42)
            .await
            .expect("lookup should succeed")
            .expect("issue should exist");
        assert_eq!(found, created);

        let missing = issues::find_issue(&pool, 43)
            .await
            .expect("lookup should succeed");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn duplicate_remote_id_is_a_conflict() {
        let (_temp_dir, pool) = setup_db("duplicate-test").await;

        issues::insert_issue(&pool, new_issue(7, "a"))
            .await
            .expect("first insert should succeed");
        let duplicate = issues::insert_issue(&pool, new_issue(7, "b")).await;
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn save_updates_only_workflow_fields() {
        let (_temp_dir, pool) = setup_db("save-test").await;

        let mut issue = issues::insert_issue(&pool, new_issue(9, "raiser"))
            .await
            .expect("issue should be inserted");
        issue.status = "Resolved".to_string();
        issue.resolved_by = Some("agent-7".to_string());
        issue.subject = "ignored".to_string();

        let saved = issues::save_issue(&pool, &issue)
            .await
            .expect("issue should be saved");
        assert_eq!(saved.status, "Resolved");
        assert_eq!(saved.resolved_by.as_deref(), Some("agent-7"));
        assert_eq!(saved.subject, "cannot log in");
        assert_eq!(saved.raised_by, "raiser");
        assert_eq!(saved.issue_id, 9);
    }

    #[tokio::test]
    async fn list_filters_by_raiser_and_status() {
        let (_temp_dir, pool) = setup_db("list-test").await;

        for (issue_id, raised_by) in [(1, "alice"), (2, "bob"), (3, "alice")] {
            issues::insert_issue(&pool, new_issue(issue_id, raised_by))
                .await
                .expect("issue should be inserted");
        }

        let mut resolved = issues::get_issue(&pool, 3)
            .await
            .expect("issue should exist");
        resolved.status = "Resolved".to_string();
        issues::save_issue(&pool, &resolved)
            .await
            .expect("issue should be saved");

        let alice = issues::list_issues(
            &pool,
            IssueFilters {
                raised_by: Some("alice".to_string()),
                status: None,
            },
            50,
            0,
        )
        .await
        .expect("list should succeed");
        assert_eq!(alice.len(), 2);

        let open_for_alice = issues::list_issues(
            &pool,
            IssueFilters {
                raised_by: Some("alice".to_string()),
                status: Some("New".to_string()),
            },
            50,
            0,
        )
        .await
        .expect("list should succeed");
        assert_eq!(open_for_alice.len(), 1);
        assert_eq!(open_for_alice[0].issue_id, 1);

        let paged = issues::list_issues(&pool, IssueFilters::default(), 1, 1)
            .await
            .expect("list should succeed");
        assert_eq!(paged.len(), 1);
    }
}
