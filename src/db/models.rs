use serde::Serialize;
use sqlx::FromRow;

/// Local mirror of a Redmine issue raised through this service.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct IssueRecord {
    pub id: String,
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
    pub resolved_by: Option<String>,
    pub is_private: i64,
    pub created_at: String,
    pub updated_at: String,
}
