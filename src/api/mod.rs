pub mod identity;
pub mod issues;
pub mod uploads;

use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(issues::router())
        .merge(uploads::router())
}

#[derive(Debug, Serialize)]
pub struct HealthzResponse {
    pub status: &'static str,
}

pub async fn healthz() -> Json<HealthzResponse> {
    Json(HealthzResponse { status: "ok" })
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListQuery {
    pub fn normalize(&self) -> AppResult<(i64, i64)> {
        let limit = self.limit.unwrap_or(50);
        let offset = self.offset.unwrap_or(0);

        if limit <= 0 {
            return Err(AppError::BadRequest(
                "limit must be greater than 0".to_string(),
            ));
        }

        if limit > 100 {
            return Err(AppError::BadRequest(
                "limit must be less than or equal to 100".to_string(),
            ));
        }

        if offset < 0 {
            return Err(AppError::BadRequest(
                "offset cannot be negative".to_string(),
            ));
        }

        Ok((limit, offset))
    }
}

#[cfg(test)]
mod tests {
    use crate::api::ListQuery;

    #[test]
    fn list_query_defaults_and_bounds() {
        let defaults = ListQuery {
            limit: None,
            offset: None,
        };
        assert_eq!(defaults.normalize().expect("defaults are valid"), (50, 0));

        for (limit, offset) in [(Some(0), None), (Some(101), None), (None, Some(-1))] {
            assert!(ListQuery { limit, offset }.normalize().is_err());
        }
    }
}
