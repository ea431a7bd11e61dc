use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::routing::post;
use axum::{Extension, Router};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::redmine::wire::UploadResponse;
use crate::redmine::{ClientInfo, TrackerReply};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/uploads", post(upload_file))
}

#[derive(Debug, Deserialize)]
struct UploadQuery {
    filename: Option<String>,
}

/// Streams the raw request body to Redmine; the returned token is what
/// callers later reference in an issue's `attachments`.
async fn upload_file(
    State(state): State<AppState>,
    Extension(client): Extension<ClientInfo>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> AppResult<TrackerReply<UploadResponse>> {
    let filename = sanitize_filename(query.filename.as_deref().unwrap_or_default())
        .ok_or_else(|| AppError::BadRequest("filename query parameter is required".to_string()))?;

    if body.is_empty() {
        return Err(AppError::BadRequest("upload body cannot be empty".to_string()));
    }

    Ok(state
        .redmine
        .upload_file(&filename, body.to_vec(), client.client_type)
        .await)
}

fn sanitize_filename(raw: &str) -> Option<String> {
    let leaf = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();

    let sanitized = leaf
        .chars()
        .map(|character| {
            if character.is_control() {
                '_'
            } else {
                character
            }
        })
        .collect::<String>();

    if sanitized.trim().is_empty() {
        None
    } else {
        Some(sanitized)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Bytes;
    use axum::extract::RawQuery;
    use axum::middleware;
    use axum::routing::post;
    use axum::Router;
    use reqwest::StatusCode;
    use tempfile::tempdir;

    use crate::api;
    use crate::api::uploads::sanitize_filename;
    use crate::config::{Config, RedmineConfig};
    use crate::db;
    use crate::state::AppState;

    #[test]
    fn sanitize_filename_strips_directories_and_controls() {
        assert_eq!(
            sanitize_filename("../../etc/passwd").as_deref(),
            Some("passwd")
        );
        assert_eq!(
            sanitize_filename(r"C:\Users\ada\scan.png").as_deref(),
            Some("scan.png")
        );
        assert_eq!(sanitize_filename("a\u{7}b.txt").as_deref(), Some("a_b.txt"));
        assert_eq!(sanitize_filename("  "), None);
        assert_eq!(sanitize_filename("dir/"), None);
    }

    async fn fake_uploads(
        RawQuery(query): RawQuery,
        body: Bytes,
    ) -> (axum::http::StatusCode, String) {
        if body.len() > 8 {
            return (axum::http::StatusCode::UNPROCESSABLE_ENTITY, String::new());
        }
        let token = query.unwrap_or_default().replace("filename=", "tok-");
        (
            axum::http::StatusCode::CREATED,
            format!(r#"{{"upload":{{"id":1,"token":"{token}"}}}}"#),
        )
    }

    #[tokio::test]
    async fn upload_endpoint_relays_token_and_size_rejection() {
        let fake_app = Router::new().route("/uploads.json", post(fake_uploads));
        let fake_listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("fake redmine listener should bind");
        let fake_addr = fake_listener
            .local_addr()
            .expect("fake redmine addr should be readable");
        let fake_server = tokio::spawn(async move {
            let _ = axum::serve(fake_listener, fake_app).await;
        });

        let temp_dir = tempdir().expect("tempdir should be created");
        let config = Config {
            port: 0,
            db_url: format!(
                "sqlite://{}?mode=rwc",
                temp_dir.path().join("uploads_api_test.db").display()
            ),
            log_level: "info".to_string(),
            max_request_body_bytes: 1024 * 1024,
            redmine: RedmineConfig {
                base_url: format!("http://{fake_addr}"),
                registered_user_api_key: "registered-key".to_string(),
                unregistered_user_api_key: "end-user-key".to_string(),
                system_api_key: None,
                project_id: 7,
                tracker_id: 2,
                create_status_id: 1,
                create_status_name: "New".to_string(),
                resolve_status_id: 3,
                resolve_status_name: "Resolved".to_string(),
            },
        };
        let pool = db::connect_and_migrate(&config.db_url)
            .await
            .expect("database should initialize");
        let state = AppState::new(&config, pool).expect("state should build");
        let app = Router::new()
            .nest(
                "/api/v1",
                api::router().layer(middleware::from_fn_with_state(
                    state.clone(),
                    api::identity::require_client_identity,
                )),
            )
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("api listener should bind");
        let addr = listener
            .local_addr()
            .expect("api listener addr should be readable");
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("client should build");

        let accepted = client
            .post(format!("http://{addr}/api/v1/uploads?filename=scan.png"))
            .header("X-Client-Type", "END_USER")
            .header("X-Client-Id", "15550100")
            .body(b"tiny".to_vec())
            .send()
            .await
            .expect("upload request should succeed");
        assert_eq!(accepted.status(), StatusCode::OK);
        let accepted_body: serde_json::Value =
            accepted.json().await.expect("upload body should parse");
        assert_eq!(
            accepted_body.pointer("/upload/token"),
            Some(&serde_json::json!("tok-scan.png"))
        );

        let too_large = client
            .post(format!("http://{addr}/api/v1/uploads?filename=big.bin"))
            .header("X-Client-Type", "END_USER")
            .header("X-Client-Id", "15550100")
            .body(vec![0_u8; 64])
            .send()
            .await
            .expect("oversize upload request should succeed");
        assert_eq!(too_large.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let too_large_body: serde_json::Value =
            too_large.json().await.expect("rejection body should parse");
        let message = too_large_body
            .pointer("/upload/message")
            .and_then(serde_json::Value::as_str)
            .expect("rejection should explain the size limit");
        assert!(message.contains("exceeds the maximum allowed file size"));

        let unnamed = client
            .post(format!("http://{addr}/api/v1/uploads"))
            .header("X-Client-Type", "END_USER")
            .header("X-Client-Id", "15550100")
            .body(b"tiny".to_vec())
            .send()
            .await
            .expect("unnamed upload request should succeed");
        assert_eq!(unnamed.status(), StatusCode::BAD_REQUEST);

        fake_server.abort();
        server.abort();
    }
}
