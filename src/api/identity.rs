use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::{AppError, AppResult};
use crate::redmine::{ClientInfo, ClientType};
use crate::state::AppState;

pub const CLIENT_TYPE_HEADER: &str = "X-Client-Type";
pub const CLIENT_ID_HEADER: &str = "X-Client-Id";

/// Resolves the caller from `X-Client-Type` / `X-Client-Id` and makes it
/// available to handlers as an `Extension<ClientInfo>`.
pub async fn require_client_identity(
    State(state): State<AppState>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> AppResult<Response> {
    let client = client_info_from_headers(request.headers())?;

    // A classification without a bound key can never reach Redmine.
    if let Err(error) = state.redmine.api_keys().key_for(client.client_type) {
        return Err(AppError::Misconfigured(error.to_string()));
    }

    request.extensions_mut().insert(client);
    Ok(next.run(request).await)
}

pub fn client_info_from_headers(headers: &HeaderMap) -> AppResult<ClientInfo> {
    let client_type = header_value(headers, CLIENT_TYPE_HEADER)?
        .parse::<ClientType>()
        .map_err(|error| AppError::BadRequest(error.to_string()))?;
    let client_id = header_value(headers, CLIENT_ID_HEADER)?.to_string();

    Ok(ClientInfo {
        client_type,
        client_id,
    })
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> AppResult<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("missing {name} header")))
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue};

    use crate::api::identity::{client_info_from_headers, CLIENT_ID_HEADER, CLIENT_TYPE_HEADER};
    use crate::error::AppError;
    use crate::redmine::ClientType;

    fn headers(client_type: Option<&'static str>, client_id: Option<&'static str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = client_type {
            headers.insert(CLIENT_TYPE_HEADER, HeaderValue::from_static(value));
        }
        if let Some(value) = client_id {
            headers.insert(CLIENT_ID_HEADER, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn resolves_type_and_id() {
        let client = client_info_from_headers(&headers(Some("REGISTERED"), Some(" agent-7 ")))
            .expect("headers should resolve");
        assert_eq!(client.client_type, ClientType::Registered);
        assert_eq!(client.client_id, "agent-7");
    }

    #[test]
    fn missing_or_unknown_headers_are_bad_requests() {
        assert!(matches!(
            client_info_from_headers(&headers(None, Some("x"))),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            client_info_from_headers(&headers(Some("END_USER"), None)),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            client_info_from_headers(&headers(Some("END_USER"), Some("  "))),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            client_info_from_headers(&headers(Some("ADMIN"), Some("x"))),
            Err(AppError::BadRequest(message)) if message.contains("unknown client type")
        ));
    }
}
