//! Sign-in boundary.
//!
//! Credentials are checked by an identity-aware proxy in front of the
//! server. This module only looks for the user handle the proxy
//! forwards and rejects requests that don't carry one.
use std::sync::{Arc, RwLock};

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::api::state::AppState;

pub const EMAIL_HEADER: &str = "x-forwarded-email";
pub const NAME_HEADER: &str = "x-forwarded-user";
pub const PHOTO_HEADER: &str = "x-forwarded-photo-url";

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserHandle {
    pub display_name: Option<String>,
    pub email: String,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

impl UserHandle {
    pub fn anonymous() -> Self {
        Self {
            display_name: Some("Anonymous".to_string()),
            email: String::new(),
            photo_url: None,
        }
    }

    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
        };
        Some(Self {
            email: header(EMAIL_HEADER)?,
            display_name: header(NAME_HEADER),
            photo_url: header(PHOTO_HEADER),
        })
    }
}

/// Attach the caller's `UserHandle` to the request or answer 401.
pub async fn require_user(
    State(state): State<Arc<RwLock<AppState>>>,
    mut request: Request,
    next: Next,
) -> Response {
    let required = match state.read() {
        Ok(s) => s.config.require_auth,
        Err(_) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "Unable to read shared state")
                .into_response();
        }
    };

    let user = match UserHandle::from_headers(request.headers()) {
        Some(user) => user,
        None if !required => UserHandle::anonymous(),
        None => return (StatusCode::UNAUTHORIZED, "Sign in required").into_response(),
    };

    request.extensions_mut().insert(user);
    next.run(request).await
}

/// The signed in user
pub async fn me(axum::Extension(user): axum::Extension<UserHandle>) -> Json<UserHandle> {
    Json(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn it_reads_the_forwarded_user() {
        let mut headers = HeaderMap::new();
        headers.insert(EMAIL_HEADER, HeaderValue::from_static("ada@example.com"));
        headers.insert(NAME_HEADER, HeaderValue::from_static("Ada"));

        let user = UserHandle::from_headers(&headers).unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.display_name.as_deref(), Some("Ada"));
        assert!(user.photo_url.is_none());
    }

    #[test]
    fn it_requires_an_email() {
        let mut headers = HeaderMap::new();
        headers.insert(NAME_HEADER, HeaderValue::from_static("Ada"));
        assert!(UserHandle::from_headers(&headers).is_none());

        headers.insert(EMAIL_HEADER, HeaderValue::from_static("   "));
        assert!(UserHandle::from_headers(&headers).is_none());
    }

    #[test]
    fn it_serializes_like_an_identity_provider_user() {
        let user = UserHandle {
            display_name: Some("Ada".to_string()),
            email: "ada@example.com".to_string(),
            photo_url: Some("https://example.com/ada.png".to_string()),
        };
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["displayName"], "Ada");
        assert_eq!(value["photoURL"], "https://example.com/ada.png");
    }
}
