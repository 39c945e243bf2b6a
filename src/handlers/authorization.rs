//! Authorization HTTP handlers.
//!
//! This module implements the decision endpoints:
//! - POST /api/v1/auth/check - Decide whether a user may access an application
//! - GET /api/v1/users/{email}/applications - List a user's usable grants

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::{HeaderMap, header::USER_AGENT},
};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::{application::UserApplication, user::normalize_email},
    services::authorization::AuthorizationDecision,
    state::AppState,
};

/// Request body for an authorization check.
#[derive(Debug, Deserialize)]
pub struct AuthCheckRequest {
    pub email: String,
    pub app_name: String,
}

#[derive(Debug, Serialize)]
pub struct UserApplicationsResponse {
    pub email: String,
    pub applications: Vec<UserApplication>,
}

/// Check whether a user may access an application.
///
/// # Endpoint
///
/// `POST /api/v1/auth/check`
///
/// # Request Body
///
/// ```json
/// { "email": "alice@co.com", "app_name": "billing" }
/// ```
///
/// # Response
///
/// - **Success (200 OK)**: The decision, granted or denied
/// - **Error (400)**: Empty email or application name
/// - **Error (401)**: Missing or invalid API key
/// - **Error (500)**: The permission store could not be read
///
/// ```json
/// { "authorized": false, "denial_reason": "Authorization expired" }
/// ```
///
/// The caller's IP and `User-Agent` are recorded in the access log.
pub async fn check_authorization(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    Json(request): Json<AuthCheckRequest>,
) -> Result<Json<AuthorizationDecision>, AppError> {
    if request.email.trim().is_empty() || request.app_name.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "email and app_name are required".to_string(),
        ));
    }

    let user_agent = headers.get(USER_AGENT).and_then(|h| h.to_str().ok());

    let decision = state
        .engine
        .check_authorization(
            &request.email,
            &request.app_name,
            auth.ip_address.as_deref(),
            user_agent,
        )
        .await?;

    Ok(Json(decision))
}

/// List the applications a user currently holds a usable grant for.
///
/// # Endpoint
///
/// `GET /api/v1/users/{email}/applications`
///
/// Unknown or inactive users get an empty list rather than 404.
pub async fn list_user_applications(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<UserApplicationsResponse>, AppError> {
    let applications = state.engine.get_user_applications(&email).await?;

    Ok(Json(UserApplicationsResponse {
        email: normalize_email(&email),
        applications,
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use testresult::TestResult;
    use tower::ServiceExt;

    use crate::handlers::test_support::{SERVICE_KEY, app_with_store, json_body, request};

    #[tokio::test]
    async fn check_returns_grant_and_logs_caller() -> TestResult {
        let (store, _state, app) = app_with_store(true);
        let billing = store.add_application("billing", true);
        let alice = store.add_user("alice@co.com", true);
        store.add_permission(&alice, &billing, None, true);

        let mut req = request(
            Method::POST,
            "/api/v1/auth/check",
            Some(SERVICE_KEY),
            Some(json!({ "email": "Alice@Co.com", "app_name": "billing" })),
        );
        req.headers_mut()
            .insert(axum::http::header::USER_AGENT, "billing-sso/1.2".parse()?);
        let response = app.oneshot(req).await?;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({ "authorized": true, "denial_reason": null })
        );

        let logs = store.access_logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].email, "alice@co.com");
        assert_eq!(logs[0].ip_address.as_deref(), Some("10.0.0.7"));
        assert_eq!(logs[0].user_agent.as_deref(), Some("billing-sso/1.2"));
        Ok(())
    }

    #[tokio::test]
    async fn denial_is_a_200_with_reason() -> TestResult {
        let (store, _state, app) = app_with_store(true);
        store.add_application("billing", true);

        let response = app
            .oneshot(request(
                Method::POST,
                "/api/v1/auth/check",
                Some(SERVICE_KEY),
                Some(json!({ "email": "bob@co.com", "app_name": "billing" })),
            ))
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["authorized"], false);
        assert_eq!(body["denial_reason"], "User not authorized");
        Ok(())
    }

    #[tokio::test]
    async fn empty_fields_are_rejected() -> TestResult {
        let (_store, _state, app) = app_with_store(true);

        let response = app
            .oneshot(request(
                Method::POST,
                "/api/v1/auth/check",
                Some(SERVICE_KEY),
                Some(json!({ "email": " ", "app_name": "billing" })),
            ))
            .await?;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "invalid_request");
        Ok(())
    }

    #[tokio::test]
    async fn store_outage_is_a_500_not_a_denial() -> TestResult {
        let (store, _state, app) = app_with_store(false);
        store.add_application("billing", true);

        store.fail_reads(true);
        let response = app
            .oneshot(request(
                Method::POST,
                "/api/v1/auth/check",
                Some(SERVICE_KEY),
                Some(json!({ "email": "alice@co.com", "app_name": "billing" })),
            ))
            .await?;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["error"]["code"], "internal_error");
        Ok(())
    }

    #[tokio::test]
    async fn missing_key_is_401() -> TestResult {
        let (_store, _state, app) = app_with_store(true);

        let response = app
            .oneshot(request(
                Method::POST,
                "/api/v1/auth/check",
                None,
                Some(json!({ "email": "alice@co.com", "app_name": "billing" })),
            ))
            .await?;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"]["code"], "api_key_required");
        Ok(())
    }

    #[tokio::test]
    async fn wrong_key_is_401() -> TestResult {
        let (_store, _state, app) = app_with_store(true);

        let response = app
            .oneshot(request(
                Method::POST,
                "/api/v1/auth/check",
                Some("not-a-real-key"),
                Some(json!({ "email": "alice@co.com", "app_name": "billing" })),
            ))
            .await?;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"]["code"], "invalid_api_key");
        Ok(())
    }

    #[tokio::test]
    async fn key_outside_allow_list_is_401() -> TestResult {
        let (store, _state, app) = app_with_store(true);
        store.add_api_key("office-key", "office", None, &["192.168.1.0/24"], false);

        let response = app
            .oneshot(request(
                Method::GET,
                "/api/v1/users/alice@co.com/applications",
                Some("office-key"),
                None,
            ))
            .await?;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn lists_usable_applications() -> TestResult {
        let (store, _state, app) = app_with_store(true);
        let billing = store.add_application("billing", true);
        let crm = store.add_application("crm", true);
        let alice = store.add_user("alice@co.com", true);
        store.add_permission(&alice, &billing, None, true);
        store.add_permission(&alice, &crm, None, false);

        let response = app
            .oneshot(request(
                Method::GET,
                "/api/v1/users/ALICE@co.com/applications",
                Some(SERVICE_KEY),
                None,
            ))
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["email"], "alice@co.com");
        let applications = body["applications"].as_array().ok_or("array")?;
        assert_eq!(applications.len(), 1);
        assert_eq!(applications[0]["app_name"], "billing");
        Ok(())
    }

    #[tokio::test]
    async fn disabled_auth_accepts_requests_without_key() -> TestResult {
        let (_store, _state, app) = app_with_store(false);

        let response = app
            .oneshot(request(
                Method::GET,
                "/api/v1/users/alice@co.com/applications",
                None,
                None,
            ))
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }
}
