//! Decision cache management endpoint.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, models::user::normalize_email, state::AppState};

/// Which cached verdicts to drop. Both absent clears everything.
#[derive(Debug, Deserialize)]
pub struct ClearCacheQuery {
    pub email: Option<String>,
    pub app_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    pub status: &'static str,
    pub email: Option<String>,
    pub app_name: Option<String>,
}

/// Drop cached authorization decisions.
///
/// # Endpoint
///
/// `POST /api/v1/cache/clear?email=alice@co.com&app_name=billing`
///
/// - email and app_name: that one pair
/// - email only: every entry of that user
/// - otherwise: the whole cache
///
/// Admin user and grant changes clear their own entries. This covers other
/// changes, such as deactivating an application. A no-op when caching is
/// disabled.
pub async fn clear_cache(
    State(state): State<AppState>,
    Query(query): Query<ClearCacheQuery>,
) -> Result<Json<ClearCacheResponse>, AppError> {
    let email = query
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|email| !email.is_empty());
    let app_name = query.app_name.filter(|app| !app.trim().is_empty());

    state
        .engine
        .clear_cache(email.as_deref(), app_name.as_deref());

    Ok(Json(ClearCacheResponse {
        status: "cleared",
        email,
        app_name,
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
    async fn clear_drops_only_that_users_entries() -> TestResult {
        let (store, state, app) = app_with_store(true);
        store.add_application("billing", true);
        for email in ["alice@co.com", "bob@co.com"] {
            state
                .engine
                .check_authorization(email, "billing", None, None)
                .await?;
        }

        let response = app
            .oneshot(request(
                Method::POST,
                "/api/v1/cache/clear?email=Alice@co.com",
                Some(SERVICE_KEY),
                None,
            ))
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({ "status": "cleared", "email": "alice@co.com", "app_name": null })
        );
        let reads_before = store.reads();

        // bob is still served from cache, alice goes back to the store
        state
            .engine
            .check_authorization("bob@co.com", "billing", None, None)
            .await?;
        assert_eq!(store.reads(), reads_before);
        state
            .engine
            .check_authorization("alice@co.com", "billing", None, None)
            .await?;
        assert!(store.reads() > reads_before);
        Ok(())
    }

    #[tokio::test]
    async fn clear_without_params_empties_cache() -> TestResult {
        let (store, state, app) = app_with_store(true);
        store.add_application("billing", true);
        state
            .engine
            .check_authorization("alice@co.com", "billing", None, None)
            .await?;

        let response = app
            .oneshot(request(
                Method::POST,
                "/api/v1/cache/clear",
                Some(SERVICE_KEY),
                None,
            ))
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.engine.cache().map(|c| c.sizes()), Some((0, 0)));
        Ok(())
    }

    #[tokio::test]
    async fn clear_requires_api_key() -> TestResult {
        let (_store, _state, app) = app_with_store(true);

        let response = app
            .oneshot(request(Method::POST, "/api/v1/cache/clear", None, None))
            .await?;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
