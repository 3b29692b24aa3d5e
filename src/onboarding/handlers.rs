use axum::{extract::State, http::StatusCode, routing::{get, post, put}, Json, Router};
use tracing::instrument;

use crate::{
    error::ApiResult,
    extract::ApiJson,
    onboarding::{
        dto::{OnboardingConfigView, UpdateConfigRequest, UpdateLayoutRequest},
        repo_types::ConfigEntry,
        services,
    },
    state::AppState,
};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/config", get(get_config).put(update_config))
        .route("/admin/config/init", post(init_config))
        .route("/admin/layout", put(update_layout))
}

#[instrument(skip(state))]
pub async fn get_config(State(state): State<AppState>) -> ApiResult<Json<OnboardingConfigView>> {
    let repos = state.repos()?;
    let view = services::get_config(repos.onboarding.as_ref()).await?;
    Ok(Json(view))
}

#[instrument(skip(state, payload))]
pub async fn update_config(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UpdateConfigRequest>,
) -> ApiResult<Json<Vec<ConfigEntry>>> {
    let repos = state.repos()?;
    let entries = services::replace_page(repos.onboarding.as_ref(), payload).await?;
    Ok(Json(entries))
}

#[instrument(skip(state, payload))]
pub async fn update_layout(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UpdateLayoutRequest>,
) -> ApiResult<Json<OnboardingConfigView>> {
    let repos = state.repos()?;
    let view = services::replace_layout(
        repos.onboarding.as_ref(),
        &payload.layout(),
        payload.expected_revision,
    )
    .await?;
    Ok(Json(view))
}

#[instrument(skip(state))]
pub async fn init_config(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<Vec<ConfigEntry>>)> {
    let repos = state.repos()?;
    let entries = services::reset_to_default(repos.onboarding.as_ref()).await?;
    Ok((StatusCode::CREATED, Json(entries)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::repo::OnboardingRepository as _;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt as _;

    async fn call(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let app = admin_routes().with_state(state.clone());
        let response = app.oneshot(req.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn names(entries: &Value) -> Vec<String> {
        entries
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|e| e["component"].as_str().map(String::from))
            .collect()
    }

    #[tokio::test]
    async fn init_then_get_returns_default_mapping() {
        let state = AppState::in_memory();
        let (status, body) = call(&state, "GET", "/admin/config", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["page2"], json!([]));
        assert_eq!(body["revision"], 0);

        let (status, body) = call(&state, "POST", "/admin/config/init", None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body.as_array().map(Vec::len), Some(2));

        let (_, body) = call(&state, "GET", "/admin/config", None).await;
        assert_eq!(names(&body["page2"]), ["aboutMe"]);
        assert_eq!(names(&body["page3"]), ["address"]);
        assert_eq!(body["page2"][0]["page"], 2);
        assert_eq!(body["revision"], 1);
    }

    #[tokio::test]
    async fn put_config_replaces_one_page() {
        let state = AppState::in_memory();
        call(&state, "POST", "/admin/config/init", None).await;

        let (status, body) = call(
            &state,
            "PUT",
            "/admin/config",
            Some(json!({
                "page": 3,
                "components": [{"component": "birthdate"}, {"component": "address", "order": 4}]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(names(&body), ["birthdate", "address"]);

        let (_, body) = call(&state, "GET", "/admin/config", None).await;
        assert_eq!(names(&body["page2"]), ["aboutMe"]);
        assert_eq!(names(&body["page3"]), ["birthdate", "address"]);
    }

    #[tokio::test]
    async fn put_config_rejects_bad_shape() {
        let state = AppState::in_memory();
        for payload in [
            json!({"page": 4, "components": [{"component": "aboutMe"}]}),
            json!({"page": 2, "components": []}),
            json!({"page": 2}),
            json!({"page": 2, "components": [{"component": "phone"}]}),
        ] {
            let (status, body) = call(&state, "PUT", "/admin/config", Some(payload)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["code"], "validation_error");
        }
    }

    #[tokio::test]
    async fn mistyped_bodies_are_400_validation_errors() {
        let state = AppState::in_memory();
        let cases = [
            ("/admin/config", json!({"page": "2", "components": [{"component": "aboutMe"}]})),
            ("/admin/config", json!({"page": 2, "components": "aboutMe"})),
            ("/admin/layout", json!({"page2": ["phone"], "page3": ["address"]})),
            ("/admin/layout", json!({"page2": "aboutMe", "page3": ["address"]})),
        ];
        for (uri, payload) in cases {
            let (status, body) = call(&state, "PUT", uri, Some(payload.clone())).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{payload}");
            assert_eq!(body["code"], "validation_error", "{payload}");
            assert!(body["details"].as_str().is_some_and(|d| !d.is_empty()));
        }
        assert_eq!(state.repos().unwrap().onboarding.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn non_json_body_is_400() {
        let state = AppState::in_memory();
        let req = Request::builder()
            .method("PUT")
            .uri("/admin/config")
            .body(Body::from("page=2"))
            .unwrap();
        let response = admin_routes().with_state(state).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn put_config_refuses_component_owned_by_the_other_page() {
        let state = AppState::in_memory();
        call(&state, "POST", "/admin/config/init", None).await;

        let (status, body) = call(
            &state,
            "PUT",
            "/admin/config",
            Some(json!({"page": 3, "components": [{"component": "aboutMe"}]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation_error");
        assert_eq!(body["details"], "Component aboutMe is already assigned to page 2");

        let (_, body) = call(&state, "GET", "/admin/config", None).await;
        assert_eq!(names(&body["page2"]), ["aboutMe"]);
        assert_eq!(names(&body["page3"]), ["address"]);
        assert_eq!(body["revision"], 1);
    }

    #[tokio::test]
    async fn stale_revision_is_409() {
        let state = AppState::in_memory();
        call(&state, "POST", "/admin/config/init", None).await;
        let (_, before) = call(&state, "GET", "/admin/config", None).await;

        let (status, body) = call(
            &state,
            "PUT",
            "/admin/layout",
            Some(json!({"page2": ["birthdate"], "page3": ["address"], "expectedRevision": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "stale_revision");

        let (_, after) = call(&state, "GET", "/admin/config", None).await;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn layout_validates_before_writing() {
        let state = AppState::in_memory();
        let (status, body) = call(
            &state,
            "PUT",
            "/admin/layout",
            Some(json!({"page2": ["aboutMe", "address"], "page3": []})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"], "Page 3 must have at least one component");

        let (status, body) = call(
            &state,
            "PUT",
            "/admin/layout",
            Some(json!({"page2": ["aboutMe", "birthdate"], "page3": ["address"], "expectedRevision": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(names(&body["page2"]), ["aboutMe", "birthdate"]);
        assert_eq!(body["revision"], 1);
    }

    #[tokio::test]
    async fn unconfigured_database_is_500() {
        let (status, body) = call(&AppState::unconfigured(), "GET", "/admin/config", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "database_configuration_error");
    }
}
