use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    error::ApiResult,
    extract::ApiJson,
    state::AppState,
    users::{
        dto::{CreateUserRequest, ListUsersQuery, UpdateUserRequest, UserResponse},
        services,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", get(get_user).put(update_user))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let repos = state.repos()?;
    let user = services::create_user(repos.users.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    let repos = state.repos()?;
    let user = services::update_user(repos.users.as_ref(), id, payload).await?;
    Ok(Json(user))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> ApiResult<Json<Vec<UserResponse>>> {
    let repos = state.repos()?;
    let users = services::list_users(repos.users.as_ref(), &query).await?;
    Ok(Json(users))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserResponse>> {
    let repos = state.repos()?;
    let user = services::get_user(repos.users.as_ref(), id).await?;
    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt as _;

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let response = app.oneshot(req.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn app(state: AppState) -> Router {
        user_routes().with_state(state)
    }

    #[tokio::test]
    async fn create_returns_201_without_password() {
        let state = AppState::in_memory();
        let (status, body) = send(
            app(state),
            "POST",
            "/users",
            Some(json!({"email": "ada@example.com", "password": "secret1", "firstName": "Ada"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["email"], "ada@example.com");
        assert_eq!(body["firstName"], "Ada");
        assert!(body.get("password").is_none());
        assert!(body.get("passwordHash").is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_400() {
        let state = AppState::in_memory();
        let payload = json!({"email": "ada@example.com", "password": "secret1"});
        let (status, _) = send(app(state.clone()), "POST", "/users", Some(payload.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = send(app(state), "POST", "/users", Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "duplicate_email");
    }

    #[tokio::test]
    async fn missing_fields_are_400() {
        let (status, body) = send(
            app(AppState::in_memory()),
            "POST",
            "/users",
            Some(json!({"email": "ada@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation_error");
    }

    #[tokio::test]
    async fn mistyped_fields_are_400() {
        let state = AppState::in_memory();
        let (status, body) = send(
            app(state.clone()),
            "POST",
            "/users",
            Some(json!({"email": 5, "password": "secret1"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation_error");

        let uri = format!("/users/{}", Uuid::new_v4());
        let (status, body) = send(app(state), "PUT", &uri, Some(json!({"city": ["NYC"]}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation_error");
    }

    #[tokio::test]
    async fn get_unknown_user_is_404() {
        let uri = format!("/users/{}", Uuid::new_v4());
        let (status, body) = send(app(AppState::in_memory()), "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");
    }

    #[tokio::test]
    async fn put_updates_and_list_rejects_unknown_sort() {
        let state = AppState::in_memory();
        let (_, created) = send(
            app(state.clone()),
            "POST",
            "/users",
            Some(json!({"email": "ada@example.com", "password": "secret1"})),
        )
        .await;
        let uri = format!("/users/{}", created["id"].as_str().unwrap());
        let (status, body) = send(
            app(state.clone()),
            "PUT",
            &uri,
            Some(json!({"aboutMe": "hi", "birthdate": "1990-01-02"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["aboutMe"], "hi");
        assert_eq!(body["birthdate"], "1990-01-02T00:00:00Z");

        let (status, list) = send(app(state.clone()), "GET", "/users?sortBy=email&sortOrder=asc", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().map(Vec::len), Some(1));

        let (status, body) = send(app(state), "GET", "/users?sortBy=nonsense", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation_error");
    }

    #[tokio::test]
    async fn unconfigured_database_is_reported_before_handling() {
        let (status, body) = send(app(AppState::unconfigured()), "GET", "/users", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "database_configuration_error");
    }
}
