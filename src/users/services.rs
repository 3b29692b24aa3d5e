use lazy_static::lazy_static;
use regex::Regex;
use time::{format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime, UtcOffset};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::DbError;
use crate::error::{ApiError, ApiResult};
use crate::users::{
    dto::{CreateUserRequest, ListUsersQuery, UpdateUserRequest, UserResponse},
    password::hash_password,
    repo::UserRepository,
    repo_types::{NewUser, SortOrder, UserChanges, UserSort},
};

pub const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Accepts `YYYY-MM-DD` (stored as midnight UTC) or an RFC 3339 date-time.
pub fn parse_birthdate(raw: &str) -> ApiResult<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(date) = Date::parse(raw, format_description!("[year]-[month]-[day]")) {
        return Ok(date.midnight().assume_utc());
    }
    OffsetDateTime::parse(raw, &Rfc3339)
        .map(|dt| dt.to_offset(UtcOffset::UTC))
        .map_err(|_| {
            ApiError::validation(format!(
                "invalid birthdate '{raw}', expected YYYY-MM-DD or an RFC 3339 date-time"
            ))
        })
}

pub fn parse_sort(query: &ListUsersQuery) -> ApiResult<UserSort> {
    let mut sort = UserSort::default();
    if let Some(by) = query.sort_by.as_deref() {
        sort.by = by.parse()?;
        sort.order = SortOrder::Asc;
    }
    if let Some(order) = query.sort_order.as_deref() {
        sort.order = order.parse()?;
    }
    Ok(sort)
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[instrument(skip(repo, req))]
pub async fn create_user(repo: &dyn UserRepository, req: CreateUserRequest) -> ApiResult<UserResponse> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("Email and password are required"));
    }
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(ApiError::validation("Invalid email"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    // Ensure email is not taken; the unique index is the backstop for races
    if repo.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(ApiError::DuplicateEmail);
    }

    let password_hash = hash_password(&req.password)?;
    let new_user = NewUser {
        email,
        password_hash,
        first_name: non_blank(req.first_name),
        last_name: non_blank(req.last_name),
    };
    let user = repo.create(&new_user).await.map_err(|e| match e {
        DbError::UniqueViolation(_) => ApiError::DuplicateEmail,
        other => other.into(),
    })?;

    info!(user_id = %user.id, email = %user.email, "user created");
    Ok(user.into())
}

#[instrument(skip(repo, req))]
pub async fn update_user(
    repo: &dyn UserRepository,
    id: Uuid,
    req: UpdateUserRequest,
) -> ApiResult<UserResponse> {
    let birthdate = req.birthdate.as_deref().map(parse_birthdate).transpose()?;
    let changes = UserChanges {
        first_name: req.first_name,
        last_name: req.last_name,
        about_me: req.about_me,
        street: req.street,
        city: req.city,
        state: req.state,
        zip: req.zip,
        birthdate,
    };
    let user = repo
        .update(id, &changes)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {id} not found")))?;
    info!(user_id = %user.id, "user updated");
    Ok(user.into())
}

pub async fn get_user(repo: &dyn UserRepository, id: Uuid) -> ApiResult<UserResponse> {
    repo.find_by_id(id)
        .await?
        .map(UserResponse::from)
        .ok_or_else(|| ApiError::NotFound(format!("User {id} not found")))
}

pub async fn list_users(repo: &dyn UserRepository, query: &ListUsersQuery) -> ApiResult<Vec<UserResponse>> {
    let sort = parse_sort(query)?;
    let users = repo.list(sort).await?;
    Ok(users.into_iter().map(UserResponse::from).collect())
}
