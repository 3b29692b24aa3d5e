use std::cmp::Ordering;
use std::str::FromStr;

use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ApiError;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String, // Argon2 PHC string
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub about_me: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub birthdate: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Normalized partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub about_me: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub birthdate: Option<OffsetDateTime>,
}

impl UserChanges {
    pub fn apply(&self, row: &mut UserRow) {
        fn set<T: Clone>(slot: &mut Option<T>, v: &Option<T>) {
            if let Some(v) = v {
                *slot = Some(v.clone());
            }
        }
        set(&mut row.first_name, &self.first_name);
        set(&mut row.last_name, &self.last_name);
        set(&mut row.about_me, &self.about_me);
        set(&mut row.street, &self.street);
        set(&mut row.city, &self.city);
        set(&mut row.state, &self.state);
        set(&mut row.zip, &self.zip);
        set(&mut row.birthdate, &self.birthdate);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    FirstName,
    LastName,
    Email,
    Birthdate,
    CreatedAt,
    UpdatedAt,
}

impl SortBy {
    pub fn column(self) -> &'static str {
        match self {
            SortBy::FirstName => "first_name",
            SortBy::LastName => "last_name",
            SortBy::Email => "email",
            SortBy::Birthdate => "birthdate",
            SortBy::CreatedAt => "created_at",
            SortBy::UpdatedAt => "updated_at",
        }
    }

    /// Ascending comparison with NULLs last, as PostgreSQL orders them.
    pub fn compare(self, a: &UserRow, b: &UserRow) -> Ordering {
        fn nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
            match (a, b) {
                (Some(a), Some(b)) => a.cmp(b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        }
        match self {
            SortBy::FirstName => nulls_last(&a.first_name, &b.first_name),
            SortBy::LastName => nulls_last(&a.last_name, &b.last_name),
            SortBy::Email => a.email.cmp(&b.email),
            SortBy::Birthdate => nulls_last(&a.birthdate, &b.birthdate),
            SortBy::CreatedAt => a.created_at.cmp(&b.created_at),
            SortBy::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        }
    }
}

impl FromStr for SortBy {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "firstName" => Ok(SortBy::FirstName),
            "lastName" => Ok(SortBy::LastName),
            "email" => Ok(SortBy::Email),
            "birthdate" => Ok(SortBy::Birthdate),
            "createdAt" => Ok(SortBy::CreatedAt),
            "updatedAt" => Ok(SortBy::UpdatedAt),
            other => Err(ApiError::validation(format!(
                "invalid sortBy '{other}', expected one of firstName, lastName, email, birthdate, createdAt, updatedAt"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(ApiError::validation(format!(
                "invalid sortOrder '{other}', expected asc or desc"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserSort {
    pub by: SortBy,
    pub order: SortOrder,
}

impl Default for UserSort {
    fn default() -> Self {
        Self {
            by: SortBy::CreatedAt,
            order: SortOrder::Desc,
        }
    }
}
