use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::RetryConfig;
use crate::db::{with_retry, DbError, DbResult};
use crate::users::repo_types::{NewUser, SortOrder, UserChanges, UserRow, UserSort};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> DbResult<Option<UserRow>>;
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<UserRow>>;
    async fn create(&self, user: &NewUser) -> DbResult<UserRow>;
    /// `Ok(None)` when no user has this id.
    async fn update(&self, id: Uuid, changes: &UserChanges) -> DbResult<Option<UserRow>>;
    async fn list(&self, sort: UserSort) -> DbResult<Vec<UserRow>>;
    async fn count(&self) -> DbResult<i64>;
}

pub struct PgUserRepository {
    pool: PgPool,
    retry: RetryConfig,
}

impl PgUserRepository {
    pub fn new(pool: PgPool, retry: RetryConfig) -> Self {
        Self { pool, retry }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_email(&self, email: &str) -> DbResult<Option<UserRow>> {
        let pool = &self.pool;
        with_retry(&self.retry, "users.find_by_email", move || async move {
            let user = sqlx::query_as::<_, UserRow>(
                r#"
                SELECT id, email, password_hash, first_name, last_name, about_me,
                       street, city, state, zip, birthdate, created_at, updated_at
                FROM users
                WHERE email = $1
                "#,
            )
            .bind(email)
            .fetch_optional(pool)
            .await?;
            Ok::<_, DbError>(user)
        })
        .await
    }

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<UserRow>> {
        let pool = &self.pool;
        with_retry(&self.retry, "users.find_by_id", move || async move {
            let user = sqlx::query_as::<_, UserRow>(
                r#"
                SELECT id, email, password_hash, first_name, last_name, about_me,
                       street, city, state, zip, birthdate, created_at, updated_at
                FROM users
                WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(pool)
            .await?;
            Ok::<_, DbError>(user)
        })
        .await
    }

    async fn create(&self, user: &NewUser) -> DbResult<UserRow> {
        let pool = &self.pool;
        with_retry(&self.retry, "users.create", move || async move {
            let row = sqlx::query_as::<_, UserRow>(
                r#"
                INSERT INTO users (email, password_hash, first_name, last_name)
                VALUES ($1, $2, $3, $4)
                RETURNING id, email, password_hash, first_name, last_name, about_me,
                          street, city, state, zip, birthdate, created_at, updated_at
                "#,
            )
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .fetch_one(pool)
            .await?;
            Ok::<_, DbError>(row)
        })
        .await
    }

    async fn update(&self, id: Uuid, changes: &UserChanges) -> DbResult<Option<UserRow>> {
        let pool = &self.pool;
        with_retry(&self.retry, "users.update", move || async move {
            let row = sqlx::query_as::<_, UserRow>(
                r#"
                UPDATE users
                   SET first_name = COALESCE($2, first_name),
                       last_name  = COALESCE($3, last_name),
                       about_me   = COALESCE($4, about_me),
                       street     = COALESCE($5, street),
                       city       = COALESCE($6, city),
                       state      = COALESCE($7, state),
                       zip        = COALESCE($8, zip),
                       birthdate  = COALESCE($9, birthdate),
                       updated_at = now()
                 WHERE id = $1
                RETURNING id, email, password_hash, first_name, last_name, about_me,
                          street, city, state, zip, birthdate, created_at, updated_at
                "#,
            )
            .bind(id)
            .bind(&changes.first_name)
            .bind(&changes.last_name)
            .bind(&changes.about_me)
            .bind(&changes.street)
            .bind(&changes.city)
            .bind(&changes.state)
            .bind(&changes.zip)
            .bind(changes.birthdate)
            .fetch_optional(pool)
            .await?;
            Ok::<_, DbError>(row)
        })
        .await
    }

    async fn list(&self, sort: UserSort) -> DbResult<Vec<UserRow>> {
        // column and direction come from closed enums, never from input text
        let sql = format!(
            r#"
            SELECT id, email, password_hash, first_name, last_name, about_me,
                   street, city, state, zip, birthdate, created_at, updated_at
            FROM users
            ORDER BY {} {}, id ASC
            "#,
            sort.by.column(),
            sort.order.keyword()
        );
        let pool = &self.pool;
        let sql = sql.as_str();
        with_retry(&self.retry, "users.list", move || async move {
            let rows = sqlx::query_as::<_, UserRow>(sql).fetch_all(pool).await?;
            Ok::<_, DbError>(rows)
        })
        .await
    }

    async fn count(&self) -> DbResult<i64> {
        let pool = &self.pool;
        with_retry(&self.retry, "users.count", move || async move {
            let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
                .fetch_one(pool)
                .await?;
            Ok::<_, DbError>(n)
        })
        .await
    }
}

/// Process-local store used by tests and `AppState::in_memory`.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<Vec<UserRow>>,
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> DbResult<Option<UserRow>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<UserRow>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn create(&self, user: &NewUser) -> DbResult<UserRow> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == user.email) {
            return Err(DbError::UniqueViolation(format!(
                "duplicate key value violates unique constraint \"users_email_key\": {}",
                user.email
            )));
        }
        let now = OffsetDateTime::now_utc();
        let row = UserRow {
            id: Uuid::new_v4(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            about_me: None,
            street: None,
            city: None,
            state: None,
            zip: None,
            birthdate: None,
            created_at: now,
            updated_at: now,
        };
        users.push(row.clone());
        Ok(row)
    }

    async fn update(&self, id: Uuid, changes: &UserChanges) -> DbResult<Option<UserRow>> {
        let mut users = self.users.write().await;
        let Some(row) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        changes.apply(row);
        row.updated_at = OffsetDateTime::now_utc();
        Ok(Some(row.clone()))
    }

    async fn list(&self, sort: UserSort) -> DbResult<Vec<UserRow>> {
        let mut rows = self.users.read().await.clone();
        rows.sort_by(|a, b| {
            let ord = sort.by.compare(a, b);
            let ord = match sort.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            };
            ord.then_with(|| a.id.cmp(&b.id))
        });
        Ok(rows)
    }

    async fn count(&self) -> DbResult<i64> {
        Ok(self.users.read().await.len() as i64)
    }
}
