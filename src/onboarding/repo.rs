use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::RetryConfig;
use crate::db::{with_retry, DbError, DbResult};
use crate::onboarding::component::{Component, Page};
use crate::onboarding::repo_types::{
    repeated_component, ConfigEntry, ConfigEntryRow, ConfigSnapshot, PageEntries,
};

/// Persistence for the page/component layout. Every write bumps the revision
/// and is all-or-nothing.
#[async_trait]
pub trait OnboardingRepository: Send + Sync {
    async fn load(&self) -> DbResult<ConfigSnapshot>;
    /// Replace the listed pages only. `expected` guards against stale writers.
    /// A component may not end up on two pages: listing one that another page
    /// keeps is rejected and nothing is written.
    async fn replace_pages(&self, pages: &[PageEntries], expected: Option<i64>) -> DbResult<ConfigSnapshot>;
    /// Drop every entry, then write `pages`.
    async fn reset(&self, pages: &[PageEntries]) -> DbResult<ConfigSnapshot>;
    async fn count(&self) -> DbResult<i64>;
}

pub struct PgOnboardingRepository {
    pool: PgPool,
    retry: RetryConfig,
}

impl PgOnboardingRepository {
    pub fn new(pool: PgPool, retry: RetryConfig) -> Self {
        Self { pool, retry }
    }
}

async fn select_entries(conn: &mut PgConnection) -> DbResult<Vec<ConfigEntry>> {
    let rows = sqlx::query_as::<_, ConfigEntryRow>(
        r#"
        SELECT id, page, component, sort_order, created_at, updated_at
        FROM onboarding_config
        ORDER BY page ASC, sort_order ASC, created_at ASC, id ASC
        "#,
    )
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(ConfigEntry::try_from).collect()
}

async fn current_revision(conn: &mut PgConnection) -> DbResult<i64> {
    let revision: Option<i64> =
        sqlx::query_scalar("SELECT revision FROM onboarding_config_revision WHERE id")
            .fetch_optional(conn)
            .await?;
    revision.ok_or_else(|| DbError::Schema("onboarding_config_revision row is missing".into()))
}

/// Lock the revision row, check it against `expected` and increment it.
async fn bump_revision(conn: &mut PgConnection, expected: Option<i64>) -> DbResult<i64> {
    let current: Option<i64> =
        sqlx::query_scalar("SELECT revision FROM onboarding_config_revision WHERE id FOR UPDATE")
            .fetch_optional(&mut *conn)
            .await?;
    let current =
        current.ok_or_else(|| DbError::Schema("onboarding_config_revision row is missing".into()))?;
    if let Some(expected) = expected {
        if expected != current {
            return Err(DbError::StaleRevision { expected, current });
        }
    }
    let next: i64 = sqlx::query_scalar(
        "UPDATE onboarding_config_revision SET revision = revision + 1 WHERE id RETURNING revision",
    )
    .fetch_one(&mut *conn)
    .await?;
    Ok(next)
}

fn taken(component: Component, page: Page) -> DbError {
    DbError::ComponentOnOtherPage {
        component: component.as_str().to_string(),
        page: page.number(),
    }
}

/// Fails when a listed component would stay on a page outside `pages`.
async fn ensure_exclusive(conn: &mut PgConnection, pages: &[PageEntries]) -> DbResult<()> {
    if let Some((component, page)) = repeated_component(pages) {
        return Err(taken(component, page));
    }
    let replaced: Vec<i16> = pages.iter().map(|p| p.page.number()).collect();
    let listed: Vec<String> = pages
        .iter()
        .flat_map(|p| p.components())
        .map(|c| c.as_str().to_string())
        .collect();
    let clash: Option<(String, i16)> = sqlx::query_as(
        r#"
        SELECT component, page
        FROM onboarding_config
        WHERE page <> ALL($1) AND component = ANY($2)
        ORDER BY page ASC, sort_order ASC
        LIMIT 1
        "#,
    )
    .bind(replaced)
    .bind(listed)
    .fetch_optional(conn)
    .await?;
    match clash {
        Some((component, page)) => Err(DbError::ComponentOnOtherPage { component, page }),
        None => Ok(()),
    }
}

async fn insert_page(conn: &mut PgConnection, page: &PageEntries) -> DbResult<()> {
    for (component, order) in &page.items {
        sqlx::query(
            r#"
            INSERT INTO onboarding_config (page, component, sort_order)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(page.page.number())
        .bind(component.as_str())
        .bind(*order)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl OnboardingRepository for PgOnboardingRepository {
    async fn load(&self) -> DbResult<ConfigSnapshot> {
        let pool = &self.pool;
        with_retry(&self.retry, "onboarding.load", move || async move {
            let mut tx = pool.begin().await?;
            let entries = select_entries(&mut tx).await?;
            let revision = current_revision(&mut tx).await?;
            tx.commit().await?;
            Ok::<_, DbError>(ConfigSnapshot { entries, revision })
        })
        .await
    }

    async fn replace_pages(&self, pages: &[PageEntries], expected: Option<i64>) -> DbResult<ConfigSnapshot> {
        let pool = &self.pool;
        with_retry(&self.retry, "onboarding.replace_pages", move || async move {
            let mut tx = pool.begin().await?;
            let revision = bump_revision(&mut tx, expected).await?;
            ensure_exclusive(&mut tx, pages).await?;
            for page in pages {
                sqlx::query("DELETE FROM onboarding_config WHERE page = $1")
                    .bind(page.page.number())
                    .execute(&mut *tx)
                    .await?;
                insert_page(&mut tx, page).await?;
            }
            let entries = select_entries(&mut tx).await?;
            tx.commit().await?;
            Ok::<_, DbError>(ConfigSnapshot { entries, revision })
        })
        .await
    }

    async fn reset(&self, pages: &[PageEntries]) -> DbResult<ConfigSnapshot> {
        let pool = &self.pool;
        with_retry(&self.retry, "onboarding.reset", move || async move {
            let mut tx = pool.begin().await?;
            let revision = bump_revision(&mut tx, None).await?;
            sqlx::query("DELETE FROM onboarding_config")
                .execute(&mut *tx)
                .await?;
            for page in pages {
                insert_page(&mut tx, page).await?;
            }
            let entries = select_entries(&mut tx).await?;
            tx.commit().await?;
            Ok::<_, DbError>(ConfigSnapshot { entries, revision })
        })
        .await
    }

    async fn count(&self) -> DbResult<i64> {
        let pool = &self.pool;
        with_retry(&self.retry, "onboarding.count", move || async move {
            let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM onboarding_config")
                .fetch_one(pool)
                .await?;
            Ok::<_, DbError>(n)
        })
        .await
    }
}

#[derive(Default)]
struct MemoryConfig {
    entries: Vec<ConfigEntry>,
    revision: i64,
}

impl MemoryConfig {
    fn check(&self, expected: Option<i64>) -> DbResult<()> {
        match expected {
            Some(expected) if expected != self.revision => Err(DbError::StaleRevision {
                expected,
                current: self.revision,
            }),
            _ => Ok(()),
        }
    }

    fn ensure_exclusive(&self, pages: &[PageEntries]) -> DbResult<()> {
        if let Some((component, page)) = repeated_component(pages) {
            return Err(taken(component, page));
        }
        let kept = self
            .entries
            .iter()
            .filter(|e| pages.iter().all(|p| p.page != e.page));
        for entry in kept {
            if pages.iter().any(|p| p.components().any(|c| c == entry.component)) {
                return Err(taken(entry.component, entry.page));
            }
        }
        Ok(())
    }

    fn insert(&mut self, page: &PageEntries) {
        let now = OffsetDateTime::now_utc();
        self.entries.extend(page.items.iter().map(|&(component, order)| ConfigEntry {
            id: Uuid::new_v4(),
            page: page.page,
            component,
            order,
            created_at: now,
            updated_at: now,
        }));
    }

    fn snapshot(&self) -> ConfigSnapshot {
        let mut entries = self.entries.clone();
        // stable sort keeps insertion order among equal keys
        entries.sort_by_key(|e| (e.page, e.order));
        ConfigSnapshot {
            entries,
            revision: self.revision,
        }
    }
}

/// Process-local store used by tests and `AppState::in_memory`.
#[derive(Default)]
pub struct InMemoryOnboardingRepository {
    inner: RwLock<MemoryConfig>,
}

#[async_trait]
impl OnboardingRepository for InMemoryOnboardingRepository {
    async fn load(&self) -> DbResult<ConfigSnapshot> {
        Ok(self.inner.read().await.snapshot())
    }

    async fn replace_pages(&self, pages: &[PageEntries], expected: Option<i64>) -> DbResult<ConfigSnapshot> {
        let mut cfg = self.inner.write().await;
        cfg.check(expected)?;
        cfg.ensure_exclusive(pages)?;
        for page in pages {
            cfg.entries.retain(|e| e.page != page.page);
            cfg.insert(page);
        }
        cfg.revision += 1;
        Ok(cfg.snapshot())
    }

    async fn reset(&self, pages: &[PageEntries]) -> DbResult<ConfigSnapshot> {
        let mut cfg = self.inner.write().await;
        cfg.entries.clear();
        for page in pages {
            cfg.insert(page);
        }
        cfg.revision += 1;
        Ok(cfg.snapshot())
    }

    async fn count(&self) -> DbResult<i64> {
        Ok(self.inner.read().await.entries.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(page: Page, items: &[(Component, i32)]) -> PageEntries {
        PageEntries {
            page,
            items: items.to_vec(),
        }
    }

    #[tokio::test]
    async fn replace_touches_only_the_given_page() {
        let repo = InMemoryOnboardingRepository::default();
        repo.reset(&[
            page(Page::Two, &[(Component::AboutMe, 0)]),
            page(Page::Three, &[(Component::Address, 0)]),
        ])
        .await
        .unwrap();

        let snap = repo
            .replace_pages(&[page(Page::Two, &[(Component::Birthdate, 1), (Component::AboutMe, 0)])], None)
            .await
            .unwrap();
        let listed: Vec<_> = snap.entries.iter().map(|e| (e.page, e.component, e.order)).collect();
        assert_eq!(
            listed,
            vec![
                (Page::Two, Component::AboutMe, 0),
                (Page::Two, Component::Birthdate, 1),
                (Page::Three, Component::Address, 0),
            ]
        );
        assert_eq!(snap.revision, 2);
    }

    #[tokio::test]
    async fn component_kept_by_another_page_is_refused() {
        let repo = InMemoryOnboardingRepository::default();
        repo.reset(&[
            page(Page::Two, &[(Component::AboutMe, 0)]),
            page(Page::Three, &[(Component::Address, 0)]),
        ])
        .await
        .unwrap();
        let before = repo.load().await.unwrap();

        let err = repo
            .replace_pages(&[page(Page::Three, &[(Component::AboutMe, 0)])], None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DbError::ComponentOnOtherPage {
                component: "aboutMe".into(),
                page: 2
            }
        );
        assert_eq!(repo.load().await.unwrap(), before);

        // swapping both pages at once is a move, not a clash
        let snap = repo
            .replace_pages(
                &[
                    page(Page::Two, &[(Component::Address, 0)]),
                    page(Page::Three, &[(Component::AboutMe, 0)]),
                ],
                None,
            )
            .await
            .unwrap();
        assert_eq!(snap.revision, before.revision + 1);

        let err = repo
            .replace_pages(
                &[
                    page(Page::Two, &[(Component::Birthdate, 0)]),
                    page(Page::Three, &[(Component::Birthdate, 0)]),
                ],
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ComponentOnOtherPage { .. }));
    }

    #[tokio::test]
    async fn stale_revision_writes_nothing() {
        let repo = InMemoryOnboardingRepository::default();
        repo.reset(&[page(Page::Two, &[(Component::AboutMe, 0)])]).await.unwrap();

        let err = repo
            .replace_pages(&[page(Page::Two, &[(Component::Address, 0)])], Some(0))
            .await
            .unwrap_err();
        assert_eq!(err, DbError::StaleRevision { expected: 0, current: 1 });

        let snap = repo.load().await.unwrap();
        assert_eq!(snap.revision, 1);
        assert_eq!(snap.entries[0].component, Component::AboutMe);
        assert_eq!(repo.count().await.unwrap(), 1);
    }
}
