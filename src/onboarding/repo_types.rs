use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::DbError;
use crate::onboarding::component::{Component, Page};

#[derive(Debug, Clone, FromRow)]
pub struct ConfigEntryRow {
    pub id: Uuid,
    pub page: i16,
    pub component: String,
    pub sort_order: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// One `(page, component, order)` placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigEntry {
    pub id: Uuid,
    pub page: Page,
    pub component: Component,
    pub order: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl TryFrom<ConfigEntryRow> for ConfigEntry {
    type Error = DbError;

    fn try_from(r: ConfigEntryRow) -> Result<Self, Self::Error> {
        let page = Page::try_from(r.page).map_err(|e| DbError::Schema(e.to_string()))?;
        let component = r
            .component
            .parse::<Component>()
            .map_err(|e| DbError::Schema(e.to_string()))?;
        Ok(Self {
            id: r.id,
            page,
            component,
            order: r.sort_order,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Components to write for one page, already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEntries {
    pub page: Page,
    pub items: Vec<(Component, i32)>,
}

impl PageEntries {
    pub fn components(&self) -> impl Iterator<Item = Component> + '_ {
        self.items.iter().map(|(c, _)| *c)
    }
}

/// A component placed on more than one of `pages`, with the first page that
/// lists it.
pub fn repeated_component(pages: &[PageEntries]) -> Option<(Component, Page)> {
    pages.iter().enumerate().find_map(|(i, first)| {
        first
            .components()
            .find(|c| pages[i + 1..].iter().any(|later| later.components().any(|l| l == *c)))
            .map(|c| (c, first.page))
    })
}

/// Every entry plus the revision it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSnapshot {
    pub entries: Vec<ConfigEntry>,
    pub revision: i64,
}
