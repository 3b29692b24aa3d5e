use serde::{Deserialize, Serialize};

use crate::onboarding::{
    component::{Component, Page},
    layout::PageLayout,
    repo_types::{ConfigEntry, ConfigSnapshot},
};

/// `GET /admin/config` body: entries split by page, each ordered by `order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingConfigView {
    pub page2: Vec<ConfigEntry>,
    pub page3: Vec<ConfigEntry>,
    pub revision: i64,
}

impl OnboardingConfigView {
    pub fn from_snapshot(snapshot: ConfigSnapshot) -> Self {
        let (page2, page3) = snapshot
            .entries
            .into_iter()
            .partition(|e| e.page == Page::Two);
        Self {
            page2,
            page3,
            revision: snapshot.revision,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.page2.is_empty() && self.page3.is_empty()
    }

    pub fn entries(&self, page: Page) -> &[ConfigEntry] {
        match page {
            Page::Two => &self.page2,
            Page::Three => &self.page3,
        }
    }

    pub fn components(&self, page: Page) -> Vec<Component> {
        self.entries(page).iter().map(|e| e.component).collect()
    }

    pub fn layout(&self) -> PageLayout {
        PageLayout::new(self.components(Page::Two), self.components(Page::Three))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentOrderRequest {
    pub component: String,
    /// List position is used when absent.
    #[serde(default)]
    pub order: Option<i32>,
}

/// `PUT /admin/config` body. Fields are optional so a missing key gets its own
/// message from `page_entries`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConfigRequest {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub components: Option<Vec<ComponentOrderRequest>>,
    #[serde(default)]
    pub expected_revision: Option<i64>,
}

/// `PUT /admin/layout` body: both pages at once.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLayoutRequest {
    pub page2: Vec<Component>,
    pub page3: Vec<Component>,
    #[serde(default)]
    pub expected_revision: Option<i64>,
}

impl UpdateLayoutRequest {
    pub fn layout(&self) -> PageLayout {
        PageLayout::new(self.page2.clone(), self.page3.clone())
    }
}
