use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::onboarding::component::{Component, Page, COMPONENTS};

/// Which components sit on which configurable page, in render order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLayout {
    pub page2: Vec<Component>,
    pub page3: Vec<Component>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("Page {0} must have at least one component")]
    EmptyPage(Page),
    #[error("Component {component} is listed more than once on page {page}")]
    Duplicate { page: Page, component: Component },
    #[error("Component {0} is assigned to both pages")]
    Overlap(Component),
    #[error("All components must be assigned to a page")]
    Unassigned,
}

/// Outcome of [`PageLayout::validation_status`], ready to show next to the
/// save button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationStatus {
    pub valid: bool,
    pub message: String,
}

impl PageLayout {
    pub fn new(page2: Vec<Component>, page3: Vec<Component>) -> Self {
        Self { page2, page3 }
    }

    /// `{page2: [aboutMe], page3: [address]}`
    pub fn default_mapping() -> Self {
        Self::new(vec![Component::AboutMe], vec![Component::Address])
    }

    pub fn page(&self, page: Page) -> &[Component] {
        match page {
            Page::Two => &self.page2,
            Page::Three => &self.page3,
        }
    }

    fn page_mut(&mut self, page: Page) -> &mut Vec<Component> {
        match page {
            Page::Two => &mut self.page2,
            Page::Three => &mut self.page3,
        }
    }

    /// Every page needs a component. When each page holds exactly one, the
    /// layout is accepted even if a component stays unassigned; otherwise the
    /// two pages must partition the whole component table.
    pub fn validate(&self) -> Result<(), LayoutError> {
        for page in Page::CONFIGURABLE {
            let components = self.page(page);
            if components.is_empty() {
                return Err(LayoutError::EmptyPage(page));
            }
            let mut seen = HashSet::new();
            if let Some(&component) = components.iter().find(|c| !seen.insert(**c)) {
                return Err(LayoutError::Duplicate { page, component });
            }
        }

        if self.page2.len() == 1 && self.page3.len() == 1 {
            return Ok(());
        }

        if let Some(&c) = self.page2.iter().find(|c| self.page3.contains(c)) {
            return Err(LayoutError::Overlap(c));
        }

        let assigned: HashSet<Component> = self.page2.iter().chain(&self.page3).copied().collect();
        if assigned.len() != COMPONENTS.len() {
            return Err(LayoutError::Unassigned);
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn validation_status(&self) -> ValidationStatus {
        match self.validate() {
            Ok(()) => ValidationStatus {
                valid: true,
                message: "Configuration is valid".into(),
            },
            Err(e) => ValidationStatus {
                valid: false,
                message: e.to_string(),
            },
        }
    }

    /// Put `component` at the end of `page`, taking it off the other page.
    pub fn assign(&mut self, page: Page, component: Component) {
        if self.page(page).contains(&component) {
            return;
        }
        self.page_mut(page.other()).retain(|c| *c != component);
        self.page_mut(page).push(component);
    }

    /// Returns `false` and leaves the layout untouched when `component` is not
    /// on `page` or is its last component.
    pub fn remove(&mut self, page: Page, component: Component) -> bool {
        let components = self.page_mut(page);
        if components.len() <= 1 || !components.contains(&component) {
            return false;
        }
        components.retain(|c| *c != component);
        true
    }

    /// Components that could be added to `page`: unassigned ones and those
    /// currently on the other page.
    pub fn available_for(&self, page: Page) -> Vec<Component> {
        let current = self.page(page);
        Component::ALL
            .into_iter()
            .filter(|c| !current.contains(c))
            .collect()
    }

    /// `(component, order)` pairs for `page`, ordered by list position.
    pub fn ordered(&self, page: Page) -> Vec<(Component, i32)> {
        self.page(page)
            .iter()
            .enumerate()
            .map(|(i, c)| (*c, i as i32))
            .collect()
    }
}
