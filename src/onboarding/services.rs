use std::collections::HashSet;

use tracing::{info, instrument, warn};

use crate::error::{ApiError, ApiResult};
use crate::onboarding::{
    component::{Component, Page},
    dto::{OnboardingConfigView, UpdateConfigRequest},
    layout::PageLayout,
    repo::OnboardingRepository,
    repo_types::{ConfigEntry, PageEntries},
};

pub async fn get_config(repo: &dyn OnboardingRepository) -> ApiResult<OnboardingConfigView> {
    let snapshot = repo.load().await?;
    Ok(OnboardingConfigView::from_snapshot(snapshot))
}

/// Check the request shape and turn it into the rows to write.
pub fn page_entries(req: &UpdateConfigRequest) -> ApiResult<PageEntries> {
    let (Some(page), Some(components)) = (req.page, req.components.as_ref()) else {
        return Err(ApiError::validation("Invalid request data: page and components are required"));
    };
    let page = Page::from_number(page).map_err(|e| ApiError::validation(e.to_string()))?;
    if components.is_empty() {
        return Err(ApiError::validation(format!(
            "Page {page} must have at least one component"
        )));
    }

    let mut seen = HashSet::new();
    let mut items = Vec::with_capacity(components.len());
    for (index, item) in components.iter().enumerate() {
        let component = item
            .component
            .parse::<Component>()
            .map_err(|e| ApiError::validation(e.to_string()))?;
        if !seen.insert(component) {
            return Err(ApiError::validation(format!(
                "Component {component} is listed more than once on page {page}"
            )));
        }
        items.push((component, item.order.unwrap_or(index as i32)));
    }
    Ok(PageEntries { page, items })
}

fn layout_pages(layout: &PageLayout) -> Vec<PageEntries> {
    Page::CONFIGURABLE
        .into_iter()
        .map(|page| PageEntries {
            page,
            items: layout.ordered(page),
        })
        .collect()
}

/// Replace one page and return its new entries.
#[instrument(skip(repo, req))]
pub async fn replace_page(
    repo: &dyn OnboardingRepository,
    req: UpdateConfigRequest,
) -> ApiResult<Vec<ConfigEntry>> {
    let entries = page_entries(&req)?;
    let page = entries.page;
    let snapshot = repo
        .replace_pages(std::slice::from_ref(&entries), req.expected_revision)
        .await?;
    info!(page = page.number(), revision = snapshot.revision, "page configuration replaced");
    Ok(snapshot.entries.into_iter().filter(|e| e.page == page).collect())
}

/// Replace both pages at once after running the layout rule.
#[instrument(skip(repo, layout))]
pub async fn replace_layout(
    repo: &dyn OnboardingRepository,
    layout: &PageLayout,
    expected_revision: Option<i64>,
) -> ApiResult<OnboardingConfigView> {
    if let Err(e) = layout.validate() {
        warn!(error = %e, "rejected layout");
        return Err(ApiError::validation(e.to_string()));
    }
    let pages = layout_pages(layout);
    let snapshot = repo.replace_pages(&pages, expected_revision).await?;
    info!(revision = snapshot.revision, "layout replaced");
    Ok(OnboardingConfigView::from_snapshot(snapshot))
}

#[instrument(skip(repo))]
pub async fn reset_to_default(repo: &dyn OnboardingRepository) -> ApiResult<Vec<ConfigEntry>> {
    let layout = PageLayout::default_mapping();
    let pages = layout_pages(&layout);
    let snapshot = repo.reset(&pages).await?;
    info!(revision = snapshot.revision, "configuration reset to default");
    Ok(snapshot.entries)
}
