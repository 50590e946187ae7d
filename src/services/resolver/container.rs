//! Container watch.

use super::{ClickBaseline, Resolution, Resolver};
use crate::models::DiscoveredVia;
use crate::scrapers::browser::BrowserSession;
use crate::services::narrative::Narrative;
use crate::utils::{absolutize, extract_href_values};

impl Resolver<'_> {
    /// Read the container the validation handler writes into and follow
    /// the first link found there.
    pub(super) async fn inspect_container(
        &self,
        session: &mut dyn BrowserSession,
        container_id: &str,
        baseline: &ClickBaseline,
        narrative: &mut Narrative,
    ) -> Option<Resolution> {
        let html = match session.container_html(container_id).await {
            Ok(Some(html)) => html,
            Ok(None) => return None,
            Err(e) => {
                narrative.push(format!("    Container {} unreadable: {}", container_id, e));
                return None;
            }
        };

        let href = extract_href_values(&html)
            .into_iter()
            .find(|h| !h.to_lowercase().starts_with("javascript"))?;
        let url = absolutize(&baseline.page_url, &href)?;
        narrative.push(format!("    Link in container {}: {}", container_id, url));
        self.fetch(&url, DiscoveredVia::DomContainer, narrative).await
    }
}
