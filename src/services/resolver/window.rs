//! New-window watch.

use tracing::debug;

use super::{ClickBaseline, Resolution, Resolver};
use crate::models::DiscoveredVia;
use crate::scrapers::browser::BrowserSession;
use crate::services::narrative::Narrative;
use crate::utils::Poller;

impl Resolver<'_> {
    /// Wait for a window that was not open before the click.
    ///
    /// The first new window is read, downloaded from if its URL is a file,
    /// and always closed again.
    pub(super) async fn await_window(
        &self,
        session: &mut dyn BrowserSession,
        baseline: &ClickBaseline,
        narrative: &mut Narrative,
    ) -> Option<Resolution> {
        let mut poller = Poller::new(self.timing.window_poll(), self.timing.window_wait());

        while poller.tick().await {
            let handles = match session.window_handles().await {
                Ok(handles) => handles,
                Err(e) => {
                    debug!("Window list unavailable: {}", e);
                    continue;
                }
            };
            let Some(handle) = handles.difference(&baseline.windows).next().cloned() else {
                continue;
            };

            tokio::time::sleep(self.timing.window_settle()).await;
            let url = session.window_url(&handle).await;

            let resolved = match url {
                Ok(url) => {
                    narrative.push(format!("    New window opened: {}", url));
                    if self.rules.is_absolute_attachment(&url) {
                        self.fetch(&url, DiscoveredVia::NewWindow, narrative).await
                    } else {
                        None
                    }
                }
                Err(e) => {
                    narrative.push(format!("    New window unreadable: {}", e));
                    None
                }
            };

            if let Err(e) = session.close_window(&handle).await {
                debug!("Closing window {} failed: {}", handle, e);
            }
            return resolved;
        }

        debug!("No new window after {} polls", poller.attempts_made());
        None
    }
}
