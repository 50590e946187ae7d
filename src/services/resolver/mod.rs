//! Validation link resolver.
//!
//! Turns one attachment candidate into at most one downloaded file. A
//! candidate whose href already points at a file is downloaded as-is;
//! anything else is clicked and then watched in three stages, in fixed
//! order, stopping at the first that yields a downloaded file:
//!
//! 1. a new window whose URL is a file,
//! 2. a captured network response that names a file,
//! 3. the container named by the validation handler, rewritten by page script.
//!
//! Every watch is bounded by its own ceiling and the session is returned to
//! the top document before control goes back to the caller.

mod container;
mod trace;
mod window;

pub use trace::{url_from_body, url_from_metadata, wants_body};

use std::collections::BTreeSet;
use std::path::Path;

use tracing::debug;

use crate::config::Timing;
use crate::models::{AttachmentCandidate, DiscoveredVia, DownloadedFile, ResolvedAttachment};
use crate::scrapers::browser::{BrowserSession, FrameRef, WindowHandle};
use crate::scrapers::AttachmentClient;
use crate::services::narrative::Narrative;
use crate::utils::{AttachmentRules, UrlFinder};

/// Where the resolver is in its handling of one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
    Idle,
    Clicked,
    AwaitingWindow,
    PollingTrace,
    InspectingContainer,
    Resolved(DiscoveredVia),
    Unresolved,
}

/// Post-click watches, in priority order.
const WATCHES: [ResolverState; 3] = [
    ResolverState::AwaitingWindow,
    ResolverState::PollingTrace,
    ResolverState::InspectingContainer,
];

/// A resolved URL together with the file it produced.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub attachment: ResolvedAttachment,
    pub file: DownloadedFile,
}

/// What the session looked like just before the click.
struct ClickBaseline {
    windows: BTreeSet<WindowHandle>,
    trace_len: usize,
    page_url: String,
}

pub struct Resolver<'a> {
    client: &'a AttachmentClient,
    rules: &'a AttachmentRules,
    finder: UrlFinder,
    timing: &'a Timing,
    work_dir: &'a Path,
}

impl<'a> Resolver<'a> {
    pub fn new(
        client: &'a AttachmentClient,
        rules: &'a AttachmentRules,
        timing: &'a Timing,
        work_dir: &'a Path,
    ) -> Self {
        Self {
            client,
            rules,
            finder: UrlFinder::new(rules),
            timing,
            work_dir,
        }
    }

    /// Resolve and download one candidate. `None` means unresolved.
    pub async fn resolve(
        &self,
        session: &mut dyn BrowserSession,
        candidate: &AttachmentCandidate,
        narrative: &mut Narrative,
    ) -> Option<Resolution> {
        let mut state = ResolverState::Idle;
        debug!(?state, element = %candidate.element, "Resolving candidate");

        if let Some(href) = candidate
            .raw_href
            .as_deref()
            .map(str::trim)
            .filter(|h| self.rules.is_absolute_attachment(h))
        {
            let result = self
                .fetch(href, DiscoveredVia::DirectHref, narrative)
                .await;
            state = match result {
                Some(ref r) => ResolverState::Resolved(r.attachment.discovered_via),
                None => ResolverState::Unresolved,
            };
            debug!(?state, "Direct href handled without click");
            return result;
        }

        let result = self.click_and_watch(session, candidate, narrative).await;
        if let Err(e) = session.default_content().await {
            debug!("Could not return to top document: {}", e);
        }

        state = match result {
            Some(ref r) => ResolverState::Resolved(r.attachment.discovered_via),
            None => ResolverState::Unresolved,
        };
        debug!(?state, "Candidate finished");
        if result.is_none() {
            narrative.push("    No file found for this candidate");
        }

        tokio::time::sleep(self.timing.candidate_pause()).await;
        result
    }

    async fn click_and_watch(
        &self,
        session: &mut dyn BrowserSession,
        candidate: &AttachmentCandidate,
        narrative: &mut Narrative,
    ) -> Option<Resolution> {
        if let Some(index) = candidate.element.frame {
            let frame = FrameRef { index, src: None };
            if let Err(e) = session.enter_frame(&frame).await {
                narrative.push(format!("    Frame lost before click: {}", e));
                return None;
            }
        }

        let baseline = ClickBaseline {
            windows: session.window_handles().await.unwrap_or_default(),
            trace_len: session
                .network_trace()
                .await
                .map(|t| t.len())
                .unwrap_or_default(),
            page_url: session.current_url().await.unwrap_or_default(),
        };

        match session.click(&candidate.element).await {
            Ok(outcome) => {
                if let Some(message) = outcome.dialog {
                    narrative.push(format!("    Caught dialog: {} (dismissed)", message));
                }
            }
            Err(e) => narrative.push(format!("    Click failed: {}", e)),
        }
        debug!(state = ?ResolverState::Clicked, "Candidate clicked");

        for watch in WATCHES {
            debug!(state = ?watch, "Watching");
            let found = match watch {
                ResolverState::AwaitingWindow => {
                    self.await_window(session, &baseline, narrative).await
                }
                ResolverState::PollingTrace => self.poll_trace(session, &baseline, narrative).await,
                ResolverState::InspectingContainer => match candidate.container_id.as_deref() {
                    Some(id) => self.inspect_container(session, id, &baseline, narrative).await,
                    None => None,
                },
                _ => None,
            };
            if found.is_some() {
                return found;
            }
        }
        None
    }

    /// Download `url`; a failed download leaves the candidate unresolved.
    async fn fetch(
        &self,
        url: &str,
        via: DiscoveredVia,
        narrative: &mut Narrative,
    ) -> Option<Resolution> {
        match self.client.download(url, self.work_dir, None).await {
            Ok(file) => {
                narrative.push(format!("    Downloaded {} ({})", file.original_name, via));
                Some(Resolution {
                    attachment: ResolvedAttachment::new(url, via),
                    file,
                })
            }
            Err(e) => {
                narrative.push(format!("    {}", e));
                None
            }
        }
    }
}
