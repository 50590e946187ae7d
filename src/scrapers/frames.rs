//! Iframe scanning for attachment candidates.

use regex::Regex;

use super::browser::{BrowserSession, ElementInfo};
use crate::models::AttachmentCandidate;
use crate::services::narrative::Narrative;
use crate::utils::{absolutize, is_absolute_http, AttachmentRules};

const MAX_LABEL_CHARS: usize = 120;

/// Decides which frame elements are worth resolving.
///
/// An anchor qualifies when its handler calls the validation function, or
/// its href or title mentions an attachment extension.
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    rules: AttachmentRules,
    validation_trigger: String,
    handler_arg: Option<Regex>,
}

impl CandidateFilter {
    pub fn new(rules: AttachmentRules, validation_trigger: &str) -> Self {
        let handler_arg = Regex::new(&format!(
            r#"{}\(\s*['"]?([^'")]+?)['"]?\s*\)"#,
            regex::escape(validation_trigger)
        ))
        .ok();
        Self {
            rules,
            validation_trigger: validation_trigger.to_string(),
            handler_arg,
        }
    }

    /// Container id passed to the validation function, e.g. `box1` in
    /// `GetValidateCode('box1')`.
    pub fn container_id(&self, onclick: &str) -> Option<String> {
        self.handler_arg
            .as_ref()?
            .captures(onclick)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|id| !id.is_empty())
    }

    pub fn candidate(&self, info: ElementInfo) -> Option<AttachmentCandidate> {
        let href = info.href.filter(|h| !h.trim().is_empty());
        let onclick = info.onclick.filter(|o| !o.trim().is_empty());
        let title = info.title.filter(|t| !t.trim().is_empty());

        let validates = onclick
            .as_deref()
            .is_some_and(|o| o.contains(&self.validation_trigger));
        let href_hint = href
            .as_deref()
            .is_some_and(|h| self.rules.mentions_extension(h));
        let title_hint = title
            .as_deref()
            .is_some_and(|t| self.rules.mentions_extension(t));

        if !(validates || href_hint || title_hint) {
            return None;
        }

        let label = title.as_deref().unwrap_or(info.text.as_str());
        let display_label = label.trim().chars().take(MAX_LABEL_CHARS).collect();
        let container_id = onclick.as_deref().and_then(|o| self.container_id(o));

        Some(AttachmentCandidate {
            display_label,
            raw_href: href,
            click_handler_text: onclick,
            container_id,
            element: info.element,
        })
    }
}

/// Enter every iframe of the page and collect its candidates.
///
/// Frames that cannot be entered are skipped. The session is back in the
/// top document when this returns.
pub async fn scan_frames(
    session: &mut dyn BrowserSession,
    filter: &CandidateFilter,
    narrative: &mut Narrative,
) -> Vec<AttachmentCandidate> {
    let frames = match session.enumerate_frames().await {
        Ok(frames) => frames,
        Err(e) => {
            narrative.push(format!("Could not list frames: {}", e));
            return Vec::new();
        }
    };
    narrative.push(format!("Page has {} iframe(s)", frames.len()));

    let mut candidates = Vec::new();
    for frame in &frames {
        if let Err(e) = session.enter_frame(frame).await {
            narrative.push(format!("  Skipping iframe #{}: {}", frame.index, e));
            let _ = session.default_content().await;
            continue;
        }
        narrative.push(format!(
            "  Entered iframe #{} (src={})",
            frame.index,
            frame.src.as_deref().unwrap_or("")
        ));

        match session.query("a").await {
            Ok(elements) => {
                let found: Vec<_> = elements
                    .into_iter()
                    .filter_map(|info| filter.candidate(info))
                    .map(|c| resolve_against_frame(c, frame.src.as_deref()))
                    .collect();
                narrative.push(format!(
                    "    {} candidate link(s) in iframe #{}",
                    found.len(),
                    frame.index
                ));
                candidates.extend(found);
            }
            Err(e) => narrative.push(format!("    Query failed in iframe #{}: {}", frame.index, e)),
        }

        let _ = session.default_content().await;
    }

    candidates
}

/// Relative hrefs are resolved against an absolute frame `src`, so a plain
/// file link inside a frame is fetched instead of clicked.
fn resolve_against_frame(mut candidate: AttachmentCandidate, src: Option<&str>) -> AttachmentCandidate {
    let Some(src) = src.filter(|s| is_absolute_http(s)) else {
        return candidate;
    };
    if let Some(href) = candidate.raw_href.as_deref() {
        let lower = href.trim().to_lowercase();
        if !is_absolute_http(href) && !lower.starts_with("javascript") && !lower.starts_with('#') {
            if let Some(url) = absolutize(src, href.trim()) {
                candidate.raw_href = Some(url);
            }
        }
    }
    candidate
}
