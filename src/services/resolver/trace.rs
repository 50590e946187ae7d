//! Network trace watch and response inspection.

use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

use super::{ClickBaseline, Resolution, Resolver};
use crate::models::DiscoveredVia;
use crate::scrapers::browser::{BrowserSession, TraceRecord};
use crate::services::narrative::Narrative;
use crate::utils::{absolutize, is_absolute_http, AttachmentRules, Poller, UrlFinder};

/// Field names that usually carry a file URL, most specific first.
const WELL_KNOWN_FIELDS: [&str; 4] = ["urlhref", "fileUrl", "downloadUrl", "url"];

/// MIME families whose bodies never carry a link worth following.
const SKIPPED_MIME_PREFIXES: [&str; 4] = ["image/", "font/", "audio/", "video/"];

/// The record itself is a file: attachment-shaped URL, document MIME type,
/// or a `Content-Disposition: attachment` header.
pub fn url_from_metadata<'r>(record: &'r TraceRecord, rules: &AttachmentRules) -> Option<&'r str> {
    let url = record.url.as_str();
    if url.is_empty() {
        return None;
    }
    let disposition = record
        .header("content-disposition")
        .is_some_and(AttachmentRules::disposition_hint);
    if rules.is_download_target(url) || AttachmentRules::mime_hint(&record.mime_type) || disposition
    {
        Some(url)
    } else {
        None
    }
}

/// Whether the body of `record` is worth fetching.
pub fn wants_body(record: &TraceRecord) -> bool {
    let mime = record.mime_type.to_lowercase();
    !(SKIPPED_MIME_PREFIXES.iter().any(|p| mime.starts_with(p)) || mime == "text/css")
}

/// File URL carried by a response body.
///
/// Structured bodies are searched breadth-first for well-known fields whose
/// value is a download target; the shallowest match wins, and at equal depth
/// the field order of [`WELL_KNOWN_FIELDS`] decides. Failing that, any
/// absolute string in the tree that is a download target is taken. Bodies that are not JSON fall back to a
/// pattern search for an absolute attachment URL.
pub fn url_from_body(body: &str, rules: &AttachmentRules, finder: &UrlFinder) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => well_known_field(&value, rules).or_else(|| deep_search(&value, rules)),
        Err(_) => finder.first_url(trimmed),
    }
}

fn well_known_field(root: &Value, rules: &AttachmentRules) -> Option<String> {
    let mut level: Vec<&Value> = vec![root];
    while !level.is_empty() {
        for field in WELL_KNOWN_FIELDS {
            for node in &level {
                if let Some(Value::String(s)) = node.get(field) {
                    let s = s.trim();
                    if rules.is_download_target(s) {
                        return Some(s.to_string());
                    }
                }
            }
        }
        level = level.into_iter().flat_map(children).collect();
    }
    None
}

fn deep_search(value: &Value, rules: &AttachmentRules) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (is_absolute_http(s) && rules.is_download_target(s)).then(|| s.to_string())
        }
        Value::Array(items) => items.iter().find_map(|v| deep_search(v, rules)),
        Value::Object(map) => map.values().find_map(|v| deep_search(v, rules)),
        _ => None,
    }
}

fn children(value: &Value) -> Vec<&Value> {
    match value {
        Value::Object(map) => map.values().collect(),
        Value::Array(items) => items.iter().collect(),
        _ => Vec::new(),
    }
}

impl Resolver<'_> {
    /// Poll the trace for responses that arrived after the click.
    pub(super) async fn poll_trace(
        &self,
        session: &mut dyn BrowserSession,
        baseline: &ClickBaseline,
        narrative: &mut Narrative,
    ) -> Option<Resolution> {
        let mut poller = Poller::attempts(self.timing.trace_polls, self.timing.trace_poll());
        let mut inspected: HashSet<String> = HashSet::new();
        let mut tried: HashSet<String> = HashSet::new();

        while poller.tick().await {
            let records = match session.network_trace().await {
                Ok(records) => records,
                Err(e) => {
                    debug!("Trace unavailable: {}", e);
                    continue;
                }
            };

            for record in records.iter().skip(baseline.trace_len) {
                if !inspected.insert(record.request_id.clone()) {
                    continue;
                }

                let found = match url_from_metadata(record, self.rules) {
                    Some(url) => Some(url.to_string()),
                    None if wants_body(record) => {
                        match session.fetch_response_body(&record.request_id).await {
                            Ok(body) => url_from_body(&body, self.rules, &self.finder),
                            Err(e) => {
                                debug!("{}", e);
                                None
                            }
                        }
                    }
                    None => None,
                };

                let Some(url) = found.and_then(|u| absolutize(&baseline.page_url, &u)) else {
                    continue;
                };
                if !tried.insert(url.clone()) {
                    continue;
                }

                narrative.push(format!("    Found in network trace: {}", url));
                if let Some(resolution) = self.fetch(&url, DiscoveredVia::NetworkTrace, narrative).await {
                    return Some(resolution);
                }
            }
        }

        None
    }
}
