//! Popup trigger activation.

use std::time::Duration;

use tracing::debug;

use super::browser::BrowserSession;
use super::onclick_selector;
use crate::services::narrative::Narrative;

/// Click every element whose handler calls `trigger_fn`, pausing after each.
///
/// Failures are recorded and skipped. Returns the number of successful clicks.
pub async fn activate_popup_triggers(
    session: &mut dyn BrowserSession,
    trigger_fn: &str,
    pause: Duration,
    narrative: &mut Narrative,
) -> usize {
    let triggers = match session.query(&onclick_selector(trigger_fn)).await {
        Ok(found) => found,
        Err(e) => {
            narrative.push(format!("Could not look for {} triggers: {}", trigger_fn, e));
            return 0;
        }
    };

    if triggers.is_empty() {
        narrative.push(format!(
            "No {} triggers found, scanning frames directly",
            trigger_fn
        ));
        return 0;
    }

    narrative.push(format!(
        "Found {} {} trigger(s), clicking each",
        triggers.len(),
        trigger_fn
    ));

    let mut clicked = 0;
    for trigger in &triggers {
        match session.click(&trigger.element).await {
            Ok(outcome) => {
                clicked += 1;
                if let Some(message) = outcome.dialog {
                    narrative.push(format!("  Dialog after trigger dismissed: {}", message));
                }
            }
            Err(e) => narrative.push(format!("  Trigger click failed: {}", e)),
        }
        tokio::time::sleep(pause).await;
    }

    debug!("Clicked {}/{} popup triggers", clicked, triggers.len());
    clicked
}
