//! Renders an alert batch into the Telegram message text (legacy `Markdown` mode).

use std::fmt::Write;

use crate::filter::SuppressionPolicy;
use crate::sources::{AlertBatch, AlertEvent, AlertStatus};

pub const RESOLVED_MARKER: &str = "\u{2705}";
pub const FIRING_MARKER: &str = "\u{1F525}";
pub const MISSING_NAME: &str = "None";

/// Result of rendering one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Message(String),
    /// Every alert in a non-empty batch was suppressed; nothing should be sent.
    Suppressed { dropped: usize },
}

pub fn marker(status: &AlertStatus) -> &'static str {
    if status.is_resolved() {
        RESOLVED_MARKER
    } else {
        FIRING_MARKER
    }
}

pub fn render(batch: &AlertBatch, policy: &SuppressionPolicy) -> Rendered {
    let kept: Vec<&AlertEvent> = batch.alerts.iter().filter(|a| policy.allows(a)).collect();

    // An empty batch still produces a header-only message.
    if !batch.alerts.is_empty() && kept.is_empty() {
        return Rendered::Suppressed {
            dropped: batch.alerts.len(),
        };
    }

    let mut message = render_header(batch);
    for alert in kept {
        message.push_str(&render_alert(alert));
    }
    Rendered::Message(message)
}

pub fn render_header(batch: &AlertBatch) -> String {
    format!(
        "{} Grafana alerting status: *{}*\nSite: {}\n\n",
        marker(&batch.status),
        batch.status,
        batch.external_url
    )
}

/// One alert block, starting with a blank line and ending with a newline.
pub fn render_alert(alert: &AlertEvent) -> String {
    let mut block = format!(
        "\n{} Rule `{}` changed to *{}* @ `{}`: {}\n",
        marker(&alert.status),
        alert.name().unwrap_or(MISSING_NAME),
        alert.status,
        alert.relevant_time(),
        alert.summary().unwrap_or_default()
    );

    if let Some(values) = alert.values.as_ref().filter(|v| !v.is_empty()) {
        let values = serde_json::to_string(values).unwrap_or_default();
        let _ = writeln!(block, "Values: `{}`", values);
    }

    if !alert.status.is_resolved() {
        if let Some(error) = alert.error() {
            let _ = writeln!(block, "Error: {}", error);
        }
    }

    block
}
