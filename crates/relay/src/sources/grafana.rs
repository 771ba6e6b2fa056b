//! Grafana unified alerting webhook payload.
//!
//! Field names follow the webhook contact point format. Only the fields the relay
//! renders are required; the remaining metadata is accepted and kept so the payload
//! can be logged or re-serialized as received.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, FixedOffset, ParseError, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const ALERT_NAME_LABEL: &str = "alertname";
pub const SUMMARY_ANNOTATION: &str = "summary";
pub const ERROR_ANNOTATION: &str = "Error";

/// Alert state as reported by Grafana. Unknown states are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AlertStatus {
    Firing,
    Resolved,
    Other(String),
}

impl AlertStatus {
    pub fn as_str(&self) -> &str {
        match self {
            AlertStatus::Firing => "firing",
            AlertStatus::Resolved => "resolved",
            AlertStatus::Other(s) => s,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, AlertStatus::Resolved)
    }
}

impl From<String> for AlertStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "firing" => AlertStatus::Firing,
            "resolved" => AlertStatus::Resolved,
            _ => AlertStatus::Other(value),
        }
    }
}

impl From<AlertStatus> for String {
    fn from(value: AlertStatus) -> Self {
        match value {
            AlertStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An RFC 3339 timestamp kept exactly as Grafana sent it. The text is validated on
/// decode but never re-printed, so offsets and fractional digits survive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp {
    raw: String,
    parsed: DateTime<FixedOffset>,
}

impl Timestamp {
    pub fn parse(raw: &str) -> std::result::Result<Self, ParseError> {
        Self::try_from(raw.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn to_utc(&self) -> DateTime<Utc> {
        self.parsed.with_timezone(&Utc)
    }
}

impl TryFrom<String> for Timestamp {
    type Error = ParseError;

    fn try_from(raw: String) -> std::result::Result<Self, Self::Error> {
        let parsed = DateTime::parse_from_rfc3339(&raw)?;
        Ok(Self { raw, parsed })
    }
}

impl From<Timestamp> for String {
    fn from(value: Timestamp) -> Self {
        value.raw
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertBatch {
    #[serde(default)]
    pub receiver: String,
    pub status: AlertStatus,
    #[serde(default)]
    pub org_id: i64,
    pub alerts: Vec<AlertEvent>,
    #[serde(default)]
    pub group_labels: HashMap<String, String>,
    #[serde(default)]
    pub common_labels: HashMap<String, String>,
    #[serde(default)]
    pub common_annotations: HashMap<String, String>,
    #[serde(rename = "externalURL")]
    pub external_url: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub group_key: String,
    #[serde(default)]
    pub truncated_alerts: u32,
    // Deprecated by Grafana; accepted and ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    pub status: AlertStatus,
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    pub starts_at: Timestamp,
    pub ends_at: Timestamp,
    /// Grafana sends `null` for rules without expressions.
    #[serde(default)]
    pub values: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default)]
    pub fingerprint: String,
    #[serde(rename = "generatorURL", default, skip_serializing_if = "Option::is_none")]
    pub generator_url: Option<String>,
    #[serde(rename = "silenceURL", default, skip_serializing_if = "Option::is_none")]
    pub silence_url: Option<String>,
    #[serde(rename = "dashboardURL", default, skip_serializing_if = "Option::is_none")]
    pub dashboard_url: Option<String>,
    #[serde(rename = "panelURL", default, skip_serializing_if = "Option::is_none")]
    pub panel_url: Option<String>,
    #[serde(rename = "imageURL", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl AlertBatch {
    /// Strictly decodes a webhook body. Missing required fields are errors rather
    /// than silently defaulted.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(Error::Payload)
    }
}

impl AlertEvent {
    pub fn name(&self) -> Option<&str> {
        self.labels.get(ALERT_NAME_LABEL).map(String::as_str)
    }

    pub fn summary(&self) -> Option<&str> {
        self.annotations.get(SUMMARY_ANNOTATION).map(String::as_str)
    }

    pub fn error(&self) -> Option<&str> {
        self.annotations.get(ERROR_ANNOTATION).map(String::as_str)
    }

    /// The moment worth reporting: when it ended for resolved alerts, when it started
    /// otherwise.
    pub fn relevant_time(&self) -> &Timestamp {
        if self.status.is_resolved() {
            &self.ends_at
        } else {
            &self.starts_at
        }
    }

    pub fn has_values(&self) -> bool {
        self.values.as_ref().is_some_and(|v| !v.is_empty())
    }
}
