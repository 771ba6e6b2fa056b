//! Suppression rules applied to alerts before rendering.

use crate::sources::AlertEvent;

/// Name Grafana gives the synthetic alert raised when a rule's data source fails.
pub const DATASOURCE_ERROR_ALERT: &str = "DatasourceError";

/// A rule deciding whether an alert is dropped from the outgoing message.
pub trait AlertFilter: Send + Sync {
    fn suppresses(&self, alert: &AlertEvent) -> bool;
}

impl<F> AlertFilter for F
where
    F: Fn(&AlertEvent) -> bool + Send + Sync,
{
    fn suppresses(&self, alert: &AlertEvent) -> bool {
        self(alert)
    }
}

/// Drops alerts whose `alertname` label equals a fixed name.
#[derive(Debug, Clone)]
pub struct AlertNameFilter {
    name: String,
}

impl AlertNameFilter {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn datasource_error() -> Self {
        Self::new(DATASOURCE_ERROR_ALERT)
    }
}

impl AlertFilter for AlertNameFilter {
    fn suppresses(&self, alert: &AlertEvent) -> bool {
        alert.name() == Some(self.name.as_str())
    }
}

/// The set of filters in force for one request. An alert survives when no filter
/// suppresses it.
#[derive(Default)]
pub struct SuppressionPolicy {
    filters: Vec<Box<dyn AlertFilter>>,
}

impl SuppressionPolicy {
    pub fn none() -> Self {
        Self::default()
    }

    /// Policy selected by the `ignoreDataSourceError` query flag.
    pub fn for_request(ignore_datasource_error: bool) -> Self {
        let policy = Self::none();
        if ignore_datasource_error {
            policy.with(AlertNameFilter::datasource_error())
        } else {
            policy
        }
    }

    pub fn with(mut self, filter: impl AlertFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn allows(&self, alert: &AlertEvent) -> bool {
        !self.filters.iter().any(|f| f.suppresses(alert))
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}
