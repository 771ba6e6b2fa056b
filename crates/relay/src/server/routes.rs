use axum::{
    body::{to_bytes, Body},
    extract::{RawQuery, State},
    response::{IntoResponse, Response},
    Json,
};
use http::{HeaderMap, Method, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use url::form_urlencoded;
use uuid::Uuid;

use super::{auth::authorize, Server};
use crate::{
    filter::SuppressionPolicy,
    message::{render, Rendered},
    sinks::{fan_out, DeliveryOutcome},
    sources::AlertBatch,
    Error, Result,
};

pub const IGNORE_DATASOURCE_ERROR_PARAM: &str = "ignoreDataSourceError";

#[derive(Debug, Default)]
pub struct WebhookQuery {
    pub ignore_data_source_error: Option<String>,
}

impl WebhookQuery {
    /// Lenient parse of the raw query string: unknown keys are ignored and the first
    /// occurrence of a repeated key wins, so no query can fail a request.
    pub fn from_raw(raw: Option<&str>) -> Self {
        let ignore_data_source_error = raw.and_then(|raw| {
            form_urlencoded::parse(raw.as_bytes())
                .find(|(key, _)| key == IGNORE_DATASOURCE_ERROR_PARAM)
                .map(|(_, value)| value.into_owned())
        });
        Self {
            ignore_data_source_error,
        }
    }

    /// Only the literal `true` turns suppression on.
    pub fn ignores_datasource_errors(&self) -> bool {
        self.ignore_data_source_error.as_deref() == Some("true")
    }
}

/// Only infallible extractors run before `authorize`; the query and body are read
/// once the caller is known.
pub async fn webhook(
    State(server): State<Arc<Server>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Body,
) -> Result<Response> {
    let span = info_span!("webhook", request_id = %Uuid::new_v4());
    handle_webhook(server, query, headers, body)
        .instrument(span)
        .await
}

async fn handle_webhook(
    server: Arc<Server>,
    query: Option<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response> {
    authorize(&headers, &server.webhook_token)?;
    let query = WebhookQuery::from_raw(query.as_deref());

    // Authenticated bodies are read without a size cap.
    let body = to_bytes(body, usize::MAX)
        .await
        .map_err(|e| Error::Body(e.to_string()))?;

    debug!("Received payload: {}", String::from_utf8_lossy(&body));
    let batch = AlertBatch::from_slice(&body).map_err(|e| {
        warn!("Rejecting payload: {}", e);
        e
    })?;
    info!(
        "Received {} alert(s) with status {} from {}",
        batch.alerts.len(),
        batch.status,
        batch.external_url
    );

    let policy = SuppressionPolicy::for_request(query.ignores_datasource_errors());
    let message = match render(&batch, &policy) {
        Rendered::Message(message) => message,
        Rendered::Suppressed { dropped } => {
            info!("All {} alert(s) suppressed, nothing to send", dropped);
            return Ok((
                StatusCode::OK,
                Json(json!({
                    "message": "All alerts were suppressed, nothing to send",
                    "suppressed": dropped,
                })),
            )
                .into_response());
        }
    };
    debug!("Sending message: {}", message);

    let outcomes = fan_out(server.sender.clone(), &server.chat_ids, &message).await;
    Ok(compose_response(outcomes))
}

/// 500 as soon as one destination failed, 200 otherwise. The body always lists every
/// outcome.
pub fn compose_response(outcomes: Vec<DeliveryOutcome>) -> Response {
    let failed = outcomes.iter().filter(|o| o.is_rejected()).count();
    let status = if failed > 0 {
        warn!("{} of {} deliveries failed", failed, outcomes.len());
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    (status, Json(outcomes)).into_response()
}

pub async fn method_not_allowed() -> Error {
    Error::MethodNotAllowed
}

/// Unmatched paths: non-POST requests are refused by method first.
pub async fn fallback(method: Method) -> Error {
    if method == Method::POST {
        Error::NotFound
    } else {
        Error::MethodNotAllowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::DeliveryResponse;
    use std::collections::BTreeMap;

    fn fulfilled(chat_id: &str) -> DeliveryOutcome {
        DeliveryOutcome::Fulfilled {
            chat_id: chat_id.to_string(),
            value: DeliveryResponse {
                code: 200,
                headers: BTreeMap::new(),
                body: json!({ "ok": true }),
            },
        }
    }

    #[test]
    fn all_fulfilled_is_ok() {
        let response = compose_response(vec![fulfilled("1"), fulfilled("2")]);
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn any_rejection_is_internal_error() {
        let response = compose_response(vec![
            fulfilled("1"),
            DeliveryOutcome::Rejected {
                chat_id: "2".to_string(),
                reason: "timeout".to_string(),
            },
        ]);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn query_flag_must_be_literal_true() {
        let flag = |raw: Option<&str>| WebhookQuery::from_raw(raw).ignores_datasource_errors();
        assert!(flag(Some("ignoreDataSourceError=true")));
        assert!(flag(Some("foo=bar&ignoreDataSourceError=true")));
        assert!(!flag(Some("ignoreDataSourceError=false")));
        assert!(!flag(Some("ignoreDataSourceError=TRUE")));
        assert!(!flag(Some("ignoreDataSourceError")));
        assert!(!flag(Some("")));
        assert!(!flag(None));
    }

    #[test]
    fn repeated_or_odd_query_never_fails() {
        let first_wins = WebhookQuery::from_raw(Some(
            "ignoreDataSourceError=true&ignoreDataSourceError=false",
        ));
        assert!(first_wins.ignores_datasource_errors());

        let odd = WebhookQuery::from_raw(Some("%zz=&&=&ignoreDataSourceError=%74rue"));
        assert!(odd.ignores_datasource_errors());
    }

    #[tokio::test]
    async fn unmatched_post_is_not_found_other_methods_not_allowed() {
        assert!(matches!(fallback(Method::POST).await, Error::NotFound));
        assert!(matches!(fallback(Method::GET).await, Error::MethodNotAllowed));
        assert!(matches!(fallback(Method::DELETE).await, Error::MethodNotAllowed));
    }
}
