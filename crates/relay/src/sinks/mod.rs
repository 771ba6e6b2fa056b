pub mod telegram;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::{Error, Result};

pub use telegram::TelegramSink;

/// What a destination answered to a successful send.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryResponse {
    pub code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

/// Settled result of one delivery, serialized like a settled promise so the
/// alerting platform can show it verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DeliveryOutcome {
    Fulfilled {
        chat_id: String,
        value: DeliveryResponse,
    },
    Rejected {
        chat_id: String,
        reason: String,
    },
}

impl DeliveryOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, DeliveryOutcome::Rejected { .. })
    }

    pub fn chat_id(&self) -> &str {
        match self {
            DeliveryOutcome::Fulfilled { chat_id, .. } | DeliveryOutcome::Rejected { chat_id, .. } => {
                chat_id
            }
        }
    }
}

/// Something that can post a rendered message to one chat.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<DeliveryResponse>;
}

pub fn parse_chat_id(raw: &str) -> Result<i64> {
    raw.trim()
        .parse()
        .map_err(|_| Error::InvalidChatId(raw.to_string()))
}

/// Sends `text` to every destination at once and waits for all of them. A failing
/// destination never cancels or delays the others; outcomes keep the order of
/// `chat_ids`.
pub async fn fan_out(
    sender: Arc<dyn MessageSender>,
    chat_ids: &[String],
    text: &str,
) -> Vec<DeliveryOutcome> {
    let text: Arc<str> = Arc::from(text);

    let handles = chat_ids.iter().map(|raw| {
        let raw = raw.clone();
        let sender = sender.clone();
        let text = text.clone();
        tokio::spawn(async move {
            let result = match parse_chat_id(&raw) {
                Ok(chat_id) => {
                    info!("Sending message to chat {}", chat_id);
                    sender.send_message(chat_id, &text).await
                }
                Err(e) => Err(e),
            };
            settle(raw, result)
        })
    });
    let joined = join_all(handles.collect::<Vec<_>>()).await;

    joined
        .into_iter()
        .zip(chat_ids)
        .map(|(joined, raw)| {
            joined.unwrap_or_else(|e| DeliveryOutcome::Rejected {
                chat_id: raw.clone(),
                reason: format!("delivery task failed: {}", e),
            })
        })
        .collect()
}

fn settle(chat_id: String, result: Result<DeliveryResponse>) -> DeliveryOutcome {
    match result {
        Ok(value) => {
            info!("Delivered to chat {} with status {}", chat_id, value.code);
            DeliveryOutcome::Fulfilled { chat_id, value }
        }
        Err(e) => {
            warn!("Delivery to chat {} failed: {}", chat_id, e);
            DeliveryOutcome::Rejected {
                chat_id,
                reason: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records calls; chat ids listed in `fail` get a delivery error, `slow` ones
    /// answer late.
    struct Recorder {
        calls: Mutex<Vec<(i64, String)>>,
        fail: Vec<i64>,
        slow: Vec<i64>,
    }

    impl Recorder {
        fn new(fail: Vec<i64>, slow: Vec<i64>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail,
                slow,
            }
        }
    }

    #[async_trait]
    impl MessageSender for Recorder {
        async fn send_message(&self, chat_id: i64, text: &str) -> Result<DeliveryResponse> {
            self.calls.lock().unwrap().push((chat_id, text.to_string()));
            if self.slow.contains(&chat_id) {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            if self.fail.contains(&chat_id) {
                return Err(Error::Delivery("connection refused".to_string()));
            }
            Ok(DeliveryResponse {
                code: 200,
                headers: BTreeMap::from([("content-type".to_string(), "application/json".to_string())]),
                body: json!({ "ok": true }),
            })
        }
    }

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn chat_ids_parse_as_integers() {
        assert_eq!(parse_chat_id("-1001234567890").unwrap(), -1001234567890);
        assert_eq!(parse_chat_id(" 42").unwrap(), 42);
        assert!(matches!(parse_chat_id("@channel"), Err(Error::InvalidChatId(_))));
        assert!(parse_chat_id("").is_err());
    }

    #[tokio::test]
    async fn every_destination_gets_the_same_text() {
        let recorder = Arc::new(Recorder::new(vec![], vec![]));
        let outcomes = fan_out(recorder.clone(), &ids(&["1", "2", "3"]), "hello").await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| !o.is_rejected()));
        let mut calls = recorder.calls.lock().unwrap().clone();
        calls.sort();
        assert_eq!(
            calls,
            vec![(1, "hello".to_string()), (2, "hello".to_string()), (3, "hello".to_string())]
        );
    }

    #[tokio::test]
    async fn failures_do_not_stop_other_destinations() {
        let recorder = Arc::new(Recorder::new(vec![2], vec![1]));
        let outcomes = fan_out(recorder.clone(), &ids(&["1", "2", "3"]), "msg").await;

        let order: Vec<&str> = outcomes.iter().map(DeliveryOutcome::chat_id).collect();
        assert_eq!(order, vec!["1", "2", "3"]);
        assert!(!outcomes[0].is_rejected());
        assert!(outcomes[1].is_rejected());
        assert!(!outcomes[2].is_rejected());
        assert_eq!(recorder.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn unparseable_chat_id_is_rejected_without_a_call() {
        let recorder = Arc::new(Recorder::new(vec![], vec![]));
        let outcomes = fan_out(recorder.clone(), &ids(&["7", "not-a-chat"]), "msg").await;

        assert!(!outcomes[0].is_rejected());
        match &outcomes[1] {
            DeliveryOutcome::Rejected { chat_id, reason } => {
                assert_eq!(chat_id, "not-a-chat");
                assert!(reason.contains("Invalid chat id"));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(recorder.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn outcomes_serialize_as_settled_results() {
        let fulfilled = DeliveryOutcome::Fulfilled {
            chat_id: "1".to_string(),
            value: DeliveryResponse {
                code: 200,
                headers: BTreeMap::new(),
                body: json!({ "ok": true }),
            },
        };
        let rejected = DeliveryOutcome::Rejected {
            chat_id: "2".to_string(),
            reason: "boom".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&fulfilled).unwrap(),
            json!({
                "status": "fulfilled",
                "chat_id": "1",
                "value": { "code": 200, "headers": {}, "body": { "ok": true } }
            })
        );
        assert_eq!(
            serde_json::to_value(&rejected).unwrap(),
            json!({ "status": "rejected", "chat_id": "2", "reason": "boom" })
        );
    }
}
