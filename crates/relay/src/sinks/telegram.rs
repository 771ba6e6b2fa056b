//! Telegram Bot API sink.
//!
//! Posts to `<api_url>/bot<token>/sendMessage` with legacy `Markdown` parse mode.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::{DeliveryResponse, MessageSender};
use crate::config::TelegramConfig;
use crate::{Error, Result};

pub const PARSE_MODE: &str = "Markdown";

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'a str,
}

pub struct TelegramSink {
    client: Client,
    endpoint: String,
}

impl TelegramSink {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: format!("{}/bot{}/sendMessage", config.api_url, config.bot_token),
        })
    }
}

#[async_trait]
impl MessageSender for TelegramSink {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<DeliveryResponse> {
        let payload = SendMessage {
            chat_id,
            text,
            parse_mode: PARSE_MODE,
        };

        let response = self.client.post(&self.endpoint).json(&payload).send().await?;

        let code = response.status();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let raw = response.bytes().await?;
        debug!("Telegram answered {} for chat {}", code, chat_id);

        if !code.is_success() {
            return Err(Error::Delivery(format!(
                "Telegram returned HTTP {}: {}",
                code.as_u16(),
                String::from_utf8_lossy(&raw)
            )));
        }

        let body = serde_json::from_slice(&raw)?;
        Ok(DeliveryResponse {
            code: code.as_u16(),
            headers,
            body,
        })
    }
}
