//! Slack adapter: Web API over reqwest, events over Socket Mode.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use super::{ChatPlatform, InboundEvent};
use crate::config::SlackConfig;

const SLACK_API_BASE: &str = "https://slack.com/api";

/// Delay before reopening a dropped Socket Mode connection
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Deserialize)]
struct SlackChannel {
    id: String,
    name: String,
    #[serde(default)]
    is_member: bool,
}

pub struct SlackPlatform {
    http: reqwest::Client,
    bot_token: String,
    app_token: String,
    self_id: String,
    /// Channel id -> channel, filled at connect and on cache misses
    channels: RwLock<HashMap<String, SlackChannel>>,
    /// Channels in the order Slack listed them
    channel_order: Vec<String>,
}

impl SlackPlatform {
    /// Authenticate and preload the channel list
    pub async fn connect(config: &SlackConfig) -> Result<Self> {
        let http = reqwest::Client::new();

        let auth = api_get(&http, &config.bot_token, "auth.test", &[]).await?;
        let self_id = auth["user_id"]
            .as_str()
            .context("Missing 'user_id' in auth.test response")?
            .to_string();
        info!(
            "Authenticated as {} ({})",
            auth["user"].as_str().unwrap_or("?"),
            self_id
        );

        let listed = list_channels(&http, &config.bot_token).await?;
        info!("Loaded {} channel(s)", listed.len());
        let channel_order = listed.iter().map(|c| c.id.clone()).collect();
        let channels = listed.into_iter().map(|c| (c.id.clone(), c)).collect();

        Ok(Self {
            http,
            bot_token: config.bot_token.clone(),
            app_token: config.app_token.clone(),
            self_id,
            channels: RwLock::new(channels),
            channel_order,
        })
    }

    async fn fetch_channel(&self, channel_id: &str) -> Result<Option<SlackChannel>> {
        let body = api_call(
            &self.http,
            &self.bot_token,
            "conversations.info",
            &[("channel", channel_id)],
        )
        .await?;
        channel_from_info(&body)
    }
}

#[async_trait]
impl ChatPlatform for SlackPlatform {
    fn self_identity(&self) -> &str {
        &self.self_id
    }

    async fn resolve_channel_name(&self, channel_id: &str) -> Result<Option<String>> {
        if let Some(channel) = self.channels.read().await.get(channel_id) {
            return Ok(Some(channel.name.clone()));
        }

        debug!("Channel {} not cached, fetching", channel_id);
        let Some(channel) = self.fetch_channel(channel_id).await? else {
            return Ok(None);
        };
        let name = channel.name.clone();
        self.channels
            .write()
            .await
            .insert(channel_id.to_string(), channel);
        Ok(Some(name))
    }

    async fn default_channel(&self) -> Result<Option<String>> {
        let channels = self.channels.read().await;
        Ok(self
            .channel_order
            .iter()
            .filter_map(|id| channels.get(id))
            .find(|c| c.is_member)
            .map(|c| c.name.clone()))
    }

    async fn post_message(&self, channel_name: &str, text: &str, as_user: bool) -> Result<()> {
        let resp = self
            .http
            .post(format!("{}/chat.postMessage", SLACK_API_BASE))
            .bearer_auth(&self.bot_token)
            .json(&json!({
                "channel": channel_name,
                "text": text,
                "as_user": as_user,
            }))
            .send()
            .await
            .context("Failed to send chat.postMessage")?;

        let body: Value = resp
            .json()
            .await
            .context("Invalid chat.postMessage response")?;
        check_ok("chat.postMessage", &body)?;
        debug!("Posted to #{}", channel_name);
        Ok(())
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<InboundEvent>> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let http = self.http.clone();
        let app_token = self.app_token.clone();

        tokio::spawn(async move {
            loop {
                match socket_session(&http, &app_token, &tx).await {
                    Ok(()) => info!("Socket Mode connection ended"),
                    Err(e) => error!("Socket Mode connection failed: {:#}", e),
                }
                if tx.is_closed() {
                    debug!("Event receiver dropped, stopping Socket Mode");
                    break;
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
                info!("Reconnecting to Slack Socket Mode");
            }
        });

        Ok(rx)
    }
}

/// One Socket Mode connection, from `apps.connections.open` until the
/// socket closes or Slack asks us to disconnect.
async fn socket_session(
    http: &reqwest::Client,
    app_token: &str,
    tx: &mpsc::Sender<InboundEvent>,
) -> Result<()> {
    let resp = http
        .post(format!("{}/apps.connections.open", SLACK_API_BASE))
        .bearer_auth(app_token)
        .send()
        .await
        .context("Failed to open Slack Socket Mode connection")?;
    let body: Value = resp
        .json()
        .await
        .context("Invalid apps.connections.open response")?;
    check_ok("apps.connections.open", &body)?;
    let url = body["url"]
        .as_str()
        .context("Missing 'url' in apps.connections.open response")?;

    let (ws_stream, _) = tokio_tungstenite::connect_async(url)
        .await
        .context("Failed to connect to Slack Socket Mode")?;
    info!("Connected to Slack Socket Mode");
    let (mut ws_write, mut ws_read) = ws_stream.split();

    while let Some(msg) = ws_read.next().await {
        let msg = msg.context("Slack WebSocket error")?;
        let text = match msg {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => break,
            _ => continue,
        };

        let payload: Value = match serde_json::from_str(text.as_str()) {
            Ok(v) => v,
            Err(e) => {
                warn!("Unparseable Socket Mode frame: {}", e);
                continue;
            }
        };

        if let Some(envelope_id) = payload["envelope_id"].as_str() {
            let ack = json!({ "envelope_id": envelope_id });
            if let Err(e) = ws_write.send(WsMessage::Text(ack.to_string().into())).await {
                warn!("Failed to ACK Slack envelope: {}", e);
            }
        }

        match payload["type"].as_str().unwrap_or("") {
            "disconnect" => {
                info!(
                    "Slack requested disconnect ({})",
                    payload["reason"].as_str().unwrap_or("unknown")
                );
                break;
            }
            "hello" => debug!("Socket Mode hello received"),
            "events_api" => {
                if let Some(event) = event_from_envelope(&payload) {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
            }
            other => debug!("Ignoring Socket Mode frame of type {:?}", other),
        }
    }

    Ok(())
}

/// Extract the inner event of an `events_api` envelope
fn event_from_envelope(payload: &Value) -> Option<InboundEvent> {
    let event = payload["payload"].get("event")?;
    Some(InboundEvent {
        event_type: event["type"].as_str()?.to_string(),
        text: event["text"].as_str().unwrap_or_default().to_string(),
        channel: event["channel"].as_str().unwrap_or_default().to_string(),
        user: event["user"].as_str().unwrap_or_default().to_string(),
    })
}

async fn list_channels(http: &reqwest::Client, token: &str) -> Result<Vec<SlackChannel>> {
    let mut channels = Vec::new();
    let mut cursor = String::new();

    loop {
        let mut query = vec![
            ("types", "public_channel"),
            ("exclude_archived", "true"),
            ("limit", "200"),
        ];
        if !cursor.is_empty() {
            query.push(("cursor", cursor.as_str()));
        }

        let body = api_get(http, token, "conversations.list", &query).await?;
        let page: Vec<SlackChannel> = serde_json::from_value(body["channels"].clone())
            .context("Malformed channels in conversations.list response")?;
        channels.extend(page);

        cursor = body["response_metadata"]["next_cursor"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        if cursor.is_empty() {
            break;
        }
    }

    Ok(channels)
}

/// Parse a `conversations.info` response. An unknown channel is `None`.
fn channel_from_info(body: &Value) -> Result<Option<SlackChannel>> {
    if body["error"].as_str() == Some("channel_not_found") {
        return Ok(None);
    }
    check_ok("conversations.info", body)?;

    let channel: SlackChannel = serde_json::from_value(body["channel"].clone())
        .context("Malformed channel in conversations.info response")?;
    Ok(Some(channel))
}

async fn api_get(
    http: &reqwest::Client,
    token: &str,
    method: &str,
    query: &[(&str, &str)],
) -> Result<Value> {
    let body = api_call(http, token, method, query).await?;
    check_ok(method, &body)?;
    Ok(body)
}

/// GET a Web API method and return the body without checking `ok`
async fn api_call(
    http: &reqwest::Client,
    token: &str,
    method: &str,
    query: &[(&str, &str)],
) -> Result<Value> {
    let resp = http
        .get(format!("{}/{}", SLACK_API_BASE, method))
        .bearer_auth(token)
        .query(query)
        .send()
        .await
        .with_context(|| format!("Failed to call {}", method))?;

    let body: Value = resp
        .json()
        .await
        .with_context(|| format!("Invalid {} response", method))?;
    Ok(body)
}

fn check_ok(method: &str, body: &Value) -> Result<()> {
    if body["ok"].as_bool() != Some(true) {
        let err = body["error"].as_str().unwrap_or("unknown");
        anyhow::bail!("Slack {} failed: {}", method, err);
    }
    Ok(())
}
