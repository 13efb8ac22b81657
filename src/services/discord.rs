// src/services/discord.rs

//! Discord REST notifier.
//!
//! A notification target is a guild id. Messages for a title go to a text
//! channel named after the title, grouped under a shared category. Both are
//! created on first delivery when missing, and the resolved channel id is
//! cached per (guild, title). Provisioning is serialized per guild.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{Notification, NotificationTarget, NotifierConfig, TitleId};
use crate::services::Notifier;
use crate::utils::resolve_env_ref;

const GUILD_TEXT: u8 = 0;
const GUILD_CATEGORY: u8 = 4;

/// Subset of the Discord channel object used for provisioning.
#[derive(Debug, Clone, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateChannel<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct CreateMessage<'a> {
    content: &'a str,
}

/// Find a channel of the given type by case-insensitive name.
///
/// With `parent_id` set, only channels under that parent match.
pub fn find_channel<'a>(
    channels: &'a [Channel],
    name: &str,
    kind: u8,
    parent_id: Option<&str>,
) -> Option<&'a Channel> {
    channels.iter().find(|c| {
        c.kind == kind
            && c.name.eq_ignore_ascii_case(name)
            && parent_id.is_none_or(|p| c.parent_id.as_deref() == Some(p))
    })
}

/// Delivers notifications through the Discord bot API.
pub struct DiscordNotifier {
    client: Client,
    api_base: String,
    token: String,
    category_name: String,
    channels: Mutex<HashMap<(NotificationTarget, TitleId), String>>,
    guild_locks: Mutex<HashMap<NotificationTarget, Arc<Mutex<()>>>>,
}

impl DiscordNotifier {
    pub fn new(client: Client, api_base: &str, token: String, category_name: &str) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
            category_name: category_name.to_string(),
            channels: Mutex::new(HashMap::new()),
            guild_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Build from config, resolving a `${VAR}` token reference.
    pub fn from_config(client: Client, config: &NotifierConfig) -> Result<Self> {
        let raw = config
            .discord_token
            .as_deref()
            .ok_or_else(|| AppError::config("notifier.discord_token is not set"))?;
        let token = resolve_env_ref(raw)?;
        Ok(Self::new(
            client,
            &config.api_base,
            token,
            &config.category_name,
        ))
    }

    async fn request<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&T>,
    ) -> Result<reqwest::Response> {
        let mut request = self
            .client
            .request(method, format!("{}{}", self.api_base, path))
            .header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.token));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(AppError::Discord {
            status: status.as_u16(),
            message,
        })
    }

    async fn guild_channels(&self, guild: &NotificationTarget) -> Result<Vec<Channel>> {
        let path = format!("/guilds/{}/channels", guild);
        let response = self.request::<()>(Method::GET, &path, None).await?;
        Ok(response.json().await?)
    }

    async fn create_channel(
        &self,
        guild: &NotificationTarget,
        name: &str,
        kind: u8,
        parent_id: Option<&str>,
    ) -> Result<Channel> {
        log::warn!("Channel '{name}' not found in guild {guild}, creating it");
        let path = format!("/guilds/{}/channels", guild);
        let body = CreateChannel {
            name,
            kind,
            parent_id,
        };
        let response = self.request(Method::POST, &path, Some(&body)).await?;
        Ok(response.json().await?)
    }

    async fn guild_lock(&self, guild: &NotificationTarget) -> Arc<Mutex<()>> {
        self.guild_locks
            .lock()
            .await
            .entry(guild.clone())
            .or_default()
            .clone()
    }

    /// Find or create the text channel for a title in a guild.
    async fn resolve_channel(&self, guild: &NotificationTarget, title: &TitleId) -> Result<String> {
        let key = (guild.clone(), title.clone());
        if let Some(id) = self.channels.lock().await.get(&key) {
            return Ok(id.clone());
        }

        let lock = self.guild_lock(guild).await;
        let _provisioning = lock.lock().await;
        if let Some(id) = self.channels.lock().await.get(&key) {
            return Ok(id.clone());
        }

        let channels = self.guild_channels(guild).await?;
        let category = find_channel(&channels, &self.category_name, GUILD_CATEGORY, None);
        let category_id = match category {
            Some(category) => category.id.clone(),
            None => {
                self.create_channel(guild, &self.category_name, GUILD_CATEGORY, None)
                    .await?
                    .id
            }
        };
        let channel_id = match find_channel(
            &channels,
            title.as_str(),
            GUILD_TEXT,
            Some(&category_id),
        ) {
            Some(channel) => channel.id.clone(),
            None => {
                self.create_channel(guild, title.as_str(), GUILD_TEXT, Some(&category_id))
                    .await?
                    .id
            }
        };

        self.channels.lock().await.insert(key, channel_id.clone());
        Ok(channel_id)
    }

    async fn send(&self, target: &NotificationTarget, notification: &Notification) -> Result<()> {
        let channel_id = self.resolve_channel(target, &notification.title).await?;
        let path = format!("/channels/{}/messages", channel_id);
        let body = CreateMessage {
            content: &notification.message,
        };

        match self.request(Method::POST, &path, Some(&body)).await {
            Ok(_) => Ok(()),
            Err(AppError::Discord { status, message })
                if status == StatusCode::NOT_FOUND.as_u16() =>
            {
                // Channel was deleted; provision again on the next delivery.
                self.channels
                    .lock()
                    .await
                    .remove(&(target.clone(), notification.title.clone()));
                Err(AppError::Discord { status, message })
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, target: &NotificationTarget, notification: &Notification) -> Result<()> {
        self.send(target, notification)
            .await
            .map_err(|e| AppError::delivery(target.as_str(), e))
    }

    fn backend_name(&self) -> &str {
        "discord"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channels() -> Vec<Channel> {
        serde_json::from_str(
            r#"[
                {"id": "1", "name": "general", "type": 0},
                {"id": "2", "name": "Notifications", "type": 4},
                {"id": "3", "name": "drstone", "type": 0, "parent_id": "2"},
                {"id": "4", "name": "drstone", "type": 2}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_find_category_case_insensitive() {
        let channels = channels();
        let category = find_channel(&channels, "notifications", GUILD_CATEGORY, None).unwrap();
        assert_eq!(category.id, "2");
    }

    #[test]
    fn test_find_text_channel_ignores_other_types() {
        let channels = channels();
        let channel = find_channel(&channels, "drstone", GUILD_TEXT, Some("2")).unwrap();
        assert_eq!(channel.id, "3");
        assert!(find_channel(&channels, "martialpeak", GUILD_TEXT, None).is_none());
    }

    #[test]
    fn test_find_text_channel_requires_category_parent() {
        let channels = channels();
        assert!(find_channel(&channels, "general", GUILD_TEXT, None).is_some());
        assert!(find_channel(&channels, "general", GUILD_TEXT, Some("2")).is_none());
        assert!(find_channel(&channels, "drstone", GUILD_TEXT, Some("9")).is_none());
    }

    #[test]
    fn test_create_channel_body() {
        let body = CreateChannel {
            name: "drstone",
            kind: GUILD_TEXT,
            parent_id: Some("2"),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"name": "drstone", "type": 0, "parent_id": "2"})
        );

        let category = CreateChannel {
            name: "Notifications",
            kind: GUILD_CATEGORY,
            parent_id: None,
        };
        assert_eq!(
            serde_json::to_value(&category).unwrap(),
            serde_json::json!({"name": "Notifications", "type": 4})
        );
    }

    #[test]
    fn test_from_config_requires_token() {
        let config = NotifierConfig::default();
        assert!(DiscordNotifier::from_config(Client::new(), &config).is_err());
    }

    #[test]
    fn test_from_config_trims_api_base() {
        let config = NotifierConfig {
            discord_token: Some("token".to_string()),
            api_base: "https://discord.com/api/v10/".to_string(),
            ..NotifierConfig::default()
        };
        let notifier = DiscordNotifier::from_config(Client::new(), &config).unwrap();
        assert_eq!(notifier.api_base, "https://discord.com/api/v10");
        assert_eq!(notifier.backend_name(), "discord");
    }

    mod fake_api {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::{Arc, Mutex as StdMutex};
        use std::time::Duration;

        use axum::extract::State;
        use axum::routing::{get, post};
        use axum::{Json, Router};
        use serde_json::{Value, json};

        /// In-memory guild served over HTTP with the Discord REST shapes.
        #[derive(Clone, Default)]
        pub struct FakeGuild {
            pub channels: Arc<StdMutex<Vec<Value>>>,
            pub messages: Arc<AtomicUsize>,
        }

        impl FakeGuild {
            pub fn snapshot(&self) -> Vec<Value> {
                self.channels.lock().unwrap().clone()
            }

            pub fn message_count(&self) -> usize {
                self.messages.load(Ordering::SeqCst)
            }
        }

        async fn list_channels(State(guild): State<FakeGuild>) -> Json<Vec<Value>> {
            Json(guild.snapshot())
        }

        async fn create_channel(
            State(guild): State<FakeGuild>,
            Json(body): Json<Value>,
        ) -> Json<Value> {
            // Widen the window between listing and creating.
            tokio::time::sleep(Duration::from_millis(20)).await;
            let mut channels = guild.channels.lock().unwrap();
            let mut channel = body;
            channel["id"] = json!((100 + channels.len()).to_string());
            channels.push(channel.clone());
            Json(channel)
        }

        async fn post_message(State(guild): State<FakeGuild>) -> Json<Value> {
            guild.messages.fetch_add(1, Ordering::SeqCst);
            Json(json!({"id": "m"}))
        }

        /// Serve a fake guild and return its API base URL.
        pub async fn serve() -> (String, FakeGuild) {
            let guild = FakeGuild::default();
            let app = Router::new()
                .route(
                    "/guilds/{guild}/channels",
                    get(list_channels).post(create_channel),
                )
                .route("/channels/{channel}/messages", post(post_message))
                .with_state(guild.clone());

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            (format!("http://{addr}"), guild)
        }
    }

    fn notification(title: &str) -> Notification {
        Notification {
            title: TitleId::new(title),
            message: format!("Chapter 1 of {title}"),
        }
    }

    #[tokio::test]
    async fn test_concurrent_titles_share_one_category() {
        let (api_base, guild) = fake_api::serve().await;
        let notifier =
            DiscordNotifier::new(Client::new(), &api_base, "token".to_string(), "Notifications");
        let target = NotificationTarget::new("42");
        let drstone = notification("drstone");
        let solo = notification("solo");

        let (a, b) = tokio::join!(
            notifier.notify(&target, &drstone),
            notifier.notify(&target, &solo)
        );
        a.unwrap();
        b.unwrap();

        let channels = guild.snapshot();
        let categories: Vec<_> = channels
            .iter()
            .filter(|c| c["type"] == GUILD_CATEGORY)
            .collect();
        assert_eq!(categories.len(), 1);
        assert_eq!(channels.len(), 3);
        let category_id = categories[0]["id"].clone();
        assert!(
            channels
                .iter()
                .filter(|c| c["type"] == GUILD_TEXT)
                .all(|c| c["parent_id"] == category_id)
        );
        assert_eq!(guild.message_count(), 2);
    }

    #[tokio::test]
    async fn test_second_delivery_uses_cached_channel() {
        let (api_base, guild) = fake_api::serve().await;
        let notifier =
            DiscordNotifier::new(Client::new(), &api_base, "token".to_string(), "Notifications");
        let target = NotificationTarget::new("42");

        notifier.notify(&target, &notification("solo")).await.unwrap();
        notifier.notify(&target, &notification("solo")).await.unwrap();

        assert_eq!(guild.snapshot().len(), 2);
        assert_eq!(guild.message_count(), 2);
    }
}
