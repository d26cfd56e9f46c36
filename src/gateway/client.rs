//! Outbound chat operations.
//!
//! `ChatOps` is the seam between workflows and the platform: workflows
//! only ever see this trait, tests substitute `RecordingChat`, and the
//! binary wires in the rate-limited REST implementation below.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Mutex;
use tracing::debug;

use super::errors::GatewayError;
use super::types::{ChannelId, Member, MessageId, OutboundMessage, RoleId, UserId};

/// Operations the workflows consume from the transport collaborator.
#[async_trait]
pub trait ChatOps: Send + Sync {
    async fn send_message(
        &self,
        channel: &ChannelId,
        message: OutboundMessage,
    ) -> Result<MessageId, GatewayError>;

    async fn edit_message(
        &self,
        channel: &ChannelId,
        message: &MessageId,
        payload: OutboundMessage,
    ) -> Result<(), GatewayError>;

    async fn delete_message(
        &self,
        channel: &ChannelId,
        message: &MessageId,
    ) -> Result<(), GatewayError>;

    async fn send_direct_message(
        &self,
        user: &UserId,
        message: OutboundMessage,
    ) -> Result<(), GatewayError>;

    async fn create_voice_channel(
        &self,
        name: &str,
        category: &ChannelId,
        owner: &UserId,
    ) -> Result<ChannelId, GatewayError>;

    async fn delete_channel(&self, channel: &ChannelId) -> Result<(), GatewayError>;

    async fn set_channel_name(&self, channel: &ChannelId, name: &str) -> Result<(), GatewayError>;

    /// Grant the elevated room-owner permission set on a channel.
    async fn grant_room_owner(
        &self,
        channel: &ChannelId,
        user: &UserId,
    ) -> Result<(), GatewayError>;

    /// Reduce a former owner back to the ordinary member permission set.
    async fn revoke_room_owner(
        &self,
        channel: &ChannelId,
        user: &UserId,
    ) -> Result<(), GatewayError>;

    async fn move_member(&self, user: &UserId, channel: &ChannelId) -> Result<(), GatewayError>;

    async fn member_display_name(&self, user: &UserId) -> Result<String, GatewayError>;

    /// Members currently in a voice channel.
    async fn channel_members(&self, channel: &ChannelId) -> Result<Vec<Member>, GatewayError>;

    /// All guild members holding a role.
    async fn role_members(&self, role: &RoleId) -> Result<Vec<Member>, GatewayError>;
}

// Permission bit constants for the room-owner overwrite.
const PERM_MANAGE_CHANNELS: u64 = 1 << 4;
const PERM_CONNECT: u64 = 1 << 20;
const PERM_SPEAK: u64 = 1 << 21;
const PERM_MUTE_MEMBERS: u64 = 1 << 22;
const PERM_DEAFEN_MEMBERS: u64 = 1 << 23;
const PERM_MOVE_MEMBERS: u64 = 1 << 24;

const OWNER_ALLOW: u64 = PERM_CONNECT
    | PERM_SPEAK
    | PERM_MUTE_MEMBERS
    | PERM_DEAFEN_MEMBERS
    | PERM_MANAGE_CHANNELS
    | PERM_MOVE_MEMBERS;
const MEMBER_ALLOW: u64 = PERM_CONNECT | PERM_SPEAK;

/// REST-backed `ChatOps` with client-side rate limiting.
///
/// The platform enforces per-route request budgets; a conservative global
/// limiter keeps this process well under them.
///
/// Voice-channel occupancy is not queryable over REST, so the connection
/// layer feeds observed voice states into `observe_voice_state` and
/// `channel_members` answers from that view.
pub struct RestChat {
    http: reqwest::Client,
    api_base: String,
    token: String,
    guild_id: String,
    limiter: Arc<DefaultDirectRateLimiter>,
    voice_states: Mutex<HashMap<UserId, ChannelId>>,
}

impl RestChat {
    pub fn new(
        token: String,
        api_base: String,
        guild_id: String,
        requests_per_second: u32,
        burst_capacity: u32,
    ) -> Result<Self, GatewayError> {
        if token.is_empty() {
            return Err(GatewayError::TokenNotFound(
                "set GUILDHALL_CHAT_TOKEN or DISCORD_TOKEN".to_string(),
            ));
        }
        let per_second = NonZeroU32::new(requests_per_second.max(1)).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst_capacity.max(1)).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(per_second).allow_burst(burst);

        Ok(Self {
            http: reqwest::Client::new(),
            api_base,
            token,
            guild_id,
            limiter: Arc::new(RateLimiter::direct(quota)),
            voice_states: Mutex::new(HashMap::new()),
        })
    }

    /// Record a voice-state transition observed by the connection layer.
    pub fn observe_voice_state(&self, user: UserId, channel: Option<ChannelId>) {
        let mut states = self.voice_states.lock().expect("voice state lock poisoned");
        match channel {
            Some(channel) => {
                states.insert(user, channel);
            }
            None => {
                states.remove(&user);
            }
        }
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, GatewayError> {
        self.limiter.until_ready().await;

        let url = format!("{}{}", self.api_base, path);
        debug!(method = %method, path, "gateway request");

        let mut req = self
            .http
            .request(method.clone(), &url)
            .header("Authorization", format!("Bot {}", self.token));
        if let Some(body) = &body {
            req = req.json(body);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                operation: format!("{method} {path}"),
                status: status.as_u16(),
                message,
            });
        }
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        Ok(response.json().await.unwrap_or(Value::Null))
    }

    fn message_body(payload: &OutboundMessage) -> Value {
        let mut body = serde_json::to_value(payload).unwrap_or_else(|_| json!({}));
        if payload.ephemeral {
            // Flag 64 marks the reply as visible to the invoker only.
            body["flags"] = json!(64);
        }
        body
    }

    fn extract_id(value: &Value, operation: &str) -> Result<String, GatewayError> {
        value["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| GatewayError::MalformedResponse {
                operation: operation.to_string(),
                detail: "response carried no id".to_string(),
            })
    }
}

#[async_trait]
impl ChatOps for RestChat {
    async fn send_message(
        &self,
        channel: &ChannelId,
        message: OutboundMessage,
    ) -> Result<MessageId, GatewayError> {
        let body = Self::message_body(&message);
        let value = self
            .request(Method::POST, &format!("/channels/{channel}/messages"), Some(body))
            .await?;
        Ok(MessageId::new(Self::extract_id(&value, "send_message")?))
    }

    async fn edit_message(
        &self,
        channel: &ChannelId,
        message: &MessageId,
        payload: OutboundMessage,
    ) -> Result<(), GatewayError> {
        let body = Self::message_body(&payload);
        self.request(
            Method::PATCH,
            &format!("/channels/{channel}/messages/{message}"),
            Some(body),
        )
        .await?;
        Ok(())
    }

    async fn delete_message(
        &self,
        channel: &ChannelId,
        message: &MessageId,
    ) -> Result<(), GatewayError> {
        self.request(
            Method::DELETE,
            &format!("/channels/{channel}/messages/{message}"),
            None,
        )
        .await?;
        Ok(())
    }

    async fn send_direct_message(
        &self,
        user: &UserId,
        message: OutboundMessage,
    ) -> Result<(), GatewayError> {
        let dm = self
            .request(
                Method::POST,
                "/users/@me/channels",
                Some(json!({ "recipient_id": user.as_str() })),
            )
            .await?;
        let dm_channel = ChannelId::new(Self::extract_id(&dm, "send_direct_message")?);
        self.send_message(&dm_channel, message).await?;
        Ok(())
    }

    async fn create_voice_channel(
        &self,
        name: &str,
        category: &ChannelId,
        owner: &UserId,
    ) -> Result<ChannelId, GatewayError> {
        let body = json!({
            "name": name,
            "type": 2,
            "parent_id": category.as_str(),
            "permission_overwrites": [
                {
                    "id": self.guild_id,
                    "type": 0,
                    "allow": MEMBER_ALLOW.to_string(),
                },
                {
                    "id": owner.as_str(),
                    "type": 1,
                    "allow": OWNER_ALLOW.to_string(),
                },
            ],
        });
        let value = self
            .request(
                Method::POST,
                &format!("/guilds/{}/channels", self.guild_id),
                Some(body),
            )
            .await?;
        Ok(ChannelId::new(Self::extract_id(&value, "create_voice_channel")?))
    }

    async fn delete_channel(&self, channel: &ChannelId) -> Result<(), GatewayError> {
        self.request(Method::DELETE, &format!("/channels/{channel}"), None)
            .await?;
        Ok(())
    }

    async fn set_channel_name(&self, channel: &ChannelId, name: &str) -> Result<(), GatewayError> {
        self.request(
            Method::PATCH,
            &format!("/channels/{channel}"),
            Some(json!({ "name": name })),
        )
        .await?;
        Ok(())
    }

    async fn grant_room_owner(
        &self,
        channel: &ChannelId,
        user: &UserId,
    ) -> Result<(), GatewayError> {
        self.request(
            Method::PUT,
            &format!("/channels/{channel}/permissions/{user}"),
            Some(json!({ "type": 1, "allow": OWNER_ALLOW.to_string() })),
        )
        .await?;
        Ok(())
    }

    async fn revoke_room_owner(
        &self,
        channel: &ChannelId,
        user: &UserId,
    ) -> Result<(), GatewayError> {
        self.request(
            Method::PUT,
            &format!("/channels/{channel}/permissions/{user}"),
            Some(json!({ "type": 1, "allow": MEMBER_ALLOW.to_string() })),
        )
        .await?;
        Ok(())
    }

    async fn move_member(&self, user: &UserId, channel: &ChannelId) -> Result<(), GatewayError> {
        self.request(
            Method::PATCH,
            &format!("/guilds/{}/members/{user}", self.guild_id),
            Some(json!({ "channel_id": channel.as_str() })),
        )
        .await?;
        Ok(())
    }

    async fn member_display_name(&self, user: &UserId) -> Result<String, GatewayError> {
        let value = self
            .request(
                Method::GET,
                &format!("/guilds/{}/members/{user}", self.guild_id),
                None,
            )
            .await?;
        let name = value["nick"]
            .as_str()
            .or_else(|| value["user"]["global_name"].as_str())
            .or_else(|| value["user"]["username"].as_str())
            .unwrap_or("unknown")
            .to_string();
        Ok(name)
    }

    async fn channel_members(&self, channel: &ChannelId) -> Result<Vec<Member>, GatewayError> {
        let occupants: Vec<UserId> = {
            let states = self.voice_states.lock().expect("voice state lock poisoned");
            states
                .iter()
                .filter(|(_, ch)| *ch == channel)
                .map(|(user, _)| user.clone())
                .collect()
        };

        let mut members = Vec::with_capacity(occupants.len());
        for user in occupants {
            let display_name = self
                .member_display_name(&user)
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            members.push(Member {
                id: user,
                display_name,
            });
        }
        Ok(members)
    }

    async fn role_members(&self, role: &RoleId) -> Result<Vec<Member>, GatewayError> {
        let value = self
            .request(
                Method::GET,
                &format!("/guilds/{}/members?limit=1000", self.guild_id),
                None,
            )
            .await?;

        let mut members = Vec::new();
        for entry in value.as_array().cloned().unwrap_or_default() {
            let holds_role = entry["roles"]
                .as_array()
                .map(|roles| roles.iter().any(|r| r.as_str() == Some(role.as_str())))
                .unwrap_or(false);
            if !holds_role {
                continue;
            }
            let Some(id) = entry["user"]["id"].as_str() else {
                continue;
            };
            let display_name = entry["nick"]
                .as_str()
                .or_else(|| entry["user"]["global_name"].as_str())
                .or_else(|| entry["user"]["username"].as_str())
                .unwrap_or("unknown")
                .to_string();
            members.push(Member {
                id: UserId::new(id),
                display_name,
            });
        }
        Ok(members)
    }
}
