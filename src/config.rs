use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for Guildhall
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GuildhallConfig {
    /// Chat gateway settings
    pub chat: ChatConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
    /// Vote feature settings
    pub votes: VoteConfig,
    /// Donation-ledger feature settings
    pub influence: InfluenceConfig,
    /// Voice-room feature settings
    pub voice: VoiceConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatConfig {
    /// Bot token (can be set via env var)
    pub token: Option<String>,
    /// REST API base URL
    pub api_base: String,
    /// Server the bot operates in
    pub guild_id: String,
    /// Leading prefix for text commands
    pub command_prefix: String,
    /// Rate limiting settings
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second limit
    pub requests_per_second: u32,
    /// Burst capacity
    pub burst_capacity: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level
    pub log_level: String,
    /// Emit JSON-structured log lines
    pub json_logs: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VoteConfig {
    /// Role allowed to create and close votes (admins always may)
    pub admin_role_id: Option<String>,
    /// Live-summary refresh sweep interval in seconds
    pub refresh_interval_secs: u64,
    /// Vote duration when the command names none, in hours
    pub default_duration_hours: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InfluenceConfig {
    /// Channel where donation reviews await approval
    pub review_channel_id: String,
    /// Role allowed to invoke the panel command (admins always may)
    pub admin_role_id: Option<String>,
    /// Role whose holders count as expected donors; drives the details
    /// panel's coverage figures and the non-contributor listing
    pub eligible_role_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VoiceConfig {
    /// Joining this channel provisions a room
    pub lobby_channel_id: String,
    /// Category new rooms are created under
    pub category_id: String,
}

impl Default for GuildhallConfig {
    fn default() -> Self {
        Self {
            chat: ChatConfig {
                token: None, // Will be read from env var or config file
                api_base: "https://discord.com/api/v10".to_string(),
                guild_id: String::new(),
                command_prefix: "!".to_string(),
                rate_limit: RateLimitConfig {
                    requests_per_second: 5,
                    burst_capacity: 10,
                },
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
            },
            votes: VoteConfig {
                admin_role_id: None,
                refresh_interval_secs: 300,
                default_duration_hours: 72,
            },
            influence: InfluenceConfig {
                review_channel_id: String::new(),
                admin_role_id: None,
                eligible_role_id: None,
            },
            voice: VoiceConfig {
                lobby_channel_id: String::new(),
                category_id: String::new(),
            },
        }
    }
}

impl GuildhallConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (guildhall.toml)
    /// 3. Environment variables (prefixed with GUILDHALL_)
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder();

        // Start with defaults
        let defaults = Config::try_from(&GuildhallConfig::default())?;
        builder = builder.add_source(defaults);

        // Add config file if it exists
        if Path::new("guildhall.toml").exists() {
            builder = builder.add_source(File::with_name("guildhall"));
        }

        // Add environment variables (GUILDHALL_ prefix)
        builder = builder.add_source(
            Environment::with_prefix("GUILDHALL")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let mut guildhall_config: GuildhallConfig = config.try_deserialize()?;

        // Special handling for the bot token - check multiple sources
        if guildhall_config.chat.token.is_none() {
            if let Ok(token) = std::env::var("DISCORD_TOKEN") {
                guildhall_config.chat.token = Some(token);
            } else if let Ok(token) = std::env::var("GUILDHALL_CHAT_TOKEN") {
                guildhall_config.chat.token = Some(token);
            }
        }

        Ok(guildhall_config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }

    /// Check the fields the defaults cannot supply.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.chat.token.is_none() {
            missing.push("chat.token");
        }
        if self.chat.guild_id.is_empty() {
            missing.push("chat.guild_id");
        }
        if self.influence.review_channel_id.is_empty() {
            missing.push("influence.review_channel_id");
        }
        if self.voice.lobby_channel_id.is_empty() {
            missing.push("voice.lobby_channel_id");
        }
        if self.voice.category_id.is_empty() {
            missing.push("voice.category_id");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("missing required configuration: {}", missing.join(", "))
        }
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<GuildhallConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = GuildhallConfig::load_env_file();
        GuildhallConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static GuildhallConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}
