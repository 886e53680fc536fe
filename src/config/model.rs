//! Configuration data model.
//!
//! All structs derive `Serialize`/`Deserialize` for TOML persistence.
//! Every field has a sensible default so the bot works out of the box
//! against a local server.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// The single nick allowed to run owner commands.
    #[serde(default = "default_owner")]
    pub owner: String,
    /// Channels joined after registration, in listed order.
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,
    /// Leading marker that turns a chat line into a command.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub seen: SeenConfig,
    #[serde(default)]
    pub reputation: ReputationConfig,
    #[serde(default)]
    pub links: LinksConfig,
    #[serde(default)]
    pub warn: WarnConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            owner: default_owner(),
            channels: default_channels(),
            prefix: default_prefix(),
            reconnect: ReconnectConfig::default(),
            timeouts: TimeoutConfig::default(),
            seen: SeenConfig::default(),
            reputation: ReputationConfig::default(),
            links: LinksConfig::default(),
            warn: WarnConfig::default(),
        }
    }
}

/// The IRC server connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Sent as `PASS` before registration when present.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_nickname")]
    pub nickname: String,
    #[serde(default = "default_nickname")]
    pub realname: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: None,
            nickname: default_nickname(),
            realname: default_nickname(),
        }
    }
}

/// Reconnection backoff tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,
    /// Consecutive failed attempts before giving up. `0` retries forever.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: default_initial_delay(),
            max_delay_secs: default_max_delay(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_connect_secs")]
    pub connect_secs: u64,
    #[serde(default = "default_registration_secs")]
    pub registration_secs: u64,
    /// No traffic for this long counts as a dead connection.
    #[serde(default = "default_idle_secs")]
    pub idle_secs: u64,
    /// How long a handler waits on a request/reply round trip.
    #[serde(default = "default_request_secs")]
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: default_connect_secs(),
            registration_secs: default_registration_secs(),
            idle_secs: default_idle_secs(),
            request_secs: default_request_secs(),
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
    pub fn registration(&self) -> Duration {
        Duration::from_secs(self.registration_secs)
    }
    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }
}

/// "Last seen" activity store settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SeenConfig {
    /// Store file; defaults to `seen.json` under the platform data dir.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Nicks whose activity is never recorded (other bots, bridges).
    #[serde(default)]
    pub ignore: Vec<String>,
}

/// IP reputation lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationConfig {
    #[serde(default = "default_reputation_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_reputation_timeout")]
    pub timeout_secs: u64,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_reputation_endpoint(),
            timeout_secs: default_reputation_timeout(),
        }
    }
}

/// External URLs handed out by commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksConfig {
    #[serde(default = "default_ticket_url")]
    pub ticket: String,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            ticket: default_ticket_url(),
        }
    }
}

/// The rate-limited `warn` notice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarnConfig {
    /// Channel the notice goes to; unset disables the command.
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default = "default_warn_text")]
    pub text: String,
    #[serde(default = "default_warn_cooldown")]
    pub cooldown_secs: u64,
}

impl Default for WarnConfig {
    fn default() -> Self {
        Self {
            channel: None,
            text: default_warn_text(),
            cooldown_secs: default_warn_cooldown(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    6667
}
fn default_nickname() -> String {
    "modbot".to_string()
}
fn default_owner() -> String {
    "owner".to_string()
}
fn default_channels() -> Vec<String> {
    vec!["#modbot".to_string()]
}
fn default_prefix() -> String {
    "!".to_string()
}
fn default_initial_delay() -> u64 {
    2
}
fn default_max_delay() -> u64 {
    60
}
fn default_max_attempts() -> u32 {
    10
}
fn default_connect_secs() -> u64 {
    30
}
fn default_registration_secs() -> u64 {
    60
}
fn default_idle_secs() -> u64 {
    300
}
fn default_request_secs() -> u64 {
    10
}
fn default_reputation_endpoint() -> String {
    "http://check.getipintel.net/check.php".to_string()
}
fn default_reputation_timeout() -> u64 {
    5
}
fn default_ticket_url() -> String {
    "https://support.example.com/appeal".to_string()
}
fn default_warn_text() -> String {
    "Please take off-topic discussion elsewhere".to_string()
}
fn default_warn_cooldown() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg: BotConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.server.host, "localhost");
        assert_eq!(cfg.server.port, 6667);
        assert_eq!(cfg.prefix, "!");
        assert_eq!(cfg.reconnect.max_attempts, 10);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let cfg: BotConfig = toml::from_str(
            r##"
            owner = "Hootie"
            channels = ["#A", "#b"]

            [server]
            host = "irc.example.net"
            password = "hunter2"
            "##,
        )
        .unwrap();
        assert_eq!(cfg.owner, "Hootie");
        assert_eq!(cfg.channels, vec!["#A", "#b"]);
        assert_eq!(cfg.server.host, "irc.example.net");
        assert_eq!(cfg.server.password.as_deref(), Some("hunter2"));
        assert_eq!(cfg.server.port, 6667);
        assert_eq!(cfg.timeouts.request_secs, 10);
    }
}
