//! Application configuration.

/// Runtime configuration resolved from the environment.
///
/// Delivery channels are opt-in: an unset bot token or relay URL disables
/// that channel without affecting the rest of the service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the ledger RPC.
    pub rpc_url: String,
    /// Telegram bot token for chat delivery.
    pub telegram_bot_token: Option<String>,
    /// HTTP mail relay endpoint for email delivery.
    pub mail_relay_url: Option<String>,
    /// Sender address on relayed mail.
    pub mail_from: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://rpc.qubic.org".to_string(),
            telegram_bot_token: None,
            mail_relay_url: None,
            mail_from: "tracker@localhost".to_string(),
        }
    }
}

impl AppConfig {
    /// Read configuration from the environment, falling back to defaults.
    /// Blank values count as unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            rpc_url: env_var("QUBIC_RPC_URL").unwrap_or(defaults.rpc_url),
            telegram_bot_token: env_var("TELEGRAM_BOT_TOKEN"),
            mail_relay_url: env_var("MAIL_RELAY_URL"),
            mail_from: env_var("MAIL_FROM").unwrap_or(defaults.mail_from),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_point_at_the_public_rpc() {
        let config = AppConfig::default();
        assert_eq!(config.rpc_url, "https://rpc.qubic.org");
        assert!(config.telegram_bot_token.is_none());
        assert!(config.mail_relay_url.is_none());
    }
}
