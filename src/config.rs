use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub stripe: StripeConfig,
    #[serde(default)]
    pub mail: MailConfig,
    pub site: SiteConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Shared HS256 secret of the hosted auth provider that issues user tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Resend API key; when empty, emails are only written to the log
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_mail_api_url")]
    pub api_url: String,
    pub from_email: String,
    pub from_name: String,
}

fn default_mail_api_url() -> String {
    "https://api.resend.com/emails".to_string()
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: default_mail_api_url(),
            from_email: "noreply@localhost".to_string(),
            from_name: "Resource Hub".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Public base URL of the frontend, used for redirects and links in emails
    pub base_url: String,
}

impl SiteConfig {
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Run the expiration notifiers from the in-process scheduler
    #[serde(default)]
    pub enabled: bool,
    /// Hour of the day (UTC) at which the daily run starts
    #[serde(default = "default_run_at_hour")]
    pub run_at_hour: u32,
    /// Shared secret expected in `X-Cron-Secret` by the cron endpoints
    #[serde(default)]
    pub cron_secret: String,
}

fn default_run_at_hour() -> u32 {
    9
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            run_at_hour: default_run_at_hour(),
            cron_secret: String::new(),
        }
    }
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => toml::from_str(&config_str)
                .map_err(|e| format!("Failed to parse config file {config_path}: {e}"))?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                let database_url = get_env("DATABASE_URL")
                    .ok_or("DATABASE_URL is not set and no config.toml was found")?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    jwt: JwtConfig {
                        secret: get_env("JWT_SECRET")
                            .unwrap_or_else(|| "change-me-in-production".to_string()),
                    },
                    stripe: StripeConfig {
                        secret_key: get_env("STRIPE_SECRET_KEY").unwrap_or_default(),
                        webhook_secret: get_env("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
                    },
                    mail: MailConfig::default(),
                    site: SiteConfig {
                        base_url: get_env("SITE_BASE_URL")
                            .unwrap_or_else(|| "http://localhost:3000".to_string()),
                    },
                    notifier: NotifierConfig::default(),
                }
            }
            Err(e) => {
                return Err(format!("Failed to read config file {config_path}: {e}").into());
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Environment variables win over values from the file.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            self.server.port = p;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            self.database.max_connections = mc;
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.jwt.secret = v;
        }
        if let Ok(v) = env::var("STRIPE_SECRET_KEY") {
            self.stripe.secret_key = v;
        }
        if let Ok(v) = env::var("STRIPE_WEBHOOK_SECRET") {
            self.stripe.webhook_secret = v;
        }
        if let Ok(v) = env::var("MAIL_API_KEY") {
            self.mail.api_key = v;
        }
        if let Ok(v) = env::var("MAIL_API_URL") {
            self.mail.api_url = v;
        }
        if let Ok(v) = env::var("MAIL_FROM_EMAIL") {
            self.mail.from_email = v;
        }
        if let Ok(v) = env::var("MAIL_FROM_NAME") {
            self.mail.from_name = v;
        }
        if let Ok(v) = env::var("SITE_BASE_URL") {
            self.site.base_url = v;
        }
        if let Ok(v) = env::var("NOTIFIER_ENABLED")
            && let Ok(b) = v.parse()
        {
            self.notifier.enabled = b;
        }
        if let Ok(v) = env::var("NOTIFIER_RUN_AT_HOUR")
            && let Ok(h) = v.parse()
        {
            self.notifier.run_at_hour = h;
        }
        if let Ok(v) = env::var("CRON_SECRET") {
            self.notifier.cron_secret = v;
        }
    }

    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.notifier.run_at_hour > 23 {
            return Err(format!(
                "notifier.run_at_hour must be within 0..=23, got {}",
                self.notifier.run_at_hour
            )
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [server]
        host = "127.0.0.1"
        port = 9000

        [database]
        url = "postgres://localhost/hub"
        max_connections = 5

        [jwt]
        secret = "secret"

        [stripe]
        secret_key = "sk_test"
        webhook_secret = "whsec_test"

        [site]
        base_url = "https://example.com/"
    "#;

    #[test]
    fn parses_minimal_file_with_defaults() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.server.port, 9000);
        assert!(!config.notifier.enabled);
        assert_eq!(config.notifier.run_at_hour, 9);
        assert_eq!(config.mail.api_url, "https://api.resend.com/emails");
        assert!(config.mail.api_key.is_empty());
    }

    #[test]
    fn site_url_joins_without_double_slash() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(
            config.site.url("/checkout/success"),
            "https://example.com/checkout/success"
        );
    }

    #[test]
    fn rejects_out_of_range_run_hour() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.notifier.run_at_hour = 24;
        assert!(config.validate().is_err());
    }
}
