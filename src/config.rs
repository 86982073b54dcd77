use std::net::IpAddr;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub host: IpAddr,
    pub port: u16,
    pub environment: String,
    pub max_body_size: usize,
    pub cors_origins: Vec<String>,
    pub log_level: String,
    pub reset: ResetConfig,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone)]
pub struct ResetConfig {
    pub token_ttl_minutes: i64,
    pub delivery: ResetDelivery,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            token_ttl_minutes: 15,
            delivery: ResetDelivery::Response,
        }
    }
}

/// Where an issued reset code goes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResetDelivery {
    /// Echo the code back in the forgot-password response (demo flow).
    Response,
    /// Send the code through the configured notifier; never echo it.
    Email,
}

impl ResetDelivery {
    fn parse(s: &str) -> Result<Self, String> {
        match s.trim().to_ascii_lowercase().as_str() {
            "response" => Ok(ResetDelivery::Response),
            "email" => Ok(ResetDelivery::Email),
            other => Err(format!(
                "Invalid BLOODLINE_RESET_DELIVERY '{other}' (expected 'response' or 'email')"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_required("DATABASE_URL")?;
        let jwt_secret = env_required("JWT_SECRET")?;

        let host: IpAddr = env_or("BLOODLINE_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid BLOODLINE_HOST: {e}"))?;

        let port: u16 = env_or("BLOODLINE_PORT", "5000")
            .parse()
            .map_err(|e| format!("Invalid BLOODLINE_PORT: {e}"))?;

        let environment = env_or("BLOODLINE_ENV", "development");

        let max_body_size: usize = env_or("BLOODLINE_MAX_BODY_SIZE", "65536")
            .parse()
            .map_err(|e| format!("Invalid BLOODLINE_MAX_BODY_SIZE: {e}"))?;

        let cors_origins = parse_list(&env_or("BLOODLINE_CORS_ORIGINS", "http://localhost:3000"));

        let log_level = env_or("BLOODLINE_LOG_LEVEL", "info");

        let token_ttl_minutes: i64 = env_or("BLOODLINE_RESET_TOKEN_TTL_MINUTES", "15")
            .parse()
            .map_err(|e| format!("Invalid BLOODLINE_RESET_TOKEN_TTL_MINUTES: {e}"))?;
        if token_ttl_minutes <= 0 {
            return Err("BLOODLINE_RESET_TOKEN_TTL_MINUTES must be positive".to_string());
        }

        let delivery = ResetDelivery::parse(&env_or("BLOODLINE_RESET_DELIVERY", "response"))?;

        let smtp = match (
            std::env::var("BLOODLINE_SMTP_HOST").ok(),
            std::env::var("BLOODLINE_SMTP_PORT").ok(),
            std::env::var("BLOODLINE_SMTP_USER").ok(),
            std::env::var("BLOODLINE_SMTP_PASS").ok(),
            std::env::var("BLOODLINE_SMTP_FROM").ok(),
        ) {
            (Some(host), Some(port), Some(user), Some(pass), Some(from)) => Some(SmtpConfig {
                host,
                port: port
                    .parse()
                    .map_err(|e| format!("Invalid BLOODLINE_SMTP_PORT: {e}"))?,
                user,
                pass,
                from,
            }),
            _ => None,
        };

        Ok(Config {
            database_url,
            jwt_secret,
            host,
            port,
            environment,
            max_body_size,
            cors_origins,
            log_level,
            reset: ResetConfig {
                token_ttl_minutes,
                delivery,
            },
            smtp,
        })
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
