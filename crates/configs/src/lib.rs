use anyhow::Result;
use serde::Deserialize;
use anyhow::anyhow;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub referral: ReferralConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
    /// Base of shareable referral links; defaults to `http://{host}:{port}`
    #[serde(default)]
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080, worker_threads: Some(4), public_url: None }
    }
}

impl ServerConfig {
    pub fn public_base_url(&self) -> String {
        match &self.public_url {
            Some(u) if !u.trim().is_empty() => u.trim().trim_end_matches('/').to_string(),
            _ => format!("http://{}:{}", self.host, self.port),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: u64,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    #[serde(default)]
    pub sqlx_logging: bool,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            max_lifetime_secs: default_max_lifetime(),
            acquire_timeout_secs: default_acquire_timeout(),
            sqlx_logging: false,
            run_migrations: true,
        }
    }
}

fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 30 }
fn default_idle_timeout() -> u64 { 600 }
fn default_max_lifetime() -> u64 { 3600 }
fn default_acquire_timeout() -> u64 { 30 }
fn default_true() -> bool { true }

/// Tunables of the referral engine.
#[derive(Debug, Clone, Deserialize)]
pub struct ReferralConfig {
    /// Award granted to the direct inviter; halves at every further level.
    #[serde(default = "default_base_award")]
    pub base_award: i64,
    /// Traversal safety cap for upline/downline walks.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    #[serde(default = "default_referral_code_len")]
    pub referral_code_len: usize,
    #[serde(default = "default_max_leaderboard_limit")]
    pub max_leaderboard_limit: u64,
}

impl Default for ReferralConfig {
    fn default() -> Self {
        Self {
            base_award: default_base_award(),
            max_depth: default_max_depth(),
            referral_code_len: default_referral_code_len(),
            max_leaderboard_limit: default_max_leaderboard_limit(),
        }
    }
}

fn default_base_award() -> i64 { 1000 }
fn default_max_depth() -> u32 { 50 }
fn default_referral_code_len() -> usize { 8 }
fn default_max_leaderboard_limit() -> u64 { 200 }

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub jwt_secret: String,
}

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let cfg: AppConfig = toml::from_str(&content)?;
    Ok(cfg)
}

impl AppConfig {
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    /// Like `load_and_validate`, but a missing config file yields defaults
    /// filled from the environment.
    pub fn load_or_env() -> Result<Self> {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        let mut cfg = if std::path::Path::new(&path).exists() {
            load_from_file(&path)?
        } else {
            AppConfig::default()
        };
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        // URL may come from DATABASE_URL when the TOML leaves it empty
        self.database.normalize_from_env();
        self.database.validate()?;
        self.referral.validate()?;
        self.auth.normalize_from_env();
        Ok(())
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be within 1..=65535"));
        }
        match self.worker_threads {
            Some(0) | None => self.worker_threads = Some(4),
            Some(_) => {}
        }
        Ok(())
    }
}

impl DatabaseConfig {
    pub fn normalize_from_env(&mut self) {
        if self.url.trim().is_empty() {
            if let Ok(url) = std::env::var("DATABASE_URL") {
                self.url = url;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(anyhow!("database.url is empty; set it in config.toml or DATABASE_URL"));
        }
        let lower = self.url.to_lowercase();
        if !(lower.starts_with("postgresql://") || lower.starts_with("postgres://")) {
            return Err(anyhow!("database.url must start with postgresql:// or postgres://"));
        }
        if self.min_connections == 0 {
            return Err(anyhow!("database.min_connections must be >= 1"));
        }
        if self.max_connections < self.min_connections {
            return Err(anyhow!("database.max_connections must be >= min_connections"));
        }
        if self.connect_timeout_secs == 0 || self.acquire_timeout_secs == 0 {
            return Err(anyhow!("database timeouts must be positive seconds"));
        }
        Ok(())
    }
}

impl ReferralConfig {
    pub fn validate(&self) -> Result<()> {
        if self.base_award < 1 {
            return Err(anyhow!("referral.base_award must be >= 1"));
        }
        if self.max_depth == 0 || self.max_depth > 1000 {
            return Err(anyhow!("referral.max_depth must be within 1..=1000"));
        }
        if !(6..=32).contains(&self.referral_code_len) {
            return Err(anyhow!("referral.referral_code_len must be within 6..=32"));
        }
        if self.max_leaderboard_limit == 0 {
            return Err(anyhow!("referral.max_leaderboard_limit must be >= 1"));
        }
        Ok(())
    }
}

impl AuthConfig {
    pub fn normalize_from_env(&mut self) {
        if self.jwt_secret.trim().is_empty() {
            if let Ok(secret) = std::env::var("JWT_SECRET") {
                self.jwt_secret = secret;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_toml_with_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [server]
            host = "0.0.0.0"
            port = 9000

            [database]
            url = "postgres://u:p@localhost:5432/referrals"

            [referral]
            max_depth = 20
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.database.max_connections, 10);
        assert!(cfg.database.run_migrations);
        assert_eq!(cfg.referral.max_depth, 20);
        assert_eq!(cfg.referral.base_award, 1000);
        assert_eq!(cfg.referral.referral_code_len, 8);
    }

    #[test]
    fn rejects_non_postgres_url() {
        let mut db = DatabaseConfig::default();
        db.url = "mysql://localhost/x".into();
        assert!(db.validate().is_err());
        db.url = "postgres://localhost/x".into();
        assert!(db.validate().is_ok());
    }

    #[test]
    fn referral_bounds_are_enforced() {
        let mut r = ReferralConfig::default();
        assert!(r.validate().is_ok());
        r.max_depth = 0;
        assert!(r.validate().is_err());
        r.max_depth = 50;
        r.referral_code_len = 4;
        assert!(r.validate().is_err());
        r.referral_code_len = 8;
        r.base_award = 0;
        assert!(r.validate().is_err());
    }

    #[test]
    fn zero_worker_threads_fall_back() {
        let mut s = ServerConfig { host: " ".into(), port: 8080, worker_threads: Some(0), public_url: None };
        s.normalize().unwrap();
        assert_eq!(s.host, "127.0.0.1");
        assert_eq!(s.worker_threads, Some(4));
        assert_eq!(s.public_base_url(), "http://127.0.0.1:8080");
        s.public_url = Some("https://join.example.com/".into());
        assert_eq!(s.public_base_url(), "https://join.example.com");
    }
}
