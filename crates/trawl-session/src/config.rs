//! Session settings with defaults and environment overrides.

use std::time::Duration;
use trawl_core::ErrorKind;
use trawl_core::TrawlError;
use trawl_core::TrawlResult;
use trawl_net::TlsPolicy;
use trawl_net::TransportConfig;
use trawl_net::UrlResolver;

pub const DEFAULT_USER_AGENT: &str = "trawl/1.0";

/// Behavior shared by a session and every duplicate made from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub user_agent: String,
    /// Extra attempts after a transport failure.
    pub retries: u32,
    pub retry_delay: Duration,
    pub max_redirects: usize,
    pub connect_timeout: Duration,
    /// Remove literal `../` from resolved URLs, as some legacy sites expect.
    pub strip_parent_segments: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            retries: 3,
            retry_delay: Duration::from_secs(1),
            max_redirects: 10,
            connect_timeout: Duration::from_secs(10),
            strip_parent_segments: false,
        }
    }
}

impl SessionConfig {
    /// Defaults overridden by `TRAWL_*` environment variables.
    pub fn from_env() -> TrawlResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `TRAWL_*` name.
    pub fn from_lookup<F>(lookup: F) -> TrawlResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(agent) = lookup("TRAWL_USER_AGENT") {
            if !agent.trim().is_empty() {
                config.user_agent = agent;
            }
        }
        if let Some(raw) = lookup("TRAWL_RETRIES") {
            config.retries = parse_number("TRAWL_RETRIES", &raw)?;
        }
        if let Some(raw) = lookup("TRAWL_RETRY_DELAY_MS") {
            config.retry_delay = Duration::from_millis(parse_number("TRAWL_RETRY_DELAY_MS", &raw)?);
        }
        if let Some(raw) = lookup("TRAWL_MAX_REDIRECTS") {
            config.max_redirects = parse_number("TRAWL_MAX_REDIRECTS", &raw)?;
        }
        if let Some(raw) = lookup("TRAWL_CONNECT_TIMEOUT_MS") {
            config.connect_timeout =
                Duration::from_millis(parse_number("TRAWL_CONNECT_TIMEOUT_MS", &raw)?);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TrawlResult<()> {
        if self.user_agent.contains(['\r', '\n']) {
            return Err(TrawlError::new(
                ErrorKind::Config,
                "session.config.user_agent_invalid",
                "user agent must be a single line",
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err(TrawlError::new(
                ErrorKind::Config,
                "session.config.connect_timeout_zero",
                "connect timeout must be greater than zero",
            ));
        }

        Ok(())
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            max_redirects: self.max_redirects,
            connect_timeout: self.connect_timeout,
            tls: TlsPolicy::default(),
        }
    }

    pub fn url_resolver(&self) -> UrlResolver {
        UrlResolver::new().with_parent_segment_stripping(self.strip_parent_segments)
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> TrawlResult<T> {
    raw.trim().parse::<T>().map_err(|_| {
        TrawlError::new(
            ErrorKind::Config,
            "session.config.invalid_number",
            format!("{name} must be a non-negative integer, got `{raw}`"),
        )
    })
}
