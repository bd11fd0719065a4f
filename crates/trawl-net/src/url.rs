//! URL parsing, validation and relative resolution.

use trawl_core::TrawlError;
use trawl_core::TrawlResult;
use url::Url;

/// Supported application-level URL schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    pub fn is_secure(self) -> bool {
        matches!(self, Self::Https)
    }

    fn default_port(self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

/// Validated network URL used by the HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebUrl {
    parsed: Url,
    scheme: Scheme,
    host: String,
    port: u16,
}

impl WebUrl {
    pub fn parse(input: &str) -> TrawlResult<Self> {
        let mut parsed = Url::parse(input).map_err(|error| {
            TrawlError::invalid_url(
                "net.url.invalid",
                format!("failed to parse URL `{input}`: {error}"),
            )
        })?;

        let scheme = match parsed.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => {
                return Err(TrawlError::invalid_url(
                    "net.url.scheme_unsupported",
                    format!("unsupported scheme `{other}` in `{input}`"),
                ));
            }
        };

        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(TrawlError::invalid_url(
                "net.url.credentials_disallowed",
                "URL userinfo is not allowed; register credentials on the transport instead",
            ));
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| TrawlError::invalid_url("net.url.host_missing", "URL must include a host"))?
            .to_ascii_lowercase();

        let port = parsed
            .port_or_known_default()
            .unwrap_or_else(|| scheme.default_port());

        // Fragments never go on the wire.
        parsed.set_fragment(None);

        Ok(Self {
            parsed,
            scheme,
            host,
            port,
        })
    }

    pub fn as_str(&self) -> &str {
        self.parsed.as_str()
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_secure(&self) -> bool {
        self.scheme.is_secure()
    }

    pub fn authority(&self) -> String {
        if self.port == self.scheme.default_port() {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn path_and_query(&self) -> String {
        let path = if self.parsed.path().is_empty() {
            "/"
        } else {
            self.parsed.path()
        };

        match self.parsed.query() {
            Some(query) => format!("{path}?{query}"),
            None => path.to_owned(),
        }
    }
}

/// True for references carrying their own `http://` or `https://` scheme.
pub fn is_absolute_http(reference: &str) -> bool {
    let trimmed = reference.trim_start();
    starts_with_ignore_case(trimmed, "http://") || starts_with_ignore_case(trimmed, "https://")
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value.len() >= prefix.len()
        && value.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Resolves references against a base URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UrlResolver {
    /// Removes every literal `../` left in the joined URL.
    pub strip_parent_segments: bool,
}

impl UrlResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent_segment_stripping(mut self, enabled: bool) -> Self {
        self.strip_parent_segments = enabled;
        self
    }

    /// Joins `reference` onto `base`. Absolute http(s) references come back unchanged.
    pub fn resolve(&self, base: &str, reference: &str) -> TrawlResult<String> {
        if is_absolute_http(reference) {
            return Ok(reference.to_owned());
        }

        if base.trim().is_empty() {
            return Err(TrawlError::invalid_url(
                "net.url.no_base",
                format!("cannot resolve relative URL `{reference}` without a base URL"),
            ));
        }

        let base_url = Url::parse(base).map_err(|error| {
            TrawlError::invalid_url(
                "net.url.base_invalid",
                format!("base URL `{base}` is invalid: {error}"),
            )
        })?;

        let joined = base_url.join(reference).map_err(|error| {
            TrawlError::invalid_url(
                "net.url.join_failed",
                format!("failed to resolve `{reference}` against `{base}`: {error}"),
            )
        })?;

        let joined = joined.to_string();
        if self.strip_parent_segments {
            Ok(joined.replace("../", ""))
        } else {
            Ok(joined)
        }
    }
}
