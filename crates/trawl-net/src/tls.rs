//! TLS policy for HTTPS requests.

use crate::url::Scheme;
use crate::url::WebUrl;
use std::net::IpAddr;
use trawl_core::ErrorKind;
use trawl_core::TrawlError;
use trawl_core::TrawlResult;

/// Supported TLS protocol versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    V1_2,
    V1_3,
}

/// Which trust anchors verify server certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustStoreMode {
    /// Embedded Mozilla/WebPKI roots only.
    WebPkiOnly,
    /// WebPKI roots merged with operating-system roots.
    WebPkiAndOs,
}

/// Per-connection handshake parameters derived from a [`TlsPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsHandshake {
    pub server_name: String,
    pub minimum_version: TlsVersion,
    pub maximum_version: TlsVersion,
    pub enable_sni: bool,
    pub trust_store_mode: TrustStoreMode,
}

/// TLS settings shared by every request a transport makes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPolicy {
    pub minimum_version: TlsVersion,
    pub maximum_version: TlsVersion,
    pub trust_store_mode: TrustStoreMode,
    /// Refuse plain `http://` requests.
    pub https_only: bool,
}

impl Default for TlsPolicy {
    fn default() -> Self {
        Self {
            minimum_version: TlsVersion::V1_2,
            maximum_version: TlsVersion::V1_3,
            trust_store_mode: TrustStoreMode::WebPkiOnly,
            https_only: false,
        }
    }
}

impl TlsPolicy {
    pub fn with_trust_store_mode(mut self, mode: TrustStoreMode) -> Self {
        self.trust_store_mode = mode;
        self
    }

    pub fn validate(&self) -> TrawlResult<()> {
        if self.minimum_version > self.maximum_version {
            return Err(TrawlError::new(
                ErrorKind::Config,
                "net.tls.invalid_version_range",
                "minimum TLS version cannot be greater than maximum version",
            ));
        }

        Ok(())
    }

    /// Handshake parameters for `url`, `None` for plain HTTP.
    pub fn handshake_for(&self, url: &WebUrl) -> TrawlResult<Option<TlsHandshake>> {
        self.validate()?;

        match url.scheme() {
            Scheme::Http if self.https_only => Err(TrawlError::transport(
                "net.tls.https_only",
                format!("HTTPS-only mode blocks `{}`", url.as_str()),
            )),
            Scheme::Http => Ok(None),
            Scheme::Https => Ok(Some(TlsHandshake {
                server_name: url.host().trim_matches(['[', ']']).to_owned(),
                minimum_version: self.minimum_version,
                maximum_version: self.maximum_version,
                enable_sni: !is_ip_address(url.host()),
                trust_store_mode: self.trust_store_mode,
            })),
        }
    }
}

fn is_ip_address(host: &str) -> bool {
    host.trim_matches(['[', ']']).parse::<IpAddr>().is_ok()
}
