//! Networking for trawl sessions: URL resolution, a blocking HTTP/1.1 client,
//! cookies, Basic credentials, and the [`HttpTransport`] seam.

pub mod auth;
pub mod client;
pub mod connect;
pub mod cookies;
pub mod http;
pub mod opener;
pub mod pool;
pub mod tls;
pub mod tls_backend;
pub mod url;

pub use client::Http11Client;
pub use cookies::CookieJar;
pub use http::Header;
pub use http::Headers;
pub use http::HttpMethod;
pub use http::HttpStatusCode;
pub use opener::HttpTransport;
pub use opener::StandardTransport;
pub use opener::TransportConfig;
pub use opener::TransportRequest;
pub use opener::TransportResponse;
pub use tls::TlsPolicy;
pub use tls::TlsVersion;
pub use tls::TrustStoreMode;
pub use url::Scheme;
pub use url::UrlResolver;
pub use url::WebUrl;
pub use url::is_absolute_http;
