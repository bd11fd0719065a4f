//! The transport seam sessions fetch through, and its standard implementation.

use crate::auth::CredentialStore;
use crate::auth::offers_basic;
use crate::client::Http11Client;
use crate::cookies::CookieJar;
use crate::http::Headers;
use crate::http::HttpMethod;
use crate::http::HttpRequest;
use crate::http::HttpResponse;
use crate::tls::TlsPolicy;
use crate::url::UrlResolver;
use crate::url::WebUrl;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;
use trawl_core::TrawlError;
use trawl_core::TrawlResult;

const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// One navigation request. A body makes it a POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    pub url: String,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
}

impl TransportRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Headers::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            url: url.into(),
            headers: Headers::new(),
            body: Some(body),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> TrawlResult<Self> {
        self.headers.set(name, value)?;
        Ok(self)
    }
}

/// Final outcome of a request after redirects and authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub final_url: String,
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

/// Performs HTTP requests on behalf of one or more sessions.
///
/// Implementations keep cookies and credentials for everything routed through
/// them and must tolerate concurrent callers.
pub trait HttpTransport: Send + Sync {
    fn open(&self, request: &TransportRequest) -> TrawlResult<TransportResponse>;
}

/// Settings for [`StandardTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub max_redirects: usize,
    pub connect_timeout: Duration,
    pub tls: TlsPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_redirects: 10,
            connect_timeout: Duration::from_secs(10),
            tls: TlsPolicy::default(),
        }
    }
}

/// Blocking HTTP/1.1 transport with a cookie jar, redirects and Basic auth.
pub struct StandardTransport {
    max_redirects: usize,
    client: Mutex<Http11Client>,
    cookies: Mutex<CookieJar>,
    credentials: Mutex<CredentialStore>,
}

impl StandardTransport {
    pub fn new(config: TransportConfig) -> TrawlResult<Self> {
        let mut client = Http11Client::new(config.tls)?;
        client.set_connect_timeout(config.connect_timeout);

        Ok(Self {
            max_redirects: config.max_redirects,
            client: Mutex::new(client),
            cookies: Mutex::new(CookieJar::new()),
            credentials: Mutex::new(CredentialStore::new()),
        })
    }

    /// Registers Basic credentials for every URL under `url_prefix`.
    pub fn add_credentials(&self, url_prefix: &str, username: &str, password: &str) {
        lock(&self.credentials).add(url_prefix, username, password);
    }

    /// Snapshot of the current cookie jar.
    pub fn cookies(&self) -> CookieJar {
        lock(&self.cookies).clone()
    }

    pub fn clear_cookies(&self) {
        lock(&self.cookies).clear();
    }

    fn build_request(
        &self,
        method: HttpMethod,
        url: &WebUrl,
        caller_headers: &Headers,
        body: &[u8],
        authorization: Option<&str>,
    ) -> TrawlResult<HttpRequest> {
        let mut builder = HttpRequest::builder(method, url.clone())
            .header("Accept", DEFAULT_ACCEPT)?
            .header("Accept-Encoding", "gzip, deflate, br")?
            .headers(caller_headers.iter())?;

        if method == HttpMethod::Post {
            if !caller_headers.contains("content-type") {
                builder = builder.header("Content-Type", FORM_CONTENT_TYPE)?;
            }
            builder = builder.body(body.to_vec());
        }

        if let Some(cookie) = lock(&self.cookies).header_for(url) {
            builder = builder.header("Cookie", &cookie)?;
        }

        if let Some(authorization) = authorization {
            builder = builder.header("Authorization", authorization)?;
        }

        let mut request = builder.build()?;
        if method != HttpMethod::Post {
            request.headers.remove("content-type");
        }
        Ok(request)
    }

    fn send(&self, request: &HttpRequest) -> TrawlResult<HttpResponse> {
        tracing::debug!(
            method = request.method.as_str(),
            url = request.url.as_str(),
            body_bytes = request.body.len(),
            "sending request"
        );
        let response = lock(&self.client).send(request)?;
        tracing::debug!(
            status = response.status.as_u16(),
            url = request.url.as_str(),
            "received response"
        );

        lock(&self.cookies).store(&request.url, response.headers.get_all("set-cookie"));
        Ok(response)
    }
}

impl HttpTransport for StandardTransport {
    fn open(&self, request: &TransportRequest) -> TrawlResult<TransportResponse> {
        let mut url = WebUrl::parse(&request.url)?;
        let mut method = match request.body {
            Some(_) => HttpMethod::Post,
            None => HttpMethod::Get,
        };
        let mut body = request.body.clone().unwrap_or_default();
        let mut redirects = 0_usize;
        let mut authorization: Option<String> = None;

        loop {
            let outgoing =
                self.build_request(method, &url, &request.headers, &body, authorization.as_deref())?;
            let response = self.send(&outgoing)?;
            let status = response.status.as_u16();

            if response.status.is_redirect() {
                if let Some(location) = response.headers.get("location") {
                    if redirects >= self.max_redirects {
                        return Err(TrawlError::transport(
                            "net.redirect.limit",
                            format!(
                                "stopped after {} redirects starting at `{}`",
                                self.max_redirects, request.url
                            ),
                        ));
                    }
                    redirects += 1;

                    let next = redirect_target(&url, location)?;
                    tracing::debug!(status, from = url.as_str(), to = next.as_str(), "following redirect");
                    if matches!(status, 301..=303) {
                        method = HttpMethod::Get;
                        body.clear();
                    }
                    url = next;
                    authorization = None;
                    continue;
                }
            }

            if status == 401 && authorization.is_none() {
                let challenged = response
                    .headers
                    .get_all("www-authenticate")
                    .any(offers_basic);
                let credentials = lock(&self.credentials).basic_authorization(url.as_str());
                if let (true, Some(credentials)) = (challenged, credentials) {
                    tracing::debug!(url = url.as_str(), "answering Basic challenge");
                    authorization = Some(credentials);
                    continue;
                }
            }

            if response.status.is_error() {
                return Err(TrawlError::transport(
                    "net.http.status_error",
                    format!("HTTP {status} from `{}`", url.as_str()),
                ));
            }

            return Ok(TransportResponse {
                final_url: url.as_str().to_owned(),
                status,
                headers: response.headers,
                body: response.body,
            });
        }
    }
}

fn redirect_target(current: &WebUrl, location: &str) -> TrawlResult<WebUrl> {
    UrlResolver::new()
        .resolve(current.as_str(), location.trim())
        .and_then(|resolved| WebUrl::parse(&resolved))
        .map_err(|error| {
            TrawlError::transport(
                "net.redirect.location_invalid",
                format!("cannot follow redirect from `{}` to `{location}`", current.as_str()),
            )
            .with_source(error)
        })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
