//! HTTP request/response messages.

use crate::url::WebUrl;
use trawl_core::TrawlError;
use trawl_core::TrawlResult;

/// Outbound HTTP methods used by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
        }
    }
}

/// HTTP protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    Http10,
    Http11,
}

impl HttpVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http10 => "HTTP/1.0",
            Self::Http11 => "HTTP/1.1",
        }
    }
}

/// Single HTTP header with a validated wire-safe name and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: &str, value: &str) -> TrawlResult<Self> {
        if name.is_empty() || !name.bytes().all(is_token_char) {
            return Err(TrawlError::transport(
                "net.http.header_name_invalid",
                format!("invalid HTTP header name `{name}`"),
            ));
        }

        if value.bytes().any(|byte| matches!(byte, b'\r' | b'\n' | 0)) {
            return Err(TrawlError::transport(
                "net.http.header_value_invalid",
                format!("invalid characters found in HTTP header `{name}`"),
            ));
        }

        Ok(Self {
            name: name.to_owned(),
            value: value.to_owned(),
        })
    }
}

/// Ordered header list with case-insensitive lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<Header>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|header| header.name.eq_ignore_ascii_case(name))
            .map(|header| header.value.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |header| header.name.eq_ignore_ascii_case(name))
            .map(|header| header.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// True when a comma-separated value of `name` equals `token` (case-insensitive).
    pub fn has_token(&self, name: &str, token: &str) -> bool {
        self.get_all(name).any(|value| {
            value
                .split(',')
                .any(|candidate| candidate.trim().eq_ignore_ascii_case(token))
        })
    }

    pub fn append(&mut self, header: Header) {
        self.entries.push(header);
    }

    /// Replaces every existing `name` entry with a single one.
    pub fn set(&mut self, name: &str, value: &str) -> TrawlResult<()> {
        let header = Header::new(name, value)?;
        self.entries
            .retain(|existing| !existing.name.eq_ignore_ascii_case(name));
        self.entries.push(header);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) {
        self.entries
            .retain(|existing| !existing.name.eq_ignore_ascii_case(name));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<Header> for Headers {
    fn from_iter<I: IntoIterator<Item = Header>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Outgoing HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: WebUrl,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn builder(method: HttpMethod, url: WebUrl) -> HttpRequestBuilder {
        HttpRequestBuilder {
            method,
            url,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    pub fn request_target(&self) -> String {
        self.url.path_and_query()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Serialized request head and body.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut encoded = Vec::with_capacity(256 + self.body.len());
        encoded.extend_from_slice(self.method.as_str().as_bytes());
        encoded.push(b' ');
        encoded.extend_from_slice(self.request_target().as_bytes());
        encoded.push(b' ');
        encoded.extend_from_slice(HttpVersion::Http11.as_str().as_bytes());
        encoded.extend_from_slice(b"\r\n");

        for header in self.headers.iter() {
            encoded.extend_from_slice(header.name.as_bytes());
            encoded.extend_from_slice(b": ");
            encoded.extend_from_slice(header.value.as_bytes());
            encoded.extend_from_slice(b"\r\n");
        }
        encoded.extend_from_slice(b"\r\n");
        encoded.extend_from_slice(&self.body);
        encoded
    }
}

/// Builder for [`HttpRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequestBuilder {
    method: HttpMethod,
    url: WebUrl,
    headers: Headers,
    body: Vec<u8>,
}

impl HttpRequestBuilder {
    pub fn header(mut self, name: &str, value: &str) -> TrawlResult<Self> {
        self.headers.set(name, value)?;
        Ok(self)
    }

    pub fn headers<'a, I>(mut self, headers: I) -> TrawlResult<Self>
    where
        I: IntoIterator<Item = &'a Header>,
    {
        for header in headers {
            self.headers.set(&header.name, &header.value)?;
        }
        Ok(self)
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn build(mut self) -> TrawlResult<HttpRequest> {
        if matches!(self.method, HttpMethod::Get | HttpMethod::Head) && !self.body.is_empty() {
            return Err(TrawlError::transport(
                "net.http.body_disallowed",
                format!("{} requests must not include a body", self.method.as_str()),
            ));
        }

        if !self.headers.contains("host") {
            let host = self.url.authority();
            self.headers.set("Host", &host)?;
        }

        if self.method == HttpMethod::Post {
            let len = self.body.len().to_string();
            self.headers.set("Content-Length", &len)?;
        }

        Ok(HttpRequest {
            method: self.method,
            url: self.url,
            headers: self.headers,
            body: self.body,
        })
    }
}

/// HTTP status code wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HttpStatusCode(u16);

impl HttpStatusCode {
    pub fn new(code: u16) -> TrawlResult<Self> {
        if (100..=599).contains(&code) {
            return Ok(Self(code));
        }

        Err(TrawlError::transport(
            "net.http.status_invalid",
            format!("status code must be 100-599, got `{code}`"),
        ))
    }

    pub fn as_u16(self) -> u16 {
        self.0
    }

    pub fn is_success(self) -> bool {
        (200..=299).contains(&self.0)
    }

    pub fn is_redirect(self) -> bool {
        matches!(self.0, 301 | 302 | 303 | 307 | 308)
    }

    pub fn is_error(self) -> bool {
        self.0 >= 400
    }

    pub fn allows_body(self) -> bool {
        !((100..200).contains(&self.0) || self.0 == 204 || self.0 == 304)
    }
}

/// Incoming HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub version: HttpVersion,
    pub status: HttpStatusCode,
    pub headers: Headers,
    pub body: Vec<u8>,
}

fn is_token_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(
            byte,
            b'!' | b'#'
                | b'$'
                | b'%'
                | b'&'
                | b'\''
                | b'*'
                | b'+'
                | b'-'
                | b'.'
                | b'^'
                | b'_'
                | b'`'
                | b'|'
                | b'~'
        )
}
