//! Blocking HTTP/1.1 client over pluggable resolver, connector, pool and TLS parts.

use crate::connect::BoxedIoStream;
use crate::connect::Connector;
use crate::connect::Resolver;
use crate::connect::SystemResolver;
use crate::connect::TcpConnector;
use crate::connect::connect_first_available;
use crate::http::Header;
use crate::http::Headers;
use crate::http::HttpMethod;
use crate::http::HttpRequest;
use crate::http::HttpResponse;
use crate::http::HttpStatusCode;
use crate::http::HttpVersion;
use crate::pool::ConnectionKey;
use crate::pool::ConnectionPool;
use crate::pool::IdlePool;
use crate::tls::TlsPolicy;
use crate::tls_backend::RustlsConnector;
use crate::tls_backend::TlsConnector;
use brotli::Decompressor;
use flate2::read::DeflateDecoder;
use flate2::read::GzDecoder;
use flate2::read::ZlibDecoder;
use std::io::Cursor;
use std::io::Read;
use std::io::Write;
use std::time::Duration;
use trawl_core::TrawlError;
use trawl_core::TrawlResult;

const MAX_RESPONSE_HEAD_BYTES: usize = 128 * 1024;
const MAX_CHUNK_LINE_BYTES: usize = 8 * 1024;
/// Upper bound for a response body, before and after content decoding.
pub const MAX_RESPONSE_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Sends one request per call, reusing idle keep-alive connections.
pub struct Http11Client<
    R = SystemResolver,
    C = TcpConnector,
    P = IdlePool,
    T = RustlsConnector,
> where
    R: Resolver,
    C: Connector,
    P: ConnectionPool,
    T: TlsConnector,
{
    resolver: R,
    connector: C,
    pool: P,
    tls: T,
    tls_policy: TlsPolicy,
    connect_timeout: Duration,
}

impl Http11Client {
    pub fn new(tls_policy: TlsPolicy) -> TrawlResult<Self> {
        Self::with_parts(
            SystemResolver,
            TcpConnector,
            IdlePool::default(),
            RustlsConnector,
            tls_policy,
        )
    }
}

impl<R, C, P, T> Http11Client<R, C, P, T>
where
    R: Resolver,
    C: Connector,
    P: ConnectionPool,
    T: TlsConnector,
{
    pub fn with_parts(
        resolver: R,
        connector: C,
        pool: P,
        tls: T,
        tls_policy: TlsPolicy,
    ) -> TrawlResult<Self> {
        tls_policy.validate()?;
        Ok(Self {
            resolver,
            connector,
            pool,
            tls,
            tls_policy,
            connect_timeout: Duration::from_secs(10),
        })
    }

    pub fn set_connect_timeout(&mut self, timeout: Duration) {
        self.connect_timeout = timeout;
    }

    pub fn idle_connections(&self) -> usize {
        self.pool.idle_connections()
    }

    /// Drops every pooled connection.
    pub fn reset_pool(&mut self) {
        self.pool.clear();
    }

    pub fn send(&mut self, request: &HttpRequest) -> TrawlResult<HttpResponse> {
        let key = ConnectionKey::from_url(&request.url);

        // A pooled connection the server already closed fails on first use;
        // retry once on a fresh connection before giving up.
        if let Some(mut stream) = self.pool.checkout(&key) {
            match exchange(&mut stream, request) {
                Ok(exchanged) => return Ok(self.finish(key, stream, exchanged)),
                Err(error) => {
                    tracing::debug!(code = error.code, url = request.url.as_str(), "stale pooled connection");
                }
            }
        }

        let mut stream = self.open_stream(request)?;
        let exchanged = exchange(&mut stream, request)?;
        Ok(self.finish(key, stream, exchanged))
    }

    fn finish(&mut self, key: ConnectionKey, stream: BoxedIoStream, exchanged: Exchanged) -> HttpResponse {
        if exchanged.reusable {
            self.pool.checkin(key, stream);
        }
        exchanged.response
    }

    fn open_stream(&self, request: &HttpRequest) -> TrawlResult<BoxedIoStream> {
        let handshake = self.tls_policy.handshake_for(&request.url)?;
        let addresses = self
            .resolver
            .resolve(request.url.host().trim_matches(['[', ']']), request.url.port())?;
        let stream = connect_first_available(&self.connector, &addresses, self.connect_timeout)?;

        match handshake {
            Some(handshake) => self.tls.connect_tls(stream, &handshake),
            None => Ok(Box::new(stream)),
        }
    }
}

struct Exchanged {
    response: HttpResponse,
    reusable: bool,
}

fn exchange(stream: &mut BoxedIoStream, request: &HttpRequest) -> TrawlResult<Exchanged> {
    write_request(stream, request)?;
    read_response(stream, request)
}

fn write_request(stream: &mut dyn Write, request: &HttpRequest) -> TrawlResult<()> {
    stream.write_all(&request.to_wire()).map_err(|error| {
        TrawlError::transport(
            "net.http.write_failed",
            format!("failed to send request to `{}`: {error}", request.url.as_str()),
        )
    })?;
    stream.flush().map_err(|error| {
        TrawlError::transport(
            "net.http.flush_failed",
            format!("failed to flush request to `{}`: {error}", request.url.as_str()),
        )
    })
}

/// How the response body is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyFraming {
    Empty,
    Chunked,
    Length(usize),
    UntilClose,
}

fn body_framing(
    request: &HttpRequest,
    status: HttpStatusCode,
    headers: &Headers,
) -> TrawlResult<BodyFraming> {
    if request.method == HttpMethod::Head || !status.allows_body() {
        return Ok(BodyFraming::Empty);
    }

    if headers.contains("transfer-encoding") {
        if headers.has_token("transfer-encoding", "chunked") {
            return Ok(BodyFraming::Chunked);
        }
        return Err(TrawlError::transport(
            "net.http.transfer_encoding_unsupported",
            "only chunked transfer encoding is supported",
        ));
    }

    match content_length(headers)? {
        Some(length) => Ok(BodyFraming::Length(length)),
        None => Ok(BodyFraming::UntilClose),
    }
}

fn read_response(stream: &mut dyn Read, request: &HttpRequest) -> TrawlResult<Exchanged> {
    let (head, prefetched) = read_head(stream)?;
    let (version, status, headers) = parse_head(&head)?;
    let framing = body_framing(request, status, &headers)?;

    let raw_body = match framing {
        BodyFraming::Empty => Vec::new(),
        BodyFraming::Chunked => read_chunked_body(stream, prefetched)?,
        BodyFraming::Length(length) => read_sized_body(stream, prefetched, length)?,
        BodyFraming::UntilClose => read_until_close(stream, prefetched)?,
    };

    let body = if framing == BodyFraming::Empty {
        raw_body
    } else {
        decode_content_encoding(&headers, &raw_body)?
    };

    let response = HttpResponse {
        version,
        status,
        headers,
        body,
    };
    let reusable = framing != BodyFraming::UntilClose && is_keep_alive(request, &response);

    Ok(Exchanged { response, reusable })
}

fn read_head(stream: &mut dyn Read) -> TrawlResult<(String, Vec<u8>)> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 4096];

    let head_end = loop {
        let read = stream.read(&mut chunk).map_err(|error| {
            TrawlError::transport(
                "net.http.read_head_failed",
                format!("failed while reading response head: {error}"),
            )
        })?;

        if read == 0 {
            return Err(TrawlError::transport(
                "net.http.unexpected_eof",
                "connection closed before the response head completed",
            ));
        }

        buffer.extend_from_slice(&chunk[..read]);
        if let Some(end) = find_head_end(&buffer) {
            break end;
        }

        if buffer.len() > MAX_RESPONSE_HEAD_BYTES {
            return Err(TrawlError::transport(
                "net.http.head_too_large",
                format!("response head exceeds {MAX_RESPONSE_HEAD_BYTES} bytes"),
            ));
        }
    };

    let prefetched = buffer.split_off(head_end);
    // Header values are latin-1 in practice; decode lossily rather than fail.
    let head = String::from_utf8_lossy(&buffer).into_owned();
    Ok((head, prefetched))
}

fn parse_head(head: &str) -> TrawlResult<(HttpVersion, HttpStatusCode, Headers)> {
    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap_or_default();
    let (version, status) = parse_status_line(status_line)?;

    let mut headers = Headers::new();
    for line in lines.filter(|line| !line.is_empty()) {
        let (name, value) = line.split_once(':').ok_or_else(|| {
            TrawlError::transport(
                "net.http.header_invalid",
                format!("invalid response header line `{line}`"),
            )
        })?;
        headers.append(Header::new(name.trim(), value.trim())?);
    }

    Ok((version, status, headers))
}

fn parse_status_line(line: &str) -> TrawlResult<(HttpVersion, HttpStatusCode)> {
    let invalid = || {
        TrawlError::transport(
            "net.http.status_line_invalid",
            format!("malformed status line `{line}`"),
        )
    };

    let mut parts = line.splitn(3, ' ');
    let version = match parts.next().ok_or_else(invalid)? {
        "HTTP/1.0" => HttpVersion::Http10,
        "HTTP/1.1" => HttpVersion::Http11,
        other => {
            return Err(TrawlError::transport(
                "net.http.version_unsupported",
                format!("unsupported response version `{other}`"),
            ));
        }
    };

    let code = parts
        .next()
        .ok_or_else(invalid)?
        .parse::<u16>()
        .map_err(|_| invalid())?;

    Ok((version, HttpStatusCode::new(code)?))
}

fn content_length(headers: &Headers) -> TrawlResult<Option<usize>> {
    let mut length = None;
    for raw in headers.get_all("content-length") {
        let parsed = raw.trim().parse::<usize>().map_err(|error| {
            TrawlError::transport(
                "net.http.content_length_invalid",
                format!("invalid Content-Length `{raw}`: {error}"),
            )
        })?;

        match length {
            Some(existing) if existing != parsed => {
                return Err(TrawlError::transport(
                    "net.http.content_length_conflict",
                    "conflicting Content-Length headers in response",
                ));
            }
            _ => length = Some(parsed),
        }
    }

    Ok(length)
}

fn body_too_large(what: &str) -> TrawlError {
    TrawlError::transport(
        "net.http.body_too_large",
        format!("{what} exceeds {MAX_RESPONSE_BODY_BYTES} bytes"),
    )
}

fn read_sized_body(
    stream: &mut dyn Read,
    mut prefetched: Vec<u8>,
    length: usize,
) -> TrawlResult<Vec<u8>> {
    if length > MAX_RESPONSE_BODY_BYTES {
        return Err(body_too_large("declared Content-Length"));
    }
    if prefetched.len() >= length {
        prefetched.truncate(length);
        return Ok(prefetched);
    }

    let remaining = (length - prefetched.len()) as u64;
    let read = stream.take(remaining).read_to_end(&mut prefetched);
    match read {
        Ok(_) if prefetched.len() == length => Ok(prefetched),
        Ok(_) => Err(TrawlError::transport(
            "net.http.read_body_failed",
            format!(
                "response body ended after {} of {length} bytes",
                prefetched.len()
            ),
        )),
        Err(error) => Err(TrawlError::transport(
            "net.http.read_body_failed",
            format!("response body ended before {length} bytes: {error}"),
        )),
    }
}

fn read_until_close(stream: &mut dyn Read, mut prefetched: Vec<u8>) -> TrawlResult<Vec<u8>> {
    let budget = MAX_RESPONSE_BODY_BYTES.saturating_sub(prefetched.len()) as u64 + 1;
    stream
        .take(budget)
        .read_to_end(&mut prefetched)
        .map_err(|error| {
            TrawlError::transport(
                "net.http.read_body_failed",
                format!("failed while reading response body to end of stream: {error}"),
            )
        })?;

    if prefetched.len() > MAX_RESPONSE_BODY_BYTES {
        return Err(body_too_large("response body"));
    }
    Ok(prefetched)
}

/// Serves buffered bytes first, then falls through to the socket.
struct ChainedReader<'a> {
    buffered: Cursor<Vec<u8>>,
    stream: &'a mut dyn Read,
}

impl ChainedReader<'_> {
    fn fill(&mut self, out: &mut [u8]) -> TrawlResult<()> {
        let from_buffer = self.buffered.read(out).unwrap_or(0);
        if from_buffer < out.len() {
            self.stream
                .read_exact(&mut out[from_buffer..])
                .map_err(|error| {
                    TrawlError::transport(
                        "net.http.read_body_failed",
                        format!("chunked body ended early: {error}"),
                    )
                })?;
        }
        Ok(())
    }

    fn line(&mut self) -> TrawlResult<String> {
        let mut line = Vec::new();
        let mut byte = [0_u8; 1];

        while !line.ends_with(b"\r\n") {
            self.fill(&mut byte)?;
            line.push(byte[0]);
            if line.len() > MAX_CHUNK_LINE_BYTES {
                return Err(TrawlError::transport(
                    "net.http.chunk_line_too_large",
                    format!("chunk metadata line exceeds {MAX_CHUNK_LINE_BYTES} bytes"),
                ));
            }
        }

        line.truncate(line.len() - 2);
        Ok(String::from_utf8_lossy(&line).into_owned())
    }
}

fn read_chunked_body(stream: &mut dyn Read, prefetched: Vec<u8>) -> TrawlResult<Vec<u8>> {
    let mut reader = ChainedReader {
        buffered: Cursor::new(prefetched),
        stream,
    };
    let mut decoded = Vec::new();

    loop {
        let size_line = reader.line()?;
        let size_token = size_line.split(';').next().unwrap_or_default().trim();
        if size_token.is_empty() {
            continue;
        }

        let size = usize::from_str_radix(size_token, 16).map_err(|error| {
            TrawlError::transport(
                "net.http.chunk_size_invalid",
                format!("invalid chunk size `{size_token}`: {error}"),
            )
        })?;

        if size == 0 {
            // Trailers are read and discarded.
            while !reader.line()?.is_empty() {}
            return Ok(decoded);
        }

        let start = decoded.len();
        let end = start
            .checked_add(size)
            .filter(|end| *end <= MAX_RESPONSE_BODY_BYTES)
            .ok_or_else(|| body_too_large("chunked response body"))?;
        decoded.resize(end, 0);
        reader.fill(&mut decoded[start..])?;

        let mut terminator = [0_u8; 2];
        reader.fill(&mut terminator)?;
        if terminator != *b"\r\n" {
            return Err(TrawlError::transport(
                "net.http.chunk_terminator_invalid",
                "chunk data is missing its trailing CRLF",
            ));
        }
    }
}

fn find_head_end(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|index| index + 4)
}

fn is_keep_alive(request: &HttpRequest, response: &HttpResponse) -> bool {
    if request.headers.has_token("connection", "close")
        || response.headers.has_token("connection", "close")
    {
        return false;
    }

    match response.version {
        HttpVersion::Http10 => response.headers.has_token("connection", "keep-alive"),
        HttpVersion::Http11 => true,
    }
}

fn decode_content_encoding(headers: &Headers, body: &[u8]) -> TrawlResult<Vec<u8>> {
    let encodings: Vec<String> = headers
        .get_all("content-encoding")
        .flat_map(|value| value.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect();

    let mut decoded = body.to_vec();
    for encoding in encodings.iter().rev() {
        decoded = match encoding.as_str() {
            "identity" => decoded,
            "gzip" | "x-gzip" => inflate(GzDecoder::new(decoded.as_slice()), "gzip")?,
            "deflate" => decode_deflate(&decoded)?,
            "br" => inflate(Decompressor::new(decoded.as_slice(), 4096), "brotli")?,
            other => {
                return Err(TrawlError::transport(
                    "net.http.content_encoding_unsupported",
                    format!("unsupported content encoding `{other}`"),
                ));
            }
        };
    }

    Ok(decoded)
}

fn decode_deflate(body: &[u8]) -> TrawlResult<Vec<u8>> {
    // Servers disagree on whether "deflate" means zlib-wrapped or raw.
    match inflate(ZlibDecoder::new(body), "deflate") {
        Ok(decoded) => Ok(decoded),
        Err(_) => inflate(DeflateDecoder::new(body), "deflate"),
    }
}

fn inflate(decoder: impl Read, name: &str) -> TrawlResult<Vec<u8>> {
    let mut decoded = Vec::new();
    decoder
        .take(MAX_RESPONSE_BODY_BYTES as u64 + 1)
        .read_to_end(&mut decoded)
        .map_err(|error| {
            TrawlError::transport(
                "net.http.decode_failed",
                format!("{name} decode failed: {error}"),
            )
        })?;

    if decoded.len() > MAX_RESPONSE_BODY_BYTES {
        return Err(body_too_large("decoded response body"));
    }
    Ok(decoded)
}
