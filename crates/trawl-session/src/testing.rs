//! Scripted collaborators for session tests.

use crate::session::RetryPause;
use std::collections::HashMap;
use std::io::Read;
use std::io::Write;
use std::net::TcpListener;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use trawl_core::TrawlError;
use trawl_core::TrawlResult;
use trawl_net::Header;
use trawl_net::Headers;
use trawl_net::HttpTransport;
use trawl_net::TransportRequest;
use trawl_net::TransportResponse;

#[derive(Debug, Clone)]
struct ScriptedPage {
    final_url: String,
    html: String,
    set_cookie: Option<String>,
}

#[derive(Debug, Default)]
struct Script {
    pages: HashMap<String, ScriptedPage>,
    failures: HashMap<String, usize>,
    requests: Vec<TransportRequest>,
    cookies: Vec<String>,
}

/// Transport answering from a fixed URL → page table.
///
/// Unknown URLs fail with a non-transport error so they are never retried.
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    script: Mutex<Script>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        match self.script.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn page(&self, url: &str, html: &str) {
        self.redirect(url, url, html);
    }

    pub(crate) fn redirect(&self, url: &str, final_url: &str, html: &str) {
        self.script().pages.insert(
            url.to_owned(),
            ScriptedPage {
                final_url: final_url.to_owned(),
                html: html.to_owned(),
                set_cookie: None,
            },
        );
    }

    pub(crate) fn page_with_cookie(&self, url: &str, html: &str, cookie: &str) {
        self.script().pages.insert(
            url.to_owned(),
            ScriptedPage {
                final_url: url.to_owned(),
                html: html.to_owned(),
                set_cookie: Some(cookie.to_owned()),
            },
        );
    }

    /// Makes the next `times` requests to `url` fail with a transport error.
    pub(crate) fn fail(&self, url: &str, times: usize) {
        self.script().failures.insert(url.to_owned(), times);
    }

    pub(crate) fn request_count(&self) -> usize {
        self.script().requests.len()
    }

    pub(crate) fn last_request(&self) -> Option<TransportRequest> {
        self.script().requests.last().cloned()
    }

    pub(crate) fn last_url(&self) -> Option<String> {
        self.last_request().map(|request| request.url)
    }

    /// Cookies set through this transport, in arrival order.
    pub(crate) fn cookies(&self) -> Vec<String> {
        self.script().cookies.clone()
    }
}

impl HttpTransport for ScriptedTransport {
    fn open(&self, request: &TransportRequest) -> TrawlResult<TransportResponse> {
        let mut script = self.script();
        script.requests.push(request.clone());

        if let Some(remaining) = script.failures.get_mut(&request.url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(TrawlError::transport(
                    "net.connect.failed",
                    format!("scripted failure for `{}`", request.url),
                ));
            }
        }

        let Some(page) = script.pages.get(&request.url).cloned() else {
            return Err(TrawlError::invalid_url(
                "test.unscripted",
                format!("no scripted page for `{}`", request.url),
            ));
        };

        if let Some(cookie) = &page.set_cookie {
            script.cookies.push(cookie.clone());
        }

        let headers: Headers = [Header::new("Content-Type", "text/html; charset=utf-8")]
            .into_iter()
            .filter_map(Result::ok)
            .collect();

        Ok(TransportResponse {
            final_url: page.final_url,
            status: 200,
            headers,
            body: page.html.into_bytes(),
        })
    }
}

/// Records pauses instead of sleeping.
#[derive(Debug, Default)]
pub(crate) struct CountingPause {
    delays: Mutex<Vec<Duration>>,
}

impl CountingPause {
    fn delays(&self) -> MutexGuard<'_, Vec<Duration>> {
        match self.delays.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.delays().len()
    }

    pub(crate) fn last_delay(&self) -> Option<Duration> {
        self.delays().last().copied()
    }
}

impl RetryPause for CountingPause {
    fn pause(&self, delay: Duration) {
        self.delays().push(delay);
    }
}

/// Loopback HTTP server answering `connections` bodiless requests, one per
/// connection. `handler` gets the request target and its `Cookie` header and
/// returns the full response.
pub(crate) fn serve<F>(connections: usize, handler: F) -> (String, JoinHandle<()>)
where
    F: Fn(&str, Option<&str>) -> String + Send + 'static,
{
    let listener = match TcpListener::bind("127.0.0.1:0") {
        Ok(listener) => listener,
        Err(error) => panic!("{error}"),
    };
    let base = match listener.local_addr() {
        Ok(address) => format!("http://{address}"),
        Err(error) => panic!("{error}"),
    };

    let handle = thread::spawn(move || {
        for _ in 0..connections {
            let mut stream = match listener.accept() {
                Ok((stream, _)) => stream,
                Err(error) => panic!("{error}"),
            };

            let mut head = Vec::new();
            let mut byte = [0_u8; 1];
            while !head.ends_with(b"\r\n\r\n") {
                match stream.read(&mut byte) {
                    Ok(0) => break,
                    Ok(_) => head.push(byte[0]),
                    Err(error) => panic!("{error}"),
                }
            }

            let head = String::from_utf8_lossy(&head).into_owned();
            let target = head
                .lines()
                .next()
                .and_then(|line| line.split_whitespace().nth(1))
                .unwrap_or_default();
            let cookie = head.lines().find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.trim().eq_ignore_ascii_case("cookie").then(|| value.trim())
            });

            let reply = handler(target, cookie);
            if let Err(error) = stream.write_all(reply.as_bytes()) {
                panic!("{error}");
            }
        }
    });

    (base, handle)
}
