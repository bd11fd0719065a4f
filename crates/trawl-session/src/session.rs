//! The browsing session: navigation, history, retries and page views.

use crate::config::SessionConfig;
use crate::form::Form;
use crate::views::ElementList;
use crate::views::Frame;
use crate::views::IFrame;
use crate::views::Link;
use crate::views::PageElement;
use regex::bytes::Regex;
use std::cell::OnceCell;
use std::sync::Arc;
use std::time::Duration;
use trawl_core::ErrorKind;
use trawl_core::TrawlError;
use trawl_core::TrawlResult;
use trawl_dom::Document;
use trawl_html::HtmlParser;
use trawl_html::charset::charset_from_content_type;
use trawl_net::Headers;
use trawl_net::HttpTransport;
use trawl_net::StandardTransport;
use trawl_net::TransportRequest;
use trawl_net::TransportResponse;
use trawl_net::UrlResolver;
use trawl_net::is_absolute_http;

/// Waits between attempts of a failed navigation.
pub trait RetryPause: Send + Sync {
    fn pause(&self, delay: Duration);
}

/// Blocks the calling thread for the requested delay.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleep;

impl RetryPause for ThreadSleep {
    fn pause(&self, delay: Duration) {
        std::thread::sleep(delay);
    }
}

/// Views derived from the current document, built on first access.
#[derive(Debug, Default)]
struct ViewCache {
    links: OnceCell<ElementList<Link>>,
    forms: OnceCell<ElementList<Form>>,
    frames: OnceCell<ElementList<Frame>>,
    iframes: OnceCell<ElementList<IFrame>>,
}

impl ViewCache {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// One scripted browsing session.
///
/// Headers, page bytes and document always come from the same fetch; a
/// failed navigation leaves all of them untouched.
pub struct Session {
    config: SessionConfig,
    resolver: UrlResolver,
    transport: Arc<dyn HttpTransport>,
    pause: Arc<dyn RetryPause>,
    current_url: Option<String>,
    history: Vec<String>,
    headers: Headers,
    page: Vec<u8>,
    document: Arc<Document>,
    views: ViewCache,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_agent", &self.config.user_agent)
            .field("current_url", &self.current_url)
            .field("history", &self.history)
            .field("page_bytes", &self.page.len())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Session over a fresh [`StandardTransport`].
    pub fn new(config: SessionConfig) -> TrawlResult<Self> {
        config.validate()?;
        let transport = StandardTransport::new(config.transport_config())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: SessionConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            resolver: config.url_resolver(),
            config,
            transport,
            pause: Arc::new(ThreadSleep),
            current_url: None,
            history: Vec::new(),
            headers: Headers::new(),
            page: Vec::new(),
            document: Arc::new(Document::empty()),
            views: ViewCache::default(),
        }
    }

    pub fn with_retry_pause(mut self, pause: Arc<dyn RetryPause>) -> Self {
        self.pause = pause;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn user_agent(&self) -> &str {
        &self.config.user_agent
    }

    pub fn transport(&self) -> &Arc<dyn HttpTransport> {
        &self.transport
    }

    pub fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    /// URLs visited, as they were requested.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Headers of the last response.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Raw bytes of the current page.
    pub fn page(&self) -> &[u8] {
        &self.page
    }

    /// Current page decoded with its declared or sniffed charset.
    pub fn page_text(&self) -> String {
        trawl_html::charset::decode_body(&self.page, self.encoding().as_deref())
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    pub fn title(&self) -> Option<String> {
        self.document.title()
    }

    /// Charset label from the `Content-Type` response header.
    pub fn encoding(&self) -> Option<String> {
        self.headers
            .get("content-type")
            .and_then(charset_from_content_type)
    }

    /// Resolves `reference` against the current page.
    pub fn resolve_url(&self, reference: &str) -> TrawlResult<String> {
        if is_absolute_http(reference) {
            return Ok(reference.to_owned());
        }

        match self.current_url.as_deref() {
            Some(base) => self.resolver.resolve(base, reference),
            None => Err(TrawlError::invalid_url(
                "session.url.no_base",
                format!(
                    "cannot open `{reference}`: use an http(s) URL or navigate somewhere first"
                ),
            )),
        }
    }

    /// GET `url` with the configured retry budget. Returns the new current URL.
    pub fn goto(&mut self, url: &str) -> TrawlResult<String> {
        self.goto_with(url, None, self.config.retries)
    }

    /// POST `body` to `url` with the configured retry budget.
    pub fn post(&mut self, url: &str, body: Vec<u8>) -> TrawlResult<String> {
        self.goto_with(url, Some(body), self.config.retries)
    }

    /// Navigates to `url`, retrying transport failures up to `retries` extra times.
    pub fn goto_with(&mut self, url: &str, body: Option<Vec<u8>>, retries: u32) -> TrawlResult<String> {
        let target = self.resolve_url(url)?;
        tracing::info!(
            url = target.as_str(),
            method = if body.is_some() { "POST" } else { "GET" },
            "navigating"
        );

        let request = TransportRequest {
            url: target,
            headers: Headers::new(),
            body,
        }
        .with_header("User-Agent", &self.config.user_agent)?;

        let response = self.open_with_retries(&request, retries)?;
        self.commit(url, response);

        Ok(self.current_url.clone().unwrap_or_default())
    }

    fn open_with_retries(&self, request: &TransportRequest, retries: u32) -> TrawlResult<TransportResponse> {
        let mut remaining = retries;
        let mut attempt: u32 = 1;

        loop {
            let error = match self.transport.open(request) {
                Ok(response) => return Ok(response),
                Err(error) if error.is(ErrorKind::Transport) => error,
                Err(error) => return Err(error),
            };

            if remaining == 0 {
                return Err(TrawlError::transport(
                    "session.goto.retries_exhausted",
                    format!("giving up on `{}` after {attempt} attempt(s)", request.url),
                )
                .with_source(error));
            }

            tracing::warn!(
                url = request.url.as_str(),
                attempt,
                error = %error,
                "transport failure, retrying"
            );
            self.pause.pause(self.config.retry_delay);
            remaining -= 1;
            attempt += 1;
        }
    }

    fn commit(&mut self, requested: &str, response: TransportResponse) {
        if self.history.last().map(String::as_str) != Some(requested) {
            self.history.push(requested.to_owned());
        }

        let charset = response
            .headers
            .get("content-type")
            .and_then(charset_from_content_type);
        self.document = Arc::new(HtmlParser.parse_bytes(&response.body, charset.as_deref()));
        self.current_url = Some(response.final_url);
        self.headers = response.headers;
        self.page = response.body;
        self.views.reset();
    }

    /// Re-fetches the previous history entry. `Ok(None)` when there is none.
    pub fn back(&mut self) -> TrawlResult<Option<String>> {
        let Some(previous) = self.history.len().checked_sub(2).map(|index| self.history[index].clone()) else {
            return Ok(None);
        };

        let saved = self.history.clone();
        self.history.truncate(saved.len() - 2);

        match self.goto(&previous) {
            Ok(url) => Ok(Some(url)),
            Err(error) => {
                self.history = saved;
                Err(error)
            }
        }
    }

    /// A new session at the same page sharing this one's transport, and with it
    /// cookies and credentials. History is copied, not shared.
    pub fn duplicate(&self) -> Self {
        Self {
            config: self.config.clone(),
            resolver: self.resolver,
            transport: Arc::clone(&self.transport),
            pause: Arc::clone(&self.pause),
            current_url: self.current_url.clone(),
            history: self.history.clone(),
            headers: self.headers.clone(),
            page: self.page.clone(),
            document: Arc::clone(&self.document),
            views: ViewCache::default(),
        }
    }

    /// Deletes every match of `pattern` from the page and re-parses it.
    pub fn sanitize(&mut self, pattern: &str) -> TrawlResult<()> {
        let regex = Regex::new(pattern).map_err(|error| {
            TrawlError::new(
                ErrorKind::InvalidPattern,
                "session.sanitize.invalid_pattern",
                format!("invalid pattern `{pattern}`: {error}"),
            )
        })?;

        let cleaned = regex.replace_all(&self.page, &b""[..]).into_owned();
        tracing::debug!(
            removed_bytes = self.page.len() - cleaned.len(),
            pattern,
            "sanitized page"
        );

        self.document = Arc::new(HtmlParser.parse_bytes(&cleaned, self.encoding().as_deref()));
        self.page = cleaned;
        self.views.reset();
        Ok(())
    }

    pub fn links(&self) -> &ElementList<Link> {
        self.views
            .links
            .get_or_init(|| collect(&self.document, "a", Link::from_element))
    }

    pub fn forms(&self) -> &ElementList<Form> {
        self.views
            .forms
            .get_or_init(|| collect(&self.document, "form", Form::from_element))
    }

    pub fn frames(&self) -> &ElementList<Frame> {
        self.views
            .frames
            .get_or_init(|| collect(&self.document, "frame", Frame::from_element))
    }

    pub fn iframes(&self) -> &ElementList<IFrame> {
        self.views
            .iframes
            .get_or_init(|| collect(&self.document, "iframe", IFrame::from_element))
    }

    pub fn get_link(&self, key: &str) -> TrawlResult<Link> {
        self.links().require(key).cloned()
    }

    pub fn get_form(&self, key: &str) -> TrawlResult<Form> {
        self.forms().require(key).cloned()
    }

    pub fn get_frame(&self, key: &str) -> TrawlResult<Frame> {
        self.frames().require(key).cloned()
    }

    pub fn get_iframe(&self, key: &str) -> TrawlResult<IFrame> {
        self.iframes().require(key).cloned()
    }

    /// Navigates to the first link matching `key`.
    pub fn follow_link(&mut self, key: &str) -> TrawlResult<String> {
        let link = self.get_link(key)?;
        link.goto(self)
    }

    /// Absolute URLs of every link whose `href` contains `href_contains`.
    pub fn link_urls(&self, href_contains: &str) -> TrawlResult<Vec<String>> {
        let urls = self
            .links()
            .iter()
            .filter(|link| link.href().is_some_and(|href| href.contains(href_contains)))
            .map(|link| link.url(self))
            .collect::<TrawlResult<Vec<_>>>()?;

        if urls.is_empty() {
            return Err(TrawlError::new(
                ErrorKind::ElementNotFound,
                "session.element.not_found",
                format!("no link with an href containing `{href_contains}`"),
            ));
        }

        Ok(urls)
    }
}

fn collect<T, F>(document: &Document, tag: &str, build: F) -> ElementList<T>
where
    T: PageElement,
    F: Fn(&trawl_dom::ElementRef<'_>) -> T,
{
    let items: Vec<T> = document.find_by_tag(tag).iter().map(build).collect();
    tracing::debug!(tag, count = items.len(), "materialized page view");
    ElementList::new(items)
}

#[cfg(test)]
mod tests {
    use super::Session;
    use crate::config::SessionConfig;
    use crate::testing::CountingPause;
    use crate::testing::ScriptedTransport;
    use crate::testing::serve;
    use std::sync::Arc;
    use std::time::Duration;
    use trawl_core::ErrorKind;

    const HOME: &str = "http://www.example.com";

    fn session(transport: &Arc<ScriptedTransport>) -> Session {
        Session::with_transport(SessionConfig::default(), Arc::clone(transport) as _)
            .with_retry_pause(Arc::new(CountingPause::default()))
    }

    fn ok<T>(result: trawl_core::TrawlResult<T>) -> T {
        match result {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn goto_sends_user_agent_and_stores_page() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.page(HOME, "<html><title> Example  home </title>text</html>");

        let mut browser = session(&transport);
        assert_eq!(ok(browser.goto(HOME)), HOME);

        assert_eq!(browser.page(), b"<html><title> Example  home </title>text</html>");
        assert_eq!(browser.title(), Some("Example home".to_owned()));
        assert_eq!(browser.encoding(), Some("utf-8".to_owned()));
        assert_eq!(browser.history(), [HOME]);
        assert_eq!(
            transport.last_request().and_then(|request| request.headers.get("user-agent").map(str::to_owned)),
            Some("trawl/1.0".to_owned())
        );
    }

    #[test]
    fn custom_user_agent_is_sent() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.page(HOME, "<html>text</html>");
        let config = SessionConfig {
            user_agent: "momo/1.0".to_owned(),
            ..SessionConfig::default()
        };

        let mut browser = Session::with_transport(config, Arc::clone(&transport) as _);
        ok(browser.goto(HOME));
        assert_eq!(
            transport.last_request().and_then(|request| request.headers.get("user-agent").map(str::to_owned)),
            Some("momo/1.0".to_owned())
        );
    }

    #[test]
    fn relative_goto_without_current_url_is_invalid() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut browser = session(&transport);

        let result = browser.goto("one.html");
        assert!(result.is_err_and(|error| {
            error.kind == ErrorKind::InvalidUrl && error.code == "session.url.no_base"
        }));
        assert_eq!(transport.request_count(), 0);
    }

    #[test]
    fn final_url_after_redirect_becomes_the_base() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.redirect(HOME, "http://www.example.com/portal/index.html", "<a href=\"next.html\">n</a>");
        transport.page("http://www.example.com/portal/next.html", "next");

        let mut browser = session(&transport);
        assert_eq!(ok(browser.goto(HOME)), "http://www.example.com/portal/index.html");
        assert_eq!(browser.history(), [HOME]);

        ok(browser.follow_link("next"));
        assert_eq!(browser.current_url(), Some("http://www.example.com/portal/next.html"));
    }

    #[test]
    fn transient_failure_recovers_within_budget() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.page(HOME, "<html>ok</html>");
        transport.fail(HOME, 2);

        let pause = Arc::new(CountingPause::default());
        let mut browser = Session::with_transport(SessionConfig::default(), Arc::clone(&transport) as _)
            .with_retry_pause(Arc::clone(&pause) as _);

        assert_eq!(ok(browser.goto_with(HOME, None, 3)), HOME);
        assert_eq!(browser.page(), b"<html>ok</html>");
        assert_eq!(pause.count(), 2);
        assert_eq!(pause.last_delay(), Some(Duration::from_secs(1)));
        assert_eq!(transport.request_count(), 3);
    }

    #[test]
    fn exhausted_retries_leave_state_untouched() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.page(HOME, "<html><a href=\"one.html\">one</a></html>");
        transport.fail("http://www.example.com/down", 10);

        let pause = Arc::new(CountingPause::default());
        let mut browser = Session::with_transport(SessionConfig::default(), Arc::clone(&transport) as _)
            .with_retry_pause(Arc::clone(&pause) as _);
        ok(browser.goto(HOME));
        let document = Arc::clone(browser.document());

        let result = browser.goto_with("down", None, 2);
        assert!(result.as_ref().is_err_and(|error| {
            error.kind == ErrorKind::Transport && error.code == "session.goto.retries_exhausted"
        }));
        assert!(result.is_err_and(|error| error.source.is_some()));

        assert_eq!(pause.count(), 2);
        assert_eq!(transport.request_count(), 4);
        assert_eq!(browser.current_url(), Some(HOME));
        assert_eq!(browser.history(), [HOME]);
        assert!(Arc::ptr_eq(browser.document(), &document));
        assert_eq!(browser.links().len(), 1);
    }

    #[test]
    fn non_transport_errors_are_not_retried() {
        let transport = Arc::new(ScriptedTransport::new());
        let pause = Arc::new(CountingPause::default());
        let mut browser = Session::with_transport(SessionConfig::default(), Arc::clone(&transport) as _)
            .with_retry_pause(Arc::clone(&pause) as _);

        let result = browser.goto("http://www.example.com/unscripted");
        assert!(result.is_err_and(|error| error.kind == ErrorKind::InvalidUrl));
        assert_eq!(pause.count(), 0);
    }

    #[test]
    fn links_duplicate_and_independent_navigation() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.page(HOME, "<html>\n<a href=\"one.html\">one</a>\n<a href=\"two.html\">two</a>\n</html>");
        transport.page_with_cookie("http://www.example.com/one.html", "<html>one</html>", "first=1");
        transport.page_with_cookie("http://www.example.com/two.html", "<html>two</html>", "second=2");

        let mut browser = session(&transport);
        ok(browser.goto(HOME));
        assert_eq!(browser.links().len(), 2);
        let one = ok(browser.get_link("one"));
        assert_eq!(ok(one.url(&browser)), "http://www.example.com/one.html");

        let mut copy = browser.duplicate();

        ok(one.goto(&mut browser));
        assert_eq!(transport.last_url(), Some("http://www.example.com/one.html".to_owned()));
        assert_eq!(browser.page(), b"<html>one</html>");

        ok(copy.follow_link("two"));
        assert_eq!(transport.last_url(), Some("http://www.example.com/two.html".to_owned()));
        assert_eq!(copy.page(), b"<html>two</html>");

        assert_ne!(browser.current_url(), copy.current_url());
        assert!(!Arc::ptr_eq(browser.document(), copy.document()));
        assert_eq!(transport.cookies(), ["first=1", "second=2"]);
        assert_eq!(browser.history().len(), 2);
        assert_eq!(copy.history().len(), 2);
    }

    #[test]
    fn duplicated_sessions_send_each_others_cookies() {
        let (base, server) = serve(3, |target, cookie| {
            let set_cookie = match target {
                "/a" => "Set-Cookie: sid=a; Path=/\r\n",
                "/b" => "Set-Cookie: tok=b; Path=/\r\n",
                _ => "",
            };
            let body = format!("cookie={}", cookie.unwrap_or("-"));
            format!(
                "HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Type: text/html\r\n{set_cookie}Content-Length: {}\r\n\r\n{body}",
                body.len()
            )
        });

        let config = SessionConfig {
            retries: 0,
            ..SessionConfig::default()
        };
        let mut first = ok(Session::new(config));
        ok(first.goto(&format!("{base}/a")));
        assert_eq!(first.page(), b"cookie=-");

        let mut second = first.duplicate();
        ok(second.goto("/b"));
        assert_eq!(second.page(), b"cookie=sid=a");

        ok(first.goto("/c"));
        assert_eq!(first.page(), b"cookie=sid=a; tok=b");
        assert!(server.join().is_ok());
    }

    #[test]
    fn frames_and_iframes_navigate_their_sessions() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.page(
            HOME,
            "<html>\n<frameset cols=\"25%,75%\">\n<frame src=\"frame_a.htm\" />\n<frame src=\"frame_b.htm\" />\n</frameset>\n<iframe src=\"ad.htm\"></iframe></html>",
        );
        transport.page("http://www.example.com/frame_a.htm", "<html>frame_a</html>");
        transport.page("http://www.example.com/frame_b.htm", "<html>frame_b</html>");

        let mut browser = session(&transport);
        ok(browser.goto(HOME));
        let mut copy = browser.duplicate();
        assert_eq!(browser.frames().len(), 2);
        assert_eq!(browser.iframes().len(), 1);
        assert_eq!(ok(browser.get_iframe("ad")).src(), Some("ad.htm"));

        ok(ok(browser.get_frame("frame_a")).goto(&mut browser));
        assert_eq!(browser.page(), b"<html>frame_a</html>");

        ok(ok(copy.get_frame("frame_b")).goto(&mut copy));
        assert_eq!(copy.page(), b"<html>frame_b</html>");
        assert!(copy.frames().is_empty());
    }

    #[test]
    fn link_without_href_is_missing_target() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.page(HOME, "<a name=\"anchor\">jump</a>");

        let mut browser = session(&transport);
        ok(browser.goto(HOME));
        let result = browser.follow_link("jump");
        assert!(result.is_err_and(|error| error.kind == ErrorKind::MissingTarget));
        assert_eq!(transport.request_count(), 1);
    }

    #[test]
    fn login_form_posts_defaults_and_overrides() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.page(
            HOME,
            "<html>\n<form id=\"login\" action=\"login.cgi\">\n<input name=\"username\">\n<input name=\"password\">\n<input typ=\"submit\" name=\"submit\" value=\"done\">\n</form>\n</html>",
        );
        transport.page("http://www.example.com/login.cgi", "<html><title>Login OK</title></html>");

        let mut browser = session(&transport);
        ok(browser.goto(HOME));
        let form = ok(browser.get_form("login"));
        assert_eq!(form.fields().keys().collect::<Vec<_>>(), ["username", "password", "submit"]);

        let document = ok(form.submit(&mut browser, None, &[("username", "guest"), ("password", "12345678")]));
        assert_eq!(document.title(), Some("Login OK".to_owned()));

        let request = match transport.last_request() {
            Some(request) => request,
            None => panic!("no request recorded"),
        };
        assert_eq!(request.url, "http://www.example.com/login.cgi");
        assert_eq!(request.body, Some(b"username=guest&password=12345678&submit=done".to_vec()));
    }

    #[test]
    fn login_form_sends_its_submit_button_last() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.page(
            HOME,
            "<html>\n<form id=\"login\" action=\"login.cgi\">\n<input type=\"submit\" name=\"submit\" value=\"done\">\n<input name=\"username\">\n<input name=\"password\">\n</form>\n</html>",
        );
        transport.page("http://www.example.com/login.cgi", "<html><title>Welcome</title></html>");

        let mut browser = session(&transport);
        ok(browser.goto(HOME));
        let form = ok(browser.get_form("login"));
        assert_eq!(form.fields().keys().collect::<Vec<_>>(), ["username", "password"]);
        assert_eq!(form.submits().get("submit"), Some("done"));

        let document = ok(form.submit(&mut browser, None, &[("username", "guest"), ("password", "12345678")]));
        assert_eq!(document.title(), Some("Welcome".to_owned()));
        let request = match transport.last_request() {
            Some(request) => request,
            None => panic!("no request recorded"),
        };
        assert_eq!(request.url, "http://www.example.com/login.cgi");
        assert_eq!(request.body, Some(b"username=guest&password=12345678&submit=done".to_vec()));

        ok(browser.back());
        let form = ok(browser.get_form("login"));
        ok(form.submit(
            &mut browser,
            Some("submit"),
            &[("submit", "clobbered"), ("username", "guest"), ("password", "12345678")],
        ));
        let body = transport.last_request().and_then(|request| request.body);
        assert_eq!(body, Some(b"username=guest&password=12345678&submit=done".to_vec()));
    }

    #[test]
    fn form_without_action_posts_to_current_page() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.page(HOME, "<form name=\"search\"><input name=\"q\" value=\"a&amp;b\"></form>");

        let mut browser = session(&transport);
        ok(browser.goto(HOME));
        let form = ok(browser.get_form("search"));
        assert_eq!(ok(form.action_url(&browser)), HOME);
        ok(form.submit(&mut browser, None, &[]));

        let body = transport.last_request().and_then(|request| request.body);
        assert_eq!(body, Some(b"q=a%26b".to_vec()));
    }

    #[test]
    fn back_refetches_previous_page() {
        let transport = Arc::new(ScriptedTransport::new());
        for n in 1..=3 {
            transport.page(&format!("http://www.example.com/{n}"), &format!("location{n}"));
        }

        let mut browser = session(&transport);
        assert_eq!(ok(browser.back()), None);

        ok(browser.goto("http://www.example.com/1"));
        ok(browser.goto("2"));
        assert_eq!(transport.last_url(), Some("http://www.example.com/2".to_owned()));

        assert_eq!(ok(browser.back()), Some("http://www.example.com/1".to_owned()));
        assert_eq!(transport.last_url(), Some("http://www.example.com/1".to_owned()));

        ok(browser.goto("3"));
        assert_eq!(transport.last_url(), Some("http://www.example.com/3".to_owned()));
        assert_eq!(browser.history(), ["http://www.example.com/1", "3"]);
    }

    #[test]
    fn failed_back_restores_history() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.page("http://www.example.com/1", "one");
        transport.page("http://www.example.com/2", "two");

        let mut browser = session(&transport);
        ok(browser.goto("http://www.example.com/1"));
        ok(browser.goto("http://www.example.com/2"));
        transport.fail("http://www.example.com/1", 10);

        assert!(browser.goto_with("http://www.example.com/1", None, 0).is_err());
        assert!(browser.back().is_err());
        assert_eq!(browser.history(), ["http://www.example.com/1", "http://www.example.com/2"]);
        assert_eq!(browser.current_url(), Some("http://www.example.com/2"));
    }

    #[test]
    fn repeated_goto_does_not_duplicate_history() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.page(HOME, "home");

        let mut browser = session(&transport);
        ok(browser.goto(HOME));
        ok(browser.goto(HOME));
        assert_eq!(browser.history(), [HOME]);
    }

    #[test]
    fn sanitize_rewrites_page_and_resets_views() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.page(HOME, "<a href=\"keep.html\">k</a><!--x--><a href=\"ad.html\">ad</a><!--/x-->");

        let mut browser = session(&transport);
        ok(browser.goto(HOME));
        assert_eq!(browser.links().len(), 2);

        ok(browser.sanitize("<!--x-->.*?<!--/x-->"));
        assert_eq!(browser.page(), b"<a href=\"keep.html\">k</a>");
        assert_eq!(browser.links().len(), 1);

        let invalid = browser.sanitize("(unclosed");
        assert!(invalid.is_err_and(|error| error.kind == ErrorKind::InvalidPattern));
    }

    #[test]
    fn lookups_and_link_urls() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.page(
            HOME,
            "<a href=\"/page?n=1&amp;s=2\">p1</a><a href=\"/page?n=2\">p2</a><a href=\"/about\">about</a>",
        );

        let mut browser = session(&transport);
        ok(browser.goto(HOME));

        assert_eq!(
            ok(browser.link_urls("page")),
            ["http://www.example.com/page?n=1&s=2", "http://www.example.com/page?n=2"]
        );
        assert!(browser.link_urls("missing").is_err_and(|error| error.kind == ErrorKind::ElementNotFound));
        assert!(browser.get_form("login").is_err_and(|error| error.kind == ErrorKind::ElementNotFound));
        assert!(browser.get_frame("x").is_err_and(|error| error.kind == ErrorKind::ElementNotFound));
    }

    #[test]
    fn sessions_can_move_across_threads() {
        fn assert_send<T: Send>() {}
        assert_send::<Session>();
    }
}
