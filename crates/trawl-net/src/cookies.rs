//! In-memory cookie jar shared by every request a transport makes.

use crate::url::WebUrl;
use std::collections::BTreeMap;

const MAX_COOKIE_DOMAINS: usize = 256;
const MAX_COOKIES_PER_DOMAIN: usize = 64;

/// One stored cookie value with its scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCookie {
    pub value: String,
    pub secure: bool,
    /// Set when no `Domain` attribute widened the scope past the origin host.
    pub host_only: bool,
}

/// Parsed `Set-Cookie` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub domain: String,
    pub path: String,
    pub name: String,
    pub value: String,
    pub secure: bool,
    pub host_only: bool,
    pub delete: bool,
}

impl SetCookie {
    /// Parses a `Set-Cookie` value received from `url`.
    pub fn parse(input: &str, url: &WebUrl) -> Option<Self> {
        let mut segments = input.split(';');
        let (name, value) = segments.next()?.trim().split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut cookie = Self {
            domain: normalize_domain(url.host())?,
            path: default_path(&url.path_and_query()),
            name: name.to_owned(),
            value: value.trim().trim_matches('"').to_owned(),
            secure: false,
            host_only: true,
            delete: value.trim().is_empty(),
        };

        for attribute in segments.map(str::trim).filter(|attr| !attr.is_empty()) {
            let (attr_name, attr_value) = attribute
                .split_once('=')
                .map(|(name, value)| (name.trim(), value.trim()))
                .unwrap_or((attribute, ""));

            match attr_name.to_ascii_lowercase().as_str() {
                "domain" => {
                    // A server may only widen scope to a parent of its own host.
                    if let Some(domain) = normalize_domain(attr_value) {
                        if domain_matches(url.host(), &domain) {
                            cookie.domain = domain;
                            cookie.host_only = false;
                        }
                    }
                }
                "path" if attr_value.starts_with('/') => cookie.path = attr_value.to_owned(),
                "secure" => cookie.secure = true,
                "max-age" => {
                    if attr_value.parse::<i64>().is_ok_and(|seconds| seconds <= 0) {
                        cookie.delete = true;
                    }
                }
                _ => {}
            }
        }

        Some(cookie)
    }
}

/// Name and path identifying a cookie within one domain.
type CookieKey = (String, String);

/// Cookies grouped by domain, then by name and path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    domains: BTreeMap<String, BTreeMap<CookieKey, StoredCookie>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores every `Set-Cookie` value from a response to `url`.
    pub fn store<'a, I>(&mut self, url: &WebUrl, set_cookie_values: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for raw in set_cookie_values {
            match SetCookie::parse(raw, url) {
                Some(cookie) => self.apply(cookie),
                None => tracing::debug!(header = raw, "ignoring malformed Set-Cookie"),
            }
        }
    }

    pub fn apply(&mut self, cookie: SetCookie) {
        let key = (cookie.name, cookie.path);

        if cookie.delete {
            if let Some(entries) = self.domains.get_mut(&cookie.domain) {
                entries.remove(&key);
                if entries.is_empty() {
                    self.domains.remove(&cookie.domain);
                }
            }
            return;
        }

        if !self.domains.contains_key(&cookie.domain) && self.domains.len() >= MAX_COOKIE_DOMAINS {
            if let Some(evicted) = self.domains.keys().next().cloned() {
                self.domains.remove(&evicted);
            }
        }

        let entries = self.domains.entry(cookie.domain).or_default();
        if !entries.contains_key(&key) && entries.len() >= MAX_COOKIES_PER_DOMAIN {
            if let Some(evicted) = entries.keys().next().cloned() {
                entries.remove(&evicted);
            }
        }

        entries.insert(
            key,
            StoredCookie {
                value: cookie.value,
                secure: cookie.secure,
                host_only: cookie.host_only,
            },
        );
    }

    /// `Cookie` header value for `url`, or `None` when nothing matches.
    ///
    /// For one name and path, a more specific domain shadows its parents.
    /// Pairs are sorted by name, longer paths first within a name.
    pub fn header_for(&self, url: &WebUrl) -> Option<String> {
        let host = url.host();
        let path = url.path_and_query();
        let path = path.split('?').next().unwrap_or("/");

        let mut matching: Vec<(&String, &BTreeMap<CookieKey, StoredCookie>)> = self
            .domains
            .iter()
            .filter(|(domain, _)| domain_matches(host, domain))
            .collect();
        matching.sort_by(|(left, _), (right, _)| right.len().cmp(&left.len()));

        let mut selected: BTreeMap<(&str, &str), &str> = BTreeMap::new();
        for (domain, entries) in matching {
            for ((name, cookie_path), cookie) in entries {
                if cookie.host_only && host != domain.as_str() {
                    continue;
                }
                if cookie.secure && !url.is_secure() {
                    continue;
                }
                if !path_matches(path, cookie_path) {
                    continue;
                }
                selected
                    .entry((name.as_str(), cookie_path.as_str()))
                    .or_insert(cookie.value.as_str());
            }
        }

        if selected.is_empty() {
            return None;
        }

        let mut pairs: Vec<((&str, &str), &str)> = selected.into_iter().collect();
        pairs.sort_by(|((left_name, left_path), _), ((right_name, right_path), _)| {
            left_name
                .cmp(right_name)
                .then_with(|| right_path.len().cmp(&left_path.len()))
        });

        Some(
            pairs
                .into_iter()
                .map(|((name, _), value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    pub fn len(&self) -> usize {
        self.domains.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn clear(&mut self) {
        self.domains.clear();
    }
}

fn normalize_domain(input: &str) -> Option<String> {
    let normalized = input.trim().trim_start_matches('.').to_ascii_lowercase();
    if normalized.is_empty() || normalized.chars().any(char::is_whitespace) {
        None
    } else {
        Some(normalized)
    }
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || (host.len() > domain.len()
            && host.ends_with(domain)
            && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
}

fn default_path(path_and_query: &str) -> String {
    let path = path_and_query.split('?').next().unwrap_or("/");
    match path.rfind('/') {
        Some(0) | None => "/".to_owned(),
        Some(index) => path[..index].to_owned(),
    }
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    request_path == cookie_path
        || (request_path.starts_with(cookie_path)
            && (cookie_path.ends_with('/')
                || request_path.as_bytes().get(cookie_path.len()) == Some(&b'/')))
}

#[cfg(test)]
mod tests {
    use super::CookieJar;
    use super::SetCookie;
    use super::domain_matches;
    use crate::url::WebUrl;

    fn url(raw: &str) -> WebUrl {
        match WebUrl::parse(raw) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn parses_domain_path_and_deletion() {
        let origin = url("http://www.example.com/account/login.cgi");
        let parsed = SetCookie::parse("sid=abc; Domain=.example.com; Path=/; Max-Age=3600", &origin);
        assert!(parsed.is_some_and(|cookie| {
            cookie.domain == "example.com" && cookie.path == "/" && cookie.value == "abc" && !cookie.delete
        }));

        let defaulted = SetCookie::parse("sid=abc", &origin);
        assert!(defaulted.is_some_and(|cookie| cookie.domain == "www.example.com" && cookie.path == "/account"));

        let deleted = SetCookie::parse("sid=; Max-Age=0", &origin);
        assert!(deleted.is_some_and(|cookie| cookie.delete));
    }

    #[test]
    fn foreign_domain_attribute_is_ignored() {
        let parsed = SetCookie::parse("sid=abc; Domain=evil.org", &url("http://www.example.com/"));
        assert!(parsed.is_some_and(|cookie| cookie.domain == "www.example.com"));
    }

    #[test]
    fn domain_matching_supports_parent_domains() {
        assert!(domain_matches("www.example.com", "example.com"));
        assert!(domain_matches("example.com", "example.com"));
        assert!(!domain_matches("badexample.com", "example.com"));
    }

    #[test]
    fn jar_sends_matching_cookies_sorted_by_name() {
        let mut jar = CookieJar::new();
        let origin = url("http://www.example.com/");
        jar.store(&origin, ["z=last; Path=/", "a=first; Domain=example.com; Path=/"]);

        assert_eq!(
            jar.header_for(&url("http://www.example.com/members/")),
            Some("a=first; z=last".to_owned())
        );
        assert_eq!(
            jar.header_for(&url("http://static.example.com/")),
            Some("a=first".to_owned())
        );
        assert_eq!(jar.header_for(&url("http://other.org/")), None);
    }

    #[test]
    fn cookie_without_domain_stays_on_its_host() {
        let mut jar = CookieJar::new();
        jar.store(&url("http://example.com/"), ["sid=host; Path=/"]);
        assert!(
            SetCookie::parse("sid=host", &url("http://example.com/")).is_some_and(|cookie| cookie.host_only)
        );

        assert_eq!(jar.header_for(&url("http://example.com/")), Some("sid=host".to_owned()));
        assert_eq!(jar.header_for(&url("http://www.example.com/")), None);

        jar.store(&url("http://example.com/"), ["wide=1; Domain=example.com; Path=/"]);
        assert_eq!(jar.header_for(&url("http://www.example.com/")), Some("wide=1".to_owned()));
    }

    #[test]
    fn same_name_with_different_paths_coexist() {
        let mut jar = CookieJar::new();
        let origin = url("http://example.com/");
        jar.store(&origin, ["pref=root; Path=/", "pref=members; Path=/members"]);
        assert_eq!(jar.len(), 2);

        assert_eq!(
            jar.header_for(&url("http://example.com/members/home")),
            Some("pref=members; pref=root".to_owned())
        );
        assert_eq!(jar.header_for(&url("http://example.com/")), Some("pref=root".to_owned()));

        jar.store(&origin, ["pref=; Path=/members; Max-Age=0"]);
        assert_eq!(
            jar.header_for(&url("http://example.com/members/home")),
            Some("pref=root".to_owned())
        );
    }

    #[test]
    fn secure_and_path_scoped_cookies_are_filtered() {
        let mut jar = CookieJar::new();
        jar.store(
            &url("https://example.com/"),
            ["token=s; Secure; Path=/", "area=m; Path=/members"],
        );

        assert_eq!(jar.header_for(&url("http://example.com/")), None);
        assert_eq!(
            jar.header_for(&url("https://example.com/members/home")),
            Some("area=m; token=s".to_owned())
        );
        assert_eq!(
            jar.header_for(&url("https://example.com/membership")),
            Some("token=s".to_owned())
        );
    }

    #[test]
    fn deletion_removes_cookie() {
        let mut jar = CookieJar::new();
        let origin = url("http://example.com/");
        jar.store(&origin, ["sid=abc; Path=/"]);
        assert_eq!(jar.len(), 1);

        jar.store(&origin, ["sid=; Path=/; Max-Age=0"]);
        assert!(jar.is_empty());
    }
}
