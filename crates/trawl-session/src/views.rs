//! Typed snapshots of page elements: links, frames and iframes.

use crate::session::Session;
use trawl_core::ErrorKind;
use trawl_core::TrawlError;
use trawl_core::TrawlResult;
use trawl_dom::ElementRef;
use trawl_dom::decode_entities;

/// An element a page exposes for lookup by key.
pub trait PageElement {
    /// Singular noun used in lookup errors.
    const KIND: &'static str;

    fn matches(&self, key: &str) -> bool;
}

/// Page elements of one kind in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementList<T> {
    items: Vec<T>,
}

impl<T> Default for ElementList<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: PageElement> ElementList<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    /// First element matching `key`.
    pub fn get(&self, key: &str) -> Option<&T> {
        self.items.iter().find(|item| item.matches(key))
    }

    /// Like [`ElementList::get`], but a miss is an `ElementNotFound` error.
    pub fn require(&self, key: &str) -> TrawlResult<&T> {
        self.get(key).ok_or_else(|| {
            TrawlError::new(
                ErrorKind::ElementNotFound,
                "session.element.not_found",
                format!("no {} matching `{key}` on the current page", T::KIND),
            )
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<'a, T> IntoIterator for &'a ElementList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Entity-decoded navigation target, or `MissingTarget` when absent or blank.
fn target(raw: Option<&str>, kind: &str, attribute: &str) -> TrawlResult<String> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => Ok(decode_entities(value)),
        None => Err(TrawlError::new(
            ErrorKind::MissingTarget,
            "session.element.missing_target",
            format!("{kind} has no `{attribute}` to follow"),
        )),
    }
}

/// An `<a>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    href: Option<String>,
    text: String,
}

impl Link {
    pub fn from_element(element: &ElementRef<'_>) -> Self {
        Self {
            href: element.attribute("href").map(str::to_owned),
            text: element.text(),
        }
    }

    /// Raw `href` as written in the page.
    pub fn href(&self) -> Option<&str> {
        self.href.as_deref()
    }

    /// Decoded visible text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Absolute URL this link points to from the session's current page.
    pub fn url(&self, session: &Session) -> TrawlResult<String> {
        session.resolve_url(&target(self.href(), Self::KIND, "href")?)
    }

    /// Navigates `session` to this link.
    pub fn goto(&self, session: &mut Session) -> TrawlResult<String> {
        session.goto(&target(self.href(), Self::KIND, "href")?)
    }
}

impl PageElement for Link {
    const KIND: &'static str = "link";

    fn matches(&self, key: &str) -> bool {
        self.href.as_deref().is_some_and(|href| href.contains(key)) || self.text.contains(key)
    }
}

/// A `<frame>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    src: Option<String>,
}

impl Frame {
    pub fn from_element(element: &ElementRef<'_>) -> Self {
        Self {
            src: element.attribute("src").map(str::to_owned),
        }
    }

    pub fn src(&self) -> Option<&str> {
        self.src.as_deref()
    }

    pub fn url(&self, session: &Session) -> TrawlResult<String> {
        session.resolve_url(&target(self.src(), Self::KIND, "src")?)
    }

    pub fn goto(&self, session: &mut Session) -> TrawlResult<String> {
        session.goto(&target(self.src(), Self::KIND, "src")?)
    }
}

impl PageElement for Frame {
    const KIND: &'static str = "frame";

    fn matches(&self, key: &str) -> bool {
        self.src.as_deref().is_some_and(|src| src.contains(key))
    }
}

/// An `<iframe>` element. Behaves like [`Frame`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IFrame {
    src: Option<String>,
}

impl IFrame {
    pub fn from_element(element: &ElementRef<'_>) -> Self {
        Self {
            src: element.attribute("src").map(str::to_owned),
        }
    }

    pub fn src(&self) -> Option<&str> {
        self.src.as_deref()
    }

    pub fn url(&self, session: &Session) -> TrawlResult<String> {
        session.resolve_url(&target(self.src(), Self::KIND, "src")?)
    }

    pub fn goto(&self, session: &mut Session) -> TrawlResult<String> {
        session.goto(&target(self.src(), Self::KIND, "src")?)
    }
}

impl PageElement for IFrame {
    const KIND: &'static str = "iframe";

    fn matches(&self, key: &str) -> bool {
        self.src.as_deref().is_some_and(|src| src.contains(key))
    }
}
