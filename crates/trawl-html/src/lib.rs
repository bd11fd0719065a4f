//! HTML tokenization and tree construction.

pub mod charset;

pub use trawl_dom::decode_entities;

use trawl_dom::Attribute;
use trawl_dom::Document;
use trawl_dom::NodeId;
use trawl_dom::ROOT;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "frame", "hr", "img", "input", "keygen", "link", "meta",
    "param", "source", "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Elements implicitly closed when a sibling of the same name opens.
const SELF_NESTING_CLOSED: &[&str] = &["option", "li", "p", "tr", "td", "th", "dt", "dd"];

/// Parses raw HTML into a DOM document.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlParser;

impl HtmlParser {
    /// Decodes `body` using `declared_charset` (falling back to sniffing) and parses it.
    pub fn parse_bytes(&self, body: &[u8], declared_charset: Option<&str>) -> Document {
        let text = charset::decode_body(body, declared_charset);
        self.parse(&text)
    }

    pub fn parse(&self, input: &str) -> Document {
        TreeBuilder::new().build(input)
    }
}

struct TreeBuilder {
    document: Document,
    open: Vec<(NodeId, String)>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            document: Document::empty(),
            open: Vec::new(),
        }
    }

    fn current(&self) -> NodeId {
        self.open.last().map(|(id, _)| *id).unwrap_or(ROOT)
    }

    fn build(mut self, input: &str) -> Document {
        let bytes = input.as_bytes();
        let mut idx = 0_usize;

        while idx < bytes.len() {
            if bytes[idx] != b'<' {
                let next = find_byte(bytes, idx.saturating_add(1), b'<').unwrap_or(bytes.len());
                let parent = self.current();
                self.document.append_text(parent, &input[idx..next]);
                idx = next;
                continue;
            }

            if starts_with(bytes, idx, b"<!--") {
                idx = skip_comment(bytes, idx);
                continue;
            }

            if starts_with(bytes, idx, b"<!") || starts_with(bytes, idx, b"<?") {
                idx = skip_to_gt(bytes, idx.saturating_add(2));
                continue;
            }

            let Some((tag, next_idx)) = parse_tag(input, idx) else {
                // A stray `<` is text.
                let parent = self.current();
                self.document.append_text(parent, "<");
                idx = idx.saturating_add(1);
                continue;
            };

            if tag.is_end {
                self.close(&tag.name);
                idx = next_idx;
                continue;
            }

            idx = self.open_element(input, tag, next_idx);
        }

        self.document
    }

    fn open_element(&mut self, input: &str, tag: ParsedTag, next_idx: usize) -> usize {
        if SELF_NESTING_CLOSED.contains(&tag.name.as_str())
            && self.open.last().is_some_and(|(_, name)| *name == tag.name)
        {
            self.open.pop();
        }

        let parent = self.current();
        let id = self
            .document
            .append_element(parent, &tag.name, tag.attributes);

        if tag.self_closing || VOID_ELEMENTS.contains(&tag.name.as_str()) {
            return next_idx;
        }

        if RAW_TEXT_ELEMENTS.contains(&tag.name.as_str()) {
            let (raw, after) = read_raw_text_until_end_tag(input, next_idx, &tag.name);
            self.document.append_text(id, raw);
            return after;
        }

        self.open.push((id, tag.name));
        next_idx
    }

    fn close(&mut self, name: &str) {
        if let Some(position) = self.open.iter().rposition(|(_, open)| open == name) {
            self.open.truncate(position);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedTag {
    name: String,
    attributes: Vec<Attribute>,
    is_end: bool,
    self_closing: bool,
}

fn parse_tag(input: &str, start: usize) -> Option<(ParsedTag, usize)> {
    let bytes = input.as_bytes();
    if bytes.get(start).copied() != Some(b'<') {
        return None;
    }

    let mut idx = start.saturating_add(1);
    let is_end = bytes.get(idx).copied() == Some(b'/');
    if is_end {
        idx = idx.saturating_add(1);
    }

    let name_start = idx;
    while idx < bytes.len() && is_tag_name_char(bytes[idx]) {
        idx = idx.saturating_add(1);
    }
    if idx == name_start || !bytes[name_start].is_ascii_alphabetic() {
        return None;
    }
    let name = input[name_start..idx].to_ascii_lowercase();

    let mut attributes = Vec::new();
    let mut self_closing = false;

    loop {
        idx = skip_spaces(bytes, idx);
        match bytes.get(idx).copied() {
            None => return None,
            Some(b'>') => break,
            Some(b'/') => {
                idx = idx.saturating_add(1);
                if bytes.get(idx).copied() == Some(b'>') {
                    self_closing = true;
                    break;
                }
                continue;
            }
            Some(_) => {}
        }

        let attr_start = idx;
        while idx < bytes.len() && !is_attribute_name_terminator(bytes[idx]) {
            idx = idx.saturating_add(1);
        }
        if idx == attr_start {
            // Unexpected byte such as a lone quote; skip it.
            idx = idx.saturating_add(1);
            continue;
        }
        let attr_name = input[attr_start..idx].to_ascii_lowercase();

        idx = skip_spaces(bytes, idx);
        let mut value = String::new();
        if bytes.get(idx).copied() == Some(b'=') {
            idx = skip_spaces(bytes, idx.saturating_add(1));
            match bytes.get(idx).copied() {
                Some(quote @ (b'"' | b'\'')) => {
                    let value_start = idx.saturating_add(1);
                    let value_end = find_byte(bytes, value_start, quote)?;
                    value = input[value_start..value_end].to_owned();
                    idx = value_end.saturating_add(1);
                }
                Some(_) => {
                    let value_start = idx;
                    while idx < bytes.len()
                        && !bytes[idx].is_ascii_whitespace()
                        && bytes[idx] != b'>'
                    {
                        idx = idx.saturating_add(1);
                    }
                    value = input[value_start..idx].to_owned();
                }
                None => return None,
            }
        }

        if !attributes
            .iter()
            .any(|existing: &Attribute| existing.name == attr_name)
        {
            attributes.push(Attribute {
                name: attr_name,
                value,
            });
        }
    }

    Some((
        ParsedTag {
            name,
            attributes,
            is_end,
            self_closing,
        },
        idx.saturating_add(1),
    ))
}

fn read_raw_text_until_end_tag<'a>(
    input: &'a str,
    start: usize,
    tag_name: &str,
) -> (&'a str, usize) {
    let bytes = input.as_bytes();
    let tag_bytes = tag_name.as_bytes();
    let mut idx = start;

    while idx < bytes.len() {
        if bytes[idx] == b'<'
            && bytes.get(idx.saturating_add(1)).copied() == Some(b'/')
            && starts_with_ignore_ascii_case(bytes, idx.saturating_add(2), tag_bytes)
            && tag_name_boundary(bytes, idx.saturating_add(2 + tag_bytes.len()))
        {
            let end = skip_to_gt(bytes, idx);
            return (&input[start..idx], end);
        }

        idx = idx.saturating_add(1);
    }

    (&input[start..], bytes.len())
}

fn skip_comment(bytes: &[u8], start: usize) -> usize {
    find_subslice(bytes, start.saturating_add(4), b"-->")
        .map(|end| end.saturating_add(3))
        .unwrap_or(bytes.len())
}

fn skip_to_gt(bytes: &[u8], mut idx: usize) -> usize {
    while idx < bytes.len() {
        if bytes[idx] == b'>' {
            return idx.saturating_add(1);
        }
        idx = idx.saturating_add(1);
    }

    bytes.len()
}

fn tag_name_boundary(bytes: &[u8], idx: usize) -> bool {
    match bytes.get(idx).copied() {
        None => true,
        Some(byte) => byte.is_ascii_whitespace() || byte == b'>' || byte == b'/',
    }
}

fn skip_spaces(bytes: &[u8], mut idx: usize) -> usize {
    while idx < bytes.len() && bytes[idx].is_ascii_whitespace() {
        idx = idx.saturating_add(1);
    }
    idx
}

fn is_tag_name_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b':')
}

fn is_attribute_name_terminator(byte: u8) -> bool {
    byte.is_ascii_whitespace() || matches!(byte, b'=' | b'>' | b'/' | b'"' | b'\'')
}

fn starts_with(bytes: &[u8], idx: usize, pattern: &[u8]) -> bool {
    let end = idx.saturating_add(pattern.len());
    end <= bytes.len() && bytes[idx..end] == *pattern
}

fn starts_with_ignore_ascii_case(bytes: &[u8], idx: usize, pattern: &[u8]) -> bool {
    let end = idx.saturating_add(pattern.len());
    if end > bytes.len() {
        return false;
    }

    bytes[idx..end]
        .iter()
        .zip(pattern.iter())
        .all(|(left, right)| left.eq_ignore_ascii_case(right))
}

fn find_subslice(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= bytes.len() {
        return None;
    }

    bytes[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

fn find_byte(bytes: &[u8], from: usize, byte: u8) -> Option<usize> {
    if from >= bytes.len() {
        return None;
    }

    bytes[from..]
        .iter()
        .position(|candidate| *candidate == byte)
        .map(|offset| from + offset)
}

#[cfg(test)]
mod tests {
    use super::HtmlParser;

    #[test]
    fn parses_title_and_links() {
        let doc = HtmlParser.parse(
            "<html><head><title> Trawl  Test </title></head>\
             <body><a href=\"one.html\">one</a><A HREF='two.html'>two</A></body></html>",
        );

        assert_eq!(doc.title(), Some("Trawl Test".to_owned()));
        let links = doc.find_by_tag("a");
        assert_eq!(links.len(), 2);
        assert_eq!(links[1].attribute("href"), Some("two.html"));
        assert_eq!(links[1].text(), "two");
    }

    #[test]
    fn void_and_self_closing_elements_do_not_swallow_siblings() {
        let doc = HtmlParser.parse(
            "<form><input name=a><input name=b /><br><select name=c></select></form>",
        );

        let form = doc.find("form");
        assert!(form.is_some());
        let children = form.map(|form| form.children().len()).unwrap_or_default();
        assert_eq!(children, 4);
    }

    #[test]
    fn attributes_without_values_and_unquoted_values() {
        let doc = HtmlParser.parse("<input type=checkbox name=\"x\" checked disabled>");
        let input = doc.find("input");
        assert_eq!(input.and_then(|input| input.attribute("type")), Some("checkbox"));
        assert_eq!(input.and_then(|input| input.attribute("checked")), Some(""));
        assert!(input.is_some_and(|input| input.has_attribute("disabled")));
    }

    #[test]
    fn raw_text_elements_keep_markup_as_text() {
        let doc = HtmlParser.parse(
            "<script>if (a < b) { x = '<a href=no>'; }</script><textarea name=t>1 &lt; 2</textarea>",
        );

        assert!(doc.find_by_tag("a").is_empty());
        let textarea = doc.find("textarea");
        assert_eq!(
            textarea.map(|element| element.raw_text()),
            Some("1 &lt; 2".to_owned())
        );
        assert_eq!(textarea.map(|element| element.text()), Some("1 < 2".to_owned()));
    }

    #[test]
    fn repeated_options_close_implicitly() {
        let doc = HtmlParser.parse(
            "<select name=s><option value=a>A<option value=b selected>B</select><p>after",
        );

        let select = doc.find("select");
        let options = select
            .map(|select| select.children().len())
            .unwrap_or_default();
        assert_eq!(options, 2);
        assert_eq!(doc.find("p").map(|p| p.text()), Some("after".to_owned()));
    }

    #[test]
    fn comments_doctype_and_stray_end_tags_are_ignored() {
        let doc = HtmlParser.parse(
            "<!DOCTYPE html><!-- <a href=hidden> --></div><a href=shown>x</a> 1 < 2",
        );

        let links = doc.find_by_tag("a");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].attribute("href"), Some("shown"));
        assert!(doc.root().text().ends_with("1 < 2"));
    }

    #[test]
    fn frames_are_found_inside_framesets() {
        let doc = HtmlParser.parse(
            "<frameset cols=\"25%,75%\"><frame src=\"frame_a.htm\" /><frame src=\"frame_b.htm\"></frameset>",
        );

        let frames = doc.find_by_tag("frame");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].attribute("src"), Some("frame_a.htm"));
    }

    #[test]
    fn parse_bytes_honors_declared_charset() {
        let doc = HtmlParser.parse_bytes(b"<p>caf\xe9</p>", Some("iso-8859-1"));
        assert_eq!(doc.find("p").map(|p| p.text()), Some("caf\u{e9}".to_owned()));
    }
}
