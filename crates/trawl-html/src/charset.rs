//! Character set detection and byte decoding for fetched pages.

use encoding_rs::Encoding;
use encoding_rs::UTF_8;

const META_SNIFF_BYTES: usize = 8192;

/// `charset=` label of a `Content-Type` value, quotes stripped.
pub fn charset_from_content_type(content_type: &str) -> Option<String> {
    for part in content_type.split(';').skip(1) {
        let Some((name, value)) = part.split_once('=') else {
            continue;
        };
        if !name.trim().eq_ignore_ascii_case("charset") {
            continue;
        }

        let label = value.trim().trim_matches('"').trim_matches('\'');
        if !label.is_empty() {
            return Some(label.to_owned());
        }
    }

    None
}

/// `charset=` label found in the leading bytes of an HTML document.
pub fn charset_from_html_prefix(body: &[u8]) -> Option<String> {
    let prefix_len = body.len().min(META_SNIFF_BYTES);
    let prefix = String::from_utf8_lossy(&body[..prefix_len]);
    let lower = prefix.to_ascii_lowercase();
    let mut search_start = 0_usize;

    while let Some(relative) = lower[search_start..].find("charset=") {
        let label_start = search_start + relative + "charset=".len();
        if let Some(label) = charset_label(&prefix[label_start..]) {
            return Some(label);
        }
        search_start = label_start;
    }

    None
}

fn charset_label(input: &str) -> Option<String> {
    let trimmed = input.trim_start();
    let first = trimmed.chars().next()?;

    let label = if first == '"' || first == '\'' {
        let rest = &trimmed[first.len_utf8()..];
        let end = rest.find(first)?;
        rest[..end].trim()
    } else {
        let end = trimmed
            .find(|ch: char| ch.is_whitespace() || matches!(ch, '"' | '\'' | ';' | '>' | '/'))
            .unwrap_or(trimmed.len());
        trimmed[..end].trim()
    };

    if label.is_empty() {
        None
    } else {
        Some(label.to_owned())
    }
}

/// Picks the encoding for `body`: declared label, then `<meta>` sniffing, then UTF-8.
pub fn resolve_encoding(body: &[u8], declared: Option<&str>) -> &'static Encoding {
    declared
        .and_then(|label| Encoding::for_label(label.trim().as_bytes()))
        .or_else(|| {
            charset_from_html_prefix(body).and_then(|label| Encoding::for_label(label.as_bytes()))
        })
        .unwrap_or(UTF_8)
}

/// Decodes `body` to text. A byte order mark overrides the chosen encoding.
pub fn decode_body(body: &[u8], declared: Option<&str>) -> String {
    let encoding = resolve_encoding(body, declared);
    let (decoded, _, _) = encoding.decode(body);
    decoded.into_owned()
}
