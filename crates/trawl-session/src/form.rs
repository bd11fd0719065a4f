//! HTML forms: default values, submit buttons and submission.

use crate::session::Session;
use crate::views::PageElement;
use std::sync::Arc;
use trawl_core::ErrorKind;
use trawl_core::TrawlError;
use trawl_core::TrawlResult;
use trawl_dom::Document;
use trawl_dom::ElementRef;
use trawl_dom::decode_entities;
use url::form_urlencoded;

/// Insertion-ordered name/value map. Re-inserting a name keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    entries: Vec<(String, String)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Sets `name`, replacing an existing value in place or appending.
    pub fn insert(&mut self, name: &str, value: &str) {
        match self.entries.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value.to_owned(),
            None => self.entries.push((name.to_owned(), value.to_owned())),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.entries.iter().position(|(key, _)| key == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Snapshot of a `<form>` and the defaults it would submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    id: Option<String>,
    name: Option<String>,
    action: Option<String>,
    fields: FieldMap,
    submits: FieldMap,
}

impl Form {
    pub fn from_element(form: &ElementRef<'_>) -> Self {
        let mut fields = FieldMap::new();
        let mut submits = FieldMap::new();

        let controls = form.find_all(None, |element| {
            matches!(element.name(), "input" | "textarea" | "select")
        });

        for control in controls {
            if control.has_attribute("disabled") {
                continue;
            }
            let Some(name) = control.attribute("name") else {
                continue;
            };

            match control.name() {
                "input" => {
                    let value = decode_entities(control.attribute("value").unwrap_or_default());
                    let kind = control.attribute("type").unwrap_or_default();
                    if kind.eq_ignore_ascii_case("submit") {
                        submits.insert(name, &value);
                    } else if !kind.eq_ignore_ascii_case("button") {
                        fields.insert(name, &value);
                    }
                }
                "textarea" => {
                    let value = match control.attribute("value") {
                        Some(value) => decode_entities(value),
                        None => decode_entities(&control.raw_text()),
                    };
                    fields.insert(name, &value);
                }
                _ => {
                    if let Some(value) = selected_option(&control) {
                        fields.insert(name, &value);
                    }
                }
            }
        }

        Self {
            id: form.attribute("id").map(str::to_owned),
            name: form.attribute("name").map(str::to_owned),
            action: form.attribute("action").map(str::to_owned),
            fields,
            submits,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Raw `action` as written in the page.
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    /// Named controls and their default values, in document order.
    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Submit buttons by name.
    pub fn submits(&self) -> &FieldMap {
        &self.submits
    }

    /// Absolute URL the form posts to. A missing action targets the current page.
    pub fn action_url(&self, session: &Session) -> TrawlResult<String> {
        let action = self
            .action
            .as_deref()
            .map(str::trim)
            .filter(|action| !action.is_empty());

        match action {
            Some(action) => session.resolve_url(&decode_entities(action)),
            None => session.current_url().map(str::to_owned).ok_or_else(|| {
                TrawlError::invalid_url(
                    "session.url.no_base",
                    "form has no action and the session has no current page",
                )
            }),
        }
    }

    /// URL-encoded body `submit` would send.
    ///
    /// Defaults come first, then `overrides` (same-name values replaced in
    /// place, new names appended), then the submit button pair.
    pub fn encode(&self, submit_name: Option<&str>, overrides: &[(&str, &str)]) -> TrawlResult<String> {
        let submit = self.submit_pair(submit_name)?;

        let mut body = self.fields.clone();
        for (name, value) in overrides {
            body.insert(name, value);
        }
        if let Some((name, value)) = submit {
            body.remove(name);
            body.insert(name, value);
        }

        Ok(form_urlencoded::Serializer::new(String::new())
            .extend_pairs(body.iter())
            .finish())
    }

    /// Posts the form through `session` and returns the resulting document.
    pub fn submit(
        &self,
        session: &mut Session,
        submit_name: Option<&str>,
        overrides: &[(&str, &str)],
    ) -> TrawlResult<Arc<Document>> {
        let action = self.action_url(session)?;
        let body = self.encode(submit_name, overrides)?;
        session.post(&action, body.into_bytes())?;
        Ok(Arc::clone(session.document()))
    }

    fn submit_pair(&self, submit_name: Option<&str>) -> TrawlResult<Option<(&str, &str)>> {
        if let Some(requested) = submit_name {
            return match self.submits.iter().find(|(name, _)| *name == requested) {
                Some(pair) => Ok(Some(pair)),
                None => Err(TrawlError::new(
                    ErrorKind::UnknownSubmitButton,
                    "session.form.unknown_submit",
                    format!(
                        "form has no submit button named `{requested}`; available: [{}]",
                        self.submit_names()
                    ),
                )),
            };
        }

        match self.submits.len() {
            0 => Ok(None),
            1 => Ok(self.submits.iter().next()),
            _ => Err(TrawlError::new(
                ErrorKind::AmbiguousSubmit,
                "session.form.ambiguous_submit",
                format!(
                    "form has several submit buttons, name one of [{}]",
                    self.submit_names()
                ),
            )),
        }
    }

    fn submit_names(&self) -> String {
        self.submits.keys().collect::<Vec<_>>().join(", ")
    }
}

impl PageElement for Form {
    const KIND: &'static str = "form";

    fn matches(&self, key: &str) -> bool {
        self.id.as_deref() == Some(key)
            || self.name.as_deref() == Some(key)
            || self.action.as_deref().is_some_and(|action| action.contains(key))
    }
}

/// Value of the last `<option selected>`; its text when it has no `value`.
fn selected_option(select: &ElementRef<'_>) -> Option<String> {
    let option = select
        .find_all(Some("option"), |option| option.has_attribute("selected"))
        .into_iter()
        .last()?;

    let value = match option.attribute("value") {
        Some(value) => decode_entities(value.trim()),
        None => option.text(),
    };
    Some(value.trim().to_owned())
}

#[cfg(test)]
mod tests {
    use super::FieldMap;
    use super::Form;
    use crate::views::PageElement;
    use trawl_core::ErrorKind;
    use trawl_html::HtmlParser;

    fn form(html: &str) -> Form {
        let document = HtmlParser.parse(html);
        match document.find("form") {
            Some(element) => Form::from_element(&element),
            None => panic!("no form in fixture"),
        }
    }

    fn encode(form: &Form, submit: Option<&str>, overrides: &[(&str, &str)]) -> String {
        match form.encode(submit, overrides) {
            Ok(body) => body,
            Err(error) => panic!("{error}"),
        }
    }

    const LOGIN: &str = r#"
        <form id="login" action="login.cgi">
            <input name="username">
            <input name="password">
            <input typ="submit" name="submit" value="done">
        </form>"#;

    #[test]
    fn login_form_defaults_and_body() {
        let form = form(LOGIN);
        assert_eq!(
            form.fields().keys().collect::<Vec<_>>(),
            ["username", "password", "submit"]
        );
        assert_eq!(form.fields().get("username"), Some(""));
        assert!(form.submits().is_empty());

        let body = encode(&form, None, &[("username", "guest"), ("password", "12345678")]);
        assert_eq!(body, "username=guest&password=12345678&submit=done");
    }

    #[test]
    fn matches_on_id_name_or_action_substring() {
        let form = form(r#"<form id="f1" name="search" action="/cgi/find.cgi"></form>"#);
        assert!(form.matches("f1"));
        assert!(form.matches("search"));
        assert!(form.matches("find"));
        assert!(!form.matches("f"));
    }

    #[test]
    fn skips_disabled_unnamed_and_button_controls() {
        let form = form(
            r#"<form>
                <input name="kept" value="a &amp; b">
                <input name="off" value="x" disabled>
                <input value="anonymous">
                <input type="BUTTON" name="clicker" value="c">
                <input type="Submit" name="go" value="Go!">
            </form>"#,
        );

        assert_eq!(form.fields().iter().collect::<Vec<_>>(), [("kept", "a & b")]);
        assert_eq!(form.submits().get("go"), Some("Go!"));
    }

    #[test]
    fn textarea_and_select_defaults() {
        let form = form(
            r#"<form>
                <textarea name="bio">Tom &amp; Jerry</textarea>
                <textarea name="note" value="from attribute">ignored</textarea>
                <select name="color">
                    <option value="r" selected>Red
                    <option value=" g " selected>Green
                    <option value="b">Blue
                </select>
                <select name="size"><option selected> Large </option></select>
                <select name="none"><option value="x">X</option></select>
            </form>"#,
        );

        assert_eq!(form.fields().get("bio"), Some("Tom & Jerry"));
        assert_eq!(form.fields().get("note"), Some("from attribute"));
        assert_eq!(form.fields().get("color"), Some("g"));
        assert_eq!(form.fields().get("size"), Some("Large"));
        assert!(!form.fields().contains_key("none"));
    }

    #[test]
    fn submit_button_selection() {
        let single = form(r#"<form><input name="q"><input type="submit" name="go" value="Search"></form>"#);
        assert_eq!(encode(&single, None, &[("q", "rust lang")]), "q=rust+lang&go=Search");

        let several = form(
            r#"<form>
                <input type="submit" name="save" value="Save">
                <input type="submit" name="delete" value="Delete">
            </form>"#,
        );
        let ambiguous = several.encode(None, &[]);
        assert!(ambiguous.is_err_and(|error| {
            error.kind == ErrorKind::AmbiguousSubmit && error.message.contains("save, delete")
        }));
        assert_eq!(encode(&several, Some("delete"), &[]), "delete=Delete");

        let unknown = several.encode(Some("publish"), &[]);
        assert!(unknown.is_err_and(|error| error.kind == ErrorKind::UnknownSubmitButton));
    }

    #[test]
    fn overrides_append_new_names_and_submit_pair_comes_last() {
        let form = form(
            r#"<form>
                <input type="submit" name="go" value="Go">
                <input name="a" value="1">
            </form>"#,
        );
        let body = encode(&form, None, &[("extra", "x"), ("go", "clobbered"), ("a", "2")]);
        assert_eq!(body, "a=2&extra=x&go=Go");
    }

    #[test]
    fn field_map_keeps_insertion_order() {
        let mut map = FieldMap::new();
        map.insert("b", "1");
        map.insert("a", "2");
        map.insert("b", "3");
        assert_eq!(map.iter().collect::<Vec<_>>(), [("b", "3"), ("a", "2")]);
        assert_eq!(map.remove("b"), Some("3".to_owned()));
        assert_eq!(map.len(), 1);
    }
}
