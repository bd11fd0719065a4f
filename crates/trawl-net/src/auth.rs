//! HTTP Basic credentials registered per URL prefix.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Credential {
    prefix: String,
    username: String,
    password: String,
}

/// Credentials answered to `401` challenges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialStore {
    entries: Vec<Credential>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers credentials for every URL starting with `prefix`.
    /// Re-registering a prefix replaces the earlier entry.
    pub fn add(&mut self, prefix: &str, username: &str, password: &str) {
        self.entries.retain(|entry| entry.prefix != prefix);
        self.entries.push(Credential {
            prefix: prefix.to_owned(),
            username: username.to_owned(),
            password: password.to_owned(),
        });
    }

    /// `Authorization` value for `url`, using the longest matching prefix.
    pub fn basic_authorization(&self, url: &str) -> Option<String> {
        let credential = self
            .entries
            .iter()
            .filter(|entry| url.starts_with(&entry.prefix))
            .max_by_key(|entry| entry.prefix.len())?;

        let token = STANDARD.encode(format!("{}:{}", credential.username, credential.password));
        Some(format!("Basic {token}"))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// True when a `WWW-Authenticate` challenge offers the Basic scheme.
pub fn offers_basic(challenge: &str) -> bool {
    challenge
        .split(',')
        .any(|part| part.trim_start().get(..5).is_some_and(|scheme| scheme.eq_ignore_ascii_case("basic")))
}
