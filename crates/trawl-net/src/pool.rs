//! Idle connection reuse keyed by origin.

use crate::connect::BoxedIoStream;
use crate::url::Scheme;
use crate::url::WebUrl;
use std::collections::HashMap;
use std::collections::VecDeque;

/// Origin a pooled connection belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
}

impl ConnectionKey {
    pub fn from_url(url: &WebUrl) -> Self {
        Self {
            scheme: url.scheme(),
            host: url.host().to_owned(),
            port: url.port(),
        }
    }
}

/// Connection pool contract used by the HTTP client.
pub trait ConnectionPool: Send {
    fn checkout(&mut self, key: &ConnectionKey) -> Option<BoxedIoStream>;
    fn checkin(&mut self, key: ConnectionKey, stream: BoxedIoStream);
    fn clear(&mut self);
    fn idle_connections(&self) -> usize;
}

/// In-memory idle pool with a per-origin cap.
pub struct IdlePool {
    max_idle_per_origin: usize,
    idle: HashMap<ConnectionKey, VecDeque<BoxedIoStream>>,
}

impl IdlePool {
    pub fn new(max_idle_per_origin: usize) -> Self {
        Self {
            max_idle_per_origin,
            idle: HashMap::new(),
        }
    }
}

impl Default for IdlePool {
    fn default() -> Self {
        Self::new(4)
    }
}

impl ConnectionPool for IdlePool {
    fn checkout(&mut self, key: &ConnectionKey) -> Option<BoxedIoStream> {
        let queue = self.idle.get_mut(key)?;
        let stream = queue.pop_front();
        if queue.is_empty() {
            self.idle.remove(key);
        }
        stream
    }

    fn checkin(&mut self, key: ConnectionKey, stream: BoxedIoStream) {
        let queue = self.idle.entry(key).or_default();
        if queue.len() < self.max_idle_per_origin {
            queue.push_back(stream);
        }
    }

    fn clear(&mut self) {
        self.idle.clear();
    }

    fn idle_connections(&self) -> usize {
        self.idle.values().map(VecDeque::len).sum()
    }
}
