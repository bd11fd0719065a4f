//! Scriptable browsing sessions.
//!
//! A [`Session`] fetches pages through an [`trawl_net::HttpTransport`], keeps
//! history, and exposes the current page's links, frames and forms as typed
//! views that can be followed or submitted.

pub mod agents;
pub mod config;
pub mod form;
pub mod session;
pub mod views;

#[cfg(test)]
mod testing;

pub use config::SessionConfig;
pub use form::FieldMap;
pub use form::Form;
pub use session::RetryPause;
pub use session::Session;
pub use session::ThreadSleep;
pub use views::ElementList;
pub use views::Frame;
pub use views::IFrame;
pub use views::Link;
pub use views::PageElement;
