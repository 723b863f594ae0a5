//! ReachNews client core.
//!
//! Signed-in users browse a feed of sentiment-tagged articles and filter it by
//! topic, read state and saved state. Preferences live in a local SQLite
//! key-value table keyed by identity and may be mirrored to a remote profile.
//!
//! - [`session`] - session gate, sign-in state and sign-out
//! - [`preferences`] - per-identity preference store
//! - [`view`] - pure filtering and pagination
//! - [`app`] - the dashboard that ties them together
//! - [`sync`] - background remote profile mirror
//! - [`feed`], [`remote`] - GraphQL and auth clients
//! - [`storage`], [`config`], [`util`] - plumbing

pub mod app;
pub mod config;
pub mod feed;
pub mod preferences;
pub mod remote;
pub mod session;
pub mod storage;
pub mod sync;
pub mod util;
pub mod view;
