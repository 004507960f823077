//! # slate-site
//!
//! A minimal content-management fixture application: the system under test
//! for the browser-driven suite in `slate-e2e`.
//!
//! It implements exactly the surface the scenarios assert against — pages
//! with per-language titles, placeholders holding typed plugins, a
//! session-cookie auth layer with a permission set, a per-user clipboard,
//! and server-rendered pages whose toolbar and structure board mirror a
//! real editing UI — and nothing more. Test code provisions state straight
//! on the [`store::ContentStore`] and asserts against it after driving the
//! browser, so divergence between the DOM and the persisted records shows
//! up as a failure.

pub mod auth;
pub mod render;
pub mod server;
pub mod store;

pub use server::{SiteConfig, SiteError, SiteServer};
pub use store::{
    ContentStore, EDIT_STATIC_PLACEHOLDER, PageRecord, PluginKind, PluginRecord, RecordId,
    Template, UserRecord,
};
