//! The fixture application's HTTP layer.
//!
//! Serves rendered pages, the login endpoint, the modal plugin-edit form,
//! and the JSON editing API the inline page script calls. Binds an
//! ephemeral port so parallel suites never collide.

use crate::render::{self, RenderContext};
use crate::store::{ContentStore, UserRecord};
use async_trait::async_trait;
use axum::{
    Form, Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use slate_browser_test::AppServer;
use std::collections::HashMap;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Errors from fixture server lifecycle.
#[derive(Debug, Error)]
pub enum SiteError {
    /// The listener could not bind or the server failed to start.
    #[error("fixture server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Names the application owns: the session cookie and the UI query flags.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Authenticated-session cookie name.
    pub session_cookie: String,
    /// Query flag toggling edit mode.
    pub edit_flag: String,
    /// Query flag toggling structure/build mode.
    pub build_flag: String,
    /// Language served at `/`.
    pub default_language: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            session_cookie: "slate_sessionid".to_string(),
            edit_flag: "edit".to_string(),
            build_flag: "build".to_string(),
            default_language: "en".to_string(),
        }
    }
}

#[derive(Clone)]
struct AppState {
    store: ContentStore,
    config: SiteConfig,
}

fn session_key_from_cookies(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').map(str::trim).find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        (name == cookie_name).then(|| value.to_string())
    })
}

fn current_user(state: &AppState, headers: &HeaderMap) -> Option<UserRecord> {
    let key = session_key_from_cookies(headers, &state.config.session_cookie)?;
    state.store.session_user(&key)
}

fn require_staff(state: &AppState, headers: &HeaderMap) -> Result<UserRecord, StatusCode> {
    current_user(state, headers)
        .filter(|u| u.is_staff)
        .ok_or(StatusCode::FORBIDDEN)
}

async fn health() -> &'static str {
    "ok"
}

async fn root_page(
    state: State<AppState>,
    query: Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let language = state.config.default_language.clone();
    page_response(&state, &language, &query, &headers)
}

async fn language_page(
    state: State<AppState>,
    Path(language): Path<String>,
    query: Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    page_response(&state, &language, &query, &headers)
}

fn page_response(
    state: &AppState,
    language: &str,
    query: &HashMap<String, String>,
    headers: &HeaderMap,
) -> Response {
    let Some(page) = state.store.home_page() else {
        return (StatusCode::NOT_FOUND, Html(render::not_found_html())).into_response();
    };

    let edit = query.contains_key(&state.config.edit_flag);
    let build = query.contains_key(&state.config.build_flag);
    let user = current_user(state, headers);

    // Only anonymous plain views hit the render cache; editing views are
    // always live.
    let cacheable = !edit && !build && user.is_none();
    let cache_key = format!("{language}:{}", page.id);
    if cacheable {
        if let Some(cached) = state.store.cache_get(&cache_key) {
            debug!(%cache_key, "serving cached render");
            return Html(cached).into_response();
        }
    }

    let html = render::page_html(&RenderContext {
        store: &state.store,
        config: &state.config,
        page: &page,
        language,
        edit,
        build,
        user: user.as_ref(),
        login_error: false,
    });

    if cacheable {
        state.store.cache_put(&cache_key, &html);
    }
    Html(html).into_response()
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    username: String,
    password: String,
    next: Option<String>,
}

async fn login(state: State<AppState>, Form(form): Form<LoginForm>) -> Response {
    match state.store.open_session(&form.username, &form.password) {
        Some(key) => {
            let next = form.next.as_deref().unwrap_or("/");
            let cookie = format!("{}={key}; Path=/", state.config.session_cookie);
            let mut response = Redirect::to(next).into_response();
            match HeaderValue::from_str(&cookie) {
                Ok(value) => {
                    response.headers_mut().insert(header::SET_COOKIE, value);
                    response
                }
                Err(e) => {
                    warn!("unusable session cookie: {e}");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            }
        }
        None => {
            debug!(username = %form.username, "login rejected");
            let Some(page) = state.store.home_page() else {
                return (StatusCode::NOT_FOUND, Html(render::not_found_html())).into_response();
            };
            let html = render::page_html(&RenderContext {
                store: &state.store,
                config: &state.config,
                page: &page,
                language: &state.config.default_language,
                edit: true,
                build: false,
                user: None,
                login_error: true,
            });
            (StatusCode::UNAUTHORIZED, Html(html)).into_response()
        }
    }
}

async fn logout() -> Redirect {
    Redirect::to("/")
}

#[derive(Debug, Deserialize)]
struct CopyLanguageBody {
    from: String,
    to: String,
}

async fn copy_language(
    state: State<AppState>,
    Path(placeholder): Path<u64>,
    headers: HeaderMap,
    Json(body): Json<CopyLanguageBody>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_staff(&state, &headers)?;
    let copied = state
        .store
        .copy_language(placeholder, &body.from, &body.to);
    Ok(Json(serde_json::json!({ "copied": copied })))
}

async fn copy_plugin(
    state: State<AppState>,
    Path(plugin): Path<u64>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let user = require_staff(&state, &headers)?;
    let clipboard_id = state
        .store
        .copy_to_clipboard(user.id, plugin)
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(serde_json::json!({ "clipboard": clipboard_id })))
}

#[derive(Debug, Deserialize)]
struct PasteBody {
    language: String,
}

async fn paste_plugin(
    state: State<AppState>,
    Path(placeholder): Path<u64>,
    headers: HeaderMap,
    Json(body): Json<PasteBody>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let user = require_staff(&state, &headers)?;
    let pasted = state
        .store
        .paste_from_clipboard(user.id, placeholder, &body.language)
        .ok_or(StatusCode::BAD_REQUEST)?;
    Ok(Json(serde_json::json!({ "plugin": pasted })))
}

async fn plugin_edit_form(
    state: State<AppState>,
    Path(plugin): Path<u64>,
    headers: HeaderMap,
) -> Result<Html<String>, StatusCode> {
    require_staff(&state, &headers)?;
    let record = state.store.plugin(plugin).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Html(render::plugin_form_html(&record)))
}

#[derive(Debug, Deserialize)]
struct PluginEditForm {
    value: String,
}

async fn plugin_edit_save(
    state: State<AppState>,
    Path(plugin): Path<u64>,
    headers: HeaderMap,
    Form(form): Form<PluginEditForm>,
) -> Result<Html<String>, StatusCode> {
    require_staff(&state, &headers)?;
    if !state.store.set_plugin_body(plugin, &form.value) {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Html(render::plugin_saved_html()))
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route(
            "/api/placeholder/{id}/copy-language",
            post(copy_language),
        )
        .route("/api/placeholder/{id}/paste", post(paste_plugin))
        .route("/api/plugin/{id}/copy", post(copy_plugin))
        .route(
            "/admin/plugin/{id}/edit",
            get(plugin_edit_form).post(plugin_edit_save),
        )
        .route("/", get(root_page))
        .route("/{lang}", get(language_page))
        .with_state(state)
}

/// A running fixture application bound to an ephemeral localhost port.
///
/// Shuts down gracefully on [`SiteServer::stop`]; dropping it without
/// stopping aborts the serve task.
pub struct SiteServer {
    base_url: String,
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SiteServer {
    /// Starts serving `store` with the default [`SiteConfig`].
    pub async fn start(store: ContentStore) -> Result<Self, SiteError> {
        Self::start_with(store, SiteConfig::default()).await
    }

    /// Starts serving `store` with an explicit configuration.
    pub async fn start_with(store: ContentStore, config: SiteConfig) -> Result<Self, SiteError> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let base_url = format!("http://{addr}");

        let app = build_router(AppState { store, config });
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            });
            if let Err(e) = serve.await {
                warn!("fixture server error: {e}");
            }
        });

        info!(%base_url, "fixture site serving");
        Ok(Self {
            base_url,
            addr,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }

    /// The bound socket address.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stops the server and waits for the serve task to finish.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            tx.send(()).ok();
        }
        if let Some(task) = self.task.take() {
            task.await.ok();
        }
    }
}

impl Drop for SiteServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            tx.send(()).ok();
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl AppServer for SiteServer {
    fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{PluginKind, Template};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn seeded_store() -> ContentStore {
        let store = ContentStore::new();
        let page = store.create_page("Home", Template::Simple, "en");
        let placeholder = store.content_placeholder(page).unwrap();
        store.add_plugin(placeholder, "en", PluginKind::Text, "test");
        store.create_user("admin", "admin", true, true);
        store
    }

    async fn raw_get(addr: SocketAddr, path: &str) -> String {
        let mut stream = tokio::net::TcpStream::connect(addr).await.expect("connect");
        let request =
            format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.expect("write");
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.expect("read");
        String::from_utf8_lossy(&response).into_owned()
    }

    #[tokio::test]
    async fn serves_health_and_pages() {
        let server = SiteServer::start(seeded_store()).await.expect("start");
        let addr = server.addr();

        let health = raw_get(addr, "/health").await;
        assert!(health.starts_with("HTTP/1.1 200"));
        assert!(health.ends_with("ok"));

        let home = raw_get(addr, "/en").await;
        assert!(home.contains("<title>Home</title>"));
        assert!(home.contains("test"));

        // Anonymous edit view carries the login form, not the toolbar.
        let edit = raw_get(addr, "/en?edit").await;
        assert!(edit.contains("id_slate-username"));
        assert!(!edit.contains("slate-toolbar-item-logout"));

        server.stop().await;
    }

    #[tokio::test]
    async fn hostname_matches_cookie_domain_requirement() {
        let server = SiteServer::start(seeded_store()).await.expect("start");
        assert_eq!(server.hostname(), "127.0.0.1");
        server.stop().await;
    }

    #[tokio::test]
    async fn editing_api_requires_a_staff_session() {
        let server = SiteServer::start(seeded_store()).await.expect("start");
        let addr = server.addr();

        let mut stream = tokio::net::TcpStream::connect(addr).await.expect("connect");
        let body = r#"{"from":"en","to":"it"}"#;
        let request = format!(
            "POST /api/placeholder/2/copy-language HTTP/1.1\r\nHost: {addr}\r\n\
             Content-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(request.as_bytes()).await.expect("write");
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.expect("read");
        let response = String::from_utf8_lossy(&response);
        assert!(response.starts_with("HTTP/1.1 403"));

        server.stop().await;
    }
}
