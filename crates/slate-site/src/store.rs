//! In-memory content store: pages, placeholders, plugins, users, sessions.
//!
//! Scenarios provision state here directly (bypassing the UI wherever the
//! UI path is not itself under test) and assert against it after driving
//! the browser, so UI/data divergence is caught. The store is shared
//! between the test body and the request handlers via `Arc<RwLock<_>>`.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Numeric key of a persisted record. Embedded in per-plugin and
/// per-placeholder element identifiers in the rendered markup.
pub type RecordId = u64;

/// Permission codename gating the static-placeholder editing UI.
pub const EDIT_STATIC_PLACEHOLDER: &str = "edit_static_placeholder";

/// Page template. `WithFooter` adds a static placeholder whose editability
/// is governed by [`EDIT_STATIC_PLACEHOLDER`] rather than page permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    /// Single `content` placeholder.
    Simple,
    /// `content` plus a static `footer` placeholder.
    WithFooter,
}

/// Typed content item kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginKind {
    /// A text block; `body` is the text.
    Text,
    /// A hyperlink; `body` is the URL.
    Link,
    /// A style wrapper; `body` is the CSS class name.
    Style,
}

impl PluginKind {
    /// Stable identifier used in markup and API payloads.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PluginKind::Text => "text",
            PluginKind::Link => "link",
            PluginKind::Style => "style",
        }
    }
}

/// A persisted page with per-language titles.
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub id: RecordId,
    pub template: Template,
    pub titles: HashMap<String, String>,
    pub published: bool,
}

/// A named content region. Clipboard placeholders have an `owner` instead
/// of a `page`.
#[derive(Debug, Clone)]
pub struct PlaceholderRecord {
    pub id: RecordId,
    pub page: Option<RecordId>,
    pub owner: Option<RecordId>,
    pub slot: String,
    pub is_static: bool,
}

/// A typed, persisted content item inside a placeholder.
#[derive(Debug, Clone)]
pub struct PluginRecord {
    pub id: RecordId,
    pub placeholder: RecordId,
    pub language: String,
    pub kind: PluginKind,
    pub body: String,
    pub position: u32,
}

/// An account known to the fixture's auth backend.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: RecordId,
    pub username: String,
    pub password: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub permissions: HashSet<String>,
}

impl UserRecord {
    /// Superusers hold every permission implicitly.
    #[must_use]
    pub fn has_permission(&self, codename: &str) -> bool {
        self.is_superuser || self.permissions.contains(codename)
    }
}

#[derive(Debug, Default)]
struct Inner {
    next_id: RecordId,
    pages: BTreeMap<RecordId, PageRecord>,
    placeholders: BTreeMap<RecordId, PlaceholderRecord>,
    plugins: BTreeMap<RecordId, PluginRecord>,
    users: BTreeMap<RecordId, UserRecord>,
    sessions: HashMap<String, RecordId>,
    render_cache: HashMap<String, String>,
}

impl Inner {
    fn allocate(&mut self) -> RecordId {
        self.next_id += 1;
        self.next_id
    }
}

/// Handle to the shared store. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct ContentStore {
    inner: Arc<RwLock<Inner>>,
}

impl ContentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a published page with a `content` placeholder (and a static
    /// `footer` placeholder for [`Template::WithFooter`]).
    pub fn create_page(&self, title: &str, template: Template, language: &str) -> RecordId {
        let mut inner = self.inner.write();
        let page_id = inner.allocate();

        let mut titles = HashMap::new();
        titles.insert(language.to_string(), title.to_string());
        inner.pages.insert(
            page_id,
            PageRecord {
                id: page_id,
                template,
                titles,
                published: true,
            },
        );

        let content_id = inner.allocate();
        inner.placeholders.insert(
            content_id,
            PlaceholderRecord {
                id: content_id,
                page: Some(page_id),
                owner: None,
                slot: "content".to_string(),
                is_static: false,
            },
        );

        if template == Template::WithFooter {
            let footer_id = inner.allocate();
            inner.placeholders.insert(
                footer_id,
                PlaceholderRecord {
                    id: footer_id,
                    page: Some(page_id),
                    owner: None,
                    slot: "footer".to_string(),
                    is_static: true,
                },
            );
        }

        page_id
    }

    /// Adds a translated title to an existing page.
    pub fn create_translation(&self, page: RecordId, language: &str, title: &str) {
        let mut inner = self.inner.write();
        if let Some(record) = inner.pages.get_mut(&page) {
            record.titles.insert(language.to_string(), title.to_string());
        }
    }

    /// The page's ordinary content placeholder.
    #[must_use]
    pub fn content_placeholder(&self, page: RecordId) -> Option<RecordId> {
        self.inner
            .read()
            .placeholders
            .values()
            .find(|p| p.page == Some(page) && !p.is_static)
            .map(|p| p.id)
    }

    /// The page's static placeholder, when its template has one.
    #[must_use]
    pub fn static_placeholder(&self, page: RecordId) -> Option<RecordId> {
        self.inner
            .read()
            .placeholders
            .values()
            .find(|p| p.page == Some(page) && p.is_static)
            .map(|p| p.id)
    }

    /// The first published page, which the root URL serves.
    #[must_use]
    pub fn home_page(&self) -> Option<PageRecord> {
        self.inner
            .read()
            .pages
            .values()
            .find(|p| p.published)
            .cloned()
    }

    /// Appends a plugin to a placeholder.
    pub fn add_plugin(
        &self,
        placeholder: RecordId,
        language: &str,
        kind: PluginKind,
        body: &str,
    ) -> RecordId {
        let mut inner = self.inner.write();
        let position = inner
            .plugins
            .values()
            .filter(|p| p.placeholder == placeholder && p.language == language)
            .count() as u32;
        let id = inner.allocate();
        inner.plugins.insert(
            id,
            PluginRecord {
                id,
                placeholder,
                language: language.to_string(),
                kind,
                body: body.to_string(),
                position,
            },
        );
        id
    }

    /// Plugins of one placeholder in one language, in position order.
    #[must_use]
    pub fn plugins_in(&self, placeholder: RecordId, language: &str) -> Vec<PluginRecord> {
        let inner = self.inner.read();
        let mut plugins: Vec<PluginRecord> = inner
            .plugins
            .values()
            .filter(|p| p.placeholder == placeholder && p.language == language)
            .cloned()
            .collect();
        plugins.sort_by_key(|p| p.position);
        plugins
    }

    /// One plugin by id.
    #[must_use]
    pub fn plugin(&self, id: RecordId) -> Option<PluginRecord> {
        self.inner.read().plugins.get(&id).cloned()
    }

    /// Overwrites a plugin's body (the modal edit form's save path).
    pub fn set_plugin_body(&self, id: RecordId, body: &str) -> bool {
        let mut inner = self.inner.write();
        match inner.plugins.get_mut(&id) {
            Some(plugin) => {
                plugin.body = body.to_string();
                true
            }
            None => false,
        }
    }

    /// Total number of persisted plugins, clipboard entries included.
    #[must_use]
    pub fn plugin_count(&self) -> usize {
        self.inner.read().plugins.len()
    }

    /// Number of plugins of one kind across the store.
    #[must_use]
    pub fn plugin_count_of(&self, kind: PluginKind) -> usize {
        self.inner
            .read()
            .plugins
            .values()
            .filter(|p| p.kind == kind)
            .count()
    }

    /// Copies every `from`-language plugin of a placeholder into `to`,
    /// appending after any existing `to` plugins. Returns how many copied.
    pub fn copy_language(&self, placeholder: RecordId, from: &str, to: &str) -> usize {
        let sources = self.plugins_in(placeholder, from);
        let mut inner = self.inner.write();
        let base = inner
            .plugins
            .values()
            .filter(|p| p.placeholder == placeholder && p.language == to)
            .count() as u32;
        for (offset, source) in sources.iter().enumerate() {
            let id = inner.allocate();
            inner.plugins.insert(
                id,
                PluginRecord {
                    id,
                    placeholder,
                    language: to.to_string(),
                    kind: source.kind,
                    body: source.body.clone(),
                    position: base + offset as u32,
                },
            );
        }
        sources.len()
    }

    /// Creates a user account.
    pub fn create_user(
        &self,
        username: &str,
        password: &str,
        is_staff: bool,
        is_superuser: bool,
    ) -> RecordId {
        let mut inner = self.inner.write();
        let id = inner.allocate();
        inner.users.insert(
            id,
            UserRecord {
                id,
                username: username.to_string(),
                password: password.to_string(),
                is_staff,
                is_superuser,
                permissions: HashSet::new(),
            },
        );
        id
    }

    /// Grants a permission codename to a user.
    pub fn grant_permission(&self, user: RecordId, codename: &str) {
        let mut inner = self.inner.write();
        if let Some(record) = inner.users.get_mut(&user) {
            record.permissions.insert(codename.to_string());
        }
    }

    /// Looks a user up by name.
    #[must_use]
    pub fn user_by_name(&self, username: &str) -> Option<UserRecord> {
        self.inner
            .read()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned()
    }

    /// Verifies credentials and persists a new server session.
    ///
    /// The returned key is durable in the session map before this returns,
    /// because the next request presents it as a cookie and reads it back.
    #[must_use]
    pub fn open_session(&self, username: &str, password: &str) -> Option<String> {
        let mut inner = self.inner.write();
        let user_id = inner
            .users
            .values()
            .find(|u| u.username == username && u.password == password)?
            .id;
        let key = uuid::Uuid::new_v4().to_string();
        inner.sessions.insert(key.clone(), user_id);
        Some(key)
    }

    /// Resolves a session key back to its user.
    #[must_use]
    pub fn session_user(&self, key: &str) -> Option<UserRecord> {
        let inner = self.inner.read();
        let user_id = inner.sessions.get(key)?;
        inner.users.get(user_id).cloned()
    }

    /// The user's clipboard placeholder, created on first use.
    fn clipboard_placeholder(inner: &mut Inner, user: RecordId) -> RecordId {
        if let Some(existing) = inner
            .placeholders
            .values()
            .find(|p| p.owner == Some(user) && p.slot == "clipboard")
        {
            return existing.id;
        }
        let id = inner.allocate();
        inner.placeholders.insert(
            id,
            PlaceholderRecord {
                id,
                page: None,
                owner: Some(user),
                slot: "clipboard".to_string(),
                is_static: false,
            },
        );
        id
    }

    /// Copies a plugin into the user's clipboard. The clipboard holds one
    /// item: a fresh persisted plugin record, so the total count rises.
    pub fn copy_to_clipboard(&self, user: RecordId, plugin: RecordId) -> Option<RecordId> {
        let mut inner = self.inner.write();
        let source = inner.plugins.get(&plugin)?.clone();
        let clipboard = Self::clipboard_placeholder(&mut inner, user);

        let stale: Vec<RecordId> = inner
            .plugins
            .values()
            .filter(|p| p.placeholder == clipboard)
            .map(|p| p.id)
            .collect();
        for id in stale {
            inner.plugins.remove(&id);
        }

        let id = inner.allocate();
        inner.plugins.insert(
            id,
            PluginRecord {
                id,
                placeholder: clipboard,
                language: source.language.clone(),
                kind: source.kind,
                body: source.body,
                position: 0,
            },
        );
        Some(id)
    }

    /// The plugins currently sitting in a user's clipboard.
    #[must_use]
    pub fn clipboard_plugins(&self, user: RecordId) -> Vec<PluginRecord> {
        let inner = self.inner.read();
        let Some(clipboard) = inner
            .placeholders
            .values()
            .find(|p| p.owner == Some(user) && p.slot == "clipboard")
        else {
            return Vec::new();
        };
        let mut plugins: Vec<PluginRecord> = inner
            .plugins
            .values()
            .filter(|p| p.placeholder == clipboard.id)
            .cloned()
            .collect();
        plugins.sort_by_key(|p| p.position);
        plugins
    }

    /// Pastes the clipboard item into a placeholder, keeping the clipboard
    /// copy so it can be pasted again. Returns the new plugin's id.
    pub fn paste_from_clipboard(
        &self,
        user: RecordId,
        placeholder: RecordId,
        language: &str,
    ) -> Option<RecordId> {
        let source = self.clipboard_plugins(user).into_iter().next()?;
        let mut inner = self.inner.write();
        let position = inner
            .plugins
            .values()
            .filter(|p| p.placeholder == placeholder && p.language == language)
            .count() as u32;
        let id = inner.allocate();
        inner.plugins.insert(
            id,
            PluginRecord {
                id,
                placeholder,
                language: language.to_string(),
                kind: source.kind,
                body: source.body,
                position,
            },
        );
        Some(id)
    }

    /// Caches a rendered page body.
    pub fn cache_put(&self, key: &str, value: &str) {
        self.inner
            .write()
            .render_cache
            .insert(key.to_string(), value.to_string());
    }

    /// Cached page body, if any.
    #[must_use]
    pub fn cache_get(&self, key: &str) -> Option<String> {
        self.inner.read().render_cache.get(key).cloned()
    }

    /// Drops the render cache.
    pub fn cache_clear(&self) {
        self.inner.write().render_cache.clear();
    }

    /// Test teardown: deletes all pages (cascading to their placeholders
    /// and plugins) and clears the cache. Users, sessions and clipboards
    /// survive; page-scoped state must not leak between tests.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        let page_placeholders: Vec<RecordId> = inner
            .placeholders
            .values()
            .filter(|p| p.page.is_some())
            .map(|p| p.id)
            .collect();
        inner.pages.clear();
        for id in &page_placeholders {
            inner.placeholders.remove(id);
        }
        let orphaned: Vec<RecordId> = inner
            .plugins
            .values()
            .filter(|p| page_placeholders.contains(&p.placeholder))
            .map(|p| p.id)
            .collect();
        for id in orphaned {
            inner.plugins.remove(&id);
        }
        inner.render_cache.clear();
    }
}
