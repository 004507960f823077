//! Server-side HTML for the fixture pages.
//!
//! The markup is the DOM contract the scenario suite consumes: class names
//! carry per-record numeric keys (`slate-plugin-7`, `slate-dragarea-3`),
//! the toolbar and structure board only render for authenticated staff,
//! and a small inline script wires the editing actions to the JSON API.

use crate::server::SiteConfig;
use crate::store::{ContentStore, PageRecord, PluginKind, PluginRecord, UserRecord};
use std::fmt::Write;

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Everything one page render needs to know.
pub struct RenderContext<'a> {
    pub store: &'a ContentStore,
    pub config: &'a SiteConfig,
    pub page: &'a PageRecord,
    pub language: &'a str,
    pub edit: bool,
    pub build: bool,
    pub user: Option<&'a UserRecord>,
    pub login_error: bool,
}

impl RenderContext<'_> {
    fn staff(&self) -> Option<&UserRecord> {
        self.user.filter(|u| u.is_staff)
    }

    fn editing(&self) -> bool {
        (self.edit || self.build) && self.staff().is_some()
    }
}

fn rendered_plugin(out: &mut String, plugin: &PluginRecord, editing: bool) {
    let body = escape(&plugin.body);
    let wrapper = if editing {
        format!(
            "<div class=\"slate-plugin-{id}\" data-plugin=\"{id}\">",
            id = plugin.id
        )
    } else {
        "<div>".to_string()
    };
    let inner = match plugin.kind {
        PluginKind::Text => format!("<p>{body}</p>"),
        PluginKind::Link => format!("<a href=\"{body}\">{body}</a>"),
        PluginKind::Style => format!("<div class=\"{body}\"></div>"),
    };
    let _ = write!(out, "{wrapper}{inner}</div>");
}

fn login_form(out: &mut String, ctx: &RenderContext<'_>) {
    if ctx.login_error {
        out.push_str("<div class=\"slate-login-error slate-error\">Invalid credentials</div>");
    }
    let next = format!("/{}?{}", ctx.language, ctx.config.edit_flag);
    let _ = write!(
        out,
        "<form id=\"slate-login-form\" class=\"slate-login-form\" method=\"post\" action=\"/login\">\
           <input type=\"hidden\" name=\"next\" value=\"{next}\">\
           <label>Username <input id=\"id_slate-username\" name=\"username\" type=\"text\"></label>\
           <label>Password <input id=\"id_slate-password\" name=\"password\" type=\"password\"></label>\
           <input type=\"submit\" value=\"Sign in\">\
         </form>",
        next = escape(&next)
    );
}

fn toolbar(out: &mut String, ctx: &RenderContext<'_>) {
    let _ = write!(
        out,
        "<div class=\"slate-toolbar\">\
           <ul class=\"slate-toolbar-item-navigation\">\
             <li class=\"slate-clipboard-trigger\"><a href=\"#\">Clipboard</a></li>\
           </ul>\
           <div class=\"slate-mode-switcher\">\
             <a href=\"?{edit}\">Content</a>\
             <a href=\"?{build}\">Structure</a>\
           </div>\
           <a class=\"slate-toolbar-item-logout\" href=\"/logout\">Sign out</a>\
         </div>",
        edit = ctx.config.edit_flag,
        build = ctx.config.build_flag,
    );
}

fn submenu(out: &mut String, menu_id: &str, items: &[String]) {
    let _ = write!(
        out,
        "<div class=\"slate-submenu-settings\" data-menu=\"{menu_id}\"></div>\
         <div class=\"slate-submenu-dropdown\" id=\"menu-{menu_id}\" hidden>"
    );
    for item in items {
        let _ = write!(out, "<div class=\"slate-submenu-item\">{item}</div>");
    }
    out.push_str("</div>");
}

fn draggable(out: &mut String, plugin: &PluginRecord) {
    let _ = write!(
        out,
        "<div class=\"slate-draggable\" data-plugin=\"{id}\">",
        id = plugin.id
    );
    submenu(
        out,
        &format!("pl-{}", plugin.id),
        &[format!(
            "<a href=\"#\" data-rel=\"copy\" data-plugin=\"{}\">Copy</a>",
            plugin.id
        )],
    );
    let _ = write!(
        out,
        "<span class=\"slate-draggable-title\">{kind}: {body}</span></div>",
        kind = plugin.kind.as_str(),
        body = escape(&plugin.body),
    );
}

fn structure_board(out: &mut String, ctx: &RenderContext<'_>) {
    let Some(user) = ctx.staff() else { return };

    let mut placeholder_ids = Vec::new();
    if let Some(content) = ctx.store.content_placeholder(ctx.page.id) {
        placeholder_ids.push(content);
    }
    if let Some(footer) = ctx.store.static_placeholder(ctx.page.id) {
        if user.has_permission(crate::store::EDIT_STATIC_PLACEHOLDER) {
            placeholder_ids.push(footer);
        }
    }

    out.push_str("<div class=\"slate-structure\">");
    for placeholder in placeholder_ids {
        let _ = write!(
            out,
            "<div class=\"slate-dragarea-{placeholder} slate-dragarea\" data-placeholder=\"{placeholder}\">\
             <div class=\"slate-dragbar\">"
        );
        let copy_items: Vec<String> = ctx
            .page
            .titles
            .keys()
            .filter(|lang| lang.as_str() != ctx.language)
            .map(|lang| {
                format!(
                    "<a href=\"#\" data-rel=\"copy-lang\" data-language=\"{lang}\" data-placeholder=\"{placeholder}\">Copy from {lang}</a>"
                )
            })
            .collect();
        submenu(out, &format!("ph-{placeholder}"), &copy_items);
        out.push_str("</div><div class=\"slate-draggables\">");
        for plugin in ctx.store.plugins_in(placeholder, ctx.language) {
            draggable(out, &plugin);
        }
        out.push_str("</div></div>");
    }
    out.push_str("</div>");
}

fn clipboard(out: &mut String, ctx: &RenderContext<'_>) {
    let Some(user) = ctx.staff() else { return };

    out.push_str(
        "<div class=\"slate-clipboard\" hidden>\
         <div class=\"slate-clipboard-containers\">",
    );
    for plugin in ctx.store.clipboard_plugins(user.id) {
        draggable(out, &plugin);
    }
    out.push_str("</div></div>");
}

fn content(out: &mut String, ctx: &RenderContext<'_>) {
    let editing = ctx.editing();
    out.push_str("<div class=\"slate-content\">");
    if let Some(placeholder) = ctx.store.content_placeholder(ctx.page.id) {
        for plugin in ctx.store.plugins_in(placeholder, ctx.language) {
            rendered_plugin(out, &plugin, editing);
        }
    }
    out.push_str("</div>");

    if let Some(placeholder) = ctx.store.static_placeholder(ctx.page.id) {
        let editable = editing
            && ctx
                .staff()
                .is_some_and(|u| u.has_permission(crate::store::EDIT_STATIC_PLACEHOLDER));
        if editable {
            let _ = write!(out, "<footer class=\"slate-placeholder-{placeholder}\">");
        } else {
            out.push_str("<footer>");
        }
        for plugin in ctx.store.plugins_in(placeholder, ctx.language) {
            rendered_plugin(out, &plugin, editable);
        }
        out.push_str("</footer>");
    }
}

fn editor_script(out: &mut String, ctx: &RenderContext<'_>) {
    let lang = serde_json::to_string(ctx.language).unwrap_or_else(|_| "\"en\"".to_string());
    let _ = write!(
        out,
        r#"<script>
(function() {{
  const LANG = {lang};
  function post(url, body) {{
    return fetch(url, {{
      method: 'POST',
      headers: {{'Content-Type': 'application/json'}},
      body: JSON.stringify(body || {{}})
    }});
  }}
  document.addEventListener('click', function(ev) {{
    const settings = ev.target.closest('.slate-submenu-settings');
    if (settings) {{
      const menu = document.getElementById('menu-' + settings.dataset.menu);
      if (menu) menu.hidden = !menu.hidden;
      return;
    }}
    const copyLang = ev.target.closest('a[data-rel="copy-lang"]');
    if (copyLang) {{
      ev.preventDefault();
      post('/api/placeholder/' + copyLang.dataset.placeholder + '/copy-language',
           {{from: copyLang.dataset.language, to: LANG}})
        .then(function() {{ window.location.reload(); }});
      return;
    }}
    const copy = ev.target.closest('a[data-rel="copy"]');
    if (copy) {{
      ev.preventDefault();
      post('/api/plugin/' + copy.dataset.plugin + '/copy')
        .then(function() {{ window.location.reload(); }});
      return;
    }}
    const trigger = ev.target.closest('.slate-clipboard-trigger a');
    if (trigger) {{
      ev.preventDefault();
      const clip = document.querySelector('.slate-clipboard');
      if (clip) clip.hidden = !clip.hidden;
    }}
  }});
  let dragging = null;
  document.addEventListener('mousedown', function(ev) {{
    const item = ev.target.closest('.slate-clipboard-containers .slate-draggable');
    if (item) {{
      dragging = item.dataset.plugin;
      document.body.classList.add('slate-drag-active');
    }}
  }});
  document.addEventListener('mouseup', function(ev) {{
    if (!dragging) return;
    dragging = null;
    document.body.classList.remove('slate-drag-active');
    const area = ev.target.closest('.slate-dragarea');
    if (area) {{
      post('/api/placeholder/' + area.dataset.placeholder + '/paste', {{language: LANG}})
        .then(function() {{ window.location.reload(); }});
    }}
  }});
  document.addEventListener('dblclick', function(ev) {{
    const plugin = ev.target.closest('[data-plugin]');
    if (!plugin) return;
    const modal = document.createElement('div');
    modal.className = 'slate-modal slate-modal-frame';
    const frame = document.createElement('iframe');
    frame.src = '/admin/plugin/' + plugin.dataset.plugin + '/edit';
    modal.appendChild(frame);
    document.body.appendChild(modal);
  }});
  window.__slateCloseModal = function() {{
    const modal = document.querySelector('.slate-modal-frame');
    if (modal) modal.remove();
  }};
}})();
</script>"#
    );
}

/// Renders one page view.
#[must_use]
pub fn page_html(ctx: &RenderContext<'_>) -> String {
    let title = ctx
        .page
        .titles
        .get(ctx.language)
        .map_or("Untitled", String::as_str);

    let mut out = String::with_capacity(4096);
    let _ = write!(
        out,
        "<!DOCTYPE html><html lang=\"{lang}\"><head><title>{title}</title></head><body>",
        lang = escape(ctx.language),
        title = escape(title),
    );

    if ctx.edit || ctx.build {
        match ctx.staff() {
            Some(_) => toolbar(&mut out, ctx),
            None => login_form(&mut out, ctx),
        }
    }

    content(&mut out, ctx);

    if ctx.build {
        structure_board(&mut out, ctx);
    }
    if ctx.editing() {
        clipboard(&mut out, ctx);
        editor_script(&mut out, ctx);
    }

    out.push_str("</body></html>");
    out
}

/// The modal editing form served inside `div.slate-modal-frame iframe`.
#[must_use]
pub fn plugin_form_html(plugin: &PluginRecord) -> String {
    let action = format!("/admin/plugin/{}/edit", plugin.id);
    let field = match plugin.kind {
        PluginKind::Style => {
            let mut options = String::new();
            for class_name in ["default", "new", "highlight"] {
                let selected = if plugin.body == class_name {
                    " selected"
                } else {
                    ""
                };
                let _ = write!(
                    options,
                    "<option value=\"{class_name}\"{selected}>{class_name}</option>"
                );
            }
            format!("<select id=\"id_class_name\" name=\"value\">{options}</select>")
        }
        PluginKind::Text => format!(
            "<textarea id=\"id_body\" name=\"value\">{}</textarea>",
            escape(&plugin.body)
        ),
        PluginKind::Link => format!(
            "<input id=\"id_url\" name=\"value\" type=\"text\" value=\"{}\">",
            escape(&plugin.body)
        ),
    };
    format!(
        "<!DOCTYPE html><html><head><title>Edit plugin</title></head><body>\
           <form id=\"plugin-edit-form\" method=\"post\" action=\"{action}\">\
             {field}\
             <input type=\"submit\" class=\"slate-btn-action\" value=\"Save\">\
           </form>\
         </body></html>"
    )
}

/// Response to a successful modal save; closes the modal from inside the
/// iframe.
#[must_use]
pub fn plugin_saved_html() -> String {
    "<!DOCTYPE html><html><body>Saved<script>\
       if (window.parent && window.parent.__slateCloseModal) { window.parent.__slateCloseModal(); }\
     </script></body></html>"
        .to_string()
}

/// Body-bearing 404 so page-load waits still resolve.
#[must_use]
pub fn not_found_html() -> String {
    "<!DOCTYPE html><html><head><title>Not found</title></head>\
     <body><h1>Page not found</h1></body></html>"
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ContentStore, Template};

    fn seeded() -> (ContentStore, PageRecord, UserRecord) {
        let store = ContentStore::new();
        let page_id = store.create_page("Home", Template::WithFooter, "en");
        store.create_translation(page_id, "it", "Home italian");
        let placeholder = store.content_placeholder(page_id).unwrap();
        store.add_plugin(placeholder, "en", PluginKind::Text, "test");
        let user_id = store.create_user("admin", "admin", true, true);
        let page = store.home_page().unwrap();
        let user = store.user_by_name("admin").unwrap();
        let _ = user_id;
        (store, page, user)
    }

    fn config() -> SiteConfig {
        SiteConfig::default()
    }

    #[test]
    fn anonymous_edit_view_shows_login_form_not_toolbar() {
        let (store, page, _) = seeded();
        let cfg = config();
        let html = page_html(&RenderContext {
            store: &store,
            config: &cfg,
            page: &page,
            language: "en",
            edit: true,
            build: false,
            user: None,
            login_error: false,
        });

        assert!(html.contains("id_slate-username"));
        assert!(html.contains("id_slate-password"));
        assert!(!html.contains("slate-toolbar-item-logout"));
    }

    #[test]
    fn staff_edit_view_shows_toolbar_and_plugin_keys() {
        let (store, page, user) = seeded();
        let cfg = config();
        let html = page_html(&RenderContext {
            store: &store,
            config: &cfg,
            page: &page,
            language: "en",
            edit: true,
            build: false,
            user: Some(&user),
            login_error: false,
        });

        assert!(html.contains("slate-toolbar-item-navigation"));
        assert!(html.contains("slate-toolbar-item-logout"));
        // Per-plugin wrapper embeds the record key.
        let placeholder = store.content_placeholder(page.id).unwrap();
        let plugin = &store.plugins_in(placeholder, "en")[0];
        assert!(html.contains(&format!("slate-plugin-{}", plugin.id)));
    }

    #[test]
    fn build_view_renders_structure_and_copy_lang_items() {
        let (store, page, user) = seeded();
        let cfg = config();
        let html = page_html(&RenderContext {
            store: &store,
            config: &cfg,
            page: &page,
            language: "it",
            edit: false,
            build: true,
            user: Some(&user),
            login_error: false,
        });

        let placeholder = store.content_placeholder(page.id).unwrap();
        assert!(html.contains(&format!("slate-dragarea-{placeholder}")));
        assert!(html.contains("data-rel=\"copy-lang\" data-language=\"en\""));
        // The Italian side is empty, so no draggables yet.
        assert!(!html.contains("slate-draggable-title"));
    }

    #[test]
    fn static_placeholder_marker_is_permission_gated() {
        let (store, page, user) = seeded();
        let cfg = config();
        let footer = store.static_placeholder(page.id).unwrap();

        let plain = store.user_by_name("admin").map(|mut u| {
            u.is_superuser = false;
            u
        });
        let html = page_html(&RenderContext {
            store: &store,
            config: &cfg,
            page: &page,
            language: "en",
            edit: true,
            build: false,
            user: plain.as_ref(),
            login_error: false,
        });
        assert!(!html.contains(&format!("slate-placeholder-{footer}")));

        // Superuser implies the permission.
        let html = page_html(&RenderContext {
            store: &store,
            config: &cfg,
            page: &page,
            language: "en",
            edit: true,
            build: false,
            user: Some(&user),
            login_error: false,
        });
        assert!(html.contains(&format!("slate-placeholder-{footer}")));
    }

    #[test]
    fn style_form_offers_the_new_class() {
        let (store, page, _) = seeded();
        let placeholder = store.content_placeholder(page.id).unwrap();
        let id = store.add_plugin(placeholder, "en", PluginKind::Style, "default");
        let plugin = store.plugin(id).unwrap();

        let html = plugin_form_html(&plugin);
        assert!(html.contains("id_class_name"));
        assert!(html.contains("<option value=\"new\">new</option>"));
        assert!(html.contains("<option value=\"default\" selected>"));
    }
}
