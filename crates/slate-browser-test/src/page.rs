//! Page-level operations: navigation, element queries, gestures, frames.
//!
//! Everything DOM-facing goes through `Runtime.evaluate` with selectors
//! embedded as JSON strings, which makes injection through a selector
//! impossible and keeps the same code path usable inside same-origin
//! iframes (the modal editing UI lives two frames deep).

use crate::console::{ConsoleLog, entry_from_event};
use crate::error::{HarnessError, Result};
use crate::session::CookieSpec;
use crate::wait::{WaitConfig, wait_for_result};
use chromiumoxide::cdp::js_protocol::runtime::EventConsoleApiCalled;
use chromiumoxide::page::Page as ChromePage;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Tuning for a drag gesture.
///
/// When the application marks an in-progress drag with a DOM class, the
/// gesture synchronises on that marker; otherwise it falls back to bounded
/// pauses, the only thing left when the UI exposes no intermediate state.
#[derive(Debug, Clone)]
pub struct DragOptions {
    /// Selector that matches while a drag is in progress
    /// (e.g. `body.slate-drag-active`).
    pub active_marker: Option<String>,

    /// Pause between gesture phases when no marker is available.
    pub fallback_pause: Duration,
}

impl Default for DragOptions {
    fn default() -> Self {
        Self {
            active_marker: None,
            fallback_pause: Duration::from_millis(300),
        }
    }
}

/// A browser page (tab).
///
/// Wraps the CDP page with console capture, explicit waits, and the element
/// operations the scenarios need. Created via
/// [`Driver::new_page`](crate::driver::Driver::new_page).
#[derive(Debug)]
pub struct Page {
    inner: Arc<ChromePage>,
    console: ConsoleLog,
    default_wait: WaitConfig,
    _console_task: JoinHandle<()>,
}

fn js_str(value: &str) -> Result<String> {
    serde_json::to_string(value).map_err(|e| HarnessError::ScriptFailed(e.to_string()))
}

/// Wraps `body` in a closure that first resolves `doc` through the given
/// chain of same-origin iframe selectors. `body` must `return` its result;
/// an unreachable frame yields `null`.
fn scoped_script(frame_path: &[String], body: &str) -> Result<String> {
    let frames = serde_json::to_string(frame_path)
        .map_err(|e| HarnessError::ScriptFailed(e.to_string()))?;
    Ok(format!(
        "(function() {{\
           let doc = document;\
           for (const s of {frames}) {{\
             const f = doc.querySelector(s);\
             if (!f || !f.contentDocument) return null;\
             doc = f.contentDocument;\
           }}\
           {body}\
         }})()"
    ))
}

impl Page {
    pub(crate) fn new(page: ChromePage, default_wait: WaitConfig) -> Self {
        let console = ConsoleLog::new();
        let console_clone = console.clone();
        let page_arc = Arc::new(page);

        let page_for_task = page_arc.clone();
        let console_task = tokio::spawn(async move {
            if let Ok(mut events) = page_for_task
                .event_listener::<EventConsoleApiCalled>()
                .await
            {
                while let Some(event) = events.next().await {
                    console_clone.push(entry_from_event(&event));
                }
            }
        });

        Self {
            inner: page_arc,
            console,
            default_wait,
            _console_task: console_task,
        }
    }

    /// The console output captured on this page so far.
    #[must_use]
    pub fn console(&self) -> &ConsoleLog {
        &self.console
    }

    /// The implicit wait applied to element lookups on this page.
    #[must_use]
    pub fn default_wait(&self) -> WaitConfig {
        self.default_wait
    }

    /// Navigates to `url` and waits for the next page to begin loading.
    ///
    /// The load wait tolerates a timeout (see [`Page::wait_page_loaded`]);
    /// callers that depend on specific content must follow up with a
    /// content-specific wait.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.inner
            .goto(url)
            .await
            .map_err(|e| HarnessError::NavigationFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        self.wait_page_loaded().await
    }

    /// Navigates to `path` on an application server, health-checking first.
    pub async fn navigate_to(
        &self,
        server: &dyn crate::server::AppServer,
        path: &str,
    ) -> Result<()> {
        server.health_check().await?;
        self.navigate(&server.url(path)).await
    }

    /// Blocks until the page has started to load (a `body` root exists).
    ///
    /// A timeout here is swallowed: the occasional navigation glitch where
    /// the browser never settles does not indicate a real failure, and
    /// content-dependent callers wait on content anyway.
    pub async fn wait_page_loaded(&self) -> Result<()> {
        match self.wait_for_tag("body").await {
            Ok(()) => Ok(()),
            Err(e) if e.is_timeout() => {
                debug!("page load wait timed out; continuing");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Executes JavaScript in the page and deserializes the result.
    pub async fn evaluate<T>(&self, script: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let result = self
            .inner
            .evaluate(script)
            .await
            .map_err(|e| HarnessError::ScriptFailed(e.to_string()))?;

        result
            .into_value()
            .map_err(|e| HarnessError::ScriptFailed(e.to_string()))
    }

    async fn eval_value(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .inner
            .evaluate(script)
            .await
            .map_err(|e| HarnessError::ScriptFailed(e.to_string()))?;

        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    pub(crate) async fn exists_in(&self, frames: &[String], selector: &str) -> Result<bool> {
        let sel = js_str(selector)?;
        let script = scoped_script(frames, &format!("return !!doc.querySelector({sel});"))?;
        Ok(self.eval_value(&script).await?.as_bool().unwrap_or(false))
    }

    pub(crate) async fn click_in(&self, frames: &[String], selector: &str) -> Result<()> {
        let sel = js_str(selector)?;
        let script = scoped_script(
            frames,
            &format!(
                "const el = doc.querySelector({sel});\
                 if (!el) return false;\
                 el.click();\
                 return true;"
            ),
        )?;
        self.found(selector, &script).await
    }

    pub(crate) async fn set_field_in(
        &self,
        frames: &[String],
        selector: &str,
        value: &str,
    ) -> Result<()> {
        let sel = js_str(selector)?;
        let val = js_str(value)?;
        let script = scoped_script(
            frames,
            &format!(
                "const el = doc.querySelector({sel});\
                 if (!el) return false;\
                 el.value = {val};\
                 el.dispatchEvent(new Event('input', {{bubbles: true}}));\
                 return true;"
            ),
        )?;
        self.found(selector, &script).await
    }

    pub(crate) async fn select_option_in(
        &self,
        frames: &[String],
        selector: &str,
        value: &str,
    ) -> Result<()> {
        let sel = js_str(selector)?;
        let val = js_str(value)?;
        let script = scoped_script(
            frames,
            &format!(
                "const el = doc.querySelector({sel});\
                 if (!el) return false;\
                 el.value = {val};\
                 el.dispatchEvent(new Event('change', {{bubbles: true}}));\
                 return true;"
            ),
        )?;
        self.found(selector, &script).await
    }

    pub(crate) async fn submit_in(&self, frames: &[String], selector: &str) -> Result<()> {
        let sel = js_str(selector)?;
        let script = scoped_script(
            frames,
            &format!(
                "const el = doc.querySelector({sel});\
                 if (!el) return false;\
                 const form = el.tagName === 'FORM' ? el : (el.form || el.closest('form'));\
                 if (!form) return false;\
                 form.submit();\
                 return true;"
            ),
        )?;
        self.found(selector, &script).await
    }

    pub(crate) async fn text_in(&self, frames: &[String], selector: &str) -> Result<String> {
        let sel = js_str(selector)?;
        let script = scoped_script(
            frames,
            &format!(
                "const el = doc.querySelector({sel});\
                 return el ? el.textContent : null;"
            ),
        )?;
        match self.eval_value(&script).await? {
            serde_json::Value::String(text) => Ok(text),
            _ => Err(HarnessError::ElementNotFound {
                selector: selector.to_string(),
            }),
        }
    }

    pub(crate) async fn count_in(&self, frames: &[String], selector: &str) -> Result<u64> {
        let sel = js_str(selector)?;
        let script = scoped_script(
            frames,
            &format!("return doc.querySelectorAll({sel}).length;"),
        )?;
        self.eval_value(&script)
            .await?
            .as_u64()
            .ok_or_else(|| HarnessError::ScriptFailed("element count was not a number".into()))
    }

    async fn found(&self, selector: &str, script: &str) -> Result<()> {
        if self.eval_value(script).await?.as_bool().unwrap_or(false) {
            Ok(())
        } else {
            Err(HarnessError::ElementNotFound {
                selector: selector.to_string(),
            })
        }
    }

    /// True if an element currently matches `selector`. No waiting.
    pub async fn exists(&self, selector: &str) -> Result<bool> {
        self.exists_in(&[], selector).await
    }

    /// Fails with [`HarnessError::ElementNotFound`] unless an element
    /// matches `selector` right now. Scenarios use the error positively to
    /// assert that permission-gated UI is absent.
    pub async fn require(&self, selector: &str) -> Result<()> {
        if self.exists(selector).await? {
            Ok(())
        } else {
            Err(HarnessError::ElementNotFound {
                selector: selector.to_string(),
            })
        }
    }

    /// Clicks the first element matching `selector`.
    pub async fn click(&self, selector: &str) -> Result<()> {
        self.click_in(&[], selector).await
    }

    /// Double-clicks the first element matching `selector`.
    pub async fn double_click(&self, selector: &str) -> Result<()> {
        self.dispatch_mouse(selector, "dblclick").await
    }

    /// Sets an input's value, firing an `input` event.
    pub async fn set_field(&self, selector: &str, value: &str) -> Result<()> {
        self.set_field_in(&[], selector, value).await
    }

    /// Picks an option on a `<select>`, firing a `change` event.
    pub async fn select_option(&self, selector: &str, value: &str) -> Result<()> {
        self.select_option_in(&[], selector, value).await
    }

    /// Submits the form containing (or matching) `selector`.
    pub async fn submit(&self, selector: &str) -> Result<()> {
        self.submit_in(&[], selector).await
    }

    /// Text content of the first element matching `selector`.
    pub async fn text(&self, selector: &str) -> Result<String> {
        self.text_in(&[], selector).await
    }

    /// Number of elements matching `selector`.
    pub async fn count(&self, selector: &str) -> Result<u64> {
        self.count_in(&[], selector).await
    }

    /// Waits for `selector` to match, using the page's implicit wait.
    pub async fn wait_for_selector(&self, selector: &str) -> Result<()> {
        self.wait_for_selector_with(selector, self.default_wait).await
    }

    /// Waits for `selector` to match, with an explicit timeout.
    pub async fn wait_for_selector_with(&self, selector: &str, config: WaitConfig) -> Result<()> {
        wait_for_result(
            || async { self.exists_in(&[], selector).await },
            config,
            &format!("selector '{selector}'"),
        )
        .await
    }

    /// Waits for an element with the given `id` attribute.
    pub async fn wait_for_id(&self, id: &str) -> Result<()> {
        let ident = js_str(id)?;
        let script = scoped_script(&[], &format!("return !!doc.getElementById({ident});"))?;
        wait_for_result(
            || async {
                Ok(self.eval_value(&script).await?.as_bool().unwrap_or(false))
            },
            self.default_wait,
            &format!("element with id '{id}'"),
        )
        .await
    }

    /// Waits for at least one element with the given tag name.
    pub async fn wait_for_tag(&self, tag: &str) -> Result<()> {
        let name = js_str(tag)?;
        let script = scoped_script(
            &[],
            &format!("return doc.getElementsByTagName({name}).length > 0;"),
        )?;
        wait_for_result(
            || async {
                Ok(self.eval_value(&script).await?.as_bool().unwrap_or(false))
            },
            self.default_wait,
            &format!("tag '{tag}'"),
        )
        .await
    }

    /// Waits until no element matches `selector`.
    pub async fn wait_for_absence(&self, selector: &str, config: WaitConfig) -> Result<()> {
        wait_for_result(
            || async { Ok(!self.exists_in(&[], selector).await?) },
            config,
            &format!("absence of '{selector}'"),
        )
        .await
    }

    /// Value of the named cookie on the current document, if present.
    pub async fn cookie_value(&self, name: &str) -> Result<Option<String>> {
        let prefix = js_str(&format!("{name}="))?;
        let script = format!(
            "(function() {{\
               const p = {prefix};\
               const hit = document.cookie.split('; ').find(c => c.startsWith(p));\
               return hit ? hit.slice(p.length) : null;\
             }})()"
        );
        match self.eval_value(&script).await? {
            serde_json::Value::String(value) => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    /// Adds a cookie to the browser for the currently loaded origin.
    ///
    /// Cookies can only be set against the loaded origin, which is why
    /// session injection performs a warm-up navigation first.
    pub async fn add_cookie(&self, cookie: &CookieSpec) -> Result<()> {
        let assignment = js_str(&cookie.header_string())?;
        let script = format!("(function() {{ document.cookie = {assignment}; return true; }})()");
        self.eval_value(&script).await?;
        Ok(())
    }

    /// Performs a drag gesture from `source` to `target`.
    ///
    /// The gesture is synthesised as DOM `MouseEvent`s: press on the source,
    /// move over the target, release. Between phases it synchronises on the
    /// application's drag-active marker when [`DragOptions::active_marker`]
    /// names one, and otherwise sleeps for the bounded fallback pause.
    pub async fn drag(&self, source: &str, target: &str, options: &DragOptions) -> Result<()> {
        self.dispatch_mouse(source, "mousedown").await?;

        match &options.active_marker {
            Some(marker) => {
                // Marker never appearing means the UI did not pick up the
                // gesture as a drag; the bounded pause is all that is left.
                if self
                    .wait_for_selector_with(marker, self.default_wait)
                    .await
                    .is_err()
                {
                    warn!(marker, "drag marker never appeared; falling back to pause");
                    tokio::time::sleep(options.fallback_pause).await;
                }
            }
            None => tokio::time::sleep(options.fallback_pause).await,
        }

        self.dispatch_mouse(target, "mousemove").await?;
        self.dispatch_mouse(target, "mouseup").await?;

        match &options.active_marker {
            Some(marker) => {
                self.wait_for_absence(marker, self.default_wait).await?;
            }
            None => tokio::time::sleep(options.fallback_pause).await,
        }

        Ok(())
    }

    async fn dispatch_mouse(&self, selector: &str, event: &str) -> Result<()> {
        let sel = js_str(selector)?;
        let kind = js_str(event)?;
        let script = scoped_script(
            &[],
            &format!(
                "const el = doc.querySelector({sel});\
                 if (!el) return false;\
                 const r = el.getBoundingClientRect();\
                 el.dispatchEvent(new MouseEvent({kind}, {{\
                   bubbles: true,\
                   cancelable: true,\
                   view: doc.defaultView,\
                   buttons: 1,\
                   clientX: r.left + r.width / 2,\
                   clientY: r.top + r.height / 2,\
                 }}));\
                 return true;"
            ),
        )?;
        self.found(selector, &script).await
    }

    /// Scopes subsequent element operations to a same-origin iframe.
    #[must_use]
    pub fn frame(&self, iframe_selector: &str) -> FrameScope<'_> {
        FrameScope {
            page: self,
            path: vec![iframe_selector.to_string()],
        }
    }

    /// The current page URL.
    pub async fn url(&self) -> Result<String> {
        self.evaluate("window.location.href").await
    }

    /// The page title.
    pub async fn title(&self) -> Result<String> {
        self.evaluate("document.title").await
    }

    /// PNG screenshot of the page, for debugging failures in CI.
    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        self.inner
            .screenshot(chromiumoxide::page::ScreenshotParams::default())
            .await
            .map_err(|e| HarnessError::ScriptFailed(e.to_string()))
    }

    /// Closes the page when this wrapper holds the last reference;
    /// otherwise cleanup falls to the browser teardown.
    pub async fn close(self) -> Result<()> {
        match Arc::try_unwrap(self.inner) {
            Ok(page) => {
                page.close().await.map_err(HarnessError::Cdp)?;
                Ok(())
            }
            Err(_) => {
                warn!("page close deferred; console listener still holds a reference");
                Ok(())
            }
        }
    }
}

/// Element operations scoped inside one or more nested same-origin iframes.
///
/// There is no stateful frame switching: each operation re-resolves the
/// frame chain, so a scope stays valid across modal reloads, and "switching
/// back" is just using the [`Page`] again.
#[derive(Debug)]
pub struct FrameScope<'a> {
    page: &'a Page,
    path: Vec<String>,
}

impl FrameScope<'_> {
    /// Scopes one level deeper into a nested iframe.
    #[must_use]
    pub fn frame(mut self, iframe_selector: &str) -> Self {
        self.path.push(iframe_selector.to_string());
        self
    }

    /// True if an element matches `selector` inside the frame.
    pub async fn exists(&self, selector: &str) -> Result<bool> {
        self.page.exists_in(&self.path, selector).await
    }

    /// Clicks an element inside the frame.
    pub async fn click(&self, selector: &str) -> Result<()> {
        self.page.click_in(&self.path, selector).await
    }

    /// Sets an input value inside the frame.
    pub async fn set_field(&self, selector: &str, value: &str) -> Result<()> {
        self.page.set_field_in(&self.path, selector, value).await
    }

    /// Picks a `<select>` option inside the frame.
    pub async fn select_option(&self, selector: &str, value: &str) -> Result<()> {
        self.page.select_option_in(&self.path, selector, value).await
    }

    /// Submits a form inside the frame.
    pub async fn submit(&self, selector: &str) -> Result<()> {
        self.page.submit_in(&self.path, selector).await
    }

    /// Text content of an element inside the frame.
    pub async fn text(&self, selector: &str) -> Result<String> {
        self.page.text_in(&self.path, selector).await
    }

    /// Waits for `selector` to match inside the frame, implicit wait.
    ///
    /// Also covers waiting for the frame chain itself to resolve: an
    /// unreachable frame reads as "no match yet".
    pub async fn wait_for_selector(&self, selector: &str) -> Result<()> {
        self.wait_for_selector_with(selector, self.page.default_wait)
            .await
    }

    /// Waits for `selector` inside the frame with an explicit timeout.
    pub async fn wait_for_selector_with(&self, selector: &str, config: WaitConfig) -> Result<()> {
        wait_for_result(
            || async { self.page.exists_in(&self.path, selector).await },
            config,
            &format!("selector '{selector}' in frame {:?}", self.path),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_are_json_escaped() {
        let cases = [
            (r#"div"#, r#""div""#),
            (r#"'injected'"#, r#""'injected'""#),
            (r#"`injected`"#, r#""`injected`""#),
        ];

        for (input, expected) in cases {
            assert_eq!(js_str(input).unwrap(), expected);
        }
    }

    #[test]
    fn scoped_script_embeds_frame_chain() {
        let script = scoped_script(
            &["div.modal iframe".to_string(), "iframe.inner".to_string()],
            "return true;",
        )
        .unwrap();

        assert!(script.contains(r#"["div.modal iframe","iframe.inner"]"#));
        assert!(script.contains("contentDocument"));
        assert!(script.ends_with("})()"));
    }

    #[test]
    fn scoped_script_with_no_frames_uses_document() {
        let script = scoped_script(&[], "return !!doc.querySelector(\"body\");").unwrap();
        assert!(script.contains("let doc = document;"));
        assert!(script.contains("for (const s of []"));
    }
}
