//! Integration tests for slate-browser-test.
//!
//! These require a Chromium install and are marked #[ignore] by default.
//! Run with: cargo test --package slate-browser-test -- --ignored

use slate_browser_test::{
    Driver, DriverConfig, DragOptions, HarnessError, WaitConfig,
};
use std::time::Duration;

fn data_url(html: &str) -> String {
    format!("data:text/html,{}", urlencoding::encode(html))
}

fn basic_page() -> &'static str {
    r#"
    <!DOCTYPE html>
    <html>
    <head><title>Harness Fixture</title></head>
    <body>
        <h1 id="heading">Heading</h1>
        <p class="blurb">hello from the fixture</p>
        <p class="blurb">second blurb</p>
        <form id="login">
            <input id="username" name="username">
            <select id="flavour">
                <option value="plain" selected>plain</option>
                <option value="fancy">fancy</option>
            </select>
        </form>
        <script>
            setTimeout(() => {
                const late = document.createElement('div');
                late.className = 'arrives-late';
                document.body.appendChild(late);
            }, 300);
        </script>
    </body>
    </html>
    "#
}

fn drag_page() -> &'static str {
    // Mirrors the drag wiring of an editing UI: a marker class while the
    // gesture is in flight, and a DOM mutation applied on drop.
    r#"
    <!DOCTYPE html>
    <html>
    <head><title>Drag Fixture</title></head>
    <body>
        <div id="source" style="width:80px;height:40px">drag me</div>
        <div id="target" style="width:200px;height:120px"></div>
        <script>
            const source = document.getElementById('source');
            const target = document.getElementById('target');
            source.addEventListener('mousedown', () => {
                document.body.classList.add('drag-active');
            });
            target.addEventListener('mouseup', () => {
                if (!document.body.classList.contains('drag-active')) return;
                const dropped = document.createElement('div');
                dropped.className = 'dropped';
                target.appendChild(dropped);
                document.body.classList.remove('drag-active');
            });
        </script>
    </body>
    </html>
    "#
}

fn framed_page() -> &'static str {
    r#"
    <!DOCTYPE html>
    <html>
    <head><title>Frame Fixture</title></head>
    <body>
        <div class="modal-frame">
            <iframe srcdoc="
                <form id='plugin-form'>
                    <select id='id_class_name'>
                        <option value='old' selected>old</option>
                        <option value='new'>new</option>
                    </select>
                </form>
                <iframe srcdoc='<a id=&quot;pick&quot; href=&quot;#&quot;>pick</a>'></iframe>
            "></iframe>
        </div>
    </body>
    </html>
    "#
}

async fn local_driver() -> Driver {
    Driver::acquire(DriverConfig::local())
        .await
        .expect("failed to launch browser")
}

#[tokio::test]
#[ignore] // Requires Chromium to be installed
async fn driver_acquire_and_release() {
    let driver = local_driver().await;
    assert!(!driver.is_released().await);
    driver.release().await.expect("failed to release driver");
}

#[tokio::test]
#[ignore]
async fn selector_waits_and_counts() {
    let driver = local_driver().await;
    let page = driver.new_page().await.expect("failed to create page");

    page.navigate(&data_url(basic_page()))
        .await
        .expect("failed to navigate");

    page.wait_for_selector("#heading").await.expect("heading");
    // The late element only exists after a script tick; the wait must poll.
    page.wait_for_selector(".arrives-late")
        .await
        .expect("late element");

    assert_eq!(page.count(".blurb").await.expect("count"), 2);
    assert_eq!(
        page.text("p.blurb").await.expect("text"),
        "hello from the fixture"
    );

    driver.release().await.expect("release");
}

#[tokio::test]
#[ignore]
async fn missing_element_times_out_and_reads_as_absent() {
    let driver = local_driver().await;
    let page = driver.new_page().await.expect("page");

    page.navigate(&data_url(basic_page())).await.expect("navigate");

    let config = WaitConfig::new(Duration::from_millis(400), Duration::from_millis(50));
    let result = page.wait_for_selector_with("#does-not-exist", config).await;
    assert!(matches!(result, Err(HarnessError::WaitTimeout { .. })));

    // Positive use of the not-found error: asserting absence.
    let absent = page.require("#does-not-exist").await;
    assert!(matches!(absent, Err(ref e) if e.is_element_not_found()));

    driver.release().await.expect("release");
}

#[tokio::test]
#[ignore]
async fn form_fields_and_selects() {
    let driver = local_driver().await;
    let page = driver.new_page().await.expect("page");

    page.navigate(&data_url(basic_page())).await.expect("navigate");

    page.set_field("#username", "admin@example.com")
        .await
        .expect("set field");
    let value: String = page
        .evaluate("document.getElementById('username').value")
        .await
        .expect("read back");
    assert_eq!(value, "admin@example.com");

    page.select_option("#flavour", "fancy").await.expect("select");
    let picked: String = page
        .evaluate("document.getElementById('flavour').value")
        .await
        .expect("read back");
    assert_eq!(picked, "fancy");

    driver.release().await.expect("release");
}

#[tokio::test]
#[ignore]
async fn frame_traversal_two_levels_deep() {
    let driver = local_driver().await;
    let page = driver.new_page().await.expect("page");

    page.navigate(&data_url(framed_page())).await.expect("navigate");

    let modal = page.frame("div.modal-frame iframe");
    modal
        .wait_for_selector("#plugin-form")
        .await
        .expect("form inside frame");

    modal
        .select_option("#id_class_name", "new")
        .await
        .expect("select inside frame");

    let inner = page.frame("div.modal-frame iframe").frame("iframe");
    inner.wait_for_selector("#pick").await.expect("nested anchor");
    inner.click("#pick").await.expect("click nested");

    // The outer document is untouched by frame scoping.
    assert!(!page.exists("#plugin-form").await.expect("outer lookup"));

    driver.release().await.expect("release");
}

#[tokio::test]
#[ignore]
async fn drag_synchronises_on_marker() {
    let driver = local_driver().await;
    let page = driver.new_page().await.expect("page");

    page.navigate(&data_url(drag_page())).await.expect("navigate");

    let options = DragOptions {
        active_marker: Some("body.drag-active".to_string()),
        ..DragOptions::default()
    };
    page.drag("#source", "#target", &options)
        .await
        .expect("drag gesture");

    page.wait_for_selector("#target .dropped")
        .await
        .expect("dropped node");

    driver.release().await.expect("release");
}

#[tokio::test]
#[ignore]
async fn console_capture_accumulates() {
    let driver = local_driver().await;
    let page = driver.new_page().await.expect("page");

    let html = r#"
    <!DOCTYPE html>
    <html><body><script>
        console.log("booted");
        console.error("kaboom");
    </script></body></html>
    "#;
    page.navigate(&data_url(html)).await.expect("navigate");

    tokio::time::sleep(Duration::from_millis(500)).await;

    let console = page.console();
    assert!(console.entries().iter().any(|e| e.text.contains("booted")));
    assert_eq!(console.error_count(), 1);
    assert!(console.has_errors());

    console.clear();
    assert!(console.is_empty());

    driver.release().await.expect("release");
}
