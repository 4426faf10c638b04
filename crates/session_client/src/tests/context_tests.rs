use super::*;

use axum::{routing::get, Router};
use tokio::net::TcpListener;

const SESSION_PAGE: &str = r#"<!DOCTYPE html>
<html>
  <body>
    <div class="session-header">
      <span id="session_id">
        abc123
      </span>
    </div>
    <div id="session-elm-container"></div>
  </body>
</html>"#;

#[test]
fn finds_session_identifier_in_rendered_page() {
    let context = HtmlSessionContext::new(SESSION_PAGE);
    assert_eq!(
        context.session_identifier(),
        Some(SessionId::from("abc123"))
    );
    assert_eq!(
        context.session_identifier().map(|id| id.topic()),
        Some("session:abc123".to_string())
    );
}

#[test]
fn page_without_element_has_no_session() {
    let context = HtmlSessionContext::new("<html><body><p>lobby</p></body></html>");
    assert_eq!(context.session_identifier(), None);
}

#[test]
fn similar_ids_do_not_match() {
    let html = r#"<div data-id="session_id">x</div><div id="session_id_old">y</div>"#;
    assert_eq!(element_text(html, "session_id"), None);
}

#[test]
fn nested_markup_and_entities_are_flattened() {
    let html = r#"<p id='session_id'><b>a&amp;b</b>-42</p>"#;
    assert_eq!(element_text(html, "session_id"), Some("a&b-42".to_string()));
}

#[test]
fn text_after_nested_element_is_kept() {
    let html = r#"<span id="session_id"><span>abc</span>123</span>"#;
    assert_eq!(element_text(html, "session_id"), Some("abc123".to_string()));
}

#[test]
fn commented_out_markup_is_ignored() {
    let html = r#"<!-- <b id="session_id">old</b> --><span id="session_id">abc123</span>"#;
    assert_eq!(element_text(html, "session_id"), Some("abc123".to_string()));
}

#[test]
fn numeric_character_references_are_decoded() {
    let html = r#"<span id="session_id">a&#64;b</span>"#;
    assert_eq!(element_text(html, "session_id"), Some("a@b".to_string()));
}

#[test]
fn present_but_empty_element_still_counts() {
    let html = r#"<span class="x" id="session_id"></span>"#;
    assert_eq!(element_text(html, "session_id"), Some(String::new()));
}

#[test]
fn custom_element_id_is_honoured() {
    let html = r#"<code id="room">r-9</code>"#;
    let context = HtmlSessionContext::new(html).with_element_id("room");
    assert_eq!(context.session_identifier(), Some(SessionId::from("r-9")));
}

#[test]
fn static_context_reports_configured_identifier() {
    assert_eq!(StaticSessionContext::empty().session_identifier(), None);
    assert_eq!(
        StaticSessionContext::new(Some(SessionId::from("abc123"))).session_identifier(),
        Some(SessionId::from("abc123"))
    );
}

async fn spawn_page_server() -> anyhow::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new().route("/sessions/abc123", get(|| async { SESSION_PAGE }));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

#[tokio::test]
async fn fetched_session_page_yields_identifier() {
    let base = spawn_page_server().await.expect("spawn server");
    let context = HtmlSessionContext::fetch(&Client::new(), &format!("{base}/sessions/abc123"))
        .await
        .expect("fetch page");
    assert_eq!(
        context.session_identifier(),
        Some(SessionId::from("abc123"))
    );
}

#[tokio::test]
async fn missing_session_page_is_an_error() {
    let base = spawn_page_server().await.expect("spawn server");
    let err = HtmlSessionContext::fetch(&Client::new(), &format!("{base}/sessions/gone"))
        .await
        .expect_err("404 must fail");
    assert!(format!("{err:#}").contains("404"));
}
