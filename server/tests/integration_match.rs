use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use faqmatch::persist::{save_index, IndexPaths};
use faqmatch::{FaqEntry, FaqIndex, MatcherConfig};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use server::{build_app, AppSettings, Paraphraser, FALLBACK_REPLY};
use std::fs;
use std::path::Path;
use tempfile::tempdir;
use tower::ServiceExt;

const CORPUS: &str = r#"{"questions": [
    {"question": "What is your return policy?", "answer": "Returns accepted within 30 days."},
    {"question": "How do I track my order?", "answer": "Use the tracking link in your confirmation email."}
]}"#;

fn settings(corpus: &Path) -> AppSettings {
    AppSettings {
        corpus: corpus.to_path_buf(),
        index_dir: None,
        matcher: MatcherConfig::default(),
        admin_token: Some("secret".into()),
        cors_allow_origin: None,
        paraphraser: Paraphraser::Passthrough,
    }
}

fn app_with_corpus(dir: &Path) -> Router {
    let corpus = dir.join("faq.json");
    fs::write(&corpus, CORPUS).unwrap();
    build_app(settings(&corpus)).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn match_returns_best_entry() {
    let dir = tempdir().unwrap();
    let app = app_with_corpus(dir.path());

    let (status, json) = send(&app, get("/match?q=can%20I%20return%20an%20item")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"]["matched"], true);
    assert_eq!(json["outcome"]["entry_id"], 0);
    assert_eq!(json["outcome"]["answer"], "Returns accepted within 30 days.");
    assert!(json["outcome"]["score"].as_f64().unwrap() > 0.2);
}

#[tokio::test]
async fn match_reports_no_match() {
    let dir = tempdir().unwrap();
    let app = app_with_corpus(dir.path());

    let (status, json) = send(&app, get("/match?q=what%27s%20the%20weather%20today")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"]["matched"], false);
    assert!(json["outcome"].get("answer").is_none());
}

#[tokio::test]
async fn entry_lookup_and_missing_entry() {
    let dir = tempdir().unwrap();
    let app = app_with_corpus(dir.path());

    let (status, json) = send(&app, get("/entry/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["question"], "How do I track my order?");

    let (status, _) = send(&app, get("/entry/7")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn chat_relays_answer_or_falls_back() {
    let dir = tempdir().unwrap();
    let app = app_with_corpus(dir.path());

    let (status, json) = send(&app, post_json("/chat", json!({"message": "how can I track my order"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["matched"], true);
    assert_eq!(json["reply"], "Use the tracking link in your confirmation email.");

    let (status, json) = send(&app, post_json("/chat", json!({"message": "do you sell bicycles"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["matched"], false);
    assert_eq!(json["reply"], FALLBACK_REPLY);

    let (status, _) = send(&app, post_json("/chat", json!({"message": "   "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reload_swaps_index_after_corpus_change() {
    let dir = tempdir().unwrap();
    let app = app_with_corpus(dir.path());

    let (_, json) = send(&app, get("/match?q=gift%20cards")).await;
    assert_eq!(json["outcome"]["matched"], false);

    fs::write(
        dir.path().join("faq.json"),
        r#"[{"question": "Do you sell gift cards?", "answer": "Yes, from 10 to 500 euros."}]"#,
    )
    .unwrap();

    let (status, _) = send(&app, Request::post("/admin/reload").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let reload = Request::post("/admin/reload").header("X-ADMIN-TOKEN", "secret").body(Body::empty()).unwrap();
    let (status, json) = send(&app, reload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["num_entries"], 1);

    let (_, json) = send(&app, get("/match?q=gift%20cards")).await;
    assert_eq!(json["outcome"]["matched"], true);
    assert_eq!(json["outcome"]["entry_id"], 0);
}

#[tokio::test]
async fn failed_reload_keeps_current_index() {
    let dir = tempdir().unwrap();
    let app = app_with_corpus(dir.path());

    fs::write(dir.path().join("faq.json"), "{ not json").unwrap();
    let reload = Request::post("/admin/reload").header("X-ADMIN-TOKEN", "secret").body(Body::empty()).unwrap();
    let (status, _) = send(&app, reload).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, json) = send(&app, get("/match?q=track%20order")).await;
    assert_eq!(json["outcome"]["entry_id"], 1);
}

#[tokio::test]
async fn stale_persisted_index_is_rebuilt() {
    let dir = tempdir().unwrap();
    let corpus = dir.path().join("faq.json");
    fs::write(&corpus, CORPUS).unwrap();
    let index_dir = dir.path().join("index");
    let old = FaqIndex::build(vec![FaqEntry::new("Do you sell gift cards?", "Yes.")]).unwrap();
    save_index(&IndexPaths::new(&index_dir), &old).unwrap();

    let mut s = settings(&corpus);
    s.index_dir = Some(index_dir);
    let app = build_app(s).unwrap();

    let (_, json) = send(&app, get("/match?q=gift%20cards")).await;
    assert_eq!(json["outcome"]["matched"], false);
    let (_, json) = send(&app, get("/match?q=return%20policy")).await;
    assert_eq!(json["outcome"]["entry_id"], 0);
}

#[test]
fn missing_corpus_fails_startup() {
    let dir = tempdir().unwrap();
    let err = build_app(settings(&dir.path().join("absent.json"))).unwrap_err();
    assert!(format!("{err:#}").contains("cannot read corpus"));
}

#[tokio::test]
async fn health_is_ok() {
    let dir = tempdir().unwrap();
    let app = app_with_corpus(dir.path());
    let resp = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
