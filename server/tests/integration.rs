//! Integration tests for the TTS synthesis server

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

use common::*;

fn hello_request() -> serde_json::Value {
    json!({
        "text": "Hello there",
        "reference_text": "ref",
        "reference_audio": "ref.wav",
        "save_dir": "results"
    })
}

#[tokio::test]
async fn test_health_check() {
    let t = create_test_app(&[]);
    for uri in ["/health", "/healthz", "/api/health"] {
        let response = t.app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body, "ok");
    }
}

#[tokio::test]
async fn test_request_id_header() {
    let t = create_test_app(&[]);
    let response = t.app.clone().oneshot(get("/health")).await.unwrap();
    let id = response.headers().get("x-request-id").unwrap();
    assert_eq!(id.to_str().unwrap().len(), 36);
}

#[tokio::test]
async fn test_tts_then_cached() {
    let t = create_test_app(&[]);
    let fp = tts_core::fingerprint("Hello there.");

    let (status, body) = send(&t.app, post_json("/tts", hello_request())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "success");
    assert_eq!(body["text"], "Hello there.");
    assert_eq!(
        body["audio_relative_path"],
        format!("results/{fp}/{fp}.wav")
    );

    let entry = t.data_root().join("results").join(fp.as_str());
    assert!(entry.join(format!("{fp}.wav")).is_file());
    assert_eq!(
        std::fs::read_to_string(entry.join(format!("{fp}.txt"))).unwrap(),
        "Hello there."
    );
    let variant = tts_core::wav::probe(t.data_root().join("ref_16k_mono.wav")).unwrap();
    assert_eq!(variant, (16000, 1));

    let (status, body) = send(&t.app, post_json("/api/tts", hello_request())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cached");
    assert_eq!(t.engine.calls().len(), 1);
}

#[tokio::test]
async fn test_tts_short_text_rejected() {
    let t = create_test_app(&[]);
    let mut req = hello_request();
    req["text"] = json!("  Hi ");

    let (status, body) = send(&t.app, post_json("/tts", req)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], 400);
    assert!(!t.data_root().join("results").exists());
    assert!(t.engine.calls().is_empty());
}

#[tokio::test]
async fn test_tts_missing_reference() {
    let t = create_test_app(&[]);
    let mut req = hello_request();
    req["reference_audio"] = json!("nope.wav");

    let (status, body) = send(&t.app, post_json("/tts", req)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_tts_rejects_parent_dir() {
    let t = create_test_app(&[]);
    let mut req = hello_request();
    req["save_dir"] = json!("../escape");

    let (status, _) = send(&t.app, post_json("/tts", req)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(t.engine.calls().is_empty());
}

#[tokio::test]
async fn test_tts_incompatible_text_not_cached() {
    let t = create_test_app(&["Hello"]);

    let (status, body) = send(&t.app, post_json("/tts", hello_request())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert_eq!(body["diagnosis"], "incompatible_input");

    // Primary attempt plus the fallback probe
    let calls = t.engine.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], "Hello there.");

    let fp = tts_core::fingerprint("Hello there.");
    assert!(!t.data_root().join("results").join(fp.as_str()).exists());
}

#[tokio::test]
async fn test_cache_lookup() {
    let t = create_test_app(&[]);
    let fp = tts_core::fingerprint("Hello there.");

    let (status, _) = send(&t.app, get(&format!("/cache/{fp}?output_dir=results"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&t.app, post_json("/tts", hello_request())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&t.app, get(&format!("/cache/{fp}?output_dir=results"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fingerprint"], fp.as_str());
    assert_eq!(body["text"], "Hello there.");

    let (status, _) = send(&t.app, get("/cache/not-a-fingerprint?output_dir=results")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_counts_hits() {
    let t = create_test_app(&[]);
    send(&t.app, post_json("/tts", hello_request())).await;
    send(&t.app, post_json("/tts", hello_request())).await;

    let response = t
        .app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let metrics: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(metrics["tts"]["synthesized"], 1);
    assert_eq!(metrics["tts"]["cache_hits"], 1);
    assert_eq!(metrics["endpoints"]["tts"]["request_count"], 2);
}
