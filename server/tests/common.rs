//! Common utilities for integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use server::routes::{router, AppState};
use tempfile::TempDir;
use tower::ServiceExt;
use tts_core::{EngineError, EngineRequest, SynthesisEngine, SynthesisService, TtsConfig};

/// Engine stand-in that writes a short tone and records every target text.
#[derive(Default)]
pub struct ToneEngine {
    pub fail_on: Vec<String>,
    pub calls: Mutex<Vec<String>>,
}

impl ToneEngine {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SynthesisEngine for ToneEngine {
    async fn synthesize(&self, req: &EngineRequest) -> Result<PathBuf, EngineError> {
        self.calls.lock().unwrap().push(req.target_text.clone());
        if self.fail_on.iter().any(|f| req.target_text.contains(f.as_str())) {
            return Err(EngineError::Exit {
                status: Some(1),
                stderr: "model rejected input".into(),
            });
        }
        let samples: Vec<f32> = (0..1600)
            .map(|i| (i as f32 * 440.0 * 2.0 * std::f32::consts::PI / 16000.0).sin() * 0.5)
            .collect();
        tts_core::wav::write_pcm16(&req.output_path, &samples, 16000, 1)
            .map_err(|e| EngineError::MissingOutput(e.to_string()))?;
        Ok(req.output_path.clone())
    }
}

pub struct TestApp {
    pub app: Router,
    pub engine: Arc<ToneEngine>,
    pub root: TempDir,
}

impl TestApp {
    pub fn data_root(&self) -> &Path {
        self.root.path()
    }
}

/// Write a 44.1 kHz stereo reference clip under `root`.
pub fn write_stereo_reference(root: &Path, name: &str) {
    let samples: Vec<f32> = (0..44100)
        .flat_map(|i| {
            let s = (i as f32 * 220.0 * 2.0 * std::f32::consts::PI / 44100.0).sin() * 0.3;
            [s, s]
        })
        .collect();
    tts_core::wav::write_pcm16(root.join(name), &samples, 44100, 2).unwrap();
}

/// Create a test app instance backed by a fake engine and a scratch data root
pub fn create_test_app(fail_on: &[&str]) -> TestApp {
    let root = tempfile::tempdir().unwrap();
    write_stereo_reference(root.path(), "ref.wav");

    let engine = Arc::new(ToneEngine {
        fail_on: fail_on.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    });
    let config = TtsConfig {
        data_root: root.path().to_path_buf(),
        ..TtsConfig::default()
    };
    let service = Arc::new(SynthesisService::new(config, engine.clone()));
    TestApp {
        app: router(AppState::new(service)),
        engine,
        root,
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}
