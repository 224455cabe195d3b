//! Test helper utilities: scripted capability fakes, a webhook sink server,
//! and engine assembly.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use tokio::sync::Semaphore;
use uuid::Uuid;

use brandgen::engine::{Engine, EngineSettings, JobSubmission};
use brandgen::models::audit::RawAudit;
use brandgen::models::brand::{BrandContext, BrandGuidelines, LogoAsset};
use brandgen::models::job::Job;
use brandgen::services::auditor::{AuditorError, ComplianceAuditor};
use brandgen::services::brands::{BrandStore, BrandStoreError};
use brandgen::services::generator::{GeneratedImage, GeneratorError, ImageGenerator};
use brandgen::services::storage::{DurableStore, StorageError};

use crate::fixtures;

/// One recorded call to the scripted generator.
#[derive(Debug, Clone)]
pub struct GenCall {
    pub prompt: String,
    pub reference_count: usize,
}

/// Generator fake: pops scripted results, falls back to a fixed PNG, and
/// optionally blocks on a semaphore so tests can hold a step in flight.
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<GeneratedImage, GeneratorError>>>,
    pub calls: Mutex<Vec<GenCall>>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    pub fn push_image(&self, image: GeneratedImage) {
        self.script.lock().unwrap().push_back(Ok(image));
    }

    pub fn push_error(&self, error: GeneratorError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ImageGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        prompt: &str,
        reference_assets: &[LogoAsset],
    ) -> Result<GeneratedImage, GeneratorError> {
        self.calls.lock().unwrap().push(GenCall {
            prompt: prompt.to_string(),
            reference_count: reference_assets.len(),
        });

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("generator gate closed").forget();
        }

        match self.script.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(fixtures::png_image()),
        }
    }
}

/// Auditor fake: pops scripted raw audits, falls back to a clean pass.
pub struct ScriptedAuditor {
    script: Mutex<VecDeque<Result<RawAudit, AuditorError>>>,
}

impl ScriptedAuditor {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push_scores(&self, scores: &[f64]) {
        let mut script = self.script.lock().unwrap();
        for &score in scores {
            script.push_back(Ok(fixtures::scripted_audit(score)));
        }
    }

    pub fn push_error(&self, error: AuditorError) {
        self.script.lock().unwrap().push_back(Err(error));
    }
}

#[async_trait]
impl ComplianceAuditor for ScriptedAuditor {
    async fn audit(
        &self,
        _image: &GeneratedImage,
        _guidelines: &BrandGuidelines,
    ) -> Result<RawAudit, AuditorError> {
        match self.script.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(fixtures::scripted_audit(90.0)),
        }
    }
}

/// Durable store fake. Flip `fail` to simulate a storage outage.
pub struct FakeDurableStore {
    pub fail: AtomicBool,
    pub uploads: Mutex<Vec<String>>,
}

impl FakeDurableStore {
    pub fn new() -> Self {
        Self {
            fail: AtomicBool::new(false),
            uploads: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DurableStore for FakeDurableStore {
    async fn upload(
        &self,
        key: &str,
        _data: &[u8],
        _content_type: &str,
    ) -> Result<String, StorageError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StorageError::Config("simulated storage outage".to_string()));
        }
        self.uploads.lock().unwrap().push(key.to_string());
        Ok(format!("https://cdn.test/{key}"))
    }
}

/// Brand catalog fake backed by a fixed map.
pub struct FakeBrandCatalog {
    brands: HashMap<Uuid, BrandContext>,
}

impl FakeBrandCatalog {
    pub fn with_brand(brand: BrandContext) -> Self {
        let mut brands = HashMap::new();
        brands.insert(brand.guidelines.brand_id, brand);
        Self { brands }
    }
}

#[async_trait]
impl BrandStore for FakeBrandCatalog {
    async fn fetch(&self, brand_id: Uuid) -> Result<BrandContext, BrandStoreError> {
        self.brands
            .get(&brand_id)
            .cloned()
            .ok_or(BrandStoreError::NotFound(brand_id))
    }
}

/// A fully wired engine over scripted fakes.
pub struct TestRig {
    pub engine: Engine,
    pub brand_id: Uuid,
    pub generator: Arc<ScriptedGenerator>,
    pub auditor: Arc<ScriptedAuditor>,
    pub storage: Arc<FakeDurableStore>,
}

pub fn build_rig(brand: BrandContext, settings: EngineSettings) -> TestRig {
    build_rig_with_generator(brand, settings, ScriptedGenerator::new())
}

pub fn build_rig_with_generator(
    brand: BrandContext,
    settings: EngineSettings,
    generator: ScriptedGenerator,
) -> TestRig {
    let brand_id = brand.guidelines.brand_id;
    let generator = Arc::new(generator);
    let auditor = Arc::new(ScriptedAuditor::new());
    let storage = Arc::new(FakeDurableStore::new());

    let engine = Engine::new(
        Arc::new(FakeBrandCatalog::with_brand(brand)),
        generator.clone(),
        auditor.clone(),
        storage.clone(),
        settings,
    );

    TestRig {
        engine,
        brand_id,
        generator,
        auditor,
        storage,
    }
}

/// Settings tuned for tests: same defaults, short step timeout.
pub fn test_settings() -> EngineSettings {
    EngineSettings {
        step_timeout: Duration::from_secs(5),
        ..EngineSettings::default()
    }
}

pub fn submission(brand_id: Uuid, prompt: &str) -> JobSubmission {
    JobSubmission {
        brand_id,
        prompt: prompt.to_string(),
        is_tweak: false,
        user_tweak_instruction: None,
        session_id: None,
        idempotency_key: None,
        webhook_url: None,
        max_attempts: None,
    }
}

/// Poll until the job reaches a terminal state.
pub async fn wait_for_terminal(engine: &Engine, job_id: Uuid) -> Job {
    for _ in 0..2000 {
        if let Some(job) = engine.get_job(job_id).await {
            if job.status.is_terminal() {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {job_id} did not reach a terminal state in time");
}

/// Poll until the job's webhook delivery cycle has concluded. The budget is
/// generous because a failing cycle backs off for 30 seconds (paused-clock
/// tests burn that instantly, but still advance the polling clock).
pub async fn wait_for_webhook_cycle(engine: &Engine, job_id: Uuid) -> Job {
    for _ in 0..4000 {
        if let Some(job) = engine.get_job(job_id).await {
            if job.webhook_attempts > 0 {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("webhook cycle for job {job_id} did not conclude in time");
}

/// Local HTTP server capturing webhook payloads.
pub struct WebhookSink {
    pub url: String,
    pub received: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl WebhookSink {
    pub fn payload_count(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

pub async fn spawn_webhook_sink() -> WebhookSink {
    let received: Arc<Mutex<Vec<serde_json::Value>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();

    let app = Router::new().route(
        "/hook",
        post(move |Json(body): Json<serde_json::Value>| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(body);
                StatusCode::OK
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind webhook sink");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Webhook sink died");
    });

    WebhookSink {
        url: format!("http://{addr}/hook"),
        received,
    }
}

/// A URL nothing is listening on.
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/hook")
}
