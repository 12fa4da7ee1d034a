//! Match-day traffic advice.
//!
//! The advisor turns a [`TrafficRequest`] plus the latest supporter location reports into a chat
//! prompt, runs it through the inference backend and hands back plain advice text. The backend is
//! loaded lazily on the first request, exactly once per process, and generation failures never
//! reach the client: they are logged and replaced by [`FALLBACK_ADVICE`].

pub mod backend;
pub mod fixture;
pub mod prompt;

use std::{sync::Arc, time::{Duration, Instant}};

use async_trait::async_trait;
use matchday_lib::{location::LocationObservation, traffic::TrafficRequest};
use tokio::sync::{OnceCell, Semaphore};

use prompt::ChatMessage;

/// Returned whenever the backend cannot produce advice. Kept to a single paragraph so the whole
/// text lands in `route_suggestion`.
pub const FALLBACK_ADVICE: &str = "Live traffic advice is unavailable right now. \
Public transport is usually the most reliable way to reach the stadium on match day: \
plan to arrive at least an hour before kick-off, expect crowded trains and buses right before the game and \
right after the final whistle, and check your operator's service updates before you set off.";

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("failed to load inference backend: {0}")]
    Load(String),
    #[error("inference request failed: {0}")]
    Request(String),
    #[error("inference backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed inference response: {0}")]
    Malformed(String),
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
    #[error("advisor is shutting down")]
    Unavailable,
    #[error("backend returned no text")]
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub max_new_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub repetition_penalty: f64,
    pub eos_token: Option<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 512,
            temperature: 0.7,
            top_p: 0.9,
            repetition_penalty: 1.1,
            eos_token: Some("</s>".to_string()),
        }
    }
}

/// A loaded model that turns chat messages into text.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn generate(&self, messages: &[ChatMessage], params: &GenerationParams) -> Result<String, InferenceError>;
}

/// Performs the expensive one-time load of an [`InferenceBackend`].
#[async_trait]
pub trait BackendLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn InferenceBackend>, InferenceError>;
}

#[derive(Debug, Clone)]
pub struct AdvisorSettings {
    pub params: GenerationParams,
    pub generation_timeout: Duration,
    pub max_concurrent_generations: usize,
}

impl Default for AdvisorSettings {
    fn default() -> Self {
        Self {
            params: GenerationParams::default(),
            generation_timeout: Duration::from_secs(60),
            max_concurrent_generations: 1,
        }
    }
}

pub struct TrafficAdvisor {
    loader: Box<dyn BackendLoader>,
    backend: OnceCell<Arc<dyn InferenceBackend>>,
    generation_slots: Semaphore,
    settings: AdvisorSettings,
}

impl TrafficAdvisor {
    pub fn new(loader: impl BackendLoader + 'static, settings: AdvisorSettings) -> Self {
        Self {
            loader: Box::new(loader),
            backend: OnceCell::new(),
            generation_slots: Semaphore::new(settings.max_concurrent_generations.max(1)),
            settings,
        }
    }

    /// Whether the backend has been loaded.
    pub fn is_ready(&self) -> bool {
        self.backend.initialized()
    }

    /// Stops handing out generation slots. Queued and later requests get the fallback
    /// straight away instead of waiting on the backend.
    pub fn close(&self) {
        tracing::info!("Closing traffic advisor");
        self.generation_slots.close();
    }

    /// Advice text for the request, or [`FALLBACK_ADVICE`] if anything goes wrong.
    /// `historical` is expected newest first.
    pub async fn analyze(&self, request: &TrafficRequest, historical: &[LocationObservation]) -> String {
        match self.generate_advice(request, historical).await {
            Ok(advice) => advice,
            Err(err) => {
                tracing::error!(error = %err, "Traffic advice generation failed, using fallback");
                FALLBACK_ADVICE.to_string()
            }
        }
    }

    async fn generate_advice(&self, request: &TrafficRequest, historical: &[LocationObservation]) -> Result<String, InferenceError> {
        let backend = self.backend().await?;
        let messages = prompt::build_messages(request, historical);

        let _slot = self.generation_slots.acquire().await.map_err(|_| InferenceError::Unavailable)?;

        let started = Instant::now();
        let timeout = self.settings.generation_timeout;
        let output = tokio::time::timeout(timeout, backend.generate(&messages, &self.settings.params))
            .await
            .map_err(|_| InferenceError::Timeout(timeout))??;

        let advice = prompt::strip_prompt_echo(&output, &messages);
        if advice.is_empty() {
            return Err(InferenceError::Empty);
        }

        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            history = historical.len(),
            chars = advice.chars().count(),
            "Generated traffic advice"
        );

        Ok(advice.to_string())
    }

    /// Concurrent first callers all wait on the same load. A failed load is retried by the next caller.
    async fn backend(&self) -> Result<&Arc<dyn InferenceBackend>, InferenceError> {
        self.backend
            .get_or_try_init(|| async {
                tracing::info!("Loading inference backend");
                let started = Instant::now();
                let backend = self.loader.load().await?;
                tracing::info!(elapsed_ms = started.elapsed().as_millis() as u64, "Inference backend ready");
                Ok::<_, InferenceError>(backend)
            })
            .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{atomic::{AtomicUsize, Ordering}, Mutex};

    use super::*;

    /// Backend double. Counts loads and in-flight generations.
    #[derive(Clone)]
    pub struct StubLoader {
        pub loads: Arc<AtomicUsize>,
        pub load_delay: Duration,
        pub fail_loads: bool,
        pub backend: Arc<StubBackend>,
    }

    pub struct StubBackend {
        pub reply: Result<String, String>,
        pub delay: Duration,
        pub in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
        pub prompts: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl StubLoader {
        pub fn replying(reply: &str) -> Self {
            Self::with_backend(StubBackend::new(Ok(reply.to_string())))
        }

        pub fn failing_generation() -> Self {
            Self::with_backend(StubBackend::new(Err("CUDA out of memory".to_string())))
        }

        pub fn with_backend(backend: StubBackend) -> Self {
            Self {
                loads: Arc::new(AtomicUsize::new(0)),
                load_delay: Duration::ZERO,
                fail_loads: false,
                backend: Arc::new(backend),
            }
        }
    }

    impl StubBackend {
        pub fn new(reply: Result<String, String>) -> Self {
            Self {
                reply,
                delay: Duration::ZERO,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl BackendLoader for StubLoader {
        async fn load(&self) -> Result<Arc<dyn InferenceBackend>, InferenceError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.load_delay).await;
            if self.fail_loads {
                return Err(InferenceError::Load("weights not found".into()));
            }
            let backend: Arc<dyn InferenceBackend> = self.backend.clone();
            Ok(backend)
        }
    }

    #[async_trait]
    impl InferenceBackend for StubBackend {
        async fn generate(&self, messages: &[ChatMessage], _params: &GenerationParams) -> Result<String, InferenceError> {
            self.prompts.lock().unwrap().push(messages.to_vec());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.reply.clone().map_err(InferenceError::Request)
        }
    }

    pub fn request() -> TrafficRequest {
        TrafficRequest {
            current_latitude: 35.5412,
            current_longitude: 139.4466,
            destination_latitude: 35.5927,
            destination_longitude: 139.4388,
            game_time: "14:00".into(),
            favorite_club: "FC町田ゼルビア".into(),
        }
    }

    #[tokio::test]
    async fn returns_trimmed_backend_text() {
        let advisor = TrafficAdvisor::new(StubLoader::replying("\n  Take the bus.\n\nAbout 20 minutes.\n "), AdvisorSettings::default());

        assert!(!advisor.is_ready());
        assert_eq!(advisor.analyze(&request(), &[]).await, "Take the bus.\n\nAbout 20 minutes.");
        assert!(advisor.is_ready());
    }

    #[tokio::test]
    async fn generation_failure_returns_fallback_verbatim() {
        let advisor = TrafficAdvisor::new(StubLoader::failing_generation(), AdvisorSettings::default());
        assert_eq!(advisor.analyze(&request(), &[]).await, FALLBACK_ADVICE);
    }

    #[tokio::test]
    async fn blank_output_returns_fallback() {
        let advisor = TrafficAdvisor::new(StubLoader::replying(" \n\n "), AdvisorSettings::default());
        assert_eq!(advisor.analyze(&request(), &[]).await, FALLBACK_ADVICE);
    }

    #[tokio::test]
    async fn slow_generation_times_out_to_fallback() {
        let mut backend = StubBackend::new(Ok("too late".into()));
        backend.delay = Duration::from_secs(5);
        let settings = AdvisorSettings {
            generation_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let advisor = TrafficAdvisor::new(StubLoader::with_backend(backend), settings);

        assert_eq!(advisor.analyze(&request(), &[]).await, FALLBACK_ADVICE);
    }

    #[tokio::test]
    async fn concurrent_first_calls_load_once() {
        let mut loader = StubLoader::replying("advice");
        loader.load_delay = Duration::from_millis(50);
        let loads = loader.loads.clone();
        let advisor = Arc::new(TrafficAdvisor::new(loader, AdvisorSettings::default()));

        let calls = (0..8).map(|_| {
            let advisor = advisor.clone();
            tokio::spawn(async move { advisor.analyze(&request(), &[]).await })
        });
        let results = futures::future::join_all(calls).await;

        assert!(results.into_iter().all(|result| result.unwrap() == "advice"));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_load_is_retried_by_next_request() {
        let mut loader = StubLoader::replying("advice");
        loader.fail_loads = true;
        let loads = loader.loads.clone();
        let advisor = TrafficAdvisor::new(loader, AdvisorSettings::default());

        assert_eq!(advisor.analyze(&request(), &[]).await, FALLBACK_ADVICE);
        assert_eq!(advisor.analyze(&request(), &[]).await, FALLBACK_ADVICE);
        assert!(!advisor.is_ready());
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn generations_are_limited_to_configured_slots() {
        let mut backend = StubBackend::new(Ok("advice".into()));
        backend.delay = Duration::from_millis(10);
        let loader = StubLoader::with_backend(backend);
        let stub = loader.backend.clone();
        let advisor = Arc::new(TrafficAdvisor::new(loader, AdvisorSettings::default()));

        let calls = (0..4).map(|_| {
            let advisor = advisor.clone();
            tokio::spawn(async move { advisor.analyze(&request(), &[]).await })
        });
        futures::future::join_all(calls).await;

        assert_eq!(stub.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn closed_advisor_falls_back_without_generating() {
        let loader = StubLoader::replying("advice");
        let stub = loader.backend.clone();
        let advisor = TrafficAdvisor::new(loader, AdvisorSettings::default());

        assert_eq!(advisor.analyze(&request(), &[]).await, "advice");
        advisor.close();
        assert_eq!(advisor.analyze(&request(), &[]).await, FALLBACK_ADVICE);
        assert_eq!(stub.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn closing_releases_queued_requests() {
        let mut backend = StubBackend::new(Ok("advice".into()));
        backend.delay = Duration::from_millis(200);
        let advisor = Arc::new(TrafficAdvisor::new(StubLoader::with_backend(backend), AdvisorSettings::default()));

        let first = tokio::spawn({
            let advisor = advisor.clone();
            async move { advisor.analyze(&request(), &[]).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let queued = tokio::spawn({
            let advisor = advisor.clone();
            async move { advisor.analyze(&request(), &[]).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        advisor.close();

        assert_eq!(queued.await.unwrap(), FALLBACK_ADVICE);
        assert_eq!(first.await.unwrap(), "advice");
    }
}
