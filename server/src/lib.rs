pub mod paraphrase;

use anyhow::{Context, Result};
use axum::{extract::{Path, Query, State}, http::StatusCode, routing::{get, post}, Json, Router};
use faqmatch::persist::{load_index_checked, IndexPaths};
use faqmatch::{load_corpus, FaqEntry, FaqIndex, MatchOutcome, MatcherConfig};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use paraphrase::{Paraphraser, APOLOGY_REPLY, FALLBACK_REPLY};

pub struct AppSettings {
    pub corpus: PathBuf,
    /// Persisted index to start from; rebuilt from the corpus when missing or stale.
    pub index_dir: Option<PathBuf>,
    pub matcher: MatcherConfig,
    pub admin_token: Option<String>,
    pub cors_allow_origin: Option<String>,
    pub paraphraser: Paraphraser,
}

impl AppSettings {
    /// Reads `ADMIN_TOKEN`, `CORS_ALLOW_ORIGIN` and the Gemini variables from the environment.
    pub fn from_env(corpus: PathBuf, index_dir: Option<PathBuf>, matcher: MatcherConfig) -> Result<Self> {
        Ok(Self {
            corpus,
            index_dir,
            matcher,
            admin_token: std::env::var("ADMIN_TOKEN").ok(),
            cors_allow_origin: std::env::var("CORS_ALLOW_ORIGIN").ok(),
            paraphraser: Paraphraser::from_env()?,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    index: Arc<RwLock<Arc<FaqIndex>>>,
    reload_lock: Arc<Mutex<()>>,
    corpus_path: PathBuf,
    config: MatcherConfig,
    admin_token: Option<String>,
    paraphraser: Arc<Paraphraser>,
}

impl AppState {
    /// Snapshot of the live index. Holders keep it alive across a reload.
    pub fn current(&self) -> Arc<FaqIndex> {
        self.index.read().clone()
    }

    /// Build a fresh index from the corpus source and swap it in.
    ///
    /// On error the previous index stays live.
    pub fn reload(&self) -> faqmatch::Result<Arc<FaqIndex>> {
        let _guard = self.reload_lock.lock();
        let entries = load_corpus(&self.corpus_path)?;
        let fresh = Arc::new(FaqIndex::build_with(entries, self.config)?);
        *self.index.write() = fresh.clone();
        tracing::info!(num_entries = fresh.len(), fingerprint = fresh.fingerprint(), "faq index reloaded");
        Ok(fresh)
    }
}

fn open_index(corpus: &FsPath, index_dir: Option<&FsPath>, config: MatcherConfig) -> Result<FaqIndex> {
    let entries = load_corpus(corpus).with_context(|| format!("load corpus {}", corpus.display()))?;
    if let Some(dir) = index_dir {
        let paths = IndexPaths::new(dir);
        if paths.exists() {
            match load_index_checked(&paths, &entries) {
                Ok(index) => {
                    tracing::info!(index = %dir.display(), "using persisted faq index");
                    return Ok(index.with_threshold(config.threshold)?);
                }
                Err(err) => tracing::warn!(error = %err, "persisted index unusable, rebuilding from corpus"),
            }
        }
    }
    Ok(FaqIndex::build_with(entries, config)?)
}

pub fn build_app(settings: AppSettings) -> Result<Router> {
    let index = open_index(&settings.corpus, settings.index_dir.as_deref(), settings.matcher)?;
    let app_state = AppState {
        config: *index.config(),
        index: Arc::new(RwLock::new(Arc::new(index))),
        reload_lock: Arc::new(Mutex::new(())),
        corpus_path: settings.corpus,
        admin_token: settings.admin_token,
        paraphraser: Arc::new(settings.paraphraser),
    };

    // CORS: comma-separated origins, or allow Any by default
    let origins: Vec<_> = settings
        .cors_allow_origin
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();
    let cors = if origins.is_empty() {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/match", get(match_handler))
        .route("/entry/:entry_id", get(entry_handler))
        .route("/chat", post(chat_handler))
        .route("/admin/reload", post(reload_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

#[derive(Deserialize)]
pub struct MatchParams {
    pub q: String,
}

#[derive(Serialize)]
pub struct MatchResponse {
    pub query: String,
    pub took_s: f64,
    pub outcome: OutcomeBody,
}

#[derive(Debug, Serialize)]
pub struct OutcomeBody {
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    pub score: f32,
}

impl From<MatchOutcome<'_>> for OutcomeBody {
    fn from(outcome: MatchOutcome<'_>) -> Self {
        match outcome {
            MatchOutcome::Matched(m) => OutcomeBody {
                matched: true,
                entry_id: Some(m.position),
                question: Some(m.entry.question.clone()),
                answer: Some(m.entry.answer.clone()),
                score: m.score,
            },
            MatchOutcome::NoMatch { best_score } => {
                OutcomeBody { matched: false, entry_id: None, question: None, answer: None, score: best_score }
            }
        }
    }
}

pub async fn match_handler(State(state): State<AppState>, Query(params): Query<MatchParams>) -> Json<MatchResponse> {
    let start = std::time::Instant::now();
    let index = state.current();
    let outcome = OutcomeBody::from(index.find_best(&params.q));
    Json(MatchResponse { query: params.q, took_s: start.elapsed().as_secs_f64(), outcome })
}

pub async fn entry_handler(
    State(state): State<AppState>,
    Path(entry_id): Path<usize>,
) -> Result<Json<FaqEntry>, (StatusCode, String)> {
    state
        .current()
        .entry(entry_id)
        .cloned()
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, format!("no faq entry {entry_id}")))
}

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<usize>,
    pub score: f32,
}

pub async fn chat_handler(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    if req.message.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "message must not be empty".into()));
    }
    let found = OutcomeBody::from(state.current().find_best(&req.message));
    let reply = match &found.answer {
        Some(answer) => state.paraphraser.paraphrase(&req.message, answer).await,
        None => FALLBACK_REPLY.to_string(),
    };
    Ok(Json(ChatResponse { reply, matched: found.matched, entry_id: found.entry_id, score: found.score }))
}

#[derive(Serialize)]
pub struct ReloadResponse {
    pub num_entries: usize,
    pub num_terms: usize,
    pub fingerprint: String,
}

async fn reload_handler(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> Result<Json<ReloadResponse>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let worker = state.clone();
    let fresh = tokio::task::spawn_blocking(move || worker.reload())
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| {
            tracing::warn!(error = %e, "reload failed, keeping current index");
            (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        })?;
    Ok(Json(ReloadResponse {
        num_entries: fresh.len(),
        num_terms: fresh.num_terms(),
        fingerprint: fresh.fingerprint().to_string(),
    }))
}

fn authorize(state: &AppState, headers: &axum::http::HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
