use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `media-leverage`.
///
/// Each subsystem defines its own error variant. Callers that need to branch
/// on a failure kind match on these; internal plumbing keeps using
/// `anyhow::Result` for context chains.
#[derive(Debug, Error)]
pub enum LeverageError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── LLM / Provider ──────────────────────────────────────────────────
    #[error("llm: {0}")]
    Llm(#[from] LlmError),

    // ── Store ───────────────────────────────────────────────────────────
    #[error("store: {0}")]
    Store(#[from] StoreError),

    // ── Pipeline ────────────────────────────────────────────────────────
    #[error("pipeline: {0}")]
    Pipeline(#[from] PipelineError),

    // ── Transport / Channel ─────────────────────────────────────────────
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    // ── Document extraction ─────────────────────────────────────────────
    #[error("extract: {0}")]
    Extract(#[from] ExtractError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── LLM / Provider errors ──────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("provider {provider} request failed: {message}")]
    Request { provider: String, message: String },

    #[error("provider {provider} authentication failed")]
    Auth { provider: String },

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("provider {provider} returned an empty response")]
    EmptyResponse { provider: String },
}

// ─── Store errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("query failed: {0}")]
    Query(String),

    #[error("schema migration failed: {0}")]
    Migration(String),

    #[error("transaction failed: {0}")]
    Transaction(String),
}

// ─── Pipeline errors ────────────────────────────────────────────────────────

/// Stage of a pipeline run, used for logging and for reporting where a run
/// was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum RunStage {
    Evaluating,
    Routing,
    Generating,
    Committing,
    Delivered,
}

#[derive(Debug, Error)]
pub enum PipelineErrorKind {
    #[error("evaluation backend call failed")]
    Evaluation,

    #[error("generation failed for platform {platform}")]
    Generation { platform: String },

    #[error("persisting thought and outputs failed")]
    Persistence,

    #[error("prompt rendering failed")]
    Prompt,
}

/// A pipeline run that was aborted. The window it was fed from is untouched.
#[derive(Debug, Error)]
#[error("run aborted while {stage}: {kind}")]
pub struct PipelineError {
    pub stage: RunStage,
    pub kind: PipelineErrorKind,
    #[source]
    pub source: anyhow::Error,
}

impl PipelineError {
    pub fn new(stage: RunStage, kind: PipelineErrorKind, source: anyhow::Error) -> Self {
        Self {
            stage,
            kind,
            source,
        }
    }
}

// ─── Transport errors ───────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{channel} send failed: {message}")]
    Send { channel: String, message: String },

    #[error("{channel} download failed: {message}")]
    Download { channel: String, message: String },

    #[error("{channel} api error: {message}")]
    Api { channel: String, message: String },
}

// ─── Extraction errors ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Unsupported file format: {extension}. Supported: .txt / .md / .json / .csv")]
    Unsupported { extension: String },

    #[error("{0}")]
    Malformed(String),

    #[error("File is {size} bytes; the limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
}

/// Convenience alias for results using the top-level error.
pub type Result<T> = std::result::Result<T, LeverageError>;
