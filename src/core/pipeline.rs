//! One analyze → route → merge → generate → commit → deliver run.
//!
//! A run either commits a Thought with every Output it needs, or aborts
//! without writing anything and without touching the window it was fed
//! from. Consumption and delivery happen strictly after the commit; their
//! failures are logged but do not turn a committed run into a failed one.

use super::activity::ActivityGuard;
use super::evaluation::Evaluation;
use super::merge::{PlatformPlan, merge};
use super::routing::route;
use super::types::{ActorId, Platform, SourceKind};
use super::window::{MessageWindow, Window};
use crate::error::{PipelineError, PipelineErrorKind, RunStage};
use crate::llm::Provider;
use crate::prompt::{EVALUATION_MAX_TOKENS, PromptBook, generation_budget};
use crate::store::{NewOutput, NewThought, ThoughtStore};
use chrono::Utc;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::Instrument;

/// What a run works on.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub actor: ActorId,
    pub source: SourceKind,
    pub content: String,
    /// Consumed after commit. `None` for direct submissions.
    pub window: Option<Window>,
}

impl RunRequest {
    pub fn from_window(window: Window) -> Self {
        Self {
            actor: window.key.actor,
            source: window.source_kind(),
            content: window.content(),
            window: Some(window),
        }
    }

    pub fn submission(actor: ActorId, source: SourceKind, content: impl Into<String>) -> Self {
        Self {
            actor,
            source,
            content: content.into(),
            window: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub platform: Platform,
    pub content: String,
    pub tokens_used: u64,
}

/// Result of a committed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub thought_id: i64,
    /// Global evaluation with `publishable` recomputed from the merge.
    pub evaluation: Evaluation,
    pub plans: Vec<PlatformPlan>,
    pub drafts: Vec<Draft>,
    pub tokens_used: u64,
}

impl RunReport {
    pub fn platforms(&self) -> Vec<Platform> {
        self.plans.iter().map(|p| p.platform).collect()
    }
}

/// Where a run reports progress and results.
pub trait RunSink: Send + Sync {
    /// Start the activity signal for one backend call.
    fn activity(&self) -> ActivityGuard {
        ActivityGuard::inert()
    }

    /// Emit the evaluation summary and one message per draft.
    fn deliver<'a>(
        &'a self,
        report: &'a RunReport,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;
}

pub struct PipelineOrchestrator {
    provider: Arc<dyn Provider>,
    thoughts: Arc<dyn ThoughtStore>,
    window: MessageWindow,
    prompts: Arc<PromptBook>,
}

impl PipelineOrchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        thoughts: Arc<dyn ThoughtStore>,
        window: MessageWindow,
        prompts: Arc<PromptBook>,
    ) -> Self {
        Self {
            provider,
            thoughts,
            window,
            prompts,
        }
    }

    pub async fn run(
        &self,
        request: RunRequest,
        sink: &dyn RunSink,
    ) -> Result<RunReport, PipelineError> {
        let span = tracing::info_span!(
            "pipeline_run",
            run_id = %uuid::Uuid::new_v4(),
            actor = request.actor,
            source = request.source.as_str(),
        );
        async move {
            let result = self.execute(&request, sink).await;
            match &result {
                Ok(report) => tracing::info!(
                    thought_id = report.thought_id,
                    platforms = report.drafts.len(),
                    tokens = report.tokens_used,
                    "run delivered"
                ),
                Err(e) => tracing::warn!(
                    stage = %e.stage,
                    error = %e,
                    cause = %format!("{:#}", e.source),
                    "run aborted"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        request: &RunRequest,
        sink: &dyn RunSink,
    ) -> Result<RunReport, PipelineError> {
        let mut tokens_used = 0;

        tracing::debug!(stage = %RunStage::Evaluating, chars = request.content.len(), "stage");
        let prompt = self.prompts.evaluation(&request.content).map_err(|e| {
            PipelineError::new(RunStage::Evaluating, PipelineErrorKind::Prompt, e)
        })?;
        let response = {
            let _activity = sink.activity();
            self.provider
                .complete(&prompt.system, &prompt.user, EVALUATION_MAX_TOKENS)
                .await
                .map_err(|e| {
                    PipelineError::new(RunStage::Evaluating, PipelineErrorKind::Evaluation, e)
                })?
        };
        tokens_used += response.total_tokens();
        let mut evaluation = Evaluation::from_backend_text(&response.text);

        tracing::debug!(stage = %RunStage::Routing, "stage");
        let candidates = route(&evaluation);
        let merged = merge(&candidates, &evaluation);
        evaluation.publishable = merged.publishable();
        tracing::debug!(
            candidates = ?candidates,
            accepted = ?merged.platforms(),
            "platforms decided"
        );

        let mut drafts = Vec::with_capacity(merged.plans.len());
        if merged.publishable() {
            tracing::debug!(stage = %RunStage::Generating, "stage");
        }
        for plan in &merged.plans {
            let draft = self.generate(request, plan, sink).await?;
            tokens_used += draft.tokens_used;
            drafts.push(draft);
        }

        tracing::debug!(stage = %RunStage::Committing, "stage");
        let thought = NewThought {
            actor: request.actor,
            created_at: Utc::now(),
            raw_input: request.content.clone(),
            source: request.source,
            idea_type: evaluation.idea_type.clone(),
            novelty_score: evaluation.novelty_score,
            clarity_score: evaluation.clarity_score,
            publishable: evaluation.publishable,
            risk_level: evaluation.risk_level.clone(),
            summary: evaluation.summary.clone(),
        };
        let outputs = drafts
            .iter()
            .map(|d| NewOutput {
                platform: d.platform,
                content: d.content.clone(),
                tokens_used: d.tokens_used,
            })
            .collect();
        let thought_id = self.thoughts.commit(thought, outputs).await.map_err(|e| {
            PipelineError::new(RunStage::Committing, PipelineErrorKind::Persistence, e)
        })?;

        let report = RunReport {
            thought_id,
            evaluation,
            plans: merged.plans,
            drafts,
            tokens_used,
        };

        if let Some(window) = &request.window
            && let Err(e) = self.window.consume(window).await
        {
            tracing::error!(
                thought_id,
                error = %format!("{e:#}"),
                "window consumption failed after commit"
            );
        }

        tracing::debug!(stage = %RunStage::Delivered, "stage");
        if let Err(e) = sink.deliver(&report).await {
            tracing::error!(
                thought_id,
                error = %format!("{e:#}"),
                "delivery failed after commit"
            );
        }

        Ok(report)
    }

    async fn generate(
        &self,
        request: &RunRequest,
        plan: &PlatformPlan,
        sink: &dyn RunSink,
    ) -> Result<Draft, PipelineError> {
        let platform = plan.platform;
        let generation_failed = || PipelineErrorKind::Generation {
            platform: platform.to_string(),
        };

        let prompt = self
            .prompts
            .rewrite(&request.content, plan, None)
            .map_err(|e| PipelineError::new(RunStage::Generating, PipelineErrorKind::Prompt, e))?;

        let response = {
            let _activity = sink.activity();
            self.provider
                .complete(&prompt.system, &prompt.user, generation_budget(platform))
                .await
                .map_err(|e| PipelineError::new(RunStage::Generating, generation_failed(), e))?
        };

        let content = response.text.trim();
        if content.is_empty() {
            return Err(PipelineError::new(
                RunStage::Generating,
                generation_failed(),
                anyhow::anyhow!("blank draft"),
            ));
        }
        tracing::debug!(%platform, tokens = response.total_tokens(), "draft generated");

        Ok(Draft {
            platform,
            content: content.to_string(),
            tokens_used: response.total_tokens(),
        })
    }
}
