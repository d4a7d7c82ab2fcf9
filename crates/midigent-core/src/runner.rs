//! Stage Graph: runs the stages in order over one context, with a single
//! bounded assess/refine cycle.
//!
//! ```text
//! understand → plan → validate_theory → generate → assess_quality ─┬→ finalize → summarize
//!                                                      ↑           │
//!                                                      └── refine ←┘  (needs_refinement && iteration < max)
//! ```
//!
//! A failing stage records `context.error`; every later stage is skipped
//! until `summarize`, which always runs.
use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use crate::config::stage_budget;
use crate::context::{PipelineContext, StageStatus, StageTrace};
use crate::stage::{StageError, StageId, StageOutput, StageSet};
use crate::telemetry::{PipelineEvent, TelemetrySink, TracingSink};

pub struct StageGraph {
    stages: StageSet,
    telemetry: Arc<dyn TelemetrySink>,
}

impl StageGraph {
    pub fn new(stages: StageSet) -> Self {
        Self {
            stages,
            telemetry: Arc::new(TracingSink),
        }
    }

    pub fn with_telemetry(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = sink;
        self
    }

    /// Drives one context to a terminal state. Never fails: the returned
    /// context holds either an artifact or an error, and always a summary.
    /// The refine cap and the stage budget both come from
    /// `ctx.max_iterations`.
    pub async fn run(&self, ctx: PipelineContext) -> PipelineContext {
        let span = tracing::info_span!("pipeline", correlation_id = %ctx.correlation_id);
        self.drive(ctx).instrument(span).await
    }

    async fn drive(&self, mut ctx: PipelineContext) -> PipelineContext {
        let started = Instant::now();
        let budget = stage_budget(ctx.max_iterations);
        let mut executed = 0usize;
        let mut next = Some(StageId::Understand);

        tracing::info!(request = %ctx.request_text, max_iterations = ctx.max_iterations, "pipeline started");

        while let Some(stage_id) = next {
            if stage_id == StageId::Summarize {
                break;
            }
            if executed >= budget {
                ctx.fail(
                    stage_id,
                    format!("stage budget of {} executions exhausted", budget),
                );
                break;
            }
            executed += 1;

            if ctx.is_failed() {
                self.skip(stage_id, &mut ctx);
            } else {
                self.execute(stage_id, &mut ctx).await;
            }
            next = route(stage_id, &ctx);
        }

        self.summarize(&mut ctx).await;
        ctx.finished_at = Some(chrono::Utc::now());

        self.emit(PipelineEvent::RunFinished {
            correlation_id: ctx.correlation_id.clone(),
            succeeded: ctx.succeeded(),
            iterations: ctx.current_iteration,
            score: ctx.quality.as_ref().map(|q| q.score),
            latency_ms: started.elapsed().as_millis() as u64,
        });
        ctx
    }

    async fn execute(&self, stage_id: StageId, ctx: &mut PipelineContext) {
        let stage = self.stages.get(stage_id);
        let start = Instant::now();
        let in_hash = ctx.state_hash();

        let result = stage.run(ctx).await;
        let outcome = match result {
            Ok(output) if output.owner() == stage_id => {
                ctx.apply(output);
                Ok(())
            }
            Ok(output) => Err(StageError::SchemaMismatch {
                expected: stage_id.to_string(),
                got: output.owner().to_string(),
            }),
            Err(err) => Err(err),
        };

        let latency_ms = start.elapsed().as_millis() as u64;
        let status = match outcome {
            Ok(()) => {
                tracing::info!(stage = %stage_id, iteration = ctx.current_iteration, latency_ms, "stage completed");
                self.emit(PipelineEvent::StageCompleted {
                    correlation_id: ctx.correlation_id.clone(),
                    stage: stage_id,
                    iteration: ctx.current_iteration,
                    latency_ms,
                });
                StageStatus::Completed
            }
            Err(err) => {
                tracing::warn!(stage = %stage_id, error = %err, "stage failed");
                ctx.fail(stage_id, err.to_string());
                self.emit(PipelineEvent::StageFailed {
                    correlation_id: ctx.correlation_id.clone(),
                    stage: stage_id,
                    message: err.to_string(),
                });
                StageStatus::Failed
            }
        };

        let out_hash = ctx.state_hash();
        ctx.trace.push(StageTrace {
            stage: stage_id,
            status,
            in_hash,
            out_hash,
            deterministic: stage.deterministic(),
            latency_ms,
            iteration: ctx.current_iteration,
        });
    }

    fn skip(&self, stage_id: StageId, ctx: &mut PipelineContext) {
        tracing::debug!(stage = %stage_id, "skipping stage after earlier failure");
        let hash = ctx.state_hash();
        ctx.trace.push(StageTrace {
            stage: stage_id,
            status: StageStatus::Skipped,
            in_hash: hash.clone(),
            out_hash: hash,
            deterministic: true,
            latency_ms: 0,
            iteration: ctx.current_iteration,
        });
        self.emit(PipelineEvent::StageSkipped {
            correlation_id: ctx.correlation_id.clone(),
            stage: stage_id,
        });
    }

    /// Runs on success and failure alike; falls back to plain text if the
    /// summarize stage itself misbehaves.
    async fn summarize(&self, ctx: &mut PipelineContext) {
        let had_error = ctx.is_failed();
        let stage = self.stages.get(StageId::Summarize);
        let start = Instant::now();
        let in_hash = ctx.state_hash();

        let result = stage.run(ctx).await;
        let status = match result {
            Ok(StageOutput::Summarized(text)) if !text.trim().is_empty() => {
                ctx.summary = Some(text);
                StageStatus::Completed
            }
            Ok(_) => {
                tracing::warn!("summarize produced no usable text, using fallback");
                ctx.summary = Some(fallback_summary(ctx));
                StageStatus::Failed
            }
            Err(err) => {
                tracing::warn!(error = %err, "summarize failed, using fallback");
                ctx.summary = Some(fallback_summary(ctx));
                StageStatus::Failed
            }
        };

        let latency_ms = start.elapsed().as_millis() as u64;
        let out_hash = ctx.state_hash();
        ctx.trace.push(StageTrace {
            stage: StageId::Summarize,
            status,
            in_hash,
            out_hash,
            deterministic: stage.deterministic(),
            latency_ms,
            iteration: ctx.current_iteration,
        });
        if status == StageStatus::Completed {
            self.emit(PipelineEvent::StageCompleted {
                correlation_id: ctx.correlation_id.clone(),
                stage: StageId::Summarize,
                iteration: ctx.current_iteration,
                latency_ms,
            });
        }
        tracing::info!(failed = had_error, iterations = ctx.current_iteration, "pipeline finished");
    }

    fn emit(&self, event: PipelineEvent) {
        if let Err(err) = self.telemetry.record(&event) {
            tracing::warn!(error = %err, "telemetry sink rejected event");
        }
    }
}

/// Next stage after `current`. Routing after assess_quality is the only
/// decision point.
fn route(current: StageId, ctx: &PipelineContext) -> Option<StageId> {
    match current {
        StageId::Understand => Some(StageId::Plan),
        StageId::Plan => Some(StageId::ValidateTheory),
        StageId::ValidateTheory => Some(StageId::Generate),
        StageId::Generate => Some(StageId::AssessQuality),
        StageId::AssessQuality => {
            let wants_refinement = ctx
                .quality
                .as_ref()
                .map(|q| q.needs_refinement)
                .unwrap_or(false);
            if !ctx.is_failed() && wants_refinement && ctx.current_iteration < ctx.max_iterations {
                tracing::debug!(iteration = ctx.current_iteration, "routing to refine");
                Some(StageId::Refine)
            } else {
                if wants_refinement {
                    tracing::debug!(
                        iteration = ctx.current_iteration,
                        "refinement cap reached, finalizing"
                    );
                }
                Some(StageId::Finalize)
            }
        }
        StageId::Refine => Some(StageId::AssessQuality),
        StageId::Finalize => Some(StageId::Summarize),
        StageId::Summarize => None,
    }
}

fn fallback_summary(ctx: &PipelineContext) -> String {
    match &ctx.error {
        Some(failure) => format!(
            "Composition failed at {}: {}",
            failure.stage, failure.message
        ),
        None => match &ctx.artifact {
            Some(artifact) => format!(
                "Composition ready: {} tracks, artifact {}",
                ctx.tracks.len(),
                artifact.id
            ),
            None => format!("Composition finished with {} tracks", ctx.tracks.len()),
        },
    }
}
