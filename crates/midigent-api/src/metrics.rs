//! Prometheus counters for composition runs, served at `/metrics`.
use midigent_core::PipelineContext;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

pub struct Metrics {
    registry: Registry,
    runs: IntCounter,
    failures: IntCounterVec,
    refinements: IntCounter,
    run_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let runs = IntCounter::new("midigent_runs_total", "Composition runs")?;
        let failures = IntCounterVec::new(
            Opts::new("midigent_failures_total", "Runs that ended in a stage error"),
            &["stage"],
        )?;
        let refinements = IntCounter::new(
            "midigent_refinement_passes_total",
            "Refine passes across all runs",
        )?;
        let run_seconds = Histogram::with_opts(
            HistogramOpts::new("midigent_run_seconds", "Wall time of one run")
                .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;

        registry.register(Box::new(runs.clone()))?;
        registry.register(Box::new(failures.clone()))?;
        registry.register(Box::new(refinements.clone()))?;
        registry.register(Box::new(run_seconds.clone()))?;

        Ok(Self {
            registry,
            runs,
            failures,
            refinements,
            run_seconds,
        })
    }

    pub fn observe(&self, ctx: &PipelineContext, elapsed: Duration) {
        self.runs.inc();
        self.refinements.inc_by(ctx.refine_count() as u64);
        self.run_seconds.observe(elapsed.as_secs_f64());
        if let Some(failure) = &ctx.error {
            self.failures
                .with_label_values(&[failure.stage.as_str()])
                .inc();
        }
    }

    pub fn encode(&self) -> Result<String, prometheus::Error> {
        encode(&self.registry)
    }
}

pub fn encode(registry: &Registry) -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use midigent_core::{PipelineConfig, StageFailure, StageId};

    #[test]
    fn test_observe_counts_runs_and_failures() {
        let metrics = Metrics::new().unwrap();
        let config = PipelineConfig::default();

        let ok = PipelineContext::new("pop", &config);
        metrics.observe(&ok, Duration::from_millis(20));

        let mut failed = PipelineContext::new("pop", &config);
        failed.error = Some(StageFailure {
            stage: StageId::Generate,
            message: "boom".to_string(),
        });
        metrics.observe(&failed, Duration::from_millis(5));

        let text = metrics.encode().unwrap();
        assert!(text.contains("midigent_runs_total 2"));
        assert!(text.contains("midigent_failures_total{stage=\"generate\"} 1"));
        assert!(text.contains("midigent_run_seconds_count 2"));
    }
}
