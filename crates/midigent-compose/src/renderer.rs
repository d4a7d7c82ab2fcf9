//! Summary rendering.
//!
//! Uses Handlebars with a few helpers:
//! - percent: 0.85 -> "85%"
//! - join: join an array with a separator
//! - default: value, or a fallback when missing

use handlebars::{Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::templates::TemplatesFile;

pub const SUCCESS: &str = "success";
pub const FAILURE: &str = "failure";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("RENDER/PARSE: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("RENDER/TEMPLATE: {0}")]
    Template(String),
    #[error("RENDER/FAILED: {0}")]
    Render(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackFacts {
    pub name: String,
    pub instrument: String,
    pub notes: usize,
}

/// What is known about a run when it is summarized. Everything past the
/// identifiers is optional so failed runs can report what they reached.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryFacts {
    pub version: String,
    pub correlation_id: String,
    pub request: String,

    pub genre: Option<String>,
    pub mood: Option<String>,
    pub energy: Option<String>,
    pub tempo: Option<u16>,
    pub key: Option<String>,
    pub time_signature: Option<String>,
    pub bars: Option<u32>,
    pub seconds: Option<u32>,
    pub tags: Vec<String>,
    pub origin: Option<String>,
    pub confidence: Option<f32>,

    pub tracks: Vec<TrackFacts>,
    pub score: Option<f32>,
    pub iterations: u32,
    pub max_iterations: u32,
    pub refinements: Vec<String>,
    pub artifact: Option<String>,
    pub location: Option<String>,

    /// Failed stage and its error
    pub stage: Option<String>,
    pub message: Option<String>,
}

pub struct SummaryRenderer {
    handlebars: Handlebars<'static>,
    templates: TemplatesFile,
}

impl SummaryRenderer {
    pub fn builtin() -> Result<Self, RenderError> {
        Self::new(TemplatesFile::builtin()?)
    }

    /// Compiles every template. Both summary templates must be present.
    pub fn new(templates: TemplatesFile) -> Result<Self, RenderError> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.register_helper("percent", Box::new(PercentHelper));
        handlebars.register_helper("join", Box::new(JoinHelper));
        handlebars.register_helper("default", Box::new(DefaultHelper));

        for required in [SUCCESS, FAILURE] {
            if templates.get(required).is_none() {
                return Err(RenderError::Template(format!("missing template '{}'", required)));
            }
        }
        for (name, template) in &templates.templates {
            handlebars
                .register_template_string(name, &template.template)
                .map_err(|e| RenderError::Template(format!("{}: {}", name, e)))?;
        }

        Ok(Self {
            handlebars,
            templates,
        })
    }

    pub fn render(&self, name: &str, data: &Value) -> Result<String, RenderError> {
        self.handlebars
            .render(name, data)
            .map(|text| text.trim().to_string())
            .map_err(|e| RenderError::Render(e.to_string()))
    }

    pub fn success(&self, facts: &SummaryFacts) -> Result<String, RenderError> {
        self.render(SUCCESS, &payload(facts)?)
    }

    pub fn failure(&self, facts: &SummaryFacts) -> Result<String, RenderError> {
        self.render(FAILURE, &payload(facts)?)
    }

    pub fn list_templates(&self) -> Vec<&str> {
        self.templates.list_templates()
    }
}

/// Facts plus the derived flags the templates branch on
fn payload(facts: &SummaryFacts) -> Result<Value, RenderError> {
    let mut data = serde_json::to_value(facts).map_err(|e| RenderError::Render(e.to_string()))?;
    if let Value::Object(map) = &mut data {
        map.insert("assessed".to_string(), Value::Bool(facts.score.is_some()));
        map.insert("track_count".to_string(), Value::from(facts.tracks.len()));
        map.insert(
            "note_count".to_string(),
            Value::from(facts.tracks.iter().map(|t| t.notes).sum::<usize>()),
        );
    }
    Ok(data)
}

// ============================================================================
// Helpers
// ============================================================================

struct PercentHelper;

impl HelperDef for PercentHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _r: &'reg Handlebars<'reg>,
        _ctx: &'rc Context,
        _rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let value = h.param(0).and_then(|v| v.value().as_f64()).unwrap_or(0.0);
        out.write(&format!("{}%", (value * 100.0).round() as i64))?;
        Ok(())
    }
}

struct JoinHelper;

impl HelperDef for JoinHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _r: &'reg Handlebars<'reg>,
        _ctx: &'rc Context,
        _rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let separator = h.param(1).and_then(|v| v.value().as_str()).unwrap_or(", ");
        if let Some(Value::Array(items)) = h.param(0).map(|v| v.value()) {
            let strings: Vec<String> = items
                .iter()
                .map(|v| v.as_str().map(String::from).unwrap_or_else(|| v.to_string()))
                .collect();
            out.write(&strings.join(separator))?;
        }
        Ok(())
    }
}

struct DefaultHelper;

impl HelperDef for DefaultHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _r: &'reg Handlebars<'reg>,
        _ctx: &'rc Context,
        _rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let fallback = h.param(1).and_then(|v| v.value().as_str()).unwrap_or("");
        match h.param(0).map(|v| v.value()) {
            Some(Value::String(s)) if !s.is_empty() => out.write(s)?,
            Some(v) if !v.is_null() && !v.is_string() => out.write(&v.to_string())?,
            _ => out.write(fallback)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn facts() -> SummaryFacts {
        SummaryFacts {
            version: "1.0.0".to_string(),
            correlation_id: "abc".to_string(),
            request: "120 BPM lofi beat".to_string(),
            genre: Some("lofi".to_string()),
            mood: Some("chill".to_string()),
            energy: Some("low".to_string()),
            tempo: Some(120),
            key: Some("D minor".to_string()),
            time_signature: Some("4/4".to_string()),
            bars: Some(16),
            seconds: Some(32),
            tags: vec!["warm".to_string(), "dusty".to_string()],
            origin: Some("fallback".to_string()),
            confidence: Some(0.4),
            tracks: vec![TrackFacts {
                name: "lead (piano)".to_string(),
                instrument: "piano".to_string(),
                notes: 40,
            }],
            score: Some(0.82),
            iterations: 1,
            max_iterations: 2,
            refinements: vec!["reseeded lead".to_string()],
            artifact: Some("blake3:ff".to_string()),
            ..SummaryFacts::default()
        }
    }

    #[test]
    fn test_success_summary() {
        let text = SummaryRenderer::builtin().unwrap().success(&facts()).unwrap();
        assert!(text.starts_with("## Composition Summary"));
        assert!(text.contains("lofi"));
        assert!(text.contains("120 BPM"));
        assert!(text.contains("16 bars"));
        assert!(text.contains("82%"));
        assert!(text.contains("blake3:ff"));
        assert!(text.contains("warm, dusty"));
        assert!(text.contains("reseeded lead"));
    }

    #[test]
    fn test_unassessed_score_is_not_zero_percent() {
        let mut f = facts();
        f.score = None;
        let text = SummaryRenderer::builtin().unwrap().success(&f).unwrap();
        assert!(text.contains("**Quality:** not assessed"));
    }

    #[test]
    fn test_failure_summary_with_partial_facts() {
        let f = SummaryFacts {
            version: "1.0.0".to_string(),
            correlation_id: "abc".to_string(),
            stage: Some("plan".to_string()),
            message: Some("STAGE/VALIDATION: empty plan".to_string()),
            tempo: Some(90),
            ..SummaryFacts::default()
        };
        let text = SummaryRenderer::builtin().unwrap().failure(&f).unwrap();
        assert!(text.contains("plan"));
        assert!(text.contains("empty plan"));
        assert!(text.contains("90 BPM"));
        assert!(text.contains("unknown"));
    }

    #[test]
    fn test_examples_render() {
        let templates = TemplatesFile::builtin().unwrap();
        let renderer = SummaryRenderer::new(templates.clone()).unwrap();
        for name in templates.list_templates() {
            let example = templates.get(name).and_then(|t| t.example.clone()).unwrap_or(json!({}));
            let text = renderer.render(name, &example).unwrap();
            assert!(!text.is_empty(), "{} rendered nothing", name);
        }
    }

    #[test]
    fn test_missing_template_is_rejected() {
        let yaml = "version: \"1.0\"\ntemplates:\n  success:\n    description: s\n    template: ok\n";
        let templates = TemplatesFile::from_yaml(yaml).unwrap();
        assert!(matches!(SummaryRenderer::new(templates), Err(RenderError::Template(_))));
    }

    #[test]
    fn test_helpers() {
        let renderer = SummaryRenderer::builtin().unwrap();
        let data = json!({"score": 0.456, "items": ["a", "b"], "none": null});
        let hb = &renderer.handlebars;
        assert_eq!(hb.render_template("{{percent score}}", &data).unwrap(), "46%");
        assert_eq!(hb.render_template("{{join items \" / \"}}", &data).unwrap(), "a / b");
        assert_eq!(hb.render_template("{{default none \"n/a\"}}", &data).unwrap(), "n/a");
    }
}
