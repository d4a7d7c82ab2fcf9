//! Prompt rendering for the understanding provider.
//!
//! Templates live in `data/prompts.yaml` and are rendered with handlebars.
//! The system prompt embeds the controlled vocabularies, the genre
//! reference, any hard numbers, and the prior composition when there is one.

use handlebars::{
    Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext,
};
use midigent_core::{
    Action, Complexity, DynamicsArc, EnergyLevel, ExtractedNumbers, InstrumentRole, Intensity,
    ParameterSet, Scale, Vocabulary,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use thiserror::Error;

use crate::registry::GenreRegistry;

const PROMPTS_YAML: &str = include_str!("../data/prompts.yaml");

const SYSTEM: &str = "system";
const CORRECTION: &str = "correction";

/// Sub-genres listed under each root in the system prompt
const CHILDREN_SHOWN: usize = 5;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("PROMPT/PARSE: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("PROMPT/TEMPLATE: {0}")]
    Template(String),
    #[error("PROMPT/RENDER: {0}")]
    Render(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptFile {
    pub version: String,
    pub templates: HashMap<String, PromptTemplate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptTemplate {
    pub description: String,
    pub template: String,
}

pub struct PromptBuilder {
    handlebars: Handlebars<'static>,
}

impl PromptBuilder {
    pub fn builtin() -> Result<Self, PromptError> {
        Self::from_yaml(PROMPTS_YAML)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, PromptError> {
        let file: PromptFile = serde_yaml::from_str(yaml)?;

        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.register_helper("join", Box::new(JoinHelper));

        for name in [SYSTEM, CORRECTION] {
            let template = file
                .templates
                .get(name)
                .ok_or_else(|| PromptError::Template(format!("missing template '{}'", name)))?;
            handlebars
                .register_template_string(name, &template.template)
                .map_err(|e| PromptError::Template(format!("{}: {}", name, e)))?;
        }

        Ok(Self { handlebars })
    }

    /// Instruction block for both extraction attempts
    pub fn system_prompt(
        &self,
        registry: &GenreRegistry,
        numbers: &ExtractedNumbers,
        prior: Option<&ParameterSet>,
    ) -> Result<String, PromptError> {
        let data = json!({
            "genres": genre_reference(registry),
            "scales": Scale::names(),
            "actions": Action::names(),
            "energy_levels": EnergyLevel::names(),
            "intensities": Intensity::names(),
            "arcs": DynamicsArc::names(),
            "complexities": Complexity::names(),
            "roles": InstrumentRole::names(),
            "hard_numbers": if numbers.has_values() { Value::from(numbers.summary()) } else { Value::Null },
            "session": prior.map(session_block).unwrap_or(Value::Null),
        });
        self.render(SYSTEM, &data)
    }

    /// Feedback appended to the request on the correction attempt
    pub fn correction(&self, error: &str) -> Result<String, PromptError> {
        self.render(CORRECTION, &json!({ "error": error }))
    }

    fn render(&self, name: &str, data: &Value) -> Result<String, PromptError> {
        self.handlebars
            .render(name, data)
            .map(|text| text.trim_end().to_string())
            .map_err(|e| PromptError::Render(e.to_string()))
    }
}

fn genre_reference(registry: &GenreRegistry) -> Vec<Value> {
    let mut roots: Vec<_> = registry.iter().filter(|g| g.parent().is_none()).collect();
    roots.sort_by(|a, b| a.id.cmp(&b.id));

    roots
        .into_iter()
        .map(|root| {
            let mut children: Vec<&str> = registry
                .iter()
                .filter(|g| g.parent() == Some(root.id.as_str()))
                .map(|g| g.id.as_str())
                .collect();
            children.sort_unstable();
            let hidden = children.len().saturating_sub(CHILDREN_SHOWN);
            let mut shown: Vec<String> =
                children.iter().take(CHILDREN_SHOWN).map(|c| c.to_string()).collect();
            if hidden > 0 {
                shown.push(format!("and {} more", hidden));
            }
            json!({
                "id": root.id,
                "tempo_min": root.tempo_min,
                "tempo_max": root.tempo_max,
                "scale": root.scale.as_str(),
                "energy": root.energy.as_str(),
                "tracks": root.tracks,
                "children": shown,
            })
        })
        .collect()
}

fn session_block(prior: &ParameterSet) -> Value {
    json!({
        "genre": prior.genre.primary,
        "key": prior.key.to_string(),
        "tempo": prior.tempo.bpm,
        "bars": prior.duration.bars,
        "tracks": prior.instruments.iter().map(|i| i.name.as_str()).collect::<Vec<_>>().join(", "),
        "energy": prior.energy.level.as_str(),
    })
}

/// Join an array with a separator
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

        if let Some(items) = h.param(0).and_then(|v| v.value().as_array()) {
            let strings: Vec<String> = items
                .iter()
                .map(|v| v.as_str().map(String::from).unwrap_or_else(|| v.to_string()))
                .collect();
            out.write(&strings.join(separator))?;
        }
        Ok(())
    }
}
