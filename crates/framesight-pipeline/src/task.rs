//! Standalone image analysis tasks.
//!
//! Every task is one request over the normalized images; tasks differ only
//! in how many images they take and what prompt and system text they send.

use serde::{Deserialize, Serialize};

use framesight_models::AnalysisTemplate;

use crate::error::{PipelineError, PipelineResult};
use crate::prompt::{
    evolution_prompt, image_prompt, judge_prompt, persona_text, style_text, time_series_prompt,
    ALT_TEXT_PROMPT, PERSONAS, PERSONA_STYLE_PROMPT, STYLES,
};

/// What a standalone image request asks the model to do.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageTask {
    /// Describe the images (persona and custom prompt from the template apply)
    #[default]
    Describe,
    /// Rank two or more images against weighted criteria
    Judge { criteria: Vec<String>, weights: Vec<f64> },
    /// Describe how a subject changes across images taken at `time_points`
    Evolution { time_points: Vec<String> },
    /// Find trends in `metrics` across images taken at `time_points`
    TimeSeries {
        time_points: Vec<String>,
        metrics: Vec<String>,
    },
    /// Accessibility alt-text for one image
    AltText,
    /// Analyze one image in character, using a built-in persona and style
    PersonaStyle { persona: String, style: String },
}

impl ImageTask {
    /// Name reported alongside results.
    pub fn analysis_type(&self) -> &'static str {
        match self {
            ImageTask::Describe => "description",
            ImageTask::Judge { .. } => "judge",
            ImageTask::Evolution { .. } => "evolution",
            ImageTask::TimeSeries { .. } => "time_series",
            ImageTask::AltText => "alt_text",
            ImageTask::PersonaStyle { .. } => "persona_style",
        }
    }

    /// Check the task's arguments against the number of images supplied.
    pub fn validate(&self, image_count: usize) -> PipelineResult<()> {
        match self {
            ImageTask::Describe => {}
            ImageTask::Judge { criteria, weights } => {
                self.require_series(image_count)?;
                if criteria.is_empty() {
                    return Err(PipelineError::invalid_request("at least one criterion is required"));
                }
                if criteria.len() != weights.len() {
                    return Err(PipelineError::invalid_request(format!(
                        "number of criteria ({}) must match number of weights ({})",
                        criteria.len(),
                        weights.len()
                    )));
                }
            }
            ImageTask::Evolution { time_points } | ImageTask::TimeSeries { time_points, .. } => {
                self.require_series(image_count)?;
                if time_points.len() != image_count {
                    return Err(PipelineError::invalid_request(format!(
                        "number of images ({}) must match number of time points ({})",
                        image_count,
                        time_points.len()
                    )));
                }
            }
            ImageTask::AltText => self.require_single(image_count)?,
            ImageTask::PersonaStyle { persona, style } => {
                self.require_single(image_count)?;
                if persona_text(persona).is_none() {
                    return Err(PipelineError::invalid_request(format!(
                        "unknown persona '{}' (known: {})",
                        persona,
                        known(PERSONAS)
                    )));
                }
                if style_text(style).is_none() {
                    return Err(PipelineError::invalid_request(format!(
                        "unknown style '{}' (known: {})",
                        style,
                        known(STYLES)
                    )));
                }
            }
        }
        Ok(())
    }

    /// User prompt for the request.
    pub fn prompt(&self, template: &AnalysisTemplate) -> String {
        match self {
            ImageTask::Describe => image_prompt(template),
            ImageTask::Judge { criteria, weights } => judge_prompt(criteria, weights),
            ImageTask::Evolution { time_points } => evolution_prompt(time_points),
            ImageTask::TimeSeries {
                time_points,
                metrics,
            } => time_series_prompt(time_points, metrics),
            ImageTask::AltText => ALT_TEXT_PROMPT.to_string(),
            ImageTask::PersonaStyle { .. } => PERSONA_STYLE_PROMPT.to_string(),
        }
    }

    /// System text the task sets, overriding the template's.
    pub fn system_prompt(&self) -> Option<String> {
        match self {
            ImageTask::PersonaStyle { persona, style } => Some(format!(
                "{} {}",
                persona_text(persona).unwrap_or_default(),
                style_text(style).unwrap_or_default()
            )),
            _ => None,
        }
    }

    fn require_series(&self, image_count: usize) -> PipelineResult<()> {
        if image_count < 2 {
            return Err(PipelineError::invalid_request(format!(
                "{} analysis needs at least two images, got {}",
                self.analysis_type(),
                image_count
            )));
        }
        Ok(())
    }

    fn require_single(&self, image_count: usize) -> PipelineResult<()> {
        if image_count != 1 {
            return Err(PipelineError::invalid_request(format!(
                "{} analysis takes exactly one image, got {}",
                self.analysis_type(),
                image_count
            )));
        }
        Ok(())
    }
}

fn known(table: &[(&str, &str)]) -> String {
    table.iter().map(|(name, _)| *name).collect::<Vec<_>>().join(", ")
}
