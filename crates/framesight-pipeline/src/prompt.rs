//! Prompt text for frame and image requests.

use framesight_models::AnalysisTemplate;

const FRAME_DESCRIPTION_PROMPT: &str = "Analyze this video frame and provide a detailed description.";
const IMAGE_DESCRIPTION_PROMPT: &str = "Analyze this image and provide a detailed description.";

/// The custom prompt if set, otherwise `description` with the persona woven in.
fn base_prompt(template: &AnalysisTemplate, description: &str) -> String {
    if let Some(prompt) = template.prompt.as_deref().filter(|p| !p.trim().is_empty()) {
        return prompt.to_string();
    }
    match template.persona.as_deref().filter(|p| !p.trim().is_empty()) {
        Some(persona) => format!("As a {}, {}", persona, description),
        None => description.to_string(),
    }
}

/// Prompt for a request about one frame.
pub fn frame_prompt(frame_number: u64, template: &AnalysisTemplate) -> String {
    format!(
        "Analyze frame {} of the video. {}",
        frame_number,
        base_prompt(template, FRAME_DESCRIPTION_PROMPT)
    )
}

/// Prompt for a grouped request covering `first..=last`.
pub fn group_prompt(first_frame: u64, last_frame: u64, template: &AnalysisTemplate) -> String {
    format!(
        "Analyze frames {} to {} of the video as a group. {}",
        first_frame,
        last_frame,
        base_prompt(template, FRAME_DESCRIPTION_PROMPT)
    )
}

/// Prompt for standalone images.
pub fn image_prompt(template: &AnalysisTemplate) -> String {
    base_prompt(template, IMAGE_DESCRIPTION_PROMPT)
}

/// Built-in professional personas for persona/style analysis.
pub const PERSONAS: &[(&str, &str)] = &[
    (
        "art_critic",
        "You are an experienced art critic with a keen eye for detail and composition.",
    ),
    (
        "botanist",
        "You are a knowledgeable botanist specializing in plant identification and ecology.",
    ),
    (
        "fashion_designer",
        "You are a trendsetting fashion designer with an eye for style and innovation.",
    ),
];

/// Built-in narration styles for persona/style analysis.
pub const STYLES: &[(&str, &str)] = &[
    (
        "noir_detective",
        "Describe the scene as if you're a hard-boiled detective in a film noir.",
    ),
    (
        "victorian_gent",
        "Me dear fellow, Analyze the image in the style of a Victorian-era gentleman scientist.",
    ),
    (
        "sci_fi_author",
        "Describe the image as if it's a scene from a futuristic science fiction novel.",
    ),
];

fn lookup(table: &[(&str, &'static str)], name: &str) -> Option<&'static str> {
    table.iter().find(|(key, _)| *key == name).map(|(_, text)| *text)
}

pub fn persona_text(name: &str) -> Option<&'static str> {
    lookup(PERSONAS, name)
}

pub fn style_text(name: &str) -> Option<&'static str> {
    lookup(STYLES, name)
}

/// Prompt asking the model to rank images against weighted criteria.
pub fn judge_prompt(criteria: &[String], weights: &[f64]) -> String {
    let weights: Vec<String> = weights.iter().map(|w| w.to_string()).collect();
    format!(
        "Judge the following images based on these criteria: {}. \
         Use these weights for each criterion: {}. \
         Provide a structured comparison, ranking, and declare a winner.",
        criteria.join(", "),
        weights.join(", ")
    )
}

pub fn evolution_prompt(time_points: &[String]) -> String {
    format!(
        "Analyze the following series of images and describe the changes over time. \
         The images correspond to these time points: {}. \
         Provide a detailed analysis of the evolution observed in the images.",
        time_points.join(", ")
    )
}

pub fn time_series_prompt(time_points: &[String], metrics: &[String]) -> String {
    format!(
        "Analyze the following series of images taken at these time points: {}. \
         Focus on these metrics: {}. \
         Identify trends, anomalies, or patterns across the dataset, considering the temporal dimension.",
        time_points.join(", "),
        metrics.join(", ")
    )
}

pub const ALT_TEXT_PROMPT: &str = "Generate a detailed, context-aware alt-text for this image. \
     Include semantic information and relevant details to improve web accessibility.";

pub const PERSONA_STYLE_PROMPT: &str = "Analyze the following image in character, \
     combining your professional expertise with the specified style.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_prompt() {
        let template = AnalysisTemplate::default();
        assert_eq!(
            frame_prompt(30, &template),
            "Analyze frame 30 of the video. Analyze this video frame and provide a detailed description."
        );
    }

    #[test]
    fn test_persona_prefix() {
        let template = AnalysisTemplate::default().with_persona("film critic");
        assert_eq!(
            group_prompt(0, 30, &template),
            "Analyze frames 0 to 30 of the video as a group. As a film critic, Analyze this video frame and provide a detailed description."
        );
    }

    #[test]
    fn test_custom_prompt_replaces_description() {
        let template = AnalysisTemplate::default()
            .with_persona("film critic")
            .with_prompt("Count the people.");
        assert_eq!(frame_prompt(60, &template), "Analyze frame 60 of the video. Count the people.");
        assert_eq!(image_prompt(&template), "Count the people.");
    }

    #[test]
    fn test_judge_prompt_lists_criteria_and_weights() {
        let prompt = judge_prompt(&["clarity".into(), "color".into()], &[0.6, 0.4]);
        assert_eq!(
            prompt,
            "Judge the following images based on these criteria: clarity, color. \
             Use these weights for each criterion: 0.6, 0.4. \
             Provide a structured comparison, ranking, and declare a winner."
        );
    }

    #[test]
    fn test_time_series_prompt() {
        let prompt = time_series_prompt(&["2020".into(), "2024".into()], &["canopy cover".into()]);
        assert!(prompt.starts_with("Analyze the following series of images taken at these time points: 2020, 2024. "));
        assert!(prompt.contains("Focus on these metrics: canopy cover. "));
    }

    #[test]
    fn test_builtin_personas_and_styles() {
        assert!(persona_text("botanist").unwrap().contains("botanist"));
        assert!(style_text("noir_detective").unwrap().contains("film noir"));
        assert_eq!(persona_text("astronaut"), None);
        assert_eq!(ALT_TEXT_PROMPT.split(". ").count(), 2);
    }

    #[test]
    fn test_image_prompt() {
        assert_eq!(
            image_prompt(&AnalysisTemplate::default()),
            "Analyze this image and provide a detailed description."
        );
    }
}
