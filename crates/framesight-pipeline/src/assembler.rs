//! Result assembly.
//!
//! Outputs arrive in completion order, each tagged with the frames it
//! answers. Assembly expands them to one result per frame and sorts by frame
//! number.

use std::collections::HashSet;

use framesight_models::FrameResult;

use crate::batch::LabeledOutput;
use crate::error::{PipelineError, PipelineResult};

/// Merge labeled outputs into per-frame results sorted by frame number.
///
/// Fails unless every one of the `expected` frames appears exactly once.
pub fn assemble(outputs: Vec<LabeledOutput>, expected: usize) -> PipelineResult<Vec<FrameResult>> {
    let mut results: Vec<FrameResult> = outputs
        .into_iter()
        .flat_map(|output| {
            let text = output.text;
            output
                .labels
                .into_iter()
                .map(move |label| FrameResult::new(label, text.clone()))
        })
        .collect();

    results.sort_by_key(|r| r.frame_number);

    if results.len() != expected {
        return Err(PipelineError::assembly(format!(
            "expected {} frame results, got {}",
            expected,
            results.len()
        )));
    }

    let mut seen = HashSet::with_capacity(results.len());
    if let Some(duplicate) = results.iter().find(|r| !seen.insert(r.frame_number)) {
        return Err(PipelineError::assembly(format!(
            "frame {} was analyzed more than once",
            duplicate.frame_number
        )));
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use framesight_models::FrameLabel;

    fn output(frames: &[u64], text: &str) -> LabeledOutput {
        LabeledOutput {
            labels: frames
                .iter()
                .map(|&n| FrameLabel::new(n, n as f64 / 30.0))
                .collect(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_out_of_order_outputs_are_sorted() {
        let results = assemble(
            vec![output(&[60], "c"), output(&[0], "a"), output(&[30], "b")],
            3,
        )
        .unwrap();

        let numbers: Vec<u64> = results.iter().map(|r| r.frame_number).collect();
        assert_eq!(numbers, vec![0, 30, 60]);
        assert_eq!(results[1].result, "b");
        assert!((results[2].timestamp - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_grouped_output_is_shared() {
        let results = assemble(vec![output(&[60], "solo"), output(&[0, 30], "pair")], 3).unwrap();

        assert_eq!(results[0].result, "pair");
        assert_eq!(results[1].result, "pair");
        assert_eq!(results[2].result, "solo");
    }

    #[test]
    fn test_missing_frame_is_an_error() {
        let err = assemble(vec![output(&[0], "a")], 2).unwrap_err();
        assert!(matches!(err, PipelineError::Assembly(_)));
    }

    #[test]
    fn test_duplicate_frame_is_an_error() {
        let err = assemble(vec![output(&[0, 30], "a"), output(&[30], "b")], 3).unwrap_err();
        assert!(err.to_string().contains("frame 30"));
    }

    #[test]
    fn test_empty() {
        assert!(assemble(Vec::new(), 0).unwrap().is_empty());
    }
}
