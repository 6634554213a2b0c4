//! Locating on-screen text in a screenshot

use crate::types::{Rect, ScreenshotResult};
use crate::AutomationError;
use std::fmt::Debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrWord {
    pub text: String,
    pub bounds: Rect,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OcrLine {
    pub words: Vec<OcrWord>,
}

impl OcrLine {
    pub fn new(words: Vec<OcrWord>) -> Self {
        Self { words }
    }

    pub fn text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Recognizes text lines in a screen capture.
pub trait TextRecognizer: Send + Sync + Debug {
    fn recognize(&self, screenshot: &ScreenshotResult) -> Result<Vec<OcrLine>, AutomationError>;
}

/// Region covering `target` in the recognized lines, best effort.
///
/// Prefers a run of whole words equal to `target` (ignoring case), then falls
/// back to the first single word containing it.
pub fn locate_text(lines: &[OcrLine], target: &str) -> Option<Rect> {
    let wanted: Vec<String> = target
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect();
    if wanted.is_empty() {
        return None;
    }

    for line in lines {
        let words: Vec<String> = line.words.iter().map(|w| w.text.to_lowercase()).collect();
        if let Some(start) = words
            .windows(wanted.len())
            .position(|window| window == wanted.as_slice())
        {
            let run = &line.words[start..start + wanted.len()];
            return run
                .iter()
                .skip(1)
                .fold(Some(run[0].bounds), |acc, w| acc.map(|r| r.union(&w.bounds)));
        }
    }

    let needle = target.trim().to_lowercase();
    lines
        .iter()
        .flat_map(|line| line.words.iter())
        .find(|w| w.text.to_lowercase().contains(&needle))
        .map(|w| w.bounds)
}

/// Recognizer returning a fixed set of lines regardless of input.
#[derive(Debug, Clone, Default)]
pub struct StaticRecognizer {
    lines: Vec<OcrLine>,
}

impl StaticRecognizer {
    pub fn new(lines: Vec<OcrLine>) -> Self {
        Self { lines }
    }
}

impl TextRecognizer for StaticRecognizer {
    fn recognize(&self, _screenshot: &ScreenshotResult) -> Result<Vec<OcrLine>, AutomationError> {
        Ok(self.lines.clone())
    }
}
