//! Prompts sent to the vision model.
//!
//! Centralising every prompt here keeps prompt wording out of the pipeline
//! code and lets unit tests inspect prompts without a live model.
//!
//! Prompts are looked up by [`PromptName`] through a [`PromptLibrary`].
//! Lookup can fail: an override file may be empty, or a caller may build a
//! library without a given prompt. Callers decide what a missing prompt means.

use std::collections::HashMap;
use std::path::Path;

/// Default prompt for describing an image embedded in a PDF.
pub const IMAGE_EXTRACTION_PROMPT: &str = r#"Describe this image so that someone who cannot see it understands what it contributes to the surrounding document.

- If the image contains text, transcribe the text verbatim.
- If it is a chart or diagram, state what it shows: axes, labels, trends, relationships.
- If it is a table, list its headers and rows.
- If it is a photograph or illustration, describe the subject and any notable details.

Output only the description. Do not add commentary or preamble."#;

/// Default prompt for transcribing a standalone image (direct OCR path).
pub const IMAGE_OCR_PROMPT: &str = r#"Transcribe all text visible in this image exactly as written.

- Preserve the reading order and line breaks.
- Do not translate, summarise, or correct the text.
- If the image contains no text, output nothing.

Output only the transcribed text."#;

/// Identifies a prompt in a [`PromptLibrary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptName {
    /// Describe an image embedded in a document.
    ImageExtraction,
    /// Transcribe text from a standalone image.
    ImageOcr,
}

impl PromptName {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptName::ImageExtraction => "image_extraction",
            PromptName::ImageOcr => "image_ocr",
        }
    }
}

/// A named set of prompts.
#[derive(Debug, Clone, Default)]
pub struct PromptLibrary {
    prompts: HashMap<PromptName, String>,
}

impl PromptLibrary {
    /// A library holding the built-in prompts.
    pub fn builtin() -> Self {
        Self::default()
            .with_prompt(PromptName::ImageExtraction, IMAGE_EXTRACTION_PROMPT)
            .with_prompt(PromptName::ImageOcr, IMAGE_OCR_PROMPT)
    }

    /// A library with no prompts at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Set or replace one prompt. Blank text removes it.
    pub fn with_prompt(mut self, name: PromptName, text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim().is_empty() {
            self.prompts.remove(&name);
        } else {
            self.prompts.insert(name, text);
        }
        self
    }

    /// Replace one prompt with the contents of a file.
    pub fn with_prompt_file(self, name: PromptName, path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(self.with_prompt(name, text))
    }

    /// Look up a prompt by name.
    pub fn get_prompt(&self, name: PromptName) -> Option<&str> {
        self.prompts.get(&name).map(String::as_str)
    }
}
