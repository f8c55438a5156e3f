//! Turns a prompt plus input text into transformed text with one model call.

use crate::client::{CompletionBackend, ResponseFragment};
use crate::error::{Error, Result};
use serde_json::Value;
use tracing::{debug, trace};

/// Applies a prompt to a piece of text.
///
/// Implemented by [`ChunkTransformer`] for real model calls, and by any
/// `Fn(&str, &str) -> Result<String>` so callers can plug in local rewrites.
pub trait Transform {
    /// Returns the transformed `input`, or the reason the transformation failed.
    ///
    /// # Errors
    ///
    /// Implementations return [`Error::Transport`] or [`Error::Decode`] when no
    /// text could be produced.
    fn transform(&self, prompt: &str, input: &str) -> Result<String>;
}

impl<F> Transform for F
where
    F: Fn(&str, &str) -> Result<String>,
{
    fn transform(&self, prompt: &str, input: &str) -> Result<String> {
        self(prompt, input)
    }
}

/// Transformer backed by a remote completion service.
#[derive(Debug, Clone)]
pub struct ChunkTransformer<B> {
    backend: B,
}

impl<B: CompletionBackend> ChunkTransformer<B> {
    /// Wraps a completion backend.
    #[must_use]
    pub const fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Returns the underlying backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: CompletionBackend> Transform for ChunkTransformer<B> {
    fn transform(&self, prompt: &str, input: &str) -> Result<String> {
        let instruction = build_instruction(prompt, input);
        let fragments = self.backend.stream_generate(&instruction)?;
        let text = concat_fragments(&fragments);

        trace!("Decoded {} characters of model output", text.len());
        extract_first_value(&text)
    }
}

/// Folds the prompt and the input into the single instruction sent to the model.
#[must_use]
pub fn build_instruction(prompt: &str, input: &str) -> String {
    format!(
        "{prompt}\n\n\
         Apply the instruction above to the text between the INPUT markers. \
         Reply with a single JSON object that has exactly one key, \"response\", \
         whose value is the complete transformed text as a JSON string. \
         Do not wrap the object in code fences and do not write anything after it.\n\n\
         <<<INPUT\n{input}\nINPUT>>>\n"
    )
}

/// Concatenates every text part of every fragment, in arrival order.
#[must_use]
pub fn concat_fragments(fragments: &[ResponseFragment]) -> String {
    fragments.iter().flat_map(|f| f.texts()).collect()
}

/// Extracts the value of the first key of the JSON object starting at the first `{`.
///
/// Key order is the order of declaration in the response, not alphabetical.
///
/// # Errors
///
/// Returns [`Error::Decode`] if there is no `{`, the text from there on is not
/// a single JSON object, the object is empty, or its first value is not a string.
pub fn extract_first_value(text: &str) -> Result<String> {
    let start = text
        .find('{')
        .ok_or_else(|| Error::decode("response contains no JSON object"))?;

    let value: Value = serde_json::from_str(&text[start..])
        .map_err(|e| Error::decode(format!("invalid JSON object: {e}")))?;

    let Value::Object(map) = value else {
        return Err(Error::decode("response is not a JSON object"));
    };

    let (key, first) = map
        .into_iter()
        .next()
        .ok_or_else(|| Error::decode("response object has no keys"))?;

    match first {
        Value::String(s) => {
            debug!("Extracted response text from key '{}'", key);
            Ok(s)
        }
        other => Err(Error::decode(format!(
            "value of key '{key}' is not text (found {})",
            json_type_name(&other)
        ))),
    }
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
