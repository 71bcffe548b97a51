use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::recognizer::RecognizerError;
use crate::field::{Field, SpanSource};

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Recognizer(#[from] RecognizerError),
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// A candidate value for one field, located in the document text.
///
/// `start` and `end` are character offsets into the cleaned document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSpan {
    pub field: Field,
    pub text: String,
    pub source: SpanSource,
    pub confidence: f64,
    pub start: usize,
    pub end: usize,
}

impl RawSpan {
    #[must_use]
    pub fn new(field: Field, text: impl Into<String>, source: SpanSource, confidence: f64) -> Self {
        Self {
            field,
            text: text.into(),
            source,
            confidence,
            start: 0,
            end: 0,
        }
    }

    #[must_use]
    pub fn at(mut self, start: usize, end: usize) -> Self {
        self.start = start;
        self.end = end;
        self
    }
}

/// A source of candidate spans. The engine runs every extractor it holds over
/// the same cleaned text and merges their output.
#[async_trait::async_trait]
pub trait Extractor: Send + Sync {
    fn source(&self) -> SpanSource;

    async fn extract(&self, text: &str) -> ExtractionResult<Vec<RawSpan>>;
}
