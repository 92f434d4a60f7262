//! The extraction backend boundary.
//!
//! The coordinator never inspects `method` semantics; the worker only needs
//! something that turns a local input file into a local output file and
//! reports what happened. No PDF parsing, OCR, or tiered-fallback backend is
//! implemented here — that machinery is out of scope. [`PlainTextBackend`]
//! exists only so the rest of the system has something real to drive against
//! end to end.

use std::path::Path;

use async_trait::async_trait;

/// The outcome of one extraction attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionOutcome {
    pub done: bool,
    pub method: String,
    pub char_count: i64,
    pub error: Option<String>,
}

impl ExtractionOutcome {
    pub fn success(method: impl Into<String>, char_count: i64) -> Self {
        Self {
            done: true,
            method: method.into(),
            char_count,
            error: None,
        }
    }

    pub fn empty() -> Self {
        Self::success("empty", 0)
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            done: false,
            method: String::new(),
            char_count: 0,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Convert the file at `input` into text written to `output`.
    async fn extract(&self, input: &Path, output: &Path) -> ExtractionOutcome;
}

/// A minimal backend: copies bytes that already decode as UTF-8 text from
/// `input` to `output` verbatim, tagging the method `"plaintext"`. Anything
/// that doesn't decode, or is empty, is reported as the `"empty"` method with
/// `char_count=0` — success, not failure, per the extraction-exhausted policy.
pub struct PlainTextBackend;

#[async_trait]
impl ExtractionBackend for PlainTextBackend {
    async fn extract(&self, input: &Path, output: &Path) -> ExtractionOutcome {
        let bytes = match tokio::fs::read(input).await {
            Ok(bytes) => bytes,
            Err(err) => return ExtractionOutcome::failure(err.to_string()),
        };
        let text = match String::from_utf8(bytes) {
            Ok(text) if !text.trim().is_empty() => text,
            _ => return ExtractionOutcome::empty(),
        };
        if let Some(parent) = output.parent()
            && let Err(err) = tokio::fs::create_dir_all(parent).await
        {
            return ExtractionOutcome::failure(err.to_string());
        }
        match tokio::fs::write(output, text.as_bytes()).await {
            Ok(()) => ExtractionOutcome::success("plaintext", text.chars().count() as i64),
            Err(err) => ExtractionOutcome::failure(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn extracts_utf8_text_and_counts_chars() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.pdf");
        let output = dir.path().join("out/a.txt");
        tokio::fs::write(&input, "hello world").await.unwrap();

        let outcome = PlainTextBackend.extract(&input, &output).await;
        assert!(outcome.done);
        assert_eq!(outcome.method, "plaintext");
        assert_eq!(outcome.char_count, 11);
        assert_eq!(tokio::fs::read_to_string(&output).await.unwrap(), "hello world");
    }

    #[tokio::test]
    async fn non_utf8_input_is_reported_as_empty_not_failed() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.pdf");
        let output = dir.path().join("a.txt");
        tokio::fs::write(&input, [0xff, 0xfe, 0x00, 0x01]).await.unwrap();

        let outcome = PlainTextBackend.extract(&input, &output).await;
        assert!(outcome.done);
        assert_eq!(outcome.method, "empty");
        assert_eq!(outcome.char_count, 0);
    }

    #[tokio::test]
    async fn missing_input_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("missing.pdf");
        let output = dir.path().join("missing.txt");

        let outcome = PlainTextBackend.extract(&input, &output).await;
        assert!(!outcome.done);
        assert!(outcome.error.is_some());
    }
}
