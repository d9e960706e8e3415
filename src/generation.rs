//! # Generation Module
//!
//! Prompt validation and the image generator seam. No inference backend is
//! wired in; [`PlaceholderGenerator`] simulates latency and hands back a
//! placeholder reference so the bot flow can be exercised end to end.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

pub const MIN_PROMPT_CHARS: usize = 5;
pub const MAX_PROMPT_CHARS: usize = 500;

/// Display name used for prompts picked from the trending list
pub const TRENDING_CATEGORY_NAME: &str = "Trending";
/// Display name used when a category id no longer resolves
pub const UNKNOWN_CATEGORY_NAME: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRejection {
    TooShort,
    TooLong,
}

impl PromptRejection {
    pub fn message_key(&self) -> &'static str {
        match self {
            PromptRejection::TooShort => "prompt-too-short",
            PromptRejection::TooLong => "prompt-too-long",
        }
    }
}

/// Trim the prompt and check its length in characters
pub fn validate_prompt(input: &str) -> Result<&str, PromptRejection> {
    let prompt = input.trim();
    let len = prompt.chars().count();

    if len < MIN_PROMPT_CHARS {
        return Err(PromptRejection::TooShort);
    }
    if len > MAX_PROMPT_CHARS {
        return Err(PromptRejection::TooLong);
    }

    Ok(prompt)
}

/// Where a generation request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationCategory {
    Trending,
    Category(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub category: GenerationCategory,
    pub category_name: String,
    pub telegram_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub image_ref: String,
    pub elapsed: Duration,
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("image generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("image generation failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage, GenerationError>;
}

/// Stand-in generator used until a real model is connected
#[derive(Debug, Clone)]
pub struct PlaceholderGenerator {
    simulated_latency: Duration,
}

impl PlaceholderGenerator {
    pub fn new(simulated_latency: Duration) -> Self {
        Self { simulated_latency }
    }
}

impl Default for PlaceholderGenerator {
    fn default() -> Self {
        Self::new(Duration::from_millis(crate::config::DEFAULT_GENERATION_LATENCY_MS))
    }
}

#[async_trait]
impl ImageGenerator for PlaceholderGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage, GenerationError> {
        let started = Instant::now();
        debug!(
            user_id = request.telegram_id,
            category = %request.category_name,
            "Simulating image generation"
        );

        tokio::time::sleep(self.simulated_latency).await;

        Ok(GeneratedImage {
            image_ref: format!("placeholder://{}", Uuid::new_v4()),
            elapsed: started.elapsed(),
        })
    }
}

/// Run a generator with an upper bound on how long it may take
pub async fn generate_with_timeout(
    generator: &dyn ImageGenerator,
    request: &GenerationRequest,
    limit: Duration,
) -> Result<GeneratedImage, GenerationError> {
    tokio::time::timeout(limit, generator.generate(request))
        .await
        .map_err(|_| GenerationError::Timeout(limit))?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str) -> GenerationRequest {
        GenerationRequest {
            prompt: prompt.to_string(),
            category: GenerationCategory::Trending,
            category_name: TRENDING_CATEGORY_NAME.to_string(),
            telegram_id: 1,
        }
    }

    #[test]
    fn test_prompt_length_bounds() {
        assert_eq!(validate_prompt("abcd"), Err(PromptRejection::TooShort));
        assert_eq!(validate_prompt("   abcd   "), Err(PromptRejection::TooShort));
        assert_eq!(validate_prompt(" abcde "), Ok("abcde"));
        assert!(validate_prompt(&"x".repeat(500)).is_ok());
        assert_eq!(
            validate_prompt(&"x".repeat(501)),
            Err(PromptRejection::TooLong)
        );
    }

    #[test]
    fn test_prompt_length_counts_characters_not_bytes() {
        // 5 characters, 15 bytes
        assert!(validate_prompt("日本語の絵").is_ok());
        assert!(validate_prompt(&"é".repeat(500)).is_ok());
    }

    #[tokio::test]
    async fn test_placeholder_returns_reference() {
        let generator = PlaceholderGenerator::new(Duration::from_millis(1));
        let image = generator.generate(&request("a quiet lake")).await.unwrap();

        assert!(image.image_ref.starts_with("placeholder://"));
        assert!(image.elapsed >= Duration::from_millis(1));
    }

    #[tokio::test]
    async fn test_timeout_is_enforced() {
        let generator = PlaceholderGenerator::new(Duration::from_secs(5));
        let err = generate_with_timeout(&generator, &request("a quiet lake"), Duration::from_millis(10))
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::Timeout(_)));
    }
}
