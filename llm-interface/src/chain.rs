//! Generation fallback chain.
//!
//! Primary provider, then secondary provider, then templates. Whatever
//! happens upstream, callers get non-empty text no longer than they asked for.

use crate::postprocess::{clean_primary_output, effective_cap, enforce_length};
use crate::templates::render_template;
use signalpost_core::{
    normalize_keyword, Cache, CompletionParams, ContentType, ErrorExt, GenerationProvider,
    RandomSource,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const UNCONFIGURED_PLACEHOLDER: &str =
    "Content generation is not configured yet. Add a generation provider API key to enable it.";

const CACHE_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub topic: String,
    pub intent: String,
    pub tone: String,
    pub max_length: usize,
    /// Source text being replied to, if any. Only used in the prompt.
    pub context: Option<String>,
}

impl GenerationRequest {
    pub fn new(topic: impl Into<String>, intent: impl Into<String>, max_length: usize) -> Self {
        Self {
            topic: topic.into(),
            intent: intent.into(),
            tone: "friendly".to_string(),
            max_length,
            context: None,
        }
    }

    pub fn with_tone(mut self, tone: impl Into<String>) -> Self {
        self.tone = tone.into();
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn content_type(&self) -> ContentType {
        ContentType::from_intent(&self.intent)
    }

    pub fn prompt(&self) -> String {
        let content_type = self.content_type();
        let mut prompt = format!(
            "Write a {} social media {} about {}.",
            self.tone, content_type, self.topic
        );
        if let Some(context) = &self.context {
            prompt.push_str(&format!("\nContext: \"{}\"", context));
        }
        prompt.push_str(&format!(
            "\nMaximum length: {} characters.\n{}:",
            effective_cap(self.max_length),
            capitalize(content_type.as_str())
        ));
        prompt
    }

    fn cache_key(&self) -> String {
        format!(
            "gen:{}:{}:{}",
            self.content_type(),
            normalize_keyword(&self.topic),
            self.max_length
        )
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationSource {
    Primary,
    Secondary,
    Template,
    Placeholder,
    Cache,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub text: String,
    pub source: GenerationSource,
}

pub struct GenerationChain {
    primary: Option<Arc<dyn GenerationProvider>>,
    secondary: Option<Arc<dyn GenerationProvider>>,
    random: Arc<dyn RandomSource>,
    cache: Option<Cache>,
}

impl GenerationChain {
    pub fn new(random: Arc<dyn RandomSource>) -> Self {
        Self {
            primary: None,
            secondary: None,
            random,
            cache: None,
        }
    }

    pub fn with_primary(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.primary = Some(provider);
        self
    }

    pub fn with_secondary(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.secondary = Some(provider);
        self
    }

    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn has_providers(&self) -> bool {
        self.primary.is_some() || self.secondary.is_some()
    }

    pub async fn generate(&self, request: &GenerationRequest) -> String {
        self.generate_detailed(request).await.text
    }

    /// Like [`generate`](Self::generate) but also reports which stage produced the text.
    pub async fn generate_detailed(&self, request: &GenerationRequest) -> Generated {
        if !self.has_providers() {
            debug!("No generation provider configured, returning placeholder");
            return Generated {
                text: enforce_length(UNCONFIGURED_PLACEHOLDER, request.max_length),
                source: GenerationSource::Placeholder,
            };
        }

        // Replies are specific to the item being answered and are never reused.
        let cacheable = request.content_type() != ContentType::Reply;
        if cacheable {
            if let Some(cache) = &self.cache {
                if let Some(text) = cache.get_json::<String>(&request.cache_key()).await {
                    debug!("Generation cache hit for {}", request.cache_key());
                    return Generated {
                        text: enforce_length(&text, request.max_length),
                        source: GenerationSource::Cache,
                    };
                }
            }
        }

        let generated = self.run_chain(request).await;

        if cacheable && generated.source != GenerationSource::Template {
            if let Some(cache) = &self.cache {
                cache
                    .set_json(&request.cache_key(), &generated.text, CACHE_TTL)
                    .await;
            }
        }
        generated
    }

    async fn run_chain(&self, request: &GenerationRequest) -> Generated {
        let prompt = request.prompt();
        let params = CompletionParams::for_length(effective_cap(request.max_length));

        if let Some(primary) = &self.primary {
            match primary.complete(&prompt, &params).await {
                Ok(raw) => {
                    // Bad primary output goes straight to templates; the
                    // secondary is only for outright failures.
                    return match clean_primary_output(&raw, request.max_length) {
                        Some(text) => Generated {
                            text,
                            source: GenerationSource::Primary,
                        },
                        None => {
                            info!(
                                "Discarding output from {} (instruction echo or oversized)",
                                primary.name()
                            );
                            self.template(request)
                        }
                    };
                }
                Err(e) => {
                    warn!(
                        "Primary provider {} failed (retryable: {}): {}",
                        primary.name(),
                        e.is_retryable(),
                        e
                    );
                }
            }
        }

        if let Some(secondary) = &self.secondary {
            match secondary.complete(&prompt, &params).await {
                Ok(raw) => {
                    let text = enforce_length(&raw, request.max_length);
                    if !text.is_empty() {
                        return Generated {
                            text,
                            source: GenerationSource::Secondary,
                        };
                    }
                    info!("Secondary provider {} returned empty text", secondary.name());
                }
                Err(e) => {
                    warn!(
                        "Secondary provider {} failed (retryable: {}): {}",
                        secondary.name(),
                        e.is_retryable(),
                        e
                    );
                }
            }
        }

        self.template(request)
    }

    fn template(&self, request: &GenerationRequest) -> Generated {
        let text = render_template(request.content_type(), &request.topic, self.random.as_ref());
        Generated {
            text: enforce_length(&text, request.max_length),
            source: GenerationSource::Template,
        }
    }
}

impl std::fmt::Debug for GenerationChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationChain")
            .field("primary", &self.primary.as_ref().map(|p| p.name().to_string()))
            .field(
                "secondary",
                &self.secondary.as_ref().map(|p| p.name().to_string()),
            )
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use signalpost_core::{CoreError, FastRandom, FixedRandom, GenerationError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedProvider {
        name: &'static str,
        reply: Result<String, ()>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn ok(name: &'static str, text: &str) -> Arc<Self> {
            Arc::new(Self {
                name,
                reply: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                reply: Err(()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerationProvider for ScriptedProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn complete(
            &self,
            _prompt: &str,
            _params: &CompletionParams,
        ) -> Result<String, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone().map_err(|_| {
                GenerationError::ServiceUnavailable {
                    provider: self.name.to_string(),
                }
                .into()
            })
        }
    }

    fn chain() -> GenerationChain {
        GenerationChain::new(Arc::new(FixedRandom::new(0.0, 0)))
    }

    #[tokio::test]
    async fn test_placeholder_without_providers() {
        let out = chain()
            .generate_detailed(&GenerationRequest::new("Bitcoin", "post", 280))
            .await;
        assert_eq!(out.source, GenerationSource::Placeholder);
        assert_eq!(out.text, UNCONFIGURED_PLACEHOLDER);

        let short = chain()
            .generate(&GenerationRequest::new("Bitcoin", "post", 10))
            .await;
        assert!(short.chars().count() <= 10);
    }

    #[tokio::test]
    async fn test_primary_output_is_cleaned() {
        let primary = ScriptedProvider::ok("primary", "Post: \"Bitcoin just broke out 🚀\"");
        let out = chain()
            .with_primary(primary)
            .generate_detailed(&GenerationRequest::new("Bitcoin", "post", 280))
            .await;
        assert_eq!(out.source, GenerationSource::Primary);
        assert_eq!(out.text, "Bitcoin just broke out 🚀");
    }

    #[tokio::test]
    async fn test_instruction_echo_falls_back_to_template() {
        let primary = ScriptedProvider::ok("primary", "Generate a tweet about Bitcoin");
        let secondary = ScriptedProvider::ok("secondary", "should not be used");
        let out = chain()
            .with_primary(primary)
            .with_secondary(secondary.clone())
            .generate_detailed(&GenerationRequest::new("Bitcoin", "tweet", 280))
            .await;

        assert_eq!(out.source, GenerationSource::Template);
        assert!(out.text.contains("Bitcoin"));
        assert!(!out.text.contains("Generate"));
        assert!(out.text.chars().count() <= 280);
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn test_primary_failure_uses_secondary() {
        let primary = ScriptedProvider::failing("primary");
        let secondary = ScriptedProvider::ok("secondary", &"long answer ".repeat(60));
        let out = chain()
            .with_primary(primary.clone())
            .with_secondary(secondary.clone())
            .generate_detailed(&GenerationRequest::new("DeFi", "post", 100))
            .await;

        assert_eq!(out.source, GenerationSource::Secondary);
        assert!(out.text.chars().count() <= 100);
        assert!(out.text.ends_with("..."));
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 1);
    }

    #[tokio::test]
    async fn test_both_providers_failing_uses_template() {
        let out = chain()
            .with_primary(ScriptedProvider::failing("primary"))
            .with_secondary(ScriptedProvider::failing("secondary"))
            .generate_detailed(&GenerationRequest::new("ETH", "meme", 280))
            .await;
        assert_eq!(out.source, GenerationSource::Template);
        assert!(out.text.contains("ETH"));
    }

    #[tokio::test]
    async fn test_secondary_only_configuration() {
        let out = chain()
            .with_secondary(ScriptedProvider::ok("secondary", "gm"))
            .generate_detailed(&GenerationRequest::new("ETH", "post", 280))
            .await;
        assert_eq!(out.source, GenerationSource::Secondary);
        assert_eq!(out.text, "gm");
    }

    #[tokio::test]
    async fn test_output_never_exceeds_requested_length() {
        let outputs = [
            String::new(),
            "   ".to_string(),
            "Write a reply".to_string(),
            "x".repeat(1000),
            "word ".repeat(70),
            "Reply: 'ok'".to_string(),
        ];
        let random: Arc<dyn RandomSource> = Arc::new(FastRandom::with_seed(3));
        for output in outputs.iter() {
            for max_length in [0usize, 1, 5, 20, 100, 280, 500] {
                for intent in ["post", "reply", "thread", "meme"] {
                    let chain = GenerationChain::new(random.clone())
                        .with_primary(ScriptedProvider::ok("primary", output));
                    let text = chain
                        .generate(&GenerationRequest::new("Bitcoin", intent, max_length))
                        .await;
                    assert!(text.chars().count() <= max_length);
                    if max_length >= 20 {
                        assert!(!text.trim().is_empty());
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn test_cache_reuses_posts_but_not_replies() {
        let primary = ScriptedProvider::ok("primary", "Solid day for Solana");
        let chain = chain()
            .with_primary(primary.clone())
            .with_cache(Cache::in_memory());

        let request = GenerationRequest::new("Solana", "post", 280);
        chain.generate(&request).await;
        let second = chain.generate_detailed(&request).await;
        assert_eq!(second.source, GenerationSource::Cache);
        assert_eq!(second.text, "Solid day for Solana");
        assert_eq!(primary.calls(), 1);

        let reply = GenerationRequest::new("Solana", "reply", 280);
        chain.generate(&reply).await;
        chain.generate(&reply).await;
        assert_eq!(primary.calls(), 3);
    }

    #[test]
    fn test_prompt_shape() {
        let prompt = GenerationRequest::new("Bitcoin", "reply", 500)
            .with_tone("witty")
            .with_context("BTC to the moon?")
            .prompt();
        assert!(prompt.starts_with("Write a witty social media reply about Bitcoin."));
        assert!(prompt.contains("Context: \"BTC to the moon?\""));
        assert!(prompt.contains("Maximum length: 280 characters."));
        assert!(prompt.ends_with("Reply:"));
    }
}
