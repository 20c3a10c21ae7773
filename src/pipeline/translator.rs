//! Single-chunk translation engine.
//!
//! One chunk flows: TM exact → TM fuzzy → chunk cache → prompt → provider
//! → validation (retrying low-quality output) → cache writes. The stores
//! sit behind `RefCell` because the pipeline multiplexes tasks on one
//! executor thread; borrows are never held across an await.

use crate::cache::{ChunkCache, chunk_cache_key};
use crate::core::{TranslationChunk, TranslationResult};
use crate::error::{ProviderError, Result};
use crate::glossary::Glossary;
use crate::memory::{TmSegment, TranslationMemory};
use crate::provider::TranslationProvider;
use crate::quality::{Domain, QualityValidator, language_name};
use std::cell::{Cell, RefCell};
use std::sync::Arc;
use std::time::Duration;

/// Engine settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Source language code.
    pub source_lang: String,
    /// Target language code.
    pub target_lang: String,
    /// Validation domain.
    pub domain: Domain,
    /// Pipeline mode tag, part of the chunk-cache key.
    pub mode: String,
    /// Minimum similarity for fuzzy TM reuse.
    pub tm_fuzzy_threshold: f64,
    /// Attempts while the validator scores below the retry bar.
    pub max_retries: usize,
    /// Base delay between low-quality retries, in seconds.
    pub retry_delay_secs: u64,
    /// Producer tag stored in the TM (`provider/model`).
    pub created_by: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            source_lang: "en".to_string(),
            target_lang: "vi".to_string(),
            domain: Domain::Default,
            mode: "standard".to_string(),
            tm_fuzzy_threshold: 0.85,
            max_retries: 5,
            retry_delay_secs: 3,
            created_by: "doctrans".to_string(),
        }
    }
}

/// Counters the engine keeps across a job.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineCounters {
    /// Exact TM hits.
    pub tm_exact: usize,
    /// Fuzzy TM hits.
    pub tm_fuzzy: usize,
    /// Queries that missed the TM entirely.
    pub tm_miss: usize,
    /// Chunk-cache hits.
    pub cache_hits: usize,
    /// Chunk-cache misses.
    pub cache_misses: usize,
}

/// Translates single chunks with caching and validation.
pub struct TranslatorEngine {
    provider: Arc<dyn TranslationProvider>,
    glossary: Option<Glossary>,
    tm: Option<RefCell<TranslationMemory>>,
    chunk_cache: Option<RefCell<ChunkCache>>,
    config: EngineConfig,
    tm_exact: Cell<usize>,
    tm_fuzzy: Cell<usize>,
    tm_miss: Cell<usize>,
    cache_hits: Cell<usize>,
    cache_misses: Cell<usize>,
}

impl std::fmt::Debug for TranslatorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslatorEngine")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TranslatorEngine {
    /// Creates an engine.
    #[must_use]
    pub fn new(
        provider: Arc<dyn TranslationProvider>,
        config: EngineConfig,
        glossary: Option<Glossary>,
        tm: Option<TranslationMemory>,
        chunk_cache: Option<ChunkCache>,
    ) -> Self {
        Self {
            provider,
            glossary,
            tm: tm.map(RefCell::new),
            chunk_cache: chunk_cache.map(RefCell::new),
            config,
            tm_exact: Cell::new(0),
            tm_fuzzy: Cell::new(0),
            tm_miss: Cell::new(0),
            cache_hits: Cell::new(0),
            cache_misses: Cell::new(0),
        }
    }

    /// Snapshot of the lookup counters.
    #[must_use]
    pub fn counters(&self) -> EngineCounters {
        EngineCounters {
            tm_exact: self.tm_exact.get(),
            tm_fuzzy: self.tm_fuzzy.get(),
            tm_miss: self.tm_miss.get(),
            cache_hits: self.cache_hits.get(),
            cache_misses: self.cache_misses.get(),
        }
    }

    /// Total cache hits (TM plus chunk cache).
    #[must_use]
    pub fn cache_hit_total(&self) -> usize {
        self.tm_exact.get() + self.tm_fuzzy.get() + self.cache_hits.get()
    }

    /// Builds the system prompt for a chunk.
    #[must_use]
    pub fn build_prompt(&self, chunk: &TranslationChunk) -> String {
        let source_name = language_name(&self.config.source_lang);
        let target_name = language_name(&self.config.target_lang);

        let mut parts = vec![
            "You are an expert translator with 20 years of experience.".to_string(),
            format!("Translate the following text from {source_name} to {target_name}."),
            String::new(),
            "IMPORTANT REQUIREMENTS:".to_string(),
            "1. Translate ALL content, do not omit anything".to_string(),
            "2. Preserve meaning and tone".to_string(),
            "3. Natural, fluent style - not machine translation".to_string(),
            "4. Preserve formatting (line breaks, bullet points, etc.)".to_string(),
            "5. Proper nouns: transcribe or keep original as appropriate".to_string(),
            String::new(),
        ];

        if let Some(glossary) = &self.glossary {
            let section = glossary.prompt_section();
            if !section.is_empty() {
                parts.push(section);
                parts.push(String::new());
            }
        }

        if !chunk.context_before.is_empty() || !chunk.context_after.is_empty() {
            parts.push("=".repeat(50));
            parts.push("CONTEXT (DO NOT TRANSLATE - for reference only):".to_string());
            parts.push(
                "Use this context to maintain consistency in terminology and tone.".to_string(),
            );
            parts.push("DO NOT include this context in your translation output.".to_string());
            parts.push("-".repeat(50));
            if !chunk.context_before.is_empty() {
                parts.push(format!("[Previous paragraph]: ...{}", chunk.context_before));
            }
            if !chunk.context_after.is_empty() {
                parts.push(format!("[Next paragraph]: {}...", chunk.context_after));
            }
            parts.push("=".repeat(50));
            parts.push(String::new());
        }

        parts.push(format!("TEXT TO TRANSLATE ({source_name}):"));
        parts.push("---START---".to_string());
        parts.push(chunk.text.clone());
        parts.push("---END---".to_string());
        parts.push(String::new());
        parts.push("IMPORTANT: Translate ONLY the text between ---START--- and ---END---.".to_string());
        parts.push(format!(
            "Output the {target_name} translation only. No explanations, no context."
        ));

        parts.join("\n")
    }

    /// Translates one chunk.
    ///
    /// Cache tiers are consulted in priority order; on a full miss the
    /// provider is called and the result validated, retrying while the
    /// score stays below 0.5. Provider errors propagate to the dispatcher,
    /// which owns transport-level retry.
    ///
    /// # Errors
    ///
    /// Returns provider or storage errors; low quality never errors.
    pub async fn translate_chunk(&self, chunk: &TranslationChunk) -> Result<TranslationResult> {
        // 1. Translation memory, exact then fuzzy.
        if let Some(tm) = &self.tm {
            let exact = tm
                .borrow_mut()
                .exact_match(&chunk.text, &self.config.source_lang, &self.config.target_lang)?;
            if let Some(hit) = exact {
                self.tm_exact.set(self.tm_exact.get() + 1);
                let mut result =
                    TranslationResult::new(chunk.id, chunk.text.clone(), hit.segment.target);
                result.quality_score = hit.segment.quality_score;
                result.overlap_char_count = chunk.overlap_char_count;
                result.warnings.push("TM exact match (100%)".to_string());
                return Ok(result);
            }

            let fuzzy = tm.borrow().fuzzy_match(
                &chunk.text,
                &self.config.source_lang,
                &self.config.target_lang,
                self.config.tm_fuzzy_threshold,
                1,
                None,
            )?;
            if let Some(hit) = fuzzy.into_iter().next() {
                self.tm_fuzzy.set(self.tm_fuzzy.get() + 1);
                let mut result =
                    TranslationResult::new(chunk.id, chunk.text.clone(), hit.segment.target);
                result.quality_score = hit.segment.quality_score * hit.similarity;
                result.overlap_char_count = chunk.overlap_char_count;
                result
                    .warnings
                    .push(format!("TM fuzzy match ({:.1}%)", hit.similarity * 100.0));
                return Ok(result);
            }

            self.tm_miss.set(self.tm_miss.get() + 1);
        }

        // 2. Content-addressed chunk cache.
        let cache_key = chunk_cache_key(
            &chunk.text,
            &self.config.source_lang,
            &self.config.target_lang,
            &self.config.mode,
            self.config.domain.name(),
        );
        if let Some(cache) = &self.chunk_cache {
            if let Some(cached) = cache.borrow().get(&cache_key)? {
                self.cache_hits.set(self.cache_hits.get() + 1);
                let mut result = TranslationResult::new(chunk.id, chunk.text.clone(), cached);
                result.quality_score = 1.0;
                result.overlap_char_count = chunk.overlap_char_count;
                return Ok(result);
            }
            self.cache_misses.set(self.cache_misses.get() + 1);
        }

        // 3. Provider round trips with quality gating.
        let prompt = self.build_prompt(chunk);
        let mut attempt = 1usize;
        loop {
            let translated = self.provider.translate(&prompt, &chunk.text).await?;
            if translated.trim().is_empty() {
                return Err(ProviderError::EmptyResponse.into());
            }

            let mut result =
                TranslationResult::new(chunk.id, chunk.text.clone(), translated.clone());
            result.overlap_char_count = chunk.overlap_char_count;

            let report = QualityValidator::validate(
                &chunk.text,
                &translated,
                self.glossary.as_ref(),
                self.config.domain,
                &self.config.source_lang,
                &self.config.target_lang,
            );
            result.quality_score = report.quality_score;
            result.warnings = report.warnings;

            if result.quality_score < 0.5 && attempt < self.config.max_retries {
                tracing::warn!(
                    chunk_id = chunk.id,
                    score = result.quality_score,
                    attempt,
                    "low quality translation, retrying"
                );
                attempt += 1;
                tokio::time::sleep(Duration::from_secs(self.config.retry_delay_secs)).await;
                continue;
            }

            if result.is_cacheable() {
                self.store_result(chunk, &result, &cache_key)?;
            }

            return Ok(result);
        }
    }

    /// Writes an accepted result into the chunk cache and the TM.
    fn store_result(
        &self,
        chunk: &TranslationChunk,
        result: &TranslationResult,
        cache_key: &str,
    ) -> Result<()> {
        if let Some(cache) = &self.chunk_cache {
            cache.borrow_mut().put(
                cache_key,
                &result.translated,
                &self.config.source_lang,
                &self.config.target_lang,
                &self.config.mode,
            )?;
        }

        if let Some(tm) = &self.tm {
            let mut segment = TmSegment::new(
                chunk.text.clone(),
                result.translated.clone(),
                self.config.source_lang.clone(),
                self.config.target_lang.clone(),
            );
            segment.domain = self.config.domain.name().to_string();
            segment.quality_score = result.quality_score;
            segment.context_before = chunk.context_before.clone();
            segment.context_after = chunk.context_after.clone();
            segment.created_by = self.config.created_by.clone();
            tm.borrow_mut().add_segment(&segment)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock provider that prefixes the source with `TR: `.
    struct PrefixProvider {
        calls: AtomicUsize,
    }

    impl PrefixProvider {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TranslationProvider for PrefixProvider {
        fn name(&self) -> &'static str {
            "mock-prefix"
        }

        async fn translate(&self, _system: &str, user: &str) -> std::result::Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("TR: {user}"))
        }
    }

    /// Mock provider with scripted responses.
    struct ScriptedProvider {
        responses: Mutex<Vec<std::result::Result<String, ProviderError>>>,
    }

    #[async_trait]
    impl TranslationProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "mock-scripted"
        }

        async fn translate(&self, _system: &str, _user: &str) -> std::result::Result<String, ProviderError> {
            let mut responses = self
                .responses
                .lock()
                .map_err(|e| ProviderError::Transport(e.to_string()))?;
            if responses.is_empty() {
                Err(ProviderError::Transport("script exhausted".to_string()))
            } else {
                responses.remove(0)
            }
        }
    }

    fn engine_with(provider: Arc<dyn TranslationProvider>, config: EngineConfig) -> TranslatorEngine {
        let tm = TranslationMemory::in_memory().ok();
        let cache = ChunkCache::in_memory().ok();
        TranslatorEngine::new(provider, config, None, tm, cache)
    }

    fn en_en_config() -> EngineConfig {
        // English mock output against English-language checks keeps the
        // validator scores high without a real translation.
        EngineConfig {
            target_lang: "en".to_string(),
            retry_delay_secs: 0,
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_provider_called_on_miss_then_cached() {
        let provider = Arc::new(PrefixProvider::new());
        let engine = engine_with(provider.clone(), en_en_config());
        let chunk = TranslationChunk::new(1, "The quick brown fox jumps over the lazy dog.".to_string());

        let first = engine.translate_chunk(&chunk).await;
        assert!(first.is_ok());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        if let Ok(first) = &first {
            assert!(first.translated.starts_with("TR: "));
            assert!(first.quality_score >= 0.7, "score {}", first.quality_score);
        }

        // Second identical chunk is served from the TM, not the provider.
        let second = engine.translate_chunk(&chunk).await;
        assert!(second.is_ok());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.counters().tm_exact, 1);
    }

    #[tokio::test]
    async fn test_overlap_count_propagated() {
        let provider = Arc::new(PrefixProvider::new());
        let engine = engine_with(provider, en_en_config());
        let mut chunk = TranslationChunk::new(2, "The cat is on the mat and stays there.".to_string());
        chunk.overlap_char_count = 17;

        let result = engine.translate_chunk(&chunk).await;
        assert_eq!(result.map(|r| r.overlap_char_count).unwrap_or(0), 17);
    }

    #[tokio::test]
    async fn test_low_quality_retries_then_accepts_good_attempt() {
        // Junk output scores below 0.5; the engine retries until a real
        // Vietnamese rendition arrives.
        let provider = Arc::new(ScriptedProvider {
            responses: Mutex::new(vec![
                Ok("xxx".to_string()),
                Ok("xxx".to_string()),
                Ok("Câu một của tôi ở đây. Câu hai của tôi ở đây. Câu ba của tôi ở đây. \
                    Câu bốn của tôi ở đây. Câu năm của tôi ở đây."
                    .to_string()),
            ]),
        });
        let config = EngineConfig {
            max_retries: 5,
            retry_delay_secs: 0,
            ..EngineConfig::default()
        };
        let engine = engine_with(provider, config);
        let chunk = TranslationChunk::new(
            3,
            "One sentence here. Two sentences here. Three sentences here. \
             Four sentences here. Five sentences here."
                .to_string(),
        );

        let result = engine.translate_chunk(&chunk).await;
        assert!(result.is_ok());
        if let Ok(result) = result {
            assert!(result.translated.contains("Câu một"));
            assert!(result.quality_score >= 0.5, "score {}", result.quality_score);
        }
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let provider = Arc::new(ScriptedProvider {
            responses: Mutex::new(vec![Err(ProviderError::RateLimited)]),
        });
        let engine = engine_with(provider, en_en_config());
        let chunk = TranslationChunk::new(4, "Some text to translate here.".to_string());

        let result = engine.translate_chunk(&chunk).await;
        assert!(matches!(
            result,
            Err(crate::error::Error::Provider(ProviderError::RateLimited))
        ));
    }

    #[tokio::test]
    async fn test_quality_gate_blocks_cache_write() {
        let provider = Arc::new(ScriptedProvider {
            responses: Mutex::new(vec![Ok("zz".to_string())]),
        });
        let config = EngineConfig {
            max_retries: 1,
            retry_delay_secs: 0,
            ..EngineConfig::default()
        };
        let engine = engine_with(provider, config);
        let chunk = TranslationChunk::new(
            5,
            "One sentence here. Two sentences here. Three sentences here. \
             Four sentences here. Five sentences here."
                .to_string(),
        );

        let result = engine.translate_chunk(&chunk).await;
        assert!(result.is_ok());
        if let Ok(result) = &result {
            assert!(result.quality_score < 0.7);
        }
        // Nothing reached the chunk cache.
        if let Some(cache) = &engine.chunk_cache {
            assert_eq!(cache.borrow().len().unwrap_or(99), 0);
        }
    }

    #[tokio::test]
    async fn test_fuzzy_hit_scales_quality() {
        let provider = Arc::new(PrefixProvider::new());
        let mut tm = match TranslationMemory::in_memory() {
            Ok(tm) => tm,
            Err(_) => return,
        };
        let mut segment = TmSegment::new(
            "The quick brown fox jumps over the lazy dog",
            "Con cáo nâu nhanh nhẹn nhảy qua con chó lười",
            "en",
            "vi",
        );
        segment.quality_score = 0.9;
        let _ = tm.add_segment(&segment);

        let config = EngineConfig {
            tm_fuzzy_threshold: 0.7,
            ..EngineConfig::default()
        };
        let engine = TranslatorEngine::new(provider.clone(), config, None, Some(tm), None);
        let chunk = TranslationChunk::new(
            6,
            "The quick brown fox jumps over the lazy dog!".to_string(),
        );

        let result = engine.translate_chunk(&chunk).await;
        assert!(result.is_ok());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0, "fuzzy hit skips provider");
        if let Ok(result) = result {
            assert!(result.quality_score < 0.9);
            assert!(result.warnings.iter().any(|w| w.contains("fuzzy")));
        }
        assert_eq!(engine.counters().tm_fuzzy, 1);
    }

    #[test]
    fn test_prompt_contains_markers_and_context() {
        let provider = Arc::new(PrefixProvider::new());
        let engine = TranslatorEngine::new(
            provider,
            EngineConfig::default(),
            None,
            None,
            None,
        );
        let mut chunk = TranslationChunk::new(7, "Body text.".to_string());
        chunk.context_before = "Earlier text.".to_string();
        chunk.context_after = "Later text.".to_string();

        let prompt = engine.build_prompt(&chunk);
        assert!(prompt.contains("---START---"));
        assert!(prompt.contains("---END---"));
        assert!(prompt.contains("DO NOT TRANSLATE"));
        assert!(prompt.contains("[Previous paragraph]: ...Earlier text."));
        assert!(prompt.contains("[Next paragraph]: Later text...."));
        assert!(prompt.contains("English to Vietnamese"));
    }

    #[test]
    fn test_prompt_includes_glossary() {
        let provider = Arc::new(PrefixProvider::new());
        let mut glossary = Glossary::new(Domain::Technology);
        glossary.add_term("cache", "bộ nhớ đệm");
        let engine = TranslatorEngine::new(
            provider,
            EngineConfig::default(),
            Some(glossary),
            None,
            None,
        );
        let chunk = TranslationChunk::new(8, "Flush the cache.".to_string());

        let prompt = engine.build_prompt(&chunk);
        assert!(prompt.contains("MANDATORY TERMINOLOGY:"));
        assert!(prompt.contains("cache → bộ nhớ đệm"));
    }
}
