use crate::request::{brief_key, serp_key, suggestions_key, KeywordRequest};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use keyscout_cache::{CacheManager, CacheStatsSnapshot};
use keyscout_core::{
    BriefDocument, CachePayload, CandidateGenerator, EnrichmentProvider, GenerationRequest,
    KeywordBatch, KeywordCandidate, KeyscoutError, OperationClass, RawCandidate, Result,
    ScoreSource, SerpEntry, SerpResult, Settings, SuggestionSet,
};
use keyscout_limiter::{RateLimiter, UsageReport};
use keyscout_scoring::{serp_difficulty, IntentClassifier, OpportunityScorer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Whether a response was served from cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Hit,
    Miss,
}

/// Scored candidate batch returned to the caller. `source` tells the UI
/// whether difficulty was enrichment-verified or heuristic-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordResponse {
    pub candidates: Vec<KeywordCandidate>,
    pub source: ScoreSource,
    pub cache_status: CacheStatus,
}

/// The engine façade: rate limiting, caching, upstream coordination and
/// scoring behind one service object. All collaborators are injected, so
/// tests wire in-memory fakes without touching global state.
pub struct KeywordEngine {
    cache: Arc<CacheManager>,
    limiter: Arc<RateLimiter>,
    generator: Arc<dyn CandidateGenerator>,
    enrichment: Arc<dyn EnrichmentProvider>,
    scorer: OpportunityScorer,
    intents: IntentClassifier,
    settings: Settings,
}

impl KeywordEngine {
    pub fn new(
        cache: Arc<CacheManager>,
        limiter: Arc<RateLimiter>,
        generator: Arc<dyn CandidateGenerator>,
        enrichment: Arc<dyn EnrichmentProvider>,
        settings: Settings,
    ) -> Self {
        Self {
            cache,
            limiter,
            scorer: OpportunityScorer::new(settings.scoring.clone()),
            intents: IntentClassifier::new(&settings.intent),
            generator,
            enrichment,
            settings,
        }
    }

    /// Engine over in-memory tiers, wired from `settings` alone.
    pub fn in_memory(
        generator: Arc<dyn CandidateGenerator>,
        enrichment: Arc<dyn EnrichmentProvider>,
        settings: Settings,
    ) -> Self {
        let cache = Arc::new(CacheManager::in_memory(settings.ttl.clone()));
        let limiter = Arc::new(RateLimiter::new(settings.quotas.clone()));
        Self::new(cache, limiter, generator, enrichment, settings)
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// Start the periodic expired-entry sweep at the configured interval.
    /// Must be called from within a tokio runtime.
    pub fn start_background_sweep(&self) -> tokio::task::JoinHandle<()> {
        self.cache.spawn_sweeper(self.settings.cache.sweep_interval())
    }

    /// Generate, score and cache keyword candidates for a request.
    ///
    /// Admission runs before any upstream work; a quota rejection never
    /// triggers generation. Concurrent identical requests share one
    /// generator call through the cache's single-flight path.
    pub async fn score_and_cache_keywords(
        &self,
        request: &KeywordRequest,
    ) -> Result<KeywordResponse> {
        request.validate()?;

        let decision = self.limiter.admit(
            &request.user_id,
            request.plan,
            OperationClass::KeywordGeneration,
        );
        if !decision.allowed {
            debug!(
                "rejecting keyword generation for {}: quota resets at {}",
                request.user_id, decision.reset_at
            );
            return Err(KeyscoutError::RateLimited {
                reset_at: decision.reset_at,
            });
        }

        let batch_key = request.cache_key();
        if let Some(CachePayload::KeywordBatch(batch)) = self.cache.get(&batch_key).await? {
            debug!("serving {} from cache", batch_key);
            return Ok(respond(batch, CacheStatus::Hit));
        }

        let payload = self
            .cache
            .get_or_generate(&batch_key, Vec::new(), || {
                self.generate_batch(request, &batch_key)
            })
            .await?;

        match payload {
            CachePayload::KeywordBatch(batch) => Ok(respond(batch, CacheStatus::Miss)),
            other => Err(KeyscoutError::CacheCorruption(format!(
                "unexpected {} payload under {}",
                other.data_type(),
                batch_key
            ))),
        }
    }

    /// Drop the cached batch for this request identity together with
    /// everything derived from it (live results, briefs, suggestions).
    pub async fn invalidate_keyword(&self, request: &KeywordRequest) -> Result<Vec<String>> {
        request.validate()?;
        let removed = self.cache.invalidate(&request.cache_key()).await?;
        if !removed.is_empty() {
            info!(
                "keyword edit invalidated {} entries for topic {:?}",
                removed.len(),
                request.topic
            );
        }
        Ok(removed)
    }

    /// Persist an externally drafted brief for a target keyword, metered
    /// under the brief-generation quota and linked to the keyword stage.
    pub async fn store_brief(
        &self,
        request: &KeywordRequest,
        target_keyword: &str,
        markdown: String,
    ) -> Result<String> {
        request.validate()?;
        let decision = self.limiter.admit(
            &request.user_id,
            request.plan,
            OperationClass::BriefGeneration,
        );
        if !decision.allowed {
            return Err(KeyscoutError::RateLimited {
                reset_at: decision.reset_at,
            });
        }

        let key = brief_key(target_keyword, &request.region, &request.language);
        let payload = CachePayload::BriefDocument(BriefDocument {
            target_keyword: target_keyword.to_string(),
            markdown,
        });
        self.cache
            .set(&key, payload, vec![request.cache_key()])
            .await?;
        Ok(key)
    }

    pub async fn get_brief(
        &self,
        target_keyword: &str,
        region: &str,
        language: &str,
    ) -> Result<Option<BriefDocument>> {
        let key = brief_key(target_keyword, region, language);
        match self.cache.get(&key).await? {
            Some(CachePayload::BriefDocument(brief)) => Ok(Some(brief)),
            _ => Ok(None),
        }
    }

    /// Persist related-keyword suggestions for a target keyword.
    pub async fn store_suggestions(
        &self,
        request: &KeywordRequest,
        target_keyword: &str,
        suggestions: Vec<String>,
    ) -> Result<String> {
        request.validate()?;
        let decision =
            self.limiter
                .admit(&request.user_id, request.plan, OperationClass::Suggestions);
        if !decision.allowed {
            return Err(KeyscoutError::RateLimited {
                reset_at: decision.reset_at,
            });
        }

        let key = suggestions_key(target_keyword, &request.region, &request.language);
        let payload = CachePayload::SuggestionSet(SuggestionSet {
            target_keyword: target_keyword.to_string(),
            suggestions,
        });
        self.cache
            .set(&key, payload, vec![request.cache_key()])
            .await?;
        Ok(key)
    }

    pub fn get_usage(&self, user_id: &str, plan: keyscout_core::Plan) -> HashMap<OperationClass, UsageReport> {
        self.limiter.usage(user_id, plan)
    }

    pub async fn get_cache_stats(&self) -> Result<CacheStatsSnapshot> {
        self.cache.stats().await
    }

    async fn generate_batch(
        &self,
        request: &KeywordRequest,
        batch_key: &str,
    ) -> Result<CachePayload> {
        let generation = request.generation_request();
        let mut raws = self.generate_with_retry(&generation).await?;
        raws.truncate(request.max_candidates);
        info!(
            "generator proposed {} candidates for {:?}",
            raws.len(),
            request.topic
        );

        let candidates: Vec<KeywordCandidate> = stream::iter(raws)
            .map(|raw| self.score_one(request, raw, batch_key))
            .buffered(self.settings.upstream.enrichment_concurrency.max(1))
            .collect()
            .await;

        Ok(CachePayload::KeywordBatch(KeywordBatch {
            topic: generation.topic,
            region: request.region.clone(),
            language: request.language.clone(),
            candidates,
        }))
    }

    async fn generate_with_retry(&self, request: &GenerationRequest) -> Result<Vec<RawCandidate>> {
        let attempts = self.settings.upstream.max_retries + 1;
        let mut backoff = self.settings.upstream.retry_backoff();
        let mut last_error = None;

        for attempt in 1..=attempts {
            match timeout(
                self.settings.upstream.generator_timeout(),
                self.generator.generate(request),
            )
            .await
            {
                Ok(Ok(candidates)) => return Ok(candidates),
                Ok(Err(e)) => {
                    warn!("generator attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = Some(e);
                }
                Err(_) => {
                    warn!("generator attempt {}/{} timed out", attempt, attempts);
                    last_error = Some(KeyscoutError::UpstreamTimeout(format!(
                        "candidate generator exceeded {}ms",
                        self.settings.upstream.generator_timeout_ms
                    )));
                }
            }
            if attempt < attempts {
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }

        Err(last_error
            .unwrap_or_else(|| KeyscoutError::Upstream("candidate generator failed".into())))
    }

    async fn score_one(
        &self,
        request: &KeywordRequest,
        raw: RawCandidate,
        batch_key: &str,
    ) -> KeywordCandidate {
        let serp_entries = if request.enrich {
            self.fetch_serp(&raw.text, request, batch_key).await
        } else {
            None
        };

        let difficulty = serp_entries
            .as_deref()
            .map(|entries| serp_difficulty(&raw.text, entries));
        let breakdown = self.scorer.score(&raw, difficulty, request.difficulty_mode);
        let intent = match serp_entries.as_deref() {
            Some(entries) => self.intents.classify_with_serp(&raw.text, entries),
            None => self.intents.classify(&raw.text),
        };

        KeywordCandidate {
            volume: raw.volume.unwrap_or(0),
            cpc: raw.cpc.unwrap_or(0.0),
            competition: raw.competition.unwrap_or(1.0).clamp(0.0, 1.0),
            text: raw.text,
            enrichment_difficulty: difficulty,
            intent,
            opportunity_score: breakdown.opportunity_score,
            is_quick_win: breakdown.is_quick_win,
            source: breakdown.source,
        }
    }

    /// Live results for one keyword: cache first, then a quota-metered,
    /// timeout-bounded provider call. Every failure path returns `None`,
    /// which the caller treats as "score heuristically".
    async fn fetch_serp(
        &self,
        keyword: &str,
        request: &KeywordRequest,
        batch_key: &str,
    ) -> Option<Vec<SerpEntry>> {
        let key = serp_key(keyword, &request.region, &request.language);
        match self.cache.get(&key).await {
            Ok(Some(CachePayload::SerpResult(serp))) => return Some(serp.entries),
            Ok(_) => {}
            Err(e) => warn!("serp cache lookup failed for {}: {}", keyword, e),
        }

        let decision =
            self.limiter
                .admit(&request.user_id, request.plan, OperationClass::SerpLookup);
        if !decision.allowed {
            debug!(
                "serp quota exhausted for {}, scoring {} heuristically",
                request.user_id, keyword
            );
            return None;
        }

        match timeout(
            self.settings.upstream.enrichment_timeout(),
            self.enrichment
                .top_results(keyword, &request.region, &request.language),
        )
        .await
        {
            Ok(Ok(entries)) => {
                let payload = CachePayload::SerpResult(SerpResult {
                    keyword: keyword.to_string(),
                    entries: entries.clone(),
                    fetched_at: Utc::now(),
                });
                if let Err(e) = self
                    .cache
                    .set(&key, payload, vec![batch_key.to_string()])
                    .await
                {
                    warn!("could not cache serp results for {}: {}", keyword, e);
                }
                Some(entries)
            }
            Ok(Err(e)) => {
                warn!("enrichment failed for {}: {}", keyword, e);
                None
            }
            Err(_) => {
                warn!(
                    "enrichment timed out for {} after {}ms",
                    keyword, self.settings.upstream.enrichment_timeout_ms
                );
                None
            }
        }
    }
}

fn respond(batch: KeywordBatch, cache_status: CacheStatus) -> KeywordResponse {
    let enriched = !batch.candidates.is_empty()
        && batch
            .candidates
            .iter()
            .all(|c| c.source == ScoreSource::EnrichmentEnhanced);
    KeywordResponse {
        source: if enriched {
            ScoreSource::EnrichmentEnhanced
        } else {
            ScoreSource::Heuristic
        },
        candidates: batch.candidates,
        cache_status,
    }
}
