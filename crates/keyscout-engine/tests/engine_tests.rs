use async_trait::async_trait;
use keyscout_engine::{CacheStatus, KeywordEngine, KeywordRequest};
use keyscout_core::{
    CandidateGenerator, DifficultyMode, EnrichmentProvider, GenerationRequest, KeyscoutError,
    OpQuota, OperationClass, Plan, PlanQuotas, QuotaConfig, RawCandidate, Result, ScoreSource,
    SerpEntry, Settings,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct MockGenerator {
    calls: AtomicUsize,
    fail: bool,
    delay: Duration,
}

impl MockGenerator {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
            delay: Duration::ZERO,
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CandidateGenerator for MockGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<RawCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(KeyscoutError::Upstream("generator offline".into()));
        }
        Ok(vec![
            RawCandidate {
                text: format!("{} pricing", request.topic),
                volume: Some(8_000),
                cpc: Some(3.1),
                competition: Some(0.3),
            },
            RawCandidate {
                text: format!("best {}", request.topic),
                volume: Some(20_000),
                cpc: Some(2.4),
                competition: Some(0.55),
            },
            RawCandidate {
                text: format!("how to choose {}", request.topic),
                volume: None,
                cpc: None,
                competition: None,
            },
        ])
    }
}

enum EnrichmentMode {
    Normal,
    Slow(Duration),
    Failing,
}

struct MockEnrichment {
    calls: AtomicUsize,
    mode: EnrichmentMode,
}

impl MockEnrichment {
    fn new(mode: EnrichmentMode) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            mode,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EnrichmentProvider for MockEnrichment {
    async fn top_results(
        &self,
        keyword: &str,
        _region: &str,
        _language: &str,
    ) -> Result<Vec<SerpEntry>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            EnrichmentMode::Failing => {
                return Err(KeyscoutError::Upstream("serp provider down".into()))
            }
            EnrichmentMode::Slow(delay) => tokio::time::sleep(delay).await,
            EnrichmentMode::Normal => {}
        }
        Ok(vec![
            SerpEntry {
                title: format!("{} review", keyword),
                url: "https://example.com/a".into(),
                snippet: "in-depth look".into(),
                position: 1,
            },
            SerpEntry {
                title: format!("Top 10 {}", keyword),
                url: "https://example.com/b".into(),
                snippet: "ranked list".into(),
                position: 2,
            },
            SerpEntry {
                title: "An unrelated blog post".into(),
                url: "https://example.com/c".into(),
                snippet: "off topic".into(),
                position: 3,
            },
        ])
    }
}

fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.upstream.enrichment_timeout_ms = 50;
    settings.upstream.generator_timeout_ms = 1_000;
    settings.upstream.retry_backoff_ms = 5;
    settings
}

fn request(topic: &str) -> KeywordRequest {
    KeywordRequest {
        user_id: "u1".into(),
        plan: Plan::Pro,
        topic: topic.into(),
        business_context: None,
        region: "us".into(),
        language: "en".into(),
        difficulty_mode: DifficultyMode::Medium,
        max_candidates: 20,
        enrich: true,
    }
}

fn engine_with(
    generator: Arc<MockGenerator>,
    enrichment: Arc<MockEnrichment>,
    settings: Settings,
) -> KeywordEngine {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    KeywordEngine::in_memory(generator, enrichment, settings)
}

#[tokio::test]
async fn miss_then_hit_with_enrichment() {
    let generator = Arc::new(MockGenerator::new());
    let enrichment = Arc::new(MockEnrichment::new(EnrichmentMode::Normal));
    let engine = engine_with(generator.clone(), enrichment.clone(), test_settings());
    let req = request("crm software");

    let first = engine.score_and_cache_keywords(&req).await.unwrap();
    assert_eq!(first.cache_status, CacheStatus::Miss);
    assert_eq!(first.source, ScoreSource::EnrichmentEnhanced);
    assert_eq!(first.candidates.len(), 3);
    for candidate in &first.candidates {
        assert_eq!(candidate.source, ScoreSource::EnrichmentEnhanced);
        assert!(candidate.enrichment_difficulty.is_some());
    }
    assert_eq!(generator.calls(), 1);
    assert_eq!(enrichment.calls(), 3);

    let second = engine.score_and_cache_keywords(&req).await.unwrap();
    assert_eq!(second.cache_status, CacheStatus::Hit);
    assert_eq!(second.candidates, first.candidates);
    // nothing upstream ran for the cached request
    assert_eq!(generator.calls(), 1);
    assert_eq!(enrichment.calls(), 3);
}

#[tokio::test]
async fn enrichment_timeout_degrades_to_heuristic() {
    let generator = Arc::new(MockGenerator::new());
    let enrichment = Arc::new(MockEnrichment::new(EnrichmentMode::Slow(
        Duration::from_millis(300),
    )));
    let engine = engine_with(generator.clone(), enrichment.clone(), test_settings());

    let response = engine
        .score_and_cache_keywords(&request("email marketing"))
        .await
        .unwrap();

    assert_eq!(response.source, ScoreSource::Heuristic);
    for candidate in &response.candidates {
        assert_eq!(candidate.source, ScoreSource::Heuristic);
        assert!(candidate.enrichment_difficulty.is_none());
        // scores are still produced on the heuristic path
        assert!(candidate.opportunity_score <= 100);
    }
    // the provider was attempted, then abandoned
    assert_eq!(enrichment.calls(), 3);
}

#[tokio::test]
async fn enrichment_error_degrades_to_heuristic() {
    let generator = Arc::new(MockGenerator::new());
    let enrichment = Arc::new(MockEnrichment::new(EnrichmentMode::Failing));
    let engine = engine_with(generator, enrichment, test_settings());

    let response = engine
        .score_and_cache_keywords(&request("standing desk"))
        .await
        .unwrap();
    assert_eq!(response.source, ScoreSource::Heuristic);
    assert_eq!(response.candidates.len(), 3);
}

#[tokio::test]
async fn enrich_false_skips_the_provider() {
    let generator = Arc::new(MockGenerator::new());
    let enrichment = Arc::new(MockEnrichment::new(EnrichmentMode::Normal));
    let engine = engine_with(generator, enrichment.clone(), test_settings());

    let mut req = request("crm software");
    req.enrich = false;
    let response = engine.score_and_cache_keywords(&req).await.unwrap();
    assert_eq!(response.source, ScoreSource::Heuristic);
    assert_eq!(enrichment.calls(), 0);
}

#[tokio::test]
async fn rate_limit_rejects_before_any_upstream_call() {
    let mut settings = test_settings();
    let tight = OpQuota {
        per_minute: 1,
        per_day: 100,
    };
    let quotas = PlanQuotas {
        keyword_generation: tight,
        serp_lookup: OpQuota {
            per_minute: 100,
            per_day: 1_000,
        },
        brief_generation: tight,
        suggestions: tight,
    };
    settings.quotas = QuotaConfig {
        free: quotas,
        starter: quotas,
        pro: quotas,
        agency: quotas,
    };

    let generator = Arc::new(MockGenerator::new());
    let enrichment = Arc::new(MockEnrichment::new(EnrichmentMode::Normal));
    let engine = engine_with(generator.clone(), enrichment, settings);

    engine
        .score_and_cache_keywords(&request("first topic"))
        .await
        .unwrap();
    let err = engine
        .score_and_cache_keywords(&request("second topic"))
        .await
        .unwrap_err();

    match err {
        KeyscoutError::RateLimited { reset_at } => {
            assert!(reset_at > chrono::Utc::now());
        }
        other => panic!("expected RateLimited, got {}", other),
    }
    // the rejected request never reached the generator
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn invalid_request_is_rejected_without_side_effects() {
    let generator = Arc::new(MockGenerator::new());
    let enrichment = Arc::new(MockEnrichment::new(EnrichmentMode::Normal));
    let engine = engine_with(generator.clone(), enrichment, test_settings());

    let mut req = request("crm software");
    req.topic = "  ".into();
    let err = engine.score_and_cache_keywords(&req).await.unwrap_err();
    assert!(matches!(err, KeyscoutError::Validation(_)));
    assert_eq!(generator.calls(), 0);

    // no quota was consumed either
    let usage = engine.get_usage("u1", Plan::Pro);
    assert_eq!(usage[&OperationClass::KeywordGeneration].used, 0);
}

#[tokio::test]
async fn generator_failure_is_retried_then_propagated() {
    let mut settings = test_settings();
    settings.upstream.max_retries = 1;

    let generator = Arc::new(MockGenerator::failing());
    let enrichment = Arc::new(MockEnrichment::new(EnrichmentMode::Normal));
    let engine = engine_with(generator.clone(), enrichment, settings);

    let err = engine
        .score_and_cache_keywords(&request("doomed topic"))
        .await
        .unwrap_err();
    assert!(matches!(err, KeyscoutError::Upstream(_)));
    assert!(err.is_retryable());
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn concurrent_identical_requests_share_one_generation() {
    let generator = Arc::new(MockGenerator::slow(Duration::from_millis(100)));
    let enrichment = Arc::new(MockEnrichment::new(EnrichmentMode::Normal));
    let engine = Arc::new(engine_with(
        generator.clone(),
        enrichment,
        test_settings(),
    ));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let engine = Arc::clone(&engine);
        let req = request("project management");
        handles.push(tokio::spawn(async move {
            engine.score_and_cache_keywords(&req).await
        }));
    }

    let mut responses = Vec::new();
    for handle in handles {
        responses.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(generator.calls(), 1);
    for response in &responses {
        assert_eq!(response.candidates, responses[0].candidates);
    }
}

#[tokio::test]
async fn keyword_edit_invalidates_derived_entries() {
    let generator = Arc::new(MockGenerator::new());
    let enrichment = Arc::new(MockEnrichment::new(EnrichmentMode::Normal));
    let engine = engine_with(generator.clone(), enrichment, test_settings());
    let req = request("crm software");

    engine.score_and_cache_keywords(&req).await.unwrap();
    engine
        .store_brief(&req, "crm software pricing", "# Brief outline".into())
        .await
        .unwrap();

    // batch + 3 serp entries + 1 brief all hang off the keyword stage
    let removed = engine.invalidate_keyword(&req).await.unwrap();
    assert_eq!(removed.len(), 5);

    // a repeat request regenerates from upstream
    let again = engine.score_and_cache_keywords(&req).await.unwrap();
    assert_eq!(again.cache_status, CacheStatus::Miss);
    assert_eq!(generator.calls(), 2);

    // and invalidating the now-empty identity is a quiet no-op
    engine.invalidate_keyword(&req).await.unwrap();
}

#[tokio::test]
async fn brief_round_trip() {
    let generator = Arc::new(MockGenerator::new());
    let enrichment = Arc::new(MockEnrichment::new(EnrichmentMode::Normal));
    let engine = engine_with(generator, enrichment, test_settings());
    let req = request("crm software");

    engine
        .store_brief(&req, "crm software pricing", "# Outline\n\n- costs".into())
        .await
        .unwrap();
    let brief = engine
        .get_brief("crm software pricing", "us", "en")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(brief.target_keyword, "crm software pricing");
    assert!(brief.markdown.starts_with("# Outline"));

    assert!(engine
        .get_brief("unknown keyword", "us", "en")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn usage_reflects_admitted_operations() {
    let generator = Arc::new(MockGenerator::new());
    let enrichment = Arc::new(MockEnrichment::new(EnrichmentMode::Normal));
    let engine = engine_with(generator, enrichment, test_settings());
    let req = request("crm software");

    engine.score_and_cache_keywords(&req).await.unwrap();
    engine
        .store_suggestions(&req, "crm software", vec!["crm software pricing".into()])
        .await
        .unwrap();

    let usage = engine.get_usage("u1", Plan::Pro);
    assert_eq!(usage[&OperationClass::KeywordGeneration].used, 1);
    assert_eq!(usage[&OperationClass::SerpLookup].used, 3);
    assert_eq!(usage[&OperationClass::Suggestions].used, 1);
    assert_eq!(usage[&OperationClass::BriefGeneration].used, 0);
}

#[tokio::test]
async fn cache_stats_surface_through_the_engine() {
    let generator = Arc::new(MockGenerator::new());
    let enrichment = Arc::new(MockEnrichment::new(EnrichmentMode::Normal));
    let engine = engine_with(generator, enrichment, test_settings());
    let req = request("crm software");

    engine.score_and_cache_keywords(&req).await.unwrap();
    engine.score_and_cache_keywords(&req).await.unwrap();

    let stats = engine.get_cache_stats().await.unwrap();
    assert!(stats.hits >= 1);
    assert!(stats.misses >= 1);
    assert!(stats.entries_by_type.len() >= 2);

    // the background sweep runs cleanly over a live cache
    let sweeper = engine.start_background_sweep();
    tokio::time::sleep(Duration::from_millis(10)).await;
    sweeper.abort();
}
