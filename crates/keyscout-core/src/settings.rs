use std::path::Path;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use chrono::Duration;
use config as cfg;
use serde::{Deserialize, Serialize};

use crate::types::{DataType, OperationClass, Plan};

/// Weights and thresholds for the opportunity scorer. All values are
/// operator-tunable; the monotonicity properties the scorer guarantees
/// hold for any configuration with non-negative weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Weight of log-normalized search volume in the base score.
    #[serde(default = "ScoringConfig::default_volume_weight")]
    pub volume_weight: f64,
    /// Weight of the inverted competition term in the base score.
    #[serde(default = "ScoringConfig::default_competition_weight")]
    pub competition_weight: f64,
    /// Volume at which normalized volume saturates at 100.
    #[serde(default = "ScoringConfig::default_volume_cap")]
    pub volume_cap: u64,
    /// Enrichment difficulty below this pivot carries no penalty.
    #[serde(default = "ScoringConfig::default_difficulty_pivot")]
    pub difficulty_pivot: u8,
    /// Penalty per difficulty point above the pivot.
    #[serde(default = "ScoringConfig::default_difficulty_penalty")]
    pub difficulty_penalty: f64,
    /// Minimum opportunity score for a quick-win flag.
    #[serde(default = "ScoringConfig::default_quick_win_min_score")]
    pub quick_win_min_score: u8,
}

impl ScoringConfig {
    fn default_volume_weight() -> f64 {
        0.4
    }
    fn default_competition_weight() -> f64 {
        0.6
    }
    fn default_volume_cap() -> u64 {
        1_000_000
    }
    fn default_difficulty_pivot() -> u8 {
        50
    }
    fn default_difficulty_penalty() -> f64 {
        0.3
    }
    fn default_quick_win_min_score() -> u8 {
        55
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            volume_weight: Self::default_volume_weight(),
            competition_weight: Self::default_competition_weight(),
            volume_cap: Self::default_volume_cap(),
            difficulty_pivot: Self::default_difficulty_pivot(),
            difficulty_penalty: Self::default_difficulty_penalty(),
            quick_win_min_score: Self::default_quick_win_min_score(),
        }
    }
}

/// Intent classifier knobs. `brands` feeds the navigational exact-match
/// rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntentConfig {
    #[serde(default)]
    pub brands: Vec<String>,
}

/// TTL per cached data type, in seconds. Kept as a table so operators can
/// retune without code changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtlConfig {
    #[serde(default = "TtlConfig::default_keywords_secs")]
    pub keywords_secs: i64,
    #[serde(default = "TtlConfig::default_serp_secs")]
    pub serp_secs: i64,
    #[serde(default = "TtlConfig::default_brief_secs")]
    pub brief_secs: i64,
    #[serde(default = "TtlConfig::default_suggestions_secs")]
    pub suggestions_secs: i64,
}

impl TtlConfig {
    fn default_keywords_secs() -> i64 {
        24 * 60 * 60
    }
    fn default_serp_secs() -> i64 {
        12 * 60 * 60
    }
    fn default_brief_secs() -> i64 {
        24 * 60 * 60
    }
    fn default_suggestions_secs() -> i64 {
        48 * 60 * 60
    }

    pub fn ttl(&self, data_type: DataType) -> Duration {
        let secs = match data_type {
            DataType::Keywords => self.keywords_secs,
            DataType::Serp => self.serp_secs,
            DataType::Brief => self.brief_secs,
            DataType::Suggestions => self.suggestions_secs,
        };
        Duration::seconds(secs)
    }
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            keywords_secs: Self::default_keywords_secs(),
            serp_secs: Self::default_serp_secs(),
            brief_secs: Self::default_brief_secs(),
            suggestions_secs: Self::default_suggestions_secs(),
        }
    }
}

/// Limits for one (plan, operation class) pair across both windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpQuota {
    pub per_minute: u32,
    pub per_day: u32,
}

/// Limits for every operation class under one plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlanQuotas {
    pub keyword_generation: OpQuota,
    pub serp_lookup: OpQuota,
    pub brief_generation: OpQuota,
    pub suggestions: OpQuota,
}

impl PlanQuotas {
    pub fn quota(&self, op: OperationClass) -> OpQuota {
        match op {
            OperationClass::KeywordGeneration => self.keyword_generation,
            OperationClass::SerpLookup => self.serp_lookup,
            OperationClass::BriefGeneration => self.brief_generation,
            OperationClass::Suggestions => self.suggestions,
        }
    }
}

/// Quota table, per plan. Defaults give strictly increasing allowances
/// from Free to Agency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    #[serde(default = "QuotaConfig::default_free")]
    pub free: PlanQuotas,
    #[serde(default = "QuotaConfig::default_starter")]
    pub starter: PlanQuotas,
    #[serde(default = "QuotaConfig::default_pro")]
    pub pro: PlanQuotas,
    #[serde(default = "QuotaConfig::default_agency")]
    pub agency: PlanQuotas,
}

impl QuotaConfig {
    fn default_free() -> PlanQuotas {
        PlanQuotas {
            keyword_generation: OpQuota { per_minute: 3, per_day: 20 },
            serp_lookup: OpQuota { per_minute: 5, per_day: 50 },
            brief_generation: OpQuota { per_minute: 2, per_day: 10 },
            suggestions: OpQuota { per_minute: 5, per_day: 40 },
        }
    }

    fn default_starter() -> PlanQuotas {
        PlanQuotas {
            keyword_generation: OpQuota { per_minute: 10, per_day: 100 },
            serp_lookup: OpQuota { per_minute: 20, per_day: 400 },
            brief_generation: OpQuota { per_minute: 5, per_day: 50 },
            suggestions: OpQuota { per_minute: 15, per_day: 200 },
        }
    }

    fn default_pro() -> PlanQuotas {
        PlanQuotas {
            keyword_generation: OpQuota { per_minute: 30, per_day: 500 },
            serp_lookup: OpQuota { per_minute: 60, per_day: 2_000 },
            brief_generation: OpQuota { per_minute: 15, per_day: 200 },
            suggestions: OpQuota { per_minute: 40, per_day: 1_000 },
        }
    }

    fn default_agency() -> PlanQuotas {
        PlanQuotas {
            keyword_generation: OpQuota { per_minute: 100, per_day: 2_000 },
            serp_lookup: OpQuota { per_minute: 200, per_day: 10_000 },
            brief_generation: OpQuota { per_minute: 50, per_day: 1_000 },
            suggestions: OpQuota { per_minute: 120, per_day: 5_000 },
        }
    }

    pub fn quota(&self, plan: Plan, op: OperationClass) -> OpQuota {
        let plan_quotas = match plan {
            Plan::Free => &self.free,
            Plan::Starter => &self.starter,
            Plan::Pro => &self.pro,
            Plan::Agency => &self.agency,
        };
        plan_quotas.quota(op)
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            free: Self::default_free(),
            starter: Self::default_starter(),
            pro: Self::default_pro(),
            agency: Self::default_agency(),
        }
    }
}

/// Timeouts and retry policy for the upstream collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Bound on a single enrichment fetch; on expiry the pipeline falls
    /// back to heuristic-only scoring.
    #[serde(default = "UpstreamConfig::default_enrichment_timeout_ms")]
    pub enrichment_timeout_ms: u64,
    /// Bound on a single candidate generator call.
    #[serde(default = "UpstreamConfig::default_generator_timeout_ms")]
    pub generator_timeout_ms: u64,
    /// Retries for the primary generator after the first failure.
    #[serde(default = "UpstreamConfig::default_max_retries")]
    pub max_retries: u32,
    /// First retry backoff; doubles per attempt.
    #[serde(default = "UpstreamConfig::default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Concurrent enrichment fetches per batch.
    #[serde(default = "UpstreamConfig::default_enrichment_concurrency")]
    pub enrichment_concurrency: usize,
}

impl UpstreamConfig {
    fn default_enrichment_timeout_ms() -> u64 {
        10_000
    }
    fn default_generator_timeout_ms() -> u64 {
        30_000
    }
    fn default_max_retries() -> u32 {
        2
    }
    fn default_retry_backoff_ms() -> u64 {
        250
    }
    fn default_enrichment_concurrency() -> usize {
        4
    }

    pub fn enrichment_timeout(&self) -> StdDuration {
        StdDuration::from_millis(self.enrichment_timeout_ms)
    }

    pub fn generator_timeout(&self) -> StdDuration {
        StdDuration::from_millis(self.generator_timeout_ms)
    }

    pub fn retry_backoff(&self) -> StdDuration {
        StdDuration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            enrichment_timeout_ms: Self::default_enrichment_timeout_ms(),
            generator_timeout_ms: Self::default_generator_timeout_ms(),
            max_retries: Self::default_max_retries(),
            retry_backoff_ms: Self::default_retry_backoff_ms(),
            enrichment_concurrency: Self::default_enrichment_concurrency(),
        }
    }
}

/// Cache housekeeping knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheTuning {
    /// Interval between background expired-entry sweeps.
    #[serde(default = "CacheTuning::default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl CacheTuning {
    fn default_sweep_interval_secs() -> u64 {
        300
    }

    pub fn sweep_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for CacheTuning {
    fn default() -> Self {
        Self {
            sweep_interval_secs: Self::default_sweep_interval_secs(),
        }
    }
}

/// Full engine configuration tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub intent: IntentConfig,
    #[serde(default)]
    pub ttl: TtlConfig,
    #[serde(default)]
    pub quotas: QuotaConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub cache: CacheTuning,
}

impl Settings {
    /// Load settings, layered: built-in defaults, then an optional TOML
    /// file, then `KEYSCOUT_*` environment overrides
    /// (e.g. `KEYSCOUT_TTL__SERP_SECS=3600`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = cfg::Config::builder()
            .add_source(cfg::Config::try_from(&Settings::default())?);

        if let Some(path) = path {
            builder = builder.add_source(cfg::File::from(path));
        }

        let loaded = builder
            .add_source(cfg::Environment::with_prefix("KEYSCOUT").separator("__"))
            .build()
            .context("failed to assemble configuration sources")?;

        loaded
            .try_deserialize()
            .context("invalid keyscout configuration")
    }
}
