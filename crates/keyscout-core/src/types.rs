use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Search intent behind a keyword, as inferred from its text (and
/// optionally from live result titles).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchIntent {
    Informational,
    Commercial,
    Transactional,
    Navigational,
    Unknown,
}

impl fmt::Display for SearchIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SearchIntent::Informational => "informational",
            SearchIntent::Commercial => "commercial",
            SearchIntent::Transactional => "transactional",
            SearchIntent::Navigational => "navigational",
            SearchIntent::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for SearchIntent {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "informational" => Ok(SearchIntent::Informational),
            "commercial" => Ok(SearchIntent::Commercial),
            "transactional" => Ok(SearchIntent::Transactional),
            "navigational" => Ok(SearchIntent::Navigational),
            "unknown" => Ok(SearchIntent::Unknown),
            other => Err(format!("unknown search intent: {}", other)),
        }
    }
}

/// Provenance of a candidate's difficulty signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    Heuristic,
    EnrichmentEnhanced,
}

impl fmt::Display for ScoreSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreSource::Heuristic => write!(f, "heuristic"),
            ScoreSource::EnrichmentEnhanced => write!(f, "enrichment_enhanced"),
        }
    }
}

/// User-selected strictness tier for flagging quick wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyMode {
    Easy,
    Medium,
    Hard,
}

impl DifficultyMode {
    /// Maximum competition a quick win may carry under this mode.
    /// `Hard` imposes no cap.
    pub fn competition_cap(&self) -> Option<f64> {
        match self {
            DifficultyMode::Easy => Some(0.4),
            DifficultyMode::Medium => Some(0.6),
            DifficultyMode::Hard => None,
        }
    }
}

impl fmt::Display for DifficultyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DifficultyMode::Easy => "easy",
            DifficultyMode::Medium => "medium",
            DifficultyMode::Hard => "hard",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for DifficultyMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(DifficultyMode::Easy),
            "medium" => Ok(DifficultyMode::Medium),
            "hard" => Ok(DifficultyMode::Hard),
            other => Err(format!("unknown difficulty mode: {}", other)),
        }
    }
}

/// Pipeline stage of a cached payload. The derived ordering is the
/// pipeline order: dependency edges may only point to an earlier stage,
/// which keeps the dependency graph acyclic by construction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Keywords,
    Serp,
    Brief,
    Suggestions,
}

impl DataType {
    pub const ALL: [DataType; 4] = [
        DataType::Keywords,
        DataType::Serp,
        DataType::Brief,
        DataType::Suggestions,
    ];
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataType::Keywords => "keywords",
            DataType::Serp => "serp",
            DataType::Brief => "brief",
            DataType::Suggestions => "suggestions",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keywords" => Ok(DataType::Keywords),
            "serp" => Ok(DataType::Serp),
            "brief" => Ok(DataType::Brief),
            "suggestions" => Ok(DataType::Suggestions),
            other => Err(format!("unknown data type: {}", other)),
        }
    }
}

/// Subscription plan. Parsing is fail-closed: anything unrecognized maps
/// to the most restrictive tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Starter,
    Pro,
    Agency,
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Plan::Free => "free",
            Plan::Starter => "starter",
            Plan::Pro => "pro",
            Plan::Agency => "agency",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Plan {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "starter" => Plan::Starter,
            "pro" => Plan::Pro,
            "agency" => Plan::Agency,
            _ => Plan::Free,
        })
    }
}

/// Quota bucket a request is metered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationClass {
    KeywordGeneration,
    SerpLookup,
    BriefGeneration,
    Suggestions,
}

impl OperationClass {
    pub const ALL: [OperationClass; 4] = [
        OperationClass::KeywordGeneration,
        OperationClass::SerpLookup,
        OperationClass::BriefGeneration,
        OperationClass::Suggestions,
    ];
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationClass::KeywordGeneration => "keyword_generation",
            OperationClass::SerpLookup => "serp_lookup",
            OperationClass::BriefGeneration => "brief_generation",
            OperationClass::Suggestions => "suggestions",
        };
        write!(f, "{}", s)
    }
}

/// Raw candidate tuple as returned by the upstream generator. Volume and
/// competition may be absent; the scorer treats missing values as
/// worst-case instead of failing the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCandidate {
    pub text: String,
    pub volume: Option<u64>,
    pub cpc: Option<f64>,
    pub competition: Option<f64>,
}

/// Fully scored keyword candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordCandidate {
    pub text: String,
    pub volume: u64,
    pub cpc: f64,
    pub competition: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichment_difficulty: Option<u8>,
    pub intent: SearchIntent,
    pub opportunity_score: u8,
    pub is_quick_win: bool,
    pub source: ScoreSource,
}

/// One organic result from the enrichment provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerpEntry {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub position: u32,
}

/// Parameters handed to the upstream candidate generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub topic: String,
    pub business_context: Option<String>,
    pub region: String,
    pub language: String,
    pub max_candidates: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordBatch {
    pub topic: String,
    pub region: String,
    pub language: String,
    pub candidates: Vec<KeywordCandidate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerpResult {
    pub keyword: String,
    pub entries: Vec<SerpEntry>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BriefDocument {
    pub target_keyword: String,
    pub markdown: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionSet {
    pub target_keyword: String,
    pub suggestions: Vec<String>,
}

/// Cache payload, one variant per pipeline stage. The tag keeps payload
/// shape and `DataType` in agreement at compile time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CachePayload {
    KeywordBatch(KeywordBatch),
    SerpResult(SerpResult),
    BriefDocument(BriefDocument),
    SuggestionSet(SuggestionSet),
}

impl CachePayload {
    pub fn data_type(&self) -> DataType {
        match self {
            CachePayload::KeywordBatch(_) => DataType::Keywords,
            CachePayload::SerpResult(_) => DataType::Serp,
            CachePayload::BriefDocument(_) => DataType::Brief,
            CachePayload::SuggestionSet(_) => DataType::Suggestions,
        }
    }
}

/// Cache entry with expiry and dependency metadata.
///
/// `expires_at` is fixed at creation (`created_at + ttl`); hits bump
/// `access_count` but never extend the TTL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub data_type: DataType,
    pub payload: CachePayload,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub access_count: u64,
    pub depends_on: HashSet<String>,
}

impl CacheEntry {
    pub fn new(
        key: impl Into<String>,
        payload: CachePayload,
        ttl: Duration,
        depends_on: HashSet<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            data_type: payload.data_type(),
            payload,
            created_at: now,
            expires_at: now + ttl,
            access_count: 0,
            depends_on,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn touch(&mut self) {
        self.access_count += 1;
    }
}

/// Lightweight per-entry metadata, used by sweeps and stats without
/// materializing payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMeta {
    pub key: String,
    pub data_type: DataType,
    pub expires_at: DateTime<Utc>,
}
