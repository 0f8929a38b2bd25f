use keyscout_core::{DifficultyMode, RawCandidate, ScoreSource, ScoringConfig, SerpEntry};
use serde::{Deserialize, Serialize};

/// Output of scoring one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub opportunity_score: u8,
    pub is_quick_win: bool,
    pub source: ScoreSource,
}

/// Deterministic opportunity scorer.
///
/// Total function over any input: missing volume is treated as 0 and
/// missing competition as 1.0, so partial upstream data degrades a
/// candidate's rank instead of aborting the batch. The score is
/// non-decreasing in volume and non-increasing in competition for any
/// configuration with non-negative weights.
#[derive(Debug, Clone)]
pub struct OpportunityScorer {
    config: ScoringConfig,
}

impl OpportunityScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Volume mapped onto [0, 100] on a log10 scale, saturating at the
    /// configured cap.
    pub fn normalized_volume(&self, volume: u64) -> f64 {
        let cap = self.config.volume_cap.max(1);
        let scaled = 100.0 * ((volume as f64) + 1.0).log10() / ((cap as f64) + 1.0).log10();
        scaled.min(100.0)
    }

    pub fn score(
        &self,
        raw: &RawCandidate,
        enrichment_difficulty: Option<u8>,
        mode: DifficultyMode,
    ) -> ScoreBreakdown {
        let volume = raw.volume.unwrap_or(0);
        let competition = raw.competition.unwrap_or(1.0).clamp(0.0, 1.0);

        let base = self.config.volume_weight * self.normalized_volume(volume)
            + self.config.competition_weight * (100.0 * (1.0 - competition));

        let penalty = enrichment_difficulty
            .map(|d| {
                let over = d.saturating_sub(self.config.difficulty_pivot) as f64;
                over * self.config.difficulty_penalty
            })
            .unwrap_or(0.0);

        let opportunity_score = (base - penalty).round().clamp(0.0, 100.0) as u8;

        let under_cap = mode
            .competition_cap()
            .map(|cap| competition <= cap)
            .unwrap_or(true);
        let is_quick_win = under_cap && opportunity_score >= self.config.quick_win_min_score;

        let source = if enrichment_difficulty.is_some() {
            ScoreSource::EnrichmentEnhanced
        } else {
            ScoreSource::Heuristic
        };

        ScoreBreakdown {
            opportunity_score,
            is_quick_win,
            source,
        }
    }
}

impl Default for OpportunityScorer {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

/// Difficulty estimate in [0, 100] from live result pages: the share of
/// top results whose title carries the keyword, i.e. how many competitors
/// already optimize for it.
pub fn serp_difficulty(keyword: &str, entries: &[SerpEntry]) -> u8 {
    if entries.is_empty() {
        return 0;
    }
    let needle = keyword.trim().to_lowercase();
    let optimized = entries
        .iter()
        .filter(|e| e.title.to_lowercase().contains(&needle))
        .count();
    ((100 * optimized) as f64 / entries.len() as f64).round() as u8
}
