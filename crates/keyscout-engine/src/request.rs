use keyscout_cache::derive_key;
use keyscout_core::{DataType, DifficultyMode, GenerationRequest, KeyscoutError, Plan, Result};
use serde::{Deserialize, Serialize};

pub const MAX_TOPIC_LEN: usize = 200;
pub const MAX_CANDIDATES: usize = 100;

/// A keyword-research request as it arrives from the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRequest {
    pub user_id: String,
    pub plan: Plan,
    pub topic: String,
    #[serde(default)]
    pub business_context: Option<String>,
    pub region: String,
    pub language: String,
    pub difficulty_mode: DifficultyMode,
    #[serde(default = "KeywordRequest::default_max_candidates")]
    pub max_candidates: usize,
    /// Whether to fetch live result data for each candidate.
    #[serde(default = "KeywordRequest::default_enrich")]
    pub enrich: bool,
}

impl KeywordRequest {
    fn default_max_candidates() -> usize {
        20
    }

    fn default_enrich() -> bool {
        true
    }

    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(KeyscoutError::Validation("user_id must not be empty".into()));
        }
        let topic = self.topic.trim();
        if topic.is_empty() {
            return Err(KeyscoutError::Validation("topic must not be empty".into()));
        }
        if topic.len() > MAX_TOPIC_LEN {
            return Err(KeyscoutError::Validation(format!(
                "topic exceeds {} characters",
                MAX_TOPIC_LEN
            )));
        }
        validate_code("region", &self.region)?;
        validate_code("language", &self.language)?;
        if self.max_candidates == 0 || self.max_candidates > MAX_CANDIDATES {
            return Err(KeyscoutError::Validation(format!(
                "max_candidates must be between 1 and {}",
                MAX_CANDIDATES
            )));
        }
        Ok(())
    }

    /// Canonical cache key for the scored batch this request resolves to.
    /// The difficulty mode participates because it changes quick-win
    /// flags in the stored candidates.
    pub fn cache_key(&self) -> String {
        let mode = self.difficulty_mode.to_string();
        derive_key(
            DataType::Keywords,
            &self.topic,
            &[
                ("region", self.region.as_str()),
                ("language", self.language.as_str()),
                ("mode", mode.as_str()),
            ],
        )
    }

    pub fn generation_request(&self) -> GenerationRequest {
        GenerationRequest {
            topic: self.topic.trim().to_string(),
            business_context: self.business_context.clone(),
            region: self.region.clone(),
            language: self.language.clone(),
            max_candidates: self.max_candidates,
        }
    }
}

fn validate_code(field: &str, value: &str) -> Result<()> {
    let ok = (2..=5).contains(&value.len()) && value.chars().all(|c| c.is_ascii_alphabetic());
    if ok {
        Ok(())
    } else {
        Err(KeyscoutError::Validation(format!(
            "{} must be 2-5 ASCII letters, got {:?}",
            field, value
        )))
    }
}

/// Canonical key for one keyword's live-results entry.
pub fn serp_key(keyword: &str, region: &str, language: &str) -> String {
    derive_key(
        DataType::Serp,
        keyword,
        &[("region", region), ("language", language)],
    )
}

/// Canonical key for a brief document on a target keyword.
pub fn brief_key(target_keyword: &str, region: &str, language: &str) -> String {
    derive_key(
        DataType::Brief,
        target_keyword,
        &[("region", region), ("language", language)],
    )
}

/// Canonical key for a suggestion set on a target keyword.
pub fn suggestions_key(target_keyword: &str, region: &str, language: &str) -> String {
    derive_key(
        DataType::Suggestions,
        target_keyword,
        &[("region", region), ("language", language)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> KeywordRequest {
        KeywordRequest {
            user_id: "u1".into(),
            plan: Plan::Pro,
            topic: "crm software".into(),
            business_context: None,
            region: "us".into(),
            language: "en".into(),
            difficulty_mode: DifficultyMode::Medium,
            max_candidates: 20,
            enrich: true,
        }
    }

    #[test]
    fn valid_request_passes() {
        request().validate().unwrap();
    }

    #[test]
    fn empty_topic_is_rejected() {
        let mut r = request();
        r.topic = "   ".into();
        assert!(matches!(r.validate(), Err(KeyscoutError::Validation(_))));
    }

    #[test]
    fn bad_region_is_rejected() {
        let mut r = request();
        r.region = "u5".into();
        assert!(matches!(r.validate(), Err(KeyscoutError::Validation(_))));
        r.region = "x".into();
        assert!(matches!(r.validate(), Err(KeyscoutError::Validation(_))));
    }

    #[test]
    fn zero_candidates_is_rejected() {
        let mut r = request();
        r.max_candidates = 0;
        assert!(matches!(r.validate(), Err(KeyscoutError::Validation(_))));
    }

    #[test]
    fn cache_key_ignores_topic_case_and_spacing() {
        let mut a = request();
        a.topic = "  CRM Software ".into();
        let b = request();
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn cache_key_depends_on_mode() {
        let a = request();
        let mut b = request();
        b.difficulty_mode = DifficultyMode::Easy;
        assert_ne!(a.cache_key(), b.cache_key());
    }
}
