use keyscout_core::{IntentConfig, SearchIntent, SerpEntry};
use once_cell::sync::Lazy;
use regex::Regex;

static TRANSACTIONAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(buy|price|pricing|cost|discount|coupon|deal|cheap|order|purchase|subscription)\b")
        .unwrap()
});

static COMMERCIAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(best|top|review|reviews|vs|versus|compare|comparison|alternative|alternatives)\b")
        .unwrap()
});

static INFORMATIONAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(how|what|why|when|who|guide|tutorial|tips|examples|learn|meaning|definition)\b")
        .unwrap()
});

/// Rule-based search-intent classifier.
///
/// Classification over keyword text alone is deterministic. Result titles,
/// when available, only ever break an `Unknown`; they never override a
/// confident text-based label.
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    brands: Vec<String>,
}

impl IntentClassifier {
    pub fn new(config: &IntentConfig) -> Self {
        Self {
            brands: config
                .brands
                .iter()
                .map(|b| b.trim().to_lowercase())
                .filter(|b| !b.is_empty())
                .collect(),
        }
    }

    /// Classify from keyword text alone.
    pub fn classify(&self, keyword: &str) -> SearchIntent {
        let text = keyword.trim().to_lowercase();
        if self.brands.iter().any(|b| b == &text) {
            return SearchIntent::Navigational;
        }
        if TRANSACTIONAL.is_match(&text) {
            return SearchIntent::Transactional;
        }
        if COMMERCIAL.is_match(&text) {
            return SearchIntent::Commercial;
        }
        if INFORMATIONAL.is_match(&text) {
            return SearchIntent::Informational;
        }
        SearchIntent::Unknown
    }

    /// Classify with a sample of live result titles. The majority intent
    /// across the titles is used only when the text alone is `Unknown`.
    pub fn classify_with_titles(&self, keyword: &str, titles: &[String]) -> SearchIntent {
        let from_text = self.classify(keyword);
        if from_text != SearchIntent::Unknown || titles.is_empty() {
            return from_text;
        }
        self.majority_intent(titles)
    }

    /// Classify using the full enrichment result set.
    pub fn classify_with_serp(&self, keyword: &str, entries: &[SerpEntry]) -> SearchIntent {
        let titles: Vec<String> = entries.iter().map(|e| e.title.clone()).collect();
        self.classify_with_titles(keyword, &titles)
    }

    fn majority_intent(&self, titles: &[String]) -> SearchIntent {
        // counts indexed in tie-break preference order
        const ORDER: [SearchIntent; 4] = [
            SearchIntent::Transactional,
            SearchIntent::Commercial,
            SearchIntent::Informational,
            SearchIntent::Navigational,
        ];
        let mut counts = [0usize; 4];
        for title in titles {
            let intent = self.classify(title);
            if let Some(idx) = ORDER.iter().position(|i| *i == intent) {
                counts[idx] += 1;
            }
        }
        let (best_idx, best_count) = counts
            .iter()
            .enumerate()
            .max_by_key(|(idx, count)| (**count, usize::MAX - idx))
            .map(|(idx, count)| (idx, *count))
            .unwrap_or((0, 0));
        if best_count == 0 {
            SearchIntent::Unknown
        } else {
            ORDER[best_idx]
        }
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(&IntentConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> IntentClassifier {
        IntentClassifier::new(&IntentConfig {
            brands: vec!["Basecamp".into(), "hubspot".into()],
        })
    }

    #[test]
    fn transactional_keywords() {
        let c = classifier();
        assert_eq!(c.classify("buy standing desk"), SearchIntent::Transactional);
        assert_eq!(c.classify("crm pricing"), SearchIntent::Transactional);
        assert_eq!(c.classify("cheap flights to oslo"), SearchIntent::Transactional);
    }

    #[test]
    fn commercial_keywords() {
        let c = classifier();
        assert_eq!(c.classify("best email client"), SearchIntent::Commercial);
        assert_eq!(c.classify("notion vs obsidian"), SearchIntent::Commercial);
    }

    #[test]
    fn informational_keywords() {
        let c = classifier();
        assert_eq!(c.classify("how to brew coffee"), SearchIntent::Informational);
        assert_eq!(c.classify("what is a cap table"), SearchIntent::Informational);
    }

    #[test]
    fn navigational_requires_exact_brand_match() {
        let c = classifier();
        assert_eq!(c.classify("Basecamp"), SearchIntent::Navigational);
        assert_eq!(c.classify("  HubSpot  "), SearchIntent::Navigational);
        // partial brand mention is not navigational
        assert_eq!(c.classify("basecamp exports"), SearchIntent::Unknown);
    }

    #[test]
    fn transactional_wins_over_commercial() {
        let c = classifier();
        assert_eq!(c.classify("best price for macbook"), SearchIntent::Transactional);
    }

    #[test]
    fn titles_break_unknown_only() {
        let c = classifier();
        let titles = vec![
            "Best CRM Tools Compared".to_string(),
            "Top 10 CRM Review".to_string(),
            "What is a CRM".to_string(),
        ];
        // text-only classification is unknown, majority of titles decides
        assert_eq!(
            c.classify_with_titles("crm software", &titles),
            SearchIntent::Commercial
        );
        // a confident text label is never overridden
        assert_eq!(
            c.classify_with_titles("buy crm software", &titles),
            SearchIntent::Transactional
        );
    }

    #[test]
    fn all_unknown_titles_stay_unknown() {
        let c = classifier();
        let titles = vec!["Acme launches widget".to_string()];
        assert_eq!(
            c.classify_with_titles("acme widget", &titles),
            SearchIntent::Unknown
        );
    }

    #[test]
    fn classification_is_deterministic() {
        let c = classifier();
        let first = c.classify("how to buy the best crm");
        for _ in 0..50 {
            assert_eq!(c.classify("how to buy the best crm"), first);
        }
    }
}
