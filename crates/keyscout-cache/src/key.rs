use keyscout_core::DataType;
use sha2::{Digest, Sha256};

/// Derive the canonical cache key for a request.
///
/// The primary text is trimmed and lowercased; secondary parameters are
/// sorted by name before hashing, so two logically identical requests
/// resolve to the same key regardless of parameter order. The data-type
/// prefix keeps keys self-describing for dependency-stage checks and
/// storage partitioning.
pub fn derive_key(data_type: DataType, primary: &str, params: &[(&str, &str)]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(primary.trim().to_lowercase().as_bytes());

    let mut sorted: Vec<(&str, &str)> = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    for (name, value) in sorted {
        hasher.update(b"|");
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(value.trim().to_lowercase().as_bytes());
    }

    format!("{}:{:x}", data_type, hasher.finalize())
}

/// Data-type prefix of a derived key, if it has one.
pub fn key_data_type(key: &str) -> Option<DataType> {
    key.split(':').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_order_does_not_matter() {
        let a = derive_key(
            DataType::Keywords,
            "CRM Software ",
            &[("region", "US"), ("language", "en")],
        );
        let b = derive_key(
            DataType::Keywords,
            "crm software",
            &[("language", "EN"), ("region", "us")],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_inputs_get_distinct_keys() {
        let a = derive_key(DataType::Keywords, "crm software", &[("region", "us")]);
        let b = derive_key(DataType::Keywords, "crm software", &[("region", "de")]);
        let c = derive_key(DataType::Serp, "crm software", &[("region", "us")]);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn key_carries_its_data_type() {
        let key = derive_key(DataType::Serp, "standing desk", &[]);
        assert!(key.starts_with("serp:"));
        assert_eq!(key_data_type(&key), Some(DataType::Serp));
        assert_eq!(key_data_type("no-prefix"), None);
    }
}
