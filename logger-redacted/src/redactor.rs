use base64::{engine::general_purpose, Engine as _};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Short, stable fingerprint of any serializable value.
///
/// Logs carry the fingerprint in place of the value so two events about the
/// same patient record can be correlated without the record itself ever
/// reaching the log sink. Values that fail to serialize hash as empty input.
pub fn fingerprint<T: Serialize + ?Sized>(value: &T) -> String {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    hash_bytes(&bytes)
}

fn hash_bytes(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    // First 8 bytes keep the fingerprint short
    general_purpose::STANDARD.encode(digest.get(..8).unwrap_or(digest.as_slice()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fingerprint_is_stable_and_short() {
        let record = json!({"Age": 45, "Gender": "Male", "BMI": 25.5});
        let first = fingerprint(&record);
        assert_eq!(first, fingerprint(&record.clone()));
        assert_eq!(first.len(), 12);
        assert!(!first.contains("Male"));
    }

    #[test]
    fn test_fingerprint_differs_per_record() {
        let a = fingerprint(&json!({"Age": 45}));
        let b = fingerprint(&json!({"Age": 46}));
        assert_ne!(a, b);
    }
}
