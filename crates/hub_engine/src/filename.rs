use sha2::{Digest, Sha256};

const MAX_STEM: usize = 48;

/// Deterministic, filesystem-safe name for a cache key:
/// `{sanitized_key}--{short_hash(key)}.json`.
///
/// Distinct keys that sanitize alike still differ by hash.
pub fn cache_filename(key: &str) -> String {
    format!("{}--{}.json", sanitize_key(key), short_hash(key))
}

fn sanitize_key(key: &str) -> String {
    let mut stem = String::with_capacity(key.len());
    for c in key.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' };
        if c == '_' && stem.ends_with('_') {
            continue;
        }
        stem.push(c);
    }
    let stem = stem.trim_matches('_');
    if stem.is_empty() {
        return "draft".to_string();
    }
    stem.chars().take(MAX_STEM).collect()
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().take(4).map(|byte| format!("{byte:02x}")).collect()
}
