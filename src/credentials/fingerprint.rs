// Deterministic profile-identity fingerprints
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;

/// Hash an ordered set of identity components into the cache-file stem the
/// AWS CLI would use for them.
///
/// Components are serialized as a canonical JSON object with
/// lexicographically sorted keys (BTreeMap iteration order), digested with
/// SHA-1 and rendered as lowercase hex. No locale-dependent formatting is
/// involved, so the result is stable across platforms.
pub fn fingerprint(components: &BTreeMap<&str, &str>) -> String {
    let canonical =
        serde_json::to_string(components).expect("string map always serializes to JSON");
    let mut hasher = Sha1::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Expected cache file name for the given identity components.
pub fn cache_file_name(components: &BTreeMap<&str, &str>) -> String {
    format!("{}.json", fingerprint(components))
}
