// Cache matching - locates the credential cache file for a logical profile
use crate::credentials::{fingerprint, record};
use crate::error::ParseError;
use crate::mapping::MappingStore;
use crate::models::{CredentialRecord, IamRoleProfile, ProfileDescriptor, SsoProfile};
use crate::profiles::ProfileRepository;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// How a cache file was tied to the profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Remembered mapping from a previous confirmation.
    Remembered,
    /// Deterministic fingerprint of the profile identity.
    Fingerprint,
    /// Exact role-ARN field match.
    RoleArn,
    /// Embedded `[profile name]` config text.
    ProfileSection,
    /// Account/role/start-url substring heuristic. Can false-positive when
    /// profiles share an account and role under different SSO sessions.
    Substring,
    /// Assumed-role ARN carrying the configured role-name suffix.
    AssumedRoleSuffix,
}

impl MatchStrategy {
    pub fn as_str(&self) -> &str {
        match self {
            MatchStrategy::Remembered => "remembered",
            MatchStrategy::Fingerprint => "fingerprint",
            MatchStrategy::RoleArn => "role-arn",
            MatchStrategy::ProfileSection => "profile-section",
            MatchStrategy::Substring => "substring",
            MatchStrategy::AssumedRoleSuffix => "assumed-role-suffix",
        }
    }
}

/// A currently-valid cache file resolved for a profile.
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub path: PathBuf,
    pub record: CredentialRecord,
    pub strategy: MatchStrategy,
}

/// Finds the credential cache file that belongs to a profile.
///
/// The cache directory is owned by the wrapped CLI: files appear, vanish and
/// get rewritten underneath us, so every lookup re-reads from disk and any
/// per-candidate error just skips that candidate.
pub struct CacheMatcher {
    cache_dir: PathBuf,
    mapping: Arc<MappingStore>,
    profiles: Arc<dyn ProfileRepository>,
}

impl CacheMatcher {
    pub fn new(
        cache_dir: PathBuf,
        mapping: Arc<MappingStore>,
        profiles: Arc<dyn ProfileRepository>,
    ) -> Self {
        Self {
            cache_dir,
            mapping,
            profiles,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Resolve the single best-matching, currently-valid cache file, or
    /// `None` when no cached credential exists (the caller's cue to refresh).
    pub fn resolve(&self, profile: &ProfileDescriptor) -> Option<CacheHit> {
        if let Some(hit) = self.resolve_remembered(profile) {
            return Some(hit);
        }

        if let ProfileDescriptor::Sso(sso) = profile {
            if let Some(hit) = self.resolve_fingerprint(sso) {
                return Some(hit);
            }
        }

        self.resolve_by_scan(profile)
    }

    /// Fast path: a previously confirmed mapping, evicted when the file is
    /// gone or its credential no longer parses as valid.
    fn resolve_remembered(&self, profile: &ProfileDescriptor) -> Option<CacheHit> {
        let file_name = self.mapping.get(profile.name())?;
        let path = self.cache_dir.join(&file_name);

        match self.read_record(&path) {
            Some(record) => Some(CacheHit {
                path,
                record,
                strategy: MatchStrategy::Remembered,
            }),
            None => {
                tracing::debug!(
                    profile = profile.name(),
                    file_name,
                    "remembered cache file is gone or stale"
                );
                self.mapping.remove(profile.name());
                None
            }
        }
    }

    /// Fast path: predict the file name the CLI would have used from a
    /// fingerprint of the profile identity.
    fn resolve_fingerprint(&self, sso: &SsoProfile) -> Option<CacheHit> {
        let session_name = self.profiles.session_name_for(&sso.name);

        let mut components = BTreeMap::new();
        components.insert("accountId", sso.account_id.as_str());
        components.insert("roleName", sso.role_name.as_str());
        match &session_name {
            Some(session) => components.insert("sessionName", session.as_str()),
            None => components.insert("startUrl", sso.start_url.as_str()),
        };

        let file_name = fingerprint::cache_file_name(&components);
        let path = self.cache_dir.join(&file_name);
        let record = self.read_record(&path)?;

        self.mapping.insert(&sso.name, &file_name);
        Some(CacheHit {
            path,
            record,
            strategy: MatchStrategy::Fingerprint,
        })
    }

    /// Slow path: scan every non-hidden .json file and apply the strict
    /// matching rules in order.
    fn resolve_by_scan(&self, profile: &ProfileDescriptor) -> Option<CacheHit> {
        let entries = match fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::debug!(
                    cache_dir = %self.cache_dir.display(),
                    %err,
                    "cache directory unreadable"
                );
                return None;
            }
        };

        let mut candidates: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension().and_then(|s| s.to_str()) == Some("json")
                    && path
                        .file_name()
                        .and_then(|s| s.to_str())
                        .is_some_and(|name| !name.starts_with('.'))
            })
            .collect();
        candidates.sort();

        for path in candidates {
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    tracing::debug!(path = %path.display(), %err, "skipping unreadable candidate");
                    continue;
                }
            };

            let Some(strategy) = self.match_candidate(profile, &bytes) else {
                continue;
            };

            let record = match record::parse(&bytes) {
                Ok(record) => record,
                Err(err) => {
                    tracing::debug!(path = %path.display(), %err, "matched candidate is not valid");
                    continue;
                }
            };

            if strategy == MatchStrategy::Substring {
                tracing::warn!(
                    profile = profile.name(),
                    path = %path.display(),
                    "matched by content substrings only; may be ambiguous across SSO sessions"
                );
            }

            if let Some(file_name) = path.file_name().and_then(|s| s.to_str()) {
                self.mapping.insert(profile.name(), file_name);
            }
            return Some(CacheHit {
                path,
                record,
                strategy,
            });
        }

        None
    }

    fn match_candidate(&self, profile: &ProfileDescriptor, bytes: &[u8]) -> Option<MatchStrategy> {
        let text = String::from_utf8_lossy(bytes);
        match profile {
            ProfileDescriptor::Sso(sso) => Self::match_sso_candidate(sso, &text),
            ProfileDescriptor::IamRole(iam) => Self::match_iam_candidate(iam, bytes),
        }
    }

    fn match_sso_candidate(sso: &SsoProfile, text: &str) -> Option<MatchStrategy> {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
            if value.get("RoleArn").and_then(|v| v.as_str()) == Some(sso.role_arn().as_str()) {
                return Some(MatchStrategy::RoleArn);
            }
        }

        if text.contains(&format!("[profile {}]", sso.name)) {
            return Some(MatchStrategy::ProfileSection);
        }

        if text.contains(&sso.account_id)
            && text.contains(&sso.role_name)
            && text.contains(&sso.start_url)
        {
            return Some(MatchStrategy::Substring);
        }

        None
    }

    fn match_iam_candidate(iam: &IamRoleProfile, bytes: &[u8]) -> Option<MatchStrategy> {
        match record::parse(bytes) {
            Ok(CredentialRecord::AssumedRole {
                assumed_role_arn, ..
            }) if assumed_role_arn.contains(iam.role_name()) => {
                Some(MatchStrategy::AssumedRoleSuffix)
            }
            _ => None,
        }
    }

    /// Read and parse one candidate, logging and swallowing every failure.
    fn read_record(&self, path: &Path) -> Option<CredentialRecord> {
        let bytes = fs::read(path).ok()?;
        match record::parse(&bytes) {
            Ok(record) => Some(record),
            Err(ParseError::Expired(expired_at)) => {
                tracing::debug!(path = %path.display(), %expired_at, "cached credential expired");
                None
            }
            Err(err) => {
                tracing::debug!(path = %path.display(), %err, "cached credential unparsable");
                None
            }
        }
    }
}
