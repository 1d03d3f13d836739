// Credential cache record parsing
use crate::error::ParseError;
use crate::models::CredentialRecord;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

/// SSO-CLI cache shape, written by `aws sso login` / the CLI's SSO provider.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct SsoCacheShape {
    #[serde(rename = "ProviderType")]
    provider_type: String,
    #[serde(rename = "Credentials")]
    credentials: RawCredentials,
}

/// Assumed-role cache shape, written by the CLI when assuming a role
/// from a source profile.
#[derive(Debug, Deserialize)]
struct AssumedRoleCacheShape {
    #[serde(rename = "Credentials")]
    credentials: RawCredentials,
    #[serde(rename = "AssumedRoleUser")]
    assumed_role_user: RawAssumedRoleUser,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct RawCredentials {
    #[serde(rename = "AccessKeyId")]
    access_key_id: String,
    #[serde(rename = "SecretAccessKey")]
    secret_access_key: String,
    #[serde(rename = "SessionToken")]
    session_token: String,
    #[serde(rename = "Expiration")]
    expiration: String,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct RawAssumedRoleUser {
    #[serde(rename = "AssumedRoleId")]
    assumed_role_id: String,
    #[serde(rename = "Arn")]
    arn: String,
}

/// Parse raw cache-file bytes into a normalized credential record.
///
/// Pure over the supplied bytes; reading the file is the caller's job. Tries
/// the SSO shape first, then the assumed-role shape. A structurally valid
/// record whose expiration is in the past yields `ParseError::Expired` and is
/// never returned as a usable credential.
pub fn parse(bytes: &[u8]) -> Result<CredentialRecord, ParseError> {
    let text = std::str::from_utf8(bytes).map_err(|e| ParseError::Malformed(e.to_string()))?;

    if let Ok(sso) = serde_json::from_str::<SsoCacheShape>(text) {
        let expires_at = parse_expiration(&sso.credentials.expiration)?;
        return validated(CredentialRecord::Sso { expires_at });
    }

    let assumed = serde_json::from_str::<AssumedRoleCacheShape>(text)
        .map_err(|e| ParseError::Malformed(e.to_string()))?;
    let expires_at = parse_expiration(&assumed.credentials.expiration)?;
    validated(CredentialRecord::AssumedRole {
        expires_at,
        assumed_role_arn: assumed.assumed_role_user.arn,
    })
}

fn validated(record: CredentialRecord) -> Result<CredentialRecord, ParseError> {
    if record.is_expired() {
        Err(ParseError::Expired(record.expires_at()))
    } else {
        Ok(record)
    }
}

/// Accepts ISO-8601 with optional fractional seconds and optional timezone
/// designator. The CLI writes RFC 3339 for SSO records but an offset-less
/// (implicitly UTC) variant for assumed-role ones.
fn parse_expiration(raw: &str) -> Result<DateTime<Utc>, ParseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%SUTC"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(DateTime::from_naive_utc_and_offset(naive, Utc));
        }
    }

    Err(ParseError::BadDate(raw.to_string()))
}
