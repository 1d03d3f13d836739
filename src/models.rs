use chrono::{DateTime, Utc};

/// Profile identity as declared in ~/.aws/config.
///
/// The two variants need different cache-matching behavior, so call sites
/// match exhaustively instead of going through a common trait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileDescriptor {
    Sso(SsoProfile),
    IamRole(IamRoleProfile),
}

impl ProfileDescriptor {
    pub fn name(&self) -> &str {
        match self {
            ProfileDescriptor::Sso(p) => &p.name,
            ProfileDescriptor::IamRole(p) => &p.name,
        }
    }
}

/// A profile authenticated through IAM Identity Center (SSO).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsoProfile {
    pub name: String,
    pub start_url: String,
    pub region: String,
    pub account_id: String,
    pub role_name: String,
}

impl SsoProfile {
    /// The role ARN this profile resolves to.
    pub fn role_arn(&self) -> String {
        format!("arn:aws:iam::{}:role/{}", self.account_id, self.role_name)
    }
}

/// A profile that assumes a role using another profile's credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IamRoleProfile {
    pub name: String,
    pub source_profile: String,
    pub role_arn: String,
}

impl IamRoleProfile {
    /// Role-name suffix of the configured role ARN
    /// ("arn:aws:iam::123:role/Admin" -> "Admin").
    pub fn role_name(&self) -> &str {
        self.role_arn.rsplit('/').next().unwrap_or(&self.role_arn)
    }
}

/// Normalized result of parsing a credential cache file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialRecord {
    Sso {
        expires_at: DateTime<Utc>,
    },
    AssumedRole {
        expires_at: DateTime<Utc>,
        assumed_role_arn: String,
    },
}

impl CredentialRecord {
    pub fn expires_at(&self) -> DateTime<Utc> {
        match self {
            CredentialRecord::Sso { expires_at } => *expires_at,
            CredentialRecord::AssumedRole { expires_at, .. } => *expires_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at()
    }

    pub fn remaining_seconds(&self) -> i64 {
        (self.expires_at() - Utc::now()).num_seconds().max(0)
    }
}

/// Lifecycle of the single monitored session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Connecting,
    Monitoring,
    Expired,
    NotAuthenticated,
    Disconnected,
}

impl SessionPhase {
    pub fn as_str(&self) -> &str {
        match self {
            SessionPhase::Idle => "IDLE",
            SessionPhase::Connecting => "CONNECTING",
            SessionPhase::Monitoring => "MONITORING",
            SessionPhase::Expired => "EXPIRED",
            SessionPhase::NotAuthenticated => "NOT_AUTHENTICATED",
            SessionPhase::Disconnected => "DISCONNECTED",
        }
    }
}
