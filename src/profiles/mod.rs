// Profile repository - reads profile identities from ~/.aws/config
use crate::error::{Error, Result};
use crate::models::{IamRoleProfile, ProfileDescriptor, SsoProfile};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Lookup of logical profile identities. The monitor and matcher only ever
/// read through this seam, which keeps profile editing out of the core and
/// lets tests substitute fixed descriptors.
pub trait ProfileRepository: Send + Sync {
    /// Profile identity by name, or `None` when it is not configured.
    fn get_profile(&self, name: &str) -> Option<ProfileDescriptor>;

    /// The `sso_session` name a profile references, if any.
    fn session_name_for(&self, name: &str) -> Option<String>;
}

/// Reads `[profile X]` and `[sso-session Y]` sections from the AWS config
/// file. The file is re-read on every lookup because the wrapped CLI (or the
/// user) can rewrite it at any time.
pub struct AwsConfigProfiles {
    config_path: PathBuf,
}

impl AwsConfigProfiles {
    pub fn new() -> Result<Self> {
        let config_path = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?
            .join(".aws")
            .join("config");
        Ok(Self { config_path })
    }

    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Parse the whole file into section-name -> key/value maps.
    fn read_sections(&self) -> HashMap<String, HashMap<String, String>> {
        let content = match fs::read_to_string(&self.config_path) {
            Ok(content) => content,
            Err(err) => {
                tracing::debug!(
                    path = %self.config_path.display(),
                    %err,
                    "AWS config file unreadable"
                );
                return HashMap::new();
            }
        };

        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current: Option<String> = None;

        for line in content.lines() {
            let trimmed = line.trim();

            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                let section = trimmed[1..trimmed.len() - 1].trim().to_string();
                sections.entry(section.clone()).or_default();
                current = Some(section);
            } else if !trimmed.is_empty() && !trimmed.starts_with('#') && !trimmed.starts_with(';')
            {
                if let (Some(section), Some(eq_pos)) = (&current, trimmed.find('=')) {
                    let key = trimmed[..eq_pos].trim().to_string();
                    let value = trimmed[eq_pos + 1..].trim().to_string();
                    if let Some(entries) = sections.get_mut(section) {
                        entries.insert(key, value);
                    }
                }
            }
        }

        sections
    }

    fn profile_section<'a>(
        sections: &'a HashMap<String, HashMap<String, String>>,
        name: &str,
    ) -> Option<&'a HashMap<String, String>> {
        if name == "default" {
            sections.get("default")
        } else {
            sections.get(&format!("profile {}", name))
        }
    }
}

impl ProfileRepository for AwsConfigProfiles {
    fn get_profile(&self, name: &str) -> Option<ProfileDescriptor> {
        let sections = self.read_sections();
        let entries = Self::profile_section(&sections, name)?;

        // IAM role-assumption profiles take precedence; a profile carrying
        // both shapes is misconfigured and treated as role-assumption.
        if let (Some(role_arn), Some(source_profile)) =
            (entries.get("role_arn"), entries.get("source_profile"))
        {
            return Some(ProfileDescriptor::IamRole(IamRoleProfile {
                name: name.to_string(),
                source_profile: source_profile.clone(),
                role_arn: role_arn.clone(),
            }));
        }

        let account_id = entries.get("sso_account_id")?;
        let role_name = entries.get("sso_role_name")?;

        // Start URL and region either sit on the profile directly (legacy
        // format) or come from the referenced [sso-session] block.
        let session = entries
            .get("sso_session")
            .and_then(|session_name| sections.get(&format!("sso-session {}", session_name)));

        let start_url = entries
            .get("sso_start_url")
            .or_else(|| session.and_then(|s| s.get("sso_start_url")))?;
        let region = entries
            .get("sso_region")
            .or_else(|| session.and_then(|s| s.get("sso_region")))
            .or_else(|| entries.get("region"))?;

        Some(ProfileDescriptor::Sso(SsoProfile {
            name: name.to_string(),
            start_url: start_url.clone(),
            region: region.clone(),
            account_id: account_id.clone(),
            role_name: role_name.clone(),
        }))
    }

    fn session_name_for(&self, name: &str) -> Option<String> {
        let sections = self.read_sections();
        Self::profile_section(&sections, name)?
            .get("sso_session")
            .cloned()
    }
}
