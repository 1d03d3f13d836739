// Diagnostic: show which cache file a profile resolves to
use crate::cli::Services;
use crate::error::{Error, Result};
use crate::expiry;

pub async fn execute(services: &Services, profile_name: &str) -> Result<()> {
    let profile = services
        .profiles
        .get_profile(profile_name)
        .ok_or_else(|| Error::ProfileNotFound(profile_name.to_string()))?;

    match services.matcher().resolve(&profile) {
        Some(hit) => {
            let expires_at = hit.record.expires_at();
            println!("Cache file: {}", hit.path.display());
            println!("Matched by: {}", hit.strategy.as_str());
            println!("Expires:    {}", expires_at.to_rfc3339());
            println!("Remaining:  {}", expiry::format_time_remaining(&expires_at));
        }
        None => {
            println!("No valid cached credential found for '{}'", profile_name);
        }
    }

    Ok(())
}
