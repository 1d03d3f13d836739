// One-shot session status
use crate::cli::Services;
use crate::error::{Error, Result};
use crate::expiry;
use crate::models::ProfileDescriptor;

pub async fn execute(services: &Services, profile_name: &str, format: &str) -> Result<()> {
    let profile = services
        .profiles
        .get_profile(profile_name)
        .ok_or_else(|| Error::ProfileNotFound(profile_name.to_string()))?;

    let hit = services.matcher().resolve(&profile);

    match format {
        "json" => {
            let payload = match &hit {
                Some(hit) => serde_json::json!({
                    "profile": profile_name,
                    "authenticated": true,
                    "expires_at": hit.record.expires_at().to_rfc3339(),
                    "remaining_seconds": hit.record.remaining_seconds(),
                    "cache_file": hit.path.display().to_string(),
                }),
                None => serde_json::json!({
                    "profile": profile_name,
                    "authenticated": false,
                }),
            };
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        _ => match &hit {
            Some(hit) => {
                let expires_at = hit.record.expires_at();
                println!("Profile:   {}", profile_name);
                print_identity(&profile);
                println!("Status:    AUTHENTICATED");
                println!("Expires:   {}", expires_at.to_rfc3339());
                println!("Remaining: {}", expiry::format_time_remaining(&expires_at));
            }
            None => {
                println!("Profile:   {}", profile_name);
                print_identity(&profile);
                println!("Status:    NOT AUTHENTICATED");
                println!();
                println!("Run 'ssomon renew {}' to authenticate.", profile_name);
            }
        },
    }

    Ok(())
}

fn print_identity(profile: &ProfileDescriptor) {
    match profile {
        ProfileDescriptor::Sso(sso) => {
            println!("Role:      {} ({})", sso.role_arn(), sso.region);
        }
        ProfileDescriptor::IamRole(iam) => {
            println!("Role:      {} (via '{}')", iam.role_arn, iam.source_profile);
        }
    }
}
