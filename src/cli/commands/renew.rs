// Renewal command
use crate::cli::Services;
use crate::error::Result;

pub async fn execute(services: &Services, profile_name: &str) -> Result<()> {
    println!("Renewing session for '{}'...", profile_name);
    println!("A browser window may open to complete the SSO login.");

    services.monitor.renew_profile(profile_name).await?;

    println!("✓ Session renewed for '{}'", profile_name);
    Ok(())
}
