// Stream session events until interrupted
use crate::cli::Services;
use crate::error::Result;
use crate::expiry;
use crate::session::SessionEvent;
use tokio::sync::broadcast::error::RecvError;

pub async fn execute(services: &Services, profile_name: &str) -> Result<()> {
    let monitor = &services.monitor;
    let mut rx = monitor.subscribe();
    monitor.start(profile_name).await?;

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(SessionEvent::MonitoringStarted { profile }) => {
                    match monitor.expires_at() {
                        Some(at) => println!("Monitoring '{}' (expires {})", profile, at.to_rfc3339()),
                        None => println!("Monitoring '{}'", profile),
                    }
                }
                Ok(SessionEvent::Expired) => {
                    print_event(&SessionEvent::Expired);
                    monitor.stop();
                    break;
                }
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event stream lagging");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                monitor.clean_disconnect();
                println!("Disconnected.");
                break;
            }
        }
    }

    tracing::debug!(phase = monitor.phase().as_str(), "watch loop ended");
    Ok(())
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Update { text } => println!("{}", text),
        SessionEvent::Warning {
            remaining_secs,
            threshold_secs,
        } => println!(
            "⚠ {} left (crossed the {} warning)",
            expiry::format_seconds(*remaining_secs),
            expiry::format_seconds(*threshold_secs)
        ),
        SessionEvent::Expired => println!("Session EXPIRED"),
        SessionEvent::Renewed => println!("Session renewed"),
        SessionEvent::MonitoringStarted { profile } => println!("Monitoring '{}'", profile),
        SessionEvent::MonitoringStopped => println!("Monitoring stopped"),
    }
}
