// Session monitoring - tracks the active profile's credential lifetime
mod renew;

use crate::credentials::matcher::CacheMatcher;
use crate::error::Result;
use crate::exec::{args, ProcessRunner};
use crate::expiry::{self, ThresholdTracker};
use crate::mapping::MappingStore;
use crate::models::{ProfileDescriptor, SessionPhase};
use crate::profiles::ProfileRepository;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};

pub const TICK_PERIOD: Duration = Duration::from_secs(1);
pub const DEFAULT_REVALIDATE_INTERVAL: Duration = Duration::from_secs(60);
const EVENT_CAPACITY: usize = 64;

/// Status events published to whoever is observing the session (CLI output,
/// a menu bar, tests). Delivery is in-order per monitoring generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Update { text: String },
    Warning { remaining_secs: i64, threshold_secs: i64 },
    Expired,
    Renewed,
    MonitoringStarted { profile: String },
    MonitoringStopped,
}

/// The single piece of mutable session state, owned by the monitor.
struct SessionState {
    phase: SessionPhase,
    active_profile: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    /// Bumped on every start/stop/clean-disconnect; asynchronous work
    /// captures the value current at its birth and becomes inert when the
    /// stored value has moved on.
    generation: u64,
    clean_disconnect: bool,
}

/// Tracks one profile's credential expiry in the background.
///
/// `start` supersedes any earlier monitoring via the generation token rather
/// than by joining tasks: stale continuations observe the mismatch and drop
/// their results without touching state or publishing.
pub struct SessionMonitor {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    matcher: CacheMatcher,
    profiles: Arc<dyn ProfileRepository>,
    runner: Arc<dyn ProcessRunner>,
    mapping: Arc<MappingStore>,
    revalidate_interval: Duration,
}

impl SessionMonitor {
    pub fn new(
        matcher: CacheMatcher,
        profiles: Arc<dyn ProfileRepository>,
        runner: Arc<dyn ProcessRunner>,
        mapping: Arc<MappingStore>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SessionState {
                    phase: SessionPhase::Idle,
                    active_profile: None,
                    expires_at: None,
                    generation: 0,
                    clean_disconnect: false,
                }),
                events,
                matcher,
                profiles,
                runner,
                mapping,
                revalidate_interval: DEFAULT_REVALIDATE_INTERVAL,
            }),
        }
    }

    /// Override how often the monitor re-reads the cache to pick up external
    /// renewals. Takes effect only before the monitor is started or shared.
    pub fn with_revalidate_interval(mut self, interval: Duration) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.revalidate_interval = interval;
        }
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.lock_state().phase
    }

    pub fn active_profile(&self) -> Option<String> {
        self.inner.lock_state().active_profile.clone()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock_state().expires_at
    }

    /// Begin monitoring `profile_name`, superseding any earlier session.
    /// Returns once the connecting status is published; resolution continues
    /// in the background.
    pub async fn start(&self, profile_name: &str) -> Result<()> {
        let generation = {
            let mut state = self.inner.lock_state();
            state.generation += 1;
            state.clean_disconnect = false;
            state.active_profile = Some(profile_name.to_string());
            state.expires_at = None;
            state.phase = SessionPhase::Connecting;
            let _ = self.inner.events.send(SessionEvent::Update {
                text: format!("Connecting to '{}'...", profile_name),
            });
            state.generation
        };

        let inner = Arc::clone(&self.inner);
        let name = profile_name.to_string();
        tokio::spawn(async move {
            inner.connect(name, generation).await;
        });
        Ok(())
    }

    /// Stop monitoring and clear state. Emits a stopped notification for
    /// external observers; calling again is a no-op.
    pub fn stop(&self) {
        self.shutdown(false);
    }

    /// User-requested disconnect: like `stop` but suppresses the stopped and
    /// expired notifications so the UI does not raise a false alarm.
    pub fn clean_disconnect(&self) {
        self.shutdown(true);
    }

    fn shutdown(&self, clean: bool) {
        {
            let mut state = self.inner.lock_state();
            state.generation += 1;
            state.clean_disconnect = clean;
            let was_active = state.active_profile.take().is_some();
            state.expires_at = None;
            state.phase = if clean {
                SessionPhase::Disconnected
            } else {
                SessionPhase::Idle
            };
            let _ = self.inner.events.send(SessionEvent::Update {
                text: "No active session".to_string(),
            });
            if was_active && !clean {
                let _ = self.inner.events.send(SessionEvent::MonitoringStopped);
            }
        }

        // Disconnect is a critical transition: the mapping document must hit
        // disk before the process can go away.
        if let Err(err) = self.inner.mapping.flush() {
            tracing::warn!(%err, "failed to flush cache mapping on disconnect");
        }
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock_state().generation == generation
    }

    /// Publish only when `generation` is still the active one. The check and
    /// the send happen under the state lock, so a superseding `start` can
    /// never be interleaved between them.
    fn publish_if_current(&self, generation: u64, event: SessionEvent) -> bool {
        let state = self.lock_state();
        if state.generation != generation {
            return false;
        }
        let _ = self.events.send(event);
        true
    }

    async fn connect(self: Arc<Self>, name: String, generation: u64) {
        let Some(profile) = self.profiles.get_profile(&name) else {
            let mut state = self.lock_state();
            if state.generation == generation {
                state.phase = SessionPhase::NotAuthenticated;
                let _ = self.events.send(SessionEvent::Update {
                    text: format!("Profile '{}' not found", name),
                });
            }
            return;
        };

        let mut hit = self.matcher.resolve(&profile);

        if hit.is_none() {
            if !self.is_current(generation) {
                return;
            }
            tracing::info!(profile = %name, "no cached credential, triggering refresh");
            if let Err(err) = self
                .runner
                .run("aws", &args(&["sts", "get-caller-identity", "--profile", &name]))
                .await
            {
                tracing::warn!(profile = %name, %err, "credential refresh failed");
            }
            if !self.is_current(generation) {
                return;
            }
            hit = self.matcher.resolve(&profile);
        }

        match hit {
            Some(hit) => {
                let expires_at = hit.record.expires_at();
                {
                    let mut state = self.lock_state();
                    if state.generation != generation {
                        return;
                    }
                    state.phase = SessionPhase::Monitoring;
                    state.expires_at = Some(expires_at);
                    let _ = self.events.send(SessionEvent::MonitoringStarted {
                        profile: name.clone(),
                    });
                    let _ = self.events.send(SessionEvent::Update {
                        text: format!(
                            "Session active, {} remaining",
                            expiry::format_time_remaining(&expires_at)
                        ),
                    });
                }
                tracing::info!(
                    profile = %name,
                    strategy = hit.strategy.as_str(),
                    %expires_at,
                    "monitoring started"
                );

                // Connect is a critical transition for the mapping document.
                if let Err(err) = self.mapping.flush() {
                    tracing::warn!(%err, "failed to flush cache mapping on connect");
                }

                let inner = Arc::clone(&self);
                tokio::spawn(async move {
                    inner.monitor_loop(profile, generation, expires_at).await;
                });
            }
            None => {
                let mut state = self.lock_state();
                if state.generation != generation {
                    return;
                }
                state.phase = SessionPhase::NotAuthenticated;
                let _ = self.events.send(SessionEvent::Update {
                    text: format!("Not authenticated for '{}', renewal required", name),
                });
            }
        }
    }

    async fn monitor_loop(
        self: Arc<Self>,
        profile: ProfileDescriptor,
        generation: u64,
        mut expires_at: DateTime<Utc>,
    ) {
        let mut tracker = ThresholdTracker::new((expires_at - Utc::now()).num_seconds());
        let mut interval = tokio::time::interval(TICK_PERIOD);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_revalidate = Instant::now();

        loop {
            interval.tick().await;
            if !self.is_current(generation) {
                return;
            }

            // Pick up external renewal: at most once per revalidation
            // interval, re-resolve the credential and adopt a new expiry.
            if last_revalidate.elapsed() >= self.revalidate_interval {
                last_revalidate = Instant::now();
                if let Some(hit) = self.matcher.resolve(&profile) {
                    let fresh = hit.record.expires_at();
                    if fresh != expires_at {
                        let renewed = fresh > expires_at;
                        expires_at = fresh;
                        tracker.reset((fresh - Utc::now()).num_seconds());
                        let mut state = self.lock_state();
                        if state.generation != generation {
                            return;
                        }
                        state.expires_at = Some(fresh);
                        if renewed {
                            let _ = self.events.send(SessionEvent::Renewed);
                        }
                    }
                }
            }

            let remaining = (expires_at - Utc::now()).num_seconds();
            if remaining <= 0 {
                let mut state = self.lock_state();
                if state.generation != generation {
                    return;
                }
                state.phase = SessionPhase::Expired;
                state.expires_at = None;
                if !state.clean_disconnect {
                    let _ = self.events.send(SessionEvent::Expired);
                    let _ = self.events.send(SessionEvent::Update {
                        text: "Session expired".to_string(),
                    });
                }
                return;
            }

            for threshold in tracker.advance(remaining) {
                if !self.publish_if_current(
                    generation,
                    SessionEvent::Warning {
                        remaining_secs: remaining,
                        threshold_secs: threshold,
                    },
                ) {
                    return;
                }
            }

            if !self.publish_if_current(
                generation,
                SessionEvent::Update {
                    text: format!("{} remaining", expiry::format_seconds(remaining)),
                },
            ) {
                return;
            }
        }
    }
}
