// Renewal protocol - logout, clear caches, login, verify, restart
use super::{SessionEvent, SessionMonitor};
use crate::credentials;
use crate::error::RenewalError;
use crate::exec::args;
use crate::models::SessionPhase;

impl SessionMonitor {
    /// Renew the currently active profile's session.
    pub async fn renew(&self) -> Result<(), RenewalError> {
        let profile = self
            .active_profile()
            .ok_or(RenewalError::NoActiveProfile)?;
        self.renew_profile(&profile).await
    }

    /// Run the full renewal sequence for `profile_name`.
    ///
    /// Steps run strictly in order and the first failure aborts the rest;
    /// there is no compensation and no automatic retry. The login step is
    /// interactive and may block on the user finishing a browser flow.
    pub async fn renew_profile(&self, profile_name: &str) -> Result<(), RenewalError> {
        // Renewal supersedes whatever was being monitored: bump the
        // generation so the old loop goes inert, and clear the old expiry
        // before any step runs.
        let generation = {
            let mut state = self.inner.lock_state();
            state.generation += 1;
            state.clean_disconnect = false;
            state.active_profile = Some(profile_name.to_string());
            state.expires_at = None;
            state.phase = SessionPhase::Connecting;
            let _ = self.inner.events.send(SessionEvent::Update {
                text: format!("Renewing session for '{}'...", profile_name),
            });
            state.generation
        };

        let result = self.renewal_steps(profile_name).await;

        if let Err(err) = &result {
            let mut state = self.inner.lock_state();
            if state.generation == generation {
                state.phase = SessionPhase::NotAuthenticated;
                let _ = self.inner.events.send(SessionEvent::Update {
                    text: format!("Renewal failed for '{}': {}", profile_name, err),
                });
            }
        }
        result
    }

    async fn renewal_steps(&self, profile_name: &str) -> Result<(), RenewalError> {
        let inner = &self.inner;

        // Logout is conceptually best-effort, but a failure here still aborts
        // the sequence rather than continuing against half-torn-down state.
        inner
            .runner
            .run("aws", &args(&["sso", "logout", "--profile", profile_name]))
            .await
            .map_err(|err| failed("logout", err))?;

        let removed = credentials::clear_cache_files(inner.matcher.cache_dir())
            .map_err(|err| failed("clear-cache", err))?;
        tracing::debug!(profile = profile_name, removed, "cleared credential cache");

        inner.mapping.remove(profile_name);
        inner
            .mapping
            .flush()
            .map_err(|err| failed("flush-mapping", err))?;

        inner
            .runner
            .run("aws", &args(&["sso", "login", "--profile", profile_name]))
            .await
            .map_err(|err| failed("login", err))?;

        // Forces the CLI to mint fresh role credentials into its cache.
        inner
            .runner
            .run(
                "aws",
                &args(&["sts", "get-caller-identity", "--profile", profile_name]),
            )
            .await
            .map_err(|err| failed("verify", err))?;

        let _ = inner.events.send(SessionEvent::Renewed);
        tracing::info!(profile = profile_name, "renewal complete, restarting monitor");

        self.start(profile_name)
            .await
            .map_err(|err| failed("restart", err))?;
        Ok(())
    }
}

fn failed(step: &'static str, err: impl std::fmt::Display) -> RenewalError {
    RenewalError::Failed {
        step,
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use crate::credentials::matcher::CacheMatcher;
    use crate::error::{ProcessError, RenewalError};
    use crate::exec::MockProcessRunner;
    use crate::mapping::MappingStore;
    use crate::models::{ProfileDescriptor, SessionPhase, SsoProfile};
    use crate::profiles::ProfileRepository;
    use crate::session::SessionMonitor;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::collections::BTreeMap;
    use std::fs;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    struct StubProfiles {
        profiles: Vec<ProfileDescriptor>,
    }

    impl ProfileRepository for StubProfiles {
        fn get_profile(&self, name: &str) -> Option<ProfileDescriptor> {
            self.profiles.iter().find(|p| p.name() == name).cloned()
        }

        fn session_name_for(&self, _name: &str) -> Option<String> {
            None
        }
    }

    fn sso_profile(name: &str) -> ProfileDescriptor {
        ProfileDescriptor::Sso(SsoProfile {
            name: name.to_string(),
            start_url: format!("https://{}.awsapps.com/start", name),
            region: "us-east-1".to_string(),
            account_id: "123456789012".to_string(),
            role_name: "Developer".to_string(),
        })
    }

    fn seed_cache(dir: &TempDir, name: &str) {
        let ProfileDescriptor::Sso(sso) = sso_profile(name) else {
            unreachable!()
        };
        let mut components = BTreeMap::new();
        components.insert("accountId", sso.account_id.as_str());
        components.insert("roleName", sso.role_name.as_str());
        components.insert("startUrl", sso.start_url.as_str());
        let file_name = crate::credentials::fingerprint::cache_file_name(&components);

        let expiration = (Utc::now() + ChronoDuration::hours(2)).to_rfc3339();
        fs::write(
            dir.path().join(file_name),
            format!(
                r#"{{
                    "ProviderType": "sso",
                    "Credentials": {{
                        "AccessKeyId": "ASIAEXAMPLE",
                        "SecretAccessKey": "secret",
                        "SessionToken": "token",
                        "Expiration": "{expiration}"
                    }}
                }}"#
            ),
        )
        .unwrap();
    }

    fn monitor_with_profiles(
        dir: &TempDir,
        profiles: Vec<ProfileDescriptor>,
        runner: MockProcessRunner,
    ) -> SessionMonitor {
        let mapping = MappingStore::load(dir.path().join("mappings.json"));
        let repo: Arc<dyn ProfileRepository> = Arc::new(StubProfiles { profiles });
        let matcher = CacheMatcher::new(
            dir.path().to_path_buf(),
            Arc::clone(&mapping),
            Arc::clone(&repo),
        );
        SessionMonitor::new(matcher, repo, Arc::new(runner), mapping)
    }

    fn monitor_with(dir: &TempDir, runner: MockProcessRunner) -> SessionMonitor {
        monitor_with_profiles(dir, Vec::new(), runner)
    }

    fn subcommand(args: &[String]) -> String {
        args.first().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_no_active_profile() {
        let dir = TempDir::new().unwrap();
        let monitor = monitor_with(&dir, MockProcessRunner::new());
        assert_eq!(
            monitor.renew().await.unwrap_err(),
            RenewalError::NoActiveProfile
        );
    }

    #[tokio::test]
    async fn test_login_failure_prevents_verify_and_restart() {
        let dir = TempDir::new().unwrap();
        let mut runner = MockProcessRunner::new();

        // logout succeeds, login fails; verify (sts) must never run.
        runner
            .expect_run()
            .withf(|_, args| args.join(" ").starts_with("sso logout"))
            .times(1)
            .returning(|_, _| Ok(String::new()));
        runner
            .expect_run()
            .withf(|_, args| args.join(" ").starts_with("sso login"))
            .times(1)
            .returning(|_, _| {
                Err(ProcessError::NonZeroExit {
                    command: "aws sso login".to_string(),
                    status: 1,
                    stderr: "user cancelled".to_string(),
                })
            });
        runner
            .expect_run()
            .withf(|_, args| subcommand(args) == "sts")
            .times(0);

        let monitor = monitor_with(&dir, runner);
        let err = monitor.renew_profile("prod").await.unwrap_err();
        match err {
            RenewalError::Failed { step, message } => {
                assert_eq!(step, "login");
                assert!(message.contains("user cancelled"));
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_renewal_supersedes_old_monitoring_state() {
        let dir = TempDir::new().unwrap();
        seed_cache(&dir, "profile-a");

        let mut runner = MockProcessRunner::new();
        runner
            .expect_run()
            .withf(|_, args| args.join(" ").starts_with("sso logout"))
            .times(1)
            .returning(|_, _| {
                Err(ProcessError::NonZeroExit {
                    command: "aws sso logout".to_string(),
                    status: 1,
                    stderr: "network down".to_string(),
                })
            });

        let monitor = monitor_with_profiles(&dir, vec![sso_profile("profile-a")], runner);
        monitor.start("profile-a").await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(monitor.phase(), SessionPhase::Monitoring);

        // Renewing a different profile must not leave the monitor claiming
        // profile-b while still counting down profile-a's expiry.
        let err = monitor.renew_profile("profile-b").await.unwrap_err();
        assert!(matches!(err, RenewalError::Failed { step: "logout", .. }));
        assert_eq!(monitor.active_profile(), Some("profile-b".to_string()));
        assert_eq!(monitor.phase(), SessionPhase::NotAuthenticated);
        assert_eq!(monitor.expires_at(), None);
    }

    #[tokio::test]
    async fn test_full_sequence_clears_caches_and_mapping() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("stale.json"), "{}").unwrap();

        let mut runner = MockProcessRunner::new();
        runner
            .expect_run()
            .withf(|_, args| args.join(" ").starts_with("sso logout"))
            .times(1)
            .returning(|_, _| Ok(String::new()));
        runner
            .expect_run()
            .withf(|_, args| args.join(" ").starts_with("sso login"))
            .times(1)
            .returning(|_, _| Ok(String::new()));
        runner
            .expect_run()
            .withf(|_, args| subcommand(args) == "sts")
            .returning(|_, _| Ok("{}".to_string()));

        let monitor = monitor_with(&dir, runner);
        {
            // Simulate a previously remembered assignment.
            let mapping = MappingStore::load(dir.path().join("mappings.json"));
            mapping.insert("prod", "stale.json");
            mapping.flush().unwrap();
        }

        monitor.renew_profile("prod").await.unwrap();
        assert!(!dir.path().join("stale.json").exists());
        assert_eq!(monitor.active_profile(), Some("prod".to_string()));
    }
}
