//! Config file watching for hot reload.
//!
//! Only what can change at runtime is forwarded: engine settings and the auth
//! table. Balancers, listeners and storage are read once at startup.
//!
//! One save usually produces several `notify` events (truncate, write,
//! metadata). Events are gathered for a short quiet window and the file is
//! read once per burst. Each reload carries only the fields that differ from
//! the previous file contents, so settings changed through the admin API are
//! not overwritten by untouched file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};

use crate::config::loader::load_config;
use crate::config::schema::{AuthRule, RelayConfig, RelaySettings, SettingsPatch};

/// Quiet period after the last event before the file is read.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Runtime changes found in a rewritten config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigReload {
    /// Settings whose file value changed.
    pub settings: SettingsPatch,
    /// The new auth table, when it changed.
    pub auth: Option<Vec<AuthRule>>,
}

impl ConfigReload {
    pub fn is_empty(&self) -> bool {
        self.settings == SettingsPatch::default() && self.auth.is_none()
    }
}

fn changed<T: PartialEq + Clone>(old: &T, new: &T) -> Option<T> {
    (old != new).then(|| new.clone())
}

fn settings_delta(old: &RelaySettings, new: &RelaySettings) -> SettingsPatch {
    SettingsPatch {
        enabled: changed(&old.enabled, &new.enabled),
        debug_logging: changed(&old.debug_logging, &new.debug_logging),
        timeout_ms: changed(&old.timeout_ms, &new.timeout_ms),
        retry_count: changed(&old.retry_count, &new.retry_count),
        simple_mode: changed(&old.simple_mode, &new.simple_mode),
        encryption_key: changed(&old.encryption_key, &new.encryption_key),
        restrict_to_known_blocked_hosts: changed(
            &old.restrict_to_known_blocked_hosts,
            &new.restrict_to_known_blocked_hosts,
        ),
        auto_rotate_on_failure: changed(&old.auto_rotate_on_failure, &new.auto_rotate_on_failure),
        show_notifications: changed(&old.show_notifications, &new.show_notifications),
    }
}

/// Watches one config file and emits `ConfigReload`s.
pub struct ConfigWatcher {
    path: PathBuf,
    debounce: Duration,
    settings: RelaySettings,
    auth: Vec<AuthRule>,
}

impl ConfigWatcher {
    /// Watcher for `path`, diffing against `current` (the config in effect).
    pub fn new(path: &Path, current: &RelayConfig) -> Self {
        Self {
            path: path.to_path_buf(),
            debounce: DEFAULT_DEBOUNCE,
            settings: current.settings.clone(),
            auth: current.auth.clone(),
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Start watching. The returned `RecommendedWatcher` must be kept alive;
    /// reloads stop when it is dropped or `shutdown` fires.
    pub fn spawn(
        self,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(RecommendedWatcher, mpsc::UnboundedReceiver<ConfigReload>), notify::Error> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    let _ = event_tx.send(());
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?self.path, "Config watcher started");

        let (reload_tx, reload_rx) = mpsc::unbounded_channel();
        tokio::spawn(self.coalesce(event_rx, reload_tx, shutdown));
        Ok((watcher, reload_rx))
    }

    /// Turn bursts of file events into at most one reload each.
    async fn coalesce(
        mut self,
        mut events: mpsc::UnboundedReceiver<()>,
        reloads: mpsc::UnboundedSender<ConfigReload>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                event = events.recv() => {
                    if event.is_none() {
                        break;
                    }
                }
                _ = shutdown.recv() => break,
            }

            tokio::time::sleep(self.debounce).await;
            let mut burst = 1;
            while events.try_recv().is_ok() {
                burst += 1;
            }

            if let Some(reload) = self.reload() {
                tracing::info!(events = burst, "Config file changed");
                if reloads.send(reload).is_err() {
                    break;
                }
            }
        }
    }

    /// Read the file and diff it against the previous contents.
    fn reload(&mut self) -> Option<ConfigReload> {
        let config = match load_config(&self.path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(
                    path = ?self.path,
                    error = %e,
                    "Failed to reload config, keeping current configuration"
                );
                return None;
            }
        };

        let reload = ConfigReload {
            settings: settings_delta(&self.settings, &config.settings),
            auth: changed(&self.auth, &config.auth),
        };
        self.settings = config.settings;
        self.auth = config.auth;

        if reload.is_empty() {
            tracing::debug!(path = ?self.path, "Config file rewritten without runtime changes");
            return None;
        }
        Some(reload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config(content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("relay-watch-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_bursts_coalesce_into_one_delta() {
        let path = temp_config("[settings]\ntimeout_ms = 5000\n");
        let initial = load_config(&path).unwrap();
        let watcher = ConfigWatcher::new(&path, &initial).with_debounce(Duration::from_millis(20));

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (reload_tx, mut reloads) = mpsc::unbounded_channel();
        let (_stop_tx, stop_rx) = broadcast::channel(1);
        tokio::spawn(watcher.coalesce(event_rx, reload_tx, stop_rx));

        std::fs::write(&path, "[settings]\ntimeout_ms = 9000\n").unwrap();
        for _ in 0..3 {
            event_tx.send(()).unwrap();
        }
        let reload = reloads.recv().await.unwrap();
        assert_eq!(
            reload,
            ConfigReload {
                settings: SettingsPatch {
                    timeout_ms: Some(9000),
                    ..SettingsPatch::default()
                },
                auth: None,
            }
        );

        // Touched but unchanged.
        event_tx.send(()).unwrap();
        let quiet = tokio::time::timeout(Duration::from_millis(150), reloads.recv()).await;
        assert!(quiet.is_err());

        // Invalid files are skipped and do not become the new baseline.
        std::fs::write(&path, "[settings]\nretry_count = 0\n").unwrap();
        event_tx.send(()).unwrap();
        let quiet = tokio::time::timeout(Duration::from_millis(150), reloads.recv()).await;
        assert!(quiet.is_err());

        std::fs::write(
            &path,
            "[settings]\ntimeout_ms = 9000\n\n[[auth]]\ndomain = \"rezka\"\ntoken = \"t-1\"\n",
        )
        .unwrap();
        event_tx.send(()).unwrap();
        let reload = reloads.recv().await.unwrap();
        assert_eq!(reload.settings, SettingsPatch::default());
        assert_eq!(reload.auth, Some(vec![AuthRule::new("rezka", "t-1")]));

        std::fs::remove_file(&path).unwrap_or_default();
    }

    #[tokio::test]
    async fn test_shutdown_stops_coalescing() {
        let path = temp_config("");
        let watcher = ConfigWatcher::new(&path, &RelayConfig::default());

        let (_event_tx, event_rx) = mpsc::unbounded_channel();
        let (reload_tx, _reloads) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = broadcast::channel(1);
        let task = tokio::spawn(watcher.coalesce(event_rx, reload_tx, stop_rx));

        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        std::fs::remove_file(&path).unwrap_or_default();
    }
}
