//! Process-scoped sync client settings
//!
//! The sync client reads its log level, log sink and user agent once, when the
//! first synchronized session opens. [`ProcessSettings`] makes that ordering
//! explicit: settings are mutable until [`ProcessSettings::freeze`] is called
//! (the session opener does this on the first sync open) and reject changes
//! afterwards with [`Error::SettingsFrozen`].
//!
//! Settings are an explicit object passed to the opener rather than global
//! state, so tests can use independent instances.

use crate::error::{Error, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Verbosity of the sync client's log output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Everything
    All,
    /// Protocol-level tracing
    Trace,
    /// Debugging detail
    Debug,
    /// Extra detail on top of `Info`
    Detail,
    /// Normal operational messages
    #[default]
    Info,
    /// Unexpected but handled conditions
    Warn,
    /// Failures
    Error,
    /// Failures that end the session
    Fatal,
    /// Nothing
    Off,
}

impl LogLevel {
    /// Map to the nearest `tracing` level, `None` for `Off`
    pub fn as_tracing(self) -> Option<tracing::Level> {
        match self {
            LogLevel::All | LogLevel::Trace => Some(tracing::Level::TRACE),
            LogLevel::Debug | LogLevel::Detail => Some(tracing::Level::DEBUG),
            LogLevel::Info => Some(tracing::Level::INFO),
            LogLevel::Warn => Some(tracing::Level::WARN),
            LogLevel::Error | LogLevel::Fatal => Some(tracing::Level::ERROR),
            LogLevel::Off => None,
        }
    }
}

/// Log sink installed in place of the default `tracing` output
///
/// Invoked from the sync client's threads without serialization; the sink must
/// handle concurrent calls itself.
pub type CustomLogger = Arc<dyn Fn(&str, LogLevel) + Send + Sync>;

/// Snapshot of settings handed to the native sync client
#[derive(Clone)]
pub struct SyncClientSettings {
    /// Full user agent sent with sync connections
    pub user_agent: String,
    /// Log verbosity
    pub log_level: LogLevel,
    /// Custom log sink, if installed
    pub logger: Option<CustomLogger>,
}

impl fmt::Debug for SyncClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncClientSettings")
            .field("user_agent", &self.user_agent)
            .field("log_level", &self.log_level)
            .field("logger", &self.logger.as_ref().map(|_| ".."))
            .finish()
    }
}

impl SyncClientSettings {
    /// Deliver one log line to the custom sink or to `tracing`
    pub fn log(&self, level: LogLevel, message: &str) {
        if level < self.log_level || self.log_level == LogLevel::Off {
            return;
        }
        match &self.logger {
            Some(logger) => logger(message, level),
            None => match level.as_tracing() {
                Some(tracing::Level::TRACE) => tracing::trace!(target: "vellum::sync", "{}", message),
                Some(tracing::Level::DEBUG) => tracing::debug!(target: "vellum::sync", "{}", message),
                Some(tracing::Level::INFO) => tracing::info!(target: "vellum::sync", "{}", message),
                Some(tracing::Level::WARN) => tracing::warn!(target: "vellum::sync", "{}", message),
                Some(_) => tracing::error!(target: "vellum::sync", "{}", message),
                None => {}
            },
        }
    }
}

struct SettingsState {
    frozen: bool,
    log_level: LogLevel,
    logger: Option<CustomLogger>,
    app_user_agent: Option<String>,
}

/// Write-once-before-first-use sync client settings
pub struct ProcessSettings {
    state: RwLock<SettingsState>,
}

impl ProcessSettings {
    /// Create settings with defaults (`Info`, `tracing` sink, SDK user agent)
    pub fn new() -> Self {
        Self {
            state: RwLock::new(SettingsState {
                frozen: false,
                log_level: LogLevel::default(),
                logger: None,
                app_user_agent: None,
            }),
        }
    }

    /// Set the log verbosity
    pub fn set_log_level(&self, level: LogLevel) -> Result<()> {
        let mut state = self.state.write();
        if state.frozen {
            return Err(Error::SettingsFrozen);
        }
        state.log_level = level;
        Ok(())
    }

    /// Install a custom log sink
    pub fn set_custom_logger(&self, logger: CustomLogger) -> Result<()> {
        let mut state = self.state.write();
        if state.frozen {
            return Err(Error::SettingsFrozen);
        }
        state.logger = Some(logger);
        Ok(())
    }

    /// Set the application part of the user agent
    pub fn set_user_agent(&self, user_agent: impl Into<String>) -> Result<()> {
        let user_agent = user_agent.into();
        if user_agent.trim().is_empty() {
            return Err(Error::InvalidConfiguration(
                "user agent must not be empty".into(),
            ));
        }
        let mut state = self.state.write();
        if state.frozen {
            return Err(Error::SettingsFrozen);
        }
        state.app_user_agent = Some(user_agent);
        Ok(())
    }

    /// Current log verbosity
    pub fn log_level(&self) -> LogLevel {
        self.state.read().log_level
    }

    /// Application user agent, if set
    pub fn app_user_agent(&self) -> Option<String> {
        self.state.read().app_user_agent.clone()
    }

    /// Full user agent: SDK part plus the application part
    pub fn user_agent(&self) -> String {
        let sdk = sdk_user_agent();
        match &self.state.read().app_user_agent {
            Some(app) => format!("{} {}", sdk, app),
            None => sdk,
        }
    }

    /// Check if the settings can no longer change
    pub fn is_frozen(&self) -> bool {
        self.state.read().frozen
    }

    /// Freeze the settings
    ///
    /// Returns the snapshot for the sync client on the first call and `None`
    /// on every later call, so the client is configured exactly once.
    pub fn freeze(&self) -> Option<SyncClientSettings> {
        let mut state = self.state.write();
        if state.frozen {
            return None;
        }
        state.frozen = true;
        let sdk = sdk_user_agent();
        let user_agent = match &state.app_user_agent {
            Some(app) => format!("{} {}", sdk, app),
            None => sdk,
        };
        Some(SyncClientSettings {
            user_agent,
            log_level: state.log_level,
            logger: state.logger.clone(),
        })
    }
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// SDK part of the user agent
pub fn sdk_user_agent() -> String {
    format!("Vellum/{} (rust)", env!("CARGO_PKG_VERSION"))
}
