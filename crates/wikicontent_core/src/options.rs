use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::config::ContentConfig;

/// Account on whose behalf a save-time transform runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub nickname: Option<String>,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nickname: None,
        }
    }

    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    pub fn display_name(&self) -> &str {
        self.nickname
            .as_deref()
            .filter(|nickname| !nickname.trim().is_empty())
            .unwrap_or(&self.name)
    }
}

/// Options that influence rendering and the save/preload transforms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    pub user_language: String,
    pub interface_message: bool,
    /// Fixed clock for signatures; `None` uses the current time.
    pub timestamp: Option<DateTime<Utc>>,
    pub external_link_target: Option<String>,
    pub wrapper_class: Option<String>,
}

impl ParserOptions {
    pub fn canonical(config: &ContentConfig) -> Self {
        Self {
            user_language: config.content_language.clone(),
            interface_message: false,
            timestamp: None,
            external_link_target: None,
            wrapper_class: Some("mw-parser-output".to_string()),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn current_timestamp(&self) -> DateTime<Utc> {
        self.timestamp.unwrap_or_else(Utc::now)
    }

    /// Stable digest of the options that change rendered output.
    ///
    /// The timestamp is excluded: it only feeds the pre-save transform.
    pub fn options_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"lang=");
        hasher.update(self.user_language.as_bytes());
        hasher.update(b";interface=");
        hasher.update(if self.interface_message { b"1" } else { b"0" });
        hasher.update(b";target=");
        hasher.update(self.external_link_target.as_deref().unwrap_or("").as_bytes());
        hasher.update(b";wrapper=");
        hasher.update(self.wrapper_class.as_deref().unwrap_or("").as_bytes());
        let digest = hasher.finalize();
        let mut output = String::with_capacity(16);
        for byte in digest.iter().take(8) {
            output.push_str(&format!("{byte:02x}"));
        }
        output
    }
}

/// Once-computed canonical options snapshot.
///
/// Recomputation is idempotent, so a plain check-then-set under the lock is
/// enough; `reset` exists so tests can start from an empty memo.
#[derive(Debug, Default)]
pub struct DefaultOptions {
    snapshot: Mutex<Option<Arc<ParserOptions>>>,
}

impl DefaultOptions {
    pub const fn new() -> Self {
        Self {
            snapshot: Mutex::new(None),
        }
    }

    pub fn get(&self, config: &ContentConfig) -> Arc<ParserOptions> {
        let mut guard = self
            .snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(snapshot) = guard.as_ref() {
            return Arc::clone(snapshot);
        }
        let snapshot = Arc::new(ParserOptions::canonical(config));
        *guard = Some(Arc::clone(&snapshot));
        snapshot
    }

    pub fn is_computed(&self) -> bool {
        self.snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }

    pub fn reset(&self) {
        *self
            .snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}
