//! Subscriber records and per-user preferences.

use serde::{Deserialize, Serialize};

/// Per-chat subscription record.
///
/// A record exists exactly while at least one source is subscribed; an empty
/// source set is never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(default)]
    pub sources: Vec<String>,

    /// Inline language carried by the older per-record layout. Lifted into
    /// [`Preferences`] at load time and not written back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Per-chat preferences, independent of subscription existence.
///
/// A user can hold a language preference without ever subscribing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Last product version this user was notified about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}
