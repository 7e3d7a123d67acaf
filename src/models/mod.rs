// src/models/mod.rs

//! Domain models for kinowatch.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod film;
mod subscriber;

// Re-export all public types
pub use config::{
    BotConfig, CacheConfig, Config, HttpConfig, NotifyLimits, ScraperKind, SourceConfig,
};
pub use film::{Film, ProgramSnapshot, Showtime};
pub use subscriber::{Preferences, Subscription};
