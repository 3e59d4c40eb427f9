//! Log level scale and the server-driven minimum-level governor

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::info;

/// Event severity, ordered from least to most severe.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Trace => write!(f, "Trace"),
            Level::Debug => write!(f, "Debug"),
            Level::Info => write!(f, "Info"),
            Level::Warn => write!(f, "Warn"),
            Level::Error => write!(f, "Error"),
            Level::Fatal => write!(f, "Fatal"),
        }
    }
}

impl Level {
    /// Parses a level name, recognizing standard, abbreviated, and
    /// syslog-style synonyms. Unrecognized names yield `None`.
    pub fn parse(name: &str) -> Option<Level> {
        match name.to_ascii_lowercase().as_str() {
            "t" | "tr" | "trc" | "trce" | "trace" => Some(Level::Trace),
            "v" | "ver" | "vrb" | "verb" | "verbose" => Some(Level::Trace),
            "d" | "de" | "dbg" | "deb" | "dbug" | "debu" | "debug" => Some(Level::Debug),
            "i" | "in" | "inf" | "info" | "information" => Some(Level::Info),
            "notice" => Some(Level::Info),
            "w" | "wa" | "war" | "wrn" | "warn" | "warning" => Some(Level::Warn),
            "e" | "er" | "err" | "erro" | "eror" | "error" => Some(Level::Error),
            "f" | "fa" | "ftl" | "fat" | "fatl" | "fatal" => Some(Level::Fatal),
            "c" | "cr" | "crt" | "cri" | "crit" | "critical" => Some(Level::Fatal),
            "emerg" | "panic" => Some(Level::Fatal),
            _ => None,
        }
    }

    fn from_index(index: u8) -> Option<Level> {
        match index {
            0 => Some(Level::Trace),
            1 => Some(Level::Debug),
            2 => Some(Level::Info),
            3 => Some(Level::Warn),
            4 => Some(Level::Error),
            5 => Some(Level::Fatal),
            _ => None,
        }
    }
}

// Why not use a JSON parser here? For a single field it's not worth the
// allocation; the server's ingestion response is tiny and the marker is
// stable.
const LEVEL_MARKER: &str = "\"MinimumLevelAccepted\":\"";

/// Scans an ingestion response body for the minimum-accepted-level
/// directive. A missing or malformed directive yields `None`.
pub fn read_minimum_accepted_level(body: &str) -> Option<Level> {
    let start = body.find(LEVEL_MARKER)? + LEVEL_MARKER.len();
    if start >= body.len() {
        return None;
    }
    let end = body[start..].find('"')? + start;
    Level::parse(&body[start..end])
}

const NO_MINIMUM: u8 = u8::MAX;

/// Process-wide record of the last minimum level the server communicated.
///
/// Shared across delivery tasks; the directive from each successful send
/// overwrites the previous value, in either direction.
#[derive(Debug)]
pub struct LevelGovernor {
    minimum: AtomicU8,
}

impl LevelGovernor {
    pub fn new() -> Self {
        Self {
            minimum: AtomicU8::new(NO_MINIMUM),
        }
    }

    /// The current minimum accepted level, if the server has sent one.
    pub fn minimum(&self) -> Option<Level> {
        Level::from_index(self.minimum.load(Ordering::Relaxed))
    }

    /// Whether an event at `level` should be shipped.
    pub fn accepts(&self, level: Level) -> bool {
        match self.minimum() {
            None => true,
            Some(minimum) => level >= minimum,
        }
    }

    /// Records a directive from the server. `None` (no directive in the
    /// response) leaves the current state untouched.
    pub fn observe(&self, directive: Option<Level>) {
        let Some(level) = directive else { return };
        let previous = self.minimum.swap(level as u8, Ordering::Relaxed);
        if previous != level as u8 {
            info!("Seq server changed minimum accepted level to {}", level);
        }
    }
}

impl Default for LevelGovernor {
    fn default() -> Self {
        Self::new()
    }
}
