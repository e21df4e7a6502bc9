//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Hold the process-wide log level
//! - Apply level changes pushed by the configuration watcher at runtime
//!
//! # Design Decisions
//! - The level is a single atomic; readers never block on the writer
//! - Only the task started by `LogLevel::watch` writes it
//! - `RUST_LOG`, when set, still narrows output per target

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::level_filters::LevelFilter;
use tracing::Metadata;
use tracing_subscriber::filter::{filter_fn, FilterFn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Shared, lock-free log level.
#[derive(Debug, Clone)]
pub struct LogLevel(Arc<AtomicU8>);

impl LogLevel {
    pub fn new(level: LevelFilter) -> Self {
        Self(Arc::new(AtomicU8::new(encode(level))))
    }

    pub fn current(&self) -> LevelFilter {
        decode(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, level: LevelFilter) {
        self.0.store(encode(level), Ordering::Relaxed);
    }

    /// Per-layer filter that consults the current level on every event.
    pub fn filter(&self) -> FilterFn<impl Fn(&Metadata<'_>) -> bool> {
        let level = self.clone();
        filter_fn(move |meta| *meta.level() <= level.current())
    }

    /// Own the level: apply every update received until the channel closes.
    pub fn watch(self, mut updates: mpsc::UnboundedReceiver<String>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(raw) = updates.recv().await {
                self.apply(&raw);
            }
            tracing::debug!("Log level watcher stopped");
        })
    }

    fn apply(&self, raw: &str) {
        match parse_level(raw) {
            Some(level) => {
                self.store(level);
                tracing::info!(level = %level, "set log level to {}", raw.trim());
            }
            None => tracing::warn!(value = %raw, "Ignoring unknown log level"),
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::new(LevelFilter::INFO)
    }
}

/// Parse a configured level name.
pub fn parse_level(raw: &str) -> Option<LevelFilter> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::OFF),
        "error" => Some(LevelFilter::ERROR),
        "warn" | "warning" => Some(LevelFilter::WARN),
        "info" => Some(LevelFilter::INFO),
        "debug" => Some(LevelFilter::DEBUG),
        "trace" => Some(LevelFilter::TRACE),
        _ => None,
    }
}

/// Install the global subscriber. Call once at startup.
pub fn init_logging(level: &LogLevel) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().ok())
        .with(tracing_subscriber::fmt::layer().with_filter(level.filter()))
        .init();
}

fn encode(level: LevelFilter) -> u8 {
    if level == LevelFilter::OFF {
        0
    } else if level == LevelFilter::ERROR {
        1
    } else if level == LevelFilter::WARN {
        2
    } else if level == LevelFilter::INFO {
        3
    } else if level == LevelFilter::DEBUG {
        4
    } else {
        5
    }
}

fn decode(raw: u8) -> LevelFilter {
    match raw {
        0 => LevelFilter::OFF,
        1 => LevelFilter::ERROR,
        2 => LevelFilter::WARN,
        3 => LevelFilter::INFO,
        4 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("info"), Some(LevelFilter::INFO));
        assert_eq!(parse_level(" DEBUG "), Some(LevelFilter::DEBUG));
        assert_eq!(parse_level("warning"), Some(LevelFilter::WARN));
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn test_encode_roundtrip() {
        for level in [
            LevelFilter::OFF,
            LevelFilter::ERROR,
            LevelFilter::WARN,
            LevelFilter::INFO,
            LevelFilter::DEBUG,
            LevelFilter::TRACE,
        ] {
            assert_eq!(decode(encode(level)), level);
        }
    }

    #[tokio::test]
    async fn test_watch_applies_updates() {
        let level = LogLevel::new(LevelFilter::INFO);
        let (tx, rx) = mpsc::unbounded_channel();
        let task = level.clone().watch(rx);

        tx.send("error".to_string()).unwrap();
        tx.send("nonsense".to_string()).unwrap();
        drop(tx);
        task.await.unwrap();

        // Unknown values leave the last good level in place.
        assert_eq!(level.current(), LevelFilter::ERROR);
    }
}
