//! Stderr logger for scan sessions.
//!
//! Lines look like `[  1.234s  INFO engine] message`: seconds since the logger
//! was installed, the level, and the last segment of the record target so that
//! engine, detector and CLI messages stay distinguishable in a long session.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

struct SessionLogger {
    level: LevelFilter,
    started: Instant,
}

fn short_target(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

impl Log for SessionLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "[{:8.3}s {:>5} {}] {}\n",
            self.started.elapsed().as_secs_f64(),
            record.level(),
            short_target(record.target()),
            record.args()
        );
        // One write per record keeps lines whole across threads.
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<SessionLogger> = OnceLock::new();

/// Route `log` records of every crate to stderr, filtered at `level`.
///
/// Only the first call installs the logger; later calls return `Ok(())` and
/// leave the level unchanged.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let logger = LOGGER.get_or_init(|| SessionLogger {
        level,
        started: Instant::now(),
    });
    log::set_logger(logger).map(|()| log::set_max_level(level))
}

/// Install a `tracing` subscriber honouring `RUST_LOG` (default `info`).
///
/// Span close events carry the busy/idle time of every instrumented tick and
/// detection pass. An already installed subscriber is left in place.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);
    let installed = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder.with_target(false).finish().try_init()
    };
    if installed.is_err() {
        log::debug!("tracing subscriber already installed");
    }
}
