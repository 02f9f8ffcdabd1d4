use std::io::{self, IsTerminal, Write};
use std::sync::Mutex;

use log::{Level, LevelFilter, Metadata, Record};

/// Installs the process-wide logger with the level taken from the
/// `STAMPEDE_LOG` environment variable, falling back to info.
pub fn init_from_env() {
    let level = std::env::var("STAMPEDE_LOG")
        .ok()
        .and_then(|raw| raw.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);

    init_with_level(level);
}

pub fn init_with_level(level: LevelFilter) {
    let logger = Logger {
        writer: Mutex::new(io::stdout()),
        color: io::stdout().is_terminal(),
    };

    log::set_boxed_logger(Box::new(logger))
        .map(|()| log::set_max_level(level))
        .expect("logger should only be installed once");
}

struct Logger<W> {
    writer: Mutex<W>,
    color: bool,
}

impl<W: io::Write> Logger<W> {
    fn log_inner(&self, record: &Record) -> io::Result<()> {
        let now = chrono::Local::now();

        let mut w = self.writer.lock().expect("lock should never be poisoned");
        write!(w, "{} ", now.format("%Y-%m-%d %H:%M:%S%.3f"))?;
        if self.color {
            match record.level() {
                Level::Trace => write!(w, "[\x1b[36mTRACE\x1b[0m]")?,
                Level::Debug => write!(w, "[\x1b[34mDEBUG\x1b[0m]")?,
                Level::Info => write!(w, "[\x1b[32mINFO\x1b[0m]")?,
                Level::Warn => write!(w, "[\x1b[33mWARN\x1b[0m]")?,
                Level::Error => write!(w, "[\x1b[31m\x1b[1mERROR\x1b[0m]")?,
            }
        } else {
            match record.level() {
                Level::Trace => write!(w, "[TRACE]")?,
                Level::Debug => write!(w, "[DEBUG]")?,
                Level::Info => write!(w, "[INFO]")?,
                Level::Warn => write!(w, "[WARN]")?,
                Level::Error => write!(w, "[ERROR]")?,
            }
        }
        writeln!(w, " {}", record.args())?;
        Ok(())
    }
}

impl<W: io::Write + Send> log::Log for Logger<W> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.target().starts_with("stampede") || metadata.target().starts_with("bot_army")
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let _ = self.log_inner(record);
        }
    }

    fn flush(&self) {}
}
