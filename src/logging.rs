//! A small async logger plugged into the `log` facade: `log::info!` etc. push
//! onto a bounded channel and a single background thread fans each record
//! out to the configured sinks, so a slow file write never blocks a query
//! task.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::mpsc::{sync_channel, SyncSender};

use log::{Level, LevelFilter, Metadata, Record as LogRecord};

/// Where a log line ends up. Enumerated, not a trait object: the set of
/// sinks is small and fixed at startup.
#[derive(Debug, Clone)]
pub enum LogSink {
    Console,
    File(PathBuf),
}

/// Buffer depth for the channel feeding the dispatcher thread. A burst past
/// this is dropped rather than applying backpressure to query handling.
const LOG_OUTPUT_BUFFER: usize = 1024;

struct Entry {
    level: Level,
    message: String,
}

pub struct Logger {
    sender: SyncSender<Entry>,
    level: LevelFilter,
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &LogRecord) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let entry = Entry {
            level: record.level(),
            message: format!("{}", record.args()),
        };
        // Best-effort: a full buffer means we drop the line rather than
        // stall the caller.
        let _ = self.sender.try_send(entry);
    }

    fn flush(&self) {}
}

fn write_entry(sinks: &[LogSink], entry: &Entry) {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
    let line = format!("{} [{}] {}", timestamp, entry.level, entry.message);
    for sink in sinks {
        match sink {
            LogSink::Console => {
                println!("{line}");
            }
            LogSink::File(path) => {
                if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
                    let _ = writeln!(file, "{line}");
                }
            }
        }
    }
}

/// Install the logger as the global `log` backend and spawn its dispatcher
/// thread. Call once, from `main`.
pub fn init(sinks: Vec<LogSink>, level: LevelFilter) -> Result<(), log::SetLoggerError> {
    let (sender, receiver) = sync_channel::<Entry>(LOG_OUTPUT_BUFFER);

    std::thread::spawn(move || {
        while let Ok(entry) = receiver.recv() {
            write_entry(&sinks, &entry);
        }
    });

    log::set_boxed_logger(Box::new(Logger { sender, level }))?;
    log::set_max_level(level);
    Ok(())
}

pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}
