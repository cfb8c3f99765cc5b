//! Message-sink logging for build-tool hosts.
//!
//! Build integrations (command line, project systems) report through
//! this trait; no structured levels, just messages, so any host sink
//! fits.

/// A plain message sink.
pub trait Logger {
    fn message(&mut self, text: &str);
}

/// Logs to standard error.
#[derive(Debug, Default)]
pub struct StderrLogger;

impl Logger for StderrLogger {
    fn message(&mut self, text: &str) {
        eprintln!("{text}");
    }
}

/// Collects messages in memory; used by tests and embedding hosts.
#[derive(Debug, Default)]
pub struct BufferLogger {
    pub messages: Vec<String>,
}

impl Logger for BufferLogger {
    fn message(&mut self, text: &str) {
        self.messages.push(text.to_owned());
    }
}
