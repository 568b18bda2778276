use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use indicatif::ProgressBar;
use parking_lot::Mutex;

pub fn current_timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Diagnostic output for a run.
///
/// Lines go to stderr, through the progress bar while one is attached so the
/// bar is not torn. Every line is also appended to the log file if one was
/// opened, including verbose lines that were not shown.
#[derive(Clone, Default)]
pub struct Logger {
    verbose: bool,
    log_file: Option<Arc<Mutex<File>>>,
    progress: Option<ProgressBar>,
}

impl Logger {
    pub fn new(verbose: bool) -> Self {
        Logger { verbose, ..Default::default() }
    }

    pub fn with_log_file<P: AsRef<Path>>(mut self, path: P) -> io::Result<Self> {
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        self.log_file = Some(Arc::new(Mutex::new(f)));
        Ok(self)
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn attach_progress(&mut self, pb: ProgressBar) {
        self.progress = Some(pb);
    }

    pub fn detach_progress(&mut self) -> Option<ProgressBar> {
        self.progress.take()
    }

    /// Shown only in verbose mode.
    pub fn verbose<S: AsRef<str>>(&self, msg: S) {
        self.emit(msg.as_ref(), self.verbose);
    }

    /// Always shown.
    pub fn info<S: AsRef<str>>(&self, msg: S) {
        self.emit(msg.as_ref(), true);
    }

    /// Always shown, without the timestamp on stderr. The log file copy is
    /// still stamped.
    pub fn notice<S: AsRef<str>>(&self, msg: S) {
        let msg = msg.as_ref();
        self.print(msg);
        self.record(&format!("[{}] {}", current_timestamp(), msg));
    }

    fn emit(&self, msg: &str, to_stderr: bool) {
        let full_message = format!("[{}] {}", current_timestamp(), msg);
        if to_stderr {
            self.print(&full_message);
        }
        self.record(&full_message);
    }

    fn print(&self, line: &str) {
        match &self.progress {
            Some(pb) => pb.println(line),
            None => eprintln!("{}", line),
        }
    }

    fn record(&self, full_message: &str) {
        if let Some(ref lf_arc) = self.log_file {
            let mut lf_guard = lf_arc.lock();
            let _ = writeln!(*lf_guard, "{}", full_message);
            let _ = lf_guard.flush();
        }
    }
}
