use std::fmt;
use std::io::{LineWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::Result;

/// Append-only, one message per line, shared by all workers.
///
/// Every record also goes through `log::warn!`.
#[derive(Debug)]
pub struct ErrorLog {
    file: Option<Mutex<LineWriter<fs_err::File>>>,
    count: AtomicUsize,
}

impl ErrorLog {
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => {
                let file = fs_err::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?;
                Some(Mutex::new(LineWriter::new(file)))
            }
            None => None,
        };
        Ok(Self {
            file,
            count: AtomicUsize::new(0),
        })
    }

    pub fn disabled() -> Self {
        Self {
            file: None,
            count: AtomicUsize::new(0),
        }
    }

    pub fn record(&self, msg: impl fmt::Display) {
        let msg = msg.to_string();
        log::warn!("{msg}");
        self.count.fetch_add(1, Ordering::SeqCst);

        if let Some(file) = &self.file {
            let mut file = file.lock().unwrap_or_else(|e| e.into_inner());
            // Newlines inside a message would break the one-per-line format
            let line = msg.replace('\n', " ");
            if let Err(e) = writeln!(file, "{line}") {
                log::error!("Couldn't write error log: {e}");
            }
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}
