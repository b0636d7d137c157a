//! write-only append log of queries, decisions and replies

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Mutex;

use chrono::prelude::*;

use crate::dns::Result;

/// Line-oriented event log: each line is "timestamp - message", appended to
/// a file and echoed to stdout. Purely observational, nothing reads it back.
pub struct EventLog {
    file: Option<Mutex<File>>,
    echo: bool,
}

impl EventLog {
    pub fn to_file(path: &str) -> Result<EventLog> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(EventLog {
            file: Some(Mutex::new(file)),
            echo: true,
        })
    }

    pub fn stdout() -> EventLog {
        EventLog {
            file: None,
            echo: true,
        }
    }

    /// Silent sink, used by tests.
    pub fn disabled() -> EventLog {
        EventLog {
            file: None,
            echo: false,
        }
    }

    pub fn write(&self, message: &str) {
        let line = format!(
            "{} - {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            message
        );

        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = writeln!(file, "{}", line);
            }
        }

        if self.echo {
            println!("{}", line);
        }
    }
}
