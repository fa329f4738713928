//! Log sink that records entries for assertions

use std::sync::{Arc, Mutex};

use errata_core::{Attributes, LogLevel, LogSink};

#[derive(Debug, Clone)]
pub struct Entry {
    pub level: LogLevel,
    pub message: String,
    pub attributes: Attributes,
}

/// Shared, cloneable capture of every entry logged through it
#[derive(Debug, Clone, Default)]
pub struct CapturingSink {
    entries: Arc<Mutex<Vec<Entry>>>,
}

impl CapturingSink {
    pub fn entries(&self) -> Vec<Entry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn at(&self, level: LogLevel) -> Vec<Entry> {
        self.entries().into_iter().filter(|entry| entry.level == level).collect()
    }
}

impl LogSink for CapturingSink {
    fn log(&self, level: LogLevel, message: &str, attributes: &Attributes) {
        self.entries.lock().unwrap().push(Entry {
            level,
            message: message.to_owned(),
            attributes: attributes.clone(),
        });
    }
}
