//! Test utilities for handler and middleware testing.
//!
//! This module provides a [`Transport`] backed by the catalogs shipped in
//! `resources/locales`, and an in-memory log sink for asserting on the
//! structured records the middleware writes.

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use devicehub_lib::Localizer;
use serde_json::Value;
use tracing_subscriber::fmt::MakeWriter;

use crate::transport::Transport;

/// Path to the shipped message catalogs.
pub const TEST_LOCALES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../resources/locales");

/// Languages with a shipped catalog.
pub const TEST_LANGUAGES: &str = "en,es";

/// Localizer over the shipped catalogs.
pub fn test_localizer() -> Arc<Localizer> {
    Arc::new(Localizer::with_settings(
        PathBuf::from(TEST_LOCALES_PATH),
        TEST_LANGUAGES,
    ))
}

/// Transport over [`test_localizer`].
pub fn test_transport() -> Transport {
    Transport::new(test_localizer())
}

/// In-memory sink for JSON log lines.
///
/// ```ignore
/// let logs = CapturedLogs::new();
/// let _guard = tracing::subscriber::set_default(logs.subscriber());
/// // ... exercise code on this thread ...
/// let record = logs.find("successfully processing request").unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs {
    buffer: Arc<Mutex<Vec<u8>>>,
}

/// Writer handed out by [`CapturedLogs`].
#[derive(Debug)]
pub struct CapturedWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for CapturedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CapturedWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

impl CapturedLogs {
    pub fn new() -> Self {
        Self::default()
    }

    /// JSON subscriber writing every event, fields flattened to the top level.
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
        tracing_subscriber::fmt()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .with_max_level(tracing::Level::TRACE)
            .with_writer(self.clone())
            .finish()
    }

    /// Every record written so far. Lines that are not JSON are skipped.
    pub fn records(&self) -> Vec<Value> {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer)
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// First record whose message is `message`.
    pub fn find(&self, message: &str) -> Option<Value> {
        self.records()
            .into_iter()
            .find(|record| record["message"] == message)
    }
}
