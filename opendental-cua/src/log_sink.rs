use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Info,
    Error,
}

/// A single progress entry recorded during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Seconds since the Unix epoch at capture time
    pub timestamp: f64,
    pub message: String,
    pub level: LogLevel,
}

impl LogEntry {
    pub fn new(message: impl Into<String>, level: LogLevel) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0,
            message: message.into(),
            level,
        }
    }
}

/// Receives log entries for live progress reporting.
///
/// Delivery is best-effort: entries may be dropped when the listener falls
/// behind the bounded queue.
#[async_trait]
pub trait LogListener: Send + Sync + 'static {
    async fn on_log(&self, entry: LogEntry);
}

#[async_trait]
impl LogListener for mpsc::UnboundedSender<LogEntry> {
    async fn on_log(&self, entry: LogEntry) {
        let _ = self.send(entry);
    }
}

struct Dispatch {
    tx: mpsc::Sender<LogEntry>,
    drain: JoinHandle<()>,
}

/// Append-only log buffer owned by one run.
///
/// When a listener is attached, every entry is also queued to a dedicated
/// drain task. `record` never waits on the listener; `finish` closes the queue
/// and waits until everything queued has been delivered.
pub struct LogSink {
    name: String,
    entries: Vec<LogEntry>,
    dispatch: Option<Dispatch>,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            dispatch: None,
        }
    }

    /// Attaches a listener. Must be called from within a tokio runtime.
    pub fn with_listener(
        name: impl Into<String>,
        listener: Arc<dyn LogListener>,
        capacity: usize,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel::<LogEntry>(capacity.max(1));
        let drain = tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                listener.on_log(entry).await;
            }
        });

        Self {
            name: name.into(),
            entries: Vec::new(),
            dispatch: Some(Dispatch { tx, drain }),
        }
    }

    pub fn record(&mut self, message: impl Into<String>, level: LogLevel) {
        let entry = LogEntry::new(message, level);
        match level {
            LogLevel::Info => info!("[{}] {}", self.name, entry.message),
            LogLevel::Error => error!("[{}] {}", self.name, entry.message),
        }

        if let Some(dispatch) = &self.dispatch {
            if let Err(mpsc::error::TrySendError::Full(dropped)) =
                dispatch.tx.try_send(entry.clone())
            {
                warn!(
                    "[{}] log listener is behind, dropped entry: {}",
                    self.name, dropped.message
                );
            }
        }

        self.entries.push(entry);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.record(message, LogLevel::Info);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.record(message, LogLevel::Error);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Closes the listener queue, waits for it to drain and returns the
    /// buffered entries in append order.
    pub async fn finish(self) -> Vec<LogEntry> {
        if let Some(Dispatch { tx, drain }) = self.dispatch {
            drop(tx);
            if let Err(e) = drain.await {
                warn!("[{}] log listener task ended abnormally: {}", self.name, e);
            }
        }
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::Mutex;

    struct SlowListener {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LogListener for SlowListener {
        async fn on_log(&self, entry: LogEntry) {
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.seen.lock().await.push(entry.message);
        }
    }

    #[test]
    fn test_entries_keep_append_order() {
        let mut sink = LogSink::new("test");
        sink.info("first");
        sink.error("second");
        sink.info("third");

        let messages: Vec<&str> = sink.entries().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
        assert_eq!(sink.entries()[1].level, LogLevel::Error);
        assert!(sink.entries()[0].timestamp <= sink.entries()[2].timestamp);
    }

    #[tokio::test]
    async fn test_finish_waits_for_listener_drain() {
        let listener = Arc::new(SlowListener {
            seen: Mutex::new(Vec::new()),
        });
        let mut sink = LogSink::with_listener("test", listener.clone(), 16);
        for i in 0..5 {
            sink.info(format!("entry {i}"));
        }

        let entries = sink.finish().await;
        assert_eq!(entries.len(), 5);
        let seen = listener.seen.lock().await;
        assert_eq!(seen.len(), 5);
        assert_eq!(seen[4], "entry 4");
    }

    #[tokio::test]
    async fn test_full_queue_never_loses_buffered_entries() {
        let listener = Arc::new(SlowListener {
            seen: Mutex::new(Vec::new()),
        });
        let mut sink = LogSink::with_listener("test", listener.clone(), 1);
        for i in 0..20 {
            sink.info(format!("entry {i}"));
        }

        let entries = sink.finish().await;
        assert_eq!(entries.len(), 20);
        assert!(listener.seen.lock().await.len() <= 20);
    }

    #[test]
    fn test_level_serializes_lowercase() {
        let entry = LogEntry::new("boom", LogLevel::Error);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["level"], "error");
        assert_eq!(value["message"], "boom");
    }
}
