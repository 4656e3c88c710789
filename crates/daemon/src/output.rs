//! JSON-lines event sink

use reconbridge_core::domain::Event;
use reconbridge_core::port::EventListener;
use std::io::Write;
use std::sync::Mutex;
use tracing::warn;

/// Writes each emitted event as one JSON line
pub struct JsonLinesListener<W: Write + Send> {
    writer: Mutex<W>,
}

impl JsonLinesListener<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLinesListener<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_line(&self, event: &Event) -> std::io::Result<()> {
        let line = serde_json::to_string(event)?;
        let mut writer = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(writer, "{}", line)?;
        writer.flush()
    }
}

impl<W: Write + Send> EventListener for JsonLinesListener<W> {
    fn notify(&self, event: &Event) {
        if let Err(e) = self.write_line(event) {
            warn!(error = %e, event_type = %event.event_type, "Failed to write event");
        }
    }
}
