//! Event bus loop
//!
//! Upstream events arrive as JSON lines. Each one is dispatched on its own
//! task; events the adapters emit go to the listener and, when some adapter
//! watches their type, back onto the bus.

use reconbridge_core::application::{DispatchSummary, Dispatcher};
use reconbridge_core::domain::Event;
use std::future::Future;
use std::io::BufRead;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Message on the bus channel
#[derive(Debug)]
pub enum Inbound {
    Event(Event),
    EndOfInput,
}

/// Totals for one bus run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BusStats {
    pub received: usize,
    pub fed_back: usize,
    pub emitted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BusStats {
    fn record(&mut self, summary: &DispatchSummary) {
        self.emitted += summary.emitted;
        self.skipped += summary.skipped;
        self.failed += summary.failed;
    }
}

/// Read JSON-line events from `reader` until EOF.
///
/// Blocking; runs on its own thread so a pending read never holds up
/// shutdown. Blank lines and `#` comments are ignored, malformed lines are
/// logged and dropped. Always finishes with [`Inbound::EndOfInput`].
pub fn read_events<R: BufRead>(reader: R, tx: UnboundedSender<Inbound>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "Failed to read input");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match serde_json::from_str::<Event>(line) {
            Ok(event) => {
                if tx.send(Inbound::Event(event)).is_err() {
                    return;
                }
            }
            Err(e) => warn!(error = %e, line = %line, "Ignoring malformed event"),
        }
    }

    let _ = tx.send(Inbound::EndOfInput);
}

fn spawn_dispatch(
    in_flight: &mut JoinSet<DispatchSummary>,
    dispatcher: &Arc<Dispatcher>,
    tx: &UnboundedSender<Inbound>,
    event: Event,
) {
    let dispatcher = dispatcher.clone();
    let tx = tx.clone();

    in_flight.spawn(async move {
        let (emitted, summary) = dispatcher.dispatch(&event).await;
        // Queued before this task completes, so the idle check below sees them
        for produced in emitted {
            if dispatcher.is_watched(&produced) {
                let _ = tx.send(Inbound::Event(produced));
            }
        }
        summary
    });
}

/// Run the bus until input is exhausted and every scan has finished,
/// or until `shutdown` resolves (in-flight scans are then aborted, which
/// kills their processes).
pub async fn run_bus<F>(
    dispatcher: Arc<Dispatcher>,
    mut rx: UnboundedReceiver<Inbound>,
    tx: UnboundedSender<Inbound>,
    shutdown: F,
) -> BusStats
where
    F: Future<Output = ()>,
{
    let mut stats = BusStats::default();
    let mut in_flight = JoinSet::new();
    let mut input_done = false;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(in_flight = in_flight.len(), "Shutdown requested, aborting in-flight scans");
                in_flight.abort_all();
                while in_flight.join_next().await.is_some() {}
                break;
            }
            Some(inbound) = rx.recv() => match inbound {
                Inbound::Event(event) => {
                    if event.parent.is_some() {
                        stats.fed_back += 1;
                    } else {
                        stats.received += 1;
                    }
                    if dispatcher.is_watched(&event) {
                        spawn_dispatch(&mut in_flight, &dispatcher, &tx, event);
                    } else {
                        debug!(event_type = %event.event_type, "No adapter watches this event type");
                    }
                }
                Inbound::EndOfInput => {
                    debug!("Input exhausted");
                    input_done = true;
                }
            },
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => match joined {
                Ok(summary) => stats.record(&summary),
                Err(e) if e.is_panic() => error!(error = %e, "Dispatch task panicked"),
                Err(_) => {}
            },
        }

        if input_done && in_flight.is_empty() && rx.is_empty() {
            break;
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconbridge_core::application::build_adapters;
    use reconbridge_core::config::OptionSet;
    use reconbridge_core::port::event_listener::mocks::RecordingListener;
    use reconbridge_core::port::process_runner::mocks::MockProcessRunner;
    use std::collections::HashMap;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    fn fake_nmap() -> (TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nmap");
        std::fs::write(&path, b"").unwrap();
        let path = path.display().to_string();
        (dir, path)
    }

    fn dispatcher(
        modules: &[&str],
        nmap: &str,
        runner: Arc<MockProcessRunner>,
        listener: RecordingListener,
    ) -> Arc<Dispatcher> {
        let modules: Vec<String> = modules.iter().map(|m| m.to_string()).collect();
        let options: HashMap<_, _> = modules
            .iter()
            .map(|m| (m.clone(), OptionSet::new().with("nmappath", nmap)))
            .collect();
        let adapters = build_adapters(&modules, &options, runner).unwrap();
        Arc::new(Dispatcher::new(adapters, Arc::new(listener)))
    }

    async fn run_input(dispatcher: Arc<Dispatcher>, input: &'static str) -> BusStats {
        let (tx, rx) = mpsc::unbounded_channel();
        read_events(input.as_bytes(), tx.clone());
        run_bus(dispatcher, rx, tx, std::future::pending()).await
    }

    #[tokio::test]
    async fn test_duplicate_lines_scan_once() {
        let (_dir, nmap) = fake_nmap();
        let runner = Arc::new(MockProcessRunner::new_output("hello\n"));
        let listener = RecordingListener::new();
        let dispatcher = dispatcher(&["tool_nmapfull"], &nmap, runner.clone(), listener.clone());

        let input = r#"{"event_type":"IP_ADDRESS","data":"1.2.3.4"}

# comment
not json
{"event_type":"IP_ADDRESS","data":"1.2.3.4"}
{"event_type":"DOMAIN_NAME","data":"example.com"}
"#;
        let stats = run_input(dispatcher, input).await;

        assert_eq!(stats.received, 3);
        assert_eq!(stats.emitted, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(runner.call_count(), 1);
        assert_eq!(listener.len(), 1);
    }

    #[tokio::test]
    async fn test_emitted_addresses_are_fed_back() {
        let (_dir, nmap) = fake_nmap();
        let runner = Arc::new(MockProcessRunner::new_output(
            "Nmap scan report for 10.0.0.5\nOS details: Linux 5.4\n",
        ));
        let listener = RecordingListener::new();
        let dispatcher = dispatcher(
            &["tool_nmapfull", "tool_nmap"],
            &nmap,
            runner.clone(),
            listener.clone(),
        );

        let stats = run_input(
            dispatcher,
            "{\"event_type\":\"NETBLOCK_OWNER\",\"data\":\"10.0.0.0/28\"}\n",
        )
        .await;

        // netblock: raw result + (ip, os); fed-back ip: raw result only
        assert_eq!(stats.received, 1);
        assert_eq!(stats.fed_back, 1);
        assert_eq!(stats.emitted, 4);
        assert_eq!(runner.call_count(), 3);
        assert!(listener
            .events()
            .iter()
            .any(|e| e.module == "tool_nmapfull" && e.parent.as_ref().unwrap().data == "10.0.0.5"));
    }

    #[tokio::test]
    async fn test_shutdown_aborts_in_flight_scans() {
        let (_dir, nmap) = fake_nmap();
        let runner = Arc::new(
            MockProcessRunner::new_output("late\n").with_delay(Duration::from_secs(30)),
        );
        let listener = RecordingListener::new();
        let dispatcher = dispatcher(&["tool_nmapfull"], &nmap, runner, listener.clone());

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Inbound::Event(Event::new(
            reconbridge_core::domain::EventType::IpAddress,
            "1.2.3.4",
            "test",
        )))
        .unwrap();

        let started = std::time::Instant::now();
        let stats = run_bus(
            dispatcher,
            rx,
            tx,
            tokio::time::sleep(Duration::from_millis(100)),
        )
        .await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(stats.received, 1);
        assert_eq!(stats.emitted, 0);
        assert!(listener.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shutdown_with_input_still_open() {
        use std::io::Write;
        use std::os::unix::net::UnixStream;

        let (_dir, nmap) = fake_nmap();
        let runner = Arc::new(MockProcessRunner::new_output("hello\n"));
        let listener = RecordingListener::new();
        let dispatcher = dispatcher(&["tool_nmapfull"], &nmap, runner, listener.clone());

        // The writer end stays open, so the reader never sees EOF
        let (mut writer, reader) = UnixStream::pair().unwrap();
        writeln!(writer, r#"{{"event_type":"IP_ADDRESS","data":"1.2.3.4"}}"#).unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        let reader_tx = tx.clone();
        std::thread::spawn(move || read_events(std::io::BufReader::new(reader), reader_tx));

        let started = std::time::Instant::now();
        let stats = tokio::time::timeout(
            Duration::from_secs(5),
            run_bus(
                dispatcher,
                rx,
                tx,
                tokio::time::sleep(Duration::from_millis(500)),
            ),
        )
        .await
        .expect("bus did not stop while input was open");

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(stats.received, 1);
        assert_eq!(listener.len(), 1);
        drop(writer);
    }
}
