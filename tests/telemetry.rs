mod common;

use common::{memory_counter, FailingBackend, EPOCH_SECS};
use rollcount::telemetry::{CounterEvent, LogSink, MemorySink};
use rollcount::{Clock, CounterConfig, SlidingWindowCounter};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone)]
struct SharedWriter(Arc<Mutex<Vec<u8>>>);

impl<'a> MakeWriter<'a> for SharedWriter {
    type Writer = SharedGuard;
    fn make_writer(&'a self) -> Self::Writer {
        SharedGuard(self.0.clone())
    }
}

struct SharedGuard(Arc<Mutex<Vec<u8>>>);
impl std::io::Write for SharedGuard {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.0.lock().unwrap();
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn capture() -> (Arc<Mutex<Vec<u8>>>, tracing::subscriber::DefaultGuard) {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::fmt()
        .with_writer(BoxMakeWriter::new(SharedWriter(buffer.clone())))
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .without_time()
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (buffer, guard)
}

fn logs(buffer: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8(buffer.lock().unwrap().clone()).unwrap()
}

#[tokio::test]
async fn corrupt_bucket_is_logged_and_counted_as_zero() {
    let (buffer, _guard) = capture();
    let (counter, backend, clock) =
        memory_counter("diag", Duration::from_secs(60), Duration::from_secs(1), Duration::from_secs(EPOCH_SECS));
    let sink = MemorySink::new();
    let counter = counter.with_sink(sink.clone());

    counter.increment("id").await.unwrap();
    counter.increment("id").await.unwrap();
    let current = counter.indexer().slot_for(clock.now_nanos());
    let stale = counter.indexer().live_slots(current)[5];
    backend.insert_raw(counter.key_for("id"), stale, "12abc").unwrap();

    assert_eq!(counter.count("id").await.unwrap(), 2);

    let out = logs(&buffer);
    assert!(out.contains("unparseable bucket count read as 0"), "logs: {}", out);
    assert!(out.contains("12abc"));
    assert!(sink
        .events()
        .iter()
        .any(|e| matches!(e, CounterEvent::CorruptBucket { slot, .. } if *slot == stale)));
}

#[tokio::test]
async fn backend_failures_are_logged() {
    let (buffer, _guard) = capture();
    let config = CounterConfig::new("down", Duration::from_secs(60), Duration::from_secs(1)).unwrap();
    let counter = SlidingWindowCounter::new(FailingBackend, config);

    assert!(counter.increment("id").await.is_err());

    let out = logs(&buffer);
    assert!(out.contains("counter backend failure"));
    assert!(out.contains("connection refused"));
    assert!(out.contains("down:id"));
}

#[tokio::test]
async fn log_sink_writes_counter_events() {
    let (buffer, _guard) = capture();
    let (counter, _backend, _clock) =
        memory_counter("logged", Duration::from_secs(60), Duration::from_secs(1), Duration::from_secs(EPOCH_SECS));
    let counter = counter.with_sink(LogSink);

    counter.increment("id").await.unwrap();
    counter.reset("id").await.unwrap();

    let out = logs(&buffer);
    assert!(out.contains("counter_event"));
    assert!(out.contains("Incremented(key=logged:id"));
    assert!(out.contains("Reset(key=logged:id)"));
}
