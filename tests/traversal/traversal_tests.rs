use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use filesender::error::TransmitError;
use filesender::events::{event_channel, EventStatus};
use filesender::filter::{AcceptAll, ExtensionFilter};
use filesender::transmit::{Transmission, Transmitter};
use filesender::{Destination, TransmissionJob, TransmissionOptions};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Records file names; fails any file whose name contains "bad" and
/// optionally trips a cancellation token after a number of attempts.
#[derive(Default)]
struct FakeTransmitter {
    seen: Mutex<Vec<(String, u32)>>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl FakeTransmitter {
    fn names(&self) -> Vec<String> {
        self.seen.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
    }
}

#[async_trait]
impl Transmitter for FakeTransmitter {
    async fn transmit(&self, file: &Path, sequence: u32) -> Transmission {
        let name = file.file_name().unwrap().to_string_lossy().into_owned();
        let count = {
            let mut seen = self.seen.lock().unwrap();
            seen.push((name.clone(), sequence));
            seen.len()
        };
        if let Some((limit, token)) = &self.cancel_after {
            if count >= *limit {
                token.cancel();
            }
        }
        if name.contains("bad") {
            Transmission::failure(TransmitError::Rejected, format!("{} rejected", name))
        } else {
            Transmission::success(format!("{} ok", name))
        }
    }
}

fn destination() -> Destination {
    Destination::parse("http://localhost:1/submit").unwrap()
}

fn write_files(dir: &Path, names: &[&str]) {
    for name in names {
        let path = dir.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, name.as_bytes()).unwrap();
    }
}

fn job(root: &Path, transmitter: Arc<FakeTransmitter>, options: TransmissionOptions) -> TransmissionJob {
    TransmissionJob::with_transmitter(
        PathBuf::from(root),
        Arc::new(AcceptAll),
        destination(),
        options,
        transmitter,
    )
}

#[tokio::test]
async fn test_flat_directory_sends_every_file_in_name_order() {
    let dir = TempDir::new().unwrap();
    write_files(dir.path(), &["c.dcm", "a.dcm", "b.dcm"]);

    let transmitter = Arc::new(FakeTransmitter::default());
    let mut handle = job(dir.path(), transmitter.clone(), TransmissionOptions::default()).start();
    let events = handle.events().collect().await;
    let summary = handle.join().await.unwrap();

    assert_eq!(summary.sent, 3);
    assert_eq!(summary.skipped, 0);
    assert!(!summary.cancelled);
    assert_eq!(transmitter.names(), vec!["a.dcm", "b.dcm", "c.dcm"]);

    let sequences: Vec<u32> = transmitter.seen.lock().unwrap().iter().map(|(_, s)| *s).collect();
    assert_eq!(sequences, vec![1, 2, 3]);

    assert_eq!(events.len(), 4);
    assert_eq!(events.iter().filter(|e| e.done).count(), 1);
    let last = events.last().unwrap();
    assert!(last.done);
    assert_eq!(last.status, EventStatus::Success);
    assert!(last.message.contains("3 files sent, 0 skipped"));
}

#[tokio::test]
async fn test_failures_are_counted_as_skipped() {
    let dir = TempDir::new().unwrap();
    write_files(dir.path(), &["1.dcm", "2-bad.dcm", "3.dcm"]);

    let transmitter = Arc::new(FakeTransmitter::default());
    let mut handle = job(dir.path(), transmitter.clone(), TransmissionOptions::default()).start();
    let events = handle.events().collect().await;
    let summary = handle.join().await.unwrap();

    assert_eq!(summary.sent, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(events[1].status, EventStatus::Failure);
    let last = events.last().unwrap();
    assert_eq!(last.status, EventStatus::Failure);
    assert!(last.message.contains("2 files sent, 1 skipped"));
}

#[tokio::test]
async fn test_single_file_root() {
    let dir = TempDir::new().unwrap();
    write_files(dir.path(), &["only.dcm"]);

    let transmitter = Arc::new(FakeTransmitter::default());
    let mut handle = job(
        &dir.path().join("only.dcm"),
        transmitter.clone(),
        TransmissionOptions::default(),
    )
    .start();
    let events = handle.events().collect().await;

    assert_eq!(transmitter.names(), vec!["only.dcm"]);
    assert!(events.last().unwrap().message.contains("1 file sent, 0 skipped"));
}

#[tokio::test]
async fn test_subdirectories_follow_recursion_switch() {
    let dir = TempDir::new().unwrap();
    write_files(dir.path(), &["top.dcm", "series/one.dcm", "series/deeper/two.dcm"]);

    let transmitter = Arc::new(FakeTransmitter::default());
    let mut handle = job(dir.path(), transmitter.clone(), TransmissionOptions::default()).start();
    handle.events().collect().await;
    assert_eq!(transmitter.names(), vec!["two.dcm", "one.dcm", "top.dcm"]);

    let transmitter = Arc::new(FakeTransmitter::default());
    let options = TransmissionOptions {
        recurse_subdirectories: false,
        ..Default::default()
    };
    let mut handle = job(dir.path(), transmitter.clone(), options).start();
    handle.events().collect().await;
    let summary = handle.join().await.unwrap();
    assert_eq!(transmitter.names(), vec!["top.dcm"]);
    assert_eq!(summary.sent, 1);
}

#[tokio::test]
async fn test_filter_excludes_files_but_not_directories() {
    let dir = TempDir::new().unwrap();
    write_files(dir.path(), &["a.dcm", "notes.txt", "nested.txt/inner.DCM"]);

    let transmitter = Arc::new(FakeTransmitter::default());
    let mut handle = TransmissionJob::with_transmitter(
        dir.path(),
        Arc::new(ExtensionFilter::new(["dcm"])),
        destination(),
        TransmissionOptions::default(),
        transmitter.clone(),
    )
    .start();
    handle.events().collect().await;

    assert_eq!(transmitter.names(), vec!["a.dcm", "inner.DCM"]);
}

#[tokio::test]
async fn test_closure_filter() {
    let dir = TempDir::new().unwrap();
    write_files(dir.path(), &["keep-1", "drop-2", "keep-3"]);

    let transmitter = Arc::new(FakeTransmitter::default());
    let filter = |path: &Path, _is_dir: bool| {
        path.file_name()
            .map(|n| n.to_string_lossy().starts_with("keep"))
            .unwrap_or(false)
    };
    let mut handle = TransmissionJob::with_transmitter(
        dir.path(),
        Arc::new(filter),
        destination(),
        TransmissionOptions::default(),
        transmitter.clone(),
    )
    .start();
    handle.events().collect().await;

    assert_eq!(transmitter.names(), vec!["keep-1", "keep-3"]);
}

#[tokio::test]
async fn test_cancellation_stops_before_next_file() {
    let dir = TempDir::new().unwrap();
    write_files(dir.path(), &["1.dcm", "2.dcm", "3.dcm", "4.dcm", "5.dcm"]);

    let cancel = CancellationToken::new();
    let transmitter = Arc::new(FakeTransmitter {
        cancel_after: Some((2, cancel.clone())),
        ..Default::default()
    });
    let (tx, mut rx) = event_channel();
    let summary = job(dir.path(), transmitter.clone(), TransmissionOptions::default())
        .run(tx, cancel)
        .await;

    assert!(summary.cancelled);
    assert_eq!(summary.sent, 2);
    // the in-flight file still reports its outcome
    assert_eq!(transmitter.names(), vec!["1.dcm", "2.dcm"]);

    let events = rx.collect().await;
    assert_eq!(events.len(), 3);
    let last = events.last().unwrap();
    assert!(last.done);
    assert_eq!(last.status, EventStatus::Failure);
    assert!(last.message.contains("Interrupted"));
    assert!(!last.message.contains("Done."));
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_cancel_before_start_sends_nothing() {
    let dir = TempDir::new().unwrap();
    write_files(dir.path(), &["1.dcm"]);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let transmitter = Arc::new(FakeTransmitter::default());
    let (tx, mut rx) = event_channel();
    let summary = job(dir.path(), transmitter.clone(), TransmissionOptions::default())
        .run(tx, cancel)
        .await;

    assert!(summary.cancelled);
    assert!(transmitter.names().is_empty());
    let events = rx.collect().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].plain_text(), "\nInterrupted");
}

#[tokio::test]
async fn test_missing_root_is_one_failed_attempt() {
    let dir = TempDir::new().unwrap();
    let transmitter = Arc::new(FakeTransmitter::default());
    let mut handle = job(
        &dir.path().join("does-not-exist-bad"),
        transmitter.clone(),
        TransmissionOptions::default(),
    )
    .start();
    let events = handle.events().collect().await;
    let summary = handle.join().await.unwrap();

    assert_eq!(transmitter.names().len(), 1);
    assert_eq!(summary.skipped, 1);
    assert!(events.last().unwrap().done);
}

#[tokio::test]
async fn test_dropped_receiver_does_not_stop_the_job() {
    let dir = TempDir::new().unwrap();
    write_files(dir.path(), &["a", "b"]);

    let transmitter = Arc::new(FakeTransmitter::default());
    let (tx, rx) = event_channel();
    drop(rx);
    let summary = job(dir.path(), transmitter.clone(), TransmissionOptions::default())
        .run(tx, CancellationToken::new())
        .await;
    assert_eq!(summary.sent, 2);
}
