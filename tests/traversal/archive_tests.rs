use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use filesender::events::{event_channel, EventStatus};
use filesender::filter::AcceptAll;
use filesender::transmit::{Transmission, Transmitter};
use filesender::{Destination, TransmissionJob, TransmissionOptions};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use zip::write::FileOptions;

/// Records the base name and content of every file it is given
#[derive(Default)]
struct Capture {
    files: Mutex<Vec<(String, Vec<u8>)>>,
}

impl Capture {
    fn names(&self) -> Vec<String> {
        self.files.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
    }
}

#[async_trait]
impl Transmitter for Capture {
    async fn transmit(&self, file: &Path, _sequence: u32) -> Transmission {
        let name = file.file_name().unwrap().to_string_lossy().into_owned();
        let content = std::fs::read(file).unwrap_or_default();
        self.files.lock().unwrap().push((name.clone(), content));
        Transmission::success(format!("{} ok", name))
    }
}

/// Succeeds and then asks the job to stop
struct CancelAfterFirst {
    names: Mutex<Vec<String>>,
    cancel: CancellationToken,
}

#[async_trait]
impl Transmitter for CancelAfterFirst {
    async fn transmit(&self, file: &Path, _sequence: u32) -> Transmission {
        let name = file.file_name().unwrap().to_string_lossy().into_owned();
        self.names.lock().unwrap().push(name.clone());
        self.cancel.cancel();
        Transmission::success(format!("{} ok", name))
    }
}

fn write_zip(path: &Path, entries: &[(&str, Option<&[u8]>)]) {
    let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
    for (name, data) in entries {
        match data {
            Some(bytes) => {
                zip.start_file(*name, FileOptions::default()).unwrap();
                zip.write_all(bytes).unwrap();
            }
            None => zip.add_directory(*name, FileOptions::default()).unwrap(),
        }
    }
    zip.finish().unwrap();
}

fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

async fn run(root: &Path, options: TransmissionOptions) -> (Arc<Capture>, Vec<filesender::TransmissionEvent>, filesender::JobSummary) {
    let capture = Arc::new(Capture::default());
    let mut handle = TransmissionJob::with_transmitter(
        root,
        Arc::new(AcceptAll),
        Destination::parse("http://localhost:1/submit").unwrap(),
        options,
        capture.clone(),
    )
    .start();
    let events = handle.events().collect().await;
    let summary = handle.join().await.unwrap();
    (capture, events, summary)
}

#[tokio::test]
async fn test_archive_entries_are_sent_individually() {
    let data = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    write_zip(
        &data.path().join("study.zip"),
        &[
            ("series/", None),
            ("series/1.dcm", Some(b"first")),
            ("series/2.dcm", Some(b"second")),
            ("report.txt", Some(b"third")),
        ],
    );

    let options = TransmissionOptions {
        temp_dir: Some(scratch.path().to_path_buf()),
        ..Default::default()
    };
    let (capture, events, summary) = run(data.path(), options).await;

    assert_eq!(capture.names(), vec!["1.dcm", "2.dcm", "report.txt"]);
    let contents: Vec<Vec<u8>> = capture.files.lock().unwrap().iter().map(|(_, c)| c.clone()).collect();
    assert_eq!(contents, vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]);
    assert_eq!(summary.sent, 3);
    assert_eq!(events.len(), 4);
    assert!(dir_is_empty(scratch.path()));
}

#[tokio::test]
async fn test_archive_as_root() {
    let data = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let archive = data.path().join("single.zip");
    write_zip(&archive, &[("a.dcm", Some(b"a"))]);

    let options = TransmissionOptions {
        temp_dir: Some(scratch.path().to_path_buf()),
        ..Default::default()
    };
    let (capture, _, summary) = run(&archive, options).await;

    assert_eq!(capture.names(), vec!["a.dcm"]);
    assert_eq!(summary.sent, 1);
    assert!(dir_is_empty(scratch.path()));
}

#[tokio::test]
async fn test_nested_archive_is_expanded() {
    let data = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();

    let inner = scratch.path().join("inner.zip");
    write_zip(&inner, &[("deep.dcm", Some(b"deep"))]);
    let inner_bytes = std::fs::read(&inner).unwrap();
    std::fs::remove_file(&inner).unwrap();

    write_zip(
        &data.path().join("outer.zip"),
        &[("inner.zip", Some(&inner_bytes)), ("flat.dcm", Some(b"flat"))],
    );

    let options = TransmissionOptions {
        temp_dir: Some(scratch.path().to_path_buf()),
        ..Default::default()
    };
    let (capture, _, summary) = run(data.path(), options).await;

    assert_eq!(capture.names(), vec!["deep.dcm", "flat.dcm"]);
    assert_eq!(summary.sent, 2);
    assert!(dir_is_empty(scratch.path()));
}

#[tokio::test]
async fn test_unreadable_archive_does_not_stop_siblings() {
    let data = TempDir::new().unwrap();
    std::fs::write(data.path().join("a.dcm"), b"a").unwrap();
    std::fs::write(data.path().join("broken.zip"), b"this is not a zip file").unwrap();
    std::fs::write(data.path().join("c.dcm"), b"c").unwrap();

    let (capture, events, summary) = run(data.path(), TransmissionOptions::default()).await;

    assert_eq!(capture.names(), vec!["a.dcm", "c.dcm"]);
    assert_eq!(summary.sent, 2);
    assert_eq!(summary.skipped, 0);

    let archive_failures: Vec<_> = events
        .iter()
        .filter(|e| e.status == EventStatus::Failure && !e.done)
        .collect();
    assert_eq!(archive_failures.len(), 1);
    assert!(archive_failures[0]
        .message
        .contains("Error unpacking the zip file"));
    assert!(archive_failures[0].message.contains("broken.zip"));
}

#[tokio::test]
async fn test_expansion_disabled_sends_archive_whole() {
    let data = TempDir::new().unwrap();
    write_zip(
        &data.path().join("study.zip"),
        &[("1.dcm", Some(b"1")), ("2.dcm", Some(b"2"))],
    );

    let options = TransmissionOptions {
        expand_archives: false,
        ..Default::default()
    };
    let (capture, _, summary) = run(data.path(), options).await;

    assert_eq!(capture.names(), vec!["study.zip"]);
    assert_eq!(summary.sent, 1);
}

#[tokio::test]
async fn test_upper_case_extension_is_not_expanded() {
    let data = TempDir::new().unwrap();
    write_zip(&data.path().join("STUDY.ZIP"), &[("1.dcm", Some(b"1"))]);

    let (capture, _, _) = run(data.path(), TransmissionOptions::default()).await;

    assert_eq!(capture.names(), vec!["STUDY.ZIP"]);
}

#[tokio::test]
async fn test_cancel_during_expansion_abandons_remaining_entries() {
    let data = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    write_zip(
        &data.path().join("a-study.zip"),
        &[
            ("1.dcm", Some(b"1")),
            ("2.dcm", Some(b"2")),
            ("3.dcm", Some(b"3")),
        ],
    );
    std::fs::write(data.path().join("b-sibling.dcm"), b"b").unwrap();

    let cancel = CancellationToken::new();
    let transmitter = Arc::new(CancelAfterFirst {
        names: Mutex::new(Vec::new()),
        cancel: cancel.clone(),
    });
    let options = TransmissionOptions {
        temp_dir: Some(scratch.path().to_path_buf()),
        ..Default::default()
    };
    let (tx, mut rx) = event_channel();
    let summary = TransmissionJob::with_transmitter(
        data.path(),
        Arc::new(AcceptAll),
        Destination::parse("http://localhost:1/submit").unwrap(),
        options,
        transmitter.clone(),
    )
    .run(tx, cancel)
    .await;

    assert!(summary.cancelled);
    assert_eq!(summary.sent, 1);
    assert_eq!(*transmitter.names.lock().unwrap(), vec!["1.dcm".to_string()]);

    let events = rx.collect().await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].status, EventStatus::Success);
    assert!(events[1].done);
    assert!(events[1].message.contains("Interrupted"));
    assert!(dir_is_empty(scratch.path()));
}
