//! Tests for the filesystem and in-memory sinks.

use chrono::{Local, TimeZone};
use rstest::{fixture, rstest};

use super::*;

#[fixture]
fn identity() -> DumpIdentity {
    DumpIdentity {
        device_id: DeviceId::new([0x24, 0x0a, 0xc4, 0x12, 0x34, 0x56]),
        firmware_version: "v2.1.2-hotfix".parse().expect("version fits"),
        started_at: Local
            .with_ymd_and_hms(2024, 11, 2, 8, 30, 0)
            .single()
            .expect("unambiguous local time"),
    }
}

#[rstest]
fn candidate_names_append_numeric_suffix(identity: DumpIdentity) {
    assert_eq!(
        identity.candidate_name(0),
        "240ac4123456_v2.1.2_2024-11-02-08-30.dump"
    );
    assert_eq!(
        identity.candidate_name(2),
        "240ac4123456_v2.1.2_2024-11-02-08-30-2.dump"
    );
}

#[rstest]
#[tokio::test]
async fn fs_sink_writes_appends_in_order(identity: DumpIdentity) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let sink = FsSink::new(dir.path().join("dumps"));

    let mut handle = sink.open(&identity).await.expect("open dump file");
    sink.append(&mut handle, b"DEAD").await.expect("append");
    sink.append(&mut handle, b"BEEF").await.expect("append");
    let path = handle.path().to_path_buf();
    sink.close(handle).await.expect("close");

    assert_eq!(
        path.file_name().and_then(|n| n.to_str()),
        Some("240ac4123456_v2.1.2_2024-11-02-08-30.dump")
    );
    assert_eq!(std::fs::read(&path).expect("read dump"), b"DEADBEEF");
}

#[rstest]
#[tokio::test]
async fn fs_sink_never_reuses_existing_file(identity: DumpIdentity) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let sink = FsSink::new(dir.path());

    let mut first = sink.open(&identity).await.expect("open first");
    sink.append(&mut first, b"first").await.expect("append");
    let mut second = sink.open(&identity).await.expect("open second");
    sink.append(&mut second, b"second").await.expect("append");

    assert_ne!(first.path(), second.path());
    assert!(
        second
            .path()
            .to_string_lossy()
            .ends_with("2024-11-02-08-30-1.dump")
    );
    let (first_path, second_path) = (first.path().to_path_buf(), second.path().to_path_buf());
    sink.close(first).await.expect("close first");
    sink.close(second).await.expect("close second");
    assert_eq!(std::fs::read(first_path).expect("read first"), b"first");
    assert_eq!(std::fs::read(second_path).expect("read second"), b"second");
}

#[rstest]
#[tokio::test]
async fn memory_sink_tracks_outputs(identity: DumpIdentity) {
    let sink = MemorySink::new();
    let mut handle = sink.open(&identity).await.expect("open");
    let name = sink.output_name(&handle);
    sink.append(&mut handle, b"abc").await.expect("append");
    assert!(!sink.is_closed(&name));
    sink.close(handle).await.expect("close");

    assert!(sink.is_closed(&name));
    assert_eq!(sink.contents(&name).as_deref(), Some(&b"abc"[..]));
    assert_eq!(sink.names(), vec![name]);
}

#[rstest]
#[tokio::test]
async fn memory_sink_capacity_limit_fails_append(identity: DumpIdentity) {
    let sink = MemorySink::with_capacity_limit(4);
    let mut handle = sink.open(&identity).await.expect("open");
    sink.append(&mut handle, b"DEAD").await.expect("fits");
    let err = sink
        .append(&mut handle, b"B")
        .await
        .expect_err("limit exceeded");
    assert_eq!(err.kind(), std::io::ErrorKind::Other);
    assert_eq!(sink.contents(handle.name()).as_deref(), Some(&b"DEAD"[..]));
}
