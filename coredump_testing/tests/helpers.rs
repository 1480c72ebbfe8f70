//! Coverage for the `coredump_testing` helpers themselves.

use coredump_recv::{frame::FrameKind, sink::MemorySink};
use coredump_testing::{DumpBuilder, TestResult, drive_split_at, sample_device};

#[test]
fn builder_announces_total_by_default() {
    let dump = DumpBuilder::default().chunk(b"DEAD").chunk(b"BEEF");
    let frames = dump.frames();

    assert_eq!(frames.len(), 4);
    assert_eq!(frames[0].kind(), FrameKind::Start);
    assert_eq!(frames[0].header().length, 8);
    assert_eq!(frames[0].header().device_id, sample_device());
    assert_eq!(frames[3].kind(), FrameKind::End);
    assert_eq!(dump.payload(), b"DEADBEEF");
}

#[test]
fn builder_can_omit_end_and_override_size() {
    let frames = DumpBuilder::default()
        .announce(100)
        .chunked(b"abcdefg", 3)
        .without_end()
        .frames();

    let kinds: Vec<_> = frames.iter().map(|f| f.kind()).collect();
    assert_eq!(
        kinds,
        [
            FrameKind::Start,
            FrameKind::Transferring,
            FrameKind::Transferring,
            FrameKind::Transferring,
        ]
    );
    assert_eq!(frames[0].header().length, 100);
}

#[tokio::test]
async fn split_driver_ignores_bad_cuts() -> TestResult {
    let dump = DumpBuilder::default().chunk(b"DEADBEEF");
    let sink = MemorySink::new();

    let outcome = drive_split_at(&sink, &dump.build(), &[40, 10, 40_000]).await?;

    assert_eq!(outcome.summary().map(|s| s.bytes_written), Some(8));
    assert_eq!(sink.outputs()[0].1, b"DEADBEEF");
    Ok(())
}
