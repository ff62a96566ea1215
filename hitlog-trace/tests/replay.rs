//! End-to-end runs: a recorded trace replayed through the engine down to the
//! artifact bytes on disk.

use std::fs;
use std::path::Path;

use hitlog_core::config::Config;
use hitlog_core::engine::HitLogger;
use hitlog_trace::record::{Exec, Image, Record};
use hitlog_trace::replay::replay;
use hitlog_trace::TraceWriter;

fn trace(records: &[Record]) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut writer = TraceWriter::new(&mut bytes).unwrap();
    for record in records {
        writer.write(record).unwrap();
    }
    writer.finish().unwrap();
    bytes
}

fn run(config: Config, records: &[Record]) -> HitLogger {
    let logger = HitLogger::new(config).unwrap();
    replay(trace(records).as_slice(), &logger).unwrap();
    logger
}

fn artifact(path: &Path) -> Vec<u8> {
    fs::read(path).unwrap()
}

#[test]
fn full_module_hitmap() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.hits");

    // Module spans 0x1000..=0x1010; two instructions execute three times
    // each with no triggers configured.
    run(
        Config::new(&path),
        &[
            Image::new("/usr/bin/target", 0x1000, 0x1010, true).into(),
            Exec::new(0x1000).into(),
            Exec::new(0x1008).into(),
            Exec::new(0x1000).into(),
            Exec::new(0x1008).into(),
            Exec::new(0x1000).into(),
            Exec::new(0x1008).into(),
        ],
    );

    let written = artifact(&path);
    assert_eq!(written.len(), 16);
    for (offset, &count) in written.iter().enumerate() {
        let expected = if offset == 0 || offset == 8 { 3 } else { 0 };
        assert_eq!(count, expected, "offset {offset}");
    }
}

#[test]
fn start_trigger_opens_the_window() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.hits");

    let mut config = Config::new(&path);
    config.start_offset = Some(0x8);

    // Two executions of 0x1000 land before the start trigger at 0x1008 and
    // must not be counted; the two after it must be.
    run(
        config,
        &[
            Image::new("/usr/bin/target", 0x1000, 0x1010, true).into(),
            Exec::new(0x1000).into(),
            Exec::new(0x1000).into(),
            Exec::new(0x1008).into(),
            Exec::new(0x1000).into(),
            Exec::new(0x1000).into(),
        ],
    );

    let written = artifact(&path);
    assert_eq!(written.len(), 16);
    assert_eq!(written[0], 2);
    assert_eq!(written[8], 1);
}

#[test]
fn stop_trigger_closes_the_window() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.hits");

    let mut config = Config::new(&path);
    config.stop_offset = Some(0x4);

    run(
        config,
        &[
            Image::new("/usr/bin/target", 0x1000, 0x1010, true).into(),
            Exec::new(0x1000).into(),
            Exec::new(0x1004).into(),
            Exec::new(0x1000).into(),
            Exec::new(0x1008).into(),
        ],
    );

    let written = artifact(&path);
    // The stop instruction itself executes before its own count hook runs,
    // so nothing at or after it is recorded.
    assert_eq!(written[0], 1);
    assert_eq!(written[4], 0);
    assert_eq!(written[8], 0);
}

#[test]
fn named_module_is_tracked_instead_of_main() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.hits");

    let mut config = Config::new(&path);
    config.module = Some("KERNEL32".to_string());

    run(
        config,
        &[
            Image::new("C:\\target.exe", 0x40_0000, 0x40_1000, true).into(),
            Image::new("C:\\sys\\KERNEL32.DLL", 0x7000_0000, 0x7000_0020, false).into(),
            Exec::new(0x40_0000).into(),
            Exec::new(0x7000_0010).into(),
            Exec::new(0x7000_0010).into(),
        ],
    );

    let written = artifact(&path);
    assert_eq!(written.len(), 0x20);
    assert_eq!(written[0x10], 2);
    assert!(written.iter().enumerate().all(|(i, &b)| i == 0x10 || b == 0));
}

#[test]
fn unmatched_module_leaves_artifact_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.hits");

    let mut config = Config::new(&path);
    config.module = Some("ntdll".to_string());

    run(
        config,
        &[
            Image::new("C:\\target.exe", 0x40_0000, 0x40_1000, true).into(),
            Exec::new(0x40_0000).into(),
        ],
    );

    assert_eq!(artifact(&path).len(), 0);
}

#[test]
fn saturation_survives_the_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.hits");

    let mut records: Vec<Record> =
        vec![Image::new("/usr/bin/target", 0x1000, 0x1010, true).into()];
    records.extend((0..300).map(|_| Record::from(Exec::new(0x1004))));

    run(Config::new(&path), &records);

    assert_eq!(artifact(&path)[4], 255);
}

#[test]
fn instructions_discovered_before_the_image_are_never_counted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.hits");

    // 0x1000 first executes before the image load is seen, so it was
    // discovered without a count hook; the later executions reuse that
    // decision. 0x1008 is first seen afterwards and is counted.
    run(
        Config::new(&path),
        &[
            Exec::new(0x1000).into(),
            Image::new("/usr/bin/target", 0x1000, 0x1010, true).into(),
            Exec::new(0x1000).into(),
            Exec::new(0x1008).into(),
        ],
    );

    let written = artifact(&path);
    assert_eq!(written[0], 0);
    assert_eq!(written[8], 1);
}
