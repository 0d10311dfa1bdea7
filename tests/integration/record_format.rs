#![allow(missing_docs)]

use std::fs;
use std::io::BufReader;

use osn_sampler::{
    sampler::{read_records, RecordParseError, SampleRecord, SampleRecorder},
    types::UserId,
};
use proptest::prelude::*;
use tempfile::TempDir;

fn arb_record() -> impl Strategy<Value = SampleRecord> {
    (
        any::<u64>(),
        prop::collection::vec(any::<u64>(), 0..40),
    )
        .prop_map(|(subject, friends)| {
            SampleRecord::new(UserId(subject), friends.into_iter().map(UserId).collect())
        })
}

proptest! {
    #[test]
    fn prop_recorded_lines_parse_back(records in prop::collection::vec(arb_record(), 0..30)) {
        let mut recorder = SampleRecorder::new(Vec::new());
        for record in &records {
            recorder.append(record.subject, &record.friends).unwrap();
        }
        prop_assert_eq!(recorder.written(), records.len() as u64);

        let bytes = recorder.into_inner();
        let text = String::from_utf8(bytes.clone()).unwrap();
        prop_assert_eq!(text.lines().count(), records.len());
        for line in text.lines() {
            prop_assert_eq!(line.matches('#').count(), 1);
            prop_assert!(!line.ends_with(','));
        }
        prop_assert_eq!(read_records(bytes.as_slice()).unwrap(), records);
    }
}

#[test]
fn file_recorder_truncates_unless_appending() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("samples.txt");

    let mut first = SampleRecorder::create(&path, false).unwrap();
    first.append(UserId(1), &[UserId(2), UserId(3)]).unwrap();
    first.flush().unwrap();
    drop(first);

    let mut second = SampleRecorder::create(&path, true).unwrap();
    second.append(UserId(2), &[]).unwrap();
    second.flush().unwrap();
    drop(second);
    assert_eq!(fs::read_to_string(&path).unwrap(), "1#2,3\n2#\n");

    let mut third = SampleRecorder::create(&path, false).unwrap();
    third.append(UserId(9), &[UserId(1)]).unwrap();
    third.flush().unwrap();
    drop(third);
    assert_eq!(fs::read_to_string(&path).unwrap(), "9#1\n");
}

#[test]
fn reading_a_file_reports_the_bad_line() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("samples.txt");
    fs::write(&path, "1#2,3\n\n4#x\n").unwrap();

    let file = fs::File::open(&path).unwrap();
    let err = read_records(BufReader::new(file)).unwrap_err();
    match err {
        RecordParseError::InvalidId { line, value } => {
            assert_eq!(line, 3);
            assert_eq!(value, "x");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn lines_without_delimiter_are_rejected() {
    assert!(matches!(
        read_records("12,13\n".as_bytes()),
        Err(RecordParseError::MissingDelimiter { line: 1 })
    ));
}
