//! Round-trips through the public open path.

use cadena_core::{Encoding, Sample, SampleSize, SignalInfo};
use cadena_io::{open_read, open_write};
use tempfile::TempDir;

fn signal(rate: u32, channels: u32) -> SignalInfo {
    SignalInfo {
        rate: Some(rate),
        channels: Some(channels),
        size: Some(SampleSize::Two),
        encoding: Some(Encoding::Signed),
        ..SignalInfo::default()
    }
}

#[test]
fn wav_round_trip_through_the_open_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("x.wav").to_string_lossy().into_owned();
    let samples: Vec<Sample> = (0..100).map(|i| i << 16).collect();

    let mut writer = open_write(&path, &signal(44100, 2), None, Some(100), None).unwrap();
    writer.write(&samples).unwrap();
    writer.finalize().unwrap();

    let mut reader = open_read(&path, &SignalInfo::default(), None).unwrap();
    assert_eq!(reader.signal().rate, Some(44100));
    assert_eq!(reader.signal().channels, Some(2));
    assert_eq!(reader.length_samples(), Some(100));

    let mut buf = vec![0; 128];
    let n = reader.read(&mut buf).unwrap();
    assert_eq!(n, 100);
    assert_eq!(&buf[..100], &samples[..]);
}

#[test]
fn raw_needs_a_type_hint_without_an_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("headerless").to_string_lossy().into_owned();
    std::fs::write(&path, [0u8; 8]).unwrap();

    assert!(open_read(&path, &signal(8000, 1), None).is_err());
    let reader = open_read(&path, &signal(8000, 1), Some("raw")).unwrap();
    assert_eq!(reader.length_samples(), Some(4));
}

#[test]
fn wav_header_wins_over_hints_and_raw_respects_them() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("h.wav").to_string_lossy().into_owned();
    let mut writer = open_write(&path, &signal(8000, 1), None, None, None).unwrap();
    writer.write(&[1 << 16]).unwrap();
    writer.finalize().unwrap();

    let reader = open_read(&path, &signal(44100, 2), None).unwrap();
    assert_eq!(reader.signal().rate, Some(8000));
    assert_eq!(reader.signal().channels, Some(1));
}

#[test]
fn null_type_hint_opens_a_placeholder() {
    let mut reader = open_read("whatever", &SignalInfo::default(), Some("null")).unwrap();
    let mut buf = [0; 4];
    assert_eq!(reader.read(&mut buf).unwrap(), 0);
}
