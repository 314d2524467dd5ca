//! Property tests: decoders are total over arbitrary and truncated input

mod common;

use proptest::prelude::*;
use taglens_core::decode::{encode_synchsafe, synchsafe};
use taglens_core::{format_duration, parse_bytes, AudioFormat};

/// Every signature the sniffer keys on
const MAGICS: &[&[u8]] = &[
    b"ID3\x03\x00\x00",
    b"RIFF\xff\xff\xff\xffWAVE",
    b"fLaC",
    b"OggS\0\x02",
    b"DSD ",
    b"ADIF",
    &[0xFF, 0xF1],
    &[0xFF, 0xFB],
    b"\0\0\0\x18ftypM4A ",
    &[
        0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11, 0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE,
        0x6C,
    ],
];

#[test]
fn test_truncation_sweep() {
    for (name, data) in common::all_fixtures() {
        for len in 0..=data.len().min(2000) {
            assert!(parse_bytes(&data[..len]).is_ok(), "{} cut at {}", name, len);
        }
    }
}

#[test]
fn test_zero_lengths() {
    for len in 0..2000 {
        assert!(parse_bytes(&vec![0u8; len]).unwrap().is_empty());
    }
}

#[test]
fn test_duration_examples() {
    assert_eq!(format_duration(0.0), "0 s");
    assert_eq!(format_duration(45.5), "45.50 s");
    assert_eq!(format_duration(125.0), "0:02:05");
}

proptest! {
    #[test]
    fn synchsafe_round_trip(size in 0u32..(1 << 28)) {
        let raw = encode_synchsafe(size);
        prop_assert!(raw.iter().all(|b| b & 0x80 == 0));
        prop_assert_eq!(synchsafe(raw), size);
    }

    #[test]
    fn arbitrary_bytes_never_fail(data in prop::collection::vec(any::<u8>(), 0..2048)) {
        prop_assert!(parse_bytes(&data).is_ok());
    }

    #[test]
    fn magic_prefixed_bytes_never_fail(
        magic in prop::sample::select(MAGICS),
        tail in prop::collection::vec(any::<u8>(), 0..2048),
    ) {
        let data = [magic, tail.as_slice()].concat();
        prop_assert!(parse_bytes(&data).is_ok());
        for format in AudioFormat::ALL {
            let _ = format.decode(&data);
        }
    }

    #[test]
    fn vorbis_keys_ignore_case(
        mask in prop::collection::vec(any::<bool>(), 5),
        value in "[A-Za-z0-9]{1,24}",
    ) {
        let key: String = "title"
            .chars()
            .zip(&mask)
            .map(|(c, upper)| if *upper { c.to_ascii_uppercase() } else { c })
            .collect();
        let entry = format!("{}={}", key, value);
        let record = parse_bytes(&common::flac(&[entry.as_str()])).unwrap();
        prop_assert_eq!(record.get_str("Audio:FLAC:Title"), Some(value.as_str()));
    }
}
