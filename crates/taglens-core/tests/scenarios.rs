//! End-to-end parsing through the public API

mod common;

use pretty_assertions::assert_eq;
use std::io::Write;
use std::path::PathBuf;
use taglens_core::{parse_bytes, parse_file, AudioFormat, AudioParser, Error, Value};
use tempfile::NamedTempFile;

#[test]
fn test_wav_one_second() {
    let record = parse_bytes(&common::wav(1, 176_400)).unwrap();
    assert_eq!(record.get_str("Audio:WAV:Duration"), Some("1.00 s"));
    assert_eq!(record.get_str("WAV:Duration"), Some("1.00 s"));
    assert_eq!(record.get_str("RIFF:Encoding"), Some("Microsoft PCM"));
    assert_eq!(record.get_str("File:FileType"), Some("WAV"));
}

#[test]
fn test_wav_float_encoding() {
    let record = parse_bytes(&common::wav(3, 64)).unwrap();
    assert_eq!(record.get_str("RIFF:Encoding"), Some("IEEE Float"));
}

#[test]
fn test_mp3_title() {
    let record = parse_bytes(&common::mp3("Test Title")).unwrap();
    assert_eq!(record.get_str("Audio:MP3:Title"), Some("Test Title"));
    assert_eq!(record.get_str("XMP:Title"), Some("Test Title"));
    assert_eq!(record.get_str("Audio:MP3:Format"), Some("MP3"));
    assert_eq!(record.get_str("File:MIMEType"), Some("audio/mpeg"));
    let duration = record.get_str("Composite:Duration").unwrap();
    assert!(duration.ends_with("(approx)"), "{}", duration);
}

#[test]
fn test_flac_streaminfo() {
    let record = parse_bytes(&common::flac(&[])).unwrap();
    assert_eq!(record.get_int("FLAC:SampleRate"), Some(44100));
    assert_eq!(record.get_int("FLAC:Channels"), Some(2));
    assert_eq!(record.get_int("FLAC:BitsPerSample"), Some(16));
    assert_eq!(record.get_str("Composite:Duration"), Some("0:00:02"));
    assert_eq!(record.get_str("Audio:FLAC:Duration"), Some("0:00:02"));
}

#[test]
fn test_flac_comment_keys_any_case() {
    for key in ["Title", "TITLE", "title"] {
        let entry = format!("{}=Mixed Case Value", key);
        let record = parse_bytes(&common::flac(&[entry.as_str()])).unwrap();
        assert_eq!(
            record.get_str("Audio:FLAC:Title"),
            Some("Mixed Case Value"),
            "key {}",
            key
        );
    }
}

#[test]
fn test_opus_head() {
    let record = parse_bytes(&common::opus(2, 48000)).unwrap();
    assert_eq!(record.get_int("Opus:AudioChannels"), Some(2));
    assert_eq!(record.get_int("Opus:SampleRate"), Some(48000));
    assert_eq!(record.get_str("Audio:OPUS:Title"), Some("Night"));
    assert_eq!(record.get_str("Audio:OPUS:Artist"), Some("Somebody"));
    assert_eq!(record.get("Opus:OutputGain"), Some(&Value::Int(1)));
    assert_eq!(record.get_str("File:FileType"), Some("OPUS"));
}

#[test]
fn test_path_and_bytes_agree() {
    for (name, data) in common::all_fixtures() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();
        let from_path = parse_file(file.path()).unwrap();
        let from_bytes = parse_bytes(&data).unwrap();
        assert_eq!(from_path, from_bytes, "{}", name);
    }
}

#[test]
fn test_extension_fallback() {
    // no signature, but the extension names a format whose walker rejects it
    let file = tempfile::Builder::new().suffix(".flac").tempfile().unwrap();
    std::fs::write(file.path(), b"not really audio").unwrap();
    assert!(parse_file(file.path()).unwrap().is_empty());
    assert_eq!(
        AudioFormat::sniff(b"not really audio", Some("flac"), &Default::default()),
        AudioFormat::Flac
    );
}

#[test]
fn test_source_contract() {
    assert!(matches!(
        AudioParser::new(None, None),
        Err(Error::InvalidSource { .. })
    ));
    assert!(matches!(
        AudioParser::new(Some(PathBuf::from("x.wav")), Some(Vec::new())),
        Err(Error::InvalidSource { .. })
    ));
}

#[test]
fn test_json_shape() {
    let record = parse_bytes(&common::wav(1, 176_400)).unwrap();
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["Audio:WAV:Duration"], "1.00 s");
    assert_eq!(json["RIFF:NumChannels"], 2);
    assert_eq!(json["Audio:WAV:NumChannels"], 2);
}
