//! Derived fields.
//!
//! Walkers hand back a [`DurationSource`] describing *how* the duration of
//! their stream can be computed. This module turns that into a formatted
//! `Duration` key under the format's group, aliased as `Composite:Duration`.
//! A source whose denominator is zero produces no key at all.

use crate::record::MetadataRecord;
use crate::sniff::AudioFormat;
use tracing::debug;

const APPROX_SUFFIX: &str = " (approx)";

/// Raw inputs for a stream duration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationSource {
    /// Sample count and rate, rounded to whole seconds and always shown as
    /// `H:MM:SS` (FLAC)
    RoundedSamples {
        /// Samples per channel
        total_samples: u64,
        /// Hz
        sample_rate: u32,
    },
    /// Sample count and rate, exact
    Samples {
        /// Samples per channel (or time units)
        total_samples: u64,
        /// Hz (or time units per second)
        sample_rate: u32,
    },
    /// PCM payload size and layout
    Pcm {
        /// `data` chunk size in bytes
        data_size: u64,
        /// Hz
        sample_rate: u32,
        /// Interleaved channel count
        channels: u16,
        /// Bits per sample
        bits_per_sample: u16,
    },
    /// Payload size over a nominal bitrate; approximate
    Bitrate {
        /// Audio payload in bytes
        payload_bytes: u64,
        /// Nominal bits per second
        bits_per_second: u64,
    },
    /// A 100-nanosecond tick count
    Filetime {
        /// Ticks
        hundred_ns: u64,
    },
}

impl DurationSource {
    /// Duration in seconds, `None` when a denominator is zero
    pub fn seconds(&self) -> Option<f64> {
        match *self {
            Self::RoundedSamples {
                total_samples,
                sample_rate,
            }
            | Self::Samples {
                total_samples,
                sample_rate,
            } => (sample_rate > 0).then(|| total_samples as f64 / f64::from(sample_rate)),
            Self::Pcm {
                data_size,
                sample_rate,
                channels,
                bits_per_sample,
            } => {
                let bytes_per_second = u64::from(sample_rate)
                    * u64::from(channels)
                    * u64::from(bits_per_sample / 8);
                (bytes_per_second > 0).then(|| data_size as f64 / bytes_per_second as f64)
            }
            Self::Bitrate {
                payload_bytes,
                bits_per_second,
            } => (bits_per_second > 0)
                .then(|| payload_bytes as f64 * 8.0 / bits_per_second as f64),
            Self::Filetime { hundred_ns } => Some(hundred_ns as f64 / 10_000_000.0),
        }
    }

    /// True for estimates that get the `(approx)` suffix
    pub fn is_approximate(&self) -> bool {
        matches!(self, Self::Bitrate { .. })
    }

    /// The formatted duration, or `None` if it cannot be computed
    pub fn format(&self) -> Option<String> {
        if let Self::RoundedSamples {
            total_samples,
            sample_rate,
        } = *self
        {
            return rounded_seconds(total_samples, sample_rate).map(format_hms);
        }
        let mut text = format_duration(self.seconds()?);
        if self.is_approximate() {
            text.push_str(APPROX_SUFFIX);
        }
        Some(text)
    }
}

/// `total / rate` rounded to the nearest second, ties to even
fn rounded_seconds(total: u64, rate: u32) -> Option<u64> {
    let rate = u64::from(rate);
    if rate == 0 {
        return None;
    }
    let (q, r) = (total / rate, total % rate);
    Some(match (2 * r).cmp(&rate) {
        std::cmp::Ordering::Less => q,
        std::cmp::Ordering::Greater => q + 1,
        std::cmp::Ordering::Equal => q + (q & 1),
    })
}

/// `0` -> `"0 s"`, under a minute -> `"X.XX s"`, otherwise `"H:MM:SS"`
///
/// The minute cut-off applies to the value as printed, so `59.999` is
/// `"0:01:00"` rather than `"60.00 s"`.
pub fn format_duration(seconds: f64) -> String {
    let rounded = (seconds * 100.0).round() / 100.0;
    if seconds == 0.0 {
        "0 s".to_string()
    } else if rounded < 60.0 {
        format!("{:.2} s", seconds)
    } else {
        format_hms(rounded as u64)
    }
}

/// `"H:MM:SS"` with no padding on the hours
pub fn format_hms(total_seconds: u64) -> String {
    format!(
        "{}:{:02}:{:02}",
        total_seconds / 3600,
        total_seconds % 3600 / 60,
        total_seconds % 60
    )
}

/// Canonical duration key and its aliases for a format
pub fn duration_keys(format: AudioFormat) -> Option<(&'static str, &'static [&'static str])> {
    const COMPOSITE: &str = "Composite:Duration";
    let keys: (&'static str, &'static [&'static str]) = match format {
        AudioFormat::Mp3 => ("Audio:MP3:Duration", &["MP3:Duration", COMPOSITE]),
        AudioFormat::Wav => ("Audio:WAV:Duration", &["WAV:Duration", COMPOSITE]),
        AudioFormat::Flac => ("Audio:FLAC:Duration", &[COMPOSITE]),
        AudioFormat::Ogg => ("Audio:OGG:Duration", &["OGG:Duration", COMPOSITE]),
        AudioFormat::Opus => ("Audio:OPUS:Duration", &[COMPOSITE]),
        AudioFormat::Wma => ("Audio:WMA:Duration", &["ASF:Duration", COMPOSITE]),
        AudioFormat::Dsf => ("DSF:Duration", &[COMPOSITE]),
        AudioFormat::Aac => ("AAC:Duration", &[COMPOSITE]),
        AudioFormat::M4a => ("Audio:M4A:Duration", &[COMPOSITE]),
        AudioFormat::Unknown => return None,
    };
    Some(keys)
}

/// Writes the duration for `format` into `record`; returns whether it did
pub fn apply(format: AudioFormat, source: &DurationSource, record: &mut MetadataRecord) -> bool {
    let (Some((key, aliases)), Some(text)) = (duration_keys(format), source.format()) else {
        return false;
    };
    debug!("{} derived from {:?}: {}", key, source, text);
    record.insert_aliased(key, aliases, text);
    true
}
