//! Per-format container walkers.
//!
//! Each submodule walks one family of self-describing structures and writes
//! what it can decode into a fresh [`MetadataRecord`]. Walkers never fail:
//! a mismatched magic yields an empty [`Walk`], an undecodable field is
//! skipped, and every loop advances by at least one byte or is bounded by a
//! count taken from [`ParserConfig`].
//!
//! Walkers report the raw inputs for the duration instead of formatting it
//! themselves; [`crate::composite`] turns those into the `Duration` keys.

pub mod aac;
pub mod asf;
pub mod dsf;
pub mod flac;
pub mod id3;
pub mod lyrics3;
pub mod mp4;
pub mod mpeg;
pub mod ogg;
pub mod riff;
pub mod vorbis;

use crate::composite::DurationSource;
use crate::engine::ParserConfig;
use crate::record::MetadataRecord;

/// The bytes a walker operates on
#[derive(Debug, Clone, Copy)]
pub struct Stream<'a> {
    /// Buffer holding the prefix or whole file
    pub data: &'a [u8],
    /// Size of the whole file, from the filesystem when available
    pub file_size: u64,
    /// Bounds and limits
    pub config: &'a ParserConfig,
}

impl<'a> Stream<'a> {
    /// Creates a stream over `data`
    pub fn new(data: &'a [u8], file_size: u64, config: &'a ParserConfig) -> Self {
        Self {
            data,
            file_size,
            config,
        }
    }
}

/// What a walker produced
#[derive(Debug, Default)]
pub struct Walk {
    /// Decoded fields
    pub record: MetadataRecord,
    /// Inputs for the composite duration, when the walker found them
    pub duration: Option<DurationSource>,
}

impl Walk {
    /// Creates an empty walk result
    pub fn new() -> Self {
        Self::default()
    }
}
