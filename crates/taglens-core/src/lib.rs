//! # taglens-core
//!
//! A library for decoding metadata from audio container files.
//!
//! This crate provides the core functionality for:
//! - Sniffing the container family from a file's leading bytes
//! - Walking the self-describing structures of each family (RIFF chunks,
//!   ID3v2 frames, FLAC blocks, Ogg packets, ASF objects, ADTS/ADIF headers,
//!   DSF chunks, MP4 boxes)
//! - Deriving composite fields such as a formatted duration
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`decode`]: Fixed-width integers, bit fields, synchsafe integers, text
//! - [`containers`]: One walker per container family
//! - [`sniff`]: Format detection and dispatch
//! - [`composite`]: Derived fields
//! - [`record`]: The `"Group:Tag"` result map
//! - [`engine`]: The parse entry point
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use taglens_core::{AudioParser, ParserConfig};
//!
//! let parser = AudioParser::from_path("./track.flac")
//!     .with_config(ParserConfig::new().text_limit(2000));
//! let record = parser.parse()?;
//!
//! for (key, value) in record.iter() {
//!     println!("{}: {}", key, value);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Unrecognized input is not an error: it parses to an empty record.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod composite;
pub mod containers;
pub mod decode;
pub mod engine;
pub mod error;
pub mod record;
pub mod sniff;

// Re-export primary types for convenience
pub use composite::{format_duration, DurationSource};
pub use engine::{parse_bytes, parse_file, AudioParser, ParserConfig};
pub use error::{Error, Result};
pub use record::{MetadataRecord, Value};
pub use sniff::AudioFormat;

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
