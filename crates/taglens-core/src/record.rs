//! The metadata sink.
//!
//! A [`MetadataRecord`] maps namespaced `"Group:Tag"` keys to typed
//! [`Value`]s. Fields that consumers expect under more than one group (e.g.
//! `Audio:WAV:NumChannels` and `RIFF:NumChannels`) are stored once under a
//! canonical key, with the other names registered as aliases. Every read
//! accessor works on the expanded view, so an alias looks exactly like a
//! regular key to callers.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// A decoded field value
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Text
    Str(String),
    /// Signed integer (all unsigned fields up to 63 bits fit)
    Int(i64),
    /// Floating point
    Float(f64),
    /// Flag
    Bool(bool),
    /// List of strings, e.g. MP4 compatible brands
    List(Vec<String>),
}

impl Value {
    /// Returns the string payload, if this is a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an integer value
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the float payload, if this is a float value
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the boolean payload, if this is a boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
            Self::List(items) => f.write_str(&items.join(", ")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

macro_rules! int_value {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Self::Int(i64::from(v))
            }
        })*
    };
}

int_value!(u8, u16, u32, i8, i16, i32, i64);

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        // QWORD descriptors can exceed i64; keep them exact as text
        match i64::try_from(v) {
            Ok(v) => Self::Int(v),
            Err(_) => Self::Str(v.to_string()),
        }
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Self::from(v as u64)
    }
}

/// Ordered, string-keyed accumulation of decoded fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataRecord {
    entries: BTreeMap<String, Value>,
    /// alias key -> canonical key
    aliases: BTreeMap<String, String>,
}

impl MetadataRecord {
    /// Creates an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, overwriting any earlier value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        self.aliases.remove(&key);
        self.entries.insert(key, value.into());
    }

    /// Sets `canonical` and registers `aliases` as alternative names for it
    pub fn insert_aliased(&mut self, canonical: &str, aliases: &[&str], value: impl Into<Value>) {
        self.insert(canonical, value);
        for alias in aliases {
            self.entries.remove(*alias);
            self.aliases.insert((*alias).to_string(), canonical.to_string());
        }
    }

    /// Sets `key` only if nothing (canonical or alias) answers to it yet
    ///
    /// Returns true if the value was stored.
    pub fn insert_if_absent(&mut self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        let key = key.into();
        if self.contains_key(&key) {
            return false;
        }
        self.insert(key, value);
        true
    }

    /// Looks up a key, resolving aliases
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).or_else(|| {
            self.aliases
                .get(key)
                .and_then(|canonical| self.entries.get(canonical))
        })
    }

    /// Looks up a key and returns it as a string slice
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Looks up a key and returns it as an integer
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_int)
    }

    /// Returns true if the key (or an alias of that name) is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of keys in the expanded view
    pub fn len(&self) -> usize {
        self.entries.len()
            + self
                .aliases
                .values()
                .filter(|canonical| self.entries.contains_key(*canonical))
                .count()
    }

    /// Returns true if the record holds no fields
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Materializes the expanded view: canonical keys plus every alias
    pub fn expanded(&self) -> BTreeMap<&str, &Value> {
        let mut out: BTreeMap<&str, &Value> = self
            .entries
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        for (alias, canonical) in &self.aliases {
            if let Some(value) = self.entries.get(canonical) {
                out.insert(alias.as_str(), value);
            }
        }
        out
    }

    /// Iterates the expanded view in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.expanded().into_iter()
    }

    /// Keys of the expanded view in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.expanded().into_keys()
    }

    /// Canonical entries only, without alias expansion
    pub fn canonical_entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Alias names declared for a canonical key
    pub fn aliases_of<'a>(&'a self, canonical: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.aliases
            .iter()
            .filter(move |(_, c)| c.as_str() == canonical)
            .map(|(alias, _)| alias.as_str())
    }

    /// Folds `other` into this record; keys from `other` win
    pub fn merge(&mut self, other: MetadataRecord) {
        for (key, value) in other.entries {
            self.insert(key, value);
        }
        for (alias, canonical) in other.aliases {
            self.entries.remove(&alias);
            self.aliases.insert(alias, canonical);
        }
    }
}

impl Serialize for MetadataRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let expanded = self.expanded();
        let mut map = serializer.serialize_map(Some(expanded.len()))?;
        for (key, value) in expanded {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'a> IntoIterator for &'a MetadataRecord {
    type Item = (&'a str, &'a Value);
    type IntoIter = std::collections::btree_map::IntoIter<&'a str, &'a Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.expanded().into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_insert_overwrites() {
        let mut record = MetadataRecord::new();
        record.insert("Audio:MP3:Title", "first");
        record.insert("Audio:MP3:Title", "second");
        assert_eq!(record.get_str("Audio:MP3:Title"), Some("second"));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_insert_if_absent() {
        let mut record = MetadataRecord::new();
        assert!(record.insert_if_absent("XMP:Title", "from id3"));
        assert!(!record.insert_if_absent("XMP:Title", "from vorbis"));
        assert_eq!(record.get_str("XMP:Title"), Some("from id3"));
    }

    #[test]
    fn test_alias_expansion() {
        let mut record = MetadataRecord::new();
        record.insert_aliased("Audio:WAV:NumChannels", &["RIFF:NumChannels"], 2u16);

        assert_eq!(record.get_int("RIFF:NumChannels"), Some(2));
        assert_eq!(record.get("RIFF:NumChannels"), record.get("Audio:WAV:NumChannels"));
        assert_eq!(record.len(), 2);
        assert_eq!(
            record.keys().collect::<Vec<_>>(),
            vec!["Audio:WAV:NumChannels", "RIFF:NumChannels"]
        );
        assert_eq!(
            record.aliases_of("Audio:WAV:NumChannels").collect::<Vec<_>>(),
            vec!["RIFF:NumChannels"]
        );
        assert_eq!(record.canonical_entries().count(), 1);
    }

    #[test]
    fn test_alias_blocks_insert_if_absent() {
        let mut record = MetadataRecord::new();
        record.insert_aliased("Audio:MP3:Encoder", &["ID3:Encoder"], "LAME");
        assert!(!record.insert_if_absent("ID3:Encoder", "other"));
    }

    #[test]
    fn test_direct_insert_detaches_alias() {
        let mut record = MetadataRecord::new();
        record.insert_aliased("Audio:WAV:Duration", &["Composite:Duration"], "1.00 s");
        record.insert("Composite:Duration", "0:00:02");
        assert_eq!(record.get_str("Composite:Duration"), Some("0:00:02"));
        assert_eq!(record.get_str("Audio:WAV:Duration"), Some("1.00 s"));
    }

    #[test]
    fn test_merge() {
        let mut record = MetadataRecord::new();
        record.insert("Audio:MP3:Title", "a");
        let mut other = MetadataRecord::new();
        other.insert("Lyrics3:Version", "2.00");
        record.merge(other);
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_serialize_expanded() {
        let mut record = MetadataRecord::new();
        record.insert_aliased("FLAC:Channels", &["Audio:FLAC:Channels"], 2u8);
        record.insert("Audio:FLAC:HasVorbisComments", true);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"Audio:FLAC:Channels":2,"Audio:FLAC:HasVorbisComments":true,"FLAC:Channels":2}"#
        );
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from(7u32), Value::Int(7));
        assert_eq!(Value::from(u64::MAX), Value::Str(u64::MAX.to_string()));
        assert_eq!(Value::from(vec!["M4A ".to_string()]).to_string(), "M4A ");
        assert_eq!(Value::from(true).to_string(), "true");
    }
}
