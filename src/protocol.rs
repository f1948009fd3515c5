//! # Protocol Primitives
//!
//! The narrow command interface between the control layer and whatever actually
//! speaks to MPD. [`Transport`] is the seam: [`TcpTransport`] talks the real
//! line protocol, [`MemoryDaemon`] simulates a daemon in memory.
//!
//! Responses are kept as text. MPD answers every command with `key: value`
//! lines terminated by `OK` (or an `ACK` error line), and this module only
//! knows how to group those pairs into [`Record`]s.
//!
//! [`TcpTransport`]: crate::mpd_transport::TcpTransport
//! [`MemoryDaemon`]: crate::memory::MemoryDaemon

use crate::error::TransportError;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::str::FromStr;

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Keys that start a new entry in a multi-entry response.
pub const ENTRY_KEYS: &[&str] = &["file", "directory", "playlist"];

/// Primitive MPD commands. One method per protocol verb, no composition.
///
/// Implementations are driven from one thread at a time; the connection
/// manager serializes access with a mutex.
pub trait Transport {
    /// Send `close` and stop using the session.
    fn close(&mut self) -> TransportResult<()>;
    /// Drop the underlying session. Never fails; calling it twice is fine.
    fn disconnect(&mut self);
    fn ping(&mut self) -> TransportResult<()>;

    fn status(&mut self) -> TransportResult<Record>;
    fn currentsong(&mut self) -> TransportResult<Record>;
    /// File URIs of the queue, in queue order.
    fn playlist(&mut self) -> TransportResult<Vec<String>>;
    /// One record per queued track, each carrying `file`, `Pos` and `Id`.
    fn playlistid(&mut self) -> TransportResult<Vec<Record>>;
    fn tagtypes(&mut self) -> TransportResult<Vec<String>>;

    /// Exact match on one tag.
    fn find(&mut self, tag: &str, term: &str) -> TransportResult<Vec<Record>>;
    /// Case-insensitive substring match; `tag` may be `any`.
    fn search(&mut self, tag: &str, term: &str) -> TransportResult<Vec<Record>>;
    /// Exact match on one tag, appending every hit to the queue.
    fn findadd(&mut self, tag: &str, term: &str) -> TransportResult<()>;
    fn listall(&mut self) -> TransportResult<Vec<Record>>;
    fn update(&mut self) -> TransportResult<Record>;

    fn add(&mut self, uri: &str) -> TransportResult<()>;
    fn clear(&mut self) -> TransportResult<()>;
    fn delete(&mut self, pos: u32) -> TransportResult<()>;
    fn deleteid(&mut self, id: u32) -> TransportResult<()>;

    fn play(&mut self, pos: Option<u32>) -> TransportResult<()>;
    fn stop(&mut self) -> TransportResult<()>;
    fn next(&mut self) -> TransportResult<()>;
    fn previous(&mut self) -> TransportResult<()>;
    fn pause(&mut self, pause: bool) -> TransportResult<()>;
    fn random(&mut self, enabled: bool) -> TransportResult<()>;
    fn repeat(&mut self, enabled: bool) -> TransportResult<()>;
    fn shuffle(&mut self) -> TransportResult<()>;
}

/// One entry of a daemon response: ordered text fields.
///
/// Key lookup ignores ASCII case, so `get("pos")` finds MPD's `Pos`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            fields: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Every value stored under `key` (multi-valued tags such as `Genre`).
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Parse the value under `key` as an unsigned integer.
    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    pub fn file(&self) -> Option<&str> {
        self.get("file")
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.push((key.into(), value.into()));
    }

    /// Replace the first value under `key`, or append it.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(key)) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key.to_string(), value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.fields {
            writeln!(f, "{key}: {value}")?;
        }
        Ok(())
    }
}

// Serialized as an object; repeated keys keep their first value.
impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seen: Vec<&str> = Vec::with_capacity(self.fields.len());
        let mut map = serializer.serialize_map(None)?;
        for (key, value) in &self.fields {
            if seen.iter().any(|s| s.eq_ignore_ascii_case(key)) {
                continue;
            }
            seen.push(key);
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Playback state as reported by the `state` field of `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Play,
    Pause,
    Stop,
}

impl FromStr for PlayerState {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "play" => Ok(PlayerState::Play),
            "pause" => Ok(PlayerState::Pause),
            "stop" => Ok(PlayerState::Stop),
            other => Err(TransportError::Protocol(format!("unknown player state `{other}`"))),
        }
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlayerState::Play => "play",
            PlayerState::Pause => "pause",
            PlayerState::Stop => "stop",
        })
    }
}

/// Split one response line into its `key: value` pair.
pub fn parse_pair(line: &str) -> TransportResult<(String, String)> {
    line.split_once(": ")
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| TransportError::Protocol(format!("expected `key: value`, got `{line}`")))
}

/// Group a flat list of pairs into records. A new record starts whenever one
/// of `entry_keys` shows up after the current record already has fields.
pub fn group_records(pairs: Vec<(String, String)>, entry_keys: &[&str]) -> Vec<Record> {
    let mut records = Vec::new();
    let mut current = Record::new();

    for (key, value) in pairs {
        let starts_entry = entry_keys.iter().any(|k| k.eq_ignore_ascii_case(&key));
        if starts_entry && !current.is_empty() {
            records.push(std::mem::take(&mut current));
        }
        current.push(key, value);
    }
    if !current.is_empty() {
        records.push(current);
    }

    records
}

/// Quote a command argument: wrap in double quotes, escape `\` and `"`.
///
/// Line breaks cannot be escaped; they would end the command early.
pub fn quote(arg: &str) -> TransportResult<String> {
    if arg.contains(['\n', '\r']) {
        return Err(TransportError::Argument(format!("line break in {arg:?}")));
    }
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    for c in arg.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    Ok(out)
}
