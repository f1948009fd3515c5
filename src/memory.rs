//! # In-Memory Daemon
//!
//! [`MemoryDaemon`] implements [`Transport`] against a simulated MPD: a music
//! database, a queue, player flags, and a log of every command it received.
//!
//! Clones share state, so a test can hand one clone to a
//! [`Connection`](crate::connection::Connection) and keep another to inspect
//! what the connection did.
//!
//! ```
//! use mpdctl::memory::MemoryDaemon;
//!
//! let daemon = MemoryDaemon::new()
//!     .with_track("tool/lateralus/09.flac", &[("Artist", "Tool"), ("Title", "Lateralus")]);
//! assert_eq!(daemon.library_len(), 1);
//! ```

use crate::error::TransportError;
use crate::protocol::{PlayerState, Record, Transport, TransportResult};
use log::debug;
use rand::seq::SliceRandom;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const DEFAULT_TAG_TYPES: &[&str] = &[
    "Artist", "Album", "Title", "Track", "Name", "Genre", "Date", "Composer", "Performer", "Disc",
];

#[derive(Debug, Clone)]
struct QueueEntry {
    id: u32,
    song: Record,
}

#[derive(Debug)]
struct DaemonState {
    library: Vec<Record>,
    queue: Vec<QueueEntry>,
    next_id: u32,
    current: Option<usize>,
    state: PlayerState,
    random: bool,
    repeat: bool,
    volume: u8,
    update_jobs: u32,
    calls: Vec<String>,
    reachable: bool,
    closed: bool,
}

impl Default for DaemonState {
    fn default() -> Self {
        Self {
            library: Vec::new(),
            queue: Vec::new(),
            next_id: 1,
            current: None,
            state: PlayerState::Stop,
            random: false,
            repeat: false,
            volume: 100,
            update_jobs: 0,
            calls: Vec::new(),
            reachable: true,
            closed: false,
        }
    }
}

impl DaemonState {
    fn enqueue(&mut self, song: Record) {
        let id = self.next_id;
        self.next_id += 1;
        self.queue.push(QueueEntry { id, song });
    }

    fn matching(&self, tag: &str, accept: impl Fn(&str) -> bool) -> Vec<Record> {
        let any = tag.eq_ignore_ascii_case("any");
        self.library
            .iter()
            .filter(|song| {
                if any {
                    song.iter().any(|(key, value)| key != "file" && accept(value))
                        || song.file().is_some_and(&accept)
                } else {
                    song.get_all(tag).any(&accept)
                }
            })
            .cloned()
            .collect()
    }

    fn exact(&self, tag: &str, term: &str) -> Vec<Record> {
        self.matching(tag, |value| value == term)
    }

    fn fuzzy(&self, tag: &str, term: &str) -> Vec<Record> {
        let needle = term.to_lowercase();
        self.matching(tag, |value| value.to_lowercase().contains(&needle))
    }

    fn select(&mut self, pos: usize) -> TransportResult<()> {
        if pos >= self.queue.len() {
            return Err(ack(2, "play", "Bad song index"));
        }
        self.current = Some(pos);
        self.state = PlayerState::Play;
        Ok(())
    }

    fn remove(&mut self, pos: usize) {
        self.queue.remove(pos);
        self.current = match self.current {
            Some(cur) if cur == pos => {
                self.state = PlayerState::Stop;
                None
            }
            Some(cur) if cur > pos => Some(cur - 1),
            other => other,
        };
    }
}

fn ack(code: u32, command: &str, message: &str) -> TransportError {
    TransportError::Ack {
        code,
        command: command.to_string(),
        message: message.to_string(),
    }
}

/// Simulated MPD. Cheap to clone; clones share one state.
#[derive(Debug, Clone, Default)]
pub struct MemoryDaemon {
    state: Arc<Mutex<DaemonState>>,
}

impl MemoryDaemon {
    pub fn new() -> Self {
        Self::default()
    }

    /// A small seeded library for offline runs of the binary.
    pub fn demo() -> Self {
        Self::new()
            .with_track(
                "sunset_strip/rattle/01-rattle.flac",
                &[("Artist", "Sunset Strip"), ("Album", "Rattle"), ("Title", "Rattle"), ("Genre", "Dance")],
            )
            .with_track(
                "sunset_strip/rattle/02-hum.flac",
                &[("Artist", "Sunset Strip"), ("Album", "Rattle"), ("Title", "Hum"), ("Genre", "Dance")],
            )
            .with_track(
                "moss/canopy/01-lichen.ogg",
                &[("Artist", "Moss"), ("Album", "Canopy"), ("Title", "Lichen"), ("Genre", "Ambient")],
            )
            .with_track(
                "moss/canopy/02-fern.ogg",
                &[("Artist", "Moss"), ("Album", "Canopy"), ("Title", "Fern"), ("Genre", "Ambient")],
            )
            .with_track(
                "ida_rue/night_bus.mp3",
                &[("Artist", "Ida Rue"), ("Title", "Night Bus"), ("Genre", "Jazz"), ("Composer", "Ida Rue")],
            )
    }

    /// Add a song to the simulated database.
    pub fn with_track(self, file: &str, tags: &[(&str, &str)]) -> Self {
        self.add_track(file, tags);
        self
    }

    pub fn add_track(&self, file: &str, tags: &[(&str, &str)]) {
        let mut song = Record::new();
        song.push("file", file);
        for (key, value) in tags {
            song.push(*key, *value);
        }
        self.lock().library.push(song);
    }

    /// Put a database song straight into the queue without logging a call.
    pub fn seed_queue(&self, file: &str) -> bool {
        let mut state = self.lock();
        let Some(song) = state.library.iter().find(|s| s.file() == Some(file)).cloned() else {
            return false;
        };
        state.enqueue(song);
        true
    }

    /// Set the player state directly (`play`/`pause` need a selected song).
    pub fn set_player_state(&self, player: PlayerState) {
        let mut state = self.lock();
        if player != PlayerState::Stop && state.current.is_none() && !state.queue.is_empty() {
            state.current = Some(0);
        }
        state.state = player;
    }

    /// Simulate the daemon going away: every later command fails with
    /// [`TransportError::Disconnected`].
    pub fn drop_connection(&self) {
        self.lock().reachable = false;
    }

    /// Every command received, in order, rendered as protocol lines.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Number of received commands whose verb is `verb`.
    pub fn count(&self, verb: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.split(' ').next() == Some(verb))
            .count()
    }

    pub fn ping_count(&self) -> usize {
        self.count("ping")
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// File URIs currently queued.
    pub fn queue_files(&self) -> Vec<String> {
        self.lock()
            .queue
            .iter()
            .filter_map(|e| e.song.file().map(str::to_string))
            .collect()
    }

    pub fn library_len(&self) -> usize {
        self.lock().library.len()
    }

    pub fn player_state(&self) -> PlayerState {
        self.lock().state
    }

    /// True once `close` or `disconnect` reached the daemon.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, DaemonState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Log the command and hand out the state, or fail if the session is gone.
    fn begin(&self, line: String) -> TransportResult<MutexGuard<'_, DaemonState>> {
        let mut state = self.lock();
        if !state.reachable || state.closed {
            return Err(TransportError::Disconnected);
        }
        debug!("memory daemon <- {line}");
        state.calls.push(line);
        Ok(state)
    }
}

impl Transport for MemoryDaemon {
    fn close(&mut self) -> TransportResult<()> {
        let mut state = self.begin("close".to_string())?;
        state.closed = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.lock().closed = true;
    }

    fn ping(&mut self) -> TransportResult<()> {
        self.begin("ping".to_string()).map(|_| ())
    }

    fn status(&mut self) -> TransportResult<Record> {
        let state = self.begin("status".to_string())?;
        let mut status = Record::new();
        status.push("volume", state.volume.to_string());
        status.push("repeat", u8::from(state.repeat).to_string());
        status.push("random", u8::from(state.random).to_string());
        status.push("playlistlength", state.queue.len().to_string());
        status.push("state", state.state.to_string());
        if let Some(cur) = state.current {
            status.push("song", cur.to_string());
            status.push("songid", state.queue[cur].id.to_string());
        }
        if state.update_jobs > 0 {
            status.push("updating_db", state.update_jobs.to_string());
        }
        Ok(status)
    }

    fn currentsong(&mut self) -> TransportResult<Record> {
        let state = self.begin("currentsong".to_string())?;
        let Some(cur) = state.current else {
            return Ok(Record::new());
        };
        let entry = &state.queue[cur];
        let mut song = entry.song.clone();
        song.push("Pos", cur.to_string());
        song.push("Id", entry.id.to_string());
        Ok(song)
    }

    fn playlist(&mut self) -> TransportResult<Vec<String>> {
        let state = self.begin("playlist".to_string())?;
        Ok(state
            .queue
            .iter()
            .filter_map(|e| e.song.file().map(str::to_string))
            .collect())
    }

    fn playlistid(&mut self) -> TransportResult<Vec<Record>> {
        let state = self.begin("playlistid".to_string())?;
        Ok(state
            .queue
            .iter()
            .enumerate()
            .map(|(pos, entry)| {
                let mut song = entry.song.clone();
                song.push("Pos", pos.to_string());
                song.push("Id", entry.id.to_string());
                song
            })
            .collect())
    }

    fn tagtypes(&mut self) -> TransportResult<Vec<String>> {
        let _state = self.begin("tagtypes".to_string())?;
        Ok(DEFAULT_TAG_TYPES.iter().map(|t| t.to_string()).collect())
    }

    fn find(&mut self, tag: &str, term: &str) -> TransportResult<Vec<Record>> {
        let state = self.begin(format!("find {tag} {term}"))?;
        Ok(state.exact(tag, term))
    }

    fn search(&mut self, tag: &str, term: &str) -> TransportResult<Vec<Record>> {
        let state = self.begin(format!("search {tag} {term}"))?;
        Ok(state.fuzzy(tag, term))
    }

    fn findadd(&mut self, tag: &str, term: &str) -> TransportResult<()> {
        let mut state = self.begin(format!("findadd {tag} {term}"))?;
        for song in state.exact(tag, term) {
            state.enqueue(song);
        }
        Ok(())
    }

    fn listall(&mut self) -> TransportResult<Vec<Record>> {
        let state = self.begin("listall".to_string())?;
        Ok(state
            .library
            .iter()
            .filter_map(|s| s.file().map(|f| Record::from_pairs([("file", f)])))
            .collect())
    }

    fn update(&mut self) -> TransportResult<Record> {
        let mut state = self.begin("update".to_string())?;
        state.update_jobs += 1;
        Ok(Record::from_pairs([("updating_db", state.update_jobs.to_string())]))
    }

    fn add(&mut self, uri: &str) -> TransportResult<()> {
        let mut state = self.begin(format!("add {uri}"))?;
        let song = state
            .library
            .iter()
            .find(|s| s.file() == Some(uri))
            .cloned()
            .ok_or_else(|| ack(50, "add", "No such directory"))?;
        state.enqueue(song);
        Ok(())
    }

    fn clear(&mut self) -> TransportResult<()> {
        let mut state = self.begin("clear".to_string())?;
        state.queue.clear();
        state.current = None;
        state.state = PlayerState::Stop;
        Ok(())
    }

    fn delete(&mut self, pos: u32) -> TransportResult<()> {
        let mut state = self.begin(format!("delete {pos}"))?;
        let pos = pos as usize;
        if pos >= state.queue.len() {
            return Err(ack(2, "delete", "Bad song index"));
        }
        state.remove(pos);
        Ok(())
    }

    fn deleteid(&mut self, id: u32) -> TransportResult<()> {
        let mut state = self.begin(format!("deleteid {id}"))?;
        let pos = state
            .queue
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| ack(50, "deleteid", "No such song"))?;
        state.remove(pos);
        Ok(())
    }

    fn play(&mut self, pos: Option<u32>) -> TransportResult<()> {
        let line = match pos {
            Some(pos) => format!("play {pos}"),
            None => "play".to_string(),
        };
        let mut state = self.begin(line)?;
        match pos {
            Some(pos) => state.select(pos as usize),
            None if state.queue.is_empty() => Ok(()),
            None => {
                let pos = state.current.unwrap_or(0);
                state.select(pos)
            }
        }
    }

    fn stop(&mut self) -> TransportResult<()> {
        let mut state = self.begin("stop".to_string())?;
        state.state = PlayerState::Stop;
        Ok(())
    }

    fn next(&mut self) -> TransportResult<()> {
        let mut state = self.begin("next".to_string())?;
        if state.state == PlayerState::Stop {
            return Ok(());
        }
        let (current, len, repeat) = (state.current, state.queue.len(), state.repeat);
        match current {
            Some(cur) if cur + 1 < len => state.current = Some(cur + 1),
            Some(_) if repeat => state.current = Some(0),
            _ => {
                state.current = None;
                state.state = PlayerState::Stop;
            }
        }
        Ok(())
    }

    fn previous(&mut self) -> TransportResult<()> {
        let mut state = self.begin("previous".to_string())?;
        if let Some(cur) = state.current {
            state.current = Some(cur.saturating_sub(1));
        }
        Ok(())
    }

    fn pause(&mut self, pause: bool) -> TransportResult<()> {
        let mut state = self.begin(format!("pause {}", u8::from(pause)))?;
        let current = state.state;
        state.state = match (current, pause) {
            (PlayerState::Stop, _) => PlayerState::Stop,
            (_, true) => PlayerState::Pause,
            (_, false) => PlayerState::Play,
        };
        Ok(())
    }

    fn random(&mut self, enabled: bool) -> TransportResult<()> {
        let mut state = self.begin(format!("random {}", u8::from(enabled)))?;
        state.random = enabled;
        Ok(())
    }

    fn repeat(&mut self, enabled: bool) -> TransportResult<()> {
        let mut state = self.begin(format!("repeat {}", u8::from(enabled)))?;
        state.repeat = enabled;
        Ok(())
    }

    fn shuffle(&mut self) -> TransportResult<()> {
        let mut state = self.begin("shuffle".to_string())?;
        let current_id = state.current.map(|cur| state.queue[cur].id);
        state.queue.shuffle(&mut rand::thread_rng());
        let restored = current_id.and_then(|id| state.queue.iter().position(|e| e.id == id));
        state.current = restored;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn daemon() -> MemoryDaemon {
        MemoryDaemon::new()
            .with_track("a/1.flac", &[("Artist", "Alpha"), ("Title", "One"), ("Genre", "Rock")])
            .with_track("a/2.flac", &[("Artist", "Alpha"), ("Title", "Two"), ("Genre", "Jazz")])
            .with_track("b/1.flac", &[("Artist", "Beta Band"), ("Title", "Alphabet"), ("Genre", "Rock")])
    }

    #[test]
    fn test_find_is_exact_and_case_sensitive() -> TransportResult<()> {
        let mut d = daemon();
        assert_eq!(d.find("Artist", "Alpha")?.len(), 2);
        assert!(d.find("Artist", "alpha")?.is_empty());
        assert!(d.find("Artist", "Alp")?.is_empty());
        Ok(())
    }

    #[test]
    fn test_search_any_is_fuzzy() -> TransportResult<()> {
        let mut d = daemon();
        // Matches two artists named Alpha plus the title "Alphabet".
        assert_eq!(d.search("any", "alpha")?.len(), 3);
        assert_eq!(d.search("Title", "alpha")?.len(), 1);
        assert!(d.search("any", "zzz")?.is_empty());
        Ok(())
    }

    #[test]
    fn test_findadd_and_playlistid_positions() -> TransportResult<()> {
        let mut d = daemon();
        d.findadd("Genre", "Rock")?;

        let queue = d.playlistid()?;
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].get_u32("pos"), Some(0));
        assert_eq!(queue[1].get_u32("pos"), Some(1));
        assert_eq!(queue[1].file(), Some("b/1.flac"));
        Ok(())
    }

    #[test]
    fn test_add_unknown_file_is_ack() {
        let mut d = daemon();
        assert!(matches!(d.add("nope.flac"), Err(TransportError::Ack { code: 50, .. })));
    }

    #[test]
    fn test_status_reflects_flags() -> TransportResult<()> {
        let mut d = daemon();
        d.random(true)?;
        d.repeat(true)?;
        let status = d.status()?;
        assert_eq!(status.get("random"), Some("1"));
        assert_eq!(status.get("repeat"), Some("1"));
        assert_eq!(status.get("state"), Some("stop"));
        Ok(())
    }

    #[test]
    fn test_delete_adjusts_current() -> TransportResult<()> {
        let mut d = daemon();
        d.findadd("Artist", "Alpha")?;
        d.play(Some(1))?;
        d.delete(0)?;

        let current = d.currentsong()?;
        assert_eq!(current.file(), Some("a/2.flac"));
        assert_eq!(current.get_u32("pos"), Some(0));
        Ok(())
    }

    #[test]
    fn test_dropped_connection_fails_every_command() {
        let mut d = daemon();
        d.drop_connection();
        assert!(matches!(d.ping(), Err(TransportError::Disconnected)));
        assert!(matches!(d.status(), Err(TransportError::Disconnected)));
        assert!(d.calls().is_empty());
    }

    #[test]
    fn test_clones_share_state() -> TransportResult<()> {
        let observer = daemon();
        let mut worker = observer.clone();
        worker.ping()?;
        worker.ping()?;
        assert_eq!(observer.ping_count(), 2);
        Ok(())
    }

    #[test]
    fn test_shuffle_keeps_queue_contents() -> TransportResult<()> {
        let mut d = daemon();
        for file in ["a/1.flac", "a/2.flac", "b/1.flac"] {
            d.add(file)?;
        }
        d.shuffle()?;

        let mut files = d.queue_files();
        files.sort();
        assert_eq!(files, vec!["a/1.flac", "a/2.flac", "b/1.flac"]);
        Ok(())
    }
}
