//! # Playback Controller
//!
//! Caller-facing operations on top of a [`Connection`]: queries, queue
//! mutation and transport control. Every method goes through
//! [`Connection::call`], so all of them fail with
//! [`ControlError::NotConnected`] without touching the daemon once the
//! connection is down.
//!
//! Toggles (`toggle_random`, `toggle_repeat`, `pause`) read `status` and then
//! write under the same transport lock, so the keep-alive ping cannot slip in
//! between. Another MPD client can still change the flag in between; that
//! race is accepted.
//!
//! The search-and-enqueue entry points live in [`crate::search`].

use crate::connection::Connection;
use crate::error::{ControlError, Result, TransportError};
use crate::mpd_transport::TcpTransport;
use crate::protocol::{PlayerState, Record, Transport};
use log::{debug, info};

/// What [`PlaybackController::pause`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseOutcome {
    /// Was playing, now paused.
    Paused,
    /// Was paused, now playing.
    Resumed,
    /// Player is stopped; nothing was sent.
    Stopped,
}

#[derive(Debug)]
pub struct PlaybackController<T: Transport + Send + 'static> {
    connection: Connection<T>,
}

impl PlaybackController<TcpTransport> {
    /// Open a TCP connection and wrap it.
    ///
    /// # Errors
    ///
    /// Same as [`Connection::open`].
    pub fn connect(host: &str, port: Option<u16>) -> Result<Self> {
        Ok(Self::new(Connection::open(host, port)?))
    }
}

impl<T: Transport + Send + 'static> PlaybackController<T> {
    pub fn new(connection: Connection<T>) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &Connection<T> {
        &self.connection
    }

    /// Mutable access, for starting and stopping the keep-alive.
    pub fn connection_mut(&mut self) -> &mut Connection<T> {
        &mut self.connection
    }

    pub fn into_connection(self) -> Connection<T> {
        self.connection
    }

    pub(crate) fn call<R, F>(&self, op: F) -> Result<R>
    where
        F: FnOnce(&mut T) -> std::result::Result<R, TransportError>,
    {
        self.connection.call(op)
    }

    // --- queries ---

    pub fn current_song(&self) -> Result<Record> {
        self.call(|t| t.currentsong())
    }

    /// File URIs of the queue, in order.
    pub fn queue(&self) -> Result<Vec<String>> {
        self.call(|t| t.playlist())
    }

    /// Queue entries with their tags, `Pos` and `Id`.
    pub fn queue_entries(&self) -> Result<Vec<Record>> {
        self.call(|t| t.playlistid())
    }

    /// Player status: `state`, `volume`, `random`, `repeat`, ...
    pub fn status(&self) -> Result<Record> {
        self.call(|t| t.status())
    }

    pub fn tag_types(&self) -> Result<Vec<String>> {
        self.call(|t| t.tagtypes())
    }

    /// Position one past the highest queued position, or `None` when the
    /// queue is empty.
    pub fn current_position(&self) -> Result<Option<u32>> {
        self.call(|t| next_position(&t.playlistid()?))
    }

    // --- queue ---

    /// Append one track by URI.
    ///
    /// # Errors
    ///
    /// [`ControlError::InvalidArgument`] for an empty URI, otherwise whatever
    /// the daemon reports (e.g. an `ACK` for an unknown file).
    pub fn add_song(&self, uri: &str) -> Result<()> {
        if uri.trim().is_empty() {
            return Err(ControlError::invalid("track URI must not be empty"));
        }
        single_line("track URI", uri)?;
        self.call(|t| t.add(uri))?;
        debug!("Queued {uri}");
        Ok(())
    }

    pub fn clear_queue(&self) -> Result<()> {
        self.call(|t| t.clear())?;
        info!("Cleared queue");
        Ok(())
    }

    /// Delete a queued track by id, or the currently selected track when `id`
    /// is `None`. Returns `false` when there was nothing selected to delete.
    pub fn delete_song(&self, id: Option<u32>) -> Result<bool> {
        self.call(|t| match id {
            Some(id) => t.deleteid(id).map(|()| true),
            None => match t.status()?.get_u32("song") {
                Some(pos) => t.delete(pos).map(|()| true),
                None => {
                    info!("No track selected, nothing to delete");
                    Ok(false)
                }
            },
        })
    }

    /// Rebuild the queue from the whole database: clear, update, add every
    /// file in database order. Returns the URIs that were queued.
    pub fn build_library_queue(&self) -> Result<Vec<String>> {
        let added = self.call(|t| {
            t.clear()?;
            t.update()?;
            let mut added = Vec::new();
            for entry in t.listall()? {
                if let Some(file) = entry.file() {
                    t.add(file)?;
                    added.push(file.to_string());
                }
            }
            Ok(added)
        })?;
        info!("Queued {} tracks from the database", added.len());
        Ok(added)
    }

    /// Ask the daemon to rescan its music directory. Returns the job id.
    pub fn update_database(&self) -> Result<Option<u32>> {
        let job = self.call(|t| t.update())?.get_u32("updating_db");
        info!("Database update requested (job {job:?})");
        Ok(job)
    }

    // --- playback options ---

    /// Flip random mode. Returns the new setting.
    pub fn toggle_random(&self) -> Result<bool> {
        let enabled = self.call(|t| {
            let enabled = !flag_on(&t.status()?, "random");
            t.random(enabled)?;
            Ok(enabled)
        })?;
        info!("Random {}", on_off(enabled));
        Ok(enabled)
    }

    /// Flip repeat mode. Returns the new setting.
    pub fn toggle_repeat(&self) -> Result<bool> {
        let enabled = self.call(|t| {
            let enabled = !flag_on(&t.status()?, "repeat");
            t.repeat(enabled)?;
            Ok(enabled)
        })?;
        info!("Repeat {}", on_off(enabled));
        Ok(enabled)
    }

    // --- transport ---

    /// Pause when playing, resume when paused, report when stopped.
    pub fn pause(&self) -> Result<PauseOutcome> {
        let outcome = self.call(|t| {
            let state = player_state(&t.status()?)?;
            match state {
                PlayerState::Play => t.pause(true).map(|()| PauseOutcome::Paused),
                PlayerState::Pause => t.pause(false).map(|()| PauseOutcome::Resumed),
                PlayerState::Stop => Ok(PauseOutcome::Stopped),
            }
        })?;
        if outcome == PauseOutcome::Stopped {
            info!("Player is stopped, nothing to pause or resume");
        }
        Ok(outcome)
    }

    /// Shuffle the order of the current queue.
    pub fn shuffle(&self) -> Result<()> {
        self.call(|t| t.shuffle())
    }

    /// Start playback, at `pos` if given.
    pub fn play(&self, pos: Option<u32>) -> Result<()> {
        self.call(|t| t.play(pos))
    }

    pub fn stop(&self) -> Result<()> {
        self.call(|t| t.stop())
    }

    pub fn next(&self) -> Result<()> {
        self.call(|t| t.next())
    }

    pub fn previous(&self) -> Result<()> {
        self.call(|t| t.previous())
    }
}

/// Reject values that would split into two command lines on the wire.
pub(crate) fn single_line<'a>(what: &str, value: &'a str) -> Result<&'a str> {
    if value.contains(['\n', '\r']) {
        return Err(ControlError::invalid(format!("{what} must not contain line breaks")));
    }
    Ok(value)
}

fn next_position(entries: &[Record]) -> std::result::Result<Option<u32>, TransportError> {
    entries
        .iter()
        .filter_map(|entry| entry.get_u32("pos"))
        .max()
        .map(|max| {
            max.checked_add(1)
                .ok_or_else(|| TransportError::Protocol(format!("queue position {max} has no successor")))
        })
        .transpose()
}

fn flag_on(status: &Record, key: &str) -> bool {
    status.get(key).is_some_and(|v| v.trim() != "0")
}

fn player_state(status: &Record) -> std::result::Result<PlayerState, TransportError> {
    status
        .get("state")
        .ok_or_else(|| TransportError::Protocol("status reply has no `state`".to_string()))?
        .parse()
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDaemon;

    fn library() -> MemoryDaemon {
        MemoryDaemon::new()
            .with_track("ac/1.flac", &[("Artist", "Ace"), ("Title", "First")])
            .with_track("ac/2.flac", &[("Artist", "Ace"), ("Title", "Second")])
            .with_track("bo/1.flac", &[("Artist", "Bo"), ("Title", "Third")])
    }

    fn controller(daemon: &MemoryDaemon) -> Result<PlaybackController<MemoryDaemon>> {
        let daemon = daemon.clone();
        Ok(PlaybackController::new(Connection::establish("memory", None, move |_, _| Ok(daemon))?))
    }

    #[test]
    fn test_current_position_empty_queue_is_none() -> Result<()> {
        let daemon = library();
        let ctl = controller(&daemon)?;
        assert_eq!(ctl.current_position()?, None);
        Ok(())
    }

    #[test]
    fn test_current_position_is_max_plus_one() -> Result<()> {
        let daemon = library();
        daemon.seed_queue("ac/1.flac");
        daemon.seed_queue("ac/2.flac");
        let ctl = controller(&daemon)?;
        assert_eq!(ctl.current_position()?, Some(2));
        Ok(())
    }

    #[test]
    fn test_next_position_ignores_order_and_gaps() -> std::result::Result<(), TransportError> {
        let entries = vec![
            Record::from_pairs([("Pos", "4")]),
            Record::from_pairs([("Pos", "1")]),
            Record::from_pairs([("file", "no-pos.flac")]),
        ];
        assert_eq!(next_position(&entries)?, Some(5));
        assert_eq!(next_position(&[])?, None);
        Ok(())
    }

    #[test]
    fn test_next_position_at_u32_max_is_protocol_error() {
        let entries = vec![Record::from_pairs([("Pos", "4294967295")])];
        assert!(matches!(next_position(&entries), Err(TransportError::Protocol(_))));
    }

    #[test]
    fn test_add_song_rejects_empty_uri() -> Result<()> {
        let daemon = library();
        let ctl = controller(&daemon)?;
        daemon.clear_calls();

        assert!(matches!(ctl.add_song("  "), Err(ControlError::InvalidArgument(_))));
        assert!(daemon.calls().is_empty());

        ctl.add_song("bo/1.flac")?;
        assert_eq!(daemon.queue_files(), vec!["bo/1.flac"]);
        Ok(())
    }

    #[test]
    fn test_add_song_rejects_line_breaks() -> Result<()> {
        let daemon = library();
        let ctl = controller(&daemon)?;
        daemon.clear_calls();

        assert!(matches!(ctl.add_song("bo/1.flac\nclear"), Err(ControlError::InvalidArgument(_))));
        assert!(matches!(ctl.add_song("bo/1.flac\r"), Err(ControlError::InvalidArgument(_))));
        assert!(daemon.calls().is_empty());
        Ok(())
    }

    #[test]
    fn test_add_unknown_song_propagates_ack() -> Result<()> {
        let ctl = controller(&library())?;
        let err = ctl.add_song("missing.flac").expect_err("unknown file should fail");
        assert!(matches!(err, ControlError::Transport(TransportError::Ack { code: 50, .. })));
        Ok(())
    }

    #[test]
    fn test_toggle_random_and_repeat() -> Result<()> {
        let daemon = library();
        let ctl = controller(&daemon)?;

        assert!(ctl.toggle_random()?);
        assert!(!ctl.toggle_random()?);
        assert!(ctl.toggle_repeat()?);
        assert_eq!(ctl.status()?.get("repeat"), Some("1"));
        assert_eq!(ctl.status()?.get("random"), Some("0"));
        Ok(())
    }

    #[test]
    fn test_pause_toggles_and_reports_stop() -> Result<()> {
        let daemon = library();
        daemon.seed_queue("ac/1.flac");
        let ctl = controller(&daemon)?;

        assert_eq!(ctl.pause()?, PauseOutcome::Stopped);
        assert_eq!(daemon.count("pause"), 0);

        ctl.play(None)?;
        assert_eq!(ctl.pause()?, PauseOutcome::Paused);
        assert_eq!(daemon.player_state(), PlayerState::Pause);
        assert_eq!(ctl.pause()?, PauseOutcome::Resumed);
        assert_eq!(daemon.player_state(), PlayerState::Play);
        Ok(())
    }

    #[test]
    fn test_delete_song_by_id_and_selection() -> Result<()> {
        let daemon = library();
        let ctl = controller(&daemon)?;
        for file in ["ac/1.flac", "ac/2.flac", "bo/1.flac"] {
            ctl.add_song(file)?;
        }

        // Nothing selected yet.
        assert!(!ctl.delete_song(None)?);
        assert_eq!(daemon.count("delete"), 0);

        ctl.play(Some(1))?;
        assert!(ctl.delete_song(None)?);
        assert_eq!(daemon.queue_files(), vec!["ac/1.flac", "bo/1.flac"]);

        let id = ctl.queue_entries()?[1].get_u32("id").expect("queued entry has an id");
        assert!(ctl.delete_song(Some(id))?);
        assert_eq!(ctl.queue()?, vec!["ac/1.flac"]);
        Ok(())
    }

    #[test]
    fn test_build_library_queue() -> Result<()> {
        let daemon = library();
        daemon.seed_queue("bo/1.flac");
        let ctl = controller(&daemon)?;

        let added = ctl.build_library_queue()?;
        assert_eq!(added, vec!["ac/1.flac", "ac/2.flac", "bo/1.flac"]);
        assert_eq!(daemon.queue_files(), added);
        assert_eq!(daemon.count("update"), 1);
        Ok(())
    }

    #[test]
    fn test_update_database_returns_job() -> Result<()> {
        let ctl = controller(&library())?;
        assert_eq!(ctl.update_database()?, Some(1));
        assert_eq!(ctl.update_database()?, Some(2));
        Ok(())
    }

    #[test]
    fn test_transport_verbs_pass_through() -> Result<()> {
        let daemon = library();
        let ctl = controller(&daemon)?;
        ctl.build_library_queue()?;
        daemon.clear_calls();

        ctl.play(Some(0))?;
        ctl.next()?;
        ctl.previous()?;
        ctl.shuffle()?;
        ctl.stop()?;
        ctl.tag_types()?;
        ctl.current_song()?;

        assert_eq!(
            daemon.calls(),
            vec!["play 0", "next", "previous", "shuffle", "stop", "tagtypes", "currentsong"]
        );
        Ok(())
    }

    #[test]
    fn test_every_operation_guarded_when_disconnected() -> Result<()> {
        let daemon = library();
        let mut ctl = controller(&daemon)?;
        ctl.connection_mut().teardown();
        daemon.clear_calls();

        let not_connected = |r: Result<()>| matches!(r, Err(ControlError::NotConnected));
        assert!(not_connected(ctl.current_song().map(drop)));
        assert!(not_connected(ctl.queue().map(drop)));
        assert!(not_connected(ctl.queue_entries().map(drop)));
        assert!(not_connected(ctl.status().map(drop)));
        assert!(not_connected(ctl.tag_types().map(drop)));
        assert!(not_connected(ctl.current_position().map(drop)));
        assert!(not_connected(ctl.add_song("ac/1.flac")));
        assert!(not_connected(ctl.clear_queue()));
        assert!(not_connected(ctl.delete_song(None).map(drop)));
        assert!(not_connected(ctl.toggle_random().map(drop)));
        assert!(not_connected(ctl.toggle_repeat().map(drop)));
        assert!(not_connected(ctl.pause().map(drop)));
        assert!(not_connected(ctl.shuffle()));
        assert!(not_connected(ctl.play(None)));
        assert!(not_connected(ctl.stop()));
        assert!(not_connected(ctl.next()));
        assert!(not_connected(ctl.previous()));
        assert!(not_connected(ctl.update_database().map(drop)));
        assert!(not_connected(ctl.build_library_queue().map(drop)));

        assert!(daemon.calls().is_empty());
        Ok(())
    }
}
