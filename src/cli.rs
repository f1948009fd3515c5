//! # Command-Line Interface Module
//!
//! Clap derive definitions for the `mpdctl` binary. Every subcommand maps onto
//! one [`PlaybackController`](crate::controller::PlaybackController) operation.
//!
//! ## Examples
//!
//! ```bash
//! mpdctl --host 192.168.178.37 title Rattle --play
//! mpdctl artist "Sunset Strip" --new-playlist
//! mpdctl --json status
//! MPD_HOST=music.lan mpdctl hold 600
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
///
/// Connection flags are global so they can follow the subcommand too.
#[derive(Parser, Debug)]
#[command(name = "mpdctl")]
#[command(about = "mpdctl: control a Music Player Daemon from the command line")]
#[command(version)]
pub struct Args {
    /// MPD host (overrides the config file)
    #[arg(long, global = true, env = "MPD_HOST")]
    pub host: Option<String>,

    /// MPD port (overrides the config file)
    #[arg(long, global = true, env = "MPD_PORT")]
    pub port: Option<u16>,

    /// Read settings from this file instead of the default config location
    #[arg(long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Print responses as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a built-in demo daemon instead of a real MPD
    #[arg(long, global = true)]
    pub memory: bool,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show player status (state, volume, random, repeat, ...)
    Status,

    /// Show the currently selected song
    Current,

    /// List the files in the queue
    Queue {
        /// Print each entry's position and song id as well
        #[arg(long)]
        ids: bool,
    },

    /// List the tag types the daemon supports
    Tagtypes,

    /// Print the position one past the end of the queue
    ///
    /// Prints nothing (or `null` with --json) when the queue is empty.
    Position,

    /// Append a single file to the queue
    Add {
        /// File URI relative to the MPD music directory
        uri: String,
    },

    /// Remove every track from the queue
    Clear,

    /// Delete a track from the queue
    ///
    /// Without an id, deletes the currently selected track.
    Delete {
        /// Song id (see `queue --ids`)
        id: Option<u32>,
    },

    /// Pause when playing, resume when paused
    Pause,

    /// Toggle random mode
    Random,

    /// Toggle repeat mode
    Repeat,

    /// Shuffle the queue
    Shuffle,

    /// Start playback
    Play {
        /// Queue position to start at
        pos: Option<u32>,
    },

    /// Stop playback
    Stop,

    /// Play the next track
    Next,

    /// Play the previous track
    Previous,

    /// Ask MPD to rescan its music directory
    Update,

    /// Replace the queue with the whole music database
    ///
    /// Clears the queue, triggers a database update and queues every file
    /// in database order.
    Library,

    /// Queue every track by an artist
    ///
    /// Exact artist match first; when there is none, falls back to a fuzzy
    /// search over all tags.
    Artist {
        /// Artist name
        #[arg(value_hint = clap::ValueHint::Other)]
        name: String,

        /// Clear the queue before adding
        #[arg(long)]
        new_playlist: bool,

        /// Start playing at the first added track
        #[arg(long)]
        play: bool,
    },

    /// Queue every track with a title
    ///
    /// Always appends to the queue.
    Title {
        /// Song title
        #[arg(value_hint = clap::ValueHint::Other)]
        title: String,

        /// Start playing at the first added track
        #[arg(long)]
        play: bool,
    },

    /// Queue every track of a genre
    Genre {
        /// Genre name
        name: String,

        /// Clear the queue before adding
        #[arg(long)]
        new_playlist: bool,

        /// Start playing at the first added track
        #[arg(long)]
        play: bool,
    },

    /// Fuzzy search and queue every hit
    Search {
        /// Text to look for (case-insensitive substring)
        term: String,

        /// Tag to search in: any, artist, album, title, genre, composer or any other MPD tag
        #[arg(long, default_value = "any")]
        field: String,

        /// Start playing at the first added track
        #[arg(long)]
        play: bool,
    },

    /// Stay connected and keep the session alive with pings
    ///
    /// Useful for checking that the keep-alive survives MPD's idle timeout.
    Hold {
        /// How long to stay connected
        seconds: u64,
    },

    /// Generate shell completions
    ///
    /// Usage: mpdctl completion bash > ~/.local/share/bash-completion/completions/mpdctl
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}

impl Command {
    /// Whether the command talks to a daemon at all.
    pub fn needs_connection(&self) -> bool {
        !matches!(self, Command::Completion { .. })
    }
}
