//! Control-plane client for the Music Player Daemon (MPD).
//!
//! Core modules:
//! - [`connection`] - Session ownership, keep-alive thread, teardown
//! - [`controller`] - Queries, queue mutation and transport control
//! - [`search`] - Exact match, fuzzy fallback, enqueue, report the start position
//!
//! ### Supporting Modules
//!
//! - [`protocol`] - The [`Transport`] seam and response records
//! - [`mpd_transport`] - Blocking TCP implementation of the line protocol
//! - [`memory`] - In-memory daemon for tests and offline runs
//! - [`config`] - Connection settings and where they live on disk
//! - [`error`] - Typed errors for both layers
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use mpdctl::{PlaybackController, QueueMode};
//!
//! let mut mpd = PlaybackController::connect("192.168.178.37", Some(6600))?;
//! mpd.connection_mut().start_keep_alive(true)?;
//!
//! if let Some(pos) = mpd.add_title("Rattle")? {
//!     mpd.play(Some(pos))?;
//! }
//! mpd.add_artist("Sunset Strip", QueueMode::Replace)?;
//!
//! // Dropping the controller stops the keep-alive and closes the session.
//! # Ok::<(), mpdctl::ControlError>(())
//! ```
//!
//! ## Testing without a daemon
//!
//! ```
//! use mpdctl::{Connection, PlaybackController, QueueMode};
//! use mpdctl::memory::MemoryDaemon;
//!
//! let daemon = MemoryDaemon::new()
//!     .with_track("moss/canopy/01.ogg", &[("Artist", "Moss"), ("Title", "Lichen")]);
//! let observer = daemon.clone();
//!
//! let connection = Connection::establish("memory", None, move |_, _| Ok(daemon))?;
//! let mpd = PlaybackController::new(connection);
//!
//! assert_eq!(mpd.add_artist("Moss", QueueMode::Append)?, Some(0));
//! assert_eq!(observer.queue_files(), vec!["moss/canopy/01.ogg"]);
//! # Ok::<(), mpdctl::ControlError>(())
//! ```

pub mod cli;
pub mod completion;
pub mod config;
pub mod connection;
pub mod controller;
pub mod error;
pub mod memory;
pub mod mpd_transport;
pub mod protocol;
pub mod search;

pub use connection::Connection;
pub use controller::{PauseOutcome, PlaybackController};
pub use error::{ControlError, Result, TransportError};
pub use protocol::{PlayerState, Record, Transport};
pub use search::{QueueMode, SearchField};
