//! # Search and Enqueue
//!
//! Find tracks in the daemon's database and put them in the queue, returning
//! the queue position where the new batch starts (the position to `play`).
//!
//! ## Algorithm
//!
//! ```text
//! exact match on field ──hits──► [Replace: clear, pos = 0 | Append: pos = next position]
//!        │                        findadd field term (one bulk command)
//!        │ no hits
//!        ▼
//! fuzzy search on "any" ──no hits──► None, queue untouched
//!        │ hits
//!        ▼
//! pos = next position, add every result in order
//! ```
//!
//! The position is always captured before the queue changes, so it points at
//! the first track of the new batch. An empty queue yields `0` on every path.

use crate::controller::{single_line, PlaybackController};
use crate::error::{ControlError, Result};
use crate::protocol::Transport;
use log::{debug, info};
use std::fmt;
use std::str::FromStr;

/// Tag to match against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchField {
    /// Every tag plus the file path.
    Any,
    Artist,
    Album,
    Title,
    Genre,
    Composer,
    /// Any other tag the daemon knows (see `tagtypes`).
    Custom(String),
}

impl SearchField {
    /// Tag name as sent to the daemon.
    pub fn as_tag(&self) -> &str {
        match self {
            SearchField::Any => "any",
            SearchField::Artist => "Artist",
            SearchField::Album => "Album",
            SearchField::Title => "Title",
            SearchField::Genre => "Genre",
            SearchField::Composer => "Composer",
            SearchField::Custom(tag) => tag,
        }
    }

    fn validated_tag(&self) -> Result<&str> {
        let tag = self.as_tag();
        if tag.trim().is_empty() {
            return Err(ControlError::invalid("search field must not be empty"));
        }
        single_line("search field", tag)
    }
}

impl FromStr for SearchField {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ControlError::invalid("search field must not be empty"));
        }
        Ok(match s.to_ascii_lowercase().as_str() {
            "any" => SearchField::Any,
            "artist" => SearchField::Artist,
            "album" => SearchField::Album,
            "title" => SearchField::Title,
            "genre" => SearchField::Genre,
            "composer" => SearchField::Composer,
            _ => SearchField::Custom(s.to_string()),
        })
    }
}

impl fmt::Display for SearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Whether exact matches are appended or replace the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueMode {
    #[default]
    Append,
    /// Clear the queue first ("new playlist"); the batch starts at `0`.
    Replace,
}

fn validate_term(term: &str) -> Result<&str> {
    if term.trim().is_empty() {
        return Err(ControlError::invalid("search term must be a non-empty string"));
    }
    single_line("search term", term)
}

impl<T: Transport + Send + 'static> PlaybackController<T> {
    /// Queue every track by `artist`.
    ///
    /// Returns the position of the first queued track, or `None` when neither
    /// the exact nor the fuzzy search found anything.
    ///
    /// # Errors
    ///
    /// - [`ControlError::InvalidArgument`] for a blank name
    /// - [`ControlError::NotConnected`] once the connection is down
    pub fn add_artist(&self, artist: &str, mode: QueueMode) -> Result<Option<u32>> {
        self.enqueue_matches(&SearchField::Artist, artist, mode)
    }

    /// Queue every track titled `title`. Always appends.
    pub fn add_title(&self, title: &str) -> Result<Option<u32>> {
        self.enqueue_matches(&SearchField::Title, title, QueueMode::Append)
    }

    /// Queue every track of `genre`.
    pub fn add_genre(&self, genre: &str, mode: QueueMode) -> Result<Option<u32>> {
        self.enqueue_matches(&SearchField::Genre, genre, mode)
    }

    /// Fuzzy search on `field` (`None` means any tag) and append every hit,
    /// one `add` per result, in result order.
    ///
    /// Returns `None` without touching the queue when nothing matches, or
    /// when no result carries a file to queue.
    pub fn advanced_search(&self, term: &str, field: Option<&SearchField>) -> Result<Option<u32>> {
        let term = validate_term(term)?;
        let any = SearchField::Any;
        let tag = field.unwrap_or(&any).validated_tag()?;

        let results = self.call(|t| t.search(tag, term))?;
        let files: Vec<&str> = results
            .iter()
            .filter_map(|song| {
                let file = song.file();
                if file.is_none() {
                    debug!("Skipping search result without a file: {song:?}");
                }
                file
            })
            .collect();
        if files.is_empty() {
            info!("No match for \"{term}\" in {tag}");
            return Ok(None);
        }

        let position = self.current_position()?.unwrap_or(0);
        self.call(|t| files.iter().try_for_each(|file| t.add(file)))?;

        info!("Queued {} fuzzy matches for \"{term}\" at position {position}", files.len());
        Ok(Some(position))
    }

    fn enqueue_matches(&self, field: &SearchField, term: &str, mode: QueueMode) -> Result<Option<u32>> {
        let term = validate_term(term)?;
        let tag = field.validated_tag()?;

        let exact = self.call(|t| t.find(tag, term))?;
        if exact.is_empty() {
            debug!("No exact {tag} match for \"{term}\", falling back to fuzzy search");
            return self.advanced_search(term, None);
        }

        let position = match mode {
            QueueMode::Replace => {
                self.call(|t| {
                    t.clear()?;
                    t.findadd(tag, term)
                })?;
                0
            }
            QueueMode::Append => {
                let position = self.current_position()?.unwrap_or(0);
                self.call(|t| t.findadd(tag, term))?;
                position
            }
        };

        info!(
            "Queued {} exact {tag} matches for \"{term}\" at position {position}",
            exact.len()
        );
        Ok(Some(position))
    }
}
