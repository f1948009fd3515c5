//! # mpdctl
//!
//! Command-line front end for the `mpdctl` library: parse arguments, load the
//! connection settings, open the session and dispatch one command.
//!
//! ```bash
//! mpdctl --host 192.168.178.37 title Rattle --play
//! mpdctl --memory --json artist Moss
//! RUST_LOG=mpdctl=debug mpdctl hold 120
//! ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use log::{debug, info};
use mpdctl::cli::{self, Command};
use mpdctl::completion;
use mpdctl::config::ClientConfig;
use mpdctl::connection::Connection;
use mpdctl::controller::{PauseOutcome, PlaybackController};
use mpdctl::memory::MemoryDaemon;
use mpdctl::protocol::Transport;
use mpdctl::search::{QueueMode, SearchField};
use serde::Serialize;
use std::thread;
use std::time::{Duration, Instant};

/// Main entry point.
///
/// Logging is controlled via `RUST_LOG`:
/// - `RUST_LOG=debug mpdctl status` - every command sent to MPD
/// - `RUST_LOG=mpdctl::connection=debug mpdctl hold 120` - keep-alive pings only
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();

    if let Command::Completion { shell } = args.command {
        print_completions(shell);
        return Ok(());
    }

    let config = load_config(&args)?;
    debug!("Using {config:?}");

    if args.memory {
        info!("Running against the built-in demo daemon");
        let daemon = MemoryDaemon::demo();
        let connection = Connection::establish(&config.host, Some(config.port), move |_, _| Ok(daemon))?
            .with_keep_alive_interval(config.keepalive_interval());
        run(PlaybackController::new(connection), &config, &args)
    } else {
        let connection = Connection::open(&config.host, Some(config.port))
            .with_context(|| format!("Cannot control MPD at {}:{}", config.host, config.port))?
            .with_keep_alive_interval(config.keepalive_interval());
        run(PlaybackController::new(connection), &config, &args)
    }
}

/// Config file (default location or `--config`), then flag/env overrides.
fn load_config(args: &cli::Args) -> Result<ClientConfig> {
    let config = match &args.config {
        Some(path) => ClientConfig::load_from(path)?,
        None => ClientConfig::load()?,
    };
    let config = config.with_overrides(args.host.clone(), args.port);
    config.validate().context("Invalid connection settings")?;
    Ok(config)
}

fn print_completions(shell: cli::Shell) {
    let mut cmd = cli::Args::command();
    completion::generate_completions(completion::shell_to_completion_shell(&shell), &mut cmd);
}

struct Printer {
    json: bool,
}

impl Printer {
    /// Print `value` as JSON, or hand it to `text` for the plain rendering.
    fn emit<S: Serialize>(&self, value: &S, text: impl FnOnce(&S)) -> Result<()> {
        if self.json {
            let json = serde_json::to_string_pretty(value).context("Failed to serialize response")?;
            println!("{json}");
        } else {
            text(value);
        }
        Ok(())
    }

    fn lines(&self, lines: &[String]) -> Result<()> {
        self.emit(&lines, |lines| lines.iter().for_each(|line| println!("{line}")))
    }

    fn flag(&self, name: &str, enabled: bool) -> Result<()> {
        self.emit(&enabled, |enabled| {
            println!("{name}: {}", if *enabled { "on" } else { "off" })
        })
    }
}

fn run<T: Transport + Send + 'static>(
    mut ctl: PlaybackController<T>,
    config: &ClientConfig,
    args: &cli::Args,
) -> Result<()> {
    let out = Printer { json: args.json };

    match &args.command {
        Command::Status => out.emit(&ctl.status()?, |status| print!("{status}"))?,
        Command::Current => out.emit(&ctl.current_song()?, |song| print!("{song}"))?,
        Command::Queue { ids: false } => out.lines(&ctl.queue()?)?,
        Command::Queue { ids: true } => out.emit(&ctl.queue_entries()?, |entries| {
            for entry in entries {
                let field = |key| entry.get(key).unwrap_or("-");
                println!("{}\t{}\t{}", field("Pos"), field("Id"), field("file"));
            }
        })?,
        Command::Tagtypes => out.lines(&ctl.tag_types()?)?,
        Command::Position => out.emit(&ctl.current_position()?, |pos| {
            if let Some(pos) = pos {
                println!("{pos}");
            }
        })?,
        Command::Add { uri } => ctl.add_song(uri)?,
        Command::Clear => ctl.clear_queue()?,
        Command::Delete { id } => {
            let deleted = ctl.delete_song(*id)?;
            out.emit(&deleted, |deleted| {
                if !deleted {
                    println!("No track selected");
                }
            })?;
        }
        Command::Pause => {
            let message = match ctl.pause()? {
                PauseOutcome::Paused => "paused",
                PauseOutcome::Resumed => "playing",
                PauseOutcome::Stopped => "stopped",
            };
            out.emit(&message, |message| println!("{message}"))?;
        }
        Command::Random => out.flag("random", ctl.toggle_random()?)?,
        Command::Repeat => out.flag("repeat", ctl.toggle_repeat()?)?,
        Command::Shuffle => ctl.shuffle()?,
        Command::Play { pos } => ctl.play(*pos)?,
        Command::Stop => ctl.stop()?,
        Command::Next => ctl.next()?,
        Command::Previous => ctl.previous()?,
        Command::Update => out.emit(&ctl.update_database()?, |job| match job {
            Some(job) => println!("updating_db: {job}"),
            None => println!("update requested"),
        })?,
        Command::Library => out.lines(&ctl.build_library_queue()?)?,
        Command::Artist { name, new_playlist, play } => {
            let position = ctl.add_artist(name, queue_mode(*new_playlist))?;
            report_enqueue(&ctl, &out, position, *play)?;
        }
        Command::Title { title, play } => {
            let position = ctl.add_title(title)?;
            report_enqueue(&ctl, &out, position, *play)?;
        }
        Command::Genre { name, new_playlist, play } => {
            let position = ctl.add_genre(name, queue_mode(*new_playlist))?;
            report_enqueue(&ctl, &out, position, *play)?;
        }
        Command::Search { term, field, play } => {
            let field: SearchField = field.parse()?;
            let position = ctl.advanced_search(term, Some(&field))?;
            report_enqueue(&ctl, &out, position, *play)?;
        }
        Command::Hold { seconds } => hold(&mut ctl, config, Duration::from_secs(*seconds))?,
        Command::Completion { shell } => print_completions(*shell),
    }

    ctl.connection_mut().teardown();
    Ok(())
}

fn queue_mode(new_playlist: bool) -> QueueMode {
    if new_playlist {
        QueueMode::Replace
    } else {
        QueueMode::Append
    }
}

fn report_enqueue<T: Transport + Send + 'static>(
    ctl: &PlaybackController<T>,
    out: &Printer,
    position: Option<u32>,
    play: bool,
) -> Result<()> {
    out.emit(&position, |position| match position {
        Some(pos) => println!("Queued at position {pos}"),
        None => println!("No matching tracks found"),
    })?;

    if let (Some(pos), true) = (position, play) {
        ctl.play(Some(pos))?;
    }
    Ok(())
}

/// Keep the session open with the keep-alive running until `duration` passes
/// or the connection drops.
fn hold<T: Transport + Send + 'static>(
    ctl: &mut PlaybackController<T>,
    config: &ClientConfig,
    duration: Duration,
) -> Result<()> {
    let connection = ctl.connection_mut();
    connection.start_keep_alive(config.keepalive_daemon)?;
    info!(
        "Holding connection to {}:{} for {duration:?} (ping every {:?})",
        connection.host(),
        connection.port(),
        connection.keep_alive_interval()
    );

    let deadline = Instant::now() + duration;
    loop {
        if !ctl.connection().is_connected() {
            anyhow::bail!("Lost connection to MPD while holding");
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        thread::sleep(remaining.min(Duration::from_secs(1)));
    }

    ctl.connection_mut().stop_keep_alive();
    Ok(())
}
