//! # TCP Transport
//!
//! Blocking implementation of [`Transport`] over MPD's line protocol.
//!
//! ```text
//! S: OK MPD 0.23.5            greeting on connect
//! C: find Artist "Kraftwerk"
//! S: file: kraftwerk/computerwelt/01.flac
//! S: Artist: Kraftwerk
//! S: OK                       end of response
//! C: add "missing.flac"
//! S: ACK [50@0] {add} No such directory
//! ```
//!
//! No timeouts are configured here: a daemon that never answers blocks the
//! calling thread.

use crate::error::TransportError;
use crate::protocol::{group_records, parse_pair, quote, Record, Transport, TransportResult, ENTRY_KEYS};
use log::{debug, trace, warn};
use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, TcpStream};

/// Live session with an MPD server.
#[derive(Debug)]
pub struct TcpTransport {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    version: String,
    closed: bool,
}

impl TcpTransport {
    /// Open a TCP session and consume the `OK MPD <version>` greeting.
    pub fn connect(host: &str, port: u16) -> TransportResult<Self> {
        debug!("Connecting to MPD at {host}:{port}");

        let writer = TcpStream::connect((host, port))?;
        writer.set_nodelay(true)?;
        let mut reader = BufReader::new(writer.try_clone()?);

        let greeting = read_line(&mut reader)?;
        let version = greeting
            .strip_prefix("OK MPD ")
            .ok_or_else(|| TransportError::Protocol(format!("unexpected greeting `{greeting}`")))?
            .to_string();

        debug!("Connected to MPD {version} at {host}:{port}");

        Ok(Self {
            reader,
            writer,
            version,
            closed: false,
        })
    }

    /// Protocol version announced in the greeting.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Send one command line and collect the `key: value` pairs of the reply.
    fn command(&mut self, line: &str) -> TransportResult<Vec<(String, String)>> {
        if self.closed {
            return Err(TransportError::Disconnected);
        }

        trace!("-> {line}");
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;

        // A bad line does not end the reply: read through to `OK`/`ACK` so the
        // next command sees its own answer.
        let mut pairs = Vec::new();
        let mut malformed = None;
        loop {
            let reply = read_line(&mut self.reader)?;
            trace!("<- {reply}");

            if reply == "OK" {
                return match malformed {
                    Some(err) => Err(err),
                    None => Ok(pairs),
                };
            }
            if let Some(ack) = reply.strip_prefix("ACK ") {
                return Err(parse_ack(ack));
            }
            match parse_pair(&reply) {
                Ok(pair) => pairs.push(pair),
                Err(err) => {
                    warn!("Skipping malformed reply line: {err}");
                    malformed.get_or_insert(err);
                }
            }
        }
    }

    fn command_ok(&mut self, line: &str) -> TransportResult<()> {
        self.command(line).map(|_| ())
    }

    fn command_record(&mut self, line: &str) -> TransportResult<Record> {
        Ok(Record::from_pairs(self.command(line)?))
    }

    fn command_records(&mut self, line: &str) -> TransportResult<Vec<Record>> {
        Ok(group_records(self.command(line)?, ENTRY_KEYS))
    }
}

fn read_line(reader: &mut BufReader<TcpStream>) -> TransportResult<String> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(TransportError::Disconnected);
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Parse the tail of `ACK [code@index] {command} message`.
fn parse_ack(ack: &str) -> TransportError {
    let malformed = || TransportError::Protocol(format!("malformed ACK `{ack}`"));

    let Some(rest) = ack.strip_prefix('[') else {
        return malformed();
    };
    let Some((location, rest)) = rest.split_once("] {") else {
        return malformed();
    };
    let Some((command, message)) = rest.split_once('}') else {
        return malformed();
    };
    let code = location
        .split('@')
        .next()
        .and_then(|c| c.parse().ok())
        .unwrap_or(0);

    TransportError::Ack {
        code,
        command: command.to_string(),
        message: message.trim().to_string(),
    }
}

fn flag(enabled: bool) -> u8 {
    u8::from(enabled)
}

impl Transport for TcpTransport {
    fn close(&mut self) -> TransportResult<()> {
        if self.closed {
            return Ok(());
        }
        // `close` gets no reply, the server just hangs up.
        let sent = self
            .writer
            .write_all(b"close\n")
            .and_then(|_| self.writer.flush());
        self.closed = true;
        sent.map_err(TransportError::from)
    }

    fn disconnect(&mut self) {
        if let Err(e) = self.writer.shutdown(Shutdown::Both) {
            // Already closed by the peer after `close`; nothing to release.
            if e.kind() != std::io::ErrorKind::NotConnected {
                warn!("Failed to shut down MPD socket: {e}");
            }
        }
        self.closed = true;
    }

    fn ping(&mut self) -> TransportResult<()> {
        self.command_ok("ping")
    }

    fn status(&mut self) -> TransportResult<Record> {
        self.command_record("status")
    }

    fn currentsong(&mut self) -> TransportResult<Record> {
        self.command_record("currentsong")
    }

    fn playlist(&mut self) -> TransportResult<Vec<String>> {
        // Lines look like `0:file: path/to/song.flac`.
        Ok(self
            .command("playlist")?
            .into_iter()
            .filter(|(key, _)| key.ends_with("file"))
            .map(|(_, value)| value)
            .collect())
    }

    fn playlistid(&mut self) -> TransportResult<Vec<Record>> {
        self.command_records("playlistid")
    }

    fn tagtypes(&mut self) -> TransportResult<Vec<String>> {
        Ok(self
            .command("tagtypes")?
            .into_iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case("tagtype"))
            .map(|(_, value)| value)
            .collect())
    }

    fn find(&mut self, tag: &str, term: &str) -> TransportResult<Vec<Record>> {
        self.command_records(&format!("find {} {}", quote(tag)?, quote(term)?))
    }

    fn search(&mut self, tag: &str, term: &str) -> TransportResult<Vec<Record>> {
        self.command_records(&format!("search {} {}", quote(tag)?, quote(term)?))
    }

    fn findadd(&mut self, tag: &str, term: &str) -> TransportResult<()> {
        self.command_ok(&format!("findadd {} {}", quote(tag)?, quote(term)?))
    }

    fn listall(&mut self) -> TransportResult<Vec<Record>> {
        self.command_records("listall")
    }

    fn update(&mut self) -> TransportResult<Record> {
        self.command_record("update")
    }

    fn add(&mut self, uri: &str) -> TransportResult<()> {
        self.command_ok(&format!("add {}", quote(uri)?))
    }

    fn clear(&mut self) -> TransportResult<()> {
        self.command_ok("clear")
    }

    fn delete(&mut self, pos: u32) -> TransportResult<()> {
        self.command_ok(&format!("delete {pos}"))
    }

    fn deleteid(&mut self, id: u32) -> TransportResult<()> {
        self.command_ok(&format!("deleteid {id}"))
    }

    fn play(&mut self, pos: Option<u32>) -> TransportResult<()> {
        match pos {
            Some(pos) => self.command_ok(&format!("play {pos}")),
            None => self.command_ok("play"),
        }
    }

    fn stop(&mut self) -> TransportResult<()> {
        self.command_ok("stop")
    }

    fn next(&mut self) -> TransportResult<()> {
        self.command_ok("next")
    }

    fn previous(&mut self) -> TransportResult<()> {
        self.command_ok("previous")
    }

    fn pause(&mut self, pause: bool) -> TransportResult<()> {
        self.command_ok(&format!("pause {}", flag(pause)))
    }

    fn random(&mut self, enabled: bool) -> TransportResult<()> {
        self.command_ok(&format!("random {}", flag(enabled)))
    }

    fn repeat(&mut self, enabled: bool) -> TransportResult<()> {
        self.command_ok(&format!("repeat {}", flag(enabled)))
    }

    fn shuffle(&mut self) -> TransportResult<()> {
        self.command_ok("shuffle")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_parse_ack() {
        match parse_ack("[50@0] {add} No such directory") {
            TransportError::Ack { code, command, message } => {
                assert_eq!(code, 50);
                assert_eq!(command, "add");
                assert_eq!(message, "No such directory");
            }
            other => panic!("expected ACK, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_ack_malformed() {
        assert!(matches!(parse_ack("nonsense"), TransportError::Protocol(_)));
        assert!(matches!(parse_ack("[5@0] missing braces"), TransportError::Protocol(_)));
    }

    #[test]
    fn test_rejects_bad_greeting() -> anyhow::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();

        let server = thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let _ = stream.write_all(b"HELLO\n");
                let mut sink = Vec::new();
                let _ = stream.read_to_end(&mut sink);
            }
        });

        let result = TcpTransport::connect("127.0.0.1", port);
        assert!(matches!(result, Err(TransportError::Protocol(_))));
        drop(result);
        let _ = server.join();
        Ok(())
    }

    #[test]
    fn test_peer_hangup_is_disconnect() -> anyhow::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();

        let server = thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let _ = stream.write_all(b"OK MPD 0.23.5\n");
                // Read the ping, then hang up without answering.
                let mut buf = [0u8; 5];
                let _ = stream.read_exact(&mut buf);
            }
        });

        let mut transport = TcpTransport::connect("127.0.0.1", port)?;
        assert_eq!(transport.version(), "0.23.5");

        let err = transport.ping().expect_err("ping against closed peer should fail");
        assert!(err.is_disconnect(), "unexpected error: {err:?}");
        server.join().map_err(|_| anyhow::anyhow!("server thread panicked"))?;
        Ok(())
    }

    #[test]
    fn test_commands_after_close_are_rejected() -> anyhow::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();

        let server = thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let _ = stream.write_all(b"OK MPD 0.23.5\n");
                let mut sink = Vec::new();
                let _ = stream.read_to_end(&mut sink);
                String::from_utf8_lossy(&sink).to_string()
            } else {
                String::new()
            }
        });

        let mut transport = TcpTransport::connect("127.0.0.1", port)?;
        transport.close()?;
        transport.close()?;
        transport.disconnect();
        transport.disconnect();

        assert!(matches!(transport.status(), Err(TransportError::Disconnected)));

        let received = server.join().map_err(|_| anyhow::anyhow!("server thread panicked"))?;
        assert_eq!(received, "close\n");
        Ok(())
    }
}
