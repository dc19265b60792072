//! Remote control via Unix socket and stdin
//!
//! Each source reads newline-delimited commands and forwards them, together
//! with a way to answer, to the single loop that owns the editor.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::regions::{Point, Ring};

/// Commands understood by every control source
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    New,
    Complete(Ring),
    /// Polygon id or unique id prefix
    Select(String),
    SelectAt(Point),
    Deselect,
    Cancel,
    Reshape(String, Ring),
    /// Delete the given polygon, or the selected one
    Delete(Option<String>),
    List,
    Info(String),
    Export(Option<PathBuf>),
    Import(PathBuf),
    Save(Option<PathBuf>),
    Load(Option<PathBuf>),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),

    #[error("'{command}' needs {what}")]
    MissingArgument {
        command: &'static str,
        what: &'static str,
    },

    #[error("bad vertex '{0}': expected lat,lng")]
    BadVertex(String),
}

pub const HELP: &str = "\
commands (vertices are lat,lng):
  new                          start drawing a polygon
  complete V1 V2 V3 ...        finish the drawing with these vertices
  select ID                    select (or deselect) a polygon for editing
  pick LAT,LNG                 select the polygon under a point
  deselect                     leave editing
  cancel                       abandon drawing or editing
  reshape ID V1 V2 V3 ...      replace the selected polygon's shape
  delete [ID]                  delete a polygon, default the selected one
  list                         list polygons in insertion order
  info ID                      area and centroid of a polygon
  export [FILE]                write KML to FILE, or print it
  import FILE                  replace all polygons with a KML file
  save [FILE] / load [FILE]    JSON snapshot with identities
  status                       current edit state
  quit";

fn parse_vertex(token: &str) -> Result<Point, CommandError> {
    let bad = || CommandError::BadVertex(token.to_string());
    let (lat, lng) = token.split_once(',').ok_or_else(bad)?;
    let lat: f64 = lat.trim().parse().map_err(|_| bad())?;
    let lng: f64 = lng.trim().parse().map_err(|_| bad())?;
    if !lat.is_finite() || !lng.is_finite() {
        return Err(bad());
    }
    Ok(Point::new(lat, lng))
}

fn parse_ring<'a>(tokens: impl Iterator<Item = &'a str>) -> Result<Ring, CommandError> {
    tokens
        .map(parse_vertex)
        .collect::<Result<Vec<_>, _>>()
        .map(Ring::new)
}

/// Parse a single command line
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let mut tokens = line.split_whitespace();
    let Some(word) = tokens.next() else {
        return Err(CommandError::Unknown(String::new()));
    };
    let word = word.to_lowercase();

    let id_arg = |tokens: &mut std::str::SplitWhitespace<'_>, command: &'static str| {
        tokens
            .next()
            .map(str::to_string)
            .ok_or(CommandError::MissingArgument {
                command,
                what: "a polygon id",
            })
    };

    match word.as_str() {
        "new" | "draw" => Ok(Command::New),
        "complete" | "done" => Ok(Command::Complete(parse_ring(tokens)?)),
        "select" | "edit" => Ok(Command::Select(id_arg(&mut tokens, "select")?)),
        "pick" => {
            let token = tokens.next().ok_or(CommandError::MissingArgument {
                command: "pick",
                what: "a lat,lng position",
            })?;
            Ok(Command::SelectAt(parse_vertex(token)?))
        }
        "deselect" => Ok(Command::Deselect),
        "cancel" => Ok(Command::Cancel),
        "reshape" => {
            let id = id_arg(&mut tokens, "reshape")?;
            Ok(Command::Reshape(id, parse_ring(tokens)?))
        }
        "delete" | "rm" => Ok(Command::Delete(tokens.next().map(str::to_string))),
        "list" | "ls" => Ok(Command::List),
        "info" => Ok(Command::Info(id_arg(&mut tokens, "info")?)),
        "export" => Ok(Command::Export(tokens.next().map(PathBuf::from))),
        "import" => {
            let path = tokens.next().ok_or(CommandError::MissingArgument {
                command: "import",
                what: "a file path",
            })?;
            Ok(Command::Import(PathBuf::from(path)))
        }
        "save" => Ok(Command::Save(tokens.next().map(PathBuf::from))),
        "load" => Ok(Command::Load(tokens.next().map(PathBuf::from))),
        "status" => Ok(Command::Status),
        "help" | "?" => Ok(Command::Help),
        "q" | "quit" | "exit" => Ok(Command::Quit),
        _ => Err(CommandError::Unknown(word)),
    }
}

/// A command line waiting for execution, plus the way back to its sender
pub struct Request {
    pub line: String,
    responder: Box<dyn FnOnce(&str) + Send>,
}

impl Request {
    pub fn new(line: impl Into<String>, responder: impl FnOnce(&str) + Send + 'static) -> Self {
        Self {
            line: line.into(),
            responder: Box::new(responder),
        }
    }

    /// Deliver the reply; a sender that has gone away is ignored
    pub fn respond(self, reply: &str) {
        (self.responder)(reply);
    }
}

/// Controller that listens for commands on a Unix socket
pub struct Controller {
    path: PathBuf,
    _listener_thread: thread::JoinHandle<()>,
}

impl Controller {
    /// Bind the socket and start accepting clients
    pub fn new(path: impl AsRef<Path>, sender: Sender<Request>) -> Result<Self, String> {
        let path = path.as_ref().to_path_buf();

        // Remove a stale socket left by a previous run
        let _ = std::fs::remove_file(&path);

        let listener = UnixListener::bind(&path)
            .map_err(|e| format!("Failed to bind socket {}: {}", path.display(), e))?;

        let handle = thread::spawn(move || {
            Self::listener_loop(listener, sender);
        });

        info!(path = %path.display(), "Control socket listening");

        Ok(Self {
            path,
            _listener_thread: handle,
        })
    }

    fn listener_loop(listener: UnixListener, sender: Sender<Request>) {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let sender = sender.clone();
                    thread::spawn(move || {
                        Self::handle_client(stream, sender);
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Control socket accept failed");
                    break;
                }
            }
        }
    }

    fn handle_client(stream: UnixStream, sender: Sender<Request>) {
        let mut writer = match stream.try_clone() {
            Ok(writer) => writer,
            Err(e) => {
                warn!(error = %e, "Failed to clone control stream");
                return;
            }
        };
        let reader = BufReader::new(stream);

        for line in reader.lines().map_while(Result::ok) {
            if line.trim().is_empty() {
                continue;
            }
            let (reply_tx, reply_rx) = mpsc::channel::<String>();
            let request = Request::new(line, move |reply| {
                let _ = reply_tx.send(reply.to_string());
            });
            if sender.send(request).is_err() {
                break;
            }
            // The main loop answers every request; a closed channel means shutdown
            let Ok(reply) = reply_rx.recv() else {
                break;
            };
            if writeln!(writer, "{}", reply).is_err() {
                break;
            }
        }
        debug!("Control client disconnected");
    }

    /// Get the socket path
    pub fn socket_path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        // Clean up the socket file
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Read commands from stdin in a background thread.
///
/// When `quit_on_eof` is set, end of input is turned into a `quit` command.
pub fn spawn_stdin_reader(sender: Sender<Request>, quit_on_eof: bool) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines().map_while(Result::ok) {
            if line.trim().is_empty() {
                continue;
            }
            let request = Request::new(line, |reply| println!("{}", reply));
            if sender.send(request).is_err() {
                return;
            }
        }
        if quit_on_eof {
            let _ = sender.send(Request::new("quit", |_| {}));
        } else {
            // Keep the process alive for the remaining sources
            debug!("stdin closed");
            loop {
                thread::sleep(Duration::from_secs(3600));
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_complete_with_vertices() {
        let cmd = parse_command("complete 0,0 0,1 1,1 1,0").unwrap();
        let Command::Complete(ring) = cmd else {
            panic!("expected complete, got {:?}", cmd);
        };
        assert_eq!(ring.len(), 4);
        assert_eq!(ring.points()[1], Point::new(0.0, 1.0));
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(parse_command("  NEW ").unwrap(), Command::New);
        assert_eq!(parse_command("Quit").unwrap(), Command::Quit);
    }

    #[test]
    fn test_parse_select_requires_id() {
        assert_eq!(
            parse_command("select"),
            Err(CommandError::MissingArgument {
                command: "select",
                what: "a polygon id"
            })
        );
        assert_eq!(
            parse_command("select 3fa2").unwrap(),
            Command::Select("3fa2".to_string())
        );
    }

    #[test]
    fn test_parse_reshape() {
        let cmd = parse_command("reshape abc 0,0 0,2 2,2").unwrap();
        let Command::Reshape(id, ring) = cmd else {
            panic!("expected reshape, got {:?}", cmd);
        };
        assert_eq!(id, "abc");
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn test_parse_bad_vertex() {
        assert_eq!(
            parse_command("complete 0,0 nope 1,1"),
            Err(CommandError::BadVertex("nope".to_string()))
        );
        assert_eq!(
            parse_command("pick 1,inf"),
            Err(CommandError::BadVertex("1,inf".to_string()))
        );
    }

    #[test]
    fn test_parse_optional_arguments() {
        assert_eq!(parse_command("delete").unwrap(), Command::Delete(None));
        assert_eq!(parse_command("export").unwrap(), Command::Export(None));
        assert_eq!(
            parse_command("export out.kml").unwrap(),
            Command::Export(Some(PathBuf::from("out.kml")))
        );
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(
            parse_command("explode"),
            Err(CommandError::Unknown("explode".to_string()))
        );
    }

    #[test]
    fn test_request_responds_through_channel() {
        let (tx, rx) = mpsc::channel();
        let request = Request::new("status", move |reply| {
            tx.send(reply.to_string()).unwrap();
        });
        assert_eq!(request.line, "status");
        request.respond("idle");
        assert_eq!(rx.recv().unwrap(), "idle");
    }

    #[test]
    fn test_socket_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapfence.sock");
        let (tx, rx) = mpsc::channel::<Request>();
        let controller = Controller::new(&path, tx).unwrap();

        let server = thread::spawn(move || {
            let request = rx.recv().unwrap();
            let reply = format!("echo {}", request.line);
            request.respond(&reply);
        });

        let mut client = UnixStream::connect(controller.socket_path()).unwrap();
        writeln!(client, "status").unwrap();
        let mut line = String::new();
        BufReader::new(&client).read_line(&mut line).unwrap();
        assert_eq!(line.trim(), "echo status");

        server.join().unwrap();
    }
}
