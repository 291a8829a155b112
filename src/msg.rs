use std::path::PathBuf;

use docshell::model::DocumentId;
use docshell::reconcile::WatchEvent;

/// Commands typed at the shell prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    New,
    Open(Option<PathBuf>),
    List,
    Focus(DocumentId),
    Type(String),
    Set(String),
    Show,
    Save,
    SaveAs,
    Close(Option<DocumentId>),
    Move(i32, i32),
    Resize(u32, u32),
    Recent,
    ClearRecent,
    Help,
    Quit,
}

/// All possible messages that drive state transitions.
#[derive(Debug)]
pub enum Msg {
    // -- Input events
    Line(String),
    InputClosed,

    // -- File I/O
    FileChanged(WatchEvent),
}

pub const HELP: &str = "\
commands:
  new                 open an untitled window
  open [path]         open a document (asks for a path when omitted)
  list                list open windows
  focus <id>          focus a window
  type <text>         append a line to the focused window
  set <text>          replace the focused window's content
  show                print the focused window's content
  save | save-as      save the focused window
  close [id]          close a window (default: focused)
  move <x> <y>        move the focused window
  resize <w> <h>      resize the focused window
  recent              list recent documents
  clear-recent        forget recent documents
  help                this text
  quit                close every window and exit";

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let cmd = match word {
            "new" => Self::New,
            "open" => Self::Open((!rest.is_empty()).then(|| PathBuf::from(rest))),
            "list" | "ls" => Self::List,
            "focus" => Self::Focus(parse_id(rest)?),
            "type" => Self::Type(rest.to_string()),
            "set" => Self::Set(rest.to_string()),
            "show" => Self::Show,
            "save" => Self::Save,
            "save-as" => Self::SaveAs,
            "close" if rest.is_empty() => Self::Close(None),
            "close" => Self::Close(Some(parse_id(rest)?)),
            "move" => {
                let (x, y) = parse_pair(rest)?;
                Self::Move(x, y)
            }
            "resize" => {
                let (w, h) = parse_pair(rest)?;
                Self::Resize(w, h)
            }
            "recent" => Self::Recent,
            "clear-recent" => Self::ClearRecent,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(format!("unknown command: {other}")),
        };
        Ok(cmd)
    }
}

fn parse_id(raw: &str) -> Result<DocumentId, String> {
    raw.parse::<u64>()
        .ok()
        .filter(|id| *id > 0)
        .map(DocumentId)
        .ok_or_else(|| format!("not a window id: {raw:?}"))
}

fn parse_pair<T: std::str::FromStr>(raw: &str) -> Result<(T, T), String> {
    let mut parts = raw.split_whitespace();
    match (
        parts.next().and_then(|p| p.parse().ok()),
        parts.next().and_then(|p| p.parse().ok()),
        parts.next(),
    ) {
        (Some(a), Some(b), None) => Ok((a, b)),
        _ => Err(format!("expected two numbers, got {raw:?}")),
    }
}
