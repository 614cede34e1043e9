//! Line commands accepted on the daemon's stdin.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Stop,
    Status,
    Tolerance(Option<f32>),
    Enroll { name: String, image: PathBuf },
    Remove(String),
    List,
    Help,
    Quit,
}

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid tolerance '{0}'")]
    InvalidTolerance(String),
}

pub const HELP: &str = "\
commands:
  start                  open the camera and start recognizing
  stop                   stop recognizing and release the camera
  status                 show session state, tolerance and last frame
  tolerance [value]      show or set the match threshold
  enroll <name> <image>  enroll the single face in an image file
  remove <name>          remove an enrolled face
  list                   list enrolled names
  quit                   exit";

/// Parse one input line. Blank lines yield `None`.
///
/// `enroll` takes the image path as its last word, so names may contain spaces.
pub fn parse(line: &str) -> Result<Option<Command>, ParseError> {
    let line = line.trim();
    let Some((word, rest)) = split_first(line) else {
        return Ok(None);
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "start" => Command::Start,
        "stop" => Command::Stop,
        "status" => Command::Status,
        "list" | "ls" => Command::List,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        "tolerance" | "threshold" => {
            if rest.is_empty() {
                Command::Tolerance(None)
            } else {
                let value: f32 = rest
                    .parse()
                    .map_err(|_| ParseError::InvalidTolerance(rest.to_string()))?;
                if !value.is_finite() {
                    return Err(ParseError::InvalidTolerance(rest.to_string()));
                }
                Command::Tolerance(Some(value))
            }
        }
        "enroll" => {
            let (name, image) = rest
                .rsplit_once(char::is_whitespace)
                .ok_or(ParseError::Usage("enroll <name> <image>"))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(ParseError::Usage("enroll <name> <image>"));
            }
            Command::Enroll {
                name: name.to_string(),
                image: PathBuf::from(image),
            }
        }
        "remove" | "rm" => {
            if rest.is_empty() {
                return Err(ParseError::Usage("remove <name>"));
            }
            Command::Remove(rest.to_string())
        }
        _ => return Err(ParseError::Unknown(word.to_string())),
    };
    Ok(Some(command))
}

fn split_first(line: &str) -> Option<(&str, &str)> {
    if line.is_empty() {
        return None;
    }
    Some(match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    })
}
