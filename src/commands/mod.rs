pub mod playback_commands;
pub mod queue_commands;

use std::str::FromStr;

/// A line of input to the interactive player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Play,
    Pause,
    Resume,
    Stop,
    Next,
    Previous,
    Seek(i64),
    Add(Vec<String>),
    List,
    Status,
    Queue,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let Some(name) = parts.next() else {
            return Err("empty command".into());
        };

        let command = match name.to_lowercase().as_str() {
            "play" => Command::Play,
            "pause" => Command::Pause,
            "resume" => Command::Resume,
            "stop" => Command::Stop,
            "next" | "n" => Command::Next,
            "prev" | "previous" | "p" => Command::Previous,
            "seek" => {
                let arg = parts.next().ok_or("usage: seek <seconds>")?;
                let second = arg
                    .parse::<i64>()
                    .map_err(|_| format!("invalid position: {}", arg))?;
                Command::Seek(second)
            }
            "add" => {
                let ids: Vec<String> = parts.by_ref().map(str::to_string).collect();
                if ids.is_empty() {
                    return Err("usage: add <track-id>...".into());
                }
                Command::Add(ids)
            }
            "list" | "ls" => Command::List,
            "status" | "s" => Command::Status,
            "queue" | "q" => Command::Queue,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(format!("unknown command: {}", other)),
        };

        if parts.next().is_some() {
            return Err(format!("too many arguments for {}", name));
        }
        Ok(command)
    }
}

pub const HELP: &str = "\
commands:
  play | pause | resume | stop
  next | prev
  seek <seconds>
  add <track-id>...   replace upcoming tracks
  list                tracks in the local library
  status | queue
  quit";
