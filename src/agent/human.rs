use std::io::{self, BufRead, Stdout, StdinLock, Write};

use log::warn;

use crate::maze::{Action, Position};

use super::Agent;

const PROMPT: &str = "(0:up,1:right,2:down,3:left) ";

/// Asks a person for every move
///
/// Malformed input is reported and asked for again. When the input is closed the
/// agent falls back to [`Action::Up`] so the episode can still be abandoned through
/// the step limit.
pub struct HumanAgent<R: BufRead, W: Write> {
    reader: R,
    writer: W,
    line: String,
}

impl HumanAgent<StdinLock<'static>, Stdout> {
    /// Prompt on stdout and read from stdin
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> HumanAgent<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            line: String::new(),
        }
    }

    /// `Ok(None)` once the input is exhausted
    fn read_action(&mut self) -> io::Result<Option<Action>> {
        loop {
            write!(self.writer, "{PROMPT}")?;
            self.writer.flush()?;

            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            let input = self.line.trim();
            match input.parse::<usize>().ok().and_then(Action::from_index) {
                Some(action) => return Ok(Some(action)),
                None => writeln!(self.writer, "not a direction: {input:?}")?,
            }
        }
    }
}

impl<R: BufRead, W: Write> Agent for HumanAgent<R, W> {
    fn get_action(&mut self, _status: Position, _actions_effective: &[Action], _is_previous: bool) -> Action {
        match self.read_action() {
            Ok(Some(action)) => action,
            Ok(None) => {
                warn!("input closed, moving {:?}", Action::Up);
                Action::Up
            }
            Err(err) => {
                warn!("could not read a move ({err}), moving {:?}", Action::Up);
                Action::Up
            }
        }
    }
}
