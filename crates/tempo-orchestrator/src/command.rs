//! Presentation-layer inputs
//!
//! Everything a front end can ask the orchestrator to do. Commands are
//! plain data; the state machine decides whether they apply.

use std::fmt;

use tempo_core::error::InputError;
use tempo_core::types::Color;

/// Piece a pawn may promote to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    Queen,
    Rook,
    Bishop,
    Knight,
}

impl Promotion {
    /// Lowercase letter used in long algebraic notation
    pub fn as_char(self) -> char {
        match self {
            Promotion::Queen => 'q',
            Promotion::Rook => 'r',
            Promotion::Bishop => 'b',
            Promotion::Knight => 'n',
        }
    }

    /// Parse a promotion letter in either case
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'q' => Some(Promotion::Queen),
            'r' => Some(Promotion::Rook),
            'b' => Some(Promotion::Bishop),
            'n' => Some(Promotion::Knight),
            _ => None,
        }
    }
}

/// A human attempt to move a piece from one square to another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveAttempt {
    /// Origin square, e.g. `e2`
    pub from: String,
    /// Destination square, e.g. `e4`
    pub to: String,
    /// Requested promotion piece, if any
    pub promotion: Option<Promotion>,
}

impl MoveAttempt {
    /// Create a move attempt, validating both squares
    pub fn new(from: &str, to: &str, promotion: Option<Promotion>) -> Result<Self, InputError> {
        let from = normalize_square(from)?;
        let to = normalize_square(to)?;
        Ok(Self {
            from,
            to,
            promotion,
        })
    }

    /// Parse `e2e4`, `e7e8q` or `e2-e4`
    pub fn parse(text: &str) -> Result<Self, InputError> {
        let compact: String = text.trim().chars().filter(|c| *c != '-').collect();
        let unrecognised = || InputError::UnrecognisedMove(text.trim().to_string());

        if !compact.is_ascii() || !(4..=5).contains(&compact.len()) {
            return Err(unrecognised());
        }

        let promotion = match compact.chars().nth(4) {
            Some(c) => Some(Promotion::from_char(c).ok_or_else(unrecognised)?),
            None => None,
        };

        Self::new(&compact[0..2], &compact[2..4], promotion).map_err(|_| unrecognised())
    }
}

impl fmt::Display for MoveAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(p) = self.promotion {
            write!(f, "{}", p.as_char())?;
        }
        Ok(())
    }
}

fn normalize_square(square: &str) -> Result<String, InputError> {
    let lower = square.trim().to_ascii_lowercase();
    let bytes = lower.as_bytes();
    if bytes.len() == 2 && (b'a'..=b'h').contains(&bytes[0]) && (b'1'..=b'8').contains(&bytes[1]) {
        Ok(lower)
    } else {
        Err(InputError::UnrecognisedMove(square.to_string()))
    }
}

/// Input forwarded from the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Try to play a move as the human
    Move(MoveAttempt),
    /// Start over from the initial position, keeping the board orientation
    NewGame,
    /// Start over playing the given colour
    PlayAs(Color),
    /// Swap which colour is drawn at the bottom
    FlipBoard,
    /// Concede the current game
    Resign,
    /// Start over from a FEN position
    LoadPosition(String),
    /// Stage a new base time, in decimal minutes
    SetTimeControl(String),
    /// Stage a new increment, in decimal seconds
    SetIncrement(String),
}

/// What a line typed at the terminal asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRequest {
    /// Forward to the orchestrator
    Command(Command),
    /// Print usage
    Help,
    /// Print both clocks
    ShowClock,
    /// Leave the program
    Quit,
}

/// Parse one line of terminal input
pub fn parse_line(line: &str) -> Result<LineRequest, InputError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "help" | "?" => return Ok(LineRequest::Help),
        "quit" | "exit" => return Ok(LineRequest::Quit),
        "clock" => return Ok(LineRequest::ShowClock),
        "move" | "m" => Command::Move(MoveAttempt::parse(rest)?),
        "new" => Command::NewGame,
        "play" => Command::PlayAs(parse_side(rest)?),
        "white" | "black" => Command::PlayAs(parse_side(word)?),
        "flip" => Command::FlipBoard,
        "resign" => Command::Resign,
        "load" => Command::LoadPosition(rest.to_string()),
        "time" => Command::SetTimeControl(rest.to_string()),
        "inc" | "increment" => Command::SetIncrement(rest.to_string()),
        _ => Command::Move(MoveAttempt::parse(line)?),
    };

    Ok(LineRequest::Command(command))
}

fn parse_side(word: &str) -> Result<Color, InputError> {
    Color::parse(word).ok_or_else(|| InputError::UnknownColor(word.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_move_attempt() {
        let attempt = MoveAttempt::parse("e2e4").unwrap();
        assert_eq!(attempt.from, "e2");
        assert_eq!(attempt.to, "e4");
        assert_eq!(attempt.promotion, None);

        let attempt = MoveAttempt::parse("E7-E8N").unwrap();
        assert_eq!(attempt.to_string(), "e7e8n");
    }

    #[test]
    fn test_parse_move_attempt_rejects_bad_squares() {
        assert!(MoveAttempt::parse("z9e4").is_err());
        assert!(MoveAttempt::parse("e2").is_err());
        assert!(MoveAttempt::parse("e7e8k").is_err());
    }

    #[test]
    fn test_parse_line_commands() {
        assert_eq!(
            parse_line("new").unwrap(),
            LineRequest::Command(Command::NewGame)
        );
        assert_eq!(
            parse_line("black").unwrap(),
            LineRequest::Command(Command::PlayAs(Color::Black))
        );
        assert_eq!(
            parse_line("load 8/8/8/4k3/8/8/8/4K3 w - - 0 1").unwrap(),
            LineRequest::Command(Command::LoadPosition(
                "8/8/8/4k3/8/8/8/4K3 w - - 0 1".to_string()
            ))
        );
        assert_eq!(
            parse_line("time 5").unwrap(),
            LineRequest::Command(Command::SetTimeControl("5".to_string()))
        );
        assert_eq!(parse_line("quit").unwrap(), LineRequest::Quit);
        assert_eq!(parse_line("clock").unwrap(), LineRequest::ShowClock);
    }

    #[test]
    fn test_play_as_named_side() {
        assert_eq!(
            parse_line("WHITE").unwrap(),
            LineRequest::Command(Command::PlayAs(Color::White))
        );
        assert_eq!(
            parse_line("play b").unwrap(),
            LineRequest::Command(Command::PlayAs(Color::Black))
        );
        assert_eq!(
            parse_line("play red"),
            Err(InputError::UnknownColor("red".to_string()))
        );
    }

    #[test]
    fn test_bare_move_text_is_a_move() {
        assert_eq!(
            parse_line("g1f3").unwrap(),
            LineRequest::Command(Command::Move(MoveAttempt::parse("g1f3").unwrap()))
        );
        assert!(parse_line("castle").is_err());
    }
}
