//! Message types for the engine service
//!
//! The service speaks a small HTTP dialect: a plain-text body to start a
//! game, a JSON reply carrying the session token, query-string clock
//! budgets, and plain-text moves in long algebraic (UCI) form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::endpoint;
use crate::error::ProtocolError;
use crate::session::SessionId;

/// Body sent to `newgame` describing the initial position
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartDescriptor {
    /// Standard initial array
    StartPos,
    /// Arbitrary position in Forsyth-Edwards notation
    Fen(String),
}

impl StartDescriptor {
    /// Encode as the request body
    pub fn to_body(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for StartDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartDescriptor::StartPos => write!(f, "startpos"),
            StartDescriptor::Fen(fen) => write!(f, "fen {}", fen),
        }
    }
}

impl FromStr for StartDescriptor {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "startpos" {
            return Ok(StartDescriptor::StartPos);
        }
        match s.strip_prefix("fen ") {
            Some(fen) if !fen.trim().is_empty() => Ok(StartDescriptor::Fen(fen.trim().to_string())),
            _ => Err(ProtocolError::MalformedDescriptor(s.to_string())),
        }
    }
}

/// JSON reply to `newgame`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGameResponse {
    /// Token identifying the new session
    #[serde(rename = "playerID")]
    pub player_id: SessionId,
}

/// Remaining time and increment for both sides, sent with every
/// `bestmove` request so the engine can budget its search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClockBudget {
    /// White's remaining time in milliseconds
    pub white_ms: u64,
    /// White's increment in milliseconds
    pub white_inc_ms: u64,
    /// Black's remaining time in milliseconds
    pub black_ms: u64,
    /// Black's increment in milliseconds
    pub black_inc_ms: u64,
}

impl ClockBudget {
    /// Query pairs for a `bestmove` request
    pub fn query(&self, session: SessionId) -> Vec<(&'static str, String)> {
        vec![
            (endpoint::PLAYER_ID, session.as_u64().to_string()),
            (endpoint::WHITE_TIME, self.white_ms.to_string()),
            (endpoint::WHITE_INC, self.white_inc_ms.to_string()),
            (endpoint::BLACK_TIME, self.black_ms.to_string()),
            (endpoint::BLACK_INC, self.black_inc_ms.to_string()),
        ]
    }
}

/// A single move in long algebraic form, e.g. `e2e4` or `e7e8q`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EngineMove(String);

impl EngineMove {
    /// Parse and validate move text. Surrounding whitespace is ignored.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let text = text.trim();
        let bytes = text.as_bytes();
        let square_ok =
            |file: u8, rank: u8| (b'a'..=b'h').contains(&file) && (b'1'..=b'8').contains(&rank);

        let valid = match bytes.len() {
            4 | 5 => {
                square_ok(bytes[0], bytes[1])
                    && square_ok(bytes[2], bytes[3])
                    && bytes.get(4).map_or(true, |p| matches!(p, b'q' | b'r' | b'b' | b'n'))
            }
            _ => false,
        };

        if valid {
            Ok(Self(text.to_string()))
        } else {
            Err(ProtocolError::MalformedMove(text.to_string()))
        }
    }

    /// Get the move text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EngineMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EngineMove {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EngineMove {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EngineMove> for String {
    fn from(m: EngineMove) -> Self {
        m.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_descriptor_body() {
        assert_eq!(StartDescriptor::StartPos.to_body(), "startpos");
        let fen = "8/8/8/4k3/8/8/8/4K3 w - - 0 1";
        assert_eq!(
            StartDescriptor::Fen(fen.to_string()).to_body(),
            format!("fen {}", fen)
        );
    }

    #[test]
    fn test_start_descriptor_parse() {
        assert_eq!(
            "startpos".parse::<StartDescriptor>().unwrap(),
            StartDescriptor::StartPos
        );
        assert!(matches!(
            "fen 8/8/8/8/8/8/8/8 w - - 0 1".parse::<StartDescriptor>(),
            Ok(StartDescriptor::Fen(_))
        ));
        assert!("fen ".parse::<StartDescriptor>().is_err());
        assert!("position".parse::<StartDescriptor>().is_err());
    }

    #[test]
    fn test_new_game_response_field_name() {
        let response: NewGameResponse = serde_json::from_str(r#"{"playerID": 17}"#).unwrap();
        assert_eq!(response.player_id, SessionId::new(17));
    }

    #[test]
    fn test_clock_budget_query() {
        let budget = ClockBudget {
            white_ms: 180_000,
            white_inc_ms: 2_000,
            black_ms: 179_000,
            black_inc_ms: 2_000,
        };
        let query = budget.query(SessionId::new(3));
        assert_eq!(query[0], ("playerID", "3".to_string()));
        assert_eq!(query[1], ("wtime", "180000".to_string()));
        assert_eq!(query[3], ("btime", "179000".to_string()));
        assert_eq!(query.len(), 5);
    }

    #[test]
    fn test_engine_move_accepts_long_algebraic() {
        assert_eq!(EngineMove::parse("e2e4").unwrap().as_str(), "e2e4");
        assert_eq!(EngineMove::parse(" e7e8q\n").unwrap().as_str(), "e7e8q");
    }

    #[test]
    fn test_engine_move_rejects_garbage() {
        for text in ["", "e4", "Nf3", "e2e9", "i2i4", "e7e8k", "e2e4e5"] {
            assert!(EngineMove::parse(text).is_err(), "accepted {:?}", text);
        }
    }
}
