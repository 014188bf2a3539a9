//! Rules oracle
//!
//! The orchestrator never validates chess rules itself. It asks a
//! [`RulesOracle`] whether a move is legal, what position results, whose turn
//! it is and whether the game is over. [`StandardRules`] implements the
//! oracle with shakmaty.

use std::fmt;

use shakmaty::{
    fen::Fen, uci::UciMove, CastlingMode, Chess, EnPassantMode, Move, Position, Role,
};

use crate::command::{MoveAttempt, Promotion};
use tempo_core::error::InputError;
use tempo_core::types::{Color, DrawReason};
use tempo_protocol::EngineMove;

/// Terminal-state classification of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Play continues
    Ongoing,
    /// The side to move is mated
    Checkmate { winner: Color },
    /// Drawn position
    Draw(DrawReason),
}

/// Narrow interface to a chess rules implementation
pub trait RulesOracle: Send + 'static {
    /// Canonical position representation
    type Position: Clone + fmt::Debug + Send;

    /// The standard initial array
    fn initial_position(&self) -> Self::Position;

    /// Parse a position from FEN
    fn parse_position(&self, fen: &str) -> Result<Self::Position, InputError>;

    /// Normalised FEN of a position
    fn fen(&self, position: &Self::Position) -> String;

    /// Apply a human move attempt. Returns the new position and the move in
    /// long algebraic form.
    fn apply_move(
        &self,
        position: &Self::Position,
        attempt: &MoveAttempt,
    ) -> Result<(Self::Position, EngineMove), InputError>;

    /// Apply a move received from the engine
    fn apply_engine_move(
        &self,
        position: &Self::Position,
        mv: &EngineMove,
    ) -> Result<Self::Position, InputError>;

    /// Side to move
    fn turn_of(&self, position: &Self::Position) -> Color;

    /// Game-over classification
    fn classify(&self, position: &Self::Position) -> Classification;
}

/// Position plus the repetition history needed to detect threefold draws
#[derive(Debug, Clone)]
pub struct Board {
    chess: Chess,
    /// Repetition keys of every position reached since the session began,
    /// including the current one
    history: Vec<String>,
}

impl Board {
    fn new(chess: Chess) -> Self {
        let key = repetition_key(&chess);
        Self {
            chess,
            history: vec![key],
        }
    }

    fn advance(&self, chess: Chess) -> Self {
        let mut history = self.history.clone();
        history.push(repetition_key(&chess));
        Self { chess, history }
    }

    fn repetitions(&self) -> usize {
        match self.history.last() {
            Some(current) => self.history.iter().filter(|key| *key == current).count(),
            None => 0,
        }
    }
}

/// Placement, side to move, castling rights and en passant square
fn repetition_key(chess: &Chess) -> String {
    let fen = Fen::from_position(chess.clone(), EnPassantMode::Legal).to_string();
    fen.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
}

fn color_of(color: shakmaty::Color) -> Color {
    match color {
        shakmaty::Color::White => Color::White,
        shakmaty::Color::Black => Color::Black,
    }
}

/// shakmaty-backed rules oracle
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRules;

impl StandardRules {
    /// Create the oracle
    pub fn new() -> Self {
        Self
    }

    fn play(&self, board: &Board, uci: &str) -> Result<(Board, Move), InputError> {
        let parsed: UciMove = uci
            .parse()
            .map_err(|_| InputError::UnrecognisedMove(uci.to_string()))?;
        let m = parsed
            .to_move(&board.chess)
            .map_err(|_| InputError::IllegalMove(uci.to_string()))?;

        if !board.chess.is_legal(&m) {
            return Err(InputError::IllegalMove(uci.to_string()));
        }

        let chess = board
            .chess
            .clone()
            .play(&m)
            .map_err(|_| InputError::IllegalMove(uci.to_string()))?;

        Ok((board.advance(chess), m))
    }

    /// A pawn reaching the last rank with no hint promotes to a queen
    fn with_default_promotion(&self, board: &Board, attempt: &MoveAttempt) -> MoveAttempt {
        if attempt.promotion.is_some() {
            return attempt.clone();
        }

        let is_pawn = attempt
            .from
            .parse::<shakmaty::Square>()
            .ok()
            .and_then(|sq| board.chess.board().piece_at(sq))
            .map_or(false, |piece| piece.role == Role::Pawn);
        let last_rank = attempt.to.ends_with('8') || attempt.to.ends_with('1');

        MoveAttempt {
            promotion: (is_pawn && last_rank).then_some(Promotion::Queen),
            ..attempt.clone()
        }
    }
}

impl RulesOracle for StandardRules {
    type Position = Board;

    fn initial_position(&self) -> Board {
        Board::new(Chess::default())
    }

    fn parse_position(&self, fen: &str) -> Result<Board, InputError> {
        let fen = fen.trim();
        if fen.is_empty() {
            return Err(InputError::InvalidFen(String::new()));
        }

        let parsed: Fen = fen
            .parse()
            .map_err(|e| InputError::InvalidFen(format!("{e}")))?;
        let chess: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| InputError::InvalidFen(format!("{e}")))?;
        Ok(Board::new(chess))
    }

    fn fen(&self, position: &Board) -> String {
        Fen::from_position(position.chess.clone(), EnPassantMode::Legal).to_string()
    }

    fn apply_move(
        &self,
        position: &Board,
        attempt: &MoveAttempt,
    ) -> Result<(Board, EngineMove), InputError> {
        let attempt = self.with_default_promotion(position, attempt);
        let (board, m) = self.play(position, &attempt.to_string())?;

        let played = UciMove::from_move(&m, CastlingMode::Standard).to_string();
        let played =
            EngineMove::parse(&played).map_err(|_| InputError::UnrecognisedMove(played))?;
        Ok((board, played))
    }

    fn apply_engine_move(&self, position: &Board, mv: &EngineMove) -> Result<Board, InputError> {
        self.play(position, mv.as_str()).map(|(board, _)| board)
    }

    fn turn_of(&self, position: &Board) -> Color {
        color_of(position.chess.turn())
    }

    fn classify(&self, position: &Board) -> Classification {
        let chess = &position.chess;
        if chess.is_checkmate() {
            // The side to move is mated
            Classification::Checkmate {
                winner: color_of(chess.turn()).opposite(),
            }
        } else if chess.is_stalemate() {
            Classification::Draw(DrawReason::Stalemate)
        } else if chess.is_insufficient_material() {
            Classification::Draw(DrawReason::InsufficientMaterial)
        } else if chess.halfmoves() >= 100 {
            Classification::Draw(DrawReason::FiftyMoveRule)
        } else if position.repetitions() >= 3 {
            Classification::Draw(DrawReason::ThreefoldRepetition)
        } else {
            Classification::Ongoing
        }
    }
}
