//! Terminal rendering of the game view
//!
//! Draws the board as text from the view's FEN, with the opponent's clock
//! above it and the player's clock below, the way the board is oriented.

use std::fmt::Write as _;

use crate::view::{GameView, Notification, Phase};
use tempo_core::types::{format_clock, Color};

const FILES: [char; 8] = ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h'];

/// Expand the piece-placement field of a FEN into 8 ranks of 8 squares,
/// rank 8 first. Empty squares are `.`.
fn expand_placement(fen: &str) -> Vec<Vec<char>> {
    let placement = fen.split_whitespace().next().unwrap_or("");
    placement
        .split('/')
        .map(|rank| {
            let mut squares = Vec::with_capacity(8);
            for c in rank.chars() {
                match c.to_digit(10) {
                    Some(n) => squares.extend(std::iter::repeat('.').take(n as usize)),
                    None => squares.push(c),
                }
            }
            squares.resize(8, '.');
            squares
        })
        .collect()
}

/// Draw the board with `orientation` at the bottom
pub fn render_board(fen: &str, orientation: Color) -> String {
    let mut ranks = expand_placement(fen);
    ranks.resize(8, vec!['.'; 8]);

    let mut rank_order: Vec<usize> = (0..8).collect();
    let mut files: Vec<char> = FILES.to_vec();
    if orientation == Color::Black {
        rank_order.reverse();
        files.reverse();
    }

    let mut out = String::new();
    for &row in &rank_order {
        let mut squares = ranks[row].clone();
        if orientation == Color::Black {
            squares.reverse();
        }
        let line: Vec<String> = squares.iter().map(|c| c.to_string()).collect();
        let _ = writeln!(out, "{} | {}", 8 - row, line.join(" "));
    }
    let _ = writeln!(out, "    {}", "-".repeat(15));
    let labels: Vec<String> = files.iter().map(|c| c.to_string()).collect();
    let _ = write!(out, "    {}", labels.join(" "));
    out
}

/// One clock line: name, MM:SS, and markers for the running and low sides
pub fn render_clock(view: &GameView, side: Color) -> String {
    let mut line = format!("{:<5} {}", side.to_string(), format_clock(view.remaining(side)));
    if view.low_time[side.index()] {
        line.push_str(" !");
    }
    if view.clock_running && view.side_on_clock == Some(side) {
        line.push_str(" <");
    }
    line
}

/// Short description of what the game is waiting for
pub fn render_status(view: &GameView) -> String {
    match view.phase {
        Phase::Idle => "Type `new` to start a game".to_string(),
        Phase::AwaitingSession => "Waiting for the engine service...".to_string(),
        Phase::PlayerToMove => format!("Your move ({})", view.turn),
        Phase::EngineToMove => format!("Engine is thinking ({})", view.turn),
        Phase::Terminal => match view.outcome {
            Some(outcome) => match outcome.winner() {
                Some(winner) if winner == view.human => format!("{} You win.", outcome),
                Some(_) => format!("{} You lose.", outcome),
                None => outcome.to_string(),
            },
            None => "Game over".to_string(),
        },
        Phase::Halted => "Game halted: the engine sent an illegal move".to_string(),
    }
}

/// Full screen: opponent clock, board, player clock, status
pub fn render(view: &GameView) -> String {
    let top = view.orientation.opposite();
    format!(
        "{}\n{}\n{}\n{}",
        render_clock(view, top),
        render_board(&view.fen, view.orientation),
        render_clock(view, view.orientation),
        render_status(view)
    )
}

/// Print a notification, coloured by severity
pub fn print_notification(notification: &Notification) {
    match notification {
        Notification::GameOver(outcome) => print_success(&outcome.to_string()),
        Notification::Rejected(e) => print_error(&e.to_string()),
        Notification::ProtocolViolation { mv, reason } => {
            print_error(&format!("Engine sent illegal move {}: {}", mv, reason))
        }
        Notification::EngineUnavailable(reason) => {
            print_warning(&format!("Engine did not answer: {}. Start a new game to retry.", reason))
        }
        Notification::SessionUnavailable { reason, retry_in } => print_warning(&format!(
            "Could not start a game: {}. Retrying in {:.1}s",
            reason,
            retry_in.as_secs_f64()
        )),
    }
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning in yellow
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
