//! Engine service routes and query parameter names
//!
//! All routes are relative to the configured server URL.
//!
//! 1. `POST newgame` with a [`StartDescriptor`](crate::StartDescriptor) body,
//!    answered by a [`NewGameResponse`](crate::NewGameResponse)
//! 2. `GET bestmove?playerID=..&wtime=..&winc=..&btime=..&binc=..` answered
//!    by plain move text
//! 3. `GET playermove?playerID=..&move=..` after every applied move
//! 4. `GET endgame/?playerID=..` when a session is abandoned
//! 5. `GET keepalive?playerID=..` on a fixed interval

/// Start a new session
pub const NEW_GAME: &str = "newgame";

/// Ask the engine for its reply move
pub const BEST_MOVE: &str = "bestmove";

/// Report a move applied locally
pub const PLAYER_MOVE: &str = "playermove";

/// End a session. The trailing slash is part of the route.
pub const END_GAME: &str = "endgame/";

/// Liveness ping
pub const KEEP_ALIVE: &str = "keepalive";

/// Query parameter carrying the session token
pub const PLAYER_ID: &str = "playerID";

/// Query parameter carrying move text
pub const MOVE: &str = "move";

/// Clock budget query parameters, in milliseconds
pub const WHITE_TIME: &str = "wtime";
pub const WHITE_INC: &str = "winc";
pub const BLACK_TIME: &str = "btime";
pub const BLACK_INC: &str = "binc";
