//! Settlers - rules engine for a four-player hex-board settlement game
//!
//! This crate provides the core game logic, including:
//! - Hex topology with canonical corner and side identities
//! - Board generation with terrain and number tokens
//! - Resource hands, building costs and piece limits
//! - Game state machine with full rule enforcement and a bounded game log
//!
//! # Architecture
//!
//! The engine has no I/O. A host (see the `settlers-server` crate) owns one
//! [`GameSession`] per game and feeds it [`GameAction`]s; every operation
//! either applies completely or returns a [`GameError`] and changes nothing
//! but the log.
//!
//! # Modules
//!
//! - [`hex`]: Coordinates for cells, corners and sides
//! - [`board`]: Terrain layout and number tokens
//! - [`player`]: Player colors and resources
//! - [`actions`]: Actions players send and the trade offer
//! - [`history`]: The player-facing game log
//! - [`game`]: Game state machine

pub mod actions;
pub mod board;
pub mod game;
pub mod hex;
pub mod history;
pub mod player;

// Re-export commonly used types
pub use actions::{GameAction, TradeOffer, TradeStatus};
pub use board::{Board, Cell, Resource, Terrain};
pub use game::{
    Building, BuildingKind, GameError, GamePhase, GameSession, GameState, GameStateJson, Road,
    TurnSubPhase,
};
pub use hex::{EdgeKey, HexCoord, VertexKey};
pub use history::{GameLog, LogEntry};
pub use player::{PlayerColor, ResourceHand};
