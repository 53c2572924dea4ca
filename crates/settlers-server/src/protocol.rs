//! WebSocket protocol messages for settlers multiplayer.

use serde::{Deserialize, Serialize};
use settlers_core::{Board, GameStateJson, PlayerColor};
use uuid::Uuid;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Create a new game room and take its first seat
    CreateRoom,

    /// Join an existing room in the next free seat
    JoinRoom { room_id: Uuid },

    /// Leave current room
    LeaveRoom,

    /// Request room list
    ListRooms,

    /// Submit a game action. Parsed by the room so that malformed actions
    /// come back as a rejection rather than a dropped message.
    GameAction { action: serde_json::Value },

    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Welcome message with assigned player ID
    Welcome { player_id: Uuid },

    /// Room created successfully
    RoomCreated { room_id: Uuid },

    /// Joined room successfully
    JoinedRoom { room: RoomInfo, seat: PlayerColor },

    /// Seats changed (player joined or left)
    RoomUpdated { room: RoomInfo },

    /// Left room successfully
    LeftRoom,

    /// The room's board, sent once on joining
    BoardState { board: Board },

    /// Game state after a successful action, or on joining
    GameState { state: GameStateJson },

    /// The sender's action was refused
    ActionRejected { error: String },

    /// List of rooms with free seats
    RoomList { rooms: Vec<RoomInfo> },

    /// Error occurred
    Error { message: String },

    /// Pong response
    Pong,
}

/// Room information for clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub id: Uuid,
    pub seats: Vec<SeatInfo>,
    pub max_players: u8,
    pub status: RoomStatus,
}

/// A taken seat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatInfo {
    pub player_id: Uuid,
    pub color: PlayerColor,
}

/// Room status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    Open,
    Full,
}
