//! Game room management.
//!
//! A room hosts one game from the moment it is created. Connections take the
//! free colors in seat order and act as that color.

use settlers_core::{Board, GameAction, GameError, GameSession, GameStateJson, PlayerColor};
use thiserror::Error;
use uuid::Uuid;

use crate::protocol::{RoomInfo, RoomStatus, SeatInfo};

pub const MAX_PLAYERS: usize = PlayerColor::ALL.len();

#[derive(Debug, Error, PartialEq)]
pub enum RoomError {
    #[error("Room is full")]
    RoomFull,

    #[error("Already seated in this room")]
    AlreadySeated,

    #[error("Player not in room")]
    PlayerNotInRoom,

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error(transparent)]
    Rejected(#[from] GameError),
}

/// A connection holding one color.
#[derive(Debug, Clone)]
pub struct Seat {
    pub player_id: Uuid,
    pub color: PlayerColor,
}

impl Seat {
    pub fn to_info(&self) -> SeatInfo {
        SeatInfo {
            player_id: self.player_id,
            color: self.color,
        }
    }
}

/// A game room and the game it hosts.
pub struct GameRoom {
    pub id: Uuid,
    /// Taken seats, in color order
    pub seats: Vec<Seat>,
    pub session: GameSession,
}

impl GameRoom {
    pub fn new(id: Uuid, session: GameSession) -> Self {
        Self {
            id,
            seats: Vec::with_capacity(MAX_PLAYERS),
            session,
        }
    }

    pub fn player_count(&self) -> usize {
        self.seats.len()
    }

    pub fn is_full(&self) -> bool {
        self.seats.len() >= MAX_PLAYERS
    }

    pub fn status(&self) -> RoomStatus {
        if self.is_full() {
            RoomStatus::Full
        } else {
            RoomStatus::Open
        }
    }

    pub fn color_of(&self, player_id: Uuid) -> Option<PlayerColor> {
        self.seats
            .iter()
            .find(|s| s.player_id == player_id)
            .map(|s| s.color)
    }

    pub fn player_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.seats.iter().map(|s| s.player_id)
    }

    /// Seat a player in the first free color
    pub fn add_player(&mut self, player_id: Uuid) -> Result<PlayerColor, RoomError> {
        if self.color_of(player_id).is_some() {
            return Err(RoomError::AlreadySeated);
        }

        let color = PlayerColor::ALL
            .into_iter()
            .find(|c| self.seats.iter().all(|s| s.color != *c))
            .ok_or(RoomError::RoomFull)?;

        self.seats.push(Seat {
            player_id,
            color,
        });
        self.seats.sort_by_key(|s| s.color);
        Ok(color)
    }

    /// Free a player's seat. Returns true if the room is now empty.
    pub fn remove_player(&mut self, player_id: Uuid) -> Result<bool, RoomError> {
        if self.color_of(player_id).is_none() {
            return Err(RoomError::PlayerNotInRoom);
        }

        self.seats.retain(|s| s.player_id != player_id);
        Ok(self.seats.is_empty())
    }

    /// Parse and apply an action as the player's seat color
    pub fn apply_action(
        &mut self,
        player_id: Uuid,
        action: serde_json::Value,
    ) -> Result<(), RoomError> {
        let color = self
            .color_of(player_id)
            .ok_or(RoomError::PlayerNotInRoom)?;

        let action: GameAction = serde_json::from_value(action)
            .map_err(|e| RoomError::InvalidAction(e.to_string()))?;

        self.session.apply_action(color, action)?;
        Ok(())
    }

    pub fn board(&self) -> &Board {
        &self.session.board
    }

    pub fn game_state(&self) -> GameStateJson {
        self.session.snapshot()
    }

    pub fn to_info(&self) -> RoomInfo {
        RoomInfo {
            id: self.id,
            seats: self.seats.iter().map(Seat::to_info).collect(),
            max_players: MAX_PLAYERS as u8,
            status: self.status(),
        }
    }
}
