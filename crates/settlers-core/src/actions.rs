//! Game actions that players can take.
//!
//! Coordinates in actions are raw `(q, r, index)` triples exactly as a client
//! sent them; the engine canonicalizes them.

use crate::board::Resource;
use crate::player::{PlayerColor, ResourceHand};
use serde::{Deserialize, Serialize};

/// All possible actions a player can take
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameAction {
    // ==================== Building ====================
    /// Build a settlement at a corner
    BuildSettlement { q: i32, r: i32, corner: u8 },
    /// Build a road along a side
    BuildRoad { q: i32, r: i32, edge: u8 },
    /// Upgrade an own settlement to a city
    BuildCity { q: i32, r: i32, corner: u8 },

    // ==================== Turn ====================
    /// Roll the dice (must be done at start of turn)
    RollDice,
    /// End your turn
    EndTurn,

    // ==================== Trading ====================
    /// Trade four of one resource to the bank for one of another
    BankTrade { give: Resource, get: Resource },
    /// Put up the single open offer, replacing any previous one
    ProposeTrade {
        give: ResourceHand,
        get: ResourceHand,
    },
    /// Tentatively accept or decline the open offer
    RespondToOffer { accept: bool },
    /// Execute your own open offer with one of the players who accepted it
    ConfirmTrade { target: PlayerColor },
    /// Withdraw your own offer
    CancelTrade,
}

impl GameAction {
    /// Whether a player other than the current one may send this action
    pub fn allowed_out_of_turn(&self) -> bool {
        matches!(self, GameAction::RespondToOffer { .. })
    }
}

/// Lifecycle of a trade offer. A completed or cancelled offer is removed
/// from the game instead of being kept with a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeStatus {
    Open,
}

/// A trade offer between players
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeOffer {
    /// Player making the offer
    pub offerer: PlayerColor,
    /// Resources the offerer hands over
    pub give: ResourceHand,
    /// Resources the offerer wants back
    pub get: ResourceHand,
    /// Players who tentatively accepted, in order, without repeats
    pub responses: Vec<PlayerColor>,
    pub status: TradeStatus,
}

impl TradeOffer {
    /// Create a new open offer
    pub fn new(offerer: PlayerColor, give: ResourceHand, get: ResourceHand) -> Self {
        Self {
            offerer,
            give,
            get,
            responses: Vec::new(),
            status: TradeStatus::Open,
        }
    }

    /// Check if offer is valid (non-empty on both sides)
    pub fn is_valid(&self) -> bool {
        !self.give.is_empty() && !self.get.is_empty()
    }

    /// Record a tentative acceptance. Returns false if already recorded.
    pub fn record_acceptance(&mut self, responder: PlayerColor) -> bool {
        if self.responses.contains(&responder) {
            return false;
        }
        self.responses.push(responder);
        true
    }
}
