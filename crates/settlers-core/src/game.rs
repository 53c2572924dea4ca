//! Core game state machine.
//!
//! `GameSession` owns one game: the board, the mutable `GameState` and the dice
//! RNG. Every operation runs in two steps. A `validate_*` method inspects the
//! state and returns a plan or a `GameError`, and an `apply_*` method carries
//! the plan out. Nothing is mutated before validation has passed, so a
//! rejected action leaves the game as it was apart from the log line that
//! explains the rejection.

use crate::actions::{GameAction, TradeOffer};
use crate::board::{Board, Resource, BOARD_RADIUS};
use crate::hex::{normalize_edge, normalize_vertex, EdgeKey, VertexKey};
use crate::history::{GameLog, LogEntry};
use crate::player::{costs, limits, PlayerColor, ResourceHand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::debug;

/// Dice total that would trigger the robber
pub const ROBBER_ROLL: u8 = 7;

/// Range check on a raw cell coordinate, ahead of any alias arithmetic.
fn near_board(q: i32, r: i32) -> bool {
    let reach = BOARD_RADIUS.unsigned_abs() + 1;
    q.unsigned_abs() <= reach && r.unsigned_abs() <= reach
}

/// Game phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// First snake-draft round, players in seat order
    #[serde(rename = "INITIAL_PLACEMENT_1")]
    InitialPlacement1,
    /// Second snake-draft round, players in reverse seat order
    #[serde(rename = "INITIAL_PLACEMENT_2")]
    InitialPlacement2,
    /// Regular turns
    #[serde(rename = "GAME_LOOP")]
    GameLoop,
}

impl GamePhase {
    /// Buildings and roads each player must have once their turn in this
    /// placement round is over. None outside initial placement.
    pub fn initial_quota(&self) -> Option<usize> {
        match self {
            GamePhase::InitialPlacement1 => Some(1),
            GamePhase::InitialPlacement2 => Some(2),
            GamePhase::GameLoop => None,
        }
    }
}

/// Step within a regular turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnSubPhase {
    RollDice,
    BuildTrade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildingKind {
    Settlement,
    City,
}

impl BuildingKind {
    /// Resources produced per matching roll
    pub fn yield_per_roll(&self) -> u32 {
        match self {
            BuildingKind::Settlement => 1,
            BuildingKind::City => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub owner: PlayerColor,
    #[serde(rename = "type")]
    pub kind: BuildingKind,
    pub location: VertexKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Road {
    pub owner: PlayerColor,
    pub location: EdgeKey,
}

/// Why an action was refused. The message is what players see in the log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("Not your turn")]
    NotYourTurn,

    #[error("Not allowed in this phase")]
    WrongPhase,

    #[error("Roll the dice first!")]
    MustRollFirst,

    #[error("Dice already rolled this turn")]
    AlreadyRolled,

    #[error("That spot is off the board!")]
    OffBoard,

    #[error("That spot is already taken!")]
    Occupied,

    #[error("Too close to another building!")]
    TooClose,

    #[error("Must connect to your road!")]
    SettlementNotConnected,

    #[error("Must connect to your network!")]
    RoadNotConnected,

    #[error("Already placed this round's piece")]
    PlacementQuotaReached,

    #[error("Place your settlement before your road!")]
    SettlementFirst,

    #[error("No settlements left!")]
    NoSettlementsLeft,

    #[error("No roads left!")]
    NoRoadsLeft,

    #[error("Max 4 cities reached!")]
    MaxCities,

    #[error("No building there!")]
    NoBuilding,

    #[error("That's not your building!")]
    NotYourBuilding,

    #[error("Can only upgrade settlements!")]
    NotASettlement,

    #[error("Not enough resources!")]
    CannotAfford,

    #[error("Not enough {0} to trade (need 4)")]
    NotEnoughToTrade(Resource),

    #[error("Offer failed: Not enough {0}")]
    OfferShort(Resource),

    #[error("Invalid trade")]
    InvalidTrade,

    #[error("No active trade")]
    NoActiveTrade,

    #[error("Only the offerer can do that")]
    NotOfferer,

    #[error("That player has not accepted the offer")]
    NotAccepted,
}

/// Everything that changes over the course of a game
#[derive(Debug, Clone)]
pub struct GameState {
    /// Seat order
    pub players: Vec<PlayerColor>,
    pub current_turn_index: usize,
    pub phase: GamePhase,
    /// Only set during `GameLoop`
    pub turn_sub_phase: Option<TurnSubPhase>,
    pub buildings: HashMap<VertexKey, Building>,
    pub roads: HashMap<EdgeKey, Road>,
    pub inventories: BTreeMap<PlayerColor, ResourceHand>,
    pub last_dice_result: Option<u8>,
    /// The single open trade offer, if any
    pub active_trade: Option<TradeOffer>,
    pub logs: GameLog,
}

impl GameState {
    /// Fresh state with the four standard seats and empty hands
    pub fn new() -> Self {
        let players = PlayerColor::ALL.to_vec();
        let inventories = players
            .iter()
            .map(|&p| (p, ResourceHand::new()))
            .collect();

        Self {
            players,
            current_turn_index: 0,
            phase: GamePhase::InitialPlacement1,
            turn_sub_phase: None,
            buildings: HashMap::new(),
            roads: HashMap::new(),
            inventories,
            last_dice_result: None,
            active_trade: None,
            logs: GameLog::new(),
        }
    }

    pub fn current_player(&self) -> PlayerColor {
        self.players[self.current_turn_index]
    }

    pub fn inventory(&self, player: PlayerColor) -> ResourceHand {
        self.inventories.get(&player).copied().unwrap_or_default()
    }

    fn inventory_mut(&mut self, player: PlayerColor) -> &mut ResourceHand {
        self.inventories.entry(player).or_default()
    }

    pub fn building_at(&self, location: &VertexKey) -> Option<&Building> {
        self.buildings.get(location)
    }

    pub fn road_at(&self, location: &EdgeKey) -> Option<&Road> {
        self.roads.get(location)
    }

    /// Settlements and cities owned by a player
    pub fn building_count(&self, player: PlayerColor) -> usize {
        self.buildings.values().filter(|b| b.owner == player).count()
    }

    pub fn count_of_kind(&self, player: PlayerColor, kind: BuildingKind) -> usize {
        self.buildings
            .values()
            .filter(|b| b.owner == player && b.kind == kind)
            .count()
    }

    pub fn road_count(&self, player: PlayerColor) -> usize {
        self.roads.values().filter(|r| r.owner == player).count()
    }

    fn has_road(&self, edge: &EdgeKey, player: PlayerColor) -> bool {
        self.roads.get(edge).is_some_and(|r| r.owner == player)
    }

    /// Whether a road on `edge` would join the player's network at `vertex`
    fn connects_at(&self, vertex: &VertexKey, edge: &EdgeKey, player: PlayerColor) -> bool {
        if self.buildings.get(vertex).is_some_and(|b| b.owner == player) {
            return true;
        }
        vertex
            .incident_edges()
            .iter()
            .any(|e| e != edge && self.has_road(e, player))
    }

    /// Sum of every card in every hand
    pub fn total_resources(&self) -> u32 {
        self.inventories.values().map(|h| h.total()).sum()
    }

    /// Convert to a JSON-friendly representation with arrays instead of
    /// HashMaps, sorted by location so snapshots are stable
    pub fn to_json_friendly(&self) -> GameStateJson {
        let mut buildings: Vec<Building> = self.buildings.values().copied().collect();
        buildings.sort_by_key(|b| b.location);
        let mut roads: Vec<Road> = self.roads.values().copied().collect();
        roads.sort_by_key(|r| r.location);

        GameStateJson {
            players: self.players.clone(),
            current_turn_index: self.current_turn_index,
            phase: self.phase,
            turn_sub_phase: self.turn_sub_phase,
            buildings,
            roads,
            inventories: self.inventories.clone(),
            last_dice_result: self.last_dice_result,
            active_trade: self.active_trade.clone(),
            logs: self.logs.iter().cloned().collect(),
        }
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

/// Wire shape of the game state, broadcast after every successful action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStateJson {
    pub players: Vec<PlayerColor>,
    pub current_turn_index: usize,
    pub phase: GamePhase,
    pub turn_sub_phase: Option<TurnSubPhase>,
    pub buildings: Vec<Building>,
    pub roads: Vec<Road>,
    pub inventories: BTreeMap<PlayerColor, ResourceHand>,
    pub last_dice_result: Option<u8>,
    pub active_trade: Option<TradeOffer>,
    pub logs: Vec<LogEntry>,
}

/// A settlement placement that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementPlan {
    pub owner: PlayerColor,
    pub location: VertexKey,
    /// None while placement is free
    pub cost: Option<ResourceHand>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoadPlan {
    pub owner: PlayerColor,
    pub location: EdgeKey,
    pub cost: Option<ResourceHand>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityPlan {
    pub owner: PlayerColor,
    pub location: VertexKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankTradePlan {
    pub player: PlayerColor,
    pub give: Resource,
    pub get: Resource,
}

/// Both legs of a player trade, checked against current hands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradePlan {
    pub offerer: PlayerColor,
    pub target: PlayerColor,
    pub give: ResourceHand,
    pub get: ResourceHand,
}

/// One game, owned by whoever hosts it
#[derive(Debug, Clone)]
pub struct GameSession {
    pub board: Board,
    pub state: GameState,
    rng: StdRng,
}

impl GameSession {
    /// New game with a random board and dice
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// New game whose board and dice are reproducible from a seed
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(mut rng: StdRng) -> Self {
        let board = Board::generate_with_rng(&mut rng);
        Self {
            board,
            state: GameState::new(),
            rng,
        }
    }

    pub fn snapshot(&self) -> GameStateJson {
        self.state.to_json_friendly()
    }

    /// Log a rejection against the current player and hand the error back
    fn reject(&mut self, error: GameError) -> GameError {
        let player = self.state.current_player();
        self.reject_as(error, player)
    }

    fn reject_as(&mut self, error: GameError, player: PlayerColor) -> GameError {
        debug!(%player, %error, "action rejected");
        self.state.logs.push(error.to_string(), Some(player));
        error
    }

    /// In regular turns, building waits for the dice
    fn require_build_step(&self) -> Result<(), GameError> {
        if self.state.phase == GamePhase::GameLoop
            && self.state.turn_sub_phase != Some(TurnSubPhase::BuildTrade)
        {
            return Err(GameError::MustRollFirst);
        }
        Ok(())
    }

    // ==================== Dispatch ====================

    /// Apply an action on behalf of `actor`.
    ///
    /// Only the current player may act, except when responding to a trade
    /// offer, where the actor is the responder.
    pub fn apply_action(&mut self, actor: PlayerColor, action: GameAction) -> Result<(), GameError> {
        if !action.allowed_out_of_turn() && actor != self.state.current_player() {
            return Err(GameError::NotYourTurn);
        }

        match action {
            GameAction::BuildSettlement { q, r, corner } => self.build_settlement(q, r, corner),
            GameAction::BuildRoad { q, r, edge } => self.build_road(q, r, edge),
            GameAction::BuildCity { q, r, corner } => self.build_city(q, r, corner),
            GameAction::RollDice => self.roll_dice().map(|_| ()),
            GameAction::EndTurn => self.end_turn(),
            GameAction::BankTrade { give, get } => self.bank_trade(give, get),
            GameAction::ProposeTrade { give, get } => self.create_trade_offer(give, get),
            GameAction::RespondToOffer { accept } => self.respond_to_offer(actor, accept),
            GameAction::ConfirmTrade { target } => self.confirm_trade(target),
            GameAction::CancelTrade => self.cancel_trade_offer(),
        }
    }

    // ==================== Settlements ====================

    pub fn build_settlement(&mut self, q: i32, r: i32, corner: u8) -> Result<(), GameError> {
        let plan = self
            .validate_settlement(q, r, corner)
            .map_err(|e| self.reject(e))?;
        self.apply_settlement(plan);
        Ok(())
    }

    pub fn validate_settlement(&self, q: i32, r: i32, corner: u8) -> Result<SettlementPlan, GameError> {
        let state = &self.state;
        self.require_build_step()?;

        if !near_board(q, r) {
            return Err(GameError::OffBoard);
        }
        let location = normalize_vertex(q, r, corner);
        let owner = state.current_player();

        if !self.board.touches_vertex(&location) {
            return Err(GameError::OffBoard);
        }
        if state.buildings.contains_key(&location) {
            return Err(GameError::Occupied);
        }

        match state.phase.initial_quota() {
            Some(quota) if state.building_count(owner) >= quota => {
                return Err(GameError::PlacementQuotaReached);
            }
            None if state.count_of_kind(owner, BuildingKind::Settlement) >= limits::SETTLEMENTS => {
                return Err(GameError::NoSettlementsLeft);
            }
            _ => {}
        }

        if location
            .adjacent_vertices()
            .iter()
            .any(|v| state.buildings.contains_key(v))
        {
            return Err(GameError::TooClose);
        }

        let cost = if state.phase == GamePhase::GameLoop {
            let connected = location
                .incident_edges()
                .iter()
                .any(|e| state.has_road(e, owner));
            if !connected {
                return Err(GameError::SettlementNotConnected);
            }

            let cost = costs::settlement();
            if !state.inventory(owner).can_afford(&cost) {
                return Err(GameError::CannotAfford);
            }
            Some(cost)
        } else {
            None
        };

        Ok(SettlementPlan {
            owner,
            location,
            cost,
        })
    }

    fn apply_settlement(&mut self, plan: SettlementPlan) {
        if let Some(cost) = plan.cost {
            let paid = self.state.inventory_mut(plan.owner).try_subtract(&cost);
            debug_assert!(paid, "settlement cost was validated");
        }

        self.state.buildings.insert(
            plan.location,
            Building {
                owner: plan.owner,
                kind: BuildingKind::Settlement,
                location: plan.location,
            },
        );

        let VertexKey { q, r, corner } = plan.location;
        self.state
            .logs
            .push(format!("built a settlement at {q},{r},{corner}"), Some(plan.owner));

        self.advance_initial_turn();
    }

    // ==================== Roads ====================

    pub fn build_road(&mut self, q: i32, r: i32, side: u8) -> Result<(), GameError> {
        let plan = self.validate_road(q, r, side).map_err(|e| self.reject(e))?;
        self.apply_road(plan);
        Ok(())
    }

    pub fn validate_road(&self, q: i32, r: i32, side: u8) -> Result<RoadPlan, GameError> {
        let state = &self.state;
        self.require_build_step()?;

        if !near_board(q, r) {
            return Err(GameError::OffBoard);
        }
        let location = normalize_edge(q, r, side);
        let owner = state.current_player();

        if !self.board.touches_edge(&location) {
            return Err(GameError::OffBoard);
        }
        if state.roads.contains_key(&location) {
            return Err(GameError::Occupied);
        }

        match state.phase.initial_quota() {
            Some(quota) => {
                if state.road_count(owner) >= quota {
                    return Err(GameError::PlacementQuotaReached);
                }
                if state.building_count(owner) < quota {
                    return Err(GameError::SettlementFirst);
                }
            }
            None => {
                if state.road_count(owner) >= limits::ROADS {
                    return Err(GameError::NoRoadsLeft);
                }
            }
        }

        let connected = location
            .endpoints()
            .iter()
            .any(|v| state.connects_at(v, &location, owner));
        if !connected {
            return Err(GameError::RoadNotConnected);
        }

        let cost = if state.phase == GamePhase::GameLoop {
            let cost = costs::road();
            if !state.inventory(owner).can_afford(&cost) {
                return Err(GameError::CannotAfford);
            }
            Some(cost)
        } else {
            None
        };

        Ok(RoadPlan {
            owner,
            location,
            cost,
        })
    }

    fn apply_road(&mut self, plan: RoadPlan) {
        if let Some(cost) = plan.cost {
            let paid = self.state.inventory_mut(plan.owner).try_subtract(&cost);
            debug_assert!(paid, "road cost was validated");
        }

        self.state.roads.insert(
            plan.location,
            Road {
                owner: plan.owner,
                location: plan.location,
            },
        );

        let EdgeKey { q, r, side } = plan.location;
        self.state
            .logs
            .push(format!("built a road at {q},{r},{side}"), Some(plan.owner));

        self.advance_initial_turn();
    }

    // ==================== Cities ====================

    pub fn build_city(&mut self, q: i32, r: i32, corner: u8) -> Result<(), GameError> {
        let plan = self.validate_city(q, r, corner).map_err(|e| self.reject(e))?;
        self.apply_city(plan);
        Ok(())
    }

    pub fn validate_city(&self, q: i32, r: i32, corner: u8) -> Result<CityPlan, GameError> {
        let state = &self.state;
        if state.phase != GamePhase::GameLoop {
            return Err(GameError::WrongPhase);
        }
        self.require_build_step()?;

        if !near_board(q, r) {
            return Err(GameError::NoBuilding);
        }
        let location = normalize_vertex(q, r, corner);
        let owner = state.current_player();

        let building = state.building_at(&location).ok_or(GameError::NoBuilding)?;
        if building.owner != owner {
            return Err(GameError::NotYourBuilding);
        }
        if building.kind != BuildingKind::Settlement {
            return Err(GameError::NotASettlement);
        }
        if state.count_of_kind(owner, BuildingKind::City) >= limits::CITIES {
            return Err(GameError::MaxCities);
        }
        if !state.inventory(owner).can_afford(&costs::city()) {
            return Err(GameError::CannotAfford);
        }

        Ok(CityPlan { owner, location })
    }

    fn apply_city(&mut self, plan: CityPlan) {
        let paid = self
            .state
            .inventory_mut(plan.owner)
            .try_subtract(&costs::city());
        debug_assert!(paid, "city cost was validated");

        if let Some(building) = self.state.buildings.get_mut(&plan.location) {
            building.kind = BuildingKind::City;
        }

        let VertexKey { q, r, corner } = plan.location;
        self.state
            .logs
            .push(format!("upgraded to a city at {q},{r},{corner}"), Some(plan.owner));
    }

    // ==================== Dice ====================

    /// Roll two dice for the current player and distribute production
    pub fn roll_dice(&mut self) -> Result<u8, GameError> {
        self.validate_roll().map_err(|e| self.reject(e))?;
        let die1: u8 = self.rng.gen_range(1..=6);
        let die2: u8 = self.rng.gen_range(1..=6);
        Ok(self.resolve_roll(die1 + die2))
    }

    /// Same as [`roll_dice`](Self::roll_dice) with the dice faces given.
    /// Faces outside 1-6 are clamped into range.
    pub fn apply_roll(&mut self, die1: u8, die2: u8) -> Result<u8, GameError> {
        self.validate_roll().map_err(|e| self.reject(e))?;
        Ok(self.resolve_roll(die1.clamp(1, 6) + die2.clamp(1, 6)))
    }

    pub fn validate_roll(&self) -> Result<(), GameError> {
        if self.state.phase != GamePhase::GameLoop {
            return Err(GameError::WrongPhase);
        }
        if self.state.turn_sub_phase != Some(TurnSubPhase::RollDice) {
            return Err(GameError::AlreadyRolled);
        }
        Ok(())
    }

    /// Grants for a dice total as `(owner, resource, amount)`, one per
    /// building on a matching cell
    pub fn production_for(&self, total: u8) -> Vec<(PlayerColor, Resource, u32)> {
        if total == ROBBER_ROLL {
            return Vec::new();
        }

        let mut grants = Vec::new();
        for cell in self.board.cells_with_number(total) {
            let Some(resource) = cell.resource() else {
                continue;
            };
            for corner in cell.corners() {
                if let Some(building) = self.state.building_at(&corner) {
                    grants.push((building.owner, resource, building.kind.yield_per_roll()));
                }
            }
        }
        grants
    }

    fn resolve_roll(&mut self, total: u8) -> u8 {
        let player = self.state.current_player();
        self.state.last_dice_result = Some(total);
        self.state.logs.push(format!("rolled {total}"), Some(player));

        if total == ROBBER_ROLL {
            debug!(%player, "rolled the robber number, nothing produced");
        }

        for (owner, resource, amount) in self.production_for(total) {
            self.state.inventory_mut(owner).add(resource, amount);
            self.state
                .logs
                .push(format!("got {amount} {resource}"), Some(owner));
            debug!(%owner, %resource, amount, total, "distributed resources");
        }

        self.state.turn_sub_phase = Some(TurnSubPhase::BuildTrade);
        total
    }

    // ==================== Turns ====================

    pub fn end_turn(&mut self) -> Result<(), GameError> {
        self.validate_end_turn().map_err(|e| self.reject(e))?;
        self.apply_end_turn();
        Ok(())
    }

    pub fn validate_end_turn(&self) -> Result<(), GameError> {
        if self.state.phase != GamePhase::GameLoop {
            return Err(GameError::WrongPhase);
        }
        if self.state.turn_sub_phase != Some(TurnSubPhase::BuildTrade) {
            return Err(GameError::MustRollFirst);
        }
        Ok(())
    }

    fn apply_end_turn(&mut self) {
        let state = &mut self.state;
        let finished = state.current_player();
        state.current_turn_index = (state.current_turn_index + 1) % state.players.len();
        state.turn_sub_phase = Some(TurnSubPhase::RollDice);
        state.last_dice_result = None;
        state.logs.push("ended their turn", Some(finished));
        debug!(next = %state.current_player(), "turn advanced");
    }

    /// Close the current player's placement turn once the round's quota is met
    fn advance_initial_turn(&mut self) {
        let state = &mut self.state;
        let Some(quota) = state.phase.initial_quota() else {
            return;
        };
        let player = state.current_player();
        if state.building_count(player) < quota || state.road_count(player) < quota {
            return;
        }

        // Snake draft: forward through the seats, then back
        let last = state.players.len() - 1;
        match state.phase {
            GamePhase::InitialPlacement1 => {
                if state.current_turn_index < last {
                    state.current_turn_index += 1;
                } else {
                    state.phase = GamePhase::InitialPlacement2;
                }
            }
            GamePhase::InitialPlacement2 => {
                if state.current_turn_index > 0 {
                    state.current_turn_index -= 1;
                } else {
                    state.phase = GamePhase::GameLoop;
                    state.current_turn_index = 0;
                    state.turn_sub_phase = Some(TurnSubPhase::RollDice);
                }
            }
            GamePhase::GameLoop => {}
        }

        debug!(
            phase = ?state.phase,
            next = %state.current_player(),
            "placement turn complete"
        );
    }

    // ==================== Bank ====================

    pub fn bank_trade(&mut self, give: Resource, get: Resource) -> Result<(), GameError> {
        let plan = self.validate_bank_trade(give, get).map_err(|e| self.reject(e))?;
        self.apply_bank_trade(plan);
        Ok(())
    }

    pub fn validate_bank_trade(&self, give: Resource, get: Resource) -> Result<BankTradePlan, GameError> {
        if self.state.phase != GamePhase::GameLoop {
            return Err(GameError::WrongPhase);
        }
        let player = self.state.current_player();
        if self.state.inventory(player).get(give) < costs::BANK_TRADE_RATE {
            return Err(GameError::NotEnoughToTrade(give));
        }
        Ok(BankTradePlan { player, give, get })
    }

    fn apply_bank_trade(&mut self, plan: BankTradePlan) {
        let hand = self.state.inventory_mut(plan.player);
        let paid = hand.try_subtract(&ResourceHand::single(plan.give, costs::BANK_TRADE_RATE));
        debug_assert!(paid, "bank trade was validated");
        hand.add(plan.get, 1);

        self.state.logs.push(
            format!(
                "traded {} {} for 1 {}",
                costs::BANK_TRADE_RATE,
                plan.give,
                plan.get
            ),
            Some(plan.player),
        );
    }

    // ==================== Player Trades ====================

    /// Put up an offer from the current player, replacing any open one
    pub fn create_trade_offer(&mut self, give: ResourceHand, get: ResourceHand) -> Result<(), GameError> {
        let offer = self
            .validate_trade_offer(give, get)
            .map_err(|e| self.reject(e))?;
        let offerer = offer.offerer;
        self.state.active_trade = Some(offer);
        self.state.logs.push("proposes a trade...", Some(offerer));
        Ok(())
    }

    pub fn validate_trade_offer(&self, give: ResourceHand, get: ResourceHand) -> Result<TradeOffer, GameError> {
        if self.state.phase != GamePhase::GameLoop {
            return Err(GameError::WrongPhase);
        }
        let offerer = self.state.current_player();
        let offer = TradeOffer::new(offerer, give, get);
        if !offer.is_valid() {
            return Err(GameError::InvalidTrade);
        }
        if let Some(short) = self.state.inventory(offerer).first_shortfall(&give) {
            return Err(GameError::OfferShort(short));
        }
        Ok(offer)
    }

    /// Record `responder`'s answer to the open offer. Accepting requires
    /// holding what the offerer asks for; nothing moves yet.
    pub fn respond_to_offer(&mut self, responder: PlayerColor, accept: bool) -> Result<(), GameError> {
        self.validate_response(responder, accept)
            .map_err(|e| self.reject_as(e, responder))?;

        let Some(trade) = self.state.active_trade.as_mut() else {
            return Ok(());
        };
        if !accept {
            self.state.logs.push("declined the offer", Some(responder));
        } else if trade.record_acceptance(responder) {
            self.state.logs.push("accepted the offer", Some(responder));
        }
        Ok(())
    }

    pub fn validate_response(&self, responder: PlayerColor, accept: bool) -> Result<(), GameError> {
        let trade = self
            .state
            .active_trade
            .as_ref()
            .ok_or(GameError::NoActiveTrade)?;
        if responder == trade.offerer {
            return Err(GameError::InvalidTrade);
        }
        if accept && !self.state.inventory(responder).can_afford(&trade.get) {
            return Err(GameError::CannotAfford);
        }
        Ok(())
    }

    /// Execute the open offer between the offerer and `target`. Only the
    /// offerer may confirm, on their own turn, and only with a player who
    /// accepted.
    ///
    /// Both hands are checked again here since they may have changed since
    /// the offer was made. Either both legs happen or neither does.
    pub fn confirm_trade(&mut self, target: PlayerColor) -> Result<(), GameError> {
        let plan = self.validate_confirm(target).map_err(|e| self.reject(e))?;
        self.apply_trade(plan);
        Ok(())
    }

    pub fn validate_confirm(&self, target: PlayerColor) -> Result<TradePlan, GameError> {
        let trade = self
            .state
            .active_trade
            .as_ref()
            .ok_or(GameError::NoActiveTrade)?;
        if trade.offerer != self.state.current_player() {
            return Err(GameError::NotOfferer);
        }
        if target == trade.offerer {
            return Err(GameError::InvalidTrade);
        }
        if !trade.responses.contains(&target) {
            return Err(GameError::NotAccepted);
        }
        if !self.state.inventory(trade.offerer).can_afford(&trade.give)
            || !self.state.inventory(target).can_afford(&trade.get)
        {
            return Err(GameError::CannotAfford);
        }
        Ok(TradePlan {
            offerer: trade.offerer,
            target,
            give: trade.give,
            get: trade.get,
        })
    }

    fn apply_trade(&mut self, plan: TradePlan) {
        let offerer = self.state.inventory_mut(plan.offerer);
        let paid = offerer.try_subtract(&plan.give);
        debug_assert!(paid, "offerer side was validated");
        offerer.add_hand(&plan.get);

        let target = self.state.inventory_mut(plan.target);
        let paid = target.try_subtract(&plan.get);
        debug_assert!(paid, "target side was validated");
        target.add_hand(&plan.give);

        self.state.active_trade = None;
        self.state.logs.push(
            format!("Trade completed with {}", plan.target),
            Some(plan.offerer),
        );
    }

    /// Withdraw the open offer. Only its offerer may, on their own turn.
    pub fn cancel_trade_offer(&mut self) -> Result<(), GameError> {
        self.validate_cancel().map_err(|e| self.reject(e))?;
        let player = self.state.current_player();
        self.state.active_trade = None;
        self.state.logs.push("Trade offer cancelled", Some(player));
        Ok(())
    }

    pub fn validate_cancel(&self) -> Result<(), GameError> {
        let trade = self
            .state
            .active_trade
            .as_ref()
            .ok_or(GameError::NoActiveTrade)?;
        if trade.offerer != self.state.current_player() {
            return Err(GameError::NotOfferer);
        }
        Ok(())
    }
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Cells whose top corners host the opening settlements, in draft order.
    /// Top corners of distinct cells are never adjacent.
    const OPENING_CELLS: [(i32, i32); 8] = [
        (0, 0),
        (1, -1),
        (-1, 1),
        (2, -2),
        (-2, 2),
        (0, 2),
        (1, 1),
        (-1, -1),
    ];

    fn place_opening(session: &mut GameSession, (q, r): (i32, i32)) {
        session.build_settlement(q, r, 0).unwrap();
        session.build_road(q, r, 0).unwrap();
    }

    fn session_in_game_loop() -> GameSession {
        let mut session = GameSession::with_seed(42);
        for cell in OPENING_CELLS {
            place_opening(&mut session, cell);
        }
        assert_eq!(session.state.phase, GamePhase::GameLoop);
        session
    }

    fn give(session: &mut GameSession, player: PlayerColor, hand: ResourceHand) {
        session.state.inventories.insert(player, hand);
    }

    #[test]
    fn test_new_game_starts_in_first_placement() {
        let session = GameSession::with_seed(1);
        assert_eq!(session.state.phase, GamePhase::InitialPlacement1);
        assert_eq!(session.state.current_player(), PlayerColor::Red);
        assert_eq!(session.state.turn_sub_phase, None);
        assert_eq!(session.state.total_resources(), 0);
    }

    #[test]
    fn test_same_vertex_twice_is_occupied() {
        let mut session = GameSession::with_seed(1);
        session.build_settlement(0, 0, 0).unwrap();

        // Another spelling of the same corner
        let err = session.build_settlement(0, -1, 2).unwrap_err();
        assert_eq!(err, GameError::Occupied);
        assert_eq!(session.state.buildings.len(), 1);
    }

    #[test]
    fn test_adjacent_vertex_is_too_close() {
        let mut session = GameSession::with_seed(1);
        place_opening(&mut session, (0, 0));

        let neighbor = VertexKey::new(0, 0, 0).adjacent_vertices()[0];
        let err = session
            .build_settlement(neighbor.q, neighbor.r, neighbor.corner)
            .unwrap_err();
        assert_eq!(err, GameError::TooClose);
        assert_eq!(
            session.state.logs.last().unwrap().message,
            "Too close to another building!"
        );
        assert_eq!(session.state.logs.last().unwrap().player_color, Some(PlayerColor::Blue));
    }

    #[test]
    fn test_one_settlement_per_placement_turn() {
        let mut session = GameSession::with_seed(1);
        session.build_settlement(0, 0, 0).unwrap();
        let err = session.build_settlement(2, -2, 0).unwrap_err();
        assert_eq!(err, GameError::PlacementQuotaReached);
    }

    #[test]
    fn test_road_before_settlement_is_refused() {
        let mut session = GameSession::with_seed(1);
        let err = session.build_road(0, 0, 0).unwrap_err();
        assert_eq!(err, GameError::SettlementFirst);
        assert!(session.state.roads.is_empty());
    }

    #[test]
    fn test_opening_road_must_touch_own_settlement() {
        let mut session = GameSession::with_seed(1);
        session.build_settlement(0, 0, 0).unwrap();
        let err = session.build_road(1, 1, 2).unwrap_err();
        assert_eq!(err, GameError::RoadNotConnected);
        assert_eq!(session.state.current_turn_index, 0);
    }

    #[test]
    fn test_off_board_spots_are_refused() {
        let mut session = GameSession::with_seed(1);
        assert_eq!(
            session.build_settlement(5, 5, 0).unwrap_err(),
            GameError::OffBoard
        );
    }

    #[test]
    fn test_far_coordinates_are_refused() {
        let mut session = GameSession::with_seed(1);
        assert_eq!(
            session.apply_action(
                PlayerColor::Red,
                GameAction::BuildSettlement { q: i32::MAX, r: 0, corner: 1 }
            ),
            Err(GameError::OffBoard)
        );
        assert_eq!(
            session.apply_action(
                PlayerColor::Red,
                GameAction::BuildRoad { q: i32::MIN, r: i32::MAX, edge: 4 }
            ),
            Err(GameError::OffBoard)
        );
        assert!(session.state.buildings.is_empty());

        let mut session = session_in_game_loop();
        session.apply_roll(3, 4).unwrap();
        assert_eq!(session.build_city(0, i32::MAX, 5), Err(GameError::NoBuilding));
    }

    #[test]
    fn test_snake_draft_order() {
        let mut session = GameSession::with_seed(3);
        let mut seen = Vec::new();

        for (i, cell) in OPENING_CELLS.into_iter().enumerate() {
            seen.push(session.state.current_turn_index);
            place_opening(&mut session, cell);

            if i == 3 {
                assert_eq!(session.state.phase, GamePhase::InitialPlacement2);
                assert_eq!(session.state.current_turn_index, 3);
            }
        }

        assert_eq!(seen, vec![0, 1, 2, 3, 3, 2, 1, 0]);
        assert_eq!(session.state.phase, GamePhase::GameLoop);
        assert_eq!(session.state.current_turn_index, 0);
        assert_eq!(session.state.turn_sub_phase, Some(TurnSubPhase::RollDice));
    }

    #[test]
    fn test_building_waits_for_dice() {
        let mut session = session_in_game_loop();
        give(&mut session, PlayerColor::Red, ResourceHand::with_amounts(5, 5, 5, 5, 5));
        let err = session.build_road(0, 0, 1).unwrap_err();
        assert_eq!(err, GameError::MustRollFirst);
    }

    #[test]
    fn test_rolling_seven_distributes_nothing() {
        let mut session = session_in_game_loop();
        let before = session.state.inventories.clone();

        assert_eq!(session.apply_roll(3, 4), Ok(7));
        assert_eq!(session.state.inventories, before);
        assert_eq!(session.state.last_dice_result, Some(7));
        assert_eq!(session.state.turn_sub_phase, Some(TurnSubPhase::BuildTrade));
    }

    #[test]
    fn test_roll_grants_per_building() {
        let mut session = session_in_game_loop();
        let number = session
            .board
            .cells
            .iter()
            .filter_map(|c| c.number)
            .find(|&n| !session.production_for(n).is_empty())
            .unwrap();

        // Count matching cells around each building through its aliases
        let mut expected: BTreeMap<PlayerColor, u32> = BTreeMap::new();
        for building in session.state.buildings.values() {
            for alias in building.location.aliases() {
                let matches = session
                    .board
                    .get_cell(&alias.hex())
                    .is_some_and(|c| c.number == Some(number));
                if matches {
                    *expected.entry(building.owner).or_default() += 1;
                }
            }
        }

        let (die1, die2) = if number > 6 { (6, number - 6) } else { (1, number - 1) };
        assert_eq!(session.apply_roll(die1, die2), Ok(number));

        for player in PlayerColor::ALL {
            assert_eq!(
                session.state.inventory(player).total(),
                expected.get(&player).copied().unwrap_or(0),
                "{player}"
            );
        }
    }

    #[test]
    fn test_city_doubles_production() {
        let mut session = session_in_game_loop();
        let cell = session
            .board
            .cells
            .iter()
            .find(|c| c.number.is_some())
            .cloned()
            .unwrap();
        let corner = cell.corners()[3];
        session.state.buildings.insert(
            corner,
            Building {
                owner: PlayerColor::Orange,
                kind: BuildingKind::City,
                location: corner,
            },
        );

        let grants = session.production_for(cell.number.unwrap());
        assert!(grants.contains(&(PlayerColor::Orange, cell.resource().unwrap(), 2)));
    }

    #[test]
    fn test_second_roll_in_a_turn_is_refused() {
        let mut session = session_in_game_loop();
        session.apply_roll(1, 1).unwrap();
        assert_eq!(session.roll_dice(), Err(GameError::AlreadyRolled));
    }

    #[test]
    fn test_dice_faces_are_clamped() {
        let mut session = session_in_game_loop();
        assert_eq!(session.apply_roll(200, 100), Ok(12));
        assert_eq!(session.state.last_dice_result, Some(12));
    }

    #[test]
    fn test_end_turn_advances_and_resets() {
        let mut session = session_in_game_loop();
        session.apply_roll(2, 2).unwrap();
        session.end_turn().unwrap();

        assert_eq!(session.state.current_player(), PlayerColor::Blue);
        assert_eq!(session.state.turn_sub_phase, Some(TurnSubPhase::RollDice));
        assert_eq!(session.state.last_dice_result, None);
    }

    #[test]
    fn test_city_upgrade_failures() {
        let mut session = session_in_game_loop();
        session.apply_roll(3, 4).unwrap();

        // Nothing there
        assert_eq!(session.build_city(0, 2, 3), Err(GameError::NoBuilding));

        // Blue's opening settlement
        assert_eq!(session.build_city(1, -1, 0), Err(GameError::NotYourBuilding));

        // Own settlement, one ore short
        let hand = ResourceHand::with_amounts(0, 0, 0, 2, 2);
        give(&mut session, PlayerColor::Red, hand);
        assert_eq!(session.build_city(0, 0, 0), Err(GameError::CannotAfford));
        assert_eq!(session.state.inventory(PlayerColor::Red), hand);
        assert_eq!(
            session.state.building_at(&VertexKey::new(0, 0, 0)).unwrap().kind,
            BuildingKind::Settlement
        );
    }

    #[test]
    fn test_city_upgrade_in_place() {
        let mut session = session_in_game_loop();
        session.apply_roll(3, 4).unwrap();
        give(&mut session, PlayerColor::Red, ResourceHand::with_amounts(0, 0, 0, 2, 3));

        session.build_city(0, 0, 0).unwrap();
        let building = session.state.building_at(&VertexKey::new(0, 0, 0)).unwrap();
        assert_eq!(building.kind, BuildingKind::City);
        assert_eq!(session.state.buildings.len(), 8);
        assert!(session.state.inventory(PlayerColor::Red).is_empty());

        assert_eq!(session.build_city(0, 0, 0), Err(GameError::NotASettlement));
    }

    #[test]
    fn test_city_needs_game_loop() {
        let mut session = GameSession::with_seed(1);
        session.build_settlement(0, 0, 0).unwrap();
        assert_eq!(session.build_city(0, 0, 0), Err(GameError::WrongPhase));
    }

    #[test]
    fn test_game_loop_road_must_connect_and_costs() {
        let mut session = session_in_game_loop();
        session.apply_roll(3, 4).unwrap();

        // Red owns the top of (0,0) and side 0 of (0,0)
        assert_eq!(session.build_road(0, 0, 1), Err(GameError::CannotAfford));

        give(&mut session, PlayerColor::Red, ResourceHand::with_amounts(2, 2, 0, 0, 0));
        assert_eq!(session.build_road(0, 2, 3), Err(GameError::RoadNotConnected));

        session.build_road(0, 0, 1).unwrap();
        assert_eq!(
            session.state.inventory(PlayerColor::Red),
            ResourceHand::with_amounts(1, 1, 0, 0, 0)
        );
        assert_eq!(session.state.road_count(PlayerColor::Red), 3);
    }

    #[test]
    fn test_game_loop_settlement_needs_own_road() {
        let mut session = session_in_game_loop();
        session.apply_roll(3, 4).unwrap();
        give(&mut session, PlayerColor::Red, ResourceHand::with_amounts(2, 2, 1, 1, 0));

        // Corner 2 of (0,0) is two steps from Red's settlement but off its roads
        assert_eq!(
            session.build_settlement(0, 0, 2),
            Err(GameError::SettlementNotConnected)
        );

        session.build_road(0, 0, 1).unwrap();
        session.build_settlement(0, 0, 2).unwrap();
        assert!(session.state.inventory(PlayerColor::Red).is_empty());
        assert_eq!(
            session.state.count_of_kind(PlayerColor::Red, BuildingKind::Settlement),
            3
        );
    }

    #[test]
    fn test_settlement_cap() {
        let mut session = session_in_game_loop();
        session.apply_roll(3, 4).unwrap();
        give(&mut session, PlayerColor::Red, ResourceHand::with_amounts(2, 2, 1, 1, 0));
        session.build_road(0, 0, 1).unwrap();

        for q in 10..13 {
            let location = VertexKey::raw(q, 0, 0);
            session.state.buildings.insert(
                location,
                Building { owner: PlayerColor::Red, kind: BuildingKind::Settlement, location },
            );
        }
        assert_eq!(
            session.state.count_of_kind(PlayerColor::Red, BuildingKind::Settlement),
            limits::SETTLEMENTS
        );

        let before = session.state.buildings.len();
        assert_eq!(
            session.build_settlement(0, 0, 2),
            Err(GameError::NoSettlementsLeft)
        );
        assert_eq!(session.state.buildings.len(), before);
        assert_eq!(
            session.state.inventory(PlayerColor::Red),
            ResourceHand::with_amounts(1, 1, 1, 1, 0)
        );
    }

    #[test]
    fn test_road_cap() {
        let mut session = session_in_game_loop();
        session.apply_roll(3, 4).unwrap();
        let hand = ResourceHand::with_amounts(1, 1, 0, 0, 0);
        give(&mut session, PlayerColor::Red, hand);

        for q in 10..23 {
            let location = EdgeKey::raw(q, 0, 0);
            session
                .state
                .roads
                .insert(location, Road { owner: PlayerColor::Red, location });
        }
        assert_eq!(session.state.road_count(PlayerColor::Red), limits::ROADS);

        assert_eq!(session.build_road(0, 0, 1), Err(GameError::NoRoadsLeft));
        assert_eq!(session.state.road_count(PlayerColor::Red), limits::ROADS);
        assert!(!session.state.roads.contains_key(&EdgeKey::new(0, 0, 1)));
        assert_eq!(session.state.inventory(PlayerColor::Red), hand);
    }

    #[test]
    fn test_city_cap() {
        let mut session = session_in_game_loop();
        session.apply_roll(3, 4).unwrap();
        let hand = ResourceHand::with_amounts(0, 0, 0, 2, 3);
        give(&mut session, PlayerColor::Red, hand);

        for q in 10..14 {
            let location = VertexKey::raw(q, 0, 0);
            session.state.buildings.insert(
                location,
                Building { owner: PlayerColor::Red, kind: BuildingKind::City, location },
            );
        }

        assert_eq!(session.build_city(0, 0, 0), Err(GameError::MaxCities));
        assert_eq!(
            session.state.building_at(&VertexKey::new(0, 0, 0)).unwrap().kind,
            BuildingKind::Settlement
        );
        assert_eq!(
            session.state.count_of_kind(PlayerColor::Red, BuildingKind::City),
            limits::CITIES
        );
        assert_eq!(session.state.inventory(PlayerColor::Red), hand);
    }

    #[test]
    fn test_bank_trade() {
        let mut session = session_in_game_loop();
        give(&mut session, PlayerColor::Red, ResourceHand::single(Resource::Wool, 3));
        assert_eq!(
            session.bank_trade(Resource::Wool, Resource::Ore),
            Err(GameError::NotEnoughToTrade(Resource::Wool))
        );
        assert_eq!(
            session.state.logs.last().unwrap().message,
            "Not enough wool to trade (need 4)"
        );

        give(&mut session, PlayerColor::Red, ResourceHand::single(Resource::Wool, 5));
        session.bank_trade(Resource::Wool, Resource::Ore).unwrap();
        let hand = session.state.inventory(PlayerColor::Red);
        assert_eq!(hand.wool, 1);
        assert_eq!(hand.ore, 1);
        assert_eq!(hand.total(), 2);
    }

    #[test]
    fn test_bank_trade_needs_game_loop() {
        let mut session = GameSession::with_seed(1);
        give(&mut session, PlayerColor::Red, ResourceHand::single(Resource::Wool, 4));
        assert_eq!(
            session.bank_trade(Resource::Wool, Resource::Ore),
            Err(GameError::WrongPhase)
        );
    }

    #[test]
    fn test_trade_protocol() {
        let mut session = session_in_game_loop();
        give(&mut session, PlayerColor::Red, ResourceHand::single(Resource::Brick, 2));
        give(&mut session, PlayerColor::Blue, ResourceHand::single(Resource::Ore, 1));

        let offer_give = ResourceHand::single(Resource::Brick, 2);
        let offer_get = ResourceHand::single(Resource::Ore, 1);
        session.create_trade_offer(offer_give, offer_get).unwrap();

        // Orange holds no ore
        assert_eq!(
            session.respond_to_offer(PlayerColor::Orange, true),
            Err(GameError::CannotAfford)
        );
        session.respond_to_offer(PlayerColor::Blue, true).unwrap();
        session.respond_to_offer(PlayerColor::Blue, true).unwrap();
        assert_eq!(
            session.state.active_trade.as_ref().unwrap().responses,
            vec![PlayerColor::Blue]
        );

        let before = session.state.total_resources();
        session.confirm_trade(PlayerColor::Blue).unwrap();
        assert_eq!(session.state.total_resources(), before);
        assert_eq!(session.state.inventory(PlayerColor::Red), offer_get);
        assert_eq!(session.state.inventory(PlayerColor::Blue), offer_give);
        assert!(session.state.active_trade.is_none());
    }

    #[test]
    fn test_confirm_is_all_or_nothing() {
        let mut session = session_in_game_loop();
        give(&mut session, PlayerColor::Red, ResourceHand::single(Resource::Brick, 2));
        give(&mut session, PlayerColor::Blue, ResourceHand::single(Resource::Ore, 1));
        session
            .create_trade_offer(
                ResourceHand::single(Resource::Brick, 2),
                ResourceHand::single(Resource::Ore, 1),
            )
            .unwrap();
        session.respond_to_offer(PlayerColor::Blue, true).unwrap();

        // Blue spends the ore before confirmation
        give(&mut session, PlayerColor::Blue, ResourceHand::new());
        assert_eq!(
            session.confirm_trade(PlayerColor::Blue),
            Err(GameError::CannotAfford)
        );
        assert_eq!(
            session.state.inventory(PlayerColor::Red),
            ResourceHand::single(Resource::Brick, 2)
        );
        assert!(session.state.inventory(PlayerColor::Blue).is_empty());
        assert!(session.state.active_trade.is_some());
    }

    #[test]
    fn test_offer_requires_holding_give() {
        let mut session = session_in_game_loop();
        assert_eq!(
            session.create_trade_offer(
                ResourceHand::single(Resource::Grain, 1),
                ResourceHand::single(Resource::Ore, 1)
            ),
            Err(GameError::OfferShort(Resource::Grain))
        );
        assert!(session.state.active_trade.is_none());
    }

    #[test]
    fn test_new_offer_replaces_old_one() {
        let mut session = session_in_game_loop();
        give(&mut session, PlayerColor::Red, ResourceHand::with_amounts(1, 1, 0, 0, 0));
        session
            .create_trade_offer(
                ResourceHand::single(Resource::Brick, 1),
                ResourceHand::single(Resource::Ore, 1),
            )
            .unwrap();
        session
            .create_trade_offer(
                ResourceHand::single(Resource::Lumber, 1),
                ResourceHand::single(Resource::Wool, 1),
            )
            .unwrap();

        let trade = session.state.active_trade.as_ref().unwrap();
        assert_eq!(trade.give, ResourceHand::single(Resource::Lumber, 1));
        assert!(trade.responses.is_empty());
    }

    #[test]
    fn test_only_offerer_cancels() {
        let mut session = session_in_game_loop();
        assert_eq!(session.cancel_trade_offer(), Err(GameError::NoActiveTrade));

        give(&mut session, PlayerColor::Red, ResourceHand::single(Resource::Brick, 1));
        session
            .create_trade_offer(
                ResourceHand::single(Resource::Brick, 1),
                ResourceHand::single(Resource::Ore, 1),
            )
            .unwrap();

        session.apply_roll(3, 4).unwrap();
        session.end_turn().unwrap();

        // The offer outlives Red's turn, and Blue cannot withdraw it
        assert_eq!(session.cancel_trade_offer(), Err(GameError::NotOfferer));
        assert!(session.state.active_trade.is_some());
    }

    #[test]
    fn test_only_offerer_confirms() {
        let mut session = session_in_game_loop();
        let red_hand = ResourceHand::single(Resource::Brick, 1);
        let white_hand = ResourceHand::single(Resource::Ore, 1);
        give(&mut session, PlayerColor::Red, red_hand);
        give(&mut session, PlayerColor::White, white_hand);
        session.create_trade_offer(red_hand, white_hand).unwrap();
        session.respond_to_offer(PlayerColor::White, true).unwrap();

        session.apply_roll(3, 4).unwrap();
        session.end_turn().unwrap();

        // Blue holds the turn but the offer is Red's
        assert_eq!(
            session.apply_action(
                PlayerColor::Blue,
                GameAction::ConfirmTrade { target: PlayerColor::White }
            ),
            Err(GameError::NotOfferer)
        );
        assert_eq!(session.state.inventory(PlayerColor::Red), red_hand);
        assert_eq!(session.state.inventory(PlayerColor::White), white_hand);
        assert!(session.state.active_trade.is_some());
    }

    #[test]
    fn test_apply_action_enforces_turn() {
        let mut session = GameSession::with_seed(1);
        let action = GameAction::BuildSettlement { q: 0, r: 0, corner: 0 };
        assert_eq!(
            session.apply_action(PlayerColor::Blue, action.clone()),
            Err(GameError::NotYourTurn)
        );
        session.apply_action(PlayerColor::Red, action).unwrap();
        assert_eq!(session.state.building_count(PlayerColor::Red), 1);
    }

    #[test]
    fn test_snapshot_wire_shape() {
        let mut session = GameSession::with_seed(1);
        place_opening(&mut session, (0, 0));

        let json = serde_json::to_value(session.snapshot()).unwrap();
        assert_eq!(json["phase"], "INITIAL_PLACEMENT_1");
        assert_eq!(json["current_turn_index"], 1);
        assert!(json["turn_sub_phase"].is_null());
        assert_eq!(json["buildings"][0]["type"], "settlement");
        assert_eq!(json["buildings"][0]["owner"], "red");
        assert_eq!(
            json["buildings"][0]["location"],
            serde_json::json!({"q": 0, "r": -1, "corner": 2})
        );
        assert_eq!(
            json["roads"][0]["location"],
            serde_json::json!({"q": 0, "r": 0, "edge": 0})
        );
        assert_eq!(json["inventories"]["white"]["ore"], 0);
        assert!(json["active_trade"].is_null());
        assert_eq!(json["logs"].as_array().unwrap().len(), 2);
    }
}
