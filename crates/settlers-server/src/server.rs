//! WebSocket server and connection handling.

use crate::config::ServerConfig;
use crate::protocol::{ClientMessage, RoomInfo, RoomStatus, ServerMessage};
use crate::room::GameRoom;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use settlers_core::GameSession;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Server state shared across all connections.
pub struct ServerState {
    /// All active rooms
    pub rooms: DashMap<Uuid, GameRoom>,
    /// Mapping from player ID to their room ID
    pub player_rooms: DashMap<Uuid, Uuid>,
    /// Mapping from player ID to their message sender
    pub player_senders: DashMap<Uuid, mpsc::UnboundedSender<ServerMessage>>,
    game_seed: Option<u64>,
    rooms_created: AtomicU64,
}

impl ServerState {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            rooms: DashMap::new(),
            player_rooms: DashMap::new(),
            player_senders: DashMap::new(),
            game_seed: config.game_seed,
            rooms_created: AtomicU64::new(0),
        }
    }

    /// A fresh game for the next room, seeded when a base seed is configured
    fn new_session(&self) -> GameSession {
        let ordinal = self.rooms_created.fetch_add(1, Ordering::Relaxed);
        match self.game_seed {
            Some(seed) => GameSession::with_seed(seed.wrapping_add(ordinal)),
            None => GameSession::new(),
        }
    }

    /// Send a message to a specific player.
    pub fn send_to_player(&self, player_id: Uuid, msg: ServerMessage) {
        if let Some(sender) = self.player_senders.get(&player_id) {
            let _ = sender.send(msg);
        }
    }

    /// Broadcast a message to all players in a room.
    pub fn broadcast_to_room(&self, room_id: Uuid, msg: ServerMessage) {
        let players: Vec<Uuid> = match self.rooms.get(&room_id) {
            Some(room) => room.player_ids().collect(),
            None => return,
        };
        for player_id in players {
            self.send_to_player(player_id, msg.clone());
        }
    }

    /// Rooms with a free seat.
    pub fn open_rooms(&self) -> Vec<RoomInfo> {
        self.rooms
            .iter()
            .filter(|r| r.status() == RoomStatus::Open)
            .map(|r| r.to_info())
            .collect()
    }

    fn send_error(&self, player_id: Uuid, message: impl Into<String>) {
        self.send_to_player(
            player_id,
            ServerMessage::Error {
                message: message.into(),
            },
        );
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new(&ServerConfig::default())
    }
}

/// Run the WebSocket server.
pub async fn run_server(addr: SocketAddr, state: Arc<ServerState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Settlers server listening on {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New WebSocket connection from {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let player_id = Uuid::new_v4();

    // Create channel for outgoing messages
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.player_senders.insert(player_id, tx);

    let welcome = ServerMessage::Welcome { player_id };
    let msg_text = serde_json::to_string(&welcome)?;
    ws_sender.send(Message::Text(msg_text)).await?;

    // Forward messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!("Failed to encode message: {}", e),
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_message(player_id, client_msg, &state),
                Err(e) => {
                    warn!("Invalid message from {}: {}", player_id, e);
                    state.send_error(player_id, format!("Invalid message: {e}"));
                }
            },
            Ok(Message::Close(_)) => {
                info!("Client {} closing connection", player_id);
                break;
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", player_id, e);
                break;
            }
            _ => {}
        }
    }

    handle_disconnect(player_id, &state);
    state.player_senders.remove(&player_id);
    send_task.abort();

    info!("Connection closed for {}", player_id);
    Ok(())
}

/// Handle a client message.
fn handle_message(player_id: Uuid, msg: ClientMessage, state: &Arc<ServerState>) {
    match msg {
        ClientMessage::CreateRoom => {
            if state.player_rooms.contains_key(&player_id) {
                state.send_error(player_id, "Already in a room");
                return;
            }

            let room_id = Uuid::new_v4();
            let room = GameRoom::new(room_id, state.new_session());
            state.rooms.insert(room_id, room);
            info!("Room {} created by {}", room_id, player_id);

            state.send_to_player(player_id, ServerMessage::RoomCreated { room_id });
            join_room(player_id, room_id, state);
        }

        ClientMessage::JoinRoom { room_id } => {
            if state.player_rooms.contains_key(&player_id) {
                state.send_error(player_id, "Already in a room");
                return;
            }
            join_room(player_id, room_id, state);
        }

        ClientMessage::LeaveRoom => {
            if leave_room(player_id, state) {
                state.send_to_player(player_id, ServerMessage::LeftRoom);
            } else {
                state.send_error(player_id, "Not in a room");
            }
        }

        ClientMessage::ListRooms => {
            let rooms = state.open_rooms();
            state.send_to_player(player_id, ServerMessage::RoomList { rooms });
        }

        ClientMessage::GameAction { action } => {
            let Some(room_id) = state.player_rooms.get(&player_id).map(|r| *r) else {
                state.send_error(player_id, "Not in a room");
                return;
            };
            let Some(mut room) = state.rooms.get_mut(&room_id) else {
                return;
            };

            // The room stays locked until the action is fully applied
            match room.apply_action(player_id, action) {
                Ok(()) => {
                    let game_state = room.game_state();
                    drop(room);
                    state.broadcast_to_room(room_id, ServerMessage::GameState { state: game_state });
                }
                Err(e) => {
                    drop(room);
                    debug!("Action from {} rejected: {}", player_id, e);
                    state.send_to_player(
                        player_id,
                        ServerMessage::ActionRejected {
                            error: e.to_string(),
                        },
                    );
                }
            }
        }

        ClientMessage::Ping => {
            state.send_to_player(player_id, ServerMessage::Pong);
        }
    }
}

/// Seat a player and send them the room, the board and the current state.
fn join_room(player_id: Uuid, room_id: Uuid, state: &Arc<ServerState>) {
    let Some(mut room) = state.rooms.get_mut(&room_id) else {
        state.send_error(player_id, "Room not found");
        return;
    };

    match room.add_player(player_id) {
        Ok(seat) => {
            let room_info = room.to_info();
            let board = room.board().clone();
            let game_state = room.game_state();
            drop(room);

            state.player_rooms.insert(player_id, room_id);
            info!("Player {} joined room {} as {}", player_id, room_id, seat);

            state.send_to_player(
                player_id,
                ServerMessage::JoinedRoom {
                    room: room_info.clone(),
                    seat,
                },
            );
            state.send_to_player(player_id, ServerMessage::BoardState { board });
            state.send_to_player(player_id, ServerMessage::GameState { state: game_state });
            state.broadcast_to_room(room_id, ServerMessage::RoomUpdated { room: room_info });
        }
        Err(e) => {
            drop(room);
            state.send_error(player_id, e.to_string());
        }
    }
}

/// Free the player's seat, dropping the room once nobody is left.
/// Returns false if the player was not in a room.
fn leave_room(player_id: Uuid, state: &Arc<ServerState>) -> bool {
    let Some((_, room_id)) = state.player_rooms.remove(&player_id) else {
        return false;
    };

    match state.rooms.get_mut(&room_id) {
        Some(mut room) => {
            room.remove_player(player_id).ok();
        }
        None => return true,
    }

    // Rechecked under the shard lock, a join may have landed in between
    if state
        .rooms
        .remove_if(&room_id, |_, room| room.player_count() == 0)
        .is_some()
    {
        info!("Room {} closed", room_id);
    } else if let Some(room_info) = state.rooms.get(&room_id).map(|r| r.to_info()) {
        state.broadcast_to_room(room_id, ServerMessage::RoomUpdated { room: room_info });
    }
    true
}

/// Handle player disconnect.
fn handle_disconnect(player_id: Uuid, state: &Arc<ServerState>) {
    if leave_room(player_id, state) {
        info!("Player {} gave up their seat on disconnect", player_id);
    }
}
