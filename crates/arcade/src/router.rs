//! Inbound message routing.
//!
//! The [`Router`] turns one text frame from one connection into calls on
//! the [`RoomManager`]. It never fails outward: anything that goes wrong
//! while handling a frame is answered with an `error` message to the
//! sender only, and the connection stays open.

use std::sync::Arc;
use std::time::Duration;

use arcade_protocol::{ClientMessage, Codec, JsonCodec, ProtocolError, ServerMessage};
use arcade_room::{NewRoom, RoomManager};
use arcade_session::Peer;
use arcade_transport::ConnectionId;
use tracing::debug;

use crate::ArcadeError;

/// Dispatches decoded client messages to the room manager.
///
/// Shared by every connection task behind an `Arc`.
pub struct Router<C: Codec = JsonCodec> {
    manager: Arc<RoomManager>,
    codec: C,
}

impl Router<JsonCodec> {
    pub fn new(manager: Arc<RoomManager>) -> Self {
        Self::with_codec(manager, JsonCodec)
    }
}

impl<C: Codec> Router<C> {
    pub fn with_codec(manager: Arc<RoomManager>, codec: C) -> Self {
        Self { manager, codec }
    }

    pub fn manager(&self) -> &Arc<RoomManager> {
        &self.manager
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Handles one inbound frame from `peer`.
    pub async fn handle(&self, peer: &Peer, text: &str) {
        let msg = match self.codec.decode_client(text) {
            Ok(msg) => msg,
            Err(err) => {
                debug!(conn_id = %peer.id(), %err, "rejected inbound frame");
                peer.send(ServerMessage::error(err));
                return;
            }
        };

        let kind = msg.kind();
        debug!(conn_id = %peer.id(), kind, "handling message");
        if let Err(err) = self.dispatch(peer, msg).await {
            debug!(conn_id = %peer.id(), kind, %err, "request rejected");
            peer.send(ServerMessage::error(err));
        }
    }

    /// The connection-closed hook.
    pub async fn disconnect(&self, conn: ConnectionId) {
        self.manager.disconnect(conn).await;
    }

    async fn dispatch(&self, peer: &Peer, msg: ClientMessage) -> Result<(), ArcadeError> {
        let conn = peer.id();
        match msg {
            ClientMessage::CreateRoom(req) => {
                let game_type = ProtocolError::require(req.game_type, "gameType")?;
                let user_id = ProtocolError::require(req.user_id, "userId")?;
                let username = req.username.unwrap_or_else(|| user_id.to_string());
                let new_room = NewRoom {
                    game_type,
                    user_id,
                    username,
                    max_players: req.max_players,
                    is_private: req.is_private.unwrap_or(false),
                    round_duration: req.round_duration.map(Duration::from_millis),
                };
                self.manager.create_room(peer, new_room).await?;
            }
            ClientMessage::JoinGame(req) => {
                let game_id = ProtocolError::require(req.game_id, "gameId")?;
                let user_id = ProtocolError::require(req.user_id, "userId")?;
                let username = req.username.unwrap_or_else(|| user_id.to_string());
                self.manager
                    .join_room(peer, &game_id, user_id, username, req.spectate)
                    .await?;
            }
            ClientMessage::LeaveGame => {
                let room_id = self.manager.leave(conn).await?;
                peer.send(ServerMessage::LeftGame { room_id });
            }
            ClientMessage::FindMatch(req) => {
                let game_type = ProtocolError::require(req.game_type, "gameType")?;
                let user_id = ProtocolError::require(req.user_id, "userId")?;
                let username = req.username.unwrap_or_else(|| user_id.to_string());
                self.manager.find_match(peer, game_type, user_id, username).await;
            }
            ClientMessage::CancelMatch(req) => {
                let game_type = ProtocolError::require(req.game_type, "gameType")?;
                let user_id = ProtocolError::require(req.user_id, "userId")?;
                self.manager.cancel_match(peer, game_type, &user_id).await;
            }
            ClientMessage::PlayerReady(req) => {
                self.manager.ready(conn, req.ready.unwrap_or(true)).await?;
            }
            ClientMessage::StartGame => self.manager.start(conn).await?,
            ClientMessage::GameAction(req) => {
                let action = ProtocolError::require(req.action, "action")?;
                self.manager.action(conn, action, req.payload).await?;
            }
            ClientMessage::GameStateUpdate(req) => {
                let patch = ProtocolError::require(req.game_data, "gameData")?;
                self.manager.patch_state(conn, patch).await?;
            }
            ClientMessage::GameResult => self.manager.force_end(conn).await?,
            ClientMessage::Chat(req) => {
                self.manager.chat(conn, req.message.unwrap_or_default()).await?;
            }
            ClientMessage::ListRooms(req) => {
                let rooms = self.manager.list_rooms(req.game_type.as_ref()).await;
                peer.send(ServerMessage::RoomList { rooms });
            }
            ClientMessage::Ping => {
                peer.send(ServerMessage::Pong {
                    timestamp: chrono::Utc::now().timestamp_millis(),
                });
            }
        }
        Ok(())
    }
}
