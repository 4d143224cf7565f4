//! Arena handle held by the transport layer
//!
//! Commands travel to the scheduler task over an mpsc channel; everything the
//! matches produce comes back on a broadcast channel that each connection
//! filters down to its own player.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::warn;
use uuid::Uuid;

use crate::game::LaunchError;

use super::protocol::{decode, ClientMsg, Outbound, ServerMsg};

/// Commands capacity between handles and the scheduler
pub const COMMAND_BUFFER: usize = 256;

/// Inbound command for the scheduler
#[derive(Debug)]
pub enum MatchCommand {
    SetMovementIntent {
        player_id: Uuid,
        x: f32,
        y: f32,
    },
    FireAt {
        player_id: Uuid,
        target_x: f32,
        target_y: f32,
    },
    Disconnect {
        player_id: Uuid,
    },
    /// Ready players with their pseudonyms
    Launch {
        players: Vec<(Uuid, String)>,
        reply: oneshot::Sender<Result<Uuid, LaunchError>>,
    },
}

/// Gateway errors
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("match scheduler is not running")]
    SchedulerGone,

    #[error("malformed client message: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Cloneable handle to the running arena
#[derive(Clone)]
pub struct ArenaHandle {
    commands: mpsc::Sender<MatchCommand>,
    outbound: broadcast::Sender<Outbound>,
    directory: Arc<DashMap<Uuid, Uuid>>,
}

impl ArenaHandle {
    pub fn new(
        commands: mpsc::Sender<MatchCommand>,
        outbound: broadcast::Sender<Outbound>,
        directory: Arc<DashMap<Uuid, Uuid>>,
    ) -> Self {
        Self {
            commands,
            outbound,
            directory,
        }
    }

    async fn send(&self, command: MatchCommand) -> Result<(), GatewayError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| GatewayError::SchedulerGone)
    }

    /// Launch a match; resolves once the scheduler has registered it
    pub async fn launch(&self, players: Vec<(Uuid, String)>) -> Result<Uuid, LaunchError> {
        let (reply, reply_rx) = oneshot::channel();
        self.commands
            .send(MatchCommand::Launch { players, reply })
            .await
            .map_err(|_| LaunchError::SchedulerGone)?;
        reply_rx.await.map_err(|_| LaunchError::SchedulerGone)?
    }

    pub async fn set_movement_intent(
        &self,
        player_id: Uuid,
        x: f32,
        y: f32,
    ) -> Result<(), GatewayError> {
        self.send(MatchCommand::SetMovementIntent { player_id, x, y })
            .await
    }

    pub async fn fire_at(
        &self,
        player_id: Uuid,
        target_x: f32,
        target_y: f32,
    ) -> Result<(), GatewayError> {
        self.send(MatchCommand::FireAt {
            player_id,
            target_x,
            target_y,
        })
        .await
    }

    /// Connection closed
    pub async fn mark_disconnected(&self, player_id: Uuid) -> Result<(), GatewayError> {
        self.send(MatchCommand::Disconnect { player_id }).await
    }

    /// Dispatch a parsed client message for `player_id`
    pub async fn handle_client_msg(
        &self,
        player_id: Uuid,
        msg: ClientMsg,
    ) -> Result<(), GatewayError> {
        match msg {
            ClientMsg::Move { x, y } => self.set_movement_intent(player_id, x, y).await,
            ClientMsg::Fire { target_x, target_y } => {
                self.fire_at(player_id, target_x, target_y).await
            }
        }
    }

    /// Parse and dispatch a text frame
    pub async fn handle_text(&self, player_id: Uuid, text: &str) -> Result<(), GatewayError> {
        let msg = decode(text)?;
        self.handle_client_msg(player_id, msg).await
    }

    /// Match the player is currently in
    pub fn match_of(&self, player_id: &Uuid) -> Option<Uuid> {
        self.directory.get(player_id).map(|entry| *entry)
    }

    /// Every outbound message of every match
    pub fn subscribe(&self) -> broadcast::Receiver<Outbound> {
        self.outbound.subscribe()
    }

    /// Outbound stream filtered to what `player_id` should see
    pub fn player_feed(&self, player_id: Uuid) -> PlayerFeed {
        PlayerFeed {
            player_id,
            current_match: self.match_of(&player_id),
            rx: self.outbound.subscribe(),
            directory: self.directory.clone(),
        }
    }
}

/// Per-connection view of the outbound channel
pub struct PlayerFeed {
    player_id: Uuid,
    /// Last known match; kept after retirement so the final messages arrive
    current_match: Option<Uuid>,
    rx: broadcast::Receiver<Outbound>,
    directory: Arc<DashMap<Uuid, Uuid>>,
}

impl PlayerFeed {
    /// Next message for this player; `None` once the arena is gone
    pub async fn recv(&mut self) -> Option<ServerMsg> {
        loop {
            let outbound = match self.rx.recv().await {
                Ok(outbound) => outbound,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(player_id = %self.player_id, lagged = n, "Player feed lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            };

            if let Some(match_id) = self.directory.get(&self.player_id).map(|entry| *entry) {
                self.current_match = Some(match_id);
            }
            let Some(match_id) = self.current_match else {
                continue;
            };
            if outbound.is_for(match_id, self.player_id) {
                return Some(outbound.msg);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::game::{MapGenerator, MatchLoop, MatchSettings};

    fn start_arena() -> (ArenaHandle, oneshot::Sender<()>) {
        let settings = MatchSettings {
            map: MapGenerator::new(20, 20, 10),
            ..MatchSettings::default()
        };
        let scheduler = MatchLoop::new(settings, Duration::from_millis(200), Some(3));
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let handle = scheduler.handle(command_tx);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        tokio::spawn(scheduler.run(command_rx, async move {
            let _ = stop_rx.await;
        }));
        (handle, stop_tx)
    }

    async fn next_matching<F>(feed: &mut PlayerFeed, mut pred: F) -> ServerMsg
    where
        F: FnMut(&ServerMsg) -> bool,
    {
        timeout(Duration::from_secs(5), async {
            loop {
                match feed.recv().await {
                    Some(msg) if pred(&msg) => return msg,
                    Some(_) => continue,
                    None => panic!("arena closed"),
                }
            }
        })
        .await
        .expect("message within timeout")
    }

    #[tokio::test]
    async fn launch_play_and_disconnect_round_trip() {
        let (arena, stop) = start_arena();
        let player = Uuid::from_u128(100);
        let mut feed = arena.player_feed(player);

        let match_id = assert_ok!(arena.launch(vec![(player, "hana".into())]).await);
        assert_eq!(arena.match_of(&player), Some(match_id));

        let launched = next_matching(&mut feed, |m| matches!(m, ServerMsg::MatchLaunched { .. })).await;
        match launched {
            ServerMsg::MatchLaunched { players, .. } => {
                assert_eq!(players.len(), 4);
                assert_eq!(players.iter().filter(|p| p.is_bot).count(), 3);
            }
            other => panic!("unexpected {other:?}"),
        }

        assert_ok!(arena.handle_text(player, r#"{"type":"move","x":1.0,"y":0.0}"#).await);
        assert_ok!(arena.fire_at(player, 0.0, 0.0).await);
        next_matching(&mut feed, |m| matches!(m, ServerMsg::Snapshot { .. })).await;

        assert_ok!(arena.mark_disconnected(player).await);
        let left = next_matching(&mut feed, |m| matches!(m, ServerMsg::PlayerLeft { .. })).await;
        assert!(matches!(left, ServerMsg::PlayerLeft { player_id } if player_id == player));
        assert_eq!(arena.match_of(&player), None);

        let _ = stop.send(());
    }

    #[tokio::test]
    async fn duplicate_launch_is_rejected() {
        let (arena, stop) = start_arena();
        let player = Uuid::from_u128(101);
        assert_ok!(arena.launch(vec![(player, "ivy".into())]).await);
        let again = arena.launch(vec![(player, "ivy".into())]).await;
        assert!(matches!(again, Err(LaunchError::AlreadyInMatch(id)) if id == player));
        let _ = stop.send(());
    }

    #[tokio::test]
    async fn malformed_text_is_rejected() {
        let (arena, stop) = start_arena();
        let result = arena.handle_text(Uuid::nil(), "not json").await;
        assert!(matches!(assert_err!(result), GatewayError::Decode(_)));
        let _ = stop.send(());
    }

    #[tokio::test]
    async fn commands_fail_once_scheduler_stops() {
        let (arena, stop) = start_arena();
        let _ = stop.send(());
        // Wait for the scheduler task to drop its receiver
        let mut result = Ok(());
        for _ in 0..50 {
            result = arena.mark_disconnected(Uuid::nil()).await;
            if result.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(matches!(result, Err(GatewayError::SchedulerGone)));
        assert!(matches!(
            arena.launch(vec![]).await,
            Err(LaunchError::SchedulerGone)
        ));
    }
}
