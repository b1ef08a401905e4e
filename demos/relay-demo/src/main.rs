//! A tap race played by one hoster and two controllers, with an in-process
//! platform relaying between them.
//!
//! Run with `RUST_LOG=debug` to see the message flow.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use framelink::prelude::*;
use framelink::protocol::{
    ControllerAppData, ControllerGameActionResponse, Envelope, HosterAppData,
    HosterGameActionResponse, Message,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Game types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Signal {
    Go { round: u32 },
    Winner { round: u32, connection_id: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Tap {
    round: u32,
}

struct TapRace;

impl GameData for TapRace {
    type ControllerToHoster = Tap;
    type HosterToController = Signal;
}

const ROUNDS: u32 = 3;

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

enum Source {
    Hoster,
    Controller(String),
}

/// Routes envelopes between the hoster and controllers by connection id.
struct Platform {
    hoster: MemoryTransport,
    controllers: HashMap<String, MemoryTransport>,
    players: Vec<PlayerDto>,
    hoster_ready: bool,
}

impl Platform {
    fn post(transport: &MemoryTransport, message: Message) {
        match message.to_value() {
            Ok(value) => {
                if let Err(e) = transport.send(value) {
                    warn!(error = %e, "platform send failed");
                }
            }
            Err(e) => warn!(error = %e, "platform encode failed"),
        }
    }

    fn to_controller(&self, connection_id: &str, message: Message) {
        if let Some(transport) = self.controllers.get(connection_id) {
            Self::post(transport, message);
        }
    }

    fn publish_roster(&self) {
        Self::post(
            &self.hoster,
            Message::AppDataHoster(HosterAppData {
                connection_id: "host".into(),
                players: self.players.clone(),
                join_url: "https://play.example/join/TAPS".into(),
                join_code: "TAPS".into(),
                dev_mode: true,
                lobby_game: false,
                global_settings: None,
                game_storage: None,
            }),
        );
    }

    fn publish_controller(&self, connection_id: &str) {
        self.to_controller(
            connection_id,
            Message::AppDataController(ControllerAppData {
                hoster_ready: self.hoster_ready,
                connection_id: connection_id.into(),
                join_url: "https://play.example/join/TAPS".into(),
                join_code: "TAPS".into(),
                dev_mode: true,
                lobby_game: false,
                global_settings: None,
                game_storage: None,
            }),
        );
    }

    fn route(&mut self, source: Source, message: Message) {
        match (source, message) {
            (Source::Controller(id), Message::InitGameController(init)) => {
                info!(%id, core_version = %init.core_version, "controller connected");
                let mut player = PlayerDto::new(id.clone());
                player.screen_name = Some(id.to_uppercase());
                self.players.push(player);
                self.publish_roster();
                self.publish_controller(&id);
            }
            (Source::Controller(id), Message::ReadyStatusController(status)) => {
                if let Some(player) = self.players.iter_mut().find(|p| p.connection_id == id) {
                    player.ready = status.ready;
                }
                self.publish_roster();
            }
            (Source::Controller(_), Message::PongController(pong)) => {
                Self::post(&self.hoster, Message::PongController(pong));
            }
            (Source::Controller(id), Message::GameActionController(action)) => {
                Self::post(
                    &self.hoster,
                    Message::GameActionResponseHoster(HosterGameActionResponse {
                        from: id,
                        payload: action.payload,
                    }),
                );
            }
            (Source::Hoster, Message::InitGameHoster(init)) => {
                info!(core_version = %init.core_version, "hoster connected");
            }
            (Source::Hoster, Message::ReadyStatusHoster(status)) => {
                self.hoster_ready = status.ready;
                for id in self.controllers.keys() {
                    self.publish_controller(id);
                }
            }
            (Source::Hoster, Message::PingHoster(ping)) => {
                let id = ping.player_id.clone();
                self.to_controller(&id, Message::PingHoster(ping));
            }
            (Source::Hoster, Message::PongHoster(pong)) => {
                let id = pong.player_id.clone();
                self.to_controller(&id, Message::PongHoster(pong));
            }
            (Source::Hoster, Message::GameActionHoster(action)) => {
                self.to_controller(
                    &action.to,
                    Message::GameActionResponseController(ControllerGameActionResponse {
                        payload: action.payload,
                    }),
                );
            }
            (_, Message::EndGameHoster(_)) => info!("hoster ended the game"),
            (_, other) => tracing::debug!(kind = %other.message_type(), "platform ignored"),
        }
    }
}

/// Starts the platform. Returns the hoster's transport and one transport
/// per controller.
fn spawn_platform(ids: &[&str]) -> (Arc<dyn Transport>, Vec<(String, Arc<dyn Transport>)>) {
    let (tx, mut inbox) = mpsc::unbounded_channel::<(Option<String>, Value)>();
    let latency = Duration::from_millis(15);

    let (hoster_side, hoster) = MemoryTransport::pair_with_latency(latency);
    let hoster_tx = tx.clone();
    let _ = hoster.on_receive(Box::new(move |raw| {
        let _ = hoster_tx.send((None, raw.clone()));
    }));

    let mut sides = Vec::new();
    let mut controllers = HashMap::new();
    for id in ids {
        let (controller_side, controller) = MemoryTransport::pair_with_latency(latency);
        let controller_tx = tx.clone();
        let from = id.to_string();
        let _ = controller.on_receive(Box::new(move |raw| {
            let _ = controller_tx.send((Some(from.clone()), raw.clone()));
        }));
        controllers.insert(id.to_string(), controller);
        sides.push((id.to_string(), Arc::new(controller_side) as Arc<dyn Transport>));
    }

    tokio::spawn(async move {
        let mut platform = Platform {
            hoster,
            controllers,
            players: Vec::new(),
            hoster_ready: false,
        };
        while let Some((from, raw)) = inbox.recv().await {
            let message = match Envelope::from_value(&raw).and_then(|e| e.to_message()) {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, "platform dropped message");
                    continue;
                }
            };
            let source = from.map_or(Source::Hoster, Source::Controller);
            platform.route(source, message);
        }
    });

    (Arc::new(hoster_side), sides)
}

// ---------------------------------------------------------------------------
// Controllers
// ---------------------------------------------------------------------------

/// Runs one player: taps on every `Go` after `reaction`.
fn spawn_player(
    id: String,
    transport: Arc<dyn Transport>,
    reaction: Duration,
) -> Result<(), FramelinkError> {
    let config = CommunicatorConfig::default()
        .with_auto_ready(true)
        .with_auto_ready_delay(Duration::from_millis(200));
    let controller = ControllerCommunicator::<TapRace>::new(transport, config)?;

    let (tx, mut signals) = mpsc::unbounded_channel();
    let _ = controller.add_game_message_listener(move |signal: &Signal| {
        let _ = tx.send(signal.clone());
    });
    let player = id.clone();
    let _ = controller.add_hoster_ready_listener(move |ready| {
        info!(%player, ready, "hoster readiness");
    });

    tokio::spawn(async move {
        while let Some(signal) = signals.recv().await {
            match signal {
                Signal::Go { round } => {
                    tokio::time::sleep(reaction).await;
                    if let Err(e) = controller.send_game_message(&Tap { round }) {
                        warn!(%id, error = %e, "tap failed");
                    }
                }
                Signal::Winner {
                    round,
                    connection_id,
                } => {
                    let outcome = if connection_id == id { "won" } else { "lost" };
                    info!(%id, round, outcome, "round over");
                }
            }
        }
    });
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), FramelinkError> {
    framelink::logging::init();

    let ids = ["ada", "bo"];
    let (hoster_transport, controller_transports) = spawn_platform(&ids);

    let config = CommunicatorConfig::default()
        .with_ping(PingConfig::default().with_interval(Duration::from_millis(500)));
    let hoster = HosterCommunicator::<TapRace>::new(hoster_transport, config)?;

    let (joined_tx, mut joined) = mpsc::unbounded_channel();
    let _joins = hoster.players().add_join_listener(move |player| {
        info!(%player, "joined");
        let _ = joined_tx.send(player.clone());
    });
    let _pings = hoster.add_player_ping_listener(|sample| {
        tracing::debug!(player = %sample.connection_id, ping_ms = sample.ping_ms, "ping");
    });
    let (taps_tx, mut taps) = mpsc::unbounded_channel();
    let _taps = hoster.add_game_message_listener(move |from, tap: &Tap| {
        let _ = taps_tx.send((from.to_owned(), tap.round));
    });

    for (n, (id, transport)) in controller_transports.into_iter().enumerate() {
        let reaction = Duration::from_millis(40 + 35 * n as u64);
        spawn_player(id, transport, reaction)?;
    }

    hoster.wait_for_load().await;
    info!(join_code = ?hoster.join_code(), "lobby open");

    let mut players = Vec::new();
    while players.len() < ids.len() {
        match joined.recv().await {
            Some(player) => players.push(player),
            None => break,
        }
    }
    for player in &players {
        player.wait_for_ready(Some(Duration::from_secs(5))).await?;
    }
    hoster.ready()?;

    let mut wins: HashMap<String, u32> = HashMap::new();
    for round in 1..=ROUNDS {
        hoster.broadcast_game_message(&Signal::Go { round })?;
        let winner = loop {
            match taps.recv().await {
                Some((from, tapped)) if tapped == round => break from,
                Some(_) => continue,
                None => return Ok(()),
            }
        };
        *wins.entry(winner.clone()).or_default() += 1;
        hoster.broadcast_game_message(&Signal::Winner {
            round,
            connection_id: winner,
        })?;
        tokio::time::sleep(Duration::from_millis(300)).await;
    }

    for (id, sample) in hoster.pings() {
        info!(%id, ping_ms = sample.ping_ms, "last ping");
    }
    info!(?wins, "race finished");
    hoster.end_game()?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(())
}
