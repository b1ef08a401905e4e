//! Integration tests for the controller communicator against a scripted
//! platform.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{Platform, is};
use framelink::prelude::*;
use framelink::protocol::{
    ControllerAppData, ControllerGameActionResponse, ControllerGlobalSettings, Message, Ping,
    PongHoster, StorageEntry,
};
use serde_json::json;

// =========================================================================
// Helpers
// =========================================================================

fn start_controller() -> (ControllerCommunicator, Platform) {
    let (transport, platform) = Platform::attach();
    let controller = ControllerCommunicator::new(transport, CommunicatorConfig::default()).unwrap();
    (controller, platform)
}

fn app_data(hoster_ready: bool) -> ControllerAppData {
    ControllerAppData {
        hoster_ready,
        connection_id: "p1".into(),
        join_url: "https://play.example/join/WXYZ".into(),
        join_code: "WXYZ".into(),
        dev_mode: false,
        lobby_game: true,
        global_settings: Some(ControllerGlobalSettings {
            sound_fx_volume: 0.8,
        }),
        game_storage: None,
    }
}

// =========================================================================
// Construction and app data
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_new_sends_init_game_controller() {
    let (_controller, mut platform) = start_controller();

    let init = platform.next().await;
    assert!(is(&init, MessageType::InitGameController));
    assert_eq!(init["data"]["coreVersion"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test(start_paused = true)]
async fn test_app_data_sets_views_and_loads() {
    let (controller, platform) = start_controller();
    assert!(!controller.has_loaded());

    platform.send(Message::AppDataController(app_data(false)));
    controller.wait_for_load().await;

    assert_eq!(controller.connection_id().as_deref(), Some("p1"));
    assert_eq!(controller.join_code().as_deref(), Some("WXYZ"));
    assert!(controller.lobby_game());
    assert!(!controller.dev_mode());
    assert!(!controller.hoster_ready());
    assert_eq!(controller.global_settings().unwrap().sound_fx_volume, 0.8);
}

#[tokio::test(start_paused = true)]
async fn test_hoster_ready_listener_fires_only_on_change() {
    let (controller, platform) = start_controller();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = controller.add_hoster_ready_listener(move |ready| sink.lock().unwrap().push(ready));

    for ready in [false, true, true, false] {
        platform.send(Message::AppDataController(app_data(ready)));
    }
    Platform::settle().await;

    assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    assert!(!controller.hoster_ready());
}

// =========================================================================
// Ping
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_ping_responder_echoes_id_and_player() {
    let (_controller, mut platform) = start_controller();

    platform.send(Message::PingHoster(Ping {
        id: "abc123".into(),
        player_id: "p1".into(),
        time_since_start: 100.0,
        hoster_time: 1_700_000_000_000.0,
    }));

    let pong = platform.next_of(MessageType::PongController).await;
    assert_eq!(pong["data"]["id"], "abc123");
    assert_eq!(pong["data"]["playerId"], "p1");
    assert!(pong["data"]["controllerTime"].as_f64().unwrap() > 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_pong_hoster_updates_ping_data() {
    let (controller, platform) = start_controller();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = controller.add_ping_listener(move |data| sink.lock().unwrap().push(data.clone()));
    assert!(controller.ping().is_none());

    platform.send(Message::PongHoster(PongHoster {
        id: "abc123".into(),
        player_id: "p1".into(),
        ping_ms: 30.0,
        time_since_start: 2_000.0,
        hoster_time: 1_700_000_000_000.0,
    }));
    Platform::settle().await;

    let data = controller.ping().unwrap();
    assert_eq!(data.ping_ms, 30.0);
    assert_eq!(data.time_since_start_ping_adjusted, 2_015.0);
    assert_eq!(seen.lock().unwrap().len(), 1);
}

// =========================================================================
// Readiness, game messages, lifecycle
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_ready_sends_status() {
    let (controller, mut platform) = start_controller();

    controller.ready().unwrap();
    let status = platform.next_of(MessageType::ReadyStatusController).await;
    assert_eq!(status["data"], json!({ "ready": true }));
    assert!(controller.is_ready());

    controller.unready().unwrap();
    let status = platform.next_of(MessageType::ReadyStatusController).await;
    assert_eq!(status["data"], json!({ "ready": false }));
}

#[tokio::test(start_paused = true)]
async fn test_send_game_message_needs_no_address() {
    let (controller, mut platform) = start_controller();

    controller.send_game_message(&json!({ "tap": 1 })).unwrap();

    let sent = platform.next_of(MessageType::GameActionController).await;
    assert_eq!(sent["data"], json!({ "payload": { "tap": 1 } }));
}

#[tokio::test(start_paused = true)]
async fn test_game_listener_sees_only_responses_for_controllers() {
    let (controller, platform) = start_controller();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = controller.add_game_message_listener(move |payload| {
        sink.lock().unwrap().push(payload.clone());
    });

    platform.send_raw(json!({
        "type": "GAME_ACTION_RESPONSE_HOSTER",
        "data": { "from": "p2", "payload": "not for us" }
    }));
    platform.send(Message::GameActionResponseController(ControllerGameActionResponse {
        payload: json!({ "score": 3 }),
    }));
    Platform::settle().await;

    assert_eq!(*seen.lock().unwrap(), vec![json!({ "score": 3 })]);
}

#[tokio::test(start_paused = true)]
async fn test_end_and_reload_game() {
    let (controller, mut platform) = start_controller();
    platform.next_of(MessageType::InitGameController).await;

    controller.end_game().unwrap();
    controller.reload_game().unwrap();

    assert_eq!(
        platform.next().await,
        json!({ "type": "END_GAME_CONTROLLER", "data": {} })
    );
    assert_eq!(
        platform.next().await,
        json!({ "type": "RELOAD_GAME_CONTROLLER", "data": {} })
    );
}

#[tokio::test(start_paused = true)]
async fn test_typed_app_listener_filters_by_type() {
    let (controller, platform) = start_controller();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = controller.add_app_message_listener(
        move |envelope| sink.lock().unwrap().push(envelope.kind.to_string()),
        Some(MessageType::Debug),
    );

    platform.send_raw(json!({ "type": "DEBUG", "data": "one" }));
    platform.send(Message::AppDataController(app_data(false)));
    platform.send_raw(json!({ "type": "DEBUG", "data": null }));
    Platform::settle().await;

    assert_eq!(*seen.lock().unwrap(), vec!["DEBUG", "DEBUG"]);
}

// =========================================================================
// Settings and storage
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_set_game_storage_confirmed() {
    let (controller, mut platform) = start_controller();
    platform.send(Message::AppDataController(app_data(false)));
    controller.wait_for_load().await;

    let request = tokio::spawn(async move {
        let confirmed = controller.set_game_storage("skin", Some("red".into())).await;
        (controller, confirmed)
    });

    let set = platform
        .next_of(MessageType::SetGameStorageControllerG2P)
        .await;
    assert_eq!(set["data"], json!({ "key": "skin", "value": "red" }));
    platform.send(Message::UpdatedGameStorageControllerP2G(StorageEntry {
        key: "skin".into(),
        value: Some("red".into()),
    }));

    let (controller, confirmed) = request.await.unwrap();
    assert_eq!(confirmed.unwrap().value.as_deref(), Some("red"));
    assert_eq!(
        controller.game_storage().unwrap()["skin"],
        Some("red".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn test_set_game_storage_accepts_confirmation_with_undecodable_value() {
    let (controller, mut platform) = start_controller();
    platform.send(Message::AppDataController(app_data(false)));
    controller.wait_for_load().await;

    let request = tokio::spawn(async move {
        let confirmed = controller.set_game_storage("skin", Some("red".into())).await;
        (controller, confirmed)
    });

    platform
        .next_of(MessageType::SetGameStorageControllerG2P)
        .await;
    platform.send_raw(json!({
        "type": "UPDATED_GAME_STORAGE_CONTROLLER_P2G",
        "data": { "key": "skin", "value": 7 }
    }));

    let (controller, confirmed) = request.await.unwrap();
    assert_eq!(confirmed.unwrap().value.as_deref(), Some("red"));
    assert_eq!(
        controller.game_storage().unwrap()["skin"],
        Some("red".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn test_set_global_setting_accepts_confirmation_with_undecodable_value() {
    let (controller, mut platform) = start_controller();
    platform.send(Message::AppDataController(app_data(false)));
    controller.wait_for_load().await;

    let request = tokio::spawn(async move {
        let confirmed = controller
            .set_global_setting(ControllerSetting::SoundFxVolume(0.1))
            .await;
        (controller, confirmed)
    });

    platform
        .next_of(MessageType::SetGlobalSettingControllerG2P)
        .await;
    platform.send_raw(json!({
        "type": "UPDATED_GLOBAL_SETTING_CONTROLLER_P2G",
        "data": { "key": "soundFxVolume", "value": "quiet" }
    }));

    let (controller, confirmed) = request.await.unwrap();
    assert_eq!(confirmed.unwrap(), ControllerSetting::SoundFxVolume(0.1));
    assert_eq!(controller.global_settings().unwrap().sound_fx_volume, 0.1);
}

#[tokio::test(start_paused = true)]
async fn test_set_global_setting_times_out() {
    let (transport, _platform) = Platform::attach();
    let config = CommunicatorConfig::default().with_confirm_timeout(Some(Duration::from_secs(5)));
    let controller = ControllerCommunicator::<RawGameData>::new(transport, config).unwrap();

    let result = controller
        .set_global_setting(ControllerSetting::SoundFxVolume(0.1))
        .await;

    assert!(matches!(
        result,
        Err(FramelinkError::Timeout { ref what, .. }) if what == "global setting soundFxVolume"
    ));
}
