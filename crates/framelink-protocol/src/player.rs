//! The player record the platform sends in every roster snapshot.

use serde::{Deserialize, Serialize};

/// A player's subscription tier on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Basic,
    Premium,
    /// A tier this version of the SDK doesn't know about.
    #[serde(other)]
    Unknown,
}

/// One entry of an `AppData_HOSTER` roster snapshot.
///
/// Only `connectionId` is required; missing flags take the values a
/// freshly connected player would have.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDto {
    /// Stable identity of the player's connection. Never changes.
    pub connection_id: String,
    #[serde(default)]
    pub screen_name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    /// The controller frame has signaled it can receive messages.
    #[serde(default)]
    pub ready: bool,
    /// Currently connected, as opposed to dropped.
    #[serde(default = "default_true")]
    pub active: bool,
    /// The player's device holds a live connection to the platform.
    #[serde(default = "default_true")]
    pub has_connection: bool,
    #[serde(default)]
    pub is_host: bool,
    #[serde(default)]
    pub subscription: SubscriptionTier,
}

impl PlayerDto {
    /// A fresh player record with only its id set.
    pub fn new(connection_id: impl Into<String>) -> Self {
        Self {
            connection_id: connection_id.into(),
            screen_name: None,
            image: None,
            ready: false,
            active: true,
            has_connection: true,
            is_host: false,
            subscription: SubscriptionTier::Free,
        }
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_player_dto_minimal_json_fills_defaults() {
        let dto: PlayerDto = serde_json::from_value(json!({ "connectionId": "p1" })).unwrap();
        assert_eq!(dto, PlayerDto::new("p1"));
    }

    #[test]
    fn test_player_dto_uses_camel_case() {
        let mut dto = PlayerDto::new("p1");
        dto.is_host = true;
        dto.screen_name = Some("Ada".into());
        let json = serde_json::to_value(&dto).unwrap();

        assert_eq!(json["connectionId"], "p1");
        assert_eq!(json["screenName"], "Ada");
        assert_eq!(json["isHost"], true);
        assert_eq!(json["hasConnection"], true);
        assert_eq!(json["subscription"], "FREE");
    }

    #[test]
    fn test_unknown_subscription_tier_is_tolerated() {
        let dto: PlayerDto =
            serde_json::from_value(json!({ "connectionId": "p1", "subscription": "PLATINUM" }))
                .unwrap();
        assert_eq!(dto.subscription, SubscriptionTier::Unknown);
    }

    #[test]
    fn test_player_dto_missing_connection_id_fails() {
        let result: Result<PlayerDto, _> = serde_json::from_value(json!({ "ready": true }));
        assert!(result.is_err());
    }
}
