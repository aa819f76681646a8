use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::DeviceId;

/// Datagram payloads exchanged between rooms, tagged by `event`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RoomMessage {
    /// Discovery broadcast from a receiver looking for emitters.
    Advertise { app_id: DeviceId },
    RespondToAdvertise { app_id: DeviceId },
    BroadcastStop { app_id: DeviceId },
    Listening { app_id: DeviceId, responder_name: String },
    NotListening { app_id: DeviceId },
    RequestHelp { app_id: DeviceId },
    RequestStop { app_id: DeviceId },
    RespondToHelp { responder_name: String },
    StatusRequest { app_id: DeviceId },
    /// Status response.
    ImOkay { app_id: DeviceId },
}

impl RoomMessage {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn name(&self) -> &'static str {
        match self {
            RoomMessage::Advertise { .. } => "advertise",
            RoomMessage::RespondToAdvertise { .. } => "respondToAdvertise",
            RoomMessage::BroadcastStop { .. } => "broadcastStop",
            RoomMessage::Listening { .. } => "listening",
            RoomMessage::NotListening { .. } => "notListening",
            RoomMessage::RequestHelp { .. } => "requestHelp",
            RoomMessage::RequestStop { .. } => "requestStop",
            RoomMessage::RespondToHelp { .. } => "respondToHelp",
            RoomMessage::StatusRequest { .. } => "statusRequest",
            RoomMessage::ImOkay { .. } => "imOkay",
        }
    }

    /// The sender's app id, when the message carries one.
    pub fn app_id(&self) -> Option<&DeviceId> {
        match self {
            RoomMessage::Advertise { app_id }
            | RoomMessage::RespondToAdvertise { app_id }
            | RoomMessage::BroadcastStop { app_id }
            | RoomMessage::Listening { app_id, .. }
            | RoomMessage::NotListening { app_id }
            | RoomMessage::RequestHelp { app_id }
            | RoomMessage::RequestStop { app_id }
            | RoomMessage::StatusRequest { app_id }
            | RoomMessage::ImOkay { app_id } => Some(app_id),
            RoomMessage::RespondToHelp { .. } => None,
        }
    }
}
