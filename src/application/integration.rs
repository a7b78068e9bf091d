//! Integration events republished on the [EventBus][crate::command::EventBus]
//! for other parts of the system to react to. Unlike Domain Events, these
//! never touch the Event Store.

use crate::domain::{ClubId, LicenseNumber, LicenseType, PlayerId, Season};
use crate::message::Message;

/// Published after a player registration command has fully committed:
/// the license is registered with the federation and the player stream
/// holds the new membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRegistrationAccepted {
    pub player_id: PlayerId,
    pub club_id: ClubId,
    pub season: Season,
    pub license_number: Option<LicenseNumber>,
    pub license_type: Option<LicenseType>,
}

impl Message for PlayerRegistrationAccepted {
    fn name(&self) -> &'static str {
        "PlayerRegistrationAccepted"
    }
}
