pub mod controller;
pub mod media;
pub mod media_sync;
pub mod participant;
pub mod peer_link;
pub mod peer_manager;

use std::sync::Arc;

use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::track::track_remote::TrackRemote;

use crate::engagement::EngagementClass;
use crate::signaling::ServerMessage;

pub use controller::{Collaborators, Session, SessionController, SessionHandle, SessionSetup};
pub use media::{LocalTracks, MediaDevices, RtpMediaDevices};
pub use media_sync::MediaStateSync;
pub use participant::{
    MediaFlags, Participant, ParticipantIdentity, ParticipantKind, ParticipantRole, Roster,
};
pub use peer_link::{LinkState, PeerLink};
pub use peer_manager::{LocalPeer, PeerManager};

/// Everything the session actor reacts to, processed strictly one at a
/// time off a single queue.
pub enum SessionEvent {
    /// A parsed message from the room relay.
    Signal(ServerMessage),
    /// Locally gathered ICE candidate for one of our links.
    LocalCandidate {
        remote_id: String,
        candidate: RTCIceCandidateInit,
    },
    /// Remote media track arrival on one of our links.
    RemoteTrack {
        remote_id: String,
        track: Arc<TrackRemote>,
    },
    /// Connection state change reported by a link's callbacks.
    LinkStateChanged {
        remote_id: String,
        state: RTCPeerConnectionState,
    },
    /// A classifier verdict from the engagement sampler.
    EngagementSample {
        class: EngagementClass,
        generation: u64,
    },
    /// Consumer-initiated action.
    Command(SessionCommand),
    /// The screen-share child session finished connecting.
    ScreenPublisherReady(SessionHandle),
    /// The signaling connection is gone; terminal.
    TransportClosed,
}

/// Actions available to the consumer through the session handle.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    ToggleVideo,
    ToggleAudio,
    ToggleScreenShare,
    SendChat(String),
    Leave,
}

/// Local intervention prompt raised by the engagement pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngagementPrompt {
    /// Student appears to have left the desk.
    ComeBack,
    /// Student appears to be sleeping.
    WakeUp,
}

/// One chat log entry.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub sender_role: String,
    pub sender_email: String,
    pub body: String,
}

/// What the rendering layer receives from the session.
pub enum SessionUpdate {
    /// Current participant list with flags and track handles.
    Participants(Vec<Participant>),
    Chat(ChatMessage),
    /// Quiz detail payload fetched after `quiz_start`.
    Quiz(serde_json::Value),
    Prompt(EngagementPrompt),
    /// Session is over; no further updates follow.
    Ended,
}
