use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use webrtc::api::API;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::track::track_remote::TrackRemote;

use crate::signaling::{ClientMessage, RosterEntry};

use super::media::LocalTracks;
use super::participant::{
    parse_wire_role, wire_role, MediaFlags, Participant, ParticipantIdentity, ParticipantKind,
    ParticipantRole, Roster,
};
use super::peer_link::{LinkState, PeerLink};
use super::SessionEvent;

/// The local end of the session as it appears to the relay.
#[derive(Debug, Clone)]
pub struct LocalPeer {
    pub id: String,
    pub email: String,
    pub role: ParticipantRole,
    pub kind: ParticipantKind,
}

impl LocalPeer {
    pub fn wire_email(&self) -> String {
        ParticipantIdentity {
            email: self.email.clone(),
            kind: self.kind,
        }
        .wire_email()
    }

    pub fn wire_role(&self) -> String {
        wire_role(self.role, self.kind)
    }

    /// True when `identity` denotes this participant's own screen-share
    /// publisher, the one remote identity that must never be peered with.
    fn is_own_screen_share(&self, identity: &ParticipantIdentity) -> bool {
        identity.kind == ParticipantKind::ScreenShare && identity.email == self.email
    }
}

/// Maintains the remote-id → PeerLink mapping and drives offer/answer/ICE
/// exchange. All mutation happens on the session actor; callbacks feed
/// results back through the event queue.
pub struct PeerManager {
    api: Arc<API>,
    local: LocalPeer,
    local_tracks: Option<LocalTracks>,
    links: HashMap<String, PeerLink>,
    events: mpsc::UnboundedSender<SessionEvent>,
    outbound: mpsc::UnboundedSender<ClientMessage>,
}

impl PeerManager {
    pub fn new(
        api: Arc<API>,
        local: LocalPeer,
        local_tracks: Option<LocalTracks>,
        events: mpsc::UnboundedSender<SessionEvent>,
        outbound: mpsc::UnboundedSender<ClientMessage>,
    ) -> Self {
        Self {
            api,
            local,
            local_tracks,
            links: HashMap::new(),
            events,
            outbound,
        }
    }

    pub fn local(&self) -> &LocalPeer {
        &self.local
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn link_state(&self, remote_id: &str) -> Option<LinkState> {
        self.links.get(remote_id).map(|link| link.state())
    }

    pub fn pending_candidate_count(&self, remote_id: &str) -> Option<usize> {
        self.links
            .get(remote_id)
            .map(|link| link.pending_candidate_count())
    }

    async fn create_link(
        &mut self,
        remote_id: &str,
        identity: ParticipantIdentity,
        role: ParticipantRole,
    ) -> Option<&mut PeerLink> {
        if self.local.is_own_screen_share(&identity) {
            tracing::debug!(remote_id = %remote_id, "Skipping own screen-share identity");
            return None;
        }

        if let Some(existing) = self.links.get_mut(remote_id) {
            if existing.state() != LinkState::Closed {
                tracing::warn!(remote_id = %remote_id, "Replacing existing peer link");
            }
            existing.close();
        }

        match PeerLink::new(
            &self.api,
            remote_id.to_string(),
            identity,
            role,
            self.local_tracks.as_ref(),
            self.events.clone(),
        )
        .await
        {
            Ok(link) => {
                self.links.insert(remote_id.to_string(), link);
                self.links.get_mut(remote_id)
            }
            Err(e) => {
                tracing::error!(remote_id = %remote_id, error = %e, "Failed to create peer link");
                None
            }
        }
    }

    /// Offerer path: one link and one offer per roster entry.
    pub async fn handle_roster(&mut self, entries: Vec<RosterEntry>, roster: &mut Roster) {
        for entry in entries {
            let identity = ParticipantIdentity::from_wire(&entry.email);
            let role = parse_wire_role(&entry.user_role);

            let Some(link) = self.create_link(&entry.id, identity, role).await else {
                continue;
            };

            let offer = match link.create_offer().await {
                Ok(offer) => offer,
                Err(e) => {
                    tracing::error!(remote_id = %entry.id, error = %e, "Offer creation failed");
                    continue;
                }
            };

            roster.insert(Participant::from_roster_entry(&entry));

            let message = ClientMessage::Offer {
                sdp: offer,
                offer_send_id: self.local.id.clone(),
                offer_send_email: self.local.wire_email(),
                offer_send_role: self.local.wire_role(),
                offer_receive_id: entry.id.clone(),
            };
            if self.outbound.send(message).is_err() {
                tracing::warn!(remote_id = %entry.id, "Outbound channel closed, offer dropped");
            }
        }
    }

    /// Answerer path for an incoming offer.
    pub async fn handle_offer(
        &mut self,
        offer_send_id: String,
        offer_send_email: String,
        offer_send_role: String,
        flags: MediaFlags,
        sdp: RTCSessionDescription,
        roster: &mut Roster,
    ) {
        let identity = ParticipantIdentity::from_wire(&offer_send_email);
        let role = parse_wire_role(&offer_send_role);

        let Some(link) = self.create_link(&offer_send_id, identity.clone(), role).await else {
            return;
        };

        let answer = match link.accept_offer(sdp).await {
            Ok(answer) => answer,
            Err(e) => {
                // Link stays in its last good state; the common cause is a
                // peer exit racing the negotiation
                tracing::error!(remote_id = %offer_send_id, error = %e, "Answer creation failed");
                return;
            }
        };

        roster.insert(Participant {
            id: offer_send_id.clone(),
            identity,
            role,
            flags,
            tracks: Vec::new(),
        });

        let message = ClientMessage::Answer {
            sdp: answer,
            answer_send_id: self.local.id.clone(),
            answer_receive_id: offer_send_id.clone(),
        };
        if self.outbound.send(message).is_err() {
            tracing::warn!(remote_id = %offer_send_id, "Outbound channel closed, answer dropped");
        }
    }

    /// Answer completion; a missing link is a benign race with `user_exit`.
    pub async fn handle_answer(&mut self, answer_send_id: &str, sdp: RTCSessionDescription) {
        let Some(link) = self.links.get_mut(answer_send_id) else {
            tracing::debug!(remote_id = %answer_send_id, "Late answer for removed link ignored");
            return;
        };

        if let Err(e) = link.complete_answer(sdp).await {
            tracing::error!(remote_id = %answer_send_id, error = %e, "Failed to apply answer");
        }
    }

    /// Remote candidate ingestion; unknown ids are ignored.
    pub async fn handle_remote_candidate(
        &mut self,
        candidate_send_id: &str,
        candidate: RTCIceCandidateInit,
    ) {
        let Some(link) = self.links.get_mut(candidate_send_id) else {
            tracing::debug!(remote_id = %candidate_send_id, "Candidate for unknown link ignored");
            return;
        };

        if let Err(e) = link.add_remote_candidate(candidate).await {
            tracing::error!(remote_id = %candidate_send_id, error = %e, "Failed to add candidate");
        }
    }

    /// Locally gathered candidate, emitted to the peer it belongs to.
    pub fn handle_local_candidate(&mut self, remote_id: &str, candidate: RTCIceCandidateInit) {
        let Some(link) = self.links.get(remote_id) else {
            tracing::debug!(remote_id = %remote_id, "Local candidate for removed link dropped");
            return;
        };
        if link.state() == LinkState::Closed {
            return;
        }

        let message = ClientMessage::Candidate {
            candidate,
            candidate_send_id: self.local.id.clone(),
            candidate_receive_id: remote_id.to_string(),
        };
        if self.outbound.send(message).is_err() {
            tracing::warn!(remote_id = %remote_id, "Outbound channel closed, candidate dropped");
        }
    }

    /// Remote track arrival, attached to the owning Participant.
    pub fn handle_remote_track(
        &mut self,
        remote_id: &str,
        track: Arc<TrackRemote>,
        roster: &mut Roster,
    ) {
        match roster.get_mut(remote_id) {
            Some(participant) => {
                tracing::info!(
                    remote_id = %remote_id,
                    track_id = %track.id(),
                    "Remote track attached"
                );
                participant.tracks.push(track);
            }
            None => {
                tracing::debug!(remote_id = %remote_id, "Track for unknown participant ignored");
            }
        }
    }

    pub fn handle_link_state(&mut self, remote_id: &str, state: RTCPeerConnectionState) {
        if let Some(link) = self.links.get_mut(remote_id) {
            link.on_connection_state(state);
        }
    }

    /// Close and remove the link and its Participant entry atomically.
    /// Safe to call when the link is already absent.
    pub fn remove(&mut self, remote_id: &str, roster: &mut Roster) {
        if let Some(mut link) = self.links.remove(remote_id) {
            link.close();
            tracing::info!(remote_id = %remote_id, "Peer link closed");
        }
        roster.remove(remote_id);
    }

    /// Session teardown: every link closed, participant set cleared.
    pub fn close_all(&mut self, roster: &mut Roster) {
        for (remote_id, link) in self.links.iter_mut() {
            link.close();
            tracing::debug!(remote_id = %remote_id, "Peer link closed on teardown");
        }
        self.links.clear();
        roster.clear();
    }
}
