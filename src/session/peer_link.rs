use std::sync::Arc;

use tokio::sync::mpsc;
use webrtc::api::API;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;

use crate::error::{Result, SessionError};
use crate::session::participant::{ParticipantIdentity, ParticipantRole};
use crate::session::SessionEvent;

use super::media::{rtc_configuration, LocalTracks};

/// Negotiation lifecycle of a peer link. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    OfferSent,
    OfferReceived,
    RemoteDescriptionSet,
    Connected,
    Closed,
}

impl LinkState {
    fn allows(self, next: LinkState) -> bool {
        use LinkState::*;
        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Idle, OfferSent) | (Idle, OfferReceived) => true,
            (OfferSent, RemoteDescriptionSet) | (OfferReceived, RemoteDescriptionSet) => true,
            (RemoteDescriptionSet, Connected) => true,
            _ => false,
        }
    }
}

/// Owns exactly one peer connection per remote participant id, plus the
/// queue of ICE candidates that arrived before the remote description.
pub struct PeerLink {
    pub remote_id: String,
    pub identity: ParticipantIdentity,
    pub role: ParticipantRole,
    pc: Arc<RTCPeerConnection>,
    state: LinkState,
    pending_candidates: Vec<RTCIceCandidateInit>,
}

impl PeerLink {
    /// Build a connection for a remote participant, attach local outbound
    /// tracks (or receive transceivers when media acquisition failed), and
    /// wire candidate/track/state callbacks into the session event queue.
    pub async fn new(
        api: &Arc<API>,
        remote_id: String,
        identity: ParticipantIdentity,
        role: ParticipantRole,
        local_tracks: Option<&LocalTracks>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Self> {
        let pc = Arc::new(
            api.new_peer_connection(rtc_configuration())
                .await
                .map_err(|e| SessionError::PeerConnectionCreation(e.to_string()))?,
        );

        match local_tracks {
            Some(tracks) => {
                pc.add_track(tracks.video.clone())
                    .await
                    .map_err(|e| SessionError::AddTrackFailed(e.to_string()))?;
                pc.add_track(tracks.audio.clone())
                    .await
                    .map_err(|e| SessionError::AddTrackFailed(e.to_string()))?;
            }
            None => {
                // Degraded receive-only link
                pc.add_transceiver_from_kind(RTPCodecType::Video, None).await?;
                pc.add_transceiver_from_kind(RTPCodecType::Audio, None).await?;
            }
        }

        {
            let events = events.clone();
            let remote_id = remote_id.clone();
            pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
                let events = events.clone();
                let remote_id = remote_id.clone();
                Box::pin(async move {
                    if let Some(candidate) = candidate {
                        match candidate.to_json() {
                            Ok(init) => {
                                let _ = events.send(SessionEvent::LocalCandidate {
                                    remote_id,
                                    candidate: init,
                                });
                            }
                            Err(e) => {
                                tracing::warn!(
                                    remote_id = %remote_id,
                                    error = %e,
                                    "Failed to serialize local ICE candidate"
                                );
                            }
                        }
                    }
                })
            }));
        }

        {
            let events = events.clone();
            let remote_id = remote_id.clone();
            pc.on_track(Box::new(move |track, _receiver, _transceiver| {
                let events = events.clone();
                let remote_id = remote_id.clone();
                Box::pin(async move {
                    let _ = events.send(SessionEvent::RemoteTrack { remote_id, track });
                })
            }));
        }

        {
            let remote_id = remote_id.clone();
            pc.on_ice_connection_state_change(Box::new(move |state| {
                tracing::debug!(remote_id = %remote_id, state = %state, "ICE connection state");
                Box::pin(async {})
            }));
        }

        {
            let events = events.clone();
            let remote_id = remote_id.clone();
            pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
                let events = events.clone();
                let remote_id = remote_id.clone();
                Box::pin(async move {
                    let _ = events.send(SessionEvent::LinkStateChanged { remote_id, state });
                })
            }));
        }

        Ok(Self {
            remote_id,
            identity,
            role,
            pc,
            state: LinkState::Idle,
            pending_candidates: Vec::new(),
        })
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn pending_candidate_count(&self) -> usize {
        self.pending_candidates.len()
    }

    fn transition(&mut self, next: LinkState) -> bool {
        if self.state.allows(next) {
            tracing::debug!(
                remote_id = %self.remote_id,
                from = ?self.state,
                to = ?next,
                "Peer link transition"
            );
            self.state = next;
            true
        } else {
            tracing::debug!(
                remote_id = %self.remote_id,
                from = ?self.state,
                to = ?next,
                "Ignoring invalid peer link transition"
            );
            false
        }
    }

    /// Offerer path: create an offer, set it locally, hand it back for the
    /// `offer` signaling message.
    pub async fn create_offer(&mut self) -> Result<RTCSessionDescription> {
        if self.state == LinkState::Closed {
            return Err(SessionError::LinkClosed(self.remote_id.clone()));
        }

        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| SessionError::CreateOfferFailed(e.to_string()))?;
        self.pc
            .set_local_description(offer.clone())
            .await
            .map_err(|e| SessionError::SetLocalDescriptionFailed(e.to_string()))?;

        self.transition(LinkState::OfferSent);
        Ok(offer)
    }

    /// Answerer path: apply the received offer, create and set the answer,
    /// hand it back for the `answer` signaling message.
    pub async fn accept_offer(
        &mut self,
        offer: RTCSessionDescription,
    ) -> Result<RTCSessionDescription> {
        if self.state == LinkState::Closed {
            return Err(SessionError::LinkClosed(self.remote_id.clone()));
        }
        self.transition(LinkState::OfferReceived);

        self.pc
            .set_remote_description(offer)
            .await
            .map_err(|e| SessionError::SetRemoteDescriptionFailed(e.to_string()))?;

        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| SessionError::CreateAnswerFailed(e.to_string()))?;
        self.pc
            .set_local_description(answer.clone())
            .await
            .map_err(|e| SessionError::SetLocalDescriptionFailed(e.to_string()))?;

        self.transition(LinkState::RemoteDescriptionSet);
        self.flush_pending_candidates().await;
        Ok(answer)
    }

    /// Answer completion on the offerer side.
    pub async fn complete_answer(&mut self, answer: RTCSessionDescription) -> Result<()> {
        if self.state == LinkState::Closed {
            return Err(SessionError::LinkClosed(self.remote_id.clone()));
        }

        self.pc
            .set_remote_description(answer)
            .await
            .map_err(|e| SessionError::SetRemoteDescriptionFailed(e.to_string()))?;

        self.transition(LinkState::RemoteDescriptionSet);
        self.flush_pending_candidates().await;
        Ok(())
    }

    /// Apply a remote candidate, or queue it while the remote description is
    /// still pending. Queued candidates are flushed in arrival order.
    pub async fn add_remote_candidate(&mut self, candidate: RTCIceCandidateInit) -> Result<()> {
        if self.state == LinkState::Closed {
            return Err(SessionError::LinkClosed(self.remote_id.clone()));
        }

        if self.pc.remote_description().await.is_none() {
            tracing::debug!(
                remote_id = %self.remote_id,
                queue_size = self.pending_candidates.len() + 1,
                "Queueing ICE candidate until remote description is set"
            );
            self.pending_candidates.push(candidate);
            return Ok(());
        }

        self.pc
            .add_ice_candidate(candidate)
            .await
            .map_err(|e| SessionError::AddIceCandidateFailed(e.to_string()))
    }

    /// Flush queued ICE candidates after the remote description is set.
    async fn flush_pending_candidates(&mut self) {
        if self.pending_candidates.is_empty() {
            return;
        }

        let candidates = std::mem::take(&mut self.pending_candidates);
        tracing::info!(
            remote_id = %self.remote_id,
            count = candidates.len(),
            "Flushing queued ICE candidates"
        );

        for candidate in candidates {
            if let Err(e) = self.pc.add_ice_candidate(candidate).await {
                tracing::error!(
                    remote_id = %self.remote_id,
                    error = %e,
                    "Failed to add queued ICE candidate"
                );
            }
        }
    }

    /// Record the connected transition reported by the connection callbacks.
    pub fn on_connection_state(&mut self, state: RTCPeerConnectionState) {
        match state {
            RTCPeerConnectionState::Connected => {
                self.transition(LinkState::Connected);
            }
            RTCPeerConnectionState::Failed | RTCPeerConnectionState::Disconnected => {
                // Best-effort mesh: observed, never forces closure
                tracing::warn!(remote_id = %self.remote_id, state = %state, "Peer link degraded");
            }
            _ => {}
        }
    }

    /// Close the link. The actor state flips to `Closed` immediately; the
    /// underlying connection close completes on its own task.
    pub fn close(&mut self) {
        if !self.transition(LinkState::Closed) {
            return;
        }
        let pc = self.pc.clone();
        let remote_id = self.remote_id.clone();
        tokio::spawn(async move {
            if let Err(e) = pc.close().await {
                tracing::debug!(remote_id = %remote_id, error = %e, "Peer connection close");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::media::create_api;
    use crate::session::participant::ParticipantIdentity;

    async fn test_link(events: mpsc::UnboundedSender<SessionEvent>) -> PeerLink {
        let api = create_api().unwrap();
        PeerLink::new(
            &api,
            "remote-1".to_string(),
            ParticipantIdentity::camera("peer@example.com"),
            ParticipantRole::Student,
            None,
            events,
        )
        .await
        .unwrap()
    }

    #[test]
    fn test_closed_is_terminal() {
        use LinkState::*;
        assert!(!Closed.allows(Idle));
        assert!(!Closed.allows(OfferSent));
        assert!(!Closed.allows(Connected));
        assert!(!Closed.allows(Closed));
        assert!(Idle.allows(Closed));
        assert!(Connected.allows(Closed));
    }

    #[test]
    fn test_negotiation_transitions() {
        use LinkState::*;
        assert!(Idle.allows(OfferSent));
        assert!(Idle.allows(OfferReceived));
        assert!(OfferSent.allows(RemoteDescriptionSet));
        assert!(RemoteDescriptionSet.allows(Connected));
        assert!(!Idle.allows(Connected));
        assert!(!Connected.allows(OfferSent));
    }

    #[tokio::test]
    async fn test_candidate_before_remote_description_is_buffered() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut link = test_link(tx).await;

        let candidate = RTCIceCandidateInit {
            candidate: "candidate:1 1 udp 2113937151 192.0.2.1 54400 typ host".to_string(),
            ..Default::default()
        };

        link.add_remote_candidate(candidate.clone()).await.unwrap();
        link.add_remote_candidate(candidate).await.unwrap();
        assert_eq!(link.pending_candidate_count(), 2);
    }

    #[tokio::test]
    async fn test_offer_then_answer_flushes_buffered_candidates() {
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, _rx_b) = mpsc::unbounded_channel();
        let mut offerer = test_link(tx_a).await;
        let mut answerer = test_link(tx_b).await;

        let offer = offerer.create_offer().await.unwrap();
        assert_eq!(offerer.state(), LinkState::OfferSent);

        let candidate = RTCIceCandidateInit {
            candidate: "candidate:1 1 udp 2113937151 192.0.2.1 54400 typ host".to_string(),
            ..Default::default()
        };
        answerer.add_remote_candidate(candidate).await.unwrap();
        assert_eq!(answerer.pending_candidate_count(), 1);

        let answer = answerer.accept_offer(offer).await.unwrap();
        assert_eq!(answerer.state(), LinkState::RemoteDescriptionSet);
        assert_eq!(answerer.pending_candidate_count(), 0);

        offerer.complete_answer(answer).await.unwrap();
        assert_eq!(offerer.state(), LinkState::RemoteDescriptionSet);
    }

    #[tokio::test]
    async fn test_closed_link_refuses_operations() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut link = test_link(tx).await;
        link.close();
        assert_eq!(link.state(), LinkState::Closed);

        let err = link.create_offer().await.unwrap_err();
        assert!(matches!(err, SessionError::LinkClosed(_)));

        // Closing again stays terminal and does not panic
        link.close();
        assert_eq!(link.state(), LinkState::Closed);
    }
}
