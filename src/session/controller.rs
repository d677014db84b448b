use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use rand::{distributions::Alphanumeric, Rng};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::{ClassifierClient, ProgressClient, QuizClient};
use crate::config::EngagementConfig;
use crate::engagement::{EngagementAlert, EngagementMonitor, FrameSource};
use crate::error::Result;
use crate::signaling::{ClientMessage, ReportReason, ServerMessage, SignalingTransport};

use super::media::{create_api, LocalTracks, MediaDevices};
use super::media_sync::MediaStateSync;
use super::participant::{MediaFlags, ParticipantKind, ParticipantRole, Roster};
use super::peer_link::LinkState;
use super::peer_manager::{LocalPeer, PeerManager};
use super::{
    ChatMessage, EngagementPrompt, SessionCommand, SessionEvent, SessionUpdate,
};

/// Who and where this session joins as.
#[derive(Debug, Clone)]
pub struct SessionSetup {
    pub signaling_url: String,
    pub room_id: String,
    pub email: String,
    pub role: ParticipantRole,
    pub kind: ParticipantKind,
    pub lecture_id: Option<String>,
    pub engagement: EngagementConfig,
}

/// External collaborators handed in by the embedder.
#[derive(Clone)]
pub struct Collaborators {
    pub media: Arc<dyn MediaDevices>,
    /// Camera render surface for engagement snapshots; absent disables the
    /// pipeline entirely.
    pub frames: Option<Arc<dyn FrameSource>>,
    /// Screen capture device layer; absent disables local screen publishing.
    pub screen_media: Option<Arc<dyn MediaDevices>>,
    pub classifier: ClassifierClient,
    pub quiz: QuizClient,
    pub progress: ProgressClient,
}

fn generate_connection_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

/// The session actor. Owns the roster and link map exclusively; every
/// mutation happens inside `process_event`, one event at a time.
pub struct SessionController {
    setup: SessionSetup,
    local: LocalPeer,
    peers: PeerManager,
    roster: Roster,
    media_sync: MediaStateSync,
    monitor: EngagementMonitor,
    frames: Option<Arc<dyn FrameSource>>,
    screen_media: Option<Arc<dyn MediaDevices>>,
    classifier: ClassifierClient,
    quiz: QuizClient,
    progress: ProgressClient,
    outbound: mpsc::UnboundedSender<ClientMessage>,
    events: mpsc::UnboundedSender<SessionEvent>,
    updates: mpsc::UnboundedSender<SessionUpdate>,
    transport: Option<Arc<SignalingTransport>>,
    screen_child: Option<SessionHandle>,
    chat_log: Vec<ChatMessage>,
    torn_down: bool,
}

impl SessionController {
    pub fn new(
        setup: SessionSetup,
        collaborators: Collaborators,
        outbound: mpsc::UnboundedSender<ClientMessage>,
        events: mpsc::UnboundedSender<SessionEvent>,
        updates: mpsc::UnboundedSender<SessionUpdate>,
    ) -> Result<Self> {
        let api = create_api()?;

        let local = LocalPeer {
            id: generate_connection_id(),
            email: setup.email.clone(),
            role: setup.role,
            kind: setup.kind,
        };

        // Camera and mic tracks exist from the start but disabled; when the
        // device layer refuses, peers still get a receive-only link
        let local_tracks: Option<LocalTracks> = match collaborators.media.acquire() {
            Ok(tracks) => Some(tracks),
            Err(e) => {
                tracing::warn!(error = %e, "Local media unavailable, joining receive-only");
                None
            }
        };

        let peers = PeerManager::new(
            api,
            local.clone(),
            local_tracks,
            events.clone(),
            outbound.clone(),
        );
        let media_sync = MediaStateSync::new(local.id.clone(), local.wire_email());
        let monitor = EngagementMonitor::new(setup.engagement.clone());

        Ok(Self {
            setup,
            local,
            peers,
            roster: Roster::new(),
            media_sync,
            monitor,
            frames: collaborators.frames,
            screen_media: collaborators.screen_media,
            classifier: collaborators.classifier,
            quiz: collaborators.quiz,
            progress: collaborators.progress,
            outbound,
            events,
            updates,
            transport: None,
            screen_child: None,
            chat_log: Vec::new(),
            torn_down: false,
        })
    }

    pub fn attach_transport(&mut self, transport: Arc<SignalingTransport>) {
        self.transport = Some(transport);
    }

    pub fn local_id(&self) -> &str {
        &self.local.id
    }

    pub fn media_flags(&self) -> MediaFlags {
        self.media_sync.flags()
    }

    pub fn participant_count(&self) -> usize {
        self.roster.len()
    }

    pub fn peer_link_state(&self, remote_id: &str) -> Option<LinkState> {
        self.peers.link_state(remote_id)
    }

    pub fn peer_pending_candidates(&self, remote_id: &str) -> Option<usize> {
        self.peers.pending_candidate_count(remote_id)
    }

    pub fn engagement_generation(&self) -> u64 {
        self.monitor.generation()
    }

    pub fn chat_log(&self) -> &[ChatMessage] {
        &self.chat_log
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn engagement_running(&self) -> bool {
        self.monitor.is_running()
    }

    fn engagement_available(&self) -> bool {
        self.local.kind == ParticipantKind::Camera && self.frames.is_some()
    }

    fn send(&self, message: ClientMessage) {
        if self.outbound.send(message).is_err() {
            tracing::debug!("Outbound channel closed, message dropped");
        }
    }

    fn emit_participants(&self) {
        let _ = self
            .updates
            .send(SessionUpdate::Participants(self.roster.snapshot()));
    }

    /// Announce ourselves to the room with everything disabled.
    pub fn announce_join(&self) {
        self.send(ClientMessage::JoinRoom {
            room: self.setup.room_id.clone(),
            email: self.local.wire_email(),
            user_role: self.local.wire_role(),
            video_enabled: false,
            audio_enabled: false,
            audio_disabled_by_teacher: false,
        });
        tracing::info!(
            room_id = %self.setup.room_id,
            local_id = %self.local.id,
            "Joined room"
        );
    }

    /// Drive the actor until the queue closes or the session tears down.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
        while let Some(event) = events.recv().await {
            self.process_event(event).await;
            if self.torn_down {
                break;
            }
        }
        self.teardown();
    }

    /// Handle one event. Public so embedders and tests can drive the actor
    /// directly; `run` is a thin loop over this.
    pub async fn process_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Signal(message) => self.process_signal(message).await,
            SessionEvent::LocalCandidate {
                remote_id,
                candidate,
            } => {
                self.peers.handle_local_candidate(&remote_id, candidate);
            }
            SessionEvent::RemoteTrack { remote_id, track } => {
                self.peers
                    .handle_remote_track(&remote_id, track, &mut self.roster);
                self.emit_participants();
            }
            SessionEvent::LinkStateChanged { remote_id, state } => {
                self.peers.handle_link_state(&remote_id, state);
            }
            SessionEvent::EngagementSample { class, generation } => {
                self.process_sample(class, generation);
            }
            SessionEvent::Command(command) => self.process_command(command).await,
            SessionEvent::ScreenPublisherReady(handle) => {
                // The share may have been toggled off or banned while the
                // child was connecting
                if self.torn_down || !self.media_sync.flags().screen_share_enabled {
                    handle.leave();
                    return;
                }
                tracing::info!("Screen-share publisher started");
                self.screen_child = Some(handle);
            }
            SessionEvent::TransportClosed => {
                tracing::warn!("Signaling transport lost, ending session");
                self.teardown();
            }
        }
    }

    async fn process_signal(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::AllUsers(entries) => {
                tracing::info!(count = entries.len(), "Roster received");
                self.peers.handle_roster(entries, &mut self.roster).await;
                self.emit_participants();
            }

            ServerMessage::GetOffer {
                sdp,
                offer_send_id,
                offer_send_email,
                offer_send_role,
                offer_send_video_enabled,
                offer_send_audio_enabled,
                offer_send_audio_disabled_by_teacher,
                offer_send_screen_share_enabled,
                offer_send_screen_share_disabled_by_teacher,
            } => {
                let flags = MediaFlags {
                    video_enabled: offer_send_video_enabled,
                    audio_enabled: offer_send_audio_enabled,
                    audio_disabled_by_teacher: offer_send_audio_disabled_by_teacher,
                    screen_share_enabled: offer_send_screen_share_enabled,
                    screen_share_disabled_by_teacher: offer_send_screen_share_disabled_by_teacher,
                };
                self.peers
                    .handle_offer(
                        offer_send_id,
                        offer_send_email,
                        offer_send_role,
                        flags,
                        sdp,
                        &mut self.roster,
                    )
                    .await;
                self.emit_participants();
            }

            ServerMessage::GetAnswer {
                sdp,
                answer_send_id,
            } => {
                self.peers.handle_answer(&answer_send_id, sdp).await;
            }

            ServerMessage::GetCandidate {
                candidate,
                candidate_send_id,
            } => {
                self.peers
                    .handle_remote_candidate(&candidate_send_id, candidate)
                    .await;
            }

            ServerMessage::UserExit { id } => {
                self.peers.remove(&id, &mut self.roster);
                self.emit_participants();
            }

            ServerMessage::UpdateMedia {
                user_id,
                video_enabled,
                audio_enabled,
                audio_disabled_by_teacher,
                screen_share_enabled,
                screen_share_disabled_by_teacher,
            } => {
                let flags = MediaFlags {
                    video_enabled,
                    audio_enabled,
                    audio_disabled_by_teacher,
                    screen_share_enabled,
                    screen_share_disabled_by_teacher,
                };
                self.media_sync
                    .apply_peer_update(&mut self.roster, &user_id, flags);
                self.emit_participants();
            }

            ServerMessage::ToggleStudentMic {
                user_id,
                audio_disabled_by_teacher,
            } => {
                if user_id == self.local.id {
                    let ack = self.media_sync.teacher_mic_override(audio_disabled_by_teacher);
                    self.send(ack);
                }
                self.media_sync.apply_peer_mic_override(
                    &mut self.roster,
                    &user_id,
                    audio_disabled_by_teacher,
                );
                self.emit_participants();
            }

            ServerMessage::ToggleStudentScreenShare {
                user_id,
                user_email,
                screen_share_disabled_by_teacher,
            } => {
                // The ban may address the camera identity while the
                // publisher runs under the screen identity; match on email
                if user_email == self.local.email {
                    let ack = self
                        .media_sync
                        .teacher_screen_share_override(screen_share_disabled_by_teacher);
                    self.send(ack);
                    self.stop_screen_publisher();
                }
                self.media_sync.apply_peer_screen_share_override(
                    &mut self.roster,
                    &user_id,
                    screen_share_disabled_by_teacher,
                );
                self.emit_participants();
            }

            ServerMessage::ReceiveChat {
                sender_role,
                sender_email,
                received_chat,
            } => {
                let entry = ChatMessage {
                    sender_role,
                    sender_email,
                    body: received_chat,
                };
                self.chat_log.push(entry.clone());
                let _ = self.updates.send(SessionUpdate::Chat(entry));
            }

            ServerMessage::QuizStart { quiz_id } => {
                if self.local.kind != ParticipantKind::Camera {
                    return;
                }
                tracing::info!(quiz_id = %quiz_id, "Quiz started");
                let quiz = self.quiz.clone();
                let updates = self.updates.clone();
                tokio::spawn(async move {
                    match quiz.fetch_detail(&quiz_id).await {
                        Ok(detail) => {
                            let _ = updates.send(SessionUpdate::Quiz(detail));
                        }
                        Err(e) => {
                            tracing::warn!(quiz_id = %quiz_id, error = %e, "Quiz fetch failed");
                        }
                    }
                });
            }

            ServerMessage::LectureEnd => {
                tracing::info!("Lecture ended by teacher");
                self.teardown();
            }
        }
    }

    async fn process_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::ToggleVideo => {
                let (enabled, broadcast) = self.media_sync.toggle_video();
                self.send(broadcast);

                // Video off is the at-desk monitoring mode
                if self.engagement_available() {
                    if enabled {
                        self.monitor.stop();
                    } else if let Some(frames) = self.frames.clone() {
                        self.monitor
                            .start(frames, self.classifier.clone(), self.events.clone());
                    }
                }
            }

            SessionCommand::ToggleAudio => {
                if let Some(broadcast) = self.media_sync.toggle_audio() {
                    self.send(broadcast);
                }
            }

            SessionCommand::ToggleScreenShare => {
                if let Some((enabled, broadcast)) = self.media_sync.toggle_screen_share() {
                    self.send(broadcast);
                    if enabled {
                        self.start_screen_publisher();
                    } else {
                        self.stop_screen_publisher();
                    }
                }
            }

            SessionCommand::SendChat(body) => {
                if body.trim().is_empty() {
                    return;
                }
                self.send(ClientMessage::SendChat {
                    sender_role: self.local.wire_role(),
                    sender_email: self.local.wire_email(),
                    message: body,
                });
            }

            SessionCommand::Leave => {
                self.teardown();
            }
        }
    }

    fn process_sample(&mut self, class: crate::engagement::EngagementClass, generation: u64) {
        let outcome = self.monitor.on_sample(class, generation);

        if let Some(alert) = outcome.alert {
            let (reason, prompt) = match alert {
                EngagementAlert::Afk => (ReportReason::Afk, EngagementPrompt::ComeBack),
                EngagementAlert::Drowsy => (ReportReason::Sleep, EngagementPrompt::WakeUp),
            };
            tracing::warn!(reason = ?reason, "Engagement threshold fired");

            self.send(ClientMessage::ReportToTeacher {
                user_id: self.local.id.clone(),
                email: self.local.email.clone(),
                reason,
            });
            let _ = self.updates.send(SessionUpdate::Prompt(prompt));
        }

        if let Some(minutes) = outcome.rollup_minutes {
            self.report_progress(minutes);
        }
    }

    /// Fire-and-forget progress write; failures are logged, never surfaced.
    fn report_progress(&self, minutes: u64) {
        let Some(lecture_id) = self.setup.lecture_id.clone() else {
            return;
        };
        let progress = self.progress.clone();
        tokio::spawn(async move {
            if let Err(e) = progress.report_sleep_time(&lecture_id, minutes).await {
                tracing::warn!(lecture_id = %lecture_id, error = %e, "Progress report failed");
            }
        });
    }

    /// Spawn the screen-share child session publishing under the suffixed
    /// identity with its own transport and link set. Connecting happens off
    /// the actor; the handle arrives back as an event.
    fn start_screen_publisher(&mut self) {
        if self.screen_child.is_some() {
            return;
        }
        let Some(screen_media) = self.screen_media.clone() else {
            tracing::debug!("No screen media source configured, share is flags-only");
            return;
        };

        let setup = SessionSetup {
            signaling_url: self.setup.signaling_url.clone(),
            room_id: self.setup.room_id.clone(),
            email: self.local.email.clone(),
            role: self.local.role,
            kind: ParticipantKind::ScreenShare,
            lecture_id: None,
            engagement: self.setup.engagement.clone(),
        };
        let collaborators = Collaborators {
            media: screen_media,
            frames: None,
            screen_media: None,
            classifier: self.classifier.clone(),
            quiz: self.quiz.clone(),
            progress: self.progress.clone(),
        };

        let events = self.events.clone();
        tokio::spawn(async move {
            match Session::connect(setup, collaborators).await {
                Ok((handle, _updates)) => {
                    let _ = events.send(SessionEvent::ScreenPublisherReady(handle));
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to start screen-share publisher");
                }
            }
        });
    }

    fn stop_screen_publisher(&mut self) {
        if let Some(child) = self.screen_child.take() {
            tracing::info!("Screen-share publisher stopped");
            child.leave();
        }
    }

    /// Tear the session down. Safe to call any number of times.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        tracing::info!(room_id = %self.setup.room_id, "Tearing down session");

        self.monitor.stop();

        // Final inattentive-time flush for the lecture record
        let minutes = self.monitor.inattentive_minutes();
        if minutes > 0 {
            self.report_progress(minutes);
        }

        self.stop_screen_publisher();

        if let Some(transport) = &self.transport {
            transport.disconnect();
        }

        self.peers.close_all(&mut self.roster);
        let _ = self.updates.send(SessionUpdate::Ended);
    }
}

/// Consumer-facing handle; commands are delivered through the session's
/// event queue and processed in order with everything else.
pub struct SessionHandle {
    events: mpsc::UnboundedSender<SessionEvent>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn toggle_video(&self) {
        let _ = self
            .events
            .send(SessionEvent::Command(SessionCommand::ToggleVideo));
    }

    pub fn toggle_audio(&self) {
        let _ = self
            .events
            .send(SessionEvent::Command(SessionCommand::ToggleAudio));
    }

    pub fn toggle_screen_share(&self) {
        let _ = self
            .events
            .send(SessionEvent::Command(SessionCommand::ToggleScreenShare));
    }

    pub fn send_chat(&self, body: impl Into<String>) {
        let _ = self
            .events
            .send(SessionEvent::Command(SessionCommand::SendChat(body.into())));
    }

    pub fn leave(&self) {
        let _ = self
            .events
            .send(SessionEvent::Command(SessionCommand::Leave));
    }

    /// Wait for the actor to finish (after `leave` or `lecture_end`).
    pub async fn wait(self) {
        let _ = self.task.await;
    }
}

/// Entry point wiring a controller to a live signaling connection.
pub struct Session;

impl Session {
    pub async fn connect(
        setup: SessionSetup,
        collaborators: Collaborators,
    ) -> Result<(SessionHandle, mpsc::UnboundedReceiver<SessionUpdate>)> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ClientMessage>();
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();

        let mut controller = SessionController::new(
            setup.clone(),
            collaborators,
            outbound_tx,
            events_tx.clone(),
            updates_tx,
        )?;

        let transport = Arc::new(
            SignalingTransport::connect(&setup.signaling_url, events_tx.clone()).await?,
        );
        controller.attach_transport(transport.clone());

        // Pump queued outbound messages onto the wire
        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                transport.send(message);
            }
        });

        controller.announce_join();

        // Boxed so the screen-share child (a session within a session) does
        // not recurse the future type
        let run: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(controller.run(events_rx));
        let task = tokio::spawn(run);

        Ok((
            SessionHandle {
                events: events_tx,
                task,
            },
            updates_rx,
        ))
    }
}
