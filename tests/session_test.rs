// Actor-level tests for the session controller. Every scenario drives the
// controller through its event queue with an injected outbound channel,
// so no live signaling relay is required.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use classroom_session::api::{ClassifierClient, ProgressClient, QuizClient};
use classroom_session::config::EngagementConfig;
use classroom_session::engagement::{EngagementClass, StaticFrameSource};
use classroom_session::session::{
    Collaborators, LinkState, ParticipantKind, ParticipantRole, RtpMediaDevices,
    SessionCommand, SessionController, SessionEvent, SessionSetup, SessionUpdate,
};
use classroom_session::signaling::messages::{ClientMessage, ReportReason, RosterEntry, ServerMessage};

struct Harness {
    controller: SessionController,
    outbound: mpsc::UnboundedReceiver<ClientMessage>,
    updates: mpsc::UnboundedReceiver<SessionUpdate>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
}

fn harness() -> Harness {
    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (updates_tx, updates_rx) = mpsc::unbounded_channel();

    let collaborators = Collaborators {
        media: Arc::new(RtpMediaDevices::new("test")),
        frames: Some(Arc::new(StaticFrameSource::gray(64, 64))),
        screen_media: None,
        classifier: ClassifierClient::new("http://127.0.0.1:1/drowsiness", Duration::from_secs(1))
            .unwrap(),
        quiz: QuizClient::new("http://127.0.0.1:1", None),
        progress: ProgressClient::new("http://127.0.0.1:1", None),
    };

    let setup = SessionSetup {
        signaling_url: "ws://127.0.0.1:1".to_string(),
        room_id: "room-1".to_string(),
        email: "student@example.com".to_string(),
        role: ParticipantRole::Student,
        kind: ParticipantKind::Camera,
        lecture_id: None,
        engagement: EngagementConfig::default(),
    };

    let controller = SessionController::new(
        setup,
        collaborators,
        outbound_tx,
        events_tx.clone(),
        updates_tx,
    )
    .unwrap();

    Harness {
        controller,
        outbound: outbound_rx,
        updates: updates_rx,
        events_tx,
    }
}

fn roster_entry(id: &str, email: &str, role: &str) -> RosterEntry {
    RosterEntry {
        id: id.to_string(),
        email: email.to_string(),
        user_role: role.to_string(),
        video_enabled: false,
        audio_enabled: false,
        audio_disabled_by_teacher: false,
        screen_share_enabled: false,
        screen_share_disabled_by_teacher: false,
    }
}

async fn signal(harness: &mut Harness, message: ServerMessage) {
    harness
        .controller
        .process_event(SessionEvent::Signal(message))
        .await;
}

async fn command(harness: &mut Harness, command: SessionCommand) {
    harness
        .controller
        .process_event(SessionEvent::Command(command))
        .await;
}

#[tokio::test]
async fn roster_triggers_offer_per_peer() {
    let mut harness = harness();
    harness.controller.announce_join();

    match harness.outbound.recv().await.unwrap() {
        ClientMessage::JoinRoom {
            room, user_role, ..
        } => {
            assert_eq!(room, "room-1");
            assert_eq!(user_role, "student");
        }
        other => panic!("expected join_room, got {:?}", other),
    }

    signal(
        &mut harness,
        ServerMessage::AllUsers(vec![
            roster_entry("peer-1", "teacher@example.com", "teacher"),
            roster_entry("peer-2", "other@example.com", "student"),
        ]),
    )
    .await;

    assert_eq!(harness.controller.participant_count(), 2);
    for _ in 0..2 {
        match harness.outbound.recv().await.unwrap() {
            ClientMessage::Offer { offer_send_id, .. } => {
                assert_eq!(offer_send_id, harness.controller.local_id());
            }
            other => panic!("expected offer, got {:?}", other),
        }
    }
    assert_eq!(
        harness.controller.peer_link_state("peer-1"),
        Some(LinkState::OfferSent)
    );
}

#[tokio::test]
async fn candidate_before_answer_is_buffered_then_flushed() {
    let mut offerer = harness();
    let mut answerer = harness();

    // Offerer learns about the answerer from the roster
    signal(
        &mut offerer,
        ServerMessage::AllUsers(vec![roster_entry("peer-b", "b@example.com", "student")]),
    )
    .await;
    let offer_sdp = match offerer.outbound.recv().await.unwrap() {
        ClientMessage::Offer { sdp, .. } => sdp,
        other => panic!("expected offer, got {:?}", other),
    };

    // A candidate for the pending link arrives before the answer
    let candidate = webrtc::ice_transport::ice_candidate::RTCIceCandidateInit {
        candidate: "candidate:1 1 udp 2113937151 192.0.2.1 54400 typ host".to_string(),
        ..Default::default()
    };
    signal(
        &mut offerer,
        ServerMessage::GetCandidate {
            candidate,
            candidate_send_id: "peer-b".to_string(),
        },
    )
    .await;
    assert_eq!(offerer.controller.peer_pending_candidates("peer-b"), Some(1));

    // Answerer handles the offer and produces the answer
    signal(
        &mut answerer,
        ServerMessage::GetOffer {
            sdp: offer_sdp,
            offer_send_id: "peer-a".to_string(),
            offer_send_email: "a@example.com".to_string(),
            offer_send_role: "student".to_string(),
            offer_send_video_enabled: false,
            offer_send_audio_enabled: false,
            offer_send_audio_disabled_by_teacher: false,
            offer_send_screen_share_enabled: false,
            offer_send_screen_share_disabled_by_teacher: false,
        },
    )
    .await;
    assert_eq!(
        answerer.controller.peer_link_state("peer-a"),
        Some(LinkState::RemoteDescriptionSet)
    );
    let answer_sdp = match answerer.outbound.recv().await.unwrap() {
        ClientMessage::Answer { sdp, .. } => sdp,
        other => panic!("expected answer, got {:?}", other),
    };

    // The answer flushes the buffered candidate
    signal(
        &mut offerer,
        ServerMessage::GetAnswer {
            sdp: answer_sdp,
            answer_send_id: "peer-b".to_string(),
        },
    )
    .await;
    assert_eq!(
        offerer.controller.peer_link_state("peer-b"),
        Some(LinkState::RemoteDescriptionSet)
    );
    assert_eq!(offerer.controller.peer_pending_candidates("peer-b"), Some(0));
}

#[tokio::test]
async fn late_answer_after_exit_is_noop() {
    let mut harness = harness();

    signal(
        &mut harness,
        ServerMessage::AllUsers(vec![roster_entry("abc", "x@example.com", "student")]),
    )
    .await;
    let answer_sdp = match harness.outbound.recv().await.unwrap() {
        // Any valid description works for the race; reuse our own offer
        ClientMessage::Offer { sdp, .. } => sdp,
        other => panic!("expected offer, got {:?}", other),
    };

    signal(&mut harness, ServerMessage::UserExit { id: "abc".to_string() }).await;
    assert_eq!(harness.controller.participant_count(), 0);
    assert_eq!(harness.controller.peer_link_state("abc"), None);

    // The in-flight answer lands after the exit; it must be swallowed
    signal(
        &mut harness,
        ServerMessage::GetAnswer {
            sdp: answer_sdp,
            answer_send_id: "abc".to_string(),
        },
    )
    .await;
    assert_eq!(harness.controller.peer_link_state("abc"), None);

    // As must a repeated exit
    signal(&mut harness, ServerMessage::UserExit { id: "abc".to_string() }).await;
}

#[tokio::test]
async fn teacher_mute_flow_matches_contract() {
    let mut harness = harness();
    let local_id = harness.controller.local_id().to_string();

    // Teacher disables the student's mic
    signal(
        &mut harness,
        ServerMessage::ToggleStudentMic {
            user_id: local_id.clone(),
            audio_disabled_by_teacher: true,
        },
    )
    .await;

    match harness.outbound.recv().await.unwrap() {
        ClientMessage::ToggleStudentMicComplete {
            audio_enabled,
            audio_disabled_by_teacher,
            ..
        } => {
            assert!(!audio_enabled);
            assert!(audio_disabled_by_teacher);
        }
        other => panic!("expected mic ack, got {:?}", other),
    }
    assert!(!harness.controller.media_flags().audio_enabled);

    // The student's own toggle is refused: no broadcast leaves the client
    command(&mut harness, SessionCommand::ToggleAudio).await;
    assert!(harness.outbound.try_recv().is_err());
    assert!(!harness.controller.media_flags().audio_enabled);

    // Teacher re-allows; audio stays off until the student toggles
    signal(
        &mut harness,
        ServerMessage::ToggleStudentMic {
            user_id: local_id,
            audio_disabled_by_teacher: false,
        },
    )
    .await;
    let _ack = harness.outbound.recv().await.unwrap();
    assert!(!harness.controller.media_flags().audio_enabled);

    command(&mut harness, SessionCommand::ToggleAudio).await;
    match harness.outbound.recv().await.unwrap() {
        ClientMessage::ToggleMedia { audio_enabled, .. } => assert!(audio_enabled),
        other => panic!("expected toggle_media, got {:?}", other),
    }
}

#[tokio::test]
async fn peer_flags_converge_on_latest_broadcast() {
    let mut harness = harness();

    signal(
        &mut harness,
        ServerMessage::AllUsers(vec![roster_entry("peer-1", "p@example.com", "student")]),
    )
    .await;

    // Stale update followed by the latest full-state broadcast
    for audio in [false, true] {
        signal(
            &mut harness,
            ServerMessage::UpdateMedia {
                user_id: "peer-1".to_string(),
                video_enabled: true,
                audio_enabled: audio,
                audio_disabled_by_teacher: false,
                screen_share_enabled: false,
                screen_share_disabled_by_teacher: false,
            },
        )
        .await;
    }

    // Unknown participant ids are ignored
    signal(
        &mut harness,
        ServerMessage::UpdateMedia {
            user_id: "gone".to_string(),
            video_enabled: true,
            audio_enabled: true,
            audio_disabled_by_teacher: false,
            screen_share_enabled: false,
            screen_share_disabled_by_teacher: false,
        },
    )
    .await;

    // The last participants snapshot reflects the latest broadcast exactly
    let mut last = None;
    while let Ok(update) = harness.updates.try_recv() {
        if let SessionUpdate::Participants(participants) = update {
            last = Some(participants);
        }
    }
    let participants = last.unwrap();
    assert_eq!(participants.len(), 1);
    let flags = participants.iter().find(|p| p.id == "peer-1").unwrap().flags;
    assert!(flags.video_enabled);
    assert!(flags.audio_enabled);
}

#[tokio::test]
async fn full_away_window_reports_afk_once() {
    let mut harness = harness();

    // Video on, then off: engagement monitoring starts
    command(&mut harness, SessionCommand::ToggleVideo).await;
    command(&mut harness, SessionCommand::ToggleVideo).await;
    assert!(harness.controller.engagement_running());
    let generation = harness.controller.engagement_generation();

    // Drain the two toggle broadcasts
    let _ = harness.outbound.recv().await.unwrap();
    let _ = harness.outbound.recv().await.unwrap();

    for _ in 0..10 {
        harness
            .controller
            .process_event(SessionEvent::EngagementSample {
                class: EngagementClass::Away,
                generation,
            })
            .await;
    }

    match harness.outbound.recv().await.unwrap() {
        ClientMessage::ReportToTeacher { reason, email, .. } => {
            assert_eq!(reason, ReportReason::Afk);
            assert_eq!(email, "student@example.com");
        }
        other => panic!("expected report_to_teacher, got {:?}", other),
    }
    assert!(harness.outbound.try_recv().is_err());

    let mut prompts = 0;
    while let Ok(update) = harness.updates.try_recv() {
        if matches!(update, SessionUpdate::Prompt(_)) {
            prompts += 1;
        }
    }
    assert_eq!(prompts, 1);
}

#[tokio::test]
async fn stale_samples_after_stop_are_discarded() {
    let mut harness = harness();

    command(&mut harness, SessionCommand::ToggleVideo).await;
    command(&mut harness, SessionCommand::ToggleVideo).await;
    let stale = harness.controller.engagement_generation();

    // Video back on stops detection; in-flight verdicts must be ignored
    command(&mut harness, SessionCommand::ToggleVideo).await;
    assert!(!harness.controller.engagement_running());

    for _ in 0..3 {
        let _ = harness.outbound.recv().await.unwrap();
    }

    for _ in 0..20 {
        harness
            .controller
            .process_event(SessionEvent::EngagementSample {
                class: EngagementClass::Away,
                generation: stale,
            })
            .await;
    }
    assert!(harness.outbound.try_recv().is_err());
}

#[tokio::test]
async fn lecture_end_teardown_is_idempotent() {
    let mut harness = harness();

    signal(
        &mut harness,
        ServerMessage::AllUsers(vec![roster_entry("peer-1", "p@example.com", "student")]),
    )
    .await;
    assert_eq!(harness.controller.participant_count(), 1);

    signal(&mut harness, ServerMessage::LectureEnd).await;
    assert!(harness.controller.is_torn_down());
    assert_eq!(harness.controller.participant_count(), 0);
    assert_eq!(harness.controller.peer_link_state("peer-1"), None);

    // Repeated teardown paths must all be no-ops
    signal(&mut harness, ServerMessage::LectureEnd).await;
    command(&mut harness, SessionCommand::Leave).await;
    harness
        .controller
        .process_event(SessionEvent::TransportClosed)
        .await;

    let mut ended = 0;
    while let Ok(update) = harness.updates.try_recv() {
        if matches!(update, SessionUpdate::Ended) {
            ended += 1;
        }
    }
    assert_eq!(ended, 1);

    drop(harness.events_tx);
}

#[tokio::test]
async fn chat_is_logged_and_forwarded() {
    let mut harness = harness();

    command(&mut harness, SessionCommand::SendChat("hello".to_string())).await;
    match harness.outbound.recv().await.unwrap() {
        ClientMessage::SendChat {
            message,
            sender_email,
            ..
        } => {
            assert_eq!(message, "hello");
            assert_eq!(sender_email, "student@example.com");
        }
        other => panic!("expected send_chat, got {:?}", other),
    }

    // Blank messages never leave the client
    command(&mut harness, SessionCommand::SendChat("   ".to_string())).await;
    assert!(harness.outbound.try_recv().is_err());

    signal(
        &mut harness,
        ServerMessage::ReceiveChat {
            sender_role: "teacher".to_string(),
            sender_email: "t@example.com".to_string(),
            received_chat: "quiet please".to_string(),
        },
    )
    .await;
    assert_eq!(harness.controller.chat_log().len(), 1);
    assert_eq!(harness.controller.chat_log()[0].body, "quiet please");
}

#[tokio::test]
async fn own_screen_share_roster_entry_is_skipped() {
    let mut harness = harness();

    signal(
        &mut harness,
        ServerMessage::AllUsers(vec![roster_entry(
            "peer-x",
            "student@example.com_screen",
            "student_screen",
        )]),
    )
    .await;

    assert_eq!(harness.controller.participant_count(), 0);
    assert_eq!(harness.controller.peer_link_state("peer-x"), None);
    assert!(harness.outbound.try_recv().is_err());
}
