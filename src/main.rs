use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use classroom_session::api::{ClassifierClient, ProgressClient, QuizClient};
use classroom_session::config::Config;
use classroom_session::session::{
    participant::parse_wire_role, Collaborators, ParticipantKind, RtpMediaDevices, Session,
    SessionSetup, SessionUpdate,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();

    let classifier = match ClassifierClient::new(
        config.backend.classifier_url.clone(),
        Duration::from_secs(config.backend.classifier_timeout_secs),
    ) {
        Ok(classifier) => classifier,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build classifier client");
            return;
        }
    };

    let collaborators = Collaborators {
        media: Arc::new(RtpMediaDevices::new("local")),
        frames: None,
        screen_media: None,
        classifier,
        quiz: QuizClient::new(
            config.backend.base_url.clone(),
            config.backend.auth_token.clone(),
        ),
        progress: ProgressClient::new(
            config.backend.base_url.clone(),
            config.backend.auth_token.clone(),
        ),
    };

    let setup = SessionSetup {
        signaling_url: config.signaling.url.clone(),
        room_id: config.room.room_id.clone(),
        email: config.room.email.clone(),
        role: parse_wire_role(&config.room.role),
        kind: ParticipantKind::Camera,
        lecture_id: config.room.lecture_id.clone(),
        engagement: config.engagement.clone(),
    };

    let (handle, mut updates) = match Session::connect(setup, collaborators).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(error = %e, "Failed to join room");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupt received, leaving room");
                handle.leave();
            }
            update = updates.recv() => match update {
                Some(SessionUpdate::Participants(participants)) => {
                    tracing::info!(count = participants.len(), "Participant list updated");
                }
                Some(SessionUpdate::Chat(message)) => {
                    tracing::info!(from = %message.sender_email, "[chat] {}", message.body);
                }
                Some(SessionUpdate::Quiz(detail)) => {
                    tracing::info!(quiz = %detail, "Quiz received");
                }
                Some(SessionUpdate::Prompt(prompt)) => {
                    tracing::warn!(prompt = ?prompt, "Engagement intervention");
                }
                Some(SessionUpdate::Ended) | None => break,
            }
        }
    }

    handle.wait().await;
}
