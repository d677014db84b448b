use crate::signaling::ClientMessage;

use super::participant::{MediaFlags, Roster};

/// Single source of truth for the local participant's toggle state.
///
/// Every local change re-broadcasts the full flag set, never a delta, so a
/// late-joining observer reconstructs state from the latest message alone.
pub struct MediaStateSync {
    local_id: String,
    wire_email: String,
    flags: MediaFlags,
}

impl MediaStateSync {
    pub fn new(local_id: impl Into<String>, wire_email: impl Into<String>) -> Self {
        Self {
            local_id: local_id.into(),
            wire_email: wire_email.into(),
            flags: MediaFlags::default(),
        }
    }

    pub fn flags(&self) -> MediaFlags {
        self.flags
    }

    fn broadcast(&self) -> ClientMessage {
        ClientMessage::ToggleMedia {
            user_id: self.local_id.clone(),
            email: self.wire_email.clone(),
            video_enabled: self.flags.video_enabled,
            audio_enabled: self.flags.audio_enabled,
            audio_disabled_by_teacher: self.flags.audio_disabled_by_teacher,
            screen_share_enabled: self.flags.screen_share_enabled,
            screen_share_disabled_by_teacher: self.flags.screen_share_disabled_by_teacher,
        }
    }

    /// Flip local video. Returns the new state and the room broadcast.
    pub fn toggle_video(&mut self) -> (bool, ClientMessage) {
        self.flags.video_enabled = !self.flags.video_enabled;
        tracing::info!(enabled = self.flags.video_enabled, "Video toggled");
        (self.flags.video_enabled, self.broadcast())
    }

    /// Flip local audio. Refused while the teacher has the mic disabled.
    pub fn toggle_audio(&mut self) -> Option<ClientMessage> {
        if self.flags.audio_disabled_by_teacher {
            tracing::info!("Audio toggle refused: disabled by teacher");
            return None;
        }
        self.flags.audio_enabled = !self.flags.audio_enabled;
        tracing::info!(enabled = self.flags.audio_enabled, "Audio toggled");
        Some(self.broadcast())
    }

    /// Flip screen share. Refused while banned by the teacher. Returns the
    /// new state so the controller can start or stop the publisher.
    pub fn toggle_screen_share(&mut self) -> Option<(bool, ClientMessage)> {
        if self.flags.screen_share_disabled_by_teacher {
            tracing::info!("Screen share toggle refused: disabled by teacher");
            return None;
        }
        self.flags.screen_share_enabled = !self.flags.screen_share_enabled;
        tracing::info!(enabled = self.flags.screen_share_enabled, "Screen share toggled");
        Some((self.flags.screen_share_enabled, self.broadcast()))
    }

    /// Teacher mic override. `disabled == true` force-mutes regardless of
    /// the student's last intent; `false` re-allows but leaves audio off
    /// until the student toggles it back on. Returns the ack message.
    pub fn teacher_mic_override(&mut self, disabled: bool) -> ClientMessage {
        self.flags.audio_enabled = false;
        self.flags.audio_disabled_by_teacher = disabled;
        tracing::info!(disabled = disabled, "Teacher mic override applied");

        ClientMessage::ToggleStudentMicComplete {
            user_id: self.local_id.clone(),
            email: self.wire_email.clone(),
            audio_enabled: false,
            audio_disabled_by_teacher: disabled,
        }
    }

    /// Teacher screen-share override; both directions stop any active share.
    pub fn teacher_screen_share_override(&mut self, disabled: bool) -> ClientMessage {
        self.flags.screen_share_enabled = false;
        self.flags.screen_share_disabled_by_teacher = disabled;
        tracing::info!(disabled = disabled, "Teacher screen-share override applied");

        ClientMessage::ToggleStudentScreenShareComplete {
            user_id: self.local_id.clone(),
            user_email: self.wire_email.clone(),
            screen_share_enabled: false,
            screen_share_disabled_by_teacher: disabled,
        }
    }

    /// Apply a peer's full-state `update_media` broadcast. Unknown ids are
    /// ignored; the peer may have exited between send and receipt.
    pub fn apply_peer_update(&self, roster: &mut Roster, user_id: &str, flags: MediaFlags) {
        match roster.get_mut(user_id) {
            Some(participant) => {
                participant.flags = flags;
            }
            None => {
                tracing::debug!(user_id = %user_id, "Media update for unknown participant ignored");
            }
        }
    }

    /// Mirror a teacher override onto the observed participant entry.
    pub fn apply_peer_mic_override(&self, roster: &mut Roster, user_id: &str, disabled: bool) {
        if let Some(participant) = roster.get_mut(user_id) {
            participant.flags.audio_disabled_by_teacher = disabled;
        }
    }

    pub fn apply_peer_screen_share_override(
        &self,
        roster: &mut Roster,
        user_id: &str,
        disabled: bool,
    ) {
        if let Some(participant) = roster.get_mut(user_id) {
            participant.flags.screen_share_disabled_by_teacher = disabled;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::participant::{Participant, ParticipantIdentity, ParticipantRole};

    fn sync() -> MediaStateSync {
        MediaStateSync::new("local-1", "me@example.com")
    }

    fn flags_of(msg: &ClientMessage) -> MediaFlags {
        match msg {
            ClientMessage::ToggleMedia {
                video_enabled,
                audio_enabled,
                audio_disabled_by_teacher,
                screen_share_enabled,
                screen_share_disabled_by_teacher,
                ..
            } => MediaFlags {
                video_enabled: *video_enabled,
                audio_enabled: *audio_enabled,
                audio_disabled_by_teacher: *audio_disabled_by_teacher,
                screen_share_enabled: *screen_share_enabled,
                screen_share_disabled_by_teacher: *screen_share_disabled_by_teacher,
            },
            other => panic!("expected toggle_media, got {:?}", other),
        }
    }

    #[test]
    fn test_toggle_broadcasts_full_state() {
        let mut sync = sync();

        let (enabled, msg) = sync.toggle_video();
        assert!(enabled);
        assert_eq!(flags_of(&msg), sync.flags());

        let msg = sync.toggle_audio().unwrap();
        let flags = flags_of(&msg);
        assert!(flags.video_enabled);
        assert!(flags.audio_enabled);
    }

    #[test]
    fn test_observer_converges_on_latest_broadcast() {
        let mut sender = sync();
        let observer = MediaStateSync::new("local-2", "peer@example.com");
        let mut roster = Roster::new();
        roster.insert(Participant {
            id: "local-1".to_string(),
            identity: ParticipantIdentity::camera("me@example.com"),
            role: ParticipantRole::Student,
            flags: MediaFlags::default(),
            tracks: Vec::new(),
        });

        // Several toggles; only the last delivered message matters
        sender.toggle_video();
        sender.toggle_audio();
        let (_, last) = sender.toggle_video();

        observer.apply_peer_update(&mut roster, "local-1", flags_of(&last));
        assert_eq!(roster.get("local-1").unwrap().flags, sender.flags());
    }

    #[test]
    fn test_teacher_mute_blocks_student_toggle() {
        let mut sync = sync();
        sync.toggle_audio().unwrap();
        assert!(sync.flags().audio_enabled);

        let ack = sync.teacher_mic_override(true);
        assert!(!sync.flags().audio_enabled);
        assert!(sync.flags().audio_disabled_by_teacher);
        match ack {
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

        // Student cannot re-enable until the teacher allows it
        assert!(sync.toggle_audio().is_none());
        assert!(!sync.flags().audio_enabled);

        sync.teacher_mic_override(false);
        assert!(!sync.flags().audio_enabled);
        assert!(sync.toggle_audio().is_some());
        assert!(sync.flags().audio_enabled);
    }

    #[test]
    fn test_screen_share_ban() {
        let mut sync = sync();
        let (enabled, _) = sync.toggle_screen_share().unwrap();
        assert!(enabled);

        sync.teacher_screen_share_override(true);
        assert!(!sync.flags().screen_share_enabled);
        assert!(sync.toggle_screen_share().is_none());

        sync.teacher_screen_share_override(false);
        let (enabled, _) = sync.toggle_screen_share().unwrap();
        assert!(enabled);
    }

    #[test]
    fn test_update_for_unknown_participant_is_ignored() {
        let sync = sync();
        let mut roster = Roster::new();
        sync.apply_peer_update(&mut roster, "gone", MediaFlags::default());
        assert!(roster.is_empty());
    }
}
