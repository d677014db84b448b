use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use webrtc::track::track_remote::TrackRemote;

use crate::signaling::RosterEntry;

/// Suffix the relay appends to the email and role of a screen-share publisher.
const SCREEN_SUFFIX: &str = "_screen";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticipantRole {
    Teacher,
    Student,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Teacher => "teacher",
            ParticipantRole::Student => "student",
        }
    }
}

/// Whether a participant entry is a camera publisher or the screen-share
/// twin that joins under a suffixed identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticipantKind {
    Camera,
    ScreenShare,
}

/// A participant identity with the screen-share convention made explicit:
/// the wire carries `email + "_screen"`, internally that is a kind tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantIdentity {
    pub email: String,
    pub kind: ParticipantKind,
}

impl ParticipantIdentity {
    pub fn camera(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            kind: ParticipantKind::Camera,
        }
    }

    pub fn screen_share(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            kind: ParticipantKind::ScreenShare,
        }
    }

    /// Parse a wire email, stripping the screen-share suffix into a kind tag.
    pub fn from_wire(email: &str) -> Self {
        match email.strip_suffix(SCREEN_SUFFIX) {
            Some(base) => Self::screen_share(base),
            None => Self::camera(email),
        }
    }

    /// The email as it appears on the wire for this identity.
    pub fn wire_email(&self) -> String {
        match self.kind {
            ParticipantKind::Camera => self.email.clone(),
            ParticipantKind::ScreenShare => format!("{}{}", self.email, SCREEN_SUFFIX),
        }
    }
}

/// Parse a wire role string (`"student"`, `"teacher_screen"`, ...) into the
/// role proper; unknown strings are treated as students.
pub fn parse_wire_role(role: &str) -> ParticipantRole {
    let base = role.strip_suffix(SCREEN_SUFFIX).unwrap_or(role);
    if base.eq_ignore_ascii_case("teacher") {
        ParticipantRole::Teacher
    } else {
        ParticipantRole::Student
    }
}

/// The wire role string for an identity (`role + "_screen"` for publishers).
pub fn wire_role(role: ParticipantRole, kind: ParticipantKind) -> String {
    match kind {
        ParticipantKind::Camera => role.as_str().to_string(),
        ParticipantKind::ScreenShare => format!("{}{}", role.as_str(), SCREEN_SUFFIX),
    }
}

/// Media-permission flags carried in every full-state toggle broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaFlags {
    pub video_enabled: bool,
    pub audio_enabled: bool,
    pub audio_disabled_by_teacher: bool,
    pub screen_share_enabled: bool,
    pub screen_share_disabled_by_teacher: bool,
}

/// A remote room member as handed to the rendering layer.
#[derive(Clone)]
pub struct Participant {
    pub id: String,
    pub identity: ParticipantIdentity,
    pub role: ParticipantRole,
    pub flags: MediaFlags,
    /// Remote track handles received over the peer link, in arrival order.
    pub tracks: Vec<Arc<TrackRemote>>,
}

impl Participant {
    pub fn from_roster_entry(entry: &RosterEntry) -> Self {
        Self {
            id: entry.id.clone(),
            identity: ParticipantIdentity::from_wire(&entry.email),
            role: parse_wire_role(&entry.user_role),
            flags: MediaFlags {
                video_enabled: entry.video_enabled,
                audio_enabled: entry.audio_enabled,
                audio_disabled_by_teacher: entry.audio_disabled_by_teacher,
                screen_share_enabled: entry.screen_share_enabled,
                screen_share_disabled_by_teacher: entry.screen_share_disabled_by_teacher,
            },
            tracks: Vec::new(),
        }
    }
}

/// The remote participant map. Exactly one entry per remote connection id;
/// mutated only through the peer manager and media synchronizer.
#[derive(Default)]
pub struct Roster {
    participants: HashMap<String, Participant>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, participant: Participant) {
        self.participants.insert(participant.id.clone(), participant);
    }

    pub fn get(&self, id: &str) -> Option<&Participant> {
        self.participants.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Participant> {
        self.participants.get_mut(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Participant> {
        self.participants.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.participants.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn clear(&mut self) {
        self.participants.clear();
    }

    /// Snapshot for the rendering layer.
    pub fn snapshot(&self) -> Vec<Participant> {
        self.participants.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_from_wire_camera() {
        let identity = ParticipantIdentity::from_wire("s@example.com");
        assert_eq!(identity.kind, ParticipantKind::Camera);
        assert_eq!(identity.email, "s@example.com");
        assert_eq!(identity.wire_email(), "s@example.com");
    }

    #[test]
    fn test_identity_from_wire_screen_share() {
        let identity = ParticipantIdentity::from_wire("s@example.com_screen");
        assert_eq!(identity.kind, ParticipantKind::ScreenShare);
        assert_eq!(identity.email, "s@example.com");
        assert_eq!(identity.wire_email(), "s@example.com_screen");
    }

    #[test]
    fn test_parse_wire_role_with_suffix() {
        assert_eq!(parse_wire_role("teacher"), ParticipantRole::Teacher);
        assert_eq!(parse_wire_role("student_screen"), ParticipantRole::Student);
        assert_eq!(parse_wire_role("teacher_screen"), ParticipantRole::Teacher);
    }

    #[test]
    fn test_roster_single_entry_per_id() {
        let mut roster = Roster::new();
        let entry = RosterEntry {
            id: "abc".to_string(),
            email: "s@example.com".to_string(),
            user_role: "student".to_string(),
            video_enabled: false,
            audio_enabled: false,
            audio_disabled_by_teacher: false,
            screen_share_enabled: false,
            screen_share_disabled_by_teacher: false,
        };

        roster.insert(Participant::from_roster_entry(&entry));
        roster.insert(Participant::from_roster_entry(&entry));
        assert_eq!(roster.len(), 1);

        assert!(roster.remove("abc").is_some());
        assert!(roster.remove("abc").is_none());
        assert!(roster.is_empty());
    }
}
