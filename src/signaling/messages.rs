use serde::{Deserialize, Serialize};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Why a student is being reported to the teacher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportReason {
    #[serde(rename = "afk")]
    Afk,
    #[serde(rename = "sleep")]
    Sleep,
}

/// Roster entry delivered in `all_users`.
///
/// Field names follow the relay contract verbatim, including the
/// `offerSendScreenShare*` spelling for the screen-share flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub id: String,
    pub email: String,
    pub user_role: String,
    #[serde(default)]
    pub video_enabled: bool,
    #[serde(default)]
    pub audio_enabled: bool,
    #[serde(default)]
    pub audio_disabled_by_teacher: bool,
    #[serde(rename = "offerSendScreenShareEnabled", default)]
    pub screen_share_enabled: bool,
    #[serde(rename = "offerSendScreenShareDisabledByTeacher", default)]
    pub screen_share_disabled_by_teacher: bool,
}

/// Messages sent from this client to the room relay.
///
/// The relay speaks `{"event": <name>, "data": <payload>}` frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientMessage {
    #[serde(rename = "join_room", rename_all = "camelCase")]
    JoinRoom {
        room: String,
        email: String,
        user_role: String,
        video_enabled: bool,
        audio_enabled: bool,
        audio_disabled_by_teacher: bool,
    },

    #[serde(rename = "offer", rename_all = "camelCase")]
    Offer {
        sdp: RTCSessionDescription,
        #[serde(rename = "offerSendID")]
        offer_send_id: String,
        offer_send_email: String,
        offer_send_role: String,
        #[serde(rename = "offerReceiveID")]
        offer_receive_id: String,
    },

    #[serde(rename = "answer", rename_all = "camelCase")]
    Answer {
        sdp: RTCSessionDescription,
        #[serde(rename = "answerSendID")]
        answer_send_id: String,
        #[serde(rename = "answerReceiveID")]
        answer_receive_id: String,
    },

    #[serde(rename = "candidate", rename_all = "camelCase")]
    Candidate {
        candidate: RTCIceCandidateInit,
        #[serde(rename = "candidateSendID")]
        candidate_send_id: String,
        #[serde(rename = "candidateReceiveID")]
        candidate_receive_id: String,
    },

    #[serde(rename = "toggle_media", rename_all = "camelCase")]
    ToggleMedia {
        user_id: String,
        email: String,
        video_enabled: bool,
        audio_enabled: bool,
        audio_disabled_by_teacher: bool,
        screen_share_enabled: bool,
        screen_share_disabled_by_teacher: bool,
    },

    #[serde(rename = "toggle_student_mic_complete", rename_all = "camelCase")]
    ToggleStudentMicComplete {
        user_id: String,
        email: String,
        audio_enabled: bool,
        audio_disabled_by_teacher: bool,
    },

    #[serde(rename = "toggle_student_screen_share_complete", rename_all = "camelCase")]
    ToggleStudentScreenShareComplete {
        user_id: String,
        user_email: String,
        screen_share_enabled: bool,
        screen_share_disabled_by_teacher: bool,
    },

    #[serde(rename = "send_chat", rename_all = "camelCase")]
    SendChat {
        sender_role: String,
        sender_email: String,
        message: String,
    },

    #[serde(rename = "report_to_teacher", rename_all = "camelCase")]
    ReportToTeacher {
        user_id: String,
        email: String,
        #[serde(rename = "type")]
        reason: ReportReason,
    },
}

/// Messages received from the room relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerMessage {
    #[serde(rename = "all_users")]
    AllUsers(Vec<RosterEntry>),

    #[serde(rename = "getOffer", rename_all = "camelCase")]
    GetOffer {
        sdp: RTCSessionDescription,
        #[serde(rename = "offerSendID")]
        offer_send_id: String,
        offer_send_email: String,
        offer_send_role: String,
        #[serde(default)]
        offer_send_video_enabled: bool,
        #[serde(default)]
        offer_send_audio_enabled: bool,
        #[serde(default)]
        offer_send_audio_disabled_by_teacher: bool,
        #[serde(default)]
        offer_send_screen_share_enabled: bool,
        #[serde(default)]
        offer_send_screen_share_disabled_by_teacher: bool,
    },

    #[serde(rename = "getAnswer", rename_all = "camelCase")]
    GetAnswer {
        sdp: RTCSessionDescription,
        #[serde(rename = "answerSendID")]
        answer_send_id: String,
    },

    #[serde(rename = "getCandidate", rename_all = "camelCase")]
    GetCandidate {
        candidate: RTCIceCandidateInit,
        #[serde(rename = "candidateSendID")]
        candidate_send_id: String,
    },

    #[serde(rename = "user_exit")]
    UserExit { id: String },

    #[serde(rename = "update_media", rename_all = "camelCase")]
    UpdateMedia {
        user_id: String,
        video_enabled: bool,
        audio_enabled: bool,
        audio_disabled_by_teacher: bool,
        #[serde(default)]
        screen_share_enabled: bool,
        #[serde(default)]
        screen_share_disabled_by_teacher: bool,
    },

    #[serde(rename = "toggle_student_mic", rename_all = "camelCase")]
    ToggleStudentMic {
        user_id: String,
        audio_disabled_by_teacher: bool,
    },

    #[serde(rename = "toggle_student_screen_share", rename_all = "camelCase")]
    ToggleStudentScreenShare {
        user_id: String,
        user_email: String,
        screen_share_disabled_by_teacher: bool,
    },

    #[serde(rename = "receive_chat", rename_all = "camelCase")]
    ReceiveChat {
        #[serde(default)]
        sender_role: String,
        sender_email: String,
        received_chat: String,
    },

    #[serde(rename = "quiz_start", rename_all = "camelCase")]
    QuizStart { quiz_id: String },

    #[serde(rename = "lecture_end")]
    LectureEnd,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_room_wire_shape() {
        let msg = ClientMessage::JoinRoom {
            room: "room-1".to_string(),
            email: "s@example.com".to_string(),
            user_role: "student".to_string(),
            video_enabled: false,
            audio_enabled: false,
            audio_disabled_by_teacher: false,
        };

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["event"], "join_room");
        assert_eq!(value["data"]["room"], "room-1");
        assert_eq!(value["data"]["userRole"], "student");
        assert_eq!(value["data"]["videoEnabled"], false);
        assert_eq!(value["data"]["audioDisabledByTeacher"], false);
    }

    #[test]
    fn test_offer_id_capitalization() {
        let msg = ClientMessage::Offer {
            sdp: RTCSessionDescription::default(),
            offer_send_id: "me".to_string(),
            offer_send_email: "s@example.com".to_string(),
            offer_send_role: "student".to_string(),
            offer_receive_id: "them".to_string(),
        };

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["data"]["offerSendID"], "me");
        assert_eq!(value["data"]["offerReceiveID"], "them");
        assert_eq!(value["data"]["offerSendEmail"], "s@example.com");
    }

    #[test]
    fn test_report_reason_field_name() {
        let msg = ClientMessage::ReportToTeacher {
            user_id: "me".to_string(),
            email: "s@example.com".to_string(),
            reason: ReportReason::Afk,
        };

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["event"], "report_to_teacher");
        assert_eq!(value["data"]["type"], "afk");
    }

    #[test]
    fn test_all_users_roundtrip() {
        let raw = serde_json::json!({
            "event": "all_users",
            "data": [{
                "id": "abc",
                "email": "t@example.com",
                "userRole": "teacher",
                "videoEnabled": true,
                "audioEnabled": true,
                "audioDisabledByTeacher": false,
                "offerSendScreenShareEnabled": false,
                "offerSendScreenShareDisabledByTeacher": true
            }]
        });

        let msg: ServerMessage = serde_json::from_value(raw).unwrap();
        match msg {
            ServerMessage::AllUsers(users) => {
                assert_eq!(users.len(), 1);
                assert_eq!(users[0].id, "abc");
                assert_eq!(users[0].user_role, "teacher");
                assert!(users[0].screen_share_disabled_by_teacher);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_roster_entry_missing_flags_default_false() {
        let raw = serde_json::json!({
            "id": "abc",
            "email": "t@example.com",
            "userRole": "teacher"
        });

        let entry: RosterEntry = serde_json::from_value(raw).unwrap();
        assert!(!entry.video_enabled);
        assert!(!entry.screen_share_enabled);
    }

    #[test]
    fn test_lecture_end_without_data() {
        let msg: ServerMessage = serde_json::from_str(r#"{"event":"lecture_end"}"#).unwrap();
        assert!(matches!(msg, ServerMessage::LectureEnd));
    }

    #[test]
    fn test_get_candidate_deserialize() {
        let raw = serde_json::json!({
            "event": "getCandidate",
            "data": {
                "candidate": { "candidate": "candidate:1 1 udp 2113937151 192.0.2.1 54400 typ host" },
                "candidateSendID": "peer-1"
            }
        });

        let msg: ServerMessage = serde_json::from_value(raw).unwrap();
        match msg {
            ServerMessage::GetCandidate {
                candidate,
                candidate_send_id,
            } => {
                assert_eq!(candidate_send_id, "peer-1");
                assert!(candidate.candidate.starts_with("candidate:"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
