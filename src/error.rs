use thiserror::Error;

/// Custom error types for the classroom session core
#[derive(Debug, Error)]
pub enum SessionError {
    /// WebRTC negotiation errors
    #[error("Failed to create peer connection: {0}")]
    PeerConnectionCreation(String),

    #[error("Failed to create offer: {0}")]
    CreateOfferFailed(String),

    #[error("Failed to create answer: {0}")]
    CreateAnswerFailed(String),

    #[error("Invalid SDP format: {0}")]
    InvalidSdp(String),

    #[error("Failed to set local description: {0}")]
    SetLocalDescriptionFailed(String),

    #[error("Failed to set remote description: {0}")]
    SetRemoteDescriptionFailed(String),

    #[error("Failed to add ICE candidate: {0}")]
    AddIceCandidateFailed(String),

    #[error("Failed to create track: {0}")]
    TrackCreationFailed(String),

    #[error("Failed to add track: {0}")]
    AddTrackFailed(String),

    #[error("Link for peer {0} is closed")]
    LinkClosed(String),

    /// Roster errors
    #[error("Participant {0} not found")]
    ParticipantNotFound(String),

    /// Signaling errors
    #[error("Signaling connection failed: {0}")]
    SignalingConnectFailed(String),

    #[error("Signaling transport closed")]
    TransportClosed,

    #[error("Invalid signaling message: {0}")]
    InvalidSignalingMessage(String),

    #[error("Failed to serialize message: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// Local media errors
    #[error("Media acquisition failed: {0}")]
    MediaAcquisitionFailed(String),

    /// Engagement pipeline errors
    #[error("Frame capture failed: {0}")]
    CaptureFailed(String),

    #[error("Classifier request failed: {0}")]
    ClassifierRequestFailed(String),

    #[error("Classifier returned invalid result: {0}")]
    InvalidClassification(String),

    /// Backend API errors
    #[error("Quiz fetch failed: {0}")]
    QuizFetchFailed(String),

    #[error("Progress report failed: {0}")]
    ProgressReportFailed(String),

    /// Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Missing required configuration: {0}")]
    MissingConfiguration(String),

    /// WebRTC API errors
    #[error("WebRTC API error: {0}")]
    WebRtcApi(String),

    #[error("Failed to create media engine: {0}")]
    MediaEngineCreation(String),

    /// Generic errors
    #[error("Internal session error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Convenience type alias for Results using SessionError
pub type Result<T> = std::result::Result<T, SessionError>;

impl SessionError {
    /// Helper to create Internal errors with context
    pub fn internal(msg: impl Into<String>) -> Self {
        SessionError::Internal(msg.into())
    }

    /// Helper to create WebRTC API errors
    pub fn webrtc_api(msg: impl Into<String>) -> Self {
        SessionError::WebRtcApi(msg.into())
    }

    /// Helper to create signaling errors
    pub fn signaling(msg: impl Into<String>) -> Self {
        SessionError::SignalingConnectFailed(msg.into())
    }
}

/// Convert webrtc::Error to SessionError
impl From<webrtc::Error> for SessionError {
    fn from(err: webrtc::Error) -> Self {
        SessionError::WebRtcApi(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SessionError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        SessionError::SignalingConnectFailed(err.to_string())
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(err: reqwest::Error) -> Self {
        SessionError::ClassifierRequestFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SessionError::ParticipantNotFound("abc".to_string());
        assert_eq!(err.to_string(), "Participant abc not found");
    }

    #[test]
    fn test_error_helpers() {
        let err = SessionError::internal("Something went wrong");
        assert!(matches!(err, SessionError::Internal(_)));
    }
}
