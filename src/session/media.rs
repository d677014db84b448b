use std::sync::Arc;

use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::rtp_transceiver::rtp_codec::{
    RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType,
};
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;

use crate::error::{Result, SessionError};

/// Build the shared WebRTC API with the codecs every classroom client speaks.
pub fn create_api() -> Result<Arc<API>> {
    let mut media_engine = MediaEngine::default();

    media_engine
        .register_codec(
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: "video/VP8".to_string(),
                    clock_rate: 90000,
                    channels: 0,
                    sdp_fmtp_line: "".to_string(),
                    rtcp_feedback: vec![],
                },
                payload_type: 96,
                ..Default::default()
            },
            RTPCodecType::Video,
        )
        .map_err(|e| SessionError::MediaEngineCreation(format!("VP8: {}", e)))?;

    media_engine
        .register_codec(
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: "audio/opus".to_string(),
                    clock_rate: 48000,
                    channels: 2,
                    sdp_fmtp_line: "minptime=10;useinbandfec=1".to_string(),
                    rtcp_feedback: vec![],
                },
                payload_type: 111,
                ..Default::default()
            },
            RTPCodecType::Audio,
        )
        .map_err(|e| SessionError::MediaEngineCreation(format!("opus: {}", e)))?;

    let mut registry = Registry::new();
    registry = register_default_interceptors(registry, &mut media_engine)
        .map_err(|e| SessionError::MediaEngineCreation(format!("interceptors: {}", e)))?;

    Ok(Arc::new(
        APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build(),
    ))
}

/// The RTC configuration shared by every peer link.
pub fn rtc_configuration() -> RTCConfiguration {
    RTCConfiguration {
        ice_servers: vec![RTCIceServer {
            urls: vec!["stun:stun.l.google.com:19302".to_string()],
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// Local outbound tracks attached to every peer link.
#[derive(Clone)]
pub struct LocalTracks {
    pub video: Arc<TrackLocalStaticRTP>,
    pub audio: Arc<TrackLocalStaticRTP>,
}

/// Seam to the platform camera/microphone layer. The core only needs track
/// handles; payload pumping stays outside.
pub trait MediaDevices: Send + Sync {
    fn acquire(&self) -> Result<LocalTracks>;
}

/// Default device layer producing RTP track handles for an external feeder.
pub struct RtpMediaDevices {
    stream_id: String,
}

impl RtpMediaDevices {
    pub fn new(stream_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
        }
    }
}

impl MediaDevices for RtpMediaDevices {
    fn acquire(&self) -> Result<LocalTracks> {
        let video = Arc::new(TrackLocalStaticRTP::new(
            RTCRtpCodecCapability {
                mime_type: "video/VP8".to_string(),
                ..Default::default()
            },
            "video".to_string(),
            self.stream_id.clone(),
        ));

        let audio = Arc::new(TrackLocalStaticRTP::new(
            RTCRtpCodecCapability {
                mime_type: "audio/opus".to_string(),
                ..Default::default()
            },
            "audio".to_string(),
            self.stream_id.clone(),
        ));

        Ok(LocalTracks { video, audio })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webrtc::track::track_local::TrackLocal;

    #[test]
    fn test_create_api() {
        assert!(create_api().is_ok());
    }

    #[test]
    fn test_rtp_media_devices_acquire() {
        let devices = RtpMediaDevices::new("local");
        let tracks = devices.acquire().unwrap();
        assert_eq!(tracks.video.kind(), RTPCodecType::Video);
        assert_eq!(tracks.audio.kind(), RTPCodecType::Audio);
    }
}
