use std::env;
use std::time::Duration;

pub struct Config {
    pub signaling: SignalingConfig,
    pub backend: BackendConfig,
    pub engagement: EngagementConfig,
    pub room: RoomConfig,
}

pub struct SignalingConfig {
    pub url: String,
}

pub struct BackendConfig {
    pub base_url: String,
    pub auth_token: Option<String>,
    pub classifier_url: String,
    pub classifier_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct EngagementConfig {
    pub sample_interval: Duration,
    pub window_size: usize,
    pub snapshot_max_width: u32,
    pub snapshot_max_height: u32,
}

pub struct RoomConfig {
    pub room_id: String,
    pub email: String,
    pub role: String,
    pub lecture_id: Option<String>,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_secs(2),
            window_size: 10,
            snapshot_max_width: 854,
            snapshot_max_height: 480,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            signaling: SignalingConfig {
                url: env::var("SIGNALING_URL")
                    .unwrap_or_else(|_| "ws://127.0.0.1:5000".to_string()),
            },
            backend: BackendConfig {
                base_url: env::var("API_BASE_URL")
                    .unwrap_or_else(|_| "http://127.0.0.1:8000".to_string()),
                auth_token: env::var("AUTH_TOKEN").ok(),
                classifier_url: env::var("CLASSIFIER_URL")
                    .unwrap_or_else(|_| "http://127.0.0.1:9000/drowsiness".to_string()),
                classifier_timeout_secs: env::var("CLASSIFIER_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
            engagement: EngagementConfig {
                sample_interval: Duration::from_secs(
                    env::var("SAMPLE_INTERVAL_SECS")
                        .unwrap_or_else(|_| "2".to_string())
                        .parse()
                        .unwrap_or(2),
                ),
                window_size: env::var("ENGAGEMENT_WINDOW")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                snapshot_max_width: env::var("SNAPSHOT_MAX_WIDTH")
                    .unwrap_or_else(|_| "854".to_string())
                    .parse()
                    .unwrap_or(854),
                snapshot_max_height: env::var("SNAPSHOT_MAX_HEIGHT")
                    .unwrap_or_else(|_| "480".to_string())
                    .parse()
                    .unwrap_or(480),
            },
            room: RoomConfig {
                room_id: env::var("ROOM_ID").unwrap_or_else(|_| "demo-room".to_string()),
                email: env::var("USER_EMAIL").unwrap_or_else(|_| "student@example.com".to_string()),
                role: env::var("USER_ROLE").unwrap_or_else(|_| "student".to_string()),
                lecture_id: env::var("LECTURE_ID").ok(),
            },
        }
    }
}
