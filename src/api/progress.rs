use serde::Serialize;

use crate::error::{Result, SessionError};

#[derive(Debug, Serialize)]
struct SleepTimeBody {
    sleep_time: u64,
}

/// Progress-tracking write: cumulative inattentive minutes per lecture.
/// Callers treat this as fire-and-forget; failures are logged, not retried.
#[derive(Clone)]
pub struct ProgressClient {
    base_url: String,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl ProgressClient {
    pub fn new(base_url: impl Into<String>, auth_token: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token,
            client: reqwest::Client::new(),
        }
    }

    pub async fn report_sleep_time(&self, lecture_id: &str, minutes: u64) -> Result<()> {
        let url = format!(
            "{}/api/v1/lectures/{}/focus-time",
            self.base_url,
            urlencoding::encode(lecture_id)
        );

        let mut request = self.client.patch(&url).json(&SleepTimeBody {
            sleep_time: minutes,
        });
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SessionError::ProgressReportFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SessionError::ProgressReportFailed(format!(
                "status {}",
                response.status()
            )));
        }

        tracing::info!(lecture_id = %lecture_id, minutes = minutes, "Reported inattentive time");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_shape() {
        let body = serde_json::to_value(SleepTimeBody { sleep_time: 3 }).unwrap();
        assert_eq!(body["sleep_time"], 3);
    }
}
