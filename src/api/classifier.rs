use std::time::Duration;

use reqwest::multipart::{Form, Part};

use crate::engagement::capture::CapturedFrame;
use crate::engagement::window::EngagementClass;
use crate::error::{Result, SessionError};

/// Client for the external engagement-classification endpoint: accepts an
/// image blob, answers a single integer in {-1, 0, 1}.
#[derive(Clone)]
pub struct ClassifierClient {
    endpoint: String,
    client: reqwest::Client,
}

impl ClassifierClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SessionError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    /// Submit a frame and parse the classification verdict.
    pub async fn classify(&self, frame: &CapturedFrame) -> Result<EngagementClass> {
        let part = Part::bytes(frame.rgb.clone()).file_name("focus.raw");
        let form = Form::new()
            .part("file", part)
            .text("width", frame.width.to_string())
            .text("height", frame.height.to_string());

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SessionError::ClassifierRequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(SessionError::ClassifierRequestFailed(format!(
                "status {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SessionError::ClassifierRequestFailed(e.to_string()))?;

        let value: i32 = body
            .trim()
            .parse()
            .map_err(|_| SessionError::InvalidClassification(body.trim().to_string()))?;

        EngagementClass::from_wire(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds() {
        assert!(ClassifierClient::new("http://127.0.0.1:9000/drowsiness", Duration::from_secs(10)).is_ok());
    }
}
