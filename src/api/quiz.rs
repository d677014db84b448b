use crate::error::{Result, SessionError};

/// Authenticated quiz-detail fetch, handed to the rendering layer when the
/// teacher starts a quiz.
#[derive(Clone)]
pub struct QuizClient {
    base_url: String,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl QuizClient {
    pub fn new(base_url: impl Into<String>, auth_token: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token,
            client: reqwest::Client::new(),
        }
    }

    /// `GET /api/v1/quizzes/{id}` with bearer auth.
    pub async fn fetch_detail(&self, quiz_id: &str) -> Result<serde_json::Value> {
        let url = format!(
            "{}/api/v1/quizzes/{}",
            self.base_url,
            urlencoding::encode(quiz_id)
        );

        let mut request = self.client.get(&url);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SessionError::QuizFetchFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SessionError::QuizFetchFailed(format!(
                "status {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| SessionError::QuizFetchFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiz_url_encoding() {
        let client = QuizClient::new("http://api.example.com", None);
        // Path segments with reserved characters must be escaped
        let encoded = urlencoding::encode("quiz/42");
        assert_eq!(encoded, "quiz%2F42");
        assert_eq!(client.base_url, "http://api.example.com");
    }
}
