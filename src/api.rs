//! REST adapter for the timesheet backend

use async_trait::async_trait;
use std::fmt::Display;

use reqwest::{Client, IntoUrl, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ApiError, ConfigError, Result};
use crate::models::{
    Actor, EntryPatch, NewEntry, NewSubmission, Project, Submission, SubmissionPatch, TimeEntry,
    User, YearMonth,
};
use crate::repository::TimesheetRepository;

pub struct ApiClient {
    client: Client,
    base_url: String,
    api_token: String,
}

impl ApiClient {
    pub fn new(base_url: &str, api_token: String) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(base_url).into());
        }
        if api_token.trim().is_empty() {
            return Err(ConfigError::InvalidToken.into());
        }
        Ok(ApiClient {
            client: Client::new(),
            base_url,
            api_token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Checks the credentials by fetching the authenticated user
    pub async fn test_connection(&self) -> Result<Actor> {
        self.current_actor().await
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// URL of a single resource; the id is percent-encoded as one path segment
    fn resource_url(&self, collection: &str, id: &str) -> Result<Url> {
        let invalid = || ConfigError::InvalidUrl(self.base_url.clone());
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .push(collection)
            .push(id);
        Ok(url)
    }

    fn request<U: IntoUrl + Display>(&self, method: Method, url: U) -> RequestBuilder {
        tracing::debug!(%method, %url, "sending request");
        self.client
            .request(method, url)
            .bearer_auth(&self.api_token)
            .header("Accept", "application/json")
    }

    async fn send_request(&self, request: RequestBuilder) -> Result<String> {
        let response = request.send().await.map_err(ApiError::Network)?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!(status = status.as_u16(), "request rejected");
            return Err(rejection(status, &error_text).into());
        }

        Ok(response.text().await.map_err(ApiError::Network)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self
            .send_request(self.request(Method::GET, self.endpoint(path)))
            .await?;
        parse(&body, path)
    }

    async fn send_json<B, T, U>(&self, method: Method, url: U, payload: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
        U: IntoUrl + Display,
    {
        let target = url.to_string();
        let body = self
            .send_request(self.request(method, url).json(payload))
            .await?;
        parse(&body, &target)
    }
}

fn parse<T: DeserializeOwned>(body: &str, path: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        ApiError::InvalidResponse(format!("failed to parse response of {}: {}", path, e)).into()
    })
}

/// Maps a non-success response to an error, keeping the server's message
fn rejection(status: StatusCode, body: &str) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::AuthenticationFailed,
        StatusCode::NOT_FOUND => ApiError::NotFound(server_message(body)),
        _ => ApiError::Rejected {
            status: status.as_u16(),
            message: server_message(body),
        },
    }
}

// Error bodies look like {"message": "..."} or {"message": ["...", "..."]}
fn server_message(body: &str) -> String {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| match value.get("message") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            _ => None,
        });
    match message {
        Some(m) if !m.is_empty() => m,
        _ if body.trim().is_empty() => "no details provided".to_string(),
        _ => body.trim().to_string(),
    }
}

#[async_trait]
impl TimesheetRepository for ApiClient {
    async fn current_actor(&self) -> Result<Actor> {
        self.get_json("/auth/me").await
    }

    async fn list_entries(&self) -> Result<Vec<TimeEntry>> {
        self.get_json("/timesheet-entries").await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.get_json("/users").await
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        self.get_json("/projects").await
    }

    async fn create_entry(&self, entry: &NewEntry) -> Result<TimeEntry> {
        self.send_json(Method::POST, self.endpoint("/timesheet-entries"), entry)
            .await
    }

    async fn update_entry(&self, id: &str, patch: &EntryPatch) -> Result<TimeEntry> {
        let url = self.resource_url("timesheet-entries", id)?;
        self.send_json(Method::PATCH, url, patch).await
    }

    async fn delete_entry(&self, id: &str) -> Result<()> {
        let url = self.resource_url("timesheet-entries", id)?;
        self.send_request(self.request(Method::DELETE, url))
            .await?;
        Ok(())
    }

    async fn find_submission(
        &self,
        user_id: &str,
        month: YearMonth,
    ) -> Result<Option<Submission>> {
        let path = "/timesheet-submissions/by-user-month";
        let request = self.request(Method::GET, self.endpoint(path)).query(&[
            ("userId", user_id.to_string()),
            ("year", month.year.to_string()),
            ("month", month.month.to_string()),
        ]);

        match self.send_request(request).await {
            Ok(body) if body.trim().is_empty() || body.trim() == "null" => Ok(None),
            Ok(body) => parse(&body, path).map(Some),
            Err(crate::error::TimesheetError::Api(ApiError::NotFound(_))) => {
                tracing::debug!(user_id, %month, "no submission yet");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn create_submission(&self, submission: &NewSubmission) -> Result<Submission> {
        self.send_json(Method::POST, self.endpoint("/timesheet-submissions"), submission)
            .await
    }

    async fn update_submission(&self, id: &str, patch: &SubmissionPatch) -> Result<Submission> {
        let url = self.resource_url("timesheet-submissions", id)?;
        self.send_json(Method::PATCH, url, patch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TimesheetError;

    #[test]
    fn test_new_rejects_bad_configuration() {
        assert!(matches!(
            ApiClient::new("localhost:3000", "token".to_string()),
            Err(TimesheetError::Config(ConfigError::InvalidUrl(_)))
        ));
        assert!(matches!(
            ApiClient::new("http://localhost:3000", "  ".to_string()),
            Err(TimesheetError::Config(ConfigError::InvalidToken))
        ));

        let client = ApiClient::new("https://api.example.com/", "token".to_string()).unwrap();
        assert_eq!(client.base_url(), "https://api.example.com");
    }

    #[test]
    fn test_resource_ids_are_encoded_as_one_segment() {
        let client = ApiClient::new("https://api.example.com/v1/", "token".to_string()).unwrap();
        assert_eq!(
            client.resource_url("timesheet-entries", "42").unwrap().as_str(),
            "https://api.example.com/v1/timesheet-entries/42"
        );
        assert_eq!(
            client
                .resource_url("timesheet-submissions", "a/b?c")
                .unwrap()
                .as_str(),
            "https://api.example.com/v1/timesheet-submissions/a%2Fb%3Fc"
        );

        let root = ApiClient::new("http://localhost:3000", "token".to_string()).unwrap();
        assert_eq!(
            root.resource_url("timesheet-entries", "e 1").unwrap().as_str(),
            "http://localhost:3000/timesheet-entries/e%201"
        );
    }

    #[test]
    fn test_server_message_extraction() {
        assert_eq!(server_message(r#"{"message":"Entry is locked"}"#), "Entry is locked");
        assert_eq!(
            server_message(r#"{"message":["hours must be positive","date is required"]}"#),
            "hours must be positive, date is required"
        );
        assert_eq!(server_message("Bad Gateway"), "Bad Gateway");
        assert_eq!(server_message(""), "no details provided");
    }

    #[test]
    fn test_rejection_mapping() {
        assert!(matches!(
            rejection(StatusCode::UNAUTHORIZED, ""),
            ApiError::AuthenticationFailed
        ));
        assert!(matches!(
            rejection(StatusCode::NOT_FOUND, "{}"),
            ApiError::NotFound(_)
        ));
        match rejection(StatusCode::BAD_REQUEST, r#"{"message":"invalid"}"#) {
            ApiError::Rejected { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "invalid");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
