//! Supabase access over HTTP.
//!
//! `SupabaseClient` carries the project URL, the anon key and the signed-in
//! user's access token; it is shared (cheap clone) between the document store
//! here and the auth provider in `convo-auth`, so a sign-in immediately
//! scopes every later store request to that user.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, error, instrument};
use uuid::Uuid;

use convo_core::config::BackendConfig;
use convo_core::draft::ConversationInsert;
use convo_core::error::{ConvoError, Result};
use convo_core::types::{ConversationId, Profile, Response};

use crate::store::DocumentStore;

const CONVERSATIONS: &str = "conversations";
const PROFILES: &str = "profiles";

/// Shared HTTP handle for one Supabase project.
#[derive(Clone)]
pub struct SupabaseClient {
    http: Client,
    base_url: String,
    anon_key: String,
    access_token: Arc<RwLock<Option<String>>>,
    timeout_secs: u64,
}

impl std::fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("base_url", &self.base_url)
            .field("signed_in", &self.access_token().is_some())
            .finish()
    }
}

impl SupabaseClient {
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        if !config.is_configured() {
            return Err(ConvoError::Config(
                "Backend URL and anon key are required".to_string(),
            ));
        }
        let timeout_secs = config.request_timeout_secs.max(1);
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ConvoError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.url.trim().trim_end_matches('/').to_string(),
            anon_key: config.anon_key.trim().to_string(),
            access_token: Arc::new(RwLock::new(None)),
            timeout_secs,
        })
    }

    /// Replace the bearer token used for every subsequent request.
    pub fn set_access_token(&self, token: Option<String>) {
        if let Ok(mut slot) = self.access_token.write() {
            *slot = token;
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.access_token.read().ok().and_then(|t| t.clone())
    }

    /// Absolute URL for a path below the project root, e.g. `rest/v1/profiles`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Start a request carrying the `apikey` header and the bearer token
    /// (the anon key when nobody is signed in).
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.authorize(self.http.request(method, self.endpoint(path)))
    }

    /// Like [`SupabaseClient::request`], with URL-encoded query parameters.
    pub fn request_with_query(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<RequestBuilder> {
        let url = Url::parse_with_params(&self.endpoint(path), query)
            .map_err(|e| ConvoError::Config(format!("Invalid backend URL: {}", e)))?;
        Ok(self.authorize(self.http.request(method, url)))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token().unwrap_or_else(|| self.anon_key.clone());
        builder.header("apikey", &self.anon_key).bearer_auth(bearer)
    }

    /// Send `builder`, turning transport failures and non-2xx statuses into
    /// `ConvoError`s built by `kind`.
    pub async fn execute(
        &self,
        operation: &str,
        builder: RequestBuilder,
        kind: fn(String) -> ConvoError,
    ) -> Result<reqwest::Response> {
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ConvoError::Timeout {
                    operation: operation.to_string(),
                    secs: self.timeout_secs,
                }
            } else {
                kind(format!("{}: {}", operation, e.without_url()))
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        error!(operation, status = %status, "Supabase request failed");
        Err(kind(format!(
            "{}: {}",
            operation,
            error_message(status, &body)
        )))
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

/// Best human-readable message from a PostgREST or GoTrue error body.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .message
        .or(parsed.msg)
        .or(parsed.error_description)
        .or(parsed.error)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status.to_string()
            } else {
                trimmed.to_string()
            }
        })
}

/// Document store over the Supabase REST interface.
#[derive(Debug, Clone)]
pub struct SupabaseStore {
    client: SupabaseClient,
}

impl SupabaseStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &SupabaseClient {
        &self.client
    }

    fn rest(table: &str, query: &str) -> String {
        if query.is_empty() {
            format!("rest/v1/{}", table)
        } else {
            format!("rest/v1/{}?{}", table, query)
        }
    }
}

#[async_trait]
impl DocumentStore for SupabaseStore {
    #[instrument(skip(self))]
    async fn list_conversations(&self) -> Result<Vec<serde_json::Value>> {
        let path = Self::rest(CONVERSATIONS, "select=*&order=created_at.desc");
        let response = self
            .client
            .execute(
                "list conversations",
                self.client.request(Method::GET, &path),
                ConvoError::Storage,
            )
            .await?;
        let rows: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| ConvoError::Storage(format!("list conversations: {}", e)))?;
        debug!(count = rows.len(), "Conversations fetched");
        Ok(rows)
    }

    #[instrument(skip(self, row), fields(title = row.title))]
    async fn insert_conversation(&self, row: &ConversationInsert<'_>) -> Result<()> {
        let builder = self
            .client
            .request(Method::POST, &Self::rest(CONVERSATIONS, ""))
            .header("Prefer", "return=minimal")
            .json(row);
        self.client
            .execute("insert conversation", builder, ConvoError::Storage)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(conversation_id = %id))]
    async fn delete_conversation(&self, id: ConversationId) -> Result<()> {
        let path = Self::rest(CONVERSATIONS, &format!("id=eq.{}", id));
        self.client
            .execute(
                "delete conversation",
                self.client.request(Method::DELETE, &path),
                ConvoError::Storage,
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, responses), fields(conversation_id = %id, count = responses.len()))]
    async fn update_responses(&self, id: ConversationId, responses: &[Response]) -> Result<()> {
        let path = Self::rest(CONVERSATIONS, &format!("id=eq.{}", id));
        let builder = self
            .client
            .request(Method::PATCH, &path)
            .header("Prefer", "return=minimal")
            .json(&serde_json::json!({ "responses": responses }));
        self.client
            .execute("update responses", builder, ConvoError::Storage)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        let path = Self::rest(PROFILES, &format!("select=*&id=eq.{}", user_id));
        let response = self
            .client
            .execute(
                "get profile",
                self.client.request(Method::GET, &path),
                ConvoError::Storage,
            )
            .await?;
        let rows: Vec<Profile> = response
            .json()
            .await
            .map_err(|e| ConvoError::Storage(format!("get profile: {}", e)))?;
        Ok(rows.into_iter().next())
    }

    #[instrument(skip(self, profile), fields(user_id = %profile.id))]
    async fn insert_profile(&self, profile: &Profile) -> Result<()> {
        let builder = self
            .client
            .request(Method::POST, &Self::rest(PROFILES, ""))
            .header("Prefer", "return=minimal")
            .json(profile);
        self.client
            .execute("insert profile", builder, ConvoError::Storage)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BackendConfig {
        BackendConfig {
            url: "https://demo.supabase.co/".to_string(),
            anon_key: "anon".to_string(),
            request_timeout_secs: 5,
        }
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let err = SupabaseClient::from_config(&BackendConfig::default()).unwrap_err();
        assert!(matches!(err, ConvoError::Config(_)));
    }

    #[test]
    fn test_endpoint_joins_paths() {
        let client = SupabaseClient::from_config(&config()).unwrap();
        assert_eq!(
            client.endpoint("/rest/v1/profiles"),
            "https://demo.supabase.co/rest/v1/profiles"
        );
    }

    #[test]
    fn test_access_token_is_shared_between_clones() {
        let client = SupabaseClient::from_config(&config()).unwrap();
        let clone = client.clone();
        assert!(clone.access_token().is_none());

        client.set_access_token(Some("jwt".into()));
        assert_eq!(clone.access_token().as_deref(), Some("jwt"));

        clone.set_access_token(None);
        assert!(client.access_token().is_none());
    }

    #[test]
    fn test_request_headers() {
        let client = SupabaseClient::from_config(&config()).unwrap();
        let request = client
            .request(Method::GET, "rest/v1/conversations")
            .build()
            .unwrap();
        assert_eq!(request.headers()["apikey"], "anon");
        assert_eq!(request.headers()["authorization"], "Bearer anon");

        client.set_access_token(Some("user-jwt".into()));
        let request = client.request(Method::GET, "x").build().unwrap();
        assert_eq!(request.headers()["authorization"], "Bearer user-jwt");
    }

    #[test]
    fn test_request_with_query_encodes_values() {
        let client = SupabaseClient::from_config(&config()).unwrap();
        let request = client
            .request_with_query(
                Method::POST,
                "auth/v1/recover",
                &[("redirect_to", "https://app.example/reset password")],
            )
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://demo.supabase.co/auth/v1/recover?redirect_to=https%3A%2F%2Fapp.example%2Freset+password"
        );
        assert_eq!(request.headers()["apikey"], "anon");
    }

    #[test]
    fn test_rest_paths() {
        assert_eq!(SupabaseStore::rest("profiles", ""), "rest/v1/profiles");
        let id = Uuid::nil();
        assert_eq!(
            SupabaseStore::rest("conversations", &format!("id=eq.{}", id)),
            "rest/v1/conversations?id=eq.00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_error_message_prefers_structured_fields() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"message":"permission denied"}"#),
            "permission denied"
        );
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"msg":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, "upstream down"), "upstream down");
        assert_eq!(
            error_message(StatusCode::SERVICE_UNAVAILABLE, ""),
            "503 Service Unavailable"
        );
    }

    #[test]
    fn test_debug_hides_token() {
        let client = SupabaseClient::from_config(&config()).unwrap();
        client.set_access_token(Some("secret-jwt".into()));
        let debug = format!("{:?}", client);
        assert!(!debug.contains("secret-jwt"));
        assert!(debug.contains("signed_in: true"));
    }
}
