//! REST API client for the Nestmate backend.
//!
//! One shared `reqwest` client with a fixed timeout; the access token is
//! read from the token store and injected as a bearer header before every
//! request. Response handling is centralized in `parse_response`, which is
//! the single place server error shapes are normalized.

use std::time::Duration;

use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use nestmate_core::models::{
    Apartment, ChatMessage, ChatRoom, QuestionSection, ReferenceData, User, UserPreferences,
};
use nestmate_core::TokenStore;

use crate::error::{ApiError, Result};
use crate::types::*;

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
const MAX_LOG_BODY_CHARS: usize = 512;
const API_PREFIX: &str = "/api/v1";

/// Client for the Nestmate REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    tokens: TokenStore,
}

impl ApiClient {
    /// Create a new API client with the default request timeout.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the backend (e.g. "https://api.nestmate.app")
    /// * `tokens` - Token store consulted before every request
    pub fn new(base_url: &str, tokens: TokenStore) -> Self {
        Self::with_timeout(base_url, tokens, Duration::from_millis(DEFAULT_TIMEOUT_MS))
    }

    /// Create a client with an explicit request timeout.
    pub fn with_timeout(base_url: &str, tokens: TokenStore, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// Base URL with any trailing slash stripped.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    /// Create headers for an API request, injecting the bearer token when
    /// one is stored. A missing token is not an error here; endpoints that
    /// require auth get a 401 the caller can react to.
    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = self.tokens.access_token()? {
            let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::precondition("Invalid access token format"))?;
            headers.insert(AUTHORIZATION, auth_value);
        }

        Ok(headers)
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("API response error ({}): {}", status, preview);
    }

    /// Parse a JSON response body. Non-2xx bodies are normalized into a
    /// single `ApiError::Api`; the server is inconsistent about whether the
    /// message lives in `detail`, `error`, or `message`, so all shapes are
    /// handled here and nowhere else.
    async fn parse_response<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .ok()
                .and_then(ApiErrorBody::into_message)
                .unwrap_or_else(|| format!("Request failed: {}", body));
            return Err(ApiError::api(status.as_u16(), message));
        }

        serde_json::from_str(&body).map_err(|e| {
            log::error!("Failed to deserialize response. Body: {}, Error: {}", body, e);
            ApiError::api(status.as_u16(), format!("Failed to parse response: {}", e))
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Authentication
    // ─────────────────────────────────────────────────────────────────────────

    /// Interactive login.
    ///
    /// POST /api/v1/authenticate/login/
    pub async fn login(&self, req: LoginRequest) -> Result<AuthTokens> {
        let url = self.url("/authenticate/login/");
        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&req)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Create a new account.
    ///
    /// POST /api/v1/authenticate/register/
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthTokens> {
        let url = self.url("/authenticate/register/");
        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&req)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Check a field value (email, phone) for uniqueness before registering.
    ///
    /// POST /api/v1/authenticate/validate-unique/
    pub async fn validate_unique(&self, req: ValidateUniqueRequest) -> Result<ValidateUniqueResponse> {
        let url = self.url("/authenticate/validate-unique/");
        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&req)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Exchange a refresh token for a fresh pair.
    ///
    /// POST /api/v1/authenticate/token/refresh/
    pub async fn refresh_token(&self, refresh: &str) -> Result<RefreshResponse> {
        let url = self.url("/authenticate/token/refresh/");
        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&RefreshRequest {
                refresh: refresh.to_string(),
            })
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Invalidate the refresh token server-side.
    ///
    /// POST /api/v1/authenticate/logout/
    pub async fn logout(&self, refresh: &str) -> Result<SuccessResponse> {
        let url = self.url("/authenticate/logout/");
        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&LogoutRequest {
                refresh: refresh.to_string(),
            })
            .send()
            .await?;
        Self::parse_response(response).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetch the authenticated user's profile. Always hits the server; the
    /// session manager relies on this bypassing any local profile cache.
    ///
    /// GET /api/v1/users/me/
    pub async fn get_me(&self) -> Result<User> {
        let url = self.url("/users/me/");
        let response = self.client.get(&url).headers(self.headers()?).send().await?;
        Self::parse_response(response).await
    }

    /// Fetch another user's profile.
    ///
    /// GET /api/v1/users/{id}/
    pub async fn get_user(&self, user_id: i64) -> Result<User> {
        let url = self.url(&format!("/users/{}/", user_id));
        let response = self.client.get(&url).headers(self.headers()?).send().await?;
        Self::parse_response(response).await
    }

    /// Fetch saved search preferences.
    ///
    /// GET /api/v1/users/preferences/
    pub async fn get_preferences(&self) -> Result<UserPreferences> {
        let url = self.url("/users/preferences/");
        let response = self.client.get(&url).headers(self.headers()?).send().await?;
        Self::parse_response(response).await
    }

    /// Save search preferences.
    ///
    /// PUT /api/v1/users/preferences/
    pub async fn save_preferences(&self, prefs: &UserPreferences) -> Result<UserPreferences> {
        let url = self.url("/users/preferences/");
        let response = self
            .client
            .put(&url)
            .headers(self.headers()?)
            .json(prefs)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Record a roommate swipe decision.
    ///
    /// POST /api/v1/users/like/
    pub async fn like_user(&self, req: LikeUserRequest) -> Result<SuccessResponse> {
        let url = self.url("/users/like/");
        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&req)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Change password.
    ///
    /// POST /api/v1/users/update-password/
    pub async fn update_password(&self, req: UpdatePasswordRequest) -> Result<SuccessResponse> {
        let url = self.url("/users/update-password/");
        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&req)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Update profile details.
    ///
    /// PATCH /api/v1/users/update-details/
    pub async fn update_details(&self, req: UpdateDetailsRequest) -> Result<User> {
        let url = self.url("/users/update-details/");
        let response = self
            .client
            .patch(&url)
            .headers(self.headers()?)
            .json(&req)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Apartments
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetch the apartment owned by the authenticated user.
    ///
    /// GET /api/v1/apartments/my/
    pub async fn my_apartment(&self) -> Result<Apartment> {
        let url = self.url("/apartments/my/");
        let response = self.client.get(&url).headers(self.headers()?).send().await?;
        Self::parse_response(response).await
    }

    /// Create a listing.
    ///
    /// POST /api/v1/apartments/new/
    pub async fn create_apartment(&self, req: CreateApartmentRequest) -> Result<Apartment> {
        let url = self.url("/apartments/new/");
        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&req)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Fetch the discovery feed of recommended apartments.
    ///
    /// GET /api/v1/apartments/recommendations/
    pub async fn recommendations(&self) -> Result<Vec<Apartment>> {
        let url = self.url("/apartments/recommendations/");
        let response = self.client.get(&url).headers(self.headers()?).send().await?;
        Self::parse_response(response).await
    }

    /// Fetch a single listing.
    ///
    /// GET /api/v1/apartments/{id}/
    pub async fn get_apartment(&self, apartment_id: i64) -> Result<Apartment> {
        let url = self.url(&format!("/apartments/{}/", apartment_id));
        let response = self.client.get(&url).headers(self.headers()?).send().await?;
        Self::parse_response(response).await
    }

    /// Record an apartment swipe decision.
    ///
    /// POST /api/v1/apartments/preference/
    pub async fn set_apartment_preference(
        &self,
        req: ApartmentPreferenceRequest,
    ) -> Result<SuccessResponse> {
        let url = self.url("/apartments/preference/");
        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&req)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Users who liked the authenticated user's apartment.
    ///
    /// GET /api/v1/apartments/likers/
    pub async fn apartment_likers(&self) -> Result<Vec<User>> {
        let url = self.url("/apartments/likers/");
        let response = self.client.get(&url).headers(self.headers()?).send().await?;
        Self::parse_response(response).await
    }

    /// Apartments the authenticated user has liked.
    ///
    /// GET /api/v1/apartments/liked/
    pub async fn liked_apartments(&self) -> Result<Vec<Apartment>> {
        let url = self.url("/apartments/liked/");
        let response = self.client.get(&url).headers(self.headers()?).send().await?;
        Self::parse_response(response).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Questionnaire + Reference Data
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetch the questionnaire definition.
    ///
    /// GET /api/v1/questionnaire/
    pub async fn get_questionnaire(&self) -> Result<Vec<QuestionSection>> {
        let url = self.url("/questionnaire/");
        let response = self.client.get(&url).headers(self.headers()?).send().await?;
        Self::parse_response(response).await
    }

    /// Submit questionnaire answers.
    ///
    /// POST /api/v1/questionnaire/responses/
    pub async fn submit_responses(&self, req: SubmitResponsesRequest) -> Result<SuccessResponse> {
        let url = self.url("/questionnaire/responses/");
        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&req)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Cities + tags used by onboarding and filters.
    ///
    /// GET /api/v1/users/preferences/payload/
    pub async fn preferences_payload(&self) -> Result<ReferenceData> {
        let url = self.url("/users/preferences/payload/");
        let response = self.client.get(&url).headers(self.headers()?).send().await?;
        Self::parse_response(response).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Chat
    // ─────────────────────────────────────────────────────────────────────────

    /// List chat rooms for the authenticated user.
    ///
    /// GET /api/v1/chat/rooms/
    pub async fn list_rooms(&self) -> Result<Vec<ChatRoom>> {
        let url = self.url("/chat/rooms/");
        let response = self.client.get(&url).headers(self.headers()?).send().await?;
        Self::parse_response(response).await
    }

    /// Message history for a room.
    ///
    /// GET /api/v1/chat/rooms/{id}/messages/
    pub async fn room_messages(&self, room_id: i64) -> Result<Vec<ChatMessage>> {
        let url = self.url(&format!("/chat/rooms/{}/messages/", room_id));
        let response = self.client.get(&url).headers(self.headers()?).send().await?;
        Self::parse_response(response).await
    }

    /// Send a message over REST. The socket is receive-only, so this is the
    /// only send path.
    ///
    /// POST /api/v1/chat/rooms/{id}/messages/
    pub async fn send_message(&self, room_id: i64, req: SendMessageRequest) -> Result<ChatMessage> {
        let url = self.url(&format!("/chat/rooms/{}/messages/", room_id));
        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&req)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Mark messages in a room as read.
    ///
    /// POST /api/v1/chat/rooms/{id}/read/
    pub async fn mark_read(&self, room_id: i64, req: MarkReadRequest) -> Result<SuccessResponse> {
        let url = self.url(&format!("/chat/rooms/{}/read/", room_id));
        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&req)
            .send()
            .await?;
        Self::parse_response(response).await
    }
}
