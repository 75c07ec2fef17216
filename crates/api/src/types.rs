//! Request/response payloads for the REST endpoints.

use nestmate_core::models::{SwipeAction, User};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Authentication
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
}

/// Token pair issued on login/register and rotated on refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthTokens {
    pub access: String,
    pub refresh: String,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    pub refresh: String,
}

/// Pre-registration uniqueness probe (email, phone).
#[derive(Debug, Clone, Serialize)]
pub struct ValidateUniqueRequest {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidateUniqueResponse {
    pub is_unique: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogoutRequest {
    pub refresh: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct UpdatePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateDetailsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about_me: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Roommate swipe decision.
#[derive(Debug, Clone, Serialize)]
pub struct LikeUserRequest {
    pub user_id: i64,
    pub action: SwipeAction,
}

// ─────────────────────────────────────────────────────────────────────────────
// Apartments
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct CreateApartmentRequest {
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub price: i64,
    pub number_of_rooms: i32,
    pub number_of_available_rooms: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<i64>,
}

/// Apartment swipe decision.
#[derive(Debug, Clone, Serialize)]
pub struct ApartmentPreferenceRequest {
    pub apartment_id: i64,
    pub action: SwipeAction,
}

// ─────────────────────────────────────────────────────────────────────────────
// Questionnaire
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct QuestionnaireResponse {
    pub question_id: i64,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitResponsesRequest {
    pub responses: Vec<QuestionnaireResponse>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Chat
// ─────────────────────────────────────────────────────────────────────────────

/// REST fallback send; there is no outbound socket protocol.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarkReadRequest {
    pub message_ids: Vec<i64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared
// ─────────────────────────────────────────────────────────────────────────────

/// Generic acknowledgement body.
#[derive(Debug, Clone, Deserialize)]
pub struct SuccessResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Server error body. The backend is inconsistent about which field carries
/// the human-readable message, so all known shapes are optional here and
/// normalized in one place.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiErrorBody {
    /// Best-effort human-readable message, in the backend's order of
    /// precedence: `detail`, then `error`, then `message`.
    pub fn into_message(self) -> Option<String> {
        self.detail.or(self.error).or(self.message)
    }
}
