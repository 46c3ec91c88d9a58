//! JSON message types for the authorization-session endpoints.
//!
//! # Message flow
//!
//! ```text
//! Client                                    Backend
//! ──────                                    ───────
//! GET  bind                          ──►
//!                                    ◄──    BindSessionResponse
//! POST verify  VerifyMemberRequest   ──►
//!                                    ◄──    VerifyMemberResponse
//! POST cancel  CancelSessionRequest  ──►    (only if the attempt did not succeed)
//! ```
//!
//! # Why are response fields optional?
//!
//! The backend has been observed to answer a bind request with `200 OK` but a
//! partially filled body (for example a token with no scanner identity when
//! the card could not be read).  Deserializing every field as `Option` lets
//! [`BindSessionResponse::into_claim`] report *which* field was missing as a
//! [`BindingError::IncompleteIdentity`] instead of a generic decode error.
//!
//! Identifier fields accept either JSON strings or integers; both are
//! normalised to `String`.

use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::errors::{BindingError, VerificationError};
use crate::domain::session::{HardwareClaim, MemberId, SessionToken, VerifiedMember};

/// Response of the bind-session operation.
///
/// ```json
/// {"token":"t1","hardware_user_id":"u1","hardware_name":"Alice"}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindSessionResponse {
    #[serde(default, deserialize_with = "lenient_id")]
    pub token: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub hardware_user_id: Option<String>,
    #[serde(default)]
    pub hardware_name: Option<String>,
}

impl BindSessionResponse {
    /// Converts the response into a [`HardwareClaim`].
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::IncompleteIdentity`] if any of the three fields
    /// is absent or blank.
    pub fn into_claim(self) -> Result<HardwareClaim, BindingError> {
        let token = required(self.token, "token")?;
        let hardware_user_id = required(self.hardware_user_id, "hardware_user_id")?;
        let hardware_display_name = required(self.hardware_name, "hardware_name")?;
        Ok(HardwareClaim {
            token: SessionToken::new(token),
            hardware_user_id,
            hardware_display_name,
        })
    }
}

/// Request body of the verify-member operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyMemberRequest {
    pub token: String,
    pub hardware_name: String,
}

/// Response of the verify-member operation.
///
/// ```json
/// {"member_id":"m1","member_name":"Alice"}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyMemberResponse {
    #[serde(default, deserialize_with = "lenient_id")]
    pub member_id: Option<String>,
    #[serde(default)]
    pub member_name: Option<String>,
}

impl VerifyMemberResponse {
    /// Converts the response into a [`VerifiedMember`].
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError::Malformed`] if either field is absent or
    /// blank; a success status with no identity is not a verification.
    pub fn into_member(self) -> Result<VerifiedMember, VerificationError> {
        let member_id = self
            .member_id
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| VerificationError::Malformed("missing member_id".to_string()))?;
        let member_name = self
            .member_name
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| VerificationError::Malformed("missing member_name".to_string()))?;
        Ok(VerifiedMember {
            member_id: MemberId::new(member_id),
            member_name,
        })
    }
}

/// Request body of the cancel-session operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelSessionRequest {
    pub token: String,
}

fn required(value: Option<String>, field: &'static str) -> Result<String, BindingError> {
    value
        .filter(|s| !s.trim().is_empty())
        .ok_or(BindingError::IncompleteIdentity { field })
}

/// Accepts `"42"`, `42`, or `null` for identifier fields.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdValue {
        Text(String),
        Signed(i64),
        Unsigned(u64),
    }

    Ok(
        Option::<IdValue>::deserialize(deserializer)?.map(|value| match value {
            IdValue::Text(s) => s,
            IdValue::Signed(n) => n.to_string(),
            IdValue::Unsigned(n) => n.to_string(),
        }),
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
