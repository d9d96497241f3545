//! Request-level composition of the rate guard and the unlock engine.
//!
//! [`UnlockService`] is what a transport calls. It owns the unlock
//! [`GuardPolicy`], admits the request, runs the engine only when admitted,
//! and shapes the result into the response contract.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::{UnlockEngine, UnlockOutcome};
use crate::error::{retry_after_secs, UnlockError};
use crate::guard::{GuardPolicy, RateGuard, RequestContext};
use crate::item::{Item, ItemId};
use crate::record::UnlockRecord;
use crate::user::{User, UserId};

/// Body of an unlock request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockRequest {
    /// User spending the tokens.
    pub user_id: UserId,
}

/// Successful unlock response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockResponse {
    /// Always true; failures use [`ErrorBody`].
    pub success: bool,
    /// The user after the unlock.
    pub updated_user: User,
    /// The unlocked item.
    pub item: Item,
    /// Ask the user to acknowledge the item's risk flag.
    pub requires_risk_acknowledgement: bool,
}

impl From<UnlockOutcome> for UnlockResponse {
    fn from(outcome: UnlockOutcome) -> Self {
        Self {
            success: true,
            updated_user: outcome.user,
            item: outcome.item,
            requires_risk_acknowledgement: outcome.requires_risk_acknowledgement,
        }
    }
}

/// Structured failure response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Error kind: `bad_request`, `not_found`, `precondition_failed`,
    /// `rate_limited`, `store_unavailable` or `internal`.
    pub error: String,
    /// Human-readable message.
    pub message: String,
    /// Which record was missing, for `not_found`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    /// Which rule failed, for `precondition_failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Whole seconds to wait, for `rate_limited`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

impl ErrorBody {
    /// Body for a request that could not be decoded.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            error: "bad_request".to_string(),
            message: message.into(),
            entity: None,
            reason: None,
            retry_after_seconds: None,
        }
    }
}

impl From<&UnlockError> for ErrorBody {
    fn from(err: &UnlockError) -> Self {
        let mut body = Self {
            error: String::new(),
            message: err.to_string(),
            entity: None,
            reason: None,
            retry_after_seconds: None,
        };
        match err {
            UnlockError::NotFound { entity, .. } => {
                body.error = "not_found".to_string();
                body.entity = Some(entity.to_string().to_ascii_lowercase());
            }
            UnlockError::PreconditionFailed(p) => {
                body.error = "precondition_failed".to_string();
                body.reason = Some(p.code().to_string());
            }
            UnlockError::RateLimited { retry_after_ms } => {
                body.error = "rate_limited".to_string();
                body.retry_after_seconds = Some(retry_after_secs(*retry_after_ms));
            }
            UnlockError::StoreUnavailable(_) => body.error = "store_unavailable".to_string(),
            UnlockError::Internal { .. } => body.error = "internal".to_string(),
        }
        body
    }
}

/// Guarded entry point for the catalog and unlock operations.
#[derive(Clone)]
pub struct UnlockService {
    engine: UnlockEngine,
    guard: Arc<RateGuard>,
    unlock_policy: GuardPolicy,
}

impl UnlockService {
    /// Create a service with an explicit unlock policy.
    #[must_use]
    pub fn new(engine: UnlockEngine, guard: Arc<RateGuard>, unlock_policy: GuardPolicy) -> Self {
        Self {
            engine,
            guard,
            unlock_policy,
        }
    }

    /// The engine behind this service.
    #[must_use]
    pub const fn engine(&self) -> &UnlockEngine {
        &self.engine
    }

    /// The guard behind this service.
    #[must_use]
    pub const fn guard(&self) -> &Arc<RateGuard> {
        &self.guard
    }

    /// The full catalog.
    pub fn catalog(&self) -> Result<Vec<Item>, UnlockError> {
        self.engine.catalog()
    }

    /// One user.
    pub fn user(&self, id: &UserId) -> Result<User, UnlockError> {
        self.engine.user(id)
    }

    /// One user's unlock history.
    pub fn history(&self, id: &UserId) -> Result<Vec<UnlockRecord>, UnlockError> {
        self.engine.history_for(id)
    }

    /// Admit and execute an unlock of `item_id` for `request.user_id`.
    ///
    /// The request's user becomes the guard subject, so the default policy
    /// throttles per user and client address.
    pub fn unlock(
        &self,
        ctx: &RequestContext,
        item_id: &ItemId,
        request: &UnlockRequest,
    ) -> Result<UnlockResponse, UnlockError> {
        let ctx = ctx.clone().with_subject(request.user_id.as_str());
        self.guard
            .guard(&self.unlock_policy, &ctx, || {
                self.engine.unlock(&request.user_id, item_id)
            })
            .map(UnlockResponse::from)
    }
}
