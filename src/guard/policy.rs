//! Per-operation guard configuration.
//!
//! A [`GuardPolicy`] is an explicit value built at the call site: the window
//! limits plus a function that turns a [`RequestContext`] into the key the
//! guard counts against.

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use super::RateLimit;

/// What the guard knows about an incoming request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Remote address as seen by the server, if known.
    pub client_addr: Option<IpAddr>,
    /// Logical operation name, e.g. `"POST:/catalog/:item_id/unlock"`.
    pub operation: String,
    /// Acting subject (usually the user id), if the request names one.
    pub subject: Option<String>,
}

impl RequestContext {
    /// Creates a context for `operation` with no address or subject.
    #[must_use]
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            client_addr: None,
            operation: operation.into(),
            subject: None,
        }
    }

    /// Sets the client address.
    #[must_use]
    pub fn with_client(mut self, addr: IpAddr) -> Self {
        self.client_addr = Some(addr);
        self
    }

    /// Sets the acting subject.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    fn client_label(&self) -> String {
        self.client_addr
            .map_or_else(|| "unknown".to_string(), |a| a.to_string())
    }

    fn subject_label(&self) -> &str {
        self.subject.as_deref().unwrap_or("anonymous")
    }
}

/// Maps a request to the key its admissions are counted under.
pub type KeyFn = Arc<dyn Fn(&RequestContext) -> String + Send + Sync>;

/// `client:operation:subject`, with `anonymous` when no subject is given.
#[must_use]
pub fn default_key(ctx: &RequestContext) -> String {
    format!(
        "{}:{}:{}",
        ctx.client_label(),
        ctx.operation,
        ctx.subject_label()
    )
}

/// `unlock:subject:client`, one window per user per address.
#[must_use]
pub fn unlock_key(ctx: &RequestContext) -> String {
    format!("unlock:{}:{}", ctx.subject_label(), ctx.client_label())
}

/// Limits and key function for one protected operation.
#[derive(Clone)]
pub struct GuardPolicy {
    /// Window limits.
    pub limit: RateLimit,
    key_fn: KeyFn,
}

impl GuardPolicy {
    /// Creates a policy using [`default_key`].
    #[must_use]
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            key_fn: Arc::new(default_key),
        }
    }

    /// The unlock policy: one request per five seconds per user and address.
    #[must_use]
    pub fn unlock() -> Self {
        Self::new(RateLimit::unlock_default()).with_key_fn(unlock_key)
    }

    /// Replaces the window limits, keeping the key function.
    #[must_use]
    pub fn with_limit(mut self, limit: RateLimit) -> Self {
        self.limit = limit;
        self
    }

    /// Replaces the key function.
    #[must_use]
    pub fn with_key_fn<F>(mut self, key_fn: F) -> Self
    where
        F: Fn(&RequestContext) -> String + Send + Sync + 'static,
    {
        self.key_fn = Arc::new(key_fn);
        self
    }

    /// Computes the key for `ctx`.
    #[must_use]
    pub fn key_for(&self, ctx: &RequestContext) -> String {
        (self.key_fn)(ctx)
    }
}

impl fmt::Debug for GuardPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardPolicy")
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}
