//! Identity types: which tenant and which user a connection belongs to.
//!
//! Tenant and user identifiers arrive from storage and from callers in
//! whatever shape they happen to have (numbers, strings). Both are
//! normalized to their canonical string form here so that `42` and `"42"`
//! name the same connection.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// TenantId
// ---------------------------------------------------------------------------

/// Identifier of a tenant (an account / company).
///
/// A "newtype wrapper" around the canonical string form. Numeric ids are
/// rendered in decimal, so `TenantId::from(7)` equals `TenantId::from("7")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Creates a tenant id from anything string-like.
    ///
    /// Surrounding whitespace is trimmed.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_string())
    }

    /// Returns the canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for TenantId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<i64> for TenantId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for TenantId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TenantId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// UserId
// ---------------------------------------------------------------------------

/// Identifier of the signed-in user, as read from storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a user id from anything string-like.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_string())
    }

    /// Returns the canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// TenantKey
// ---------------------------------------------------------------------------

/// The (tenant, user) pair a physical connection is opened for.
///
/// The user half is optional: storage may not hold a user id yet (for
/// example right after login). Two keys are equal only when both halves
/// are equal, so a user switch inside the same tenant is a different key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantKey {
    /// The tenant the connection is scoped to.
    pub tenant: TenantId,
    /// The user the connection authenticates as, when known.
    pub user: Option<UserId>,
}

impl TenantKey {
    /// Creates a key from its two halves.
    pub fn new(tenant: impl Into<TenantId>, user: Option<UserId>) -> Self {
        Self {
            tenant: tenant.into(),
            user,
        }
    }
}

/// Renders as `tenant/user`, or `tenant/-` when no user is known.
impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.user {
            Some(user) => write!(f, "{}/{}", self.tenant, user),
            None => write!(f, "{}/-", self.tenant),
        }
    }
}
