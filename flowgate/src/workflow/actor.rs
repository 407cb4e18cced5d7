//! Actor-related identifier types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when creating actor-related types
#[derive(Debug, Error)]
pub enum ActorError {
    /// User ID cannot be empty or whitespace only
    #[error("User ID cannot be empty or whitespace only")]
    EmptyUserId,
    /// Role name cannot be empty or whitespace only
    #[error("Role name cannot be empty or whitespace only")]
    EmptyRoleName,
}

/// Result type for actor operations
pub type ActorResult<T> = Result<T, ActorError>;

/// Identifier for a user, as issued by the external identity directory
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Create a new user ID
    ///
    /// # Panics
    /// Panics if the ID is empty or whitespace only. For non-panicking
    /// creation, use `try_new` instead.
    pub fn new(id: impl Into<String>) -> Self {
        Self::try_new(id).expect("User ID cannot be empty or whitespace only")
    }

    /// Create a new user ID, returning an error for invalid input
    pub fn try_new(id: impl Into<String>) -> ActorResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ActorError::EmptyUserId);
        }
        Ok(Self(id))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of a role whose holders may act at a workflow step
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleName(String);

impl RoleName {
    /// Create a new role name
    ///
    /// # Panics
    /// Panics if the name is empty or whitespace only. For non-panicking
    /// creation, use `try_new` instead.
    pub fn new(name: impl Into<String>) -> Self {
        Self::try_new(name).expect("Role name cannot be empty or whitespace only")
    }

    /// Create a new role name, returning an error for invalid input
    pub fn try_new(name: impl Into<String>) -> ActorResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ActorError::EmptyRoleName);
        }
        Ok(Self(name))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RoleName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RoleName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for RoleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
