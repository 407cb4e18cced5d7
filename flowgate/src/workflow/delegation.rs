//! Delegation ledger and acting-authority resolution
//!
//! A delegation is a time-bounded grant of a role's approval authority
//! from one user to another. Resolution is additive: delegates join the
//! set of directory role holders rather than replacing them, unless the
//! delegator explicitly marked the grant exclusive.

use crate::error::{FlowgateError, Result, WorkflowError};
use crate::workflow::{RoleName, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use ulid::Ulid;

/// Unique identifier for delegations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DelegationId(Ulid);

impl DelegationId {
    /// Create a new random delegation ID
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a DelegationId from a string representation
    pub fn parse(s: &str) -> Result<Self> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| FlowgateError::Other(format!("Invalid delegation ID '{}': {}", s, e)))
    }
}

impl Default for DelegationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DelegationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A time-bounded reassignment of a role's authority
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delegation {
    /// Unique identifier
    pub id: DelegationId,
    /// The user granting their authority
    pub delegator: UserId,
    /// The user receiving the authority
    pub delegate: UserId,
    /// The role whose authority is delegated
    pub role: RoleName,
    /// Optional module scope; `None` covers every module
    pub module: Option<String>,
    /// When the delegation takes effect
    pub starts_at: DateTime<Utc>,
    /// When the delegation lapses; `None` means indefinite
    pub ends_at: Option<DateTime<Utc>>,
    /// When the delegation was revoked, if it was
    pub revoked_at: Option<DateTime<Utc>>,
    /// Whether the delegator gives up their own authority for the window
    pub exclusive: bool,
    /// When the record was created
    pub created_at: DateTime<Utc>,
}

impl Delegation {
    /// Whether the delegation is in force at time `at`
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        if self.starts_at > at {
            return false;
        }
        if let Some(revoked_at) = self.revoked_at {
            if revoked_at <= at {
                return false;
            }
        }
        if let Some(ends_at) = self.ends_at {
            if at >= ends_at {
                return false;
            }
        }
        true
    }

    /// Whether the delegation applies to the given role/module at `at`
    pub fn covers(&self, role: &RoleName, module: Option<&str>, at: DateTime<Utc>) -> bool {
        if &self.role != role || !self.is_active_at(at) {
            return false;
        }
        match (&self.module, module) {
            // Unscoped delegations cover every module.
            (None, _) => true,
            // Scoped delegations only cover their own module; an
            // unscoped query does not match a scoped delegation.
            (Some(scope), Some(m)) => scope == m,
            (Some(_), None) => false,
        }
    }
}

/// Point-in-time lookup of the users currently holding a role
///
/// The identity directory is an external collaborator; the engine only
/// consumes this read-only seam.
pub trait RoleDirectory: Send + Sync {
    /// Users holding `role` right now, before delegation overrides
    fn users_with_role(&self, role: &RoleName) -> HashSet<UserId>;
}

/// Map-backed role directory
///
/// Useful for tests and for deployments that sync role membership from
/// an external system into a flat file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticRoleDirectory {
    assignments: HashMap<RoleName, HashSet<UserId>>,
}

impl StaticRoleDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user to a role
    pub fn assign(&mut self, role: RoleName, user: UserId) {
        self.assignments.entry(role).or_default().insert(user);
    }

    /// Remove a user from a role
    pub fn unassign(&mut self, role: &RoleName, user: &UserId) {
        if let Some(users) = self.assignments.get_mut(role) {
            users.remove(user);
        }
    }

    /// All role assignments
    pub fn assignments(&self) -> impl Iterator<Item = (&RoleName, &HashSet<UserId>)> {
        self.assignments.iter()
    }
}

impl RoleDirectory for StaticRoleDirectory {
    fn users_with_role(&self, role: &RoleName) -> HashSet<UserId> {
        self.assignments.get(role).cloned().unwrap_or_default()
    }
}

/// Append-oriented record of delegations
///
/// Writes (delegate/revoke) are independent of instance transitions;
/// the engine only reads the ledger while authorizing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelegationLedger {
    delegations: Vec<Delegation>,
}

impl DelegationLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new delegation
    ///
    /// Fails with `SelfDelegationError` when delegator and delegate are
    /// the same user.
    #[allow(clippy::too_many_arguments)]
    pub fn delegate(
        &mut self,
        delegator: UserId,
        delegate: UserId,
        role: RoleName,
        module: Option<String>,
        starts_at: DateTime<Utc>,
        ends_at: Option<DateTime<Utc>>,
        exclusive: bool,
    ) -> Result<&Delegation> {
        if delegator == delegate {
            return Err(WorkflowError::SelfDelegation {
                user: delegator.to_string(),
            }
            .into());
        }

        let delegation = Delegation {
            id: DelegationId::new(),
            delegator,
            delegate,
            role,
            module,
            starts_at,
            ends_at,
            revoked_at: None,
            exclusive,
            created_at: Utc::now(),
        };
        self.delegations.push(delegation);
        Ok(self
            .delegations
            .last()
            .expect("delegation was just pushed"))
    }

    /// Revoke a delegation at time `at`
    ///
    /// Idempotent: revoking an already-revoked delegation keeps the
    /// original revocation time.
    pub fn revoke(&mut self, id: &DelegationId, at: DateTime<Utc>) -> Result<()> {
        let delegation = self
            .delegations
            .iter_mut()
            .find(|d| &d.id == id)
            .ok_or_else(|| FlowgateError::DelegationNotFound(id.to_string()))?;

        if delegation.revoked_at.is_none() {
            delegation.revoked_at = Some(at);
        }
        Ok(())
    }

    /// Look up a delegation by ID
    pub fn get(&self, id: &DelegationId) -> Option<&Delegation> {
        self.delegations.iter().find(|d| &d.id == id)
    }

    /// All delegations, in insertion order
    pub fn delegations(&self) -> &[Delegation] {
        &self.delegations
    }

    /// Active delegates of `role`/`module` at time `at`
    pub fn active_delegates(
        &self,
        role: &RoleName,
        module: Option<&str>,
        at: DateTime<Utc>,
    ) -> HashSet<UserId> {
        self.delegations
            .iter()
            .filter(|d| d.covers(role, module, at))
            .map(|d| d.delegate.clone())
            .collect()
    }

    /// Delegators who exclusively handed off `role`/`module` at `at`
    pub fn exclusive_delegators(
        &self,
        role: &RoleName,
        module: Option<&str>,
        at: DateTime<Utc>,
    ) -> HashSet<UserId> {
        self.delegations
            .iter()
            .filter(|d| d.exclusive && d.covers(role, module, at))
            .map(|d| d.delegator.clone())
            .collect()
    }
}

/// Read-only composition of the role directory and the delegation ledger
///
/// Authorization is a set-membership check against the resolved set; a
/// user who is both a role holder and a delegate appears once.
pub struct AuthorityResolver<'a> {
    directory: &'a dyn RoleDirectory,
    ledger: &'a DelegationLedger,
}

impl<'a> AuthorityResolver<'a> {
    /// Create a resolver over the given directory and ledger
    pub fn new(directory: &'a dyn RoleDirectory, ledger: &'a DelegationLedger) -> Self {
        Self { directory, ledger }
    }

    /// The set of users authorized to act as `role` at time `at`
    ///
    /// Directory holders union active delegates, minus any holder who
    /// exclusively delegated away their authority for this window.
    pub fn acting_authority(
        &self,
        role: &RoleName,
        module: Option<&str>,
        at: DateTime<Utc>,
    ) -> HashSet<UserId> {
        let mut authorized = self.directory.users_with_role(role);
        for delegator in self.ledger.exclusive_delegators(role, module, at) {
            authorized.remove(&delegator);
        }
        authorized.extend(self.ledger.active_delegates(role, module, at));
        authorized
    }

    /// Whether `user` may act as `role` at time `at`
    pub fn is_authorized(
        &self,
        user: &UserId,
        role: &RoleName,
        module: Option<&str>,
        at: DateTime<Utc>,
    ) -> bool {
        self.acting_authority(role, module, at).contains(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn directory_with(role: &str, users: &[&str]) -> StaticRoleDirectory {
        let mut directory = StaticRoleDirectory::new();
        for user in users {
            directory.assign(RoleName::new(role), UserId::new(*user));
        }
        directory
    }

    #[test]
    fn test_self_delegation_rejected() {
        let mut ledger = DelegationLedger::new();
        let result = ledger.delegate(
            UserId::new("alice"),
            UserId::new("alice"),
            RoleName::new("EE"),
            None,
            Utc::now(),
            None,
            false,
        );
        assert!(matches!(
            result,
            Err(FlowgateError::Workflow(WorkflowError::SelfDelegation { .. }))
        ));
        assert!(ledger.delegations().is_empty());
    }

    #[test]
    fn test_delegation_window() {
        let now = Utc::now();
        let mut ledger = DelegationLedger::new();
        let id = ledger
            .delegate(
                UserId::new("alice"),
                UserId::new("bob"),
                RoleName::new("EE"),
                None,
                now,
                Some(now + Duration::hours(24)),
                false,
            )
            .unwrap()
            .id;

        let delegation = ledger.get(&id).unwrap();
        assert!(delegation.is_active_at(now));
        assert!(delegation.is_active_at(now + Duration::hours(23)));
        // Window end is exclusive.
        assert!(!delegation.is_active_at(now + Duration::hours(24)));
        assert!(!delegation.is_active_at(now - Duration::seconds(1)));
    }

    #[test]
    fn test_union_semantics() {
        let now = Utc::now();
        let directory = directory_with("EE", &["alice"]);
        let mut ledger = DelegationLedger::new();
        ledger
            .delegate(
                UserId::new("alice"),
                UserId::new("bob"),
                RoleName::new("EE"),
                None,
                now - Duration::hours(1),
                None,
                false,
            )
            .unwrap();

        let resolver = AuthorityResolver::new(&directory, &ledger);
        let authorized = resolver.acting_authority(&RoleName::new("EE"), None, now);

        // Both the holder and the delegate pass; union, not replacement.
        assert!(authorized.contains(&UserId::new("alice")));
        assert!(authorized.contains(&UserId::new("bob")));
        assert_eq!(authorized.len(), 2);
    }

    #[test]
    fn test_revocation_takes_effect_for_subsequent_calls() {
        let now = Utc::now();
        let directory = directory_with("EE", &["alice"]);
        let mut ledger = DelegationLedger::new();
        let id = ledger
            .delegate(
                UserId::new("alice"),
                UserId::new("bob"),
                RoleName::new("EE"),
                None,
                now - Duration::hours(1),
                None,
                false,
            )
            .unwrap()
            .id;

        ledger.revoke(&id, now).unwrap();

        let resolver = AuthorityResolver::new(&directory, &ledger);
        assert!(!resolver.is_authorized(&UserId::new("bob"), &RoleName::new("EE"), None, now));
        // The delegate was authorized before the revocation instant.
        assert!(resolver.is_authorized(
            &UserId::new("bob"),
            &RoleName::new("EE"),
            None,
            now - Duration::minutes(30)
        ));
    }

    #[test]
    fn test_revoke_is_idempotent() {
        let now = Utc::now();
        let mut ledger = DelegationLedger::new();
        let id = ledger
            .delegate(
                UserId::new("alice"),
                UserId::new("bob"),
                RoleName::new("EE"),
                None,
                now,
                None,
                false,
            )
            .unwrap()
            .id;

        ledger.revoke(&id, now + Duration::hours(1)).unwrap();
        ledger.revoke(&id, now + Duration::hours(5)).unwrap();
        assert_eq!(
            ledger.get(&id).unwrap().revoked_at,
            Some(now + Duration::hours(1))
        );
    }

    #[test]
    fn test_revoke_unknown_delegation() {
        let mut ledger = DelegationLedger::new();
        let result = ledger.revoke(&DelegationId::new(), Utc::now());
        assert!(matches!(result, Err(FlowgateError::DelegationNotFound(_))));
    }

    #[test]
    fn test_module_scoped_delegation() {
        let now = Utc::now();
        let directory = StaticRoleDirectory::new();
        let mut ledger = DelegationLedger::new();
        ledger
            .delegate(
                UserId::new("alice"),
                UserId::new("bob"),
                RoleName::new("EE"),
                Some("RA_BILL".to_string()),
                now - Duration::hours(1),
                None,
                false,
            )
            .unwrap();

        let resolver = AuthorityResolver::new(&directory, &ledger);
        let role = RoleName::new("EE");
        assert!(resolver.is_authorized(&UserId::new("bob"), &role, Some("RA_BILL"), now));
        assert!(!resolver.is_authorized(&UserId::new("bob"), &role, Some("TENDER"), now));
    }

    #[test]
    fn test_exclusive_delegation_removes_delegator() {
        let now = Utc::now();
        let directory = directory_with("CE", &["carol", "dave"]);
        let mut ledger = DelegationLedger::new();
        ledger
            .delegate(
                UserId::new("carol"),
                UserId::new("erin"),
                RoleName::new("CE"),
                None,
                now - Duration::hours(1),
                Some(now + Duration::hours(1)),
                true,
            )
            .unwrap();

        let resolver = AuthorityResolver::new(&directory, &ledger);
        let authorized = resolver.acting_authority(&RoleName::new("CE"), None, now);

        assert!(!authorized.contains(&UserId::new("carol")));
        assert!(authorized.contains(&UserId::new("erin")));
        // Other directory holders are untouched.
        assert!(authorized.contains(&UserId::new("dave")));

        // Outside the window the delegator is back.
        let later = now + Duration::hours(2);
        let authorized = resolver.acting_authority(&RoleName::new("CE"), None, later);
        assert!(authorized.contains(&UserId::new("carol")));
        assert!(!authorized.contains(&UserId::new("erin")));
    }
}
