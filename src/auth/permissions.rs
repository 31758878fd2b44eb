use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Actor roles carried in the token's role claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Staff,
}

/// Resources gated by the permission map, one per API entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Prospects,
    Employers,
    Jobs,
    Applications,
    Interviews,
    Clients,
    Documents,
    Payments,
    JobMatches,
    VisaApplications,
    SmartCardApplications,
    FlightBookings,
}

/// Action classes, finer-grained than HTTP verbs: a status change is
/// Transition even though it arrives as PATCH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    Write,
    Transition,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Permission {
    pub resource: Resource,
    pub action: Action,
}

impl Permission {
    pub const fn new(resource: Resource, action: Action) -> Self {
        Self { resource, action }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}:{:?}", self.resource, self.action)
    }
}

/// Immutable permission table, built once at startup and shared by reference
/// through router state. Lookups are fail-closed: a permission with no entry
/// denies every role.
#[derive(Debug, Clone)]
pub struct PermissionMap {
    grants: HashMap<Permission, Vec<Role>>,
}

impl PermissionMap {
    /// The production grant table. Staff run the day-to-day pipeline; only
    /// Admin may soft-delete records or touch payment data.
    pub fn standard() -> Self {
        use Action::*;
        use Resource::*;

        let mut grants: HashMap<Permission, Vec<Role>> = HashMap::new();

        let both = vec![Role::Admin, Role::Staff];
        let admin_only = vec![Role::Admin];

        for resource in [
            Prospects,
            Employers,
            Jobs,
            Applications,
            Interviews,
            Clients,
            Documents,
            JobMatches,
            VisaApplications,
            SmartCardApplications,
            FlightBookings,
        ] {
            grants.insert(Permission::new(resource, Read), both.clone());
            grants.insert(Permission::new(resource, Write), both.clone());
            grants.insert(Permission::new(resource, Transition), both.clone());
            grants.insert(Permission::new(resource, Delete), admin_only.clone());
        }

        grants.insert(Permission::new(Payments, Read), both.clone());
        grants.insert(Permission::new(Payments, Write), admin_only.clone());
        grants.insert(Permission::new(Payments, Transition), admin_only.clone());
        grants.insert(Permission::new(Payments, Delete), admin_only);

        Self { grants }
    }

    /// Empty table, useful in tests for exercising the deny-by-default path.
    pub fn empty() -> Self {
        Self { grants: HashMap::new() }
    }

    pub fn with_grant(mut self, permission: Permission, roles: Vec<Role>) -> Self {
        self.grants.insert(permission, roles);
        self
    }

    /// Fail-closed check: unknown permission denies, whatever the role.
    pub fn allows(&self, role: Role, permission: Permission) -> bool {
        match self.grants.get(&permission) {
            Some(roles) => roles.contains(&role),
            None => false,
        }
    }
}

/// Gate for a single permission; every handler calls exactly one of these
/// before any business logic.
pub fn authorize(map: &PermissionMap, role: Role, permission: Permission) -> Result<(), ApiError> {
    if map.allows(role, permission) {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!("Role {:?} may not perform {}", role, permission)))
    }
}

/// Gate for alternatives: allow iff at least one permission authorizes.
pub fn authorize_any(map: &PermissionMap, role: Role, permissions: &[Permission]) -> Result<(), ApiError> {
    if permissions.iter().any(|p| map.allows(role, *p)) {
        return Ok(());
    }
    let wanted: Vec<String> = permissions.iter().map(|p| p.to_string()).collect();
    Err(ApiError::forbidden(format!(
        "Role {:?} may not perform any of [{}]",
        role,
        wanted.join(", ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_permission_denies_every_role() {
        let map = PermissionMap::empty();
        let p = Permission::new(Resource::Prospects, Action::Read);
        assert!(!map.allows(Role::Admin, p));
        assert!(!map.allows(Role::Staff, p));
        assert!(authorize(&map, Role::Admin, p).is_err());
    }

    #[test]
    fn standard_table_lets_staff_run_pipeline_but_not_delete() {
        let map = PermissionMap::standard();
        assert!(map.allows(Role::Staff, Permission::new(Resource::Prospects, Action::Transition)));
        assert!(!map.allows(Role::Staff, Permission::new(Resource::Prospects, Action::Delete)));
        assert!(map.allows(Role::Admin, Permission::new(Resource::Prospects, Action::Delete)));
    }

    #[test]
    fn payments_write_is_admin_only() {
        let map = PermissionMap::standard();
        assert!(!map.allows(Role::Staff, Permission::new(Resource::Payments, Action::Write)));
        assert!(map.allows(Role::Admin, Permission::new(Resource::Payments, Action::Write)));
        assert!(map.allows(Role::Staff, Permission::new(Resource::Payments, Action::Read)));
    }

    #[test]
    fn authorize_any_allows_on_first_match() {
        let map = PermissionMap::standard();
        let perms = [
            Permission::new(Resource::Payments, Action::Write),
            Permission::new(Resource::Payments, Action::Read),
        ];
        assert!(authorize_any(&map, Role::Staff, &perms).is_ok());
        assert!(authorize_any(&map, Role::Staff, &perms[..1]).is_err());
    }

    #[test]
    fn authorize_any_with_no_keys_denies() {
        let map = PermissionMap::standard();
        assert!(authorize_any(&map, Role::Admin, &[]).is_err());
    }

    #[test]
    fn forbidden_maps_to_403() {
        let map = PermissionMap::empty();
        let err = authorize(&map, Role::Staff, Permission::new(Resource::Clients, Action::Read)).unwrap_err();
        assert_eq!(err.status_code(), 403);
    }
}
