/// Access matrix and access-scoped filters
///
/// Every guarded operation is an [`Action`]. [`Action::scope_for`] is the
/// single table mapping (action, role) to either a [`Scope`] or a denial;
/// [`build_filter`] turns the scope into a store filter. Nothing here does
/// I/O, so denials happen before any store call.
///
/// | Action | Super Admin | Admin | User |
/// |---|---|---|---|
/// | list projects | all | owner or member | owner or member |
/// | list / search / mutate tasks | all | all | assigned to caller |
/// | delete task | all | all | denied |
/// | list users, create user, dump | all | all | denied |
/// | create project / task | all | all | all |
///
/// # Example
///
/// ```
/// use taskboard_shared::auth::authorization::{build_filter, Action};
/// use taskboard_shared::auth::context::AuthContext;
/// use taskboard_shared::models::user::Role;
/// use taskboard_shared::store::filter::Filter;
///
/// let caller = AuthContext::new("u1", Role::User);
/// let filter = build_filter(Filter::eq("projectid", "p1"), &caller, Action::ListTasks).unwrap();
/// assert_eq!(
///     filter,
///     Filter::eq("projectid", "p1").and(Filter::eq("assignedto", "u1")),
/// );
/// ```

use super::context::AuthContext;
use crate::models::task::fields::ASSIGNED_TO;
use crate::models::user::Role;
use crate::store::filter::Filter;
use crate::store::identifier::{resolve_candidates, CandidateKind};

/// Project fields referenced by the project visibility rule
const OWNER_ID: &str = "ownerId";
const MEMBER_IDS: &str = "memberIds";

/// Error type for access checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// The role may never perform the action
    #[error("{role} may not {action}")]
    Denied { action: Action, role: Role },

    /// Attempt to grant a role above the caller's own
    #[error("{actual} cannot assign the {requested} role")]
    RoleEscalation { requested: Role, actual: Role },
}

/// Guarded operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ListProjects,
    ListTasks,
    SearchTasks,
    MutateTask,
    DeleteTask,
    ListUsers,
    CreateUser,
    ViewEverything,
    CreateProject,
    CreateTask,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Action::ListProjects => "list projects",
            Action::ListTasks => "list tasks",
            Action::SearchTasks => "search tasks",
            Action::MutateTask => "update tasks",
            Action::DeleteTask => "delete tasks",
            Action::ListUsers => "list users",
            Action::CreateUser => "create users",
            Action::ViewEverything => "view everything",
            Action::CreateProject => "create projects",
            Action::CreateTask => "create tasks",
        })
    }
}

/// Visibility granted for an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// No constraint beyond the base filter
    Unrestricted,

    /// Projects the caller owns or belongs to
    OwnerOrMember,

    /// Tasks assigned to the caller
    AssignedToCaller,
}

impl Action {
    /// The access matrix
    pub fn scope_for(self, role: Role) -> Result<Scope, AccessError> {
        use Action::*;

        let scope = match (self, role) {
            (ListProjects, Role::SuperAdmin) => Scope::Unrestricted,
            (ListProjects, Role::Admin | Role::User) => Scope::OwnerOrMember,

            (ListTasks | SearchTasks | MutateTask, Role::User) => Scope::AssignedToCaller,
            (ListTasks | SearchTasks | MutateTask, Role::Admin | Role::SuperAdmin) => {
                Scope::Unrestricted
            }

            (DeleteTask | ListUsers | CreateUser | ViewEverything, Role::User) => {
                return Err(AccessError::Denied { action: self, role })
            }
            (DeleteTask | ListUsers | CreateUser | ViewEverything, Role::Admin | Role::SuperAdmin) => {
                Scope::Unrestricted
            }

            (CreateProject | CreateTask, _) => Scope::Unrestricted,
        };
        Ok(scope)
    }
}

impl Scope {
    /// Constraint to conjoin with the base filter
    pub fn constraint(self, caller_id: &str) -> Filter {
        match self {
            Scope::Unrestricted => Filter::All,
            Scope::OwnerOrMember => Filter::any_of(vec![
                Filter::eq(OWNER_ID, caller_id),
                Filter::eq(MEMBER_IDS, caller_id),
            ]),
            Scope::AssignedToCaller => Filter::eq(ASSIGNED_TO, caller_id),
        }
    }
}

/// Augments `base` with the caller's scope for `action`
pub fn build_filter(base: Filter, auth: &AuthContext, action: Action) -> Result<Filter, AccessError> {
    let scope = action.scope_for(auth.role)?;
    Ok(base.and(scope.constraint(&auth.user_id)))
}

/// A primary-key candidate with the caller's scope applied
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedCandidate {
    pub kind: CandidateKind,
    pub filter: Filter,
}

/// Resolves `raw_id` and scopes every candidate for `action`
///
/// Denials are reported before any candidate is produced.
pub fn scoped_candidates(
    raw_id: &str,
    auth: &AuthContext,
    action: Action,
) -> Result<Vec<ScopedCandidate>, AccessError> {
    let scope = action.scope_for(auth.role)?;

    Ok(resolve_candidates(raw_id)
        .into_iter()
        .map(|candidate| ScopedCandidate {
            kind: candidate.kind,
            filter: candidate.filter().and(scope.constraint(&auth.user_id)),
        })
        .collect())
}

/// Requires that `requested` does not exceed the caller's own role
pub fn require_assignable_role(auth: &AuthContext, requested: Role) -> Result<(), AccessError> {
    if auth.role.has_permission(requested) {
        Ok(())
    } else {
        Err(AccessError::RoleEscalation {
            requested,
            actual: auth.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACTIONS: [Action; 10] = [
        Action::ListProjects,
        Action::ListTasks,
        Action::SearchTasks,
        Action::MutateTask,
        Action::DeleteTask,
        Action::ListUsers,
        Action::CreateUser,
        Action::ViewEverything,
        Action::CreateProject,
        Action::CreateTask,
    ];

    fn ctx(role: Role) -> AuthContext {
        AuthContext::new("u1", role)
    }

    #[test]
    fn test_project_listing_scope() {
        let base = Filter::All;
        assert_eq!(
            build_filter(base.clone(), &ctx(Role::SuperAdmin), Action::ListProjects).unwrap(),
            Filter::All
        );

        let expected = Filter::any_of(vec![
            Filter::eq("ownerId", "u1"),
            Filter::eq("memberIds", "u1"),
        ]);
        for role in [Role::Admin, Role::User] {
            assert_eq!(
                build_filter(base.clone(), &ctx(role), Action::ListProjects).unwrap(),
                expected
            );
        }
    }

    #[test]
    fn test_user_task_mutation_always_constrained_to_assignee() {
        let constraint = Filter::eq("assignedto", "u1");
        for raw in ["t1", "507f1f77bcf86cd799439011", "", "zzzzzzzzzzzzzzzzzzzzzzzz"] {
            let candidates = scoped_candidates(raw, &ctx(Role::User), Action::MutateTask).unwrap();
            assert!(!candidates.is_empty());
            for candidate in candidates {
                match &candidate.filter {
                    Filter::And(parts) => assert!(parts.contains(&constraint)),
                    other => panic!("expected conjunction, got {other:?}"),
                }
            }
        }
    }

    #[test]
    fn test_admins_never_get_assignee_constraint() {
        for role in [Role::Admin, Role::SuperAdmin] {
            let candidates =
                scoped_candidates("507f1f77bcf86cd799439011", &ctx(role), Action::MutateTask)
                    .unwrap();
            assert_eq!(candidates.len(), 2);
            for candidate in candidates {
                assert!(matches!(candidate.filter, Filter::Eq { ref field, .. } if field == "_id"));
            }
        }
    }

    #[test]
    fn test_user_delete_denied_for_any_id() {
        for raw in ["t1", "507f1f77bcf86cd799439011", ""] {
            assert_eq!(
                scoped_candidates(raw, &ctx(Role::User), Action::DeleteTask),
                Err(AccessError::Denied {
                    action: Action::DeleteTask,
                    role: Role::User
                })
            );
        }
    }

    #[test]
    fn test_admin_only_actions() {
        for action in [Action::ListUsers, Action::CreateUser, Action::ViewEverything] {
            assert!(action.scope_for(Role::User).is_err());
            assert_eq!(action.scope_for(Role::Admin), Ok(Scope::Unrestricted));
            assert_eq!(action.scope_for(Role::SuperAdmin), Ok(Scope::Unrestricted));
        }
    }

    #[test]
    fn test_build_filter_is_deterministic() {
        for action in ACTIONS {
            for role in Role::ALL {
                let base = Filter::eq("projectid", "p1");
                let first = build_filter(base.clone(), &ctx(role), action);
                let second = build_filter(base, &ctx(role), action);
                assert_eq!(first, second, "{action} as {role}");
            }
        }
    }

    #[test]
    fn test_assignable_roles() {
        assert!(require_assignable_role(&ctx(Role::Admin), Role::User).is_ok());
        assert!(require_assignable_role(&ctx(Role::Admin), Role::Admin).is_ok());
        assert!(require_assignable_role(&ctx(Role::Admin), Role::SuperAdmin).is_err());
        assert!(require_assignable_role(&ctx(Role::SuperAdmin), Role::SuperAdmin).is_ok());
    }
}
