//! User entity.

use serde::{Deserialize, Serialize};

use gasflow_core::{DomainError, UserId};

use crate::role::Role;

/// A user of the system: one entity, role as data.
///
/// There is deliberately no subclass-per-role; a user's authority is entirely
/// the capability table keyed by `role`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub role: Role,
}

impl User {
    pub fn new(id: UserId, username: impl Into<String>, role: Role) -> Result<Self, DomainError> {
        let username = username.into();
        if username.trim().is_empty() {
            return Err(DomainError::validation("username cannot be empty"));
        }
        Ok(Self { id, username, role })
    }

    /// The identity this user presents to the engine on each operation.
    pub fn actor(&self) -> crate::Actor {
        crate::Actor::new(self.id, self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Capability;

    #[test]
    fn rejects_blank_username() {
        let err = User::new(UserId::new(), "   ", Role::Sales).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn actor_carries_role() {
        let user = User::new(UserId::new(), "counter-1", Role::Sales).unwrap();
        let actor = user.actor();
        assert_eq!(actor.user_id, user.id);
        assert_eq!(actor.role, Role::Sales);
    }

    #[test]
    fn authority_comes_from_the_role_table_alone() {
        let sales = User::new(UserId::new(), "counter-1", Role::Sales).unwrap();
        assert!(sales.actor().allows(Capability::RecordSale));
        assert!(!sales.actor().allows(Capability::MarkPaid));

        // Same user, promoted: nothing but the role field changes.
        let promoted = User { role: Role::Supervisor, ..sales };
        assert!(promoted.actor().allows(Capability::MarkPaid));
        assert!(!promoted.actor().allows(Capability::RecordSale));
    }
}
