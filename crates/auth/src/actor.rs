//! The identity performing a command.

use serde::{Deserialize, Serialize};

use gasflow_core::UserId;

use crate::role::{Capability, Role};

/// Identity attached to every mutating command.
///
/// Produced by the external authentication gate; carried through services and
/// stamped onto every distribution, transaction and audit entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn allows(&self, capability: Capability) -> bool {
        self.role.allows(capability)
    }
}
