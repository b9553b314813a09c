use serde::{Deserialize, Serialize};

use procura_core::{DepartmentId, UserId};

use crate::role::Role;

/// Resolved caller identity passed into every engine operation.
///
/// Construction is decoupled from transport; the presentation layer derives
/// an `Actor` from its session/claims however it likes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub department: Option<DepartmentId>,
    pub roles: Vec<Role>,
}

impl Actor {
    pub fn new(user_id: UserId, roles: impl Into<Vec<Role>>) -> Self {
        Self {
            user_id,
            department: None,
            roles: roles.into(),
        }
    }

    pub fn with_department(mut self, department: DepartmentId) -> Self {
        self.department = Some(department);
        self
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}
