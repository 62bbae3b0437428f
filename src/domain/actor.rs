use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Privilege level of whoever requests a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Kitchen and floor staff: normal forward flow only.
    Staff,
    /// May force a ticket into any status.
    Operator,
}

/// The person (or device) behind a writer call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn staff(id: impl Into<String>) -> Self {
        Self { id: id.into(), role: Role::Staff }
    }

    pub fn operator(id: impl Into<String>) -> Self {
        Self { id: id.into(), role: Role::Operator }
    }

    pub fn is_operator(&self) -> bool {
        self.role == Role::Operator
    }
}

impl Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}
