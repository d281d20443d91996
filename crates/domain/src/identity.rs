use serde::{Deserialize, Serialize};

use crate::auth::Role;

/// Authenticated caller as handed over by the identity provider.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActorIdentity {
    pub user_id: String,
    pub role: Role,
    pub department: Option<String>,
}

impl ActorIdentity {
    pub fn citizen(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Citizen,
            department: None,
        }
    }

    pub fn authority(user_id: impl Into<String>, department: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Authority,
            department: Some(department.into()),
        }
    }
}
