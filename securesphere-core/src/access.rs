//! Role-based visibility of client data

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::review::UnknownStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Lead,
    Superuser,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Lead => "lead",
            Self::Superuser => "superuser",
        }
    }

    /// Roles an invitation may grant
    pub fn is_invitable(self) -> bool {
        matches!(self, Self::Client | Self::Lead)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Self::Client),
            "lead" => Ok(Self::Lead),
            "superuser" => Ok(Self::Superuser),
            other => Err(UnknownStatus {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

/// The authenticated user together with the clients a lead is assigned to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
    pub assigned_clients: Vec<Uuid>,
}

impl Principal {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self {
            user_id,
            role,
            assigned_clients: Vec::new(),
        }
    }

    pub fn with_clients(mut self, clients: Vec<Uuid>) -> Self {
        self.assigned_clients = clients;
        self
    }

    pub fn is_superuser(&self) -> bool {
        self.role == Role::Superuser
    }

    /// Whether this principal may see data owned by `client_id`.
    pub fn can_access_client(&self, client_id: Uuid) -> bool {
        match self.role {
            Role::Superuser => true,
            Role::Lead => self.assigned_clients.contains(&client_id),
            Role::Client => self.user_id == client_id,
        }
    }
}

/// Free-function form used by handlers that only hold the pieces.
pub fn can_access_client(principal: &Principal, client_id: Uuid) -> bool {
    principal.can_access_client(client_id)
}

/// Which clients a principal can list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientScope {
    /// Every active client
    All,
    /// Only these clients
    Only(Vec<Uuid>),
}

impl ClientScope {
    pub fn for_principal(principal: &Principal) -> Self {
        match principal.role {
            Role::Superuser => Self::All,
            Role::Lead => Self::Only(principal.assigned_clients.clone()),
            Role::Client => Self::Only(vec![principal.user_id]),
        }
    }

    pub fn contains(&self, client_id: Uuid) -> bool {
        match self {
            Self::All => true,
            Self::Only(ids) => ids.contains(&client_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superuser_sees_everyone() {
        let admin = Principal::new(Uuid::new_v4(), Role::Superuser);
        assert!(admin.can_access_client(Uuid::new_v4()));
        assert_eq!(ClientScope::for_principal(&admin), ClientScope::All);
    }

    #[test]
    fn lead_sees_assigned_only() {
        let client = Uuid::new_v4();
        let lead = Principal::new(Uuid::new_v4(), Role::Lead).with_clients(vec![client]);
        assert!(lead.can_access_client(client));
        assert!(!lead.can_access_client(Uuid::new_v4()));
        assert!(ClientScope::for_principal(&lead).contains(client));
    }

    #[test]
    fn client_sees_itself() {
        let id = Uuid::new_v4();
        let client = Principal::new(id, Role::Client);
        assert!(can_access_client(&client, id));
        assert!(!can_access_client(&client, Uuid::new_v4()));
        assert_eq!(ClientScope::for_principal(&client), ClientScope::Only(vec![id]));
    }

    #[test]
    fn role_text() {
        assert_eq!("lead".parse::<Role>(), Ok(Role::Lead));
        assert!("admin".parse::<Role>().is_err());
        assert!(Role::Client.is_invitable());
        assert!(!Role::Superuser.is_invitable());
        assert_eq!(serde_json::to_string(&Role::Superuser).unwrap(), "\"superuser\"");
    }
}
