//! User, role and capability models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ParseEnumError;

/// A user account known to the procurement office
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub department: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// System-wide role carried in the access token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Officer,
    Requester,
    Inspector,
}

/// Things a caller may be allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    CreateOrders,
    ManageProjects,
    DecideApprovals,
    ForwardOrders,
    RecordReceipts,
    InspectDeliveries,
    ManagePayments,
    ViewAllOrders,
    ReconcileBudgets,
    ManageUsers,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::CreateOrders => "create_orders",
            Capability::ManageProjects => "manage_projects",
            Capability::DecideApprovals => "decide_approvals",
            Capability::ForwardOrders => "forward_orders",
            Capability::RecordReceipts => "record_receipts",
            Capability::InspectDeliveries => "inspect_deliveries",
            Capability::ManagePayments => "manage_payments",
            Capability::ViewAllOrders => "view_all_orders",
            Capability::ReconcileBudgets => "reconcile_budgets",
            Capability::ManageUsers => "manage_users",
        }
    }
}

const REQUESTER_CAPABILITIES: &[Capability] = &[Capability::CreateOrders];

const INSPECTOR_CAPABILITIES: &[Capability] = &[Capability::InspectDeliveries];

const OFFICER_CAPABILITIES: &[Capability] = &[
    Capability::CreateOrders,
    Capability::ManageProjects,
    Capability::DecideApprovals,
    Capability::ForwardOrders,
    Capability::RecordReceipts,
    Capability::InspectDeliveries,
    Capability::ManagePayments,
    Capability::ViewAllOrders,
    Capability::ReconcileBudgets,
];

const ADMIN_CAPABILITIES: &[Capability] = &[
    Capability::CreateOrders,
    Capability::ManageProjects,
    Capability::DecideApprovals,
    Capability::ForwardOrders,
    Capability::RecordReceipts,
    Capability::InspectDeliveries,
    Capability::ManagePayments,
    Capability::ViewAllOrders,
    Capability::ReconcileBudgets,
    Capability::ManageUsers,
];

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Officer => "officer",
            Role::Requester => "requester",
            Role::Inspector => "inspector",
        }
    }

    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Role::Admin => ADMIN_CAPABILITIES,
            Role::Officer => OFFICER_CAPABILITIES,
            Role::Requester => REQUESTER_CAPABILITIES,
            Role::Inspector => INSPECTOR_CAPABILITIES,
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "officer" => Ok(Role::Officer),
            "requester" => Ok(Role::Requester),
            "inspector" => Ok(Role::Inspector),
            _ => Err(ParseEnumError::new("role", s)),
        }
    }
}
