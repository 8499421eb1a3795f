//! Project and participant models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ParseEnumError;

/// A funded project that purchase orders draw budget from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    /// Human-readable code (e.g., "PRJ-2025-0007")
    pub project_code: String,
    pub name: String,
    pub responsible_person: Option<String>,
    pub total_budget: Decimal,
    /// Recomputed from orders on every mutating event
    pub reserved_budget: Decimal,
    /// Recomputed from confirmed payments on every mutating event
    pub spent_budget: Decimal,
    pub remaining_budget: Decimal,
    pub status: ProjectStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Project status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Draft,
    Active,
    Closed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Draft => "draft",
            ProjectStatus::Active => "active",
            ProjectStatus::Closed => "closed",
        }
    }

    /// Only active projects take new purchase orders
    pub fn accepts_orders(&self) -> bool {
        matches!(self, ProjectStatus::Active)
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProjectStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ProjectStatus::Draft),
            "active" => Ok(ProjectStatus::Active),
            "closed" => Ok(ProjectStatus::Closed),
            _ => Err(ParseEnumError::new("project status", s)),
        }
    }
}

/// Role a user plays inside one project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Requester,
    Inspector,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Requester => "requester",
            ParticipantRole::Inspector => "inspector",
        }
    }
}

impl std::str::FromStr for ParticipantRole {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requester" => Ok(ParticipantRole::Requester),
            "inspector" => Ok(ParticipantRole::Inspector),
            _ => Err(ParseEnumError::new("participant role", s)),
        }
    }
}

/// Membership of a user in a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectParticipant {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub role_in_project: ParticipantRole,
    pub created_at: DateTime<Utc>,
}

/// Generate a project code
pub fn generate_project_code(year: i32, sequence: i64) -> String {
    format!("PRJ-{}-{:04}", year, sequence)
}

/// Generate a purchase order number within a project
pub fn generate_order_no(project_code: &str, sequence: i64) -> String {
    format!("PO-{}-{:04}", project_code, sequence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(generate_project_code(2025, 7), "PRJ-2025-0007");
        assert_eq!(generate_order_no("PRJ-2025-0007", 12), "PO-PRJ-2025-0007-0012");
    }

    #[test]
    fn test_only_active_projects_accept_orders() {
        assert!(ProjectStatus::Active.accepts_orders());
        assert!(!ProjectStatus::Draft.accepts_orders());
        assert!(!ProjectStatus::Closed.accepts_orders());
    }
}
