//! Domain models shared by the tracker service
//!
//! Templates and user tasks both embed [`TaskContent`], the fixed set of
//! fields that template reconciliation operates over.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::fields::TaskField;
use crate::Error;

/// How urgent a maintenance task is when it goes undone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Criticality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Criticality::Low => "low",
            Criticality::Medium => "medium",
            Criticality::High => "high",
            Criticality::Critical => "critical",
        }
    }
}

impl FromStr for Criticality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Criticality::Low),
            "medium" => Ok(Criticality::Medium),
            "high" => Ok(Criticality::High),
            "critical" => Ok(Criticality::Critical),
            other => Err(Error::InvalidInput(format!("Unknown criticality: {}", other))),
        }
    }
}

/// One instruction in a task's how-to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStep {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// External link attached to a task (manual, video, product page)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLink {
    pub label: String,
    pub url: String,
}

/// The fixed content fields shared by templates and user tasks
///
/// Field order matches [`TaskField::ALL`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskContent {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub recurrence_interval: Option<String>,
    #[serde(default)]
    pub criticality: Criticality,
    #[serde(default)]
    pub estimated_time_minutes: Option<i64>,
    #[serde(default)]
    pub estimated_cost: Option<f64>,
    #[serde(default)]
    pub can_be_outsourced: bool,
    #[serde(default)]
    pub can_defer: bool,
    #[serde(default)]
    pub defer_limit_days: Option<i64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub steps: Vec<TaskStep>,
    #[serde(default)]
    pub equipment_needed: Vec<String>,
    #[serde(default)]
    pub resources: Vec<ResourceLink>,
}

impl TaskContent {
    /// Content with only a title set; everything else takes its default
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            recurrence_interval: None,
            criticality: Criticality::default(),
            estimated_time_minutes: None,
            estimated_cost: None,
            can_be_outsourced: false,
            can_defer: false,
            defer_limit_days: None,
            category: None,
            icon: None,
            image_url: None,
            steps: Vec::new(),
            equipment_needed: Vec::new(),
            resources: Vec::new(),
        }
    }

    /// Reject content the store should never hold
    pub fn validate(&self) -> crate::Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidInput("title cannot be empty".to_string()));
        }
        if matches!(self.estimated_time_minutes, Some(m) if m < 0) {
            return Err(Error::InvalidInput(
                "estimatedTimeMinutes cannot be negative".to_string(),
            ));
        }
        if matches!(self.defer_limit_days, Some(d) if d < 0) {
            return Err(Error::InvalidInput("deferLimitDays cannot be negative".to_string()));
        }
        if let Some(cost) = self.estimated_cost {
            if !cost.is_finite() || cost < 0.0 {
                return Err(Error::InvalidInput(
                    "estimatedCost must be a non-negative number".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Template lifecycle state
///
/// Only `Verified` templates propagate updates to user tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemplateState {
    Draft,
    Verified,
    Deprecated,
}

impl TemplateState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateState::Draft => "DRAFT",
            TemplateState::Verified => "VERIFIED",
            TemplateState::Deprecated => "DEPRECATED",
        }
    }
}

impl fmt::Display for TemplateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(TemplateState::Draft),
            "VERIFIED" => Ok(TemplateState::Verified),
            "DEPRECATED" => Ok(TemplateState::Deprecated),
            other => Err(Error::InvalidInput(format!("Unknown template state: {}", other))),
        }
    }
}

/// Versioned, admin-authored definition of a recurring maintenance task
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTemplate {
    pub id: Uuid,
    pub version: i64,
    pub state: TemplateState,
    #[serde(flatten)]
    pub content: TaskContent,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user-owned copy of template content
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTask {
    pub id: Uuid,
    pub user_id: Uuid,
    pub trackable_id: Option<Uuid>,
    pub source_template_id: Option<Uuid>,
    /// Template version this task last synced to (0 = never synced)
    pub source_template_version: i64,
    pub overridden_fields: BTreeSet<TaskField>,
    #[serde(flatten)]
    pub content: TaskContent,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserTask {
    pub fn is_overridden(&self, field: TaskField) -> bool {
        self.overridden_fields.contains(&field)
    }
}

/// Immutable record of one template sync applied to a user task
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSyncRecord {
    pub id: Uuid,
    pub user_task_id: Uuid,
    pub user_id: Uuid,
    pub from_version: i64,
    pub to_version: i64,
    pub fields_changed: Vec<TaskField>,
    pub before: Map<String, Value>,
    pub after: Map<String, Value>,
    pub applied_at: DateTime<Utc>,
}

/// Authenticated account
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}
