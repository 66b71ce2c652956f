//! Template reconciliation
//!
//! Pure functions comparing a user task against its source template and
//! copying template values into the task under an [`OverridePolicy`].
//! Nothing here touches the database; callers load both records, run the
//! plan, and persist the result together with its audit record.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::fields::TaskField;
use crate::models::{TaskContent, TaskTemplate, TemplateState, UserTask};
use crate::Result;

/// How template updates treat fields the user has overridden
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverridePolicy {
    /// Skip overridden fields
    #[default]
    RespectOverrides,
    /// Overwrite every selected field, clearing its override
    ForceAll,
    /// Skip overridden fields (currently identical to `RespectOverrides`)
    OnlyNonOverridden,
}

impl OverridePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverridePolicy::RespectOverrides => "respect_overrides",
            OverridePolicy::ForceAll => "force_all",
            OverridePolicy::OnlyNonOverridden => "only_non_overridden",
        }
    }

    /// Parse a request literal
    ///
    /// Returns `None` for unrecognized literals; callers fall back to
    /// [`OverridePolicy::RespectOverrides`].
    pub fn from_literal(literal: &str) -> Option<Self> {
        match literal {
            "respect_overrides" => Some(OverridePolicy::RespectOverrides),
            "force_all" => Some(OverridePolicy::ForceAll),
            "only_non_overridden" => Some(OverridePolicy::OnlyNonOverridden),
            _ => None,
        }
    }

    fn admits(&self, field: TaskField, overridden: &BTreeSet<TaskField>) -> bool {
        match self {
            OverridePolicy::ForceAll => true,
            OverridePolicy::RespectOverrides | OverridePolicy::OnlyNonOverridden => {
                !overridden.contains(&field)
            }
        }
    }
}

/// One field whose task value differs from the template value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDiff {
    pub field: TaskField,
    pub current: Value,
    pub proposed: Value,
    pub overridden: bool,
}

/// Fields whose values differ between the task and the template, in canonical order
pub fn changed_fields(task: &TaskContent, template: &TaskContent) -> Vec<TaskField> {
    TaskField::ALL
        .into_iter()
        .filter(|field| field.differs(task, template))
        .collect()
}

/// Per-field differences between a task and its template
pub fn diff_fields(task: &UserTask, template: &TaskTemplate) -> Vec<FieldDiff> {
    changed_fields(&task.content, &template.content)
        .into_iter()
        .map(|field| FieldDiff {
            field,
            current: field.read(&task.content),
            proposed: field.read(&template.content),
            overridden: task.is_overridden(field),
        })
        .collect()
}

/// True when the template carries a newer verified version than the task has synced
pub fn has_pending_update(task: &UserTask, template: &TaskTemplate) -> bool {
    template.state == TemplateState::Verified && template.version > task.source_template_version
}

/// Changed fields plus whether any of them is overridden
pub fn pending_changes(task: &UserTask, template: &TaskTemplate) -> (Vec<TaskField>, bool) {
    let changed = changed_fields(&task.content, &template.content);
    let is_overridden = changed.iter().any(|field| task.is_overridden(*field));
    (changed, is_overridden)
}

/// Fields an apply will write: the requested list (all fields when `None`) filtered by policy
pub fn select_fields(
    requested: Option<&[TaskField]>,
    overridden: &BTreeSet<TaskField>,
    policy: OverridePolicy,
) -> Vec<TaskField> {
    let candidates = requested.unwrap_or(&TaskField::ALL);

    candidates
        .iter()
        .copied()
        .filter(|field| policy.admits(*field, overridden))
        .collect()
}

/// Outcome of applying a template to a task, ready to be audited
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub from_version: i64,
    pub to_version: i64,
    pub applied_fields: Vec<TaskField>,
    pub before: Map<String, Value>,
    pub after: Map<String, Value>,
}

/// Copy template values into `task` for the fields the policy admits
///
/// The task's synced version moves to the template version even when no
/// field is applied. Snapshots list every applied field, moved or not.
pub fn apply_template(
    task: &mut UserTask,
    template: &TaskTemplate,
    requested: Option<&[TaskField]>,
    policy: OverridePolicy,
) -> SyncOutcome {
    let applied_fields = select_fields(requested, &task.overridden_fields, policy);
    let mut before = Map::new();
    let mut after = Map::new();

    for field in &applied_fields {
        before.insert(field.name().to_string(), field.read(&task.content));
        after.insert(field.name().to_string(), field.read(&template.content));
        field.copy(&template.content, &mut task.content);
        // Only force_all reaches an overridden field; the template value now owns it
        task.overridden_fields.remove(field);
    }

    let from_version = task.source_template_version;
    task.source_template_version = template.version;

    SyncOutcome {
        from_version,
        to_version: template.version,
        applied_fields,
        before,
        after,
    }
}

/// Apply a user's edits to a task, marking changed template fields as overridden
///
/// `changes` maps wire names to new values. Every key must name a field and
/// every value must fit its type; otherwise nothing is modified. Returns the
/// fields whose values actually changed.
pub fn apply_user_edits(task: &mut UserTask, changes: Map<String, Value>) -> Result<Vec<TaskField>> {
    let mut edited = task.content.clone();
    for (name, value) in changes {
        let field: TaskField = name.parse()?;
        field.write(&mut edited, value)?;
    }
    edited.validate()?;

    let changed = changed_fields(&task.content, &edited);
    if task.source_template_id.is_some() {
        task.overridden_fields.extend(changed.iter().copied());
    }
    task.content = edited;

    Ok(changed)
}
