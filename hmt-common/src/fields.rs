//! Catalog of the task content fields that template reconciliation covers
//!
//! Every operation that walks task content (diff, apply, pending-update
//! enumeration, user edits) goes through [`TaskField`], so the field list and
//! its wire names live in exactly one place. Each variant carries typed
//! accessors over [`TaskContent`]: compound fields (steps, equipment,
//! resources) compare by content through their derived `PartialEq`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::TaskContent;
use crate::Error;

macro_rules! task_fields {
    (@count) => { 0 };
    (@count $head:ident $($tail:ident)*) => { 1 + task_fields!(@count $($tail)*) };
    ($( $variant:ident => $field:ident : $name:literal ),* $(,)?) => {
        /// One of the fixed content fields shared by templates and user tasks
        ///
        /// Variants are declared in canonical order; `Ord` follows it.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub enum TaskField {
            $( $variant, )*
        }

        impl TaskField {
            /// All fields in canonical order
            pub const ALL: [TaskField; task_fields!(@count $($variant)*)] = [
                $( TaskField::$variant, )*
            ];

            /// Wire name used in JSON bodies and the overrides column
            pub fn name(&self) -> &'static str {
                match self {
                    $( TaskField::$variant => $name, )*
                }
            }

            /// Serialized value of this field in `content`
            pub fn read(&self, content: &TaskContent) -> Value {
                match self {
                    $( TaskField::$variant => to_json(&content.$field), )*
                }
            }

            /// True when the two contents hold structurally different values
            pub fn differs(&self, a: &TaskContent, b: &TaskContent) -> bool {
                match self {
                    $( TaskField::$variant => a.$field != b.$field, )*
                }
            }

            /// Copy this field's value from `from` into `to`
            pub fn copy(&self, from: &TaskContent, to: &mut TaskContent) {
                match self {
                    $( TaskField::$variant => to.$field = from.$field.clone(), )*
                }
            }

            /// Assign a JSON value to this field, checking its type
            pub fn write(&self, content: &mut TaskContent, value: Value) -> crate::Result<()> {
                match self {
                    $(
                        TaskField::$variant => {
                            content.$field = serde_json::from_value(value).map_err(|e| {
                                Error::InvalidInput(format!("Invalid value for {}: {}", $name, e))
                            })?;
                        }
                    )*
                }
                Ok(())
            }
        }

        impl FromStr for TaskField {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $name => Ok(TaskField::$variant), )*
                    other => Err(Error::InvalidInput(format!("Unknown task field: {}", other))),
                }
            }
        }
    };
}

task_fields! {
    Title => title: "title",
    Description => description: "description",
    RecurrenceInterval => recurrence_interval: "recurrenceInterval",
    Criticality => criticality: "criticality",
    EstimatedTimeMinutes => estimated_time_minutes: "estimatedTimeMinutes",
    EstimatedCost => estimated_cost: "estimatedCost",
    CanBeOutsourced => can_be_outsourced: "canBeOutsourced",
    CanDefer => can_defer: "canDefer",
    DeferLimitDays => defer_limit_days: "deferLimitDays",
    Category => category: "category",
    Icon => icon: "icon",
    ImageUrl => image_url: "imageUrl",
    Steps => steps: "steps",
    EquipmentNeeded => equipment_needed: "equipmentNeeded",
    Resources => resources: "resources",
}

impl fmt::Display for TaskField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Parse a list of wire names, dropping unknown names
///
/// Returns the recognized fields in canonical order without duplicates,
/// plus the names that did not match any field.
pub fn parse_field_names<S: AsRef<str>>(names: &[S]) -> (Vec<TaskField>, Vec<String>) {
    let mut fields = Vec::new();
    let mut unknown = Vec::new();

    for name in names {
        match name.as_ref().parse::<TaskField>() {
            Ok(field) => fields.push(field),
            Err(_) => unknown.push(name.as_ref().to_string()),
        }
    }

    fields.sort();
    fields.dedup();
    (fields, unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Criticality, TaskStep};

    #[test]
    fn test_catalog_has_fifteen_fields_in_canonical_order() {
        let names: Vec<&str> = TaskField::ALL.iter().map(|f| f.name()).collect();
        assert_eq!(
            names,
            vec![
                "title",
                "description",
                "recurrenceInterval",
                "criticality",
                "estimatedTimeMinutes",
                "estimatedCost",
                "canBeOutsourced",
                "canDefer",
                "deferLimitDays",
                "category",
                "icon",
                "imageUrl",
                "steps",
                "equipmentNeeded",
                "resources",
            ]
        );
    }

    #[test]
    fn test_serde_name_matches_wire_name() {
        for field in TaskField::ALL {
            let value = serde_json::to_value(field).unwrap();
            assert_eq!(value, Value::String(field.name().to_string()));
            assert_eq!(field.name().parse::<TaskField>().unwrap(), field);
        }
    }

    #[test]
    fn test_steps_compare_by_content() {
        let mut a = TaskContent::titled("Replace filter");
        let mut b = TaskContent::titled("Replace filter");
        a.steps = vec![TaskStep { title: "Turn off unit".to_string(), description: None }];
        b.steps = vec![TaskStep { title: "Turn off unit".to_string(), description: None }];

        assert!(!TaskField::Steps.differs(&a, &b));

        b.steps[0].description = Some("At the breaker".to_string());
        assert!(TaskField::Steps.differs(&a, &b));
    }

    #[test]
    fn test_copy_moves_only_the_named_field() {
        let mut from = TaskContent::titled("Template title");
        from.criticality = Criticality::High;
        let mut to = TaskContent::titled("Mine");

        TaskField::Criticality.copy(&from, &mut to);

        assert_eq!(to.criticality, Criticality::High);
        assert_eq!(to.title, "Mine");
    }

    #[test]
    fn test_write_rejects_wrong_type() {
        let mut content = TaskContent::titled("Test smoke alarms");

        let err = TaskField::EstimatedTimeMinutes
            .write(&mut content, Value::String("ten".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("estimatedTimeMinutes"));

        TaskField::EstimatedTimeMinutes
            .write(&mut content, serde_json::json!(10))
            .unwrap();
        assert_eq!(content.estimated_time_minutes, Some(10));
    }

    #[test]
    fn test_parse_field_names_sorts_dedups_and_reports_unknown() {
        let (fields, unknown) =
            parse_field_names(&["steps", "title", "bogus", "title", "estimatedCost"]);

        assert_eq!(
            fields,
            vec![TaskField::Title, TaskField::EstimatedCost, TaskField::Steps]
        );
        assert_eq!(unknown, vec!["bogus".to_string()]);
    }
}
