//! Self-describing task record exchanged with remote endpoints.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::id::TaskId;
use crate::task::{Priority, Task};

/// Full state of a task as sent over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    /// Task identifier
    pub id: TaskId,

    /// Estimated duration in milliseconds
    pub duration_ms: u64,

    /// Scheduling priority
    #[serde(default)]
    pub priority: Priority,

    /// Per-attempt deadline, zero for none
    #[serde(default)]
    pub timeout_ms: u64,

    /// Ids this task depends on
    #[serde(default)]
    pub dependency_ids: BTreeSet<TaskId>,

    /// Completion flag at the time of sending
    #[serde(default)]
    pub completed: bool,
}

impl TaskRecord {
    /// Capture the current state of a task.
    pub fn from_task(task: &dyn Task) -> Self {
        Self {
            id: task.id().clone(),
            duration_ms: task.duration_ms(),
            priority: task.priority(),
            timeout_ms: task.timeout_ms(),
            dependency_ids: task.dependencies().into_iter().collect(),
            completed: task.is_completed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependent::DependentTask;

    #[test]
    fn test_record_uses_camel_case_keys() {
        let dep = TaskId::from("dep-1");
        let task = DependentTask::new(3000, Priority::Medium)
            .with_timeout(5000)
            .with_dependency(dep.clone());

        let record = TaskRecord::from_task(&task);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["id"], task.id().as_str());
        assert_eq!(json["durationMs"], 3000);
        assert_eq!(json["priority"], "MEDIUM");
        assert_eq!(json["timeoutMs"], 5000);
        assert_eq!(json["dependencyIds"][0], "dep-1");
        assert_eq!(json["completed"], false);
    }

    #[test]
    fn test_record_defaults_optional_fields() {
        let record: TaskRecord =
            serde_json::from_str(r#"{"id":"t-1","durationMs":42}"#).unwrap();
        assert_eq!(record.id, TaskId::from("t-1"));
        assert_eq!(record.priority, Priority::Low);
        assert_eq!(record.timeout_ms, 0);
        assert!(record.dependency_ids.is_empty());
        assert!(!record.completed);
    }
}
