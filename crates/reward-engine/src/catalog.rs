use std::sync::Arc;

use reward_types::{NewTask, Task, TaskId};
use tracing::{info, warn};

use crate::error::EngineError;
use crate::store::{StoreError, TaskStore};

/// Upper bound on a task price. Keeps balances far from `i64` overflow.
pub const MAX_TASK_PRICE: i64 = 1_000_000_000;

/// Task creation and listing. Content equality of (title, description) is
/// the only identity a task has besides its id.
#[derive(Clone)]
pub struct TaskCatalog {
    tasks: Arc<dyn TaskStore>,
}

impl TaskCatalog {
    pub fn new(tasks: Arc<dyn TaskStore>) -> Self {
        Self { tasks }
    }

    pub fn create_task(&self, title: &str, description: &str, price: i64) -> Result<TaskId, EngineError> {
        if title.trim().is_empty() {
            return Err(EngineError::Validation("task title cannot be empty".into()));
        }
        if price < 1 {
            return Err(EngineError::Validation("minimum value for the price field is 1".into()));
        }
        if price > MAX_TASK_PRICE {
            return Err(EngineError::Validation(format!(
                "maximum value for the price field is {MAX_TASK_PRICE}"
            )));
        }

        if self.tasks.exists_with_content(title, description)? {
            warn!(title, "Duplicate task rejected");
            return Err(duplicate());
        }

        let task = NewTask {
            title: title.to_string(),
            description: description.to_string(),
            price,
        };
        // The unique index still catches a duplicate inserted since the check.
        let id = self.tasks.insert_task(&task).map_err(|e| match e {
            StoreError::Conflict(_) => duplicate(),
            other => other.into(),
        })?;

        info!(task_id = %id, title, price, "Task created");
        Ok(id)
    }

    pub fn list_tasks(&self) -> Result<Vec<Task>, EngineError> {
        Ok(self.tasks.list_tasks()?)
    }
}

fn duplicate() -> EngineError {
    EngineError::Conflict("task with the same title and description already exists".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn catalog() -> TaskCatalog {
        TaskCatalog::new(Arc::new(MemoryStore::default()))
    }

    #[test]
    fn create_then_list() {
        let catalog = catalog();
        let id = catalog.create_task("T", "D", 20).unwrap();

        let tasks = catalog.list_tasks().unwrap();
        assert_eq!(
            tasks,
            vec![Task {
                id,
                title: "T".into(),
                description: "D".into(),
                price: 20,
            }]
        );
    }

    #[test]
    fn ids_are_fresh() {
        let catalog = catalog();
        let a = catalog.create_task("A", "D", 1).unwrap();
        let b = catalog.create_task("B", "D", 1).unwrap();
        assert_ne!(a, b);
        assert_eq!(catalog.list_tasks().unwrap().len(), 2);
    }

    #[test]
    fn rejects_empty_title() {
        let catalog = catalog();
        assert!(matches!(catalog.create_task("", "D", 20), Err(EngineError::Validation(_))));
        assert!(matches!(catalog.create_task("   ", "D", 20), Err(EngineError::Validation(_))));
        assert!(catalog.list_tasks().unwrap().is_empty());
    }

    #[test]
    fn rejects_price_below_one() {
        let catalog = catalog();
        assert!(matches!(catalog.create_task("T", "D", 0), Err(EngineError::Validation(_))));
        assert!(matches!(catalog.create_task("T", "D", -5), Err(EngineError::Validation(_))));
    }

    #[test]
    fn rejects_price_above_ceiling() {
        let catalog = catalog();
        assert!(matches!(catalog.create_task("T", "D", i64::MAX), Err(EngineError::Validation(_))));
        assert!(matches!(
            catalog.create_task("T", "D", MAX_TASK_PRICE + 1),
            Err(EngineError::Validation(_))
        ));
        catalog.create_task("T", "D", MAX_TASK_PRICE).unwrap();
    }

    #[test]
    fn rejects_duplicate_content() {
        let catalog = catalog();
        catalog.create_task("T", "D", 20).unwrap();
        assert!(matches!(catalog.create_task("T", "D", 30), Err(EngineError::Conflict(_))));
        // Same title, different description is a different task.
        catalog.create_task("T", "other", 20).unwrap();
        assert_eq!(catalog.list_tasks().unwrap().len(), 2);
    }
}
