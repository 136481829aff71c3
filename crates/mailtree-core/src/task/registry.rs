//! Task records keyed by identifier.
//!
//! Parents are referenced by [`TaskId`] and resolved through the registry,
//! so a dependent never holds a reference to a discarded parent.

use std::collections::BTreeMap;

use super::{Task, TaskId, TaskState};
use crate::model::ConnectionId;

#[derive(Debug)]
pub(crate) struct TaskRecord {
    /// Taken out while the task is being driven.
    pub(crate) task: Option<Box<dyn Task>>,
    pub(crate) name: &'static str,
    pub(crate) state: TaskState,
    pub(crate) parent: Option<TaskId>,
    pub(crate) connection: Option<ConnectionId>,
    pub(crate) needs_connection: bool,
}

impl TaskRecord {
    pub(crate) fn new(
        task: Box<dyn Task>,
        parent: Option<TaskId>,
        connection: Option<ConnectionId>,
    ) -> Self {
        Self {
            name: task.name(),
            needs_connection: task.needs_connection(),
            task: Some(task),
            state: TaskState::Created,
            parent,
            connection,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct TaskRegistry {
    records: BTreeMap<TaskId, TaskRecord>,
}

impl TaskRegistry {
    pub(crate) fn insert(&mut self, id: TaskId, record: TaskRecord) {
        self.records.insert(id, record);
    }

    pub(crate) fn get(&self, id: TaskId) -> Option<&TaskRecord> {
        self.records.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: TaskId) -> Option<&mut TaskRecord> {
        self.records.get_mut(&id)
    }

    pub(crate) fn remove(&mut self, id: TaskId) -> Option<TaskRecord> {
        self.records.remove(&id)
    }

    pub(crate) fn state(&self, id: TaskId) -> Option<&TaskState> {
        self.records.get(&id).map(|r| &r.state)
    }

    pub(crate) fn is_live(&self, id: TaskId) -> bool {
        self.state(id).is_some_and(|s| !s.is_terminal())
    }

    /// Ids in creation order.
    pub(crate) fn ids(&self) -> Vec<TaskId> {
        self.records.keys().copied().collect()
    }

    /// Ids of non-terminal tasks bound to `connection`.
    pub(crate) fn on_connection(&self, connection: ConnectionId) -> Vec<TaskId> {
        self.records
            .iter()
            .filter(|(_, r)| r.connection == Some(connection) && !r.state.is_terminal())
            .map(|(id, _)| *id)
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mailtree_imap::parser::TaggedResponse;

    use super::*;
    use crate::task::{Step, TaskContext};

    #[derive(Debug)]
    struct Idle;

    impl Task for Idle {
        fn name(&self) -> &'static str {
            "Idle"
        }

        fn start(&mut self, _ctx: &mut TaskContext<'_>) -> Step {
            Step::Continue
        }

        fn handle_tagged(&mut self, _ctx: &mut TaskContext<'_>, _r: &TaggedResponse) -> Step {
            Step::Done
        }
    }

    #[test]
    fn queries_by_liveness_and_connection() {
        let mut registry = TaskRegistry::default();
        registry.insert(TaskId(1), TaskRecord::new(Box::new(Idle), None, Some(ConnectionId(0))));
        registry.insert(
            TaskId(2),
            TaskRecord::new(Box::new(Idle), Some(TaskId(1)), Some(ConnectionId(0))),
        );
        registry.get_mut(TaskId(2)).unwrap().state = TaskState::Completed;

        assert_eq!(registry.get(TaskId(1)).unwrap().name, "Idle");
        assert_eq!(registry.on_connection(ConnectionId(0)), vec![TaskId(1)]);
        assert!(registry.is_live(TaskId(1)));
        assert!(!registry.is_live(TaskId(2)));
        assert!(!registry.is_live(TaskId(9)));
        assert_eq!(registry.len(), 2);
    }
}
