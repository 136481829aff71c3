//! The connection pool.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;

use mailtree_imap::{Connection, ConnectionState, Mailbox, Tag};

use crate::task::TaskId;

/// Identity of a pooled connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn{}", self.0)
    }
}

/// One connection and the tasks using it.
///
/// Exactly one task is `active` at a time; the rest wait in `queue` in
/// request order. `owner` is the task keeping `mailbox` open, which receives
/// unsolicited data the active task does not claim.
#[derive(Debug)]
pub(crate) struct ConnectionSlot {
    pub(crate) conn: Connection,
    pub(crate) active: Option<TaskId>,
    pub(crate) queue: VecDeque<TaskId>,
    pub(crate) owner: Option<TaskId>,
    pub(crate) mailbox: Option<Mailbox>,
    pub(crate) tags: HashMap<Tag, TaskId>,
}

impl ConnectionSlot {
    fn new() -> Self {
        Self {
            conn: Connection::new(),
            active: None,
            queue: VecDeque::new(),
            owner: None,
            mailbox: None,
            tags: HashMap::new(),
        }
    }

    /// Returns true if `task` still awaits a tagged completion here.
    pub(crate) fn has_outstanding(&self, task: TaskId) -> bool {
        self.tags.values().any(|&t| t == task)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Pool {
    slots: BTreeMap<ConnectionId, ConnectionSlot>,
    next: u64,
}

impl Pool {
    pub(crate) fn create(&mut self) -> ConnectionId {
        let id = ConnectionId(self.next);
        self.next += 1;
        self.slots.insert(id, ConnectionSlot::new());
        id
    }

    pub(crate) fn get(&self, id: ConnectionId) -> Option<&ConnectionSlot> {
        self.slots.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: ConnectionId) -> Option<&mut ConnectionSlot> {
        self.slots.get_mut(&id)
    }

    pub(crate) fn contains(&self, id: ConnectionId) -> bool {
        self.slots.contains_key(&id)
    }

    pub(crate) fn remove(&mut self, id: ConnectionId) -> Option<ConnectionSlot> {
        self.slots.remove(&id)
    }

    pub(crate) fn ids(&self) -> Vec<ConnectionId> {
        self.slots.keys().copied().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn states(&self) -> impl Iterator<Item = (ConnectionId, ConnectionState)> + '_ {
        self.slots.iter().map(|(id, slot)| (*id, slot.conn.state()))
    }
}
