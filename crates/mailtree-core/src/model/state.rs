//! State shared between the coordinator and running tasks.

use std::collections::{HashMap, VecDeque};

use mailtree_imap::{Mailbox, Transport};

use super::pool::{ConnectionId, Pool};
use crate::config::EngineConfig;
use crate::credentials::CredentialProvider;
use crate::events::EngineEvent;
use crate::policy::NetworkPolicy;
use crate::store::CacheStore;
use crate::task::{Task, TaskId};
use crate::tree::MailboxTree;

/// I/O the driver must perform for the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Open a transport and report back via `handle_connected`.
    Connect {
        /// Connection to attach the stream to.
        connection: ConnectionId,
        /// Where to connect.
        transport: Transport,
    },
    /// Drop the transport of a connection.
    Close {
        /// Connection to close.
        connection: ConnectionId,
    },
}

/// The task keeping a mailbox open and the task synchronizing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Keeper {
    pub(crate) task: TaskId,
    pub(crate) obtain: TaskId,
    pub(crate) connection: Option<ConnectionId>,
}

/// A task waiting to be registered.
#[derive(Debug)]
pub(crate) struct Spawn {
    pub(crate) id: TaskId,
    pub(crate) task: Box<dyn Task>,
    pub(crate) parent: Option<TaskId>,
    pub(crate) connection: Option<ConnectionId>,
}

pub(crate) struct ModelState {
    pub(crate) config: EngineConfig,
    pub(crate) policy: NetworkPolicy,
    pub(crate) pool: Pool,
    pub(crate) tree: MailboxTree,
    pub(crate) store: Box<dyn CacheStore>,
    pub(crate) credentials: Box<dyn CredentialProvider>,
    pub(crate) keepers: HashMap<Mailbox, Keeper>,
    pub(crate) spawned: Vec<Spawn>,
    pub(crate) retired_owners: Vec<TaskId>,
    pub(crate) events: VecDeque<EngineEvent>,
    pub(crate) actions: VecDeque<Action>,
    next_task: u64,
}

impl ModelState {
    pub(crate) fn new(
        config: EngineConfig,
        store: Box<dyn CacheStore>,
        credentials: Box<dyn CredentialProvider>,
    ) -> Self {
        Self {
            policy: config.policy,
            config,
            pool: Pool::default(),
            tree: MailboxTree::new(),
            store,
            credentials,
            keepers: HashMap::new(),
            spawned: Vec::new(),
            retired_owners: Vec::new(),
            events: VecDeque::new(),
            actions: VecDeque::new(),
            next_task: 1,
        }
    }

    pub(crate) fn allocate_task_id(&mut self) -> TaskId {
        let id = TaskId(self.next_task);
        self.next_task += 1;
        id
    }

    pub(crate) fn spawn_with_id(
        &mut self,
        id: TaskId,
        task: Box<dyn Task>,
        parent: Option<TaskId>,
        connection: Option<ConnectionId>,
    ) {
        self.spawned.push(Spawn {
            id,
            task,
            parent,
            connection,
        });
    }

    pub(crate) fn spawn(
        &mut self,
        task: Box<dyn Task>,
        parent: Option<TaskId>,
        connection: Option<ConnectionId>,
    ) -> TaskId {
        let id = self.allocate_task_id();
        self.spawn_with_id(id, task, parent, connection);
        id
    }
}
