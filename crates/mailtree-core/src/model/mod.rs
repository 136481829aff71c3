//! The coordinator.
//!
//! [`Model`] owns the connection pool, the task registry, the mailbox tree
//! and the network policy. It performs no I/O: the driver feeds it transport
//! events ([`handle_connected`](Model::handle_connected),
//! [`handle_input`](Model::handle_input), ...) and drains what it produces
//! ([`poll_transmit`](Model::poll_transmit), [`poll_action`](Model::poll_action),
//! [`poll_event`](Model::poll_event)).
//!
//! Every entry point ends with one scheduling pass that runs until nothing
//! more can progress:
//!
//! 1. register tasks spawned since the last pass
//! 2. complete mailbox owners displaced by another selection
//! 3. resolve dependencies, starting or queueing tasks whose parent completed
//!    and cascading failures to dependents
//! 4. start the next queued task on every idle connection
//! 5. route parsed responses to the tasks they belong to
//!
//! Terminal tasks are dropped at the end of the pass once no response can
//! still arrive for them.

mod pool;
mod state;

use mailtree_imap::parser::{Response, TaggedResponse, UntaggedResponse};
use mailtree_imap::{
    ConnectionEvent, ConnectionState, FlagOperation, Flags, Mailbox, ResponseCode, Status,
    Transmit, Uid, UidSet,
};
use tracing::{debug, error, info, trace, warn};

pub use pool::ConnectionId;
pub use state::Action;
pub(crate) use state::{Keeper, ModelState};

use crate::config::EngineConfig;
use crate::credentials::CredentialProvider;
use crate::events::EngineEvent;
use crate::factory::{ImapTaskFactory, TaskFactory};
use crate::policy::NetworkPolicy;
use crate::store::{CacheStore, JsonFileStore, MemoryStore};
use crate::task::registry::{TaskRecord, TaskRegistry};
use crate::task::{
    CopyMode, FetchDetail, FetchSelection, Recovery, Step, Task, TaskContext, TaskError, TaskId,
    TaskState,
};
use crate::tree::MailboxTree;
use crate::Result;

/// The coordinator.
pub struct Model {
    state: ModelState,
    tasks: TaskRegistry,
    factory: Box<dyn TaskFactory>,
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("policy", &self.state.policy)
            .field("connections", &self.state.pool.len())
            .field("tasks", &self.tasks.len())
            .field("factory", &self.factory)
            .finish_non_exhaustive()
    }
}

impl Model {
    /// Creates a coordinator with an in-memory cache and the real tasks.
    pub fn new(config: EngineConfig, credentials: impl CredentialProvider + 'static) -> Self {
        Self {
            state: ModelState::new(config, Box::new(MemoryStore::new()), Box::new(credentials)),
            tasks: TaskRegistry::default(),
            factory: Box::new(ImapTaskFactory),
        }
    }

    /// Creates a coordinator persisting to the configured cache file, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache file exists but cannot be read.
    pub fn open(config: EngineConfig, credentials: impl CredentialProvider + 'static) -> Result<Self> {
        let path = config.cache_path.clone();
        let model = Self::new(config, credentials);
        Ok(match path {
            Some(path) => model.with_store(JsonFileStore::open(path)?),
            None => model,
        })
    }

    /// Replaces the task factory.
    #[must_use]
    pub fn with_factory(mut self, factory: impl TaskFactory + 'static) -> Self {
        self.factory = Box::new(factory);
        self
    }

    /// Replaces the cache persistence provider.
    #[must_use]
    pub fn with_store(mut self, store: impl CacheStore + 'static) -> Self {
        self.state.store = Box::new(store);
        self
    }

    /// Lists the children of `parent`, or of the root.
    pub fn list_child_mailboxes(&mut self, parent: Option<&Mailbox>) -> TaskId {
        let connection = self.any_connection();
        let task = self.factory.list_child_mailboxes(parent);
        self.request(task, Some(connection), None)
    }

    /// Selects and synchronizes a mailbox, keeping it open afterwards.
    ///
    /// Returns the synchronization task; the mailbox stays open after it
    /// completes.
    pub fn open_mailbox(&mut self, mailbox: &Mailbox) -> TaskId {
        let keeper = self.ensure_keeper(mailbox);
        self.process();
        keeper.obtain
    }

    /// Creates a mailbox.
    pub fn create_mailbox(&mut self, mailbox: &Mailbox) -> TaskId {
        let connection = self.any_connection();
        let task = self.factory.create_mailbox(mailbox);
        self.request(task, Some(connection), None)
    }

    /// Deletes a mailbox.
    pub fn delete_mailbox(&mut self, mailbox: &Mailbox) -> TaskId {
        let connection = self.any_connection();
        let task = self.factory.delete_mailbox(mailbox);
        self.request(task, Some(connection), None)
    }

    /// Reads message counters of a mailbox without selecting it.
    pub fn number_of_messages(&mut self, mailbox: &Mailbox) -> TaskId {
        let connection = self.any_connection();
        let task = self.factory.number_of_messages(mailbox);
        self.request(task, Some(connection), None)
    }

    /// Removes `\Deleted` messages from a mailbox.
    pub fn expunge_mailbox(&mut self, mailbox: &Mailbox) -> TaskId {
        let task = self.factory.expunge_mailbox(mailbox);
        self.request_in_mailbox(mailbox, task)
    }

    /// Fetches envelopes, sizes and body structures.
    pub fn fetch_metadata(&mut self, mailbox: &Mailbox, uids: UidSet) -> TaskId {
        let task = self
            .factory
            .fetch_msg_metadata(mailbox, FetchSelection::Uids(uids), FetchDetail::Full);
        self.request_in_mailbox(mailbox, task)
    }

    /// Downloads one body part.
    pub fn fetch_part(&mut self, mailbox: &Mailbox, uid: Uid, part_id: &str) -> TaskId {
        let task = self.factory.fetch_msg_part(mailbox, uid, part_id);
        self.request_in_mailbox(mailbox, task)
    }

    /// Changes flags of messages.
    pub fn update_flags(
        &mut self,
        mailbox: &Mailbox,
        uids: UidSet,
        operation: FlagOperation,
        flags: Flags,
    ) -> TaskId {
        let task = self.factory.update_flags(mailbox, uids, operation, flags);
        self.request_in_mailbox(mailbox, task)
    }

    /// Copies messages to another mailbox.
    pub fn copy_messages(&mut self, source: &Mailbox, uids: UidSet, target: &Mailbox) -> TaskId {
        let task = self
            .factory
            .copy_move_messages(source, uids, target, CopyMode::Copy);
        self.request_in_mailbox(source, task)
    }

    /// Moves messages to another mailbox.
    pub fn move_messages(&mut self, source: &Mailbox, uids: UidSet, target: &Mailbox) -> TaskId {
        let task = self
            .factory
            .copy_move_messages(source, uids, target, CopyMode::Move);
        self.request_in_mailbox(source, task)
    }

    /// Aborts a task. Its pending response, if any, is discarded on arrival.
    ///
    /// Returns false if the task is unknown or already finished.
    pub fn abort(&mut self, id: TaskId) -> bool {
        if !self.tasks.is_live(id) {
            return false;
        }
        self.finish(id, TaskState::Aborted);
        self.process();
        true
    }

    /// Changes the network policy. Going offline closes every connection.
    pub fn set_network_policy(&mut self, policy: NetworkPolicy) {
        let from = self.state.policy;
        if from == policy {
            return;
        }
        info!(?from, to = ?policy, "network policy changed");
        self.state.policy = policy;
        self.state
            .events
            .push_back(EngineEvent::PolicyChanged { from, to: policy });
        if !policy.allows_connections() {
            for connection in self.state.pool.ids() {
                self.teardown(connection, "network is offline", false);
            }
        }
        self.process();
    }

    /// Network policy in effect.
    #[must_use]
    pub const fn network_policy(&self) -> NetworkPolicy {
        self.state.policy
    }

    /// Drops every connection; later requests open fresh ones.
    pub fn reconnect_all(&mut self) {
        info!("replacing all connections");
        for connection in self.state.pool.ids() {
            self.teardown(connection, "connection replaced", false);
        }
        self.process();
    }

    /// The mailbox tree.
    #[must_use]
    pub const fn tree(&self) -> &MailboxTree {
        &self.state.tree
    }

    /// State of a task that has not been discarded yet.
    ///
    /// Finished tasks are discarded once no response can arrive for them;
    /// their final state is published as [`EngineEvent::TaskFinished`].
    #[must_use]
    pub fn task_state(&self, id: TaskId) -> Option<&TaskState> {
        self.tasks.state(id)
    }

    /// Number of tasks not discarded yet.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Pooled connections and their states.
    #[must_use]
    pub fn connections(&self) -> Vec<(ConnectionId, ConnectionState)> {
        self.state.pool.states().collect()
    }

    /// The transport of `connection` is up.
    pub fn handle_connected(&mut self, connection: ConnectionId) {
        if let Some(slot) = self.state.pool.get_mut(connection) {
            info!(%connection, "connected");
            slot.conn.handle_connected();
        }
        self.process();
    }

    /// Bytes arrived on `connection`.
    pub fn handle_input(&mut self, connection: ConnectionId, data: &[u8]) {
        match self.state.pool.get_mut(connection) {
            Some(slot) => slot.conn.handle_input(data),
            None => debug!(%connection, len = data.len(), "input for closed connection"),
        }
        self.process();
    }

    /// The transport of `connection` closed.
    pub fn handle_disconnected(&mut self, connection: ConnectionId, reason: &str) {
        if let Some(slot) = self.state.pool.get_mut(connection) {
            slot.conn.handle_disconnected(reason);
        }
        self.process();
    }

    /// The transport of `connection` could not be opened.
    pub fn handle_connect_failed(&mut self, connection: ConnectionId, reason: &str) {
        if let Some(slot) = self.state.pool.get_mut(connection) {
            slot.conn.handle_failed(reason);
        }
        self.process();
    }

    /// Next bytes to write, with the connection to write them to.
    pub fn poll_transmit(&mut self) -> Option<(ConnectionId, Transmit)> {
        self.state.pool.ids().into_iter().find_map(|connection| {
            let slot = self.state.pool.get_mut(connection)?;
            slot.conn.poll_transmit().map(|t| (connection, t))
        })
    }

    /// Next transport action for the driver.
    pub fn poll_action(&mut self) -> Option<Action> {
        self.state.actions.pop_front()
    }

    /// Next event for collaborators.
    pub fn poll_event(&mut self) -> Option<EngineEvent> {
        self.state.events.pop_front()
    }

    fn request(
        &mut self,
        task: Box<dyn Task>,
        parent: Option<TaskId>,
        connection: Option<ConnectionId>,
    ) -> TaskId {
        let id = self.state.spawn(task, parent, connection);
        debug!(task = %id, "requested");
        self.process();
        id
    }

    fn request_in_mailbox(&mut self, mailbox: &Mailbox, task: Box<dyn Task>) -> TaskId {
        let keeper = self.ensure_keeper(mailbox);
        if self.tasks.is_live(keeper.obtain) || self.is_pending(keeper.obtain) {
            self.request(task, Some(keeper.obtain), None)
        } else {
            self.request(task, None, keeper.connection)
        }
    }

    fn is_pending(&self, id: TaskId) -> bool {
        self.state.spawned.iter().any(|s| s.id == id)
    }

    fn new_connection(&mut self) -> ConnectionId {
        let connection = self.state.pool.create();
        let open = self.factory.open_connection();
        self.state.spawn(open, None, Some(connection));
        connection
    }

    /// A task that completes once some connection is free.
    fn any_connection(&mut self) -> TaskId {
        if !self.state.policy.allows_connections() {
            let offline = self.state.spawn(self.factory.offline_connection(), None, None);
            return self
                .state
                .spawn(self.factory.get_any_connection(), Some(offline), None);
        }
        let connection = match self.state.pool.ids().first() {
            Some(&connection) => connection,
            None => self.new_connection(),
        };
        self.state
            .spawn(self.factory.get_any_connection(), None, Some(connection))
    }

    /// A connection for a newly opened mailbox.
    ///
    /// Prefers a connection no mailbox is kept open on, then a new one while
    /// below the limit, then takes over the oldest kept mailbox's connection.
    fn connection_for_mailbox(&mut self) -> ConnectionId {
        let claimed: Vec<ConnectionId> = self
            .state
            .keepers
            .values()
            .filter_map(|k| k.connection)
            .collect();
        if let Some(free) = self
            .state
            .pool
            .ids()
            .into_iter()
            .find(|c| !claimed.contains(c))
        {
            return free;
        }
        if self.state.pool.len() < self.state.config.max_connections {
            return self.new_connection();
        }
        let oldest = self
            .state
            .keepers
            .iter()
            .filter_map(|(mailbox, k)| k.connection.map(|c| (c, mailbox.clone())))
            .min();
        match oldest {
            Some((connection, mailbox)) => {
                debug!(%mailbox, %connection, "switching connection to another mailbox");
                self.state.keepers.remove(&mailbox);
                connection
            }
            None => self.new_connection(),
        }
    }

    fn ensure_keeper(&mut self, mailbox: &Mailbox) -> Keeper {
        if let Some(keeper) = self.state.keepers.get(mailbox).copied() {
            if self.tasks.is_live(keeper.task) || self.is_pending(keeper.task) {
                return keeper;
            }
            self.state.keepers.remove(mailbox);
        }

        let (parent, connection) = if self.state.policy.allows_connections() {
            (None, Some(self.connection_for_mailbox()))
        } else {
            let offline = self.state.spawn(self.factory.offline_connection(), None, None);
            (Some(offline), None)
        };
        let obtain = self.state.allocate_task_id();
        let task = self.state.allocate_task_id();
        self.state.spawn_with_id(
            obtain,
            self.factory.obtain_synchronized_mailbox(mailbox, task),
            parent,
            connection,
        );
        self.state
            .spawn_with_id(task, self.factory.keep_mailbox_open(mailbox), Some(obtain), None);

        let keeper = Keeper {
            task,
            obtain,
            connection,
        };
        self.state.keepers.insert(mailbox.clone(), keeper);
        keeper
    }

    fn process(&mut self) {
        loop {
            let mut progressed = self.adopt_spawned();
            progressed |= self.retire_owners();
            progressed |= self.resolve_dependencies();
            progressed |= self.schedule();
            progressed |= self.drain_connections();
            if !progressed {
                break;
            }
        }
        self.collect_garbage();
        self.publish_changes();
    }

    fn adopt_spawned(&mut self) -> bool {
        let spawned = std::mem::take(&mut self.state.spawned);
        let progressed = !spawned.is_empty();
        for spawn in spawned {
            let record = TaskRecord::new(spawn.task, spawn.parent, spawn.connection);
            trace!(task = %spawn.id, name = record.name, "registered");
            self.tasks.insert(spawn.id, record);
            if let Some(connection) = spawn.connection {
                if !self.state.pool.contains(connection) {
                    self.finish(
                        spawn.id,
                        TaskState::Failed(TaskError::Connection(format!("{connection} is gone"))),
                    );
                }
            }
        }
        progressed
    }

    fn retire_owners(&mut self) -> bool {
        let retired = std::mem::take(&mut self.state.retired_owners);
        let mut progressed = false;
        for id in retired {
            if self.tasks.is_live(id) {
                debug!(task = %id, "mailbox owner displaced");
                self.finish(id, TaskState::Completed);
                progressed = true;
            }
        }
        progressed
    }

    fn resolve_dependencies(&mut self) -> bool {
        let mut progressed = false;
        for id in self.tasks.ids() {
            let Some(record) = self.tasks.get(id) else {
                continue;
            };
            if !matches!(
                record.state,
                TaskState::Created | TaskState::WaitingOnDependency
            ) {
                continue;
            }

            let Some(parent) = record.parent else {
                progressed |= self.ready(id);
                continue;
            };
            let parent_state = self.tasks.get(parent).map(|p| (p.state.clone(), p.connection));
            match parent_state {
                Some((TaskState::Completed, connection)) => {
                    if let Some(record) = self.tasks.get_mut(id) {
                        record.connection = record.connection.or(connection);
                    }
                    self.ready(id);
                    progressed = true;
                }
                Some((TaskState::Failed(error), _)) => {
                    self.parent_failed(id, parent, error);
                    progressed = true;
                }
                Some((TaskState::Aborted, _)) => {
                    self.parent_failed(id, parent, TaskError::Aborted);
                    progressed = true;
                }
                Some(_) => {
                    if record.state == TaskState::Created {
                        self.set_state(id, TaskState::WaitingOnDependency);
                        progressed = true;
                    }
                }
                None => {
                    self.finish(
                        id,
                        TaskState::Failed(TaskError::Protocol(format!(
                            "dependency {parent} no longer exists"
                        ))),
                    );
                    progressed = true;
                }
            }
        }
        progressed
    }

    fn parent_failed(&mut self, id: TaskId, parent: TaskId, error: TaskError) {
        let recovery = self.dispatch(id, |task, ctx| task.on_parent_failed(ctx, &error));
        match recovery {
            Some(Recovery::Recovered) => {
                debug!(task = %id, %parent, "recovered from failed dependency");
                self.finish(id, TaskState::Completed);
            }
            _ => self.finish(
                id,
                TaskState::Failed(TaskError::DependencyFailed {
                    parent,
                    cause: Box::new(error),
                }),
            ),
        }
    }

    /// Starts `id` or queues it on its connection; returns true on a change.
    fn ready(&mut self, id: TaskId) -> bool {
        let Some(record) = self.tasks.get(id) else {
            return false;
        };
        if !record.needs_connection {
            self.start(id);
            return true;
        }
        let Some(connection) = record.connection else {
            self.finish(
                id,
                TaskState::Failed(TaskError::Protocol("no connection to run on".to_string())),
            );
            return true;
        };
        let parent = record.parent;
        let siblings_ahead = |queue: &std::collections::VecDeque<TaskId>| {
            queue
                .iter()
                .take_while(|q| self.tasks.get(**q).is_some_and(|r| r.parent == parent))
                .count()
        };
        match self.state.pool.get_mut(connection) {
            Some(slot) => {
                // a dependent of the task that just ran here takes its place
                // ahead of anything queued later
                if parent.is_some() && slot.active == parent {
                    let at = siblings_ahead(&slot.queue);
                    slot.queue.insert(at, id);
                } else {
                    slot.queue.push_back(id);
                }
                self.set_state(id, TaskState::WaitingOnConnection);
            }
            None => self.finish(
                id,
                TaskState::Failed(TaskError::Connection(format!("{connection} is gone"))),
            ),
        }
        true
    }

    fn schedule(&mut self) -> bool {
        let mut progressed = false;
        for connection in self.state.pool.ids() {
            let Some(slot) = self.state.pool.get_mut(connection) else {
                continue;
            };
            if let Some(active) = slot.active {
                let live = self.tasks.is_live(active);
                if live || slot.has_outstanding(active) {
                    continue;
                }
                slot.active = None;
                progressed = true;
            }

            let next = loop {
                let Some(candidate) = slot.queue.pop_front() else {
                    break None;
                };
                if self.tasks.state(candidate) == Some(&TaskState::WaitingOnConnection) {
                    break Some(candidate);
                }
            };
            if let Some(id) = next {
                slot.active = Some(id);
                self.start(id);
                progressed = true;
            }
        }
        progressed
    }

    fn start(&mut self, id: TaskId) {
        self.set_state(id, TaskState::Running);
        if let Some(step) = self.dispatch(id, |task, ctx| task.start(ctx)) {
            self.apply(id, step);
        }
    }

    fn apply(&mut self, id: TaskId, step: Step) {
        match step {
            Step::Continue => {}
            Step::Done => self.finish(id, TaskState::Completed),
            Step::Fail(error) => self.finish(id, TaskState::Failed(error)),
        }
    }

    /// Runs `f` against a task with a context bound to its connection.
    fn dispatch<R>(
        &mut self,
        id: TaskId,
        f: impl FnOnce(&mut dyn Task, &mut TaskContext<'_>) -> R,
    ) -> Option<R> {
        let record = self.tasks.get_mut(id)?;
        let mut task = record.task.take()?;
        let connection = record.connection;
        let out = {
            let mut ctx = TaskContext::new(id, connection, &mut self.state, self.factory.as_ref());
            f(task.as_mut(), &mut ctx)
        };
        if let Some(record) = self.tasks.get_mut(id) {
            record.task = Some(task);
        }
        self.publish_changes();
        Some(out)
    }

    fn set_state(&mut self, id: TaskId, state: TaskState) {
        if let Some(record) = self.tasks.get_mut(id) {
            trace!(task = %id, name = record.name, from = %record.state, to = %state, "transition");
            record.state = state;
        }
    }

    fn finish(&mut self, id: TaskId, state: TaskState) {
        let Some(record) = self.tasks.get_mut(id) else {
            return;
        };
        if record.state.is_terminal() {
            return;
        }
        let name = record.name;
        let connection = record.connection;
        record.state = state.clone();
        match &state {
            TaskState::Failed(e) => warn!(task = %id, name, "failed: {e}"),
            _ => debug!(task = %id, name, %state, "finished"),
        }

        self.state.keepers.retain(|_, k| k.task != id);
        let mut unusable = None;
        if let Some(slot) = connection.and_then(|c| self.state.pool.get_mut(c)) {
            if slot.owner == Some(id) {
                slot.owner = None;
            }
            // a connection left unauthenticated cannot serve the tasks behind it
            if slot.active == Some(id)
                && state != TaskState::Completed
                && !slot.conn.state().is_authenticated()
            {
                let reason = state
                    .error()
                    .map_or_else(|| state.to_string(), ToString::to_string);
                unusable = connection.map(|c| (c, reason));
            }
        }

        self.state
            .events
            .push_back(EngineEvent::TaskFinished { id, name, state });
        if let Some((connection, reason)) = unusable {
            self.teardown(connection, &reason, true);
        }
    }

    fn teardown(&mut self, connection: ConnectionId, reason: &str, notify: bool) {
        if self.state.pool.remove(connection).is_none() {
            return;
        }
        if notify {
            error!(%connection, "connection lost: {reason}");
        } else {
            info!(%connection, "closing connection: {reason}");
        }
        for id in self.tasks.on_connection(connection) {
            self.finish(
                id,
                TaskState::Failed(TaskError::Connection(reason.to_string())),
            );
        }
        self.state.keepers.retain(|_, k| k.connection != Some(connection));
        self.state.events.push_back(EngineEvent::ConnectionStateChanged {
            connection,
            state: ConnectionState::Disconnected,
        });
        if notify {
            self.state.events.push_back(EngineEvent::ConnectionError {
                connection,
                message: reason.to_string(),
            });
        }
        self.state.actions.push_back(Action::Close { connection });
    }

    fn drain_connections(&mut self) -> bool {
        let mut progressed = false;
        for connection in self.state.pool.ids() {
            while let Some(event) = self
                .state
                .pool
                .get_mut(connection)
                .and_then(|slot| slot.conn.poll_event())
            {
                progressed = true;
                self.route(connection, event);
            }
        }
        progressed
    }

    fn route(&mut self, connection: ConnectionId, event: ConnectionEvent) {
        match event {
            ConnectionEvent::LineSent(_) | ConnectionEvent::LineReceived(_) => {}
            ConnectionEvent::Response(Response::Tagged(tagged)) => {
                self.route_tagged(connection, &tagged);
            }
            ConnectionEvent::Response(Response::Untagged(untagged)) => {
                self.route_untagged(connection, &untagged);
            }
            ConnectionEvent::Response(Response::Continuation { text }) => {
                let active = self.state.pool.get(connection).and_then(|s| s.active);
                warn!(%connection, ?text, "unexpected continuation request");
                if let Some(id) = active.filter(|&id| self.tasks.is_live(id)) {
                    self.finish(
                        id,
                        TaskState::Failed(TaskError::Protocol(
                            "unexpected continuation request".to_string(),
                        )),
                    );
                }
            }
            ConnectionEvent::ParseError { raw, message } => {
                warn!(%connection, "unparseable response: {message}");
                self.state.events.push_back(EngineEvent::ParseError {
                    connection,
                    raw,
                    message,
                });
            }
            ConnectionEvent::StateChanged { to, .. } => {
                self.state
                    .events
                    .push_back(EngineEvent::ConnectionStateChanged {
                        connection,
                        state: to,
                    });
            }
            ConnectionEvent::Disconnected { reason } => {
                self.teardown(connection, &reason, true);
            }
        }
    }

    fn alert(&mut self, connection: ConnectionId, code: ResponseCode, text: &str) {
        if code == ResponseCode::Alert {
            warn!(%connection, "server alert: {text}");
            self.state.events.push_back(EngineEvent::Alert {
                connection,
                text: text.to_string(),
            });
        }
    }

    fn route_tagged(&mut self, connection: ConnectionId, tagged: &TaggedResponse) {
        self.alert(connection, tagged.code, &tagged.text);
        if tagged.status == Status::Bad {
            error!(%connection, tag = %tagged.tag, "command rejected: {}", tagged.text);
        }
        let owner = self
            .state
            .pool
            .get_mut(connection)
            .and_then(|slot| slot.tags.remove(&tagged.tag));
        match owner {
            Some(id) if self.tasks.is_live(id) => {
                if let Some(step) = self.dispatch(id, |task, ctx| task.handle_tagged(ctx, tagged)) {
                    self.apply(id, step);
                }
            }
            Some(id) => debug!(task = %id, tag = %tagged.tag, "discarding response for finished task"),
            None => warn!(%connection, tag = %tagged.tag, "response for unknown tag"),
        }
    }

    fn route_untagged(&mut self, connection: ConnectionId, untagged: &UntaggedResponse) {
        if let UntaggedResponse::State(state) = untagged {
            self.alert(connection, state.code, &state.text);
        }
        let Some(slot) = self.state.pool.get(connection) else {
            return;
        };
        let (active, owner) = (slot.active, slot.owner);

        if let Some(id) = active.filter(|&id| self.tasks.is_live(id)) {
            if let Some(Some(step)) =
                self.dispatch(id, |task, ctx| task.handle_untagged(ctx, untagged))
            {
                self.apply(id, step);
                return;
            }
        }
        let owner = owner.filter(|&id| self.tasks.state(id) == Some(&TaskState::Running));
        if let Some(id) = owner {
            if let Some(Some(step)) =
                self.dispatch(id, |task, ctx| task.handle_untagged(ctx, untagged))
            {
                self.apply(id, step);
                return;
            }
        }
        debug!(%connection, ?untagged, "unclaimed untagged response");
    }

    fn collect_garbage(&mut self) {
        for id in self.tasks.ids() {
            let Some(record) = self.tasks.get(id) else {
                continue;
            };
            if !record.state.is_terminal() {
                continue;
            }
            let busy = self
                .state
                .pool
                .ids()
                .into_iter()
                .filter_map(|c| self.state.pool.get(c))
                .any(|slot| slot.active == Some(id) || slot.has_outstanding(id));
            let depended_on = self.tasks.ids().into_iter().any(|other| {
                self.tasks.get(other).is_some_and(|r| {
                    r.parent == Some(id)
                        && matches!(r.state, TaskState::Created | TaskState::WaitingOnDependency)
                })
            });
            if !busy && !depended_on {
                trace!(task = %id, "discarded");
                self.tasks.remove(id);
            }
        }
    }

    fn publish_changes(&mut self) {
        for path in self.state.tree.take_changes() {
            self.state.events.push_back(EngineEvent::CacheChanged(path));
        }
    }
}

