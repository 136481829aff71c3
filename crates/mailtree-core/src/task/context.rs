//! What a running task may touch.

use mailtree_imap::{Command, Connection, ConnectionState, Mailbox, Tag};
use tracing::warn;

use super::{Task, TaskError, TaskId};
use crate::config::EngineConfig;
use crate::credentials::CredentialRequest;
use crate::events::EngineEvent;
use crate::factory::TaskFactory;
use crate::model::{Action, ConnectionId, ModelState};
use crate::policy::NetworkPolicy;
use crate::store::CacheEntry;
use crate::tree::{MailboxTree, TreePath};

/// Access to the coordinator's state while a task handles an event.
pub struct TaskContext<'a> {
    id: TaskId,
    connection: Option<ConnectionId>,
    state: &'a mut ModelState,
    factory: &'a dyn TaskFactory,
}

impl<'a> TaskContext<'a> {
    pub(crate) fn new(
        id: TaskId,
        connection: Option<ConnectionId>,
        state: &'a mut ModelState,
        factory: &'a dyn TaskFactory,
    ) -> Self {
        Self {
            id,
            connection,
            state,
            factory,
        }
    }

    /// The task being driven.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// The connection the task is bound to.
    #[must_use]
    pub const fn connection_id(&self) -> Option<ConnectionId> {
        self.connection
    }

    /// The wire connection the task is bound to, if it still exists.
    #[must_use]
    pub fn connection(&self) -> Option<&Connection> {
        self.state
            .pool
            .get(self.connection?)
            .map(|slot| &slot.conn)
    }

    /// Checks a server capability on the bound connection.
    #[must_use]
    pub fn has_capability(&self, name: &str) -> bool {
        self.connection().is_some_and(|c| c.has_capability(name))
    }

    /// The mailbox currently selected on the bound connection.
    #[must_use]
    pub fn selected_mailbox(&self) -> Option<&Mailbox> {
        self.state.pool.get(self.connection?)?.mailbox.as_ref()
    }

    /// Fails unless `mailbox` is selected on the bound connection.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Protocol`] if another mailbox (or none) is selected.
    pub fn ensure_selected(&self, mailbox: &Mailbox) -> Result<(), TaskError> {
        let selected = self.connection().map(Connection::state) == Some(ConnectionState::Selected)
            && self.selected_mailbox() == Some(mailbox);
        if selected {
            Ok(())
        } else {
            Err(TaskError::Protocol(format!("{mailbox} is not selected")))
        }
    }

    /// Sends a command on the bound connection and routes its completion here.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Connection`] if the connection is gone or cannot
    /// carry commands.
    pub fn send(&mut self, command: &Command) -> Result<Tag, TaskError> {
        let slot = self
            .connection
            .and_then(|c| self.state.pool.get_mut(c))
            .ok_or_else(|| TaskError::Connection("connection is gone".to_string()))?;
        let tag = slot
            .conn
            .send(command)
            .map_err(|e| TaskError::Connection(e.to_string()))?;
        slot.tags.insert(tag.clone(), self.id);
        Ok(tag)
    }

    /// Asks the driver to open the transport of the bound connection.
    pub(crate) fn connect(&mut self) {
        let Some(connection) = self.connection else {
            return;
        };
        if let Some(slot) = self.state.pool.get_mut(connection) {
            slot.conn.handle_connecting();
        }
        let transport = self.state.config.transport.clone();
        self.state.actions.push_back(Action::Connect {
            connection,
            transport,
        });
    }

    /// Feeds bytes to the bound connection as if the server had sent them.
    pub(crate) fn inject(&mut self, bytes: &[u8]) {
        if let Some(slot) = self.connection.and_then(|c| self.state.pool.get_mut(c)) {
            if !slot.conn.state().is_usable() {
                slot.conn.handle_connected();
            }
            slot.conn.handle_input(bytes);
        }
    }

    /// Makes `keeper` the owner of the bound connection with `mailbox` selected.
    ///
    /// A previous owner loses ownership and completes.
    pub(crate) fn claim_mailbox(&mut self, keeper: TaskId, mailbox: &Mailbox) {
        let Some(slot) = self.connection.and_then(|c| self.state.pool.get_mut(c)) else {
            return;
        };
        slot.mailbox = Some(mailbox.clone());
        if slot.owner != Some(keeper) {
            if let Some(previous) = slot.owner.replace(keeper) {
                self.state.retired_owners.push(previous);
            }
        }
    }

    /// Forgets the selected mailbox of the bound connection.
    pub(crate) fn release_mailbox(&mut self) {
        if let Some(slot) = self.connection.and_then(|c| self.state.pool.get_mut(c)) {
            slot.mailbox = None;
        }
    }

    /// Records a fresh synchronization task for a kept mailbox.
    pub(crate) fn set_keeper_obtain(&mut self, mailbox: &Mailbox, obtain: TaskId) {
        if let Some(keeper) = self.state.keepers.get_mut(mailbox) {
            keeper.obtain = obtain;
        }
    }

    /// The mailbox tree.
    #[must_use]
    pub fn tree(&self) -> &MailboxTree {
        &self.state.tree
    }

    pub(crate) fn tree_mut(&mut self) -> &mut MailboxTree {
        &mut self.state.tree
    }

    /// Reads a persisted cache entry; storage errors are logged and ignored.
    #[must_use]
    pub fn load(&self, path: &TreePath) -> Option<CacheEntry> {
        self.state.store.get(path).unwrap_or_else(|e| {
            warn!(%path, "cache read failed: {e}");
            None
        })
    }

    /// Persists a cache entry; storage errors are logged and ignored.
    pub fn persist(&mut self, path: &TreePath, entry: CacheEntry) {
        if let Err(e) = self.state.store.put(path, entry) {
            warn!(%path, "cache write failed: {e}");
        }
    }

    /// Removes persisted entries at and below `path`.
    pub fn forget(&mut self, path: &TreePath) {
        if let Err(e) = self.state.store.remove(path) {
            warn!(%path, "cache removal failed: {e}");
        }
    }

    /// Asks the credential provider for a password.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Authentication`] if the provider fails.
    pub fn request_password(
        &mut self,
        attempt: u32,
        rejection: Option<String>,
    ) -> Result<Option<String>, TaskError> {
        let request = CredentialRequest {
            username: self.state.config.username.clone(),
            attempt,
            rejection,
        };
        self.emit(EngineEvent::CredentialsRequested {
            username: request.username.clone(),
            attempt,
        });
        self.state
            .credentials
            .password(&request)
            .map_err(|e| TaskError::Authentication(e.to_string()))
    }

    /// Publishes an event.
    pub fn emit(&mut self, event: EngineEvent) {
        self.state.events.push_back(event);
    }

    /// Registers a task bound to the same connection as this one.
    pub fn spawn_here(&mut self, task: Box<dyn Task>) -> TaskId {
        self.state.spawn(task, None, self.connection)
    }

    /// Registers a task that runs after `parent` and inherits its connection.
    pub fn spawn_after(&mut self, parent: TaskId, task: Box<dyn Task>) -> TaskId {
        self.state.spawn(task, Some(parent), None)
    }

    /// The factory building tasks.
    #[must_use]
    pub fn factory(&self) -> &dyn TaskFactory {
        self.factory
    }

    /// Network policy in effect.
    #[must_use]
    pub const fn policy(&self) -> NetworkPolicy {
        self.state.policy
    }

    /// Engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.state.config
    }
}
