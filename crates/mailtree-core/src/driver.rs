//! Async driver.
//!
//! [`Engine`] runs the single control loop that owns the [`Model`]. Every
//! transport gets a reader task and a writer task; they talk to the loop
//! through channels, so the model is only ever touched on one task. Callers
//! use a cloneable [`EngineHandle`] and subscribe to [`EngineEvent`]s.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use mailtree_imap::{FlagOperation, Flags, Mailbox, Transport, Uid, UidSet};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::events::EngineEvent;
use crate::model::{Action, ConnectionId, Model};
use crate::policy::NetworkPolicy;
use crate::task::{TaskId, TaskState};
use crate::tree::MailboxTree;
use crate::{Error, Result};

const READ_BUFFER: usize = 8192;
const EVENT_CAPACITY: usize = 1024;

/// A duplex byte stream.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

/// A boxed duplex byte stream.
pub type BoxedStream = Box<dyn AsyncStream>;

/// Future returned by [`Connector::connect`].
pub type ConnectFuture<'a> =
    Pin<Box<dyn Future<Output = mailtree_imap::Result<BoxedStream>> + Send + 'a>>;

/// Opens transport streams.
pub trait Connector: Send + Sync {
    /// Connects to `transport`.
    fn connect(&self, transport: Transport) -> ConnectFuture<'_>;
}

/// Opens real TCP, TLS and subprocess streams.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportConnector;

impl Connector for TransportConnector {
    fn connect(&self, transport: Transport) -> ConnectFuture<'_> {
        Box::pin(async move {
            let stream = mailtree_imap::connection::connect(&transport).await?;
            Ok(Box::new(stream) as BoxedStream)
        })
    }
}

type Request = Box<dyn FnOnce(&mut Model) + Send>;

enum IoEvent {
    Connected(ConnectionId, mpsc::UnboundedSender<Vec<u8>>),
    ConnectFailed(ConnectionId, String),
    Data(ConnectionId, Vec<u8>),
    Closed(ConnectionId, String),
}

/// The control loop.
pub struct Engine {
    model: Model,
    connector: Arc<dyn Connector>,
    requests: mpsc::UnboundedReceiver<Request>,
    io_tx: mpsc::UnboundedSender<IoEvent>,
    io_rx: mpsc::UnboundedReceiver<IoEvent>,
    events: broadcast::Sender<EngineEvent>,
    writers: HashMap<ConnectionId, mpsc::UnboundedSender<Vec<u8>>>,
    transports: HashMap<ConnectionId, JoinHandle<()>>,
}

impl Engine {
    /// Creates the loop with real transports.
    #[must_use]
    pub fn new(model: Model) -> (Self, EngineHandle) {
        Self::with_connector(model, TransportConnector)
    }

    /// Creates the loop with a custom stream provider.
    #[must_use]
    pub fn with_connector(model: Model, connector: impl Connector + 'static) -> (Self, EngineHandle) {
        let (request_tx, requests) = mpsc::unbounded_channel();
        let (io_tx, io_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let handle = EngineHandle {
            requests: request_tx,
            events: events.clone(),
        };
        let engine = Self {
            model,
            connector: Arc::new(connector),
            requests,
            io_tx,
            io_rx,
            events,
            writers: HashMap::new(),
            transports: HashMap::new(),
        };
        (engine, handle)
    }

    /// Runs the loop on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Runs until every [`EngineHandle`] is dropped.
    pub async fn run(mut self) {
        info!("engine started");
        loop {
            self.pump();
            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(request) => request(&mut self.model),
                    None => break,
                },
                Some(io) = self.io_rx.recv() => self.handle_io(io),
            }
        }
        for (_, transport) in self.transports.drain() {
            transport.abort();
        }
        info!("engine stopped");
    }

    fn handle_io(&mut self, io: IoEvent) {
        match io {
            IoEvent::Connected(connection, writer) => {
                self.writers.insert(connection, writer);
                self.model.handle_connected(connection);
            }
            IoEvent::ConnectFailed(connection, reason) => {
                self.model.handle_connect_failed(connection, &reason);
            }
            IoEvent::Data(connection, data) => self.model.handle_input(connection, &data),
            IoEvent::Closed(connection, reason) => {
                self.writers.remove(&connection);
                self.model.handle_disconnected(connection, &reason);
            }
        }
    }

    /// Carries out everything the model has queued.
    fn pump(&mut self) {
        while let Some(action) = self.model.poll_action() {
            match action {
                Action::Connect {
                    connection,
                    transport,
                } => {
                    let task = tokio::spawn(run_transport(
                        Arc::clone(&self.connector),
                        connection,
                        transport,
                        self.io_tx.clone(),
                    ));
                    self.transports.insert(connection, task);
                }
                Action::Close { connection } => {
                    self.writers.remove(&connection);
                    if let Some(task) = self.transports.remove(&connection) {
                        task.abort();
                    }
                }
            }
        }
        while let Some((connection, transmit)) = self.model.poll_transmit() {
            match self.writers.get(&connection) {
                Some(writer) if writer.send(transmit.data).is_ok() => {}
                _ => debug!(%connection, "dropping output for connection without transport"),
            }
        }
        while let Some(event) = self.model.poll_event() {
            // no subscribers is fine
            let _ = self.events.send(event);
        }
    }
}

async fn run_transport(
    connector: Arc<dyn Connector>,
    connection: ConnectionId,
    transport: Transport,
    io: mpsc::UnboundedSender<IoEvent>,
) {
    debug!(%connection, transport = %transport.describe(), "connecting");
    let stream = match connector.connect(transport).await {
        Ok(stream) => stream,
        Err(e) => {
            let _ = io.send(IoEvent::ConnectFailed(connection, e.to_string()));
            return;
        }
    };
    let (mut reader, mut writer) = tokio::io::split(stream);
    let (write_tx, mut write_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    if io.send(IoEvent::Connected(connection, write_tx)).is_err() {
        return;
    }

    let write_io = io.clone();
    let write_task = tokio::spawn(async move {
        while let Some(data) = write_rx.recv().await {
            let written = async {
                writer.write_all(&data).await?;
                writer.flush().await
            };
            if let Err(e) = written.await {
                warn!(%connection, "write failed: {e}");
                let _ = write_io.send(IoEvent::Closed(connection, e.to_string()));
                break;
            }
        }
    });

    let mut buf = vec![0u8; READ_BUFFER];
    let reason = loop {
        match reader.read(&mut buf).await {
            Ok(0) => break "connection closed by server".to_string(),
            Ok(n) => {
                if io.send(IoEvent::Data(connection, buf[..n].to_vec())).is_err() {
                    break "engine stopped".to_string();
                }
            }
            Err(e) => break e.to_string(),
        }
    };
    write_task.abort();
    let _ = io.send(IoEvent::Closed(connection, reason));
}

/// Cloneable access to a running [`Engine`].
#[derive(Clone)]
pub struct EngineHandle {
    requests: mpsc::UnboundedSender<Request>,
    events: broadcast::Sender<EngineEvent>,
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("subscribers", &self.events.receiver_count())
            .finish_non_exhaustive()
    }
}

impl EngineHandle {
    /// Subscribes to engine events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Runs `f` on the control loop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineStopped`] if the loop is gone.
    pub async fn with_model<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut Model) -> R + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let request: Request = Box::new(move |model| {
            let _ = reply.send(f(model));
        });
        self.requests
            .send(request)
            .map_err(|_| Error::EngineStopped)?;
        rx.await.map_err(|_| Error::EngineStopped)
    }

    /// See [`Model::list_child_mailboxes`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineStopped`] if the loop is gone.
    pub async fn list_child_mailboxes(&self, parent: Option<Mailbox>) -> Result<TaskId> {
        self.with_model(move |m| m.list_child_mailboxes(parent.as_ref()))
            .await
    }

    /// See [`Model::open_mailbox`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineStopped`] if the loop is gone.
    pub async fn open_mailbox(&self, mailbox: Mailbox) -> Result<TaskId> {
        self.with_model(move |m| m.open_mailbox(&mailbox)).await
    }

    /// See [`Model::create_mailbox`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineStopped`] if the loop is gone.
    pub async fn create_mailbox(&self, mailbox: Mailbox) -> Result<TaskId> {
        self.with_model(move |m| m.create_mailbox(&mailbox)).await
    }

    /// See [`Model::delete_mailbox`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineStopped`] if the loop is gone.
    pub async fn delete_mailbox(&self, mailbox: Mailbox) -> Result<TaskId> {
        self.with_model(move |m| m.delete_mailbox(&mailbox)).await
    }

    /// See [`Model::expunge_mailbox`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineStopped`] if the loop is gone.
    pub async fn expunge_mailbox(&self, mailbox: Mailbox) -> Result<TaskId> {
        self.with_model(move |m| m.expunge_mailbox(&mailbox)).await
    }

    /// See [`Model::number_of_messages`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineStopped`] if the loop is gone.
    pub async fn number_of_messages(&self, mailbox: Mailbox) -> Result<TaskId> {
        self.with_model(move |m| m.number_of_messages(&mailbox)).await
    }

    /// See [`Model::fetch_metadata`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineStopped`] if the loop is gone.
    pub async fn fetch_metadata(&self, mailbox: Mailbox, uids: UidSet) -> Result<TaskId> {
        self.with_model(move |m| m.fetch_metadata(&mailbox, uids)).await
    }

    /// See [`Model::fetch_part`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineStopped`] if the loop is gone.
    pub async fn fetch_part(&self, mailbox: Mailbox, uid: Uid, part_id: String) -> Result<TaskId> {
        self.with_model(move |m| m.fetch_part(&mailbox, uid, &part_id))
            .await
    }

    /// See [`Model::update_flags`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineStopped`] if the loop is gone.
    pub async fn update_flags(
        &self,
        mailbox: Mailbox,
        uids: UidSet,
        operation: FlagOperation,
        flags: Flags,
    ) -> Result<TaskId> {
        self.with_model(move |m| m.update_flags(&mailbox, uids, operation, flags))
            .await
    }

    /// See [`Model::copy_messages`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineStopped`] if the loop is gone.
    pub async fn copy_messages(&self, source: Mailbox, uids: UidSet, target: Mailbox) -> Result<TaskId> {
        self.with_model(move |m| m.copy_messages(&source, uids, &target))
            .await
    }

    /// See [`Model::move_messages`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineStopped`] if the loop is gone.
    pub async fn move_messages(&self, source: Mailbox, uids: UidSet, target: Mailbox) -> Result<TaskId> {
        self.with_model(move |m| m.move_messages(&source, uids, &target))
            .await
    }

    /// See [`Model::abort`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineStopped`] if the loop is gone.
    pub async fn abort(&self, id: TaskId) -> Result<bool> {
        self.with_model(move |m| m.abort(id)).await
    }

    /// See [`Model::set_network_policy`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineStopped`] if the loop is gone.
    pub async fn set_network_policy(&self, policy: NetworkPolicy) -> Result<()> {
        self.with_model(move |m| m.set_network_policy(policy)).await
    }

    /// See [`Model::reconnect_all`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineStopped`] if the loop is gone.
    pub async fn reconnect_all(&self) -> Result<()> {
        self.with_model(Model::reconnect_all).await
    }

    /// A snapshot of the mailbox tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineStopped`] if the loop is gone.
    pub async fn tree(&self) -> Result<MailboxTree> {
        self.with_model(|m| m.tree().clone()).await
    }
}

/// Waits on `events` until task `id` finishes.
///
/// Subscribe before issuing the request, or the event may be missed.
///
/// # Errors
///
/// Returns [`Error::EngineStopped`] if the loop is gone.
pub async fn wait_for(
    events: &mut broadcast::Receiver<EngineEvent>,
    id: TaskId,
) -> Result<TaskState> {
    loop {
        match events.recv().await {
            Ok(EngineEvent::TaskFinished { id: finished, state, .. }) if finished == id => {
                return Ok(state);
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "event subscriber lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return Err(Error::EngineStopped),
        }
    }
}
