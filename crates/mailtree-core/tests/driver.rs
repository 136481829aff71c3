//! The tokio driver over scripted transports.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use common::{builder, inbox, init_tracing, uid};
use mailtree_core::driver::{BoxedStream, ConnectFuture};
use mailtree_core::{
    Connector, Engine, EngineEvent, Model, StaticCredentials, TaskError, TaskState, wait_for,
};
use mailtree_imap::Transport;
use tokio_test::io::{Builder, Mock};

/// Hands out scripted streams in order, then refuses.
struct ScriptedConnector {
    streams: Mutex<VecDeque<Mock>>,
}

impl ScriptedConnector {
    fn new(streams: impl IntoIterator<Item = Mock>) -> Self {
        Self {
            streams: Mutex::new(streams.into_iter().collect()),
        }
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self, _transport: Transport) -> ConnectFuture<'_> {
        let stream = self.streams.lock().unwrap().pop_front();
        Box::pin(async move {
            match stream {
                Some(stream) => Ok(Box::new(stream) as BoxedStream),
                None => Err(mailtree_imap::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                ))),
            }
        })
    }
}

fn model() -> Model {
    Model::new(builder().build().unwrap(), StaticCredentials::new("secret"))
}

async fn finish(
    events: &mut tokio::sync::broadcast::Receiver<EngineEvent>,
    id: mailtree_core::TaskId,
) -> TaskState {
    tokio::time::timeout(Duration::from_secs(5), wait_for(events, id))
        .await
        .expect("task did not finish")
        .unwrap()
}

#[tokio::test]
async fn lists_mailboxes_over_a_scripted_session() {
    init_tracing();
    let stream = Builder::new()
        .read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
        .write(b"y0000 LOGIN alice secret\r\n")
        .read(b"y0000 OK logged in\r\n")
        .write(b"y0001 LIST \"\" \"%\"\r\n")
        .read(b"* LIST (\\HasNoChildren) \"/\" INBOX\r\ny0001 OK done\r\n")
        .build();
    let (engine, handle) = Engine::with_connector(model(), ScriptedConnector::new([stream]));
    let engine = engine.spawn();
    let mut events = handle.subscribe();

    let list = handle.list_child_mailboxes(None).await.unwrap();
    assert_eq!(finish(&mut events, list).await, TaskState::Completed);

    let tree = handle.tree().await.unwrap();
    assert_eq!(tree.children(None).unwrap(), [inbox()]);

    drop(handle);
    engine.await.unwrap();
}

#[tokio::test]
async fn synchronizes_a_mailbox_over_a_scripted_session() {
    init_tracing();
    let stream = Builder::new()
        .read(b"* PREAUTH [CAPABILITY IMAP4rev1] ready\r\n")
        .write(b"y0000 SELECT INBOX\r\n")
        .read(b"* 1 EXISTS\r\n* OK [UIDVALIDITY 3] ok\r\ny0000 OK [READ-WRITE] done\r\n")
        .write(b"y0001 UID FETCH 1:* (UID FLAGS)\r\n")
        .read(b"* 1 FETCH (UID 5 FLAGS (\\Seen))\r\ny0001 OK done\r\n")
        .build();
    let (engine, handle) = Engine::with_connector(model(), ScriptedConnector::new([stream]));
    engine.spawn();
    let mut events = handle.subscribe();

    let obtain = handle.open_mailbox(inbox()).await.unwrap();
    assert_eq!(finish(&mut events, obtain).await, TaskState::Completed);

    let tree = handle.tree().await.unwrap();
    assert!(tree.message(&inbox(), uid(5)).unwrap().flags.is_seen());
}

#[tokio::test]
async fn refused_connection_fails_the_request() {
    init_tracing();
    let (engine, handle) = Engine::with_connector(model(), ScriptedConnector::new([]));
    engine.spawn();
    let mut events = handle.subscribe();

    let status = handle.number_of_messages(inbox()).await.unwrap();
    match finish(&mut events, status).await {
        TaskState::Failed(error) => {
            assert!(matches!(error.root_cause(), TaskError::Connection(reason) if reason.contains("refused")));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(handle.with_model(|m| m.connections().is_empty()).await.unwrap());
}

#[tokio::test]
async fn engine_stops_with_its_last_handle() {
    let (engine, handle) = Engine::with_connector(model(), ScriptedConnector::new([]));
    let engine = engine.spawn();
    let other = handle.clone();
    drop(handle);
    assert!(other.tree().await.is_ok());
    drop(other);
    tokio::time::timeout(Duration::from_secs(5), engine)
        .await
        .unwrap()
        .unwrap();
}
