//! Test harness: a [`Model`] with the test playing the server.

#![allow(dead_code, clippy::unwrap_used)]

use mailtree_core::{
    ConnectionId, EngineConfig, EngineConfigBuilder, EngineEvent, Model, StaticCredentials,
    TaskId, TaskState, TestingTaskFactory,
};
use mailtree_imap::{Config, Mailbox, Transport, Uid, UidSet};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn builder() -> EngineConfigBuilder {
    EngineConfig::builder(Transport::Tcp(Config::new("imap.test")), "alice").prefetch(false)
}

pub fn uid(n: u32) -> Uid {
    Uid::new(n).unwrap()
}

pub fn uids(ns: &[u32]) -> UidSet {
    ns.iter().map(|&n| uid(n)).collect()
}

pub fn inbox() -> Mailbox {
    Mailbox::inbox()
}

/// A model plus every event it published so far.
pub struct Harness {
    pub model: Model,
    pub events: Vec<EngineEvent>,
}

impl Harness {
    pub fn new(model: Model) -> Self {
        init_tracing();
        Self {
            model,
            events: Vec::new(),
        }
    }

    /// Pre-authenticated fake connections, real tasks for everything else.
    pub fn fake(factory: TestingTaskFactory) -> Self {
        let config = builder().build().unwrap();
        Self::new(Model::new(config, StaticCredentials::new("secret")).with_factory(factory))
    }

    pub fn collect(&mut self) {
        while let Some(event) = self.model.poll_event() {
            self.events.push(event);
        }
    }

    /// Lines written to the server since the last call.
    pub fn sent(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some((_, transmit)) = self.model.poll_transmit() {
            lines.push(String::from_utf8(transmit.data).unwrap());
        }
        self.collect();
        lines
    }

    /// Like [`sent`](Self::sent), with the connection each line went to.
    pub fn sent_on(&mut self) -> Vec<(ConnectionId, String)> {
        let mut lines = Vec::new();
        while let Some((connection, transmit)) = self.model.poll_transmit() {
            lines.push((connection, String::from_utf8(transmit.data).unwrap()));
        }
        self.collect();
        lines
    }

    pub fn reply(&mut self, connection: ConnectionId, text: &str) {
        self.model.handle_input(connection, text.as_bytes());
        self.collect();
    }

    /// The only pooled connection.
    pub fn connection(&self) -> ConnectionId {
        let connections = self.model.connections();
        assert_eq!(connections.len(), 1, "expected one connection: {connections:?}");
        connections[0].0
    }

    /// Final state of a task, if it has finished.
    pub fn finished(&mut self, id: TaskId) -> Option<TaskState> {
        self.collect();
        self.events.iter().find_map(|e| match e {
            EngineEvent::TaskFinished { id: done, state, .. } if *done == id => {
                Some(state.clone())
            }
            _ => None,
        })
    }

    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        self.collect();
        std::mem::take(&mut self.events)
    }

    /// Opens INBOX holding UID 10 (`\Seen`) and UID 11, UIDVALIDITY 7.
    pub fn synced_inbox(&mut self) -> ConnectionId {
        let obtain = self.model.open_mailbox(&inbox());
        let c = self.connection();
        assert_eq!(self.sent(), ["y0000 SELECT INBOX\r\n"]);
        self.reply(
            c,
            "* 2 EXISTS\r\n* OK [UIDVALIDITY 7] UIDs valid\r\n* OK [UIDNEXT 12] next\r\n\
             y0000 OK [READ-WRITE] SELECT completed\r\n",
        );
        assert_eq!(self.sent(), ["y0001 UID FETCH 1:* (UID FLAGS)\r\n"]);
        self.reply(
            c,
            "* 1 FETCH (UID 10 FLAGS (\\Seen))\r\n* 2 FETCH (UID 11 FLAGS ())\r\ny0001 OK done\r\n",
        );
        assert_eq!(self.finished(obtain), Some(TaskState::Completed));
        self.events.clear();
        c
    }
}
