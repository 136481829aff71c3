//! # mailtree-core
//!
//! Task-execution engine for IMAP mail clients.
//!
//! This crate provides:
//! - **Tasks** - units of protocol work with explicit states and dependencies
//! - **Coordinator** - the sans-I/O [`Model`] owning connections, tasks and cache
//! - **Mailbox tree** - the in-memory mirror of mailboxes, messages and parts
//! - **Persistence** - [`CacheStore`] providers for the tree
//! - **Credentials** - static and system keyring password providers
//! - **Driver** - the tokio [`Engine`] pumping transports into the model
//!
//! ## Testing without a server
//!
//! ```
//! use mailtree_core::{EngineConfig, Model, StaticCredentials, TestingTaskFactory};
//! use mailtree_core::tree::MailboxInfo;
//! use mailtree_imap::{Config, Mailbox, Transport};
//!
//! let config = EngineConfig::builder(Transport::Tcp(Config::new("imap.example.com")), "alice")
//!     .build()
//!     .unwrap();
//! let factory = TestingTaskFactory::new()
//!     .with_children(None, vec![MailboxInfo::named(Mailbox::inbox())]);
//! let mut model = Model::new(config, StaticCredentials::new("secret")).with_factory(factory);
//!
//! model.list_child_mailboxes(None);
//! assert_eq!(model.tree().children(None), Some(&[Mailbox::inbox()][..]));
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod credentials;
pub mod driver;
mod error;
pub mod events;
pub mod factory;
pub mod model;
pub mod policy;
pub mod store;
pub mod task;
pub mod tree;

pub use config::{EngineConfig, EngineConfigBuilder};
pub use credentials::{
    CredentialError, CredentialProvider, CredentialRequest, CredentialResult, KeyringCredentials,
    StaticCredentials,
};
pub use driver::{Connector, Engine, EngineHandle, TransportConnector, wait_for};
pub use error::{Error, Result};
pub use events::EngineEvent;
pub use factory::{ImapTaskFactory, TaskFactory, TestingTaskFactory};
pub use model::{Action, ConnectionId, Model};
pub use policy::NetworkPolicy;
pub use store::{CacheEntry, CacheStore, JsonFileStore, MemoryStore};
pub use task::{Task, TaskContext, TaskError, TaskId, TaskState};
pub use tree::{MailboxTree, TreeNode, TreePath};
