//! Tasks that provide a connection for their dependents.

use mailtree_imap::parser::{TaggedResponse, UntaggedResponse};
use mailtree_imap::{Command, Status};
use tracing::{debug, info, warn};

use super::{Step, Task, TaskContext, TaskError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Greeting,
    Login,
    Capability,
}

/// Brings a pooled connection from nothing to Authenticated.
///
/// Waits for the greeting, logs in with a password from the credential
/// provider and asks for capabilities if the server has not volunteered them.
/// A rejected LOGIN asks the provider again, up to
/// [`EngineConfig::login_attempts`](crate::EngineConfig::login_attempts).
#[derive(Debug)]
pub struct OpenConnectionTask {
    phase: Phase,
    attempt: u32,
}

impl OpenConnectionTask {
    /// Creates the task.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: Phase::Greeting,
            attempt: 0,
        }
    }

    fn login(&mut self, ctx: &mut TaskContext<'_>, rejection: Option<String>) -> Step {
        self.attempt += 1;
        let password = match ctx.request_password(self.attempt, rejection) {
            Ok(Some(password)) => password,
            Ok(None) => {
                return Step::Fail(TaskError::Authentication(
                    "no password available".to_string(),
                ));
            }
            Err(e) => return Step::Fail(e),
        };
        let login = Command::Login {
            username: ctx.config().username.clone(),
            password,
        };
        self.phase = Phase::Login;
        match ctx.send(&login) {
            Ok(_) => Step::Continue,
            Err(e) => Step::Fail(e),
        }
    }

    fn authenticated(&mut self, ctx: &mut TaskContext<'_>) -> Step {
        let known = ctx
            .connection()
            .is_some_and(|c| !c.capabilities().is_empty());
        if known {
            return Step::Done;
        }
        self.phase = Phase::Capability;
        match ctx.send(&Command::Capability) {
            Ok(_) => Step::Continue,
            Err(e) => Step::Fail(e),
        }
    }
}

impl Default for OpenConnectionTask {
    fn default() -> Self {
        Self::new()
    }
}

impl Task for OpenConnectionTask {
    fn name(&self) -> &'static str {
        "OpenConnection"
    }

    fn start(&mut self, ctx: &mut TaskContext<'_>) -> Step {
        if let Some(connection) = ctx.connection_id() {
            info!(%connection, "opening connection");
        }
        ctx.connect();
        Step::Continue
    }

    fn handle_untagged(
        &mut self,
        ctx: &mut TaskContext<'_>,
        response: &UntaggedResponse,
    ) -> Option<Step> {
        match (self.phase, response) {
            (Phase::Greeting, UntaggedResponse::State(greeting)) => Some(match greeting.status {
                Status::Ok => self.login(ctx, None),
                Status::PreAuth => self.authenticated(ctx),
                Status::Bye => Step::Fail(TaskError::Connection(format!(
                    "server refused connection: {}",
                    greeting.text
                ))),
                Status::No | Status::Bad => Step::Fail(TaskError::Protocol(format!(
                    "unexpected greeting: {} {}",
                    greeting.status, greeting.text
                ))),
            }),
            (_, UntaggedResponse::Capability(_)) => Some(Step::Continue),
            _ => None,
        }
    }

    fn handle_tagged(&mut self, ctx: &mut TaskContext<'_>, response: &TaggedResponse) -> Step {
        match self.phase {
            Phase::Login if response.status.is_ok() => self.authenticated(ctx),
            Phase::Login if self.attempt < ctx.config().login_attempts => {
                warn!(attempt = self.attempt, "login rejected: {}", response.text);
                self.login(ctx, Some(response.text.clone()))
            }
            Phase::Login => Step::Fail(TaskError::Authentication(response.text.clone())),
            Phase::Capability => Step::from_completion("CAPABILITY", response),
            Phase::Greeting => Step::Fail(TaskError::Protocol(
                "tagged response before greeting".to_string(),
            )),
        }
    }
}

/// Completes as soon as its connection is free.
///
/// Dependents inherit the connection, so this is how a task that does not
/// care which mailbox is selected gets in line on a pooled connection.
#[derive(Debug, Default)]
pub struct GetAnyConnectionTask;

impl GetAnyConnectionTask {
    /// Creates the task.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Task for GetAnyConnectionTask {
    fn name(&self) -> &'static str {
        "GetAnyConnection"
    }

    fn start(&mut self, ctx: &mut TaskContext<'_>) -> Step {
        if let Some(connection) = ctx.connection_id() {
            debug!(%connection, "connection available");
        }
        Step::Done
    }

    fn handle_tagged(&mut self, _ctx: &mut TaskContext<'_>, _response: &TaggedResponse) -> Step {
        Step::Done
    }
}

/// Stands in for a connection while the policy forbids network access.
///
/// Fails with [`TaskError::Offline`] on start so every dependent cascades
/// (or recovers from the persisted cache).
#[derive(Debug, Default)]
pub struct OfflineConnectionTask;

impl OfflineConnectionTask {
    /// Creates the task.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Task for OfflineConnectionTask {
    fn name(&self) -> &'static str {
        "OfflineConnection"
    }

    fn needs_connection(&self) -> bool {
        false
    }

    fn start(&mut self, _ctx: &mut TaskContext<'_>) -> Step {
        Step::Fail(TaskError::Offline)
    }

    fn handle_tagged(&mut self, _ctx: &mut TaskContext<'_>, _response: &TaggedResponse) -> Step {
        Step::Fail(TaskError::Offline)
    }
}
