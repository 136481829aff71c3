//! Scheduling: per-connection ordering, dependencies, failure propagation,
//! connection management and the network policy.

#![allow(clippy::unwrap_used)]

mod common;

use common::{Harness, builder, inbox, uid, uids};
use mailtree_core::{
    Action, ConnectionId, EngineEvent, Model, NetworkPolicy, StaticCredentials, TaskError,
    TaskState, TestingTaskFactory,
};
use mailtree_imap::{Flag, FlagOperation, Flags, Mailbox};

fn flagged() -> Flags {
    Flags::from_vec(vec![Flag::Flagged])
}

fn real() -> Harness {
    Harness::new(Model::new(builder().build().unwrap(), StaticCredentials::new("secret")))
}

#[test]
fn requests_run_one_at_a_time_in_request_order() {
    let mut h = Harness::fake(TestingTaskFactory::new());
    let c = h.synced_inbox();

    let store = h
        .model
        .update_flags(&inbox(), uids(&[10]), FlagOperation::Add, flagged());
    let part = h.model.fetch_part(&inbox(), uid(11), "1");
    let expunge = h.model.expunge_mailbox(&inbox());

    assert_eq!(h.sent(), ["y0002 UID STORE 10 +FLAGS (\\Flagged)\r\n"]);
    assert_eq!(h.model.task_state(part), Some(&TaskState::WaitingOnConnection));
    assert_eq!(h.model.task_state(expunge), Some(&TaskState::WaitingOnConnection));

    h.reply(c, "* 1 FETCH (UID 10 FLAGS (\\Seen \\Flagged))\r\ny0002 OK stored\r\n");
    assert_eq!(h.finished(store), Some(TaskState::Completed));
    assert_eq!(h.sent(), ["y0003 UID FETCH 11 BODY.PEEK[1]\r\n"]);

    h.reply(c, "* 2 FETCH (UID 11 BODY[1] {5}\r\nhello)\r\ny0003 OK fetched\r\n");
    assert_eq!(h.finished(part), Some(TaskState::Completed));
    assert_eq!(h.sent(), ["y0004 EXPUNGE\r\n"]);

    h.reply(c, "y0004 OK expunged\r\n");
    assert_eq!(h.finished(expunge), Some(TaskState::Completed));
    assert!(h.sent().is_empty());
}

#[test]
fn unselected_requests_keep_their_place_in_line() {
    let mut h = Harness::fake(TestingTaskFactory::new());
    let c = h.synced_inbox();
    let work = Mailbox::new("Work");

    let first = h
        .model
        .update_flags(&inbox(), uids(&[10]), FlagOperation::Add, flagged());
    let create = h.model.create_mailbox(&work);
    let second = h
        .model
        .update_flags(&inbox(), uids(&[11]), FlagOperation::Add, flagged());
    assert_eq!(h.sent(), ["y0002 UID STORE 10 +FLAGS (\\Flagged)\r\n"]);

    h.reply(c, "y0002 OK stored\r\n");
    assert_eq!(h.finished(first), Some(TaskState::Completed));
    assert_eq!(h.sent(), ["y0003 CREATE Work\r\n"]);
    assert_eq!(h.model.task_state(second), Some(&TaskState::WaitingOnConnection));

    h.reply(c, "y0003 OK created\r\n");
    assert_eq!(h.sent(), ["y0004 LIST \"\" Work\r\n"]);
    h.reply(c, "* LIST (\\HasNoChildren) \"/\" Work\r\ny0004 OK listed\r\n");
    assert_eq!(h.finished(create), Some(TaskState::Completed));
    assert_eq!(h.sent(), ["y0005 UID STORE 11 +FLAGS (\\Flagged)\r\n"]);
}

#[test]
fn mailbox_requests_wait_for_synchronization() {
    let mut h = Harness::fake(TestingTaskFactory::new());
    let obtain = h.model.open_mailbox(&inbox());
    let store = h
        .model
        .update_flags(&inbox(), uids(&[3]), FlagOperation::Add, flagged());
    let c = h.connection();

    assert_eq!(h.sent(), ["y0000 SELECT INBOX\r\n"]);
    assert_eq!(h.model.task_state(store), Some(&TaskState::WaitingOnDependency));

    h.reply(c, "* 0 EXISTS\r\n* OK [UIDVALIDITY 7] ok\r\ny0000 OK [READ-WRITE] done\r\n");
    assert_eq!(h.finished(obtain), Some(TaskState::Completed));
    assert_eq!(h.sent(), ["y0001 UID STORE 3 +FLAGS (\\Flagged)\r\n"]);
    assert_eq!(h.model.task_state(store), Some(&TaskState::Running));
}

#[test]
fn implausible_message_count_fails_the_selection() {
    let mut h = Harness::fake(TestingTaskFactory::new());
    let obtain = h.model.open_mailbox(&inbox());
    let c = h.connection();
    assert_eq!(h.sent(), ["y0000 SELECT INBOX\r\n"]);

    h.reply(c, "* 4294967295 EXISTS\r\ny0000 OK [READ-WRITE] done\r\n");

    assert!(matches!(
        h.finished(obtain),
        Some(TaskState::Failed(TaskError::Protocol(_)))
    ));
    assert!(h.sent().is_empty());
    assert!(h.model.tree().messages(&inbox()).is_none_or(|list| list.is_empty()));
}

#[test]
fn failed_selection_cascades_to_dependents() {
    let mut h = Harness::fake(TestingTaskFactory::new());
    let obtain = h.model.open_mailbox(&inbox());
    let fetch = h.model.fetch_metadata(&inbox(), uids(&[1, 2]));
    let c = h.connection();
    h.sent();

    h.reply(c, "y0000 NO no such mailbox\r\n");

    assert!(matches!(
        h.finished(obtain),
        Some(TaskState::Failed(TaskError::CommandFailed { command: "SELECT", .. }))
    ));
    match h.finished(fetch) {
        Some(TaskState::Failed(TaskError::DependencyFailed { parent, cause })) => {
            assert_eq!(parent, obtain);
            assert!(matches!(*cause, TaskError::CommandFailed { .. }));
        }
        other => panic!("unexpected {other:?}"),
    }
    // the connection itself is fine
    assert_eq!(h.model.connections().len(), 1);
    assert!(h.sent().is_empty());
}

#[test]
fn aborted_task_response_is_discarded() {
    let mut h = Harness::fake(TestingTaskFactory::new());
    let c = h.synced_inbox();

    let store = h
        .model
        .update_flags(&inbox(), uids(&[10]), FlagOperation::Add, flagged());
    let expunge = h.model.expunge_mailbox(&inbox());
    assert_eq!(h.sent().len(), 1);

    assert!(h.model.abort(store));
    assert!(!h.model.abort(store));
    assert_eq!(h.finished(store), Some(TaskState::Aborted));
    // the aborted command still occupies the connection
    assert!(h.sent().is_empty());

    h.reply(c, "y0002 OK stored\r\n");
    let flags = &h.model.tree().message(&inbox(), uid(10)).unwrap().flags;
    assert!(!flags.is_flagged());
    assert_eq!(h.sent(), ["y0003 EXPUNGE\r\n"]);
    assert_eq!(h.model.task_state(expunge), Some(&TaskState::Running));
}

#[test]
fn queued_task_can_be_aborted_before_it_starts() {
    let mut h = Harness::fake(TestingTaskFactory::new());
    let c = h.synced_inbox();

    let first = h.model.expunge_mailbox(&inbox());
    let second = h
        .model
        .update_flags(&inbox(), uids(&[11]), FlagOperation::Add, flagged());
    assert_eq!(h.sent(), ["y0002 EXPUNGE\r\n"]);
    assert!(h.model.abort(second));

    h.reply(c, "y0002 OK expunged\r\n");
    assert_eq!(h.finished(first), Some(TaskState::Completed));
    assert_eq!(h.finished(second), Some(TaskState::Aborted));
    assert!(h.sent().is_empty());
}

#[test]
fn connection_loss_fails_pending_tasks_and_keeps_the_cache() {
    let mut h = Harness::fake(TestingTaskFactory::new());
    let c = h.synced_inbox();

    let store = h
        .model
        .update_flags(&inbox(), uids(&[10]), FlagOperation::Add, Flags::from_vec(vec![Flag::Deleted]));
    let part = h.model.fetch_part(&inbox(), uid(11), "1");
    let expunge = h.model.expunge_mailbox(&inbox());
    assert_eq!(h.sent().len(), 1);

    // echo arrives, completion never does
    h.reply(c, "* 1 FETCH (UID 10 FLAGS (\\Seen \\Deleted))\r\n");
    h.model.handle_disconnected(c, "connection reset");
    h.collect();

    for id in [store, part, expunge] {
        assert!(
            matches!(h.finished(id), Some(TaskState::Failed(TaskError::Connection(_)))),
            "{id} did not fail"
        );
    }
    let errors: Vec<_> = h
        .events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::ConnectionError { connection, message } => Some((*connection, message.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(errors, [(c, "connection reset")]);
    assert_eq!(h.model.poll_action(), Some(Action::Close { connection: c }));
    assert!(h.model.connections().is_empty());

    let list = h.model.tree().messages(&inbox()).unwrap();
    assert_eq!(list.uids(), [uid(10), uid(11)]);
    assert!(!list.by_uid(uid(10)).unwrap().flags.is_deleted());

    // the next request opens a fresh connection and selects again
    h.model.fetch_metadata(&inbox(), uids(&[11]));
    assert_eq!(h.sent_on(), [(ConnectionId(1), "y0000 SELECT INBOX\r\n".to_string())]);
}

#[test]
fn mailbox_takes_over_the_oldest_connection_at_the_limit() {
    let mut h = Harness::fake(TestingTaskFactory::new());
    let work = Mailbox::new("Work");
    let archive = Mailbox::new("Archive");

    h.model.open_mailbox(&inbox());
    assert_eq!(h.sent_on(), [(ConnectionId(0), "y0000 SELECT INBOX\r\n".to_string())]);
    h.reply(ConnectionId(0), "* 0 EXISTS\r\ny0000 OK done\r\n");

    h.model.open_mailbox(&work);
    assert_eq!(h.sent_on(), [(ConnectionId(1), "y0000 SELECT Work\r\n".to_string())]);
    h.reply(ConnectionId(1), "* 0 EXISTS\r\ny0000 OK done\r\n");
    h.take_events();

    h.model.open_mailbox(&archive);
    assert_eq!(h.model.connections().len(), 2);
    assert_eq!(h.sent_on(), [(ConnectionId(0), "y0001 SELECT Archive\r\n".to_string())]);

    let retired = h.events.iter().any(|e| {
        matches!(
            e,
            EngineEvent::TaskFinished { name: "KeepMailboxOpen", state: TaskState::Completed, .. }
        )
    });
    assert!(retired, "INBOX owner was not retired: {:?}", h.events);

    // INBOX is no longer kept open; asking for it takes over again
    h.reply(ConnectionId(0), "* 0 EXISTS\r\ny0001 OK done\r\n");
    h.model.fetch_metadata(&inbox(), uids(&[1]));
    assert_eq!(h.sent_on(), [(ConnectionId(0), "y0002 SELECT INBOX\r\n".to_string())]);
}

#[test]
fn offline_requests_fail_without_touching_the_network() {
    let config = builder().policy(NetworkPolicy::Offline).build().unwrap();
    let mut h = Harness::new(Model::new(config, StaticCredentials::new("secret")));

    let list = h.model.list_child_mailboxes(None);
    let fetch = h.model.fetch_metadata(&inbox(), uids(&[1]));

    for id in [list, fetch] {
        match h.finished(id) {
            Some(TaskState::Failed(error @ TaskError::DependencyFailed { .. })) => {
                assert_eq!(*error.root_cause(), TaskError::Offline);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
    assert!(h.model.poll_action().is_none());
    assert!(h.model.connections().is_empty());
    assert!(h.sent().is_empty());
}

#[test]
fn going_offline_closes_connections_quietly() {
    let mut h = Harness::fake(TestingTaskFactory::new());
    let c = h.synced_inbox();

    h.model.set_network_policy(NetworkPolicy::Offline);
    h.collect();

    assert!(h.events.contains(&EngineEvent::PolicyChanged {
        from: NetworkPolicy::Online,
        to: NetworkPolicy::Offline,
    }));
    assert!(!h.events.iter().any(|e| matches!(e, EngineEvent::ConnectionError { .. })));
    assert_eq!(h.model.poll_action(), Some(Action::Close { connection: c }));
    assert_eq!(h.model.tree().messages(&inbox()).unwrap().len(), 2);

    let fetch = h.model.fetch_metadata(&inbox(), uids(&[10]));
    assert!(matches!(h.finished(fetch), Some(TaskState::Failed(_))));

    h.model.set_network_policy(NetworkPolicy::Online);
    h.model.fetch_metadata(&inbox(), uids(&[10]));
    assert_eq!(h.sent(), ["y0000 SELECT INBOX\r\n"]);
}

#[test]
fn reconnect_all_replaces_connections() {
    let mut h = Harness::fake(TestingTaskFactory::new());
    let c = h.synced_inbox();

    h.model.reconnect_all();
    assert_eq!(h.model.poll_action(), Some(Action::Close { connection: c }));
    assert!(h.model.connections().is_empty());

    h.model.number_of_messages(&inbox());
    assert_eq!(
        h.sent_on(),
        [(
            ConnectionId(1),
            "y0000 STATUS INBOX (MESSAGES RECENT UNSEEN)\r\n".to_string()
        )]
    );
}

#[test]
fn rejected_login_asks_for_credentials_again() {
    let mut h = real();
    let list = h.model.list_child_mailboxes(None);

    let c = match h.model.poll_action() {
        Some(Action::Connect { connection, .. }) => connection,
        other => panic!("expected connect, got {other:?}"),
    };
    h.model.handle_connected(c);
    h.reply(c, "* OK [CAPABILITY IMAP4rev1] ready\r\n");
    assert_eq!(h.sent(), ["y0000 LOGIN alice secret\r\n"]);

    h.reply(c, "y0000 NO [AUTHENTICATIONFAILED] invalid credentials\r\n");
    assert_eq!(h.sent(), ["y0001 LOGIN alice secret\r\n"]);

    h.reply(c, "y0001 OK logged in\r\n");
    assert_eq!(h.sent(), ["y0002 LIST \"\" \"%\"\r\n"]);

    h.reply(
        c,
        "* LIST (\\HasNoChildren) \"/\" INBOX\r\n* LIST (\\HasChildren) \"/\" Work\r\ny0002 OK listed\r\n",
    );
    assert_eq!(h.finished(list), Some(TaskState::Completed));
    assert_eq!(
        h.model.tree().children(None).unwrap(),
        [inbox(), Mailbox::new("Work")]
    );

    let attempts: Vec<u32> = h
        .events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::CredentialsRequested { username, attempt } => {
                assert_eq!(username, "alice");
                Some(*attempt)
            }
            _ => None,
        })
        .collect();
    assert_eq!(attempts, [1, 2]);
}

#[test]
fn login_gives_up_after_the_configured_attempts() {
    let config = builder().login_attempts(1).build().unwrap();
    let mut h = Harness::new(Model::new(config, StaticCredentials::new("wrong")));
    let list = h.model.list_child_mailboxes(None);

    let Some(Action::Connect { connection: c, .. }) = h.model.poll_action() else {
        panic!("expected connect");
    };
    h.model.handle_connected(c);
    h.reply(c, "* OK ready\r\n");
    assert_eq!(h.sent(), ["y0000 LOGIN alice wrong\r\n"]);
    h.reply(c, "y0000 NO invalid credentials\r\n");

    let opener = h.events.iter().find_map(|e| match e {
        EngineEvent::TaskFinished { name: "OpenConnection", state, .. } => Some(state.clone()),
        _ => None,
    });
    assert_eq!(
        opener,
        Some(TaskState::Failed(TaskError::Authentication(
            "invalid credentials".to_string()
        )))
    );
    assert!(matches!(
        h.finished(list),
        Some(TaskState::Failed(TaskError::DependencyFailed { .. }))
    ));
    assert!(h.events.iter().any(|e| matches!(e, EngineEvent::ConnectionError { .. })));
    assert_eq!(h.model.poll_action(), Some(Action::Close { connection: c }));
    assert!(h.sent().is_empty());
}

#[test]
fn refused_transport_fails_the_request() {
    let mut h = real();
    let status = h.model.number_of_messages(&inbox());
    let Some(Action::Connect { connection: c, .. }) = h.model.poll_action() else {
        panic!("expected connect");
    };

    h.model.handle_connect_failed(c, "connection refused");
    match h.finished(status) {
        Some(TaskState::Failed(error)) => {
            assert_eq!(
                *error.root_cause(),
                TaskError::Connection("connection refused".to_string())
            );
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(h.model.connections().is_empty());
}

#[test]
fn server_alerts_are_published() {
    let mut h = Harness::fake(TestingTaskFactory::new());
    let c = h.synced_inbox();

    h.reply(c, "* OK [ALERT] maintenance at midnight\r\n");
    assert!(h.events.contains(&EngineEvent::Alert {
        connection: c,
        text: "maintenance at midnight".to_string(),
    }));
}

#[test]
fn finished_tasks_are_discarded() {
    let mut h = Harness::fake(TestingTaskFactory::new());
    let c = h.synced_inbox();
    // only the mailbox owner is left
    assert_eq!(h.model.task_count(), 1);

    let expunge = h.model.expunge_mailbox(&inbox());
    h.sent();
    h.reply(c, "y0002 OK done\r\n");
    assert_eq!(h.finished(expunge), Some(TaskState::Completed));
    assert_eq!(h.model.task_state(expunge), None);
    assert_eq!(h.model.task_count(), 1);
}
