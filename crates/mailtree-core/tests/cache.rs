//! The mailbox tree as seen from requests: synchronization, UIDVALIDITY
//! epochs, unsolicited updates, persistence and flag changes.

#![allow(clippy::unwrap_used)]

mod common;

use common::{Harness, builder, inbox, uid, uids};
use mailtree_core::tree::{MailboxInfo, MessageList, MessageNode};
use mailtree_core::{
    Action, CacheEntry, CacheStore, EngineEvent, MemoryStore, Model, NetworkPolicy,
    StaticCredentials, TaskState, TestingTaskFactory, TreePath,
};
use mailtree_imap::{Flag, FlagOperation, Flags, Mailbox, UidValidity};
use proptest::prelude::*;

fn snapshot(validity: u32, messages: &[(u32, Option<u32>)]) -> MessageList {
    MessageList {
        uid_validity: UidValidity::new(validity),
        messages: messages
            .iter()
            .map(|&(n, size)| MessageNode {
                size,
                ..MessageNode::with_uid(uid(n))
            })
            .collect(),
        ..MessageList::default()
    }
}

fn with_store(store: MemoryStore) -> Harness {
    let config = builder().build().unwrap();
    let model = Model::new(config, StaticCredentials::new("secret"))
        .with_factory(TestingTaskFactory::new())
        .with_store(store);
    Harness::new(model)
}

fn changed(h: &Harness, path: &TreePath) -> bool {
    h.events.contains(&EngineEvent::CacheChanged(path.clone()))
}

#[test]
fn synchronization_fills_the_message_list() {
    let mut h = Harness::fake(TestingTaskFactory::new());
    h.synced_inbox();

    let list = h.model.tree().messages(&inbox()).unwrap();
    assert!(list.synchronized);
    assert_eq!(list.uid_validity, UidValidity::new(7));
    assert_eq!(list.uid_next, Some(uid(12)));
    assert_eq!(list.uids(), [uid(10), uid(11)]);
    assert!(list.by_uid(uid(10)).unwrap().flags.is_seen());
    assert!(!list.by_uid(uid(11)).unwrap().flags.is_seen());
}

#[test]
fn selection_keeps_the_mailbox_flag_sets() {
    let mut h = Harness::fake(TestingTaskFactory::new());
    let obtain = h.model.open_mailbox(&inbox());
    let c = h.connection();
    h.sent();

    h.reply(
        c,
        "* FLAGS (\\Answered \\Seen $Work)\r\n\
         * OK [PERMANENTFLAGS (\\Seen \\*)] limited\r\n\
         * 0 EXISTS\r\n* OK [UIDVALIDITY 3] ok\r\ny0000 OK [READ-WRITE] done\r\n",
    );
    assert_eq!(h.finished(obtain), Some(TaskState::Completed));

    let list = h.model.tree().messages(&inbox()).unwrap();
    assert_eq!(
        list.flags,
        Some(Flags::from_vec(vec![
            Flag::Answered,
            Flag::Seen,
            Flag::Keyword("$Work".to_string()),
        ]))
    );
    assert_eq!(
        list.permanent_flags,
        Some(Flags::from_vec(vec![Flag::Seen, Flag::Keyword("\\*".to_string())]))
    );

    h.reply(c, "* FLAGS (\\Seen)\r\n");
    let list = h.model.tree().messages(&inbox()).unwrap();
    assert_eq!(list.flags, Some(Flags::from_vec(vec![Flag::Seen])));
    assert!(list.permanent_flags.is_some());
}

#[test]
fn metadata_fetch_updates_messages_by_uid() {
    let mut h = Harness::fake(TestingTaskFactory::new());
    let c = h.synced_inbox();

    let fetch = h.model.fetch_metadata(&inbox(), uids(&[10, 11]));
    assert_eq!(
        h.sent(),
        ["y0002 UID FETCH 10:11 (UID FLAGS RFC822.SIZE INTERNALDATE ENVELOPE BODYSTRUCTURE)\r\n"]
    );
    h.reply(
        c,
        "* 1 FETCH (UID 10 RFC822.SIZE 1200)\r\n* 2 FETCH (UID 11 RFC822.SIZE 80)\r\ny0002 OK done\r\n",
    );

    assert_eq!(h.finished(fetch), Some(TaskState::Completed));
    let tree = h.model.tree();
    assert_eq!(tree.message(&inbox(), uid(10)).unwrap().size, Some(1200));
    assert_eq!(tree.message(&inbox(), uid(11)).unwrap().size, Some(80));
    assert!(changed(&h, &TreePath::Message { mailbox: inbox(), uid: uid(10) }));
}

#[test]
fn cache_changes_are_published_before_completion() {
    let mut h = Harness::fake(TestingTaskFactory::new());
    let c = h.synced_inbox();

    let part = h.model.fetch_part(&inbox(), uid(11), "1");
    h.sent();
    h.reply(c, "* 2 FETCH (UID 11 BODY[1] {5}\r\nhello)\r\ny0002 OK fetched\r\n");

    let path = TreePath::Part {
        mailbox: inbox(),
        uid: uid(11),
        part_id: "1".to_string(),
    };
    let changed_at = h
        .events
        .iter()
        .position(|e| *e == EngineEvent::CacheChanged(path.clone()))
        .unwrap();
    let finished_at = h
        .events
        .iter()
        .position(|e| matches!(e, EngineEvent::TaskFinished { id, .. } if *id == part))
        .unwrap();
    assert!(changed_at < finished_at);

    let message = h.model.tree().message(&inbox(), uid(11)).unwrap();
    assert_eq!(message.parts["1"].data, b"hello");

    // a cached part completes without a round trip
    let again = h.model.fetch_part(&inbox(), uid(11), "1");
    assert_eq!(h.finished(again), Some(TaskState::Completed));
    assert!(h.sent().is_empty());
}

#[test]
fn unsolicited_updates_reach_the_tree() {
    let mut h = Harness::fake(TestingTaskFactory::new());
    let c = h.synced_inbox();

    h.reply(c, "* 3 EXISTS\r\n");
    assert_eq!(h.model.tree().messages(&inbox()).unwrap().len(), 3);
    assert_eq!(h.sent(), ["y0002 FETCH 3:* (UID FLAGS)\r\n"]);
    h.reply(c, "* 3 FETCH (UID 12 FLAGS (\\Recent))\r\ny0002 OK done\r\n");
    assert_eq!(
        h.model.tree().messages(&inbox()).unwrap().uids(),
        [uid(10), uid(11), uid(12)]
    );

    h.reply(c, "* 2 FETCH (FLAGS (\\Flagged))\r\n");
    assert!(h.model.tree().message(&inbox(), uid(11)).unwrap().flags.is_flagged());

    h.reply(c, "* 1 EXPUNGE\r\n");
    assert_eq!(
        h.model.tree().messages(&inbox()).unwrap().uids(),
        [uid(11), uid(12)]
    );
}

#[test]
fn arrivals_are_prefetched_when_the_policy_allows() {
    let config = builder().prefetch(true).build().unwrap();
    let model = Model::new(config, StaticCredentials::new("secret"))
        .with_factory(TestingTaskFactory::new());
    let mut h = Harness::new(model);
    let c = h.synced_inbox();

    h.reply(c, "* 3 EXISTS\r\n");
    assert_eq!(h.sent(), ["y0002 FETCH 3:* (UID FLAGS)\r\n"]);
    h.reply(c, "* 3 FETCH (UID 12 FLAGS ())\r\ny0002 OK done\r\n");
    assert_eq!(
        h.sent(),
        ["y0003 FETCH 3:* (UID FLAGS RFC822.SIZE INTERNALDATE ENVELOPE BODYSTRUCTURE)\r\n"]
    );
    h.reply(c, "y0003 OK done\r\n");

    // a metered network skips background work
    h.model.set_network_policy(NetworkPolicy::Expensive);
    h.reply(c, "* 4 EXISTS\r\n");
    assert_eq!(h.sent(), ["y0004 FETCH 4:* (UID FLAGS)\r\n"]);
    h.reply(c, "* 4 FETCH (UID 13 FLAGS ())\r\ny0004 OK done\r\n");
    assert!(h.sent().is_empty());
}

#[test]
fn new_uidvalidity_discards_the_cached_epoch() {
    let mut h = Harness::fake(TestingTaskFactory::new());
    let c = h.synced_inbox();

    h.reply(c, "* OK [UIDVALIDITY 8] new epoch\r\n");
    assert!(h.model.tree().messages(&inbox()).unwrap().is_empty());
    assert!(changed(&h, &TreePath::MessageList(inbox())));
    assert_eq!(h.sent(), ["y0002 SELECT INBOX\r\n"]);

    // requests made meanwhile wait for the new synchronization
    let fetch = h.model.fetch_metadata(&inbox(), uids(&[1]));
    assert_eq!(h.model.task_state(fetch), Some(&TaskState::WaitingOnDependency));

    h.reply(c, "* 1 EXISTS\r\n* OK [UIDVALIDITY 8] ok\r\ny0002 OK [READ-WRITE] done\r\n");
    assert_eq!(h.sent(), ["y0003 UID FETCH 1:* (UID FLAGS)\r\n"]);
    h.reply(c, "* 1 FETCH (UID 1 FLAGS ())\r\ny0003 OK done\r\n");

    let list = h.model.tree().messages(&inbox()).unwrap();
    assert_eq!(list.uid_validity, UidValidity::new(8));
    assert_eq!(list.uids(), [uid(1)]);
    assert!(h.model.tree().message(&inbox(), uid(10)).is_none());
    assert_eq!(h.sent().len(), 1, "queued fetch did not start");
}

#[test]
fn persisted_messages_survive_a_restart_in_the_same_epoch() {
    let mut store = MemoryStore::new();
    store
        .put(
            &TreePath::MessageList(inbox()),
            CacheEntry::Messages(snapshot(7, &[(10, Some(500)), (11, None)])),
        )
        .unwrap();
    let mut h = with_store(store);

    h.model.open_mailbox(&inbox());
    let c = h.connection();
    // served from the snapshot while the server is asked
    assert_eq!(h.model.tree().message(&inbox(), uid(10)).unwrap().size, Some(500));
    assert!(!h.model.tree().messages(&inbox()).unwrap().synchronized);

    h.sent();
    h.reply(c, "* 2 EXISTS\r\n* OK [UIDVALIDITY 7] ok\r\ny0000 OK done\r\n");
    h.sent();
    h.reply(c, "* 1 FETCH (UID 10 FLAGS ())\r\n* 2 FETCH (UID 12 FLAGS ())\r\ny0001 OK done\r\n");

    let list = h.model.tree().messages(&inbox()).unwrap();
    assert_eq!(list.uids(), [uid(10), uid(12)]);
    assert_eq!(list.by_uid(uid(10)).unwrap().size, Some(500));
    assert!(list.synchronized);
}

#[test]
fn persisted_messages_from_another_epoch_are_dropped() {
    let mut store = MemoryStore::new();
    store
        .put(
            &TreePath::MessageList(inbox()),
            CacheEntry::Messages(snapshot(7, &[(10, Some(500))])),
        )
        .unwrap();
    let mut h = with_store(store);

    h.model.open_mailbox(&inbox());
    let c = h.connection();
    h.sent();
    h.reply(c, "* 1 EXISTS\r\n* OK [UIDVALIDITY 9] ok\r\ny0000 OK done\r\n");
    h.sent();
    h.reply(c, "* 1 FETCH (UID 10 FLAGS ())\r\ny0001 OK done\r\n");

    // same UID number, different message
    let message = h.model.tree().message(&inbox(), uid(10)).unwrap();
    assert_eq!(message.size, None);
    assert_eq!(
        h.model.tree().messages(&inbox()).unwrap().uid_validity,
        UidValidity::new(9)
    );
}

#[test]
fn persisted_listing_answers_when_the_server_is_unreachable() {
    let mut store = MemoryStore::new();
    let listed = vec![
        MailboxInfo::named(inbox()),
        MailboxInfo::named(Mailbox::new("Work")),
    ];
    store
        .put(&TreePath::Root, CacheEntry::Children(listed))
        .unwrap();
    let config = builder().build().unwrap();
    let model = Model::new(config, StaticCredentials::new("secret")).with_store(store);
    let mut h = Harness::new(model);

    let list = h.model.list_child_mailboxes(None);
    let Some(Action::Connect { connection, .. }) = h.model.poll_action() else {
        panic!("expected connect");
    };
    h.model.handle_connect_failed(connection, "no route to host");

    assert_eq!(h.finished(list), Some(TaskState::Completed));
    assert_eq!(
        h.model.tree().children(None).unwrap(),
        [inbox(), Mailbox::new("Work")]
    );
    assert!(changed(&h, &TreePath::Root));
}

#[test]
fn persisted_listing_answers_offline() {
    let mut store = MemoryStore::new();
    store
        .put(
            &TreePath::Root,
            CacheEntry::Children(vec![MailboxInfo::named(inbox())]),
        )
        .unwrap();
    let config = builder().policy(NetworkPolicy::Offline).build().unwrap();
    let model = Model::new(config, StaticCredentials::new("secret")).with_store(store);
    let mut h = Harness::new(model);

    let list = h.model.list_child_mailboxes(None);
    assert_eq!(h.finished(list), Some(TaskState::Completed));
    assert_eq!(h.model.tree().children(None).unwrap(), [inbox()]);
    assert!(h.model.poll_action().is_none());
}

#[test]
fn mailboxes_are_created_and_deleted() {
    let factory = TestingTaskFactory::new().with_children(None, vec![MailboxInfo::named(inbox())]);
    let mut h = Harness::fake(factory);
    let work = Mailbox::new("Work");

    let list = h.model.list_child_mailboxes(None);
    assert_eq!(h.finished(list), Some(TaskState::Completed));
    let c = h.connection();

    let create = h.model.create_mailbox(&work);
    assert_eq!(h.sent(), ["y0000 CREATE Work\r\n"]);
    h.reply(c, "y0000 OK created\r\n");
    assert_eq!(h.sent(), ["y0001 LIST \"\" Work\r\n"]);
    h.reply(c, "* LIST (\\HasNoChildren) \"/\" Work\r\ny0001 OK listed\r\n");
    assert_eq!(h.finished(create), Some(TaskState::Completed));
    assert_eq!(h.model.tree().children(None).unwrap(), [inbox(), work.clone()]);
    assert_eq!(h.model.tree().mailbox(&work).unwrap().info.delimiter, Some('/'));

    let delete = h.model.delete_mailbox(&work);
    assert_eq!(h.sent(), ["y0002 DELETE Work\r\n"]);
    h.reply(c, "y0002 OK deleted\r\n");
    assert_eq!(h.finished(delete), Some(TaskState::Completed));
    assert_eq!(h.model.tree().children(None).unwrap(), [inbox()]);
    assert!(h.model.tree().mailbox(&work).is_none());
}

#[test]
fn status_counts_are_stored_without_selecting() {
    let mut h = Harness::fake(TestingTaskFactory::new());
    let count = h.model.number_of_messages(&inbox());
    let c = h.connection();

    assert_eq!(h.sent(), ["y0000 STATUS INBOX (MESSAGES RECENT UNSEEN)\r\n"]);
    h.reply(c, "* STATUS INBOX (MESSAGES 4 RECENT 1 UNSEEN 2)\r\ny0000 OK done\r\n");

    assert_eq!(h.finished(count), Some(TaskState::Completed));
    let counts = h.model.tree().mailbox(&inbox()).unwrap().counts.unwrap();
    assert_eq!((counts.messages, counts.recent, counts.unseen), (4, 1, 2));
}

#[test]
fn move_uses_the_extension_when_available() {
    let mut h = Harness::fake(TestingTaskFactory::new().with_capabilities(["MOVE"]));
    let c = h.synced_inbox();

    let moved = h.model.move_messages(&inbox(), uids(&[10]), &Mailbox::new("Archive"));
    assert_eq!(h.sent(), ["y0002 UID MOVE 10 Archive\r\n"]);
    h.reply(c, "* 1 EXPUNGE\r\ny0002 OK moved\r\n");

    assert_eq!(h.finished(moved), Some(TaskState::Completed));
    assert_eq!(h.model.tree().messages(&inbox()).unwrap().uids(), [uid(11)]);
    assert!(h.sent().is_empty());
}

#[test]
fn move_without_the_extension_copies_and_flags() {
    let mut h = Harness::fake(TestingTaskFactory::new());
    let c = h.synced_inbox();

    let moved = h.model.move_messages(&inbox(), uids(&[10]), &Mailbox::new("Archive"));
    assert_eq!(h.sent(), ["y0002 UID COPY 10 Archive\r\n"]);
    h.reply(c, "y0002 OK copied\r\n");
    assert_eq!(h.finished(moved), Some(TaskState::Completed));

    assert_eq!(h.sent(), ["y0003 UID STORE 10 +FLAGS (\\Deleted)\r\n"]);
    h.reply(c, "* 1 FETCH (FLAGS (\\Seen \\Deleted))\r\ny0003 OK stored\r\n");
    let flags = &h.model.tree().message(&inbox(), uid(10)).unwrap().flags;
    assert!(flags.is_deleted());
    assert!(flags.is_seen());
}

#[test]
fn copy_leaves_the_source_alone() {
    let mut h = Harness::fake(TestingTaskFactory::new().with_capabilities(["MOVE"]));
    let c = h.synced_inbox();

    let copied = h.model.copy_messages(&inbox(), uids(&[10, 11]), &Mailbox::new("Archive"));
    assert_eq!(h.sent(), ["y0002 UID COPY 10:11 Archive\r\n"]);
    h.reply(c, "y0002 OK copied\r\n");

    assert_eq!(h.finished(copied), Some(TaskState::Completed));
    assert_eq!(h.model.tree().messages(&inbox()).unwrap().len(), 2);
    assert!(h.sent().is_empty());
}

#[test]
fn expunge_removes_deleted_messages() {
    let mut h = Harness::fake(TestingTaskFactory::new());
    let c = h.synced_inbox();

    let expunge = h.model.expunge_mailbox(&inbox());
    assert_eq!(h.sent(), ["y0002 EXPUNGE\r\n"]);
    h.reply(c, "* 2 EXPUNGE\r\ny0002 OK done\r\n");

    assert_eq!(h.finished(expunge), Some(TaskState::Completed));
    assert_eq!(h.model.tree().messages(&inbox()).unwrap().uids(), [uid(10)]);
}

#[test]
fn fetch_during_expunge_follows_the_removal() {
    let mut h = Harness::fake(TestingTaskFactory::new());
    let c = h.synced_inbox();

    let expunge = h.model.expunge_mailbox(&inbox());
    assert_eq!(h.sent(), ["y0002 EXPUNGE\r\n"]);
    h.reply(c, "* 1 EXPUNGE\r\n* 1 FETCH (FLAGS (\\Flagged))\r\n");
    assert_eq!(h.model.tree().messages(&inbox()).unwrap().len(), 2);

    h.reply(c, "y0002 OK done\r\n");
    assert_eq!(h.finished(expunge), Some(TaskState::Completed));
    assert_eq!(h.model.tree().messages(&inbox()).unwrap().uids(), [uid(11)]);
    assert!(h.model.tree().message(&inbox(), uid(11)).unwrap().flags.is_flagged());
}

const FLAG_NAMES: &[&str] = &["\\Seen", "\\Answered", "\\Flagged", "\\Draft", "$Work"];

fn render(flags: &Flags) -> String {
    flags.iter().map(Flag::as_str).collect::<Vec<_>>().join(" ")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn repeated_flag_update_is_idempotent(
        operation in prop::sample::select(vec![
            FlagOperation::Add,
            FlagOperation::Remove,
            FlagOperation::Replace,
        ]),
        names in prop::sample::subsequence(FLAG_NAMES.to_vec(), 0..=FLAG_NAMES.len()),
        echo in any::<bool>(),
    ) {
        let flags: Flags = names.iter().map(|n| Flag::parse(n)).collect();
        let mut h = Harness::fake(TestingTaskFactory::new());
        let c = h.synced_inbox();
        let mut server = Flags::from_vec(vec![Flag::Seen]);

        let mut after = Vec::new();
        for tag in ["y0002", "y0003"] {
            h.model.update_flags(&inbox(), uids(&[10]), operation, flags.clone());
            prop_assert_eq!(h.sent().len(), 1);
            server.apply(operation, &flags);
            let response = if echo {
                format!("* 1 FETCH (UID 10 FLAGS ({}))\r\n{tag} OK stored\r\n", render(&server))
            } else {
                format!("{tag} OK stored\r\n")
            };
            h.take_events();
            h.reply(c, &response);
            after.push(h.model.tree().message(&inbox(), uid(10)).unwrap().flags.clone());
        }

        prop_assert_eq!(&after[0], &server);
        prop_assert_eq!(&after[1], &after[0]);
        // the second application changed nothing
        let path = TreePath::Message { mailbox: inbox(), uid: uid(10) };
        prop_assert!(!changed(&h, &path));
    }
}
