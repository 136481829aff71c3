//! Wire-level tests: the tagged-completion table, literal handling and the
//! sans-I/O connection driven over a scripted stream.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use mailtree_imap::parser::FetchItem;
use mailtree_imap::{
    Command, Connection, ConnectionEvent, ConnectionState, Mailbox, MessageSet, FetchAttribute,
    Response, ResponseCode, ResponseParser, Status, UntaggedResponse,
};

fn tagged(line: &str) -> (String, Status, ResponseCode, Vec<String>, String) {
    match ResponseParser::parse(line.as_bytes()).unwrap() {
        Response::Tagged(t) => (t.tag.as_str().to_string(), t.status, t.code, t.args, t.text),
        other => panic!("expected tagged response, got {other:?}"),
    }
}

#[test]
fn tagged_completion_table() {
    let cases: &[(&str, &str, Status, ResponseCode, &[&str], &str)] = &[
        ("y01 OK Everything works, man!\r\n", "y01", Status::Ok, ResponseCode::None, &[], "Everything works, man!"),
        ("12345 NO Nope, something is broken\r\n", "12345", Status::No, ResponseCode::None, &[], "Nope, something is broken"),
        ("ahoj BaD WTF?\r\n", "ahoj", Status::Bad, ResponseCode::None, &[], "WTF?"),
        ("y01 oK [ALERT] Server on fire\r\n", "y01", Status::Ok, ResponseCode::Alert, &[], "Server on fire"),
        ("1337 no [ALeRT] Server on fire\r\n", "1337", Status::No, ResponseCode::Alert, &[], "Server on fire"),
        (
            "y01 OK [CAPaBILITY blurdybloop IMAP4rev1 WTF] Capabilities updated\r\n",
            "y01", Status::Ok, ResponseCode::Capability, &["blurdybloop", "IMAP4rev1", "WTF"], "Capabilities updated",
        ),
        ("y01 OK [PArSE] Parse error. What do you feed me with?\r\n", "y01", Status::Ok, ResponseCode::Parse, &[], "Parse error. What do you feed me with?"),
        ("y01 OK [PERMANENTfLAGS] Behold, the flags!\r\n", "y01", Status::Ok, ResponseCode::PermanentFlags, &[], "Behold, the flags!"),
        (
            "y01 OK [PErMANENTFLAGS \\Foo \\Bar SmrT] Behold, the flags!\r\n",
            "y01", Status::Ok, ResponseCode::PermanentFlags, &["\\Foo", "\\Bar", "SmrT"], "Behold, the flags!",
        ),
        ("y01 OK [ReAD-ONLY] No writing for you\r\n", "y01", Status::Ok, ResponseCode::ReadOnly, &[], "No writing for you"),
        ("y01 OK [REaD-WRITE] Write!!!\r\n", "y01", Status::Ok, ResponseCode::ReadWrite, &[], "Write!!!"),
        ("y01 OK [TryCreate] ...would be better :)\r\n", "y01", Status::Ok, ResponseCode::TryCreate, &[], "...would be better :)"),
        ("y01 OK [uidNext 5] Next UID\r\n", "y01", Status::Ok, ResponseCode::UidNext, &["5"], "Next UID"),
        ("y01 OK [UIDVALIDITY 17] UIDs valid\r\n", "y01", Status::Ok, ResponseCode::UidValidity, &["17"], "UIDs valid"),
        ("y01 OK [unSeen 666] I need my glasses\r\n", "y01", Status::Ok, ResponseCode::Unseen, &["666"], "I need my glasses"),
    ];

    for (line, tag, status, code, args, text) in cases {
        let parsed = tagged(line);
        assert_eq!(parsed.0, *tag, "tag of {line:?}");
        assert_eq!(parsed.1, *status, "status of {line:?}");
        assert_eq!(parsed.2, *code, "code of {line:?}");
        assert_eq!(parsed.3, args.iter().map(ToString::to_string).collect::<Vec<_>>(), "args of {line:?}");
        assert_eq!(parsed.4, *text, "text of {line:?}");
    }
}

#[test]
fn unknown_code_keeps_bracket_in_text() {
    let (_, status, code, args, text) = tagged("a1 OK [X-FROB 12] frobbed\r\n");
    assert_eq!(status, Status::Ok);
    assert_eq!(code, ResponseCode::None);
    assert!(args.is_empty());
    assert_eq!(text, "[X-FROB 12] frobbed");
}

#[test]
fn parenthesized_permanent_flags() {
    let (_, _, code, args, _) = tagged("a1 OK [PERMANENTFLAGS (\\Seen \\*)] Limited\r\n");
    assert_eq!(code, ResponseCode::PermanentFlags);
    assert_eq!(args, vec!["\\Seen", "\\*"]);
}

#[test]
fn literal_split_across_reads() {
    let mut conn = Connection::new();
    conn.handle_connected();
    conn.handle_input(b"* OK hi\r\n");

    conn.handle_input(b"* 1 FETCH (UID 7 BODY[1] {11}\r\nhello ");
    conn.handle_input(b"world)\r\n* 2 EXISTS\r\n");

    let responses: Vec<_> = std::iter::from_fn(|| conn.poll_event())
        .filter_map(|e| match e {
            ConnectionEvent::Response(Response::Untagged(u)) => Some(u),
            _ => None,
        })
        .collect();

    let UntaggedResponse::Fetch { items, .. } = &responses[1] else {
        panic!("expected FETCH, got {:?}", responses[1]);
    };
    assert!(items.iter().any(|i| matches!(
        i,
        FetchItem::Body { section: Some(s), data: Some(d), .. } if s == "1" && d == b"hello world"
    )));
    assert_eq!(responses[2], UntaggedResponse::Exists(2));
}

#[test]
fn garbage_line_is_skipped() {
    let mut conn = Connection::new();
    conn.handle_connected();
    conn.handle_input(b"* OK hi\r\n)(garbage\r\n* 5 EXISTS\r\n");

    let events: Vec<_> = std::iter::from_fn(|| conn.poll_event()).collect();
    assert!(events.iter().any(|e| matches!(e, ConnectionEvent::ParseError { .. })));
    assert!(events.contains(&ConnectionEvent::Response(Response::Untagged(
        UntaggedResponse::Exists(5)
    ))));
    assert_eq!(conn.state(), ConnectionState::Connected);
}

/// Pumps a scripted stream through a [`Connection`] until `done` holds.
async fn pump<S>(stream: &mut S, conn: &mut Connection, done: impl Fn(&Connection) -> bool)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let mut buf = [0u8; 256];
    while !done(conn) {
        while let Some(transmit) = conn.poll_transmit() {
            stream.write_all(&transmit.data).await.unwrap();
        }
        let n = stream.read(&mut buf).await.unwrap();
        if n == 0 {
            conn.handle_disconnected("eof");
            break;
        }
        conn.handle_input(&buf[..n]);
    }
}

#[tokio::test]
async fn scripted_session() {
    let mut stream = tokio_test::io::Builder::new()
        .read(b"* OK [CAPABILITY IMAP4rev1 MOVE] ready\r\n")
        .write(b"y0000 LOGIN joe secret\r\n")
        .read(b"y0000 OK [CAPABILITY IMAP4rev1 MOVE UIDPLUS] welcome\r\n")
        .write(b"y0001 EXAMINE INBOX\r\n")
        .read(b"* 3 EXISTS\r\n* OK [UIDVALIDITY 42] ok\r\ny0001 OK [READ-ONLY] done\r\n")
        .write(b"y0002 UID FETCH 1:* (UID FLAGS)\r\n")
        .read(b"* 1 FETCH (UID 4 FLAGS (\\Seen))\r\ny0002 OK fetched\r\n")
        .build();

    let mut conn = Connection::new();
    conn.handle_connected();
    pump(&mut stream, &mut conn, Connection::is_greeted).await;

    conn.send(&Command::Login {
        username: "joe".to_string(),
        password: "secret".to_string(),
    })
    .unwrap();
    pump(&mut stream, &mut conn, |c| c.in_flight() == 0).await;
    assert_eq!(conn.state(), ConnectionState::Authenticated);
    assert!(conn.has_capability("uidplus"));

    conn.send(&Command::Examine {
        mailbox: Mailbox::inbox(),
    })
    .unwrap();
    pump(&mut stream, &mut conn, |c| c.in_flight() == 0).await;
    assert_eq!(conn.state(), ConnectionState::Selected);

    conn.send(&Command::Fetch {
        set: MessageSet::Range(mailtree_imap::SeqRange::all()),
        items: vec![FetchAttribute::Uid, FetchAttribute::Flags],
        uid: true,
    })
    .unwrap();
    pump(&mut stream, &mut conn, |c| c.in_flight() == 0).await;

    let lines: Vec<_> = std::iter::from_fn(|| conn.poll_event())
        .filter_map(|e| match e {
            ConnectionEvent::LineSent(line) => Some(line),
            _ => None,
        })
        .collect();
    assert_eq!(lines[0], "y0000 LOGIN [redacted]");
}

proptest! {
    #[test]
    fn status_and_code_ignore_case(
        status in prop::sample::select(vec!["ok", "no", "bad"]),
        code in prop::sample::select(vec!["alert", "read-only", "read-write", "trycreate", "parse"]),
        mask in any::<u32>(),
    ) {
        let scramble = |s: &str| -> String {
            s.chars()
                .enumerate()
                .map(|(i, c)| if mask >> (i % 32) & 1 == 1 { c.to_ascii_uppercase() } else { c })
                .collect()
        };
        let line = format!("t1 {} [{}] text\r\n", scramble(status), scramble(code));
        let (_, parsed_status, parsed_code, args, text) = tagged(&line);

        prop_assert_eq!(parsed_status.as_str(), status.to_ascii_uppercase());
        let upper_code = code.to_ascii_uppercase();
        prop_assert_eq!(parsed_code.keyword(), Some(upper_code.as_str()));
        prop_assert!(args.is_empty());
        prop_assert_eq!(text, "text");
    }

    #[test]
    fn numeric_codes_keep_their_argument(
        code in prop::sample::select(vec!["UIDNEXT", "UIDVALIDITY", "UNSEEN"]),
        n in 1u32..,
    ) {
        let (_, _, parsed, args, _) = tagged(&format!("t1 OK [{code} {n}] x\r\n"));
        prop_assert_eq!(parsed.keyword(), Some(code));
        prop_assert_eq!(args, vec![n.to_string()]);
    }
}
