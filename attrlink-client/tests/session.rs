//! Session tests against a mock host on a loopback socket
//!
//! The mock host speaks the real wire format through its own framed
//! `PairCodec`, so these tests cover the protocol end to end: handshake,
//! snapshot shape, batch application, tolerance for unknown names, the
//! fatal paths, and the full worker scenario.

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;

use attrlink_client::{Plugin, SessionState};
use attrlink_protocol::{Pair, PairCodec};
use attrlink_utils::AttrlinkError;

type HostLink = Framed<TcpStream, PairCodec>;

/// Decoded snapshot: attribute name -> ordered (field, value) list
type Snapshot = Vec<(String, Vec<(String, String)>)>;

/// Accept the plugin's connection while it dials us
async fn connect(plugin: &mut Plugin, uid: &str) -> HostLink {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let (started, host) = tokio::join!(plugin.start(uid, &addr), async {
        let (stream, _) = listener.accept().await.unwrap();
        Framed::new(stream, PairCodec::new())
    });
    started.unwrap();
    host
}

async fn recv(host: &mut HostLink) -> Pair {
    host.next().await.expect("stream ended").expect("codec error")
}

async fn recv_snapshot(host: &mut HostLink) -> Snapshot {
    let header = recv(host).await;
    assert_eq!(header.name_text(), "attrs");
    let count = header.value_as_count().unwrap();

    let mut attrs = Vec::new();
    for _ in 0..count {
        let group = recv(host).await;
        let fields = group.value_as_count().unwrap();
        let mut pairs = Vec::new();
        for _ in 0..fields {
            let field = recv(host).await;
            pairs.push((field.name_text(), field.value_text()));
        }
        attrs.push((group.name_text(), pairs));
    }
    attrs
}

async fn recv_handshake(host: &mut HostLink, uid: &str) -> Snapshot {
    let hello = recv(host).await;
    assert_eq!(hello.name_text(), "uid");
    assert_eq!(hello.value_text(), uid);
    recv_snapshot(host).await
}

/// Receive one progress message, returning (proc, desc, error)
async fn recv_progress(host: &mut HostLink) -> (String, String, String) {
    let header = recv(host).await;
    assert_eq!(header.name_text(), "progress");
    assert_eq!(header.value_as_count().unwrap(), 3);

    let proc = recv(host).await;
    assert_eq!(proc.name_text(), "proc");
    let desc = recv(host).await;
    assert_eq!(desc.name_text(), "desc");
    let error = recv(host).await;
    assert_eq!(error.name_text(), "error");
    (proc.value_text(), desc.value_text(), error.value_text())
}

async fn send_batch(host: &mut HostLink, groups: &[(&str, Vec<(&str, &str)>)]) {
    host.send(Pair::number("attrs", groups.len() as u64))
        .await
        .unwrap();
    for (attr, fields) in groups {
        host.send(Pair::number(attr.to_string(), fields.len() as u64))
            .await
            .unwrap();
        for (name, value) in fields {
            host.send(Pair::new(name.to_string(), value.to_string()))
                .await
                .unwrap();
        }
    }
}

fn field<'a>(snapshot: &'a Snapshot, attr: &str, name: &str) -> &'a str {
    let (_, fields) = snapshot
        .iter()
        .find(|(a, _)| a == attr)
        .unwrap_or_else(|| panic!("attribute {attr} missing from snapshot"));
    let (_, value) = fields
        .iter()
        .find(|(f, _)| f == name)
        .unwrap_or_else(|| panic!("field {name} missing from {attr}"));
    value
}

#[tokio::test]
async fn handshake_sends_uid_and_fixed_shape_snapshot() {
    let mut plugin = Plugin::new();
    plugin.declare_input("a", "").unwrap();
    plugin.declare_output("b", "x").unwrap();

    let mut host = connect(&mut plugin, "worker-1").await;
    let snapshot = recv_handshake(&mut host, "worker-1").await;

    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].0, "a");
    assert_eq!(snapshot[1].0, "b");
    for (_, fields) in &snapshot {
        let names: Vec<_> = fields.iter().map(|(f, _)| f.as_str()).collect();
        assert_eq!(
            names,
            ["value", "gui_type", "gui_options", "error", "gui_read_only"]
        );
    }
    assert_eq!(field(&snapshot, "a", "gui_read_only"), "0");
    assert_eq!(field(&snapshot, "b", "gui_read_only"), "1");
    assert_eq!(field(&snapshot, "b", "value"), "x");
    assert_eq!(plugin.state(), SessionState::AwaitingBatch);
}

#[tokio::test]
async fn batch_updates_attribute_value() {
    let mut plugin = Plugin::new();
    let q = plugin.declare_input("q", "").unwrap();

    let mut host = connect(&mut plugin, "w").await;
    recv_handshake(&mut host, "w").await;

    send_batch(&mut host, &[("q", vec![("value", "SELECT 1")])]).await;
    assert!(plugin.next_batch().await.unwrap());
    assert_eq!(q.value(), "SELECT 1");
    assert_eq!(plugin.state(), SessionState::Processing);
}

#[tokio::test]
async fn batch_applies_every_recognized_field() {
    let mut plugin = Plugin::new();
    let q = plugin.declare_input("q", "").unwrap();

    let mut host = connect(&mut plugin, "w").await;
    recv_handshake(&mut host, "w").await;

    send_batch(
        &mut host,
        &[(
            "q",
            vec![
                ("value", "select 1"),
                ("gui_type", "editbox"),
                ("gui_options", "multiline"),
                ("error", "host says no"),
                ("gui_read_only", "1"),
            ],
        )],
    )
    .await;
    assert!(plugin.next_batch().await.unwrap());

    assert_eq!(q.value(), "select 1");
    assert_eq!(q.gui_type(), "editbox");
    assert_eq!(q.gui_options(), "multiline");
    assert_eq!(q.error(), "host says no");
    assert!(q.read_only());
}

#[tokio::test]
async fn unknown_attribute_is_consumed_and_framing_stays_aligned() {
    let mut plugin = Plugin::new();
    let q = plugin.declare_input("q", "").unwrap();

    let mut host = connect(&mut plugin, "w").await;
    recv_handshake(&mut host, "w").await;

    // First batch references an attribute this worker never declared; the
    // second must still decode correctly afterwards.
    send_batch(
        &mut host,
        &[("ghost", vec![("value", "lost"), ("gui_type", "label")])],
    )
    .await;
    send_batch(&mut host, &[("q", vec![("value", "kept")])]).await;

    assert!(plugin.next_batch().await.unwrap());
    assert_eq!(q.value(), "");
    assert!(plugin.next_batch().await.unwrap());
    assert_eq!(q.value(), "kept");
}

#[tokio::test]
async fn unknown_field_is_consumed_and_discarded() {
    let mut plugin = Plugin::new();
    let q = plugin.declare_input("q", "").unwrap();

    let mut host = connect(&mut plugin, "w").await;
    recv_handshake(&mut host, "w").await;

    send_batch(
        &mut host,
        &[("q", vec![("gui_hint", "future field"), ("value", "v2")])],
    )
    .await;
    assert!(plugin.next_batch().await.unwrap());
    assert_eq!(q.value(), "v2");
}

#[tokio::test]
async fn invalid_read_only_literal_is_fatal() {
    let mut plugin = Plugin::new();
    plugin.declare_input("q", "").unwrap();

    let mut host = connect(&mut plugin, "w").await;
    recv_handshake(&mut host, "w").await;

    send_batch(&mut host, &[("q", vec![("gui_read_only", "2")])]).await;
    let err = plugin.next_batch().await.unwrap_err();
    assert!(matches!(err, AttrlinkError::Protocol(_)));
    assert_eq!(plugin.state(), SessionState::Terminated);
}

#[tokio::test]
async fn malformed_count_is_fatal() {
    let mut plugin = Plugin::new();
    plugin.declare_input("q", "").unwrap();

    let mut host = connect(&mut plugin, "w").await;
    recv_handshake(&mut host, "w").await;

    host.send(Pair::new("attrs", "three")).await.unwrap();
    let err = plugin.next_batch().await.unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn unknown_top_level_message_is_fatal() {
    let mut plugin = Plugin::new();
    plugin.declare_input("q", "").unwrap();

    let mut host = connect(&mut plugin, "w").await;
    recv_handshake(&mut host, "w").await;

    host.send(Pair::number("bogus", 1)).await.unwrap();
    let err = plugin.next_batch().await.unwrap_err();
    assert!(matches!(err, AttrlinkError::Protocol(_)));
}

#[tokio::test]
async fn clean_close_ends_the_work_loop() {
    let mut plugin = Plugin::new();
    plugin.declare_input("q", "").unwrap();

    let mut host = connect(&mut plugin, "w").await;
    recv_handshake(&mut host, "w").await;
    drop(host);

    assert!(!plugin.next_batch().await.unwrap());
    assert_eq!(plugin.state(), SessionState::Terminated);
    plugin.shutdown().await.unwrap();
}

#[tokio::test]
async fn close_mid_message_is_fatal() {
    let mut plugin = Plugin::new();
    plugin.declare_input("q", "").unwrap();

    let mut host = connect(&mut plugin, "w").await;
    recv_handshake(&mut host, "w").await;

    // Announce a batch, then vanish before the group arrives
    host.send(Pair::number("attrs", 1)).await.unwrap();
    drop(host);

    let err = plugin.next_batch().await.unwrap_err();
    assert!(matches!(err, AttrlinkError::ConnectionClosed));
    assert_eq!(plugin.state(), SessionState::Terminated);
}

#[tokio::test]
async fn validation_error_is_attached_to_the_attribute() {
    let mut plugin = Plugin::new();
    let file = plugin.declare_input("file", "").unwrap();
    plugin.declare_input("query", "").unwrap();

    let mut host = connect(&mut plugin, "w").await;
    recv_handshake(&mut host, "w").await;

    // Host forgets to fill in `file`
    send_batch(&mut host, &[("query", vec![("value", "select 1")])]).await;
    assert!(plugin.next_batch().await.unwrap());

    assert!(file.value().is_empty());
    file.set_error("empty");
    plugin.finalize().await.unwrap();

    let snapshot = recv_snapshot(&mut host).await;
    assert_eq!(field(&snapshot, "file", "error"), "empty");
    assert_eq!(field(&snapshot, "query", "error"), "");

    let (proc, desc, error) = recv_progress(&mut host).await;
    assert_eq!(proc, "10");
    assert_eq!(desc, "");
    assert_eq!(error, "");
    assert_eq!(plugin.state(), SessionState::AwaitingBatch);
}

#[tokio::test]
async fn error_signal_is_one_progress_message_without_snapshot() {
    let mut plugin = Plugin::new();
    plugin.declare_input("q", "").unwrap();

    let mut host = connect(&mut plugin, "w").await;
    recv_handshake(&mut host, "w").await;

    send_batch(&mut host, &[("q", vec![("value", "go")])]).await;
    assert!(plugin.next_batch().await.unwrap());
    plugin.report_error("boom").await.unwrap();

    // The very next message is the progress signal, no snapshot first
    let (proc, desc, error) = recv_progress(&mut host).await;
    assert_eq!(proc, "0");
    assert_eq!(desc, "");
    assert_eq!(error, "boom");
}

#[tokio::test]
async fn intermediate_progress_reports_fraction() {
    let mut plugin = Plugin::new();
    plugin.declare_input("q", "").unwrap();

    let mut host = connect(&mut plugin, "w").await;
    recv_handshake(&mut host, "w").await;

    send_batch(&mut host, &[("q", vec![("value", "go")])]).await;
    assert!(plugin.next_batch().await.unwrap());
    plugin.report_progress(0.5, "halfway").await.unwrap();

    let (proc, desc, error) = recv_progress(&mut host).await;
    assert_eq!(proc, "0.5");
    assert_eq!(desc, "halfway");
    assert_eq!(error, "");
}

#[tokio::test]
async fn end_to_end_query_worker_scenario() {
    let mut plugin = Plugin::new();
    let file = plugin.declare_input("file", "").unwrap();
    let query = plugin.declare_input("query", "").unwrap();
    let rows = plugin.declare_output("rows", "[]").unwrap();

    let mut host = connect(&mut plugin, "sqlite-worker").await;
    let initial = recv_handshake(&mut host, "sqlite-worker").await;
    assert_eq!(field(&initial, "rows", "value"), "[]");

    send_batch(
        &mut host,
        &[
            ("file", vec![("value", "/tmp/t.db")]),
            ("query", vec![("value", "select 1")]),
        ],
    )
    .await;
    assert!(plugin.next_batch().await.unwrap());
    assert_eq!(file.value(), "/tmp/t.db");
    assert_eq!(query.value(), "select 1");

    // The unit of work is external; stand in for it here
    rows.set_value("[{\"1\":1}]");
    plugin.finalize().await.unwrap();

    let snapshot = recv_snapshot(&mut host).await;
    assert_eq!(field(&snapshot, "rows", "value"), "[{\"1\":1}]");
    assert_eq!(field(&snapshot, "rows", "error"), "");
    let (proc, _, error) = recv_progress(&mut host).await;
    assert_eq!(proc, "10");
    assert_eq!(error, "");

    drop(host);
    assert!(!plugin.next_batch().await.unwrap());
    plugin.shutdown().await.unwrap();
}
