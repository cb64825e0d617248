#![cfg(all(unix, feature = "cli"))]

use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};

use sbp::{CloseMode, Context, ListenerId, Message};

fn loopback(ctx: &Context) -> (ListenerId, u16) {
    let id = ctx
        .listen_addrs(&["127.0.0.1:0".parse().expect("valid address")])
        .expect("listen should succeed");
    let port = ctx.local_addrs(id).expect("listener registered")[0].port();
    (id, port)
}

fn sbp() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_sbp"));
    command.arg("--log-level").arg("error");
    command
}

#[test]
fn client_sends_the_test_sequence() {
    let ctx = Context::initialize();
    let (id, port) = loopback(&ctx);

    let child = sbp()
        .arg("client")
        .arg(format!("127.0.0.1 {port}"))
        .stdout(Stdio::piped())
        .spawn()
        .expect("client should start");

    let accepted = ctx.accept(id).expect("client should connect");
    let mut reader = ctx.reader(accepted.connection).expect("reader");

    assert_eq!(reader.read_message().unwrap(), Message::text("doTests"));

    let mut chars = [0u8; 8];
    let read = reader.read_chars(&mut chars).unwrap();
    assert_eq!((&chars, read.len, read.truncated), (b"abcdefgh", 8, false));

    let mut ints = [0i32; 10];
    reader.read_i32s(&mut ints).unwrap();
    assert_eq!(ints, [0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);

    let mut doubles = [0f64; 11];
    reader.read_f64s(&mut doubles).unwrap();
    assert_eq!(doubles[10], 10.0);

    assert!(reader.read_message().unwrap_err().is_clean_close());

    let output = child.wait_with_output().expect("client should exit");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&format!("sent doTests sequence to 127.0.0.1 {port}")));
}

#[test]
fn serve_reports_passed_tests_and_exits_after_count() {
    let mut child = sbp()
        .arg("--format")
        .arg("json")
        .arg("serve")
        .arg("0")
        .arg("--count")
        .arg("1")
        .arg("--numeric")
        .stdout(Stdio::piped())
        .spawn()
        .expect("serve should start");

    let stdout = child.stdout.take().expect("stdout piped");
    let mut lines = BufReader::new(stdout).lines();

    let first = lines.next().expect("listening line").expect("utf-8 line");
    let event: serde_json::Value = serde_json::from_str(&first).expect("listening event is JSON");
    assert_eq!(event["event"], "listening");
    let address = event["address"].as_str().expect("address string");
    let port = address.rsplit(' ').next().expect("port token");

    let ctx = Context::initialize();
    let connection = ctx
        .dial(&format!("localhost {port}"))
        .expect("dial serve");
    let mut writer = ctx.writer(connection).expect("writer");
    writer.send_chars("doTests").unwrap();
    writer.send_chars("abcdefgh").unwrap();
    writer.send_i32s(&(0..10).collect::<Vec<i32>>()).unwrap();
    writer
        .send_f64s(&(0..=10).map(f64::from).collect::<Vec<f64>>())
        .unwrap();
    writer.get_ref().shutdown(CloseMode::Write).unwrap();

    let rest: Vec<String> = lines.map_while(Result::ok).collect();
    let status = child.wait().expect("serve should exit");
    assert!(status.success(), "serve output: {rest:?}");

    let report = rest
        .iter()
        .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
        .find(|value| value["event"] == "doTests")
        .expect("doTests report");
    assert_eq!(report["passed"], true);
}

#[test]
fn send_delivers_one_typed_message() {
    let ctx = Context::initialize();
    let (id, port) = loopback(&ctx);

    let child = sbp()
        .arg("send")
        .arg(format!("127.0.0.1 {port}"))
        .arg("--ints")
        .arg("7,-8,9")
        .spawn()
        .expect("send should start");

    let accepted = ctx.accept(id).expect("send should connect");
    let mut reader = ctx.reader(accepted.connection).expect("reader");
    assert_eq!(
        reader.read_message().unwrap(),
        Message::Int32Array(vec![7, -8, 9])
    );
    assert!(reader.read_message().unwrap_err().is_clean_close());

    let output = child.wait_with_output().expect("send should exit");
    assert!(output.status.success());
}

#[test]
fn malformed_address_returns_usage_code() {
    let output = sbp()
        .arg("send")
        .arg("a b c")
        .arg("--text")
        .arg("hi")
        .output()
        .expect("send should run");

    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("error:"));
}

#[test]
fn version_prints_package_version() {
    let output = sbp().arg("version").output().expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("sbp {}", env!("CARGO_PKG_VERSION")));
}
