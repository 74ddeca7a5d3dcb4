use assert_cmd::Command;
use serde_json::Value;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use tempfile::tempdir;

/// Answer one HTTP request with the given JSON and exit.
fn one_shot_server(body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            drain_request(&mut stream);
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });
    base_url
}

/// Read headers plus any Content-Length body before replying.
fn drain_request(stream: &mut std::net::TcpStream) {
    let mut received = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => received.extend_from_slice(&buf[..n]),
        }
        if let Some(header_end) = received.windows(4).position(|window| window == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&received[..header_end]).to_lowercase();
            let content_length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if received.len() >= header_end + 4 + content_length {
                return;
            }
        }
    }
}

fn sop(state_dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("sop").unwrap();
    cmd.env("SOP_STATE_DIR", state_dir);
    cmd
}

#[test]
fn devices_prints_the_backend_list() {
    let dir = tempdir().unwrap();
    let url = one_shot_server(r#"[{"index": 1, "name": "USB Audio Device"}]"#);
    let output = sop(dir.path())
        .args(["--base-url", &url, "devices"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let parsed: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(parsed[0]["name"], "USB Audio Device");
}

#[test]
fn rest_time_reports_the_decision_and_journals_it() {
    let dir = tempdir().unwrap();
    let journal = dir.path().join("events.tsv");
    let url = one_shot_server(
        r#"{
            "EDA": {"elevated": "Live data"},
            "HR": {"elevated": "Live data"},
            "BI": {"elevated": "Baseline data"}
        }"#,
    );
    let output = sop(dir.path())
        .args([
            "--base-url",
            &url,
            "--journal",
            journal.to_str().unwrap(),
            "rest-time",
            "--label",
            "vr_task_1",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let parsed: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(parsed["rest_min"], 8);
    assert_eq!(parsed["live_count"], 2);
    let journal_text = std::fs::read_to_string(&journal).unwrap();
    assert!(journal_text.contains("rest_time"));
    assert!(journal_text.contains("8 min"));
}

#[test]
fn unreachable_backend_exits_nonzero() {
    let dir = tempdir().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let dead_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    let output = sop(dir.path())
        .args(["--base-url", &dead_url, "start-recording"])
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8_lossy(&output);
    assert!(stderr.contains("transport failure"), "stderr: {}", stderr);
}

#[test]
fn set_condition_persists_the_label_locally() {
    let dir = tempdir().unwrap();
    let url = one_shot_server(r#"{"status": "Condition set."}"#);
    sop(dir.path())
        .args(["--base-url", &url, "set-condition", "--condition", "heat"])
        .assert()
        .success();
    let labels = std::fs::read_to_string(dir.path().join("session_labels.json")).unwrap();
    assert!(labels.contains("heat"));
}
