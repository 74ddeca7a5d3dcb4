mod error;
pub mod types;

pub use error::GatewayError;
pub use types::*;

use log::debug;
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sop_core::baseline::{decide_rest_time, BaselineComparison, ComparisonPayload, RestPolicy};
use std::time::Duration;

/// Blocking client for the study backend. One HTTP request per operation,
/// no retries; every request carries the configured timeout so a hung
/// backend surfaces as a transport error instead of stalling the session.
pub struct Gateway {
    base_url: String,
    client: Client,
}

impl Gateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        debug!("GET {}", path);
        let response = self.client.get(self.url(path)).send()?;
        decode(path, response)
    }

    fn post<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        debug!("POST {}", path);
        let response = self.client.post(self.url(path)).send()?;
        decode(path, response)
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        debug!("POST {}", path);
        let response = self.client.post(self.url(path)).json(body).send()?;
        decode(path, response)
    }

    /// POST where the response body is unused; only the HTTP status matters.
    fn post_json_unit<B: Serialize>(&self, path: &str, body: &B) -> Result<(), GatewayError> {
        debug!("POST {}", path);
        let response = self.client.post(self.url(path)).json(body).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Http {
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    // --- recording -----------------------------------------------------

    pub fn set_task_id(&self, task_id: &str) -> Result<String, GatewayError> {
        let body: StatusBody =
            self.post_json("/set_task_id", &json!({ "task_id": task_id }))?;
        status_result("/set_task_id", body)
    }

    pub fn start_recording(&self) -> Result<String, GatewayError> {
        let body: StatusBody = self.post("/start_recording")?;
        status_result("/start_recording", body)
    }

    pub fn stop_recording(&self) -> Result<String, GatewayError> {
        let body: StatusBody = self.post("/stop_recording")?;
        status_result("/stop_recording", body)
    }

    pub fn test_transcription(&self) -> Result<String, GatewayError> {
        let body: TranscriptionBody = self.post("/get_test_transcription")?;
        require("/get_test_transcription", "transcription", body.transcription)
    }

    pub fn process_audio_files(&self) -> Result<ProcessedAudio, GatewayError> {
        self.post("/process_audio_files")
    }

    // --- SER test ------------------------------------------------------

    pub fn process_ser_test(&self) -> Result<String, GatewayError> {
        let body: StatusBody = self.post("/process_ser_test")?;
        status_result("/process_ser_test", body)
    }

    pub fn ser_question(&self) -> Result<String, GatewayError> {
        let body: QuestionBody = self.get("/get_ser_question")?;
        require("/get_ser_question", "question", body.question)
    }

    pub fn process_ser_answer(&self) -> Result<String, GatewayError> {
        let body: SerAnswerBody = self.post("/process_ser_answer")?;
        let message = require("/process_ser_answer", "message", body.message)?;
        if body.status.as_deref() == Some("error") {
            return Err(GatewayError::Backend { message });
        }
        Ok(message)
    }

    /// `None` once the backend has no more questions for the session.
    pub fn next_question(&self) -> Result<Option<NextQuestion>, GatewayError> {
        let body: QuestionBody = self.post("/get_question")?;
        match body.question {
            None => Ok(None),
            Some(question) => {
                let test_number = require("/get_question", "test_number", body.test_number)?;
                Ok(Some(NextQuestion {
                    question,
                    test_number,
                }))
            }
        }
    }

    pub fn set_next_test(&self) -> Result<String, GatewayError> {
        let body: MessageBody = self.post("/set_next_test")?;
        require("/set_next_test", "message", body.message)
    }

    // --- devices and streams --------------------------------------------

    pub fn audio_devices(&self) -> Result<Vec<AudioDevice>, GatewayError> {
        self.get("/get_audio_devices")
    }

    pub fn set_device(&self, device_index: i64) -> Result<String, GatewayError> {
        let body: MessageBody =
            self.post_json("/set_device", &json!({ "device_index": device_index }))?;
        require("/set_device", "message", body.message)
    }

    pub fn stream_active(&self) -> Result<bool, GatewayError> {
        let body: StreamActiveBody = self.get("/get_stream_active")?;
        require("/get_stream_active", "stream_active", body.stream_active)
    }

    pub fn shutdown(&self) -> Result<String, GatewayError> {
        let body: MessageBody = self.post("/shutdown")?;
        require("/shutdown", "message", body.message)
    }

    // --- EmotiBit -------------------------------------------------------

    pub fn start_emotibit(&self) -> Result<String, GatewayError> {
        let body: MessageBody = self.post("/start_emotibit")?;
        require("/start_emotibit", "message", body.message)
    }

    pub fn stop_emotibit(&self) -> Result<String, GatewayError> {
        let body: MessageBody = self.post("/stop_emotibit")?;
        require("/stop_emotibit", "message", body.message)
    }

    pub fn push_emotibit_data(&self, label: &str) -> Result<String, GatewayError> {
        let body: MessageBody =
            self.post_json("/push_emotibit_data", &json!({ "label": label }))?;
        require("/push_emotibit_data", "message", body.message)
    }

    /// Stop the EmotiBit capture and push the labeled data in one go — the
    /// paired calls every task teardown makes. The push message is what the
    /// operator cares about.
    pub fn emotibit_task_stop(&self, label: &str) -> Result<String, GatewayError> {
        self.stop_emotibit()?;
        self.push_emotibit_data(label)
    }

    pub fn start_emotibit_stream(&self) -> Result<String, GatewayError> {
        let body: StatusBody = self.post("/start_emotibit_stream")?;
        status_result("/start_emotibit_stream", body)
    }

    pub fn start_biometric_baseline(&self) -> Result<String, GatewayError> {
        let body: StatusBody = self.post("/start_biometric_baseline")?;
        status_result("/start_biometric_baseline", body)
    }

    pub fn stop_biometric_baseline(&self) -> Result<String, GatewayError> {
        let body: StatusBody = self.post("/stop_biometric_baseline")?;
        status_result("/stop_biometric_baseline", body)
    }

    // --- baseline comparison ---------------------------------------------

    pub fn baseline_comparison(
        &self,
        label: Option<&str>,
    ) -> Result<BaselineComparison, GatewayError> {
        let payload: ComparisonPayload = match label {
            Some(label) => {
                self.post_json("/baseline_comparison", &json!({ "label": label }))?
            }
            None => self.post("/baseline_comparison")?,
        };
        Ok(payload.into())
    }

    /// Fetch the comparison and decide how long the upcoming rest should be.
    pub fn rest_time(
        &self,
        label: Option<&str>,
        policy: &RestPolicy,
    ) -> Result<RestDecision, GatewayError> {
        let comparison = self.baseline_comparison(label)?;
        let (baseline_count, live_count) = comparison.elevation_counts();
        Ok(RestDecision {
            rest_min: decide_rest_time(&comparison, policy),
            baseline_count,
            live_count,
        })
    }

    // --- session metadata -------------------------------------------------

    pub fn surveys(&self) -> Result<Vec<Survey>, GatewayError> {
        self.get("/get_surveys")
    }

    pub fn set_condition(&self, condition: &str) -> Result<String, GatewayError> {
        let body: StatusBody =
            self.post_json("/set_condition", &json!({ "condition": condition }))?;
        status_result("/set_condition", body)
    }

    pub fn set_event_marker(&self, event_marker: &str) -> Result<String, GatewayError> {
        let body: StatusBody =
            self.post_json("/set_event_marker", &json!({ "event_marker": event_marker }))?;
        status_result("/set_event_marker", body)
    }

    pub fn record_task_audio(&self, request: &RecordTaskAudio) -> Result<String, GatewayError> {
        let body: MessageBody = self.post_json("/record_task_audio", request)?;
        require("/record_task_audio", "message", body.message)
    }

    pub fn complete_task(&self, task_id: &str) -> Result<(), GatewayError> {
        self.post_json_unit("/complete_task", &json!({ "task_id": task_id }))
    }

    pub fn status_update(&self, status: &str) -> Result<(), GatewayError> {
        self.post_json_unit("/status_update", &json!({ "status": status }))
    }
}

fn decode<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, GatewayError> {
    let status = response.status();
    if !status.is_success() {
        return Err(GatewayError::Http {
            status: status.as_u16(),
        });
    }
    response
        .json::<T>()
        .map_err(|err| GatewayError::Decode(format!("{}: {}", path, err)))
}

fn require<T>(path: &str, field: &str, value: Option<T>) -> Result<T, GatewayError> {
    value.ok_or_else(|| GatewayError::Decode(format!("{}: missing `{}`", path, field)))
}

/// Backends report logical failures as 200s with an "Error ..." status text;
/// fold those into the structured error here so nothing downstream matches
/// on message strings.
fn status_result(path: &str, body: StatusBody) -> Result<String, GatewayError> {
    let status = require(path, "status", body.status)?;
    if status.starts_with("Error") || status == "error" {
        return Err(GatewayError::Backend { message: status });
    }
    Ok(status)
}

#[derive(Deserialize)]
struct StatusBody {
    #[serde(default)]
    status: Option<String>,
}

#[derive(Deserialize)]
struct MessageBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct TranscriptionBody {
    #[serde(default)]
    transcription: Option<String>,
}

#[derive(Deserialize)]
struct QuestionBody {
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    test_number: Option<u32>,
}

#[derive(Deserialize)]
struct StreamActiveBody {
    #[serde(default)]
    stream_active: Option<bool>,
}

#[derive(Deserialize)]
struct SerAnswerBody {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// Minimal one-request HTTP responder; enough for a blocking client test.
    fn one_shot_server(status_line: &str, body: &str) -> (String, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let status_line = status_line.to_string();
        let body = body.to_string();
        let handle = thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                drain_request(&mut stream);
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });
        (base_url, handle)
    }

    /// Read headers plus any Content-Length body so the client never sees a
    /// reset while still writing.
    fn drain_request(stream: &mut std::net::TcpStream) {
        let mut received = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => return,
                Ok(n) => received.extend_from_slice(&buf[..n]),
            }
            if let Some(header_end) = received
                .windows(4)
                .position(|window| window == b"\r\n\r\n")
            {
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

    fn gateway(base_url: &str) -> Gateway {
        Gateway::new(base_url, Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn start_recording_returns_the_status_text() {
        let (url, server) = one_shot_server("200 OK", r#"{"status": "Recording started."}"#);
        let result = gateway(&url).start_recording().unwrap();
        assert_eq!(result, "Recording started.");
        server.join().unwrap();
    }

    #[test]
    fn backend_error_status_becomes_a_backend_variant() {
        let (url, server) =
            one_shot_server("200 OK", r#"{"status": "Error starting recording."}"#);
        let err = gateway(&url).start_recording().unwrap_err();
        assert!(matches!(err, GatewayError::Backend { .. }));
        assert_eq!(err.kind(), "backend");
        server.join().unwrap();
    }

    #[test]
    fn ser_answer_error_carries_the_backend_message() {
        let (url, server) = one_shot_server(
            "200 OK",
            r#"{"status": "error", "message": "No recording to score."}"#,
        );
        let err = gateway(&url).process_ser_answer().unwrap_err();
        match err {
            GatewayError::Backend { message } => assert_eq!(message, "No recording to score."),
            other => panic!("expected backend error, got {:?}", other),
        }
        server.join().unwrap();
    }

    #[test]
    fn non_2xx_maps_to_http_error() {
        let (url, server) = one_shot_server("500 Internal Server Error", "{}");
        let err = gateway(&url).stop_recording().unwrap_err();
        assert!(matches!(err, GatewayError::Http { status: 500 }));
        server.join().unwrap();
    }

    #[test]
    fn missing_expected_field_maps_to_decode_error() {
        let (url, server) = one_shot_server("200 OK", r#"{"unexpected": 1}"#);
        let err = gateway(&url).stream_active().unwrap_err();
        assert!(matches!(err, GatewayError::Decode(_)));
        server.join().unwrap();
    }

    #[test]
    fn connection_refused_maps_to_transport_error() {
        // Bind then drop so the port is known-dead.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        let err = gateway(&url).shutdown().unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
        assert_eq!(err.kind(), "transport");
    }

    #[test]
    fn device_list_decodes_and_auto_selects_a_single_entry() {
        let (url, server) = one_shot_server(
            "200 OK",
            r#"[{"index": 2, "name": "USB Audio Device"}]"#,
        );
        let devices = gateway(&url).audio_devices().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(auto_select_device(&devices), Some(2));
        server.join().unwrap();
    }

    #[test]
    fn exhausted_questions_come_back_as_none() {
        let (url, server) = one_shot_server("200 OK", r#"{"question": null}"#);
        assert!(gateway(&url).next_question().unwrap().is_none());
        server.join().unwrap();
    }

    #[test]
    fn question_with_test_number_decodes() {
        let (url, server) = one_shot_server(
            "200 OK",
            r#"{"question": "Describe the image.", "test_number": 2}"#,
        );
        let next = gateway(&url).next_question().unwrap().unwrap();
        assert_eq!(next.test_number, 2);
        assert_eq!(next.question, "Describe the image.");
        server.join().unwrap();
    }

    #[test]
    fn rest_time_decides_from_a_labeled_comparison() {
        let (url, server) = one_shot_server(
            "200 OK",
            r#"{
                "EDA": {"elevated": "Live data"},
                "HR": {"elevated": "Live data"},
                "BI": {"elevated": "Baseline data"},
                "PG": {"elevated": null}
            }"#,
        );
        let policy = RestPolicy::default();
        let decision = gateway(&url).rest_time(Some("vr_task_1"), &policy).unwrap();
        assert_eq!(decision.live_count, 2);
        assert_eq!(decision.baseline_count, 1);
        assert_eq!(decision.rest_min, policy.live_dominant_min);
        server.join().unwrap();
    }

    #[test]
    fn rest_time_accepts_the_means_variant() {
        let (url, server) = one_shot_server(
            "200 OK",
            r#"{
                "baseline_means": {"EDA": 0.4, "HR": 70.0},
                "data_means": {"EDA": 0.9, "HR": 85.0}
            }"#,
        );
        let policy = RestPolicy::default();
        let decision = gateway(&url).rest_time(None, &policy).unwrap();
        assert_eq!(decision.rest_min, policy.live_dominant_min);
        server.join().unwrap();
    }
}
