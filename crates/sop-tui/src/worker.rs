use sop_client::{
    AudioDevice, Gateway, NextQuestion, RecordTaskAudio, RestDecision, Survey,
};
use sop_core::baseline::RestPolicy;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

/// One backend operation requested from the UI.
pub enum Request {
    Surveys,
    Devices,
    SetDevice(i64),
    StreamActive,
    StartBiometricBaseline,
    StopBiometricBaseline,
    StartEmotibitStream,
    SetTaskId(String),
    StartEmotibit,
    /// Stop the capture and push the data under the given label.
    StopEmotibit(String),
    RecordTaskAudio(RecordTaskAudio),
    RestTime(Option<String>),
    SetCondition(String),
    SetEventMarker(String),
    CompleteTask(String),
    NextTest,
    StartRecording,
    StopRecording,
    SerQuestion,
    NextQuestion,
    ProcessSerAnswer,
    ProcessSerTest,
    Transcription,
    ProcessAudio,
    StatusUpdate(String),
    Shutdown,
}

/// Outcome delivered back to the UI thread. Failures arrive as data, never
/// as a panic or a hung call.
pub enum Reply {
    Status(String),
    Devices(Vec<AudioDevice>),
    Surveys(Vec<Survey>),
    Question(Option<NextQuestion>),
    SerQuestion(String),
    Transcription(String),
    Rest(RestDecision),
    StreamActive(bool),
    Failed { action: &'static str, message: String },
}

/// Gateway calls run here so the draw loop never blocks on the network.
pub struct Worker {
    tx: Sender<Request>,
    rx: Receiver<Reply>,
}

impl Worker {
    pub fn spawn(gateway: Gateway, policy: RestPolicy) -> Self {
        let (req_tx, req_rx) = mpsc::channel::<Request>();
        let (reply_tx, reply_rx) = mpsc::channel::<Reply>();
        thread::spawn(move || {
            for request in req_rx {
                let reply = handle(&gateway, &policy, request);
                if reply_tx.send(reply).is_err() {
                    break;
                }
            }
        });
        Self {
            tx: req_tx,
            rx: reply_rx,
        }
    }

    pub fn submit(&self, request: Request) {
        let _ = self.tx.send(request);
    }

    pub fn poll(&self) -> Option<Reply> {
        self.rx.try_recv().ok()
    }
}

fn handle(gateway: &Gateway, policy: &RestPolicy, request: Request) -> Reply {
    match request {
        Request::Surveys => match gateway.surveys() {
            Ok(surveys) => Reply::Surveys(surveys),
            Err(err) => fail("get_surveys", err),
        },
        Request::Devices => match gateway.audio_devices() {
            Ok(devices) => Reply::Devices(devices),
            Err(err) => fail("get_audio_devices", err),
        },
        Request::SetDevice(index) => status("set_device", gateway.set_device(index)),
        Request::StreamActive => match gateway.stream_active() {
            Ok(active) => Reply::StreamActive(active),
            Err(err) => fail("get_stream_active", err),
        },
        Request::StartBiometricBaseline => status(
            "start_biometric_baseline",
            gateway.start_biometric_baseline(),
        ),
        Request::StopBiometricBaseline => status(
            "stop_biometric_baseline",
            gateway.stop_biometric_baseline(),
        ),
        Request::StartEmotibitStream => {
            status("start_emotibit_stream", gateway.start_emotibit_stream())
        }
        Request::SetTaskId(task_id) => status("set_task_id", gateway.set_task_id(&task_id)),
        Request::StartEmotibit => status("start_emotibit", gateway.start_emotibit()),
        Request::StopEmotibit(label) => {
            status("stop_emotibit", gateway.emotibit_task_stop(&label))
        }
        Request::RecordTaskAudio(body) => {
            status("record_task_audio", gateway.record_task_audio(&body))
        }
        Request::RestTime(label) => match gateway.rest_time(label.as_deref(), policy) {
            Ok(decision) => Reply::Rest(decision),
            Err(err) => fail("baseline_comparison", err),
        },
        Request::SetCondition(condition) => {
            status("set_condition", gateway.set_condition(&condition))
        }
        Request::SetEventMarker(marker) => {
            status("set_event_marker", gateway.set_event_marker(&marker))
        }
        Request::CompleteTask(task_id) => match gateway.complete_task(&task_id) {
            Ok(()) => Reply::Status(format!("Task {} completed.", task_id)),
            Err(err) => fail("complete_task", err),
        },
        Request::NextTest => status("set_next_test", gateway.set_next_test()),
        Request::StartRecording => status("start_recording", gateway.start_recording()),
        Request::StopRecording => status("stop_recording", gateway.stop_recording()),
        Request::SerQuestion => match gateway.ser_question() {
            Ok(question) => Reply::SerQuestion(question),
            Err(err) => fail("get_ser_question", err),
        },
        Request::NextQuestion => match gateway.next_question() {
            Ok(next) => Reply::Question(next),
            Err(err) => fail("get_question", err),
        },
        Request::ProcessSerAnswer => {
            status("process_ser_answer", gateway.process_ser_answer())
        }
        Request::ProcessSerTest => status("process_ser_test", gateway.process_ser_test()),
        Request::Transcription => match gateway.test_transcription() {
            Ok(text) => Reply::Transcription(text),
            Err(err) => fail("get_test_transcription", err),
        },
        Request::ProcessAudio => match gateway.process_audio_files() {
            Ok(processed) => Reply::Status(match processed.path {
                Some(path) => format!("{} ({})", processed.message, path),
                None => processed.message,
            }),
            Err(err) => fail("process_audio_files", err),
        },
        Request::StatusUpdate(text) => match gateway.status_update(&text) {
            Ok(()) => Reply::Status("Status update sent.".into()),
            Err(err) => fail("status_update", err),
        },
        Request::Shutdown => status("shutdown", gateway.shutdown()),
    }
}

fn status(action: &'static str, result: Result<String, sop_client::GatewayError>) -> Reply {
    match result {
        Ok(message) => Reply::Status(message),
        Err(err) => fail(action, err),
    }
}

fn fail(action: &'static str, err: sop_client::GatewayError) -> Reply {
    Reply::Failed {
        action,
        message: format!("[{}] {}", err.kind(), err),
    }
}
