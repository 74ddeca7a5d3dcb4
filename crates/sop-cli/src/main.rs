use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::info;
use serde_json::json;
use sop_client::{Gateway, RecordTaskAudio};
use sop_core::journal::append_event;
use sop_core::{state_dir, PanelConfig, SessionLabels};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "sop",
    version,
    about = "SOP: study operator panel, one backend operation per invocation"
)]
struct Cli {
    /// Backend base URL; overrides the config file
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Request timeout in seconds; overrides the config file
    #[arg(long, global = true)]
    timeout_s: Option<u64>,

    /// Panel config TOML (defaults to config.toml in the SOP state dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Append each mutating operation to this session journal (TSV)
    #[arg(long, global = true)]
    journal: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List capture devices reported by the backend
    Devices,
    /// Select the capture device by backend index
    SetDevice {
        #[arg(long)]
        index: i64,
    },
    /// List surveys configured for the session
    Surveys,
    /// Tell the backend which task the next data belongs to
    SetTaskId {
        #[arg(long)]
        task_id: String,
    },
    /// Start the microphone recording
    StartRecording,
    /// Stop the microphone recording
    StopRecording,
    /// Fetch the transcription of the audio test
    Transcription,
    /// Run the speech-emotion-recognition scoring over the test audio
    ProcessSerTest,
    /// Fetch the current SER question
    SerQuestion,
    /// Score the recorded SER answer
    ProcessSerAnswer,
    /// Probe whether the biometric stream is active
    StreamActive,
    /// Fetch the next test question, if any remain
    Question,
    /// Advance the backend to the next test
    NextTest,
    /// Compare live biometrics to the baseline and print the rest decision
    RestTime {
        /// Label of the task window to compare
        #[arg(long)]
        label: Option<String>,
    },
    /// EmotiBit capture control
    Emotibit {
        #[command(subcommand)]
        command: EmotibitCommand,
    },
    /// Start the EmotiBit data stream
    EmotibitStream,
    /// Biometric baseline capture control
    BiometricBaseline {
        #[command(subcommand)]
        command: BaselineCommand,
    },
    /// Ask the backend to process and store the session audio files
    ProcessAudio,
    /// Mark a task finished on the backend
    CompleteTask {
        #[arg(long)]
        task_id: String,
    },
    /// Set the experiment condition (persisted locally as well)
    SetCondition {
        #[arg(long)]
        condition: String,
    },
    /// Set the event marker (persisted locally as well)
    SetEventMarker {
        #[arg(long)]
        event_marker: String,
    },
    /// Start or stop a labeled task audio recording
    RecordTaskAudio {
        #[arg(long)]
        event_marker: String,
        #[arg(long)]
        condition: Option<String>,
        /// "start" or "stop"
        #[arg(long)]
        action: String,
        #[arg(long)]
        question: String,
    },
    /// Push a free-form status line to the backend log
    StatusUpdate {
        #[arg(long)]
        status: String,
    },
    /// Show the locally persisted session labels and recent journal entries
    Session,
    /// Shut the backend down
    Shutdown,
}

#[derive(Subcommand)]
enum EmotibitCommand {
    Start,
    /// Stop the capture and push the labeled data to storage
    Stop {
        #[arg(long)]
        label: String,
    },
    /// Push already-captured data under a label
    Push {
        #[arg(long)]
        label: String,
    },
}

#[derive(Subcommand)]
enum BaselineCommand {
    Start,
    Stop,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => state_dir()?.join("config.toml"),
    };
    let config = PanelConfig::load(&config_path)?;
    let base_url = cli.base_url.clone().unwrap_or_else(|| config.base_url.clone());
    let timeout = Duration::from_secs(cli.timeout_s.unwrap_or(config.request_timeout_s));
    let gateway = Gateway::new(&base_url, timeout)?;
    info!("backend at {}", gateway.base_url());

    run(&cli, &gateway, &config)
}

fn run(cli: &Cli, gateway: &Gateway, config: &PanelConfig) -> Result<()> {
    match &cli.command {
        Command::Devices => emit(json!(gateway.audio_devices()?)),
        Command::SetDevice { index } => {
            let message = gateway.set_device(*index)?;
            journal(cli, "set_device", &index.to_string())?;
            emit(json!({ "message": message }))
        }
        Command::Surveys => emit(json!(gateway.surveys()?)),
        Command::SetTaskId { task_id } => {
            let status = gateway.set_task_id(task_id)?;
            journal(cli, "set_task_id", task_id)?;
            emit(json!({ "status": status }))
        }
        Command::StartRecording => {
            let status = gateway.start_recording()?;
            journal(cli, "start_recording", "")?;
            emit(json!({ "status": status }))
        }
        Command::StopRecording => {
            let status = gateway.stop_recording()?;
            journal(cli, "stop_recording", "")?;
            emit(json!({ "status": status }))
        }
        Command::Transcription => {
            emit(json!({ "transcription": gateway.test_transcription()? }))
        }
        Command::ProcessSerTest => {
            let status = gateway.process_ser_test()?;
            journal(cli, "process_ser_test", "")?;
            emit(json!({ "status": status }))
        }
        Command::SerQuestion => emit(json!({ "question": gateway.ser_question()? })),
        Command::ProcessSerAnswer => {
            let message = gateway.process_ser_answer()?;
            journal(cli, "process_ser_answer", "")?;
            emit(json!({ "message": message }))
        }
        Command::StreamActive => emit(json!({ "stream_active": gateway.stream_active()? })),
        Command::Question => match gateway.next_question()? {
            Some(next) => emit(json!(next)),
            None => emit(json!({ "question": null })),
        },
        Command::NextTest => {
            let message = gateway.set_next_test()?;
            journal(cli, "set_next_test", "")?;
            emit(json!({ "message": message }))
        }
        Command::RestTime { label } => {
            let decision = gateway.rest_time(label.as_deref(), &config.rest)?;
            journal(cli, "rest_time", &format!("{} min", decision.rest_min))?;
            emit(json!(decision))
        }
        Command::Emotibit { command } => match command {
            EmotibitCommand::Start => {
                let message = gateway.start_emotibit()?;
                journal(cli, "start_emotibit", "")?;
                emit(json!({ "message": message }))
            }
            EmotibitCommand::Stop { label } => {
                let message = gateway.emotibit_task_stop(label)?;
                journal(cli, "stop_emotibit", label)?;
                emit(json!({ "message": message }))
            }
            EmotibitCommand::Push { label } => {
                let message = gateway.push_emotibit_data(label)?;
                journal(cli, "push_emotibit_data", label)?;
                emit(json!({ "message": message }))
            }
        },
        Command::EmotibitStream => {
            let status = gateway.start_emotibit_stream()?;
            journal(cli, "start_emotibit_stream", "")?;
            emit(json!({ "status": status }))
        }
        Command::BiometricBaseline { command } => match command {
            BaselineCommand::Start => {
                let status = gateway.start_biometric_baseline()?;
                journal(cli, "start_biometric_baseline", "")?;
                emit(json!({ "status": status }))
            }
            BaselineCommand::Stop => {
                let status = gateway.stop_biometric_baseline()?;
                journal(cli, "stop_biometric_baseline", "")?;
                emit(json!({ "status": status }))
            }
        },
        Command::ProcessAudio => {
            let processed = gateway.process_audio_files()?;
            journal(cli, "process_audio_files", "")?;
            emit(json!(processed))
        }
        Command::CompleteTask { task_id } => {
            gateway.complete_task(task_id)?;
            journal(cli, "complete_task", task_id)?;
            emit(json!({ "completed": task_id }))
        }
        Command::SetCondition { condition } => {
            let status = gateway.set_condition(condition)?;
            let mut labels = SessionLabels::load()?;
            labels.condition = Some(condition.clone());
            labels.store()?;
            journal(cli, "set_condition", condition)?;
            emit(json!({ "status": status }))
        }
        Command::SetEventMarker { event_marker } => {
            let status = gateway.set_event_marker(event_marker)?;
            let mut labels = SessionLabels::load()?;
            labels.event_marker = Some(event_marker.clone());
            labels.store()?;
            journal(cli, "set_event_marker", event_marker)?;
            emit(json!({ "status": status }))
        }
        Command::RecordTaskAudio {
            event_marker,
            condition,
            action,
            question,
        } => {
            let message = gateway.record_task_audio(&RecordTaskAudio {
                event_marker: event_marker.clone(),
                condition: condition.clone(),
                action: action.clone(),
                question: question.clone(),
            })?;
            journal(cli, "record_task_audio", &format!("{} {}", action, event_marker))?;
            emit(json!({ "message": message }))
        }
        Command::StatusUpdate { status } => {
            gateway.status_update(status)?;
            journal(cli, "status_update", status)?;
            emit(json!({ "sent": status }))
        }
        Command::Session => {
            let labels = SessionLabels::load()?;
            let recent = match &cli.journal {
                Some(path) if path.exists() => {
                    let events = sop_core::journal::read_events(path)?;
                    let tail = events.len().saturating_sub(10);
                    events[tail..].to_vec()
                }
                _ => Vec::new(),
            };
            emit(json!({ "labels": labels, "recent": recent }))
        }
        Command::Shutdown => {
            let message = gateway.shutdown()?;
            journal(cli, "shutdown", "")?;
            emit(json!({ "message": message }))
        }
    }
}

fn emit(value: serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string(&value)?);
    Ok(())
}

fn journal(cli: &Cli, action: &str, detail: &str) -> Result<()> {
    if let Some(path) = &cli.journal {
        append_event(path, action, detail)
            .with_context(|| format!("appending to journal {}", path.display()))?;
    }
    Ok(())
}
