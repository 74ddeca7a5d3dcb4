use anyhow::{Context, Result};
use dirs_next::config_dir;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Protocol steps in the order the study runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Step {
    Surveys,
    BiometricBaseline,
    StressBaseline,
    AudioTest,
    EmotionBaseline,
    FirstStressTask,
    FirstVrTask,
    FirstBreak,
    SecondStressTask,
    SecondVrTask,
    SecondBreak,
}

impl Step {
    pub const ORDER: [Step; 11] = [
        Step::Surveys,
        Step::BiometricBaseline,
        Step::StressBaseline,
        Step::AudioTest,
        Step::EmotionBaseline,
        Step::FirstStressTask,
        Step::FirstVrTask,
        Step::FirstBreak,
        Step::SecondStressTask,
        Step::SecondVrTask,
        Step::SecondBreak,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Step::Surveys => "Surveys",
            Step::BiometricBaseline => "Biometric baseline",
            Step::StressBaseline => "Stress baseline",
            Step::AudioTest => "Audio test",
            Step::EmotionBaseline => "Emotion baseline",
            Step::FirstStressTask => "Stress task 1",
            Step::FirstVrTask => "VR task 1",
            Step::FirstBreak => "Break 1",
            Step::SecondStressTask => "Stress task 2",
            Step::SecondVrTask => "VR task 2",
            Step::SecondBreak => "Break 2",
        }
    }
}

/// Which protocol steps the operator has signed off. Owned by the UI layer
/// and passed around explicitly rather than living in scattered globals.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    completed: BTreeSet<Step>,
}

impl SessionState {
    pub fn mark_complete(&mut self, step: Step) {
        self.completed.insert(step);
    }

    pub fn clear(&mut self, step: Step) {
        self.completed.remove(&step);
    }

    pub fn is_complete(&self, step: Step) -> bool {
        self.completed.contains(&step)
    }

    /// First incomplete step in protocol order, if any remain.
    pub fn next_pending(&self) -> Option<Step> {
        Step::ORDER
            .iter()
            .copied()
            .find(|step| !self.completed.contains(step))
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }
}

/// Labels attached to recorded task audio, persisted between panel launches
/// so a restart mid-session keeps the current condition and event marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLabels {
    #[serde(default)]
    pub event_marker: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
}

pub fn state_dir() -> Result<PathBuf> {
    if let Ok(dir) = env::var("SOP_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let base = config_dir().context("unable to locate config directory")?;
    Ok(base.join("sop"))
}

fn labels_path() -> Result<PathBuf> {
    Ok(state_dir()?.join("session_labels.json"))
}

impl SessionLabels {
    /// Load the persisted labels, or defaults when nothing has been stored.
    pub fn load() -> Result<Self> {
        let path = labels_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("reading session labels {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("parsing session labels {}", path.display()))
    }

    /// Overwrite the stored labels. Called on every change, like the
    /// original panel did with its localStorage keys.
    pub fn store(&self) -> Result<()> {
        let dir = state_dir()?;
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("creating state dir {}", dir.display()))?;
        }
        let path = labels_path()?;
        fs::write(&path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("writing session labels {}", path.display()))
    }
}
