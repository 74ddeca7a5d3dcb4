use serde::{Deserialize, Serialize};

/// One capture device as reported by `/get_audio_devices`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioDevice {
    pub index: i64,
    pub name: String,
}

/// Pick the device to select without operator input: only when the backend
/// reports exactly one device is there nothing to choose.
pub fn auto_select_device(devices: &[AudioDevice]) -> Option<i64> {
    match devices {
        [only] => Some(only.index),
        _ => None,
    }
}

/// Survey entry from `/get_surveys`. Entries with a blank URL are placeholders
/// the panel skips.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Survey {
    pub name: String,
    pub url: String,
}

impl Survey {
    pub fn has_url(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

/// A question served by `/get_question`, tagged with which test it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextQuestion {
    pub question: String,
    pub test_number: u32,
}

/// Result of `/process_audio_files`: where the backend stored the session audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedAudio {
    pub message: String,
    #[serde(default)]
    pub path: Option<String>,
}

/// Request body for `/record_task_audio`.
#[derive(Debug, Clone, Serialize)]
pub struct RecordTaskAudio {
    pub event_marker: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    pub action: String,
    pub question: String,
}

/// Rest-time decision together with the counts it was derived from, so the
/// operator can see why a duration was chosen.
#[derive(Debug, Clone, Serialize)]
pub struct RestDecision {
    pub rest_min: u32,
    pub baseline_count: usize,
    pub live_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_select_fires_only_for_a_single_device() {
        let one = vec![AudioDevice {
            index: 3,
            name: "USB microphone".into(),
        }];
        assert_eq!(auto_select_device(&one), Some(3));
        assert_eq!(auto_select_device(&[]), None);
        let two = vec![
            AudioDevice {
                index: 0,
                name: "Built-in".into(),
            },
            AudioDevice {
                index: 1,
                name: "USB microphone".into(),
            },
        ];
        assert_eq!(auto_select_device(&two), None);
    }

    #[test]
    fn blank_survey_urls_are_placeholders() {
        let survey = Survey {
            name: "pss4".into(),
            url: "  ".into(),
        };
        assert!(!survey.has_url());
    }

    #[test]
    fn record_task_audio_omits_absent_condition() {
        let body = RecordTaskAudio {
            event_marker: "vr_task_1".into(),
            condition: None,
            action: "start".into(),
            question: "q1".into(),
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(!json.contains("condition"));
    }
}
