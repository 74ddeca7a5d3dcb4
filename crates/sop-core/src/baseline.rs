use serde::Deserialize;
use std::collections::BTreeMap;

/// Label the backend attaches to a metric whose live window sits above its baseline.
pub const ELEVATED_LIVE: &str = "Live data";
/// Label for a metric whose baseline window sits above its live window.
pub const ELEVATED_BASELINE: &str = "Baseline data";

/// Per-metric comparison record as emitted by the EmotiBit streamer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComparisonEntry {
    #[serde(default)]
    pub baseline_avg: Option<f64>,
    #[serde(default)]
    pub live_avg: Option<f64>,
    #[serde(default)]
    pub elevated: Option<String>,
}

/// Both observed wire shapes of `/baseline_comparison`. Older backends send a
/// pair of mean maps; current ones send per-metric records with an `elevated`
/// label. The means variant is listed first so the untagged match cannot fall
/// through to the labeled map (its keys would otherwise parse as empty
/// entries).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ComparisonPayload {
    Means {
        baseline_means: BTreeMap<String, Option<f64>>,
        data_means: BTreeMap<String, Option<f64>>,
    },
    Labeled(BTreeMap<String, ComparisonEntry>),
}

/// Metric name → comparison record, normalized from either wire variant.
#[derive(Debug, Clone, Default)]
pub struct BaselineComparison {
    entries: BTreeMap<String, ComparisonEntry>,
}

impl BaselineComparison {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &ComparisonEntry)> {
        self.entries.iter()
    }

    /// Count metrics labeled baseline-elevated vs live-elevated. Entries with
    /// any other label (missing, "Equal", junk) contribute to neither count.
    pub fn elevation_counts(&self) -> (usize, usize) {
        let mut baseline = 0;
        let mut live = 0;
        for entry in self.entries.values() {
            match entry.elevated.as_deref() {
                Some(ELEVATED_BASELINE) => baseline += 1,
                Some(ELEVATED_LIVE) => live += 1,
                _ => {}
            }
        }
        (baseline, live)
    }
}

impl From<ComparisonPayload> for BaselineComparison {
    fn from(payload: ComparisonPayload) -> Self {
        match payload {
            ComparisonPayload::Labeled(entries) => Self { entries },
            ComparisonPayload::Means {
                baseline_means,
                data_means,
            } => {
                let mut entries = BTreeMap::new();
                for (key, baseline_avg) in baseline_means {
                    let live_avg = data_means.get(&key).copied().flatten();
                    let elevated = match (baseline_avg, live_avg) {
                        (Some(b), Some(l)) if l > b => Some(ELEVATED_LIVE.to_string()),
                        (Some(b), Some(l)) if l < b => Some(ELEVATED_BASELINE.to_string()),
                        (Some(_), Some(_)) => Some("Equal".to_string()),
                        _ => None,
                    };
                    entries.insert(
                        key,
                        ComparisonEntry {
                            baseline_avg,
                            live_avg,
                            elevated,
                        },
                    );
                }
                Self { entries }
            }
        }
    }
}

/// Rest durations in minutes for the three decision outcomes. The study
/// revisions disagree on the literals, so all three are operator-configurable.
#[derive(Debug, Clone, Deserialize)]
pub struct RestPolicy {
    #[serde(default = "default_baseline_dominant")]
    pub baseline_dominant_min: u32,
    #[serde(default = "default_live_dominant")]
    pub live_dominant_min: u32,
    #[serde(default = "default_tie")]
    pub tie_min: u32,
}

fn default_baseline_dominant() -> u32 {
    3
}

fn default_live_dominant() -> u32 {
    8
}

fn default_tie() -> u32 {
    5
}

impl Default for RestPolicy {
    fn default() -> Self {
        Self {
            baseline_dominant_min: default_baseline_dominant(),
            live_dominant_min: default_live_dominant(),
            tie_min: default_tie(),
        }
    }
}

/// Pick the rest duration from a baseline comparison: whichever side is
/// elevated in more metrics wins; ties (including an empty comparison) take
/// the default.
pub fn decide_rest_time(comparison: &BaselineComparison, policy: &RestPolicy) -> u32 {
    let (baseline, live) = comparison.elevation_counts();
    if baseline > live {
        policy.baseline_dominant_min
    } else if live > baseline {
        policy.live_dominant_min
    } else {
        policy.tie_min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labeled(pairs: &[(&str, Option<&str>)]) -> BaselineComparison {
        let payload = ComparisonPayload::Labeled(
            pairs
                .iter()
                .map(|(key, label)| {
                    (
                        key.to_string(),
                        ComparisonEntry {
                            baseline_avg: None,
                            live_avg: None,
                            elevated: label.map(str::to_string),
                        },
                    )
                })
                .collect(),
        );
        payload.into()
    }

    #[test]
    fn empty_comparison_takes_tie_default() {
        let policy = RestPolicy::default();
        assert_eq!(
            decide_rest_time(&BaselineComparison::default(), &policy),
            policy.tie_min
        );
    }

    #[test]
    fn equal_counts_take_tie_default() {
        let policy = RestPolicy::default();
        let comparison = labeled(&[
            ("EDA", Some(ELEVATED_BASELINE)),
            ("HR", Some(ELEVATED_LIVE)),
        ]);
        assert_eq!(decide_rest_time(&comparison, &policy), policy.tie_min);
    }

    #[test]
    fn baseline_majority_takes_baseline_duration() {
        let policy = RestPolicy::default();
        let comparison = labeled(&[
            ("EDA", Some(ELEVATED_BASELINE)),
            ("HR", Some(ELEVATED_BASELINE)),
            ("BI", Some(ELEVATED_LIVE)),
        ]);
        assert_eq!(
            decide_rest_time(&comparison, &policy),
            policy.baseline_dominant_min
        );
    }

    #[test]
    fn live_majority_takes_live_duration() {
        let policy = RestPolicy::default();
        let comparison = labeled(&[
            ("EDA", Some(ELEVATED_LIVE)),
            ("HR", Some(ELEVATED_LIVE)),
            ("BI", Some(ELEVATED_BASELINE)),
        ]);
        assert_eq!(
            decide_rest_time(&comparison, &policy),
            policy.live_dominant_min
        );
    }

    #[test]
    fn unrecognized_labels_never_count() {
        let policy = RestPolicy::default();
        let comparison = labeled(&[
            ("EDA", None),
            ("HR", Some("NaN")),
            ("BI", Some("Equal")),
            ("HRV", Some(ELEVATED_LIVE)),
        ]);
        assert_eq!(
            decide_rest_time(&comparison, &policy),
            policy.live_dominant_min
        );
    }

    #[test]
    fn labeled_payload_decodes_from_json() {
        let json = r#"{
            "EDA": {"baseline_avg": 0.42, "live_avg": 0.61, "elevated": "Live data"},
            "HR": {"baseline_avg": 71.0, "live_avg": 68.2, "elevated": "Baseline data"},
            "PG": {"baseline_avg": null, "live_avg": null, "elevated": null}
        }"#;
        let payload: ComparisonPayload = serde_json::from_str(json).unwrap();
        let comparison: BaselineComparison = payload.into();
        assert_eq!(comparison.len(), 3);
        assert_eq!(comparison.elevation_counts(), (1, 1));
    }

    #[test]
    fn means_payload_derives_the_same_counts() {
        let json = r#"{
            "baseline_means": {"EDA": 0.42, "HR": 71.0, "PG": null},
            "data_means": {"EDA": 0.61, "HR": 68.2, "PG": 1.0}
        }"#;
        let payload: ComparisonPayload = serde_json::from_str(json).unwrap();
        assert!(matches!(payload, ComparisonPayload::Means { .. }));
        let comparison: BaselineComparison = payload.into();
        assert_eq!(comparison.elevation_counts(), (1, 1));
    }
}
