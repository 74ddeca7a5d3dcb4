use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::f32::consts::PI;
use std::time::{Duration, Instant};

/// Fire-and-forget sine tones for countdown feedback. Playback failures are
/// silently ignored — the clock on screen is the source of truth, the tone
/// is a courtesy. Holding the stream keeps it alive; `tick` drops it once
/// the tone has played out.
pub struct ToneFeedback {
    stream: Option<cpal::Stream>,
    ends_at: Option<Instant>,
    pub enabled: bool,
}

impl ToneFeedback {
    pub fn new(enabled: bool) -> Self {
        Self {
            stream: None,
            ends_at: None,
            enabled,
        }
    }

    /// Release the output stream once the current tone is done.
    pub fn tick(&mut self) {
        if let Some(ends_at) = self.ends_at {
            if Instant::now() >= ends_at {
                self.stream = None;
                self.ends_at = None;
            }
        }
    }

    /// Short high tick, once per countdown second.
    pub fn second_tick(&mut self) {
        self.play(1000.0, 30);
    }

    /// Longer low tone when the countdown runs out.
    pub fn finished(&mut self) {
        self.play(600.0, 400);
    }

    fn play(&mut self, freq_hz: f32, dur_ms: u64) {
        if !self.enabled {
            return;
        }
        let host = cpal::default_host();
        let device = match host.default_output_device() {
            Some(device) => device,
            None => return,
        };
        let cfg = match device.default_output_config() {
            Ok(cfg) => cfg,
            Err(_) => return,
        };
        let sample_rate = cfg.sample_rate().0 as f32;
        let channels = cfg.channels() as usize;
        let total_samples = (dur_ms as f32 * sample_rate / 1000.0) as usize;
        let mut written = 0usize;
        let mut t = 0f32;
        let stream = match cfg.sample_format() {
            cpal::SampleFormat::F32 => device.build_output_stream(
                &cfg.config(),
                move |data: &mut [f32], _| {
                    for frame in data.chunks_mut(channels) {
                        let sample = if written < total_samples {
                            (2.0 * PI * freq_hz * t / sample_rate).sin() * 0.2
                        } else {
                            0.0
                        };
                        for ch in frame {
                            *ch = sample;
                        }
                        written = written.saturating_add(1);
                        t += 1.0;
                    }
                },
                |_| {},
                None,
            ),
            _ => return,
        };
        if let Ok(stream) = stream {
            let _ = stream.play();
            self.stream = Some(stream);
            self.ends_at = Some(Instant::now() + Duration::from_millis(dur_ms + 50));
        }
    }
}
