use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::ClassifierClient;
use crate::config::EngagementConfig;
use crate::session::SessionEvent;

use super::capture::FrameSource;
use super::window::{EngagementAlert, EngagementClass, EngagementWindow};

/// Result of folding one classifier verdict into the pipeline.
#[derive(Debug, Default)]
pub struct SampleOutcome {
    pub alert: Option<EngagementAlert>,
    /// Set when the inattentive-minutes rollup increased past zero.
    pub rollup_minutes: Option<u64>,
}

/// Periodic engagement sampling. Runs only while local video is disabled;
/// capture and classification happen off the session actor, results come
/// back as events tagged with a generation so late verdicts from a stopped
/// run are discarded.
pub struct EngagementMonitor {
    config: EngagementConfig,
    window: EngagementWindow,
    generation: u64,
    sampler: Option<JoinHandle<()>>,
    reported_minutes: u64,
}

impl EngagementMonitor {
    pub fn new(config: EngagementConfig) -> Self {
        let window = EngagementWindow::new(config.window_size, config.sample_interval);
        Self {
            config,
            window,
            generation: 0,
            sampler: None,
            reported_minutes: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.sampler.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn inattentive_minutes(&self) -> u64 {
        self.window.inattentive_minutes()
    }

    /// Start the periodic sampler. A second start while running is a no-op.
    pub fn start(
        &mut self,
        frames: Arc<dyn FrameSource>,
        classifier: ClassifierClient,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) {
        if self.sampler.is_some() {
            return;
        }

        self.generation += 1;
        self.window.reset_alert_counters();
        let generation = self.generation;
        let interval = self.config.sample_interval;
        let max_width = self.config.snapshot_max_width;
        let max_height = self.config.snapshot_max_height;

        tracing::info!(generation = generation, "Engagement detection started");

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it so sampling starts
            // one interval after video goes dark
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let frame = match frames.capture() {
                    Ok(frame) => frame.downscale_to_fit(max_width, max_height),
                    Err(e) => {
                        tracing::warn!(error = %e, "Snapshot capture failed, sample skipped");
                        continue;
                    }
                };

                // Classification must never block the next tick or the
                // session actor; a hung call just never reports back
                let classifier = classifier.clone();
                let events = events.clone();
                tokio::spawn(async move {
                    match classifier.classify(&frame).await {
                        Ok(class) => {
                            let _ = events.send(SessionEvent::EngagementSample {
                                class,
                                generation,
                            });
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Classifier call failed, sample dropped");
                        }
                    }
                });
            }
        });

        self.sampler = Some(handle);
    }

    /// Cancel the sampler immediately and invalidate in-flight verdicts.
    /// Window contents are kept; only the alert counters are zeroed.
    pub fn stop(&mut self) {
        if let Some(handle) = self.sampler.take() {
            handle.abort();
            tracing::info!(generation = self.generation, "Engagement detection stopped");
        }
        self.generation += 1;
        self.window.reset_alert_counters();
    }

    /// Fold one classifier verdict into the window. Stale generations are
    /// discarded (the run they belong to has stopped).
    pub fn on_sample(&mut self, class: EngagementClass, generation: u64) -> SampleOutcome {
        if generation != self.generation {
            tracing::debug!(
                sample_generation = generation,
                current_generation = self.generation,
                "Discarding stale engagement sample"
            );
            return SampleOutcome::default();
        }

        let alert = self.window.push(class, Instant::now());

        let minutes = self.window.inattentive_minutes();
        let rollup_minutes = if minutes > self.reported_minutes && minutes > 0 {
            self.reported_minutes = minutes;
            Some(minutes)
        } else {
            None
        };

        SampleOutcome {
            alert,
            rollup_minutes,
        }
    }
}

impl Drop for EngagementMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.sampler.take() {
            handle.abort();
        }
    }
}
