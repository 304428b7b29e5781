// Measurement session state machine.
//
// One session owns the live count. The caller drives `tick()` at the sample
// cadence while the session is running; detection and storage calls are
// synchronous from that tick, which is fine at human-perceptible rates.

use std::collections::VecDeque;
use std::path::Path;

use chrono::{DateTime, Utc};
use image::RgbImage;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::schema::{self, BiomassRecord};
use crate::detect::{DetectionResult, Detector};
use crate::error::Result;

/// Frame supplier. The camera stack lives behind this seam; headless runs
/// use `DirectoryFrameSource` below.
pub trait FrameSource {
    fn next_frame(&mut self) -> Option<RgbImage>;

    fn release(&mut self) {}
}

/// Output of the externally supplied feed formula.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeedBreakdown {
    pub biomass: f64,
    pub feed: f64,
    pub protein: f64,
    pub filler: f64,
}

/// The feed/biomass formula is a collaborator, not part of this crate.
pub type ComputeFeed = fn(i64) -> FeedBreakdown;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Running,
    Stopped,
}

pub struct MeasurementSession<S: FrameSource, D: Detector> {
    status: SessionStatus,
    frames: S,
    detector: D,
    compute_feed: ComputeFeed,
    count: i64,
    last_result: Option<DetectionResult>,
    started_at: Option<DateTime<Utc>>,
}

impl<S: FrameSource, D: Detector> MeasurementSession<S, D> {
    pub fn new(frames: S, detector: D, compute_feed: ComputeFeed) -> Self {
        Self {
            status: SessionStatus::Idle,
            frames,
            detector,
            compute_feed,
            count: 0,
            last_result: None,
            started_at: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn count(&self) -> i64 {
        self.count
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Derived metrics for the current count.
    pub fn metrics(&self) -> FeedBreakdown {
        (self.compute_feed)(self.count)
    }

    /// Begin sampling. Restarting a running session is a no-op.
    pub fn start(&mut self) {
        if self.status == SessionStatus::Running {
            return;
        }
        self.status = SessionStatus::Running;
        self.started_at = Some(Utc::now());
        log::info!("Measurement session started");
    }

    /// One sampling step: pull a frame, detect, update the live count.
    /// Does nothing unless the session is running; a missing frame or a
    /// detector fault skips the tick rather than ending the session.
    pub fn tick(&mut self) -> Option<&DetectionResult> {
        if self.status != SessionStatus::Running {
            return None;
        }

        let Some(frame) = self.frames.next_frame() else {
            log::warn!("Frame source returned no frame, skipping tick");
            return None;
        };

        let result = self.detector.detect(&frame);
        self.count = result.count as i64;
        self.last_result = Some(result);
        self.last_result.as_ref()
    }

    /// Stop sampling, freezing the count at its last sampled value. Does not
    /// persist anything; that is what `save` is for.
    pub fn stop(&mut self) {
        if self.status == SessionStatus::Running {
            self.status = SessionStatus::Stopped;
            log::info!("Measurement session stopped at count {}", self.count);
        }
    }

    /// Discard the accumulated count and return to Idle. Storage untouched.
    pub fn reset(&mut self) {
        self.status = SessionStatus::Idle;
        self.count = 0;
        self.last_result = None;
        self.started_at = None;
        log::info!("Measurement session reset");
    }

    /// Persist the frozen count as a new record for the owner. Callable in
    /// any state; before a first run this records a zero count.
    pub fn save(&self, conn: &Connection, owner_id: &str) -> Result<BiomassRecord> {
        let breakdown = (self.compute_feed)(self.count);
        let record = schema::insert_record(
            conn,
            owner_id,
            self.count,
            breakdown.biomass,
            breakdown.feed,
        )?;
        log::info!(
            "Saved record {} (count {}, biomass {:.2})",
            record.record_id,
            record.shrimp_count,
            record.biomass
        );
        Ok(record)
    }

    /// Release the underlying frame source.
    pub fn release(&mut self) {
        self.frames.release();
    }
}

/// Feeds image files from a directory as frames, in path order. Unreadable
/// files are skipped with a warning.
pub struct DirectoryFrameSource {
    paths: VecDeque<std::path::PathBuf>,
}

impl DirectoryFrameSource {
    pub fn open(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(crate::error::ShrimpScaleError::Other(format!(
                "Not a directory: {}",
                dir.display()
            )));
        }

        let mut paths: Vec<std::path::PathBuf> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("png") | Some("jpg") | Some("jpeg") | Some("bmp")
                )
            })
            .collect();
        paths.sort();

        log::info!("Frame source: {} image(s) under {}", paths.len(), dir.display());
        Ok(Self {
            paths: paths.into(),
        })
    }
}

impl FrameSource for DirectoryFrameSource {
    fn next_frame(&mut self) -> Option<RgbImage> {
        while let Some(path) = self.paths.pop_front() {
            match image::open(&path) {
                Ok(img) => return Some(img.to_rgb8()),
                Err(e) => {
                    log::warn!("Skipping unreadable frame {}: {}", path.display(), e);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations;
    use crate::detect::BoundingBox;
    use std::cell::RefCell;

    struct FakeFrames {
        remaining: usize,
    }

    impl FrameSource for FakeFrames {
        fn next_frame(&mut self) -> Option<RgbImage> {
            if self.remaining == 0 {
                return None;
            }
            self.remaining -= 1;
            Some(RgbImage::new(64, 48))
        }
    }

    /// Replays a scripted sequence of counts, then repeats the last one.
    struct ScriptedDetector {
        counts: RefCell<VecDeque<usize>>,
        last: RefCell<usize>,
    }

    impl ScriptedDetector {
        fn new(counts: &[usize]) -> Self {
            Self {
                counts: RefCell::new(counts.iter().copied().collect()),
                last: RefCell::new(0),
            }
        }
    }

    impl Detector for ScriptedDetector {
        fn detect(&self, _frame: &RgbImage) -> DetectionResult {
            let count = self
                .counts
                .borrow_mut()
                .pop_front()
                .unwrap_or(*self.last.borrow());
            *self.last.borrow_mut() = count;
            DetectionResult {
                count,
                boxes: vec![
                    BoundingBox {
                        x1: 0.0,
                        y1: 0.0,
                        x2: 1.0,
                        y2: 1.0
                    };
                    count
                ],
                inference_time_ms: 5.0,
            }
        }
    }

    fn test_compute_feed(count: i64) -> FeedBreakdown {
        FeedBreakdown {
            biomass: count as f64 * 0.25,
            feed: count as f64 * 0.5,
            protein: count as f64 * 0.125,
            filler: count as f64 * 0.0625,
        }
    }

    fn open_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrations::run_migrations(&conn).unwrap();
        conn
    }

    fn session(
        frames: usize,
        counts: &[usize],
    ) -> MeasurementSession<FakeFrames, ScriptedDetector> {
        MeasurementSession::new(
            FakeFrames { remaining: frames },
            ScriptedDetector::new(counts),
            test_compute_feed,
        )
    }

    #[test]
    fn test_tick_only_samples_while_running() {
        let mut s = session(10, &[3, 7]);
        assert_eq!(s.status(), SessionStatus::Idle);

        // Idle: ticks are no-ops
        assert!(s.tick().is_none());
        assert_eq!(s.count(), 0);

        s.start();
        assert_eq!(s.status(), SessionStatus::Running);
        s.tick();
        assert_eq!(s.count(), 3);
        s.tick();
        assert_eq!(s.count(), 7);
    }

    #[test]
    fn test_stop_freezes_count() {
        let mut s = session(10, &[5, 12]);
        s.start();
        s.tick();
        s.tick();
        s.stop();
        assert_eq!(s.status(), SessionStatus::Stopped);
        assert_eq!(s.count(), 12);

        // Ticks after stop change nothing
        assert!(s.tick().is_none());
        assert_eq!(s.count(), 12);
    }

    #[test]
    fn test_missing_frame_skips_tick_without_ending_session() {
        let mut s = session(1, &[4]);
        s.start();
        s.tick();
        assert_eq!(s.count(), 4);

        // Source exhausted: the tick is skipped, state and count survive
        assert!(s.tick().is_none());
        assert_eq!(s.status(), SessionStatus::Running);
        assert_eq!(s.count(), 4);
    }

    #[test]
    fn test_reset_zeroes_count_and_returns_to_idle() {
        let mut s = session(10, &[9]);
        s.start();
        s.tick();
        s.stop();
        s.reset();
        assert_eq!(s.status(), SessionStatus::Idle);
        assert_eq!(s.count(), 0);
        assert!(s.started_at().is_none());
    }

    #[test]
    fn test_save_persists_frozen_count() {
        let conn = open_test_db();
        let mut s = session(10, &[12]);
        s.start();
        s.tick();
        s.stop();

        let record = s.save(&conn, "owner-a").unwrap();
        assert_eq!(record.shrimp_count, 12);
        assert_eq!(record.biomass, 3.0);
        assert_eq!(record.feed_measurement, 6.0);
        assert!(!record.synced);

        // Save does not disturb the session
        assert_eq!(s.status(), SessionStatus::Stopped);
        assert_eq!(s.count(), 12);
    }

    #[test]
    fn test_save_before_any_run_records_zero() {
        let conn = open_test_db();
        let s = session(0, &[]);
        let record = s.save(&conn, "owner-a").unwrap();
        assert_eq!(record.shrimp_count, 0);
        assert_eq!(record.biomass, 0.0);
    }

    #[test]
    fn test_restarting_running_session_is_noop() {
        let mut s = session(10, &[2]);
        s.start();
        let started = s.started_at();
        s.tick();
        s.start();
        assert_eq!(s.started_at(), started);
        assert_eq!(s.count(), 2);
    }

    #[test]
    fn test_metrics_follow_live_count() {
        let mut s = session(10, &[8]);
        s.start();
        s.tick();
        let metrics = s.metrics();
        assert_eq!(metrics.biomass, 2.0);
        assert_eq!(metrics.feed, 4.0);
    }
}
