//! Per-video job orchestration
//!
//! A `VideoJob` owns one validated config. Running it builds a `Session`,
//! snapshots it once per output frame, renders the snapshots (inline or on a
//! rayon pool) and hands frames and events to their sinks in order.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::bridge::{EventLog, EventSink};
use crate::config::SimulationConfig;
use crate::error::{ConfigResult, JobError, JobResult, RenderResult};
use crate::output::{FrameSink, PngSequence, ReorderBuffer, VideoMetadata, write_json};
use crate::renderer::{Frame, FrameRenderer};
use crate::sim::{FrameSnapshot, GameOverInfo, GameOverReason, Session, SimulationEvent};

/// Shared cancellation flag, checked before every physics step
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of a physics-only run
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    pub events: Vec<SimulationEvent>,
    pub frame_count: u64,
    pub outcome: Option<GameOverInfo>,
}

/// Summary of a rendered job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub id: String,
    pub frame_count: u64,
    pub event_count: usize,
    pub outcome: Option<GameOverInfo>,
    /// Output directory when written to disk
    pub output: Option<PathBuf>,
    pub elapsed_secs: f64,
}

/// One video to simulate and render
#[derive(Debug, Clone)]
pub struct VideoJob {
    pub id: String,
    pub config: Arc<SimulationConfig>,
    /// Render threads; 0 or 1 renders inline
    pub workers: usize,
}

impl VideoJob {
    pub fn new(id: impl Into<String>, config: SimulationConfig) -> ConfigResult<Self> {
        Ok(Self {
            id: id.into(),
            config: Arc::new(config.validated()?),
            workers: 1,
        })
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn total_frames(&self) -> u64 {
        self.config.total_frames()
    }

    /// Run the physics for every frame without rendering
    pub fn simulate(&self, cancel: &CancelToken) -> JobResult<SimulationReport> {
        let mut log = EventLog::new();
        let mut session = Session::from_shared(Arc::clone(&self.config))?;
        let frame_count = drive(&mut session, cancel, &mut log, |_| Ok(()))?;
        Ok(SimulationReport {
            events: log.into_events(),
            frame_count,
            outcome: session.game_over().cloned(),
        })
    }

    /// Simulate and render, delivering frames and events in order
    pub fn run(
        &self,
        frames: &mut dyn FrameSink,
        events: &mut dyn EventSink,
        cancel: &CancelToken,
    ) -> JobResult<JobReport> {
        let started = Instant::now();
        log::info!(
            "Job '{}': {} frames at {}x{} ({} workers)",
            self.id,
            self.total_frames(),
            self.config.width,
            self.config.height,
            self.workers.max(1)
        );

        let mut session = Session::from_shared(Arc::clone(&self.config))?;
        let renderer = FrameRenderer::new(Arc::clone(&self.config));
        let mut counter = CountingEvents { inner: events, count: 0 };

        let frame_count = if self.workers <= 1 {
            drive(&mut session, cancel, &mut counter, |snapshot| {
                let frame = renderer
                    .render(&snapshot)
                    .map_err(|source| JobError::Render { frame: snapshot.index, source })?;
                deliver(frames, &frame)
            })?
        } else {
            self.run_parallel(&mut session, &renderer, frames, &mut counter, cancel)?
        };
        frames
            .finish()
            .map_err(|source| JobError::Render { frame: frame_count, source })?;

        let report = JobReport {
            id: self.id.clone(),
            frame_count,
            event_count: counter.count,
            outcome: session.game_over().cloned(),
            output: None,
            elapsed_secs: started.elapsed().as_secs_f64(),
        };
        log::info!(
            "Job '{}' finished: {} frames, {} events in {:.2}s",
            report.id,
            report.frame_count,
            report.event_count,
            report.elapsed_secs
        );
        Ok(report)
    }

    /// Render into `dir/frames/` and write `events.json`, `cues.json` and
    /// `metadata.json` next to it
    pub fn run_to_dir(&self, dir: &Path, cancel: &CancelToken) -> JobResult<JobReport> {
        let frames_dir = dir.join("frames");
        let mut frames = PngSequence::new(&frames_dir, self.config.width, self.config.height)
            .map_err(|source| JobError::Render { frame: 0, source })?;
        let mut log = EventLog::new();

        let mut report = self.run(&mut frames, &mut log, cancel)?;

        log.write_json(dir.join("events.json"))?;
        write_json(&dir.join("cues.json"), &log.cues())?;
        let metadata = VideoMetadata::new(&self.config, report.frame_count, &frames_dir);
        write_json(&dir.join("metadata.json"), &metadata)?;

        report.output = Some(dir.to_path_buf());
        Ok(report)
    }

    fn run_parallel(
        &self,
        session: &mut Session,
        renderer: &FrameRenderer,
        frames: &mut dyn FrameSink,
        events: &mut dyn EventSink,
        cancel: &CancelToken,
    ) -> JobResult<u64> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("render-{i}"))
            .build()?;
        let max_in_flight = self.workers * 2;

        pool.in_place_scope(|scope| {
            let (tx, rx) = mpsc::channel::<(u64, RenderResult<Frame>)>();
            let mut reorder = ReorderBuffer::new();
            let mut in_flight = 0usize;

            let frame_count = drive(session, cancel, events, |snapshot| {
                while in_flight >= max_in_flight {
                    collect_one(&rx, &mut reorder, frames)?;
                    in_flight -= 1;
                }
                let tx = tx.clone();
                scope.spawn(move |_| {
                    let index = snapshot.index;
                    // Receiver is gone only when the job already failed
                    let _ = tx.send((index, renderer.render(&snapshot)));
                });
                in_flight += 1;
                Ok(())
            })?;

            drop(tx);
            while in_flight > 0 {
                collect_one(&rx, &mut reorder, frames)?;
                in_flight -= 1;
            }
            Ok(frame_count)
        })
    }
}

/// Wait for one rendered frame and forward everything now in order
fn collect_one(
    rx: &Receiver<(u64, RenderResult<Frame>)>,
    reorder: &mut ReorderBuffer<Frame>,
    frames: &mut dyn FrameSink,
) -> JobResult<()> {
    let (index, result) = rx.recv().map_err(|_| JobError::WorkerLost {
        frame: reorder.next_index(),
    })?;
    let frame = result.map_err(|source| JobError::Render { frame: index, source })?;
    reorder
        .push(index, frame)
        .map_err(|source| JobError::Render { frame: index, source })?;
    for frame in reorder.drain_ready() {
        deliver(frames, &frame)?;
    }
    Ok(())
}

fn deliver(frames: &mut dyn FrameSink, frame: &Frame) -> JobResult<()> {
    frames
        .write_frame(frame)
        .map_err(|source| JobError::Render { frame: frame.index, source })
}

/// Step the session through every output frame
///
/// `on_snapshot` sees the state at the start of each frame. Events are
/// emitted as soon as their frame has been stepped. Returns the number of
/// frames produced.
fn drive(
    session: &mut Session,
    cancel: &CancelToken,
    events: &mut dyn EventSink,
    mut on_snapshot: impl FnMut(FrameSnapshot) -> JobResult<()>,
) -> JobResult<u64> {
    let total = session.config().total_frames();
    let mut batch = Vec::new();

    for frame in 0..total {
        if cancel.is_cancelled() {
            return Err(JobError::Cancelled { frame });
        }
        on_snapshot(session.snapshot())?;

        batch.clear();
        let completed = session.advance_frame_checked(&mut batch, || !cancel.is_cancelled());
        for event in &batch {
            events.emit(event)?;
        }
        if !completed {
            log::info!("Cancelled at frame {}", frame);
            return Err(JobError::Cancelled { frame });
        }
        if let Some(fault) = session.fault() {
            log::error!("Aborting at frame {}: {}", frame, fault);
            return Err(JobError::Physics(fault.clone()));
        }
    }

    if let Some(event) = session.finish(GameOverReason::DurationElapsed) {
        events.emit(&event)?;
    }
    Ok(total)
}

/// Forwards events while counting them
struct CountingEvents<'a> {
    inner: &'a mut dyn EventSink,
    count: usize,
}

impl EventSink for CountingEvents<'_> {
    fn emit(&mut self, event: &SimulationEvent) -> crate::error::EventResult<()> {
        self.inner.emit(event)?;
        self.count += 1;
        Ok(())
    }
}

/// Run independent jobs in parallel, each into `out_root/<id>/`
pub fn run_batch(
    jobs: &[VideoJob],
    out_root: &Path,
    cancel: &CancelToken,
) -> Vec<(String, JobResult<JobReport>)> {
    log::info!("Batch of {} jobs into {}", jobs.len(), out_root.display());
    jobs.par_iter()
        .map(|job| {
            let result = job.run_to_dir(&out_root.join(&job.id), cancel);
            if let Err(e) = &result {
                log::error!("Job '{}' failed: {}", job.id, e);
            }
            (job.id.clone(), result)
        })
        .collect()
}
