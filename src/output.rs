//! Frame sinks, ordered delivery and job metadata
//!
//! Every sink receives frames strictly in index order. When frames are
//! rendered on several workers they pass through a `ReorderBuffer` first.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::error::{RenderError, RenderResult};
use crate::renderer::Frame;

/// Consumer of rendered frames
pub trait FrameSink {
    fn write_frame(&mut self, frame: &Frame) -> RenderResult<()>;

    /// Called once after the last frame
    fn finish(&mut self) -> RenderResult<()> {
        Ok(())
    }
}

/// Checks that frames arrive in order and at the expected size
#[derive(Debug, Clone)]
struct FrameGate {
    width: u32,
    height: u32,
    next: u64,
}

impl FrameGate {
    fn new(width: u32, height: u32) -> Self {
        Self { width, height, next: 0 }
    }

    fn admit(&mut self, frame: &Frame) -> RenderResult<()> {
        if frame.index != self.next {
            return Err(RenderError::OutOfOrder {
                expected: self.next,
                got: frame.index,
            });
        }
        if (frame.width, frame.height) != (self.width, self.height) {
            return Err(RenderError::SizeMismatch {
                expected: (self.width, self.height),
                actual: (frame.width, frame.height),
            });
        }
        self.next += 1;
        Ok(())
    }
}

/// Writes `frame_000000.png`, `frame_000001.png`, ... into a directory
#[derive(Debug)]
pub struct PngSequence {
    dir: PathBuf,
    gate: FrameGate,
}

impl PngSequence {
    pub fn new(dir: impl Into<PathBuf>, width: u32, height: u32) -> RenderResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            gate: FrameGate::new(width, height),
        })
    }

    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("frame_{index:06}.png"))
    }

    /// Frames written so far
    pub fn written(&self) -> u64 {
        self.gate.next
    }
}

impl FrameSink for PngSequence {
    fn write_frame(&mut self, frame: &Frame) -> RenderResult<()> {
        self.gate.admit(frame)?;
        image::save_buffer(
            self.frame_path(frame.index),
            frame.as_bytes(),
            frame.width,
            frame.height,
            image::ExtendedColorType::Rgba8,
        )?;
        Ok(())
    }

    fn finish(&mut self) -> RenderResult<()> {
        log::info!("Wrote {} frames to {}", self.gate.next, self.dir.display());
        Ok(())
    }
}

/// Keeps every frame in memory
#[derive(Debug)]
pub struct MemorySink {
    gate: FrameGate,
    frames: Vec<Frame>,
}

impl MemorySink {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            gate: FrameGate::new(width, height),
            frames: Vec::new(),
        }
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, frame: &Frame) -> RenderResult<()> {
        self.gate.admit(frame)?;
        self.frames.push(frame.clone());
        Ok(())
    }
}

/// Counts frames and bytes without keeping them
#[derive(Debug)]
pub struct CountingSink {
    gate: FrameGate,
    bytes: u64,
}

impl CountingSink {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            gate: FrameGate::new(width, height),
            bytes: 0,
        }
    }

    pub fn frames(&self) -> u64 {
        self.gate.next
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl FrameSink for CountingSink {
    fn write_frame(&mut self, frame: &Frame) -> RenderResult<()> {
        self.gate.admit(frame)?;
        self.bytes += frame.as_bytes().len() as u64;
        Ok(())
    }
}

/// Restores index order for items completed out of order
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    next: u64,
    pending: BTreeMap<u64, T>,
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ReorderBuffer<T> {
    pub fn new() -> Self {
        Self {
            next: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Index of the next item to release
    pub fn next_index(&self) -> u64 {
        self.next
    }

    /// Items held back waiting for an earlier index
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Accept an item; stale or duplicate indices are rejected
    pub fn push(&mut self, index: u64, item: T) -> RenderResult<()> {
        if index < self.next || self.pending.contains_key(&index) {
            return Err(RenderError::OutOfOrder {
                expected: self.next,
                got: index,
            });
        }
        self.pending.insert(index, item);
        Ok(())
    }

    /// Release the next item if it has arrived
    pub fn pop_ready(&mut self) -> Option<T> {
        let item = self.pending.remove(&self.next)?;
        self.next += 1;
        Some(item)
    }

    /// Release every consecutive item that is ready
    pub fn drain_ready(&mut self) -> Vec<T> {
        std::iter::from_fn(|| self.pop_ready()).collect()
    }
}

/// Description of a finished video job for the muxer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub duration: f32,
    pub frame_count: u64,
    /// Directory holding the frame sequence
    pub file_path: String,
    /// Unix seconds
    pub creation_timestamp: u64,
}

impl VideoMetadata {
    pub fn new(config: &SimulationConfig, frame_count: u64, frames_dir: &Path) -> Self {
        let creation_timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            width: config.width,
            height: config.height,
            fps: config.fps,
            duration: config.duration,
            frame_count,
            file_path: frames_dir.display().to_string(),
            creation_timestamp,
        }
    }
}

/// Serialize `value` as pretty JSON to `path`
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)
}
