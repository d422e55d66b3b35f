//! Event delivery for the external audio generator
//!
//! Events leave the simulation through an `EventSink`, either collected in an
//! append-only `EventLog` (batch) or streamed over a channel as they happen.
//! `AudioCue` translates an event into the note/gain parameters the audio
//! generator plays.

use std::path::Path;
use std::sync::mpsc::Sender;

use serde::{Deserialize, Serialize};

use crate::error::{EventError, EventResult};
use crate::sim::{EventKind, SimulationEvent};

/// Receives simulation events in emission order
pub trait EventSink {
    fn emit(&mut self, event: &SimulationEvent) -> EventResult<()>;
}

/// Append-only, time-ordered event collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventLog {
    events: Vec<SimulationEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[SimulationEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<SimulationEvent> {
        self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events of `kind` (game overs match regardless of reason)
    pub fn count(&self, kind: &EventKind) -> usize {
        self.events
            .iter()
            .filter(|e| std::mem::discriminant(&e.kind) == std::mem::discriminant(kind))
            .count()
    }

    /// JSON array of all events
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.events)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json)
    }

    /// Audio cues for every event, in order
    pub fn cues(&self) -> Vec<AudioCue> {
        self.events.iter().map(AudioCue::from_event).collect()
    }
}

impl EventSink for EventLog {
    fn emit(&mut self, event: &SimulationEvent) -> EventResult<()> {
        if let Some(last) = self.events.last() {
            if event.time < last.time {
                return Err(EventError::OutOfOrder {
                    last: last.time,
                    got: event.time,
                });
            }
        }
        self.events.push(event.clone());
        Ok(())
    }
}

/// Streaming delivery; fails once the receiver is dropped
impl EventSink for Sender<SimulationEvent> {
    fn emit(&mut self, event: &SimulationEvent) -> EventResult<()> {
        self.send(event.clone()).map_err(|_| EventError::Disconnected)
    }
}

/// Sound category for a cue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueKind {
    /// Pitched note on an arc bounce
    Note,
    /// Whoosh through a gap
    Passage,
    /// Ring breaking apart
    Explosion,
    /// End of the run
    Finale,
}

/// Parameters for one sound in the generated soundtrack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioCue {
    pub kind: CueKind,
    pub time: f64,
    /// Scale degree (0-6), rising with ball speed
    pub note: u8,
    /// Octave shift (0-2), rising with ball speed
    pub octave: u8,
    /// Volume (0.05-1.0) from impact strength
    pub gain: f32,
    pub ring_index: Option<usize>,
    pub ball_index: Option<usize>,
}

impl AudioCue {
    pub fn from_event(event: &SimulationEvent) -> Self {
        let speed = event.velocity.max(0.0);
        let kind = match event.kind {
            EventKind::Bounce => CueKind::Note,
            EventKind::PassThrough => CueKind::Passage,
            EventKind::RingDestroyed => CueKind::Explosion,
            EventKind::GameOver { .. } => CueKind::Finale,
        };
        let gain = match kind {
            CueKind::Note => (event.impact / 1000.0).clamp(0.05, 1.0),
            CueKind::Passage => 0.3,
            CueKind::Explosion | CueKind::Finale => 1.0,
        };
        Self {
            kind,
            time: event.time,
            note: (speed / 150.0).min(6.0) as u8,
            octave: (speed / 300.0).min(2.0) as u8,
            gain,
            ring_index: event.ring_index,
            ball_index: event.ball_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::GameOverReason;
    use std::sync::mpsc;

    fn bounce(time: f64, speed: f32, impact: f32) -> SimulationEvent {
        SimulationEvent::new(EventKind::Bounce, time, (time * 240.0) as u64)
            .with_ring(0)
            .with_ball(0)
            .with_velocity(speed)
            .with_impact(impact)
    }

    #[test]
    fn test_log_appends_in_order() {
        let mut log = EventLog::new();
        log.emit(&bounce(0.5, 300.0, 200.0)).unwrap();
        log.emit(&bounce(0.5, 310.0, 210.0)).unwrap();
        log.emit(&bounce(0.75, 320.0, 220.0)).unwrap();
        assert_eq!(log.len(), 3);

        let err = log.emit(&bounce(0.25, 100.0, 50.0)).unwrap_err();
        assert_eq!(err, EventError::OutOfOrder { last: 0.75, got: 0.25 });
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_log_counts_and_json() {
        let mut log = EventLog::new();
        log.emit(&bounce(0.1, 300.0, 200.0)).unwrap();
        log.emit(&SimulationEvent::game_over(GameOverReason::DurationElapsed, 1.0, 240))
            .unwrap();
        assert_eq!(log.count(&EventKind::Bounce), 1);
        assert_eq!(
            log.count(&EventKind::GameOver {
                reason: GameOverReason::RingsCleared
            }),
            1
        );

        let parsed: Vec<SimulationEvent> = serde_json::from_str(&log.to_json().unwrap()).unwrap();
        assert_eq!(parsed, log.events());
    }

    #[test]
    fn test_channel_sink_streams_events() {
        let (mut tx, rx) = mpsc::channel::<SimulationEvent>();
        tx.emit(&bounce(0.1, 300.0, 200.0)).unwrap();
        assert_eq!(rx.recv().unwrap().time, 0.1);

        drop(rx);
        assert_eq!(tx.emit(&bounce(0.2, 300.0, 200.0)), Err(EventError::Disconnected));
    }

    #[test]
    fn test_cue_mapping() {
        let slow = AudioCue::from_event(&bounce(0.1, 100.0, 20.0));
        assert_eq!(slow.kind, CueKind::Note);
        assert_eq!((slow.note, slow.octave), (0, 0));
        assert_eq!(slow.gain, 0.05);

        let fast = AudioCue::from_event(&bounce(0.2, 2000.0, 5000.0));
        assert_eq!((fast.note, fast.octave), (6, 2));
        assert_eq!(fast.gain, 1.0);

        let mid = AudioCue::from_event(&bounce(0.3, 450.0, 500.0));
        assert_eq!((mid.note, mid.octave), (3, 1));
        assert!((mid.gain - 0.5).abs() < 1e-6);

        let boom = AudioCue::from_event(
            &SimulationEvent::new(EventKind::RingDestroyed, 0.4, 96).with_ring(2),
        );
        assert_eq!(boom.kind, CueKind::Explosion);
        assert_eq!(boom.ring_index, Some(2));
    }
}
