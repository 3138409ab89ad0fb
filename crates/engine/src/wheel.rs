//! Spin wheel geometry and animation timing.
//!
//! The wheel is split in equal segments, segment `i` covering
//! `[i·w, (i+1)·w)` degrees with `w = 360 / n`. The pointer is fixed at
//! [`POINTER_ANGLE`] and only the dial rotates. A play computes a single
//! rotation target that centres the winner's segment under the pointer, and
//! schedules exactly one completion after [`SPIN_DURATION`].
//!
//! Frames are not computed here: [`SpinPlan::angle_at`] samples the ease-out
//! curve for whatever renderer is attached.

use std::time::Duration;

use api_types::prize::Prize;
use tokio::{sync::oneshot, task::JoinHandle, time::Instant};
use uuid::Uuid;

use crate::WheelError;

pub const FULL_TURN: f64 = 360.0;
/// Angle of the fixed indicator, top of the dial.
pub const POINTER_ANGLE: f64 = 0.0;
pub const MIN_REVOLUTIONS: u32 = 5;
pub const SPIN_DURATION: Duration = Duration::from_millis(5000);

/// Normalize an angle into `[0, 360)`.
pub fn normalize(angle: f64) -> f64 {
    let normalized = angle.rem_euclid(FULL_TURN);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs.
    if normalized >= FULL_TURN {
        0.0
    } else {
        normalized
    }
}

pub fn segment_width(count: usize) -> f64 {
    FULL_TURN / count as f64
}

/// Dial angle (mod 360) that puts the centre of `winner` under the pointer.
pub fn target_angle(count: usize, winner: usize) -> f64 {
    normalize(POINTER_ANGLE - (winner as f64 + 0.5) * segment_width(count))
}

/// Total rotation for the next play.
///
/// At least [`MIN_REVOLUTIONS`] full turns are added to `previous`, then the
/// smallest non-negative adjustment that lands on [`target_angle`]. The
/// result is always strictly greater than `previous`.
pub fn next_rotation(previous: f64, count: usize, winner: usize) -> f64 {
    let base = previous + f64::from(MIN_REVOLUTIONS) * FULL_TURN;
    let adjustment = normalize(target_angle(count, winner) - normalize(base));
    base + adjustment
}

/// Ease-out cubic: velocity `3(1 - t)^2` decays monotonically to zero at `t = 1`.
pub fn ease_out(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

/// One continuous transition from `from` to `to`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpinPlan {
    pub from: f64,
    pub to: f64,
    pub duration: Duration,
    pub winner_index: usize,
}

impl SpinPlan {
    pub fn progress(&self, elapsed: Duration) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
    }

    pub fn angle_at(&self, elapsed: Duration) -> f64 {
        self.from + (self.to - self.from) * ease_out(self.progress(elapsed))
    }
}

/// Fired once per play when the animation budget has elapsed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpinCompleted {
    pub play: u64,
    pub winner_index: usize,
    pub rotation: f64,
}

/// Receiving side of the completion signal of a single play.
#[derive(Debug)]
pub struct SpinCompletion {
    receiver: oneshot::Receiver<SpinCompleted>,
}

impl SpinCompletion {
    /// Wait for the completion. `None` means the wheel was dropped first and
    /// its timer cancelled.
    ///
    /// Cancel safe. Must not be awaited again once it returned.
    pub async fn wait(&mut self) -> Option<SpinCompleted> {
        (&mut self.receiver).await.ok()
    }
}

/// Timer task of a pending completion. Aborted when dropped.
#[derive(Debug)]
struct SpinTimer {
    handle: JoinHandle<()>,
}

impl SpinTimer {
    fn schedule(duration: Duration, signal: SpinCompleted) -> (Self, SpinCompletion) {
        let (sender, receiver) = oneshot::channel();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            tracing::debug!("spin {} completed", signal.play);
            let _ = sender.send(signal);
        });
        (Self { handle }, SpinCompletion { receiver })
    }

    fn is_pending(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for SpinTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Segment as laid out on the dial, in wheel-local degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentArc<'a> {
    pub start: f64,
    pub end: f64,
    pub prize: &'a Prize,
}

#[derive(Debug)]
pub struct Wheel {
    segments: Vec<Prize>,
    rotation: f64,
    winner: Option<usize>,
    spinning: bool,
    plays: u64,
    active: Option<(SpinPlan, Instant)>,
    timer: Option<SpinTimer>,
    duration: Duration,
}

impl Wheel {
    /// Build a wheel. Segment order is frozen from here on.
    pub fn new(segments: Vec<Prize>) -> Result<Self, WheelError> {
        Self::with_duration(segments, SPIN_DURATION)
    }

    pub fn with_duration(segments: Vec<Prize>, duration: Duration) -> Result<Self, WheelError> {
        if segments.is_empty() {
            return Err(WheelError::NoSegments);
        }
        Ok(Self {
            segments,
            rotation: 0.0,
            winner: None,
            spinning: false,
            plays: 0,
            active: None,
            timer: None,
            duration,
        })
    }

    pub fn segments(&self) -> &[Prize] {
        &self.segments
    }

    pub fn arcs(&self) -> impl Iterator<Item = SegmentArc<'_>> {
        let width = segment_width(self.segments.len());
        self.segments
            .iter()
            .enumerate()
            .map(move |(i, prize)| SegmentArc {
                start: i as f64 * width,
                end: (i + 1) as f64 * width,
                prize,
            })
    }

    pub fn index_of(&self, prize_id: Uuid) -> Option<usize> {
        self.segments.iter().position(|p| p.id == prize_id)
    }

    /// Rotation reached (or being reached) by the last play.
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn winner(&self) -> Option<&Prize> {
        self.winner.and_then(|i| self.segments.get(i))
    }

    pub fn is_spinning(&self) -> bool {
        self.spinning && self.timer.as_ref().is_some_and(SpinTimer::is_pending)
    }

    /// Clear the visual spinning flag. A pending completion still fires.
    pub fn stop_spinning(&mut self) {
        self.spinning = false;
    }

    /// Current dial angle, sampled on the ease-out curve while a play runs.
    pub fn angle_now(&self) -> f64 {
        match self.active {
            Some((plan, started)) if self.is_spinning() => plan.angle_at(started.elapsed()),
            _ => self.rotation,
        }
    }

    /// Index of the segment currently under the pointer at `rotation`.
    pub fn segment_at(&self, rotation: f64) -> usize {
        let local = normalize(POINTER_ANGLE - rotation);
        let index = (local / segment_width(self.segments.len())).floor() as usize;
        index.min(self.segments.len() - 1)
    }

    /// Start a play toward `winner_index`.
    pub fn play(&mut self, winner_index: usize) -> Result<(SpinPlan, SpinCompletion), WheelError> {
        let count = self.segments.len();
        if winner_index >= count {
            return Err(WheelError::WinnerOutOfRange {
                index: winner_index,
                count,
            });
        }
        if self.timer.as_ref().is_some_and(SpinTimer::is_pending) {
            return Err(WheelError::AlreadySpinning);
        }

        let plan = SpinPlan {
            from: self.rotation,
            to: next_rotation(self.rotation, count, winner_index),
            duration: self.duration,
            winner_index,
        };
        self.plays += 1;
        let (timer, completion) = SpinTimer::schedule(
            self.duration,
            SpinCompleted {
                play: self.plays,
                winner_index,
                rotation: plan.to,
            },
        );

        tracing::debug!(
            "spin {} toward segment {winner_index}: {:.1} -> {:.1}",
            self.plays,
            plan.from,
            plan.to
        );
        self.rotation = plan.to;
        self.winner = Some(winner_index);
        self.spinning = true;
        self.active = Some((plan, Instant::now()));
        self.timer = Some(timer);

        Ok((plan, completion))
    }
}
