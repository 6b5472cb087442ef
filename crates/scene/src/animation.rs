//! Keyframe animation of node TRS.
//!
//! A [`KeyframeTrack`] drives one property of one node. Sampling finds the
//! bracketing keyframe pair with a binary search over the timestamps and
//! clamps outside the key range. An [`AnimationClip`] groups tracks and is
//! applied to the graph between frames, driven by an [`AnimationClock`].

use glam::{Quat, Vec3, Vec4};
use tracing::debug;

use crate::error::{SceneError, SceneResult};
use crate::graph::{NodeId, SceneGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    Step,
    /// Hermite spline; values are stored as `(in_tangent, value, out_tangent)`
    /// triplets per key.
    CubicSpline,
}

pub trait Interpolate: Copy {
    fn lerp_value(start: Self, end: Self, t: f32) -> Self;

    /// Hermite interpolation. Tangents are scaled by the key interval `dt`.
    fn hermite(v0: Self, out_tangent0: Self, in_tangent1: Self, v1: Self, t: f32, dt: f32)
    -> Self;
}

/// Hermite basis weights `(s0, s1, s2, s3)` for value0, tangent0, value1,
/// tangent1.
fn hermite_basis(t: f32) -> (f32, f32, f32, f32) {
    let t2 = t * t;
    let t3 = t2 * t;
    let s2 = -2.0 * t3 + 3.0 * t2;
    let s3 = t3 - t2;
    let s0 = 1.0 - s2;
    let s1 = s3 - t2 + t;
    (s0, s1, s2, s3)
}

impl Interpolate for Vec3 {
    fn lerp_value(start: Self, end: Self, t: f32) -> Self {
        start.lerp(end, t)
    }

    fn hermite(v0: Self, out_tangent0: Self, in_tangent1: Self, v1: Self, t: f32, dt: f32) -> Self {
        let (s0, s1, s2, s3) = hermite_basis(t);
        v0 * s0 + out_tangent0 * dt * s1 + v1 * s2 + in_tangent1 * dt * s3
    }
}

impl Interpolate for Quat {
    fn lerp_value(start: Self, end: Self, t: f32) -> Self {
        start.slerp(end, t).normalize()
    }

    fn hermite(v0: Self, out_tangent0: Self, in_tangent1: Self, v1: Self, t: f32, dt: f32) -> Self {
        let (s0, s1, s2, s3) = hermite_basis(t);
        let result = Vec4::from(v0) * s0
            + Vec4::from(out_tangent0) * dt * s1
            + Vec4::from(v1) * s2
            + Vec4::from(in_tangent1) * dt * s3;
        Quat::from_vec4(result).normalize()
    }
}

/// Ordered keyframes of one value type.
#[derive(Debug, Clone)]
pub struct Keyframes<T: Interpolate> {
    times: Vec<f32>,
    values: Vec<T>,
    interpolation: Interpolation,
}

impl<T: Interpolate> Keyframes<T> {
    /// Validates and builds a keyframe sequence.
    ///
    /// Timestamps must be non-empty, finite and non-decreasing. `values`
    /// holds one entry per key, or three per key for cubic-spline.
    pub fn new(times: Vec<f32>, values: Vec<T>, interpolation: Interpolation) -> SceneResult<Self> {
        if times.is_empty() {
            return Err(SceneError::InvalidTrack("track has no keyframes".into()));
        }
        if times.iter().any(|t| !t.is_finite()) {
            return Err(SceneError::InvalidTrack("non-finite keyframe time".into()));
        }
        if times.windows(2).any(|pair| pair[1] < pair[0]) {
            return Err(SceneError::InvalidTrack(
                "keyframe times are not sorted".into(),
            ));
        }

        let per_key = match interpolation {
            Interpolation::CubicSpline => 3,
            Interpolation::Linear | Interpolation::Step => 1,
        };
        if values.len() != times.len() * per_key {
            return Err(SceneError::InvalidTrack(format!(
                "{} keyframes need {} values for {:?}, got {}",
                times.len(),
                times.len() * per_key,
                interpolation,
                values.len()
            )));
        }

        Ok(Self {
            times,
            values,
            interpolation,
        })
    }

    #[inline]
    pub fn times(&self) -> &[f32] {
        &self.times
    }

    #[inline]
    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    pub fn start_time(&self) -> f32 {
        self.times[0]
    }

    pub fn end_time(&self) -> f32 {
        self.times[self.times.len() - 1]
    }

    fn value_at(&self, index: usize) -> T {
        match self.interpolation {
            Interpolation::CubicSpline => self.values[index * 3 + 1],
            Interpolation::Linear | Interpolation::Step => self.values[index],
        }
    }

    /// Samples at `time`, clamping to the first / last key outside the
    /// key range.
    pub fn sample(&self, time: f32) -> T {
        // First key strictly after `time`.
        let next = self.times.partition_point(|&t| t <= time);
        if next == 0 {
            return self.value_at(0);
        }
        let index = next - 1;
        if next >= self.times.len() {
            return self.value_at(self.times.len() - 1);
        }

        let t0 = self.times[index];
        let t1 = self.times[next];
        let dt = t1 - t0;
        let t = if dt > 1e-6 {
            ((time - t0) / dt).clamp(0.0, 1.0)
        } else {
            0.0
        };

        match self.interpolation {
            Interpolation::Step => self.value_at(index),
            Interpolation::Linear => T::lerp_value(self.value_at(index), self.value_at(next), t),
            Interpolation::CubicSpline => {
                let prev = index * 3;
                let following = next * 3;
                T::hermite(
                    self.values[prev + 1],
                    self.values[prev + 2],
                    self.values[following],
                    self.values[following + 1],
                    t,
                    dt,
                )
            }
        }
    }
}

/// The node property a track writes, with its keyframes.
#[derive(Debug, Clone)]
pub enum TrackProperty {
    Translation(Keyframes<Vec3>),
    Rotation(Keyframes<Quat>),
    Scale(Keyframes<Vec3>),
}

impl TrackProperty {
    /// First and last keyframe time of the track.
    fn time_range(&self) -> (f32, f32) {
        match self {
            TrackProperty::Translation(keys) | TrackProperty::Scale(keys) => {
                (keys.start_time(), keys.end_time())
            }
            TrackProperty::Rotation(keys) => (keys.start_time(), keys.end_time()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct KeyframeTrack {
    pub target: NodeId,
    pub property: TrackProperty,
}

impl KeyframeTrack {
    pub fn new(target: NodeId, property: TrackProperty) -> Self {
        Self { target, property }
    }

    /// Writes the sampled value into the target node's TRS.
    pub fn apply(&self, time: f32, graph: &mut SceneGraph) -> SceneResult<()> {
        let node = graph.node_mut(self.target)?;
        let trs = node.local.trs_mut();
        match &self.property {
            TrackProperty::Translation(keys) => trs.translation = keys.sample(time),
            TrackProperty::Rotation(keys) => trs.rotation = keys.sample(time),
            TrackProperty::Scale(keys) => trs.scale = keys.sample(time),
        }
        Ok(())
    }
}

/// A named set of tracks played together.
///
/// The clip spans `[start, end]`: the earliest and latest keyframe over all
/// of its tracks. A clip without tracks spans `[0, 0]`.
#[derive(Debug, Clone)]
pub struct AnimationClip {
    pub name: String,
    pub tracks: Vec<KeyframeTrack>,
    pub start: f32,
    pub end: f32,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, tracks: Vec<KeyframeTrack>) -> Self {
        let (start, end) = tracks
            .iter()
            .map(|track| track.property.time_range())
            .reduce(|(start, end), (s, e)| (start.min(s), end.max(e)))
            .unwrap_or((0.0, 0.0));
        let name = name.into();
        debug!(
            "Animation clip '{}': {} tracks, {:.3}s..{:.3}s",
            name,
            tracks.len(),
            start,
            end
        );
        Self {
            name,
            tracks,
            start,
            end,
        }
    }

    /// Length of one loop in seconds.
    #[inline]
    pub fn duration(&self) -> f32 {
        self.end - self.start
    }

    /// Samples every track at `time` and writes the results into `graph`.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::UnknownNode`] if a track targets a node that
    /// is not in `graph`. Tracks before the failing one have already been
    /// applied.
    pub fn apply(&self, time: f32, graph: &mut SceneGraph) -> SceneResult<()> {
        for track in &self.tracks {
            track.apply(time, graph)?;
        }
        Ok(())
    }
}

/// Monotonic playback clock over `[start, end)` that wraps back to `start`
/// once it passes `end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationClock {
    pub time: f32,
    pub start: f32,
    pub end: f32,
    pub speed: f32,
    pub playing: bool,
}

impl AnimationClock {
    /// Creates a clock positioned at `start`. An inverted range collapses
    /// to `start`.
    pub fn new(start: f32, end: f32) -> Self {
        Self {
            time: start,
            start,
            end: end.max(start),
            speed: 1.0,
            playing: true,
        }
    }

    pub fn for_clip(clip: &AnimationClip) -> Self {
        Self::new(clip.start, clip.end)
    }

    #[inline]
    pub fn duration(&self) -> f32 {
        self.end - self.start
    }

    /// Advances by `dt` seconds scaled by `speed` and returns the new time.
    ///
    /// The result always lies in `[start, end)`; a zero-length range pins
    /// the clock at `start`.
    pub fn advance(&mut self, dt: f32) -> f32 {
        if !self.playing {
            return self.time;
        }
        let duration = self.duration();
        if duration <= 0.0 {
            self.time = self.start;
            return self.time;
        }
        let elapsed = self.time - self.start + dt * self.speed;
        self.time = self.start + elapsed.rem_euclid(duration);
        self.time
    }

    pub fn reset(&mut self) {
        self.time = self.start;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{LocalTransform, Trs};

    fn linear(times: &[f32], values: &[Vec3]) -> Keyframes<Vec3> {
        Keyframes::new(times.to_vec(), values.to_vec(), Interpolation::Linear).unwrap()
    }

    #[test]
    fn test_sample_hits_keys_exactly() {
        let keys = linear(&[0.0, 1.0, 3.0], &[Vec3::ZERO, Vec3::X, Vec3::Y * 4.0]);
        assert_eq!(keys.sample(0.0), Vec3::ZERO);
        assert_eq!(keys.sample(1.0), Vec3::X);
        assert_eq!(keys.sample(3.0), Vec3::Y * 4.0);
    }

    #[test]
    fn test_sample_interpolates_between_keys() {
        let keys = linear(&[0.0, 2.0], &[Vec3::ZERO, Vec3::new(2.0, 4.0, 0.0)]);
        assert!(keys.sample(0.5).abs_diff_eq(Vec3::new(0.5, 1.0, 0.0), 1e-6));
    }

    #[test]
    fn test_sample_clamps_outside_range() {
        let keys = linear(&[1.0, 2.0], &[Vec3::X, Vec3::Y]);
        assert_eq!(keys.sample(-5.0), Vec3::X);
        assert_eq!(keys.sample(0.999), Vec3::X);
        assert_eq!(keys.sample(10.0), Vec3::Y);
    }

    #[test]
    fn test_single_key_is_constant() {
        let keys = linear(&[0.5], &[Vec3::Z]);
        assert_eq!(keys.sample(0.0), Vec3::Z);
        assert_eq!(keys.sample(9.0), Vec3::Z);
    }

    #[test]
    fn test_step_holds_previous_key() {
        let keys = Keyframes::new(vec![0.0, 1.0], vec![Vec3::X, Vec3::Y], Interpolation::Step)
            .unwrap();
        assert_eq!(keys.sample(0.99), Vec3::X);
        assert_eq!(keys.sample(1.0), Vec3::Y);
    }

    #[test]
    fn test_cubic_spline_passes_through_keys() {
        let keys = Keyframes::new(
            vec![0.0, 1.0],
            vec![
                Vec3::ZERO,
                Vec3::ZERO,
                Vec3::X,
                Vec3::X,
                Vec3::splat(2.0),
                Vec3::ZERO,
            ],
            Interpolation::CubicSpline,
        )
        .unwrap();
        assert_eq!(keys.sample(0.0), Vec3::ZERO);
        assert_eq!(keys.sample(1.0), Vec3::splat(2.0));
        let mid = keys.sample(0.5);
        assert!(mid.x > 0.0 && mid.x < 2.0);
    }

    #[test]
    fn test_rotation_slerp_stays_normalized() {
        let keys = Keyframes::new(
            vec![0.0, 1.0],
            vec![Quat::IDENTITY, Quat::from_rotation_y(std::f32::consts::PI * 0.5)],
            Interpolation::Linear,
        )
        .unwrap();
        let half = keys.sample(0.5);
        assert!((half.length() - 1.0).abs() < 1e-5);
        assert!(half.abs_diff_eq(Quat::from_rotation_y(std::f32::consts::PI * 0.25), 1e-5));
    }

    #[test]
    fn test_invalid_tracks_are_rejected() {
        assert!(Keyframes::<Vec3>::new(vec![], vec![], Interpolation::Linear).is_err());
        assert!(
            Keyframes::new(vec![1.0, 0.0], vec![Vec3::X, Vec3::Y], Interpolation::Linear).is_err()
        );
        assert!(Keyframes::new(vec![0.0], vec![Vec3::X], Interpolation::CubicSpline).is_err());
        assert!(Keyframes::new(vec![f32::NAN], vec![Vec3::X], Interpolation::Linear).is_err());
    }

    #[test]
    fn test_clip_apply_converts_matrix_node() {
        let mut graph = SceneGraph::new();
        let node = graph
            .add_node("spin", glam::Mat4::from_translation(Vec3::new(0.0, 3.0, 0.0)), None)
            .unwrap();
        let clip = AnimationClip::new(
            "rise",
            vec![KeyframeTrack::new(
                node,
                TrackProperty::Scale(linear(&[0.0, 2.0], &[Vec3::ONE, Vec3::splat(3.0)])),
            )],
        );
        assert_eq!((clip.start, clip.end), (0.0, 2.0));

        clip.apply(1.0, &mut graph).unwrap();
        let LocalTransform::Trs(trs) = graph.node(node).unwrap().local else {
            panic!("animated node should hold TRS");
        };
        assert!(trs.translation.abs_diff_eq(Vec3::new(0.0, 3.0, 0.0), 1e-5));
        assert!(trs.scale.abs_diff_eq(Vec3::splat(2.0), 1e-5));
    }

    #[test]
    fn test_clip_apply_unknown_target() {
        let mut graph = SceneGraph::new();
        graph.add_node("only", Trs::IDENTITY, None).unwrap();
        let clip = AnimationClip::new(
            "bad",
            vec![KeyframeTrack::new(
                NodeId::from_raw(5),
                TrackProperty::Translation(linear(&[0.0], &[Vec3::X])),
            )],
        );
        assert!(matches!(
            clip.apply(0.0, &mut graph),
            Err(SceneError::UnknownNode(_))
        ));
    }

    #[test]
    fn test_clock_wraps() {
        let mut clock = AnimationClock::new(0.0, 2.0);
        assert_eq!(clock.advance(1.5), 1.5);
        assert!((clock.advance(1.0) - 0.5).abs() < 1e-6);
        assert!((clock.advance(4.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_clock_wraps_to_late_clip_start() {
        let clip = AnimationClip::new(
            "late",
            vec![KeyframeTrack::new(
                NodeId::from_raw(0),
                TrackProperty::Translation(linear(&[1.0, 3.0], &[Vec3::X, Vec3::Y])),
            )],
        );
        assert_eq!((clip.start, clip.end), (1.0, 3.0));
        assert_eq!(clip.duration(), 2.0);

        let mut clock = AnimationClock::for_clip(&clip);
        assert_eq!(clock.time, 1.0);
        assert_eq!(clock.advance(1.0), 2.0);
        // 4.5 is 3.5s into a 2s loop: wraps to start + 1.5.
        let wrapped = clock.advance(2.5);
        assert!((wrapped - 2.5).abs() < 1e-6);

        for _ in 0..50 {
            let t = clock.advance(0.37);
            assert!((1.0..3.0).contains(&t), "clock left the clip range: {t}");
        }

        clock.reset();
        assert_eq!(clock.time, 1.0);
    }

    #[test]
    fn test_clip_range_spans_all_tracks() {
        let clip = AnimationClip::new(
            "mixed",
            vec![
                KeyframeTrack::new(
                    NodeId::from_raw(0),
                    TrackProperty::Translation(linear(&[0.5, 2.0], &[Vec3::X, Vec3::Y])),
                ),
                KeyframeTrack::new(
                    NodeId::from_raw(0),
                    TrackProperty::Scale(linear(&[0.25, 1.0], &[Vec3::ONE, Vec3::ONE])),
                ),
            ],
        );
        assert_eq!((clip.start, clip.end), (0.25, 2.0));

        let empty = AnimationClip::new("empty", Vec::new());
        assert_eq!((empty.start, empty.end), (0.0, 0.0));
    }

    #[test]
    fn test_clock_paused_and_zero_duration() {
        let mut clock = AnimationClock::new(0.0, 2.0);
        clock.playing = false;
        assert_eq!(clock.advance(1.0), 0.0);

        let mut empty = AnimationClock::new(0.0, 0.0);
        assert_eq!(empty.advance(3.0), 0.0);

        let mut single_key = AnimationClock::new(1.5, 1.5);
        assert_eq!(single_key.advance(3.0), 1.5);
    }

    #[test]
    fn test_clock_speed() {
        let mut clock = AnimationClock::new(0.0, 10.0);
        clock.speed = 2.0;
        assert_eq!(clock.advance(1.5), 3.0);
    }
}
