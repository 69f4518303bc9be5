//! Keyframe animation playback.
//!
//! The loader emits one [`ChannelClip`] per glTF animation channel: a track of
//! timestamps plus the keyframe values it carries and the node it targets. The
//! [`Mixer`] owns all clips of a scene, advances playback and samples the
//! playing clips into per-node [`TransformDelta`]s that the scene graph applies
//! onto node local transforms. Every action loops over its own duration, so
//! short animations keep cycling next to longer ones.

use cgmath::VectorSpace;
use log::debug;

use crate::data_structures::transform::Transform;

#[derive(Clone, Debug)]
pub enum Keyframes {
    Translation(Vec<cgmath::Vector3<f32>>),
    Rotation(Vec<cgmath::Quaternion<f32>>),
    Scale(Vec<cgmath::Vector3<f32>>),
    Other,
}

/// One animation channel: keyframes of a single property of a single node.
#[derive(Clone, Debug)]
pub struct ChannelClip {
    /// Name of the glTF animation this channel belongs to.
    pub name: String,
    /// glTF index of the node the channel animates.
    pub target: usize,
    pub keyframes: Keyframes,
    pub timestamps: Vec<f32>,
}

impl ChannelClip {
    pub fn duration(&self) -> f32 {
        self.timestamps.last().copied().unwrap_or(0.0)
    }
}

/// Sampled animation state for one node at one point in time.
///
/// Channels only carry the properties they animate; `None` leaves the node's
/// current value untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransformDelta {
    pub translation: Option<cgmath::Vector3<f32>>,
    pub rotation: Option<cgmath::Quaternion<f32>>,
    pub scale: Option<cgmath::Vector3<f32>>,
}

impl TransformDelta {
    pub fn apply(&self, transform: &mut Transform) {
        if let Some(translation) = self.translation {
            transform.position = translation;
        }
        if let Some(rotation) = self.rotation {
            transform.rotation = rotation;
        }
        if let Some(scale) = self.scale {
            transform.scale = scale;
        }
    }

    fn merge(&mut self, other: &TransformDelta) {
        self.translation = other.translation.or(self.translation);
        self.rotation = other.rotation.or(self.rotation);
        self.scale = other.scale.or(self.scale);
    }
}

/// Playback state of one named animation.
#[derive(Clone, Debug)]
pub struct Action {
    pub name: String,
    pub playing: bool,
}

/// Drives all animation channels of a scene from one advancing clock; every
/// action wraps at its own duration.
pub struct Mixer {
    clips: Vec<ChannelClip>,
    actions: Vec<Action>,
    time: f32,
}

impl Mixer {
    /// Build a mixer over the given channels. All named animations start
    /// playing, looped.
    pub fn new(clips: Vec<ChannelClip>) -> Self {
        let mut actions: Vec<Action> = Vec::new();
        for clip in &clips {
            if !actions.iter().any(|action| action.name == clip.name) {
                debug!("registering animation action {:?}", clip.name);
                actions.push(Action {
                    name: clip.name.clone(),
                    playing: true,
                });
            }
        }
        Self {
            clips,
            actions,
            time: 0.0,
        }
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn set_playing(&mut self, name: &str, playing: bool) {
        for action in self.actions.iter_mut() {
            if action.name == name {
                action.playing = playing;
            }
        }
    }

    /// Loop period of one action: the longest of its channels.
    fn action_duration(&self, name: &str) -> f32 {
        self.clips
            .iter()
            .filter(|clip| clip.name == name)
            .map(ChannelClip::duration)
            .fold(0.0, f32::max)
    }

    fn is_playing(&self, name: &str) -> bool {
        self.actions
            .iter()
            .any(|action| action.name == name && action.playing)
    }

    /// Advance the clock by `dt` seconds and sample every playing channel
    /// at the clock wrapped into its action's own loop.
    ///
    /// Returns one merged delta per animated node, keyed by glTF node index.
    pub fn update(&mut self, dt: f32) -> Vec<(usize, TransformDelta)> {
        self.time += dt;

        let mut deltas: Vec<(usize, TransformDelta)> = Vec::new();
        for clip in &self.clips {
            if !self.is_playing(&clip.name) {
                continue;
            }
            let duration = self.action_duration(&clip.name);
            if duration <= 0.0 {
                continue;
            }
            let Some(sample) = sample_channel(clip, self.time % duration) else {
                continue;
            };
            match deltas.iter_mut().find(|(target, _)| *target == clip.target) {
                Some((_, delta)) => delta.merge(&sample),
                None => deltas.push((clip.target, sample)),
            }
        }
        deltas
    }
}

/// Interpolate one channel at `time`.
///
/// Before the first keyframe the first value holds, after the last the last
/// one does; in between values are linearly interpolated (slerp for
/// rotations).
fn sample_channel(clip: &ChannelClip, time: f32) -> Option<TransformDelta> {
    let (index, factor) = segment(&clip.timestamps, time)?;
    let mut delta = TransformDelta::default();
    match &clip.keyframes {
        Keyframes::Translation(values) => {
            delta.translation = Some(values.get(index)?.lerp(*values.get(index + 1)?, factor));
        }
        Keyframes::Rotation(values) => {
            delta.rotation = Some(values.get(index)?.slerp(*values.get(index + 1)?, factor));
        }
        Keyframes::Scale(values) => {
            delta.scale = Some(values.get(index)?.lerp(*values.get(index + 1)?, factor));
        }
        Keyframes::Other => return None,
    }
    Some(delta)
}

/// Find the keyframe segment containing `time` and the interpolation factor
/// within it. Out-of-range times clamp to the nearest segment edge.
fn segment(timestamps: &[f32], time: f32) -> Option<(usize, f32)> {
    match timestamps.len() {
        0 => return None,
        1 => return Some((0, 0.0)),
        _ => {}
    }
    if time <= timestamps[0] {
        return Some((0, 0.0));
    }
    let last = timestamps.len() - 1;
    if time >= timestamps[last] {
        return Some((last - 1, 1.0));
    }
    let index = timestamps
        .windows(2)
        .position(|pair| pair[0] <= time && time < pair[1])?;
    let span = timestamps[index + 1] - timestamps[index];
    let factor = if span > 0.0 {
        (time - timestamps[index]) / span
    } else {
        0.0
    };
    Some((index, factor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{One, Quaternion, Vector3};

    fn translation_clip(name: &str, target: usize) -> ChannelClip {
        ChannelClip {
            name: name.to_string(),
            target,
            keyframes: Keyframes::Translation(vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(2.0, 0.0, 0.0),
            ]),
            timestamps: vec![0.0, 1.0],
        }
    }

    #[test]
    fn samples_midpoint_of_translation_track() {
        let sample = sample_channel(&translation_clip("walk", 0), 0.5).unwrap();
        assert_eq!(sample.translation, Some(Vector3::new(1.0, 0.0, 0.0)));
        assert!(sample.rotation.is_none());
        assert!(sample.scale.is_none());
    }

    #[test]
    fn clamps_outside_the_track_range() {
        let clip = translation_clip("walk", 0);
        let before = sample_channel(&clip, -1.0).unwrap();
        let after = sample_channel(&clip, 5.0).unwrap();
        assert_eq!(before.translation, Some(Vector3::new(0.0, 0.0, 0.0)));
        assert_eq!(after.translation, Some(Vector3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn mixer_loops_and_merges_channels_per_node() {
        let rotation = ChannelClip {
            name: "walk".to_string(),
            target: 0,
            keyframes: Keyframes::Rotation(vec![Quaternion::one(), Quaternion::one()]),
            timestamps: vec![0.0, 1.0],
        };
        let mut mixer = Mixer::new(vec![translation_clip("walk", 0), rotation]);

        // 1.5s into a 1s loop is the same as 0.5s.
        let deltas = mixer.update(1.5);
        assert_eq!(deltas.len(), 1);
        let (target, delta) = deltas[0];
        assert_eq!(target, 0);
        assert_eq!(delta.translation, Some(Vector3::new(1.0, 0.0, 0.0)));
        assert!(delta.rotation.is_some());
    }

    #[test]
    fn each_action_loops_over_its_own_duration() {
        let long = ChannelClip {
            name: "sway".to_string(),
            target: 1,
            keyframes: Keyframes::Translation(vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(4.0, 0.0, 0.0),
            ]),
            timestamps: vec![0.0, 2.0],
        };
        let mut mixer = Mixer::new(vec![translation_clip("bob", 0), long]);

        // 1.5s in: the 1s action has wrapped to 0.5s instead of clamping at
        // its last keyframe; the 2s action is still on its first pass.
        let deltas = mixer.update(1.5);
        assert_eq!(deltas.len(), 2);
        let (_, bob) = deltas.iter().find(|(target, _)| *target == 0).unwrap();
        assert_eq!(bob.translation, Some(Vector3::new(1.0, 0.0, 0.0)));
        let (_, sway) = deltas.iter().find(|(target, _)| *target == 1).unwrap();
        assert_eq!(sway.translation, Some(Vector3::new(3.0, 0.0, 0.0)));
    }

    #[test]
    fn paused_actions_produce_no_deltas() {
        let mut mixer = Mixer::new(vec![translation_clip("walk", 3)]);
        mixer.set_playing("walk", false);
        assert!(mixer.update(0.25).is_empty());
    }
}
