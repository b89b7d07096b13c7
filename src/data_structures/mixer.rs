//! Time-driven playback of animation clips.
//!
//! An [`AnimationMixer`] holds one [`ClipAction`] per clip of a model. Every
//! frame the render loop advances the mixer by the wall-clock delta; each
//! running action moves its own local time forward by that same delta, wraps
//! it over the clip duration and writes the sampled values into the model's
//! node transforms. Actions are applied in insertion order, so when two clips
//! animate the same property the later one wins.

use instant::Duration;

use crate::{
    data_structures::model::Node,
    resources::animation::{AnimationClip, Sample},
};

#[derive(Clone, Debug)]
pub struct ClipAction {
    clip: AnimationClip,
    time: f32,
    running: bool,
}

impl ClipAction {
    fn new(clip: AnimationClip) -> Self {
        Self {
            clip,
            time: 0.0,
            running: false,
        }
    }

    pub fn play(&mut self) -> &mut Self {
        self.running = true;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Local playback time in seconds, always within the clip duration.
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn clip(&self) -> &AnimationClip {
        &self.clip
    }

    fn advance(&mut self, dt: f32) {
        self.time += dt;
        if self.clip.duration > 0.0 {
            self.time = self.time.rem_euclid(self.clip.duration);
        } else {
            self.time = 0.0;
        }
    }

    fn apply(&self, nodes: &mut [Node]) {
        for channel in &self.clip.channels {
            let Some(node) = nodes.get_mut(channel.node) else {
                continue;
            };
            match channel.sample(self.time) {
                Some(Sample::Translation(position)) => node.local.position = position,
                Some(Sample::Rotation(rotation)) => node.local.rotation = rotation,
                Some(Sample::Scale(scale)) => node.local.scale = scale,
                None => (),
            }
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct AnimationMixer {
    actions: Vec<ClipAction>,
    elapsed: f32,
}

impl AnimationMixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `clip` and returns its (stopped) action.
    pub fn clip_action(&mut self, clip: AnimationClip) -> &mut ClipAction {
        self.actions.push(ClipAction::new(clip));
        let last = self.actions.len() - 1;
        &mut self.actions[last]
    }

    pub fn actions(&self) -> &[ClipAction] {
        &self.actions
    }

    pub fn running(&self) -> usize {
        self.actions.iter().filter(|a| a.is_running()).count()
    }

    /// Total time this mixer has been advanced by.
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn update(&mut self, dt: Duration, nodes: &mut [Node]) {
        let dt = dt.as_secs_f32();
        self.elapsed += dt;
        for action in self.actions.iter_mut().filter(|a| a.running) {
            action.advance(dt);
            action.apply(nodes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data_structures::transform::Transform,
        resources::animation::{Channel, Interpolation, Keyframes},
    };
    use cgmath::Vector3;

    fn slide(node: usize, duration: f32) -> AnimationClip {
        AnimationClip::new(
            format!("slide{}", node),
            vec![Channel {
                node,
                interpolation: Interpolation::Linear,
                timestamps: vec![0.0, duration],
                keyframes: Keyframes::Translation(vec![
                    Vector3::new(0.0, 0.0, 0.0),
                    Vector3::new(duration, 0.0, 0.0),
                ]),
            }],
        )
    }

    fn nodes(amount: usize) -> Vec<Node> {
        (0..amount)
            .map(|i| Node {
                name: format!("n{}", i),
                local: Transform::default(),
                mesh: None,
                children: vec![],
            })
            .collect()
    }

    #[test]
    fn stopped_actions_do_not_move() {
        let mut mixer = AnimationMixer::new();
        mixer.clip_action(slide(0, 2.0));
        let mut nodes = nodes(1);
        mixer.update(Duration::from_millis(500), &mut nodes);
        assert_eq!(mixer.actions()[0].time(), 0.0);
        assert_eq!(nodes[0].local.position, Vector3::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn running_actions_share_the_same_delta() {
        let mut mixer = AnimationMixer::new();
        mixer.clip_action(slide(0, 2.0)).play();
        mixer.clip_action(slide(1, 4.0)).play();
        let mut nodes = nodes(2);
        mixer.update(Duration::from_millis(500), &mut nodes);
        assert_eq!(mixer.running(), 2);
        assert!(mixer.actions().iter().all(|a| a.time() == 0.5));
        assert_eq!(nodes[0].local.position, Vector3::new(0.5, 0.0, 0.0));
        assert_eq!(nodes[1].local.position, Vector3::new(0.5, 0.0, 0.0));
    }

    #[test]
    fn action_time_wraps_over_clip_duration() {
        let mut mixer = AnimationMixer::new();
        mixer.clip_action(slide(0, 2.0)).play();
        let mut nodes = nodes(1);
        mixer.update(Duration::from_millis(2500), &mut nodes);
        assert!((mixer.actions()[0].time() - 0.5).abs() < 1e-6);
        assert!((mixer.elapsed() - 2.5).abs() < 1e-6);
    }

    #[test]
    fn channels_targeting_missing_nodes_are_ignored() {
        let mut mixer = AnimationMixer::new();
        mixer.clip_action(slide(7, 1.0)).play();
        let mut nodes = nodes(1);
        mixer.update(Duration::from_millis(100), &mut nodes);
        assert_eq!(nodes[0].local, Transform::default());
    }
}
