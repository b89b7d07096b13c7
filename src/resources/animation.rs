use cgmath::{InnerSpace, VectorSpace};

#[derive(Clone, Debug)]
pub enum Keyframes {
    Translation(Vec<cgmath::Vector3<f32>>),
    Rotation(Vec<cgmath::Quaternion<f32>>),
    Scale(Vec<cgmath::Vector3<f32>>),
    // morph target weights are parsed but not animated
    Other,
}

impl Keyframes {
    pub fn len(&self) -> usize {
        match self {
            Keyframes::Translation(v) => v.len(),
            Keyframes::Rotation(v) => v.len(),
            Keyframes::Scale(v) => v.len(),
            Keyframes::Other => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /**
     * Cubic spline outputs come as (in-tangent, value, out-tangent) triplets.
     * Only the values are kept, the tangents are dropped.
     */
    pub(crate) fn spline_values(self) -> Keyframes {
        fn values<T: Copy>(v: Vec<T>) -> Vec<T> {
            v.into_iter().skip(1).step_by(3).collect()
        }
        match self {
            Keyframes::Translation(v) => Keyframes::Translation(values(v)),
            Keyframes::Rotation(v) => Keyframes::Rotation(values(v)),
            Keyframes::Scale(v) => Keyframes::Scale(values(v)),
            Keyframes::Other => Keyframes::Other,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    Step,
    /// Sampled linearly between the spline's value keys.
    CubicSpline,
}

impl From<gltf::animation::Interpolation> for Interpolation {
    fn from(value: gltf::animation::Interpolation) -> Self {
        match value {
            gltf::animation::Interpolation::Linear => Interpolation::Linear,
            gltf::animation::Interpolation::Step => Interpolation::Step,
            gltf::animation::Interpolation::CubicSpline => Interpolation::CubicSpline,
        }
    }
}

/// A single animated property of one node.
#[derive(Clone, Debug)]
pub struct Channel {
    /// Index of the target node inside the owning model.
    pub node: usize,
    pub interpolation: Interpolation,
    pub timestamps: Vec<f32>,
    pub keyframes: Keyframes,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Sample {
    Translation(cgmath::Vector3<f32>),
    Rotation(cgmath::Quaternion<f32>),
    Scale(cgmath::Vector3<f32>),
}

impl Channel {
    /// Value of the channel at time `t`, clamped to the first and last key.
    pub fn sample(&self, t: f32) -> Option<Sample> {
        let keys = self.timestamps.len().min(self.keyframes.len());
        if keys == 0 {
            return None;
        }
        let (prev, next, amount) = segment(&self.timestamps[..keys], t);
        let amount = match self.interpolation {
            Interpolation::Step => 0.0,
            Interpolation::Linear | Interpolation::CubicSpline => amount,
        };
        let sample = match &self.keyframes {
            Keyframes::Translation(v) => Sample::Translation(v[prev].lerp(v[next], amount)),
            Keyframes::Scale(v) => Sample::Scale(v[prev].lerp(v[next], amount)),
            Keyframes::Rotation(v) => Sample::Rotation(nlerp(v[prev], v[next], amount)),
            Keyframes::Other => return None,
        };
        Some(sample)
    }
}

/// Returns the surrounding key indices and the blend factor between them.
fn segment(times: &[f32], t: f32) -> (usize, usize, f32) {
    let last = times.len() - 1;
    if last == 0 || t <= times[0] {
        return (0, 0, 0.0);
    }
    if t >= times[last] {
        return (last, last, 0.0);
    }
    // NaN keys or times leave the partition point anywhere
    let next = times.partition_point(|&key| key <= t).clamp(1, last);
    let prev = next - 1;
    let span = times[next] - times[prev];
    let amount = if span > 0.0 && (t - times[prev]).is_finite() {
        (t - times[prev]) / span
    } else {
        0.0
    };
    (prev, next, amount)
}

fn nlerp(
    a: cgmath::Quaternion<f32>,
    b: cgmath::Quaternion<f32>,
    amount: f32,
) -> cgmath::Quaternion<f32> {
    // take the short way round
    let b = if a.dot(b) < 0.0 { -b } else { b };
    (a * (1.0 - amount) + b * amount).normalize()
}

/// Key times must be finite and strictly increasing.
pub fn is_timeline(times: &[f32]) -> bool {
    times.iter().all(|t| t.is_finite()) && times.windows(2).all(|pair| pair[0] < pair[1])
}

/// An animation clip: a named set of channels sharing one timeline.
#[derive(Clone, Debug)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub channels: Vec<Channel>,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, channels: Vec<Channel>) -> Self {
        let duration = channels
            .iter()
            .filter_map(|channel| channel.timestamps.last().copied())
            .fold(0.0_f32, f32::max);
        Self {
            name: name.into(),
            duration,
            channels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Quaternion, Rotation3, Vector3};

    fn translation(interpolation: Interpolation) -> Channel {
        Channel {
            node: 0,
            interpolation,
            timestamps: vec![0.0, 1.0, 3.0],
            keyframes: Keyframes::Translation(vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(2.0, 0.0, 0.0),
                Vector3::new(2.0, 4.0, 0.0),
            ]),
        }
    }

    #[test]
    fn linear_translation_interpolates_between_keys() {
        let channel = translation(Interpolation::Linear);
        assert_eq!(
            channel.sample(0.5),
            Some(Sample::Translation(Vector3::new(1.0, 0.0, 0.0)))
        );
        assert_eq!(
            channel.sample(2.0),
            Some(Sample::Translation(Vector3::new(2.0, 2.0, 0.0)))
        );
    }

    #[test]
    fn samples_clamp_outside_the_key_range() {
        let channel = translation(Interpolation::Linear);
        assert_eq!(
            channel.sample(-1.0),
            Some(Sample::Translation(Vector3::new(0.0, 0.0, 0.0)))
        );
        assert_eq!(
            channel.sample(10.0),
            Some(Sample::Translation(Vector3::new(2.0, 4.0, 0.0)))
        );
    }

    #[test]
    fn step_holds_the_previous_key() {
        let channel = translation(Interpolation::Step);
        assert_eq!(
            channel.sample(0.99),
            Some(Sample::Translation(Vector3::new(0.0, 0.0, 0.0)))
        );
    }

    #[test]
    fn rotation_halfway_is_normalized() {
        let channel = Channel {
            node: 0,
            interpolation: Interpolation::Linear,
            timestamps: vec![0.0, 1.0],
            keyframes: Keyframes::Rotation(vec![
                Quaternion::from_angle_y(cgmath::Deg(0.0)),
                Quaternion::from_angle_y(cgmath::Deg(90.0)),
            ]),
        };
        let Some(Sample::Rotation(q)) = channel.sample(0.5) else {
            panic!("expected a rotation sample");
        };
        let expected = Quaternion::from_angle_y(cgmath::Deg(45.0));
        assert!((q.magnitude() - 1.0).abs() < 1e-5);
        assert!(q.dot(expected).abs() > 0.9999);
    }

    #[test]
    fn spline_values_drop_tangents() {
        let keyframes = Keyframes::Scale(vec![
            Vector3::new(9.0, 9.0, 9.0),
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::new(9.0, 9.0, 9.0),
            Vector3::new(9.0, 9.0, 9.0),
            Vector3::new(2.0, 2.0, 2.0),
            Vector3::new(9.0, 9.0, 9.0),
        ]);
        match keyframes.spline_values() {
            Keyframes::Scale(v) => {
                assert_eq!(v, vec![Vector3::new(1.0, 1.0, 1.0), Vector3::new(2.0, 2.0, 2.0)])
            }
            other => panic!("unexpected keyframes {:?}", other),
        }
    }

    #[test]
    fn nan_key_times_do_not_panic() {
        let channel = Channel {
            node: 0,
            interpolation: Interpolation::Linear,
            timestamps: vec![f32::NAN, 2.0],
            keyframes: Keyframes::Translation(vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(1.0, 0.0, 0.0),
            ]),
        };
        assert!(channel.sample(1.0).is_some());
        assert!(translation(Interpolation::Linear).sample(f32::NAN).is_some());
    }

    #[test]
    fn timelines_must_be_finite_and_increasing() {
        assert!(is_timeline(&[0.0, 0.5, 1.0]));
        assert!(is_timeline(&[]));
        assert!(!is_timeline(&[f32::NAN, 2.0]));
        assert!(!is_timeline(&[0.0, f32::INFINITY]));
        assert!(!is_timeline(&[1.0, 1.0]));
        assert!(!is_timeline(&[2.0, 1.0]));
    }

    #[test]
    fn clip_duration_is_the_latest_key() {
        let clip = AnimationClip::new("sway", vec![translation(Interpolation::Linear)]);
        assert_eq!(clip.duration, 3.0);
    }
}
