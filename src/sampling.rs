//! Sample placement for separable Gaussian kernels.
//!
//! A 1-D Gaussian of radius `R` needs `2R + 1` taps. Linear texture filtering lets two
//! adjacent texels be fetched with one sample placed between them, weighted so that the
//! interpolated value equals the weighted sum of both texels. The planner pairs texels
//! outward from the center:
//!
//! ```text
//! odd actual sample count (5), kernel 9x9
//!  -4  -3  -2  -1   0  +1  +2  +3  +4
//!    \   /   \   /   |   \   /   \   /
//!     tL1     tL0    tC   tR0     tR1
//!
//! even actual sample count (4), kernel 7x7
//!  -3  -2  -1   0  +1  +2  +3
//!    \   /   \   /   |   \   /
//!     tL1     tL0   tR0   tR1
//! ```
//!
//! | requested | kernel | actual samples | pair radius |
//! |-----------|--------|----------------|-------------|
//! | 0, 1      | 1x1    | 1              | 0           |
//! | 2, 3      | 3x3    | 2              | 0           |
//! | 4, 5      | 5x5    | 3              | 1           |
//! | 8, 9      | 9x9    | 5              | 2           |
//! | 10, 11    | 11x11  | 6              | 2           |

use smallvec::SmallVec;
use std::fmt;

/// Sample count used when a blur is configured with `samples <= 0`.
pub const DEFAULT_SAMPLES: i32 = 9;

/// Largest sample count a blur is generated for. Larger settings are clamped.
pub const MAX_SAMPLES: i32 = 256;

/// Largest blur radius, in logical pixels. Larger settings are clamped.
pub const MAX_RADIUS: f64 = 256.0;

/// Largest kernel radius, in texels, a sample plan or shader is generated for.
pub const MAX_KERNEL_RADIUS: f64 = MAX_SAMPLES as f64 / 2.0;

/// Lower bound applied to the deviation before it reaches a shader.
pub const MIN_DEVIATION: f64 = 0.00001;

const DEVIATION_PER_RADIUS: f64 = 3.3333;

/// Unnormalized Gaussian weight of the texel at `x` for standard deviation `deviation`.
#[inline]
pub fn gaussian(x: f64, deviation: f64) -> f64 {
    ((-x * x) / (2.0 * deviation * deviation)).exp()
}

/// Deviation used when a blur does not set one explicitly.
pub fn derived_deviation(radius: f64) -> f64 {
    (radius + 1.0) / DEVIATION_PER_RADIUS
}

/// Replaces degenerate `samples` / `radius` settings with their defaults.
///
/// Returns `(samples, radius)`; `samples <= 0` becomes [`DEFAULT_SAMPLES`] and
/// `radius <= 0` becomes `floor(samples / 2)`. Both are capped at [`MAX_SAMPLES`] and
/// [`MAX_RADIUS`].
pub fn normalize_blur_settings(samples: i32, radius: f64) -> (i32, f64) {
    let samples = if samples <= 0 {
        DEFAULT_SAMPLES
    } else {
        samples.min(MAX_SAMPLES)
    };
    let radius = if radius <= 0.0 || !radius.is_finite() {
        (f64::from(samples) / 2.0).floor()
    } else {
        radius.min(MAX_RADIUS)
    };
    (samples, radius)
}

/// Identifier of a planned sample, used as the varying name in generated shaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleName {
    Center,
    Left(u32),
    Right(u32),
}

impl fmt::Display for SampleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleName::Center => f.write_str("tC"),
            SampleName::Left(i) => write!(f, "tL{i}"),
            SampleName::Right(i) => write!(f, "tR{i}"),
        }
    }
}

/// One collapsed texture fetch: where to sample, in texels, and its unnormalized weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleDescriptor {
    pub name: SampleName,
    pub offset: f64,
    pub weight: f64,
}

impl SampleDescriptor {
    fn new(name: SampleName, offset: f64, weight: f64) -> Self {
        Self {
            name,
            offset,
            weight,
        }
    }
}

/// Shape of a collapsed kernel: how many fetches, and how many texel pairs per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelTopology {
    pub samples: usize,
    pub radius: usize,
}

impl KernelTopology {
    /// Topology for a requested sample count (`2 * kernel_radius`, see the module table).
    pub fn for_requested_samples(requested: usize) -> Self {
        Self {
            samples: 1 + requested / 2,
            radius: requested / 4,
        }
    }

    /// Topology for a (possibly fractional) kernel radius in texels, saturating at
    /// [`MAX_KERNEL_RADIUS`].
    pub fn for_kernel_radius(kernel_radius: f64) -> Self {
        let kernel_radius = if kernel_radius.is_finite() {
            kernel_radius.clamp(0.0, MAX_KERNEL_RADIUS)
        } else {
            0.0
        };
        Self::for_requested_samples((kernel_radius * 2.0).round() as usize)
    }

    /// Topology that produces exactly `samples` fetches.
    pub fn for_actual_samples(samples: usize) -> Self {
        let samples = samples.max(1);
        let radius = if samples % 2 == 1 {
            (samples - 1) / 2
        } else {
            (samples - 2) / 2
        };
        Self { samples, radius }
    }

    pub fn is_odd(&self) -> bool {
        self.samples % 2 == 1
    }
}

/// The collapsed samples of one blur pass, ordered left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplePlan {
    topology: KernelTopology,
    samples: SmallVec<[SampleDescriptor; 16]>,
}

impl SamplePlan {
    /// Plans the samples for `topology` with standard deviation `deviation`.
    ///
    /// A pair whose interpolated position is not finite (zero deviation makes both
    /// weights vanish) is emitted with offset 0 and weight 0 so it contributes nothing.
    pub fn new(topology: KernelTopology, deviation: f64) -> Self {
        let KernelTopology { samples, radius } = topology;
        let placeholder = SampleDescriptor::new(SampleName::Center, 0.0, 0.0);
        let mut plan: SmallVec<[SampleDescriptor; 16]> = SmallVec::from_elem(placeholder, samples);

        if topology.is_odd() {
            plan[radius] = SampleDescriptor::new(SampleName::Center, 0.0, 1.0);
            for i in 0..radius {
                let p0 = (i as f64 + 1.0) * 2.0 - 1.0;
                let p1 = (i as f64 + 1.0) * 2.0;
                let (pos, weight) = collapse_pair(p0, p1, deviation);
                plan[radius - i - 1] = SampleDescriptor::new(SampleName::Left(i as u32), pos, weight);
                plan[radius + i + 1] =
                    SampleDescriptor::new(SampleName::Right(i as u32), -pos, weight);
            }
        } else {
            let wl = gaussian(-1.0, deviation);
            let wc = gaussian(0.0, deviation);
            let w = wl + wc;
            let (pos, weight) = guard_non_finite((-1.0 * wl) / w, w);
            plan[radius] = SampleDescriptor::new(SampleName::Left(0), pos, weight);
            // gaussian(-1) == gaussian(1)
            plan[radius + 1] = SampleDescriptor::new(SampleName::Right(0), 1.0, wl);
            for i in 0..radius {
                let p0 = (i as f64 + 1.0) * 2.0;
                let p1 = (i as f64 + 1.0) * 2.0 + 1.0;
                let (pos, weight) = collapse_pair(p0, p1, deviation);
                let n = i as u32 + 1;
                plan[radius - i - 1] = SampleDescriptor::new(SampleName::Left(n), pos, weight);
                plan[radius + i + 2] = SampleDescriptor::new(SampleName::Right(n), -pos, weight);
            }
        }

        Self {
            topology,
            samples: plan,
        }
    }

    /// Convenience for `SamplePlan::new(KernelTopology::for_kernel_radius(r), deviation)`.
    pub fn for_kernel_radius(kernel_radius: f64, deviation: f64) -> Self {
        Self::new(KernelTopology::for_kernel_radius(kernel_radius), deviation)
    }

    pub fn topology(&self) -> KernelTopology {
        self.topology
    }

    pub fn descriptors(&self) -> &[SampleDescriptor] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sum of the unnormalized weights; emitted shaders divide every weight by it.
    pub fn total_weight(&self) -> f64 {
        self.samples.iter().map(|s| s.weight).sum()
    }

    /// Weights divided by [`SamplePlan::total_weight`], in descriptor order.
    pub fn normalized_weights(&self) -> impl Iterator<Item = f64> + '_ {
        let total = self.total_weight();
        self.samples.iter().map(move |s| s.weight / total)
    }
}

fn collapse_pair(p0: f64, p1: f64, deviation: f64) -> (f64, f64) {
    let w0 = gaussian(p0, deviation);
    let w1 = gaussian(p1, deviation);
    let w = w0 + w1;
    guard_non_finite((p0 * w0 + p1 * w1) / w, w)
}

#[inline]
fn guard_non_finite(pos: f64, weight: f64) -> (f64, f64) {
    if pos.is_finite() {
        (pos, weight)
    } else {
        (0.0, 0.0)
    }
}
