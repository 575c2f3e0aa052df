//! GLSL emission for the separable Gaussian blur passes.

use crate::sampling::{gaussian, KernelTopology, SamplePlan, MAX_KERNEL_RADIUS};
use crate::shader::glsl::{declare_blur_uniforms, format_number};

/// Parameters of one blur shader pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlurShaderRequest {
    /// Kernel radius in texels; may be fractional.
    pub radius: f64,
    /// Standard deviation of the kernel. Callers clamp it to [`crate::sampling::MIN_DEVIATION`].
    pub deviation: f64,
    /// Blend from transparent to the `color` uniform by blurred alpha instead of blurring RGB.
    pub alpha_only: bool,
    /// Scale the sampling step by the `mask` texture's alpha.
    pub masked: bool,
    /// Emit one tap per texel instead of collapsed samples.
    pub fallback: bool,
}

/// Which generator produced a blur shader pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurPath {
    /// Collapsed samples with offsets precomputed in the vertex shader.
    Optimized { samples: usize },
    /// One statement per texel offset in `[-radius, radius]`.
    Fallback { radius: i32 },
}

const VERTEX_INPUTS: &str = "#version 440\n\n\
    layout(location = 0) in vec4 qt_Vertex;\n\
    layout(location = 1) in vec2 qt_MultiTexCoord0;\n\n";

fn declare_varyings(shader: &mut String, direction: &str, plan: &SamplePlan) {
    for (location, sample) in plan.descriptors().iter().enumerate() {
        shader.push_str(&format!(
            "layout(location = {location}) {direction} vec2 {};\n",
            sample.name
        ));
    }
}

/// Vertex shader of the optimized path: one varying per collapsed sample.
pub(crate) fn gaussian_vertex_shader(plan: &SamplePlan, alpha_only: bool) -> String {
    let mut shader = String::with_capacity(1024);
    shader.push_str(VERTEX_INPUTS);
    declare_blur_uniforms(&mut shader, alpha_only);
    shader.push_str("out gl_PerVertex { vec4 gl_Position; };\n\n");
    declare_varyings(&mut shader, "out", plan);

    shader.push_str("\nvoid main() {\n    gl_Position = qt_Matrix * qt_Vertex;\n\n");
    for sample in plan.descriptors() {
        shader.push_str(&format!("    {} = qt_MultiTexCoord0", sample.name));
        if sample.offset != 0.0 {
            shader.push_str(&format!(
                " + spread * dirstep * float({})",
                format_number(sample.offset)
            ));
        }
        shader.push_str(";\n");
    }
    shader.push_str("}\n");
    shader
}

/// Fragment shader of the optimized path: weighted sum with baked, normalized weights.
pub(crate) fn gaussian_fragment_shader(plan: &SamplePlan, alpha_only: bool) -> String {
    let mut shader = String::with_capacity(1024);
    shader.push_str("#version 440\n\n");
    declare_blur_uniforms(&mut shader, alpha_only);
    shader.push_str("layout(binding = 1) uniform sampler2D source;\n");
    shader.push_str("layout(location = 0) out vec4 fragColor;\n");
    declare_varyings(&mut shader, "in", plan);

    shader.push_str("\nvoid main() {\n    fragColor = ");
    shader.push_str(if alpha_only {
        "mix(vec4(0), color, clamp(("
    } else {
        "("
    });

    for (sample, weight) in plan.descriptors().iter().zip(plan.normalized_weights()) {
        shader.push_str(&format!(
            "\n                    + float({}) * texture(source, {})",
            format_number(weight),
            sample.name
        ));
        if alpha_only {
            shader.push_str(".a");
        }
    }

    shader.push_str("\n                   )");
    if alpha_only {
        shader.push_str("/thickness, 0.0, 1.0))");
    }
    shader.push_str("* qt_Opacity;\n}");
    shader
}

/// Vertex shader of the fallback path: passes texture coordinates through.
pub(crate) fn fallback_vertex_shader(alpha_only: bool) -> String {
    let mut shader = String::from(VERTEX_INPUTS);
    declare_blur_uniforms(&mut shader, alpha_only);
    shader.push_str(
        "layout(location = 0) out vec2 qt_TexCoord0;\n\
         out gl_PerVertex { vec4 gl_Position; };\n\
         void main() {\n\
         \x20   gl_Position = qt_Matrix * qt_Vertex;\n\
         \x20   qt_TexCoord0 = qt_MultiTexCoord0;\n\
         }\n",
    );
    shader
}

/// Fragment shader of the fallback path.
///
/// Every tap is written out with its Gaussian weight; the result is divided by the sum of
/// exactly those weights, baked as `wSum`.
pub(crate) fn fallback_fragment_shader(
    radius: i32,
    deviation: f64,
    masked: bool,
    alpha_only: bool,
) -> String {
    let mut shader = String::from("#version 440\n\n");
    declare_blur_uniforms(&mut shader, alpha_only);
    shader.push_str("layout(binding = 1) uniform sampler2D source;\n");
    if masked {
        shader.push_str("layout(binding = 2) uniform sampler2D mask;\n");
    }
    shader.push_str(
        "layout(location = 0) out vec4 fragColor;\n\
         layout(location = 0) in vec2 qt_TexCoord0;\n\
         \n\
         void main() {\n",
    );
    shader.push_str(if alpha_only {
        "    float result = 0.0;\n"
    } else {
        "    vec4 result = vec4(0);\n"
    });
    shader.push_str("    vec2 pixelStep = dirstep * spread;\n");
    if masked {
        shader.push_str("    pixelStep *= texture(mask, qt_TexCoord0).a;\n");
    }

    let mut weight_sum = 0.0;
    for r in -radius..=radius {
        let weight = gaussian(f64::from(r), deviation);
        weight_sum += weight;
        shader.push_str(&format!(
            "    result += float({}) * texture(source, qt_TexCoord0 + pixelStep * float({r}))",
            format_number(weight)
        ));
        if alpha_only {
            shader.push_str(".a");
        }
        shader.push_str(";\n");
    }

    shader.push_str(&format!(
        "    const float wSum = float({});\n    fragColor = ",
        format_number(weight_sum)
    ));
    shader.push_str(if alpha_only {
        "mix(vec4(0), color, clamp((result / wSum) / thickness, 0.0, 1.0)) * qt_Opacity;\n"
    } else {
        "(qt_Opacity / wSum) * result;\n"
    });
    shader.push_str("}\n");
    shader
}

/// Emits the vertex and fragment source for `request`.
///
/// `max_samples` is the varying budget; it only forces the fallback path when
/// `enforce_budget` is set.
pub(crate) fn emit(
    request: &BlurShaderRequest,
    max_samples: usize,
    enforce_budget: bool,
) -> (BlurPath, String, String) {
    let radius = if request.radius.is_finite() {
        request.radius.clamp(0.0, MAX_KERNEL_RADIUS)
    } else {
        0.0
    };
    let topology = KernelTopology::for_kernel_radius(radius);
    let over_budget = enforce_budget && topology.samples > max_samples;

    if over_budget || request.masked || request.fallback {
        let taps = radius.round() as i32;
        let vertex = fallback_vertex_shader(request.alpha_only);
        let fragment =
            fallback_fragment_shader(taps, request.deviation, request.masked, request.alpha_only);
        (BlurPath::Fallback { radius: taps }, vertex, fragment)
    } else {
        let plan = SamplePlan::new(topology, request.deviation);
        let vertex = gaussian_vertex_shader(&plan, request.alpha_only);
        let fragment = gaussian_fragment_shader(&plan, request.alpha_only);
        (
            BlurPath::Optimized {
                samples: topology.samples,
            },
            vertex,
            fragment,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::derived_deviation;
    use crate::shader::glsl::sampler_bindings;

    fn request(radius: f64) -> BlurShaderRequest {
        BlurShaderRequest {
            radius,
            deviation: derived_deviation(radius),
            alpha_only: false,
            masked: false,
            fallback: false,
        }
    }

    /// Pulls every `float(<literal>) * texture(` weight out of a fragment shader.
    fn emitted_weights(fragment: &str) -> Vec<f64> {
        fragment
            .split("float(")
            .skip(1)
            .filter_map(|chunk| {
                let (literal, rest) = chunk.split_once(')')?;
                rest.trim_start()
                    .starts_with("* texture(")
                    .then(|| literal.parse().ok())
                    .flatten()
            })
            .collect()
    }

    #[test]
    fn optimized_path_declares_one_varying_per_sample() {
        let (path, vertex, fragment) = emit(&request(4.5), 15, false);
        assert_eq!(path, BlurPath::Optimized { samples: 5 });
        for name in ["tL1", "tL0", "tC", "tR0", "tR1"] {
            assert!(vertex.contains(&format!(") out vec2 {name};\n")), "{name}");
            assert!(fragment.contains(&format!(") in vec2 {name};\n")), "{name}");
            assert!(fragment.contains(&format!("texture(source, {name})")), "{name}");
        }
        assert!(vertex.contains("layout(location = 2) out vec2 tC;\n"));
        assert!(vertex.contains("    tC = qt_MultiTexCoord0;\n"));
        assert!(vertex.contains("    tL0 = qt_MultiTexCoord0 + spread * dirstep * float("));
        assert!(fragment.ends_with("\n                   )* qt_Opacity;\n}"));
    }

    #[test]
    fn emitted_weights_match_the_normalization_sum() {
        for requested in 0..=128 {
            let radius = requested as f64 / 2.0;
            let (path, _, fragment) = emit(&request(radius), 64, false);
            let samples = match path {
                BlurPath::Optimized { samples } => samples,
                BlurPath::Fallback { .. } => unreachable!(),
            };
            let weights = emitted_weights(&fragment);
            assert_eq!(weights.len(), samples, "radius = {radius}");
            let sum: f64 = weights.iter().sum();
            assert!((sum - 1.0).abs() < 1e-4, "radius = {radius}, sum = {sum}");
        }
    }

    #[test]
    fn fallback_weights_sum_to_the_baked_total() {
        let fragment = fallback_fragment_shader(6, 2.1, false, false);
        let weights = emitted_weights(&fragment);
        assert_eq!(weights.len(), 13);
        let baked: f64 = fragment
            .split("const float wSum = float(")
            .nth(1)
            .and_then(|rest| rest.split_once(')'))
            .and_then(|(literal, _)| literal.parse().ok())
            .unwrap();
        let sum: f64 = weights.iter().sum();
        assert!((sum - baked).abs() / baked < 1e-5);
        assert!(fragment.contains("float(-6))"));
        assert!(fragment.contains("    fragColor = (qt_Opacity / wSum) * result;\n"));
    }

    #[test]
    fn mask_forces_the_fallback_path_and_binds_a_second_sampler() {
        let mut req = request(4.5);
        req.masked = true;
        let (path, vertex, fragment) = emit(&req, 15, false);
        assert_eq!(path, BlurPath::Fallback { radius: 5 });
        assert!(vertex.contains("    qt_TexCoord0 = qt_MultiTexCoord0;\n"));
        assert!(fragment.contains("    pixelStep *= texture(mask, qt_TexCoord0).a;\n"));
        let bindings: Vec<_> = sampler_bindings(&fragment)
            .into_iter()
            .map(|s| (s.binding, s.name))
            .collect();
        assert_eq!(
            bindings,
            vec![(1, "source".to_owned()), (2, "mask".to_owned())]
        );
    }

    #[test]
    fn alpha_only_mixes_towards_the_color_uniform() {
        let mut req = request(2.0);
        req.alpha_only = true;
        let (_, vertex, fragment) = emit(&req, 15, false);
        assert!(vertex.contains("    vec4 color;\n    float thickness;\n"));
        assert!(fragment.contains("fragColor = mix(vec4(0), color, clamp(("));
        assert!(fragment.contains("texture(source, tC).a"));
        assert!(fragment.contains("/thickness, 0.0, 1.0))* qt_Opacity;"));

        req.fallback = true;
        let (_, _, fragment) = emit(&req, 15, false);
        assert!(fragment.contains("    float result = 0.0;\n"));
        assert!(fragment.contains(
            "mix(vec4(0), color, clamp((result / wSum) / thickness, 0.0, 1.0)) * qt_Opacity;"
        ));
    }

    #[test]
    fn varying_budget_only_applies_when_enforced() {
        let (path, _, _) = emit(&request(30.0), 8, false);
        assert_eq!(path, BlurPath::Optimized { samples: 31 });
        let (path, _, _) = emit(&request(30.0), 8, true);
        assert_eq!(path, BlurPath::Fallback { radius: 30 });
    }

    #[test]
    fn emission_is_deterministic() {
        let a = emit(&request(7.5), 15, false);
        let b = emit(&request(7.5), 15, false);
        assert_eq!(a, b);
    }
}
