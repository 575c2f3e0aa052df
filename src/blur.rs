//! Two-pass separable Gaussian blur over a host item.

use crate::geometry::{Rect, Size};
use crate::graph::{NodeKind, RenderGraph, RenderNode, SamplerBinding, ShaderPass, TextureSource};
use crate::id::NodeId;
use crate::notify::ChangeLog;
use crate::proxy::{Interpolation, LayerConfig, SourceItem, SourceProxy};
use crate::sampling::{derived_deviation, normalize_blur_settings, MIN_DEVIATION};
use crate::shader::{BlurPath, BlurShaderRequest, CompiledShaderPair, ShaderBuilder};
use crate::uniforms::BlurUniforms;
use crate::util::{fuzzy_compare, fuzzy_eq};
use smallvec::{smallvec, SmallVec};

const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
const BLACK: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlurProperty {
    Source,
    Radius,
    Samples,
    Deviation,
    Cached,
    Mask,
    AlphaOnly,
    Thickness,
    Size,
    DevicePixelRatio,
}

/// Parameters the current shaders were generated from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlurParameters {
    pub radius: f64,
    pub samples: i32,
    pub deviation: f64,
    /// Half the sample count; the radius the collapsed kernel covers at `spread == 1`.
    pub kernel_radius: f64,
    pub kernel_size: i32,
    pub spread: f64,
    /// `thickness` as passed to the shader.
    pub thickness: f64,
    pub alpha_only: bool,
    pub mask_present: bool,
    pub path: BlurPath,
}

/// Blurs its source with a horizontal then a vertical pass.
///
/// The horizontal pass renders offscreen and is never shown; the vertical pass samples it
/// and is the visible result (or the source of the cache node when `cached`).
pub struct GaussianBlurEffect {
    shaders: ShaderBuilder,
    proxy: SourceProxy,
    source: Option<SourceItem>,
    mask: Option<TextureSource>,
    radius: f64,
    samples: i32,
    deviation: Option<f64>,
    alpha_only: bool,
    thickness: f64,
    cached: bool,
    size: Size,
    device_pixel_ratio: f64,
    parameters: BlurParameters,
    /// Programs both passes render with, held until the next rebuild.
    programs: CompiledShaderPair,
    horizontal: RenderNode,
    vertical: RenderNode,
    cache: RenderNode,
    dirty: bool,
    changes: ChangeLog<BlurProperty>,
}

impl GaussianBlurEffect {
    pub fn new(shaders: ShaderBuilder) -> Self {
        let mut proxy = SourceProxy::new();
        proxy.set_interpolation(Interpolation::Linear);
        proxy.take_changes();

        let pass = || {
            NodeKind::Shader(ShaderPass {
                vertex: None,
                fragment: None,
                samplers: SmallVec::new(),
                uniforms: Vec::new(),
                blending: true,
            })
        };
        let mut horizontal = RenderNode::new("blur-horizontal", pass());
        horizontal.visible = false;
        horizontal.offscreen = true;
        let vertical = RenderNode::new("blur-vertical", pass());
        let mut cache = RenderNode::new(
            "blur-cache",
            NodeKind::Cache {
                source: vertical.id,
                hide_source: false,
            },
        );
        cache.visible = false;

        let mut effect = Self {
            shaders,
            proxy,
            source: None,
            mask: None,
            radius: 0.0,
            samples: 0,
            deviation: None,
            alpha_only: false,
            thickness: 0.0,
            cached: false,
            size: Size::default(),
            device_pixel_ratio: 1.0,
            parameters: BlurParameters {
                radius: 0.0,
                samples: 0,
                deviation: MIN_DEVIATION,
                kernel_radius: 0.0,
                kernel_size: 0,
                spread: 0.0,
                thickness: 0.0,
                alpha_only: false,
                mask_present: false,
                path: BlurPath::Optimized { samples: 0 },
            },
            programs: CompiledShaderPair::default(),
            horizontal,
            vertical,
            cache,
            dirty: false,
            changes: ChangeLog::new(),
        };
        effect.rebuild();
        effect
    }

    pub fn source(&self) -> Option<&SourceItem> {
        self.source.as_ref()
    }

    /// Sets the item to blur. There is no way to unset it; pass a new item instead.
    pub fn set_source(&mut self, item: SourceItem) {
        if self.source.is_some_and(|current| current.id == item.id) {
            self.notify_source_changed(item);
            return;
        }
        self.source = Some(item);
        self.proxy.set_input(Some(item));
        self.dirty = true;
        self.changes.mark(BlurProperty::Source);
    }

    /// Forwards new properties (children, fill mode, smoothness...) of the current source.
    pub fn notify_source_changed(&mut self, item: SourceItem) {
        if let Some(current) = self.source.as_mut() {
            if current.id == item.id {
                *current = item;
                self.proxy.notify_input_changed(item);
            }
        }
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Blur radius in logical pixels. Zero or less derives it from `samples`.
    pub fn set_radius(&mut self, radius: f64) {
        if !radius.is_finite() || fuzzy_eq(self.radius, radius) {
            return;
        }
        self.radius = radius;
        self.dirty = true;
        self.changes.mark(BlurProperty::Radius);
    }

    pub fn samples(&self) -> i32 {
        self.samples
    }

    /// Number of texels contributing to each output pixel. Zero or less means 9.
    pub fn set_samples(&mut self, samples: i32) {
        if self.samples == samples {
            return;
        }
        self.samples = samples;
        self.dirty = true;
        self.changes.mark(BlurProperty::Samples);
    }

    /// The explicitly set deviation, if any. See [`BlurParameters::deviation`] for the
    /// value in use.
    pub fn deviation(&self) -> Option<f64> {
        self.deviation
    }

    /// Overrides the deviation derived from the radius. `None` restores the derivation.
    pub fn set_deviation(&mut self, deviation: Option<f64>) {
        let unchanged = match (self.deviation, deviation) {
            (_, Some(value)) if !value.is_finite() => return,
            (Some(current), Some(value)) => fuzzy_eq(current, value),
            (current, value) => current.is_none() == value.is_none(),
        };
        if unchanged {
            return;
        }
        self.deviation = deviation;
        self.dirty = true;
        self.changes.mark(BlurProperty::Deviation);
    }

    pub fn mask(&self) -> Option<TextureSource> {
        self.mask
    }

    /// A texture whose alpha scales the blur radius per pixel. Forces the fallback path.
    pub fn set_mask(&mut self, mask: Option<TextureSource>) {
        if self.mask == mask {
            return;
        }
        self.mask = mask;
        self.dirty = true;
        self.changes.mark(BlurProperty::Mask);
    }

    pub fn alpha_only(&self) -> bool {
        self.alpha_only
    }

    pub fn set_alpha_only(&mut self, alpha_only: bool) {
        if self.alpha_only == alpha_only {
            return;
        }
        self.alpha_only = alpha_only;
        self.dirty = true;
        self.changes.mark(BlurProperty::AlphaOnly);
    }

    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    /// Only used in alpha-only mode. Higher values harden the blurred edge.
    pub fn set_thickness(&mut self, thickness: f64) {
        if !thickness.is_finite() || fuzzy_eq(self.thickness, thickness) {
            return;
        }
        self.thickness = thickness;
        self.dirty = true;
        self.changes.mark(BlurProperty::Thickness);
    }

    pub fn is_cached(&self) -> bool {
        self.cached
    }

    /// Keeps the blurred result in a texture. Never regenerates shaders.
    pub fn set_cached(&mut self, cached: bool) {
        if self.cached == cached {
            return;
        }
        self.cached = cached;
        self.apply_cache_state();
        self.changes.mark(BlurProperty::Cached);
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn set_size(&mut self, size: Size) {
        if !size.width.is_finite()
            || !size.height.is_finite()
            || (fuzzy_eq(self.size.width, size.width) && fuzzy_eq(self.size.height, size.height))
        {
            return;
        }
        self.size = size;
        self.dirty = true;
        self.changes.mark(BlurProperty::Size);
    }

    pub fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }

    /// Rescales the sampling step of both passes. Shaders are kept.
    pub fn set_device_pixel_ratio(&mut self, device_pixel_ratio: f64) {
        if !device_pixel_ratio.is_finite()
            || device_pixel_ratio <= 0.0
            || fuzzy_compare(self.device_pixel_ratio, device_pixel_ratio)
        {
            return;
        }
        self.device_pixel_ratio = device_pixel_ratio;
        self.write_uniforms();
        self.changes.mark(BlurProperty::DevicePixelRatio);
    }

    /// Rebuilds the passes if any property or the source binding changed. Returns `true`
    /// when it did.
    pub fn update(&mut self) -> bool {
        if self.proxy.update() {
            self.dirty = true;
        }
        if !self.dirty {
            return false;
        }
        self.rebuild();
        true
    }

    pub fn parameters(&self) -> &BlurParameters {
        &self.parameters
    }

    /// Layer settings the host must apply for the source to be sampled directly.
    pub fn source_layer(&self) -> Option<&LayerConfig> {
        self.proxy.layer_config()
    }

    pub fn horizontal_pass(&self) -> &RenderNode {
        &self.horizontal
    }

    pub fn vertical_pass(&self) -> &RenderNode {
        &self.vertical
    }

    pub fn cache_node(&self) -> &RenderNode {
        &self.cache
    }

    /// The node downstream effects sample.
    pub fn output_node(&self) -> NodeId {
        if self.cached {
            self.cache.id
        } else {
            self.vertical.id
        }
    }

    pub fn render_graph(&self) -> RenderGraph {
        let mut graph = RenderGraph::new();
        if let Some(capture) = self.proxy.capture_node() {
            graph.push(capture);
        }
        graph.push(self.horizontal.clone());
        graph.push(self.vertical.clone());
        graph.push(self.cache.clone());
        graph
    }

    pub fn take_changes(&mut self) -> Vec<BlurProperty> {
        self.changes.take()
    }

    fn rebuild(&mut self) {
        self.dirty = false;
        let (samples, radius) = normalize_blur_settings(self.samples, self.radius);
        let kernel_radius = (f64::from(samples) / 2.0).max(0.0);
        let deviation = self
            .deviation
            .unwrap_or_else(|| derived_deviation(radius))
            .max(MIN_DEVIATION);
        let request = BlurShaderRequest {
            radius: kernel_radius,
            deviation,
            alpha_only: self.alpha_only,
            masked: self.mask.is_some(),
            fallback: !fuzzy_compare(radius, kernel_radius),
        };
        let shaders = self.shaders.gaussian_blur(&request);
        let previous = std::mem::replace(&mut self.programs, shaders.compiled);
        self.shaders.release(previous.handles());

        self.parameters = BlurParameters {
            radius,
            samples,
            deviation,
            kernel_radius,
            kernel_size: (kernel_radius * 2.0 + 1.0).round() as i32,
            spread: radius / kernel_radius,
            thickness: (1.0 - self.thickness * 0.98).clamp(0.0, 0.98),
            alpha_only: self.alpha_only,
            mask_present: self.mask.is_some(),
            path: shaders.path,
        };
        tracing::debug!(
            "rebuilt gaussian blur: radius {radius}, samples {samples}, deviation {deviation}, {:?}",
            shaders.path
        );

        let mut samplers: SmallVec<[SamplerBinding; 2]> = SmallVec::new();
        if let Some(source) = self.proxy.output_texture() {
            samplers.push(SamplerBinding {
                binding: 1,
                name: "source",
                source,
            });
        }
        self.horizontal.kind = NodeKind::Shader(ShaderPass {
            vertex: shaders.compiled.vertex,
            fragment: shaders.compiled.fragment,
            samplers,
            uniforms: Vec::new(),
            blending: false,
        });
        self.vertical.kind = NodeKind::Shader(ShaderPass {
            vertex: shaders.compiled.vertex,
            fragment: shaders.compiled.fragment,
            samplers: smallvec![SamplerBinding {
                binding: 1,
                name: "source",
                source: TextureSource::Node(self.horizontal.id),
            }],
            uniforms: Vec::new(),
            blending: true,
        });
        if let Some(mask) = self.mask {
            for node in [&mut self.horizontal, &mut self.vertical] {
                if let Some(pass) = node.shader_pass_mut() {
                    pass.samplers.push(SamplerBinding {
                        binding: 2,
                        name: "mask",
                        source: mask,
                    });
                }
            }
        }

        let rect = Rect::from_size(self.size);
        self.horizontal.rect = rect;
        self.vertical.rect = rect;
        self.cache.rect = rect;
        self.write_uniforms();
    }

    fn write_uniforms(&mut self) {
        let step = |extent: f64| {
            let pixels = extent * self.device_pixel_ratio;
            if pixels > 0.0 {
                (1.0 / pixels) as f32
            } else {
                0.0
            }
        };
        let base = BlurUniforms {
            spread: self.parameters.spread as f32,
            thickness: self.parameters.thickness as f32,
            ..BlurUniforms::default()
        };
        let horizontal = BlurUniforms {
            dirstep: [step(self.size.width), 0.0],
            color: WHITE,
            ..base
        };
        let vertical = BlurUniforms {
            dirstep: [0.0, step(self.size.height)],
            color: BLACK,
            ..base
        };
        let alpha_only = self.parameters.alpha_only;
        if let Some(pass) = self.horizontal.shader_pass_mut() {
            pass.uniforms = horizontal.as_bytes(alpha_only).to_vec();
        }
        if let Some(pass) = self.vertical.shader_pass_mut() {
            pass.uniforms = vertical.as_bytes(alpha_only).to_vec();
        }
    }

    fn apply_cache_state(&mut self) {
        self.cache.visible = self.cached;
        self.cache.kind = NodeKind::Cache {
            source: self.vertical.id,
            hide_source: self.cached,
        };
        self.vertical.offscreen = self.cached;
    }
}

impl Drop for GaussianBlurEffect {
    fn drop(&mut self) {
        self.shaders.release(self.programs.handles());
    }
}
