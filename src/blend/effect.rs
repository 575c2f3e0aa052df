use super::{generate, BlendMode};
use crate::geometry::{Rect, Size};
use crate::graph::{NodeKind, RenderGraph, RenderNode, SamplerBinding, ShaderPass, TextureSource};
use crate::id::{NodeId, ShaderHandle};
use crate::notify::ChangeLog;
use crate::proxy::{LayerConfig, SourceItem, SourceProxy};
use crate::shader::ShaderBuilder;
use crate::uniforms::BlendUniforms;
use crate::util::fuzzy_eq;
use smallvec::SmallVec;

/// Something an effect can sample: a host item, or the output of another effect's node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectInput {
    Item(SourceItem),
    Node(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendProperty {
    Background,
    Foreground,
    Mode,
    Cached,
    Size,
}

#[derive(Debug, Default)]
struct BlendInput {
    input: Option<EffectInput>,
    proxy: SourceProxy,
}

impl BlendInput {
    /// Returns `true` when the input was replaced rather than updated.
    fn set(&mut self, input: EffectInput) -> bool {
        let replaced = match (self.input, input) {
            (Some(EffectInput::Item(current)), EffectInput::Item(item)) => current.id != item.id,
            (Some(current), input) => current != input,
            (None, _) => true,
        };
        self.input = Some(input);
        match input {
            EffectInput::Item(item) => self.proxy.set_input(Some(item)),
            EffectInput::Node(_) => self.proxy.set_input(None),
        }
        replaced
    }

    fn texture(&self) -> Option<TextureSource> {
        match self.input? {
            EffectInput::Item(_) => self.proxy.output_texture(),
            EffectInput::Node(node) => Some(TextureSource::Node(node)),
        }
    }
}

/// Composites a foreground over a background with one of the [`BlendMode`]s.
pub struct BlendEffect {
    shaders: ShaderBuilder,
    background: BlendInput,
    foreground: BlendInput,
    mode: BlendMode,
    cached: bool,
    visible: bool,
    size: Size,
    vertex: Option<ShaderHandle>,
    fragment: Option<ShaderHandle>,
    fragment_source: String,
    pass: RenderNode,
    cache: RenderNode,
    dirty: bool,
    changes: ChangeLog<BlendProperty>,
}

impl BlendEffect {
    pub fn new(shaders: ShaderBuilder) -> Self {
        let vertex = shaders.build_passthrough_vertex_shader();
        let pass = RenderNode::new(
            "blend",
            NodeKind::Shader(ShaderPass {
                vertex,
                fragment: None,
                samplers: SmallVec::new(),
                uniforms: bytemuck::bytes_of(&BlendUniforms::default()).to_vec(),
                blending: true,
            }),
        );
        let mut cache = RenderNode::new(
            "blend-cache",
            NodeKind::Cache {
                source: pass.id,
                hide_source: false,
            },
        );
        cache.visible = false;

        let mut effect = Self {
            shaders,
            background: BlendInput::default(),
            foreground: BlendInput::default(),
            mode: BlendMode::default(),
            cached: false,
            visible: true,
            size: Size::default(),
            vertex,
            fragment: None,
            fragment_source: String::new(),
            pass,
            cache,
            dirty: false,
            changes: ChangeLog::new(),
        };
        effect.build_fragment_shader();
        effect
    }

    pub fn background(&self) -> Option<EffectInput> {
        self.background.input
    }

    /// The layer blended onto. Bound to `source` (binding 1).
    pub fn set_background(&mut self, input: EffectInput) {
        if self.background.input == Some(input) {
            return;
        }
        if self.background.set(input) {
            self.changes.mark(BlendProperty::Background);
        }
        self.dirty = true;
    }

    pub fn foreground(&self) -> Option<EffectInput> {
        self.foreground.input
    }

    /// The layer blended in. Bound to `foregroundSource` (binding 2).
    pub fn set_foreground(&mut self, input: EffectInput) {
        if self.foreground.input == Some(input) {
            return;
        }
        if self.foreground.set(input) {
            self.changes.mark(BlendProperty::Foreground);
        }
        self.dirty = true;
    }

    pub fn mode(&self) -> BlendMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: BlendMode) {
        if self.mode == mode {
            return;
        }
        self.mode = mode;
        self.dirty = true;
        self.changes.mark(BlendProperty::Mode);
    }

    pub fn is_cached(&self) -> bool {
        self.cached
    }

    pub fn set_cached(&mut self, cached: bool) {
        if self.cached == cached {
            return;
        }
        self.cached = cached;
        self.cache.kind = NodeKind::Cache {
            source: self.pass.id,
            hide_source: cached,
        };
        self.pass.offscreen = cached;
        self.apply_visibility();
        self.changes.mark(BlendProperty::Cached);
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether the output is composited into the parent target.
    pub fn set_visible(&mut self, visible: bool) {
        if self.visible == visible {
            return;
        }
        self.visible = visible;
        self.apply_visibility();
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
        let rect = Rect::from_size(size);
        self.pass.rect = rect;
        self.cache.rect = rect;
        self.changes.mark(BlendProperty::Size);
    }

    /// Regenerates the fragment shader if the mode or a resolved input changed. Returns
    /// `true` when it did.
    pub fn update(&mut self) -> bool {
        let background_moved = self.background.proxy.update();
        let foreground_moved = self.foreground.proxy.update();
        if !(self.dirty || background_moved || foreground_moved) {
            return false;
        }
        self.dirty = false;
        self.build_fragment_shader();
        true
    }

    /// Generated source of the current fragment shader.
    pub fn fragment_shader_source(&self) -> &str {
        &self.fragment_source
    }

    pub fn background_layer(&self) -> Option<&LayerConfig> {
        self.background.proxy.layer_config()
    }

    pub fn foreground_layer(&self) -> Option<&LayerConfig> {
        self.foreground.proxy.layer_config()
    }

    pub fn pass(&self) -> &RenderNode {
        &self.pass
    }

    pub fn cache_node(&self) -> &RenderNode {
        &self.cache
    }

    pub fn output_node(&self) -> NodeId {
        if self.cached {
            self.cache.id
        } else {
            self.pass.id
        }
    }

    pub fn render_graph(&self) -> RenderGraph {
        let mut graph = RenderGraph::new();
        for proxy in [&self.background.proxy, &self.foreground.proxy] {
            if let Some(capture) = proxy.capture_node() {
                graph.push(capture);
            }
        }
        graph.push(self.pass.clone());
        graph.push(self.cache.clone());
        graph
    }

    pub fn take_changes(&mut self) -> Vec<BlendProperty> {
        self.changes.take()
    }

    fn apply_visibility(&mut self) {
        if self.cached {
            self.pass.visible = true;
            self.cache.visible = self.visible;
        } else {
            self.pass.visible = self.visible;
            self.cache.visible = false;
        }
    }

    fn build_fragment_shader(&mut self) {
        let mut samplers: SmallVec<[SamplerBinding; 2]> = SmallVec::new();
        if let Some(source) = self.background.texture() {
            samplers.push(SamplerBinding {
                binding: 1,
                name: "source",
                source,
            });
        }
        if let Some(source) = self.foreground.texture() {
            samplers.push(SamplerBinding {
                binding: 2,
                name: "foregroundSource",
                source,
            });
        }

        self.fragment_source = generate(self.mode);
        let fragment = self.shaders.build_fragment_shader(&self.fragment_source);
        if let Some(previous) = std::mem::replace(&mut self.fragment, fragment) {
            self.shaders.release([previous]);
        }
        tracing::debug!("built {} blend shader", self.mode);

        if let Some(pass) = self.pass.shader_pass_mut() {
            pass.vertex = self.vertex;
            pass.fragment = fragment;
            pass.samplers = samplers;
        }
    }
}

impl Drop for BlendEffect {
    fn drop(&mut self) {
        self.shaders.release(self.vertex.into_iter().chain(self.fragment));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ItemId;
    use crate::proxy::FillMode;
    use crate::shader::{GraphicsApi, MemoryCompiler, ShaderBaker};

    fn effect() -> (BlendEffect, MemoryCompiler) {
        let compiler = MemoryCompiler::new();
        let baker = ShaderBaker::new(GraphicsApi::Metal, compiler.clone()).into_shared();
        (BlendEffect::new(ShaderBuilder::new(baker)), compiler)
    }

    fn image(id: u64) -> EffectInput {
        EffectInput::Item(SourceItem::image(
            ItemId(id),
            FillMode::Stretch,
            Size::new(10.0, 10.0),
        ))
    }

    fn sampler(effect: &BlendEffect, name: &str) -> Option<TextureSource> {
        effect.pass().shader_pass()?.sampler(name).map(|s| s.source)
    }

    #[test]
    fn starts_with_a_compiled_normal_blend() {
        let (effect, _) = effect();
        assert_eq!(effect.mode(), BlendMode::Normal);
        assert_eq!(effect.fragment_shader_source(), generate(BlendMode::Normal));
        assert!(effect.pass().shader_pass().unwrap().is_drawable());
    }

    #[test]
    fn binds_background_and_foreground() {
        let (mut effect, _) = effect();
        let upstream = NodeId(4242);
        effect.set_background(EffectInput::Node(upstream));
        effect.set_foreground(image(2));
        assert!(effect.update());
        assert_eq!(sampler(&effect, "source"), Some(TextureSource::Node(upstream)));
        assert_eq!(
            sampler(&effect, "foregroundSource"),
            Some(TextureSource::Item(ItemId(2)))
        );
        let pass = effect.pass().shader_pass().unwrap();
        assert_eq!(pass.sampler("foregroundSource").unwrap().binding, 2);
        assert_eq!(
            effect.take_changes(),
            vec![BlendProperty::Background, BlendProperty::Foreground]
        );
    }

    #[test]
    fn mode_change_regenerates_the_fragment_shader() {
        let (mut effect, compiler) = effect();
        effect.set_mode(BlendMode::Multiply);
        assert!(effect.update());
        assert!(effect.fragment_shader_source().contains("result.rgb = rgb1 * rgb2;"));
        let fragment = effect.pass().shader_pass().unwrap().fragment.unwrap();
        assert_eq!(compiler.program(fragment).unwrap().source, generate(BlendMode::Multiply));
        assert!(!effect.update());
    }

    #[test]
    fn resolved_input_change_rebinds() {
        let (mut effect, _) = effect();
        effect.set_background(image(1));
        effect.update();
        assert_eq!(sampler(&effect, "source"), Some(TextureSource::Item(ItemId(1))));

        let mut item = SourceItem::image(ItemId(1), FillMode::Stretch, Size::new(10.0, 10.0));
        item.has_children = true;
        effect.set_background(EffectInput::Item(item));
        assert!(effect.update());
        assert!(matches!(
            sampler(&effect, "source"),
            Some(TextureSource::Capture(_))
        ));
        assert!(effect.render_graph().find("capture").is_some());
        assert_eq!(effect.take_changes(), vec![BlendProperty::Background]);
    }

    #[test]
    fn cached_shows_the_cache_node() {
        let (mut effect, _) = effect();
        effect.set_cached(true);
        assert!(!effect.update());
        assert!(effect.cache_node().visible);
        assert_eq!(effect.output_node(), effect.cache_node().id);
    }

    #[test]
    fn hiding_follows_the_output_node() {
        let (mut effect, _) = effect();
        effect.set_visible(false);
        assert!(!effect.pass().visible);
        effect.set_cached(true);
        assert!(!effect.cache_node().visible);
        effect.set_visible(true);
        assert!(effect.cache_node().visible);
        effect.set_cached(false);
        assert!(effect.pass().visible);
        assert!(!effect.cache_node().visible);
    }
}
