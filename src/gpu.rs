//! wgpu backing for shader compilation and capture buffers.

use crate::error::CompileError;
use crate::id::{CaptureId, ShaderHandle};
use crate::shader::{sampler_bindings, CompileRequest, ShaderCompiler, ShaderStage};
use ahash::AHashMap;
use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

/// Samplers of a combined `sampler2D` at binding `N` are bound at `N + SAMPLER_BINDING_OFFSET`;
/// the texture keeps binding `N`.
pub const SAMPLER_BINDING_OFFSET: u32 = 16;

/// Maximum number of idle textures to keep in the pool.
const MAX_POOL_SIZE: usize = 8;

// ── GLSL front end ───────────────────────────────────────────────────────────

fn per_vertex_regex() -> &'static Regex {
    static PER_VERTEX: OnceLock<Regex> = OnceLock::new();
    PER_VERTEX.get_or_init(|| {
        Regex::new(r"out\s+gl_PerVertex\s*\{[^}]*\}\s*;[ \t]*\n?")
            .expect("gl_PerVertex pattern is valid")
    })
}

/// Drops the `gl_PerVertex` redeclaration, which naga's GLSL front end rejects.
pub(crate) fn strip_per_vertex_block(source: &str) -> Cow<'_, str> {
    per_vertex_regex().replace_all(source, "")
}

/// Splits every combined `sampler2D` into a `texture2D` and a `sampler`, and rewrites
/// `texture(name, ...)` lookups to build the combined sampler in place.
pub(crate) fn split_combined_samplers(source: &str) -> String {
    let mut output = source.to_owned();
    for decl in sampler_bindings(source) {
        let name = regex::escape(&decl.name);
        let declaration = Regex::new(&format!(
            r"layout\s*\(\s*binding\s*=\s*{}\s*\)\s*uniform\s+sampler2D\s+{name}\s*;",
            decl.binding
        ));
        let lookup = Regex::new(&format!(r"\btexture\(\s*{name}\s*,"));
        let (Ok(declaration), Ok(lookup)) = (declaration, lookup) else {
            continue;
        };

        let replacement = format!(
            "layout(binding = {binding}) uniform texture2D {name};\n\
             layout(binding = {sampler}) uniform sampler {name}_sampler;",
            binding = decl.binding,
            sampler = decl.binding + SAMPLER_BINDING_OFFSET,
            name = decl.name,
        );
        output = declaration
            .replace_all(&output, regex::NoExpand(&replacement))
            .into_owned();
        let combined = format!(
            "texture(sampler2D({name}, {name}_sampler),",
            name = decl.name
        );
        output = lookup
            .replace_all(&output, regex::NoExpand(&combined))
            .into_owned();
    }
    output
}

/// Rewrites generated Vulkan-flavoured GLSL into what wgpu's GLSL front end accepts.
pub fn prepare_glsl(source: &str) -> String {
    split_combined_samplers(&strip_per_vertex_block(source))
}

/// Compiles generated shaders into `wgpu::ShaderModule`s.
///
/// wgpu translates to the backend language itself, so the requested targets only serve
/// as a sanity check. Validation errors are caught through an error scope.
pub struct WgpuShaderCompiler {
    device: wgpu::Device,
    modules: AHashMap<ShaderHandle, wgpu::ShaderModule>,
    next_handle: u64,
}

impl WgpuShaderCompiler {
    pub fn new(device: wgpu::Device) -> Self {
        Self {
            device,
            modules: AHashMap::new(),
            next_handle: 0,
        }
    }

    pub fn module(&self, handle: ShaderHandle) -> Option<&wgpu::ShaderModule> {
        self.modules.get(&handle)
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }
}

impl ShaderCompiler for WgpuShaderCompiler {
    fn compile(&mut self, request: &CompileRequest<'_>) -> Result<ShaderHandle, CompileError> {
        let stage = match request.stage {
            ShaderStage::Vertex => wgpu::naga::ShaderStage::Vertex,
            ShaderStage::Fragment => wgpu::naga::ShaderStage::Fragment,
        };
        let label = format!("acrylic_fx_{}_shader", request.stage);

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&label),
                source: wgpu::ShaderSource::Glsl {
                    shader: Cow::Owned(prepare_glsl(request.source)),
                    stage,
                    defines: Default::default(),
                },
            });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(CompileError::Failed {
                stage: request.stage,
                message: error.to_string(),
            });
        }

        self.next_handle += 1;
        let handle = ShaderHandle(self.next_handle);
        self.modules.insert(handle, module);
        Ok(handle)
    }

    fn release(&mut self, handle: ShaderHandle) {
        self.modules.remove(&handle);
    }
}

// ── Capture textures ─────────────────────────────────────────────────────────

/// Size and format a capture texture is allocated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureKey {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

/// The offscreen texture behind a [`crate::graph::CaptureBuffer`].
pub struct CaptureTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub key: TextureKey,
}

impl CaptureTexture {
    pub fn create(device: &wgpu::Device, key: TextureKey) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("acrylic_fx_capture"),
            size: wgpu::Extent3d {
                width: key.width.max(1),
                height: key.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: key.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view, key }
    }
}

/// Textures of live captures, plus a few idle ones for reuse.
///
/// Each capture id owns at most one texture. Releasing a capture (its proxy switched
/// back to direct sampling) returns the texture to the idle list.
pub struct CaptureTexturePool<T = CaptureTexture> {
    in_use: AHashMap<CaptureId, (TextureKey, T)>,
    available: Vec<(TextureKey, T)>,
}

impl<T> Default for CaptureTexturePool<T> {
    fn default() -> Self {
        Self {
            in_use: AHashMap::new(),
            available: Vec::new(),
        }
    }
}

impl CaptureTexturePool<CaptureTexture> {
    /// Returns the texture of `capture`, allocating or reusing one of the right size.
    pub fn acquire(
        &mut self,
        device: &wgpu::Device,
        capture: CaptureId,
        key: TextureKey,
    ) -> &CaptureTexture {
        self.acquire_with(capture, key, || CaptureTexture::create(device, key))
    }
}

impl<T> CaptureTexturePool<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Like [`CaptureTexturePool::acquire`] with a custom allocator.
    pub fn acquire_with(
        &mut self,
        capture: CaptureId,
        key: TextureKey,
        create: impl FnOnce() -> T,
    ) -> &T {
        if self.in_use.get(&capture).is_some_and(|(k, _)| *k != key) {
            self.release(capture);
        }
        let available = &mut self.available;
        let (_, texture) = self.in_use.entry(capture).or_insert_with(|| {
            let texture = match available.iter().position(|(k, _)| *k == key) {
                Some(index) => available.swap_remove(index).1,
                None => {
                    tracing::debug!(
                        "allocating {}x{} capture texture for {capture}",
                        key.width,
                        key.height
                    );
                    create()
                }
            };
            (key, texture)
        });
        texture
    }

    pub fn get(&self, capture: CaptureId) -> Option<&T> {
        self.in_use.get(&capture).map(|(_, texture)| texture)
    }

    /// Returns the texture of `capture` to the idle list. The list is capped at eight
    /// textures; the oldest are dropped first.
    pub fn release(&mut self, capture: CaptureId) {
        if let Some(entry) = self.in_use.remove(&capture) {
            self.available.push(entry);
            if self.available.len() > MAX_POOL_SIZE {
                let excess = self.available.len() - MAX_POOL_SIZE;
                self.available.drain(..excess);
            }
        }
    }

    /// Drops idle textures that don't match `key`, e.g. after a resize.
    pub fn trim(&mut self, key: TextureKey) {
        self.available.retain(|(k, _)| *k == key);
    }

    pub fn in_use(&self) -> usize {
        self.in_use.len()
    }

    pub fn idle(&self) -> usize {
        self.available.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: TextureKey = TextureKey {
        width: 64,
        height: 32,
        format: wgpu::TextureFormat::Rgba8Unorm,
    };

    #[test]
    fn per_vertex_block_is_removed() {
        let source = "#version 440\nout gl_PerVertex { vec4 gl_Position; };\n\nvoid main() {}\n";
        assert_eq!(strip_per_vertex_block(source), "#version 440\n\nvoid main() {}\n");
    }

    #[test]
    fn combined_samplers_are_split() {
        let source = "layout(binding = 1) uniform sampler2D source;\n\
                      layout(binding = 2) uniform sampler2D foregroundSource;\n\
                      void main() {\n\
                      \x20   vec4 a = texture(source, uv);\n\
                      \x20   vec4 b = texture(foregroundSource, uv);\n\
                      }\n";
        let rewritten = split_combined_samplers(source);
        assert!(rewritten.contains("layout(binding = 1) uniform texture2D source;"));
        assert!(rewritten.contains("layout(binding = 17) uniform sampler source_sampler;"));
        assert!(rewritten.contains("layout(binding = 18) uniform sampler foregroundSource_sampler;"));
        assert!(rewritten.contains("texture(sampler2D(source, source_sampler), uv)"));
        assert!(rewritten.contains(
            "texture(sampler2D(foregroundSource, foregroundSource_sampler), uv)"
        ));
        assert!(!rewritten.contains("sampler2D source;"));
    }

    #[test]
    fn generated_blend_shader_is_rewritten() {
        let source = crate::blend::generate(crate::blend::BlendMode::Screen);
        let prepared = prepare_glsl(&source);
        assert!(!prepared.contains("uniform sampler2D"));
        assert!(prepared.contains("texture(sampler2D(source, source_sampler), qt_TexCoord0)"));
    }

    #[test]
    fn pool_reuses_released_textures() {
        let mut pool: CaptureTexturePool<u32> = CaptureTexturePool::new();
        let mut allocations = 0;
        let first = CaptureId(1);
        assert_eq!(*pool.acquire_with(first, KEY, || { allocations += 1; 7 }), 7);
        assert_eq!(*pool.acquire_with(first, KEY, || { allocations += 1; 8 }), 7);
        pool.release(first);
        assert_eq!(pool.idle(), 1);

        let second = CaptureId(2);
        assert_eq!(*pool.acquire_with(second, KEY, || { allocations += 1; 9 }), 7);
        assert_eq!(allocations, 1);
        assert_eq!(pool.in_use(), 1);
        assert!(pool.get(first).is_none());
    }

    #[test]
    fn pool_reallocates_on_resize_and_caps_idle_textures() {
        let mut pool: CaptureTexturePool<u32> = CaptureTexturePool::new();
        let capture = CaptureId(1);
        pool.acquire_with(capture, KEY, || 1);
        let bigger = TextureKey { width: 128, ..KEY };
        assert_eq!(*pool.acquire_with(capture, bigger, || 2), 2);
        assert_eq!(pool.idle(), 1);
        pool.trim(bigger);
        assert_eq!(pool.idle(), 0);

        for id in 10..20 {
            pool.acquire_with(CaptureId(id), KEY, || id as u32);
        }
        for id in 10..20 {
            pool.release(CaptureId(id));
        }
        assert_eq!(pool.idle(), 8);
    }
}
