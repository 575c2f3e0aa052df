use crate::id::ShaderHandle;
use crate::shader::blur::{self, BlurPath, BlurShaderRequest};
use crate::shader::{ShaderStage, SharedShaderBaker};
use crate::util::lock_unpoisoned;

/// Vertex shader used by passes that only need interpolated texture coordinates.
pub(crate) const PASSTHROUGH_VERTEX_SHADER: &str = "#version 440\n\n\
    layout(location = 0) in vec4 qt_Vertex;\n\
    layout(location = 1) in vec2 qt_MultiTexCoord0;\n\n\
    layout(location = 0) out vec2 qt_TexCoord0;\n\n\
    layout(std140, binding = 0) uniform buf {\n\
    \x20   mat4 qt_Matrix;\n\
    \x20   float qt_Opacity;\n\
    };\n\n\
    out gl_PerVertex { vec4 gl_Position; };\n\n\
    void main() {\n\
    \x20   qt_TexCoord0 = qt_MultiTexCoord0;\n\
    \x20   gl_Position = qt_Matrix * qt_Vertex;\n\
    }\n";

/// Generated GLSL for one vertex/fragment pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderSources {
    pub vertex: String,
    pub fragment: String,
}

/// Compiled programs for one pair. A `None` entry failed to compile and was logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompiledShaderPair {
    pub vertex: Option<ShaderHandle>,
    pub fragment: Option<ShaderHandle>,
}

impl CompiledShaderPair {
    /// `true` when both stages compiled.
    pub fn is_complete(&self) -> bool {
        self.vertex.is_some() && self.fragment.is_some()
    }

    pub fn handles(&self) -> impl Iterator<Item = ShaderHandle> {
        self.vertex.into_iter().chain(self.fragment)
    }
}

/// Result of [`ShaderBuilder::gaussian_blur`].
#[derive(Debug, Clone, PartialEq)]
pub struct BlurShaders {
    pub path: BlurPath,
    pub sources: ShaderSources,
    pub compiled: CompiledShaderPair,
}

/// Generates effect shaders and compiles them through the shared [`crate::ShaderBaker`].
///
/// Builders are cheap to clone; every effect owns one. Every handle a builder returns
/// is acquired for the caller and stays valid until passed to [`ShaderBuilder::release`],
/// however many other programs go through the baker's cache in the meantime.
#[derive(Clone)]
pub struct ShaderBuilder {
    baker: SharedShaderBaker,
}

impl ShaderBuilder {
    pub fn new(baker: SharedShaderBaker) -> Self {
        Self { baker }
    }

    pub fn baker(&self) -> &SharedShaderBaker {
        &self.baker
    }

    /// Maximum number of varyings the optimized blur path may use on this device.
    pub fn max_blur_samples(&self) -> usize {
        lock_unpoisoned(&self.baker).max_blur_samples()
    }

    /// Generates and compiles the shader pair for one blur pass.
    ///
    /// Both passes of a separable blur share the pair; only their uniforms differ.
    pub fn gaussian_blur(&self, request: &BlurShaderRequest) -> BlurShaders {
        let (max_samples, enforce) = {
            let baker = lock_unpoisoned(&self.baker);
            (baker.max_blur_samples(), baker.enforces_varying_budget())
        };
        let (path, vertex, fragment) = blur::emit(request, max_samples, enforce);
        tracing::debug!(
            "generated blur shaders: {path:?}, radius {}, deviation {}",
            request.radius,
            request.deviation
        );

        let compiled = CompiledShaderPair {
            vertex: self.build_vertex_shader(&vertex),
            fragment: self.build_fragment_shader(&fragment),
        };
        BlurShaders {
            path,
            sources: ShaderSources { vertex, fragment },
            compiled,
        }
    }

    /// Compiles the shared pass-through vertex shader.
    pub fn build_passthrough_vertex_shader(&self) -> Option<ShaderHandle> {
        self.build_vertex_shader(PASSTHROUGH_VERTEX_SHADER)
    }

    pub fn build_vertex_shader(&self, code: &str) -> Option<ShaderHandle> {
        self.build_shader(ShaderStage::Vertex, code)
    }

    pub fn build_fragment_shader(&self, code: &str) -> Option<ShaderHandle> {
        self.build_shader(ShaderStage::Fragment, code)
    }

    /// Gives back handles returned by this builder (or a clone of it).
    pub fn release(&self, handles: impl IntoIterator<Item = ShaderHandle>) {
        let mut baker = lock_unpoisoned(&self.baker);
        for handle in handles {
            baker.release(handle);
        }
    }

    fn build_shader(&self, stage: ShaderStage, code: &str) -> Option<ShaderHandle> {
        match lock_unpoisoned(&self.baker).acquire(stage, code) {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::warn!("failed to compile {stage} shader: {err}\n{code}");
                None
            }
        }
    }
}
