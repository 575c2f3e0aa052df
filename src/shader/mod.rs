//! Shader source generation and compilation.
//!
//! Generated shaders are Vulkan-flavoured GLSL 440 with a `std140` uniform block at
//! binding 0 and combined image samplers from binding 1 upwards. A [`ShaderBaker`]
//! translates them to the shading languages of the graphics API picked at startup,
//! through a pluggable [`ShaderCompiler`].

pub(crate) mod blur;
mod builder;
mod compiler;
pub(crate) mod glsl;

pub use blur::{BlurPath, BlurShaderRequest};
pub use builder::{BlurShaders, CompiledShaderPair, ShaderBuilder, ShaderSources};
pub use compiler::{
    CompileRequest, CompiledShader, MemoryCompiler, ShaderBaker, ShaderCompiler, SharedShaderBaker,
};
pub use glsl::{format_number, sampler_bindings, SamplerDecl};

use smallvec::SmallVec;
use std::fmt;

/// Varying budget assumed for every API except OpenGL. Some Metal implementations
/// expose 60 interpolated components, i.e. 15 vectors.
pub const DEFAULT_MAX_BLUR_SAMPLES: usize = 15;

/// Varying budget assumed for OpenGL when the context cannot be queried; the minimum
/// guaranteed by OpenGL ES 2.0.
pub const GL_MAX_BLUR_SAMPLES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// The rendering API the host scene graph renders with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
pub enum GraphicsApi {
    #[serde(rename = "opengl")]
    OpenGl,
    #[serde(rename = "d3d11")]
    Direct3D11,
    #[serde(rename = "d3d12")]
    Direct3D12,
    #[serde(rename = "metal")]
    Metal,
    #[serde(rename = "vulkan")]
    Vulkan,
    #[serde(rename = "software")]
    Software,
}

impl fmt::Display for GraphicsApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GraphicsApi::OpenGl => "OpenGL",
            GraphicsApi::Direct3D11 => "Direct3D 11",
            GraphicsApi::Direct3D12 => "Direct3D 12",
            GraphicsApi::Metal => "Metal",
            GraphicsApi::Vulkan => "Vulkan",
            GraphicsApi::Software => "software",
        };
        f.write_str(name)
    }
}

impl From<wgpu::Backend> for GraphicsApi {
    fn from(backend: wgpu::Backend) -> Self {
        match backend {
            wgpu::Backend::Vulkan => GraphicsApi::Vulkan,
            wgpu::Backend::Metal => GraphicsApi::Metal,
            wgpu::Backend::Dx12 => GraphicsApi::Direct3D12,
            wgpu::Backend::Gl => GraphicsApi::OpenGl,
            _ => GraphicsApi::Software,
        }
    }
}

impl GraphicsApi {
    /// Shading-language targets every generated shader is compiled to.
    ///
    /// ```
    /// use acrylic_fx::{GraphicsApi, ShaderTarget};
    ///
    /// assert_eq!(GraphicsApi::OpenGl.targets().len(), 3);
    /// assert_eq!(GraphicsApi::Metal.targets().as_slice(), &[ShaderTarget::MSL_12]);
    /// assert!(GraphicsApi::Software.targets().is_empty());
    /// ```
    pub fn targets(self) -> SmallVec<[ShaderTarget; 3]> {
        let targets: &[ShaderTarget] = match self {
            GraphicsApi::OpenGl => &[
                ShaderTarget::GLSL_ES_100,
                ShaderTarget::GLSL_120,
                ShaderTarget::GLSL_150,
            ],
            GraphicsApi::Direct3D11 | GraphicsApi::Direct3D12 => &[ShaderTarget::HLSL_50],
            GraphicsApi::Metal => &[ShaderTarget::MSL_12],
            GraphicsApi::Vulkan => &[ShaderTarget::SPIRV_100],
            GraphicsApi::Software => &[],
        };
        SmallVec::from_slice(targets)
    }

    /// Default number of interpolated vectors a blur may use on this API.
    pub fn default_max_blur_samples(self) -> usize {
        match self {
            GraphicsApi::OpenGl => GL_MAX_BLUR_SAMPLES,
            _ => DEFAULT_MAX_BLUR_SAMPLES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadingLanguage {
    Glsl,
    GlslEs,
    Hlsl,
    Msl,
    SpirV,
}

/// A shading language and version a compiler emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderTarget {
    pub language: ShadingLanguage,
    pub version: u32,
}

impl ShaderTarget {
    pub const GLSL_ES_100: Self = Self::new(ShadingLanguage::GlslEs, 100);
    pub const GLSL_120: Self = Self::new(ShadingLanguage::Glsl, 120);
    pub const GLSL_150: Self = Self::new(ShadingLanguage::Glsl, 150);
    pub const HLSL_50: Self = Self::new(ShadingLanguage::Hlsl, 50);
    pub const MSL_12: Self = Self::new(ShadingLanguage::Msl, 12);
    pub const SPIRV_100: Self = Self::new(ShadingLanguage::SpirV, 100);

    pub const fn new(language: ShadingLanguage, version: u32) -> Self {
        Self { language, version }
    }
}

impl fmt::Display for ShaderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let language = match self.language {
            ShadingLanguage::Glsl => "GLSL",
            ShadingLanguage::GlslEs => "GLSL ES",
            ShadingLanguage::Hlsl => "HLSL",
            ShadingLanguage::Msl => "MSL",
            ShadingLanguage::SpirV => "SPIR-V",
        };
        write!(f, "{language} {}", self.version)
    }
}
