use crate::cache::{ShaderCache, DEFAULT_SHADER_CACHE_CAPACITY};
use crate::error::CompileError;
use crate::id::ShaderHandle;
use crate::shader::{GraphicsApi, ShaderStage, ShaderTarget};
use crate::util::lock_unpoisoned;
use crate::EffectsConfig;
use ahash::{AHashMap, AHashSet};
use smallvec::SmallVec;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// One compilation job handed to a [`ShaderCompiler`].
#[derive(Debug, Clone, Copy)]
pub struct CompileRequest<'a> {
    pub stage: ShaderStage,
    pub source: &'a str,
    /// Languages the program must be available in. Never empty.
    pub targets: &'a [ShaderTarget],
}

/// Turns GLSL 440 source into a device-specific program.
///
/// Compilation is blocking. Implementations report failures with the compiler log;
/// callers decide whether a failure is fatal (effects never treat it as such).
pub trait ShaderCompiler: Send {
    fn compile(&mut self, request: &CompileRequest<'_>) -> Result<ShaderHandle, CompileError>;

    /// Called once no cache entry and no effect refers to the program any more.
    fn release(&mut self, _handle: ShaderHandle) {}
}

/// A program stored by [`MemoryCompiler`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledShader {
    pub stage: ShaderStage,
    pub source: String,
    pub targets: SmallVec<[ShaderTarget; 3]>,
}

/// A compiler that keeps sources in memory after a structural check.
///
/// Used by hosts that translate shaders themselves at draw time, and in tests. Clones
/// share the same program table.
#[derive(Debug, Clone, Default)]
pub struct MemoryCompiler {
    programs: Arc<Mutex<AHashMap<ShaderHandle, CompiledShader>>>,
    next_handle: Arc<Mutex<u64>>,
}

impl MemoryCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn program(&self, handle: ShaderHandle) -> Option<CompiledShader> {
        lock_unpoisoned(&self.programs).get(&handle).cloned()
    }

    /// Number of live programs.
    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.programs).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn validate(source: &str) -> Result<(), String> {
        if !source.trim_start().starts_with("#version") {
            return Err("missing #version directive".to_owned());
        }
        if !source.contains("void main()") {
            return Err("missing entry point `void main()`".to_owned());
        }
        let mut depth = [0i32; 2];
        for c in source.chars() {
            match c {
                '{' => depth[0] += 1,
                '}' => depth[0] -= 1,
                '(' => depth[1] += 1,
                ')' => depth[1] -= 1,
                _ => {}
            }
            if depth.iter().any(|d| *d < 0) {
                return Err(format!("unbalanced `{c}`"));
            }
        }
        if depth != [0, 0] {
            return Err("unterminated block or expression".to_owned());
        }
        Ok(())
    }
}

impl ShaderCompiler for MemoryCompiler {
    fn compile(&mut self, request: &CompileRequest<'_>) -> Result<ShaderHandle, CompileError> {
        Self::validate(request.source).map_err(|message| CompileError::Failed {
            stage: request.stage,
            message,
        })?;

        let handle = {
            let mut next = lock_unpoisoned(&self.next_handle);
            *next += 1;
            ShaderHandle(*next)
        };
        lock_unpoisoned(&self.programs).insert(
            handle,
            CompiledShader {
                stage: request.stage,
                source: request.source.to_owned(),
                targets: SmallVec::from_slice(request.targets),
            },
        );
        Ok(handle)
    }

    fn release(&mut self, handle: ShaderHandle) {
        lock_unpoisoned(&self.programs).remove(&handle);
    }
}

/// Compiles generated shaders for the graphics API chosen at startup.
///
/// A baker is created once per process (or per rendering device) and shared by every
/// [`crate::ShaderBuilder`]; compiled handles are cached by source.
pub struct ShaderBaker {
    api: GraphicsApi,
    targets: SmallVec<[ShaderTarget; 3]>,
    max_blur_samples: usize,
    enforce_varying_budget: bool,
    compiler: Box<dyn ShaderCompiler>,
    cache: ShaderCache,
    /// Programs effects currently render with, and how many times each was acquired.
    retained: AHashMap<ShaderHandle, usize>,
    /// Retained programs that already left the cache. Released with their last holder.
    detached: AHashSet<ShaderHandle>,
}

pub type SharedShaderBaker = Arc<Mutex<ShaderBaker>>;

impl ShaderBaker {
    pub fn new(api: GraphicsApi, compiler: impl ShaderCompiler + 'static) -> Self {
        let targets = api.targets();
        if targets.is_empty() {
            tracing::warn!("unsupported graphics API {api}, no shaders will be generated");
        }
        Self {
            api,
            targets,
            max_blur_samples: api.default_max_blur_samples(),
            enforce_varying_budget: false,
            compiler: Box::new(compiler),
            cache: ShaderCache::new(
                NonZeroUsize::new(DEFAULT_SHADER_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            ),
            retained: AHashMap::new(),
            detached: AHashSet::new(),
        }
    }

    /// Builds a baker for `api` with the overrides from `config` applied.
    pub fn from_config(
        api: GraphicsApi,
        config: &EffectsConfig,
        compiler: impl ShaderCompiler + 'static,
    ) -> Self {
        let mut baker = Self::new(config.graphics_api.unwrap_or(api), compiler)
            .with_varying_budget_enforced(config.enforce_varying_budget)
            .with_cache_capacity(config.shader_cache_capacity);
        if let Some(max) = config.max_blur_samples {
            baker = baker.with_max_blur_samples(max);
        }
        baker
    }

    /// Overrides the varying budget, e.g. with a value queried from the device.
    pub fn with_max_blur_samples(mut self, max_blur_samples: usize) -> Self {
        self.max_blur_samples = max_blur_samples.max(1);
        self
    }

    /// Forces the fallback blur path for kernels above the varying budget.
    pub fn with_varying_budget_enforced(mut self, enforce: bool) -> Self {
        self.enforce_varying_budget = enforce;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: NonZeroUsize) -> Self {
        for handle in self.cache.take_all() {
            self.evict(handle);
        }
        self.cache = ShaderCache::new(capacity);
        self
    }

    pub fn into_shared(self) -> SharedShaderBaker {
        Arc::new(Mutex::new(self))
    }

    pub fn api(&self) -> GraphicsApi {
        self.api
    }

    pub fn targets(&self) -> &[ShaderTarget] {
        &self.targets
    }

    pub fn max_blur_samples(&self) -> usize {
        self.max_blur_samples
    }

    pub fn enforces_varying_budget(&self) -> bool {
        self.enforce_varying_budget
    }

    /// Number of compiled programs currently cached.
    pub fn cached_programs(&self) -> usize {
        self.cache.len()
    }

    /// Number of distinct programs held by effects, cached or not.
    pub fn retained_programs(&self) -> usize {
        self.retained.len()
    }

    /// Empties the cache, e.g. after the rendering device was lost. Programs effects
    /// still hold stay alive until they are released.
    pub fn clear_cache(&mut self) {
        for handle in self.cache.take_all() {
            self.evict(handle);
        }
    }

    /// Compiles `source` for every target, reusing a cached program for identical source.
    pub fn bake(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderHandle, CompileError> {
        if self.targets.is_empty() {
            return Err(CompileError::NoTargets(self.api));
        }

        let key = self.cache.key(stage, source);
        if let Some(handle) = self.cache.get(&key) {
            return Ok(handle);
        }

        #[cfg(feature = "performance_measurement")]
        let started = std::time::Instant::now();

        let handle = self.compiler.compile(&CompileRequest {
            stage,
            source,
            targets: &self.targets,
        })?;

        #[cfg(feature = "performance_measurement")]
        tracing::debug!("compiled {stage} shader in {:?}", started.elapsed());

        if let Some(evicted) = self.cache.insert(key, handle) {
            self.evict(evicted);
        }
        Ok(handle)
    }

    /// Like [`ShaderBaker::bake`], but the program also stays alive after it leaves the
    /// cache, until a matching [`ShaderBaker::release`].
    pub fn acquire(
        &mut self,
        stage: ShaderStage,
        source: &str,
    ) -> Result<ShaderHandle, CompileError> {
        let handle = self.bake(stage, source)?;
        *self.retained.entry(handle).or_insert(0) += 1;
        Ok(handle)
    }

    /// Gives back one acquisition of `handle`.
    pub fn release(&mut self, handle: ShaderHandle) {
        let Some(count) = self.retained.get_mut(&handle) else {
            tracing::warn!("released {handle}, which was never acquired");
            return;
        };
        *count -= 1;
        if *count > 0 {
            return;
        }
        self.retained.remove(&handle);
        if self.detached.remove(&handle) {
            self.compiler.release(handle);
        }
    }

    fn evict(&mut self, handle: ShaderHandle) {
        if self.retained.contains_key(&handle) {
            self.detached.insert(handle);
        } else {
            self.compiler.release(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "#version 440\nvoid main() {\n}\n";

    #[test]
    fn identical_sources_reuse_the_compiled_program() {
        let compiler = MemoryCompiler::new();
        let mut baker = ShaderBaker::new(GraphicsApi::Vulkan, compiler.clone());
        let a = baker.bake(ShaderStage::Fragment, VALID).unwrap();
        let b = baker.bake(ShaderStage::Fragment, VALID).unwrap();
        assert_eq!(a, b);
        assert_eq!(compiler.len(), 1);
        assert_eq!(
            compiler.program(a).unwrap().targets.as_slice(),
            &[ShaderTarget::SPIRV_100]
        );
    }

    #[test]
    fn structural_errors_are_reported() {
        let mut baker = ShaderBaker::new(GraphicsApi::Metal, MemoryCompiler::new());
        let err = baker
            .bake(ShaderStage::Vertex, "#version 440\nvoid main() {\n")
            .unwrap_err();
        assert!(matches!(
            err,
            CompileError::Failed {
                stage: ShaderStage::Vertex,
                ..
            }
        ));
        assert_eq!(baker.cached_programs(), 0);
    }

    #[test]
    fn unsupported_api_bakes_nothing() {
        let mut baker = ShaderBaker::new(GraphicsApi::Software, MemoryCompiler::new());
        assert!(matches!(
            baker.bake(ShaderStage::Vertex, VALID),
            Err(CompileError::NoTargets(GraphicsApi::Software))
        ));
    }

    #[test]
    fn evicted_programs_are_released() {
        let compiler = MemoryCompiler::new();
        let mut baker = ShaderBaker::new(GraphicsApi::Vulkan, compiler.clone())
            .with_cache_capacity(NonZeroUsize::new(1).unwrap());
        baker.bake(ShaderStage::Vertex, VALID).unwrap();
        baker.bake(ShaderStage::Fragment, VALID).unwrap();
        assert_eq!(compiler.len(), 1);
    }

    #[test]
    fn acquired_programs_outlive_eviction() {
        let compiler = MemoryCompiler::new();
        let mut baker = ShaderBaker::new(GraphicsApi::Vulkan, compiler.clone())
            .with_cache_capacity(NonZeroUsize::new(2).unwrap());
        let held = baker.acquire(ShaderStage::Vertex, VALID).unwrap();
        for i in 0..8 {
            let source = format!("#version 440\nvoid main() {{\n    // {i}\n}}\n");
            baker.bake(ShaderStage::Fragment, &source).unwrap();
        }
        assert_eq!(baker.cached_programs(), 2);
        assert!(compiler.program(held).is_some());
        assert_eq!(compiler.len(), 3);

        baker.release(held);
        assert!(compiler.program(held).is_none());
        assert_eq!(baker.retained_programs(), 0);
    }

    #[test]
    fn cached_programs_survive_their_last_holder() {
        let compiler = MemoryCompiler::new();
        let mut baker = ShaderBaker::new(GraphicsApi::Vulkan, compiler.clone());
        let first = baker.acquire(ShaderStage::Fragment, VALID).unwrap();
        let second = baker.acquire(ShaderStage::Fragment, VALID).unwrap();
        assert_eq!(first, second);
        baker.release(first);
        baker.release(second);
        assert!(compiler.program(first).is_some());
        assert_eq!(baker.bake(ShaderStage::Fragment, VALID).unwrap(), first);

        baker.clear_cache();
        assert!(compiler.is_empty());
    }

    #[test]
    fn clearing_the_cache_keeps_held_programs() {
        let compiler = MemoryCompiler::new();
        let mut baker = ShaderBaker::new(GraphicsApi::Vulkan, compiler.clone());
        let held = baker.acquire(ShaderStage::Vertex, VALID).unwrap();
        baker.bake(ShaderStage::Fragment, VALID).unwrap();
        baker.clear_cache();
        assert_eq!(compiler.len(), 1);
        assert!(compiler.program(held).is_some());
        baker.release(held);
        assert!(compiler.is_empty());
    }

    #[test]
    fn effects_sharing_a_small_cache_keep_their_programs() {
        use crate::shader::{BlurShaderRequest, ShaderBuilder};
        use crate::BlendEffect;

        let compiler = MemoryCompiler::new();
        let baker = ShaderBaker::new(GraphicsApi::Vulkan, compiler.clone())
            .with_cache_capacity(NonZeroUsize::new(2).unwrap())
            .into_shared();
        let blend = BlendEffect::new(ShaderBuilder::new(baker.clone()));
        let pass = blend.pass().shader_pass().unwrap().clone();
        assert!(pass.is_drawable());

        let other = ShaderBuilder::new(baker.clone());
        for step in 1..=40 {
            let radius = f64::from(step) / 2.0;
            let shaders = other.gaussian_blur(&BlurShaderRequest {
                radius,
                deviation: (radius + 1.0) / 3.3333,
                alpha_only: false,
                masked: false,
                fallback: false,
            });
            other.release(shaders.compiled.handles());
        }

        let vertex = pass.vertex.unwrap();
        let fragment = pass.fragment.unwrap();
        assert!(compiler.program(vertex).is_some());
        assert!(compiler.program(fragment).is_some());
        assert_eq!(lock_unpoisoned(&baker).retained_programs(), 2);

        drop(blend);
        assert!(compiler.program(vertex).is_none());
        assert!(compiler.program(fragment).is_none());
        assert_eq!(lock_unpoisoned(&baker).retained_programs(), 0);
    }

    #[test]
    fn config_overrides_the_budget() {
        let config = EffectsConfig {
            max_blur_samples: Some(4),
            enforce_varying_budget: true,
            ..EffectsConfig::default()
        };
        let baker = ShaderBaker::from_config(GraphicsApi::OpenGl, &config, MemoryCompiler::new());
        assert_eq!(baker.max_blur_samples(), 4);
        assert!(baker.enforces_varying_budget());
        assert_eq!(baker.targets().len(), 3);
    }
}
