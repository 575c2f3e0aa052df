//! Runs against a real wgpu device. Skipped when the machine has no adapter.

use acrylic_fx::gpu::{CaptureTexturePool, TextureKey, WgpuShaderCompiler};
use acrylic_fx::{CaptureId, GraphicsApi, ShaderBaker, ShaderBuilder};
use futures::executor::block_on;

async fn headless_device() -> Option<wgpu::Device> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .ok()?;
    let (device, _queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: None,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults(),
            memory_hints: Default::default(),
            trace: Default::default(),
        })
        .await
        .ok()?;
    Some(device)
}

const KEY: TextureKey = TextureKey {
    width: 64,
    height: 32,
    format: wgpu::TextureFormat::Rgba8Unorm,
};

#[test]
fn capture_textures_are_allocated_and_recycled() {
    let Some(device) = block_on(headless_device()) else {
        eprintln!("no wgpu adapter available, skipping");
        return;
    };
    let mut pool = CaptureTexturePool::new();
    let first = CaptureId(1);
    let texture = pool.acquire(&device, first, KEY);
    assert_eq!(texture.texture.width(), 64);
    assert_eq!(texture.texture.height(), 32);

    pool.release(first);
    assert_eq!(pool.idle(), 1);
    pool.acquire(&device, CaptureId(2), KEY);
    assert_eq!(pool.idle(), 0);
    assert_eq!(pool.in_use(), 1);
}

#[test]
fn passthrough_vertex_shader_compiles_to_a_module() {
    let Some(device) = block_on(headless_device()) else {
        eprintln!("no wgpu adapter available, skipping");
        return;
    };
    let baker = ShaderBaker::new(GraphicsApi::Vulkan, WgpuShaderCompiler::new(device));
    let shaders = ShaderBuilder::new(baker.into_shared());
    assert!(shaders.build_passthrough_vertex_shader().is_some());
}
