use acrylic_fx::blend::{generate, BlendMode};
use acrylic_fx::geometry::Size;
use acrylic_fx::sampling::{derived_deviation, SamplePlan};
use acrylic_fx::shader::{BlurShaderRequest, MemoryCompiler};
use acrylic_fx::{
    FillMode, GaussianBlurEffect, GraphicsApi, ItemId, ShaderBaker, ShaderBuilder, SourceItem,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn shaders() -> ShaderBuilder {
    let baker = ShaderBaker::new(GraphicsApi::Vulkan, MemoryCompiler::new()).into_shared();
    ShaderBuilder::new(baker)
}

fn sample_plans(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_plan");
    for radius in [8.0, 32.0, 60.0] {
        group.bench_with_input(BenchmarkId::from_parameter(radius), &radius, |b, &radius| {
            b.iter(|| SamplePlan::for_kernel_radius(black_box(radius), derived_deviation(radius)))
        });
    }
    group.finish();
}

fn blur_shaders(c: &mut Criterion) {
    let mut group = c.benchmark_group("gaussian_blur_shaders");
    for radius in [8.0, 32.0, 60.0] {
        let request = BlurShaderRequest {
            radius,
            deviation: derived_deviation(radius),
            alpha_only: false,
            masked: false,
            fallback: false,
        };
        group.bench_with_input(BenchmarkId::new("cold", radius), &request, |b, request| {
            b.iter_batched(
                shaders,
                |shaders| {
                    let built = shaders.gaussian_blur(request);
                    shaders.release(built.compiled.handles());
                },
                criterion::BatchSize::SmallInput,
            )
        });
        let warm = shaders();
        let primed = warm.gaussian_blur(&request);
        warm.release(primed.compiled.handles());
        group.bench_with_input(BenchmarkId::new("cached", radius), &request, |b, request| {
            b.iter(|| {
                let built = warm.gaussian_blur(request);
                warm.release(built.compiled.handles());
            })
        });
    }
    group.finish();
}

fn blend_shaders(c: &mut Criterion) {
    c.bench_function("blend_shaders_all_modes", |b| {
        b.iter(|| {
            for mode in BlendMode::ALL {
                black_box(generate(mode));
            }
        })
    });
}

fn blur_radius_animation(c: &mut Criterion) {
    let mut blur = GaussianBlurEffect::new(shaders());
    blur.set_source(SourceItem::image(
        ItemId(1),
        FillMode::Stretch,
        Size::new(1280.0, 720.0),
    ));
    blur.set_size(Size::new(1280.0, 720.0));
    let mut radius = 0.0;
    c.bench_function("blur_radius_animation", |b| {
        b.iter(|| {
            radius = (radius + 0.5) % 64.0;
            blur.set_radius(radius);
            blur.set_samples((radius * 2.0).round() as i32);
            blur.update()
        })
    });
}

criterion_group!(
    benches,
    sample_plans,
    blur_shaders,
    blend_shaders,
    blur_radius_animation
);
criterion_main!(benches);
