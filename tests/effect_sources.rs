use acrylic_fx::geometry::Size;
use acrylic_fx::graph::{NodeKind, RenderGraph, TextureSource};
use acrylic_fx::shader::MemoryCompiler;
use acrylic_fx::{
    BlendEffect, BlendMode, EffectInput, FillMode, GaussianBlurEffect, GraphicsApi, ItemId,
    ShaderBaker, ShaderBuilder, SourceItem,
};

fn shaders() -> ShaderBuilder {
    let baker = ShaderBaker::new(GraphicsApi::OpenGl, MemoryCompiler::new()).into_shared();
    ShaderBuilder::new(baker)
}

fn photo(id: u64) -> SourceItem {
    SourceItem::image(ItemId(id), FillMode::Stretch, Size::new(640.0, 480.0))
}

fn captures(graph: &RenderGraph) -> Vec<ItemId> {
    graph
        .iter()
        .filter_map(|node| match &node.kind {
            NodeKind::Capture(buffer) => Some(buffer.item),
            _ => None,
        })
        .collect()
}

fn blur_source(blur: &GaussianBlurEffect) -> Option<TextureSource> {
    let pass = blur.horizontal_pass().shader_pass()?;
    pass.sampler("source").map(|binding| binding.source)
}

#[test]
fn blur_samples_a_stretched_photo_in_place() {
    let mut blur = GaussianBlurEffect::new(shaders());
    blur.set_source(photo(1));
    blur.set_radius(16.0);
    blur.update();

    assert_eq!(blur_source(&blur), Some(TextureSource::Item(ItemId(1))));
    assert!(captures(&blur.render_graph()).is_empty());
}

#[test]
fn blur_captures_a_container_and_releases_it_again() {
    let mut blur = GaussianBlurEffect::new(shaders());
    let mut container = photo(2);
    container.has_children = true;
    blur.set_source(container);
    blur.update();

    let graph = blur.render_graph();
    assert_eq!(captures(&graph), [ItemId(2)]);
    let capture = graph.iter().next().unwrap();
    assert!(capture.offscreen);
    assert!(matches!(blur_source(&blur), Some(TextureSource::Capture(_))));

    container.has_children = false;
    blur.notify_source_changed(container);
    assert!(blur.update());
    assert_eq!(blur_source(&blur), Some(TextureSource::Item(ItemId(2))));
    assert!(captures(&blur.render_graph()).is_empty());
}

#[test]
fn blur_needs_a_smooth_source() {
    let mut blur = GaussianBlurEffect::new(shaders());
    let mut pixel_art = photo(3);
    pixel_art.smooth = false;
    blur.set_source(pixel_art);
    blur.update();
    assert_eq!(captures(&blur.render_graph()), [ItemId(3)]);
}

#[test]
fn blend_inputs_resolve_independently() {
    let mut blend = BlendEffect::new(shaders());
    let mut tiled = photo(5);
    tiled.kind = acrylic_fx::ItemKind::Image {
        fill_mode: FillMode::Tile,
        source_size: Size::new(32.0, 32.0),
    };
    blend.set_background(EffectInput::Item(photo(4)));
    blend.set_foreground(EffectInput::Item(tiled));
    blend.set_mode(BlendMode::Multiply);
    blend.update();

    let graph = blend.render_graph();
    assert_eq!(captures(&graph), [ItemId(5)]);
    let pass = blend.pass().shader_pass().unwrap();
    assert_eq!(
        pass.sampler("source").map(|binding| binding.source),
        Some(TextureSource::Item(ItemId(4)))
    );
    assert!(matches!(
        pass.sampler("foregroundSource").map(|binding| binding.source),
        Some(TextureSource::Capture(_))
    ));
}

#[test]
fn blur_output_feeds_a_blend() {
    let mut blur = GaussianBlurEffect::new(shaders());
    blur.set_source(photo(6));
    blur.update();

    let mut blend = BlendEffect::new(shaders());
    blend.set_background(EffectInput::Item(photo(7)));
    blend.set_foreground(EffectInput::Node(blur.output_node()));
    blend.update();

    let pass = blend.pass().shader_pass().unwrap();
    assert_eq!(
        pass.sampler("foregroundSource").map(|binding| binding.source),
        Some(TextureSource::Node(blur.vertical_pass().id))
    );
    assert!(captures(&blend.render_graph()).is_empty());
}
