use super::color_math::{effective_luminosity_color, effective_tint_color};
use super::noise::NOISE_TEXTURE_SIZE;
use super::theme::{Theme, ThemeService, ThemeSubscription};
use crate::blend::{BlendEffect, BlendMode, EffectInput};
use crate::blur::GaussianBlurEffect;
use crate::color::Color;
use crate::context::EffectContext;
use crate::geometry::{Rect, Size};
use crate::graph::{NodeKind, RenderGraph, RenderNode, TextureSource};
use crate::id::NodeId;
use crate::notify::ChangeLog;
use crate::proxy::SourceItem;
use crate::util::fuzzy_eq;
use std::sync::Arc;

const DEFAULT_TINT_COLOR: Color = Color([1.0, 1.0, 1.0, 204.0 / 255.0]);
const DEFAULT_TINT_OPACITY: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcrylicProperty {
    Source,
    Theme,
    TintColor,
    TintOpacity,
    LuminosityOpacity,
    NoiseOpacity,
    FallbackColor,
    WindowActive,
    Size,
}

/// Fluent-style acrylic: a heavily blurred backdrop, re-lit by a luminosity layer, tinted,
/// and sprinkled with grain.
///
/// The graph is fixed:
///
/// ```text
/// source ─ blur ─ Lightness blend (luminosity color) ─ Color blend (tint color) ─ noise
/// ```
///
/// While the window is inactive the stack is replaced by a flat fallback color.
pub struct AcrylicMaterialEffect {
    themes: Arc<ThemeService>,
    subscription: ThemeSubscription,
    theme: Option<Theme>,
    use_system_theme: bool,
    tint_color: Color,
    tint_opacity: f64,
    luminosity_opacity: Option<f64>,
    noise_opacity: f64,
    fallback_color: Color,
    window_active: bool,
    size: Size,
    blur: GaussianBlurEffect,
    luminosity_color: RenderNode,
    luminosity_blend: BlendEffect,
    tint_color_layer: RenderNode,
    tint_blend: BlendEffect,
    noise: RenderNode,
    fallback: RenderNode,
    changes: ChangeLog<AcrylicProperty>,
}

impl AcrylicMaterialEffect {
    pub fn new(context: &EffectContext) -> Self {
        let config = context.acrylic();
        let mut blur = GaussianBlurEffect::new(context.shaders().clone());
        blur.set_radius(config.blur_radius);
        // Twice the radius gives the optimized kernel enough texels.
        blur.set_samples((config.blur_radius * 2.0).round() as i32);
        blur.update();
        blur.take_changes();

        let mut luminosity_color = RenderNode::new(
            "acrylic-luminosity-color",
            NodeKind::Rect {
                color: Color::TRANSPARENT,
            },
        );
        luminosity_color.visible = false;
        luminosity_color.offscreen = true;

        let mut luminosity_blend = BlendEffect::new(context.shaders().clone());
        luminosity_blend.set_mode(BlendMode::Lightness);

        let mut tint_color_layer = RenderNode::new(
            "acrylic-tint-color",
            NodeKind::Rect {
                color: Color::TRANSPARENT,
            },
        );
        tint_color_layer.visible = false;
        tint_color_layer.offscreen = true;

        let mut tint_blend = BlendEffect::new(context.shaders().clone());
        tint_blend.set_mode(BlendMode::Color);

        let noise = RenderNode::new(
            "acrylic-noise",
            NodeKind::TiledImage {
                texture: TextureSource::Noise,
                opacity: config.noise_opacity as f32,
                tile_size: NOISE_TEXTURE_SIZE,
            },
        );
        let fallback = RenderNode::new(
            "acrylic-fallback",
            NodeKind::Rect {
                color: Color::BLACK,
            },
        );

        let themes = Arc::clone(context.themes());
        let subscription = themes.subscribe();
        let mut material = Self {
            themes,
            subscription,
            theme: None,
            use_system_theme: false,
            tint_color: DEFAULT_TINT_COLOR,
            tint_opacity: DEFAULT_TINT_OPACITY,
            luminosity_opacity: None,
            noise_opacity: config.noise_opacity,
            fallback_color: Color::BLACK,
            window_active: false,
            size: Size::default(),
            blur,
            luminosity_color,
            luminosity_blend,
            tint_color_layer,
            tint_blend,
            noise,
            fallback,
            changes: ChangeLog::new(),
        };
        material.wire();
        material.update_appearance();
        material
    }

    pub fn source(&self) -> Option<&SourceItem> {
        self.blur.source()
    }

    /// The item behind the material, usually the window background or wallpaper.
    pub fn set_source(&mut self, item: SourceItem) {
        let replaced = self.blur.source().map(|s| s.id) != Some(item.id);
        self.blur.set_source(item);
        if replaced {
            self.changes.mark(AcrylicProperty::Source);
        }
    }

    /// `None` until a theme is assigned. A material following the OS reports `System`.
    pub fn theme(&self) -> Option<Theme> {
        if self.use_system_theme {
            Some(Theme::System)
        } else {
            self.theme
        }
    }

    /// Overwrites tint, opacities and fallback color with the theme's preset.
    ///
    /// `System` applies the preset of the OS preference and keeps following it.
    pub fn set_theme(&mut self, theme: Theme) {
        let before = self.theme();
        self.use_system_theme = theme == Theme::System;
        self.apply_theme(self.themes.resolve(theme));
        if self.theme() != before {
            self.changes.mark(AcrylicProperty::Theme);
        }
    }

    pub fn tint_color(&self) -> Color {
        self.tint_color
    }

    /// Invalid colors are ignored.
    pub fn set_tint_color(&mut self, color: Color) {
        if !color.is_valid() || self.tint_color == color {
            return;
        }
        self.tint_color = color;
        self.changes.mark(AcrylicProperty::TintColor);
        self.update_appearance();
    }

    pub fn tint_opacity(&self) -> f64 {
        self.tint_opacity
    }

    pub fn set_tint_opacity(&mut self, opacity: f64) {
        let Some(opacity) = unit_interval(opacity) else {
            return;
        };
        if fuzzy_eq(self.tint_opacity, opacity) {
            return;
        }
        self.tint_opacity = opacity;
        self.changes.mark(AcrylicProperty::TintOpacity);
        self.update_appearance();
    }

    pub fn luminosity_opacity(&self) -> Option<f64> {
        self.luminosity_opacity
    }

    /// An explicit luminosity layer opacity. `None` derives it from the tint.
    pub fn set_luminosity_opacity(&mut self, opacity: Option<f64>) {
        let opacity = match opacity {
            Some(value) => match unit_interval(value) {
                Some(value) => Some(value),
                None => return,
            },
            None => None,
        };
        let unchanged = match (self.luminosity_opacity, opacity) {
            (Some(a), Some(b)) => fuzzy_eq(a, b),
            (a, b) => a.is_none() && b.is_none(),
        };
        if unchanged {
            return;
        }
        self.luminosity_opacity = opacity;
        self.changes.mark(AcrylicProperty::LuminosityOpacity);
        self.update_appearance();
    }

    pub fn noise_opacity(&self) -> f64 {
        self.noise_opacity
    }

    pub fn set_noise_opacity(&mut self, opacity: f64) {
        let Some(opacity) = unit_interval(opacity) else {
            return;
        };
        if fuzzy_eq(self.noise_opacity, opacity) {
            return;
        }
        self.noise_opacity = opacity;
        self.changes.mark(AcrylicProperty::NoiseOpacity);
        self.update_appearance();
    }

    pub fn fallback_color(&self) -> Color {
        self.fallback_color
    }

    pub fn set_fallback_color(&mut self, color: Color) {
        if !color.is_valid() || self.fallback_color == color {
            return;
        }
        self.fallback_color = color;
        self.changes.mark(AcrylicProperty::FallbackColor);
        self.update_appearance();
    }

    pub fn is_window_active(&self) -> bool {
        self.window_active
    }

    /// Inactive windows show the flat fallback color instead of the acrylic stack.
    pub fn set_window_active(&mut self, active: bool) {
        if self.window_active == active {
            return;
        }
        self.window_active = active;
        self.changes.mark(AcrylicProperty::WindowActive);
        self.update_appearance();
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
        self.blur.set_size(size);
        self.luminosity_blend.set_size(size);
        self.tint_blend.set_size(size);
        let rect = Rect::from_size(size);
        for node in [
            &mut self.luminosity_color,
            &mut self.tint_color_layer,
            &mut self.noise,
            &mut self.fallback,
        ] {
            node.rect = rect;
        }
        self.changes.mark(AcrylicProperty::Size);
    }

    pub fn set_device_pixel_ratio(&mut self, device_pixel_ratio: f64) {
        self.blur.set_device_pixel_ratio(device_pixel_ratio);
    }

    /// Color of the luminosity layer currently in effect.
    pub fn effective_luminosity_color(&self) -> Color {
        effective_luminosity_color(self.tint_color, self.tint_opacity, self.luminosity_opacity)
    }

    /// Color of the tint layer currently in effect.
    pub fn effective_tint_color(&self) -> Color {
        effective_tint_color(self.tint_color, self.tint_opacity, self.luminosity_opacity)
    }

    /// Picks up OS theme changes and rebuilds the inner effects that need it. Returns
    /// `true` if anything changed.
    pub fn update(&mut self) -> bool {
        let mut changed = false;
        if self.subscription.take_pending() && self.use_system_theme {
            tracing::debug!("re-resolving system theme for acrylic material");
            self.apply_theme(self.themes.resolve(Theme::System));
            changed = true;
        }
        let blur_rebuilt = self.blur.update();
        if blur_rebuilt {
            // The blur's output node is stable; only a cache toggle would move it.
            self.wire();
        }
        changed |= blur_rebuilt;
        changed |= self.luminosity_blend.update();
        changed |= self.tint_blend.update();
        changed
    }

    pub fn blur(&self) -> &GaussianBlurEffect {
        &self.blur
    }

    pub fn luminosity_blend(&self) -> &BlendEffect {
        &self.luminosity_blend
    }

    pub fn tint_blend(&self) -> &BlendEffect {
        &self.tint_blend
    }

    pub fn noise_node(&self) -> &RenderNode {
        &self.noise
    }

    pub fn fallback_node(&self) -> &RenderNode {
        &self.fallback
    }

    /// Every node of the material, intermediate stages hidden and rendered offscreen.
    pub fn render_graph(&self) -> RenderGraph {
        let hide = |mut graph: RenderGraph, output: NodeId| {
            graph.hide(output);
            graph
        };

        let mut graph = RenderGraph::new();
        graph.extend(hide(self.blur.render_graph(), self.blur.output_node()));
        graph.push(self.luminosity_color.clone());
        graph.extend(hide(
            self.luminosity_blend.render_graph(),
            self.luminosity_blend.output_node(),
        ));
        graph.push(self.tint_color_layer.clone());
        graph.extend(self.tint_blend.render_graph());
        graph.push(self.noise.clone());
        graph.push(self.fallback.clone());
        graph
    }

    pub fn take_changes(&mut self) -> Vec<AcrylicProperty> {
        self.changes.take()
    }

    fn apply_theme(&mut self, theme: Theme) {
        let Some(preset) = theme.preset() else {
            return;
        };
        self.theme = Some(theme);
        let mut changed = false;
        if self.tint_color != preset.tint_color {
            self.tint_color = preset.tint_color;
            self.changes.mark(AcrylicProperty::TintColor);
            changed = true;
        }
        if !fuzzy_eq(self.tint_opacity, preset.tint_opacity) {
            self.tint_opacity = preset.tint_opacity;
            self.changes.mark(AcrylicProperty::TintOpacity);
            changed = true;
        }
        if !self
            .luminosity_opacity
            .is_some_and(|opacity| fuzzy_eq(opacity, preset.luminosity_opacity))
        {
            self.luminosity_opacity = Some(preset.luminosity_opacity);
            self.changes.mark(AcrylicProperty::LuminosityOpacity);
            changed = true;
        }
        if self.fallback_color != preset.fallback_color {
            self.fallback_color = preset.fallback_color;
            self.changes.mark(AcrylicProperty::FallbackColor);
            changed = true;
        }
        if changed {
            self.update_appearance();
        }
    }

    fn wire(&mut self) {
        self.luminosity_blend
            .set_background(EffectInput::Node(self.blur.output_node()));
        self.luminosity_blend
            .set_foreground(EffectInput::Node(self.luminosity_color.id));
        self.tint_blend
            .set_background(EffectInput::Node(self.luminosity_blend.output_node()));
        self.tint_blend
            .set_foreground(EffectInput::Node(self.tint_color_layer.id));
        self.luminosity_blend.take_changes();
        self.tint_blend.take_changes();
    }

    fn update_appearance(&mut self) {
        self.luminosity_color.kind = NodeKind::Rect {
            color: self.effective_luminosity_color(),
        };
        self.tint_color_layer.kind = NodeKind::Rect {
            color: self.effective_tint_color(),
        };
        if let NodeKind::TiledImage { opacity, .. } = &mut self.noise.kind {
            *opacity = self.noise_opacity as f32;
        }
        self.fallback.kind = NodeKind::Rect {
            color: self.fallback_color,
        };

        let active = self.window_active;
        self.tint_blend.set_visible(active);
        self.noise.visible = active;
        self.fallback.visible = !active;
    }
}

/// Accepts finite values and clamps them into `[0, 1]`.
fn unit_interval(value: f64) -> Option<f64> {
    value.is_finite().then(|| value.clamp(0.0, 1.0))
}
