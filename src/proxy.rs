//! Decides whether an effect can sample its input item directly or needs an offscreen
//! capture of it first.
//!
//! Shaders sample their inputs as textures. An item can be sampled in place when it
//! already is a texture with the right filtering and extent (a stretched image, a
//! capture source, an item with an enabled layer). Anything else, such as an item with
//! children or an image drawn with a tiling fill mode, is first captured into an
//! offscreen buffer that mirrors the item.

use crate::geometry::{Rect, Size};
use crate::graph::{CaptureBuffer, NodeKind, RenderNode, TextureSource};
use crate::id::{CaptureId, ItemId, NodeId};
use crate::notify::ChangeLog;

/// Filtering an effect requires from its input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Interpolation {
    /// Whatever the input uses.
    #[default]
    Any,
    Nearest,
    Linear,
}

/// How an image item maps its picture onto its bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FillMode {
    #[default]
    Stretch,
    PreserveAspectFit,
    PreserveAspectCrop,
    Tile,
    TileVertically,
    TileHorizontally,
    Pad,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemKind {
    Image {
        fill_mode: FillMode,
        /// Size the picture was decoded at. Null until the image is loaded.
        source_size: Size,
    },
    /// An item that already renders another item into a texture.
    CaptureSource {
        source_rect: Rect,
        /// The captured item, when it has an enabled layer of its own.
        source_item_layer: Option<ItemId>,
    },
    Generic {
        texture_provider: bool,
    },
}

/// Snapshot of the host item properties the proxy decision depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceItem {
    pub id: ItemId,
    pub has_children: bool,
    pub smooth: bool,
    pub layer_enabled: bool,
    pub kind: ItemKind,
}

impl SourceItem {
    pub fn generic(id: ItemId) -> Self {
        Self {
            id,
            has_children: false,
            smooth: true,
            layer_enabled: false,
            kind: ItemKind::Generic {
                texture_provider: false,
            },
        }
    }

    pub fn image(id: ItemId, fill_mode: FillMode, source_size: Size) -> Self {
        Self {
            kind: ItemKind::Image {
                fill_mode,
                source_size,
            },
            ..Self::generic(id)
        }
    }
}

/// What the effect samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceOutput {
    Direct(ItemId),
    Capture(CaptureBuffer),
}

impl SourceOutput {
    pub fn texture(&self) -> TextureSource {
        match self {
            SourceOutput::Direct(item) => TextureSource::Item(*item),
            SourceOutput::Capture(buffer) => TextureSource::Capture(buffer.id),
        }
    }
}

/// Layer settings the host must apply to `item` when the proxy samples its layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerConfig {
    pub item: ItemId,
    pub source_rect: Rect,
    pub smooth: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyProperty {
    Input,
    Output,
    Active,
    SourceRect,
    Interpolation,
}

#[derive(Debug, Default)]
pub struct SourceProxy {
    input: Option<SourceItem>,
    source_rect: Rect,
    interpolation: Interpolation,
    output: Option<SourceOutput>,
    capture: Option<(NodeId, CaptureBuffer)>,
    layer: Option<LayerConfig>,
    dirty: bool,
    changes: ChangeLog<ProxyProperty>,
}

impl SourceProxy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(&self) -> Option<&SourceItem> {
        self.input.as_ref()
    }

    /// Replaces the input item. Passing the current item with new properties behaves
    /// like [`SourceProxy::notify_input_changed`].
    pub fn set_input(&mut self, input: Option<SourceItem>) {
        match (&self.input, input) {
            (Some(current), Some(item)) if current.id == item.id => {
                self.notify_input_changed(item);
            }
            (None, None) => {}
            (_, input) => {
                self.input = input;
                self.dirty = true;
                self.changes.mark(ProxyProperty::Input);
            }
        }
    }

    /// Updates the tracked properties of the current input (children, fill mode, source
    /// size, smoothness, layer). Ignored for any other item.
    pub fn notify_input_changed(&mut self, item: SourceItem) {
        if let Some(current) = self.input.as_mut() {
            if current.id == item.id && *current != item {
                *current = item;
                self.dirty = true;
            }
        }
    }

    pub fn source_rect(&self) -> Rect {
        self.source_rect
    }

    pub fn set_source_rect(&mut self, source_rect: Rect) {
        if !source_rect.is_finite() || source_rect.fuzzy_eq(&self.source_rect) {
            return;
        }
        self.source_rect = source_rect;
        self.dirty = true;
        self.changes.mark(ProxyProperty::SourceRect);
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    pub fn set_interpolation(&mut self, interpolation: Interpolation) {
        if self.interpolation == interpolation {
            return;
        }
        self.interpolation = interpolation;
        self.dirty = true;
        self.changes.mark(ProxyProperty::Interpolation);
    }

    /// Sets every input of the decision at once and resolves it.
    pub fn bind(
        &mut self,
        input: Option<SourceItem>,
        source_rect: Rect,
        interpolation: Interpolation,
    ) -> Option<SourceOutput> {
        self.set_input(input);
        self.set_source_rect(source_rect);
        self.set_interpolation(interpolation);
        self.update();
        self.output
    }

    /// Re-evaluates the decision if anything changed since the last call. Returns `true`
    /// when the sampled texture changed.
    pub fn update(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.dirty = false;
        let before = self.output.map(|output| output.texture());
        self.resolve();
        self.output.map(|output| output.texture()) != before
    }

    pub fn output(&self) -> Option<&SourceOutput> {
        self.output.as_ref()
    }

    pub fn output_texture(&self) -> Option<TextureSource> {
        self.output.map(|output| output.texture())
    }

    /// `true` while there is something to sample.
    pub fn is_active(&self) -> bool {
        self.output.is_some()
    }

    pub fn layer_config(&self) -> Option<&LayerConfig> {
        self.layer.as_ref()
    }

    /// The render node filling the capture buffer, while one is in use.
    pub fn capture_node(&self) -> Option<RenderNode> {
        self.capture.map(|(id, buffer)| {
            let mut node = RenderNode::with_id(id, "capture", NodeKind::Capture(buffer));
            node.offscreen = true;
            node
        })
    }

    pub fn take_changes(&mut self) -> Vec<ProxyProperty> {
        self.changes.take()
    }

    fn resolve(&mut self) {
        let Some(input) = self.input else {
            self.layer = None;
            self.capture = None;
            self.set_output(None);
            return;
        };

        let interpolation_ok = match self.interpolation {
            Interpolation::Any => true,
            Interpolation::Linear => input.smooth,
            Interpolation::Nearest => !input.smooth,
        };
        let layered = if input.layer_enabled {
            Some(input.id)
        } else if let ItemKind::CaptureSource {
            source_item_layer, ..
        } = input.kind
        {
            source_item_layer
        } else {
            None
        };
        let padded = self.source_rect.is_padded();

        let direct = if let Some(item) = layered {
            self.layer = Some(LayerConfig {
                item,
                source_rect: self.source_rect,
                smooth: self.interpolation != Interpolation::Nearest,
            });
            true
        } else {
            self.layer = None;
            !input.has_children
                && interpolation_ok
                && match input.kind {
                    ItemKind::CaptureSource { source_rect, .. } => {
                        source_rect.fuzzy_eq(&self.source_rect) || self.source_rect.is_empty()
                    }
                    ItemKind::Image {
                        fill_mode,
                        source_size,
                    } => !padded && fill_mode == FillMode::Stretch && !source_size.is_null(),
                    ItemKind::Generic { texture_provider } => !padded && texture_provider,
                }
        };

        if direct {
            if self.capture.take().is_some() {
                tracing::debug!("released capture buffer for {}", input.id);
            }
            self.set_output(Some(SourceOutput::Direct(input.id)));
        } else {
            let buffer = self.capture_input(&input);
            self.set_output(Some(SourceOutput::Capture(buffer)));
        }
    }

    fn capture_input(&mut self, input: &SourceItem) -> CaptureBuffer {
        let buffer = CaptureBuffer {
            id: self
                .capture
                .map(|(_, buffer)| buffer.id)
                .unwrap_or_else(CaptureId::next),
            item: input.id,
            source_rect: self.source_rect,
            smooth: self.interpolation != Interpolation::Nearest,
        };
        let node = match self.capture {
            Some((node, _)) => node,
            None => {
                tracing::debug!("allocated {} for {}", buffer.id, input.id);
                NodeId::next()
            }
        };
        self.capture = Some((node, buffer));
        buffer
    }

    fn set_output(&mut self, output: Option<SourceOutput>) {
        let was_active = self.output.is_some();
        let changed = self.output.map(|o| o.texture()) != output.map(|o| o.texture());
        self.output = output;
        if changed {
            self.changes.mark(ProxyProperty::Output);
        }
        if was_active != output.is_some() {
            self.changes.mark(ProxyProperty::Active);
        }
    }
}
