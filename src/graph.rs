//! Render-graph description produced by the effects.
//!
//! Effects do not draw. They describe their passes as [`RenderNode`]s. The host walks
//! the nodes in order: `offscreen` nodes are rendered into textures that later nodes
//! sample through [`TextureSource::Node`], and `visible` nodes are composited into the
//! parent target. A node that is neither is skipped.

use crate::color::Color;
use crate::geometry::Rect;
use crate::id::{CaptureId, ItemId, NodeId, ShaderHandle};
use smallvec::SmallVec;

/// Where a sampler reads its texture from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSource {
    /// The host item's own texture (or its enabled layer).
    Item(ItemId),
    /// An offscreen copy of an item, see [`CaptureBuffer`].
    Capture(CaptureId),
    /// The output of another render node.
    Node(NodeId),
    /// The shared acrylic noise texture.
    Noise,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerBinding {
    pub binding: u32,
    pub name: &'static str,
    pub source: TextureSource,
}

/// An offscreen capture of a host item, allocated when the item can't be sampled directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureBuffer {
    pub id: CaptureId,
    pub item: ItemId,
    /// Area of the item to capture; empty captures the whole item.
    pub source_rect: Rect,
    pub smooth: bool,
}

/// One draw of a generated shader pair over the node's rectangle.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderPass {
    pub vertex: Option<ShaderHandle>,
    pub fragment: Option<ShaderHandle>,
    pub samplers: SmallVec<[SamplerBinding; 2]>,
    /// Contents of the `std140` block at binding 0.
    pub uniforms: Vec<u8>,
    pub blending: bool,
}

impl ShaderPass {
    /// A pass without compiled programs draws nothing.
    pub fn is_drawable(&self) -> bool {
        self.vertex.is_some() && self.fragment.is_some()
    }

    pub fn sampler(&self, name: &str) -> Option<&SamplerBinding> {
        self.samplers.iter().find(|s| s.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Capture(CaptureBuffer),
    Shader(ShaderPass),
    /// Keeps the last output of `source` in a texture and redraws it without re-running
    /// the source passes.
    Cache { source: NodeId, hide_source: bool },
    Rect { color: Color },
    TiledImage {
        texture: TextureSource,
        opacity: f32,
        tile_size: u32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderNode {
    pub id: NodeId,
    pub label: &'static str,
    pub kind: NodeKind,
    pub rect: Rect,
    /// Composited into the parent target.
    pub visible: bool,
    /// Rendered into a texture other nodes can sample.
    pub offscreen: bool,
}

impl RenderNode {
    pub(crate) fn new(label: &'static str, kind: NodeKind) -> Self {
        Self::with_id(NodeId::next(), label, kind)
    }

    pub(crate) fn with_id(id: NodeId, label: &'static str, kind: NodeKind) -> Self {
        Self {
            id,
            label,
            kind,
            rect: Rect::default(),
            visible: true,
            offscreen: false,
        }
    }

    pub fn shader_pass(&self) -> Option<&ShaderPass> {
        match &self.kind {
            NodeKind::Shader(pass) => Some(pass),
            _ => None,
        }
    }

    pub(crate) fn shader_pass_mut(&mut self) -> Option<&mut ShaderPass> {
        match &mut self.kind {
            NodeKind::Shader(pass) => Some(pass),
            _ => None,
        }
    }
}

/// An ordered list of render nodes. Nodes only sample nodes that precede them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderGraph {
    nodes: Vec<RenderNode>,
}

impl RenderGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: RenderNode) {
        self.nodes.push(node);
    }

    pub fn extend(&mut self, other: RenderGraph) {
        self.nodes.extend(other.nodes);
    }

    pub fn get(&self, id: NodeId) -> Option<&RenderNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn find(&self, label: &str) -> Option<&RenderNode> {
        self.nodes.iter().find(|node| node.label == label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RenderNode> {
        self.nodes.iter()
    }

    /// Nodes composited into the parent target.
    pub fn visible_nodes(&self) -> impl Iterator<Item = &RenderNode> {
        self.nodes.iter().filter(|node| node.visible)
    }

    /// Turns a node into an intermediate: rendered offscreen, not composited.
    pub fn hide(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.iter_mut().find(|node| node.id == id) {
            node.visible = false;
            node.offscreen = true;
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodes_keep_insertion_order_and_unique_ids() {
        let mut graph = RenderGraph::new();
        let first = RenderNode::new("first", NodeKind::Rect { color: Color::BLACK });
        let mut second = RenderNode::new("second", NodeKind::Rect { color: Color::WHITE });
        second.visible = false;
        let (first_id, second_id) = (first.id, second.id);
        graph.push(first);
        graph.push(second);

        assert_ne!(first_id, second_id);
        assert_eq!(graph.get(second_id).map(|n| n.label), Some("second"));
        assert_eq!(
            graph.iter().map(|n| n.label).collect::<Vec<_>>(),
            ["first", "second"]
        );
        assert_eq!(graph.visible_nodes().count(), 1);
        assert_eq!(graph.find("first").map(|n| n.id), Some(first_id));

        graph.hide(first_id);
        let first = graph.get(first_id).unwrap();
        assert!(!first.visible && first.offscreen);
        assert_eq!(graph.visible_nodes().count(), 0);
    }
}
