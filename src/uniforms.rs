//! `std140` uniform blocks shared by the generated shaders.
//!
//! The structs match the `buf` block at binding 0 byte for byte, so hosts can upload
//! them with `bytemuck::bytes_of`.

use bytemuck::{Pod, Zeroable};

const IDENTITY: [[f32; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Uniforms of a blur pass.
///
/// Only alpha-only shaders declare `color` and `thickness`; the others use the prefix
/// returned by [`BlurUniforms::as_bytes`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BlurUniforms {
    pub matrix: [[f32; 4]; 4],
    pub opacity: f32,
    pub spread: f32,
    pub dirstep: [f32; 2],
    pub color: [f32; 4],
    pub thickness: f32,
    pub _padding: [f32; 3],
}

/// Size of the block declared by color blur shaders.
const BLUR_COLOR_SIZE: usize = 80;

impl Default for BlurUniforms {
    fn default() -> Self {
        Self {
            matrix: IDENTITY,
            opacity: 1.0,
            spread: 1.0,
            dirstep: [0.0; 2],
            color: [0.0, 0.0, 0.0, 1.0],
            thickness: 0.0,
            _padding: [0.0; 3],
        }
    }
}

impl BlurUniforms {
    pub fn as_bytes(&self, alpha_only: bool) -> &[u8] {
        let bytes = bytemuck::bytes_of(self);
        if alpha_only {
            bytes
        } else {
            &bytes[..BLUR_COLOR_SIZE]
        }
    }
}

/// Uniforms of a blend pass and the pass-through vertex shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BlendUniforms {
    pub matrix: [[f32; 4]; 4],
    pub opacity: f32,
    pub _padding: [f32; 3],
}

impl Default for BlendUniforms {
    fn default() -> Self {
        Self {
            matrix: IDENTITY,
            opacity: 1.0,
            _padding: [0.0; 3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_follow_std140() {
        assert_eq!(std::mem::size_of::<BlurUniforms>(), 112);
        assert_eq!(std::mem::offset_of!(BlurUniforms, spread), 68);
        assert_eq!(std::mem::offset_of!(BlurUniforms, dirstep), 72);
        assert_eq!(std::mem::offset_of!(BlurUniforms, color), 80);
        assert_eq!(std::mem::offset_of!(BlurUniforms, thickness), 96);
        assert_eq!(std::mem::size_of::<BlendUniforms>(), 80);
    }

    #[test]
    fn color_blocks_stop_after_dirstep() {
        let uniforms = BlurUniforms::default();
        assert_eq!(uniforms.as_bytes(false).len(), 80);
        assert_eq!(uniforms.as_bytes(true).len(), 112);
    }
}
