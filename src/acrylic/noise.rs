use image::{Rgba, RgbaImage};
use std::sync::OnceLock;

pub const NOISE_TEXTURE_SIZE: u32 = 256;

static NOISE_TEXTURE: OnceLock<RgbaImage> = OnceLock::new();

/// The grain texture tiled over the acrylic material. Generated on first use, identical
/// on every run.
pub fn noise_texture() -> &'static RgbaImage {
    NOISE_TEXTURE.get_or_init(generate)
}

fn hash(x: u32, y: u32) -> u32 {
    // Squirrel-style integer hash; every pixel is independent, so the texture tiles.
    let mut h = x.wrapping_mul(0x27d4_eb2d) ^ y.wrapping_mul(0x1656_67b1);
    h ^= h >> 15;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^ (h >> 16)
}

fn generate() -> RgbaImage {
    RgbaImage::from_fn(NOISE_TEXTURE_SIZE, NOISE_TEXTURE_SIZE, |x, y| {
        let value = (hash(x, y) & 0xff) as u8;
        Rgba([value, value, value, 0xff])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_is_deterministic_and_gray() {
        let texture = noise_texture();
        assert_eq!(texture.dimensions(), (256, 256));
        assert_eq!(texture, &generate());
        assert!(texture.pixels().all(|p| p[0] == p[1] && p[1] == p[2] && p[3] == 0xff));
    }

    #[test]
    fn texture_is_not_flat() {
        let texture = noise_texture();
        let mean = texture.pixels().map(|p| f64::from(p[0])).sum::<f64>() / 65536.0;
        assert!((100.0..156.0).contains(&mean), "mean {mean}");
    }
}
