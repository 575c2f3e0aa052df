use std::fmt;
use std::str::FromStr;

/// Shared head of every blend fragment shader: bindings, color-space helpers and the
/// un-premultiplied inputs `rgb1` (background) and `rgb2` (foreground).
const FRAGMENT_SHADER_BEGIN: &str = r#"#version 440

layout(location = 0) in vec2 qt_TexCoord0;
layout(location = 0) out vec4 fragColor;

layout(std140, binding = 0) uniform buf {
    mat4 qt_Matrix;
    float qt_Opacity;
};
layout(binding = 1) uniform sampler2D source;
layout(binding = 2) uniform sampler2D foregroundSource;

float RGBtoL(vec3 color) {
    float cmin = min(color.r, min(color.g, color.b));
    float cmax = max(color.r, max(color.g, color.b));
    float l = (cmin + cmax) / 2.0;
    return l;
}

vec3 RGBtoHSL(vec3 color) {
    float cmin = min(color.r, min(color.g, color.b));
    float cmax = max(color.r, max(color.g, color.b));
    float h = 0.0;
    float s = 0.0;
    float l = (cmin + cmax) / 2.0;
    float diff = cmax - cmin;

    if (diff > 1.0 / 256.0) {
        if (l < 0.5)
            s = diff / (cmin + cmax);
        else
            s = diff / (2.0 - (cmin + cmax));

        if (color.r == cmax)
            h = (color.g - color.b) / diff;
        else if (color.g == cmax)
            h = 2.0 + (color.b - color.r) / diff;
        else
            h = 4.0 + (color.r - color.g) / diff;

        h /= 6.0;
    }
    return vec3(h, s, l);
}

float hueToIntensity(float v1, float v2, float h) {
    h = fract(h);
    if (h < 1.0 / 6.0)
        return v1 + (v2 - v1) * 6.0 * h;
    else if (h < 1.0 / 2.0)
        return v2;
    else if (h < 2.0 / 3.0)
        return v1 + (v2 - v1) * 6.0 * (2.0 / 3.0 - h);

    return v1;
}

vec3 HSLtoRGB(vec3 color) {
    float h = color.x;
    float l = color.z;
    float s = color.y;

    if (s < 1.0 / 256.0)
        return vec3(l, l, l);

    float v1;
    float v2;
    if (l < 0.5)
        v2 = l * (1.0 + s);
    else
        v2 = (l + s) - (s * l);

    v1 = 2.0 * l - v2;

    float d = 1.0 / 3.0;
    float r = hueToIntensity(v1, v2, h + d);
    float g = hueToIntensity(v1, v2, h);
    float b = hueToIntensity(v1, v2, h - d);
    return vec3(r, g, b);
}

float channelBlendHardLight(float c1, float c2) {
    return c2 > 0.5 ? (1.0 - (1.0 - 2.0 * (c2 - 0.5)) * (1.0 - c1)) : (2.0 * c1 * c2);
}

void main() {
    vec4 result = vec4(0.0);
    vec4 color1 = texture(source, qt_TexCoord0);
    vec4 color2 = texture(foregroundSource, qt_TexCoord0);
    vec3 rgb1 = color1.rgb / max(1.0/256.0, color1.a);
    vec3 rgb2 = color2.rgb / max(1.0/256.0, color2.a);
    float a = max(color1.a, color1.a * color2.a);
"#;

/// Shared tail: blend the mode result over the background by foreground coverage and
/// premultiply again.
const FRAGMENT_SHADER_END: &str = r#"
    fragColor.rgb = mix(rgb1, result.rgb, color2.a);
    fragColor.rgb *= a;
    fragColor.a = a;
    fragColor *= qt_Opacity;
}
"#;

/// Written instead of a mode statement for unknown mode indices. Returns before the
/// epilogue so the magenta is never mixed away.
const UNKNOWN_MODE_STATEMENT: &str = "fragColor = vec4(1.0, 0.0, 1.0, 1.0);\n    return;\n";

/// The supported blend modes, in their stable index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Deserialize, serde::Serialize)]
pub enum BlendMode {
    #[default]
    Normal,
    Addition,
    Average,
    Color,
    ColorBurn,
    ColorDodge,
    Darken,
    DarkerColor,
    Difference,
    Divide,
    Exclusion,
    HardLight,
    Hue,
    Lighten,
    LighterColor,
    Lightness,
    Multiply,
    Negation,
    Saturation,
    Screen,
    Subtract,
    SoftLight,
}

impl BlendMode {
    pub const ALL: [BlendMode; 22] = [
        BlendMode::Normal,
        BlendMode::Addition,
        BlendMode::Average,
        BlendMode::Color,
        BlendMode::ColorBurn,
        BlendMode::ColorDodge,
        BlendMode::Darken,
        BlendMode::DarkerColor,
        BlendMode::Difference,
        BlendMode::Divide,
        BlendMode::Exclusion,
        BlendMode::HardLight,
        BlendMode::Hue,
        BlendMode::Lighten,
        BlendMode::LighterColor,
        BlendMode::Lightness,
        BlendMode::Multiply,
        BlendMode::Negation,
        BlendMode::Saturation,
        BlendMode::Screen,
        BlendMode::Subtract,
        BlendMode::SoftLight,
    ];

    /// Looks a mode up by its stable index.
    pub fn from_index(index: i32) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn index(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            BlendMode::Normal => "Normal",
            BlendMode::Addition => "Addition",
            BlendMode::Average => "Average",
            BlendMode::Color => "Color",
            BlendMode::ColorBurn => "ColorBurn",
            BlendMode::ColorDodge => "ColorDodge",
            BlendMode::Darken => "Darken",
            BlendMode::DarkerColor => "DarkerColor",
            BlendMode::Difference => "Difference",
            BlendMode::Divide => "Divide",
            BlendMode::Exclusion => "Exclusion",
            BlendMode::HardLight => "HardLight",
            BlendMode::Hue => "Hue",
            BlendMode::Lighten => "Lighten",
            BlendMode::LighterColor => "LighterColor",
            BlendMode::Lightness => "Lightness",
            BlendMode::Multiply => "Multiply",
            BlendMode::Negation => "Negation",
            BlendMode::Saturation => "Saturation",
            BlendMode::Screen => "Screen",
            BlendMode::Subtract => "Subtract",
            BlendMode::SoftLight => "SoftLight",
        }
    }

    /// The GLSL statement computing `result.rgb` from `rgb1` and `rgb2`.
    pub fn statement(self) -> &'static str {
        match self {
            BlendMode::Normal => "result.rgb = rgb2; a = max(color1.a, color2.a);\n",
            BlendMode::Addition => "result.rgb = min(rgb1 + rgb2, 1.0);\n",
            BlendMode::Average => "result.rgb = 0.5 * (rgb1 + rgb2);\n",
            BlendMode::Color => {
                "result.rgb = HSLtoRGB(vec3(RGBtoHSL(rgb2).xy, RGBtoL(rgb1)));\n"
            }
            BlendMode::ColorBurn => {
                "result.rgb = clamp(1.0 - ((1.0 - rgb1) / max(vec3(1.0 / 256.0), rgb2)), vec3(0.0), vec3(1.0));\n"
            }
            BlendMode::ColorDodge => {
                "result.rgb = clamp(rgb1 / max(vec3(1.0 / 256.0), (1.0 - rgb2)), vec3(0.0), vec3(1.0));\n"
            }
            BlendMode::Darken => "result.rgb = min(rgb1, rgb2);\n",
            BlendMode::DarkerColor => {
                "result.rgb = 0.3 * rgb1.r + 0.59 * rgb1.g + 0.11 * rgb1.b > 0.3 * rgb2.r + 0.59 * rgb2.g + 0.11 * rgb2.b ? rgb2 : rgb1;\n"
            }
            BlendMode::Difference => "result.rgb = abs(rgb1 - rgb2);\n",
            BlendMode::Divide => "result.rgb = clamp(rgb1 / rgb2, 0.0, 1.0);\n",
            BlendMode::Exclusion => "result.rgb = rgb1 + rgb2 - 2.0 * rgb1 * rgb2;\n",
            BlendMode::HardLight => {
                "result.rgb = vec3(channelBlendHardLight(rgb1.r, rgb2.r), channelBlendHardLight(rgb1.g, rgb2.g), channelBlendHardLight(rgb1.b, rgb2.b));\n"
            }
            BlendMode::Hue => "result.rgb = HSLtoRGB(vec3(RGBtoHSL(rgb2).x, RGBtoHSL(rgb1).yz));\n",
            BlendMode::Lighten => "result.rgb = max(rgb1, rgb2);\n",
            BlendMode::LighterColor => {
                "result.rgb = 0.3 * rgb1.r + 0.59 * rgb1.g + 0.11 * rgb1.b > 0.3 * rgb2.r + 0.59 * rgb2.g + 0.11 * rgb2.b ? rgb1 : rgb2;\n"
            }
            BlendMode::Lightness => {
                "result.rgb = HSLtoRGB(vec3(RGBtoHSL(rgb1).xy, RGBtoL(rgb2)));\n"
            }
            BlendMode::Multiply => "result.rgb = rgb1 * rgb2;\n",
            BlendMode::Negation => "result.rgb = 1.0 - abs(1.0 - rgb1 - rgb2);\n",
            BlendMode::Saturation => {
                "vec3 hsl1 = RGBtoHSL(rgb1); result.rgb = HSLtoRGB(vec3(hsl1.x, RGBtoHSL(rgb2).y, hsl1.z));\n"
            }
            BlendMode::Screen => "result.rgb = 1.0 - (vec3(1.0) - rgb1) * (vec3(1.0) - rgb2);\n",
            BlendMode::Subtract => "result.rgb = max(rgb1 - rgb2, vec3(0.0));\n",
            BlendMode::SoftLight => {
                "result.rgb = rgb1 * ((1.0 - rgb1) * rgb2 + (1.0 - (1.0 - rgb1) * (1.0 - rgb2)));\n"
            }
        }
    }
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned by [`BlendMode::from_str`] for names that match no mode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown blend mode `{0}`")]
pub struct UnknownBlendMode(pub String);

impl FromStr for BlendMode {
    type Err = UnknownBlendMode;

    /// Parses a mode name, ignoring ASCII case.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| UnknownBlendMode(name.to_owned()))
    }
}

fn assemble(statement: &str) -> String {
    let mut shader =
        String::with_capacity(FRAGMENT_SHADER_BEGIN.len() + statement.len() + FRAGMENT_SHADER_END.len() + 4);
    shader.push_str(FRAGMENT_SHADER_BEGIN);
    shader.push_str("    ");
    shader.push_str(statement);
    shader.push_str(FRAGMENT_SHADER_END);
    shader
}

/// Assembles the complete blend fragment shader for `mode`.
///
/// The shader samples the background from binding 1 (`source`) and the foreground from
/// binding 2 (`foregroundSource`).
pub fn generate(mode: BlendMode) -> String {
    assemble(mode.statement())
}

/// Like [`generate`] for a raw mode index; unknown indices produce a shader that paints
/// magenta.
pub fn generate_for_index(index: i32) -> String {
    match BlendMode::from_index(index) {
        Some(mode) => generate(mode),
        None => {
            tracing::warn!("unknown blend mode index {index}, emitting debug shader");
            assemble(UNKNOWN_MODE_STATEMENT)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::sampler_bindings;

    #[test]
    fn indices_are_stable() {
        assert_eq!(BlendMode::Normal.index(), 0);
        assert_eq!(BlendMode::Lightness.index(), 15);
        assert_eq!(BlendMode::SoftLight.index(), 21);
        for (i, mode) in BlendMode::ALL.iter().enumerate() {
            assert_eq!(BlendMode::from_index(i as i32), Some(*mode));
        }
        assert_eq!(BlendMode::from_index(22), None);
        assert_eq!(BlendMode::from_index(-1), None);
    }

    #[test]
    fn every_mode_emits_exactly_its_statement() {
        for mode in BlendMode::ALL {
            let shader = generate(mode);
            assert!(shader.starts_with("#version 440\n"));
            assert!(shader.contains(mode.statement()), "{mode}");
            let others = BlendMode::ALL
                .iter()
                .filter(|other| **other != mode && shader.contains(other.statement()))
                .count();
            assert_eq!(others, 0, "{mode}");
            assert!(shader.ends_with("    fragColor *= qt_Opacity;\n}\n"));
        }
    }

    #[test]
    fn samplers_are_background_then_foreground() {
        let names: Vec<_> = sampler_bindings(&generate(BlendMode::Color))
            .into_iter()
            .map(|s| (s.binding, s.name))
            .collect();
        assert_eq!(
            names,
            vec![(1, "source".to_owned()), (2, "foregroundSource".to_owned())]
        );
    }

    #[test]
    fn unknown_index_paints_magenta() {
        let shader = generate_for_index(99);
        assert!(shader.contains("fragColor = vec4(1.0, 0.0, 1.0, 1.0);\n    return;"));
        assert_ne!(shader, generate(BlendMode::Normal));
    }

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!("lightness".parse::<BlendMode>(), Ok(BlendMode::Lightness));
        assert_eq!("ColorDodge".parse::<BlendMode>(), Ok(BlendMode::ColorDodge));
        assert_eq!(
            "Overlay".parse::<BlendMode>(),
            Err(UnknownBlendMode("Overlay".to_owned()))
        );
    }
}
