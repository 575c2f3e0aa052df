//! Small GLSL text helpers shared by the blur and blend generators.

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

/// Formats a float literal the way `printf("%g")` does: six significant digits, no
/// trailing zeros, scientific notation outside `[1e-4, 1e6)`.
///
/// Weights and offsets are baked into shader text with this, so equal inputs always
/// produce byte-identical shaders.
///
/// ```
/// use acrylic_fx::shader::format_number;
///
/// assert_eq!(format_number(1.0), "1");
/// assert_eq!(format_number(2.0 / 3.0), "0.666667");
/// assert_eq!(format_number(0.00001), "1e-05");
/// assert_eq!(format_number(-1234567.0), "-1.23457e+06");
/// ```
pub fn format_number(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return "0".to_owned();
    }

    let scientific = format!("{value:.5e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if !(-4..6).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{sign}{:02}",
            trim_fraction(mantissa),
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (5 - exponent) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_owned()
    }
}

fn trim_fraction(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

/// Appends the `std140` uniform block shared by both blur passes.
pub(crate) fn declare_blur_uniforms(shader: &mut String, alpha_only: bool) {
    shader.push_str(
        "layout(std140, binding = 0) uniform buf {\n\
         \x20   mat4 qt_Matrix;\n\
         \x20   float qt_Opacity;\n\
         \x20   float spread;\n\
         \x20   vec2 dirstep;\n",
    );
    if alpha_only {
        shader.push_str(
            "    vec4 color;\n\
             \x20   float thickness;\n",
        );
    }
    shader.push_str("};\n\n");
}

/// A `layout(binding = N) uniform sampler2D name;` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerDecl {
    pub binding: u32,
    pub name: String,
}

fn sampler_regex() -> &'static Regex {
    static SAMPLER_DECL: OnceLock<Regex> = OnceLock::new();
    SAMPLER_DECL.get_or_init(|| {
        Regex::new(r"layout\s*\(\s*binding\s*=\s*(\d+)\s*\)\s*uniform\s+sampler2D\s+(\w+)\s*;")
            .expect("sampler declaration pattern is valid")
    })
}

/// Removes `/* … */` and `// …` comments.
pub(crate) fn strip_comments(source: &str) -> Cow<'_, str> {
    static BLOCK: OnceLock<Regex> = OnceLock::new();
    static LINE: OnceLock<Regex> = OnceLock::new();
    let block = BLOCK.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/").expect("block comment pattern"));
    let line = LINE.get_or_init(|| Regex::new(r"//[^\n]*").expect("line comment pattern"));

    match block.replace_all(source, "") {
        Cow::Borrowed(text) => line.replace_all(text, ""),
        Cow::Owned(text) => Cow::Owned(line.replace_all(&text, "").into_owned()),
    }
}

/// Lists the combined image samplers a shader declares, ordered by binding index.
///
/// Hosts must bind one texture per entry, in this order.
pub fn sampler_bindings(source: &str) -> Vec<SamplerDecl> {
    let stripped = strip_comments(source);
    let mut samplers: Vec<SamplerDecl> = sampler_regex()
        .captures_iter(&stripped)
        .filter_map(|caps| {
            Some(SamplerDecl {
                binding: caps[1].parse().ok()?,
                name: caps[2].to_owned(),
            })
        })
        .collect();
    samplers.sort_by_key(|s| s.binding);
    samplers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_notation_drops_trailing_zeros() {
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(100.0), "100");
        assert_eq!(format_number(-0.123456789), "-0.123457");
        assert_eq!(format_number(0.000123456), "0.000123456");
        assert_eq!(format_number(999999.0), "999999");
    }

    #[test]
    fn scientific_notation_pads_exponent() {
        assert_eq!(format_number(1234567.0), "1.23457e+06");
        assert_eq!(format_number(0.0000123456), "1.23456e-05");
        assert_eq!(format_number(12345678.0), "1.23457e+07");
    }

    #[test]
    fn zero_and_non_finite_print_as_zero() {
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(f64::NAN), "0");
    }

    #[test]
    fn uniform_block_grows_for_alpha_only() {
        let mut plain = String::new();
        declare_blur_uniforms(&mut plain, false);
        assert!(plain.starts_with("layout(std140, binding = 0) uniform buf {\n    mat4 qt_Matrix;\n"));
        assert!(!plain.contains("thickness"));

        let mut alpha = String::new();
        declare_blur_uniforms(&mut alpha, true);
        assert!(alpha.contains("    vec2 dirstep;\n    vec4 color;\n    float thickness;\n};\n\n"));
    }

    #[test]
    fn samplers_are_listed_in_binding_order() {
        let source = "\
            layout(binding = 2) uniform sampler2D mask;\n\
            // layout(binding = 3) uniform sampler2D disabled;\n\
            layout(binding = 1) uniform sampler2D source;\n";
        let samplers = sampler_bindings(source);
        assert_eq!(
            samplers,
            vec![
                SamplerDecl {
                    binding: 1,
                    name: "source".into()
                },
                SamplerDecl {
                    binding: 2,
                    name: "mask".into()
                },
            ]
        );
    }
}
