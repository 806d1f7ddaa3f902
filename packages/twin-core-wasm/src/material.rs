// Material description resolved per layer and handed to the host renderer.
// The core never rasterizes anything; it just normalizes colors, opacity and
// texture references into a predictable record.

use serde::{Deserialize, Serialize};

/// Renderer-facing material record. Colors are linear RGB in 0..1; texture
/// urls are passed through for the host's loaders.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MaterialDescriptor {
    pub color: [f32; 3],
    pub opacity: f32,
    pub transparent: bool,
    pub texture_top: Option<String>,
    pub texture_side: Option<String>,
}

impl Default for MaterialDescriptor {
    fn default() -> Self {
        MaterialDescriptor {
            color: [0.7, 0.7, 0.7],
            opacity: 1.0,
            transparent: false,
            texture_top: None,
            texture_side: None,
        }
    }
}

/// Build a material from the merged property bag of a feature. Styling keys
/// live under a nested `material` object, with bare top-level keys accepted
/// as a fallback. Unknown or malformed color values fall back to the default
/// gray instead of failing the load.
pub fn material_from_properties(properties: &serde_json::Value) -> MaterialDescriptor {
    let mut material = MaterialDescriptor::default();
    let style = properties.get("material").unwrap_or(properties);

    if let Some(color) = style.get("color").and_then(|c| c.as_str()) {
        if let Some(rgb) = parse_color(color) {
            material.color = rgb;
        }
    }

    if let Some(opacity) = style.get("opacity").and_then(|o| o.as_f64()) {
        material.opacity = opacity.clamp(0.0, 1.0) as f32;
        material.transparent = material.opacity < 1.0;
    }

    material.texture_top = style
        .get("textureTop")
        .and_then(|t| t.as_str())
        .map(str::to_string);
    material.texture_side = style
        .get("textureSide")
        .and_then(|t| t.as_str())
        .map(str::to_string);

    material
}

/// Parse a `#rgb` or `#rrggbb` hex color into linear components.
pub fn parse_color(color: &str) -> Option<[f32; 3]> {
    let hex = color.strip_prefix('#')?;

    let (r, g, b) = match hex.len() {
        3 => {
            let r = u8::from_str_radix(&hex[0..1], 16).ok()?;
            let g = u8::from_str_radix(&hex[1..2], 16).ok()?;
            let b = u8::from_str_radix(&hex[2..3], 16).ok()?;
            (r * 17, g * 17, b * 17)
        }
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            (r, g, b)
        }
        _ => return None,
    };

    Some([r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0])
}
