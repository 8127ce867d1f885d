// Promptdock Anchor Matcher
// Normalized cross-correlation template search over grayscale screen content

use image::{GrayImage, RgbaImage};

use crate::geometry::Rect;

/// Best placement of a template inside a larger image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateMatch {
    /// Bounding box of the template inside the searched image, in the
    /// searched image's own coordinates.
    pub bbox: Rect,
    /// Normalized correlation score in [-1.0, 1.0].
    pub score: f32,
}

/// Variance below this is treated as a flat (single-tone) image.
const FLAT_VARIANCE_EPS: f64 = 1e-6;

/// Convert captured RGBA content to grayscale for matching.
///
/// Matching in grayscale is what makes the search robust against the
/// minor channel-level differences introduced by themes, anti-aliasing
/// and sub-pixel rendering.
pub fn to_gray(image: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let p = image.get_pixel(x, y);
        // ITU-R BT.601 luma weights
        let luma =
            0.299 * f32::from(p[0]) + 0.587 * f32::from(p[1]) + 0.114 * f32::from(p[2]);
        image::Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

/// Search `haystack` for the placement of `needle` with the highest
/// normalized cross-correlation score at or above `threshold`.
///
/// Returns `None` when the needle does not fit inside the haystack, is
/// empty, or no placement reaches the threshold. A miss is expected,
/// frequently-occurring data for callers, not an error.
pub fn find_template(
    haystack: &GrayImage,
    needle: &GrayImage,
    threshold: f32,
) -> Option<TemplateMatch> {
    let (hw, hh) = haystack.dimensions();
    let (nw, nh) = needle.dimensions();
    if nw == 0 || nh == 0 || nw > hw || nh > hh {
        return None;
    }

    let needle_px: Vec<f64> = needle.pixels().map(|p| f64::from(p[0])).collect();
    let n = needle_px.len() as f64;
    let needle_mean = needle_px.iter().sum::<f64>() / n;
    let needle_dev: Vec<f64> = needle_px.iter().map(|v| v - needle_mean).collect();
    let needle_var: f64 = needle_dev.iter().map(|v| v * v).sum();
    let needle_flat = needle_var < FLAT_VARIANCE_EPS;

    let mut best: Option<TemplateMatch> = None;

    for oy in 0..=(hh - nh) {
        for ox in 0..=(hw - nw) {
            let score = score_at(haystack, ox, oy, nw, nh, &needle_dev, needle_mean, needle_flat);
            if score >= threshold && best.map_or(true, |b| score > b.score) {
                best = Some(TemplateMatch {
                    bbox: Rect::new(ox as i32, oy as i32, nw, nh),
                    score,
                });
            }
        }
    }

    best
}

fn score_at(
    haystack: &GrayImage,
    ox: u32,
    oy: u32,
    nw: u32,
    nh: u32,
    needle_dev: &[f64],
    needle_mean: f64,
    needle_flat: bool,
) -> f32 {
    let n = (nw * nh) as f64;

    let mut window_sum = 0.0;
    for y in 0..nh {
        for x in 0..nw {
            window_sum += f64::from(haystack.get_pixel(ox + x, oy + y)[0]);
        }
    }
    let window_mean = window_sum / n;

    let mut cross = 0.0;
    let mut window_var = 0.0;
    let mut i = 0;
    for y in 0..nh {
        for x in 0..nw {
            let w = f64::from(haystack.get_pixel(ox + x, oy + y)[0]) - window_mean;
            cross += needle_dev[i] * w;
            window_var += w * w;
            i += 1;
        }
    }

    if needle_flat || window_var < FLAT_VARIANCE_EPS {
        // Correlation is undefined for flat regions. Fall back to mean
        // intensity distance so a flat template can still match a flat
        // window of the same tone.
        if needle_flat && window_var < FLAT_VARIANCE_EPS {
            return (1.0 - (needle_mean - window_mean).abs() / 255.0) as f32;
        }
        return 0.0;
    }

    let needle_var: f64 = needle_dev.iter().map(|v| v * v).sum();
    (cross / (needle_var.sqrt() * window_var.sqrt())) as f32
}
