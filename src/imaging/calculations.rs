//! Pure calculation functions for image dimensions and size reporting.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate the largest size with the source aspect ratio that fits inside
/// the target box ("fit within", never "fill").
///
/// Whichever requested side is too long for the source aspect ratio is
/// shrunk; the other is kept. Results are rounded to the nearest pixel and
/// never drop below 1.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `target` - Requested bounds (width, height), both non-zero
///
/// # Examples
/// ```
/// # use pixel_studio::imaging::calculate_fit_dimensions;
/// // 4:3 source into a 400x400 box → width kept, height shrunk
/// assert_eq!(calculate_fit_dimensions((800, 600), (400, 400)), (400, 300));
///
/// // 1:2 source into a 400x400 box → height kept, width shrunk
/// assert_eq!(calculate_fit_dimensions((500, 1000), (400, 400)), (200, 400));
/// ```
pub fn calculate_fit_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if tgt_aspect > src_aspect {
        // Box is wider than the source: height bounds, width shrinks
        let w = tgt_h as f64 * src_aspect;
        (round_dimension(w), tgt_h)
    } else {
        // Box is taller (or equal): width bounds, height shrinks
        let h = tgt_w as f64 / src_aspect;
        (tgt_w, round_dimension(h))
    }
}

/// Calculate the reduced resolution used for analysis when an image exceeds
/// `max_dimension` on either side.
///
/// The longer edge becomes exactly `max_dimension`; the shorter edge scales
/// proportionally. Returns `None` when no downscale is needed.
///
/// # Examples
/// ```
/// # use pixel_studio::imaging::calculate_working_dimensions;
/// assert_eq!(calculate_working_dimensions((2000, 1000), 1024), Some((1024, 512)));
/// assert_eq!(calculate_working_dimensions((800, 600), 1024), None);
/// ```
pub fn calculate_working_dimensions(source: (u32, u32), max_dimension: u32) -> Option<(u32, u32)> {
    let (w, h) = source;
    if w <= max_dimension && h <= max_dimension {
        return None;
    }

    if w > h {
        let scaled_h = h as f64 * max_dimension as f64 / w as f64;
        Some((max_dimension, round_dimension(scaled_h)))
    } else {
        let scaled_w = w as f64 * max_dimension as f64 / h as f64;
        Some((round_dimension(scaled_w), max_dimension))
    }
}

fn round_dimension(value: f64) -> u32 {
    (value.round() as u32).max(1)
}

/// Percentage by which `encoded_len` is smaller than `original_len`.
///
/// Negative when the re-encoded file grew. An empty original reports 0.
pub fn size_reduction_percent(original_len: u64, encoded_len: u64) -> f64 {
    if original_len == 0 {
        return 0.0;
    }
    (1.0 - encoded_len as f64 / original_len as f64) * 100.0
}

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Human-readable byte count using 1024-based units and at most two
/// decimals, e.g. `"1.5 KB"`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut divisor = 1u64;
    while unit + 1 < SIZE_UNITS.len() && bytes >= divisor * 1024 {
        divisor *= 1024;
        unit += 1;
    }

    let value = (bytes as f64 / divisor as f64 * 100.0).round() / 100.0;
    format!("{} {}", value, SIZE_UNITS[unit])
}
