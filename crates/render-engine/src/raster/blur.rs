//! Gaussian blur approximation for premultiplied RGBA buffers.
//!
//! Three successive box blurs per axis; pixels outside the buffer count as
//! transparent, so shadows and glows fade out at the edges.

/// Blur `data` (premultiplied RGBA8, `width * height * 4` bytes) in place
/// with standard deviation `sigma` pixels.
pub fn blur_rgba(data: &mut [u8], width: usize, height: usize, sigma: f32) {
    if sigma.is_nan() || sigma <= 0.0 || width == 0 || height == 0 || data.len() < width * height * 4 {
        return;
    }
    let radius = box_radius(sigma);
    if radius == 0 {
        return;
    }

    let mut scratch = vec![0u8; width * height * 4];
    for _ in 0..3 {
        box_pass(data, &mut scratch, width, height, radius, true);
        box_pass(&scratch, data, width, height, radius, false);
    }
}

/// Box radius whose three-fold repetition approximates `sigma`.
fn box_radius(sigma: f32) -> usize {
    let ideal_width = (12.0 * sigma * sigma / 3.0 + 1.0).sqrt();
    ((ideal_width - 1.0) / 2.0).round().max(0.0) as usize
}

fn box_pass(
    src: &[u8],
    dst: &mut [u8],
    width: usize,
    height: usize,
    radius: usize,
    horizontal: bool,
) {
    let (lines, length) = if horizontal {
        (height, width)
    } else {
        (width, height)
    };
    let window = (2 * radius + 1) as u32;

    for line in 0..lines {
        let offset = |i: usize| {
            if horizontal {
                (line * width + i) * 4
            } else {
                (i * width + line) * 4
            }
        };

        let mut sums = [0u32; 4];
        for i in 0..=radius.min(length - 1) {
            let o = offset(i);
            for c in 0..4 {
                sums[c] += src[o + c] as u32;
            }
        }

        for i in 0..length {
            let o = offset(i);
            for c in 0..4 {
                dst[o + c] = (sums[c] / window) as u8;
            }

            let incoming = i + radius + 1;
            if incoming < length {
                let o = offset(incoming);
                for c in 0..4 {
                    sums[c] += src[o + c] as u32;
                }
            }
            if i >= radius {
                let o = offset(i - radius);
                for c in 0..4 {
                    sums[c] -= src[o + c] as u32;
                }
            }
        }
    }
}
