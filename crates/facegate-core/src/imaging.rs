//! Grayscale image primitives used by the descriptor extractors.

use image::imageops::FilterType;
use image::GrayImage;

/// Side length every face crop is resized to before feature extraction.
pub const CANONICAL_SIZE: u32 = 100;

/// Resize a crop to the canonical `CANONICAL_SIZE` square (bilinear).
pub fn canonical_face(crop: &GrayImage) -> GrayImage {
    image::imageops::resize(crop, CANONICAL_SIZE, CANONICAL_SIZE, FilterType::Triangle)
}

/// Global histogram equalization, in place.
///
/// Maps each level `v` to `round((cdf(v) - cdf_min) * 255 / (N - cdf_min))`
/// where `cdf_min` is the count of the darkest populated level. A constant
/// image is left unchanged.
pub fn equalize_histogram(img: &mut GrayImage) {
    let total = img.as_raw().len() as u64;
    if total == 0 {
        return;
    }

    let mut hist = [0u64; 256];
    for &p in img.as_raw() {
        hist[p as usize] += 1;
    }

    let Some(first) = hist.iter().position(|&c| c > 0) else {
        return;
    };
    if hist[first] == total {
        return;
    }

    let scale = 255.0 / (total - hist[first]) as f64;
    let mut lut = [0u8; 256];
    let mut sum = 0u64;
    for level in (first + 1)..256 {
        sum += hist[level];
        lut[level] = (sum as f64 * scale).round().clamp(0.0, 255.0) as u8;
    }

    for p in img.iter_mut() {
        *p = lut[*p as usize];
    }
}

/// Neighbor offsets `(dy, dx)` clockwise from the top-left; bit `k` has weight `1 << k`.
const LBP_NEIGHBORS: [(i32, i32); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
];

/// Local Binary Pattern code for every interior pixel, row-major.
///
/// Bit `k` is set when neighbor `k` is >= the center pixel. Images smaller
/// than 3x3 have no interior and produce an empty vector.
pub fn lbp_codes(img: &GrayImage) -> Vec<u8> {
    let (w, h) = img.dimensions();
    if w < 3 || h < 3 {
        return Vec::new();
    }
    let w = w as usize;
    let h = h as usize;
    let px = img.as_raw();

    let mut codes = Vec::with_capacity((w - 2) * (h - 2));
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let center = px[y * w + x];
            let mut code = 0u8;
            for (bit, &(dy, dx)) in LBP_NEIGHBORS.iter().enumerate() {
                let ny = (y as i32 + dy) as usize;
                let nx = (x as i32 + dx) as usize;
                if px[ny * w + nx] >= center {
                    code |= 1 << bit;
                }
            }
            codes.push(code);
        }
    }
    codes
}

/// Reflect-101 border index (`gfedcb|abcdefgh|gfedcba`).
fn reflect101(i: i64, n: i64) -> usize {
    if n == 1 {
        return 0;
    }
    let mut i = i;
    while i < 0 || i >= n {
        if i < 0 {
            i = -i;
        }
        if i >= n {
            i = 2 * n - 2 - i;
        }
    }
    i as usize
}

/// Per-pixel Sobel gradient magnitude `sqrt(gx^2 + gy^2)` with 3x3 kernels.
pub fn sobel_magnitude(img: &GrayImage) -> Vec<f32> {
    let (w, h) = img.dimensions();
    let w = w as i64;
    let h = h as i64;
    let px = img.as_raw();
    let at = |y: i64, x: i64| px[reflect101(y, h) * w as usize + reflect101(x, w)] as f32;

    let mut out = Vec::with_capacity((w * h) as usize);
    for y in 0..h {
        for x in 0..w {
            let gx = (at(y - 1, x + 1) + 2.0 * at(y, x + 1) + at(y + 1, x + 1))
                - (at(y - 1, x - 1) + 2.0 * at(y, x - 1) + at(y + 1, x - 1));
            let gy = (at(y + 1, x - 1) + 2.0 * at(y + 1, x) + at(y + 1, x + 1))
                - (at(y - 1, x - 1) + 2.0 * at(y - 1, x) + at(y - 1, x + 1));
            out.push((gx * gx + gy * gy).sqrt());
        }
    }
    out
}

/// Count 8-bit values into `bins` equal-width bins over [0, 256).
pub fn histogram(values: impl IntoIterator<Item = u8>, bins: usize) -> Vec<f32> {
    let mut hist = vec![0.0f32; bins];
    let width = 256 / bins;
    for v in values {
        hist[v as usize / width] += 1.0;
    }
    hist
}

/// Scale a vector to unit L2 norm, in place. A zero vector stays zero.
pub fn l2_normalize(values: &mut [f32]) {
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        values.iter_mut().for_each(|v| *v /= norm);
    }
}
