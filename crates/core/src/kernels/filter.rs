//! Windowed Gaussian blur and unsharp-mask sharpening for the CPU backend.
//!
//! Filters are separable and applied along both spatial axes with mirror
//! (reflect) edge handling, so a sample needs `radius` real neighbors per
//! side before edge artifacts vanish entirely.

use ndarray::{Array4, ArrayView4, Axis};

pub(crate) fn gaussian_blur(images: ArrayView4<f32>, radius: usize, sigma: f32) -> Array4<f32> {
    let taps = gaussian_taps(radius, sigma);
    let vertical = convolve_axis(images, Axis(1), &taps);
    convolve_axis(vertical.view(), Axis(2), &taps)
}

/// `out = img + alpha * (img - blur(img))`, clamped to `[0, 1]`.
pub(crate) fn unsharp_mask(
    images: ArrayView4<f32>,
    radius: usize,
    alpha: f32,
    sigma: f32,
) -> Array4<f32> {
    let blurred = gaussian_blur(images, radius, sigma);
    let mut out = images.to_owned();
    out.zip_mut_with(&blurred, |sample, &soft| {
        *sample = (*sample + alpha * (*sample - soft)).clamp(0.0, 1.0);
    });
    out
}

/// Normalized Gaussian window of length `2 * radius + 1`.
fn gaussian_taps(radius: usize, sigma: f32) -> Vec<f32> {
    let denom = 2.0 * f64::from(sigma) * f64::from(sigma);
    let weights: Vec<f64> = (-(radius as i64)..=radius as i64)
        .map(|offset| (-((offset * offset) as f64) / denom).exp())
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.into_iter().map(|w| (w / sum) as f32).collect()
}

/// Mirror an out-of-range index back into `[0, len)` without repeating the
/// edge sample.
fn reflect(index: i64, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as i64 - 1);
    let mut i = index.rem_euclid(period);
    if i >= len as i64 {
        i = period - i;
    }
    i as usize
}

fn convolve_axis(src: ArrayView4<f32>, axis: Axis, taps: &[f32]) -> Array4<f32> {
    let len = src.len_of(axis);
    let radius = (taps.len() / 2) as i64;
    let mut out = Array4::<f32>::zeros(src.raw_dim());

    for i in 0..len {
        let mut lane = out.index_axis_mut(axis, i);
        for (k, &weight) in taps.iter().enumerate() {
            let j = reflect(i as i64 + k as i64 - radius, len);
            lane.scaled_add(weight, &src.index_axis(axis, j));
        }
    }

    out
}
