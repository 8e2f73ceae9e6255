//! Separable axis resampling for the CPU backend.
//!
//! Each kernel reduces to a per-output-index tap table (source index, weight)
//! computed once per axis, except bislerp, whose spherical interpolation is
//! nonlinear and gets its own path. An axis whose target equals its source
//! length is never resampled, so pass-through axes stay bit-exact.

use ndarray::{Array4, ArrayView1, ArrayView4, ArrayViewMut1, Axis};

use crate::error::ResampleError;

use super::ScaleMethod;

const CUBIC_A: f64 = -0.75;
const LANCZOS_LOBES: f64 = 3.0;

pub(crate) fn resample_axis(
    src: ArrayView4<f32>,
    axis: Axis,
    target: usize,
    method: ScaleMethod,
) -> Result<Array4<f32>, ResampleError> {
    let len = src.len_of(axis);
    if len == 0 || target == 0 {
        return Err(ResampleError::invalid(format!(
            "cannot resample axis of length {len} to length {target}"
        )));
    }
    if target == len {
        return Ok(src.to_owned());
    }

    if method == ScaleMethod::Bislerp {
        return Ok(slerp_axis(src, axis, target));
    }

    let table = tap_table(method, len, target);

    let mut shape = src.raw_dim();
    shape[axis.index()] = target;
    let mut out = Array4::<f32>::zeros(shape);

    for (i, taps) in table.iter().enumerate() {
        let mut lane = out.index_axis_mut(axis, i);
        if let [(j, weight)] = taps.as_slice() {
            if *weight == 1.0 {
                // Direct copy keeps single-tap kernels (nearest family) exact.
                lane.assign(&src.index_axis(axis, *j));
                continue;
            }
        }
        for &(j, weight) in taps {
            lane.scaled_add(weight, &src.index_axis(axis, j));
        }
    }

    Ok(out)
}

/// Per-output-index source taps. Weights sum to 1 for every output index.
fn tap_table(method: ScaleMethod, len: usize, target: usize) -> Vec<Vec<(usize, f32)>> {
    let scale = len as f64 / target as f64;

    (0..target)
        .map(|i| match method {
            ScaleMethod::Nearest => {
                let j = ((i as f64 * scale).floor() as usize).min(len - 1);
                vec![(j, 1.0)]
            }
            ScaleMethod::NearestExact => {
                let j = (((i as f64 + 0.5) * scale).floor() as usize).min(len - 1);
                vec![(j, 1.0)]
            }
            ScaleMethod::Bilinear => {
                let (j0, frac) = split_sample_coord(i, scale, len);
                let j1 = (j0 + 1).min(len - 1);
                if frac == 0.0 || j0 == j1 {
                    vec![(j0, 1.0)]
                } else {
                    vec![(j0, 1.0 - frac as f32), (j1, frac as f32)]
                }
            }
            ScaleMethod::Area => {
                let start = ((i as f64 * scale).floor() as usize).min(len - 1);
                let end = (((i as f64 + 1.0) * scale).ceil() as usize)
                    .clamp(start + 1, len);
                let weight = 1.0 / (end - start) as f32;
                (start..end).map(|j| (j, weight)).collect()
            }
            ScaleMethod::Bicubic => {
                let x = (i as f64 + 0.5) * scale - 0.5;
                let base = x.floor();
                let u = x - base;
                let mut taps = Vec::with_capacity(4);
                for offset in -1i64..=2 {
                    let weight = cubic_weight(u - offset as f64);
                    let j = (base as i64 + offset).clamp(0, len as i64 - 1) as usize;
                    taps.push((j, weight as f32));
                }
                taps
            }
            ScaleMethod::Lanczos => lanczos_taps(i, scale, len),
            ScaleMethod::Bislerp => unreachable!("bislerp has a dedicated path"),
        })
        .collect()
}

/// Half-pixel-center source coordinate, clamped to the sample grid.
/// Returns the lower source index and the fractional offset towards the next.
fn split_sample_coord(i: usize, scale: f64, len: usize) -> (usize, f64) {
    let x = ((i as f64 + 0.5) * scale - 0.5).max(0.0);
    let j0 = (x.floor() as usize).min(len - 1);
    (j0, (x - j0 as f64).clamp(0.0, 1.0))
}

fn cubic_weight(t: f64) -> f64 {
    let t = t.abs();
    if t <= 1.0 {
        (CUBIC_A + 2.0) * t * t * t - (CUBIC_A + 3.0) * t * t + 1.0
    } else if t < 2.0 {
        CUBIC_A * t * t * t - 5.0 * CUBIC_A * t * t + 8.0 * CUBIC_A * t - 4.0 * CUBIC_A
    } else {
        0.0
    }
}

fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        let px = std::f64::consts::PI * x;
        px.sin() / px
    }
}

fn lanczos_kernel(x: f64) -> f64 {
    if x.abs() < LANCZOS_LOBES {
        sinc(x) * sinc(x / LANCZOS_LOBES)
    } else {
        0.0
    }
}

/// Windowed-sinc taps; the kernel widens with the scale factor when
/// minifying, and weights are normalized to sum to 1.
fn lanczos_taps(i: usize, scale: f64, len: usize) -> Vec<(usize, f32)> {
    let filter_scale = scale.max(1.0);
    let support = LANCZOS_LOBES * filter_scale;
    let center = (i as f64 + 0.5) * scale;

    let left = ((center - support + 0.5).floor() as i64).max(0) as usize;
    let right = (((center + support + 0.5).floor()) as i64).clamp(left as i64 + 1, len as i64)
        as usize;

    let mut taps: Vec<(usize, f64)> = (left..right)
        .map(|j| {
            let weight = lanczos_kernel((j as f64 + 0.5 - center) / filter_scale);
            (j, weight)
        })
        .collect();

    let sum: f64 = taps.iter().map(|(_, w)| w).sum();
    if sum != 0.0 {
        for (_, w) in &mut taps {
            *w /= sum;
        }
    }

    taps.into_iter().map(|(j, w)| (j, w as f32)).collect()
}

/// Bislerp: bilinear source coordinates, but the channel vector is
/// spherically interpolated between the two neighboring samples.
fn slerp_axis(src: ArrayView4<f32>, axis: Axis, target: usize) -> Array4<f32> {
    let len = src.len_of(axis);
    let scale = len as f64 / target as f64;

    let mut shape = src.raw_dim();
    shape[axis.index()] = target;
    let mut out = Array4::<f32>::zeros(shape);

    for i in 0..target {
        let (j0, frac) = split_sample_coord(i, scale, len);
        let j1 = (j0 + 1).min(len - 1);
        let t = frac as f32;

        let a = src.index_axis(axis, j0);
        let b = src.index_axis(axis, j1);
        let mut lane = out.index_axis_mut(axis, i);

        let (d0, d1, _) = a.dim();
        for p in 0..d0 {
            for q in 0..d1 {
                slerp_pixel(
                    a.index_axis(Axis(0), p).index_axis(Axis(0), q),
                    b.index_axis(Axis(0), p).index_axis(Axis(0), q),
                    t,
                    lane.index_axis_mut(Axis(0), p).index_axis_move(Axis(0), q),
                );
            }
        }
    }

    out
}

/// Spherical interpolation of one channel vector: direction slerped on the
/// unit sphere, magnitude lerped. Degenerate directions fall back to copy
/// (parallel) or lerp (anti-parallel or zero-length).
fn slerp_pixel(a: ArrayView1<f32>, b: ArrayView1<f32>, t: f32, mut out: ArrayViewMut1<f32>) {
    let norm_a = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|v| v * v).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        for ((o, &x), &y) in out.iter_mut().zip(a.iter()).zip(b.iter()) {
            *o = x * (1.0 - t) + y * t;
        }
        return;
    }

    let mut dot = 0.0f32;
    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += (x / norm_a) * (y / norm_b);
    }
    let dot = dot.clamp(-1.0, 1.0);

    if dot > 1.0 - 1e-5 {
        out.assign(&a);
        return;
    }
    if dot < -1.0 + 1e-5 {
        for ((o, &x), &y) in out.iter_mut().zip(a.iter()).zip(b.iter()) {
            *o = x * (1.0 - t) + y * t;
        }
        return;
    }

    let omega = dot.acos();
    let sin_omega = omega.sin();
    let wa = ((1.0 - t) * omega).sin() / sin_omega;
    let wb = (t * omega).sin() / sin_omega;
    let magnitude = norm_a * (1.0 - t) + norm_b * t;

    for ((o, &x), &y) in out.iter_mut().zip(a.iter()).zip(b.iter()) {
        *o = (wa * (x / norm_a) + wb * (y / norm_b)) * magnitude;
    }
}
