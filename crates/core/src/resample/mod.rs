//! Temporal resampler: retimes a frame batch by driving a 2D resize
//! primitive along the frame axis, with an optional temporal blur/sharpen
//! pass built on a 2D windowed filter.
//!
//! There is exactly one code path; smoothing and chunking are configuration.
//! Chunking bounds peak memory per dispatch and must never change the result
//! versus an unchunked run.

mod axis;

use ndarray::{s, Array3};
use tokio::sync::watch;
use tracing::debug;

use crate::error::ResampleError;
use crate::kernels::{CropMode, Resize2d, ScaleMethod, WindowFilter};
use crate::types::FrameBatch;

/// Spatial positions handed to the resize primitive per chunk.
pub const DEFAULT_BATCH_SIZE: usize = 4096;

/// Temporal smoothing/sharpening configuration.
///
/// `sigma > 0` blurs, `sigma < 0` sharpens with `sharpen_alpha` as the
/// unsharp strength. The pass runs only when
/// `enabled && radius != 0 && sigma != 0` — a zero radius or sigma turns it
/// off regardless of the flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingSpec {
    pub enabled: bool,
    pub radius: usize,
    pub sigma: f32,
    pub sharpen_alpha: f32,
}

impl SmoothingSpec {
    pub fn is_active(&self) -> bool {
        self.enabled && self.radius != 0 && self.sigma != 0.0
    }

    /// Window width the filter sees: `radius` manufactured neighbors on each
    /// side of the real column.
    pub fn window(&self) -> usize {
        2 * self.radius + 1
    }
}

impl Default for SmoothingSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            radius: 1,
            sigma: 1.0,
            sharpen_alpha: 1.0,
        }
    }
}

/// Injected cancellation and progress endpoints for one resample call.
///
/// Cancellation is polled once per chunk boundary; an in-flight chunk always
/// completes. Progress reports a monotonically increasing count of processed
/// positions with the total known up front.
#[derive(Default)]
pub struct ResampleContext<'a> {
    cancel: Option<&'a watch::Receiver<bool>>,
    progress: Option<&'a (dyn Fn(u64, u64) + Send + Sync)>,
}

impl<'a> ResampleContext<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: &'a watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_progress(mut self, progress: &'a (dyn Fn(u64, u64) + Send + Sync)) -> Self {
        self.progress = Some(progress);
        self
    }

    fn checkpoint(&self) -> Result<(), ResampleError> {
        match self.cancel {
            Some(rx) if *rx.borrow() => Err(ResampleError::Cancelled),
            _ => Ok(()),
        }
    }

    fn report(&self, done: u64, total: u64) {
        if let Some(callback) = self.progress {
            callback(done, total);
        }
    }
}

/// The resampling engine. Borrows its two primitives; holds no other state.
pub struct TemporalResampler<'a> {
    resize: &'a dyn Resize2d,
    filter: &'a dyn WindowFilter,
    batch_size: usize,
}

impl<'a> TemporalResampler<'a> {
    pub fn new(resize: &'a dyn Resize2d, filter: &'a dyn WindowFilter) -> Self {
        Self {
            resize,
            filter,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// `max(round(frames * multiplier), 1)`.
    pub fn target_frame_count(frame_count: usize, multiplier: f64) -> usize {
        ((frame_count as f64 * multiplier).round() as i64).max(1) as usize
    }

    /// Resample `frames` along the temporal axis to
    /// `max(round(B * multiplier), 1)` frames, then optionally smooth or
    /// sharpen along the same axis.
    ///
    /// Either a complete batch of the target length is returned or an error;
    /// no partial output is ever observable.
    pub fn resample(
        &self,
        frames: &FrameBatch,
        method: ScaleMethod,
        multiplier: f64,
        smoothing: Option<&SmoothingSpec>,
        ctx: &ResampleContext<'_>,
    ) -> Result<FrameBatch, ResampleError> {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(ResampleError::invalid(format!(
                "multiplier must be positive and finite, got {multiplier}"
            )));
        }
        if self.batch_size == 0 {
            return Err(ResampleError::invalid("batch_size must be >= 1"));
        }

        let smoothing_pass = smoothing.filter(|spec| spec.is_active());
        if let Some(spec) = smoothing_pass {
            if spec.sigma < 0.0 && spec.sharpen_alpha < 0.0 {
                return Err(ResampleError::invalid(format!(
                    "sharpen strength must be >= 0, got {}",
                    spec.sharpen_alpha
                )));
            }
        }

        let frame_count = frames.frame_count();
        let target = Self::target_frame_count(frame_count, multiplier);
        let pixels = frames.pixels();
        let channels = frames.channels();

        let total_positions = pixels as u64 * if smoothing_pass.is_some() { 2 } else { 1 };
        let mut done: u64 = 0;

        debug!(
            frames = frame_count,
            target,
            pixels,
            method = %method,
            smoothing = smoothing_pass.is_some(),
            batch_size = self.batch_size,
            "temporal resample"
        );

        let flat = frames
            .view()
            .into_shape_with_order((frame_count, pixels, channels))
            .map_err(|e| ResampleError::invalid(format!("frame batch is not flattenable: {e}")))?;

        let mut resampled = Array3::<f32>::zeros((target, pixels, channels));
        let mut start = 0usize;
        while start < pixels {
            ctx.checkpoint()?;
            let end = (start + self.batch_size).min(pixels);

            let image = axis::time_axis_as_image(flat.slice(s![.., start..end, ..]));
            let resized =
                self.resize
                    .resize(image, method, end - start, target, CropMode::Disabled)?;
            ensure_shape(resized.shape(), &[1, target, end - start, channels])?;

            resampled
                .slice_mut(s![.., start..end, ..])
                .assign(&axis::image_as_time_axis(resized));

            done += (end - start) as u64;
            ctx.report(done, total_positions);
            start = end;
        }

        if let Some(spec) = smoothing_pass {
            // The expanded window multiplies each chunk's footprint, so the
            // chunk length shrinks by the same factor.
            let window = spec.window();
            let chunk_len = (self.batch_size / window).max(1);

            let mut smoothed = Array3::<f32>::zeros((target, pixels, channels));
            let mut start = 0usize;
            while start < pixels {
                ctx.checkpoint()?;
                let end = (start + chunk_len).min(pixels);

                let columns = axis::positions_as_columns(resampled.slice(s![.., start..end, ..]));
                // Widen each single-column image to the filter window with
                // replicated copies: the filter's reflect padding then has
                // `radius` real neighbors per side, and its horizontal pass
                // becomes a no-op on the center column.
                let padded = self.resize.resize(
                    columns,
                    ScaleMethod::NearestExact,
                    window,
                    target,
                    CropMode::Disabled,
                )?;
                ensure_shape(padded.shape(), &[end - start, target, window, channels])?;

                let filtered = if spec.sigma > 0.0 {
                    self.filter.blur(padded.view(), spec.radius, spec.sigma)?
                } else {
                    self.filter.sharpen(
                        padded.view(),
                        spec.radius,
                        spec.sharpen_alpha,
                        spec.sigma.abs(),
                    )?
                };
                ensure_shape(filtered.shape(), &[end - start, target, window, channels])?;

                let center = filtered.slice(s![.., .., spec.radius..spec.radius + 1, ..]);
                smoothed
                    .slice_mut(s![.., start..end, ..])
                    .assign(&axis::columns_as_positions(center));

                done += (end - start) as u64;
                ctx.report(done, total_positions);
                start = end;
            }
            resampled = smoothed;
        }

        let output = resampled
            .into_shape_with_order((target, frames.height(), frames.width(), channels))
            .map_err(|e| ResampleError::invalid(format!("output reshape failed: {e}")))?;
        FrameBatch::new(output)
    }
}

fn ensure_shape(actual: &[usize], expected: &[usize]) -> Result<(), ResampleError> {
    if actual != expected {
        return Err(ResampleError::invalid(format!(
            "kernel backend returned shape {actual:?}, expected {expected:?}"
        )));
    }
    Ok(())
}
