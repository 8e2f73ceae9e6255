//! Axis choreography that lets a 2D image primitive operate along the frame
//! axis of a batch.
//!
//! All helpers are zero-copy views with fixed shape contracts, so the engine
//! loop stays free of inline permutes:
//!
//! - resize pass: `(frames, positions, channels)` slab ⇄ a one-image batch
//!   `(1, frames, positions, channels)` whose *height* is the frame axis.
//! - smoothing pass: `(frames, positions, channels)` slab ⇄ a batch of
//!   single-column images `(positions, frames, 1, channels)`, one image per
//!   spatial position, again with the frame axis as image height.

use ndarray::{Array4, ArrayView3, ArrayView4, Axis};

/// `(frames, positions, channels)` → `(1, frames, positions, channels)`.
///
/// The resize primitive then sees the frame axis as image height (the axis to
/// resample) and the position axis as image width (identity pass-through).
pub(crate) fn time_axis_as_image(slab: ArrayView3<'_, f32>) -> ArrayView4<'_, f32> {
    slab.insert_axis(Axis(0))
}

/// `(1, new_frames, positions, channels)` → `(new_frames, positions, channels)`.
pub(crate) fn image_as_time_axis(images: Array4<f32>) -> ndarray::Array3<f32> {
    images.index_axis_move(Axis(0), 0)
}

/// `(frames, positions, channels)` → `(positions, frames, 1, channels)`.
///
/// Each spatial position becomes its own single-column image, so a 2D
/// windowed filter applied to the batch acts along the frame axis only once
/// the column is widened with replicated copies.
pub(crate) fn positions_as_columns(slab: ArrayView3<'_, f32>) -> ArrayView4<'_, f32> {
    slab.permuted_axes([1, 0, 2]).insert_axis(Axis(2))
}

/// `(positions, frames, 1, channels)` → `(frames, positions, channels)`.
pub(crate) fn columns_as_positions(images: ArrayView4<'_, f32>) -> ArrayView3<'_, f32> {
    images.index_axis_move(Axis(2), 0).permuted_axes([1, 0, 2])
}
