//! Kernel seams for the two external primitives the resampler dispatches to:
//! a 2D image resize and a 2D windowed blur/sharpen filter.
//!
//! Both are injected trait objects so the engine never assumes a particular
//! backend. [`CpuKernels`] is the pure-Rust reference backend.

pub mod filter;
pub mod resize;

use std::fmt;

use ndarray::{s, Array4, ArrayView4, Axis};

use crate::error::ResampleError;

/// Supported resize kernels — a fixed, closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleMethod {
    Nearest,
    NearestExact,
    Bilinear,
    Area,
    Bicubic,
    Lanczos,
    Bislerp,
}

impl ScaleMethod {
    pub const ALL: [ScaleMethod; 7] = [
        ScaleMethod::Nearest,
        ScaleMethod::NearestExact,
        ScaleMethod::Bilinear,
        ScaleMethod::Area,
        ScaleMethod::Bicubic,
        ScaleMethod::Lanczos,
        ScaleMethod::Bislerp,
    ];

    pub fn parse(raw: &str) -> Result<Self, ResampleError> {
        match raw {
            "nearest" => Ok(Self::Nearest),
            "nearest-exact" => Ok(Self::NearestExact),
            "bilinear" => Ok(Self::Bilinear),
            "area" => Ok(Self::Area),
            "bicubic" => Ok(Self::Bicubic),
            "lanczos" => Ok(Self::Lanczos),
            "bislerp" => Ok(Self::Bislerp),
            other => Err(ResampleError::invalid(format!(
                "unknown scale method '{other}', expected one of \
                 nearest|nearest-exact|bilinear|area|bicubic|lanczos|bislerp"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::NearestExact => "nearest-exact",
            Self::Bilinear => "bilinear",
            Self::Area => "area",
            Self::Bicubic => "bicubic",
            Self::Lanczos => "lanczos",
            Self::Bislerp => "bislerp",
        }
    }
}

impl fmt::Display for ScaleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Crop behaviour of the resize primitive. The resampler always uses
/// `Disabled` (pure resize); `Center` crops the source to the target aspect
/// ratio before resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropMode {
    Disabled,
    Center,
}

/// 2D resize over an `(images, height, width, channels)` batch.
///
/// Deterministic. An axis whose target equals its source length must be an
/// exact pass-through.
pub trait Resize2d: Send + Sync {
    fn resize(
        &self,
        images: ArrayView4<f32>,
        method: ScaleMethod,
        target_width: usize,
        target_height: usize,
        crop: CropMode,
    ) -> Result<Array4<f32>, ResampleError>;
}

/// Windowed 2D blur/sharpen over an `(images, height, width, channels)`
/// batch, with reflect-style edge handling that needs at least `radius` real
/// neighbors on each side of a sample.
pub trait WindowFilter: Send + Sync {
    fn blur(
        &self,
        images: ArrayView4<f32>,
        radius: usize,
        sigma: f32,
    ) -> Result<Array4<f32>, ResampleError>;

    fn sharpen(
        &self,
        images: ArrayView4<f32>,
        radius: usize,
        alpha: f32,
        sigma: f32,
    ) -> Result<Array4<f32>, ResampleError>;
}

/// Pure-Rust reference backend implementing both kernel seams.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuKernels;

impl CpuKernels {
    pub fn new() -> Self {
        Self
    }
}

impl Resize2d for CpuKernels {
    fn resize(
        &self,
        images: ArrayView4<f32>,
        method: ScaleMethod,
        target_width: usize,
        target_height: usize,
        crop: CropMode,
    ) -> Result<Array4<f32>, ResampleError> {
        if images.shape().iter().any(|&dim| dim == 0) {
            return Err(ResampleError::invalid(format!(
                "resize input axes must all be >= 1, got {:?}",
                images.shape()
            )));
        }
        if target_width == 0 || target_height == 0 {
            return Err(ResampleError::invalid(format!(
                "resize target must be positive, got {target_width}x{target_height}"
            )));
        }

        let source = match crop {
            CropMode::Disabled => images,
            CropMode::Center => center_crop(images, target_width, target_height),
        };

        let tall = resize::resample_axis(source, Axis(1), target_height, method)?;
        resize::resample_axis(tall.view(), Axis(2), target_width, method)
    }
}

impl WindowFilter for CpuKernels {
    fn blur(
        &self,
        images: ArrayView4<f32>,
        radius: usize,
        sigma: f32,
    ) -> Result<Array4<f32>, ResampleError> {
        validate_window(radius, sigma)?;
        Ok(filter::gaussian_blur(images, radius, sigma))
    }

    fn sharpen(
        &self,
        images: ArrayView4<f32>,
        radius: usize,
        alpha: f32,
        sigma: f32,
    ) -> Result<Array4<f32>, ResampleError> {
        validate_window(radius, sigma)?;
        if alpha < 0.0 {
            return Err(ResampleError::invalid(format!(
                "sharpen strength must be >= 0, got {alpha}"
            )));
        }
        Ok(filter::unsharp_mask(images, radius, alpha, sigma))
    }
}

fn validate_window(radius: usize, sigma: f32) -> Result<(), ResampleError> {
    if radius == 0 {
        return Err(ResampleError::invalid("filter radius must be >= 1"));
    }
    if !(sigma > 0.0) || !sigma.is_finite() {
        return Err(ResampleError::invalid(format!(
            "filter sigma must be positive and finite, got {sigma}"
        )));
    }
    Ok(())
}

/// Center-crop the source to the target aspect ratio, matching the external
/// resize contract's `crop = center` behaviour.
fn center_crop(images: ArrayView4<f32>, target_width: usize, target_height: usize) -> ArrayView4<f32> {
    let height = images.shape()[1];
    let width = images.shape()[2];

    let old_aspect = width as f64 / height as f64;
    let new_aspect = target_width as f64 / target_height as f64;

    let mut x = 0usize;
    let mut y = 0usize;
    if old_aspect > new_aspect {
        x = ((width as f64 - width as f64 * (new_aspect / old_aspect)) / 2.0).round() as usize;
    } else if old_aspect < new_aspect {
        y = ((height as f64 - height as f64 * (old_aspect / new_aspect)) / 2.0).round() as usize;
    }

    // Degenerate crops collapse to the middle row/column rather than zero.
    let x = x.min((width - 1) / 2);
    let y = y.min((height - 1) / 2);

    images.slice_move(s![.., y..height - y, x..width - x, ..])
}
