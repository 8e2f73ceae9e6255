use std::path::PathBuf;

use ndarray::{Array4, ArrayView4};
use serde::{Deserialize, Serialize};

use crate::error::ResampleError;

/// An ordered sequence of frames stored as one `(frames, height, width,
/// channels)` tensor of f32 samples.
///
/// Invariants, enforced at construction: every axis length is at least 1, and
/// the storage is standard (row-major, contiguous) layout so the time-major
/// `(frames, height*width, channels)` flatten is a zero-copy reshape.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBatch(Array4<f32>);

impl FrameBatch {
    pub fn new(data: Array4<f32>) -> Result<Self, ResampleError> {
        let shape = data.shape();
        if shape.iter().any(|&dim| dim == 0) {
            return Err(ResampleError::invalid(format!(
                "frame batch axes must all be >= 1, got {}x{}x{}x{}",
                shape[0], shape[1], shape[2], shape[3]
            )));
        }

        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().to_owned()
        };

        Ok(Self(data))
    }

    pub fn from_shape_vec(
        frames: usize,
        height: usize,
        width: usize,
        channels: usize,
        samples: Vec<f32>,
    ) -> Result<Self, ResampleError> {
        let array = Array4::from_shape_vec((frames, height, width, channels), samples)
            .map_err(|e| ResampleError::invalid(format!("frame batch shape mismatch: {e}")))?;
        Self::new(array)
    }

    pub fn frame_count(&self) -> usize {
        self.0.shape()[0]
    }

    pub fn height(&self) -> usize {
        self.0.shape()[1]
    }

    pub fn width(&self) -> usize {
        self.0.shape()[2]
    }

    pub fn channels(&self) -> usize {
        self.0.shape()[3]
    }

    /// Flattened pixel positions per frame (`height * width`).
    pub fn pixels(&self) -> usize {
        self.height() * self.width()
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.0.view()
    }

    pub fn into_inner(self) -> Array4<f32> {
        self.0
    }
}

/// Port type identifier for connection validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortType {
    Frames,
    Int,
    Float,
    Str,
    Bool,
    Path,
}

impl PortType {
    pub fn is_compatible(&self, other: &PortType) -> bool {
        self == other
    }
}

/// Data types that can flow between node ports.
#[derive(Debug, Clone)]
pub enum PortData {
    Frames(FrameBatch),
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Path(PathBuf),
}

impl PortData {
    /// Human-readable variant name for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            PortData::Frames(_) => "Frames",
            PortData::Int(_) => "Int",
            PortData::Float(_) => "Float",
            PortData::Str(_) => "Str",
            PortData::Bool(_) => "Bool",
            PortData::Path(_) => "Path",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_type_compatibility() {
        assert!(PortType::Frames.is_compatible(&PortType::Frames));
        assert!(!PortType::Frames.is_compatible(&PortType::Int));
        assert!(!PortType::Int.is_compatible(&PortType::Float));
    }

    #[test]
    fn test_port_type_serde() {
        let port_type = PortType::Frames;
        let json = serde_json::to_string(&port_type).expect("port type should serialize");
        let deserialized: PortType =
            serde_json::from_str(&json).expect("port type should deserialize");
        assert_eq!(port_type, deserialized);
    }

    #[test]
    fn test_frame_batch_dimensions() {
        let batch = FrameBatch::from_shape_vec(2, 3, 4, 3, vec![0.5; 2 * 3 * 4 * 3]).unwrap();
        assert_eq!(batch.frame_count(), 2);
        assert_eq!(batch.height(), 3);
        assert_eq!(batch.width(), 4);
        assert_eq!(batch.channels(), 3);
        assert_eq!(batch.pixels(), 12);
    }

    #[test]
    fn test_frame_batch_rejects_zero_axis() {
        let err = FrameBatch::new(Array4::<f32>::zeros((0, 4, 4, 3))).unwrap_err();
        assert!(err.to_string().contains("must all be >= 1"));
    }

    #[test]
    fn test_frame_batch_rejects_length_mismatch() {
        let err = FrameBatch::from_shape_vec(2, 2, 2, 3, vec![0.0; 5]).unwrap_err();
        assert!(err.to_string().contains("shape mismatch"));
    }

    #[test]
    fn test_frame_batch_normalizes_layout() {
        let mut array = Array4::<f32>::zeros((2, 3, 4, 1));
        array.swap_axes(0, 1);
        assert!(!array.is_standard_layout());

        let batch = FrameBatch::new(array).unwrap();
        assert!(batch.view().is_standard_layout());
        assert_eq!(batch.frame_count(), 3);
    }

    #[test]
    fn test_port_data_kind() {
        assert_eq!(PortData::Int(1).kind(), "Int");
        assert_eq!(PortData::Str("x".to_string()).kind(), "Str");
        let batch = FrameBatch::from_shape_vec(1, 1, 1, 1, vec![0.0]).unwrap();
        assert_eq!(PortData::Frames(batch).kind(), "Frames");
    }
}
