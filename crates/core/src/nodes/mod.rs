pub mod constant;
pub mod frame_source;
pub mod frame_stats;
pub mod temporal_resample;
