pub mod length;
pub mod downsample;
pub mod resample;

pub use length::LengthFilter;
pub use downsample::DownsampleFilter;
pub use resample::ResampleFiberFilter;
