//! Image containers used by the segmentation engine.
//!
//! - [`ImageF32`]: a single owned plane (one band, one filter response).
//! - [`MultiChannelImage`]: the interleaved (height, width, channels) stack
//!   consumed by the histogram engine.
//! - [`io`]: thin adapters over the `image` crate for demos and tooling.
pub mod f32;
pub mod io;
pub mod stack;
pub mod traits;

pub use self::f32::ImageF32;
pub use self::stack::MultiChannelImage;
pub use self::traits::{ImageView, ImageViewMut};
