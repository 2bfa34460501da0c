#![forbid(unsafe_code)]

pub mod blur;
pub mod decompress;
pub mod dither;
pub mod error;
pub mod mixer;
pub mod palette;
pub mod pic;
pub mod pipeline;
pub mod raster;
pub mod replay;
pub mod scale;
pub mod surface;
pub mod surface_2d;
#[cfg(feature = "gpu")]
pub mod surface_crt;

pub use blur::BlurKind;
pub use decompress::{Engine, decompress};
pub use dither::{DitherCell, ditherize};
pub use error::{RetropicError, RetropicResult};
pub use mixer::{DitherPair, MixerKind, PairTable};
pub use palette::{Palette, PaletteKind, Rgba8};
pub use pic::{DrawCodes, DrawCommand, Layers, Pattern, Picture, Point};
pub use pipeline::{Pipeline, PipelineConfig};
pub use raster::RasterImage;
pub use replay::{SCREEN_HEIGHT, SCREEN_WIDTH, replay};
pub use scale::ScalerKind;
pub use surface::{
    CrtOptions, Debouncer, PixelAspect, PresentationMode, Presenter, RESIZE_DEBOUNCE,
};
pub use surface_2d::BitmapSurface;
#[cfg(feature = "gpu")]
pub use surface_crt::CrtSurface;
