use crate::{
    blur::BlurKind,
    dither::{DitherCell, ditherize},
    error::{RetropicError, RetropicResult},
    mixer::{MixerKind, PairTable},
    palette::{Palette, PaletteKind},
    raster::RasterImage,
    scale::ScalerKind,
    surface::{PixelAspect, PresentationMode},
};

/// The full configuration surface for one rendering session.
///
/// Every field is independently settable and every enum value maps to a known
/// transform, so any value of this record resolves to a working pipeline;
/// `validate` only guards the numeric ranges.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub palette: PaletteKind,
    pub grayscale: bool,
    pub mixer: MixerKind,
    /// Contrast/dimmer factor in [0,1]; 1.0 is identity.
    pub contrast: f32,
    pub dither: DitherCell,
    /// Scaler applied before dithering (pre-multiplies pixel density).
    pub pre_scaler: ScalerKind,
    /// Scaler applied after dithering (aspect correction / upscale).
    pub post_scaler: ScalerKind,
    pub blur: BlurKind,
    /// Blur radius or sigma in [1,10].
    pub blur_amount: f32,
    pub aspect: PixelAspect,
    pub mode: PresentationMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            palette: PaletteKind::Cga,
            grayscale: false,
            mixer: MixerKind::None,
            contrast: 1.0,
            dither: DitherCell::C1x1,
            pre_scaler: ScalerKind::None,
            post_scaler: ScalerKind::Nearest5x5,
            blur: BlurKind::None,
            blur_amount: 1.0,
            aspect: PixelAspect::Square,
            mode: PresentationMode::Bitmap,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> RetropicResult<()> {
        if !self.contrast.is_finite() || !(0.0..=1.0).contains(&self.contrast) {
            return Err(RetropicError::validation("contrast must be in 0.0..=1.0"));
        }
        if !self.blur_amount.is_finite() || !(1.0..=10.0).contains(&self.blur_amount) {
            return Err(RetropicError::validation(
                "blur amount must be in 1.0..=10.0",
            ));
        }
        Ok(())
    }
}

/// A built transform chain: a pure function of the configuration it was built
/// from. Rebuilding from an equal configuration yields an identical pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct Pipeline {
    pre_scaler: ScalerKind,
    palette: Palette,
    pairs: PairTable,
    dither: DitherCell,
    post_scaler: ScalerKind,
    blur: BlurKind,
    blur_amount: f32,
}

impl Pipeline {
    pub fn build(config: &PipelineConfig) -> RetropicResult<Self> {
        config.validate()?;

        // Contrast and grayscale apply to the palette, not the image, before
        // pair generation.
        let mut palette = config.palette.table();
        if config.contrast < 1.0 {
            palette = palette.with_contrast(config.contrast);
        }
        if config.grayscale {
            palette = palette.to_grayscale();
        }
        let pairs = PairTable::generate(&palette, config.mixer);

        Ok(Self {
            pre_scaler: config.pre_scaler,
            palette,
            pairs,
            dither: config.dither,
            post_scaler: config.post_scaler,
            blur: config.blur,
            blur_amount: config.blur_amount,
        })
    }

    /// The adjusted palette the ditherizer quantizes against.
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Run the chain: pre-scale, dither, post-scale, blur.
    #[tracing::instrument(skip(self, src))]
    pub fn run(&self, src: &RasterImage) -> RetropicResult<RasterImage> {
        let scaled = self.pre_scaler.apply(src);
        let dithered = ditherize(&scaled, &self.palette, &self.pairs, self.dither);
        let post = self.post_scaler.apply(&dithered);
        self.blur.apply(&post, self.blur_amount)
    }
}
