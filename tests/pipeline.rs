use retropic::{
    BlurKind, DitherCell, MixerKind, PaletteKind, Pipeline, PipelineConfig, RasterImage, Rgba8,
    ScalerKind,
};

fn gradient(w: u32, h: u32) -> RasterImage {
    let mut img = RasterImage::filled(w, h, [0, 0, 0, 255]);
    for y in 0..h {
        for x in 0..w {
            img.put(x, y, [(x * 17 % 256) as u8, (y * 29 % 256) as u8, 180, 255]);
        }
    }
    img
}

#[test]
fn rebuilding_from_equal_config_is_byte_identical() {
    let src = gradient(24, 16);
    for palette in [
        PaletteKind::Cga,
        PaletteKind::TrueCga,
        PaletteKind::Dga,
        PaletteKind::Colly,
    ] {
        for mixer in [MixerKind::None, MixerKind::Mix50, MixerKind::Soft] {
            let cfg = PipelineConfig {
                palette,
                mixer,
                contrast: 0.75,
                dither: DitherCell::C3x3,
                pre_scaler: ScalerKind::Scale2x,
                post_scaler: ScalerKind::Nearest2x,
                blur: BlurKind::HBox,
                blur_amount: 2.0,
                ..PipelineConfig::default()
            };
            let out1 = Pipeline::build(&cfg).unwrap().run(&src).unwrap();
            let out2 = Pipeline::build(&cfg).unwrap().run(&src).unwrap();
            assert_eq!(out1, out2, "{palette:?}/{mixer:?}");
        }
    }
}

#[test]
fn one_by_one_cell_is_strict_nearest_quantization() {
    let cfg = PipelineConfig {
        dither: DitherCell::C1x1,
        post_scaler: ScalerKind::None,
        ..PipelineConfig::default()
    };
    let pipeline = Pipeline::build(&cfg).unwrap();
    let src = gradient(16, 16);
    let out = pipeline.run(&src).unwrap();

    let palette = PaletteKind::Cga.table();
    for y in 0..16 {
        for x in 0..16 {
            let expected = palette.get(palette.nearest(Rgba8::from_array(src.get(x, y))));
            assert_eq!(out.get(x, y), expected.to_array());
        }
    }
}

#[test]
fn identity_adjustments_keep_the_source_palette() {
    let cfg = PipelineConfig {
        contrast: 1.0,
        grayscale: false,
        ..PipelineConfig::default()
    };
    let pipeline = Pipeline::build(&cfg).unwrap();
    assert_eq!(*pipeline.palette(), PaletteKind::Cga.table());
}

#[test]
fn grayscale_output_only_contains_gray_pixels() {
    let cfg = PipelineConfig {
        grayscale: true,
        dither: DitherCell::C2x2,
        post_scaler: ScalerKind::None,
        ..PipelineConfig::default()
    };
    let out = Pipeline::build(&cfg).unwrap().run(&gradient(12, 12)).unwrap();
    for px in out.data.chunks_exact(4) {
        assert_eq!(px[0], px[1]);
        assert_eq!(px[1], px[2]);
    }
}

#[test]
fn every_enumerated_option_builds_a_pipeline() {
    // The configuration space is closed: every id maps to a known transform.
    let src = gradient(10, 10);
    for dither in DitherCell::ALL {
        for scaler in [
            ScalerKind::None,
            ScalerKind::Nearest2x,
            ScalerKind::Nearest3x,
            ScalerKind::Nearest5x5,
            ScalerKind::Nearest5x6,
            ScalerKind::Scale2x,
            ScalerKind::Scale3x,
            ScalerKind::Scale5x6,
        ] {
            let cfg = PipelineConfig {
                dither,
                post_scaler: scaler,
                ..PipelineConfig::default()
            };
            let out = Pipeline::build(&cfg).unwrap().run(&src).unwrap();
            assert!(out.width > 0 && out.height > 0);
        }
    }
    for blur in [
        BlurKind::None,
        BlurKind::Box,
        BlurKind::HBox,
        BlurKind::Gaussian,
        BlurKind::HGaussian,
    ] {
        let cfg = PipelineConfig {
            blur,
            blur_amount: 3.0,
            ..PipelineConfig::default()
        };
        Pipeline::build(&cfg).unwrap().run(&src).unwrap();
    }
}

#[test]
fn dithered_output_only_uses_mixed_pair_colors() {
    // With the plain mixer and an exact-palette source, dithering never
    // invents colors outside the palette.
    let palette = PaletteKind::Cga.table();
    let src = RasterImage::filled(8, 8, palette.get(9).to_array());
    let cfg = PipelineConfig {
        dither: DitherCell::C4x4,
        post_scaler: ScalerKind::None,
        ..PipelineConfig::default()
    };
    let out = Pipeline::build(&cfg).unwrap().run(&src).unwrap();
    for px in out.data.chunks_exact(4) {
        assert_eq!(px, palette.get(9).to_array());
    }
}

#[test]
fn invalid_config_fails_the_build() {
    let cfg = PipelineConfig {
        contrast: -0.1,
        ..PipelineConfig::default()
    };
    assert!(Pipeline::build(&cfg).is_err());
}
