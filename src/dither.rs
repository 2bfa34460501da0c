use std::collections::HashMap;

use crate::{
    mixer::PairTable,
    palette::{Palette, Rgba8},
    raster::RasterImage,
};

/// Spatial dither cell dimensions, drawn from a fixed table.
///
/// The non-square "exotic" cells (2×50, 50×3, 10×6) produce pathological
/// near-linear dithering patterns. They are retained as a creative and
/// diagnostic option, not treated as invalid input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DitherCell {
    C1x1,
    C2x2,
    C3x3,
    C4x4,
    C5x3,
    C5x4,
    C5x5,
    C5x6,
    C2x50,
    C50x3,
    C10x6,
}

impl DitherCell {
    pub const ALL: [DitherCell; 11] = [
        DitherCell::C1x1,
        DitherCell::C2x2,
        DitherCell::C3x3,
        DitherCell::C4x4,
        DitherCell::C5x3,
        DitherCell::C5x4,
        DitherCell::C5x5,
        DitherCell::C5x6,
        DitherCell::C2x50,
        DitherCell::C50x3,
        DitherCell::C10x6,
    ];

    pub fn dims(self) -> (u32, u32) {
        match self {
            DitherCell::C1x1 => (1, 1),
            DitherCell::C2x2 => (2, 2),
            DitherCell::C3x3 => (3, 3),
            DitherCell::C4x4 => (4, 4),
            DitherCell::C5x3 => (5, 3),
            DitherCell::C5x4 => (5, 4),
            DitherCell::C5x5 => (5, 5),
            DitherCell::C5x6 => (5, 6),
            DitherCell::C2x50 => (2, 50),
            DitherCell::C50x3 => (50, 3),
            DitherCell::C10x6 => (10, 6),
        }
    }
}

/// Quantize `src` to the palette using ordered dithering.
///
/// A 1×1 cell is strict nearest-color quantization with no spatial pattern.
/// Larger cells match each pixel against the nearest dither-pair blend and
/// emit the pair's first or second mixed color depending on the parity of the
/// pixel's cell coordinates.
pub fn ditherize(
    src: &RasterImage,
    palette: &Palette,
    pairs: &PairTable,
    cell: DitherCell,
) -> RasterImage {
    let (cw, ch) = cell.dims();
    let mut out = RasterImage::filled(src.width, src.height, [0, 0, 0, 255]);

    if cell == DitherCell::C1x1 {
        let mut cache: HashMap<[u8; 4], Rgba8> = HashMap::new();
        for y in 0..src.height {
            for x in 0..src.width {
                let px = src.get(x, y);
                let quantized = *cache
                    .entry(px)
                    .or_insert_with(|| palette.get(palette.nearest(Rgba8::from_array(px))));
                out.put(x, y, quantized.to_array());
            }
        }
        return out;
    }

    // Source pictures contain few distinct colors; memoize the pair lookup.
    let mut cache: HashMap<[u8; 4], (Rgba8, Rgba8)> = HashMap::new();
    for y in 0..src.height {
        for x in 0..src.width {
            let px = src.get(x, y);
            let (first, second) = *cache.entry(px).or_insert_with(|| {
                let p = pairs.nearest(Rgba8::from_array(px));
                (p.first, p.second)
            });
            let phase = (x / cw + y / ch) % 2;
            let chosen = if phase == 0 { first } else { second };
            out.put(x, y, chosen.to_array());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mixer::MixerKind, palette::PaletteKind};

    fn table(kind: PaletteKind, mixer: MixerKind) -> (Palette, PairTable) {
        let pal = kind.table();
        let pairs = PairTable::generate(&pal, mixer);
        (pal, pairs)
    }

    #[test]
    fn cell_1x1_is_strict_nearest_quantization() {
        let (pal, pairs) = table(PaletteKind::Cga, MixerKind::None);
        // A gradient that is nowhere exactly on the palette.
        let mut src = RasterImage::filled(8, 8, [0, 0, 0, 255]);
        for y in 0..8 {
            for x in 0..8 {
                let v = (x * 30 + y) as u8;
                src.put(x, y, [v, v / 2, 200, 255]);
            }
        }
        let out = ditherize(&src, &pal, &pairs, DitherCell::C1x1);
        for y in 0..8 {
            for x in 0..8 {
                let expected = pal.get(pal.nearest(Rgba8::from_array(src.get(x, y))));
                assert_eq!(out.get(x, y), expected.to_array());
            }
        }
    }

    #[test]
    fn palette_exact_input_has_no_dither_artifacts() {
        let (pal, pairs) = table(PaletteKind::Cga, MixerKind::None);
        let src = RasterImage::filled(10, 10, pal.get(4).to_array());
        for cell in DitherCell::ALL {
            let out = ditherize(&src, &pal, &pairs, cell);
            for y in 0..10 {
                for x in 0..10 {
                    assert_eq!(out.get(x, y), pal.get(4).to_array(), "cell {cell:?}");
                }
            }
        }
    }

    #[test]
    fn midpoint_input_produces_checkerboard_of_the_pair() {
        let (pal, pairs) = table(PaletteKind::Cga, MixerKind::None);
        // Exactly between black (0) and white (15).
        let src = RasterImage::filled(4, 4, [128, 128, 128, 255]);
        let out = ditherize(&src, &pal, &pairs, DitherCell::C2x2);
        let black = pal.get(0).to_array();
        let white = pal.get(15).to_array();
        // 2x2 blocks alternate between the two pair members.
        assert_eq!(out.get(0, 0), out.get(1, 1));
        assert_ne!(out.get(0, 0), out.get(2, 0));
        for y in 0..4 {
            for x in 0..4 {
                let px = out.get(x, y);
                assert!(px == black || px == white);
            }
        }
    }

    #[test]
    fn ditherize_is_deterministic() {
        let (pal, pairs) = table(PaletteKind::TrueCga, MixerKind::Mix25);
        let mut src = RasterImage::filled(16, 16, [0, 0, 0, 255]);
        for y in 0..16 {
            for x in 0..16 {
                src.put(x, y, [(x * 16) as u8, (y * 16) as u8, 77, 255]);
            }
        }
        let a = ditherize(&src, &pal, &pairs, DitherCell::C5x3);
        let b = ditherize(&src, &pal, &pairs, DitherCell::C5x3);
        assert_eq!(a, b);
    }
}
