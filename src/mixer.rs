use crate::palette::{Palette, Rgba8};

/// Strategy for blending the two members of a dither pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MixerKind {
    /// Pair colors pass through unchanged.
    None,
    /// Each color pulled 10% toward its partner.
    Mix10,
    /// Each color pulled 25% toward its partner.
    Mix25,
    /// Each color pulled 50% toward its partner (both become the midpoint).
    Mix50,
    /// Perceptual softening: a 25% mutual pull computed in linear light.
    Soft,
}

impl MixerKind {
    fn mix(self, a: Rgba8, b: Rgba8) -> (Rgba8, Rgba8) {
        match self {
            MixerKind::None => (a, b),
            MixerKind::Mix10 => (a.lerp(b, 0.10), b.lerp(a, 0.10)),
            MixerKind::Mix25 => (a.lerp(b, 0.25), b.lerp(a, 0.25)),
            MixerKind::Mix50 => (a.lerp(b, 0.50), b.lerp(a, 0.50)),
            MixerKind::Soft => (a.lerp_linear(b, 0.25), b.lerp_linear(a, 0.25)),
        }
    }
}

/// One precomputed dither pair: the two mixed member colors and the blend
/// representative used to match source pixels against the pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DitherPair {
    pub first: Rgba8,
    pub second: Rgba8,
    pub blend: Rgba8,
}

/// The dither-pair table for a palette under a given mixer.
///
/// Holds one entry per unordered index pair `(i, j)`, `i <= j`, identity pairs
/// included. Regenerated whenever palette, mixer, contrast, or grayscale
/// settings change; the table itself is immutable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PairTable {
    pairs: Vec<DitherPair>,
}

impl PairTable {
    pub fn generate(palette: &Palette, mixer: MixerKind) -> Self {
        let n = palette.len();
        let mut pairs = Vec::with_capacity(n * (n + 1) / 2);
        // Identity pairs first: a source pixel sitting exactly on a palette
        // color must resolve to that color, not to a two-color blend that
        // happens to average onto it.
        for i in 0..n {
            let (first, second) = mixer.mix(palette.get(i), palette.get(i));
            pairs.push(DitherPair {
                first,
                second,
                blend: first.average(second),
            });
        }
        for i in 0..n {
            for j in (i + 1)..n {
                let (first, second) = mixer.mix(palette.get(i), palette.get(j));
                pairs.push(DitherPair {
                    first,
                    second,
                    blend: first.average(second),
                });
            }
        }
        Self { pairs }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[DitherPair] {
        &self.pairs
    }

    /// The pair whose blend representative is nearest to `target`.
    ///
    /// Ties resolve to the lowest table index, keeping quantization
    /// deterministic across rebuilds.
    pub fn nearest(&self, target: Rgba8) -> DitherPair {
        let mut best = self.pairs[0];
        let mut best_d = u32::MAX;
        for &p in &self.pairs {
            let d = crate::palette::color_distance(p.blend, target);
            if d < best_d {
                best_d = d;
                best = p;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::PaletteKind;

    #[test]
    fn table_covers_all_unordered_pairs() {
        let pal = PaletteKind::Cga.table();
        let table = PairTable::generate(&pal, MixerKind::None);
        assert_eq!(table.len(), 16 * 17 / 2);
    }

    #[test]
    fn identity_pairs_survive_every_mixer() {
        let pal = PaletteKind::Cga.table();
        for mixer in [
            MixerKind::None,
            MixerKind::Mix10,
            MixerKind::Mix25,
            MixerKind::Mix50,
            MixerKind::Soft,
        ] {
            let table = PairTable::generate(&pal, mixer);
            for i in 0..pal.len() {
                let c = pal.get(i);
                let p = table.nearest(c);
                // A pixel exactly on a palette color always matches its own
                // identity pair, whose members are that color unchanged.
                assert_eq!(p.first, c, "mixer {mixer:?}, index {i}");
                assert_eq!(p.second, c, "mixer {mixer:?}, index {i}");
            }
        }
    }

    #[test]
    fn mix50_collapses_pair_to_midpoint() {
        let a = Rgba8::rgb(0, 0, 0);
        let b = Rgba8::rgb(255, 255, 255);
        let (ma, mb) = MixerKind::Mix50.mix(a, b);
        assert_eq!(ma, mb);
    }

    #[test]
    fn generation_is_deterministic() {
        let pal = PaletteKind::TrueCga.table();
        let t1 = PairTable::generate(&pal, MixerKind::Soft);
        let t2 = PairTable::generate(&pal, MixerKind::Soft);
        assert_eq!(t1, t2);
    }
}
