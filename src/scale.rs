use crate::raster::RasterImage;

/// Available scalers, usable both before dithering (density pre-multiply)
/// and after it (aspect correction / upscale).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScalerKind {
    /// Identity.
    None,
    Nearest2x,
    Nearest3x,
    Nearest5x5,
    Nearest5x6,
    /// EPX / AdvMAME2x edge-preserving 2x.
    Scale2x,
    /// AdvMAME3x edge-preserving 3x.
    Scale3x,
    /// Scale2x∘Scale3x footprint resampled to 5×6 for 1:1.2 pixel aspect.
    Scale5x6,
}

impl ScalerKind {
    pub fn apply(self, src: &RasterImage) -> RasterImage {
        match self {
            ScalerKind::None => src.clone(),
            ScalerKind::Nearest2x => nearest(src, 2, 2),
            ScalerKind::Nearest3x => nearest(src, 3, 3),
            ScalerKind::Nearest5x5 => nearest(src, 5, 5),
            ScalerKind::Nearest5x6 => nearest(src, 5, 6),
            ScalerKind::Scale2x => scale2x(src),
            ScalerKind::Scale3x => scale3x(src),
            ScalerKind::Scale5x6 => resample_width(&scale3x(&scale2x(src)), 5, 6),
        }
    }
}

fn nearest(src: &RasterImage, sx: u32, sy: u32) -> RasterImage {
    let w = src.width * sx;
    let h = src.height * sy;
    let mut out = RasterImage::filled(w, h, [0, 0, 0, 0]);
    for y in 0..h {
        for x in 0..w {
            out.put(x, y, src.get(x / sx, y / sy));
        }
    }
    out
}

/// Nearest-resample columns so the width shrinks by `num/den` (e.g. 6→5).
fn resample_width(src: &RasterImage, num: u32, den: u32) -> RasterImage {
    let w = src.width * num / den;
    let mut out = RasterImage::filled(w, src.height, [0, 0, 0, 0]);
    for y in 0..src.height {
        for x in 0..w {
            let sx = (x * den + den / 2) / num;
            out.put(x, y, src.get(sx.min(src.width - 1), y));
        }
    }
    out
}

#[inline]
fn clamped(src: &RasterImage, x: i64, y: i64) -> [u8; 4] {
    let cx = x.clamp(0, i64::from(src.width) - 1) as u32;
    let cy = y.clamp(0, i64::from(src.height) - 1) as u32;
    src.get(cx, cy)
}

fn scale2x(src: &RasterImage) -> RasterImage {
    let mut out = RasterImage::filled(src.width * 2, src.height * 2, [0, 0, 0, 0]);
    for y in 0..i64::from(src.height) {
        for x in 0..i64::from(src.width) {
            let p = clamped(src, x, y);
            let a = clamped(src, x, y - 1);
            let b = clamped(src, x + 1, y);
            let c = clamped(src, x - 1, y);
            let d = clamped(src, x, y + 1);

            let mut e0 = p;
            let mut e1 = p;
            let mut e2 = p;
            let mut e3 = p;
            if c == a && c != d && a != b {
                e0 = a;
            }
            if a == b && a != c && b != d {
                e1 = b;
            }
            if d == c && d != b && c != a {
                e2 = c;
            }
            if b == d && b != a && d != c {
                e3 = d;
            }

            let (ox, oy) = (x as u32 * 2, y as u32 * 2);
            out.put(ox, oy, e0);
            out.put(ox + 1, oy, e1);
            out.put(ox, oy + 1, e2);
            out.put(ox + 1, oy + 1, e3);
        }
    }
    out
}

fn scale3x(src: &RasterImage) -> RasterImage {
    let mut out = RasterImage::filled(src.width * 3, src.height * 3, [0, 0, 0, 0]);
    for y in 0..i64::from(src.height) {
        for x in 0..i64::from(src.width) {
            let a = clamped(src, x - 1, y - 1);
            let b = clamped(src, x, y - 1);
            let c = clamped(src, x + 1, y - 1);
            let d = clamped(src, x - 1, y);
            let e = clamped(src, x, y);
            let f = clamped(src, x + 1, y);
            let g = clamped(src, x - 1, y + 1);
            let h = clamped(src, x, y + 1);
            let i = clamped(src, x + 1, y + 1);

            let mut o = [e; 9];
            if d == b && d != h && b != f {
                o[0] = d;
            }
            if (d == b && d != h && b != f && e != c) || (b == f && b != d && f != h && e != a) {
                o[1] = b;
            }
            if b == f && b != d && f != h {
                o[2] = f;
            }
            if (h == d && h != f && d != b && e != a) || (d == b && d != h && b != f && e != g) {
                o[3] = d;
            }
            if (b == f && b != d && f != h && e != i) || (f == h && f != b && h != d && e != c) {
                o[5] = f;
            }
            if h == d && h != f && d != b {
                o[6] = d;
            }
            if (f == h && f != b && h != d && e != g) || (h == d && h != f && d != b && e != i) {
                o[7] = h;
            }
            if f == h && f != b && h != d {
                o[8] = f;
            }

            let (ox, oy) = (x as u32 * 3, y as u32 * 3);
            for (k, px) in o.iter().enumerate() {
                out.put(ox + (k as u32 % 3), oy + (k as u32 / 3), *px);
            }
        }
    }
    out
}
