use crate::{
    error::{RetropicError, RetropicResult},
    raster::RasterImage,
};

/// Blur selection. `None` is the identity transform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlurKind {
    None,
    /// Uniform box kernel, both axes.
    Box,
    /// Uniform box kernel, horizontal only.
    HBox,
    /// Gaussian kernel, both axes.
    Gaussian,
    /// Gaussian kernel, horizontal only.
    HGaussian,
}

impl BlurKind {
    /// Apply the blur with `amount` in `[1, 10]` (radius for box kernels,
    /// sigma for gaussian kernels).
    pub fn apply(self, src: &RasterImage, amount: f32) -> RetropicResult<RasterImage> {
        if self == BlurKind::None {
            return Ok(src.clone());
        }
        if !amount.is_finite() || !(1.0..=10.0).contains(&amount) {
            return Err(RetropicError::validation(
                "blur amount must be in 1.0..=10.0",
            ));
        }

        let kernel = match self {
            // Handled above; kept for exhaustiveness.
            BlurKind::None => return Ok(src.clone()),
            BlurKind::Box | BlurKind::HBox => box_kernel_q16(amount.round() as u32),
            BlurKind::Gaussian | BlurKind::HGaussian => {
                gaussian_kernel_q16((2.0 * amount).ceil() as u32, amount)?
            }
        };

        let horizontal_only = matches!(self, BlurKind::HBox | BlurKind::HGaussian);
        let mut tmp = vec![0u8; src.data.len()];
        horizontal_pass(&src.data, &mut tmp, src.width, src.height, &kernel);
        if horizontal_only {
            return RasterImage::from_vec(src.width, src.height, tmp);
        }
        let mut out = vec![0u8; src.data.len()];
        vertical_pass(&tmp, &mut out, src.width, src.height, &kernel);
        RasterImage::from_vec(src.width, src.height, out)
    }
}

fn box_kernel_q16(radius: u32) -> Vec<u32> {
    let taps = 2 * radius as usize + 1;
    let q = (65536 / taps as u64) as u32;
    let mut weights = vec![q; taps];
    // Push the rounding remainder into the center tap so weights sum to 1.0.
    let total: u64 = weights.iter().map(|&w| u64::from(w)).sum();
    let mid = taps / 2;
    weights[mid] = (u64::from(weights[mid]) + 65536 - total) as u32;
    weights
}

fn gaussian_kernel_q16(radius: u32, sigma: f32) -> RetropicResult<Vec<u32>> {
    if radius == 0 {
        return Ok(vec![1 << 16]);
    }
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(RetropicError::validation("blur sigma must be > 0"));
    }

    let r = radius as i32;
    let mut weights_f = Vec::<f64>::with_capacity((2 * r + 1) as usize);
    let mut sum = 0.0f64;
    let sigma = f64::from(sigma);
    let denom = 2.0 * sigma * sigma;
    for i in -r..=r {
        let x = f64::from(i);
        let w = (-x * x / denom).exp();
        weights_f.push(w);
        sum += w;
    }
    if sum <= 0.0 {
        return Err(RetropicError::evaluation("gaussian kernel sum is zero"));
    }

    let mut weights = Vec::<u32>::with_capacity(weights_f.len());
    let mut acc: i64 = 0;
    for &wf in &weights_f {
        let q = ((wf / sum) * 65536.0).round() as i64;
        let q = q.clamp(0, 65536);
        weights.push(q as u32);
        acc += q;
    }
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        let new_mid = (i64::from(weights[mid]) + delta).clamp(0, 65536);
        weights[mid] = new_mid as u32;
    }

    Ok(weights)
}

fn horizontal_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    for y in 0..height as i32 {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let dx = ki as i32 - radius;
                let sx = (x + dx).clamp(0, w - 1);
                let idx = ((y * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn vertical_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let h = height as i32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let dy = ki as i32 - radius;
                let sy = (y + dy).clamp(0, h - 1);
                let idx = ((sy * w + x) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    let v = (acc + 32768) >> 16;
    v.min(255) as u8
}
