use std::time::{Duration, Instant};

use crate::{
    error::{RetropicError, RetropicResult},
    raster::RasterImage,
    surface_2d::BitmapSurface,
};

#[cfg(feature = "gpu")]
use crate::surface_crt::CrtSurface;

/// Pixel aspect ratio of the emulated display hardware.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PixelAspect {
    /// 1:1 square pixels.
    Square,
    /// 1:1.2 tall pixels, as on the original 4:3 monitors.
    Tall,
}

impl PixelAspect {
    pub fn factor(self) -> f64 {
        match self {
            PixelAspect::Square => 1.0,
            PixelAspect::Tall => 1.2,
        }
    }

    /// Display aspect (width over height) for a raster of the given size
    /// shown with this pixel shape.
    pub fn display_aspect(self, width: u32, height: u32) -> f64 {
        if height == 0 {
            return 0.0;
        }
        f64::from(width) / (f64::from(height) * self.factor())
    }
}

/// Per-frame options of the CRT surface, passed by value into every update.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CrtOptions {
    /// Horizontal barrel-distortion coefficient.
    pub fx: f32,
    /// Vertical barrel-distortion coefficient.
    pub fy: f32,
    /// Distortion scale factor.
    pub scale: f32,
    /// Horizontal box-blur radius in source texels, [0, 16].
    pub h_blur: f32,
    /// Film-grain amount.
    pub grain: f32,
    /// Vignette strength.
    pub vignette: f32,
    /// Scanline attenuation toggle.
    pub scanlines: bool,
}

impl Default for CrtOptions {
    fn default() -> Self {
        Self {
            fx: -0.025,
            fy: -0.035,
            scale: 0.995,
            h_blur: 2.0,
            grain: 0.125,
            vignette: 1.0,
            scanlines: true,
        }
    }
}

/// Tagged choice of presentation backend.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PresentationMode {
    /// Plain bitmap blit, no extra options.
    Bitmap,
    /// CRT emulation with its per-update options.
    Crt(CrtOptions),
}

/// Debounce window for resize notifications.
pub const RESIZE_DEBOUNCE: Duration = Duration::from_millis(125);

/// Leading-edge debouncer: the first notification in a window passes, later
/// ones are swallowed and left pending for an explicit flush.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    last: Option<Instant>,
    pending: bool,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last: None,
            pending: false,
        }
    }

    pub fn allow(&mut self) -> bool {
        self.allow_at(Instant::now())
    }

    pub fn allow_at(&mut self, now: Instant) -> bool {
        match self.last {
            Some(t) if now.duration_since(t) < self.window => {
                self.pending = true;
                false
            }
            _ => {
                self.last = Some(now);
                self.pending = false;
                true
            }
        }
    }

    /// Take the pending flag, clearing it.
    pub fn take_pending(&mut self) -> bool {
        std::mem::replace(&mut self.pending, false)
    }
}

enum Backend {
    Bitmap(BitmapSurface),
    #[cfg(feature = "gpu")]
    Crt(Box<CrtSurface>),
}

/// Owns the current presentation backend.
///
/// The backend handle is explicitly typed and swapped atomically: switching
/// modes drops the previous surface (releasing its GPU and buffer resources)
/// before the replacement is constructed.
pub struct Presenter {
    backend: Backend,
    mode: PresentationMode,
    aspect: PixelAspect,
    display: (u32, u32),
    pending_display: (u32, u32),
    canvas: (u32, u32),
    debouncer: Debouncer,
    last_frame: Option<RasterImage>,
}

impl Presenter {
    /// Create a presenter with a logical display box (the space the canvas
    /// occupies, in pixels).
    pub fn new(
        mode: PresentationMode,
        aspect: PixelAspect,
        display: (u32, u32),
    ) -> RetropicResult<Self> {
        let backend = make_backend(mode)?;
        Ok(Self {
            backend,
            mode,
            aspect,
            display,
            pending_display: display,
            canvas: (0, 0),
            debouncer: Debouncer::new(RESIZE_DEBOUNCE),
            last_frame: None,
        })
    }

    pub fn mode(&self) -> PresentationMode {
        self.mode
    }

    pub fn aspect(&self) -> PixelAspect {
        self.aspect
    }

    /// Backing-store dimensions after the most recent present.
    pub fn canvas_size(&self) -> (u32, u32) {
        self.canvas
    }

    /// Switch presentation mode.
    ///
    /// Same-kind switches only adopt the new options; a kind change tears the
    /// old backend down first, then allocates the replacement and re-presents
    /// the last frame on it.
    pub fn set_mode(&mut self, mode: PresentationMode) -> RetropicResult<()> {
        let same_kind = matches!(
            (&self.mode, &mode),
            (PresentationMode::Bitmap, PresentationMode::Bitmap)
                | (PresentationMode::Crt(_), PresentationMode::Crt(_))
        );
        if !same_kind {
            // Drop the old surface before allocating the new one.
            self.backend = Backend::Bitmap(BitmapSurface::new());
            self.backend = make_backend(mode)?;
            self.canvas = (0, 0);
        }
        self.mode = mode;
        self.present()
    }

    pub fn set_aspect(&mut self, aspect: PixelAspect) -> RetropicResult<()> {
        self.aspect = aspect;
        self.present()
    }

    /// Present a fresh frame. The presenter keeps its own copy so debounced
    /// resizes can re-render without new pixel data.
    pub fn update(&mut self, raster: &RasterImage) -> RetropicResult<()> {
        self.last_frame = Some(raster.clone());
        self.present()
    }

    /// Notify of a display-box change. Returns whether a re-render happened;
    /// notifications within the debounce window are coalesced.
    pub fn resize(&mut self, width: u32, height: u32) -> RetropicResult<bool> {
        self.pending_display = (width, height);
        if !self.debouncer.allow() {
            return Ok(false);
        }
        self.display = (width, height);
        self.present()?;
        Ok(true)
    }

    /// Apply a resize that was swallowed by the debounce window, if any.
    pub fn flush_resize(&mut self) -> RetropicResult<bool> {
        if !self.debouncer.take_pending() {
            return Ok(false);
        }
        self.display = self.pending_display;
        self.present()?;
        Ok(true)
    }

    fn present(&mut self) -> RetropicResult<()> {
        let Some(raster) = self.last_frame.as_ref() else {
            return Ok(());
        };
        match &mut self.backend {
            Backend::Bitmap(surface) => {
                surface.update(raster)?;
                self.canvas = surface.dimensions();
            }
            #[cfg(feature = "gpu")]
            Backend::Crt(surface) => {
                let PresentationMode::Crt(options) = self.mode else {
                    return Err(RetropicError::evaluation(
                        "crt backend active without crt options",
                    ));
                };
                let aspect = self.aspect.display_aspect(raster.width, raster.height);
                let target = fit_box(self.display, aspect);
                surface.update(raster, options, target)?;
                self.canvas = target;
            }
        }
        Ok(())
    }
}

fn make_backend(mode: PresentationMode) -> RetropicResult<Backend> {
    match mode {
        PresentationMode::Bitmap => Ok(Backend::Bitmap(BitmapSurface::new())),
        #[cfg(feature = "gpu")]
        PresentationMode::Crt(_) => Ok(Backend::Crt(Box::new(CrtSurface::new()?))),
        #[cfg(not(feature = "gpu"))]
        PresentationMode::Crt(_) => Err(RetropicError::evaluation(
            "crt presentation requires the `gpu` feature",
        )),
    }
}

/// Largest box of the given aspect that fits the display box: the constrained
/// dimension fills the box and the other one grows to match the aspect.
pub(crate) fn fit_box(display: (u32, u32), aspect: f64) -> (u32, u32) {
    let (bw, bh) = display;
    if bw == 0 || bh == 0 || aspect <= 0.0 {
        return (0, 0);
    }
    let box_aspect = f64::from(bw) / f64::from(bh);
    let (w, h) = if box_aspect > aspect {
        ((f64::from(bh) * aspect).round() as u32, bh)
    } else {
        (bw, (f64::from(bw) / aspect).round() as u32)
    };
    (w.max(1), h.max(1))
}
