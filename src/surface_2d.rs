use crate::{
    error::{RetropicError, RetropicResult},
    raster::RasterImage,
};

/// The plain bitmap presentation surface.
///
/// Owns a backing pixel store that always matches the most recently presented
/// raster. Whenever incoming dimensions differ from the previous update the
/// store is reallocated before any pixel data is copied, so a stale,
/// mismatched buffer is never written into.
#[derive(Debug, Default)]
pub struct BitmapSurface {
    width: u32,
    height: u32,
    data: Vec<u8>,
    reallocations: u64,
}

impl BitmapSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, raster: &RasterImage) -> RetropicResult<()> {
        let expected = (raster.width as usize)
            .checked_mul(raster.height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| RetropicError::evaluation("bitmap surface size overflow"))?;
        if raster.data.len() != expected {
            return Err(RetropicError::evaluation(
                "raster buffer does not match its dimensions",
            ));
        }

        if self.width != raster.width || self.height != raster.height {
            self.width = raster.width;
            self.height = raster.height;
            self.data = vec![0; expected];
            self.reallocations += 1;
        }
        self.data.copy_from_slice(&raster.data);
        Ok(())
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// The committed bitmap bytes.
    pub fn bitmap(&self) -> &[u8] {
        &self.data
    }

    /// How many times the backing store has been (re)allocated.
    pub fn reallocations(&self) -> u64 {
        self.reallocations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_update_allocates_the_backing_store() {
        let mut surface = BitmapSurface::new();
        let raster = RasterImage::filled(8, 4, [1, 2, 3, 255]);
        surface.update(&raster).unwrap();
        assert_eq!(surface.dimensions(), (8, 4));
        assert_eq!(surface.bitmap(), raster.data.as_slice());
        assert_eq!(surface.reallocations(), 1);
    }

    #[test]
    fn same_dimensions_reuse_the_buffer() {
        let mut surface = BitmapSurface::new();
        surface
            .update(&RasterImage::filled(8, 4, [1, 1, 1, 255]))
            .unwrap();
        surface
            .update(&RasterImage::filled(8, 4, [2, 2, 2, 255]))
            .unwrap();
        assert_eq!(surface.reallocations(), 1);
        assert_eq!(surface.bitmap()[0], 2);
    }

    #[test]
    fn dimension_change_reallocates_before_copying() {
        let mut surface = BitmapSurface::new();
        surface
            .update(&RasterImage::filled(8, 4, [1, 1, 1, 255]))
            .unwrap();
        let bigger = RasterImage::filled(16, 10, [7, 7, 7, 255]);
        surface.update(&bigger).unwrap();
        assert_eq!(surface.dimensions(), (16, 10));
        assert_eq!(surface.bitmap().len(), 16 * 10 * 4);
        assert_eq!(surface.reallocations(), 2);
    }

    #[test]
    fn mismatched_raster_is_rejected() {
        let mut surface = BitmapSurface::new();
        let broken = RasterImage {
            width: 4,
            height: 4,
            data: vec![0; 7],
        };
        assert!(surface.update(&broken).is_err());
    }
}
