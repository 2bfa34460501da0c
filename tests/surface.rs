use retropic::{
    BitmapSurface, PixelAspect, PresentationMode, Presenter, RasterImage, replay,
};

#[test]
fn bitmap_presenter_tracks_raster_dimensions() {
    let mut presenter =
        Presenter::new(PresentationMode::Bitmap, PixelAspect::Square, (640, 480)).unwrap();
    assert_eq!(presenter.canvas_size(), (0, 0));

    presenter.update(&replay(&[], 0)).unwrap();
    assert_eq!(presenter.canvas_size(), (320, 190));

    presenter
        .update(&RasterImage::filled(64, 64, [0, 0, 0, 255]))
        .unwrap();
    assert_eq!(presenter.canvas_size(), (64, 64));
}

#[test]
fn bitmap_surface_reallocates_only_on_dimension_change() {
    let mut surface = BitmapSurface::new();
    surface
        .update(&RasterImage::filled(32, 16, [1, 1, 1, 255]))
        .unwrap();
    surface
        .update(&RasterImage::filled(32, 16, [2, 2, 2, 255]))
        .unwrap();
    surface
        .update(&RasterImage::filled(32, 16, [3, 3, 3, 255]))
        .unwrap();
    assert_eq!(surface.reallocations(), 1);

    surface
        .update(&RasterImage::filled(16, 16, [4, 4, 4, 255]))
        .unwrap();
    assert_eq!(surface.reallocations(), 2);
    assert_eq!(surface.bitmap().len(), 16 * 16 * 4);
}

#[test]
fn two_resizes_inside_the_window_render_once() {
    let mut presenter =
        Presenter::new(PresentationMode::Bitmap, PixelAspect::Square, (640, 480)).unwrap();
    presenter.update(&RasterImage::filled(8, 8, [0, 0, 0, 255])).unwrap();

    // Back-to-back notifications are well inside the 125ms window.
    assert!(presenter.resize(800, 600).unwrap());
    assert!(!presenter.resize(900, 700).unwrap());

    // The swallowed notification is still applied by an explicit flush.
    assert!(presenter.flush_resize().unwrap());
    assert!(!presenter.flush_resize().unwrap());
}

#[test]
fn same_mode_switch_keeps_the_surface() {
    let mut presenter =
        Presenter::new(PresentationMode::Bitmap, PixelAspect::Square, (640, 480)).unwrap();
    presenter.update(&RasterImage::filled(8, 8, [9, 9, 9, 255])).unwrap();
    presenter.set_mode(PresentationMode::Bitmap).unwrap();
    assert_eq!(presenter.canvas_size(), (8, 8));
}

#[cfg(not(feature = "gpu"))]
#[test]
fn crt_mode_is_unavailable_without_the_gpu_feature() {
    let err = Presenter::new(
        PresentationMode::Crt(retropic::CrtOptions::default()),
        PixelAspect::Square,
        (640, 480),
    )
    .map(|_| ())
    .unwrap_err();
    assert!(err.to_string().contains("gpu"));
}
