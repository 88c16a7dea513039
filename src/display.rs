use crate::error::Result;
use crate::slides::SavedSlide;

/// Receives every slide as soon as it is written to disk.
pub trait SlideSink: Send {
    fn show(&mut self, slide: &SavedSlide) -> Result<()>;
}

/// Headless sink used when no window is available.
#[derive(Debug, Default)]
pub struct LogSink;

impl SlideSink for LogSink {
    fn show(&mut self, slide: &SavedSlide) -> Result<()> {
        tracing::info!(index = slide.index, path = %slide.path.display(), "Latest slide");
        Ok(())
    }
}

/// Scales `width`x`height` to fit inside `max_width`x`max_height`,
/// keeping the aspect ratio. Smaller images are scaled up.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (0, 0);
    }
    let scale = f64::min(
        f64::from(max_width) / f64::from(width),
        f64::from(max_height) / f64::from(height),
    );
    (
        (f64::from(width) * scale) as u32,
        (f64::from(height) * scale) as u32,
    )
}
