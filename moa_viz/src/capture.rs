use std::path::Path;
use plotters::coord::Shift;
use plotters::prelude::*;
use crate::error::VizError;

/// Default width of captured frame in pixels.
pub const FRAME_WIDTH: u32 = 500;
/// Default height of captured frame in pixels.
pub const FRAME_HEIGHT: u32 = 700;

/// Environment able to draw its current state.
pub trait Render{
    fn render<DB: DrawingBackend>(&self, area: &DrawingArea<DB, Shift>) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>>;
}

/// Saves image of environment state to file.
pub trait FrameCapture<E>{
    fn capture(&mut self, env: &E, path: &Path) -> Result<(), VizError>;

    /// When `false` collector does not create image directory and does not call [`capture`](FrameCapture::capture).
    fn is_enabled(&self) -> bool{
        true
    }
}

/// Renders environment to PNG of fixed size.
#[derive(Debug, Copy, Clone)]
pub struct BitmapCapture{
    width: u32,
    height: u32,
}

impl BitmapCapture{
    pub fn new(width: u32, height: u32) -> Self{
        Self{width, height}
    }
}

impl Default for BitmapCapture{
    fn default() -> Self {
        Self::new(FRAME_WIDTH, FRAME_HEIGHT)
    }
}

impl<E: Render> FrameCapture<E> for BitmapCapture{
    fn capture(&mut self, env: &E, path: &Path) -> Result<(), VizError> {
        let error = |e: &dyn std::fmt::Display| VizError::Capture {
            path: path.display().to_string(),
            explanation: e.to_string(),
        };
        let root = BitMapBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| error(&e))?;
        env.render(&root).map_err(|e| error(&e))?;
        root.present().map_err(|e| error(&e))?;
        log::trace!("Captured frame {}", path.display());
        Ok(())
    }
}

/// Capture that does nothing, used when images are not wanted.
#[derive(Debug, Copy, Clone, Default)]
pub struct NoCapture;

impl<E> FrameCapture<E> for NoCapture{
    fn capture(&mut self, _env: &E, _path: &Path) -> Result<(), VizError> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}
