/*!
Screenshot helpers (feature `screenshot`).

Converts any matrix view (screen, background, window, sprites, patterns) from
shade indices to RGBA and optionally writes it out as PNG. Shade values outside
0..=3 are a VM bug; they render as opaque red so they stand out.
*/

use std::path::Path;

use image::RgbaImage;
use thiserror::Error;

use crate::memory::MatrixView;

pub const INVALID_SHADE: [u8; 4] = [0xFF, 0x00, 0x00, 0xFF];

#[derive(Debug, Error)]
pub enum ScreenshotError {
    #[error("pixel buffer does not match {width}x{height}")]
    BufferSize { width: u32, height: u32 },
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// RGBA colors for the four shade indices, lightest first.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Palette(pub [[u8; 4]; 4]);

impl Palette {
    pub const GREEN: Palette = Palette([
        [0xE0, 0xF8, 0xD0, 0xFF],
        [0x88, 0xC0, 0x70, 0xFF],
        [0x34, 0x68, 0x56, 0xFF],
        [0x08, 0x18, 0x20, 0xFF],
    ]);

    pub const GRAY: Palette = Palette([
        [0xFF, 0xFF, 0xFF, 0xFF],
        [0xAA, 0xAA, 0xAA, 0xFF],
        [0x55, 0x55, 0x55, 0xFF],
        [0x00, 0x00, 0x00, 0xFF],
    ]);

    #[inline]
    pub fn color(&self, shade: u8) -> [u8; 4] {
        self.0.get(shade as usize).copied().unwrap_or(INVALID_SHADE)
    }
}

impl Default for Palette {
    fn default() -> Self {
        Palette::GREEN
    }
}

/// Row-major RGBA bytes, 4 per pixel.
pub fn to_rgba(view: &MatrixView, palette: &Palette) -> Vec<u8> {
    view.with(|shades| {
        shades
            .iter()
            .flat_map(|shade| palette.color(*shade))
            .collect()
    })
}

pub fn to_image(view: &MatrixView, palette: &Palette) -> Result<RgbaImage, ScreenshotError> {
    let width = view.width() as u32;
    let height = view.height() as u32;
    RgbaImage::from_raw(width, height, to_rgba(view, palette))
        .ok_or(ScreenshotError::BufferSize { width, height })
}

pub fn save_png(
    view: &MatrixView,
    palette: &Palette,
    path: impl AsRef<Path>,
) -> Result<(), ScreenshotError> {
    let image = to_image(view, palette)?;
    image.save_with_format(path.as_ref(), image::ImageFormat::Png)?;
    tracing::debug!(path = %path.as_ref().display(), "screenshot saved");
    Ok(())
}
