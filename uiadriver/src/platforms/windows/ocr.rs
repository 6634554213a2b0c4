//! Screen text recognition through `Windows.Media.Ocr`

use crate::ocr::{OcrLine, OcrWord, TextRecognizer};
use crate::types::{Rect, ScreenshotResult};
use crate::AutomationError;
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgba};
use tracing::debug;
use windows::Graphics::Imaging::{BitmapAlphaMode, BitmapPixelFormat, SoftwareBitmap};
use windows::Media::Ocr::OcrEngine;
use windows::Storage::Streams::DataWriter;

#[derive(Debug)]
pub struct WindowsOcr {
    max_dimension: u32,
}

impl WindowsOcr {
    /// Fails when no OCR language pack is installed for the user.
    pub fn new() -> Result<Self, AutomationError> {
        OcrEngine::TryCreateFromUserProfileLanguages()?;
        let max_dimension = OcrEngine::MaxImageDimension()?;
        Ok(Self { max_dimension })
    }

    fn bitmap(width: u32, height: u32, rgba: &[u8]) -> Result<SoftwareBitmap, AutomationError> {
        let mut bgra = rgba.to_vec();
        for pixel in bgra.chunks_exact_mut(4) {
            pixel.swap(0, 2);
        }
        let writer = DataWriter::new()?;
        writer.WriteBytes(&bgra)?;
        let buffer = writer.DetachBuffer()?;
        Ok(SoftwareBitmap::CreateCopyWithAlphaFromBuffer(
            &buffer,
            BitmapPixelFormat::Bgra8,
            width as i32,
            height as i32,
            BitmapAlphaMode::Premultiplied,
        )?)
    }
}

impl TextRecognizer for WindowsOcr {
    fn recognize(&self, screenshot: &ScreenshotResult) -> Result<Vec<OcrLine>, AutomationError> {
        let longest = screenshot.width.max(screenshot.height);
        let ratio = if longest > self.max_dimension {
            self.max_dimension as f64 / longest as f64
        } else {
            1.0
        };

        let bitmap = if ratio < 1.0 {
            let source: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_raw(
                screenshot.width,
                screenshot.height,
                screenshot.image_data.clone(),
            )
            .ok_or_else(|| {
                AutomationError::InvalidArgument("invalid screenshot buffer".to_string())
            })?;
            let width = (screenshot.width as f64 * ratio) as u32;
            let height = (screenshot.height as f64 * ratio) as u32;
            debug!(width, height, "downscaling screenshot for OCR");
            let resized = imageops::resize(&source, width, height, FilterType::Triangle);
            Self::bitmap(width, height, resized.as_raw())?
        } else {
            Self::bitmap(screenshot.width, screenshot.height, &screenshot.image_data)?
        };

        let engine = OcrEngine::TryCreateFromUserProfileLanguages()?;
        let result = engine.RecognizeAsync(&bitmap)?.get()?;

        let unscale = |v: f32| (v as f64 / ratio).round() as i32;
        let mut lines = Vec::new();
        for line in result.Lines()? {
            let mut words = Vec::new();
            for word in line.Words()? {
                let rect = word.BoundingRect()?;
                words.push(OcrWord {
                    text: word.Text()?.to_string(),
                    bounds: Rect::new(
                        unscale(rect.X),
                        unscale(rect.Y),
                        unscale(rect.X + rect.Width),
                        unscale(rect.Y + rect.Height),
                    ),
                });
            }
            lines.push(OcrLine { words });
        }
        debug!(lines = lines.len(), "OCR complete");
        Ok(lines)
    }
}
