//! Raster image canvas
//!
//! Images carry no text layer, so the only searchable fragments are the OCR
//! fields supplied with the request. Fills are painted directly into the
//! pixel buffer and the image is re-encoded in its original format.

use crate::config::RenderConfig;
use crate::error::Result;
use crate::locate::{RedactionCanvas, TextFragment};
use hanzo_pii::{BoundingBox, DocumentField};
use image::{DynamicImage, GenericImage, GenericImageView, ImageFormat, Rgba};
use std::io::Cursor;

/// A decoded single-page image opened for redaction
pub struct RasterCanvas {
    image: DynamicImage,
    format: ImageFormat,
    fields: Vec<TextFragment>,
    color: Rgba<u8>,
}

impl RasterCanvas {
    pub fn open(bytes: &[u8], config: &RenderConfig) -> Result<Self> {
        let format = image::guess_format(bytes)?;
        let image = image::load_from_memory_with_format(bytes, format)?;
        let [r, g, b] = config.fill_color;
        tracing::debug!(?format, width = image.width(), height = image.height(), "image opened");
        Ok(Self {
            image,
            format,
            fields: Vec::new(),
            color: Rgba([r, g, b, 255]),
        })
    }

    /// OCR fields for page 0 become the searchable fragments
    pub fn with_fields(mut self, fields: &[DocumentField]) -> Self {
        self.fields.extend(
            fields
                .iter()
                .filter(|field| field.page_index == 0)
                .map(|field| TextFragment::new(field.text.clone(), field.bbox)),
        );
        self
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Re-encode in the source format
    pub fn finish(self) -> Result<Vec<u8>> {
        let image = match self.format {
            // JPEG has no alpha channel
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(self.image.to_rgb8()),
            _ => self.image,
        };
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), self.format)?;
        Ok(bytes)
    }
}

impl RedactionCanvas for RasterCanvas {
    fn page_count(&self) -> usize {
        1
    }

    fn fragments(&self, page_index: usize) -> Vec<TextFragment> {
        if page_index == 0 {
            self.fields.clone()
        } else {
            Vec::new()
        }
    }

    fn fill(&mut self, page_index: usize, region: BoundingBox) {
        if page_index != 0 {
            return;
        }
        let (width, height) = self.image.dimensions();
        let clamped = region.clamp(width as f32, height as f32);
        // Round outward so partial pixels are covered
        let (x1, y1) = (clamped.x1.floor() as u32, clamped.y1.floor() as u32);
        let (x2, y2) = (
            (clamped.x2.ceil() as u32).min(width),
            (clamped.y2.ceil() as u32).min(height),
        );
        if x1 >= x2 || y1 >= y2 {
            tracing::debug!(?region, "region outside image");
            return;
        }
        for y in y1..y2 {
            for x in x1..x2 {
                self.image.put_pixel(x, y, self.color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn white_png(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255])));
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        bytes
    }

    #[test]
    fn test_fill_paints_and_reencodes() {
        let mut canvas = RasterCanvas::open(&white_png(100, 50), &RenderConfig::default()).unwrap();
        assert_eq!(canvas.format(), ImageFormat::Png);
        assert_eq!(canvas.dimensions(), (100, 50));

        canvas.fill(0, BoundingBox::new(10.2, 10.0, 20.5, 20.0));
        let redacted = image::load_from_memory(&canvas.finish().unwrap()).unwrap();
        assert_eq!(redacted.get_pixel(10, 10), Rgba([0, 0, 0, 255]));
        assert_eq!(redacted.get_pixel(20, 19), Rgba([0, 0, 0, 255]));
        assert_eq!(redacted.get_pixel(21, 10), Rgba([255, 255, 255, 255]));
        assert_eq!(redacted.get_pixel(15, 20), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_fill_clamps_to_image() {
        let mut canvas = RasterCanvas::open(&white_png(20, 20), &RenderConfig::default()).unwrap();
        canvas.fill(0, BoundingBox::new(15.0, -5.0, 40.0, 5.0));
        canvas.fill(0, BoundingBox::new(50.0, 50.0, 60.0, 60.0));
        canvas.fill(1, BoundingBox::new(0.0, 0.0, 20.0, 20.0));
        let redacted = image::load_from_memory(&canvas.finish().unwrap()).unwrap();
        assert_eq!(redacted.get_pixel(19, 0), Rgba([0, 0, 0, 255]));
        assert_eq!(redacted.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_fragments_come_from_page_zero_fields() {
        let canvas = RasterCanvas::open(&white_png(10, 10), &RenderConfig::default())
            .unwrap()
            .with_fields(&[
                DocumentField::new(0, "홍길동", BoundingBox::new(0.0, 0.0, 5.0, 5.0)),
                DocumentField::new(1, "other page", BoundingBox::default()),
            ]);
        assert_eq!(canvas.page_count(), 1);
        assert_eq!(canvas.fragments(0).len(), 1);
        assert!(canvas.fragments(1).is_empty());
    }

    #[test]
    fn test_fill_color_from_config() {
        let config = RenderConfig {
            fill_color: [255, 0, 0],
            ..Default::default()
        };
        let mut canvas = RasterCanvas::open(&white_png(4, 4), &config).unwrap();
        canvas.fill(0, BoundingBox::new(0.0, 0.0, 4.0, 4.0));
        let redacted = image::load_from_memory(&canvas.finish().unwrap()).unwrap();
        assert_eq!(redacted.get_pixel(3, 3), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_not_an_image() {
        assert!(RasterCanvas::open(b"plain text", &RenderConfig::default()).is_err());
    }
}
