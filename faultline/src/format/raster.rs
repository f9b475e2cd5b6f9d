use std::io::Cursor;

use bytes::Bytes;
use faultline_core::ErrorInfo;
use font8x8::{BASIC_FONTS, LATIN_FONTS, UnicodeFonts};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use crate::format::{FormatError, Formatter, unsupported};
use crate::headers::{IMAGE_GIF, IMAGE_JPEG, IMAGE_PNG, IMAGE_WEBP};

const CANVAS_SIZE: u32 = 200;
const MARGIN: u32 = 10;
/// Characters per message line.
const LINE_LENGTH: usize = (CANVAS_SIZE / 10) as usize;
const FIRST_LINE_Y: u32 = 28;
const LINE_HEIGHT: usize = 18;
const GLYPH_SIZE: u32 = 8;
const GLYPH_ADVANCE: usize = 9;

const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);
const FOREGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Renders errors as a 200×200 raster image.
///
/// The first line shows the type and status code; the message follows,
/// wrapped every 20 characters, in white monospace text on a black
/// background. Text that does not fit on the canvas is clipped. The
/// encoding (GIF, JPEG, PNG or WebP) follows the negotiated content type.
///
/// # Examples
///
/// ```
/// use faultline::format::{Formatter, ImageFormatter};
/// use faultline::{ErrorInfo, StatusCode};
///
/// let error = ErrorInfo::from_status(StatusCode::NOT_FOUND);
/// let body = ImageFormatter::new().format(&error, "image/png").unwrap();
/// assert!(body.starts_with(b"\x89PNG"));
/// ```
#[derive(Debug, Default, Copy, Clone)]
pub struct ImageFormatter;

impl ImageFormatter {
    /// Creates a new image formatter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Formatter for ImageFormatter {
    fn content_types(&self) -> &[&'static str] {
        &[IMAGE_GIF, IMAGE_JPEG, IMAGE_PNG, IMAGE_WEBP]
    }

    fn format(&self, error: &ErrorInfo, content_type: &str) -> Result<Bytes, FormatError> {
        let format = image_format(content_type).ok_or_else(|| unsupported(content_type))?;

        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(canvas(error)).write_to(&mut buffer, format)?;

        Ok(Bytes::from(buffer.into_inner()))
    }
}

fn image_format(content_type: &str) -> Option<ImageFormat> {
    match content_type {
        IMAGE_GIF => Some(ImageFormat::Gif),
        IMAGE_JPEG => Some(ImageFormat::Jpeg),
        IMAGE_PNG => Some(ImageFormat::Png),
        IMAGE_WEBP => Some(ImageFormat::WebP),
        _ => None,
    }
}

fn canvas(error: &ErrorInfo) -> RgbImage {
    let mut image = RgbImage::from_pixel(CANVAS_SIZE, CANVAS_SIZE, BACKGROUND);

    let title: Vec<char> = format!("{} {}", error.kind(), error.status_code().as_u16())
        .chars()
        .collect();
    draw_text(&mut image, MARGIN, &title);

    let message: Vec<char> = error.message().chars().collect();
    let rows = (FIRST_LINE_Y..CANVAS_SIZE).step_by(LINE_HEIGHT);
    for (line, y) in message.chunks(LINE_LENGTH).zip(rows) {
        draw_text(&mut image, y, line);
    }

    image
}

fn draw_text(image: &mut RgbImage, y: u32, text: &[char]) {
    let columns = (MARGIN..CANVAS_SIZE).step_by(GLYPH_ADVANCE);
    for (x, &character) in columns.zip(text) {
        for (row_y, row) in (y..).zip(glyph(character)) {
            for bit in 0..GLYPH_SIZE {
                let (pixel_x, pixel_y) = (x + bit, row_y);
                if row & (1 << bit) != 0 && pixel_x < CANVAS_SIZE && pixel_y < CANVAS_SIZE {
                    image.put_pixel(pixel_x, pixel_y, FOREGROUND);
                }
            }
        }
    }
}

fn glyph(character: char) -> [u8; 8] {
    BASIC_FONTS
        .get(character)
        .or_else(|| LATIN_FONTS.get(character))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or_default()
}
