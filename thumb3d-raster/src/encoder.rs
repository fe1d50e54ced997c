//! PNG serialization of rendered frames.
use std::io::{self, Cursor, Read};

use image::{codecs::png::PngEncoder, ColorType, ImageEncoder};

use crate::context::RenderTarget;
use crate::error::EncodeError;

/// Lazily encoded PNG byte stream for one rendered frame.
///
/// The frame is validated when the stream is created; compression happens on
/// the first read. The stream is single pass: once read to the end it yields
/// nothing more.
#[derive(Debug)]
pub struct PngStream {
    width: u32,
    height: u32,
    state: StreamState,
}

#[derive(Debug)]
enum StreamState {
    Pending(Vec<u8>),
    Encoded(Cursor<Vec<u8>>),
    Drained,
}

/// Wrap a render target into a PNG stream.
pub fn encode(target: RenderTarget) -> Result<PngStream, EncodeError> {
    let (width, height) = (target.width(), target.height());
    if width == 0 || height == 0 {
        return Err(EncodeError::Empty { width, height });
    }

    let pixels = target.into_pixels();
    let expected = width as usize * height as usize * 4;
    if pixels.len() != expected {
        return Err(EncodeError::BufferSize {
            width,
            height,
            expected,
            got: pixels.len(),
        });
    }

    Ok(PngStream {
        width,
        height,
        state: StreamState::Pending(pixels),
    })
}

fn encode_png(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>, EncodeError> {
    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(pixels, width, height, ColorType::Rgba8)?;
    Ok(png)
}

impl PngStream {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Read the whole stream into memory
    pub fn into_bytes(mut self) -> Result<Vec<u8>, EncodeError> {
        if let StreamState::Pending(pixels) = &self.state {
            return encode_png(pixels, self.width, self.height);
        }
        let mut png = Vec::new();
        self.read_to_end(&mut png)
            .map_err(|e| EncodeError::Png(image::ImageError::IoError(e)))?;
        Ok(png)
    }

    /// Read up to `size` bytes. An empty chunk marks the end of the stream.
    pub fn next_chunk(&mut self, size: usize) -> Result<Vec<u8>, EncodeError> {
        let mut chunk = Vec::with_capacity(size);
        self.by_ref()
            .take(size as u64)
            .read_to_end(&mut chunk)
            .map_err(|e| EncodeError::Png(image::ImageError::IoError(e)))?;
        Ok(chunk)
    }
}

impl Read for PngStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let StreamState::Pending(pixels) = &self.state {
            let png = encode_png(pixels, self.width, self.height)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            self.state = StreamState::Encoded(Cursor::new(png));
        }

        match &mut self.state {
            StreamState::Encoded(cursor) => {
                let n = cursor.read(buf)?;
                if n == 0 && !buf.is_empty() {
                    self.state = StreamState::Drained;
                }
                Ok(n)
            }
            _ => Ok(0),
        }
    }
}
