use crate::frame::Frame;
use anyhow::{Context, Result, ensure};

/// Trait for decoding raw camera buffers into owned RGB frames.
pub trait FrameDecoder: Send {
    fn decode(&mut self, raw: &[u8], width: u32, height: u32) -> Result<Frame>;
}

/// YUYV (YUV 4:2:2) decoder.
///
/// YUYV packs 2 pixels in 4 bytes: [Y0, U, Y1, V]
pub struct YuyvDecoder;

impl FrameDecoder for YuyvDecoder {
    fn decode(&mut self, raw: &[u8], width: u32, height: u32) -> Result<Frame> {
        let bytes_per_row = (width * 2) as usize;
        ensure!(
            raw.len() >= bytes_per_row * height as usize,
            "YUYV buffer too short: {} bytes for {}x{}",
            raw.len(),
            width,
            height
        );

        let stride = raw.len() / height as usize;
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);

        for row in 0..height as usize {
            let row_start = row * stride;
            let row_data = &raw[row_start..row_start + bytes_per_row];

            for chunk in row_data.chunks_exact(4) {
                let y0 = chunk[0] as i32;
                let u = chunk[1] as i32 - 128;
                let y1 = chunk[2] as i32;
                let v = chunk[3] as i32 - 128;

                // BT.601 fixed-point coefficients (8-bit fraction)
                // R = Y + 1.402*V  -> Y + (359*V >> 8)
                // G = Y - 0.344*U - 0.714*V -> Y - ((88*U + 183*V) >> 8)
                // B = Y + 1.772*U -> Y + (454*U >> 8)
                let rv = (359 * v) >> 8;
                let gu = (88 * u + 183 * v) >> 8;
                let bu = (454 * u) >> 8;

                pixels.push((y0 + rv).clamp(0, 255) as u8);
                pixels.push((y0 - gu).clamp(0, 255) as u8);
                pixels.push((y0 + bu).clamp(0, 255) as u8);

                pixels.push((y1 + rv).clamp(0, 255) as u8);
                pixels.push((y1 - gu).clamp(0, 255) as u8);
                pixels.push((y1 + bu).clamp(0, 255) as u8);
            }
        }

        Ok(Frame::rgb(width, height, pixels))
    }
}

/// MJPEG decoder using turbojpeg (libjpeg-turbo).
pub struct MjpegDecoder {
    decompressor: turbojpeg::Decompressor,
}

impl MjpegDecoder {
    pub fn new() -> Result<Self> {
        Ok(Self {
            decompressor: turbojpeg::Decompressor::new()
                .context("failed to create turbojpeg decompressor")?,
        })
    }
}

impl FrameDecoder for MjpegDecoder {
    fn decode(&mut self, raw: &[u8], _width: u32, _height: u32) -> Result<Frame> {
        let header = self.decompressor.read_header(raw)?;
        let width = header.width;
        let height = header.height;

        let mut pixels = vec![0u8; width * height * 3];
        let output = turbojpeg::Image {
            pixels: &mut pixels[..],
            width,
            pitch: width * 3,
            height,
            format: turbojpeg::PixelFormat::RGB,
        };
        self.decompressor.decompress(raw, output)?;

        Ok(Frame::rgb(width as u32, height as u32, pixels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_decoder_neutral_gray() {
        let mut decoder = YuyvDecoder;
        // 2x1 image: 2 pixels = 4 bytes YUYV
        // Y=128 (gray), U=128, V=128 (neutral chroma)
        let yuyv = vec![128, 128, 128, 128];
        let frame = decoder.decode(&yuyv, 2, 1).unwrap();
        assert_eq!(frame.width, 2);
        assert_eq!(frame.height, 1);
        assert_eq!(frame.pixels.len(), 6);
        // Neutral chroma decodes to gray within rounding error
        for byte in &frame.pixels {
            assert!(byte.abs_diff(128) <= 2, "expected gray, got {byte}");
        }
    }

    #[test]
    fn test_yuyv_decoder_short_buffer() {
        let mut decoder = YuyvDecoder;
        let yuyv = vec![0u8; 4];
        assert!(decoder.decode(&yuyv, 640, 480).is_err());
    }

    #[test]
    fn test_mjpeg_decoder_invalid_data() {
        let mut decoder = MjpegDecoder::new().unwrap();
        let invalid = vec![0, 1, 2, 3];
        assert!(decoder.decode(&invalid, 640, 480).is_err());
    }

    #[test]
    fn test_mjpeg_decoder_round_trip() {
        use image::{ImageEncoder, codecs::jpeg::JpegEncoder};

        let (width, height) = (32u32, 16u32);
        let rgb = vec![200u8; (width * height * 3) as usize];
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, 90)
            .write_image(&rgb, width, height, image::ExtendedColorType::Rgb8)
            .unwrap();

        let mut decoder = MjpegDecoder::new().unwrap();
        let frame = decoder.decode(&jpeg, width, height).unwrap();
        assert_eq!(frame.width, width);
        assert_eq!(frame.height, height);
        assert_eq!(frame.pixels.len(), (width * height * 3) as usize);
    }
}
