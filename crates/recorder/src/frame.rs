use std::fmt;

/// Orientation correction applied after decode.
///
/// Values follow the numeric flip-method convention of the capture hardware:
/// 0 = none, 2 = rotate 180, 4 = horizontal mirror, 6 = vertical mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlipMethod {
    #[default]
    None,
    Rotate180,
    Horizontal,
    Vertical,
}

impl FlipMethod {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(FlipMethod::None),
            2 => Some(FlipMethod::Rotate180),
            4 => Some(FlipMethod::Horizontal),
            6 => Some(FlipMethod::Vertical),
            _ => None,
        }
    }
}

/// An owned RGB24 pixel buffer. Immutable once handed to a consumer.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub pixels: Vec<u8>,
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channels", &self.channels)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

impl Frame {
    pub const CHANNELS: u32 = 3;

    pub fn rgb(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), (width * height * Self::CHANNELS) as usize);
        Self {
            width,
            height,
            channels: Self::CHANNELS,
            pixels,
        }
    }

    /// Uniform-color frame, mostly useful for tests and benches.
    pub fn solid(width: u32, height: u32, value: u8) -> Self {
        Self::rgb(
            width,
            height,
            vec![value; (width * height * Self::CHANNELS) as usize],
        )
    }

    pub fn byte_len(&self) -> usize {
        (self.width * self.height * self.channels) as usize
    }

    fn row(&self, y: u32) -> &[u8] {
        let stride = (self.width * self.channels) as usize;
        let start = y as usize * stride;
        &self.pixels[start..start + stride]
    }

    fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let offset = ((y * self.width + x) * self.channels) as usize;
        &self.pixels[offset..offset + self.channels as usize]
    }

    /// Apply orientation correction, returning a new frame.
    pub fn flipped(&self, method: FlipMethod) -> Frame {
        match method {
            FlipMethod::None => self.clone(),
            FlipMethod::Horizontal => {
                let mut pixels = Vec::with_capacity(self.pixels.len());
                for y in 0..self.height {
                    for x in (0..self.width).rev() {
                        pixels.extend_from_slice(self.pixel(x, y));
                    }
                }
                Frame::rgb(self.width, self.height, pixels)
            }
            FlipMethod::Vertical => {
                let mut pixels = Vec::with_capacity(self.pixels.len());
                for y in (0..self.height).rev() {
                    pixels.extend_from_slice(self.row(y));
                }
                Frame::rgb(self.width, self.height, pixels)
            }
            FlipMethod::Rotate180 => {
                let mut pixels = Vec::with_capacity(self.pixels.len());
                for y in (0..self.height).rev() {
                    for x in (0..self.width).rev() {
                        pixels.extend_from_slice(self.pixel(x, y));
                    }
                }
                Frame::rgb(self.width, self.height, pixels)
            }
        }
    }

    /// Nearest-neighbor resize. Used to bring the capture resolution down to
    /// the configured output resolution before recording.
    pub fn resized_nearest(&self, width: u32, height: u32) -> Frame {
        if width == self.width && height == self.height {
            return self.clone();
        }
        let mut pixels = Vec::with_capacity((width * height * self.channels) as usize);
        for y in 0..height {
            let src_y = (y as u64 * self.height as u64 / height as u64) as u32;
            for x in 0..width {
                let src_x = (x as u64 * self.width as u64 / width as u64) as u32;
                pixels.extend_from_slice(self.pixel(src_x, src_y));
            }
        }
        Frame::rgb(width, height, pixels)
    }
}

/// Horizontal stack of the two camera frames for the preview display.
///
/// The right frame is resized to match the left when the dimensions differ,
/// so the result is always `2 * left.width` wide.
pub fn compose_side_by_side(left: &Frame, right: &Frame) -> Frame {
    let resized;
    let right = if right.width != left.width || right.height != left.height {
        resized = right.resized_nearest(left.width, left.height);
        &resized
    } else {
        right
    };

    let mut pixels = Vec::with_capacity(left.pixels.len() + right.pixels.len());
    for y in 0..left.height {
        pixels.extend_from_slice(left.row(y));
        pixels.extend_from_slice(right.row(y));
    }
    Frame::rgb(left.width * 2, left.height, pixels)
}
