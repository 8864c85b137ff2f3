//! Raw packed RGB images.
//!
//! Layout: byte 0 is the width, byte 1 the height, followed by
//! `width * height` RGB triples in row-major order. Thumbnails and frames
//! both use it; a fastload payload is several of them back to back.

use bytes::Bytes;
use tracing::warn;

/// Size of the width/height header.
pub const HEADER_LEN: usize = 2;

/// One packed image. Cloning shares the underlying buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedImage {
    data: Bytes,
}

impl PackedImage {
    /// Wraps a payload, rejecting buffers too short for their own header.
    pub fn new(data: Bytes) -> Option<Self> {
        if data.len() < HEADER_LEN {
            return None;
        }
        let image = Self { data };
        if image.data.len() < image.expected_len() {
            return None;
        }
        Some(image)
    }

    pub fn width(&self) -> u8 {
        self.data[0]
    }

    pub fn height(&self) -> u8 {
        self.data[1]
    }

    /// Byte length implied by the header.
    pub fn expected_len(&self) -> usize {
        frame_len(self.width(), self.height())
    }

    /// RGB value at `(x, y)`, or `None` outside the image.
    pub fn pixel(&self, x: u8, y: u8) -> Option<[u8; 3]> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        let index = HEADER_LEN + (usize::from(y) * usize::from(self.width()) + usize::from(x)) * 3;
        Some([self.data[index], self.data[index + 1], self.data[index + 2]])
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.data
    }

    /// Converts to an `image` buffer for export.
    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        let pixels = self.data.slice(HEADER_LEN..self.expected_len()).to_vec();
        image::RgbImage::from_raw(u32::from(self.width()), u32::from(self.height()), pixels)
    }
}

/// Byte length of one frame with the given dimensions, header included.
pub fn frame_len(width: u8, height: u8) -> usize {
    HEADER_LEN + usize::from(width) * usize::from(height) * 3
}

/// Payload length did not match the declared frame count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FastloadAnomaly {
    pub payload_len: usize,
    pub expected_len: usize,
    pub width: u8,
    pub height: u8,
    pub declared_frames: usize,
}

/// Result of splitting a fastload payload.
#[derive(Debug, Clone, Default)]
pub struct FastloadFrames {
    pub frames: Vec<Bytes>,
    pub anomaly: Option<FastloadAnomaly>,
}

/// Splits a fastload payload into frames.
///
/// Every frame shares the first frame's dimensions. The number of frames
/// is `min(len / frame_len, declared_frames)`; a trailing partial frame is
/// dropped. A length that is not exactly `frame_len * declared_frames` is
/// reported (and logged once) but never fails the decode.
pub fn decode_fastload(payload: &Bytes, declared_frames: usize) -> FastloadFrames {
    if payload.len() < HEADER_LEN {
        let anomaly = FastloadAnomaly {
            payload_len: payload.len(),
            expected_len: HEADER_LEN * declared_frames,
            width: 0,
            height: 0,
            declared_frames,
        };
        warn!(?anomaly, "fastload payload too short for a header");
        return FastloadFrames {
            frames: Vec::new(),
            anomaly: Some(anomaly),
        };
    }

    let (width, height) = (payload[0], payload[1]);
    let frame_length = frame_len(width, height);
    let expected_len = frame_length * declared_frames;

    let anomaly = (payload.len() != expected_len).then(|| {
        let anomaly = FastloadAnomaly {
            payload_len: payload.len(),
            expected_len,
            width,
            height,
            declared_frames,
        };
        warn!(?anomaly, "fastload payload length mismatch, decoding what fits");
        anomaly
    });

    let count = (payload.len() / frame_length).min(declared_frames);
    let frames = (0..count)
        .map(|i| payload.slice(i * frame_length..(i + 1) * frame_length))
        .collect();

    FastloadFrames { frames, anomaly }
}
