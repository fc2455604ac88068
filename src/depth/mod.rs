//! 16-bit depth maps aligned with camera 1.
//!
//! Each pixel holds a raw depth reading; zero means "no measurement". Raw
//! readings are multiplied by [`DepthMap::scale`] to get depth in the unit of
//! the extrinsic translation (1.0 for depth sensors that report millimetres).

use std::path::Path;

use image::{DynamicImage, ImageBuffer, Luma};
use log::{debug, trace};

/// Window half-size used when none is given.
pub const DEFAULT_SEARCH_RADIUS: u32 = 5;

pub type DepthImage = ImageBuffer<Luma<u16>, Vec<u16>>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DepthMapError {
    #[error("I/O Error: {0}")]
    Io(String),
    #[error("Image Error: {0}")]
    Image(String),
}

impl From<image::ImageError> for DepthMapError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(e) => DepthMapError::Io(e.to_string()),
            other => DepthMapError::Image(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DepthMap {
    image: DepthImage,
    scale: f64,
}

impl DepthMap {
    pub fn from_image(image: DepthImage) -> Self {
        DepthMap { image, scale: 1.0 }
    }

    /// Builds a depth map from row-major samples.
    ///
    /// # Errors
    ///
    /// [`DepthMapError::Image`] when `data` does not hold `width * height` samples.
    pub fn from_raw(width: u32, height: u32, data: Vec<u16>) -> Result<Self, DepthMapError> {
        let len = data.len();
        ImageBuffer::from_raw(width, height, data)
            .map(Self::from_image)
            .ok_or_else(|| {
                DepthMapError::Image(format!(
                    "{} samples do not fill a {}x{} depth map",
                    len, width, height
                ))
            })
    }

    /// Loads a single-channel 16-bit image (typically PNG).
    ///
    /// 8-bit or colour images are rejected rather than rescaled, since rescaling
    /// would change the depth values.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, DepthMapError> {
        let path = path.as_ref();
        match image::open(path)? {
            DynamicImage::ImageLuma16(image) => {
                debug!(
                    "loaded {}x{} depth map from {}",
                    image.width(),
                    image.height(),
                    path.display()
                );
                Ok(Self::from_image(image))
            }
            other => Err(DepthMapError::Image(format!(
                "{} is {:?}, expected a 16-bit single-channel image",
                path.display(),
                other.color()
            ))),
        }
    }

    /// Sets the factor converting raw readings to depth units.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Depth at a single pixel; `None` outside the image or where nothing was measured.
    pub fn depth_at(&self, x: u32, y: u32) -> Option<f64> {
        let raw = self.image.get_pixel_checked(x, y)?[0];
        (raw > 0).then(|| raw as f64 * self.scale)
    }

    /// Mean of the measured depths in the `(2r+1)×(2r+1)` window centred on `(u, v)`.
    ///
    /// The centre is the pixel containing `(u, v)`. The window is clamped to the
    /// image and zero readings are left out of the mean.
    ///
    /// # Arguments
    ///
    /// * `u`, `v` - Pixel coordinate in camera 1.
    /// * `radius` - Window half-size in pixels, see [`DEFAULT_SEARCH_RADIUS`].
    ///
    /// # Return Value
    ///
    /// `None` when the coordinate is not finite, the window falls entirely
    /// outside the image, or no pixel in it has a measurement.
    pub fn depth_near(&self, u: f64, v: f64, radius: u32) -> Option<f64> {
        if !u.is_finite() || !v.is_finite() {
            return None;
        }
        let cx = u.floor() as i64;
        let cy = v.floor() as i64;
        let r = radius as i64;

        // Casts saturate for huge coordinates, so the window bounds must too.
        let x_min = cx.saturating_sub(r).max(0);
        let y_min = cy.saturating_sub(r).max(0);
        let x_max = cx.saturating_add(r + 1).min(self.width() as i64);
        let y_max = cy.saturating_add(r + 1).min(self.height() as i64);
        if x_min >= x_max || y_min >= y_max {
            trace!("depth window around ({}, {}) is outside the image", u, v);
            return None;
        }

        let mut sum = 0.0;
        let mut count = 0usize;
        for y in y_min..y_max {
            for x in x_min..x_max {
                let raw = self.image.get_pixel(x as u32, y as u32)[0];
                if raw > 0 {
                    sum += raw as f64;
                    count += 1;
                }
            }
        }

        if count == 0 {
            trace!("no depth samples around ({}, {}) within {} px", u, v, radius);
            return None;
        }
        Some(sum / count as f64 * self.scale)
    }
}
