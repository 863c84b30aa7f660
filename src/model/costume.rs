//! The decoded-bitmap costume model.
//!
//! Costumes are opaque to the compositor: decoded pixels plus placement
//! metadata. Asset loading and image decoding happen upstream; this module
//! only models what rendering and CPU sampling need.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::foundation::error::{RenderError, RenderResult};

static NEXT_LOD_ID: AtomicU64 = AtomicU64::new(1);

/// One rasterization of a costume at a specific resolution.
///
/// Pixels are straight (non-premultiplied) RGBA8, tightly packed, row-major.
/// Every LOD carries a process-unique id; the GPU texture cache keys on it
/// and holds only a [`std::sync::Weak`] back-reference, so dropping the last
/// `Arc<CostumeLod>` releases the associated texture.
#[derive(Debug)]
pub struct CostumeLod {
    id: u64,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl CostumeLod {
    /// Wrap decoded pixels. Fails when the byte length does not match.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> RenderResult<Arc<Self>> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| RenderError::resource("costume dimensions overflow"))?;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(RenderError::resource(format!(
                "costume bitmap must be {width}x{height} RGBA8 ({expected} bytes), got {}",
                pixels.len()
            )));
        }
        Ok(Arc::new(Self {
            id: NEXT_LOD_ID.fetch_add(1, Ordering::Relaxed),
            width,
            height,
            pixels,
        }))
    }

    /// Process-unique id, stable for the lifetime of the LOD.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Bitmap width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Bitmap height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw straight RGBA8 bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Sample one pixel, `None` outside the bitmap.
    pub fn pixel(&self, x: i64, y: i64) -> Option<[u8; 4]> {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        Some([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }
}

/// A costume: rasterized bitmaps plus rotation center and resolution metadata.
///
/// `width`, `height` and the rotation center are in primary-bitmap pixels;
/// `scale()` (`1 / bitmap_resolution`) converts those to stage units.
#[derive(Clone, Debug)]
pub struct Costume {
    width: u32,
    height: u32,
    rotation_center_x: f64,
    rotation_center_y: f64,
    bitmap_resolution: f64,
    scale: f64,
    lods: Vec<Arc<CostumeLod>>,
}

impl Costume {
    /// Build a costume from its rasterizations, densest last. The first LOD is
    /// the primary bitmap: it defines `width`/`height` and is the raster the
    /// CPU point query samples.
    pub fn new(
        rotation_center_x: f64,
        rotation_center_y: f64,
        bitmap_resolution: f64,
        lods: Vec<Arc<CostumeLod>>,
    ) -> RenderResult<Self> {
        let primary = lods
            .first()
            .ok_or_else(|| RenderError::resource("costume needs at least one LOD"))?;
        if !(bitmap_resolution > 0.0) {
            return Err(RenderError::resource("bitmap resolution must be positive"));
        }
        Ok(Self {
            width: primary.width(),
            height: primary.height(),
            rotation_center_x,
            rotation_center_y,
            bitmap_resolution,
            scale: 1.0 / bitmap_resolution,
            lods,
        })
    }

    /// Single-LOD convenience constructor for plain bitmap costumes.
    pub fn from_bitmap(
        width: u32,
        height: u32,
        pixels: Vec<u8>,
        rotation_center_x: f64,
        rotation_center_y: f64,
        bitmap_resolution: f64,
    ) -> RenderResult<Self> {
        let lod = CostumeLod::new(width, height, pixels)?;
        Self::new(
            rotation_center_x,
            rotation_center_y,
            bitmap_resolution,
            vec![lod],
        )
    }

    /// Primary-bitmap width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Primary-bitmap height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Rotation center X in primary-bitmap pixels.
    pub fn rotation_center_x(&self) -> f64 {
        self.rotation_center_x
    }

    /// Rotation center Y in primary-bitmap pixels.
    pub fn rotation_center_y(&self) -> f64 {
        self.rotation_center_y
    }

    /// Pixels per stage unit of the primary bitmap.
    pub fn bitmap_resolution(&self) -> f64 {
        self.bitmap_resolution
    }

    /// Stage units per primary-bitmap pixel (`1 / bitmap_resolution`).
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// The raster the CPU point query samples.
    pub fn primary_lod(&self) -> &Arc<CostumeLod> {
        &self.lods[0]
    }

    /// Pick the sparsest LOD that still covers `desired_scale` multiples of
    /// the primary resolution; the densest available otherwise.
    pub fn lod(&self, desired_scale: f64) -> &Arc<CostumeLod> {
        let want = self.width as f64 * desired_scale;
        self.lods
            .iter()
            .find(|lod| lod.width() as f64 >= want)
            .unwrap_or_else(|| self.lods.last().unwrap_or(&self.lods[0]))
    }

    /// Factor converting pixels of `lod` into primary-bitmap pixels.
    pub fn lod_pixel_scale(&self, lod: &CostumeLod) -> f64 {
        self.width as f64 / lod.width() as f64
    }
}

#[cfg(test)]
#[path = "../../tests/unit/model/costume.rs"]
mod tests;
