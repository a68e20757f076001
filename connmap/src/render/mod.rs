//! Headless rendering and export of grid snapshots.
//!
//! Turns a [`GridSnapshot`] into a W x H image with one pixel per cell, or into
//! JSON for external renderers. Colors and pan offsets are explicit
//! [`RenderConfig`] values passed in by the caller.

mod export;

pub use export::{write_json, write_png, ExportError};

use std::str::FromStr;

use image::{Rgba, RgbaImage};
use thiserror::Error;

use crate::grid::GridDimensions;
use crate::store::GridSnapshot;

/// Errors parsing render settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// Color string was not `#rrggbb` or `#rrggbbaa`.
    #[error("Invalid color '{0}': expected #rrggbb or #rrggbbaa")]
    InvalidColor(String),
}

/// An RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const BLACK: Color = Color([0, 0, 0, 0xff]);
    pub const WHITE: Color = Color([0xff, 0xff, 0xff, 0xff]);
}

impl FromStr for Color {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RenderError::InvalidColor(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(invalid());
        }

        let mut rgba = [0xff; 4];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk).map_err(|_| invalid())?;
            rgba[i] = u8::from_str_radix(pair, 16).map_err(|_| invalid())?;
        }
        Ok(Color(rgba))
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [r, g, b, a] = self.0;
        if a == 0xff {
            write!(f, "#{:02x}{:02x}{:02x}", r, g, b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", r, g, b, a)
        }
    }
}

/// Presentation settings for [`GridRenderer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    /// Color of occupied cells.
    pub point_color: Color,
    /// Color of everything else.
    pub background_color: Color,
    /// Horizontal pan in cells, wrapped around the grid width.
    pub x_offset: i64,
    /// Vertical pan in cells, wrapped around the grid height.
    pub y_offset: i64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            point_color: Color::WHITE,
            background_color: Color::BLACK,
            x_offset: 0,
            y_offset: 0,
        }
    }
}

/// Rasterizes snapshots onto a one-pixel-per-cell image.
#[derive(Debug, Clone)]
pub struct GridRenderer {
    dims: GridDimensions,
    config: RenderConfig,
}

impl GridRenderer {
    pub fn new(dims: GridDimensions, config: RenderConfig) -> Self {
        Self { dims, config }
    }

    /// Pixel position of a cell with north up and pan applied.
    ///
    /// Rows count up from the south pole, so the y axis is flipped.
    pub fn pixel_for(&self, column: u32, row: u32) -> (u32, u32) {
        let width = self.dims.width() as i64;
        let height = self.dims.height() as i64;
        let x = (column as i64 + self.config.x_offset).rem_euclid(width);
        let y = (height - row as i64 + self.config.y_offset).rem_euclid(height);
        (x as u32, y as u32)
    }

    /// Render a snapshot.
    pub fn render(&self, snapshot: &GridSnapshot) -> RgbaImage {
        let mut image = RgbaImage::from_pixel(
            self.dims.width(),
            self.dims.height(),
            Rgba(self.config.background_color.0),
        );

        for (cell, _count) in snapshot.iter() {
            if !self.dims.contains(cell) {
                continue;
            }
            let (x, y) = self.pixel_for(cell.column, cell.row);
            image.put_pixel(x, y, Rgba(self.config.point_color.0));
        }

        image
    }
}
