//! Pixel grid
//!
//! The image source hands over an RGBA buffer; each pixel is one grid cell.
//! Buffers are immutable once built and shared behind an `Arc`, so loading a
//! new image replaces the whole buffer at once.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Grid coordinate; may lie outside the grid when it comes from a gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    rgba: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap RGBA data; `rgba.len()` must be `width * height * 4`
    pub fn new(width: usize, height: usize, rgba: Vec<u8>) -> Result<Self> {
        let expected = width * height * 4;
        if rgba.len() != expected {
            return Err(Error::InvalidPixelBuffer {
                width,
                height,
                expected,
                actual: rgba.len(),
            });
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    /// Build a fully opaque buffer from a color function
    pub fn from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> Rgb) -> Self {
        let mut rgba = Vec::with_capacity(width * height * 4);
        for y in 0..height {
            for x in 0..width {
                let c = f(x, y);
                rgba.extend_from_slice(&[c.r, c.g, c.b, 255]);
            }
        }
        Self {
            width,
            height,
            rgba,
        }
    }

    /// Smooth color field for running without a real image
    ///
    /// Red rises left to right, green top to bottom, and blue along the
    /// diagonal, so every region of the grid maps to a different sound.
    pub fn test_pattern(width: usize, height: usize) -> Self {
        let scale = |i: usize, n: usize| {
            if n > 1 {
                (i * 255 / (n - 1)) as u8
            } else {
                0
            }
        };
        Self::from_fn(width, height, |x, y| {
            Rgb::new(
                scale(x, width),
                scale(y, height),
                scale(x + y, width + height - 1),
            )
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn contains(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.y >= 0 && (cell.x as usize) < self.width && (cell.y as usize) < self.height
    }

    /// Nearest in-grid cell; `None` for an empty grid
    pub fn clamp(&self, cell: Cell) -> Option<Cell> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        Some(Cell::new(
            cell.x.clamp(0, self.width as i32 - 1),
            cell.y.clamp(0, self.height as i32 - 1),
        ))
    }

    /// Color of a cell; alpha is ignored
    pub fn get(&self, cell: Cell) -> Option<Rgb> {
        if !self.contains(cell) {
            return None;
        }
        let i = (cell.y as usize * self.width + cell.x as usize) * 4;
        Some(Rgb::new(self.rgba[i], self.rgba[i + 1], self.rgba[i + 2]))
    }

    /// Box-filter the buffer down (or up) to a `columns x rows` grid
    pub fn resample(&self, columns: usize, rows: usize) -> Self {
        if self.width == 0 || self.height == 0 || columns == 0 || rows == 0 {
            return Self::from_fn(columns, rows, |_, _| Rgb::default());
        }

        Self::from_fn(columns, rows, |cx, cy| {
            let x0 = cx * self.width / columns;
            let x1 = ((cx + 1) * self.width / columns).max(x0 + 1);
            let y0 = cy * self.height / rows;
            let y1 = ((cy + 1) * self.height / rows).max(y0 + 1);

            let mut sum = [0u32; 3];
            let mut count = 0u32;
            for y in y0..y1 {
                for x in x0..x1 {
                    let i = (y * self.width + x) * 4;
                    sum[0] += self.rgba[i] as u32;
                    sum[1] += self.rgba[i + 1] as u32;
                    sum[2] += self.rgba[i + 2] as u32;
                    count += 1;
                }
            }
            Rgb::new(
                (sum[0] / count) as u8,
                (sum[1] / count) as u8,
                (sum[2] / count) as u8,
            )
        })
    }
}
