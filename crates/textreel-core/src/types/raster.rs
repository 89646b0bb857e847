//! Character raster: a width x height grid of display cells.
//!
//! Drawing operations clip silently at the edges, so callers may pass
//! coordinates outside the grid.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::fmt;

use crate::error::{Error, Result};

/// Largest accepted width or height.
pub const MAX_RASTER_SIDE: usize = 32_768;

/// Luma ramp used to turn 8-bit brightness into characters.
pub const SHADE_PALETTE: &[u8; 8] = b" .-:+*H#";

const SPACE: u8 = b' ';

/// Map an 8-bit luma value onto the shading palette.
pub const fn shade(luma: u8) -> u8 {
    SHADE_PALETTE[(luma / 32) as usize]
}

/// Minor-axis offset after `step` major steps, rounded in 1/256 fixed point.
fn minor_offset(minor: i32, major: i32, step: i32) -> i32 {
    let scaled = i64::from(minor) * i64::from(step) * 256 / i64::from(major);
    ((scaled + 128) / 256) as i32
}

/// A grid of ASCII cells, row-major.
#[derive(Clone, PartialEq, Eq)]
pub struct Raster {
    width: usize,
    height: usize,
    cells: Vec<u8>,
}

impl Raster {
    /// Create a blank raster.
    pub fn new(width: usize, height: usize) -> Result<Self> {
        let cells = blank_cells(width, height)?;
        Ok(Self {
            width,
            height,
            cells,
        })
    }

    pub const fn width(&self) -> usize {
        self.width
    }

    pub const fn height(&self) -> usize {
        self.height
    }

    pub const fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    /// One row of cells.
    pub fn row(&self, y: usize) -> Option<&[u8]> {
        (y < self.height).then(|| &self.cells[y * self.width..(y + 1) * self.width])
    }

    /// Row rendered as a string.
    pub fn row_string(&self, y: usize) -> Option<String> {
        self.row(y)
            .map(|row| String::from_utf8_lossy(row).into_owned())
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        let (x, y) = (usize::try_from(x).ok()?, usize::try_from(y).ok()?);
        (x < self.width && y < self.height).then_some(y * self.width + x)
    }

    pub fn get(&self, x: i32, y: i32) -> Option<u8> {
        self.offset(x, y).map(|i| self.cells[i])
    }

    pub fn put(&mut self, x: i32, y: i32, ch: u8) {
        if let Some(i) = self.offset(x, y) {
            self.cells[i] = ch;
        }
    }

    pub fn clear_cell(&mut self, x: i32, y: i32) {
        self.put(x, y, SPACE);
    }

    /// Fill every cell with space.
    pub fn clear(&mut self) {
        self.cells.fill(SPACE);
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, ch: u8) {
        let x_end = (x + w).min(self.width as i32);
        let y_end = (y + h).min(self.height as i32);
        for yc in y.max(0)..y_end {
            for xc in x.max(0)..x_end {
                self.put(xc, yc, ch);
            }
        }
    }

    /// Outline a rectangle, optionally blanking its interior.
    pub fn border_rect(&mut self, x: i32, y: i32, w: i32, h: i32, ch: u8, clean: bool) {
        for xc in x..x + w {
            self.put(xc, y, ch);
            self.put(xc, y + h - 1, ch);
        }
        for yc in y..y + h {
            self.put(x, yc, ch);
            self.put(x + w - 1, yc, ch);
        }
        if clean {
            self.fill_rect(x + 1, y + 1, w - 2, h - 2, SPACE);
        }
    }

    /// Draw a line including both end points.
    ///
    /// Steps along the major axis and rounds the minor axis to the nearest
    /// cell in 1/256 fixed point.
    pub fn draw_line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, ch: u8) {
        let (xd, yd) = (x2 - x1, y2 - y1);
        let (xda, yda) = (xd.abs(), yd.abs());
        let (sx, sy) = (xd.signum(), yd.signum());

        if xd == 0 {
            let step = if yd >= 0 { 1 } else { -1 };
            for i in 0..=yda {
                self.put(x1, y1 + i * step, ch);
            }
            return;
        }

        if xda >= yda {
            for i in 0..=xda {
                let minor = minor_offset(yda, xda, i);
                self.put(x1 + sx * i, y1 + sy * minor, ch);
            }
        } else {
            for i in 0..=yda {
                let minor = minor_offset(xda, yda, i);
                self.put(x1 + sx * minor, y1 + sy * i, ch);
            }
        }
    }

    /// Fill a circle, stretched horizontally by the cell aspect ratio `sar`.
    pub fn draw_circle(&mut self, x: i32, y: i32, r: i32, ch: u8, sar: i32) {
        let sar = sar.max(1);
        let x_min = (x - r * sar).max(0);
        let x_max = (x + r * sar).min(self.width as i32);
        let y_min = (y - r).max(0);
        let y_max = (y + r).min(self.height as i32);

        for yc in y_min..y_max {
            for xc in x_min..x_max {
                let (dx, dy) = (i64::from(x - xc), i64::from(y - yc));
                let (sar, r) = (i64::from(sar), i64::from(r));
                if dy * dy + dx * dx / (sar * sar) < r * r {
                    self.put(xc, yc, ch);
                }
            }
        }
    }

    pub fn draw_text(&mut self, x: i32, y: i32, text: &str) {
        for (i, byte) in text.bytes().enumerate() {
            self.put(x + i as i32, y, byte);
        }
    }

    /// Copy `src` into this raster with its origin at (`dx`, `dy`).
    pub fn copy_from(&mut self, src: &Self, dx: i32, dy: i32) {
        for y in 0..src.height {
            let row = &src.cells[y * src.width..(y + 1) * src.width];
            for (x, &ch) in row.iter().enumerate() {
                self.put(x as i32 + dx, y as i32 + dy, ch);
            }
        }
    }

    /// Like [`Raster::copy_from`], but space cells in `src` leave the destination untouched.
    pub fn overlay_from(&mut self, src: &Self, dx: i32, dy: i32) {
        for y in 0..src.height {
            let row = &src.cells[y * src.width..(y + 1) * src.width];
            for (x, &ch) in row.iter().enumerate() {
                if ch != SPACE {
                    self.put(x as i32 + dx, y as i32 + dy, ch);
                }
            }
        }
    }

    /// Rescale to a new size using nearest-neighbour sampling.
    pub fn resize(&mut self, width: usize, height: usize) -> Result<()> {
        let mut cells = blank_cells(width, height)?;
        for yc in 0..height {
            let src_row = self.height * yc / height;
            for xc in 0..width {
                let src_col = self.width * xc / width;
                cells[yc * width + xc] = self.cells[src_row * self.width + src_col];
            }
        }
        self.width = width;
        self.height = height;
        self.cells = cells;
        Ok(())
    }
}

fn blank_cells(width: usize, height: usize) -> Result<Vec<u8>> {
    if !(1..=MAX_RASTER_SIDE).contains(&width) || !(1..=MAX_RASTER_SIDE).contains(&height) {
        return Err(Error::InvalidArgument(format!(
            "raster size {width}x{height} out of range"
        )));
    }
    let len = width * height;
    let mut cells = Vec::new();
    cells
        .try_reserve_exact(len)
        .map_err(|_| Error::Allocation { bytes: len })?;
    cells.resize(len, SPACE);
    Ok(cells)
}

impl fmt::Debug for Raster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Raster")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Raster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..self.height {
            if y > 0 {
                f.write_str("\n")?;
            }
            if let Some(row) = self.row(y) {
                f.write_str(&String::from_utf8_lossy(row))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_limits() {
        assert!(Raster::new(0, 10).is_err());
        assert!(Raster::new(10, MAX_RASTER_SIDE + 1).is_err());
        let raster = Raster::new(4, 3).unwrap();
        assert_eq!(raster.cells(), b"            ");
    }

    #[test]
    fn test_put_clips() {
        let mut raster = Raster::new(3, 2).unwrap();
        raster.put(-1, 0, b'#');
        raster.put(3, 0, b'#');
        raster.put(1, 1, b'#');
        assert_eq!(raster.get(1, 1), Some(b'#'));
        assert_eq!(raster.get(5, 5), None);
        assert_eq!(raster.to_string(), "   \n # ");
    }

    #[test]
    fn test_vertical_line_either_direction() {
        let mut down = Raster::new(1, 5).unwrap();
        down.draw_line(0, 1, 0, 3, b'#');
        let mut up = Raster::new(1, 5).unwrap();
        up.draw_line(0, 3, 0, 1, b'#');
        assert_eq!(down, up);
        assert_eq!(down.cells(), b" ### ");
    }

    #[test]
    fn test_diagonal_line() {
        let mut raster = Raster::new(4, 4).unwrap();
        raster.draw_line(3, 3, 0, 0, b'\\');
        for i in 0..4 {
            assert_eq!(raster.get(i, i), Some(b'\\'));
        }
    }

    #[test]
    fn test_shallow_line_rounds() {
        let mut raster = Raster::new(5, 2).unwrap();
        raster.draw_line(0, 0, 4, 1, b'*');
        assert_eq!(raster.row_string(0).unwrap(), "**   ");
        assert_eq!(raster.row_string(1).unwrap(), "  ***");
    }

    #[test]
    fn test_long_line_on_large_raster() {
        let mut raster = Raster::new(4000, 4000).unwrap();
        raster.draw_line(0, 0, 3999, 3000, b'#');
        assert_eq!(raster.get(0, 0), Some(b'#'));
        assert_eq!(raster.get(2000, 1500), Some(b'#'));
        assert_eq!(raster.get(3999, 3000), Some(b'#'));

        let mut steep = Raster::new(4000, 4000).unwrap();
        steep.draw_line(3000, 3999, 0, 0, b'#');
        assert_eq!(steep.get(1500, 2000), Some(b'#'));
        assert_eq!(steep.get(3000, 3999), Some(b'#'));
    }

    #[test]
    fn test_circle_respects_aspect_ratio() {
        let mut raster = Raster::new(20, 9).unwrap();
        raster.draw_circle(10, 4, 3, b'o', 2);
        assert_eq!(raster.get(10, 4), Some(b'o'));
        assert_eq!(raster.get(15, 4), Some(b'o'));
        assert_eq!(raster.get(10, 7), Some(b' '));
        assert_eq!(raster.get(4, 4), Some(b' '));
    }

    #[test]
    fn test_copy_with_negative_offset_scrolls_left() {
        let mut raster = Raster::new(4, 1).unwrap();
        raster.draw_text(0, 0, "abcd");
        let previous = raster.clone();
        raster.copy_from(&previous, -1, 0);
        assert_eq!(raster.to_string(), "bcdd");
    }

    #[test]
    fn test_overlay_skips_space() {
        let mut base = Raster::new(3, 1).unwrap();
        base.draw_text(0, 0, "xyz");
        let mut top = Raster::new(3, 1).unwrap();
        top.put(1, 0, b'#');
        base.overlay_from(&top, 0, 0);
        assert_eq!(base.to_string(), "x#z");
    }

    #[test]
    fn test_resize_nearest_neighbour() {
        let mut raster = Raster::new(2, 1).unwrap();
        raster.draw_text(0, 0, "ab");
        raster.resize(4, 2).unwrap();
        assert_eq!(raster.to_string(), "aabb\naabb");
    }

    #[test]
    fn test_border_rect_clean() {
        let mut raster = Raster::new(4, 4).unwrap();
        raster.fill_rect(0, 0, 4, 4, b'.');
        raster.border_rect(0, 0, 4, 4, b'#', true);
        assert_eq!(raster.to_string(), "####\n#  #\n#  #\n####");
    }

    #[test]
    fn test_shade_palette() {
        assert_eq!(shade(0), b' ');
        assert_eq!(shade(255), b'#');
        assert_eq!(shade(100), b':');
    }
}
