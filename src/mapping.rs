//! Folding one long chain of panels into a grid.
//!
//! Electrically a chain is always a single row of panels, so a framebuffer
//! for it is short and very wide. Physically the panels are often mounted
//! as a grid, with every second grid row rotated 180° to keep the
//! inter-panel cables short. The types here translate between the two: draw
//! on a [`TiledCanvas`] in grid coordinates and the pixels land in the
//! right place of the underlying chain framebuffer.

use core::convert::Infallible;

use embedded_graphics::prelude::{OriginDimensions, PixelColor, Point, Size};
use embedded_graphics::Pixel;

use crate::Color;

/// Coordinate translation from a virtual panel grid onto one chain.
///
/// # Type parameters
/// - `PANEL_ROWS` / `PANEL_COLS`: pixel size of a single panel
/// - `GRID_ROWS` / `GRID_COLS`: how the panels are mounted
pub trait PixelMapper<
    const PANEL_ROWS: usize,
    const PANEL_COLS: usize,
    const GRID_ROWS: usize,
    const GRID_COLS: usize,
>
{
    /// Height of the virtual grid canvas in pixels.
    const VIEW_ROWS: usize = PANEL_ROWS * GRID_ROWS;
    /// Width of the virtual grid canvas in pixels.
    const VIEW_COLS: usize = PANEL_COLS * GRID_COLS;
    /// Width of the chain framebuffer all grid pixels map into.
    const CHAIN_COLS: usize = PANEL_COLS * GRID_COLS * GRID_ROWS;

    /// Translate one pixel from grid coordinates to chain coordinates.
    fn map<C: PixelColor>(pixel: Pixel<C>) -> Pixel<C>;

    /// Size of the virtual grid canvas.
    #[must_use]
    fn view_size() -> Size {
        Size::new(Self::VIEW_COLS as u32, Self::VIEW_ROWS as u32)
    }
}

/// Serpentine mounting: the chain enters at the top-left panel, runs to the
/// right across the first grid row, then folds down. Every odd grid row is
/// mounted upside down and traversed right to left.
pub struct SerpentineGrid<
    const PANEL_ROWS: usize,
    const PANEL_COLS: usize,
    const GRID_ROWS: usize,
    const GRID_COLS: usize,
> {}

impl<
        const PANEL_ROWS: usize,
        const PANEL_COLS: usize,
        const GRID_ROWS: usize,
        const GRID_COLS: usize,
    > SerpentineGrid<PANEL_ROWS, PANEL_COLS, GRID_ROWS, GRID_COLS>
{
    /// Create the mapping strategy.
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }
}

impl<
        const PANEL_ROWS: usize,
        const PANEL_COLS: usize,
        const GRID_ROWS: usize,
        const GRID_COLS: usize,
    > Default for SerpentineGrid<PANEL_ROWS, PANEL_COLS, GRID_ROWS, GRID_COLS>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<
        const PANEL_ROWS: usize,
        const PANEL_COLS: usize,
        const GRID_ROWS: usize,
        const GRID_COLS: usize,
    > PixelMapper<PANEL_ROWS, PANEL_COLS, GRID_ROWS, GRID_COLS>
    for SerpentineGrid<PANEL_ROWS, PANEL_COLS, GRID_ROWS, GRID_COLS>
{
    fn map<C: PixelColor>(mut pixel: Pixel<C>) -> Pixel<C> {
        let grid_row = pixel.0.y / PANEL_ROWS as i32;
        let segment = grid_row * Self::VIEW_COLS as i32;
        if grid_row % 2 == 1 {
            // Upside-down panels: both axes run backwards.
            pixel.0.x = segment + (Self::VIEW_COLS as i32 - 1 - pixel.0.x);
            pixel.0.y = PANEL_ROWS as i32 - 1 - (pixel.0.y % PANEL_ROWS as i32);
        } else {
            pixel.0.x = segment + pixel.0.x;
            pixel.0.y %= PANEL_ROWS as i32;
        }
        pixel
    }
}

/// A grid of panels presented as one `embedded-graphics` canvas.
///
/// Wraps a chain framebuffer (anything drawing [`Color`] pixels) and routes
/// every pixel through a [`PixelMapper`]. The wrapper adds no drawing
/// methods of its own; reach the inner framebuffer through `.0` for
/// `clear`, `set_pwm_bits` and friends.
///
/// # Example
/// ```rust
/// use embedded_graphics::prelude::*;
/// use hub75_matrix::mapping::{PixelMapper, SerpentineGrid, TiledCanvas};
/// use hub75_matrix::{compute_double_rows, BcmFrameBuffer, Color};
///
/// // A 2x2 grid of 32x64 panels on one chain.
/// const ROWS: usize = 32;
/// const PANEL_COLS: usize = 64;
/// const COLS: usize = PANEL_COLS * 2 * 2;
/// const NROWS: usize = compute_double_rows(ROWS);
/// type Grid = SerpentineGrid<ROWS, PANEL_COLS, 2, 2>;
///
/// let mut fb = BcmFrameBuffer::<ROWS, COLS, NROWS, 1>::new();
/// fb.clear();
/// let mut canvas = TiledCanvas::new(&mut fb, Grid::new());
///
/// // A 128x64 canvas; this pixel lands on an upside-down panel.
/// canvas.set_pixel(Point::new(10, 40), Color::new(255, 0, 0));
/// ```
pub struct TiledCanvas<
    'a,
    T,
    M,
    const PANEL_ROWS: usize,
    const PANEL_COLS: usize,
    const GRID_ROWS: usize,
    const GRID_COLS: usize,
>(pub &'a mut T, M);

impl<
        'a,
        T,
        M,
        const PANEL_ROWS: usize,
        const PANEL_COLS: usize,
        const GRID_ROWS: usize,
        const GRID_COLS: usize,
    > TiledCanvas<'a, T, M, PANEL_ROWS, PANEL_COLS, GRID_ROWS, GRID_COLS>
where
    T: embedded_graphics::draw_target::DrawTarget<Color = Color, Error = Infallible>,
    M: PixelMapper<PANEL_ROWS, PANEL_COLS, GRID_ROWS, GRID_COLS>,
{
    /// Wrap a chain framebuffer with a mounting strategy.
    pub fn new(target: &'a mut T, mapper: M) -> Self {
        Self(target, mapper)
    }

    /// Set one pixel in grid coordinates.
    pub fn set_pixel(&mut self, p: Point, color: Color) {
        // The mapped pixel is clip-checked by the inner framebuffer.
        let _ = self.0.draw_iter([M::map(Pixel(p, color))]);
    }
}

impl<
        T,
        M,
        const PANEL_ROWS: usize,
        const PANEL_COLS: usize,
        const GRID_ROWS: usize,
        const GRID_COLS: usize,
    > embedded_graphics::draw_target::DrawTarget
    for TiledCanvas<'_, T, M, PANEL_ROWS, PANEL_COLS, GRID_ROWS, GRID_COLS>
where
    T: embedded_graphics::draw_target::DrawTarget<Color = Color, Error = Infallible>,
    M: PixelMapper<PANEL_ROWS, PANEL_COLS, GRID_ROWS, GRID_COLS>,
{
    type Color = Color;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        self.0.draw_iter(pixels.into_iter().map(M::map))
    }
}

impl<
        T,
        M,
        const PANEL_ROWS: usize,
        const PANEL_COLS: usize,
        const GRID_ROWS: usize,
        const GRID_COLS: usize,
    > OriginDimensions for TiledCanvas<'_, T, M, PANEL_ROWS, PANEL_COLS, GRID_ROWS, GRID_COLS>
where
    M: PixelMapper<PANEL_ROWS, PANEL_COLS, GRID_ROWS, GRID_COLS>,
{
    fn size(&self) -> Size {
        M::view_size()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use embedded_graphics::prelude::*;

    use super::*;

    // 2x2 grid of 32x64 panels: virtual 128x64, chain 256 wide.
    type Grid = SerpentineGrid<32, 64, 2, 2>;

    fn map(x: i32, y: i32) -> Point {
        Grid::map(Pixel(Point::new(x, y), Color::new(255, 255, 255))).0
    }

    #[test]
    fn test_view_and_chain_dimensions() {
        assert_eq!(Grid::view_size(), Size::new(128, 64));
        assert_eq!(Grid::CHAIN_COLS, 256);
    }

    #[test]
    fn test_first_grid_row_is_identity_with_row_fold() {
        assert_eq!(map(0, 0), Point::new(0, 0));
        assert_eq!(map(127, 0), Point::new(127, 0));
        assert_eq!(map(63, 31), Point::new(63, 31));
    }

    #[test]
    fn test_second_grid_row_is_rotated() {
        // Top-left of the second grid row lands at the far end of the
        // chain's second segment, bottom row of the panel.
        assert_eq!(map(0, 32), Point::new(255, 31));
        // Bottom-right corner of the full canvas.
        assert_eq!(map(127, 63), Point::new(128, 0));
        assert_eq!(map(5, 40), Point::new(250, 23));
    }

    #[test]
    fn test_mapping_is_injective_over_the_canvas() {
        use std::collections::BTreeSet;
        let mut seen = BTreeSet::new();
        for y in 0..64 {
            for x in 0..128 {
                let p = map(x, y);
                assert!(p.x >= 0 && (p.x as usize) < Grid::CHAIN_COLS);
                assert!(p.y >= 0 && (p.y as usize) < 32);
                assert!(seen.insert((p.x, p.y)), "collision at ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_three_wide_single_row_grid_is_identity() {
        type Flat = SerpentineGrid<32, 64, 1, 3>;
        let pixel = Flat::map(Pixel(Point::new(150, 20), Color::new(1, 2, 3)));
        assert_eq!(pixel.0, Point::new(150, 20));
    }

    #[test]
    fn test_tiled_canvas_draws_through_mapper() {
        use crate::compute_double_rows;
        use crate::BcmFrameBuffer;

        const ROWS: usize = 32;
        const COLS: usize = 256;
        const NROWS: usize = compute_double_rows(ROWS);

        let mut fb = BcmFrameBuffer::<ROWS, COLS, NROWS, 1>::new();
        fb.clear();
        let mut canvas = TiledCanvas::new(&mut fb, Grid::new());
        assert_eq!(canvas.size(), Size::new(128, 64));
        canvas.set_pixel(Point::new(0, 32), Color::new(255, 255, 255));
        // Lands at chain coordinates (255, 31) per the serpentine fold.
        Pixel(Point::new(1, 1), Color::new(255, 255, 255))
            .draw(&mut canvas)
            .unwrap();
    }
}
