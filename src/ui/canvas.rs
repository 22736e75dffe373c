//! Terminal pixel canvas.
//!
//! Each terminal cell shows two vertically stacked pixels using the upper
//! half block: the foreground paints the top pixel, the background the
//! bottom one. A canvas of `cols x rows` cells therefore has
//! `cols x 2*rows` pixels.

use crate::roll::{DrawSurface, Rgb};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Color;
use ratatui::widgets::Widget;

const UPPER_HALF_BLOCK: &str = "\u{2580}";

/// A pixel buffer the roll draws into and ratatui displays.
#[derive(Debug, Clone, Default)]
pub struct PixelCanvas {
    width: u32,
    height: u32,
    pixels: Vec<Rgb>,
}

impl PixelCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        let mut canvas = Self::default();
        canvas.resize(width, height);
        canvas
    }

    /// Pixel size needed to fill a terminal area.
    pub fn size_for(area: Rect) -> (u32, u32) {
        (area.width as u32, area.height as u32 * 2)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x < self.width && y < self.height {
            Some(self.pixels[(y * self.width + x) as usize])
        } else {
            None
        }
    }

    fn put(&mut self, x: u32, y: u32, color: Rgb) {
        if x < self.width && y < self.height {
            self.pixels[(y * self.width + x) as usize] = color;
        }
    }

    /// Pixel span `[start, end)` covered by `[pos, pos + len)`, at least one
    /// pixel wide, unclipped.
    fn span(pos: f64, len: f64) -> (i64, i64) {
        let start = pos.round() as i64;
        let end = (pos + len).round() as i64;
        (start, end.max(start + 1))
    }

    fn clip(value: i64, limit: u32) -> u32 {
        value.clamp(0, limit as i64) as u32
    }
}

impl DrawSurface for PixelCanvas {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels = vec![Rgb(0, 0, 0); (width * height) as usize];
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Rgb) {
        let (x0, x1) = Self::span(x, w);
        let (y0, y1) = Self::span(y, h);
        let (x0, x1) = (Self::clip(x0, self.width), Self::clip(x1, self.width));
        let (y0, y1) = (Self::clip(y0, self.height), Self::clip(y1, self.height));
        for py in y0..y1 {
            let row = (py * self.width) as usize;
            self.pixels[row + x0 as usize..row + x1 as usize].fill(color);
        }
    }

    /// Outlines the rectangle on its boundary, so neighbouring rectangles
    /// share one separator line.
    fn stroke_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Rgb) {
        let (x0, x1) = Self::span(x, w);
        let (y0, y1) = Self::span(y, h);
        for px in x0..=x1 {
            for py in [y0, y1] {
                if px >= 0 && py >= 0 {
                    self.put(px as u32, py as u32, color);
                }
            }
        }
        for py in y0..=y1 {
            for px in [x0, x1] {
                if px >= 0 && py >= 0 {
                    self.put(px as u32, py as u32, color);
                }
            }
        }
    }
}

impl Widget for &PixelCanvas {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let cols = area.width.min(self.width as u16);
        let rows = area.height.min((self.height / 2) as u16);
        for row in 0..rows {
            for col in 0..cols {
                let x = col as u32;
                let top = self.pixel(x, row as u32 * 2).unwrap_or(Rgb(0, 0, 0));
                let bottom = self.pixel(x, row as u32 * 2 + 1).unwrap_or(top);
                if let Some(cell) = buf.cell_mut((area.x + col, area.y + row)) {
                    cell.set_symbol(UPPER_HALF_BLOCK)
                        .set_fg(Color::Rgb(top.0, top.1, top.2))
                        .set_bg(Color::Rgb(bottom.0, bottom.1, bottom.2));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb = Rgb(255, 0, 0);
    const GRAY: Rgb = Rgb(128, 128, 128);

    #[test]
    fn test_fill_is_clipped() {
        let mut canvas = PixelCanvas::new(4, 4);
        canvas.fill_rect(-2.0, 2.0, 10.0, 10.0, RED);
        assert_eq!(canvas.pixel(0, 1), Some(Rgb(0, 0, 0)));
        assert_eq!(canvas.pixel(0, 2), Some(RED));
        assert_eq!(canvas.pixel(3, 3), Some(RED));
        assert_eq!(canvas.pixel(4, 3), None);
    }

    #[test]
    fn test_thin_rect_still_covers_a_pixel() {
        let mut canvas = PixelCanvas::new(4, 4);
        canvas.fill_rect(1.2, 1.0, 0.3, 0.4, RED);
        assert_eq!(canvas.pixel(1, 1), Some(RED));
    }

    #[test]
    fn test_stroke_outlines_boundary() {
        let mut canvas = PixelCanvas::new(6, 6);
        canvas.stroke_rect(1.0, 1.0, 3.0, 3.0, GRAY);
        assert_eq!(canvas.pixel(1, 1), Some(GRAY));
        assert_eq!(canvas.pixel(4, 4), Some(GRAY));
        assert_eq!(canvas.pixel(4, 2), Some(GRAY));
        assert_eq!(canvas.pixel(2, 2), Some(Rgb(0, 0, 0)));
    }

    #[test]
    fn test_widget_packs_two_pixels_per_cell() {
        let mut canvas = PixelCanvas::new(2, 4);
        canvas.fill_rect(0.0, 1.0, 2.0, 1.0, RED);
        let area = Rect::new(0, 0, 2, 2);
        let mut buf = Buffer::empty(area);
        (&canvas).render(area, &mut buf);

        let cell = &buf[(0, 0)];
        assert_eq!(cell.symbol(), UPPER_HALF_BLOCK);
        assert_eq!(cell.fg, Color::Rgb(0, 0, 0));
        assert_eq!(cell.bg, Color::Rgb(255, 0, 0));
        assert_eq!(buf[(1, 1)].bg, Color::Rgb(0, 0, 0));
    }

    #[test]
    fn test_size_for_area() {
        assert_eq!(PixelCanvas::size_for(Rect::new(3, 4, 80, 20)), (80, 40));
    }
}
