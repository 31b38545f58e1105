//! Drawing backend wrapper that can always put text on a chart.
//!
//! Plotters built without a TrueType feature has no way to rasterize glyphs and panics when
//! asked to draw text on a bitmap. [`FontSafeBackend`] forwards every call to the wrapped
//! backend and, when text drawing fails, renders the string from a small built-in 5x7 bitmap
//! font instead.

use std::panic;
use std::sync::Mutex;

use plotters_backend::{
    text_anchor, BackendColor, BackendCoord, BackendStyle, BackendTextStyle, DrawingBackend,
    DrawingErrorKind,
};

/// Glyph rows in the fallback font.
pub const GLYPH_HEIGHT: usize = 7;
const SPACE_WIDTH: i32 = 3;
/// Font size in pixels drawn at scale 1.
const UNIT_FONT_SIZE: f64 = 9.0;

/// Serializes panic hook swaps across threads rendering at the same time.
static HOOK_LOCK: Mutex<()> = Mutex::new(());

pub struct FontSafeBackend<DB> {
    inner: DB,
    /// Set once the wrapped backend has failed to draw text; later text skips straight to the
    /// bitmap font.
    text_unsupported: bool,
}

impl<DB> FontSafeBackend<DB> {
    pub fn new(inner: DB) -> Self {
        Self {
            inner,
            text_unsupported: false,
        }
    }
}

impl<DB: DrawingBackend> DrawingBackend for FontSafeBackend<DB> {
    type ErrorType = DB::ErrorType;

    fn get_size(&self) -> (u32, u32) {
        self.inner.get_size()
    }

    fn ensure_prepared(&mut self) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.ensure_prepared()
    }

    fn present(&mut self) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.present()
    }

    fn draw_pixel(
        &mut self,
        point: BackendCoord,
        color: BackendColor,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.draw_pixel(point, color)
    }

    fn draw_line<S: BackendStyle>(
        &mut self,
        from: BackendCoord,
        to: BackendCoord,
        style: &S,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.draw_line(from, to, style)
    }

    fn draw_rect<S: BackendStyle>(
        &mut self,
        upper_left: BackendCoord,
        bottom_right: BackendCoord,
        style: &S,
        fill: bool,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.draw_rect(upper_left, bottom_right, style, fill)
    }

    fn draw_path<S: BackendStyle, I: IntoIterator<Item = BackendCoord>>(
        &mut self,
        path: I,
        style: &S,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.draw_path(path, style)
    }

    fn draw_circle<S: BackendStyle>(
        &mut self,
        center: BackendCoord,
        radius: u32,
        style: &S,
        fill: bool,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.draw_circle(center, radius, style, fill)
    }

    fn blit_bitmap(
        &mut self,
        pos: BackendCoord,
        (iw, ih): (u32, u32),
        src: &[u8],
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.inner.blit_bitmap(pos, (iw, ih), src)
    }

    fn draw_text<TStyle: BackendTextStyle>(
        &mut self,
        text: &str,
        style: &TStyle,
        pos: BackendCoord,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        if self.text_unsupported {
            return self.draw_text_fallback(text, style, pos);
        }
        let inner = &mut self.inner;
        let attempt = silence_panics(|| {
            panic::catch_unwind(panic::AssertUnwindSafe(|| inner.draw_text(text, style, pos)))
        });
        match attempt {
            Ok(Err(DrawingErrorKind::FontError(_))) | Err(_) => {
                self.text_unsupported = true;
                self.draw_text_fallback(text, style, pos)
            }
            Ok(result) => result,
        }
    }

    fn estimate_text_size<TStyle: BackendTextStyle>(
        &self,
        text: &str,
        style: &TStyle,
    ) -> Result<(u32, u32), DrawingErrorKind<Self::ErrorType>> {
        self.inner.estimate_text_size(text, style)
    }
}

impl<DB: DrawingBackend> FontSafeBackend<DB> {
    fn draw_text_fallback<TStyle: BackendTextStyle>(
        &mut self,
        text: &str,
        style: &TStyle,
        pos: BackendCoord,
    ) -> Result<(), DrawingErrorKind<DB::ErrorType>> {
        let color = style.color();
        if color.alpha == 0.0 || text.trim().is_empty() {
            return Ok(());
        }

        let scale = glyph_scale(style.size());
        let (width, height) = text_extent(text, scale);
        let anchor = style.anchor();
        let left = match anchor.h_pos {
            text_anchor::HPos::Left => 0,
            text_anchor::HPos::Center => -width / 2,
            text_anchor::HPos::Right => -width,
        };
        let top = match anchor.v_pos {
            text_anchor::VPos::Top => 0,
            text_anchor::VPos::Center => -height / 2,
            text_anchor::VPos::Bottom => -height,
        };

        // Offsets are laid out unrotated relative to `pos`, then turned by the style transform.
        let transform = style.transform();
        let mut cursor = left;
        for ch in text.chars() {
            let Some(shape) = glyph(ch) else {
                cursor += scale * SPACE_WIDTH;
                continue;
            };
            for (row, bits) in shape.rows.iter().enumerate() {
                for col in 0..shape.width {
                    if bits & (1 << (shape.width - 1 - col)) == 0 {
                        continue;
                    }
                    let x = cursor + i32::from(col) * scale;
                    let y = top + row as i32 * scale;
                    for sy in 0..scale {
                        for sx in 0..scale {
                            let (dx, dy) = transform.transform(x + sx, y + sy);
                            self.inner.draw_pixel((pos.0 + dx, pos.1 + dy), color)?;
                        }
                    }
                }
            }
            cursor += scale * (i32::from(shape.width) + 1);
        }
        Ok(())
    }
}

/// Runs `f` with a no-op panic hook so an expected, caught panic prints nothing.
fn silence_panics<T>(f: impl FnOnce() -> T) -> T {
    let _guard = HOOK_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let previous = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let out = f();
    panic::set_hook(previous);
    out
}

fn glyph_scale(font_size: f64) -> i32 {
    (font_size / UNIT_FONT_SIZE).round().max(1.0) as i32
}

/// Pixel width and height of `text` drawn at `scale`.
fn text_extent(text: &str, scale: i32) -> (i32, i32) {
    let advance: i32 = text
        .chars()
        .map(|ch| glyph(ch).map_or(SPACE_WIDTH, |shape| i32::from(shape.width) + 1))
        .sum();
    ((advance - 1).max(0) * scale, GLYPH_HEIGHT as i32 * scale)
}

#[derive(Clone, Copy, Debug)]
pub struct Glyph {
    pub ch: char,
    pub width: u8,
    pub rows: [u8; GLYPH_HEIGHT],
}

const fn g(ch: char, width: u8, rows: [u8; GLYPH_HEIGHT]) -> Glyph {
    Glyph { ch, width, rows }
}

/// Case-folded lookup; lowercase letters share the uppercase shapes.
pub fn glyph(ch: char) -> Option<&'static Glyph> {
    let upper = ch.to_ascii_uppercase();
    GLYPHS.iter().find(|glyph| glyph.ch == upper)
}

#[rustfmt::skip]
static GLYPHS: &[Glyph] = &[
    g('A', 5, [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001]),
    g('B', 5, [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110]),
    g('C', 5, [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110]),
    g('D', 5, [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110]),
    g('E', 5, [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111]),
    g('F', 5, [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000]),
    g('G', 5, [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111]),
    g('H', 5, [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001]),
    g('I', 3, [0b111, 0b010, 0b010, 0b010, 0b010, 0b010, 0b111]),
    g('J', 5, [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100]),
    g('K', 5, [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001]),
    g('L', 5, [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111]),
    g('M', 5, [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001]),
    g('N', 5, [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001]),
    g('O', 5, [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110]),
    g('P', 5, [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000]),
    g('Q', 5, [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101]),
    g('R', 5, [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001]),
    g('S', 5, [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110]),
    g('T', 5, [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100]),
    g('U', 5, [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110]),
    g('V', 5, [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100]),
    g('W', 5, [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010]),
    g('X', 5, [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001]),
    g('Y', 5, [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100]),
    g('Z', 5, [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111]),
    g('0', 5, [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110]),
    g('1', 3, [0b010, 0b110, 0b010, 0b010, 0b010, 0b010, 0b111]),
    g('2', 5, [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111]),
    g('3', 5, [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110]),
    g('4', 5, [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010]),
    g('5', 5, [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110]),
    g('6', 5, [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110]),
    g('7', 5, [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000]),
    g('8', 5, [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110]),
    g('9', 5, [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100]),
    g('.', 1, [0b0, 0b0, 0b0, 0b0, 0b0, 0b0, 0b1]),
    g(',', 2, [0b00, 0b00, 0b00, 0b00, 0b00, 0b01, 0b10]),
    g('-', 3, [0b000, 0b000, 0b000, 0b111, 0b000, 0b000, 0b000]),
    g('(', 3, [0b001, 0b010, 0b100, 0b100, 0b100, 0b010, 0b001]),
    g(')', 3, [0b100, 0b010, 0b001, 0b001, 0b001, 0b010, 0b100]),
    g(':', 1, [0b0, 0b1, 0b0, 0b0, 0b0, 0b1, 0b0]),
    g('/', 5, [0b00001, 0b00010, 0b00010, 0b00100, 0b01000, 0b01000, 0b10000]),
    g('%', 5, [0b11001, 0b11010, 0b00010, 0b00100, 0b01000, 0b01011, 0b10011]),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{DEFAULT_TITLE, X_AXIS_LABEL, Y_AXIS_LABEL};
    use crate::Variant;
    use plotters::prelude::*;
    use plotters::style::TextStyle;
    use plotters_backend::text_anchor::{HPos, Pos, VPos};

    const W: u32 = 320;
    const H: u32 = 200;

    fn text_style(size: f64) -> TextStyle<'static> {
        FontDesc::new(FontFamily::SansSerif, size, FontStyle::Normal).color(&BLACK)
    }

    /// Bounding box `(x0, y0, x1, y1)` of dark pixels in an RGB buffer, plus their count.
    fn dark_pixels(buf: &[u8]) -> Option<((u32, u32, u32, u32), usize)> {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        let mut count = 0;
        for (i, px) in buf.chunks(3).enumerate() {
            if px.iter().any(|&c| c > 100) {
                continue;
            }
            count += 1;
            let (x, y) = (i as u32 % W, i as u32 / W);
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }
        bounds.map(|b| (b, count))
    }

    #[test]
    fn bitmap_text_falls_back_to_builtin_font() {
        let mut buf = vec![255u8; (W * H * 3) as usize];
        {
            let mut backend = FontSafeBackend::new(BitMapBackend::with_buffer(&mut buf, (W, H)));
            backend
                .draw_text("Runtimes", &text_style(28.0), (10, 10))
                .unwrap();
            assert!(backend.text_unsupported);
            backend.draw_text("Iteration", &text_style(18.0), (10, 60)).unwrap();
        }

        let ((x0, y0, x1, y1), count) = dark_pixels(&buf).expect("no text drawn");
        assert!(count > 100, "only {count} dark pixels");
        assert_eq!((x0, y0), (10, 10));
        // Scale 3 title on top, scale 2 label starting at row 60.
        assert!(x1 > 100);
        assert_eq!(y1, 60 + 2 * GLYPH_HEIGHT as u32 - 1);
    }

    #[test]
    fn centered_text_straddles_its_anchor() {
        let mut buf = vec![255u8; (W * H * 3) as usize];
        {
            let mut backend = FontSafeBackend::new(BitMapBackend::with_buffer(&mut buf, (W, H)));
            let style = text_style(18.0).pos(Pos::new(HPos::Center, VPos::Center));
            backend.draw_text("HISTOGRAM", &style, (160, 100)).unwrap();
        }

        let ((x0, y0, x1, y1), _) = dark_pixels(&buf).expect("no text drawn");
        assert!(x0 < 160 && x1 > 160);
        assert!(y0 < 100 && y1 > 100);
    }

    #[test]
    fn rotated_text_runs_up_the_page() {
        let mut buf = vec![255u8; (W * H * 3) as usize];
        {
            let mut backend = FontSafeBackend::new(BitMapBackend::with_buffer(&mut buf, (W, H)));
            let style = text_style(18.0).transform(FontTransform::Rotate270);
            backend.draw_text("Time", &style, (20, 150)).unwrap();
        }

        let ((x0, y0, x1, y1), _) = dark_pixels(&buf).expect("no text drawn");
        // The glyph rows become columns right of the anchor and the text climbs above it.
        assert!(x0 >= 20 && x1 < 20 + 2 * GLYPH_HEIGHT as u32);
        assert!(y1 <= 150 && y0 < 120);
        assert!(y1 - y0 > x1 - x0);
    }

    #[test]
    fn native_text_is_left_to_the_backend() {
        let mut svg = String::new();
        {
            let mut backend = FontSafeBackend::new(SVGBackend::with_string(&mut svg, (W, H)));
            backend.draw_text("Iteration", &text_style(18.0), (10, 10)).unwrap();
            assert!(!backend.text_unsupported);
            backend.present().unwrap();
        }
        assert!(svg.contains(">Iteration\n</text>"));
    }

    #[test]
    fn chart_text_is_fully_covered() {
        let mut texts = vec![DEFAULT_TITLE, X_AXIS_LABEL, Y_AXIS_LABEL, "0.25", "10"];
        texts.extend(Variant::ALL.iter().map(|v| v.label()));
        for text in texts {
            for ch in text.chars().filter(|c| !c.is_whitespace()) {
                assert!(glyph(ch).is_some(), "no fallback glyph for {ch:?} in {text:?}");
            }
        }
    }

    #[test]
    fn glyph_rows_fit_their_width() {
        for glyph in GLYPHS {
            for row in glyph.rows {
                assert!(u32::from(row) < (1 << glyph.width), "{:?} overflows", glyph.ch);
            }
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(glyph('m').map(|g| g.ch), Some('M'));
        assert!(glyph('~').is_none());
    }

    #[test]
    fn extent_scales_with_font_size() {
        // "I1" advances 4 + 4 columns, minus the trailing gap.
        assert_eq!(text_extent("I1", 1), (7, 7));
        assert_eq!(text_extent("I1", glyph_scale(18.0)), (14, 14));
        assert_eq!(glyph_scale(4.0), 1);
    }
}
