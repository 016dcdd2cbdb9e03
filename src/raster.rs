use crate::config::GlobeConfig;
use crate::globe::ShadedPoint;
use rand::{rngs::StdRng, Rng};

/* ---------------- color ---------------- */

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Rgb {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
}

impl Rgb {
    pub(crate) const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    fn scale(self, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        Rgb {
            r: (self.r as f32 * t) as u8,
            g: (self.g as f32 * t) as u8,
            b: (self.b as f32 * t) as u8,
        }
    }

    fn add(self, other: Rgb) -> Rgb {
        Rgb {
            r: self.r.saturating_add(other.r),
            g: self.g.saturating_add(other.g),
            b: self.b.saturating_add(other.b),
        }
    }

    fn lerp(self, other: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t) as u8;
        Rgb {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
        }
    }
}

/* ---------------- frame ---------------- */

/// Finished presentation grid: one glyph and one foreground color per
/// terminal cell, whichever rasterizer produced it.
#[derive(Clone)]
pub(crate) struct Frame {
    pub(crate) w: usize,
    pub(crate) h: usize,
    pub(crate) chars: Vec<char>,
    pub(crate) colors: Vec<Rgb>,
}

impl Frame {
    pub(crate) fn new(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            chars: vec![' '; w * h],
            colors: vec![Rgb::BLACK; w * h],
        }
    }

    /// Text rows with trailing whitespace stripped, for plain dumps.
    pub(crate) fn rows(&self) -> Vec<String> {
        (0..self.h)
            .map(|y| {
                let row: String = self.chars[y * self.w..(y + 1) * self.w].iter().collect();
                row.trim_end().to_string()
            })
            .collect()
    }
}

/* ---------------- depth buffer ---------------- */

/// Flat cell grid with a per-cell depth score. A write lands only when its
/// depth strictly beats the stored one, so after a frame each cell holds
/// its nearest contributor and ties keep the first writer.
pub(crate) struct DepthBuffer<T: Copy> {
    w: usize,
    h: usize,
    background: T,
    cells: Vec<T>,
    depth: Vec<f32>,
}

impl<T: Copy> DepthBuffer<T> {
    pub(crate) fn new(w: usize, h: usize, background: T) -> Self {
        Self {
            w,
            h,
            background,
            cells: vec![background; w * h],
            depth: vec![f32::NEG_INFINITY; w * h],
        }
    }

    pub(crate) fn clear(&mut self) {
        self.cells.fill(self.background);
        self.depth.fill(f32::NEG_INFINITY);
    }

    /// Depth-tested write. On a win the value is stored and a handle to the
    /// slot comes back so the caller may still swap the value; the stored
    /// depth is final either way. Out-of-range writes are dropped.
    pub(crate) fn put(&mut self, x: usize, y: usize, depth: f32, value: T) -> Option<&mut T> {
        if x >= self.w || y >= self.h {
            return None;
        }
        let i = y * self.w + x;
        if depth > self.depth[i] {
            self.depth[i] = depth;
            self.cells[i] = value;
            Some(&mut self.cells[i])
        } else {
            None
        }
    }

    pub(crate) fn cell(&self, x: usize, y: usize) -> T {
        self.cells[y * self.w + x]
    }

    pub(crate) fn depth_at(&self, x: usize, y: usize) -> f32 {
        self.depth[y * self.w + x]
    }

    #[cfg(test)]
    pub(crate) fn depths(&self) -> &[f32] {
        &self.depth
    }
}

/* ---------------- glyph rasterizer ---------------- */

const HACKER_GREEN: Rgb = Rgb {
    r: 0x6a,
    g: 0xff,
    b: 0x6a,
};

#[derive(Clone, Copy, PartialEq, Eq)]
struct GlyphCell {
    ch: u8,
    level: u8,
}

const BLANK: GlyphCell = GlyphCell { ch: b' ', level: 0 };

/// Character-grid rasterizer: one ramp glyph per terminal cell, green
/// foreground scaled by brightness.
pub(crate) struct GlyphRaster {
    buf: DepthBuffer<GlyphCell>,
    palette: &'static [u8],
    glitch_palette: &'static [u8],
}

impl GlyphRaster {
    pub(crate) fn new(cfg: &GlobeConfig) -> Self {
        Self {
            buf: DepthBuffer::new(cfg.width, cfg.height, BLANK),
            palette: cfg.palette,
            glitch_palette: cfg.glitch_palette,
        }
    }

    pub(crate) fn begin(&mut self) {
        self.buf.clear();
    }

    pub(crate) fn plot(&mut self, p: &ShadedPoint, glitch_prob: f32, rng: &mut StdRng) {
        let cell = GlyphCell {
            ch: self.palette[p.level],
            level: p.level as u8,
        };
        if let Some(slot) = self.buf.put(p.x, p.y, p.depth, cell) {
            // the depth test already picked its winner; a glitch only
            // swaps the glyph that shows there
            if glitch_prob > 0.0 && rng.gen::<f32>() < glitch_prob {
                slot.ch = self.glitch_palette[rng.gen_range(0..self.glitch_palette.len())];
            }
        }
    }

    pub(crate) fn finish(&self, frame: &mut Frame) {
        let top = (self.palette.len() - 1).max(1) as f32;
        for (i, cell) in self.buf.cells.iter().enumerate() {
            frame.chars[i] = cell.ch as char;
            frame.colors[i] = if cell.ch == b' ' {
                Rgb::BLACK
            } else {
                HACKER_GREEN.scale(0.35 + 0.65 * (cell.level as f32 / top))
            };
        }
    }
}

/* ---------------- shade rasterizer ---------------- */

// Cyan ramp stops for the shade variant, darkest first.
const SHADE_DEEP: Rgb = Rgb {
    r: 0x06,
    g: 0xb6,
    b: 0xd4,
};
const SHADE_MID: Rgb = Rgb {
    r: 0x0e,
    g: 0xa5,
    b: 0xe9,
};
const SHADE_RIM: Rgb = Rgb {
    r: 0x22,
    g: 0xd3,
    b: 0xee,
};

/// Colors a glitched subpixel may flash in the shade variant.
const SHADE_GLITCH: [Rgb; 3] = [
    Rgb {
        r: 0xff,
        g: 0xff,
        b: 0xff,
    },
    HACKER_GREEN,
    Rgb {
        r: 0xff,
        g: 0x40,
        b: 0x40,
    },
];

fn shade_ramp(levels: usize) -> Vec<Rgb> {
    let top = (levels - 1).max(1) as f32;
    (0..levels)
        .map(|i| {
            let t = i as f32 / top;
            let base = if t < 0.5 {
                SHADE_DEEP.lerp(SHADE_MID, t * 2.0)
            } else {
                SHADE_MID.lerp(SHADE_RIM, t * 2.0 - 1.0)
            };
            base.scale(0.25 + 0.75 * t)
        })
        .collect()
}

/// Braille-subpixel rasterizer: the same pipeline on a lattice two dots
/// wide and four tall per cell, packed into braille glyphs and colored by
/// a cyan ramp with a fresnel rim on the silhouette.
pub(crate) struct ShadeRaster {
    sub: DepthBuffer<Rgb>,
    cols: usize,
    rows: usize,
    ramp: Vec<Rgb>,
}

impl ShadeRaster {
    pub(crate) fn new(cfg: &GlobeConfig) -> Self {
        Self {
            sub: DepthBuffer::new(cfg.width * 2, cfg.height * 4, Rgb::BLACK),
            cols: cfg.width,
            rows: cfg.height,
            ramp: shade_ramp(cfg.palette.len()),
        }
    }

    pub(crate) fn begin(&mut self) {
        self.sub.clear();
    }

    pub(crate) fn plot(&mut self, p: &ShadedPoint, glitch_prob: f32, rng: &mut StdRng) {
        // rim light grows as the normal turns away from the view axis;
        // view-facing normals have negative z
        let facing = (-p.normal[2]).clamp(0.0, 1.0);
        let rim = (1.0 - facing) * (1.0 - facing) * 0.5;
        let color = self.ramp[p.level].add(SHADE_RIM.scale(rim));
        if let Some(slot) = self.sub.put(p.x, p.y, p.depth, color) {
            if glitch_prob > 0.0 && rng.gen::<f32>() < glitch_prob {
                *slot = SHADE_GLITCH[rng.gen_range(0..SHADE_GLITCH.len())];
            }
        }
    }

    pub(crate) fn finish(&self, frame: &mut Frame) {
        for cy in 0..self.rows {
            for cx in 0..self.cols {
                let mut mask: u8 = 0;
                let (mut r, mut g, mut b, mut n) = (0u32, 0u32, 0u32, 0u32);
                for dy in 0..4 {
                    for dx in 0..2 {
                        let (sx, sy) = (cx * 2 + dx, cy * 4 + dy);
                        if self.sub.depth_at(sx, sy) > f32::NEG_INFINITY {
                            mask |= braille_bit(dx, dy);
                            let c = self.sub.cell(sx, sy);
                            r += c.r as u32;
                            g += c.g as u32;
                            b += c.b as u32;
                            n += 1;
                        }
                    }
                }
                let i = cy * self.cols + cx;
                if mask == 0 {
                    frame.chars[i] = ' ';
                    frame.colors[i] = Rgb::BLACK;
                } else {
                    frame.chars[i] = char::from_u32(0x2800 + mask as u32).unwrap_or(' ');
                    frame.colors[i] = Rgb {
                        r: (r / n) as u8,
                        g: (g / n) as u8,
                        b: (b / n) as u8,
                    };
                }
            }
        }
    }
}

// Braille dot bits for a 2x4 subcell:
//   (0,0)=0x01 (1,0)=0x08
//   (0,1)=0x02 (1,1)=0x10
//   (0,2)=0x04 (1,2)=0x20
//   (0,3)=0x40 (1,3)=0x80
fn braille_bit(dx: usize, dy: usize) -> u8 {
    match (dx, dy) {
        (0, 0) => 0x01,
        (0, 1) => 0x02,
        (0, 2) => 0x04,
        (0, 3) => 0x40,
        (1, 0) => 0x08,
        (1, 1) => 0x10,
        (1, 2) => 0x20,
        (1, 3) => 0x80,
        _ => 0x00,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::globe::{sweep, Rotation};
    use rand::SeedableRng;

    fn point(x: usize, y: usize, depth: f32, level: usize) -> ShadedPoint {
        ShadedPoint {
            x,
            y,
            depth,
            level,
            normal: [0.0, 0.0, -1.0],
        }
    }

    #[test]
    fn test_frame_rows_trim_trailing_blanks() {
        let mut frame = Frame::new(8, 2);
        frame.chars[2] = '#';
        let rows = frame.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], "  #");
        assert_eq!(rows[1], "");
    }

    #[test]
    fn test_nearest_point_wins_in_any_order() {
        let mut a = DepthBuffer::new(4, 4, 0u8);
        a.put(1, 1, 0.2, 1);
        a.put(1, 1, 0.5, 2);
        let mut b = DepthBuffer::new(4, 4, 0u8);
        b.put(1, 1, 0.5, 2);
        b.put(1, 1, 0.2, 1);
        assert_eq!(a.cell(1, 1), 2);
        assert_eq!(b.cell(1, 1), 2);
        assert_eq!(a.depth_at(1, 1), 0.5);
    }

    #[test]
    fn test_equal_depth_keeps_first_writer() {
        let mut buf = DepthBuffer::new(4, 4, 0u8);
        assert!(buf.put(2, 2, 0.3, 7).is_some());
        assert!(buf.put(2, 2, 0.3, 9).is_none());
        assert_eq!(buf.cell(2, 2), 7);
    }

    #[test]
    fn test_out_of_range_put_is_dropped() {
        let mut buf = DepthBuffer::new(4, 4, 0u8);
        assert!(buf.put(4, 0, 0.9, 1).is_none());
        assert!(buf.put(0, 4, 0.9, 1).is_none());
    }

    #[test]
    fn test_clear_resets_cells_and_depths() {
        let mut buf = DepthBuffer::new(2, 2, 0u8);
        buf.put(0, 0, 0.4, 5);
        buf.clear();
        assert_eq!(buf.cell(0, 0), 0);
        assert_eq!(buf.depth_at(0, 0), f32::NEG_INFINITY);
        // shallow writes land again after the reset
        assert!(buf.put(0, 0, 0.1, 3).is_some());
    }

    #[test]
    fn test_glyph_raster_draws_palette_glyphs() {
        let cfg = GlobeConfig::new(40, 16);
        let mut raster = GlyphRaster::new(&cfg);
        let mut rng = StdRng::seed_from_u64(1);
        raster.begin();
        raster.plot(&point(3, 2, 0.4, 15), 0.0, &mut rng);
        let mut frame = Frame::new(cfg.width, cfg.height);
        raster.finish(&mut frame);
        assert_eq!(frame.chars[2 * cfg.width + 3], '#');
        assert_eq!(frame.chars[0], ' ');
        assert_eq!(frame.colors[0], Rgb::BLACK);
    }

    #[test]
    fn test_glyph_color_scales_with_level() {
        let cfg = GlobeConfig::new(40, 16);
        let mut raster = GlyphRaster::new(&cfg);
        let mut rng = StdRng::seed_from_u64(1);
        raster.begin();
        raster.plot(&point(0, 0, 0.4, 1), 0.0, &mut rng);
        raster.plot(&point(1, 0, 0.4, 15), 0.0, &mut rng);
        let mut frame = Frame::new(cfg.width, cfg.height);
        raster.finish(&mut frame);
        let dim = frame.colors[0];
        let bright = frame.colors[1];
        assert!(bright.g > dim.g);
        assert_eq!(bright.g, 0xff);
    }

    #[test]
    fn test_glitch_swaps_glyph_but_never_the_depth_winner() {
        let cfg = GlobeConfig::new(40, 16);
        let rot = Rotation {
            tilt: 0.5,
            spin: 1.0,
            wobble: 0.0,
        };
        let mut pts = Vec::new();
        sweep(&cfg, &rot, |p| pts.push(p));
        assert!(!pts.is_empty());

        let mut plain = GlyphRaster::new(&cfg);
        let mut rng = StdRng::seed_from_u64(3);
        plain.begin();
        for p in &pts {
            plain.plot(p, 0.0, &mut rng);
        }

        let mut glitched = GlyphRaster::new(&cfg);
        let mut rng = StdRng::seed_from_u64(3);
        glitched.begin();
        for p in &pts {
            glitched.plot(p, 1.0, &mut rng);
        }

        // same geometry either way
        assert_eq!(plain.buf.depths(), glitched.buf.depths());

        // every visible cell now shows a substitution glyph
        let mut a = Frame::new(cfg.width, cfg.height);
        let mut b = Frame::new(cfg.width, cfg.height);
        plain.finish(&mut a);
        glitched.finish(&mut b);
        let mut swapped = 0;
        for (ca, cb) in a.chars.iter().zip(&b.chars) {
            if *ca != ' ' && ca != cb {
                assert!(cfg.glitch_palette.contains(&(*cb as u8)));
                swapped += 1;
            }
        }
        assert!(swapped > 0);
    }

    #[test]
    fn test_braille_bits_cover_all_eight_dots() {
        let mut mask = 0u8;
        for dy in 0..4 {
            for dx in 0..2 {
                let bit = braille_bit(dx, dy);
                assert_eq!(mask & bit, 0);
                mask |= bit;
            }
        }
        assert_eq!(mask, 0xff);
    }

    #[test]
    fn test_shade_packs_single_dot_into_braille() {
        let cfg = GlobeConfig::new(40, 16);
        let mut raster = ShadeRaster::new(&cfg);
        let mut rng = StdRng::seed_from_u64(1);
        raster.begin();
        // top-left subpixel of the top-left cell
        raster.plot(&point(0, 0, 0.3, 8), 0.0, &mut rng);
        let mut frame = Frame::new(cfg.width, cfg.height);
        raster.finish(&mut frame);
        assert_eq!(frame.chars[0], '\u{2801}');
        assert_ne!(frame.colors[0], Rgb::BLACK);
        assert_eq!(frame.chars[1], ' ');
    }

    #[test]
    fn test_shade_ramp_runs_dark_to_bright() {
        let ramp = shade_ramp(16);
        let lum = |c: Rgb| c.r as u32 + c.g as u32 + c.b as u32;
        assert!(lum(ramp[0]) < lum(ramp[8]));
        assert!(lum(ramp[8]) < lum(ramp[15]));
    }

    #[test]
    fn test_shade_rim_brightens_grazing_normals() {
        let cfg = GlobeConfig::new(40, 16);
        let mut raster = ShadeRaster::new(&cfg);
        let mut rng = StdRng::seed_from_u64(1);
        raster.begin();
        let facing = ShadedPoint {
            x: 0,
            y: 0,
            depth: 0.3,
            level: 8,
            normal: [0.0, 0.0, -1.0],
        };
        let grazing = ShadedPoint {
            x: 1,
            y: 0,
            depth: 0.3,
            level: 8,
            normal: [1.0, 0.0, 0.0],
        };
        raster.plot(&facing, 0.0, &mut rng);
        raster.plot(&grazing, 0.0, &mut rng);
        let flat = raster.sub.cell(0, 0);
        let rimmed = raster.sub.cell(1, 0);
        let lum = |c: Rgb| c.r as u32 + c.g as u32 + c.b as u32;
        assert!(lum(rimmed) > lum(flat));
    }
}
