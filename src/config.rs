use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/* ---------------- globe constants ---------------- */

pub(crate) const MIN_COLS: usize = 40;
pub(crate) const MAX_COLS: usize = 110;
pub(crate) const MIN_ROWS: usize = 16;
pub(crate) const MAX_ROWS: usize = 60;

/// Brightness ramp, darkest first.
pub(crate) const LUM: &[u8] = b" .,:;i1tfLCG08@#";
/// Glyphs a glitched cell may flash instead of its ramp glyph.
pub(crate) const GLITCH: &[u8] = b"<>/*$%#@[]{}()=+-";

const DEFAULT_LIGHT: [f32; 3] = [0.4, 0.9, -0.2];

/// Immutable per-run parameters of the globe pipeline. Built once, never
/// mutated mid-run; changing size or variant means building a new driver.
#[derive(Clone, Debug)]
pub(crate) struct GlobeConfig {
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) theta_step: f32,
    pub(crate) phi_step: f32,
    pub(crate) tilt_step: f32,
    pub(crate) spin_step: f32,
    pub(crate) camera_dist: f32,
    pub(crate) light: [f32; 3],
    pub(crate) palette: &'static [u8],
    pub(crate) glitch_palette: &'static [u8],
    pub(crate) glitch_base: f32,
    pub(crate) x_center: f32,
    pub(crate) y_center: f32,
    pub(crate) x_scale: f32,
    pub(crate) y_scale: f32,
}

impl GlobeConfig {
    /// Build a config for the requested grid, clamped into the supported
    /// range before any buffer gets sized from it.
    pub(crate) fn new(cols: u16, rows: u16) -> Self {
        let width = (cols as usize).clamp(MIN_COLS, MAX_COLS);
        let height = (rows as usize).clamp(MIN_ROWS, MAX_ROWS);
        let (x_center, y_center, x_scale, y_scale) = placement(width, height);
        Self {
            width,
            height,
            theta_step: 0.09,
            phi_step: 0.06,
            tilt_step: 0.009,
            spin_step: 0.03,
            camera_dist: 3.5,
            light: normalize(DEFAULT_LIGHT),
            palette: LUM,
            glitch_palette: GLITCH,
            glitch_base: 0.004,
            x_center,
            y_center,
            x_scale,
            y_scale,
        }
    }

    /// Same globe, projected onto the braille subpixel lattice: two dots
    /// per cell across, four down. Skips the grid clamp since the cell
    /// grid was already clamped.
    pub(crate) fn subpixel(&self) -> Self {
        let mut sub = self.clone();
        sub.width = self.width * 2;
        sub.height = self.height * 4;
        let (xc, yc, xs, ys) = placement(sub.width, sub.height);
        sub.x_center = xc;
        sub.y_center = yc;
        sub.x_scale = xs;
        sub.y_scale = ys;
        sub
    }
}

fn placement(w: usize, h: usize) -> (f32, f32, f32, f32) {
    let x_center = (w / 2) as f32;
    let y_center = (h / 2) as f32;
    let x_scale = w as f32 / 2.0 * 0.95;
    let y_scale = h as f32 / 2.0 * 0.9;
    (x_center, y_center, x_scale, y_scale)
}

fn normalize(v: [f32; 3]) -> [f32; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len <= f32::EPSILON {
        let d = DEFAULT_LIGHT;
        let dl = (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt();
        return [d[0] / dl, d[1] / dl, d[2] / dl];
    }
    [v[0] / len, v[1] / len, v[2] / len]
}

/* ---------------- persisted settings ---------------- */

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum Variant {
    Glyph,
    Shade,
}

impl Variant {
    pub(crate) fn toggled(self) -> Self {
        match self {
            Variant::Glyph => Variant::Shade,
            Variant::Shade => Variant::Glyph,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Variant::Glyph => "glyph",
            Variant::Shade => "shade",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct Settings {
    pub(crate) fps_cap: u32,
    pub(crate) enable_color: bool,
    pub(crate) variant: Variant,
    pub(crate) glitch: bool,
    pub(crate) seed: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fps_cap: 30,
            enable_color: true,
            variant: Variant::Glyph,
            glitch: true,
            seed: 0xC0FFEE,
        }
    }
}

pub(crate) struct Paths {
    pub(crate) settings_path: PathBuf,
}

pub(crate) fn project_paths() -> Result<Paths> {
    let dirs = ProjectDirs::from("io", "glitchglobe", "glitchglobe")
        .context("could not determine platform data directory")?;
    let data = dirs.data_dir().to_path_buf();
    fs::create_dir_all(&data).context("creating data directory")?;
    Ok(Paths {
        settings_path: data.join("settings.json"),
    })
}

/// Missing or unreadable settings are not an error, the defaults are fine.
pub(crate) fn load_settings(path: &Path) -> Settings {
    match fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text).unwrap_or_default(),
        Err(_) => Settings::default(),
    }
}

/// Write-to-temp then rename, so a crash mid-save never truncates the
/// previous settings file.
pub(crate) fn save_settings_atomic(path: &Path, settings: &Settings) -> Result<()> {
    let json = serde_json::to_string_pretty(settings).context("serializing settings")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_clamped_to_supported_range() {
        let tiny = GlobeConfig::new(10, 5);
        assert_eq!(tiny.width, MIN_COLS);
        assert_eq!(tiny.height, MIN_ROWS);

        let huge = GlobeConfig::new(400, 200);
        assert_eq!(huge.width, MAX_COLS);
        assert_eq!(huge.height, MAX_ROWS);

        let stock = GlobeConfig::new(68, 34);
        assert_eq!(stock.width, 68);
        assert_eq!(stock.height, 34);
    }

    #[test]
    fn test_placement_from_grid() {
        let cfg = GlobeConfig::new(68, 34);
        assert_eq!(cfg.x_center, 34.0);
        assert_eq!(cfg.y_center, 17.0);
        assert!((cfg.x_scale - 32.3).abs() < 1e-4);
        assert!((cfg.y_scale - 15.3).abs() < 1e-4);
    }

    #[test]
    fn test_light_is_unit_length() {
        let cfg = GlobeConfig::new(68, 34);
        let l = cfg.light;
        let len = (l[0] * l[0] + l[1] * l[1] + l[2] * l[2]).sqrt();
        assert!((len - 1.0).abs() < 1e-5);

        let l = normalize([0.0, 0.0, 3.0]);
        assert!((l[2] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_zero_light_falls_back_to_default() {
        let cfg = GlobeConfig::new(68, 34);
        assert_eq!(normalize([0.0, 0.0, 0.0]), cfg.light);
    }

    #[test]
    fn test_subpixel_doubles_and_quadruples() {
        let cfg = GlobeConfig::new(68, 34);
        let sub = cfg.subpixel();
        assert_eq!(sub.width, 136);
        assert_eq!(sub.height, 136);
        assert_eq!(sub.x_center, 68.0);
        assert_eq!(sub.y_center, 68.0);
        assert!((sub.x_scale - 64.6).abs() < 1e-4);
        assert!((sub.y_scale - 61.2).abs() < 1e-4);
        // angular resolution and camera stay the same
        assert_eq!(sub.theta_step, cfg.theta_step);
        assert_eq!(sub.camera_dist, cfg.camera_dist);
    }

    #[test]
    fn test_palettes_shape() {
        assert_eq!(LUM.len(), 16);
        assert_eq!(LUM[0], b' ');
        assert_eq!(LUM[15], b'#');
        assert!(!GLITCH.contains(&b' '));
    }

    #[test]
    fn test_load_settings_missing_file_gives_defaults() {
        let s = load_settings(Path::new("/nonexistent/glitchglobe/settings.json"));
        assert_eq!(s.fps_cap, 30);
        assert_eq!(s.variant, Variant::Glyph);
        assert!(s.glitch);
        assert!(s.enable_color);
    }

    #[test]
    fn test_load_settings_garbage_gives_defaults() {
        let path = std::env::temp_dir().join(format!("gg_garbage_{}.json", std::process::id()));
        fs::write(&path, "{ not json").unwrap();
        let s = load_settings(&path);
        assert_eq!(s.seed, 0xC0FFEE);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_settings_save_round_trip() {
        let path = std::env::temp_dir().join(format!("gg_settings_{}.json", std::process::id()));
        let settings = Settings {
            fps_cap: 45,
            enable_color: false,
            variant: Variant::Shade,
            glitch: false,
            seed: 99,
        };
        save_settings_atomic(&path, &settings).unwrap();
        let loaded = load_settings(&path);
        assert_eq!(loaded.fps_cap, 45);
        assert!(!loaded.enable_color);
        assert_eq!(loaded.variant, Variant::Shade);
        assert!(!loaded.glitch);
        assert_eq!(loaded.seed, 99);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_variant_toggle_round_trips() {
        assert_eq!(Variant::Glyph.toggled(), Variant::Shade);
        assert_eq!(Variant::Shade.toggled().label(), "glyph");
    }
}
