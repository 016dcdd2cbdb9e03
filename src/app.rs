use crate::config::{
    load_settings, project_paths, save_settings_atomic, GlobeConfig, Settings, Variant,
};
use crate::driver::{CaptureTarget, Driver, RenderTarget};
use crate::input::{collect_keys_nonblocking, map_key, Action};
use crate::raster::Frame;
use crate::render::{draw_text, Cell, CellBuffer, Terminal};
use crate::CliArgs;
use anyhow::Result;
use crossterm::style::Color;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::thread;
use std::time::{Duration, Instant};

/// Preferred grid when the terminal has room for it.
const DEFAULT_COLS: u16 = 68;
const DEFAULT_ROWS: u16 = 34;

const MIN_FPS: u32 = 10;
const MAX_FPS: u32 = 240;

/* ---------------- layout ---------------- */

/// Pick the globe grid for a terminal: the stock size when it fits,
/// shrunk to the terminal when not, clamped either way.
fn fit_grid(term_cols: u16, term_rows: u16, forced: Option<(u16, u16)>) -> GlobeConfig {
    let (cols, rows) =
        forced.unwrap_or((term_cols.min(DEFAULT_COLS), term_rows.min(DEFAULT_ROWS)));
    GlobeConfig::new(cols, rows)
}

fn center_origin(term_cols: u16, term_rows: u16, w: usize, h: usize) -> (u16, u16) {
    let x = (term_cols as i32 - w as i32).max(0) / 2;
    let y = (term_rows as i32 - h as i32).max(0) / 2;
    (x as u16, y as u16)
}

/// Copies a finished frame into the terminal cell buffer. Blank cells are
/// skipped so the backdrop stays untouched.
struct TermTarget<'a> {
    buf: &'a mut CellBuffer,
    origin: (u16, u16),
    color: bool,
}

impl RenderTarget for TermTarget<'_> {
    fn accept(&mut self, frame: &Frame) -> bool {
        for y in 0..frame.h {
            for x in 0..frame.w {
                let i = y * frame.w + x;
                let ch = frame.chars[i];
                if ch == ' ' {
                    continue;
                }
                let c = frame.colors[i];
                let fg = if self.color {
                    Color::Rgb {
                        r: c.r,
                        g: c.g,
                        b: c.b,
                    }
                } else {
                    Color::Green
                };
                self.buf.set(
                    self.origin.0.saturating_add(x as u16),
                    self.origin.1.saturating_add(y as u16),
                    Cell {
                        ch,
                        fg,
                        bg: Color::Black,
                    },
                );
            }
        }
        true
    }
}

/* ---------------- interactive app ---------------- */

struct App {
    settings: Settings,
    driver: Driver,
    origin: (u16, u16),
    forced_size: Option<(u16, u16)>,
    show_hud: bool,
    show_help: bool,
    should_quit: bool,
    needs_full: bool,
}

impl App {
    fn new(settings: Settings, forced: Option<(u16, u16)>, cols: u16, rows: u16) -> Self {
        let cfg = fit_grid(cols, rows, forced);
        let origin = center_origin(cols, rows, cfg.width, cfg.height);
        let driver = Driver::new(cfg, settings.variant, settings.seed, settings.glitch);
        Self {
            settings,
            driver,
            origin,
            forced_size: forced,
            show_hud: true,
            show_help: false,
            should_quit: false,
            needs_full: true,
        }
    }

    /// Tear down the old driver and bring up a fresh one for the current
    /// terminal and settings. Used on resize and variant change, so the
    /// animation restarts from the home orientation.
    fn rebuild(&mut self, cols: u16, rows: u16) {
        let was_running = self.driver.is_running();
        self.driver.stop();
        let cfg = fit_grid(cols, rows, self.forced_size);
        self.origin = center_origin(cols, rows, cfg.width, cfg.height);
        self.driver =
            Driver::new(cfg, self.settings.variant, self.settings.seed, self.settings.glitch);
        if was_running {
            self.driver.start();
        }
        self.needs_full = true;
    }

    fn apply(&mut self, action: Action, cols: u16, rows: u16) {
        match action {
            Action::Quit => {
                self.driver.stop();
                self.should_quit = true;
            }
            Action::Back => {
                if self.show_help {
                    self.show_help = false;
                } else {
                    self.driver.stop();
                    self.should_quit = true;
                }
            }
            Action::ToggleVariant => {
                self.settings.variant = self.settings.variant.toggled();
                self.rebuild(cols, rows);
            }
            Action::ToggleGlitch => {
                self.settings.glitch = !self.settings.glitch;
                self.driver.set_glitch(self.settings.glitch);
            }
            Action::ToggleHud => self.show_hud = !self.show_hud,
            Action::ToggleHelp => self.show_help = !self.show_help,
            Action::Reseed => {
                let seed = StdRng::from_entropy().gen();
                self.settings.seed = seed;
                self.driver.reseed(seed);
            }
        }
    }

    fn run_loop(&mut self, term: &mut Terminal) -> Result<()> {
        let fps = self.settings.fps_cap.clamp(MIN_FPS, MAX_FPS);
        let frame_dt = Duration::from_millis(1000 / fps as u64);
        let mut fps_est = fps as f32;
        let mut fps_timer = 0.0f32;
        let mut fps_frames = 0u32;
        let mut last = Instant::now();

        while !self.should_quit {
            let frame_start = Instant::now();

            if term.resize_if_needed()? {
                self.rebuild(term.cols, term.rows);
            }

            for code in collect_keys_nonblocking(frame_dt)? {
                if let Some(action) = map_key(code) {
                    self.apply(action, term.cols, term.rows);
                }
            }
            if self.should_quit {
                break;
            }

            term.cur.clear(Color::Black);
            let mut target = TermTarget {
                buf: &mut term.cur,
                origin: self.origin,
                color: self.settings.enable_color,
            };
            self.driver.tick(&mut target);

            let dt = last.elapsed().as_secs_f32();
            last = Instant::now();
            fps_timer += dt;
            fps_frames += 1;
            if fps_timer >= 0.5 {
                fps_est = fps_frames as f32 / fps_timer;
                fps_timer = 0.0;
                fps_frames = 0;
            }

            if self.show_hud {
                self.draw_hud(term, fps_est);
            }
            if self.show_help {
                draw_help(term);
            }

            term.present(!self.needs_full)?;
            self.needs_full = false;

            sleep_to_cap(frame_start, fps);
        }
        Ok(())
    }

    fn draw_hud(&self, term: &mut Terminal, fps_est: f32) {
        let (w, h) = self.driver.grid();
        let hud = format!(
            "glitchglobe [{}] {}x{}  fps {:>3.0}  glitch {}  seed {:x}  |  q quit  v variant  g glitch  r reseed  ? help",
            self.driver.variant().label(),
            w,
            h,
            fps_est,
            if self.driver.glitch() { "on" } else { "off" },
            self.settings.seed,
        );
        draw_text(&mut term.cur, 0, 0, &hud, Color::DarkGrey, Color::Black);
    }
}

fn draw_help(term: &mut Terminal) {
    let lines = [
        "q / esc   quit",
        "v         glyph / shade variant",
        "g         glitch on / off",
        "h         hud on / off",
        "r         reseed the rng",
        "?         close this overlay",
    ];
    let maxlen = lines.iter().map(|l| l.len()).max().unwrap_or(0);
    let box_w = maxlen as u16 + 4;
    let box_h = lines.len() as u16 + 2;
    if term.cols < box_w || term.rows < box_h {
        return;
    }
    let x0 = (term.cols - box_w) / 2;
    let y0 = (term.rows - box_h) / 2;
    let fg = Color::White;
    let bg = Color::Black;
    draw_text(
        &mut term.cur,
        x0,
        y0,
        &format!("┌{}┐", "─".repeat(maxlen + 2)),
        fg,
        bg,
    );
    for (i, line) in lines.iter().enumerate() {
        draw_text(
            &mut term.cur,
            x0,
            y0 + 1 + i as u16,
            &format!("│ {line:<maxlen$} │"),
            fg,
            bg,
        );
    }
    draw_text(
        &mut term.cur,
        x0,
        y0 + 1 + lines.len() as u16,
        &format!("└{}┘", "─".repeat(maxlen + 2)),
        fg,
        bg,
    );
}

fn sleep_to_cap(frame_start: Instant, fps: u32) {
    let frame_ms = 1000 / fps.max(1) as u64;
    let elapsed = frame_start.elapsed().as_millis() as u64;
    if elapsed < frame_ms {
        thread::sleep(Duration::from_millis(frame_ms - elapsed));
    }
}

fn apply_cli(settings: &mut Settings, args: &CliArgs) {
    if let Some(fps) = args.fps {
        settings.fps_cap = fps;
    }
    if let Some(seed) = args.seed {
        settings.seed = seed;
    }
    if args.shade {
        settings.variant = Variant::Shade;
    }
    if args.no_color {
        settings.enable_color = false;
    }
    if args.no_glitch {
        settings.glitch = false;
    }
}

/* ---------------- entry points ---------------- */

pub(crate) fn run(args: &CliArgs) -> Result<()> {
    let paths = project_paths()?;
    let mut settings = load_settings(&paths.settings_path);
    apply_cli(&mut settings, args);

    let mut term = Terminal::begin()?;
    let mut app = App::new(settings, args.size, term.cols, term.rows);
    app.driver.start();
    let loop_res = app.run_loop(&mut term);

    // stop the driver before the surface goes away, restore the terminal
    // before reporting any loop error
    app.driver.stop();
    let end_res = term.end();
    loop_res?;
    end_res?;

    save_settings_atomic(&paths.settings_path, &app.settings)?;
    Ok(())
}

/// Render a few frames without a terminal and print the last one. Starts
/// from the default settings so the output depends only on the flags.
pub(crate) fn dump(args: &CliArgs, frames: u32) -> Result<()> {
    let mut settings = Settings::default();
    apply_cli(&mut settings, args);

    let (cols, rows) = args.size.unwrap_or((DEFAULT_COLS, DEFAULT_ROWS));
    let cfg = GlobeConfig::new(cols, rows);
    let mut driver = Driver::new(cfg, settings.variant, settings.seed, settings.glitch);
    let mut target = CaptureTarget::default();
    driver.start();
    for _ in 0..frames.max(1) {
        driver.tick(&mut target);
    }
    driver.stop();

    if let Some(frame) = target.last {
        for row in frame.rows() {
            println!("{row}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Rgb;

    #[test]
    fn test_fit_grid_prefers_stock_size() {
        let cfg = fit_grid(200, 60, None);
        assert_eq!(cfg.width, 68);
        assert_eq!(cfg.height, 34);
    }

    #[test]
    fn test_fit_grid_follows_small_terminal() {
        let cfg = fit_grid(50, 20, None);
        assert_eq!(cfg.width, 50);
        assert_eq!(cfg.height, 20);
    }

    #[test]
    fn test_fit_grid_clamps_tiny_terminal() {
        let cfg = fit_grid(10, 5, None);
        assert_eq!(cfg.width, 40);
        assert_eq!(cfg.height, 16);
    }

    #[test]
    fn test_fit_grid_forced_size_still_clamped() {
        let cfg = fit_grid(200, 60, Some((300, 100)));
        assert_eq!(cfg.width, 110);
        assert_eq!(cfg.height, 60);
    }

    #[test]
    fn test_center_origin_centers_and_floors_at_zero() {
        assert_eq!(center_origin(100, 50, 68, 34), (16, 8));
        assert_eq!(center_origin(30, 10, 68, 34), (0, 0));
    }

    #[test]
    fn test_apply_cli_overrides_settings() {
        let mut settings = Settings::default();
        let args = CliArgs {
            fps: Some(60),
            seed: Some(5),
            shade: true,
            no_color: true,
            no_glitch: true,
            ..CliArgs::default()
        };
        apply_cli(&mut settings, &args);
        assert_eq!(settings.fps_cap, 60);
        assert_eq!(settings.seed, 5);
        assert_eq!(settings.variant, Variant::Shade);
        assert!(!settings.enable_color);
        assert!(!settings.glitch);
    }

    #[test]
    fn test_term_target_copies_nonblank_cells_at_origin() {
        let mut buf = CellBuffer::new(20, 10);
        let mut frame = Frame::new(4, 2);
        frame.chars[0] = '@';
        frame.colors[0] = Rgb { r: 1, g: 2, b: 3 };
        let mut target = TermTarget {
            buf: &mut buf,
            origin: (5, 3),
            color: true,
        };
        assert!(target.accept(&frame));
        assert_eq!(buf.get(5, 3).ch, '@');
        assert_eq!(buf.get(5, 3).fg, Color::Rgb { r: 1, g: 2, b: 3 });
        // blank frame cells leave the backdrop alone
        assert_eq!(buf.get(6, 3).ch, ' ');
    }

    #[test]
    fn test_term_target_monochrome_uses_plain_green() {
        let mut buf = CellBuffer::new(10, 5);
        let mut frame = Frame::new(2, 1);
        frame.chars[1] = '#';
        frame.colors[1] = Rgb { r: 9, g: 9, b: 9 };
        let mut target = TermTarget {
            buf: &mut buf,
            origin: (0, 0),
            color: false,
        };
        target.accept(&frame);
        assert_eq!(buf.get(1, 0).fg, Color::Green);
    }
}
