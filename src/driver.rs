use crate::config::{GlobeConfig, Variant};
use crate::globe::{self, Rotation};
use crate::raster::{Frame, GlyphRaster, ShadeRaster};
use rand::{rngs::StdRng, SeedableRng};

/// Gain applied to |wobble| on top of the base glitch probability.
const WOBBLE_GAIN: f32 = 0.0008;

/// Where finished frames go. `accept` reports whether the surface still
/// exists; a refusal is a quiet no-op for the driver, never an error.
pub(crate) trait RenderTarget {
    fn accept(&mut self, frame: &Frame) -> bool;
}

/// Target that keeps the most recent frame, for headless dumps and tests.
#[derive(Default)]
pub(crate) struct CaptureTarget {
    pub(crate) last: Option<Frame>,
}

impl RenderTarget for CaptureTarget {
    fn accept(&mut self, frame: &Frame) -> bool {
        self.last = Some(frame.clone());
        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DriverState {
    Running,
    Stopped,
}

enum Raster {
    Glyph(GlyphRaster),
    Shade(ShadeRaster),
}

/// Owns the rotation state, the rng and the output buffers, and runs one
/// pipeline pass per tick while running. Construction leaves it stopped;
/// `start` arms it and `stop` is idempotent, so stopping before the first
/// tick means the target never sees a frame.
pub(crate) struct Driver {
    cfg: GlobeConfig,
    sweep_cfg: GlobeConfig,
    variant: Variant,
    rot: Rotation,
    rng: StdRng,
    raster: Raster,
    frame: Frame,
    state: DriverState,
    glitch: bool,
}

impl Driver {
    pub(crate) fn new(cfg: GlobeConfig, variant: Variant, seed: u64, glitch: bool) -> Self {
        let (raster, sweep_cfg) = match variant {
            Variant::Glyph => (Raster::Glyph(GlyphRaster::new(&cfg)), cfg.clone()),
            Variant::Shade => (Raster::Shade(ShadeRaster::new(&cfg)), cfg.subpixel()),
        };
        Self {
            frame: Frame::new(cfg.width, cfg.height),
            rot: Rotation::default(),
            rng: StdRng::seed_from_u64(seed),
            raster,
            sweep_cfg,
            variant,
            cfg,
            state: DriverState::Stopped,
            glitch,
        }
    }

    pub(crate) fn start(&mut self) {
        self.state = DriverState::Running;
    }

    pub(crate) fn stop(&mut self) {
        self.state = DriverState::Stopped;
    }

    pub(crate) fn is_running(&self) -> bool {
        self.state == DriverState::Running
    }

    pub(crate) fn set_glitch(&mut self, on: bool) {
        self.glitch = on;
    }

    pub(crate) fn glitch(&self) -> bool {
        self.glitch
    }

    pub(crate) fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub(crate) fn variant(&self) -> Variant {
        self.variant
    }

    pub(crate) fn grid(&self) -> (usize, usize) {
        (self.cfg.width, self.cfg.height)
    }

    /// One animation frame: sweep into the rasterizer, flush to the
    /// target, then advance the rotation. Stopped drivers do nothing.
    pub(crate) fn tick(&mut self, target: &mut dyn RenderTarget) {
        if self.state != DriverState::Running {
            return;
        }
        let prob = if self.glitch {
            self.cfg.glitch_base + self.rot.wobble.abs() * WOBBLE_GAIN
        } else {
            0.0
        };

        let Self {
            sweep_cfg,
            rot,
            rng,
            raster,
            frame,
            ..
        } = self;
        match raster {
            Raster::Glyph(r) => {
                r.begin();
                globe::sweep(sweep_cfg, rot, |p| r.plot(&p, prob, rng));
                r.finish(frame);
            }
            Raster::Shade(r) => {
                r.begin();
                globe::sweep(sweep_cfg, rot, |p| r.plot(&p, prob, rng));
                r.finish(frame);
            }
        }

        // a torn-down target refuses the frame; nothing to do about it
        let _ = target.accept(&self.frame);

        self.rot.advance(&self.cfg, &mut self.rng);
    }
}
