use crate::config::GlobeConfig;
use rand::{rngs::StdRng, Rng};
use std::f32::consts::{FRAC_PI_2, PI, TAU};

/// Brightness boost for cells on a continent.
const LAND_BIAS: i32 = 2;
/// Half-width of the colatitude band that may grow land.
const LAND_BAND: f32 = 1.1;

/// One lattice point after rotation, projection and shading. `depth` is
/// inverse view distance, larger means nearer to the viewer.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ShadedPoint {
    pub(crate) x: usize,
    pub(crate) y: usize,
    pub(crate) depth: f32,
    pub(crate) level: usize,
    pub(crate) normal: [f32; 3],
}

/// Fixed sampling lattice over the unit sphere. `theta` is colatitude,
/// 0 at the north pole, sweeping to just under pi; `phi` is longitude,
/// sweeping to just under tau. Each angle is `k * step`, not accumulated,
/// so the sequence is identical every frame.
pub(crate) fn lattice(cfg: &GlobeConfig) -> impl Iterator<Item = (f32, f32)> {
    let theta_step = cfg.theta_step;
    let phi_step = cfg.phi_step;
    let n_theta = (PI / theta_step).ceil() as usize;
    let n_phi = (TAU / phi_step).ceil() as usize;
    (0..n_theta).flat_map(move |i| {
        let theta = i as f32 * theta_step;
        (0..n_phi).map(move |j| (theta, j as f32 * phi_step))
    })
}

/// Orientation of the globe plus the per-frame wobble jitter. The angles
/// grow without wrapping; they are only ever fed to sin and cos.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Rotation {
    /// Tilt about the x axis, applied first.
    pub(crate) tilt: f32,
    /// Spin about the y axis, applied second.
    pub(crate) spin: f32,
    pub(crate) wobble: f32,
}

impl Rotation {
    /// End-of-frame step: fixed angle increments, then a fresh wobble draw.
    pub(crate) fn advance(&mut self, cfg: &GlobeConfig, rng: &mut StdRng) {
        self.tilt += cfg.tilt_step;
        self.spin += cfg.spin_step;
        self.wobble = (self.spin * 2.3).sin() * 0.6 + (rng.gen::<f32>() - 0.5) * 0.06;
    }
}

/// Frame-constant trig, hoisted out of the inner lattice loop.
#[derive(Clone, Copy)]
pub(crate) struct FrameTrig {
    sin_tilt: f32,
    cos_tilt: f32,
    sin_spin: f32,
    cos_spin: f32,
}

impl FrameTrig {
    pub(crate) fn of(rot: &Rotation) -> Self {
        let (sin_tilt, cos_tilt) = rot.tilt.sin_cos();
        let (sin_spin, cos_spin) = rot.spin.sin_cos();
        Self {
            sin_tilt,
            cos_tilt,
            sin_spin,
            cos_spin,
        }
    }
}

/// Procedural continents: a sinusoid ridge gated to an equatorial band.
/// Purely cosmetic, drifts slowly with the rotation angles.
fn is_land(theta: f32, phi: f32, rot: &Rotation) -> bool {
    let ridge = (phi * 3.1 + theta * 2.7 + rot.tilt * 0.5).sin()
        * (theta * 2.2 + rot.spin * 0.3).cos();
    ridge > 0.15 && (theta - FRAC_PI_2).abs() < LAND_BAND
}

/// Rotate, project and shade one lattice point. Returns None when the
/// point ends up behind the camera or off the grid.
pub(crate) fn project_point(
    cfg: &GlobeConfig,
    rot: &Rotation,
    trig: &FrameTrig,
    theta: f32,
    phi: f32,
) -> Option<ShadedPoint> {
    let (sin_t, cos_t) = theta.sin_cos();
    let (sin_p, cos_p) = phi.sin_cos();

    // unit sphere, north pole at theta = 0
    let x = sin_t * cos_p;
    let y = cos_t;
    let z = sin_t * sin_p;

    // tilt about x, then spin about y
    let y1 = y * trig.cos_tilt - z * trig.sin_tilt;
    let z1 = y * trig.sin_tilt + z * trig.cos_tilt;
    let x2 = x * trig.cos_spin + z1 * trig.sin_spin;
    let y2 = y1;
    let z2 = -x * trig.sin_spin + z1 * trig.cos_spin;

    // push in front of the projection plane, then perspective divide
    let zv = z2 + cfg.camera_dist;
    if zv <= 0.0 {
        return None;
    }
    let inv_z = 1.0 / zv;

    // floats checked before the cast: a negative f32 would saturate to 0
    // as usize and alias the left and top edges
    let cx = (cfg.x_center + x2 * cfg.x_scale * inv_z).floor();
    let cy = (cfg.y_center - y2 * cfg.y_scale * inv_z).floor();
    if cx < 0.0 || cy < 0.0 || cx >= cfg.width as f32 || cy >= cfg.height as f32 {
        return None;
    }

    // the rotated point doubles as its own surface normal
    let ndotl = x2 * cfg.light[0] + y2 * cfg.light[1] + z2 * cfg.light[2];
    let top = cfg.palette.len() as i32 - 1;
    let mut level = (((ndotl + 1.0) * 0.5) * top as f32).floor() as i32;
    level = level.clamp(0, top);
    if is_land(theta, phi, rot) {
        level = (level + LAND_BIAS).clamp(0, top);
    }

    Some(ShadedPoint {
        x: cx as usize,
        y: cy as usize,
        depth: inv_z,
        level: level as usize,
        normal: [x2, y2, z2],
    })
}

/// Run the whole lattice through rotation, projection and shading, feeding
/// every surviving point to `emit` in lattice order.
pub(crate) fn sweep(cfg: &GlobeConfig, rot: &Rotation, mut emit: impl FnMut(ShadedPoint)) {
    let trig = FrameTrig::of(rot);
    for (theta, phi) in lattice(cfg) {
        if let Some(p) = project_point(cfg, rot, &trig, theta, phi) {
            emit(p);
        }
    }
}
