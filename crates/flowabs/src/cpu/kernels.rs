//! Reference fragment programs. Each function is the CPU twin of the WGSL
//! body with the same name under `assets/shaders/flowabs/`, evaluated for one
//! pixel at normalized coordinate `uv`.

use glam::{Vec2, Vec3, Vec4, Vec4Swizzles};

use super::color;
use crate::gpu::uniforms::StageUniforms;
use crate::image::Image;
use crate::stage::StageKind;

const MAX_HALF_WIDTH: f32 = 16.0;
const MAX_LIC_STEPS: f32 = 32.0;

/// Inputs visible to one fragment invocation.
pub struct Fragment<'a> {
    pub u: &'a StageUniforms,
    pub size: Vec2,
    pub img: &'a Image,
    pub guide: Option<&'a Image>,
}

impl Fragment<'_> {
    fn img(&self, uv: Vec2) -> Vec4 {
        self.img.sample(uv)
    }

    fn guide(&self, uv: Vec2) -> Vec4 {
        self.guide.map_or(Vec4::ZERO, |g| g.sample(uv))
    }

    fn texel(&self) -> Vec2 {
        Vec2::ONE / self.size
    }
}

pub fn shade(kind: StageKind, f: &Fragment<'_>, uv: Vec2) -> Vec4 {
    match kind {
        StageKind::Copy => copy(f, uv),
        StageKind::Gauss => gauss(f, uv),
        StageKind::Blur3 => blur3(f, uv),
        StageKind::Blur5 => blur5(f, uv),
        StageKind::StructureTensor => sst(f, uv),
        StageKind::TangentFlow => tfm(f, uv),
        StageKind::RgbToLab => {
            let c = f.img(uv);
            color::rgb_to_lab(c.xyz()).extend(1.0)
        }
        StageKind::LabToRgb => {
            let c = f.img(uv);
            color::lab_to_rgb(c.xyz()).extend(1.0)
        }
        StageKind::Dog => dog(f, uv),
        StageKind::ColorQuantize => quantize(f, uv),
        StageKind::Bilateral => bilateral(f, uv),
        StageKind::FdogPass0 => fdog0(f, uv),
        StageKind::FdogPass1 => fdog1(f, uv),
        StageKind::Lic => lic(f, uv),
        StageKind::Mix => {
            let e = f.guide(uv).x;
            let c = f.img(uv).xyz();
            let edge = Vec3::from_slice(&f.u.edge_color[..3]);
            (edge * (1.0 - e) + c * e).extend(1.0)
        }
        StageKind::Overlay => {
            let e = f.guide(uv).x;
            let c = f.img(uv);
            Vec4::new(c.x * e, c.y, c.z, 1.0)
        }
    }
}

pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn two_sigma2(sigma: f32) -> f32 {
    (2.0 * sigma * sigma).max(1e-6)
}

fn threshold(h: f32, phi: f32) -> f32 {
    if h > 0.0 {
        1.0
    } else {
        2.0 * smoothstep(-2.0, 2.0, phi * h)
    }
}

fn copy(f: &Fragment<'_>, uv: Vec2) -> Vec4 {
    let scale = Vec2::from(f.u.src_scale);
    let offset = Vec2::from(f.u.src_offset);
    f.img(uv * scale + offset)
}

fn gauss(f: &Fragment<'_>, uv: Vec2) -> Vec4 {
    let sigma = f.u.sigma;
    if sigma <= 0.0 {
        return f.img(uv);
    }
    let hw = (2.0 * sigma).ceil().min(MAX_HALF_WIDTH) as i32;
    let ts2 = two_sigma2(sigma);
    let d = f.texel();
    let mut sum = Vec4::ZERO;
    let mut norm = 0.0;
    for j in -hw..=hw {
        for i in -hw..=hw {
            let w = (-((i * i + j * j) as f32) / ts2).exp();
            sum += w * f.img(uv + Vec2::new(i as f32, j as f32) * d);
            norm += w;
        }
    }
    sum / norm
}

fn blur3(f: &Fragment<'_>, uv: Vec2) -> Vec4 {
    const K: [f32; 3] = [1.0, 2.0, 1.0];
    separable_box(f, uv, &K, 16.0)
}

fn blur5(f: &Fragment<'_>, uv: Vec2) -> Vec4 {
    const K: [f32; 5] = [1.0, 4.0, 6.0, 4.0, 1.0];
    separable_box(f, uv, &K, 256.0)
}

fn separable_box(f: &Fragment<'_>, uv: Vec2, k: &[f32], norm: f32) -> Vec4 {
    let r = (k.len() / 2) as i32;
    let d = f.texel();
    let mut sum = Vec4::ZERO;
    for j in -r..=r {
        for i in -r..=r {
            let w = k[(i + r) as usize] * k[(j + r) as usize];
            sum += w * f.img(uv + Vec2::new(i as f32, j as f32) * d);
        }
    }
    sum / norm
}

/// Sobel gradients of the Lab image (scaled to roughly unit range), packed
/// as the tensor components `(E, G, F)`.
fn sst(f: &Fragment<'_>, uv: Vec2) -> Vec4 {
    let d = f.texel();
    let s = |i: f32, j: f32| f.img(uv + Vec2::new(i, j) * d).xyz() * 0.01;
    let gx = (-s(-1.0, -1.0) - 2.0 * s(-1.0, 0.0) - s(-1.0, 1.0)
        + s(1.0, -1.0)
        + 2.0 * s(1.0, 0.0)
        + s(1.0, 1.0))
        / 4.0;
    let gy = (-s(-1.0, -1.0) - 2.0 * s(0.0, -1.0) - s(1.0, -1.0)
        + s(-1.0, 1.0)
        + 2.0 * s(0.0, 1.0)
        + s(1.0, 1.0))
        / 4.0;
    Vec4::new(gx.dot(gx), gy.dot(gy), gx.dot(gy), 1.0)
}

/// Minor eigenvector of the smoothed tensor: the local edge tangent.
/// Output is `(t.x, t.y, angle, anisotropy)`.
fn tfm(f: &Fragment<'_>, uv: Vec2) -> Vec4 {
    let g = f.img(uv);
    let (e, gg, ff) = (g.x, g.y, g.z);
    let d = ((e - gg) * (e - gg) + 4.0 * ff * ff).sqrt();
    let lambda1 = 0.5 * (e + gg + d);
    let lambda2 = 0.5 * (e + gg - d);
    let v = Vec2::new(lambda1 - e, -ff);
    let t = if v.length() > 0.0 {
        v.normalize()
    } else {
        Vec2::new(0.0, 1.0)
    };
    let phi = -t.y.atan2(t.x);
    let sum = lambda1 + lambda2;
    let a = if sum > 0.0 {
        (lambda1 - lambda2) / sum
    } else {
        0.0
    };
    Vec4::new(t.x, t.y, phi, a)
}

fn dog(f: &Fragment<'_>, uv: Vec2) -> Vec4 {
    let u = f.u;
    let ts2e = two_sigma2(u.sigma_e);
    let ts2r = two_sigma2(u.sigma_r);
    let hw = (2.0 * u.sigma_r).ceil().min(MAX_HALF_WIDTH) as i32;
    let d = f.texel();
    let mut sum = Vec2::ZERO;
    let mut norm = Vec2::ZERO;
    for j in -hw..=hw {
        for i in -hw..=hw {
            let d2 = (i * i + j * j) as f32;
            let k = Vec2::new((-d2 / ts2e).exp(), (-d2 / ts2r).exp());
            let l = f.img(uv + Vec2::new(i as f32, j as f32) * d).x;
            sum += k * l;
            norm += k;
        }
    }
    let s = sum / norm;
    let edge = threshold(s.x - u.tau * s.y, u.phi);
    Vec4::new(edge, edge, edge, 1.0)
}

fn quantize(f: &Fragment<'_>, uv: Vec2) -> Vec4 {
    let c = f.img(uv);
    let bins = f.u.num_bins;
    if bins <= 0 {
        return c;
    }
    let n = bins as f32;
    let ln = c.x / 100.0;
    let qn = (ln * n + 0.5).floor() / n;
    let qs = smoothstep(-2.0, 2.0, f.u.phi_q * (ln - qn) * 100.0) - 0.5;
    let qc = qn + qs / n;
    Vec4::new(qc * 100.0, c.y, c.z, 1.0)
}

/// Step length that advances one whole texel along the dominant axis.
fn unit_step(dir: Vec2) -> Option<f32> {
    let m = dir.abs().max_element();
    (m > 1e-6).then(|| 1.0 / m)
}

fn bilateral(f: &Fragment<'_>, uv: Vec2) -> Vec4 {
    let u = f.u;
    let t = f.guide(uv).xy();
    let dir = if u.pass_index == 0 {
        Vec2::new(t.y, -t.x)
    } else {
        t
    };
    let center = f.img(uv).xyz();
    let Some(ds) = unit_step(dir) else {
        return center.extend(1.0);
    };
    let step = dir / f.size;
    let ts2d = two_sigma2(u.sigma_d);
    let ts2r = two_sigma2(u.sigma_r);
    let half_width = 2.0 * u.sigma_d;

    let mut sum = center;
    let mut norm = 1.0;
    let mut d = ds;
    while d <= half_width {
        let c0 = f.img(uv + d * step).xyz();
        let c1 = f.img(uv - d * step).xyz();
        let kd = (-d * d / ts2d).exp();
        let k0 = kd * (-(c0 - center).length_squared() / ts2r).exp();
        let k1 = kd * (-(c1 - center).length_squared() / ts2r).exp();
        sum += k0 * c0 + k1 * c1;
        norm += k0 + k1;
        d += ds;
    }
    (sum / norm).extend(1.0)
}

/// One-dimensional DoG across the flow; outputs the signed response.
fn fdog0(f: &Fragment<'_>, uv: Vec2) -> Vec4 {
    let u = f.u;
    let t = f.guide(uv).xy();
    let n = Vec2::new(t.y, -t.x);
    let center = f.img(uv).x;
    let Some(ds) = unit_step(n) else {
        let diff = center - u.tau * center;
        return Vec4::new(diff, diff, diff, 1.0);
    };
    let step = n / f.size;
    let ts2e = two_sigma2(u.sigma_e);
    let ts2r = two_sigma2(u.sigma_r);
    let half_width = 2.0 * u.sigma_r;

    let mut sum = Vec2::splat(center);
    let mut norm = Vec2::ONE;
    let mut d = ds;
    while d <= half_width {
        let k = Vec2::new((-d * d / ts2e).exp(), (-d * d / ts2r).exp());
        let l = f.img(uv - d * step).x + f.img(uv + d * step).x;
        sum += k * l;
        norm += 2.0 * k;
        d += ds;
    }
    let s = sum / norm;
    let diff = s.x - u.tau * s.y;
    Vec4::new(diff, diff, diff, 1.0)
}

/// Gaussian-weighted average of `img` along the streamline through `uv`,
/// walking one texel per step in both directions.
fn streamline(f: &Fragment<'_>, uv: Vec2, sigma: f32) -> Vec4 {
    let center = f.img(uv);
    let steps = (2.0 * sigma).ceil().clamp(0.0, MAX_LIC_STEPS) as i32;
    let ts2 = two_sigma2(sigma);
    let t0 = f.guide(uv).xy();

    let mut sum = center;
    let mut norm = 1.0;
    for sign in [1.0f32, -1.0] {
        let mut p = uv;
        let mut prev = t0 * sign;
        for s in 1..=steps {
            let mut t = f.guide(p).xy();
            if t.dot(prev) < 0.0 {
                t = -t;
            }
            p += t / f.size;
            prev = t;
            let k = (-((s * s) as f32) / ts2).exp();
            sum += k * f.img(p);
            norm += k;
        }
    }
    sum / norm
}

fn fdog1(f: &Fragment<'_>, uv: Vec2) -> Vec4 {
    let h = streamline(f, uv, f.u.sigma_m).x;
    let edge = threshold(h, f.u.phi);
    Vec4::new(edge, edge, edge, 1.0)
}

fn lic(f: &Fragment<'_>, uv: Vec2) -> Vec4 {
    let c = streamline(f, uv, f.u.sigma);
    c.xyz().extend(1.0)
}
