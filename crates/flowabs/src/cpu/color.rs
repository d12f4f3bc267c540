//! sRGB (D65) <-> CIE L*a*b* conversions. L in [0,100].

use glam::Vec3;

const WHITE: Vec3 = Vec3::new(0.950_47, 1.0, 1.088_83);

fn linearize(c: f32) -> f32 {
    if c > 0.04045 {
        ((c + 0.055) / 1.055).powf(2.4)
    } else {
        c / 12.92
    }
}

fn gamma(c: f32) -> f32 {
    if c > 0.003_130_8 {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    } else {
        12.92 * c
    }
}

fn f(t: f32) -> f32 {
    if t > 0.008856 {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

fn f_inv(t: f32) -> f32 {
    let t3 = t * t * t;
    if t3 > 0.008856 {
        t3
    } else {
        (t - 16.0 / 116.0) / 7.787
    }
}

pub fn rgb_to_lab(rgb: Vec3) -> Vec3 {
    let r = linearize(rgb.x);
    let g = linearize(rgb.y);
    let b = linearize(rgb.z);
    let xyz = Vec3::new(
        0.412_453 * r + 0.357_580 * g + 0.180_423 * b,
        0.212_671 * r + 0.715_160 * g + 0.072_169 * b,
        0.019_334 * r + 0.119_193 * g + 0.950_227 * b,
    ) / WHITE;
    let fx = f(xyz.x);
    let fy = f(xyz.y);
    let fz = f(xyz.z);
    Vec3::new(116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz))
}

/// Inverse of [`rgb_to_lab`], clamped to the displayable [0,1] cube.
pub fn lab_to_rgb(lab: Vec3) -> Vec3 {
    let fy = (lab.x + 16.0) / 116.0;
    let fx = fy + lab.y / 500.0;
    let fz = fy - lab.z / 200.0;
    let xyz = Vec3::new(f_inv(fx), f_inv(fy), f_inv(fz)) * WHITE;
    let r = 3.240_479 * xyz.x - 1.537_150 * xyz.y - 0.498_535 * xyz.z;
    let g = -0.969_256 * xyz.x + 1.875_992 * xyz.y + 0.041_556 * xyz.z;
    let b = 0.055_648 * xyz.x - 0.204_043 * xyz.y + 1.057_311 * xyz.z;
    Vec3::new(gamma(r), gamma(g), gamma(b)).clamp(Vec3::ZERO, Vec3::ONE)
}
