use crate::stage::StageKind;

const COPY_FS: &str = include_str!("../../../../assets/shaders/flowabs/copy.wgsl");
const GAUSS_FS: &str = include_str!("../../../../assets/shaders/flowabs/gauss.wgsl");
const BLUR3_FS: &str = include_str!("../../../../assets/shaders/flowabs/blur3.wgsl");
const BLUR5_FS: &str = include_str!("../../../../assets/shaders/flowabs/blur5.wgsl");
const SST_FS: &str = include_str!("../../../../assets/shaders/flowabs/sst.wgsl");
const TFM_FS: &str = include_str!("../../../../assets/shaders/flowabs/tfm.wgsl");
const RGB2LAB_FS: &str = include_str!("../../../../assets/shaders/flowabs/rgb2lab.wgsl");
const LAB2RGB_FS: &str = include_str!("../../../../assets/shaders/flowabs/lab2rgb.wgsl");
const DOG_FS: &str = include_str!("../../../../assets/shaders/flowabs/dog.wgsl");
const CQ_FS: &str = include_str!("../../../../assets/shaders/flowabs/cq.wgsl");
const BILATERAL_FS: &str = include_str!("../../../../assets/shaders/flowabs/bilateral.wgsl");
const FDOG0_FS: &str = include_str!("../../../../assets/shaders/flowabs/fdog0.wgsl");
const FDOG1_FS: &str = include_str!("../../../../assets/shaders/flowabs/fdog1.wgsl");
const LIC_FS: &str = include_str!("../../../../assets/shaders/flowabs/lic.wgsl");
const MIX_FS: &str = include_str!("../../../../assets/shaders/flowabs/mix.wgsl");
const OVERLAY_FS: &str = include_str!("../../../../assets/shaders/flowabs/overlay.wgsl");

/// Layout mirrors `gpu::uniforms::StageUniforms` (80 bytes).
const UNIFORMS_WGSL: &str = r#"
struct StageUniforms {
    sigma: f32,
    sigma_d: f32,
    sigma_r: f32,
    sigma_e: f32,
    sigma_m: f32,
    tau: f32,
    phi: f32,
    phi_q: f32,
    num_bins: i32,
    pass_index: u32,
    _pad0: vec2f,
    edge_color: vec4f,
    src_scale: vec2f,
    src_offset: vec2f,
}

@group(0) @binding(0) var<uniform> u: StageUniforms;
@group(0) @binding(1) var samp: sampler;
@group(0) @binding(2) var img: texture_2d<f32>;

fn sample_img(uv: vec2f) -> vec4f {
    return textureSampleLevel(img, samp, uv, 0.0);
}
"#;

const GUIDE_WGSL: &str = r#"
@group(0) @binding(3) var guide: texture_2d<f32>;

fn sample_guide(uv: vec2f) -> vec4f {
    return textureSampleLevel(guide, samp, uv, 0.0);
}
"#;

pub fn fragment_body(kind: StageKind) -> &'static str {
    match kind {
        StageKind::Copy => COPY_FS,
        StageKind::Gauss => GAUSS_FS,
        StageKind::Blur3 => BLUR3_FS,
        StageKind::Blur5 => BLUR5_FS,
        StageKind::StructureTensor => SST_FS,
        StageKind::TangentFlow => TFM_FS,
        StageKind::RgbToLab => RGB2LAB_FS,
        StageKind::LabToRgb => LAB2RGB_FS,
        StageKind::Dog => DOG_FS,
        StageKind::ColorQuantize => CQ_FS,
        StageKind::Bilateral => BILATERAL_FS,
        StageKind::FdogPass0 => FDOG0_FS,
        StageKind::FdogPass1 => FDOG1_FS,
        StageKind::Lic => LIC_FS,
        StageKind::Mix => MIX_FS,
        StageKind::Overlay => OVERLAY_FS,
    }
}

/// Full fragment source for `kind` at a fixed frame size.
///
/// The size is baked in as the `SRC_SIZE` constant, so a stage can only be
/// built once its resolution is known.
pub fn stage_source(kind: StageKind, width: u32, height: u32) -> String {
    let mut src = format!("const SRC_SIZE: vec2f = vec2f({width}.0, {height}.0);\n");
    src.push_str(UNIFORMS_WGSL);
    if kind.input_count() == 2 {
        src.push_str(GUIDE_WGSL);
    }
    src.push('\n');
    src.push_str(fragment_body(kind));
    src
}
