use std::fmt;

use crate::backend::{BackendTexture, RenderBackend};
use crate::error::{FlowAbsError, Result};
use crate::gpu::uniforms::StageUniforms;
use crate::target::RenderTarget;

/// The sixteen fragment algorithms of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Copy,
    Gauss,
    Blur3,
    Blur5,
    StructureTensor,
    TangentFlow,
    RgbToLab,
    LabToRgb,
    Dog,
    ColorQuantize,
    Bilateral,
    FdogPass0,
    FdogPass1,
    Lic,
    Mix,
    Overlay,
}

impl StageKind {
    pub const ALL: [StageKind; 16] = [
        StageKind::Copy,
        StageKind::Gauss,
        StageKind::Blur3,
        StageKind::Blur5,
        StageKind::StructureTensor,
        StageKind::TangentFlow,
        StageKind::RgbToLab,
        StageKind::LabToRgb,
        StageKind::Dog,
        StageKind::ColorQuantize,
        StageKind::Bilateral,
        StageKind::FdogPass0,
        StageKind::FdogPass1,
        StageKind::Lic,
        StageKind::Mix,
        StageKind::Overlay,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StageKind::Copy => "copy",
            StageKind::Gauss => "gauss",
            StageKind::Blur3 => "blur3",
            StageKind::Blur5 => "blur5",
            StageKind::StructureTensor => "sst",
            StageKind::TangentFlow => "tfm",
            StageKind::RgbToLab => "rgb2lab",
            StageKind::LabToRgb => "lab2rgb",
            StageKind::Dog => "dog",
            StageKind::ColorQuantize => "cq",
            StageKind::Bilateral => "bilateral",
            StageKind::FdogPass0 => "fdog0",
            StageKind::FdogPass1 => "fdog1",
            StageKind::Lic => "lic",
            StageKind::Mix => "mix",
            StageKind::Overlay => "overlay",
        }
    }

    /// Number of sampled textures: the image, plus the guidance field for
    /// dual-input stages.
    pub fn input_count(self) -> usize {
        match self {
            StageKind::Bilateral
            | StageKind::FdogPass0
            | StageKind::FdogPass1
            | StageKind::Lic
            | StageKind::Mix
            | StageKind::Overlay => 2,
            _ => 1,
        }
    }

    /// Scalar uniforms this stage reads. Anything else is rejected.
    pub fn scalars(self) -> &'static [Scalar] {
        match self {
            StageKind::Gauss | StageKind::Lic => &[Scalar::Sigma],
            StageKind::Bilateral => &[Scalar::SigmaD, Scalar::SigmaR],
            StageKind::Dog => &[Scalar::SigmaE, Scalar::SigmaR, Scalar::Tau, Scalar::Phi],
            StageKind::FdogPass0 => &[Scalar::SigmaE, Scalar::SigmaR, Scalar::Tau],
            StageKind::FdogPass1 => &[Scalar::SigmaM, Scalar::Phi],
            StageKind::ColorQuantize => &[Scalar::PhiQ],
            _ => &[],
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Named scalar uniform slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    Sigma,
    SigmaD,
    SigmaR,
    SigmaE,
    SigmaM,
    Tau,
    Phi,
    PhiQ,
}

impl Scalar {
    pub fn name(self) -> &'static str {
        match self {
            Scalar::Sigma => "sigma",
            Scalar::SigmaD => "sigma_d",
            Scalar::SigmaR => "sigma_r",
            Scalar::SigmaE => "sigma_e",
            Scalar::SigmaM => "sigma_m",
            Scalar::Tau => "tau",
            Scalar::Phi => "phi",
            Scalar::PhiQ => "phi_q",
        }
    }

    fn slot(self, u: &mut StageUniforms) -> &mut f32 {
        match self {
            Scalar::Sigma => &mut u.sigma,
            Scalar::SigmaD => &mut u.sigma_d,
            Scalar::SigmaR => &mut u.sigma_r,
            Scalar::SigmaE => &mut u.sigma_e,
            Scalar::SigmaM => &mut u.sigma_m,
            Scalar::Tau => &mut u.tau,
            Scalar::Phi => &mut u.phi,
            Scalar::PhiQ => &mut u.phi_q,
        }
    }
}

/// Maps logical [0,1]² frame coordinates into a larger backing texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceTransform {
    pub scale: [f32; 2],
    pub offset: [f32; 2],
}

impl SourceTransform {
    pub const IDENTITY: SourceTransform = SourceTransform {
        scale: [1.0, 1.0],
        offset: [0.0, 0.0],
    };

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for SourceTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A compiled fragment program plus its uniform block.
///
/// Setters write the CPU-side block; the backend uploads it as part of each
/// draw of this stage, so there is no "active program" to get out of sync.
pub struct ShaderStage<B: RenderBackend> {
    kind: StageKind,
    program: B::Program,
    uniforms: StageUniforms,
}

impl<B: RenderBackend> ShaderStage<B> {
    /// Compile `kind` for frames of exactly `width` x `height`.
    pub fn new(backend: &mut B, kind: StageKind, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(FlowAbsError::InvalidSize {
                what: format!("stage {kind}"),
                width,
                height,
            });
        }
        let program = backend.create_program(kind, width, height)?;
        Ok(Self {
            kind,
            program,
            uniforms: StageUniforms::default(),
        })
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    /// Last values written through the setters.
    pub fn uniforms(&self) -> &StageUniforms {
        &self.uniforms
    }

    pub fn set_scalar(&mut self, scalar: Scalar, value: f32) -> Result<()> {
        if !self.kind.scalars().contains(&scalar) {
            return Err(FlowAbsError::UnknownUniform {
                stage: self.kind,
                uniform: scalar.name(),
            });
        }
        *scalar.slot(&mut self.uniforms) = value;
        Ok(())
    }

    pub fn set_num_bins(&mut self, bins: i32) -> Result<()> {
        self.require(StageKind::ColorQuantize, "num_bins")?;
        self.uniforms.num_bins = bins;
        Ok(())
    }

    /// Select the bilateral sub-pass: 0 filters across the flow, 1 along it.
    pub fn set_pass(&mut self, pass: u32) -> Result<()> {
        self.require(StageKind::Bilateral, "pass")?;
        if pass > 1 {
            return Err(FlowAbsError::InvalidPass(pass));
        }
        self.uniforms.pass_index = pass;
        Ok(())
    }

    pub fn set_edge_color(&mut self, rgb: [f32; 3]) -> Result<()> {
        self.require(StageKind::Mix, "edge_color")?;
        self.uniforms.edge_color = [rgb[0], rgb[1], rgb[2], 1.0];
        Ok(())
    }

    pub fn set_source_transform(&mut self, transform: SourceTransform) -> Result<()> {
        self.require(StageKind::Copy, "src_transform")?;
        self.uniforms.src_scale = transform.scale;
        self.uniforms.src_offset = transform.offset;
        Ok(())
    }

    fn require(&self, kind: StageKind, uniform: &'static str) -> Result<()> {
        if self.kind == kind {
            Ok(())
        } else {
            Err(FlowAbsError::UnknownUniform {
                stage: self.kind,
                uniform,
            })
        }
    }

    /// Draw a single-input stage. Dual-input stages refuse: their guidance
    /// field is mandatory.
    pub fn draw(&self, backend: &mut B, src: &B::Texture, target: &RenderTarget<B>) -> Result<()> {
        self.draw_inputs(backend, &[src], target)
    }

    /// Draw a dual-input stage with `guide` on texture unit 1.
    pub fn draw_guided(
        &self,
        backend: &mut B,
        src: &B::Texture,
        guide: &B::Texture,
        target: &RenderTarget<B>,
    ) -> Result<()> {
        self.draw_inputs(backend, &[src, guide], target)
    }

    fn draw_inputs(
        &self,
        backend: &mut B,
        inputs: &[&B::Texture],
        target: &RenderTarget<B>,
    ) -> Result<()> {
        let expected = self.kind.input_count();
        if inputs.len() != expected {
            return Err(FlowAbsError::InputCount {
                stage: self.kind,
                expected,
                got: inputs.len(),
            });
        }
        if inputs.iter().any(|t| t.id() == target.id()) {
            return Err(FlowAbsError::FeedbackLoop { stage: self.kind });
        }
        log::trace!("draw {} -> {}", self.kind, target.label());
        backend.draw(&self.program, &self.uniforms, inputs, target.texture())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PixelFormat;
    use crate::cpu::CpuBackend;

    fn stage(kind: StageKind) -> (CpuBackend, ShaderStage<CpuBackend>) {
        let mut backend = CpuBackend::new();
        let stage = ShaderStage::new(&mut backend, kind, 4, 4).unwrap();
        (backend, stage)
    }

    #[test]
    fn sixteen_kinds_six_dual() {
        assert_eq!(StageKind::ALL.len(), 16);
        let dual = StageKind::ALL.iter().filter(|k| k.input_count() == 2).count();
        assert_eq!(dual, 6);
    }

    #[test]
    fn empty_size_is_rejected() {
        let mut b = CpuBackend::new();
        for (w, h) in [(0, 4), (4, 0), (0, 0)] {
            assert!(matches!(
                ShaderStage::new(&mut b, StageKind::Copy, w, h),
                Err(FlowAbsError::InvalidSize { .. })
            ));
        }
    }

    #[test]
    fn set_pass_accepts_zero_and_one() {
        let (_b, mut s) = stage(StageKind::Bilateral);
        s.set_pass(1).unwrap();
        assert_eq!(s.uniforms().pass_index, 1);
        s.set_pass(0).unwrap();
        assert_eq!(s.uniforms().pass_index, 0);
    }

    #[test]
    fn set_pass_rejects_other_values() {
        let (_b, mut s) = stage(StageKind::Bilateral);
        assert!(matches!(s.set_pass(2), Err(FlowAbsError::InvalidPass(2))));
    }

    #[test]
    fn set_pass_only_on_bilateral() {
        let (_b, mut s) = stage(StageKind::Dog);
        assert!(matches!(
            s.set_pass(0),
            Err(FlowAbsError::UnknownUniform { uniform: "pass", .. })
        ));
    }

    #[test]
    fn undeclared_scalar_is_rejected() {
        let (_b, mut s) = stage(StageKind::Gauss);
        s.set_scalar(Scalar::Sigma, 2.0).unwrap();
        assert_eq!(s.uniforms().sigma, 2.0);
        assert!(s.set_scalar(Scalar::Tau, 0.5).is_err());
    }

    #[test]
    fn single_texture_draw_on_dual_stage_fails() {
        let (mut b, s) = stage(StageKind::Bilateral);
        let src = RenderTarget::new(&mut b, 4, 4, PixelFormat::Rgba16Float, "src").unwrap();
        let dst = RenderTarget::new(&mut b, 4, 4, PixelFormat::Rgba16Float, "dst").unwrap();
        let err = s.draw(&mut b, src.texture(), &dst).unwrap_err();
        assert!(matches!(
            err,
            FlowAbsError::InputCount {
                expected: 2,
                got: 1,
                ..
            }
        ));
    }

    #[test]
    fn guided_draw_on_single_stage_fails() {
        let (mut b, s) = stage(StageKind::Copy);
        let a = RenderTarget::new(&mut b, 4, 4, PixelFormat::Rgba16Float, "a").unwrap();
        let g = RenderTarget::new(&mut b, 4, 4, PixelFormat::Rgba16Float, "g").unwrap();
        let dst = RenderTarget::new(&mut b, 4, 4, PixelFormat::Rgba16Float, "dst").unwrap();
        assert!(s.draw_guided(&mut b, a.texture(), g.texture(), &dst).is_err());
    }

    #[test]
    fn drawing_into_own_input_fails() {
        let (mut b, s) = stage(StageKind::Copy);
        let t = RenderTarget::new(&mut b, 4, 4, PixelFormat::Rgba16Float, "t").unwrap();
        assert!(matches!(
            s.draw(&mut b, t.texture(), &t),
            Err(FlowAbsError::FeedbackLoop { .. })
        ));
    }
}
