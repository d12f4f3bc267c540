use std::cell::RefCell;
use std::rc::Rc;

use super::settings::{
    BilateralParams, EdgeKind, EdgeParams, FlowAbsSettings, QuantizeFilter, QuantizeParams,
    SmoothKind, SmoothParams,
};
use crate::backend::{PixelFormat, RenderBackend};
use crate::error::{FlowAbsError, Result};
use crate::noise;
use crate::stage::{Scalar, ShaderStage, StageKind};
use crate::target::RenderTarget;

/// Engine shared by the composite effect and its single-stage siblings.
pub type SharedEngine<B> = Rc<RefCell<FlowAbsEngine<B>>>;

pub const TARGET_COUNT: usize = 8;

// Pool slots. FB2 holds the tangent flow map for the whole composite.
const FB1: usize = 0;
const FB2: usize = 1;
const FB3: usize = 2;
const FB4: usize = 3;
const FB5: usize = 4;
const FB6: usize = 5;
const FB7: usize = 6;
const FB8: usize = 7;

/// LIC smoothing applied to the noise when visualizing the flow field.
const FLOW_LIC_SIGMA: f32 = 5.0;

struct Stages<B: RenderBackend> {
    copy: ShaderStage<B>,
    gauss: ShaderStage<B>,
    blur3: ShaderStage<B>,
    blur5: ShaderStage<B>,
    sst: ShaderStage<B>,
    tfm: ShaderStage<B>,
    rgb2lab: ShaderStage<B>,
    lab2rgb: ShaderStage<B>,
    dog: ShaderStage<B>,
    cq: ShaderStage<B>,
    bilateral: ShaderStage<B>,
    fdog0: ShaderStage<B>,
    fdog1: ShaderStage<B>,
    lic: ShaderStage<B>,
    mix: ShaderStage<B>,
    overlay: ShaderStage<B>,
}

impl<B: RenderBackend> Stages<B> {
    fn new(backend: &mut B, width: u32, height: u32) -> Result<Self> {
        let mut make = |kind: StageKind| ShaderStage::new(&mut *backend, kind, width, height);
        Ok(Self {
            copy: make(StageKind::Copy)?,
            gauss: make(StageKind::Gauss)?,
            blur3: make(StageKind::Blur3)?,
            blur5: make(StageKind::Blur5)?,
            sst: make(StageKind::StructureTensor)?,
            tfm: make(StageKind::TangentFlow)?,
            rgb2lab: make(StageKind::RgbToLab)?,
            lab2rgb: make(StageKind::LabToRgb)?,
            dog: make(StageKind::Dog)?,
            cq: make(StageKind::ColorQuantize)?,
            bilateral: make(StageKind::Bilateral)?,
            fdog0: make(StageKind::FdogPass0)?,
            fdog1: make(StageKind::FdogPass1)?,
            lic: make(StageKind::Lic)?,
            mix: make(StageKind::Mix)?,
            overlay: make(StageKind::Overlay)?,
        })
    }

    /// Lab image -> tangent flow map in FB2. Scratch: FB4, FB6.
    fn tangent_flow(
        &mut self,
        b: &mut B,
        fb: &[RenderTarget<B>],
        lab: &B::Texture,
        sigma: f32,
    ) -> Result<()> {
        self.sst.draw(b, lab, &fb[FB4])?;
        self.gauss.set_scalar(Scalar::Sigma, sigma)?;
        self.gauss.draw(b, fb[FB4].texture(), &fb[FB6])?;
        self.tfm.draw(b, fb[FB6].texture(), &fb[FB2])
    }

    /// Lab image -> filtered Lab in FB3, guided by FB2. Scratch: FB4.
    fn bilateral(
        &mut self,
        b: &mut B,
        fb: &[RenderTarget<B>],
        lab: &B::Texture,
        p: &BilateralParams,
    ) -> Result<()> {
        if p.n == 0 {
            return self.copy.draw(b, lab, &fb[FB3]);
        }
        self.bilateral.set_scalar(Scalar::SigmaD, p.sigma_d)?;
        self.bilateral.set_scalar(Scalar::SigmaR, p.sigma_r)?;
        let flow = fb[FB2].texture();
        for i in 0..p.n {
            let src = if i == 0 { lab } else { fb[FB3].texture() };
            self.bilateral.set_pass(0)?;
            self.bilateral.draw_guided(b, src, flow, &fb[FB4])?;
            self.bilateral.set_pass(1)?;
            self.bilateral.draw_guided(b, fb[FB4].texture(), flow, &fb[FB3])?;
        }
        Ok(())
    }

    /// Lab image -> edge map in `out`. Iterations after the first darken the
    /// source with the previous edges (FB6) and feed that back in; every
    /// iteration but the last writes FB8. The FDoG pass-0 response lives in FB7.
    fn edges(
        &mut self,
        b: &mut B,
        fb: &[RenderTarget<B>],
        lab: &B::Texture,
        kind: EdgeKind,
        p: &EdgeParams,
        out: &RenderTarget<B>,
    ) -> Result<()> {
        match kind {
            EdgeKind::Dog => {
                self.dog.set_scalar(Scalar::SigmaE, p.sigma_e)?;
                self.dog.set_scalar(Scalar::SigmaR, p.sigma_r)?;
                self.dog.set_scalar(Scalar::Tau, p.tau)?;
                self.dog.set_scalar(Scalar::Phi, p.phi)?;
            }
            EdgeKind::Fdog => {
                self.fdog0.set_scalar(Scalar::SigmaE, p.sigma_e)?;
                self.fdog0.set_scalar(Scalar::SigmaR, p.sigma_r)?;
                self.fdog0.set_scalar(Scalar::Tau, p.tau)?;
                self.fdog1.set_scalar(Scalar::SigmaM, p.sigma_m)?;
                self.fdog1.set_scalar(Scalar::Phi, p.phi)?;
            }
        }

        let flow = fb[FB2].texture();
        let mut previous: Option<&RenderTarget<B>> = None;
        for i in 0..p.n {
            let input = match previous {
                None => lab,
                Some(edges) => {
                    self.overlay.draw_guided(b, lab, edges.texture(), &fb[FB6])?;
                    fb[FB6].texture()
                }
            };
            let target = if i + 1 == p.n { out } else { &fb[FB8] };
            match kind {
                EdgeKind::Dog => self.dog.draw(b, input, target)?,
                EdgeKind::Fdog => {
                    self.fdog0.draw_guided(b, input, flow, &fb[FB7])?;
                    self.fdog1.draw_guided(b, fb[FB7].texture(), flow, target)?;
                }
            }
            previous = Some(target);
        }
        Ok(())
    }

    /// Lab image -> quantized RGB in `out`. Scratch: FB4, FB6.
    fn quantize(
        &mut self,
        b: &mut B,
        fb: &[RenderTarget<B>],
        lab: &B::Texture,
        p: &QuantizeParams,
        out: &RenderTarget<B>,
    ) -> Result<()> {
        self.cq.set_num_bins(p.num_bins)?;
        self.cq.set_scalar(Scalar::PhiQ, p.phi_q)?;
        self.cq.draw(b, lab, &fb[FB4])?;
        let quantized = match p.filter {
            QuantizeFilter::None => &fb[FB4],
            QuantizeFilter::Blur3 => {
                self.blur3.draw(b, fb[FB4].texture(), &fb[FB6])?;
                &fb[FB6]
            }
            QuantizeFilter::Blur5 => {
                self.blur5.draw(b, fb[FB4].texture(), &fb[FB6])?;
                &fb[FB6]
            }
        };
        self.lab2rgb.draw(b, quantized.texture(), out)
    }

    /// RGB image -> smoothed RGB in `out`. The flow variant recomputes the
    /// tangent field at `sigma` (FB1, FB2, FB4, FB6).
    fn smooth(
        &mut self,
        b: &mut B,
        fb: &[RenderTarget<B>],
        src: &B::Texture,
        p: &SmoothParams,
        out: &RenderTarget<B>,
    ) -> Result<()> {
        match p.kind {
            SmoothKind::None => self.copy.draw(b, src, out),
            SmoothKind::Blur3 => self.blur3.draw(b, src, out),
            SmoothKind::Blur5 => self.blur5.draw(b, src, out),
            SmoothKind::FlowLic => {
                self.rgb2lab.draw(b, src, &fb[FB1])?;
                self.tangent_flow(b, fb, fb[FB1].texture(), p.sigma)?;
                self.lic.set_scalar(Scalar::Sigma, p.sigma)?;
                self.lic.draw_guided(b, src, fb[FB2].texture(), out)
            }
        }
    }
}

struct Resources<B: RenderBackend> {
    width: u32,
    height: u32,
    fb: Vec<RenderTarget<B>>,
    noise: B::Texture,
    stages: Stages<B>,
}

/// Flow-based abstraction engine: sixteen stages over eight half-float
/// targets, sized once.
///
/// Public operations take an RGB source texture and write `dst`, which must
/// match the engine size and must not be one of the engine's own targets.
pub struct FlowAbsEngine<B: RenderBackend> {
    resources: Option<Resources<B>>,
}

impl<B: RenderBackend> Default for FlowAbsEngine<B> {
    fn default() -> Self {
        Self { resources: None }
    }
}

impl<B: RenderBackend> FlowAbsEngine<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedEngine<B> {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn is_initialized(&self) -> bool {
        self.resources.is_some()
    }

    pub fn size(&self) -> Option<(u32, u32)> {
        self.resources.as_ref().map(|r| (r.width, r.height))
    }

    /// Allocate targets, compile stages and generate the noise field.
    ///
    /// A second call at the same size is a no-op; a different size is an
    /// error. Nothing is kept unless every resource was created.
    pub fn init(&mut self, backend: &mut B, width: u32, height: u32) -> Result<()> {
        if let Some(size) = self.size() {
            if size == (width, height) {
                return Ok(());
            }
            return Err(FlowAbsError::ResolutionMismatch {
                expected: size,
                got: (width, height),
            });
        }

        let stages = Stages::new(backend, width, height)?;
        let fb = (1..=TARGET_COUNT)
            .map(|i| {
                RenderTarget::new(
                    &mut *backend,
                    width,
                    height,
                    PixelFormat::Rgba16Float,
                    &format!("flowabs-fb{i}"),
                )
            })
            .collect::<Result<Vec<_>>>()?;
        let noise = backend.upload_texture(
            &noise::generate(width, height),
            PixelFormat::Rgba8Unorm,
            "flowabs-noise",
        )?;

        self.resources = Some(Resources {
            width,
            height,
            fb,
            noise,
            stages,
        });
        log::info!("FlowAbs engine initialized at {width}x{height}");
        Ok(())
    }

    #[allow(clippy::type_complexity)]
    fn parts(
        &mut self,
        dst: &RenderTarget<B>,
    ) -> Result<(&[RenderTarget<B>], &mut Stages<B>, &B::Texture)> {
        let r = self
            .resources
            .as_mut()
            .ok_or_else(|| FlowAbsError::NotInitialized("FlowAbs engine".into()))?;
        if dst.size() != (r.width, r.height) {
            return Err(FlowAbsError::ResolutionMismatch {
                expected: (r.width, r.height),
                got: dst.size(),
            });
        }
        Ok((&r.fb, &mut r.stages, &r.noise))
    }

    pub fn copy(&mut self, b: &mut B, src: &B::Texture, dst: &RenderTarget<B>) -> Result<()> {
        let (_, st, _) = self.parts(dst)?;
        st.copy.draw(b, src, dst)
    }

    pub fn rgb2lab(&mut self, b: &mut B, src: &B::Texture, dst: &RenderTarget<B>) -> Result<()> {
        let (_, st, _) = self.parts(dst)?;
        st.rgb2lab.draw(b, src, dst)
    }

    pub fn lab2rgb(&mut self, b: &mut B, src: &B::Texture, dst: &RenderTarget<B>) -> Result<()> {
        let (_, st, _) = self.parts(dst)?;
        st.lab2rgb.draw(b, src, dst)
    }

    /// Line-integral convolution of the engine noise along the flow of `src`.
    pub fn tangent_flow_map(
        &mut self,
        b: &mut B,
        src: &B::Texture,
        dst: &RenderTarget<B>,
        sigma: f32,
    ) -> Result<()> {
        let (fb, st, noise) = self.parts(dst)?;
        st.rgb2lab.draw(b, src, &fb[FB1])?;
        st.tangent_flow(b, fb, fb[FB1].texture(), sigma)?;
        st.lic.set_scalar(Scalar::Sigma, FLOW_LIC_SIGMA)?;
        st.lic.draw_guided(b, noise, fb[FB2].texture(), dst)
    }

    /// `p.n` rounds of the two-pass oriented bilateral filter. With `n = 0`
    /// the result is the Lab round trip of `src`.
    pub fn bilateral_filter(
        &mut self,
        b: &mut B,
        src: &B::Texture,
        dst: &RenderTarget<B>,
        tfm_sigma: f32,
        p: &BilateralParams,
    ) -> Result<()> {
        let (fb, st, _) = self.parts(dst)?;
        st.rgb2lab.draw(b, src, &fb[FB1])?;
        if p.n == 0 {
            return st.lab2rgb.draw(b, fb[FB1].texture(), dst);
        }
        st.tangent_flow(b, fb, fb[FB1].texture(), tfm_sigma)?;
        st.bilateral(b, fb, fb[FB1].texture(), p)?;
        st.lab2rgb.draw(b, fb[FB3].texture(), dst)
    }

    /// Isotropic DoG edges. `n = 0` copies `src` through.
    pub fn dog(
        &mut self,
        b: &mut B,
        src: &B::Texture,
        dst: &RenderTarget<B>,
        p: &EdgeParams,
    ) -> Result<()> {
        let (fb, st, _) = self.parts(dst)?;
        if p.n == 0 {
            return st.copy.draw(b, src, dst);
        }
        st.rgb2lab.draw(b, src, &fb[FB1])?;
        st.edges(b, fb, fb[FB1].texture(), EdgeKind::Dog, p, dst)
    }

    /// Flow-based DoG edges. `n = 0` copies `src` through.
    pub fn fdog(
        &mut self,
        b: &mut B,
        src: &B::Texture,
        dst: &RenderTarget<B>,
        tfm_sigma: f32,
        p: &EdgeParams,
    ) -> Result<()> {
        let (fb, st, _) = self.parts(dst)?;
        if p.n == 0 {
            return st.copy.draw(b, src, dst);
        }
        st.rgb2lab.draw(b, src, &fb[FB1])?;
        st.tangent_flow(b, fb, fb[FB1].texture(), tfm_sigma)?;
        st.edges(b, fb, fb[FB1].texture(), EdgeKind::Fdog, p, dst)
    }

    pub fn color_quantization(
        &mut self,
        b: &mut B,
        src: &B::Texture,
        dst: &RenderTarget<B>,
        p: &QuantizeParams,
    ) -> Result<()> {
        let (fb, st, _) = self.parts(dst)?;
        st.rgb2lab.draw(b, src, &fb[FB1])?;
        st.quantize(b, fb, fb[FB1].texture(), p, dst)
    }

    /// Composite an edge map (1 = no edge) over `src` in `edge_color`.
    pub fn mix(
        &mut self,
        b: &mut B,
        src: &B::Texture,
        edges: &B::Texture,
        dst: &RenderTarget<B>,
        edge_color: [f32; 3],
    ) -> Result<()> {
        let (_, st, _) = self.parts(dst)?;
        st.mix.set_edge_color(edge_color)?;
        st.mix.draw_guided(b, src, edges, dst)
    }

    pub fn smooth_filter(
        &mut self,
        b: &mut B,
        src: &B::Texture,
        dst: &RenderTarget<B>,
        p: &SmoothParams,
    ) -> Result<()> {
        let (fb, st, _) = self.parts(dst)?;
        st.smooth(b, fb, src, p, dst)
    }

    /// The full abstraction: Lab, flow, bilateral, edges, quantization,
    /// edge overlay and final smoothing.
    pub fn flow_abs(
        &mut self,
        b: &mut B,
        src: &B::Texture,
        dst: &RenderTarget<B>,
        s: &FlowAbsSettings,
    ) -> Result<()> {
        let (fb, st, _) = self.parts(dst)?;
        st.rgb2lab.draw(b, src, &fb[FB1])?;
        st.tangent_flow(b, fb, fb[FB1].texture(), s.tfm_sigma)?;

        let with_edges = s.edges.n > 0;
        if with_edges {
            st.bilateral(b, fb, fb[FB1].texture(), &s.bilateral_e())?;
            st.edges(b, fb, fb[FB3].texture(), s.edge_type, &s.edges, &fb[FB5])?;
        }

        st.bilateral(b, fb, fb[FB1].texture(), &s.bilateral_a())?;
        st.quantize(b, fb, fb[FB3].texture(), &s.quantize, &fb[FB1])?;

        if with_edges {
            st.mix.set_edge_color(s.edge_color)?;
            st.mix
                .draw_guided(b, fb[FB1].texture(), fb[FB5].texture(), &fb[FB3])?;
        } else {
            st.copy.draw(b, fb[FB1].texture(), &fb[FB3])?;
        }

        st.smooth(b, fb, fb[FB3].texture(), &s.smooth, dst)
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec3, Vec4};

    use super::*;
    use crate::backend::BackendTexture;
    use crate::cpu::{CpuBackend, CpuTexture};
    use crate::error::ErrorClass;
    use crate::image::Image;

    fn engine(b: &mut CpuBackend, w: u32, h: u32) -> FlowAbsEngine<CpuBackend> {
        let mut e = FlowAbsEngine::new();
        e.init(b, w, h).unwrap();
        e
    }

    fn upload(b: &mut CpuBackend, img: &Image) -> CpuTexture {
        b.upload_texture(img, PixelFormat::Rgba8Unorm, "src").unwrap()
    }

    fn output(b: &mut CpuBackend, w: u32, h: u32) -> RenderTarget<CpuBackend> {
        RenderTarget::new(b, w, h, PixelFormat::Rgba8Unorm, "dst").unwrap()
    }

    fn read(b: &mut CpuBackend, t: &RenderTarget<CpuBackend>) -> Image {
        b.read_texture(t.texture()).unwrap()
    }

    fn default_edges() -> EdgeParams {
        FlowAbsSettings::default().edges
    }

    fn vertical_edge(w: u32, h: u32, edge: u32) -> Image {
        Image::from_fn(w, h, |x, _| {
            if x < edge {
                Vec4::new(0.0, 0.0, 0.0, 1.0)
            } else {
                Vec4::ONE
            }
        })
    }

    fn gradient(w: u32, h: u32) -> Image {
        Image::from_fn(w, h, |x, y| {
            let t = x as f32 / (w - 1) as f32;
            let s = y as f32 / (h - 1).max(1) as f32;
            Vec4::new(t, 0.5 * (t + s), 1.0 - s, 1.0)
        })
    }

    #[test]
    fn operations_before_init_are_rejected() {
        let mut b = CpuBackend::new();
        let mut e = FlowAbsEngine::<CpuBackend>::new();
        let src = upload(&mut b, &Image::new(4, 4));
        let dst = output(&mut b, 4, 4);
        let err = e.flow_abs(&mut b, &src, &dst, &FlowAbsSettings::default()).unwrap_err();
        assert_eq!(err.class(), ErrorClass::State);
        assert!(e.copy(&mut b, &src, &dst).is_err());
    }

    #[test]
    fn init_is_sized_once() {
        let mut b = CpuBackend::new();
        let mut e = engine(&mut b, 8, 6);
        assert_eq!(b.live_render_targets(), TARGET_COUNT);
        e.init(&mut b, 8, 6).unwrap();
        assert_eq!(b.live_render_targets(), TARGET_COUNT);
        assert!(matches!(
            e.init(&mut b, 16, 6),
            Err(FlowAbsError::ResolutionMismatch { expected: (8, 6), got: (16, 6) })
        ));
        assert_eq!(e.size(), Some((8, 6)));
    }

    #[test]
    fn failed_init_keeps_nothing() {
        let mut b = CpuBackend::new();
        let _dst = output(&mut b, 4, 4);
        let before = b.live_render_targets();

        let mut e = FlowAbsEngine::<CpuBackend>::new();
        assert!(e.init(&mut b, 0, 4).is_err());
        assert!(!e.is_initialized());
        assert_eq!(e.size(), None);
        assert_eq!(b.live_render_targets(), before);

        e.init(&mut b, 4, 4).unwrap();
        assert_eq!(b.live_render_targets(), before + TARGET_COUNT);
    }

    #[test]
    fn mismatched_destination_is_rejected() {
        let mut b = CpuBackend::new();
        let mut e = engine(&mut b, 8, 8);
        let src = upload(&mut b, &Image::new(8, 8));
        let dst = output(&mut b, 4, 4);
        assert!(matches!(
            e.copy(&mut b, &src, &dst),
            Err(FlowAbsError::ResolutionMismatch { .. })
        ));
    }

    #[test]
    fn bilateral_without_iterations_is_lab_round_trip() {
        let (w, h) = (12, 10);
        let mut b = CpuBackend::new();
        let mut e = engine(&mut b, w, h);
        let src = upload(&mut b, &gradient(w, h));
        let dst = output(&mut b, w, h);
        let p = BilateralParams {
            n: 0,
            sigma_d: 3.0,
            sigma_r: 4.25,
        };
        e.bilateral_filter(&mut b, &src, &dst, 2.28, &p).unwrap();

        let lab = RenderTarget::new(&mut b, w, h, PixelFormat::Rgba16Float, "lab").unwrap();
        let expected = output(&mut b, w, h);
        e.rgb2lab(&mut b, &src, &lab).unwrap();
        e.lab2rgb(&mut b, lab.texture(), &expected).unwrap();

        assert_eq!(read(&mut b, &dst), read(&mut b, &expected));
    }

    #[test]
    fn bilateral_smooths_noise_but_keeps_size() {
        let (w, h) = (16, 16);
        let mut b = CpuBackend::new();
        let mut e = engine(&mut b, w, h);
        let noisy = noise::generate(w, h);
        let src = upload(&mut b, &noisy);
        let dst = output(&mut b, w, h);
        let p = BilateralParams {
            n: 2,
            sigma_d: 3.0,
            sigma_r: 20.0,
        };
        e.bilateral_filter(&mut b, &src, &dst, 2.0, &p).unwrap();
        let out = read(&mut b, &dst);
        assert_eq!((out.width(), out.height()), (w, h));
        let spread = |img: &Image| {
            let (lo, hi) = img
                .pixels()
                .iter()
                .fold((f32::MAX, f32::MIN), |(lo, hi), p| (lo.min(p.x), hi.max(p.x)));
            hi - lo
        };
        assert!(spread(&out) < spread(&noisy));
    }

    #[test]
    fn smoothing_type_zero_is_copy() {
        let (w, h) = (9, 7);
        let mut b = CpuBackend::new();
        let mut e = engine(&mut b, w, h);
        let img = gradient(w, h);
        let src = upload(&mut b, &img);
        let dst = output(&mut b, w, h);
        let copied = output(&mut b, w, h);
        for sigma in [0.0, 1.0, 6.5] {
            let p = SmoothParams {
                kind: SmoothKind::None,
                sigma,
            };
            e.smooth_filter(&mut b, &src, &dst, &p).unwrap();
            e.copy(&mut b, &src, &copied).unwrap();
            let out = read(&mut b, &dst);
            assert_eq!(out, read(&mut b, &copied));
            assert!(out.max_rgb_diff(&img) < 1e-5);
        }
    }

    #[test]
    fn dog_single_iteration_is_one_pass() {
        let (w, h) = (24, 12);
        let mut b = CpuBackend::new();
        let mut e = engine(&mut b, w, h);
        let src = upload(&mut b, &vertical_edge(w, h, 10));
        let dst = output(&mut b, w, h);
        let p = default_edges();
        e.dog(&mut b, &src, &dst, &p).unwrap();

        let to_lab = ShaderStage::new(&mut b, StageKind::RgbToLab, w, h).unwrap();
        let mut dog = ShaderStage::new(&mut b, StageKind::Dog, w, h).unwrap();
        dog.set_scalar(Scalar::SigmaE, p.sigma_e).unwrap();
        dog.set_scalar(Scalar::SigmaR, p.sigma_r).unwrap();
        dog.set_scalar(Scalar::Tau, p.tau).unwrap();
        dog.set_scalar(Scalar::Phi, p.phi).unwrap();
        let lab = RenderTarget::new(&mut b, w, h, PixelFormat::Rgba16Float, "lab").unwrap();
        let expected = output(&mut b, w, h);
        to_lab.draw(&mut b, &src, &lab).unwrap();
        dog.draw(&mut b, lab.texture(), &expected).unwrap();

        assert_eq!(read(&mut b, &dst), read(&mut b, &expected));
    }

    #[test]
    fn fdog_single_iteration_is_one_pass() {
        let (w, h) = (20, 14);
        let mut b = CpuBackend::new();
        let mut e = engine(&mut b, w, h);
        let src = upload(&mut b, &gradient(w, h));
        let dst = output(&mut b, w, h);
        let p = default_edges();
        let tfm_sigma = 2.0;
        e.fdog(&mut b, &src, &dst, tfm_sigma, &p).unwrap();

        let stage = |b: &mut CpuBackend, kind| ShaderStage::new(b, kind, w, h).unwrap();
        let target = |b: &mut CpuBackend, label| {
            RenderTarget::new(b, w, h, PixelFormat::Rgba16Float, label).unwrap()
        };
        let to_lab = stage(&mut b, StageKind::RgbToLab);
        let sst = stage(&mut b, StageKind::StructureTensor);
        let mut gauss = stage(&mut b, StageKind::Gauss);
        let tfm = stage(&mut b, StageKind::TangentFlow);
        let mut fdog0 = stage(&mut b, StageKind::FdogPass0);
        let mut fdog1 = stage(&mut b, StageKind::FdogPass1);
        gauss.set_scalar(Scalar::Sigma, tfm_sigma).unwrap();
        fdog0.set_scalar(Scalar::SigmaE, p.sigma_e).unwrap();
        fdog0.set_scalar(Scalar::SigmaR, p.sigma_r).unwrap();
        fdog0.set_scalar(Scalar::Tau, p.tau).unwrap();
        fdog1.set_scalar(Scalar::SigmaM, p.sigma_m).unwrap();
        fdog1.set_scalar(Scalar::Phi, p.phi).unwrap();

        let lab = target(&mut b, "lab");
        let tensor = target(&mut b, "tensor");
        let smoothed = target(&mut b, "smoothed");
        let flow = target(&mut b, "flow");
        let response = target(&mut b, "response");
        let expected = output(&mut b, w, h);
        to_lab.draw(&mut b, &src, &lab).unwrap();
        sst.draw(&mut b, lab.texture(), &tensor).unwrap();
        gauss.draw(&mut b, tensor.texture(), &smoothed).unwrap();
        tfm.draw(&mut b, smoothed.texture(), &flow).unwrap();
        fdog0
            .draw_guided(&mut b, lab.texture(), flow.texture(), &response)
            .unwrap();
        fdog1
            .draw_guided(&mut b, response.texture(), flow.texture(), &expected)
            .unwrap();

        assert_eq!(read(&mut b, &dst), read(&mut b, &expected));
    }

    #[test]
    fn edges_without_iterations_copy_source() {
        let (w, h) = (8, 8);
        let mut b = CpuBackend::new();
        let mut e = engine(&mut b, w, h);
        let img = gradient(w, h);
        let src = upload(&mut b, &img);
        let dst = output(&mut b, w, h);
        let p = EdgeParams {
            n: 0,
            ..default_edges()
        };
        e.dog(&mut b, &src, &dst, &p).unwrap();
        assert!(read(&mut b, &dst).max_rgb_diff(&img) < 1e-5);
        e.fdog(&mut b, &src, &dst, 2.28, &p).unwrap();
        assert!(read(&mut b, &dst).max_rgb_diff(&img) < 1e-5);
    }

    fn step_edge(w: u32, h: u32, edge: u32) -> Image {
        Image::from_fn(w, h, |x, _| {
            let v = if x < edge { 0.3 } else { 1.0 };
            Vec4::new(v, v, v, 1.0)
        })
    }

    fn half_float(b: &mut CpuBackend, w: u32, h: u32, label: &str) -> RenderTarget<CpuBackend> {
        RenderTarget::new(b, w, h, PixelFormat::Rgba16Float, label).unwrap()
    }

    #[test]
    fn second_dog_iteration_runs_on_overlaid_source() {
        let (w, h) = (16, 8);
        let mut b = CpuBackend::new();
        let mut e = engine(&mut b, w, h);
        let src = upload(&mut b, &step_edge(w, h, 8));
        let once = output(&mut b, w, h);
        let twice = output(&mut b, w, h);
        let p = EdgeParams {
            n: 2,
            ..default_edges()
        };
        e.dog(&mut b, &src, &once, &EdgeParams { n: 1, ..p }).unwrap();
        e.dog(&mut b, &src, &twice, &p).unwrap();

        let to_lab = ShaderStage::new(&mut b, StageKind::RgbToLab, w, h).unwrap();
        let overlay = ShaderStage::new(&mut b, StageKind::Overlay, w, h).unwrap();
        let mut dog = ShaderStage::new(&mut b, StageKind::Dog, w, h).unwrap();
        dog.set_scalar(Scalar::SigmaE, p.sigma_e).unwrap();
        dog.set_scalar(Scalar::SigmaR, p.sigma_r).unwrap();
        dog.set_scalar(Scalar::Tau, p.tau).unwrap();
        dog.set_scalar(Scalar::Phi, p.phi).unwrap();
        let lab = half_float(&mut b, w, h, "lab");
        let first = half_float(&mut b, w, h, "first");
        let darkened = half_float(&mut b, w, h, "darkened");
        let expected = output(&mut b, w, h);
        to_lab.draw(&mut b, &src, &lab).unwrap();
        dog.draw(&mut b, lab.texture(), &first).unwrap();
        overlay
            .draw_guided(&mut b, lab.texture(), first.texture(), &darkened)
            .unwrap();
        dog.draw(&mut b, darkened.texture(), &expected).unwrap();

        let twice = read(&mut b, &twice);
        assert_eq!(twice, read(&mut b, &expected));
        assert!(twice.max_rgb_diff(&read(&mut b, &once)) > 0.1);
    }

    #[test]
    fn second_fdog_iteration_runs_on_overlaid_source() {
        let (w, h) = (16, 8);
        let tfm_sigma = 2.28;
        let mut b = CpuBackend::new();
        let mut e = engine(&mut b, w, h);
        let src = upload(&mut b, &step_edge(w, h, 8));
        let dst = output(&mut b, w, h);
        let p = EdgeParams {
            n: 2,
            ..default_edges()
        };
        e.fdog(&mut b, &src, &dst, tfm_sigma, &p).unwrap();

        let stage = |b: &mut CpuBackend, kind| ShaderStage::new(b, kind, w, h).unwrap();
        let to_lab = stage(&mut b, StageKind::RgbToLab);
        let sst = stage(&mut b, StageKind::StructureTensor);
        let mut gauss = stage(&mut b, StageKind::Gauss);
        let tfm = stage(&mut b, StageKind::TangentFlow);
        let overlay = stage(&mut b, StageKind::Overlay);
        let mut fdog0 = stage(&mut b, StageKind::FdogPass0);
        let mut fdog1 = stage(&mut b, StageKind::FdogPass1);
        gauss.set_scalar(Scalar::Sigma, tfm_sigma).unwrap();
        fdog0.set_scalar(Scalar::SigmaE, p.sigma_e).unwrap();
        fdog0.set_scalar(Scalar::SigmaR, p.sigma_r).unwrap();
        fdog0.set_scalar(Scalar::Tau, p.tau).unwrap();
        fdog1.set_scalar(Scalar::SigmaM, p.sigma_m).unwrap();
        fdog1.set_scalar(Scalar::Phi, p.phi).unwrap();

        let lab = half_float(&mut b, w, h, "lab");
        let tensor = half_float(&mut b, w, h, "tensor");
        let smoothed = half_float(&mut b, w, h, "smoothed");
        let flow = half_float(&mut b, w, h, "flow");
        let response = half_float(&mut b, w, h, "response");
        let first = half_float(&mut b, w, h, "first");
        let darkened = half_float(&mut b, w, h, "darkened");
        let expected = output(&mut b, w, h);
        to_lab.draw(&mut b, &src, &lab).unwrap();
        sst.draw(&mut b, lab.texture(), &tensor).unwrap();
        gauss.draw(&mut b, tensor.texture(), &smoothed).unwrap();
        tfm.draw(&mut b, smoothed.texture(), &flow).unwrap();
        fdog0
            .draw_guided(&mut b, lab.texture(), flow.texture(), &response)
            .unwrap();
        fdog1
            .draw_guided(&mut b, response.texture(), flow.texture(), &first)
            .unwrap();
        overlay
            .draw_guided(&mut b, lab.texture(), first.texture(), &darkened)
            .unwrap();
        fdog0
            .draw_guided(&mut b, darkened.texture(), flow.texture(), &response)
            .unwrap();
        fdog1
            .draw_guided(&mut b, response.texture(), flow.texture(), &expected)
            .unwrap();

        assert_eq!(read(&mut b, &dst), read(&mut b, &expected));
    }

    #[test]
    fn iterated_edges_stay_in_range() {
        let (w, h) = (16, 8);
        let mut b = CpuBackend::new();
        let mut e = engine(&mut b, w, h);
        let src = upload(&mut b, &vertical_edge(w, h, 8));
        let dst = output(&mut b, w, h);
        let p = EdgeParams {
            n: 3,
            ..default_edges()
        };
        e.dog(&mut b, &src, &dst, &p).unwrap();
        e.fdog(&mut b, &src, &dst, 2.28, &p).unwrap();
        let out = read(&mut b, &dst);
        assert!(out.pixels().iter().all(|p| (0.0..=1.0).contains(&p.x)));
    }

    #[test]
    fn vertical_edge_gives_narrow_dog_band() {
        let (w, h, edge) = (32, 8, 16);
        let mut b = CpuBackend::new();
        let mut e = engine(&mut b, w, h);
        let src = upload(&mut b, &vertical_edge(w, h, edge));
        let dst = output(&mut b, w, h);
        let p = EdgeParams {
            n: 1,
            sigma_e: 1.0,
            sigma_r: 1.6,
            sigma_m: 3.0,
            tau: 0.99,
            phi: 2.0,
        };
        e.dog(&mut b, &src, &dst, &p).unwrap();
        let out = read(&mut b, &dst);

        for y in 0..h {
            let response = |x: u32| 1.0 - out.get(x, y).x;
            for x in edge - 3..edge {
                assert!(response(x) > 0.9, "x={x} response={}", response(x));
            }
            for x in (0..=edge - 6).chain(edge..w) {
                assert!(response(x) < 0.01, "x={x} response={}", response(x));
            }
        }
    }

    #[test]
    fn more_bins_never_fewer_colors() {
        let (w, h) = (64, 2);
        let mut b = CpuBackend::new();
        let mut e = engine(&mut b, w, h);
        let ramp = Image::from_fn(w, h, |x, _| {
            let v = x as f32 / (w - 1) as f32;
            Vec4::new(v, v, v, 1.0)
        });
        let src = upload(&mut b, &ramp);
        let dst = output(&mut b, w, h);

        let mut previous = 0;
        for bins in 1..=8 {
            let p = QuantizeParams {
                filter: QuantizeFilter::None,
                num_bins: bins,
                phi_q: 0.0,
            };
            e.color_quantization(&mut b, &src, &dst, &p).unwrap();
            let out = read(&mut b, &dst);
            let mut reds: Vec<f32> = (0..w).map(|x| out.get(x, 0).x).collect();
            reds.sort_by(f32::total_cmp);
            let clusters = 1 + reds.windows(2).filter(|p| p[1] - p[0] > 0.01).count();
            assert_eq!(clusters, bins as usize + 1, "bins={bins}");
            assert!(clusters >= previous);
            previous = clusters;
        }
    }

    #[test]
    fn zero_bins_is_lab_round_trip() {
        let (w, h) = (10, 6);
        let mut b = CpuBackend::new();
        let mut e = engine(&mut b, w, h);
        let img = gradient(w, h);
        let src = upload(&mut b, &img);
        let dst = output(&mut b, w, h);
        let p = QuantizeParams {
            filter: QuantizeFilter::None,
            num_bins: 0,
            phi_q: 3.4,
        };
        e.color_quantization(&mut b, &src, &dst, &p).unwrap();
        assert!(read(&mut b, &dst).max_rgb_diff(&img) < 1e-3);
    }

    #[test]
    fn repeated_flow_abs_keeps_target_count() {
        let (w, h) = (16, 12);
        let mut b = CpuBackend::new();
        let mut e = engine(&mut b, w, h);
        let src = upload(&mut b, &gradient(w, h));
        let dst = output(&mut b, w, h);
        let settings = FlowAbsSettings::default();

        e.flow_abs(&mut b, &src, &dst, &settings).unwrap();
        let after_one = b.live_render_targets();
        for _ in 0..4 {
            e.flow_abs(&mut b, &src, &dst, &settings).unwrap();
        }
        assert_eq!(b.live_render_targets(), after_one);
        assert_eq!(after_one, TARGET_COUNT + 1);
    }

    #[test]
    fn flat_gray_stays_flat() {
        let (w, h) = (64, 64);
        let img = Image::filled(w, h, Vec4::new(0.5, 0.5, 0.5, 1.0));
        let mut b = CpuBackend::new();
        let mut e = engine(&mut b, w, h);
        let src = upload(&mut b, &img);
        let dst = output(&mut b, w, h);

        let mut s = FlowAbsSettings::default();
        s.bf_ne = 0;
        s.bf_na = 0;
        s.edge_type = EdgeKind::Dog;
        s.quantize.num_bins = 8;
        s.smooth.kind = SmoothKind::Blur3;
        e.flow_abs(&mut b, &src, &dst, &s).unwrap();

        let out = read(&mut b, &dst);
        assert_eq!((out.width(), out.height()), (64, 64));
        let first = out.get(0, 0);
        let (lo, hi) = out
            .pixels()
            .iter()
            .fold((first, first), |(lo, hi), p| (lo.min(*p), hi.max(*p)));
        assert!((hi - lo).truncate().max_element() < 1e-4, "spread {}", hi - lo);
        // Quantization may move the level, but the result stays gray.
        assert!((first.x - first.y).abs() < 1e-3 && (first.y - first.z).abs() < 1e-3);
    }

    #[test]
    fn edge_color_is_unused_without_edges() {
        let (w, h) = (12, 12);
        let mut b = CpuBackend::new();
        let mut e = engine(&mut b, w, h);
        let src = upload(&mut b, &vertical_edge(w, h, 6));
        let red = output(&mut b, w, h);
        let blue = output(&mut b, w, h);

        let mut s = FlowAbsSettings::default();
        s.edges.n = 0;
        s.edge_color = [1.0, 0.0, 0.0];
        e.flow_abs(&mut b, &src, &red, &s).unwrap();
        s.edge_color = [0.0, 0.0, 1.0];
        e.flow_abs(&mut b, &src, &blue, &s).unwrap();
        assert_eq!(read(&mut b, &red), read(&mut b, &blue));
    }

    #[test]
    fn edges_take_the_edge_color() {
        let (w, h) = (24, 8);
        let mut b = CpuBackend::new();
        let mut e = engine(&mut b, w, h);
        let src = upload(&mut b, &vertical_edge(w, h, 12));
        let dst = output(&mut b, w, h);

        let mut s = FlowAbsSettings::default();
        s.edge_type = EdgeKind::Dog;
        s.smooth.kind = SmoothKind::None;
        s.edge_color = [1.0, 0.0, 0.0];
        e.flow_abs(&mut b, &src, &dst, &s).unwrap();
        let out = read(&mut b, &dst);
        let p = out.get(10, 4);
        assert!(p.x > 0.9 && p.y < 0.1 && p.z < 0.1, "{p}");
    }

    #[test]
    fn tangent_flow_map_is_gray_lic() {
        let (w, h) = (16, 16);
        let mut b = CpuBackend::new();
        let mut e = engine(&mut b, w, h);
        let src = upload(&mut b, &vertical_edge(w, h, 8));
        let dst = output(&mut b, w, h);
        e.tangent_flow_map(&mut b, &src, &dst, 2.28).unwrap();
        let out = read(&mut b, &dst);
        for p in out.pixels() {
            assert!((p.x - p.y).abs() < 1e-5 && (p.y - p.z).abs() < 1e-5);
            assert!((0.0..=1.0).contains(&p.x));
        }
        assert_eq!(dst.texture().format(), PixelFormat::Rgba8Unorm);
    }

    #[test]
    fn mix_tints_edges() {
        let (w, h) = (4, 4);
        let mut b = CpuBackend::new();
        let mut e = engine(&mut b, w, h);
        let src = upload(&mut b, &Image::filled(w, h, Vec4::ONE));
        let edges = upload(&mut b, &Image::filled(w, h, Vec4::new(0.0, 0.0, 0.0, 1.0)));
        let dst = output(&mut b, w, h);
        e.mix(&mut b, &src, &edges, &dst, [0.0, 1.0, 0.0]).unwrap();
        let p = read(&mut b, &dst).get(2, 2);
        assert!((p.truncate() - Vec3::new(0.0, 1.0, 0.0)).abs().max_element() < 1e-6);
    }
}
