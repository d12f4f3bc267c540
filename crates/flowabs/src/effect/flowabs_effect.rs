use super::{Effect, EffectCore};
use crate::backend::RenderBackend;
use crate::error::{FlowAbsError, Result};
use crate::flowabs::{FlowAbsSettings, Setting, SharedEngine};
use crate::params::{ParamDef, ParamValue};
use crate::target::RenderTarget;

/// Which engine operation an effect exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowAbsMode {
    Composite,
    TangentFlow,
    Bilateral,
    DogEdges,
    FdogEdges,
    ColorQuantization,
    Smoothing,
}

impl FlowAbsMode {
    pub const ALL: [FlowAbsMode; 7] = [
        FlowAbsMode::Composite,
        FlowAbsMode::TangentFlow,
        FlowAbsMode::Bilateral,
        FlowAbsMode::DogEdges,
        FlowAbsMode::FdogEdges,
        FlowAbsMode::ColorQuantization,
        FlowAbsMode::Smoothing,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FlowAbsMode::Composite => "FlowAbs",
            FlowAbsMode::TangentFlow => "Tangent Flow",
            FlowAbsMode::Bilateral => "Bilateral Filter",
            FlowAbsMode::DogEdges => "DoG Edges",
            FlowAbsMode::FdogEdges => "FDoG Edges",
            FlowAbsMode::ColorQuantization => "Color Quantization",
            FlowAbsMode::Smoothing => "Smoothing",
        }
    }

    /// Parameters in presentation order.
    pub fn settings(self) -> &'static [Setting] {
        use Setting::*;
        match self {
            FlowAbsMode::Composite => &Setting::ALL,
            FlowAbsMode::TangentFlow => &[TfmSigma],
            FlowAbsMode::Bilateral => &[TfmSigma, BfNa, BfSigmaD, BfSigmaR],
            FlowAbsMode::DogEdges => &[FdogN, FdogSigmaE, FdogSigmaR, FdogTau, FdogPhi],
            FlowAbsMode::FdogEdges => &[
                TfmSigma,
                FdogN,
                FdogSigmaE,
                FdogSigmaR,
                FdogSigmaM,
                FdogTau,
                FdogPhi,
            ],
            FlowAbsMode::ColorQuantization => &[CqFilter, CqNumBins, CqPhiQ],
            FlowAbsMode::Smoothing => &[FsType, FsSigma],
        }
    }
}

/// An effect backed by the shared FlowAbs engine. Each instance keeps its own
/// settings; the engine only owns targets and stages.
pub struct FlowAbsEffect<B: RenderBackend> {
    core: EffectCore,
    mode: FlowAbsMode,
    engine: SharedEngine<B>,
    settings: FlowAbsSettings,
}

impl<B: RenderBackend> FlowAbsEffect<B> {
    pub fn new(mode: FlowAbsMode, engine: SharedEngine<B>) -> Self {
        let defs: Vec<ParamDef> = mode.settings().iter().map(|s| s.def()).collect();
        Self {
            core: EffectCore::new(mode.name(), &defs),
            mode,
            engine,
            settings: FlowAbsSettings::default(),
        }
    }

    pub fn settings(&self) -> &FlowAbsSettings {
        &self.settings
    }
}

impl<B: RenderBackend> Effect<B> for FlowAbsEffect<B> {
    fn core(&self) -> &EffectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EffectCore {
        &mut self.core
    }

    /// Sizes the shared engine unless a sibling already has.
    fn init(&mut self, backend: &mut B, width: u32, height: u32) -> Result<()> {
        let mut engine = self.engine.borrow_mut();
        if engine.is_initialized() {
            log::debug!("{}: reusing shared engine", self.core.name);
        }
        engine.init(backend, width, height)
    }

    fn is_initialized(&self) -> bool {
        self.engine.borrow().is_initialized()
    }

    fn apply(&mut self, backend: &mut B, src: &B::Texture, target: &RenderTarget<B>) -> Result<()> {
        let mut engine = self.engine.borrow_mut();
        if !engine.is_initialized() {
            return Err(FlowAbsError::NotInitialized(self.core.name.clone()));
        }
        let s = &self.settings;
        match self.mode {
            FlowAbsMode::Composite => engine.flow_abs(backend, src, target, s),
            FlowAbsMode::TangentFlow => engine.tangent_flow_map(backend, src, target, s.tfm_sigma),
            FlowAbsMode::Bilateral => {
                engine.bilateral_filter(backend, src, target, s.tfm_sigma, &s.bilateral_a())
            }
            FlowAbsMode::DogEdges => engine.dog(backend, src, target, &s.edges),
            FlowAbsMode::FdogEdges => engine.fdog(backend, src, target, s.tfm_sigma, &s.edges),
            FlowAbsMode::ColorQuantization => {
                engine.color_quantization(backend, src, target, &s.quantize)
            }
            FlowAbsMode::Smoothing => engine.smooth_filter(backend, src, target, &s.smooth),
        }
    }

    fn bind_param(&mut self, index: usize, value: ParamValue) -> Result<()> {
        let setting = self.mode.settings()[index];
        self.settings.apply(setting, value);
        Ok(())
    }

    fn set_edge_color(&mut self, rgb: [f32; 3]) -> Result<()> {
        if self.mode != FlowAbsMode::Composite {
            return Err(FlowAbsError::Unsupported {
                effect: self.core.name.clone(),
                what: "edge color",
            });
        }
        self.settings.edge_color = rgb;
        Ok(())
    }
}
