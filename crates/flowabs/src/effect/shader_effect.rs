use super::{Effect, EffectCore};
use crate::backend::RenderBackend;
use crate::error::{FlowAbsError, Result};
use crate::params::{ParamDef, ParamValue};
use crate::stage::{Scalar, ShaderStage, StageKind};
use crate::target::RenderTarget;

/// One single-input stage drawn as a fullscreen pass. Each parameter feeds
/// one scalar uniform of the stage.
pub struct ShaderEffect<B: RenderBackend> {
    core: EffectCore,
    kind: StageKind,
    bindings: Vec<Scalar>,
    stage: Option<ShaderStage<B>>,
    size: (u32, u32),
}

impl<B: RenderBackend> ShaderEffect<B> {
    pub fn new(name: &str, kind: StageKind, params: &[(ParamDef, Scalar)]) -> Self {
        debug_assert_eq!(kind.input_count(), 1, "{kind} needs a guidance texture");
        let defs: Vec<ParamDef> = params.iter().map(|(def, _)| def.clone()).collect();
        Self {
            core: EffectCore::new(name, &defs),
            kind,
            bindings: params.iter().map(|(_, scalar)| *scalar).collect(),
            stage: None,
            size: (0, 0),
        }
    }

    pub fn passthrough() -> Self {
        Self::new("Passthrough", StageKind::Copy, &[])
    }

    pub fn gaussian_blur() -> Self {
        Self::new(
            "Gaussian Blur",
            StageKind::Gauss,
            &[(ParamDef::float("sigma", 2.0, 0.0, 8.0), Scalar::Sigma)],
        )
    }

    pub fn stage(&self) -> Option<&ShaderStage<B>> {
        self.stage.as_ref()
    }
}

impl<B: RenderBackend> Effect<B> for ShaderEffect<B> {
    fn core(&self) -> &EffectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EffectCore {
        &mut self.core
    }

    fn init(&mut self, backend: &mut B, width: u32, height: u32) -> Result<()> {
        if self.stage.is_some() {
            if self.size == (width, height) {
                return Ok(());
            }
            return Err(FlowAbsError::ResolutionMismatch {
                expected: self.size,
                got: (width, height),
            });
        }
        let mut stage = ShaderStage::new(backend, self.kind, width, height)?;
        for (scalar, value) in self.bindings.iter().zip(self.core.params.values()) {
            stage.set_scalar(*scalar, value.as_f32())?;
        }
        self.stage = Some(stage);
        self.size = (width, height);
        log::debug!("{} initialized at {width}x{height}", self.core.name);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.stage.is_some()
    }

    fn apply(&mut self, backend: &mut B, src: &B::Texture, target: &RenderTarget<B>) -> Result<()> {
        let stage = self
            .stage
            .as_ref()
            .ok_or_else(|| FlowAbsError::NotInitialized(self.core.name.clone()))?;
        stage.draw(backend, src, target)
    }

    fn bind_param(&mut self, index: usize, value: ParamValue) -> Result<()> {
        let scalar = self.bindings[index];
        // Before init the value stays in the store and is pushed by `init`.
        match &mut self.stage {
            Some(stage) => stage.set_scalar(scalar, value.as_f32()),
            None => Ok(()),
        }
    }
}
