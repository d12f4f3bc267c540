use crossbeam_channel::Receiver;

use crate::backend::{PixelFormat, RenderBackend};
use crate::effect::{Effect, FlowAbsEffect, FlowAbsMode, ShaderEffect};
use crate::error::{ErrorClass, FlowAbsError, Result};
use crate::flowabs::FlowAbsEngine;
use crate::queue::{RenderCommand, RenderQueue};
use crate::stage::{ShaderStage, SourceTransform, StageKind};
use crate::target::RenderTarget;

/// A host frame: the texture plus where the logical image sits inside it.
pub struct SourceFrame<'a, B: RenderBackend> {
    pub texture: &'a B::Texture,
    pub transform: SourceTransform,
}

impl<'a, B: RenderBackend> SourceFrame<'a, B> {
    pub fn new(texture: &'a B::Texture) -> Self {
        Self {
            texture,
            transform: SourceTransform::IDENTITY,
        }
    }

    pub fn with_transform(texture: &'a B::Texture, transform: SourceTransform) -> Self {
        Self { texture, transform }
    }
}

/// Blit that resolves a transformed source into a plain frame-sized texture.
struct Ingest<B: RenderBackend> {
    stage: ShaderStage<B>,
    target: RenderTarget<B>,
}

impl<B: RenderBackend> Ingest<B> {
    fn new(backend: &mut B, width: u32, height: u32) -> Result<Self> {
        Ok(Self {
            stage: ShaderStage::new(backend, StageKind::Copy, width, height)?,
            target: RenderTarget::new(backend, width, height, PixelFormat::Rgba8Unorm, "ingest")?,
        })
    }
}

/// The render-thread side: registered effects, the active one, and the
/// command inbox.
pub struct EffectGraph<B: RenderBackend + 'static> {
    effects: Vec<Box<dyn Effect<B>>>,
    active: Option<usize>,
    width: u32,
    height: u32,
    queue: RenderQueue,
    commands: Receiver<RenderCommand>,
    ingest: Option<Ingest<B>>,
}

impl<B: RenderBackend + 'static> EffectGraph<B> {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(FlowAbsError::InvalidSize {
                what: "frame".into(),
                width,
                height,
            });
        }
        let (queue, commands) = RenderQueue::channel();
        Ok(Self {
            effects: Vec::new(),
            active: None,
            width,
            height,
            queue,
            commands,
            ingest: None,
        })
    }

    /// Passthrough, Gaussian Blur, then the composite and every FlowAbs
    /// sub-effect over one shared engine.
    pub fn with_standard_effects(width: u32, height: u32) -> Result<Self> {
        let mut graph = Self::new(width, height)?;
        graph.add(Box::new(ShaderEffect::passthrough()));
        graph.add(Box::new(ShaderEffect::gaussian_blur()));
        let engine = FlowAbsEngine::shared();
        for mode in FlowAbsMode::ALL {
            graph.add(Box::new(FlowAbsEffect::new(mode, engine.clone())));
        }
        Ok(graph)
    }

    pub fn add(&mut self, effect: Box<dyn Effect<B>>) -> usize {
        self.effects.push(effect);
        self.effects.len() - 1
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn effect(&self, index: usize) -> Option<&dyn Effect<B>> {
        self.effects.get(index).map(|e| e.as_ref())
    }

    pub fn effect_mut(&mut self, index: usize) -> Result<&mut (dyn Effect<B> + 'static)> {
        match self.effects.get_mut(index) {
            Some(effect) => Ok(effect.as_mut()),
            None => Err(FlowAbsError::UnknownEffect(index)),
        }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.effects.iter().position(|e| e.name() == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.effects.iter().map(|e| e.name())
    }

    pub fn active(&self) -> Option<usize> {
        self.active
    }

    /// A sender for posting commands from any thread.
    pub fn queue(&self) -> RenderQueue {
        self.queue.clone()
    }

    /// Make `index` the active effect, initializing it on first selection.
    pub fn select(&mut self, backend: &mut B, index: usize) -> Result<()> {
        let (width, height) = (self.width, self.height);
        let effect = self.effect_mut(index)?;
        if !effect.is_initialized() {
            effect.init(backend, width, height)?;
        }
        log::debug!("Selected effect {index} ({})", effect.name());
        self.active = Some(index);
        Ok(())
    }

    /// Run pending commands, then render the active effect into `target`.
    pub fn apply(
        &mut self,
        backend: &mut B,
        frame: &SourceFrame<'_, B>,
        target: &RenderTarget<B>,
    ) -> Result<()> {
        self.drain_commands(backend)?;
        let index = self
            .active
            .ok_or_else(|| FlowAbsError::NotInitialized("effect graph (nothing selected)".into()))?;

        let src = if frame.transform.is_identity() {
            frame.texture
        } else {
            let ingest = match self.ingest.take() {
                Some(ingest) => ingest,
                None => Ingest::new(backend, self.width, self.height)?,
            };
            let ingest = self.ingest.insert(ingest);
            ingest.stage.set_source_transform(frame.transform)?;
            ingest.stage.draw(backend, frame.texture, &ingest.target)?;
            ingest.target.texture()
        };

        self.effects[index].apply(backend, src, target)
    }

    /// Execute every queued command. Configuration mistakes (unknown
    /// effect or parameter, unsupported edge color) are logged and dropped.
    /// Any other failure stops the drain and is returned; commands behind
    /// it stay queued.
    pub fn drain_commands(&mut self, backend: &mut B) -> Result<()> {
        while let Ok(command) = self.commands.try_recv() {
            log::debug!("Render command {command:?}");
            match self.execute(backend, &command) {
                Ok(()) => {}
                Err(e) if e.class() == ErrorClass::Configuration => {
                    log::warn!("Dropped render command {command:?}: {e}");
                }
                Err(e) => {
                    log::error!("Render command {command:?} failed: {e}");
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn execute(&mut self, backend: &mut B, command: &RenderCommand) -> Result<()> {
        match *command {
            RenderCommand::Select(index) => self.select(backend, index),
            RenderCommand::SetParam {
                effect,
                index,
                value,
            } => self.effect_mut(effect)?.set_param(index, value).map(|_| ()),
            RenderCommand::ResetParam { effect, index } => {
                self.effect_mut(effect)?.reset_param(index).map(|_| ())
            }
            RenderCommand::ResetParams(effect) => self.effect_mut(effect)?.reset_params(),
            RenderCommand::SetEdgeColor { effect, rgb } => {
                self.effect_mut(effect)?.set_edge_color(rgb)
            }
        }
    }
}
