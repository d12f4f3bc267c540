use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::params::ParamValue;

/// Work posted from the host thread, executed by the render thread between
/// frames.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    Select(usize),
    SetParam {
        effect: usize,
        index: usize,
        value: ParamValue,
    },
    ResetParam {
        effect: usize,
        index: usize,
    },
    ResetParams(usize),
    SetEdgeColor {
        effect: usize,
        rgb: [f32; 3],
    },
}

/// Sending half of the render command channel. Cheap to clone and `Send`,
/// so any thread can post; nothing blocks.
#[derive(Clone)]
pub struct RenderQueue {
    tx: Sender<RenderCommand>,
}

impl RenderQueue {
    pub fn channel() -> (RenderQueue, Receiver<RenderCommand>) {
        let (tx, rx) = unbounded();
        (RenderQueue { tx }, rx)
    }

    pub fn post(&self, command: RenderCommand) {
        if let Err(e) = self.tx.send(command) {
            log::warn!("render queue closed, dropping {:?}", e.into_inner());
        }
    }

    pub fn select(&self, effect: usize) {
        self.post(RenderCommand::Select(effect));
    }

    pub fn set_param(&self, effect: usize, index: usize, value: ParamValue) {
        self.post(RenderCommand::SetParam {
            effect,
            index,
            value,
        });
    }

    pub fn reset_param(&self, effect: usize, index: usize) {
        self.post(RenderCommand::ResetParam { effect, index });
    }

    pub fn reset_params(&self, effect: usize) {
        self.post(RenderCommand::ResetParams(effect));
    }

    /// All three components travel in one command, so the render thread never
    /// sees a half-updated color.
    pub fn set_edge_color(&self, effect: usize, rgb: [f32; 3]) {
        self.post(RenderCommand::SetEdgeColor { effect, rgb });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_arrive_in_order() {
        let (queue, rx) = RenderQueue::channel();
        queue.select(2);
        queue.set_param(2, 0, ParamValue::Float(1.5));
        queue.set_edge_color(2, [1.0, 0.5, 0.0]);
        let got: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            got,
            vec![
                RenderCommand::Select(2),
                RenderCommand::SetParam {
                    effect: 2,
                    index: 0,
                    value: ParamValue::Float(1.5)
                },
                RenderCommand::SetEdgeColor {
                    effect: 2,
                    rgb: [1.0, 0.5, 0.0]
                },
            ]
        );
    }

    #[test]
    fn posting_after_receiver_dropped_does_not_panic() {
        let (queue, rx) = RenderQueue::channel();
        drop(rx);
        queue.reset_params(0);
    }
}
