//! Headless helpers for exercising a program without a real renderer

use cadence_core::{Frame, Renderer};

/// A renderer that keeps every frame it is given
#[derive(Debug, Clone)]
pub struct RecordingRenderer<K, D> {
    frames: Vec<Frame<K, D>>,
}

impl<K, D> RecordingRenderer<K, D> {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Every frame submitted so far, oldest first
    pub fn frames(&self) -> &[Frame<K, D>] {
        &self.frames
    }

    /// The most recent frame
    pub fn last_frame(&self) -> Option<&Frame<K, D>> {
        self.frames.last()
    }

    /// Number of frames submitted
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Forget recorded frames
    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

impl<K, D> Default for RecordingRenderer<K, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, D> Renderer<K, D> for RecordingRenderer<K, D> {
    fn submit_frame(&mut self, frame: Frame<K, D>) {
        self.frames.push(frame);
    }
}
