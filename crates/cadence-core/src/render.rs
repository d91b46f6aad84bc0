//! Deferred draw commands
//!
//! The view stage fills a fresh [`RenderBuffer`] each frame, in whatever
//! order is convenient, then the buffer is sorted once and handed to a
//! [`Renderer`] as a [`Frame`]. Sorting is stable: draw commands with equal
//! keys keep their insertion order, so layering within a key is
//! painter's-algorithm order.

/// Accepts finished frames of sorted draw commands
pub trait Renderer<K, D> {
    /// Submit one frame
    fn submit_frame(&mut self, frame: Frame<K, D>);
}

/// Per-frame collection of (sort key, draw command) pairs
#[derive(Debug, Clone)]
pub struct RenderBuffer<K, D> {
    items: Vec<(K, D)>,
    sorted: bool,
}

impl<K: Ord, D> RenderBuffer<K, D> {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty buffer with room for `capacity` commands
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            sorted: true,
        }
    }

    /// Append a draw command
    pub fn add(&mut self, key: K, command: D) {
        self.items.push((key, command));
        self.sorted = false;
    }

    /// Stable sort by key, ascending
    pub fn sort(&mut self) {
        if !self.sorted {
            self.items.sort_by(|a, b| a.0.cmp(&b.0));
            self.sorted = true;
        }
    }

    /// Whether the buffer is in key order
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Get the `i`th pair
    pub fn get(&self, i: usize) -> Option<(&K, &D)> {
        self.items.get(i).map(|(k, d)| (k, d))
    }

    /// Iterate over the pairs in their current order
    pub fn iter(&self) -> impl Iterator<Item = (&K, &D)> {
        self.items.iter().map(|(k, d)| (k, d))
    }

    /// Number of draw commands
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if nothing has been drawn
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sort and freeze into a frame
    pub fn finish(mut self) -> Frame<K, D> {
        self.sort();
        Frame { items: self.items }
    }

    /// Sort, then hand the frame to `renderer`
    ///
    /// Returns the number of draw commands submitted.
    pub fn submit(self, renderer: &mut impl Renderer<K, D>) -> usize {
        let frame = self.finish();
        let count = frame.len();
        renderer.submit_frame(frame);
        count
    }
}

impl<K: Ord, D> Default for RenderBuffer<K, D> {
    fn default() -> Self {
        Self::new()
    }
}

/// A sorted, read-only frame of draw commands
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<K, D> {
    items: Vec<(K, D)>,
}

impl<K, D> Frame<K, D> {
    /// Get the `i`th pair
    pub fn get(&self, i: usize) -> Option<(&K, &D)> {
        self.items.get(i).map(|(k, d)| (k, d))
    }

    /// Iterate over the pairs in submission order
    pub fn iter(&self) -> impl Iterator<Item = (&K, &D)> {
        self.items.iter().map(|(k, d)| (k, d))
    }

    /// Iterate over the draw commands only
    pub fn commands(&self) -> impl Iterator<Item = &D> {
        self.items.iter().map(|(_, d)| d)
    }

    /// Take the draw commands, in submission order
    pub fn into_commands(self) -> Vec<D> {
        self.items.into_iter().map(|(_, d)| d).collect()
    }

    /// Number of draw commands
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the frame is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
