//! Output emitters.

/// Receives the outputs of a transformation.
pub trait Emitter<T> {
    /// Emits one value.
    fn emit(&mut self, value: T);
}

impl<T> Emitter<T> for Vec<T> {
    fn emit(&mut self, value: T) {
        self.push(value);
    }
}

/// A reusable, explicitly resettable output buffer.
///
/// The buffer keeps its allocation across [`reset`](Self::reset) and
/// [`drain`](Self::drain), so one instance can serve every record of a task.
/// It is owned by a single task and never shared.
#[derive(Debug, Clone)]
pub struct BufferedEmitter<T> {
    entries: Vec<T>,
}

/// The buffer a pre-group stage collects an aggregator's group keys into.
pub type GroupKeyEmitter<K> = BufferedEmitter<K>;

impl<T> Default for BufferedEmitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BufferedEmitter<T> {
    /// Creates an empty buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Creates an empty buffer with room for `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Clears every previously emitted entry.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Returns the entries emitted since the last reset.
    #[must_use]
    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    /// Removes and yields the entries, leaving the buffer empty.
    pub fn drain(&mut self) -> std::vec::Drain<'_, T> {
        self.entries.drain(..)
    }

    /// Returns the number of buffered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the allocated capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }
}

impl<T> Emitter<T> for BufferedEmitter<T> {
    fn emit(&mut self, value: T) {
        self.entries.push(value);
    }
}
