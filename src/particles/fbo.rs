//! Double buffering of simulation state.

/// Two slots of which one is read and the other written each frame.
///
/// After [`PingPong::swap`] the slot that was just written becomes the one
/// that is read, so a simulation step always consumes the previous step's
/// output. Slot `A` (index 0) is read first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingPong<T> {
    slots: [T; 2],
    read: usize,
}

impl<T> PingPong<T> {
    pub fn new(a: T, b: T) -> Self {
        Self {
            slots: [a, b],
            read: 0,
        }
    }

    pub fn from_fn(mut f: impl FnMut(usize) -> T) -> Self {
        Self::new(f(0), f(1))
    }

    pub fn read(&self) -> &T {
        &self.slots[self.read]
    }

    pub fn write(&self) -> &T {
        &self.slots[1 - self.read]
    }

    pub fn write_mut(&mut self) -> &mut T {
        &mut self.slots[1 - self.read]
    }

    pub fn swap(&mut self) {
        self.read = 1 - self.read;
    }

    /// Index of the slot currently read: 0 for `A`, 1 for `B`.
    pub fn read_index(&self) -> usize {
        self.read
    }

    /// Make `A` the read slot again.
    pub fn reset(&mut self) {
        self.read = 0;
    }

    pub fn a(&self) -> &T {
        &self.slots[0]
    }

    pub fn b(&self) -> &T {
        &self.slots[1]
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter()
    }
}
