/// Frame id and frame-in-flight slot bookkeeping.
pub struct FrameCounter {
    /// Monotonic frame number.
    frame_id: u64,
    fif_count: usize,
}

// new & init
impl FrameCounter {
    pub const DEFAULT_FIF_COUNT: usize = 3;

    pub fn new(init_frame_id: u64, fif_count: usize) -> Self {
        Self {
            frame_id: init_frame_id,
            fif_count: fif_count.max(1),
        }
    }
}

impl Default for FrameCounter {
    fn default() -> Self {
        Self::new(0, Self::DEFAULT_FIF_COUNT)
    }
}

// update
impl FrameCounter {
    #[inline]
    pub fn next_frame(&mut self) {
        self.frame_id = self.frame_id.wrapping_add(1);
    }
}

// getters
impl FrameCounter {
    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    #[inline]
    pub fn fif_count(&self) -> usize {
        self.fif_count
    }

    /// Slot of the current frame; instance index of multi-buffered resources.
    #[inline]
    pub fn fif_index(&self) -> usize {
        (self.frame_id % self.fif_count as u64) as usize
    }

    /// Slot letter, `A` for slot 0.
    #[inline]
    pub fn frame_label(&self) -> char {
        (b'A' + (self.fif_index() % 26) as u8) as char
    }

    #[inline]
    pub fn frame_name(&self) -> String {
        format!("[F{}{}]", self.frame_id, self.frame_label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fif_index_cycles() {
        let mut counter = FrameCounter::new(0, 3);
        let slots: Vec<usize> = (0..7)
            .map(|_| {
                let slot = counter.fif_index();
                counter.next_frame();
                slot
            })
            .collect();
        assert_eq!(slots, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_frame_name() {
        let counter = FrameCounter::new(4, 3);
        assert_eq!(counter.frame_name(), "[F4B]");
    }

    #[test]
    fn test_zero_fif_count_is_clamped() {
        let counter = FrameCounter::new(5, 0);
        assert_eq!(counter.fif_count(), 1);
        assert_eq!(counter.fif_index(), 0);
    }
}
