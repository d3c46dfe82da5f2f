use crate::common::types::FrameId;

/// One ring descriptor. Slots are indexed by frame ID, so a frame can occupy
/// at most one descriptor and the ring can never outgrow its arena.
#[derive(Debug, Clone, Copy)]
struct ClockSlot {
    prev: FrameId,
    next: FrameId,
    present: bool,
    pinned: bool,
    referenced: bool,
}

impl ClockSlot {
    fn empty() -> Self {
        Self {
            prev: 0,
            next: 0,
            present: false,
            pinned: false,
            referenced: false,
        }
    }
}

/// Clock page replacement policy, an approximation of LRU.
///
/// The replacer tracks one descriptor per frame that has been unpinned at
/// least once since it became resident. Descriptors form a circular list
/// threaded through a fixed arena (`slots`), walked by a hand pointer; new
/// descriptors join just before `head`, i.e. at the tail of the ring.
pub struct ClockReplacer {
    slots: Vec<ClockSlot>,
    /// Oldest descriptor, insertion anchor
    head: Option<FrameId>,
    /// The clock hand
    hand: Option<FrameId>,
    /// Number of descriptors in the ring
    clock_size: usize,
    /// Number of pinned descriptors in the ring
    pin_size: usize,
}

impl ClockReplacer {
    pub fn new(pool_size: usize) -> Self {
        Self {
            slots: vec![ClockSlot::empty(); pool_size],
            head: None,
            hand: None,
            clock_size: 0,
            pin_size: 0,
        }
    }

    /// Mark a frame eviction-eligible.
    ///
    /// A frame the ring does not know yet is inserted with its reference bit
    /// set; a known pinned frame has its pin bit cleared. Unpinning an
    /// already-unpinned frame changes nothing.
    pub fn unpin(&mut self, frame_id: FrameId) {
        assert!(frame_id < self.slots.len(), "frame {} out of range", frame_id);

        if self.slots[frame_id].present {
            let slot = &mut self.slots[frame_id];
            if slot.pinned {
                slot.pinned = false;
                self.pin_size -= 1;
            }
            return;
        }

        match self.head {
            None => {
                let slot = &mut self.slots[frame_id];
                slot.prev = frame_id;
                slot.next = frame_id;
                self.head = Some(frame_id);
                self.hand = Some(frame_id);
            }
            Some(head) => {
                let tail = self.slots[head].prev;
                self.slots[tail].next = frame_id;
                self.slots[head].prev = frame_id;
                let slot = &mut self.slots[frame_id];
                slot.prev = tail;
                slot.next = head;
            }
        }

        let slot = &mut self.slots[frame_id];
        slot.present = true;
        slot.pinned = false;
        slot.referenced = true;
        self.clock_size += 1;
    }

    /// Mark a frame ineligible for eviction. No-op for frames the ring does
    /// not know.
    pub fn pin(&mut self, frame_id: FrameId) {
        if frame_id >= self.slots.len() || !self.slots[frame_id].present {
            return;
        }
        let slot = &mut self.slots[frame_id];
        if !slot.pinned {
            slot.pinned = true;
            self.pin_size += 1;
        }
        slot.referenced = true;
    }

    /// Select an eviction victim under the clock policy and remove it from
    /// the ring.
    ///
    /// Starting at the hand, the walk covers at most one full revolution:
    /// pinned entries are skipped, the first unreferenced entry wins, and
    /// referenced entries get their bit cleared. If every unpinned entry
    /// started the walk referenced, the one with the smallest frame ID is
    /// chosen so the outcome stays deterministic.
    pub fn victim(&mut self) -> Option<FrameId> {
        let mut cursor = self.hand?;
        let mut chosen: Option<FrameId> = None;
        let mut fallback: Option<FrameId> = None;

        for _ in 0..self.clock_size {
            let slot = &mut self.slots[cursor];
            if slot.pinned {
                cursor = slot.next;
                continue;
            }
            if !slot.referenced {
                chosen = Some(cursor);
                break;
            }
            slot.referenced = false;
            if fallback.map_or(true, |best| cursor < best) {
                fallback = Some(cursor);
            }
            cursor = slot.next;
        }

        let victim = chosen.or(fallback)?;
        let successor = self.slots[victim].next;
        self.detach(victim);
        if self.clock_size > 0 {
            self.hand = Some(successor);
        }
        Some(victim)
    }

    /// Drop a frame from the ring entirely, e.g. when its page is deleted.
    pub fn remove(&mut self, frame_id: FrameId) {
        if frame_id < self.slots.len() && self.slots[frame_id].present {
            self.detach(frame_id);
        }
    }

    /// Count of eviction-eligible frames
    pub fn size(&self) -> usize {
        self.clock_size - self.pin_size
    }

    /// Whether the ring holds a descriptor for this frame
    pub fn contains(&self, frame_id: FrameId) -> bool {
        frame_id < self.slots.len() && self.slots[frame_id].present
    }

    fn detach(&mut self, frame_id: FrameId) {
        if self.clock_size == 1 {
            self.head = None;
            self.hand = None;
        } else {
            let ClockSlot { prev, next, .. } = self.slots[frame_id];
            self.slots[prev].next = next;
            self.slots[next].prev = prev;
            if self.head == Some(frame_id) {
                self.head = Some(next);
            }
            if self.hand == Some(frame_id) {
                self.hand = Some(next);
            }
        }

        let slot = &mut self.slots[frame_id];
        if slot.pinned {
            self.pin_size -= 1;
        }
        *slot = ClockSlot::empty();
        self.clock_size -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_ring_has_no_victim() {
        let mut replacer = ClockReplacer::new(4);
        assert_eq!(replacer.victim(), None);
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_unpin_is_idempotent() {
        let mut replacer = ClockReplacer::new(4);
        replacer.unpin(2);
        replacer.unpin(2);
        assert_eq!(replacer.size(), 1);
    }

    #[test]
    fn test_pin_unknown_frame_is_noop() {
        let mut replacer = ClockReplacer::new(4);
        replacer.pin(3);
        assert_eq!(replacer.size(), 0);
        assert!(!replacer.contains(3));
    }

    #[test]
    fn test_single_entry_ring_collapses() {
        let mut replacer = ClockReplacer::new(4);
        replacer.unpin(0);
        assert_eq!(replacer.victim(), Some(0));
        assert_eq!(replacer.victim(), None);
        assert!(!replacer.contains(0));
    }

    #[test]
    fn test_size_counts_only_unpinned() {
        let mut replacer = ClockReplacer::new(4);
        replacer.unpin(0);
        replacer.unpin(1);
        replacer.unpin(2);
        replacer.pin(0);
        replacer.pin(1);
        assert_eq!(replacer.size(), 1);
        replacer.unpin(1);
        assert_eq!(replacer.size(), 2);
    }

    #[test]
    fn test_all_referenced_takes_smallest_frame_id() {
        let mut replacer = ClockReplacer::new(8);
        replacer.unpin(5);
        replacer.unpin(1);
        replacer.unpin(3);
        // Every entry still carries its insertion reference bit, so the
        // deterministic tie-break picks frame 1 despite 5 being at the hand.
        assert_eq!(replacer.victim(), Some(1));
    }

    #[test]
    fn test_remove_splices_ring() {
        let mut replacer = ClockReplacer::new(4);
        replacer.unpin(0);
        replacer.unpin(1);
        replacer.unpin(2);
        replacer.remove(1);
        assert_eq!(replacer.size(), 2);
        assert!(!replacer.contains(1));
        assert_eq!(replacer.victim(), Some(0));
        assert_eq!(replacer.victim(), Some(2));
        assert_eq!(replacer.victim(), None);
    }
}
