//! Incremental envelope over a fixed set of bounding boxes.

use tree_packing_core::AABB2D;

/// Candidate envelope produced by [`EnvelopeTracker::propose`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeUpdate {
    /// Envelope with the replacement applied.
    pub envelope: AABB2D,
    /// True if computing it required a full rescan.
    pub rescanned: bool,
}

/// Maintains the union of `n` boxes under single-box replacement.
///
/// A replacement is O(1) unless the replaced box defined one of the envelope
/// bounds and the new box pulls back from it, in which case the bounds are
/// rescanned in O(n).
#[derive(Debug, Clone)]
pub struct EnvelopeTracker {
    boxes: Vec<AABB2D>,
    envelope: AABB2D,
}

impl EnvelopeTracker {
    /// Builds a tracker over `boxes`.
    pub fn new(boxes: Vec<AABB2D>) -> Self {
        let envelope = union_all(&boxes);
        Self { boxes, envelope }
    }

    /// Current envelope.
    #[inline]
    pub fn envelope(&self) -> &AABB2D {
        &self.envelope
    }

    /// Box at index `i`.
    #[inline]
    pub fn get(&self, i: usize) -> &AABB2D {
        &self.boxes[i]
    }

    /// Number of tracked boxes.
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// Returns true if no boxes are tracked.
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Envelope that would result from replacing box `i` with `new_box`.
    /// Does not modify the tracker.
    pub fn propose(&self, i: usize, new_box: &AABB2D) -> EnvelopeUpdate {
        let old = &self.boxes[i];
        let env = &self.envelope;

        let relaxes = (old.min_x == env.min_x && new_box.min_x > old.min_x)
            || (old.min_y == env.min_y && new_box.min_y > old.min_y)
            || (old.max_x == env.max_x && new_box.max_x < old.max_x)
            || (old.max_y == env.max_y && new_box.max_y < old.max_y);

        if !relaxes {
            return EnvelopeUpdate {
                envelope: env.union(new_box),
                rescanned: false,
            };
        }

        let envelope = self
            .boxes
            .iter()
            .enumerate()
            .fold(AABB2D::empty(), |acc, (j, b)| {
                if j == i {
                    acc.union(new_box)
                } else {
                    acc.union(b)
                }
            });
        EnvelopeUpdate {
            envelope,
            rescanned: true,
        }
    }

    /// Applies a replacement previously evaluated with [`EnvelopeTracker::propose`].
    pub fn commit(&mut self, i: usize, new_box: AABB2D, update: EnvelopeUpdate) {
        self.boxes[i] = new_box;
        self.envelope = update.envelope;
    }

    /// Replaces box `i` and returns the update that was applied.
    pub fn replace(&mut self, i: usize, new_box: AABB2D) -> EnvelopeUpdate {
        let update = self.propose(i, &new_box);
        self.commit(i, new_box, update);
        update
    }

    /// Envelope computed from scratch.
    pub fn recompute(&self) -> AABB2D {
        union_all(&self.boxes)
    }
}

fn union_all(boxes: &[AABB2D]) -> AABB2D {
    boxes.iter().fold(AABB2D::empty(), |acc, b| acc.union(b))
}
