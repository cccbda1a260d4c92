use std::cmp::Ordering;
use std::collections::VecDeque;

use crate::buffer::FrameId;
use crate::buffer::Replacer;
use crate::error::Error;
use crate::error::Result;

/// An eviction candidate. The ordering puts the best victim first:
/// largest backward k-distance, ties broken by the oldest retained
/// access timestamp.
#[derive(Debug, Eq, PartialEq)]
struct KDistance {
    frame_id: FrameId,
    distance: usize,
    earliest: usize,
}

impl PartialOrd for KDistance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KDistance {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.distance.cmp(&other.distance).reverse() {
            Ordering::Equal => self.earliest.cmp(&other.earliest),
            other => other,
        }
    }
}

struct LruKNode {
    k: usize,
    /// history of the last seen k access timestamps of the frame,
    /// least recent in front.
    history: VecDeque<usize>,
    evictable: bool,
    /// set once the frame has recorded at least one access and cleared
    /// when the node is wiped by eviction or removal.
    present: bool,
}

impl LruKNode {
    fn new(k: usize) -> LruKNode {
        assert!(k > 0, "replacer k should be larger than zero");
        LruKNode { k, history: VecDeque::with_capacity(k), evictable: false, present: false }
    }

    fn record_access(&mut self, timestamp: usize) {
        if self.history.len() == self.k {
            self.history.pop_front();
        }
        self.history.push_back(timestamp);
        self.present = true;
    }

    fn k_distance(&self, frame_id: FrameId, now: usize) -> KDistance {
        // the front is the oldest retained access: the k-th most recent
        // one once the history is full, the very first access before.
        let earliest = self.history.front().copied().unwrap_or(0);
        if self.history.len() < self.k {
            return KDistance { frame_id, distance: usize::MAX, earliest };
        }
        KDistance { frame_id, distance: now - earliest, earliest }
    }

    fn wipe(&mut self) {
        self.history.clear();
        self.evictable = false;
        self.present = false;
    }
}

/// LruKReplacer implements the LRU-k replacement policy.
///
/// The LRU-k algorithm evicts the frame whose backward k-distance is the
/// maximum over all evictable frames. Backward k-distance is computed as
/// the difference between the current timestamp and the timestamp of the
/// k-th previous access.
///
/// A frame with fewer than k recorded accesses is given +inf as its
/// backward k-distance. When multiple frames have +inf backward
/// k-distance, the frame with the earliest overall access timestamp is
/// evicted first.
pub struct LruKReplacer {
    /// one node per frame slot, preallocated; the index is the frame id.
    nodes: Vec<LruKNode>,
    current_timestamp: usize,
    current_size: usize,
}

impl LruKReplacer {
    pub fn new(num_frames: usize, k: usize) -> LruKReplacer {
        let nodes = (0..num_frames).map(|_| LruKNode::new(k)).collect();
        LruKReplacer { nodes, current_timestamp: 0, current_size: 0 }
    }

    fn node_mut(&mut self, frame_id: FrameId) -> Result<&mut LruKNode> {
        self.nodes.get_mut(frame_id).ok_or(Error::InvalidFrame(frame_id))
    }
}

impl Replacer for LruKReplacer {
    fn record_access(&mut self, frame_id: FrameId) -> Result<()> {
        let timestamp = self.current_timestamp;
        let node = self.node_mut(frame_id)?;
        node.record_access(timestamp);
        self.current_timestamp += 1;
        Ok(())
    }

    fn evict(&mut self) -> Option<FrameId> {
        let now = self.current_timestamp;
        let victim = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.evictable)
            .map(|(frame_id, node)| node.k_distance(frame_id, now))
            .min()?;
        self.nodes[victim.frame_id].wipe();
        self.current_size -= 1;
        Some(victim.frame_id)
    }

    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) -> Result<()> {
        let node = self.node_mut(frame_id)?;
        if node.evictable == evictable {
            return Ok(());
        }
        node.evictable = evictable;
        if evictable {
            self.current_size += 1;
        } else {
            self.current_size -= 1;
        }
        Ok(())
    }

    fn remove(&mut self, frame_id: FrameId) -> Result<()> {
        let node = match self.nodes.get_mut(frame_id) {
            Some(node) => node,
            None => return Ok(()),
        };
        if !node.present {
            return Ok(());
        }
        if !node.evictable {
            return Err(Error::NotEvictable(frame_id));
        }
        node.wipe();
        self.current_size -= 1;
        Ok(())
    }

    fn size(&self) -> usize {
        self.current_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kdistance_ord() -> Result<()> {
        let mut arr = [
            KDistance { frame_id: 1, distance: 5, earliest: 10 },
            KDistance { frame_id: 2, distance: 5, earliest: 5 },
            KDistance { frame_id: 3, distance: 3, earliest: 7 },
            KDistance { frame_id: 4, distance: 8, earliest: 3 },
            KDistance { frame_id: 5, distance: usize::MAX, earliest: 5 },
            KDistance { frame_id: 6, distance: usize::MAX, earliest: 3 },
        ];

        // sort by the victim order the Ord impl encodes.
        arr.sort();

        let ids = arr.iter().map(|kd| kd.frame_id).collect::<Vec<_>>();
        assert_eq!(vec![6, 5, 4, 2, 1, 3], ids);

        Ok(())
    }

    #[test]
    fn test_lruk_node() -> Result<()> {
        // node with k = 1
        let mut node = LruKNode::new(1);

        node.record_access(1);
        let dist = node.k_distance(0, 5);
        assert_eq!(4, dist.distance);
        assert_eq!(1, dist.earliest);

        // node with k = 2
        let mut node = LruKNode::new(2);

        node.record_access(1);
        let dist = node.k_distance(0, 2);
        assert_eq!(usize::MAX, dist.distance);
        assert_eq!(1, dist.earliest);

        node.record_access(2);
        let dist = node.k_distance(0, 3);
        assert_eq!(2, dist.distance);
        assert_eq!(1, dist.earliest);

        node.record_access(5);
        let dist = node.k_distance(0, 6);
        assert_eq!(4, dist.distance);
        assert_eq!(2, dist.earliest);

        Ok(())
    }

    #[test]
    fn test_lruk_replacer() -> Result<()> {
        let mut lru_replacer = LruKReplacer::new(7, 2);

        // Scenario: add six frames to the replacer. We have [1,2,3,4,5].
        // Frame 6 is non-evictable.
        lru_replacer.record_access(1)?;
        lru_replacer.record_access(2)?;
        lru_replacer.record_access(3)?;
        lru_replacer.record_access(4)?;
        lru_replacer.record_access(5)?;
        lru_replacer.record_access(6)?;
        lru_replacer.set_evictable(1, true)?;
        lru_replacer.set_evictable(2, true)?;
        lru_replacer.set_evictable(3, true)?;
        lru_replacer.set_evictable(4, true)?;
        lru_replacer.set_evictable(5, true)?;
        lru_replacer.set_evictable(6, false)?;
        assert_eq!(5, lru_replacer.size());

        // Scenario: insert access history for frame 1. Now frame 1 has two
        // access histories. All other frames have max backward k-distance.
        // The order of eviction is [2,3,4,5,1].
        lru_replacer.record_access(1)?;

        // Scenario: evict three frames from the replacer. Frames with max
        // k-distance are popped first, ordered by first access.
        assert_eq!(Some(2), lru_replacer.evict());
        assert_eq!(Some(3), lru_replacer.evict());
        assert_eq!(Some(4), lru_replacer.evict());
        assert_eq!(2, lru_replacer.size());

        // Scenario: now the replacer has frames [5,1]. Insert new frames
        // 3, 4, and update the access history for 5. We should end with
        // [3,1,5,4].
        lru_replacer.record_access(3)?;
        lru_replacer.record_access(4)?;
        lru_replacer.record_access(5)?;
        lru_replacer.record_access(4)?;
        lru_replacer.set_evictable(3, true)?;
        lru_replacer.set_evictable(4, true)?;
        assert_eq!(4, lru_replacer.size());

        // Scenario: continue looking for victims. We expect 3 to be
        // evicted next, it has an infinite k-distance and the oldest
        // first access among the infinite candidates.
        assert_eq!(Some(3), lru_replacer.evict());
        assert_eq!(3, lru_replacer.size());

        // Set 6 to be evictable. 6 should be evicted next: it has never
        // been accessed a second time, so its infinite k-distance
        // dominates the finite distances of 5 and 1.
        lru_replacer.set_evictable(6, true)?;
        assert_eq!(4, lru_replacer.size());
        assert_eq!(Some(6), lru_replacer.evict());
        assert_eq!(3, lru_replacer.size());

        // Now we have [1,5,4]. Continue looking for victims.
        lru_replacer.set_evictable(1, false)?;
        assert_eq!(2, lru_replacer.size());
        assert_eq!(Some(5), lru_replacer.evict());
        assert_eq!(1, lru_replacer.size());

        // Update access history for 1. Now we have [4,1]. Next victim is 4.
        lru_replacer.record_access(1)?;
        lru_replacer.record_access(1)?;
        lru_replacer.set_evictable(1, true)?;
        assert_eq!(2, lru_replacer.size());
        assert_eq!(Some(4), lru_replacer.evict());

        assert_eq!(1, lru_replacer.size());
        assert_eq!(Some(1), lru_replacer.evict());
        assert_eq!(0, lru_replacer.size());

        // these operations should not modify the size.
        assert_eq!(None, lru_replacer.evict());
        assert_eq!(0, lru_replacer.size());
        lru_replacer.remove(1)?;
        assert_eq!(0, lru_replacer.size());

        Ok(())
    }

    #[test]
    fn test_infinite_distance_order() -> Result<()> {
        let mut replacer = LruKReplacer::new(5, 2);

        // frames 0 and 1 get two accesses each, 2..4 only one.
        replacer.record_access(0)?;
        replacer.record_access(0)?;
        replacer.record_access(1)?;
        replacer.record_access(1)?;
        replacer.record_access(2)?;
        replacer.record_access(3)?;
        replacer.record_access(4)?;
        for frame_id in 0..5 {
            replacer.set_evictable(frame_id, true)?;
        }

        // frames 2,3,4 share an infinite k-distance and leave in first
        // access order, before the finite-distance frames 0 and 1.
        assert_eq!(Some(2), replacer.evict());
        assert_eq!(Some(3), replacer.evict());
        assert_eq!(Some(4), replacer.evict());
        assert_eq!(Some(0), replacer.evict());
        assert_eq!(Some(1), replacer.evict());
        assert_eq!(None, replacer.evict());

        Ok(())
    }

    #[test]
    fn test_single_frame() -> Result<()> {
        let mut replacer = LruKReplacer::new(1, 1);

        replacer.record_access(0)?;
        replacer.set_evictable(0, true)?;
        assert_eq!(Some(0), replacer.evict());
        assert_eq!(None, replacer.evict());

        Ok(())
    }

    #[test]
    fn test_out_of_range_frames() -> Result<()> {
        let mut replacer = LruKReplacer::new(7, 2);

        assert_eq!(Err(Error::InvalidFrame(7)), replacer.record_access(7));
        assert_eq!(Err(Error::InvalidFrame(9)), replacer.set_evictable(9, true));

        // removing an out-of-range frame is a silent no-op.
        replacer.remove(9)?;
        assert_eq!(0, replacer.size());

        Ok(())
    }

    #[test]
    fn test_remove_non_evictable() -> Result<()> {
        let mut replacer = LruKReplacer::new(2, 2);

        // a tracked frame that is not evictable cannot be removed.
        replacer.record_access(0)?;
        assert_eq!(Err(Error::NotEvictable(0)), replacer.remove(0));

        // once evictable it can.
        replacer.set_evictable(0, true)?;
        replacer.remove(0)?;
        assert_eq!(0, replacer.size());

        // a frame with no recorded history is a no-op.
        replacer.remove(1)?;
        assert_eq!(0, replacer.size());

        Ok(())
    }

    #[test]
    fn test_set_evictable_idempotent() -> Result<()> {
        let mut replacer = LruKReplacer::new(3, 2);

        replacer.record_access(0)?;
        replacer.set_evictable(0, true)?;
        replacer.set_evictable(0, true)?;
        assert_eq!(1, replacer.size());

        replacer.set_evictable(0, false)?;
        replacer.set_evictable(0, false)?;
        assert_eq!(0, replacer.size());

        Ok(())
    }
}
