//! Position map -- the working representation of a read while indels are placed into it.
//!
//! Each base of the read is correlated to a reference coordinate, to an inserted segment,
//! or to a forced soft-clip. Resolved coordinates strictly increase along the read.
use definitions::{Cigar, GenomeSnippet, Op};
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapSlot {
    Resolved(i64),
    Inserted,
    ForcedClip,
}

impl MapSlot {
    pub fn coordinate(&self) -> Option<i64> {
        match *self {
            MapSlot::Resolved(pos) => Some(pos),
            _ => None,
        }
    }
}

/// The end of the read the construction proceeds from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionMap {
    slots: Vec<MapSlot>,
}

impl PositionMap {
    /// All bases aligned without gaps, the first one at `start`.
    pub fn anchored_left(start: i64, len: usize) -> Self {
        let slots = (0..len as i64).map(|i| MapSlot::Resolved(start + i)).collect();
        Self { slots }
    }
    /// All bases aligned without gaps, the last one at `end`.
    pub fn anchored_right(end: i64, len: usize) -> Self {
        let start = end - len as i64 + 1;
        Self::anchored_left(start, len)
    }
    pub fn anchored(anchor: Anchor, start: i64, end: i64, len: usize) -> Self {
        match anchor {
            Anchor::Left => Self::anchored_left(start, len),
            Anchor::Right => Self::anchored_right(end, len),
        }
    }
    pub fn len(&self) -> usize {
        self.slots.len()
    }
    pub fn slots(&self) -> &[MapSlot] {
        &self.slots
    }
    pub fn get(&self, idx: usize) -> Option<MapSlot> {
        self.slots.get(idx).copied()
    }
    pub fn find(&self, coordinate: i64) -> Option<usize> {
        self.slots
            .iter()
            .position(|&slot| slot == MapSlot::Resolved(coordinate))
    }
    pub fn mark(&mut self, range: Range<usize>, slot: MapSlot) {
        self.slots[range].iter_mut().for_each(|s| *s = slot);
    }
    /// Move every resolved slot in `range` by `delta`.
    pub fn shift(&mut self, range: Range<usize>, delta: i64) {
        for slot in self.slots[range].iter_mut() {
            if let MapSlot::Resolved(pos) = slot {
                *pos += delta;
            }
        }
    }
    pub fn first_resolved(&self) -> Option<i64> {
        self.slots.iter().find_map(MapSlot::coordinate)
    }
    pub fn num_resolved(&self) -> usize {
        self.slots.iter().filter(|s| s.coordinate().is_some()).count()
    }
    /// Place an insertion. `read` is the part of the read the map covers.
    /// Returns the slots holding the inserted bases, which may be fewer than the
    /// insertion when it runs off the end of the read.
    /// `None` if the site is not within the read or the read bases differ from the allele.
    pub fn insert(&mut self, anchor: Anchor, position: i64, bases: &[u8], read: &[u8]) -> Option<Range<usize>> {
        let len = bases.len();
        if len == 0 {
            return None;
        }
        let range = match anchor {
            Anchor::Left => {
                let idx = self.find(position)?;
                let end = (idx + 1 + len).min(self.len());
                let range = idx + 1..end;
                let allele = &bases[..range.len()];
                if range.is_empty() || !same_bases(&read[range.clone()], allele) {
                    return None;
                }
                let tail = end..self.len();
                self.shift(tail, -(len as i64));
                range
            }
            Anchor::Right => {
                let idx = self.find(position + 1)?;
                let start = idx.saturating_sub(len);
                let range = start..idx;
                let allele = &bases[len - range.len()..];
                if range.is_empty() || !same_bases(&read[range.clone()], allele) {
                    return None;
                }
                self.shift(0..start, len as i64);
                range
            }
        };
        self.mark(range.clone(), MapSlot::Inserted);
        Some(range)
    }
    /// Place a deletion of `[position+1, position+length]`.
    /// `None` if the read does not continue on both sides of it.
    pub fn delete(&mut self, anchor: Anchor, position: i64, length: usize) -> Option<()> {
        let length = length as i64;
        match anchor {
            Anchor::Left => {
                let idx = self.find(position)?;
                if idx + 1 >= self.len() {
                    return None;
                }
                let tail = idx + 1..self.len();
                self.shift(tail, length);
            }
            Anchor::Right => {
                let idx = self.find(position + length + 1)?;
                if idx == 0 {
                    return None;
                }
                self.shift(0..idx, -length);
            }
        }
        Some(())
    }
    /// Resolved coordinates strictly increase and lie within the reference window.
    pub fn is_consistent(&self, reference: &GenomeSnippet) -> bool {
        let mut coordinates = self.slots.iter().filter_map(MapSlot::coordinate);
        let mut prev = match coordinates.next() {
            Some(pos) if reference.contains(pos) => pos,
            Some(_) => return false,
            None => return true,
        };
        for pos in coordinates {
            if pos <= prev || !reference.contains(pos) {
                return false;
            }
            prev = pos;
        }
        true
    }
    pub fn to_cigar(&self) -> Cigar {
        let mut ops = Vec::with_capacity(self.slots.len());
        let mut prev: Option<i64> = None;
        for slot in self.slots.iter() {
            match *slot {
                MapSlot::ForcedClip => ops.push(Op::SoftClip(1)),
                MapSlot::Inserted => ops.push(Op::Ins(1)),
                MapSlot::Resolved(pos) => {
                    if let Some(prev) = prev.filter(|&prev| prev + 1 < pos) {
                        ops.push(Op::Del((pos - prev - 1) as usize));
                    }
                    ops.push(Op::Match(1));
                    prev = Some(pos);
                }
            }
        }
        Cigar::new(ops)
    }
}

fn same_bases(xs: &[u8], ys: &[u8]) -> bool {
    xs.len() == ys.len() && xs.eq_ignore_ascii_case(ys)
}

#[cfg(test)]
mod test {
    use super::*;
    fn snippet() -> GenomeSnippet {
        GenomeSnippet::new("chr1", 1, vec![b'A'; 300])
    }
    #[test]
    fn left_deletion() {
        let mut map = PositionMap::anchored_left(100, 10);
        map.delete(Anchor::Left, 103, 2).unwrap();
        assert_eq!(map.get(3), Some(MapSlot::Resolved(103)));
        assert_eq!(map.get(4), Some(MapSlot::Resolved(106)));
        assert_eq!(map.to_cigar().to_string(), "4M2D6M");
        assert!(map.is_consistent(&snippet()));
    }
    #[test]
    fn right_deletion() {
        let mut map = PositionMap::anchored_right(111, 10);
        map.delete(Anchor::Right, 103, 2).unwrap();
        assert_eq!(map.first_resolved(), Some(100));
        assert_eq!(map.get(9), Some(MapSlot::Resolved(111)));
        assert_eq!(map.to_cigar().to_string(), "4M2D6M");
    }
    #[test]
    fn deletion_off_the_read() {
        let mut map = PositionMap::anchored_left(100, 10);
        assert!(map.delete(Anchor::Left, 109, 2).is_none());
        assert!(map.delete(Anchor::Left, 120, 2).is_none());
        let mut map = PositionMap::anchored_right(109, 10);
        assert!(map.delete(Anchor::Right, 97, 2).is_none());
    }
    #[test]
    fn left_insertion() {
        let read = b"CTCAGACGGA";
        let mut map = PositionMap::anchored_left(100, read.len());
        let range = map.insert(Anchor::Left, 103, b"GAC", read).unwrap();
        assert_eq!(range, 4..7);
        assert_eq!(map.get(7), Some(MapSlot::Resolved(104)));
        assert_eq!(map.to_cigar().to_string(), "4M3I3M");
        let mut map = PositionMap::anchored_left(100, read.len());
        assert!(map.insert(Anchor::Left, 103, b"TTT", read).is_none());
    }
    #[test]
    fn right_insertion() {
        let read = b"CTCAGACGGA";
        let mut map = PositionMap::anchored_right(106, read.len());
        let range = map.insert(Anchor::Right, 103, b"GAC", read).unwrap();
        assert_eq!(range, 4..7);
        assert_eq!(map.first_resolved(), Some(100));
        assert_eq!(map.to_cigar().to_string(), "4M3I3M");
    }
    #[test]
    fn partial_insertion() {
        // The read ends two bases into a four base insertion.
        let read = b"CTCAGA";
        let mut map = PositionMap::anchored_left(100, read.len());
        let range = map.insert(Anchor::Left, 103, b"GACT", read).unwrap();
        assert_eq!(range, 4..6);
        assert_eq!(map.to_cigar().to_string(), "4M2I");
        // The read starts two bases before the end of the insertion.
        let read = b"CTGGA";
        let mut map = PositionMap::anchored_right(106, read.len());
        let range = map.insert(Anchor::Right, 103, b"GACT", read).unwrap();
        assert_eq!(range, 0..2);
        assert_eq!(map.to_cigar().to_string(), "2I3M");
    }
    #[test]
    fn consistency() {
        let mut map = PositionMap::anchored_left(100, 10);
        map.shift(5..10, -3);
        assert!(!map.is_consistent(&snippet()));
        let map = PositionMap::anchored_left(295, 10);
        assert!(!map.is_consistent(&snippet()));
        let mut map = PositionMap::anchored_left(100, 10);
        map.mark(0..2, MapSlot::ForcedClip);
        map.mark(4..5, MapSlot::Inserted);
        assert!(map.is_consistent(&snippet()));
        assert_eq!(map.to_cigar().to_string(), "2S2M1I1D5M");
        assert_eq!(map.num_resolved(), 7);
    }
}
