/*
    FluxFox
    https://github.com/dbalsom/fluxfox

    Copyright 2024 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    src/track.rs

    The in-memory track model. A Track is one revolution of decoded MFM bytes with a parallel
    clock mask. A set clock bit marks a byte that was written with a missing clock transition,
    which on a WD1793 disk only happens for the 0xA1 sync bytes preceding address and data marks.

    Tracks are circular: every offset based accessor wraps at the track length.
*/
use crate::chs::DiskCh;
use crate::util::crc_ibm_3740_wrapped;
use crate::DiskImageError;
use bit_vec::BitVec;

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Track {
    data: Vec<u8>,
    clock: BitVec,
}

impl Track {
    /// Create a track of `len` zero bytes with no clock bits set.
    pub fn new(len: usize) -> Self {
        Self {
            data: vec![0; len],
            clock: BitVec::from_elem(len, false),
        }
    }

    /// Create a track from raw bytes and a clock mask of the same length.
    pub fn from_parts(data: Vec<u8>, clock: BitVec) -> Result<Self, DiskImageError> {
        if data.len() != clock.len() {
            log::error!(
                "Track::from_parts(): data length {} does not match clock length {}",
                data.len(),
                clock.len()
            );
            return Err(DiskImageError::ParameterError);
        }
        Ok(Self { data, clock })
    }

    /// Create a track from raw bytes and a clock mask packed eight bytes per mask byte,
    /// least significant bit first, as stored in UDI images.
    pub fn from_packed_clock(data: Vec<u8>, packed: &[u8]) -> Self {
        let clock = (0..data.len())
            .map(|i| packed.get(i / 8).map_or(false, |b| b & (1 << (i % 8)) != 0))
            .collect::<BitVec>();
        Self { data, clock }
    }

    /// Pack the clock mask eight bytes per mask byte, least significant bit first.
    pub fn packed_clock(&self) -> Vec<u8> {
        let mut packed = vec![0u8; self.data.len().div_ceil(8)];
        for (i, bit) in self.clock.iter().enumerate() {
            if bit {
                packed[i / 8] |= 1 << (i % 8);
            }
        }
        packed
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn clock(&self) -> &BitVec {
        &self.clock
    }

    pub fn clock_at(&self, offset: usize) -> bool {
        if self.is_empty() {
            return false;
        }
        self.clock.get(offset % self.len()).unwrap_or(false)
    }

    pub fn set_clock(&mut self, offset: usize, state: bool) {
        if !self.is_empty() {
            let len = self.len();
            self.clock.set(offset % len, state);
        }
    }

    /// Returns true if the byte at `offset` is an 0xA1 sync byte with its clock bit set.
    pub fn is_sync(&self, offset: usize) -> bool {
        self.byte_at(offset) == crate::track_schema::A1_SYNC && self.clock_at(offset)
    }

    pub fn byte_at(&self, offset: usize) -> u8 {
        if self.is_empty() {
            return 0;
        }
        self.data[offset % self.len()]
    }

    pub fn set_byte(&mut self, offset: usize, byte: u8) {
        if !self.is_empty() {
            let len = self.len();
            self.data[offset % len] = byte;
        }
    }

    /// Copy `len` bytes starting at `offset`, wrapping at the end of the track.
    pub fn read_wrapped(&self, offset: usize, len: usize) -> Vec<u8> {
        (0..len).map(|i| self.byte_at(offset + i)).collect()
    }

    /// Overwrite bytes starting at `offset`, wrapping at the end of the track. Clock bits are
    /// left untouched.
    pub fn write_wrapped(&mut self, offset: usize, bytes: &[u8]) {
        for (i, byte) in bytes.iter().enumerate() {
            self.set_byte(offset + i, *byte);
        }
    }

    /// Calculate the WD179x CRC of `len` bytes starting at `offset`, wrapping at the end of the track.
    pub fn crc(&self, offset: usize, len: usize) -> u16 {
        crc_ibm_3740_wrapped(&self.data, offset, len)
    }

    /// Rotate the track so that the byte at `offset` becomes the first byte.
    pub fn rotate_left(&mut self, offset: usize) {
        if self.is_empty() {
            return;
        }
        let offset = offset % self.len();
        self.data.rotate_left(offset);
        let bits = self.clock.iter().collect::<Vec<bool>>();
        self.clock = bits[offset..].iter().chain(bits[..offset].iter()).copied().collect();
    }
}

/// All tracks of one disk, indexed by cylinder and head.
/// Slots may be empty: containers such as TD0 only describe the tracks that were imaged.
#[derive(Clone, Debug, Default)]
pub struct TrackStore {
    cylinders: usize,
    heads: usize,
    tracks: Vec<Option<Track>>,
}

impl TrackStore {
    pub fn new(cylinders: usize, heads: usize) -> Self {
        Self {
            cylinders,
            heads,
            tracks: vec![None; cylinders * heads],
        }
    }

    pub fn cylinders(&self) -> usize {
        self.cylinders
    }

    pub fn heads(&self) -> usize {
        self.heads
    }

    pub fn clear(&mut self) {
        *self = TrackStore::default();
    }

    fn slot(&self, ch: DiskCh) -> Option<usize> {
        if (ch.c() as usize) < self.cylinders && (ch.h() as usize) < self.heads {
            Some(ch.to_index(self.heads))
        }
        else {
            None
        }
    }

    pub fn get(&self, ch: DiskCh) -> Option<&Track> {
        self.slot(ch).and_then(|i| self.tracks[i].as_ref())
    }

    pub fn get_mut(&mut self, ch: DiskCh) -> Option<&mut Track> {
        self.slot(ch).and_then(|i| self.tracks[i].as_mut())
    }

    /// Place a track at `ch`, replacing any previous track there.
    pub fn insert(&mut self, ch: DiskCh, track: Track) -> Result<(), DiskImageError> {
        match self.slot(ch) {
            Some(i) => {
                self.tracks[i] = Some(track);
                Ok(())
            }
            None => {
                log::error!("TrackStore::insert(): {} is outside the disk geometry", ch);
                Err(DiskImageError::ParameterError)
            }
        }
    }

    /// The number of populated track slots.
    pub fn track_ct(&self) -> usize {
        self.tracks.iter().filter(|t| t.is_some()).count()
    }

    /// Iterate over populated tracks in cylinder-major order.
    pub fn iter(&self) -> impl Iterator<Item = (DiskCh, &Track)> {
        let heads = self.heads;
        self.tracks
            .iter()
            .enumerate()
            .filter_map(move |(i, t)| t.as_ref().map(|t| (DiskCh::from_index(i, heads), t)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_clock() {
        let mut track = Track::new(20);
        track.set_clock(0, true);
        track.set_clock(9, true);
        track.set_clock(19, true);
        let packed = track.packed_clock();
        assert_eq!(packed, vec![0x01, 0x02, 0x08]);

        let restored = Track::from_packed_clock(track.data().to_vec(), &packed);
        assert_eq!(restored, track);
    }

    #[test]
    fn test_wrapping_access() {
        let mut track = Track::new(8);
        track.write_wrapped(6, &[1, 2, 3, 4]);
        assert_eq!(track.data(), &[3, 4, 0, 0, 0, 0, 1, 2]);
        assert_eq!(track.read_wrapped(14, 4), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_rotate() {
        let mut track = Track::from_parts(vec![0, 1, 2, 3], [true, false, false, false].iter().copied().collect())
            .expect("lengths match");
        track.rotate_left(3);
        assert_eq!(track.data(), &[3, 0, 1, 2]);
        assert!(track.clock_at(1));
        assert!(!track.clock_at(0));
    }

    #[test]
    fn test_store_bounds() {
        let mut store = TrackStore::new(2, 2);
        assert!(store.insert(DiskCh::new(1, 1), Track::new(10)).is_ok());
        assert_eq!(
            store.insert(DiskCh::new(2, 0), Track::new(10)),
            Err(DiskImageError::ParameterError)
        );
        assert!(store.get(DiskCh::new(0, 0)).is_none());
        assert!(store.get(DiskCh::new(1, 1)).is_some());
        assert!(store.get(DiskCh::new(0, 5)).is_none());
        assert_eq!(store.track_ct(), 1);
        let chs = store.iter().map(|(ch, _)| ch).collect::<Vec<_>>();
        assert_eq!(chs, vec![DiskCh::new(1, 1)]);
    }
}
