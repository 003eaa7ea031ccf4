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

    src/track_schema/builder.rs

    Track synthesis. Containers that only describe sectors (TRD, SCL, FDI, FDD, TD0) are turned
    into physical tracks here, either with the fixed TR-DOS layout or with gaps balanced to fit
    an arbitrary sector list into one revolution.
*/
use crate::chs::DiskCh;
use crate::track::Track;
use crate::track_schema::{SectorId, SectorMark, A1_SYNC, DAM, DDAM, GAP_BYTE, IDAM, SYNC_BYTE};
use crate::{DiskImageError, DEFAULT_TRACK_SIZE, TRDOS_SECTORS_PER_TRACK, TRDOS_SECTOR_SIZE};
use bit_vec::BitVec;

/// Sequential writer for track bytes and their clock mask.
#[derive(Default)]
pub struct TrackBuilder {
    data: Vec<u8>,
    clock: BitVec,
}

impl TrackBuilder {
    pub fn new() -> Self {
        Self {
            data: Vec::with_capacity(DEFAULT_TRACK_SIZE),
            clock: BitVec::with_capacity(DEFAULT_TRACK_SIZE),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn push(&mut self, byte: u8, clock: bool) {
        self.data.push(byte);
        self.clock.push(clock);
    }

    pub fn bytes(&mut self, bytes: &[u8]) -> &mut Self {
        for byte in bytes {
            self.push(*byte, false);
        }
        self
    }

    pub fn gap(&mut self, len: usize) -> &mut Self {
        for _ in 0..len {
            self.push(GAP_BYTE, false);
        }
        self
    }

    pub fn sync(&mut self, len: usize) -> &mut Self {
        for _ in 0..len {
            self.push(SYNC_BYTE, false);
        }
        self
    }

    /// Write `pulses` clocked 0xA1 sync bytes followed by `marker`.
    /// Returns the offset of the first sync byte, where the CRC of the field begins.
    pub fn mark(&mut self, pulses: usize, marker: u8) -> usize {
        let start = self.data.len();
        for _ in 0..pulses {
            self.push(A1_SYNC, true);
        }
        self.push(marker, false);
        start
    }

    /// Append the big-endian CRC of every byte written since `start`.
    pub fn crc(&mut self, start: usize) -> &mut Self {
        self.crc_with(start, true)
    }

    /// Append the CRC of every byte written since `start`. When `valid` is false both CRC bytes
    /// are inverted so that the field reads back with a CRC error.
    pub fn crc_with(&mut self, start: usize, valid: bool) -> &mut Self {
        let mut crc = crate::util::crc_ibm_3740(&self.data[start..], None);
        if !valid {
            crc ^= 0xFFFF;
        }
        let bytes = crc.to_be_bytes();
        self.bytes(&bytes)
    }

    /// Pad the track with gap bytes to `len` and return it. Anything written past `len` is
    /// truncated.
    pub fn finish(mut self, len: usize) -> Track {
        if self.data.len() > len {
            log::warn!(
                "TrackBuilder::finish(): {} bytes written past index, truncating to {}",
                self.data.len() - len,
                len
            );
            self.data.truncate(len);
            self.clock.truncate(len);
        }
        while self.data.len() < len {
            self.push(GAP_BYTE, false);
        }
        // Lengths are kept equal by push()
        Track::from_parts(self.data, self.clock).unwrap_or_default()
    }
}

/// One sector to be placed on a synthesized track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectorDescriptor {
    pub id: SectorId,
    /// The payload. None produces an ID field with no data field.
    pub data: Option<Vec<u8>>,
    pub deleted: bool,
    /// When false, the data CRC is written inverted.
    pub crc_valid: bool,
}

impl SectorDescriptor {
    pub fn new(id: SectorId, data: Option<Vec<u8>>) -> Self {
        Self {
            id,
            data,
            deleted: false,
            crc_valid: true,
        }
    }

    pub fn with_deleted(mut self, deleted: bool) -> Self {
        self.deleted = deleted;
        self
    }

    pub fn with_crc_valid(mut self, crc_valid: bool) -> Self {
        self.crc_valid = crc_valid;
        self
    }
}

/// Gap and sync lengths used for every sector of a synthesized track.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GapLayout {
    /// Gap bytes before each ID sync.
    pub gap1: usize,
    /// Zero bytes before each sync run.
    pub sync: usize,
    /// Number of 0xA1 sync bytes per mark.
    pub pulses: usize,
    /// Gap bytes between the ID field and the data sync.
    pub gap2: usize,
    /// Gap bytes after the data field.
    pub gap3: usize,
}

impl GapLayout {
    /// The canonical TR-DOS layout.
    pub const TRDOS: GapLayout = GapLayout {
        gap1: 10,
        sync: 12,
        pulses: 3,
        gap2: 22,
        gap3: 60,
    };

    const MINIMUM: GapLayout = GapLayout {
        gap1: 1,
        sync: 1,
        pulses: 1,
        gap2: 1,
        gap3: 1,
    };

    /// The number of bytes this layout needs for `sectors`.
    pub fn track_len(&self, sectors: &[SectorDescriptor]) -> usize {
        sectors
            .iter()
            .map(|sector| {
                let id_field = self.gap1 + self.sync + self.pulses + 1 + 6 + self.gap2 + self.sync + self.gap3;
                let data_field = sector.data.as_ref().map_or(0, |data| self.pulses + 1 + data.len() + 2);
                id_field + data_field
            })
            .sum()
    }

    fn is_full(&self) -> bool {
        self.sync >= Self::TRDOS.sync
            && self.gap1 >= Self::TRDOS.gap1
            && self.gap2 >= Self::TRDOS.gap2
            && self.gap3 >= Self::TRDOS.gap3
    }

    /// Distribute the space left over by `sectors` among the gaps, growing each toward its
    /// TR-DOS length in turn. Returns None if the sectors do not fit even with minimal gaps.
    pub fn balance(sectors: &[SectorDescriptor], track_len: usize) -> Option<GapLayout> {
        let mut layout = GapLayout::MINIMUM;
        let required = layout.track_len(sectors);
        if required > track_len {
            return None;
        }

        let count = sectors.len() as isize;
        if count == 0 {
            return Some(GapLayout::TRDOS);
        }
        let mut free = track_len as isize - required as isize - 4;

        while free > 0 {
            if free >= count * 2 && layout.sync < Self::TRDOS.sync {
                layout.sync += 1;
                free -= count * 2;
            }
            if free < count {
                break;
            }
            if layout.gap1 < Self::TRDOS.gap1 {
                layout.gap1 += 1;
                free -= count;
            }
            if free < count {
                break;
            }
            if layout.gap2 < Self::TRDOS.gap2 {
                layout.gap2 += 1;
                free -= count;
            }
            if free < count {
                break;
            }
            if layout.gap3 < Self::TRDOS.gap3 {
                layout.gap3 += 1;
                free -= count;
            }
            if free < count {
                break;
            }
            if layout.is_full() {
                break;
            }
        }

        // Up to two more sync pulses per mark, if they still fit in the revolution.
        for threshold in [count * 2 + 10, count * 2 + 9] {
            if free > threshold {
                let candidate = GapLayout {
                    pulses: layout.pulses + 1,
                    ..layout
                };
                if candidate.track_len(sectors) <= track_len {
                    layout = candidate;
                    free -= count;
                }
            }
        }

        log::trace!(
            "GapLayout::balance(): {} sectors, layout {:?} uses {} of {} bytes",
            sectors.len(),
            layout,
            layout.track_len(sectors),
            track_len
        );
        Some(layout)
    }
}

fn write_sector(builder: &mut TrackBuilder, layout: &GapLayout, sector: &SectorDescriptor) {
    builder.gap(layout.gap1).sync(layout.sync);
    let mark = builder.mark(layout.pulses, IDAM);
    builder.bytes(&sector.id.to_bytes()).crc(mark);
    builder.gap(layout.gap2).sync(layout.sync);

    if let Some(data) = &sector.data {
        let marker = if sector.deleted { DDAM } else { DAM };
        let mark = builder.mark(layout.pulses, marker);
        builder.bytes(data).crc_with(mark, sector.crc_valid);
    }
    builder.gap(layout.gap3);
}

/// Build a TR-DOS track: sixteen 256 byte sectors numbered 1..=16 with the canonical gaps.
/// `payload` supplies the sector data in sector order; missing bytes are written as zero.
/// The head byte of every ID field is 0, as written by the TR-DOS format routine.
pub fn format_trdos_track(cylinder: u8, payload: Option<&[u8]>) -> Track {
    let mut builder = TrackBuilder::new();
    let layout = GapLayout::TRDOS;

    for s in 0..TRDOS_SECTORS_PER_TRACK {
        let mut data = vec![0u8; TRDOS_SECTOR_SIZE];
        if let Some(payload) = payload {
            let start = s * TRDOS_SECTOR_SIZE;
            if start < payload.len() {
                let end = std::cmp::min(start + TRDOS_SECTOR_SIZE, payload.len());
                data[..end - start].copy_from_slice(&payload[start..end]);
            }
        }
        let sector = SectorDescriptor::new(SectorId::new(cylinder, 0, s as u8 + 1, 1), Some(data));
        write_sector(&mut builder, &layout, &sector);
    }
    builder.finish(DEFAULT_TRACK_SIZE)
}

/// Build a track holding `sectors` in order, with gaps balanced to fill one revolution.
/// Fails with [`DiskImageError::ImpossibleFormat`] if the sectors cannot fit.
pub fn format_variable(ch: DiskCh, sectors: &[SectorDescriptor]) -> Result<Track, DiskImageError> {
    if sectors.is_empty() {
        return Ok(TrackBuilder::new().finish(DEFAULT_TRACK_SIZE));
    }

    let layout = match GapLayout::balance(sectors, DEFAULT_TRACK_SIZE) {
        Some(layout) => layout,
        None => {
            log::error!(
                "format_variable(): {} sectors do not fit on track {}",
                sectors.len(),
                ch
            );
            return Err(DiskImageError::ImpossibleFormat(ch));
        }
    };

    let mut builder = TrackBuilder::new();
    for sector in sectors {
        write_sector(&mut builder, &layout, sector);
    }
    Ok(builder.finish(DEFAULT_TRACK_SIZE))
}

/// Recalculate the data CRC of a located sector after its payload was modified in place.
pub fn apply_sector_crc(track: &mut Track, sector: &SectorMark) {
    let len = track.len();
    if len == 0 {
        return;
    }
    let field_len = (sector.end_offset + len - sector.sync_offset) % len;
    let crc = track.crc(sector.sync_offset, field_len);
    track.set_byte(sector.end_offset, (crc >> 8) as u8);
    track.set_byte(sector.end_offset + 1, crc as u8);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track_schema::{find_address_mark, find_sector, AddressMarkIter};

    fn sectors(count: usize, n: u8) -> Vec<SectorDescriptor> {
        (0..count)
            .map(|s| {
                let id = SectorId::new(3, 1, s as u8 + 1, n);
                SectorDescriptor::new(id, Some(vec![s as u8; id.size()]))
            })
            .collect()
    }

    #[test]
    fn test_trdos_track() {
        let track = format_trdos_track(7, None);
        assert_eq!(track.len(), DEFAULT_TRACK_SIZE);
        for s in 1..=16 {
            let sector = find_sector(&track, s, 0).expect("sector");
            assert!(sector.is_ok());
            assert_eq!(sector.address.id, SectorId::new(7, 0, s, 1));
            assert_eq!(sector.length, 256);
        }
    }

    #[test]
    fn test_id_crc_bytes() {
        let track = format_trdos_track(0, None);
        let mark = find_address_mark(&track, 0).expect("mark");
        assert_eq!(mark.id_offset - mark.sync_offset, 4);
        let crc = crate::util::crc_ibm_3740(&track.data()[mark.sync_offset..mark.id_offset + 4], None);
        assert_eq!(track.data()[mark.id_offset + 4], (crc >> 8) as u8);
        assert_eq!(track.data()[mark.id_offset + 5], crc as u8);
    }

    #[test]
    fn test_balance_canonical() {
        assert_eq!(GapLayout::balance(&sectors(16, 1), DEFAULT_TRACK_SIZE), Some(GapLayout::TRDOS));
        assert_eq!(GapLayout::balance(&sectors(5, 3), DEFAULT_TRACK_SIZE), Some(GapLayout::TRDOS));
    }

    #[test]
    fn test_variable_matches_trdos_layout() {
        let list = (0..16)
            .map(|s| SectorDescriptor::new(SectorId::new(2, 0, s + 1, 1), Some(vec![0; 256])))
            .collect::<Vec<_>>();
        let track = format_variable(DiskCh::new(2, 0), &list).expect("format");
        assert_eq!(track, format_trdos_track(2, None));
    }

    #[test]
    fn test_balance_crowded() {
        let list = sectors(18, 1);
        let layout = GapLayout::balance(&list, DEFAULT_TRACK_SIZE).expect("fits");
        assert_eq!(layout.pulses, 1);
        assert_eq!(layout.gap3, 23);
        assert!(layout.track_len(&list) <= DEFAULT_TRACK_SIZE);

        let list = sectors(6, 3);
        assert_eq!(GapLayout::balance(&list, DEFAULT_TRACK_SIZE), Some(GapLayout::MINIMUM));
    }

    #[test]
    fn test_variable_round_trip() {
        for (count, n) in [(18, 1), (6, 3), (9, 2), (1, 0), (20, 1)] {
            let list = sectors(count, n);
            let track = format_variable(DiskCh::new(3, 1), &list).expect("format");
            assert_eq!(track.len(), DEFAULT_TRACK_SIZE);
            assert_eq!(AddressMarkIter::new(&track).count(), count);
            for descriptor in &list {
                let sector = find_sector(&track, descriptor.id.s, 0).expect("sector");
                assert!(sector.is_ok());
                assert_eq!(
                    track.read_wrapped(sector.data_offset, sector.length),
                    *descriptor.data.as_ref().expect("data")
                );
            }
        }
    }

    #[test]
    fn test_impossible_format() {
        let list = sectors(7, 3);
        assert_eq!(
            format_variable(DiskCh::new(1, 0), &list),
            Err(DiskImageError::ImpossibleFormat(DiskCh::new(1, 0)))
        );
    }

    #[test]
    fn test_flags() {
        let list = vec![
            SectorDescriptor::new(SectorId::new(0, 0, 1, 1), Some(vec![0xE5; 256])).with_crc_valid(false),
            SectorDescriptor::new(SectorId::new(0, 0, 2, 1), Some(vec![0xE5; 256])).with_deleted(true),
            SectorDescriptor::new(SectorId::new(0, 0, 3, 1), None),
        ];
        let track = format_variable(DiskCh::new(0, 0), &list).expect("format");

        let bad = find_sector(&track, 1, 0).expect("sector");
        assert!(bad.address.crc_ok);
        assert!(!bad.crc_ok);

        let deleted = find_sector(&track, 2, 0).expect("sector");
        assert!(deleted.is_deleted());
        assert!(deleted.is_ok());

        assert!(find_sector(&track, 3, 0).is_none());
        assert_eq!(AddressMarkIter::new(&track).count(), 3);
    }

    #[test]
    fn test_empty_track() {
        let track = format_variable(DiskCh::new(0, 0), &[]).expect("format");
        assert!(track.data().iter().all(|b| *b == GAP_BYTE));
        assert!(find_address_mark(&track, 0).is_none());
    }

    #[test]
    fn test_apply_sector_crc() {
        let mut track = format_trdos_track(0, None);
        let sector = find_sector(&track, 9, 0).expect("sector");
        track.write_wrapped(sector.data_offset, b"hello");
        assert!(!find_sector(&track, 9, 0).expect("sector").crc_ok);

        apply_sector_crc(&mut track, &sector);
        assert!(find_sector(&track, 9, 0).expect("sector").crc_ok);

        // Also across the index
        let mut track = format_trdos_track(0, None);
        let sector = find_sector(&track, 4, 0).expect("sector");
        track.rotate_left(sector.data_offset + 10);
        let sector = find_sector(&track, 4, 0).expect("sector");
        track.write_wrapped(sector.data_offset, &[0xAA; 256]);
        apply_sector_crc(&mut track, &sector);
        assert!(find_sector(&track, 4, 0).expect("sector").crc_ok);
    }
}
