//! MGT disk images.
//!
//! The MGT format is a plain sector dump of a SAM DOS disk: 80 tracks, 2
//! sides, 10 sectors of 512 bytes, with the sides of each track stored
//! together (track 0 side 0, track 0 side 1, track 1 side 0, ...).
//!
//! In memory a `DiskImage` holds any layout, so WRITE TRACK can reformat a
//! track with different sector numbers or sizes. Only images still in MGT
//! layout can be exported back to MGT bytes.

use thiserror::Error;

use crate::disk::{Disk, IdField};
use crate::status::{CRC_ERROR, RECORD_NOT_FOUND, WRITE_PROTECT};
use crate::track::TrackSector;

pub const MGT_TRACKS: u8 = 80;
pub const MGT_SIDES: u8 = 2;
pub const MGT_SECTORS: u8 = 10;
pub const MGT_SECTOR_SIZE: usize = 512;
pub const MGT_IMAGE_SIZE: usize =
    MGT_TRACKS as usize * MGT_SIDES as usize * MGT_SECTORS as usize * MGT_SECTOR_SIZE;

/// Cylinders the head can reach; the ones past 79 start unformatted.
pub const CYLINDERS: u8 = 83;

/// Size code for 512-byte sectors.
const MGT_SIZE_CODE: u8 = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("MGT image must be {MGT_IMAGE_SIZE} bytes, got {0}")]
    BadSize(usize),
    #[error("side {side} track {track} is not in MGT layout")]
    NonStandardTrack { side: u8, track: u8 },
}

/// One sector held by an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sector {
    pub id: IdField,
    pub data: Vec<u8>,
    /// Status reported after reading the data: `CRC_ERROR`, `RECORD_TYPE`.
    pub data_status: u8,
}

/// Sector-level disk image held in memory.
pub struct DiskImage {
    /// Indexed by `cyl * 2 + side`.
    tracks: Vec<Vec<Sector>>,
    read_only: bool,
    modified: bool,
    /// Track being scanned by `find_init`/`find_next`.
    scan_track: Option<usize>,
    /// Index of the sector under the head, kept per scan track.
    spin: usize,
    /// IDs left before a full revolution has passed.
    remaining: usize,
    /// Sector last returned by `find_next`.
    found: Option<usize>,
}

impl DiskImage {
    /// A disk with no formatted tracks.
    #[must_use]
    pub fn unformatted() -> Self {
        Self {
            tracks: vec![Vec::new(); usize::from(CYLINDERS) * 2],
            read_only: false,
            modified: false,
            scan_track: None,
            spin: 0,
            remaining: 0,
            found: None,
        }
    }

    /// A zero-filled disk in MGT layout.
    #[must_use]
    pub fn blank() -> Self {
        let mut image = Self::unformatted();
        for cyl in 0..MGT_TRACKS {
            for side in 0..MGT_SIDES {
                image.tracks[track_index(side, cyl)] = (1..=MGT_SECTORS)
                    .map(|r| Sector {
                        id: IdField::new(cyl, side, r, MGT_SIZE_CODE),
                        data: vec![0; MGT_SECTOR_SIZE],
                        data_status: 0,
                    })
                    .collect();
            }
        }
        image
    }

    /// Load an MGT image.
    pub fn from_mgt(data: &[u8]) -> Result<Self, ImageError> {
        if data.len() != MGT_IMAGE_SIZE {
            return Err(ImageError::BadSize(data.len()));
        }
        let mut image = Self::blank();
        for cyl in 0..MGT_TRACKS {
            for side in 0..MGT_SIDES {
                for sector in &mut image.tracks[track_index(side, cyl)] {
                    let offset = mgt_offset(side, cyl, sector.id.sector);
                    sector
                        .data
                        .copy_from_slice(&data[offset..offset + MGT_SECTOR_SIZE]);
                }
            }
        }
        Ok(image)
    }

    /// Export as MGT bytes.
    ///
    /// Every track must still hold sectors 1-10 of 512 bytes. Extra sectors
    /// and injected errors are not representable and are dropped.
    pub fn to_mgt(&self) -> Result<Vec<u8>, ImageError> {
        let mut out = vec![0u8; MGT_IMAGE_SIZE];
        for cyl in 0..MGT_TRACKS {
            for side in 0..MGT_SIDES {
                let track = &self.tracks[track_index(side, cyl)];
                for r in 1..=MGT_SECTORS {
                    let sector = track
                        .iter()
                        .find(|s| s.id.sector == r && s.data.len() == MGT_SECTOR_SIZE)
                        .ok_or(ImageError::NonStandardTrack { side, track: cyl })?;
                    let offset = mgt_offset(side, cyl, r);
                    out[offset..offset + MGT_SECTOR_SIZE].copy_from_slice(&sector.data);
                }
            }
        }
        Ok(out)
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Whether anything has been written since the image was created.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Sectors on a track, in spin order.
    #[must_use]
    pub fn track(&self, side: u8, cyl: u8) -> &[Sector] {
        self.tracks
            .get(track_index(side, cyl))
            .map_or(&[], Vec::as_slice)
    }

    /// A sector by its ID number, for inspection or error injection.
    pub fn sector_mut(&mut self, side: u8, cyl: u8, sector: u8) -> Option<&mut Sector> {
        self.tracks
            .get_mut(track_index(side, cyl))?
            .iter_mut()
            .find(|s| s.id.sector == sector)
    }

    fn found_sector(&mut self) -> Option<&mut Sector> {
        let track = self.scan_track?;
        let index = self.found?;
        self.tracks.get_mut(track)?.get_mut(index)
    }
}

impl Default for DiskImage {
    fn default() -> Self {
        Self::blank()
    }
}

fn track_index(side: u8, cyl: u8) -> usize {
    usize::from(cyl) * 2 + usize::from(side & 1)
}

fn mgt_offset(side: u8, cyl: u8, sector: u8) -> usize {
    (track_index(side, cyl) * usize::from(MGT_SECTORS) + usize::from(sector - 1)) * MGT_SECTOR_SIZE
}

impl Disk for DiskImage {
    fn find_init(&mut self, side: u8, track: u8) -> bool {
        self.found = None;
        if track >= CYLINDERS {
            self.scan_track = None;
            self.remaining = 0;
            return false;
        }
        let index = track_index(side, track);
        if self.scan_track != Some(index) {
            self.scan_track = Some(index);
            self.spin = 0;
        }
        self.remaining = self.tracks[index].len();
        self.remaining > 0
    }

    fn find_from_index(&mut self, side: u8, track: u8) -> bool {
        let found = self.find_init(side, track);
        self.spin = 0;
        found
    }

    fn find_next(&mut self) -> Option<(IdField, u8)> {
        let sectors = &self.tracks[self.scan_track?];
        if self.remaining == 0 || sectors.is_empty() {
            return None;
        }
        let index = self.spin % sectors.len();
        let id = sectors[index].id;
        self.spin = (index + 1) % sectors.len();
        self.remaining -= 1;
        self.found = Some(index);
        let status = if id.crc_ok() { 0 } else { CRC_ERROR };
        Some((id, status))
    }

    fn read_data(&mut self, buf: &mut [u8]) -> (usize, u8) {
        let Some(sector) = self.found_sector() else {
            return (0, RECORD_NOT_FOUND);
        };
        if sector.data.is_empty() {
            return (0, RECORD_NOT_FOUND);
        }
        let len = buf.len().min(sector.data.len());
        buf[..len].copy_from_slice(&sector.data[..len]);
        (len, sector.data_status)
    }

    fn write_data(&mut self, data: &[u8]) -> u8 {
        if self.read_only {
            return WRITE_PROTECT;
        }
        let Some(sector) = self.found_sector() else {
            return RECORD_NOT_FOUND;
        };
        sector.data = data.to_vec();
        sector.data_status = 0;
        self.modified = true;
        0
    }

    fn format_track(&mut self, side: u8, track: u8, sectors: &[TrackSector]) -> u8 {
        if self.read_only {
            return WRITE_PROTECT;
        }
        let Some(slot) = self.tracks.get_mut(track_index(side, track)) else {
            return RECORD_NOT_FOUND;
        };
        *slot = sectors
            .iter()
            .map(|s| Sector {
                id: s.id,
                data: s.data.clone(),
                data_status: s.data_status,
            })
            .collect();
        self.scan_track = None;
        self.found = None;
        self.modified = true;
        0
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}
