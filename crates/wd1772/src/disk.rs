//! The disk surface as the controller sees it.

use crate::crc::id_crc;
use crate::track::TrackSector;

/// A sector ID field as read from the disk surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IdField {
    pub cyl: u8,
    pub head: u8,
    pub sector: u8,
    /// Size code; the data field holds `128 << (size & 3)` bytes.
    pub size: u8,
    /// CRC as stored on disk, which may not match the contents.
    pub crc: u16,
}

impl IdField {
    /// ID field with a correct CRC.
    #[must_use]
    pub fn new(cyl: u8, head: u8, sector: u8, size: u8) -> Self {
        Self {
            cyl,
            head,
            sector,
            size,
            crc: id_crc(cyl, head, sector, size),
        }
    }

    /// Data field length in bytes.
    #[must_use]
    pub fn data_len(&self) -> usize {
        128 << (self.size & 3)
    }

    /// Whether the stored CRC matches the ID bytes.
    #[must_use]
    pub fn crc_ok(&self) -> bool {
        self.crc == id_crc(self.cyl, self.head, self.sector, self.size)
    }
}

/// Disk image or device behind a drive.
///
/// Status values returned here use the controller's status bits
/// (`CRC_ERROR`, `RECORD_NOT_FOUND`, `RECORD_TYPE`, `WRITE_PROTECT`), and
/// zero means success.
pub trait Disk {
    /// Start a scan of the IDs on `track` of `side`.
    ///
    /// Returns false if the track holds no sectors.
    fn find_init(&mut self, side: u8, track: u8) -> bool;

    /// Start a scan at the index hole instead of the current spin position.
    fn find_from_index(&mut self, side: u8, track: u8) -> bool {
        self.find_init(side, track)
    }

    /// Next ID in spin order, with `CRC_ERROR` if its CRC is bad.
    ///
    /// Returns `None` once a full revolution has been scanned. The spin
    /// position is kept between scans of the same track.
    fn find_next(&mut self) -> Option<(IdField, u8)>;

    /// Read the data field of the sector last returned by `find_next`.
    ///
    /// Returns the number of bytes read and the data status.
    fn read_data(&mut self, buf: &mut [u8]) -> (usize, u8);

    /// Replace the data field of the sector last returned by `find_next`.
    fn write_data(&mut self, data: &[u8]) -> u8;

    /// Replace a whole track with the given sectors.
    fn format_track(&mut self, side: u8, track: u8, sectors: &[TrackSector]) -> u8;

    fn is_read_only(&self) -> bool;

    /// Whether an asynchronous device is still completing the last request.
    ///
    /// With `wait` set, the call blocks until the device is idle.
    fn is_busy(&mut self, _wait: bool) -> bool {
        false
    }

    /// Hint that `track` of `side` is about to be accessed.
    fn load_track(&mut self, _side: u8, _track: u8) {}

    /// Flush and release a physical device.
    fn close(&mut self) {}

    /// Whether this is a real drive rather than an image in memory.
    fn is_physical(&self) -> bool {
        false
    }
}
