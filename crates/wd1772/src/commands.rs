//! WD1772 command decoding and execution.
//!
//! Type 1 commands (head positioning) complete as soon as they are written.
//! Type 2 and 3 commands only set BUSY when written; each stage is then
//! carried out by the next status read, so the CPU's own polling loop is
//! what moves a command along.

use log::trace;

use crate::disk::Disk;
use crate::image::CYLINDERS;
use crate::status::{
    BUSY, CRC_ERROR, DRQ, RECORD_NOT_FOUND, RECORD_TYPE, SEEK_ERROR, SPIN_UP, WRITE_PROTECT,
};
use crate::track::{TRACK_LEN, TrackSector, decode_track, encode_track, expand_write_stream};
use crate::{Phase, Wd1772};

/// Command codes (high nibble of the command byte).
pub const RESTORE: u8 = 0x00;
pub const SEEK: u8 = 0x10;
pub const STEP: u8 = 0x20;
pub const STEP_UPDATE: u8 = 0x30;
pub const STEP_IN: u8 = 0x40;
pub const STEP_IN_UPDATE: u8 = 0x50;
pub const STEP_OUT: u8 = 0x60;
pub const STEP_OUT_UPDATE: u8 = 0x70;
pub const READ_1SECTOR: u8 = 0x80;
pub const READ_MSECTOR: u8 = 0x90;
pub const WRITE_1SECTOR: u8 = 0xA0;
pub const WRITE_MSECTOR: u8 = 0xB0;
pub const READ_ADDRESS: u8 = 0xC0;
pub const FORCE_INTERRUPT: u8 = 0xD0;
pub const READ_TRACK: u8 = 0xE0;
pub const WRITE_TRACK: u8 = 0xF0;

/// Type 1 flag: check an ID on the destination track.
pub const VERIFY: u8 = 0x04;
/// Type 1 flag: skip motor spin-up.
pub const NO_SPIN_UP: u8 = 0x08;
/// Step flag: also update the track register.
pub const UPDATE_TRACK: u8 = 0x10;

const LAST_CYLINDER: u8 = CYLINDERS - 1;

/// A decoded command byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Restore,
    Seek,
    Step,
    StepIn,
    StepOut,
    ReadSector { multiple: bool },
    WriteSector { multiple: bool },
    ReadAddress,
    ForceInterrupt,
    ReadTrack,
    WriteTrack,
}

impl Command {
    #[must_use]
    pub fn decode(value: u8) -> Self {
        match value & 0xF0 {
            RESTORE => Self::Restore,
            SEEK => Self::Seek,
            STEP | STEP_UPDATE => Self::Step,
            STEP_IN | STEP_IN_UPDATE => Self::StepIn,
            STEP_OUT | STEP_OUT_UPDATE => Self::StepOut,
            READ_1SECTOR => Self::ReadSector { multiple: false },
            READ_MSECTOR => Self::ReadSector { multiple: true },
            WRITE_1SECTOR => Self::WriteSector { multiple: false },
            WRITE_MSECTOR => Self::WriteSector { multiple: true },
            READ_ADDRESS => Self::ReadAddress,
            FORCE_INTERRUPT => Self::ForceInterrupt,
            READ_TRACK => Self::ReadTrack,
            _ => Self::WriteTrack,
        }
    }

    /// Command type, 1 to 4.
    #[must_use]
    pub fn kind(self) -> u8 {
        match self {
            Self::Restore | Self::Seek | Self::Step | Self::StepIn | Self::StepOut => 1,
            Self::ReadSector { .. } | Self::WriteSector { .. } => 2,
            Self::ReadAddress | Self::ReadTrack | Self::WriteTrack => 3,
            Self::ForceInterrupt => 4,
        }
    }
}

impl Wd1772 {
    /// Type 1: move the head, then optionally verify the track.
    pub(crate) fn execute_type1(&mut self, command: Command, value: u8, disk: Option<&mut dyn Disk>) {
        match command {
            Command::Restore => {
                self.head_pos = 0;
                self.track = 0;
            }
            Command::Seek => {
                let target = self.data;
                self.step_in = target > self.track;
                let delta = i16::from(target) - i16::from(self.track);
                self.head_pos =
                    (i16::from(self.head_pos) + delta).clamp(0, i16::from(LAST_CYLINDER)) as u8;
                self.track = target;
            }
            _ => {
                match command {
                    Command::StepIn => self.step_in = true,
                    Command::StepOut => self.step_in = false,
                    _ => {}
                }
                if self.step_in {
                    self.head_pos = (self.head_pos + 1).min(LAST_CYLINDER);
                } else {
                    self.head_pos = self.head_pos.saturating_sub(1);
                }
                if value & UPDATE_TRACK != 0 {
                    self.track = if self.step_in {
                        self.track.wrapping_add(1)
                    } else {
                        self.track.wrapping_sub(1)
                    };
                }
            }
        }

        if value & NO_SPIN_UP == 0 {
            self.status |= SPIN_UP;
        }
        if value & VERIFY != 0 {
            self.verify(disk);
        }
    }

    /// Look for an ID whose cylinder matches the track register.
    fn verify(&mut self, disk: Option<&mut dyn Disk>) {
        let Some(disk) = disk else {
            self.status |= SEEK_ERROR;
            return;
        };
        if disk.find_init(self.side, self.head_pos) {
            while let Some((id, status)) = disk.find_next() {
                if id.cyl != self.track {
                    continue;
                }
                if status & CRC_ERROR == 0 {
                    self.status &= !CRC_ERROR;
                    return;
                }
                self.status |= CRC_ERROR;
            }
        }
        self.status |= SEEK_ERROR;
    }

    /// Carry out the next stage of a type 2 or 3 command.
    pub(crate) fn execute_next(&mut self, disk: Option<&mut dyn Disk>) {
        let Some(disk) = disk else {
            self.finish(RECORD_NOT_FOUND);
            return;
        };
        if disk.is_busy(false) {
            return;
        }

        match Command::decode(self.command) {
            Command::ReadSector { .. } => self.start_read_sector(disk),
            Command::WriteSector { .. } => self.start_write_sector(disk),
            Command::ReadAddress => self.start_read_address(disk),
            Command::ReadTrack => self.start_read_track(disk),
            Command::WriteTrack => self.start_write_track(disk),
            _ => self.finish(0),
        }
    }

    /// Scan the current track for the ID matching the track and sector
    /// registers.
    ///
    /// A matching ID with a bad CRC ends the command with `CRC_ERROR`.
    fn find_sector(&mut self, disk: &mut dyn Disk) -> Result<usize, u8> {
        if !disk.find_init(self.side, self.head_pos) {
            return Err(RECORD_NOT_FOUND);
        }
        while let Some((id, status)) = disk.find_next() {
            if id.cyl == self.track && id.sector == self.sector {
                if status & CRC_ERROR != 0 {
                    return Err(CRC_ERROR);
                }
                return Ok(id.data_len());
            }
        }
        Err(RECORD_NOT_FOUND)
    }

    fn start_transfer(&mut self, phase: Phase, len: usize) {
        self.pos = 0;
        self.len = len;
        self.phase = phase;
        self.status |= DRQ;
    }

    fn start_read_sector(&mut self, disk: &mut dyn Disk) {
        // A deleted mark seen earlier in a multi-sector read stays reported
        let carried = self.deferred & RECORD_TYPE;
        match self.find_sector(disk) {
            Ok(len) => {
                self.buffer.clear();
                self.buffer.resize(len, 0);
                let (read, status) = disk.read_data(&mut self.buffer);
                if read == 0 {
                    self.finish(status | RECORD_NOT_FOUND | carried);
                    return;
                }
                self.deferred = status | carried;
                self.start_transfer(Phase::Reading, read);
            }
            Err(status) => self.finish(status | carried),
        }
    }

    fn start_write_sector(&mut self, disk: &mut dyn Disk) {
        if disk.is_read_only() {
            self.finish(WRITE_PROTECT);
            return;
        }
        match self.find_sector(disk) {
            Ok(len) => {
                self.buffer.clear();
                self.buffer.resize(len, 0);
                self.deferred = 0;
                self.start_transfer(Phase::Writing, len);
            }
            Err(status) => self.finish(status),
        }
    }

    fn start_read_address(&mut self, disk: &mut dyn Disk) {
        let next = if disk.find_init(self.side, self.head_pos) {
            disk.find_next()
        } else {
            None
        };
        let Some((id, status)) = next else {
            self.finish(RECORD_NOT_FOUND);
            return;
        };

        let [crc_hi, crc_lo] = id.crc.to_be_bytes();
        self.buffer.clear();
        self.buffer
            .extend_from_slice(&[id.cyl, id.head, id.sector, id.size, crc_hi, crc_lo]);
        self.deferred = status & CRC_ERROR;
        self.start_transfer(Phase::Reading, 6);
    }

    fn start_read_track(&mut self, disk: &mut dyn Disk) {
        let mut sectors = Vec::new();
        if disk.find_from_index(self.side, self.head_pos) {
            while let Some((id, id_status)) = disk.find_next() {
                let mut data = vec![0u8; id.data_len()];
                let (read, data_status) = disk.read_data(&mut data);
                data.truncate(read);
                sectors.push(TrackSector {
                    id,
                    id_status,
                    data,
                    data_status,
                });
            }
        }
        self.buffer = encode_track(&sectors);
        self.deferred = 0;
        self.start_transfer(Phase::Reading, TRACK_LEN);
    }

    fn start_write_track(&mut self, disk: &mut dyn Disk) {
        if disk.is_read_only() {
            self.finish(WRITE_PROTECT);
            return;
        }
        self.buffer.clear();
        self.buffer.resize(TRACK_LEN, 0);
        self.deferred = 0;
        self.start_transfer(Phase::Writing, TRACK_LEN);
    }

    /// The CPU has read the last byte of the buffer.
    pub(crate) fn read_complete(&mut self) {
        self.status &= !DRQ;
        let command = Command::decode(self.command);
        if command == Command::ReadAddress {
            // The WD1772 copies the ID cylinder into the sector register
            self.sector = self.buffer[0];
        }
        let multiple = command == Command::ReadSector { multiple: true };
        if multiple && self.deferred & CRC_ERROR == 0 {
            trace!("WD1772 sector {} read, continuing", self.sector);
            self.sector = self.sector.wrapping_add(1);
            self.phase = Phase::Busy;
        } else {
            trace!("WD1772 read complete, status {:#04X}", self.deferred);
            self.finish(self.deferred);
        }
    }

    /// The CPU has written the last byte of the buffer.
    pub(crate) fn write_complete(&mut self, disk: Option<&mut dyn Disk>) {
        self.status &= !DRQ;
        let Some(disk) = disk else {
            self.finish(RECORD_NOT_FOUND);
            return;
        };

        match Command::decode(self.command) {
            Command::WriteSector { multiple } => {
                let status = disk.write_data(&self.buffer[..self.len]);
                if multiple && status == 0 {
                    trace!("WD1772 sector {} written, continuing", self.sector);
                    self.sector = self.sector.wrapping_add(1);
                    self.phase = Phase::Busy;
                } else {
                    trace!("WD1772 write complete, status {status:#04X}");
                    self.finish(status);
                }
            }
            Command::WriteTrack => {
                let sectors = decode_track(&expand_write_stream(&self.buffer[..self.len]));
                trace!("WD1772 track formatted with {} sectors", sectors.len());
                let status = disk.format_track(self.side, self.head_pos, &sectors);
                self.finish(status);
            }
            _ => self.finish(0),
        }
    }

    /// End the command, merging `status` into the status register.
    pub(crate) fn finish(&mut self, status: u8) {
        self.status = (self.status & !(BUSY | DRQ)) | status;
        self.phase = Phase::Idle;
        self.pos = 0;
        self.len = 0;
    }
}
