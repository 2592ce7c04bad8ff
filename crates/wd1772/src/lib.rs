//! WD1772 floppy disk controller.
//!
//! Standalone chip emulation, one controller per drive as on the SAM Coupé.
//! The controller never owns a disk: every access that may touch the
//! surface borrows one from the [`Drive`] that wraps it.
//!
//! # Register interface
//!
//! Four registers, selected by the low two bits of the port:
//! - **0** status (read) / command (write)
//! - **1** track
//! - **2** sector
//! - **3** data
//!
//! # State machine
//!
//! Idle → Busy (type 2/3 command written) → Reading/Writing (DRQ set, CPU
//! moves bytes through the data register) → Busy (multi-sector) or Idle.
//! Busy only advances when the status register is read.

pub mod commands;
pub mod crc;
mod disk;
mod drive;
pub mod image;
pub mod track;

use emu_core::{Observable, Value};
use log::{debug, info, warn};

use commands::Command;
pub use disk::{Disk, IdField};
pub use drive::Drive;
pub use image::{DiskImage, ImageError};
use status::{BUSY, DRQ, INDEX, MOTOR_ON, TRACK00, WRITE_PROTECT};

/// Status register bits. Several bits mean different things for type 1
/// commands and for type 2/3 commands.
pub mod status {
    pub const BUSY: u8 = 0x01;
    /// Type 1: index hole under the sensor.
    pub const INDEX: u8 = 0x02;
    /// Type 2/3: data register needs servicing.
    pub const DRQ: u8 = 0x02;
    /// Type 1: head at cylinder 0.
    pub const TRACK00: u8 = 0x04;
    /// Type 2/3: CPU did not service DRQ in time.
    pub const LOST_DATA: u8 = 0x04;
    pub const CRC_ERROR: u8 = 0x08;
    /// Type 1: verify found no matching ID.
    pub const SEEK_ERROR: u8 = 0x10;
    /// Type 2/3: no matching ID on the track.
    pub const RECORD_NOT_FOUND: u8 = 0x10;
    /// Type 1: motor spin-up complete.
    pub const SPIN_UP: u8 = 0x20;
    /// Type 2/3: deleted data mark.
    pub const RECORD_TYPE: u8 = 0x20;
    pub const WRITE_PROTECT: u8 = 0x40;
    pub const MOTOR_ON: u8 = 0x80;
}

/// Frames the motor keeps running after the last command (10 revolutions
/// at 300 rpm, 50 frames per second).
pub const MOTOR_FRAMES: u32 = 100;

/// Status reads between index pulses while the motor is on.
const INDEX_PULSE_READS: u32 = 1024;

/// Controller phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// A type 2/3 command waiting for its next stage.
    Busy,
    /// DRQ set, the CPU reads the buffer through the data register.
    Reading,
    /// DRQ set, the CPU fills the buffer through the data register.
    Writing,
}

/// WD1772 floppy disk controller.
pub struct Wd1772 {
    status: u8,
    command: u8,
    track: u8,
    sector: u8,
    data: u8,
    side: u8,
    /// Cylinder under the head, which the track register need not match.
    head_pos: u8,
    /// Direction of the last step, reused by STEP.
    step_in: bool,
    phase: Phase,
    /// Status shows head position bits rather than transfer bits.
    type1_status: bool,
    buffer: Vec<u8>,
    pos: usize,
    len: usize,
    /// Data status reported once the last byte has been read.
    deferred: u8,
    status_reads: u32,
    motor_frames: u32,
}

impl Wd1772 {
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: 0,
            command: 0,
            track: 0,
            sector: 1,
            data: 0,
            side: 0,
            head_pos: 0,
            step_in: true,
            phase: Phase::Idle,
            type1_status: true,
            buffer: Vec::with_capacity(track::TRACK_LEN),
            pos: 0,
            len: 0,
            deferred: 0,
            status_reads: 0,
            motor_frames: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Read the status register.
    ///
    /// The value is computed before a busy controller advances, so the
    /// first read after a type 2/3 command always shows BUSY without DRQ.
    pub fn read_status(&mut self, disk: Option<&mut dyn Disk>) -> u8 {
        let mut value = self.status;

        if self.type1_status {
            if self.head_pos == 0 {
                value |= TRACK00;
            }
            if self.status & MOTOR_ON != 0 {
                self.status_reads = self.status_reads.wrapping_add(1);
                if self.status_reads % INDEX_PULSE_READS == 0 {
                    value |= INDEX;
                }
            }
            if disk.as_ref().is_some_and(|d| d.is_read_only()) {
                value |= WRITE_PROTECT;
            }
        }

        if self.phase == Phase::Busy && self.status & DRQ == 0 {
            self.execute_next(disk);
        }
        value
    }

    /// Write the command register.
    ///
    /// Ignored while BUSY unless the command is FORCE INTERRUPT.
    pub fn write_command(&mut self, value: u8, disk: Option<&mut dyn Disk>) {
        let command = Command::decode(value);
        let was_busy = self.status & BUSY != 0;
        if was_busy && command != Command::ForceInterrupt {
            warn!("WD1772 command {value:#04X} ignored while busy");
            return;
        }

        debug!("WD1772 command {value:#04X} {command:?}, track {} sector {}", self.track, self.sector);
        self.command = value;
        self.status &= MOTOR_ON;

        match command.kind() {
            1 => {
                self.start_motor();
                self.type1_status = true;
                self.execute_type1(command, value, disk);
            }
            4 => {
                self.phase = Phase::Idle;
                self.pos = 0;
                self.len = 0;
                if !was_busy {
                    self.type1_status = true;
                }
            }
            _ => {
                self.start_motor();
                self.type1_status = false;
                self.status |= BUSY;
                self.phase = Phase::Busy;
                self.deferred = 0;
                if let Some(disk) = disk {
                    disk.load_track(self.side, self.head_pos);
                }
            }
        }
    }

    /// Read the data register, taking the next buffered byte during a read.
    pub fn read_data(&mut self) -> u8 {
        if self.phase == Phase::Reading && self.status & DRQ != 0 {
            self.data = self.buffer[self.pos];
            self.pos += 1;
            if self.pos >= self.len {
                self.read_complete();
            }
        }
        self.data
    }

    /// Write the data register, buffering the byte during a write.
    pub fn write_data(&mut self, value: u8, disk: Option<&mut dyn Disk>) {
        self.data = value;
        if self.phase == Phase::Writing && self.status & DRQ != 0 {
            self.buffer[self.pos] = value;
            self.pos += 1;
            if self.pos >= self.len {
                self.write_complete(disk);
            }
        }
    }

    #[must_use]
    pub fn track(&self) -> u8 {
        self.track
    }

    pub fn set_track(&mut self, value: u8) {
        self.track = value;
    }

    #[must_use]
    pub fn sector(&self) -> u8 {
        self.sector
    }

    pub fn set_sector(&mut self, value: u8) {
        self.sector = value;
    }

    /// Select the disk side (the SAM drives this from a port address line).
    pub fn set_side(&mut self, side: u8) {
        self.side = side & 1;
    }

    /// Cylinder currently under the head.
    #[must_use]
    pub fn head_position(&self) -> u8 {
        self.head_pos
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Status register without side effects.
    #[must_use]
    pub fn peek_status(&self) -> u8 {
        self.status
    }

    #[must_use]
    pub fn motor_on(&self) -> bool {
        self.status & MOTOR_ON != 0
    }

    /// Count down the motor timeout; called once per frame.
    ///
    /// When it expires the motor stops and a physical device is closed.
    pub fn frame_end(&mut self, disk: Option<&mut dyn Disk>) {
        if self.motor_frames == 0 {
            return;
        }
        self.motor_frames -= 1;
        if self.motor_frames == 0 {
            self.status &= !MOTOR_ON;
            if let Some(disk) = disk.filter(|d| d.is_physical()) {
                info!("WD1772 motor off, closing device");
                disk.close();
            }
        }
    }

    fn start_motor(&mut self) {
        self.status |= MOTOR_ON;
        self.motor_frames = MOTOR_FRAMES;
    }
}

impl Default for Wd1772 {
    fn default() -> Self {
        Self::new()
    }
}

impl Observable for Wd1772 {
    fn query(&self, path: &str) -> Option<Value> {
        let value: Value = match path {
            "status" => self.status.into(),
            "command" => self.command.into(),
            "track" => self.track.into(),
            "sector" => self.sector.into(),
            "data" => self.data.into(),
            "side" => self.side.into(),
            "head" => self.head_pos.into(),
            "motor" => self.motor_on().into(),
            "phase" => format!("{:?}", self.phase).into(),
            _ => return None,
        };
        Some(value)
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "status", "command", "track", "sector", "data", "side", "head", "motor", "phase",
        ]
    }
}
