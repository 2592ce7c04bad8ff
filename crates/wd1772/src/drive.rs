//! A drive: one controller plus whatever disk is inserted.

use emu_core::{Observable, Value};
use log::debug;

use crate::disk::Disk;
use crate::image::DiskImage;
use crate::Wd1772;

/// Floppy drive with its own WD1772.
///
/// Port bits 0-1 select the controller register and bit 2 selects the disk
/// side, so the eight ports of a drive cover both sides.
pub struct Drive {
    fdc: Wd1772,
    disk: Option<Box<dyn Disk>>,
}

impl Drive {
    #[must_use]
    pub fn new() -> Self {
        Self {
            fdc: Wd1772::new(),
            disk: None,
        }
    }

    /// Insert a disk, replacing any already present.
    pub fn insert(&mut self, disk: Box<dyn Disk>) {
        debug!("Disk inserted (read-only: {})", disk.is_read_only());
        self.disk = Some(disk);
    }

    pub fn insert_image(&mut self, image: DiskImage) {
        self.insert(Box::new(image));
    }

    /// Remove the disk, returning it.
    pub fn eject(&mut self) -> Option<Box<dyn Disk>> {
        if let Some(disk) = self.disk.as_mut() {
            disk.close();
            debug!("Disk ejected");
        }
        self.disk.take()
    }

    #[must_use]
    pub fn has_disk(&self) -> bool {
        self.disk.is_some()
    }

    /// Read one of the drive's ports.
    pub fn in_port(&mut self, port: u16) -> u8 {
        self.fdc.set_side(((port >> 2) & 1) as u8);
        match port & 3 {
            0 => self.fdc.read_status(surface(&mut self.disk)),
            1 => self.fdc.track(),
            2 => self.fdc.sector(),
            _ => self.fdc.read_data(),
        }
    }

    /// Write one of the drive's ports.
    pub fn out_port(&mut self, port: u16, value: u8) {
        self.fdc.set_side(((port >> 2) & 1) as u8);
        match port & 3 {
            0 => self.fdc.write_command(value, surface(&mut self.disk)),
            1 => self.fdc.set_track(value),
            2 => self.fdc.set_sector(value),
            _ => self.fdc.write_data(value, surface(&mut self.disk)),
        }
    }

    /// Once-per-frame housekeeping (motor timeout).
    pub fn frame_end(&mut self) {
        self.fdc.frame_end(surface(&mut self.disk));
    }

    /// Reset the controller; the disk stays inserted.
    pub fn reset(&mut self) {
        self.fdc.reset();
    }

    #[must_use]
    pub fn fdc(&self) -> &Wd1772 {
        &self.fdc
    }
}

fn surface(disk: &mut Option<Box<dyn Disk>>) -> Option<&mut dyn Disk> {
    disk.as_deref_mut().map(|d| d as &mut dyn Disk)
}

impl Default for Drive {
    fn default() -> Self {
        Self::new()
    }
}

impl Observable for Drive {
    fn query(&self, path: &str) -> Option<Value> {
        if path == "disk" {
            return Some(self.has_disk().into());
        }
        self.fdc.query(path)
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "disk", "status", "command", "track", "sector", "data", "side", "head", "motor",
            "phase",
        ]
    }
}
