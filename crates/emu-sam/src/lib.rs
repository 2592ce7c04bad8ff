//! Cycle-accurate SAM Coupé emulator core.
//!
//! The CPU runs at 6 MHz with every access charged by [`SamBus`], which
//! holds the clock, memory paging, contention and a queue of timed events
//! (interrupts, MIDI, mouse, sampler and tape). Frames are 312 lines of
//! 384 T-states. Video, sound and input live outside the core behind the
//! traits in [`io`].

mod bus;
pub mod config;
mod error;
pub mod events;
pub mod io;
pub mod memory;
mod sam;

pub use bus::{
    ASIC_STARTUP_DELAY, FRAME_INT_TIME, INT_ACTIVE_TIME, INPUT_UPDATE_TIME, LINES_PER_FRAME,
    MIDI_INT_ACTIVE_TIME, MIDI_TRANSMIT_TIME, MOUSE_RESET_TIME, SCREEN_END, SCREEN_LINES,
    SCREEN_START, SamBus, TOP_BORDER_LINES, TSTATES_PER_FRAME, TSTATES_PER_LINE, VIDEO_DELAY, int,
};
pub use config::{MainMemory, SamConfig};
pub use error::SamError;
pub use events::{EventKind, EventQueue};
pub use io::{
    Detached, Display, InputSource, MidiOut, Mouse, Peripherals, Sampler, Screen, SoundChip, Tape,
};
pub use memory::{Memory, Page};
pub use sam::Sam;
pub use wd1772::{Disk, DiskImage, Drive};
