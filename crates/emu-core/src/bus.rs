//! Timed memory and I/O bus interface.

/// Memory and I/O bus as seen by an instruction-stepped CPU.
///
/// Each access advances the owner's cycle counter by the cost of that bus
/// cycle, plus any wait states the machine inserts (memory contention, slow
/// peripheral ports). The CPU never counts cycles itself; it only tells the
/// bus what kind of cycle it is running.
pub trait Bus {
    /// Opcode fetch (M1 cycle).
    fn fetch(&mut self, address: u16) -> u8;

    /// Memory read cycle.
    fn read(&mut self, address: u16) -> u8;

    /// Memory write cycle.
    fn write(&mut self, address: u16, value: u8);

    /// I/O read cycle.
    fn io_read(&mut self, port: u16) -> u8;

    /// I/O write cycle.
    fn io_write(&mut self, port: u16, value: u8);

    /// Internal CPU cycles with no bus activity.
    fn delay(&mut self, cycles: u32);

    /// Little-endian word read: `address`, then `address + 1`.
    ///
    /// The order matters when wait states depend on the bus position.
    fn read_word(&mut self, address: u16) -> u16 {
        let lo = self.read(address);
        let hi = self.read(address.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    /// Little-endian word write: `address`, then `address + 1`.
    fn write_word(&mut self, address: u16, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.write(address, lo);
        self.write(address.wrapping_add(1), hi);
    }

    /// Catch up on anything scheduled up to the current cycle.
    ///
    /// Called once per instruction boundary, before the interrupt check.
    fn check_events(&mut self) {}

    /// True while the maskable interrupt line is asserted.
    fn int_active(&self) -> bool {
        false
    }
}
