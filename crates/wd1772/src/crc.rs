//! CRC-CCITT for MFM ID and data fields.
//!
//! Polynomial 0x1021, MSB first, preset to 0xFFFF before the three A1 sync
//! bytes. The table is built at compile time.

/// CRC preset loaded before the first sync byte.
pub const CRC_INIT: u16 = 0xFFFF;

const TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Feed one byte into a running CRC.
#[must_use]
pub fn crc_byte(crc: u16, byte: u8) -> u16 {
    (crc << 8) ^ TABLE[usize::from((crc >> 8) as u8 ^ byte)]
}

/// Feed a block into a running CRC.
#[must_use]
pub fn crc_block(crc: u16, data: &[u8]) -> u16 {
    data.iter().fold(crc, |crc, &b| crc_byte(crc, b))
}

/// CRC of an ID field: A1 A1 A1 FE C H R N.
#[must_use]
pub fn id_crc(cyl: u8, head: u8, sector: u8, size: u8) -> u16 {
    crc_block(CRC_INIT, &[0xA1, 0xA1, 0xA1, 0xFE, cyl, head, sector, size])
}

/// CRC of a data field: A1 A1 A1, the data mark, then the payload.
#[must_use]
pub fn data_crc(mark: u8, data: &[u8]) -> u16 {
    crc_block(crc_block(CRC_INIT, &[0xA1, 0xA1, 0xA1, mark]), data)
}
