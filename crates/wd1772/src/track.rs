//! Raw MFM track layout for READ TRACK and WRITE TRACK.
//!
//! There is no flux-level model. A track is synthesised as the byte stream
//! the WD1772 would deliver, with the standard gap and sync sizes, and a
//! stream written by the CPU is parsed back into sectors.

use crate::crc::{CRC_INIT, crc_block, crc_byte, data_crc};
use crate::disk::IdField;
use crate::status::{CRC_ERROR, RECORD_TYPE};

/// Bytes in one revolution at 250 kbit/s and 300 rpm.
pub const TRACK_LEN: usize = 6250;

const GAP_BYTE: u8 = 0x4E;
const SYNC_BYTE: u8 = 0xA1;
const ID_MARK: u8 = 0xFE;
const DATA_MARK: u8 = 0xFB;
const DELETED_DATA_MARK: u8 = 0xF8;

const GAP_INDEX: usize = 60;
const GAP_SYNC: usize = 12;
const GAP_ID: usize = 22;
const GAP_DATA: usize = 24;

// Bytes with special meaning in a WRITE TRACK stream
const WRITE_SYNC: u8 = 0xF5;
const WRITE_INDEX_SYNC: u8 = 0xF6;
const WRITE_CRC: u8 = 0xF7;

/// One sector as laid out on a raw track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSector {
    pub id: IdField,
    /// `CRC_ERROR` if the ID field CRC is bad.
    pub id_status: u8,
    /// Empty when the ID has no data field after it.
    pub data: Vec<u8>,
    /// `CRC_ERROR` and/or `RECORD_TYPE` (deleted data mark).
    pub data_status: u8,
}

impl TrackSector {
    /// A sector with good CRCs and a normal data mark.
    #[must_use]
    pub fn new(id: IdField, data: Vec<u8>) -> Self {
        Self {
            id,
            id_status: if id.crc_ok() { 0 } else { CRC_ERROR },
            data,
            data_status: 0,
        }
    }
}

/// Lay out sectors as a raw track of exactly `TRACK_LEN` bytes.
///
/// ID CRCs are written as stored in the ID field. A data field with
/// `CRC_ERROR` in its status gets a deliberately wrong CRC.
#[must_use]
pub fn encode_track(sectors: &[TrackSector]) -> Vec<u8> {
    let mut out = Vec::with_capacity(TRACK_LEN);
    out.resize(GAP_INDEX, GAP_BYTE);

    for sector in sectors {
        let id = &sector.id;
        sync(&mut out);
        out.extend_from_slice(&[ID_MARK, id.cyl, id.head, id.sector, id.size]);
        out.extend_from_slice(&id.crc.to_be_bytes());
        out.resize(out.len() + GAP_ID, GAP_BYTE);

        if !sector.data.is_empty() {
            let mark = if sector.data_status & RECORD_TYPE != 0 {
                DELETED_DATA_MARK
            } else {
                DATA_MARK
            };
            let mut crc = data_crc(mark, &sector.data);
            if sector.data_status & CRC_ERROR != 0 {
                crc = !crc;
            }
            sync(&mut out);
            out.push(mark);
            out.extend_from_slice(&sector.data);
            out.extend_from_slice(&crc.to_be_bytes());
            out.resize(out.len() + GAP_DATA, GAP_BYTE);
        }
    }

    out.resize(TRACK_LEN, GAP_BYTE);
    out
}

fn sync(out: &mut Vec<u8>) {
    out.resize(out.len() + GAP_SYNC, 0x00);
    out.extend_from_slice(&[SYNC_BYTE; 3]);
}

/// Find the sectors in a raw track.
///
/// An ID field is paired with the first data mark that follows it before
/// the next ID field. CRCs are checked and reported in the status bytes.
#[must_use]
pub fn decode_track(raw: &[u8]) -> Vec<TrackSector> {
    let mut sectors = Vec::new();
    let mut pending: Option<TrackSector> = None;
    let mut i = 0;

    while i + 4 <= raw.len() {
        if raw[i..i + 3] != [SYNC_BYTE; 3] {
            i += 1;
            continue;
        }

        match raw[i + 3] {
            ID_MARK if i + 10 <= raw.len() => {
                if let Some(sector) = pending.take() {
                    sectors.push(sector);
                }
                let f = &raw[i + 4..i + 8];
                let stored = u16::from_be_bytes([raw[i + 8], raw[i + 9]]);
                let id = IdField {
                    cyl: f[0],
                    head: f[1],
                    sector: f[2],
                    size: f[3],
                    crc: stored,
                };
                let id_status = if crc_block(CRC_INIT, &raw[i..i + 8]) == stored {
                    0
                } else {
                    CRC_ERROR
                };
                pending = Some(TrackSector {
                    id,
                    id_status,
                    data: Vec::new(),
                    data_status: 0,
                });
                i += 10;
            }
            mark @ (DATA_MARK | DELETED_DATA_MARK) => {
                let Some(mut sector) = pending.take() else {
                    i += 1;
                    continue;
                };
                let end = i + 4 + sector.id.data_len();
                if end + 2 > raw.len() {
                    sectors.push(sector);
                    break;
                }
                let stored = u16::from_be_bytes([raw[end], raw[end + 1]]);
                sector.data = raw[i + 4..end].to_vec();
                if crc_block(CRC_INIT, &raw[i..end]) != stored {
                    sector.data_status |= CRC_ERROR;
                }
                if mark == DELETED_DATA_MARK {
                    sector.data_status |= RECORD_TYPE;
                }
                sectors.push(sector);
                i = end + 2;
            }
            _ => i += 1,
        }
    }

    if let Some(sector) = pending {
        sectors.push(sector);
    }
    sectors
}

/// Turn the bytes a CPU wrote during WRITE TRACK into the raw track they
/// produce on disk.
///
/// F5 writes an A1 sync byte and presets the CRC at the start of a run,
/// F6 writes a C2 index sync, and F7 writes the two CRC bytes.
#[must_use]
pub fn expand_write_stream(stream: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(stream.len() + 64);
    let mut crc = CRC_INIT;
    let mut prev = 0u8;

    for &b in stream {
        match b {
            WRITE_SYNC => {
                if prev != WRITE_SYNC {
                    crc = CRC_INIT;
                }
                out.push(SYNC_BYTE);
                crc = crc_byte(crc, SYNC_BYTE);
            }
            WRITE_INDEX_SYNC => out.push(0xC2),
            WRITE_CRC => out.extend_from_slice(&crc.to_be_bytes()),
            _ => {
                out.push(b);
                crc = crc_byte(crc, b);
            }
        }
        prev = b;
    }
    out
}
