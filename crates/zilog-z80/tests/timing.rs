//! Instruction timing, interrupt acceptance and prefix handling.
//!
//! The table cases are embedded JSON: code bytes, registers before and
//! after (hex strings), memory before and after, and the T-states charged.

use std::collections::BTreeMap;

use emu_core::{Bus, Cpu, Observable, Value};
use serde::Deserialize;
use zilog_z80::Z80;

struct TestBus {
    ram: Vec<u8>,
    cycles: u32,
    int: bool,
    event_checks: u32,
}

impl TestBus {
    fn new() -> Self {
        Self {
            ram: vec![0; 0x10000],
            cycles: 0,
            int: false,
            event_checks: 0,
        }
    }

    fn load(&mut self, addr: u16, bytes: &[u8]) {
        let start = usize::from(addr);
        self.ram[start..start + bytes.len()].copy_from_slice(bytes);
    }

    fn peek_word(&self, addr: u16) -> u16 {
        u16::from_le_bytes([
            self.ram[usize::from(addr)],
            self.ram[usize::from(addr.wrapping_add(1))],
        ])
    }
}

impl Bus for TestBus {
    fn fetch(&mut self, addr: u16) -> u8 {
        self.cycles += 4;
        self.ram[usize::from(addr)]
    }

    fn read(&mut self, addr: u16) -> u8 {
        self.cycles += 3;
        self.ram[usize::from(addr)]
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.cycles += 3;
        self.ram[usize::from(addr)] = value;
    }

    fn io_read(&mut self, _port: u16) -> u8 {
        self.cycles += 4;
        0xFF
    }

    fn io_write(&mut self, _port: u16, _value: u8) {
        self.cycles += 4;
    }

    fn delay(&mut self, cycles: u32) {
        self.cycles += cycles;
    }

    fn check_events(&mut self) {
        self.event_checks += 1;
    }

    fn int_active(&self) -> bool {
        self.int
    }
}

/// Run one whole instruction, including any DD/FD prefix steps.
fn run_instruction(cpu: &mut Z80, bus: &mut TestBus) {
    cpu.step(bus);
    while cpu.prefix_pending() {
        cpu.step(bus);
    }
}

#[derive(Deserialize)]
struct Case {
    name: String,
    code: String,
    #[serde(default)]
    setup: BTreeMap<String, String>,
    #[serde(default)]
    mem: BTreeMap<String, String>,
    expect: BTreeMap<String, String>,
    #[serde(default)]
    expect_mem: BTreeMap<String, String>,
    cycles: u32,
}

fn hex(s: &str) -> u16 {
    u16::from_str_radix(s, 16).unwrap_or_else(|e| panic!("bad hex {s:?}: {e}"))
}

fn set_reg(cpu: &mut Z80, name: &str, value: u16) {
    let regs = cpu.regs_mut();
    match name {
        "a" => regs.set_a(value as u8),
        "f" => regs.set_f(value as u8),
        "bc" => regs.bc.set(value),
        "de" => regs.de.set(value),
        "hl" => regs.hl.set(value),
        "ix" => regs.ix.set(value),
        "iy" => regs.iy.set(value),
        "sp" => regs.sp = value,
        "pc" => regs.pc = value,
        other => panic!("unknown register {other}"),
    }
}

fn get_reg(cpu: &Z80, name: &str) -> u16 {
    match cpu.query(name) {
        Some(Value::U8(v)) => u16::from(v),
        Some(Value::U16(v)) => v,
        other => panic!("unexpected query result for {name}: {other:?}"),
    }
}

const CASES: &str = r#"[
  { "name": "ld bc,nn", "code": "01 34 12",
    "expect": { "bc": "1234", "pc": "0003" }, "cycles": 10 },
  { "name": "add a,n overflow", "code": "C6 01", "setup": { "a": "7F" },
    "expect": { "a": "80", "f": "94" }, "cycles": 7 },
  { "name": "inc (hl)", "code": "34", "setup": { "hl": "8000" },
    "mem": { "8000": "41" }, "expect_mem": { "8000": "42" },
    "expect": { "pc": "0001" }, "cycles": 11 },
  { "name": "ld (ix+d),n", "code": "DD 36 05 AA", "setup": { "ix": "8000" },
    "expect_mem": { "8005": "AA" }, "expect": { "pc": "0004" }, "cycles": 19 },
  { "name": "ld a,(iy-1)", "code": "FD 7E FF", "setup": { "iy": "8001" },
    "mem": { "8000": "5A" }, "expect": { "a": "5A" }, "cycles": 19 },
  { "name": "ex (sp),hl", "code": "E3", "setup": { "sp": "8000", "hl": "1234" },
    "mem": { "8000": "CD", "8001": "AB" },
    "expect": { "hl": "ABCD" }, "expect_mem": { "8000": "34", "8001": "12" },
    "cycles": 19 },
  { "name": "djnz taken", "code": "10 FE", "setup": { "bc": "0200" },
    "expect": { "bc": "0100", "pc": "0000" }, "cycles": 13 },
  { "name": "djnz falls through", "code": "10 FE", "setup": { "bc": "0100" },
    "expect": { "bc": "0000", "pc": "0002" }, "cycles": 8 },
  { "name": "jr nz not taken", "code": "20 10", "setup": { "f": "40" },
    "expect": { "pc": "0002" }, "cycles": 7 },
  { "name": "call nn", "code": "CD 00 40", "setup": { "sp": "8000" },
    "expect": { "sp": "7FFE", "pc": "4000" },
    "expect_mem": { "7FFE": "03", "7FFF": "00" }, "cycles": 17 },
  { "name": "ret nz not taken", "code": "C0", "setup": { "f": "40" },
    "expect": { "pc": "0001" }, "cycles": 5 },
  { "name": "push af", "code": "F5", "setup": { "sp": "8000", "a": "12", "f": "C5" },
    "expect": { "sp": "7FFE" }, "expect_mem": { "7FFE": "C5", "7FFF": "12" },
    "cycles": 11 },
  { "name": "ldir repeats", "code": "ED B0",
    "setup": { "hl": "8000", "de": "9000", "bc": "0002" },
    "mem": { "8000": "77" },
    "expect": { "bc": "0001", "hl": "8001", "de": "9001", "pc": "0000" },
    "expect_mem": { "9000": "77" }, "cycles": 21 },
  { "name": "ldi last byte", "code": "ED A0",
    "setup": { "hl": "8000", "de": "9000", "bc": "0001" },
    "expect": { "bc": "0000", "pc": "0002" }, "cycles": 16 },
  { "name": "bit 7,(ix+d)", "code": "DD CB 01 7E", "setup": { "ix": "8000", "f": "00" },
    "expect": { "f": "54", "pc": "0004" }, "cycles": 20 },
  { "name": "set 0,(iy+d) copies to b", "code": "FD CB 02 C0", "setup": { "iy": "8000" },
    "expect": { "bc": "0100" }, "expect_mem": { "8002": "01" }, "cycles": 23 },
  { "name": "rlc (hl)", "code": "CB 06", "setup": { "hl": "8000" },
    "mem": { "8000": "81" }, "expect_mem": { "8000": "03" }, "expect": { "f": "05" },
    "cycles": 15 },
  { "name": "neg", "code": "ED 44", "setup": { "a": "01" },
    "expect": { "a": "FF", "f": "BB" }, "cycles": 8 },
  { "name": "sbc hl,bc", "code": "ED 42", "setup": { "hl": "1000", "bc": "0001", "f": "00" },
    "expect": { "hl": "0FFF", "f": "1A" }, "cycles": 15 },
  { "name": "rrd", "code": "ED 67", "setup": { "hl": "8000", "a": "12" },
    "mem": { "8000": "34" }, "expect": { "a": "14" }, "expect_mem": { "8000": "23" },
    "cycles": 18 },
  { "name": "unassigned ed is a nop", "code": "ED 00",
    "expect": { "pc": "0002" }, "cycles": 8 },
  { "name": "out (n),a", "code": "D3 FE", "setup": { "a": "07" },
    "expect": { "pc": "0002" }, "cycles": 11 },
  { "name": "ld sp,ix", "code": "DD F9", "setup": { "ix": "C000" },
    "expect": { "sp": "C000" }, "cycles": 10 },
  { "name": "ex de,hl ignores prefix", "code": "DD EB", "setup": { "de": "1111", "hl": "2222", "ix": "3333" },
    "expect": { "de": "2222", "hl": "1111", "ix": "3333" }, "cycles": 8 }
]"#;

#[test]
fn instruction_table() {
    let cases: Vec<Case> = serde_json::from_str(CASES).expect("valid case table");
    for case in &cases {
        let mut cpu = Z80::new();
        let mut bus = TestBus::new();
        let code: Vec<u8> = case
            .code
            .split_whitespace()
            .map(|b| hex(b) as u8)
            .collect();
        bus.load(0x0000, &code);
        cpu.regs_mut().pc = 0;
        for (reg, value) in &case.setup {
            set_reg(&mut cpu, reg, hex(value));
        }
        for (addr, value) in &case.mem {
            bus.load(hex(addr), &[hex(value) as u8]);
        }

        run_instruction(&mut cpu, &mut bus);

        assert_eq!(bus.cycles, case.cycles, "{}: T-states", case.name);
        for (reg, value) in &case.expect {
            assert_eq!(get_reg(&cpu, reg), hex(value), "{}: register {reg}", case.name);
        }
        for (addr, value) in &case.expect_mem {
            assert_eq!(
                bus.ram[usize::from(hex(addr))],
                hex(value) as u8,
                "{}: memory {addr}",
                case.name
            );
        }
    }
}

#[test]
fn power_on_state() {
    let cpu = Z80::new();
    assert_eq!(cpu.query("ix"), Some(Value::U16(0xFFFF)));
    assert_eq!(cpu.query("iy"), Some(Value::U16(0xFFFF)));
    assert_eq!(cpu.query("flags.z"), Some(Value::Bool(true)));
    assert_eq!(cpu.query("iff1"), Some(Value::Bool(false)));
    assert_eq!(cpu.query("im"), Some(Value::U8(0)));
    assert!(!cpu.prefix_pending());
}

#[test]
fn events_checked_before_every_step() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.regs_mut().pc = 0;
    for _ in 0..5 {
        cpu.step(&mut bus);
    }
    assert_eq!(bus.event_checks, 5);
}

#[test]
fn interrupt_waits_one_instruction_after_ei() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    // EI; NOP; NOP
    bus.load(0x0000, &[0xFB, 0x00, 0x00]);
    cpu.regs_mut().pc = 0;
    cpu.regs_mut().sp = 0x8000;
    cpu.regs_mut().im = 1;
    bus.int = true;

    cpu.step(&mut bus);
    assert_eq!(cpu.regs().pc, 0x0001, "EI itself");
    cpu.step(&mut bus);
    assert_eq!(cpu.regs().pc, 0x0002, "instruction after EI runs uninterrupted");

    let before = bus.cycles;
    cpu.step(&mut bus);
    // Acknowledge (13) plus the NOP fetched at 0x0038
    assert_eq!(bus.cycles - before, 13 + 4);
    assert_eq!(cpu.regs().pc, 0x0039);
    assert_eq!(bus.peek_word(0x7FFE), 0x0002);
    assert!(!cpu.regs().iff1);
    assert!(!cpu.regs().iff2);
}

#[test]
fn interrupt_accepted_on_next_boundary() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.regs_mut().pc = 0x0100;
    cpu.regs_mut().sp = 0x8000;
    cpu.regs_mut().iff1 = true;
    cpu.regs_mut().im = 1;

    cpu.step(&mut bus);
    assert_eq!(cpu.regs().pc, 0x0101);
    bus.int = true;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs().pc, 0x0039);
    assert_eq!(bus.peek_word(0x7FFE), 0x0101);
}

#[test]
fn im2_reads_vector_at_i_ff() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    bus.load(0x80FF, &[0x34, 0x12]);
    let regs = cpu.regs_mut();
    regs.pc = 0x0200;
    regs.sp = 0x9000;
    regs.iff1 = true;
    regs.im = 2;
    regs.i = 0x80;
    bus.int = true;

    cpu.step(&mut bus);
    assert_eq!(bus.cycles, 19 + 4);
    assert_eq!(cpu.regs().pc, 0x1235);
    assert_eq!(bus.peek_word(0x8FFE), 0x0200);
}

#[test]
fn halt_repeats_until_interrupt() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    bus.load(0x0000, &[0x76]);
    cpu.regs_mut().pc = 0;
    cpu.regs_mut().sp = 0x8000;
    cpu.regs_mut().iff1 = true;
    cpu.regs_mut().im = 1;

    for _ in 0..3 {
        cpu.step(&mut bus);
        assert!(cpu.is_halted());
        assert_eq!(cpu.regs().pc, 0x0000);
    }
    assert_eq!(bus.cycles, 12);

    bus.int = true;
    cpu.step(&mut bus);
    assert!(!cpu.is_halted());
    assert_eq!(bus.peek_word(0x7FFE), 0x0001, "returns past the HALT");
}

#[test]
fn prefix_defers_interrupt() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    // LD IX,0x1234
    bus.load(0x0000, &[0xDD, 0x21, 0x34, 0x12]);
    cpu.regs_mut().pc = 0;
    cpu.regs_mut().sp = 0x8000;
    cpu.regs_mut().iff1 = true;

    cpu.step(&mut bus);
    assert!(cpu.prefix_pending());
    bus.int = true;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs().ix.get(), 0x1234);
    assert_eq!(cpu.regs().pc, 0x0004);
}

#[test]
fn nmi_jumps_to_0066() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    let regs = cpu.regs_mut();
    regs.pc = 0x1234;
    regs.sp = 0x8000;
    regs.iff1 = true;
    regs.iff2 = true;

    cpu.nmi(&mut bus);
    assert_eq!(bus.cycles, 11);
    assert_eq!(cpu.regs().pc, 0x0066);
    assert!(!cpu.regs().iff1);
    assert!(cpu.regs().iff2);
    assert_eq!(bus.peek_word(0x7FFE), 0x1234);
}

#[test]
fn retn_restores_iff1() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    bus.load(0x0066, &[0xED, 0x45]);
    cpu.regs_mut().pc = 0x4000;
    cpu.regs_mut().sp = 0x8000;
    cpu.regs_mut().iff1 = true;
    cpu.regs_mut().iff2 = true;

    cpu.nmi(&mut bus);
    cpu.step(&mut bus);
    assert_eq!(cpu.regs().pc, 0x4000);
    assert!(cpu.regs().iff1);
}

#[test]
fn refresh_counts_m1_cycles() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    // NOP; DD NOP; CB 00
    bus.load(0x0000, &[0x00, 0xDD, 0x00, 0xCB, 0x00]);
    cpu.regs_mut().pc = 0;
    cpu.regs_mut().r = 0x7F;
    for _ in 0..4 {
        cpu.step(&mut bus);
    }
    // Five M1 cycles; bit 7 is untouched by the wrap
    assert_eq!(cpu.regs().r, 0x04);
}

#[test]
fn reset_restores_power_on_state() {
    let mut cpu = Z80::new();
    cpu.regs_mut().pc = 0x1234;
    cpu.regs_mut().iff1 = true;
    cpu.reset();
    assert_eq!(cpu.regs().pc, 0);
    assert!(!cpu.regs().iff1);
    assert_eq!(cpu.regs().ix.get(), 0xFFFF);
}
