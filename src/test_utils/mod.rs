//! Shared test utilities: cartridge builders and an in-process fake VM module.
//!
//! `FakeModule` implements the full `VmModule` ABI over a real `LinearMemory`
//! so the bridge code under test exercises the same pointer/encoding paths it
//! would against a compiled module:
//! - bump allocator starting at `HEAP_BASE`; freed blocks are never reused
//! - every live block is tracked; freeing an unknown pointer panics (this is
//!   how double frees surface in tests)
//! - the arena grows in whole pages when an allocation does not fit, which
//!   replaces the buffer and bumps its generation
//! - a toy CPU: every opcode costs 4 cycles and advances PC by its encoded
//!   length, except `JP a16` (16 cycles) and `JR r8` (12 cycles), which jump,
//!   and `INC A`, which also updates A and the zero flag
//! - stepping follows the real core: at least one instruction per call,
//!   stopping once PC lands on the breakpoint
//! - cartridge validation with the real status codes
//!
//! Cartridge layout used by the builders:
//! - 0x0100: `NOP; JP $0150` entry stub
//! - 0x0134: title "TEST"
//! - 0x0147..=0x0149: kind, ROM size code, RAM size code
//! - 0x014D: header checksum
//! - 0x0150: program bytes (`build_cart_with_program`)

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::cartridge::header_checksum;
use crate::codec;
use crate::disasm::{self, table::OPCODES};
use crate::error::Trap;
use crate::memory::{LinearMemory, PAGE_SIZE};
use crate::module::{CallResult, VmModule};
use crate::vm::{CPU_REGISTERS_LEN, CYCLES_PER_FRAME, CLOCK_HZ, MMU_LEN, Surface};

// ---------------------------------------------------------------------------
// Cartridge builders
// ---------------------------------------------------------------------------

/// Offset where `build_cart_with_program` places the program.
pub const PROGRAM_START: usize = 0x150;

/// Build a zero-filled image of `32 KiB << rom_size_code` bytes with a valid header.
pub fn build_cart(kind: u8, rom_size_code: u8, ram_size_code: u8) -> Vec<u8> {
    let len = (32 * 1024) << rom_size_code.min(8);
    let mut rom = vec![0u8; len];
    rom[0x100..0x104].copy_from_slice(&[0x00, 0xC3, 0x50, 0x01]);
    rom[0x134..0x138].copy_from_slice(b"TEST");
    rom[0x147] = kind;
    rom[0x148] = rom_size_code;
    rom[0x149] = ram_size_code;
    rom[0x14D] = header_checksum(&rom);
    rom
}

/// ROM-only 32 KiB cartridge running `program` from 0x0150.
pub fn build_cart_with_program(program: &[u8]) -> Vec<u8> {
    let mut rom = build_cart(0x00, 0, 0);
    assert!(
        PROGRAM_START + program.len() <= rom.len(),
        "program does not fit in a 32 KiB image"
    );
    rom[PROGRAM_START..PROGRAM_START + program.len()].copy_from_slice(program);
    rom
}

// ---------------------------------------------------------------------------
// Fake module
// ---------------------------------------------------------------------------

/// First pointer the allocator hands out. Everything below stays zero.
pub const HEAP_BASE: u32 = 0x1000;

// Instance block layout.
const SCREEN_OFF: u32 = 0;
const BACKGROUND_OFF: u32 = SCREEN_OFF + 160 * 144;
const WINDOW_OFF: u32 = BACKGROUND_OFF + 256 * 256;
const SPRITES_OFF: u32 = WINDOW_OFF + 256 * 256;
const PATTERNS_OFF: u32 = SPRITES_OFF + 256 * 256;
const REGS_OFF: u32 = PATTERNS_OFF + 256 * 96;
const MMU_OFF: u32 = REGS_OFF + 16;
const TEXT_OFF: u32 = MMU_OFF + MMU_LEN;
const TEXT_CAP: u32 = 32;
pub const INSTANCE_SIZE: u32 = TEXT_OFF + TEXT_CAP;

const ENTRY_POINT: u16 = 0x0100;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FakeStats {
    pub mallocs: usize,
    pub frees: usize,
    pub allocs: usize,
    pub loads: usize,
    pub grows: usize,
    /// Every `step_cycles` request, in call order.
    pub cycle_requests: Vec<i32>,
    pub step_calls: usize,
    pub frame_calls: usize,
}

#[derive(Clone, Debug)]
struct FakeMachine {
    pc: u16,
    sp: u16,
    a: u8,
    f: u8,
    cart: Option<(u32, u32)>,
    breakpoint: i32,
    input: u8,
    frames: u32,
}

impl FakeMachine {
    fn new() -> Self {
        Self {
            pc: 0,
            sp: 0,
            a: 0,
            f: 0,
            cart: None,
            breakpoint: -1,
            input: 0,
            frames: 0,
        }
    }

    fn at_breakpoint(&self) -> bool {
        self.pc as i32 == self.breakpoint
    }
}

#[derive(Debug)]
pub struct FakeModule {
    memory: LinearMemory,
    heap_top: u32,
    heap_limit: u32,
    live: BTreeMap<u32, u32>,
    machines: HashMap<u32, FakeMachine>,
    stats: Rc<RefCell<FakeStats>>,
    geometry_override: Option<(Surface, u16, u16)>,
    forced_status: Option<i32>,
    pending_trap: Option<String>,
    load_trap: Option<String>,
    free_trap: Option<String>,
}

impl Default for FakeModule {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeModule {
    pub fn new() -> Self {
        Self {
            memory: LinearMemory::new(1),
            heap_top: HEAP_BASE,
            heap_limit: u32::MAX,
            live: BTreeMap::new(),
            machines: HashMap::new(),
            stats: Rc::default(),
            geometry_override: None,
            forced_status: None,
            pending_trap: None,
            load_trap: None,
            free_trap: None,
        }
    }

    /// Cap the heap at `bytes` past `HEAP_BASE`; allocations beyond return 0.
    pub fn with_heap_limit(mut self, bytes: u32) -> Self {
        self.heap_limit = HEAP_BASE + bytes;
        self
    }

    /// Report `width x height` for `surface` instead of the real geometry.
    pub fn with_geometry(mut self, surface: Surface, width: u16, height: u16) -> Self {
        self.geometry_override = Some((surface, width, height));
        self
    }

    /// Make the next `load` return `status` regardless of the image.
    pub fn force_load_status(&mut self, status: i32) {
        self.forced_status = Some(status);
    }

    /// Make the next stepping call trap with `message`.
    pub fn trap_next_step(&mut self, message: &str) {
        self.pending_trap = Some(message.to_string());
    }

    /// Make the next `load` trap before it reads the image.
    pub fn trap_next_load(&mut self, message: &str) {
        self.load_trap = Some(message.to_string());
    }

    /// Make the next `free` trap without releasing anything.
    pub fn trap_next_free(&mut self, message: &str) {
        self.free_trap = Some(message.to_string());
    }

    pub fn stats(&self) -> FakeStats {
        self.stats.borrow().clone()
    }

    /// Counters that stay readable after the module itself is gone.
    pub fn stats_handle(&self) -> Rc<RefCell<FakeStats>> {
        Rc::clone(&self.stats)
    }

    pub fn live_allocations(&self) -> usize {
        self.live.len()
    }

    pub fn live_bytes(&self) -> u64 {
        self.live.values().map(|len| *len as u64).sum()
    }

    pub fn machine_count(&self) -> usize {
        self.machines.len()
    }

    fn reserve(&mut self, size: u32) -> u32 {
        let ptr = self.heap_top.next_multiple_of(8);
        let end = ptr as u64 + size.max(1) as u64;
        if end > self.heap_limit as u64 || end > u32::MAX as u64 {
            return 0;
        }
        let have = self.memory.byte_len() as u64;
        if end > have {
            let pages = (end - have).div_ceil(PAGE_SIZE as u64) as usize;
            self.memory.grow(pages);
            self.stats.borrow_mut().grows += 1;
        }
        self.heap_top = end as u32;
        self.live.insert(ptr, size);
        ptr
    }

    fn machine(&mut self, instance: u32) -> CallResult<&mut FakeMachine> {
        self.machines
            .get_mut(&instance)
            .ok_or_else(|| Trap::new(format!("unknown instance {instance:#x}")))
    }

    fn take_trap(&mut self) -> CallResult<()> {
        match self.pending_trap.take() {
            Some(message) => Err(Trap::new(message)),
            None => Ok(()),
        }
    }

    fn validate(&mut self, image: &[u8]) -> i32 {
        if let Some(status) = self.forced_status.take() {
            return status;
        }
        if image.len() < 0x8000 || image.len() % 0x4000 != 0 {
            return 2;
        }
        let kind = image[0x147];
        let ram = image[0x149];
        if !matches!(kind, 0x00..=0x03 | 0x19..=0x1B) {
            return 1;
        }
        if ram > 5 || (kind == 0x00 && ram != 0) {
            return 3;
        }
        0
    }

    fn run_cycles(&mut self, instance: u32, budget: i32) -> CallResult<i32> {
        let memory = self.memory.clone();
        let m = self.machine(instance)?;
        if budget <= 0 {
            return Ok(0);
        }
        let mut total: i64 = 0;
        loop {
            total += exec(&memory, m) as i64;
            if total >= budget as i64 || m.at_breakpoint() {
                break;
            }
        }
        sync_registers(&memory, instance, m);
        Ok(total.min(i32::MAX as i64) as i32)
    }
}

fn fetch(memory: &LinearMemory, m: &FakeMachine, addr: u16) -> u8 {
    match m.cart {
        Some((ptr, len)) if (addr as u32) < len => memory.read_u8(ptr + addr as u32),
        _ => 0x00,
    }
}

/// Execute one instruction; returns its cycle cost.
fn exec(memory: &LinearMemory, m: &mut FakeMachine) -> u32 {
    let pc = m.pc;
    let op = fetch(memory, m, pc);
    match op {
        0xC3 => {
            let lo = fetch(memory, m, pc.wrapping_add(1));
            let hi = fetch(memory, m, pc.wrapping_add(2));
            m.pc = u16::from_le_bytes([lo, hi]);
            16
        }
        0x18 => {
            let offset = fetch(memory, m, pc.wrapping_add(1)) as i8;
            m.pc = pc.wrapping_add(2).wrapping_add_signed(offset as i16);
            12
        }
        0x3C => {
            m.a = m.a.wrapping_add(1);
            m.f = if m.a == 0 { 0x80 } else { 0x00 };
            m.pc = pc.wrapping_add(1);
            4
        }
        _ => {
            let len = OPCODES[op as usize].map_or(1, |o| o.len);
            m.pc = pc.wrapping_add(len as u16);
            4
        }
    }
}

fn sync_registers(memory: &LinearMemory, instance: u32, m: &FakeMachine) {
    let [sp_lo, sp_hi] = m.sp.to_le_bytes();
    let [pc_lo, pc_hi] = m.pc.to_le_bytes();
    let regs = [m.f, m.a, 0, 0, 0, 0, 0, 0, sp_lo, sp_hi, pc_lo, pc_hi];
    debug_assert_eq!(regs.len(), CPU_REGISTERS_LEN as usize);
    memory.write(instance + REGS_OFF, &regs);
}

impl VmModule for FakeModule {
    fn memory(&self) -> &LinearMemory {
        &self.memory
    }

    fn malloc(&mut self, size: u32) -> CallResult<u32> {
        let ptr = self.reserve(size);
        if ptr != 0 {
            self.stats.borrow_mut().mallocs += 1;
        }
        Ok(ptr)
    }

    fn free(&mut self, ptr: u32) -> CallResult<()> {
        if let Some(message) = self.free_trap.take() {
            return Err(Trap::new(message));
        }
        if self.live.remove(&ptr).is_none() {
            panic!("free of pointer {ptr:#x} that is not allocated");
        }
        self.machines.remove(&ptr);
        self.stats.borrow_mut().frees += 1;
        Ok(())
    }

    fn alloc(&mut self) -> CallResult<u32> {
        let ptr = self.reserve(INSTANCE_SIZE);
        if ptr != 0 {
            self.machines.insert(ptr, FakeMachine::new());
            self.stats.borrow_mut().allocs += 1;
        }
        Ok(ptr)
    }

    fn load(&mut self, instance: u32, cart: f64) -> CallResult<i32> {
        if let Some(message) = self.load_trap.take() {
            return Err(Trap::new(message));
        }
        let (ptr, len) = codec::decode(cart);
        let mut image = vec![0u8; len as usize];
        self.memory.read(ptr, &mut image);
        let status = self.validate(&image);

        let memory = self.memory.clone();
        let m = self.machine(instance)?;
        if status != 0 {
            m.cart = None;
            return Ok(status);
        }
        m.cart = Some((ptr, len));
        m.pc = ENTRY_POINT;
        m.sp = 0xFFFE;
        m.a = 0x01;
        m.f = 0xB0;
        m.frames = 0;
        memory.write(instance + MMU_OFF, &image[..0x8000]);
        sync_registers(&memory, instance, m);
        self.stats.borrow_mut().loads += 1;
        Ok(0)
    }

    fn step(&mut self, instance: u32) -> CallResult<i32> {
        self.take_trap()?;
        self.stats.borrow_mut().step_calls += 1;
        let memory = self.memory.clone();
        let m = self.machine(instance)?;
        let cycles = exec(&memory, m);
        sync_registers(&memory, instance, m);
        Ok(cycles as i32)
    }

    fn step_frames(&mut self, instance: u32, frames: i32) -> CallResult<i32> {
        self.take_trap()?;
        self.stats.borrow_mut().frame_calls += 1;
        let mut total = 0;
        for _ in 0..frames.max(0) {
            total += self.run_cycles(instance, CYCLES_PER_FRAME as i32)?;
            let memory = self.memory.clone();
            let m = self.machine(instance)?;
            m.frames += 1;
            let shade = (m.frames % 4) as u8;
            let hit = m.at_breakpoint();
            memory.write(instance + SCREEN_OFF, &[shade; 160 * 144]);
            if hit {
                break;
            }
        }
        Ok(total)
    }

    fn step_cycles(&mut self, instance: u32, cycles: i32) -> CallResult<i32> {
        self.take_trap()?;
        self.stats.borrow_mut().cycle_requests.push(cycles);
        self.run_cycles(instance, cycles)
    }

    fn step_ms(&mut self, instance: u32, ms: f64) -> CallResult<i32> {
        self.take_trap()?;
        let cycles = (ms * CLOCK_HZ as f64 / 1000.0) as i32;
        self.run_cycles(instance, cycles)
    }

    fn set_breakpoint(&mut self, instance: u32, addr: i32) -> CallResult<()> {
        self.machine(instance)?.breakpoint = addr;
        Ok(())
    }

    fn screen(&mut self, instance: u32) -> CallResult<f64> {
        self.surface(instance, Surface::Screen, SCREEN_OFF)
    }

    fn background(&mut self, instance: u32) -> CallResult<f64> {
        self.surface(instance, Surface::Background, BACKGROUND_OFF)
    }

    fn window(&mut self, instance: u32) -> CallResult<f64> {
        self.surface(instance, Surface::Window, WINDOW_OFF)
    }

    fn sprites(&mut self, instance: u32) -> CallResult<f64> {
        self.surface(instance, Surface::Sprites, SPRITES_OFF)
    }

    fn patterns(&mut self, instance: u32) -> CallResult<f64> {
        self.surface(instance, Surface::Patterns, PATTERNS_OFF)
    }

    fn cpu_reg(&mut self, instance: u32) -> CallResult<f64> {
        self.machine(instance)?;
        Ok(codec::encode(instance + REGS_OFF, CPU_REGISTERS_LEN))
    }

    fn mmu(&mut self, instance: u32) -> CallResult<f64> {
        self.machine(instance)?;
        Ok(codec::encode(instance + MMU_OFF, MMU_LEN))
    }

    fn disassemble(&mut self, instance: u32) -> CallResult<f64> {
        let memory = self.memory.clone();
        let m: &FakeMachine = self.machine(instance)?;
        let bytes: Vec<u8> = (0..3u16)
            .map(|i| fetch(&memory, m, m.pc.wrapping_add(i)))
            .collect();
        let text = disasm::decode(&bytes).map(|(t, _)| t).unwrap_or_default();
        let len = text.len().min(TEXT_CAP as usize);
        memory.write(instance + TEXT_OFF, &text.as_bytes()[..len]);
        Ok(codec::encode(instance + TEXT_OFF, len as u32))
    }

    fn input_press(&mut self, instance: u32, mask: u8) -> CallResult<u8> {
        let m = self.machine(instance)?;
        m.input |= mask;
        Ok(m.input)
    }

    fn input_release(&mut self, instance: u32, mask: u8) -> CallResult<u8> {
        let m = self.machine(instance)?;
        m.input &= !mask;
        Ok(m.input)
    }
}

impl FakeModule {
    fn surface(&mut self, instance: u32, surface: Surface, offset: u32) -> CallResult<f64> {
        self.machine(instance)?;
        let geometry = surface.geometry();
        let (width, height) = match self.geometry_override {
            Some((s, w, h)) if s == surface => (w, h),
            _ => (geometry.width, geometry.height),
        };
        Ok(codec::encode_matrix(instance + offset, width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_produce_valid_headers() {
        let rom = build_cart_with_program(&[0x3C, 0x18, 0xFD]);
        assert_eq!(rom.len(), 0x8000);
        assert_eq!(rom[0x14D], header_checksum(&rom));
        assert_eq!(&rom[0x150..0x153], &[0x3C, 0x18, 0xFD]);
    }

    #[test]
    fn allocator_grows_arena_and_tracks_blocks() {
        let mut module = FakeModule::new();
        let generation = module.memory().generation();
        let instance = module.alloc().expect("alloc");
        assert_eq!(instance, HEAP_BASE);
        assert!(module.memory().generation() > generation);
        assert!(module.memory().byte_len() >= (HEAP_BASE + INSTANCE_SIZE) as usize);

        let block = module.malloc(10).expect("malloc");
        assert_eq!(block % 8, 0);
        assert_eq!(module.live_allocations(), 2);
        module.free(block).expect("free");
        module.free(instance).expect("free");
        assert_eq!(module.live_allocations(), 0);
        assert_eq!(module.machine_count(), 0);
    }

    #[test]
    #[should_panic(expected = "not allocated")]
    fn double_free_panics() {
        let mut module = FakeModule::new();
        let ptr = module.malloc(4).expect("malloc");
        module.free(ptr).expect("free");
        let _ = module.free(ptr);
    }

    #[test]
    fn toy_cpu_loops_and_honors_breakpoint() {
        let mut module = FakeModule::new();
        let instance = module.alloc().expect("alloc");
        let rom = build_cart_with_program(&[0x3C, 0x18, 0xFD]); // INC A; JR -3
        let ptr = module.malloc(rom.len() as u32).expect("malloc");
        module.memory().write(ptr, &rom);
        let status = module
            .load(instance, codec::encode(ptr, rom.len() as u32))
            .expect("load");
        assert_eq!(status, 0);

        // NOP (4) + JP (16) reach 0x150.
        assert_eq!(module.step_cycles(instance, 20).expect("step"), 20);
        module.set_breakpoint(instance, 0x151).expect("bp");
        // INC A lands on the breakpoint after one instruction.
        assert_eq!(module.step_cycles(instance, 1000).expect("step"), 4);
        // Leaving a breakpoint always executes at least one instruction.
        assert_eq!(module.step_cycles(instance, 1000).expect("step"), 16);
    }

    #[test]
    fn validation_status_codes() {
        let mut module = FakeModule::new();
        assert_eq!(module.validate(&[0u8; 0x100]), 2);
        assert_eq!(module.validate(&build_cart(0xFC, 0, 0)), 1);
        assert_eq!(module.validate(&build_cart(0x00, 0, 2)), 3);
        assert_eq!(module.validate(&build_cart(0x01, 1, 0)), 0);
        module.force_load_status(9);
        assert_eq!(module.validate(&build_cart(0x00, 0, 0)), 9);
    }
}
