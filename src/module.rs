/*!
The VM module's numeric ABI.

The emulated machine lives inside a separately compiled module whose exports
only accept and return 32-bit integers and 64-bit floats. `VmModule` mirrors
those exports one-to-one so the rest of the crate can be written against a
trait and driven by any embedding (a wasm runtime, an in-process core, or the
fake module used by the tests).

Conventions:
- Pointers are byte offsets into [`VmModule::memory`].
- `malloc`/`alloc` return 0 when the module is out of memory.
- Calls returning `f64` return an encoded scalar (see [`crate::codec`]):
  matrix surfaces use the matrix layout, everything else the pair layout.
- Every call may trap; a trap aborts the call and is surfaced as [`Trap`].
- Calls may grow the memory, replacing its backing buffer.
*/

use crate::error::Trap;
use crate::memory::LinearMemory;

pub type CallResult<T> = std::result::Result<T, Trap>;

pub trait VmModule {
    /// The module's linear memory object.
    fn memory(&self) -> &LinearMemory;

    // ---------------------------------------------------------------------
    // Allocation
    // ---------------------------------------------------------------------

    /// Allocate `size` bytes of module memory. Returns 0 when out of memory.
    fn malloc(&mut self, size: u32) -> CallResult<u32>;

    /// Release a block returned by `malloc` or `alloc`.
    fn free(&mut self, ptr: u32) -> CallResult<()>;

    /// Allocate a fresh VM instance. Returns 0 when out of memory.
    fn alloc(&mut self) -> CallResult<u32>;

    // ---------------------------------------------------------------------
    // Lifecycle and execution
    // ---------------------------------------------------------------------

    /// Load the cartridge image described by `cart` (encoded ptr+len).
    /// Returns a status code: 0 ok, 1 unsupported type, 2 invalid size,
    /// 3 invalid RAM configuration, anything else unknown.
    fn load(&mut self, instance: u32, cart: f64) -> CallResult<i32>;

    /// Execute one instruction. Returns cycles consumed.
    fn step(&mut self, instance: u32) -> CallResult<i32>;

    /// Execute `frames` display refreshes. Returns cycles consumed.
    fn step_frames(&mut self, instance: u32, frames: i32) -> CallResult<i32>;

    /// Execute up to `cycles` cycles, stopping early at the breakpoint.
    /// Returns cycles actually consumed.
    fn step_cycles(&mut self, instance: u32, cycles: i32) -> CallResult<i32>;

    /// Execute `ms` milliseconds of emulated time. Returns cycles consumed.
    fn step_ms(&mut self, instance: u32, ms: f64) -> CallResult<i32>;

    /// Set the breakpoint address; -1 disables it.
    fn set_breakpoint(&mut self, instance: u32, addr: i32) -> CallResult<()>;

    // ---------------------------------------------------------------------
    // Surfaces (encoded matrix scalars)
    // ---------------------------------------------------------------------

    fn screen(&mut self, instance: u32) -> CallResult<f64>;
    fn background(&mut self, instance: u32) -> CallResult<f64>;
    fn window(&mut self, instance: u32) -> CallResult<f64>;
    fn sprites(&mut self, instance: u32) -> CallResult<f64>;
    fn patterns(&mut self, instance: u32) -> CallResult<f64>;

    // ---------------------------------------------------------------------
    // Raw state (encoded pair scalars)
    // ---------------------------------------------------------------------

    fn cpu_reg(&mut self, instance: u32) -> CallResult<f64>;
    fn mmu(&mut self, instance: u32) -> CallResult<f64>;

    /// Disassemble the instruction at the current program counter.
    /// Returns an encoded pair pointing at UTF-8 text; a zero length means
    /// nothing could be decoded.
    fn disassemble(&mut self, instance: u32) -> CallResult<f64>;

    // ---------------------------------------------------------------------
    // Input
    // ---------------------------------------------------------------------

    /// Set the bits of `mask` in the instance's input byte. Returns the new byte.
    fn input_press(&mut self, instance: u32, mask: u8) -> CallResult<u8>;

    /// Clear the bits of `mask` in the instance's input byte. Returns the new byte.
    fn input_release(&mut self, instance: u32, mask: u8) -> CallResult<u8>;
}
