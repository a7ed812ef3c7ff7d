#![doc = r#"
dmg-host library crate.

Host-side bridge between an application and a Game Boy (DMG) emulator core
compiled as a separate module with a numeric-only ABI. The crate owns the
module's memory protocol and exposes typed, generation-safe views, the VM
lifecycle, input, a cooperative real-time scheduler and a disassembler.

Modules:
- codec: packs (ptr, len) and (ptr, width, height) into one f64 bit pattern
- memory: linear-memory arena, live views, matrix views, owned clones
- module: the `VmModule` trait mirroring the core's exports
- vm: `VmHandle` (load, views, stepping, breakpoints, input) and hardware constants
- input: button set and input mask
- signal: change notification
- scheduler: wall-clock paced run/pause over host clock and tick driver traits
- disasm: SM83 decoder and restartable cartridge listing
- cartridge: ROM header inspection
- screenshot: palette conversion and PNG export (feature `screenshot`)
- error: load, resource and trap errors

In tests, the fake module and cartridge builders live under `crate::test_utils`.
"#]

pub mod cartridge;
pub mod codec;
pub mod disasm;
pub mod error;
pub mod input;
pub mod memory;
pub mod module;
pub mod scheduler;
pub mod signal;
pub mod vm;

#[cfg(feature = "screenshot")]
pub mod screenshot;

// Re-export commonly used types at the crate root for convenience.
pub use cartridge::{CartridgeHeader, CartridgeKind};
pub use disasm::{Disassembly, Instruction};
pub use error::{BridgeError, LoadError, Result, Trap};
pub use input::{Button, InputMask};
pub use memory::{LinearMemory, MatrixView, MemoryView, OwnedView};
pub use module::VmModule;
pub use scheduler::{Mode, Scheduler, SchedulerConfig, TickOutcome};
pub use signal::ChangeSignal;
pub use vm::VmHandle;

// Shared test utilities (only compiled for tests)
#[cfg(test)]
pub mod test_utils;
