#![doc = r#"
Memory module: the VM's linear memory and the host's views into it.

Modules and responsibilities
- arena: `LinearMemory` (the module's memory object) and generation-stamped `ArenaBuffer`s.
- view: `MemoryView` (weak, self-reacquiring byte range) and `OwnedView` (cloned-in bytes, freed once).
- matrix: `MatrixView` (width x height pixel/tile surfaces).
"#]

pub mod arena;
pub mod matrix;
pub mod view;

pub use arena::{ArenaBuffer, LinearMemory, PAGE_SIZE};
pub use matrix::MatrixView;
pub use view::{MemoryView, OwnedView};
