/*!
VM handle: one emulated machine inside a `VmModule`.

`VmHandle` owns the module and one machine instance allocated in it. It is the
only place that talks to the module's exports directly; everything it returns
is either a plain value or a live view into module memory.

Lifecycle:
- `create` allocates the instance. A zero pointer is an out-of-memory failure.
- `load` clones the cartridge into module memory, frees the previous clone
  first, and keeps the new clone alive for as long as the VM may read it.
  A non-zero load status frees the new clone too and leaves no cartridge.
  An empty image is rejected up front and leaves the previous one in place.
- Stepping requires a cartridge. Before the first load, and after a failed
  one, every stepping call returns `BridgeError::NotLoaded` without reaching
  the module, whose instance may still reference a freed clone.
- `dealloc` frees the cartridge clone and the instance and gives the module
  back. There is no `Drop` impl: releasing module memory can trap, and that
  failure must reach the caller.

Every mutating call (`load`, stepping, breakpoints, input) dispatches the
handle's [`ChangeSignal`] once on success.
*/

pub mod hardware;
pub mod mmu;
pub mod registers;


use std::rc::Rc;

use crate::cartridge::CartridgeHeader;
use crate::codec;
use crate::disasm::Disassembly;
use crate::error::{BridgeError, LoadError, Result};
use crate::input::{Button, InputMask};
use crate::memory::{MatrixView, MemoryView, OwnedView};
use crate::module::VmModule;
use crate::signal::ChangeSignal;

pub use hardware::{
    CLOCK_HZ, CPU_REGISTERS_LEN, CYCLES_PER_FRAME, Geometry, MMU_LEN, Surface,
};
pub use mmu::{MMU_SEGMENTS, MmuView, Segment, segment_of};
pub use registers::{CpuFlags, CpuView, Registers};

/// Breakpoint value meaning "no breakpoint".
pub const NO_BREAKPOINT: i32 = -1;

#[derive(Debug)]
struct LoadedCart {
    clone: OwnedView,
    image: Rc<[u8]>,
    header: Option<CartridgeHeader>,
}

#[derive(Debug)]
pub struct VmHandle<M: VmModule> {
    module: M,
    instance: u32,
    cart: Option<LoadedCart>,
    breakpoint: i32,
    input: InputMask,
    changed: ChangeSignal,
}

impl<M: VmModule> VmHandle<M> {
    /// Allocate a machine instance inside `module`.
    pub fn create(mut module: M) -> Result<Self> {
        let instance = module.alloc()?;
        if instance == 0 {
            tracing::warn!("vm instance allocation failed");
            return Err(BridgeError::OutOfMemory { requested: 0 });
        }
        tracing::debug!(instance, "vm instance allocated");
        Ok(Self {
            module,
            instance,
            cart: None,
            breakpoint: NO_BREAKPOINT,
            input: InputMask::empty(),
            changed: ChangeSignal::new(),
        })
    }

    /// `create` followed by `load`. On load failure the instance is freed
    /// and the load error is returned.
    pub fn boot(module: M, cart: &[u8]) -> Result<Self> {
        let mut vm = Self::create(module)?;
        if let Err(err) = vm.load(cart) {
            if let Err(cleanup) = vm.dealloc() {
                tracing::warn!(error = %cleanup, "releasing vm after failed boot");
            }
            return Err(err);
        }
        Ok(vm)
    }

    #[inline]
    pub fn module(&self) -> &M {
        &self.module
    }

    #[inline]
    pub fn module_mut(&mut self) -> &mut M {
        &mut self.module
    }

    #[inline]
    pub fn instance(&self) -> u32 {
        self.instance
    }

    #[inline]
    pub fn changed(&self) -> &ChangeSignal {
        &self.changed
    }

    #[inline]
    pub fn changed_mut(&mut self) -> &mut ChangeSignal {
        &mut self.changed
    }

    /// Load a cartridge image, replacing the current one.
    ///
    /// The previous clone is released before the VM sees the new image; on a
    /// rejected image the VM is left with no cartridge.
    pub fn load(&mut self, cart: &[u8]) -> Result<()> {
        if cart.is_empty() {
            tracing::warn!("cartridge rejected: empty image");
            return Err(LoadError::InvalidSize.into());
        }
        if let Some(previous) = self.cart.take() {
            previous.clone.release(&mut self.module)?;
        }

        let clone = OwnedView::clone_into(&mut self.module, cart)?;
        let encoded = codec::encode(clone.ptr(), clone.len() as u32);
        let status = match self.module.load(self.instance, encoded) {
            Ok(status) => status,
            Err(trap) => {
                clone.release(&mut self.module)?;
                return Err(trap.into());
            }
        };

        if let Some(err) = LoadError::from_status(status) {
            clone.release(&mut self.module)?;
            tracing::warn!(status, len = cart.len(), "cartridge rejected: {err}");
            return Err(err.into());
        }

        let header = match CartridgeHeader::parse(cart) {
            Ok(header) => {
                tracing::info!(
                    title = %header.title,
                    kind = %header.kind,
                    rom_bytes = ?header.rom_bytes,
                    ram_bytes = ?header.ram_bytes,
                    "cartridge loaded"
                );
                Some(header)
            }
            Err(err) => {
                tracing::info!(len = cart.len(), "cartridge loaded without a usable header: {err}");
                None
            }
        };

        self.cart = Some(LoadedCart {
            clone,
            image: Rc::from(cart),
            header,
        });
        self.changed.dispatch();
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.cart.is_some()
    }

    /// Host copy of the loaded cartridge image.
    pub fn cart(&self) -> Option<&[u8]> {
        self.cart.as_ref().map(|c| &*c.image)
    }

    /// Live view of the cartridge clone inside module memory.
    pub fn cart_view(&self) -> Option<&MemoryView> {
        self.cart.as_ref().map(|c| c.clone.view())
    }

    pub fn header(&self) -> Option<&CartridgeHeader> {
        self.cart.as_ref().and_then(|c| c.header.as_ref())
    }

    // ---------------------------------------------------------------------
    // Views
    // ---------------------------------------------------------------------

    pub fn surface(&mut self, surface: Surface) -> Result<MatrixView> {
        let encoded = match surface {
            Surface::Screen => self.module.screen(self.instance)?,
            Surface::Background => self.module.background(self.instance)?,
            Surface::Window => self.module.window(self.instance)?,
            Surface::Sprites => self.module.sprites(self.instance)?,
            Surface::Patterns => self.module.patterns(self.instance)?,
        };
        let (ptr, width, height) = codec::decode_matrix(encoded);
        let expected = surface.geometry();
        assert_eq!(
            Geometry::new(width, height),
            expected,
            "vm reported unexpected {} geometry",
            surface.name()
        );
        Ok(MatrixView::new(self.module.memory(), ptr, width, height))
    }

    pub fn screen(&mut self) -> Result<MatrixView> {
        self.surface(Surface::Screen)
    }

    pub fn background(&mut self) -> Result<MatrixView> {
        self.surface(Surface::Background)
    }

    pub fn window(&mut self) -> Result<MatrixView> {
        self.surface(Surface::Window)
    }

    pub fn sprites(&mut self) -> Result<MatrixView> {
        self.surface(Surface::Sprites)
    }

    pub fn patterns(&mut self) -> Result<MatrixView> {
        self.surface(Surface::Patterns)
    }

    pub fn cpu(&mut self) -> Result<CpuView> {
        let (ptr, len) = codec::decode(self.module.cpu_reg(self.instance)?);
        Ok(CpuView::new(MemoryView::new(self.module.memory(), ptr, len)))
    }

    pub fn mmu(&mut self) -> Result<MmuView> {
        let (ptr, len) = codec::decode(self.module.mmu(self.instance)?);
        Ok(MmuView::new(MemoryView::new(self.module.memory(), ptr, len)))
    }

    // ---------------------------------------------------------------------
    // Execution
    // ---------------------------------------------------------------------

    /// Set the single breakpoint; `NO_BREAKPOINT` clears it.
    pub fn set_breakpoint(&mut self, addr: i32) -> Result<()> {
        self.module.set_breakpoint(self.instance, addr)?;
        self.breakpoint = addr;
        self.changed.dispatch();
        Ok(())
    }

    pub fn clear_breakpoint(&mut self) -> Result<()> {
        self.set_breakpoint(NO_BREAKPOINT)
    }

    /// Current breakpoint address, if one is set.
    pub fn breakpoint(&self) -> Option<u16> {
        u16::try_from(self.breakpoint).ok()
    }

    /// Whether the program counter sits on the breakpoint.
    pub fn at_breakpoint(&mut self) -> Result<bool> {
        match self.breakpoint() {
            Some(addr) => Ok(self.cpu()?.pc() == addr),
            None => Ok(false),
        }
    }

    /// Execute one instruction. Returns the cycles consumed.
    pub fn step(&mut self) -> Result<u32> {
        self.require_loaded()?;
        let cycles = self.module.step(self.instance)?;
        self.stepped(cycles)
    }

    pub fn step_frames(&mut self, frames: u16) -> Result<u32> {
        self.require_loaded()?;
        let cycles = self.module.step_frames(self.instance, frames as i32)?;
        self.stepped(cycles)
    }

    pub fn step_frame(&mut self) -> Result<u32> {
        self.step_frames(1)
    }

    /// Run up to `cycles` CPU cycles, stopping early on the breakpoint.
    pub fn step_cycles(&mut self, cycles: u32) -> Result<u32> {
        self.require_loaded()?;
        let requested = i32::try_from(cycles).unwrap_or(i32::MAX);
        let consumed = self.module.step_cycles(self.instance, requested)?;
        self.stepped(consumed)
    }

    pub fn step_ms(&mut self, ms: f64) -> Result<u32> {
        self.require_loaded()?;
        let consumed = self.module.step_ms(self.instance, ms)?;
        self.stepped(consumed)
    }

    fn require_loaded(&self) -> Result<()> {
        if self.cart.is_none() {
            return Err(BridgeError::NotLoaded);
        }
        Ok(())
    }

    fn stepped(&mut self, cycles: i32) -> Result<u32> {
        assert!(cycles >= 0, "vm reported negative cycle count {cycles}");
        self.changed.dispatch();
        Ok(cycles as u32)
    }

    // ---------------------------------------------------------------------
    // Input
    // ---------------------------------------------------------------------

    /// Last input state reported by the VM.
    #[inline]
    pub fn input(&self) -> InputMask {
        self.input
    }

    pub fn press(&mut self, buttons: impl Into<InputMask>) -> Result<InputMask> {
        let raw = self.module.input_press(self.instance, buttons.into().bits())?;
        self.input_changed(raw)
    }

    pub fn release(&mut self, buttons: impl Into<InputMask>) -> Result<InputMask> {
        let raw = self.module.input_release(self.instance, buttons.into().bits())?;
        self.input_changed(raw)
    }

    pub fn release_all(&mut self) -> Result<InputMask> {
        self.release(InputMask::all())
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.input.is_pressed(button)
    }

    fn input_changed(&mut self, raw: u8) -> Result<InputMask> {
        self.input = InputMask::from_bits_retain(raw);
        self.changed.dispatch();
        Ok(self.input)
    }

    // ---------------------------------------------------------------------
    // Disassembly
    // ---------------------------------------------------------------------

    /// Host-side listing of the loaded cartridge, if any.
    pub fn disassembly(&self) -> Option<Disassembly> {
        self.cart
            .as_ref()
            .map(|c| Disassembly::new(Rc::clone(&c.image)))
    }

    /// The VM's own rendering of the instruction at the program counter.
    pub fn disassemble_at_pc(&mut self) -> Result<Option<String>> {
        let (ptr, len) = codec::decode(self.module.disassemble(self.instance)?);
        if len == 0 {
            return Ok(None);
        }
        let view = MemoryView::new(self.module.memory(), ptr, len);
        Ok(Some(view.with(|bytes| String::from_utf8_lossy(bytes).into_owned())))
    }

    // ---------------------------------------------------------------------
    // Teardown
    // ---------------------------------------------------------------------

    /// Free the cartridge clone and the instance, returning the module.
    ///
    /// The instance is freed even when releasing the clone fails; the first
    /// failure is returned.
    pub fn dealloc(mut self) -> Result<M> {
        self.changed.clear();
        let released = match self.cart.take() {
            Some(cart) => cart.clone.release(&mut self.module),
            None => Ok(()),
        };
        let freed = self.module.free(self.instance).map_err(BridgeError::from);
        released.and(freed)?;
        tracing::debug!(instance = self.instance, "vm instance freed");
        Ok(self.module)
    }
}
