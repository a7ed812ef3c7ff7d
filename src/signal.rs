/*!
Change notification.

`ChangeSignal` fires after every operation that mutates VM state so observers
(display, register panel) can re-render without polling. The only guarantee a
listener gets is "something changed"; it reads whatever it needs afterwards.

Removal hands the listener back to the caller, so an owner can detach a
listener and later re-attach the same one.
*/

pub type Listener = Box<dyn FnMut()>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct ChangeSignal {
    listeners: Vec<(ListenerId, Listener)>,
    next_id: u64,
}

impl std::fmt::Debug for ChangeSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeSignal")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl ChangeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Detach a listener and return it. Order of the remaining listeners is not preserved.
    pub fn remove(&mut self, id: ListenerId) -> Option<Listener> {
        let index = self.listeners.iter().position(|(lid, _)| *lid == id)?;
        Some(self.listeners.swap_remove(index).1)
    }

    pub fn dispatch(&mut self) {
        for (_, listener) in self.listeners.iter_mut() {
            listener();
        }
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
