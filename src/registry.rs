//! Purpose: Generation-checked handle table for sessions exposed as opaque native contexts.
//! Exports: `SessionTable`, `SessionHandle`.
//! Role: Maps the host's `void*` context back to a live session without trusting the pointer.
//! Invariants: A handle is never null; removal bumps the slot generation so stale handles miss.
//! Invariants: Slots are reused; the table never dereferences the raw context value.
use std::ffi::c_void;
use std::ptr;

const HALF_BITS: u32 = usize::BITS / 2;
const INDEX_MASK: usize = (1usize << HALF_BITS) - 1;
const MAX_GENERATION: usize = INDEX_MASK;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct SessionHandle(usize);

impl SessionHandle {
    fn new(index: usize, generation: usize) -> Self {
        SessionHandle((generation << HALF_BITS) | (index + 1))
    }

    /// Rejects null; anything else is only a candidate until looked up.
    pub fn from_ptr(context: *mut c_void) -> Option<Self> {
        let raw = context.addr();
        if raw & INDEX_MASK == 0 {
            return None;
        }
        Some(SessionHandle(raw))
    }

    pub fn into_ptr(self) -> *mut c_void {
        ptr::without_provenance_mut(self.0)
    }

    fn index(self) -> usize {
        (self.0 & INDEX_MASK) - 1
    }

    fn generation(self) -> usize {
        self.0 >> HALF_BITS
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: usize,
    value: Option<T>,
}

#[derive(Debug)]
pub struct SessionTable<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    len: usize,
}

impl<T> Default for SessionTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SessionTable<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores `value`; hands it back when every index is taken.
    pub fn insert(&mut self, value: T) -> Result<SessionHandle, T> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let index = self.slots.len();
                if index >= INDEX_MASK {
                    return Err(value);
                }
                self.slots.push(Slot {
                    generation: 0,
                    value: None,
                });
                index
            }
        };
        let slot = &mut self.slots[index];
        slot.value = Some(value);
        self.len += 1;
        Ok(SessionHandle::new(index, slot.generation))
    }

    pub fn get(&self, handle: SessionHandle) -> Option<&T> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn remove(&mut self, handle: SessionHandle) -> Option<T> {
        let index = handle.index();
        let slot = self.slots.get_mut(index)?;
        if slot.generation != handle.generation() {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = if slot.generation >= MAX_GENERATION {
            0
        } else {
            slot.generation + 1
        };
        self.free.push(index);
        self.len -= 1;
        Some(value)
    }
}
