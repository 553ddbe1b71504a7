/// Descriptor allocation
///
/// A `DescriptorAllocator` owns one descriptor heap and hands out its slots in
/// order. Slots are never freed: the scene has a fixed descriptor count known
/// at load time.

use std::fmt;
use std::sync::{Arc, Weak};
use crate::engine_error;
use crate::error::{Error, Result};
use crate::graphics_device::{
    DescriptorHeap, DescriptorHeapDesc, DescriptorHeapKind, GraphicsDevice, ViewDesc,
};

// ===== DESCRIPTOR HANDLE =====

/// Slot of a descriptor heap
///
/// Holds a weak reference to the heap. Handle conversions fail once the heap
/// has been destroyed.
#[derive(Clone)]
pub struct DescriptorHandle {
    heap: Weak<dyn DescriptorHeap>,
    index: u32,
}

impl DescriptorHandle {
    /// Slot index, stable for the lifetime of the heap
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Returns true while the owning heap is alive
    pub fn is_valid(&self) -> bool {
        self.heap.strong_count() > 0
    }

    /// CPU handle used to write or copy the view
    pub fn cpu_handle(&self) -> Result<u64> {
        let heap = self.upgrade()?;
        Ok(heap.cpu_start() + self.index as u64 * heap.increment_size() as u64)
    }

    /// GPU handle used to bind the view as the start of a descriptor table
    pub fn gpu_handle(&self) -> Result<u64> {
        let heap = self.upgrade()?;
        let start = heap.gpu_start().ok_or_else(|| {
            Error::InvalidResource(format!(
                "{:?} heap is not shader visible",
                heap.desc().kind
            ))
        })?;
        Ok(start + self.index as u64 * heap.increment_size() as u64)
    }

    fn upgrade(&self) -> Result<Arc<dyn DescriptorHeap>> {
        self.heap.upgrade().ok_or_else(|| {
            Error::InvalidResource(format!("Descriptor {} outlived its heap", self.index))
        })
    }
}

impl fmt::Debug for DescriptorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorHandle")
            .field("index", &self.index)
            .field("valid", &self.is_valid())
            .finish()
    }
}

// ===== DESCRIPTOR ALLOCATOR =====

/// Bump allocator over one descriptor heap
pub struct DescriptorAllocator {
    heap: Arc<dyn DescriptorHeap>,
    next: u32,
}

impl DescriptorAllocator {
    /// Create a heap of `kind` with `capacity` slots
    pub fn new(device: &dyn GraphicsDevice, kind: DescriptorHeapKind, capacity: u32) -> Result<Self> {
        let heap = device.create_descriptor_heap(&DescriptorHeapDesc { kind, capacity })?;
        Ok(Self::from_heap(heap))
    }

    /// Allocate from an existing, unused heap
    pub fn from_heap(heap: Arc<dyn DescriptorHeap>) -> Self {
        Self { heap, next: 0 }
    }

    /// Write `view` into the next free slot
    ///
    /// # Errors
    ///
    /// * `InvalidResource` if the view does not belong in this heap kind
    /// * `DescriptorHeapFull` if every slot is taken
    pub fn create_descriptor(&mut self, view: &ViewDesc<'_>) -> Result<DescriptorHandle> {
        let desc = *self.heap.desc();

        if view.heap_kind() != desc.kind {
            engine_error!("prism::DescriptorAllocator",
                "Cannot write a {} view into a {:?} heap", view.label(), desc.kind);
            return Err(Error::InvalidResource(format!(
                "{} view does not fit a {:?} heap",
                view.label(),
                desc.kind
            )));
        }

        if self.next >= desc.capacity {
            engine_error!("prism::DescriptorAllocator",
                "{:?} heap exhausted ({} slots)", desc.kind, desc.capacity);
            return Err(Error::DescriptorHeapFull {
                kind: desc.kind,
                capacity: desc.capacity,
            });
        }

        let index = self.next;
        self.heap.write_view(index, view)?;
        self.next += 1;

        Ok(DescriptorHandle {
            heap: Arc::downgrade(&self.heap),
            index,
        })
    }

    pub fn heap(&self) -> &Arc<dyn DescriptorHeap> {
        &self.heap
    }

    pub fn kind(&self) -> DescriptorHeapKind {
        self.heap.desc().kind
    }

    pub fn capacity(&self) -> u32 {
        self.heap.desc().capacity
    }

    /// Number of slots handed out so far
    pub fn allocated(&self) -> u32 {
        self.next
    }

    pub fn remaining(&self) -> u32 {
        self.capacity() - self.next
    }

    /// Hand slots `allocated..` out again
    ///
    /// Handles into the released range keep their index and see whatever
    /// view is written there next, so callers must drop them first.
    ///
    /// # Errors
    ///
    /// `InvalidResource` if `allocated` is past the current allocation count
    pub fn rewind(&mut self, allocated: u32) -> Result<()> {
        if allocated > self.next {
            engine_error!("prism::DescriptorAllocator",
                "Cannot rewind {:?} heap to {} ({} allocated)", self.kind(), allocated, self.next);
            return Err(Error::InvalidResource(format!(
                "Rewind to {} past the {} allocated descriptors",
                allocated, self.next
            )));
        }
        self.next = allocated;
        Ok(())
    }
}

#[cfg(test)]
#[path = "descriptor_allocator_tests.rs"]
mod tests;
