//! Managed heap of object records.
//!
//! This module provides [`ManagedHeap`], a handle-based arena for object instances.
//! Each object is a fixed-size record: its type token and one [`Value`] per field of
//! the type's layout. The runtime intrinsics that normally live inside a garbage
//! collector are explicit operations here:
//!
//! - [`ManagedHeap::memberwise_clone`] copies a record into a new object
//! - [`ManagedHeap::bitwise_equals`] compares two value-type records field by field
//! - [`ManagedHeap::identity_hash`] hashes an object by identity
//!
//! # Interior Mutability
//!
//! The heap uses interior mutability via `RwLock` so that accessors take `&self`
//! and the heap can be shared by every method body running against a
//! [`RuntimeContext`](crate::runtime::RuntimeContext).
//!
//! # Memory Limits
//!
//! The heap enforces a configurable maximum size. Allocation attempts that
//! would exceed this limit return [`Error::HeapMemoryLimitExceeded`].
//!
//! # Object References
//!
//! Objects are referenced via [`HeapRef`], an opaque handle that contains an
//! internal ID. References remain valid for the lifetime of the heap (no garbage
//! collection is simulated).

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        RwLock,
    },
};

use crate::{
    metadata::token::Token,
    runtime::value::{mix64, HeapRef, Value},
    Error, Result,
};

/// Fixed per-object overhead used for size accounting
const OBJECT_HEADER_BYTES: usize = 16;

/// Size accounted per field slot
const FIELD_SLOT_BYTES: usize = 16;

/// An object record stored on the heap.
#[derive(Clone, Debug, PartialEq)]
pub struct HeapObject {
    /// Token of the object's runtime type
    pub type_token: Token,
    /// Field values, in layout order
    pub fields: Vec<Value>,
    /// True for boxed value types
    pub is_value_type: bool,
}

impl HeapObject {
    /// Estimated size in bytes
    #[must_use]
    pub fn estimated_size(&self) -> usize {
        OBJECT_HEADER_BYTES + self.fields.len() * FIELD_SLOT_BYTES
    }
}

struct HeapState {
    objects: HashMap<u64, HeapObject>,
}

/// Handle-based object heap with a size budget.
pub struct ManagedHeap {
    /// Internal state protected by RwLock.
    state: RwLock<HeapState>,
    /// Next reference ID to allocate (atomic for lock-free allocation IDs).
    next_id: AtomicU64,
    /// Current estimated heap size in bytes (atomic for lock-free reads).
    current_size: AtomicUsize,
    /// Maximum allowed heap size in bytes.
    max_size: usize,
}

impl ManagedHeap {
    /// Creates a new managed heap with the given size limit.
    ///
    /// # Arguments
    ///
    /// * `max_size` - Maximum heap size in bytes
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        ManagedHeap {
            state: RwLock::new(HeapState {
                objects: HashMap::new(),
            }),
            next_id: AtomicU64::new(1),
            current_size: AtomicUsize::new(0),
            max_size,
        }
    }

    fn check_allocation(&self, size: usize) -> Result<()> {
        let current = self.current_size.load(Ordering::Relaxed);
        if current + size > self.max_size {
            return Err(Error::HeapMemoryLimitExceeded {
                current,
                limit: self.max_size,
            });
        }
        Ok(())
    }

    fn alloc_internal(&self, object: HeapObject) -> Result<HeapRef> {
        let size = object.estimated_size();
        self.check_allocation(size)?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        write_lock!(self.state).objects.insert(id, object);
        self.current_size.fetch_add(size, Ordering::Relaxed);

        Ok(HeapRef::new(id))
    }

    /// Allocates an object with the given field values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HeapMemoryLimitExceeded`] if the heap is out of memory.
    pub fn alloc_object(
        &self,
        type_token: Token,
        fields: Vec<Value>,
        is_value_type: bool,
    ) -> Result<HeapRef> {
        self.alloc_internal(HeapObject {
            type_token,
            fields,
            is_value_type,
        })
    }

    /// Gets a clone of an object record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeapReference`] if the reference is invalid.
    pub fn get(&self, heap_ref: HeapRef) -> Result<HeapObject> {
        read_lock!(self.state)
            .objects
            .get(&heap_ref.id())
            .cloned()
            .ok_or(Error::InvalidHeapReference(heap_ref.id()))
    }

    /// Returns the runtime type of an object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeapReference`] if the reference is invalid.
    pub fn type_of(&self, heap_ref: HeapRef) -> Result<Token> {
        read_lock!(self.state)
            .objects
            .get(&heap_ref.id())
            .map(|object| object.type_token)
            .ok_or(Error::InvalidHeapReference(heap_ref.id()))
    }

    /// Reads a field by layout index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeapReference`] for invalid references and
    /// [`Error::ArgumentOutOfRange`] for indices beyond the layout.
    pub fn get_field(&self, heap_ref: HeapRef, index: usize) -> Result<Value> {
        let state = read_lock!(self.state);
        let object = state
            .objects
            .get(&heap_ref.id())
            .ok_or(Error::InvalidHeapReference(heap_ref.id()))?;
        object.fields.get(index).cloned().ok_or_else(|| {
            out_of_range!(
                "index",
                "field {} of an object with {} fields",
                index,
                object.fields.len()
            )
        })
    }

    /// Writes a field by layout index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeapReference`] for invalid references and
    /// [`Error::ArgumentOutOfRange`] for indices beyond the layout.
    pub fn set_field(&self, heap_ref: HeapRef, index: usize, value: Value) -> Result<()> {
        let mut state = write_lock!(self.state);
        let object = state
            .objects
            .get_mut(&heap_ref.id())
            .ok_or(Error::InvalidHeapReference(heap_ref.id()))?;
        let count = object.fields.len();
        match object.fields.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(out_of_range!(
                "index",
                "field {} of an object with {} fields",
                index,
                count
            )),
        }
    }

    /// Creates a shallow copy of an object.
    ///
    /// Field values are copied as-is: references in the clone point at the same
    /// objects as the original.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeapReference`] if the reference is invalid and
    /// [`Error::HeapMemoryLimitExceeded`] if the heap is out of memory.
    pub fn memberwise_clone(&self, heap_ref: HeapRef) -> Result<HeapRef> {
        let copy = self.get(heap_ref)?;
        self.alloc_internal(copy)
    }

    /// Compares two records of the same value type field by field.
    ///
    /// Primitive fields compare by bit pattern, reference fields by identity.
    /// Records of different types are never equal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeapReference`] if either reference is invalid.
    pub fn bitwise_equals(&self, left: HeapRef, right: HeapRef) -> Result<bool> {
        if left == right {
            return Ok(true);
        }

        let state = read_lock!(self.state);
        let a = state
            .objects
            .get(&left.id())
            .ok_or(Error::InvalidHeapReference(left.id()))?;
        let b = state
            .objects
            .get(&right.id())
            .ok_or(Error::InvalidHeapReference(right.id()))?;

        Ok(a.type_token == b.type_token
            && a.fields.len() == b.fields.len()
            && a.fields
                .iter()
                .zip(&b.fields)
                .all(|(x, y)| x.identity_eq(y)))
    }

    /// Identity hash of an object, stable for the heap's lifetime.
    ///
    /// `seed` is the process hash seed, so hashes differ between runs.
    #[must_use]
    pub fn identity_hash(&self, heap_ref: HeapRef, seed: u64) -> i32 {
        mix64(heap_ref.id() ^ seed) as i32
    }

    /// Checks if a reference is valid.
    #[must_use]
    pub fn contains(&self, heap_ref: HeapRef) -> bool {
        read_lock!(self.state).objects.contains_key(&heap_ref.id())
    }

    /// Returns the current estimated heap size in bytes.
    #[must_use]
    pub fn current_size(&self) -> usize {
        self.current_size.load(Ordering::Relaxed)
    }

    /// Returns the maximum heap size in bytes.
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Returns the number of live objects.
    #[must_use]
    pub fn object_count(&self) -> usize {
        read_lock!(self.state).objects.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point_type() -> Token {
        Token::type_def(0x10)
    }

    #[test]
    fn test_heap_alloc_and_fields() {
        let heap = ManagedHeap::new(1024 * 1024);
        let point = heap
            .alloc_object(point_type(), vec![Value::I32(1), Value::I32(2)], true)
            .unwrap();

        assert!(heap.contains(point));
        assert_eq!(heap.type_of(point).unwrap(), point_type());
        assert_eq!(heap.get_field(point, 1).unwrap(), Value::I32(2));

        heap.set_field(point, 0, Value::I32(10)).unwrap();
        assert_eq!(heap.get_field(point, 0).unwrap(), Value::I32(10));

        // Out of bounds
        assert!(matches!(
            heap.get_field(point, 2),
            Err(Error::ArgumentOutOfRange { .. })
        ));
        assert!(heap.set_field(point, 5, Value::Null).is_err());
    }

    #[test]
    fn test_heap_invalid_reference() {
        let heap = ManagedHeap::new(1024);
        let bogus = HeapRef::new(99);
        assert!(matches!(
            heap.get(bogus),
            Err(Error::InvalidHeapReference(99))
        ));
        assert!(heap.type_of(bogus).is_err());
    }

    #[test]
    fn test_heap_memory_limit() {
        let heap = ManagedHeap::new(40);
        heap.alloc_object(point_type(), vec![Value::I32(0)], false)
            .unwrap();
        let result = heap.alloc_object(point_type(), vec![Value::I32(0)], false);
        assert!(matches!(
            result,
            Err(Error::HeapMemoryLimitExceeded {
                current: 32,
                limit: 40
            })
        ));
        assert_eq!(heap.object_count(), 1);
    }

    #[test]
    fn test_heap_memberwise_clone_is_shallow() {
        let heap = ManagedHeap::new(1024 * 1024);
        let inner = heap.alloc_object(point_type(), vec![], false).unwrap();
        let outer = heap
            .alloc_object(point_type(), vec![Value::ObjectRef(inner), Value::I32(5)], false)
            .unwrap();

        let copy = heap.memberwise_clone(outer).unwrap();
        assert_ne!(copy, outer);
        assert_eq!(heap.get_field(copy, 0).unwrap(), Value::ObjectRef(inner));

        heap.set_field(copy, 1, Value::I32(6)).unwrap();
        assert_eq!(heap.get_field(outer, 1).unwrap(), Value::I32(5));
    }

    #[test]
    fn test_heap_bitwise_equals() {
        let heap = ManagedHeap::new(1024 * 1024);
        let a = heap
            .alloc_object(point_type(), vec![Value::F64(f64::NAN), Value::I32(1)], true)
            .unwrap();
        let b = heap.memberwise_clone(a).unwrap();
        assert!(heap.bitwise_equals(a, b).unwrap());

        heap.set_field(b, 1, Value::I32(2)).unwrap();
        assert!(!heap.bitwise_equals(a, b).unwrap());

        let other_type = heap
            .alloc_object(
                Token::type_def(0x11),
                vec![Value::F64(f64::NAN), Value::I32(1)],
                true,
            )
            .unwrap();
        assert!(!heap.bitwise_equals(a, other_type).unwrap());
    }

    #[test]
    fn test_heap_identity_hash_depends_on_seed() {
        let heap = ManagedHeap::new(1024);
        let object = heap.alloc_object(point_type(), vec![], false).unwrap();
        assert_eq!(
            heap.identity_hash(object, 1),
            heap.identity_hash(object, 1)
        );
        assert_ne!(
            heap.identity_hash(object, 1),
            heap.identity_hash(object, 2)
        );
    }
}
