//! Multicast invocation lists.
//!
//! A [`MulticastDelegate`] is either a single binding or an [`InvocationList`] of two
//! or more. Lists are immutable from the outside: [`combine`](MulticastDelegate::combine)
//! and [`remove`](MulticastDelegate::remove) return new values and never change what
//! their inputs invoke.
//!
//! # Slot Storage
//!
//! An invocation list is a header (`count`) over a shared array of set-once slots.
//! Several headers may share one array, each owning a prefix of it. Appending to a
//! list first tries to claim the slots just past its prefix:
//!
//! ```text
//! slots: [ f ][ g ][ h ][   ]      f+g   -> count 2
//!                                  f+g+h -> count 3, same array
//! ```
//!
//! A slot can be claimed if it is empty, or if it already holds a binding identical
//! to the one being appended (another list appended the same thing first). If any
//! needed slot holds something else, or the array is full, a fresh array is
//! allocated, doubling the old capacity until the result fits.
//!
//! `remove` always builds a fresh array.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use dotcorelib::delegate::{Delegate, DelegateType, MulticastDelegate, NativeFunction};
//! use dotcorelib::metadata::{signature::{MethodSignature, ValueKind}, token::Token};
//! use dotcorelib::runtime::{RuntimeContext, Value};
//!
//! let ctx = RuntimeContext::new()?;
//! let func = Arc::new(DelegateType::new(
//!     Token::type_def(0x200),
//!     "Func",
//!     MethodSignature::new(ValueKind::I32, Vec::new()),
//! ));
//! let constant = |address, value| {
//!     MulticastDelegate::from(Delegate::from_native(
//!         &func,
//!         NativeFunction::new(address, move |_| Ok(Value::I32(value))),
//!     ))
//! };
//!
//! let (f, g) = (constant(0x10, 1), constant(0x20, 2));
//! let both = MulticastDelegate::combine(Some(&f), Some(&g))?.unwrap();
//! assert_eq!(both.invocation_count(), 2);
//! assert_eq!(both.invoke(&ctx, &[])?, Value::I32(2));
//!
//! let rest = MulticastDelegate::remove(Some(&both), Some(&g))?.unwrap();
//! assert_eq!(rest, f);
//! # Ok::<(), dotcorelib::Error>(())
//! ```

use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::{Arc, OnceLock},
};

use crate::{
    delegate::{
        binding::{Delegate, DelegateRc},
        types::DelegateTypeRc,
    },
    runtime::{RuntimeContext, Value},
    Error, Result,
};

type Slots = Arc<[OnceLock<DelegateRc>]>;

fn allocate_slots(capacity: usize) -> Slots {
    (0..capacity).map(|_| OnceLock::new()).collect()
}

// claims `slot` for `binding`, or accepts it if it already holds the same binding
fn try_claim(slot: &OnceLock<DelegateRc>, binding: &DelegateRc) -> bool {
    match slot.set(binding.clone()) {
        Ok(()) => true,
        Err(_) => slot
            .get()
            .is_some_and(|existing| Arc::ptr_eq(existing, binding) || existing.same_binding(binding)),
    }
}

/// Two or more bindings sharing a slot array.
#[derive(Clone)]
pub struct InvocationList {
    delegate_type: DelegateTypeRc,
    slots: Slots,
    count: usize,
}

impl InvocationList {
    fn build<'a>(
        delegate_type: &DelegateTypeRc,
        bindings: impl Iterator<Item = &'a DelegateRc>,
        capacity: usize,
    ) -> Self {
        let slots = allocate_slots(capacity);
        let mut count = 0;
        for (slot, binding) in slots.iter().zip(bindings) {
            let _ = slot.set(binding.clone());
            count += 1;
        }

        InvocationList {
            delegate_type: delegate_type.clone(),
            slots,
            count,
        }
    }

    /// Number of bindings in this list
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Always false; an empty list is represented as `None`
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Length of the underlying slot array
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// The bindings, in invocation order
    pub fn iter(&self) -> impl Iterator<Item = &DelegateRc> + '_ {
        self.slots[..self.count].iter().filter_map(OnceLock::get)
    }
}

/// A delegate with an ordered invocation list.
///
/// Invoking runs every binding in order with the same arguments and returns the
/// last result.
#[derive(Clone)]
pub enum MulticastDelegate {
    /// Exactly one binding
    Single(DelegateRc),
    /// Two or more bindings
    Multiple(InvocationList),
}

impl MulticastDelegate {
    /// Concatenates two invocation lists.
    ///
    /// `None` is the empty list: `combine(None, b)` is `b` and `combine(a, None)` is
    /// `a`. Nested lists are flattened.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DelegateTypeMismatch`] if both are present and have
    /// different delegate types.
    pub fn combine(a: Option<&Self>, b: Option<&Self>) -> Result<Option<Self>> {
        let (head, follow) = match (a, b) {
            (None, None) => return Ok(None),
            (Some(a), None) => return Ok(Some(a.clone())),
            (None, Some(b)) => return Ok(Some(b.clone())),
            (Some(a), Some(b)) => (a, b),
        };
        head.check_same_type(follow)?;
        Ok(Some(head.append(follow)))
    }

    /// Combines every delegate in `delegates`, left to right.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DelegateTypeMismatch`] if the delegate types differ.
    pub fn combine_all(delegates: &[MulticastDelegate]) -> Result<Option<Self>> {
        delegates.iter().try_fold(None, |combined: Option<Self>, next| {
            Self::combine(combined.as_ref(), Some(next))
        })
    }

    fn append(&self, follow: &Self) -> Self {
        let follow_count = follow.invocation_count();
        match self {
            MulticastDelegate::Single(first) => {
                let count = 1 + follow_count;
                MulticastDelegate::Multiple(InvocationList::build(
                    first.delegate_type(),
                    std::iter::once(first).chain(follow.bindings()),
                    count.next_power_of_two(),
                ))
            }
            MulticastDelegate::Multiple(list) => {
                let count = list.count + follow_count;
                if count <= list.slots.len() {
                    let claimed = follow
                        .bindings()
                        .zip(&list.slots[list.count..])
                        .all(|(binding, slot)| try_claim(slot, binding));
                    if claimed {
                        return MulticastDelegate::Multiple(InvocationList {
                            delegate_type: list.delegate_type.clone(),
                            slots: list.slots.clone(),
                            count,
                        });
                    }
                    log::trace!(
                        "invocation slots past {} of {} already taken, reallocating",
                        list.count,
                        list.slots.len()
                    );
                }

                let mut capacity = list.slots.len().max(1);
                while capacity < count {
                    capacity *= 2;
                }
                MulticastDelegate::Multiple(InvocationList::build(
                    &list.delegate_type,
                    list.iter().chain(follow.bindings()),
                    capacity,
                ))
            }
        }
    }

    /// Removes the last occurrence of `value` from `source`.
    ///
    /// A single `value` matches one equal binding; a list `value` matches an equal
    /// contiguous run. Returns `None` if nothing remains, the remaining binding if
    /// one remains, and `source` itself (see [`ptr_eq`](Self::ptr_eq)) if `value`
    /// does not occur.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DelegateTypeMismatch`] if both are present and have
    /// different delegate types.
    pub fn remove(source: Option<&Self>, value: Option<&Self>) -> Result<Option<Self>> {
        let Some(source) = source else {
            return Ok(None);
        };
        let Some(value) = value else {
            return Ok(Some(source.clone()));
        };
        source.check_same_type(value)?;

        let list = match source {
            MulticastDelegate::Single(single) => {
                return Ok(match value {
                    MulticastDelegate::Single(other) if **single == **other => None,
                    _ => Some(source.clone()),
                });
            }
            MulticastDelegate::Multiple(list) => list,
        };

        let items: Vec<&DelegateRc> = list.iter().collect();
        let needle: Vec<&DelegateRc> = value.bindings().collect();
        if needle.len() > items.len() {
            return Ok(Some(source.clone()));
        }

        let found = (0..=items.len() - needle.len()).rev().find(|&start| {
            items[start..start + needle.len()]
                .iter()
                .zip(&needle)
                .all(|(item, wanted)| ***item == ***wanted)
        });
        let Some(start) = found else {
            return Ok(Some(source.clone()));
        };

        let remaining = items.len() - needle.len();
        Ok(match remaining {
            0 => None,
            1 => {
                let kept = if start == 0 { items[items.len() - 1] } else { items[0] };
                Some(MulticastDelegate::Single(kept.clone()))
            }
            _ => {
                let mut capacity = list.slots.len();
                while capacity / 2 >= remaining {
                    capacity /= 2;
                }
                let kept = items[..start]
                    .iter()
                    .chain(&items[start + needle.len()..])
                    .copied();
                Some(MulticastDelegate::Multiple(InvocationList::build(
                    &list.delegate_type,
                    kept,
                    capacity,
                )))
            }
        })
    }

    /// Removes every occurrence of `value`, repeating [`remove`](Self::remove) until
    /// nothing changes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DelegateTypeMismatch`] if both are present and have
    /// different delegate types.
    pub fn remove_all(source: Option<&Self>, value: Option<&Self>) -> Result<Option<Self>> {
        let mut current = source.cloned();
        loop {
            let next = Self::remove(current.as_ref(), value)?;
            let unchanged = match (&current, &next) {
                (Some(before), Some(after)) => before.ptr_eq(after),
                (None, None) => true,
                _ => false,
            };
            current = next;
            if unchanged {
                return Ok(current);
            }
        }
    }

    /// Invokes every binding in order and returns the last result.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first error; later bindings are not invoked.
    pub fn invoke(&self, ctx: &RuntimeContext, args: &[Value]) -> Result<Value> {
        match self {
            MulticastDelegate::Single(single) => single.invoke(ctx, args),
            MulticastDelegate::Multiple(list) => {
                let mut result = Value::Void;
                for binding in list.iter() {
                    result = binding.invoke(ctx, args)?;
                }
                Ok(result)
            }
        }
    }

    /// A copy of the invocation list
    #[must_use]
    pub fn invocation_list(&self) -> Vec<DelegateRc> {
        self.bindings().cloned().collect()
    }

    /// Number of bindings
    #[must_use]
    pub fn invocation_count(&self) -> usize {
        match self {
            MulticastDelegate::Single(_) => 1,
            MulticastDelegate::Multiple(list) => list.count,
        }
    }

    /// Length of the slot array; `1` for a single binding
    #[must_use]
    pub fn capacity(&self) -> usize {
        match self {
            MulticastDelegate::Single(_) => 1,
            MulticastDelegate::Multiple(list) => list.capacity(),
        }
    }

    /// The delegate type shared by every binding
    #[must_use]
    pub fn delegate_type(&self) -> &DelegateTypeRc {
        match self {
            MulticastDelegate::Single(single) => single.delegate_type(),
            MulticastDelegate::Multiple(list) => &list.delegate_type,
        }
    }

    /// Returns true if both values are the same object: the same single binding, or
    /// the same slot array and count.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (MulticastDelegate::Single(a), MulticastDelegate::Single(b)) => Arc::ptr_eq(a, b),
            (MulticastDelegate::Multiple(a), MulticastDelegate::Multiple(b)) => {
                Arc::ptr_eq(&a.slots, &b.slots) && a.count == b.count
            }
            _ => false,
        }
    }

    fn bindings(&self) -> impl Iterator<Item = &DelegateRc> + '_ {
        let (single, list) = match self {
            MulticastDelegate::Single(single) => (Some(single), None),
            MulticastDelegate::Multiple(list) => (None, Some(list)),
        };
        single
            .into_iter()
            .chain(list.into_iter().flat_map(InvocationList::iter))
    }

    fn check_same_type(&self, other: &Self) -> Result<()> {
        let (left, right) = (self.delegate_type(), other.delegate_type());
        if **left == **right {
            Ok(())
        } else {
            Err(Error::DelegateTypeMismatch {
                left: left.name.clone(),
                right: right.name.clone(),
            })
        }
    }
}

impl From<Delegate> for MulticastDelegate {
    fn from(delegate: Delegate) -> Self {
        MulticastDelegate::Single(Arc::new(delegate))
    }
}

impl From<DelegateRc> for MulticastDelegate {
    fn from(delegate: DelegateRc) -> Self {
        MulticastDelegate::Single(delegate)
    }
}

impl PartialEq for MulticastDelegate {
    fn eq(&self, other: &Self) -> bool {
        **self.delegate_type() == **other.delegate_type()
            && self.invocation_count() == other.invocation_count()
            && self
                .bindings()
                .zip(other.bindings())
                .all(|(a, b)| **a == **b)
    }
}

impl Eq for MulticastDelegate {}

impl Hash for MulticastDelegate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for binding in self.bindings() {
            state.write_u64(binding.hash_code());
        }
    }
}

impl fmt::Debug for MulticastDelegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.bindings()).finish()
    }
}

impl fmt::Display for MulticastDelegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}]",
            self.delegate_type(),
            self.invocation_count()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        delegate::types::{DelegateType, NativeFunction},
        metadata::{
            signature::{MethodSignature, ValueKind},
            token::Token,
        },
        test::{unary_int_type, Recorder},
    };

    struct Fixture {
        ctx: RuntimeContext,
        recorder: Recorder,
        func: DelegateTypeRc,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                ctx: RuntimeContext::new().unwrap(),
                recorder: Recorder::new(),
                func: Arc::new(DelegateType::new(
                    Token::type_def(0x8300),
                    "System.Func<int>",
                    MethodSignature::new(ValueKind::I32, Vec::new()),
                )),
            }
        }

        // a binding that records `name` and returns `value`
        fn named(&self, name: &'static str, value: i32) -> MulticastDelegate {
            let recorder = self.recorder.clone();
            MulticastDelegate::from(Delegate::from_native(
                &self.func,
                NativeFunction::new(0x1_0000 + value as usize * 0x10, move |_| {
                    recorder.push(name);
                    Ok(Value::I32(value))
                }),
            ))
        }

        fn run(&self, delegate: &MulticastDelegate) -> Vec<String> {
            delegate.invoke(&self.ctx, &[]).unwrap();
            self.recorder.take()
        }
    }

    fn combine(a: &MulticastDelegate, b: &MulticastDelegate) -> MulticastDelegate {
        MulticastDelegate::combine(Some(a), Some(b)).unwrap().unwrap()
    }

    fn remove(a: &MulticastDelegate, b: &MulticastDelegate) -> Option<MulticastDelegate> {
        MulticastDelegate::remove(Some(a), Some(b)).unwrap()
    }

    fn slots(delegate: &MulticastDelegate) -> &Slots {
        match delegate {
            MulticastDelegate::Multiple(list) => &list.slots,
            MulticastDelegate::Single(_) => panic!("expected a list"),
        }
    }

    #[test]
    fn test_combine_with_none() {
        let fixture = Fixture::new();
        let f = fixture.named("f", 1);
        assert!(MulticastDelegate::combine(None, None).unwrap().is_none());
        let left = MulticastDelegate::combine(Some(&f), None).unwrap().unwrap();
        let right = MulticastDelegate::combine(None, Some(&f)).unwrap().unwrap();
        assert!(left.ptr_eq(&f));
        assert!(right.ptr_eq(&f));
    }

    #[test]
    fn test_combine_order_and_result() {
        let fixture = Fixture::new();
        let (f, g, h) = (fixture.named("f", 1), fixture.named("g", 2), fixture.named("h", 3));

        let fgh = combine(&combine(&f, &g), &h);
        assert_eq!(fgh.invocation_count(), 3);
        assert_eq!(fgh.invoke(&fixture.ctx, &[]).unwrap(), Value::I32(3));
        assert_eq!(fixture.recorder.take(), vec!["f", "g", "h"]);

        let nested = combine(&f, &combine(&g, &h));
        assert_eq!(nested, fgh);
        assert_eq!(fixture.run(&nested), vec!["f", "g", "h"]);
    }

    #[test]
    fn test_combine_all() {
        let fixture = Fixture::new();
        let all = MulticastDelegate::combine_all(&[
            fixture.named("a", 1),
            fixture.named("b", 2),
            fixture.named("c", 3),
        ])
        .unwrap()
        .unwrap();
        assert_eq!(fixture.run(&all), vec!["a", "b", "c"]);
        assert!(MulticastDelegate::combine_all(&[]).unwrap().is_none());
    }

    #[test]
    fn test_slot_reuse_and_reallocation() {
        let fixture = Fixture::new();
        let (a, b, c, d, e) = (
            fixture.named("a", 1),
            fixture.named("b", 2),
            fixture.named("c", 3),
            fixture.named("d", 4),
            fixture.named("e", 5),
        );

        let ab = combine(&a, &b);
        assert_eq!(ab.capacity(), 2);
        let abc = combine(&ab, &c);
        assert_eq!(abc.capacity(), 4);
        assert!(!Arc::ptr_eq(slots(&ab), slots(&abc)));

        let abcd = combine(&abc, &d);
        assert!(Arc::ptr_eq(slots(&abc), slots(&abcd)));

        // slot 3 now holds d, so appending e needs a fresh array
        let abce = combine(&abc, &e);
        assert!(!Arc::ptr_eq(slots(&abc), slots(&abce)));
        assert_eq!(abce.capacity(), 4);

        // appending d again claims the identical binding already in slot 3
        let abcd_again = combine(&abc, &d);
        assert!(Arc::ptr_eq(slots(&abc), slots(&abcd_again)));

        assert_eq!(fixture.run(&abc), vec!["a", "b", "c"]);
        assert_eq!(fixture.run(&abcd), vec!["a", "b", "c", "d"]);
        assert_eq!(fixture.run(&abce), vec!["a", "b", "c", "e"]);
    }

    #[test]
    fn test_remove_last_occurrence() {
        let fixture = Fixture::new();
        let (f, g) = (fixture.named("f", 1), fixture.named("g", 2));

        let fgf = MulticastDelegate::combine_all(&[f.clone(), g.clone(), f.clone()])
            .unwrap()
            .unwrap();
        let without_last_f = remove(&fgf, &f).unwrap();
        assert_eq!(fixture.run(&without_last_f), vec!["f", "g"]);

        let g_only = remove(&combine(&f, &g), &f).unwrap();
        assert!(matches!(g_only, MulticastDelegate::Single(_)));
        assert_eq!(g_only, g);
    }

    #[test]
    fn test_remove_subsequence() {
        let fixture = Fixture::new();
        let (a, b, c) = (fixture.named("a", 1), fixture.named("b", 2), fixture.named("c", 3));

        let list = MulticastDelegate::combine_all(&[
            a.clone(),
            b.clone(),
            c.clone(),
            a.clone(),
            b.clone(),
        ])
        .unwrap()
        .unwrap();
        let ab = combine(&a, &b);
        let result = remove(&list, &ab).unwrap();
        assert_eq!(fixture.run(&result), vec!["a", "b", "c"]);

        // non-contiguous occurrence does not match
        let ac = combine(&a, &c);
        let unchanged = remove(&combine(&a, &combine(&b, &c)), &ac).unwrap();
        assert_eq!(unchanged.invocation_count(), 3);

        let everything = remove(&ab, &ab);
        assert!(everything.is_none());
    }

    #[test]
    fn test_remove_without_match_returns_source() {
        let fixture = Fixture::new();
        let (f, g, h) = (fixture.named("f", 1), fixture.named("g", 2), fixture.named("h", 3));
        let fg = combine(&f, &g);

        assert!(remove(&fg, &h).unwrap().ptr_eq(&fg));
        assert!(remove(&f, &g).unwrap().ptr_eq(&f));
        assert!(remove(&f, &fg).unwrap().ptr_eq(&f));
        assert!(remove(&f, &f).is_none());

        assert!(MulticastDelegate::remove(None, Some(&f)).unwrap().is_none());
        assert!(MulticastDelegate::remove(Some(&f), None)
            .unwrap()
            .unwrap()
            .ptr_eq(&f));
    }

    #[test]
    fn test_remove_allocates_shrunk_array() {
        let fixture = Fixture::new();
        let delegates: Vec<MulticastDelegate> =
            (1..=9).map(|i| fixture.named("x", i)).collect();
        let list = MulticastDelegate::combine_all(&delegates).unwrap().unwrap();
        assert_eq!(list.capacity(), 16);

        let mut current = list.clone();
        for delegate in &delegates[..6] {
            current = remove(&current, delegate).unwrap();
        }
        assert_eq!(current.invocation_count(), 3);
        assert_eq!(current.capacity(), 4);
        assert!(!Arc::ptr_eq(slots(&list), slots(&current)));
    }

    #[test]
    fn test_remove_all() {
        let fixture = Fixture::new();
        let (f, g) = (fixture.named("f", 1), fixture.named("g", 2));
        let list = MulticastDelegate::combine_all(&[
            f.clone(),
            g.clone(),
            f.clone(),
            g.clone(),
            f.clone(),
        ])
        .unwrap()
        .unwrap();

        let only_g = MulticastDelegate::remove_all(Some(&list), Some(&f))
            .unwrap()
            .unwrap();
        assert_eq!(fixture.run(&only_g), vec!["g", "g"]);

        let nothing = MulticastDelegate::remove_all(Some(&only_g), Some(&g)).unwrap();
        assert!(nothing.is_none());
    }

    #[test]
    fn test_type_mismatch() {
        let fixture = Fixture::new();
        let f = fixture.named("f", 1);
        let other = MulticastDelegate::from(Delegate::from_native(
            &unary_int_type(),
            NativeFunction::new(0x5000, |_| Ok(Value::Void)),
        ));

        assert!(matches!(
            MulticastDelegate::combine(Some(&f), Some(&other)),
            Err(Error::DelegateTypeMismatch { .. })
        ));
        assert!(matches!(
            MulticastDelegate::remove(Some(&f), Some(&other)),
            Err(Error::DelegateTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_invoke_stops_at_first_error() {
        let fixture = Fixture::new();
        let f = fixture.named("f", 1);
        let failing = MulticastDelegate::from(Delegate::from_native(
            &fixture.func,
            NativeFunction::new(0x6000, |_| Err(Error::InvalidOperation("boom".into()))),
        ));
        let g = fixture.named("g", 2);

        let list = MulticastDelegate::combine_all(&[f, failing, g]).unwrap().unwrap();
        assert!(matches!(
            list.invoke(&fixture.ctx, &[]),
            Err(Error::InvalidOperation(_))
        ));
        assert_eq!(fixture.recorder.take(), vec!["f"]);
    }

    #[test]
    fn test_equality_and_copy() {
        let fixture = Fixture::new();
        let (f, g) = (fixture.named("f", 1), fixture.named("g", 2));
        let fg = combine(&f, &g);
        let fg_again = combine(&f, &g);
        assert_eq!(fg, fg_again);
        assert_ne!(fg, combine(&g, &f));
        assert_ne!(fg, f);

        let mut copy = fg.invocation_list();
        copy.pop();
        assert_eq!(copy.len(), 1);
        assert_eq!(fg.invocation_count(), 2);
        assert_eq!(fg.to_string(), "System.Func<int>[2]");
    }
}
