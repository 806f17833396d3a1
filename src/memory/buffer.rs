//! Overlap-safe bulk move.
//!
//! [`memmove`] is the primitive behind every span copy. Moves larger than
//! [`BULK_COPY_THRESHOLD`] go straight to [`core::ptr::copy`]; smaller moves are
//! unrolled in block tiers so the common short copy never leaves inline code:
//!
//! | Tier | Width |
//! |------|-------|
//! | Block | 64 bytes |
//! | Block | 16 bytes |
//! | Tail | 8, 4, 2, 1 bytes |
//!
//! Direction is chosen with a single distance test: if `dest - src` (wrapping) is at
//! least `len`, the destination does not start inside the source range and a forward
//! copy is safe. Otherwise the destination overlaps the source from above and the
//! copy runs backward from the high end.

use std::ptr;

use crate::Result;

/// Byte length above which the platform block move is used.
pub const BULK_COPY_THRESHOLD: usize = 2048;

/// Copies `len` bytes from `src` to `dest`, handling overlap in either direction.
///
/// # Safety
///
/// `src` must be valid for reads of `len` bytes and `dest` valid for writes of
/// `len` bytes. The ranges may overlap. No alignment is required.
pub unsafe fn memmove(dest: *mut u8, src: *const u8, len: usize) {
    if ptr::eq(dest as *const u8, src) || len == 0 {
        return;
    }

    if len > BULK_COPY_THRESHOLD {
        ptr::copy(src, dest, len);
        return;
    }

    if (dest as usize).wrapping_sub(src as usize) >= len {
        copy_forward(dest, src, len);
    } else {
        copy_backward(dest, src, len);
    }
}

/// Moves `count` elements of `T` from `src` to `dest`.
///
/// # Safety
///
/// Same contract as [`memmove`], measured in elements of `T`.
pub unsafe fn bulk_move<T: Copy>(dest: *mut T, src: *const T, count: usize) {
    memmove(
        dest.cast::<u8>(),
        src.cast::<u8>(),
        count * std::mem::size_of::<T>(),
    );
}

/// Moves `count` elements within `buffer` from index `src` to index `dest`.
///
/// # Errors
///
/// Returns [`crate::Error::ArgumentOutOfRange`] if either range exceeds the buffer.
///
/// # Examples
///
/// ```rust
/// use dotcorelib::memory::move_within;
///
/// let mut data = [1, 2, 3, 4, 5];
/// move_within(&mut data, 0, 1, 4)?;
/// assert_eq!(data, [1, 1, 2, 3, 4]);
/// # Ok::<(), dotcorelib::Error>(())
/// ```
pub fn move_within<T: Copy>(buffer: &mut [T], src: usize, dest: usize, count: usize) -> Result<()> {
    let len = buffer.len();
    if src.checked_add(count).map_or(true, |end| end > len) {
        return Err(out_of_range!(
            "src",
            "source range {}+{} exceeds buffer of {}",
            src,
            count,
            len
        ));
    }
    if dest.checked_add(count).map_or(true, |end| end > len) {
        return Err(out_of_range!(
            "dest",
            "destination range {}+{} exceeds buffer of {}",
            dest,
            count,
            len
        ));
    }

    let base = buffer.as_mut_ptr();
    // SAFETY: both ranges were checked against the buffer length above
    unsafe { bulk_move(base.add(dest), base.add(src), count) };
    Ok(())
}

#[inline(always)]
unsafe fn move_block<const N: usize>(dest: *mut u8, src: *const u8) {
    // read the whole block before writing so overlapping blocks stay correct
    let block = ptr::read_unaligned(src.cast::<[u8; N]>());
    ptr::write_unaligned(dest.cast::<[u8; N]>(), block);
}

unsafe fn copy_forward(dest: *mut u8, src: *const u8, len: usize) {
    let mut offset = 0;

    while len - offset >= 64 {
        move_block::<64>(dest.add(offset), src.add(offset));
        offset += 64;
    }
    while len - offset >= 16 {
        move_block::<16>(dest.add(offset), src.add(offset));
        offset += 16;
    }
    if len - offset >= 8 {
        move_block::<8>(dest.add(offset), src.add(offset));
        offset += 8;
    }
    if len - offset >= 4 {
        move_block::<4>(dest.add(offset), src.add(offset));
        offset += 4;
    }
    if len - offset >= 2 {
        move_block::<2>(dest.add(offset), src.add(offset));
        offset += 2;
    }
    if len - offset >= 1 {
        move_block::<1>(dest.add(offset), src.add(offset));
    }
}

unsafe fn copy_backward(dest: *mut u8, src: *const u8, len: usize) {
    let mut remaining = len;

    while remaining >= 64 {
        remaining -= 64;
        move_block::<64>(dest.add(remaining), src.add(remaining));
    }
    while remaining >= 16 {
        remaining -= 16;
        move_block::<16>(dest.add(remaining), src.add(remaining));
    }
    if remaining >= 8 {
        remaining -= 8;
        move_block::<8>(dest.add(remaining), src.add(remaining));
    }
    if remaining >= 4 {
        remaining -= 4;
        move_block::<4>(dest.add(remaining), src.add(remaining));
    }
    if remaining >= 2 {
        remaining -= 2;
        move_block::<2>(dest.add(remaining), src.add(remaining));
    }
    if remaining >= 1 {
        move_block::<1>(dest, src);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + 3) as u8).collect()
    }

    fn reference_move(buffer: &mut [u8], src: usize, dest: usize, count: usize) {
        buffer.copy_within(src..src + count, dest);
    }

    #[test]
    fn test_memmove_all_tiers_both_directions() {
        for len in [0usize, 1, 2, 3, 7, 8, 15, 16, 17, 63, 64, 65, 200, 2048, 2049, 5000] {
            for shift in [1usize, 3, 8, 17, 64] {
                let mut forward = pattern(len + shift);
                let mut expected = forward.clone();
                move_within(&mut forward, shift, 0, len).unwrap();
                reference_move(&mut expected, shift, 0, len);
                assert_eq!(forward, expected, "forward len={} shift={}", len, shift);

                let mut backward = pattern(len + shift);
                let mut expected = backward.clone();
                move_within(&mut backward, 0, shift, len).unwrap();
                reference_move(&mut expected, 0, shift, len);
                assert_eq!(backward, expected, "backward len={} shift={}", len, shift);
            }
        }
    }

    #[test]
    fn test_memmove_identical_range() {
        let mut data = pattern(100);
        let expected = data.clone();
        move_within(&mut data, 10, 10, 50).unwrap();
        assert_eq!(data, expected);
    }

    #[test]
    fn test_memmove_disjoint_unaligned() {
        let src = pattern(301);
        let mut dest = vec![0u8; 301];
        unsafe { memmove(dest.as_mut_ptr(), src.as_ptr(), src.len()) };
        assert_eq!(dest, src);
    }

    #[test]
    fn test_bulk_move_wide_elements() {
        let mut values: Vec<u64> = (0..40).collect();
        move_within(&mut values, 0, 5, 30).unwrap();
        let mut expected: Vec<u64> = (0..40).collect();
        expected.copy_within(0..30, 5);
        assert_eq!(values, expected);
    }

    #[test]
    fn test_move_within_bounds() {
        let mut data = [0u8; 8];
        assert!(matches!(
            move_within(&mut data, 4, 0, 5),
            Err(Error::ArgumentOutOfRange { param: "src", .. })
        ));
        assert!(matches!(
            move_within(&mut data, 0, 6, 3),
            Err(Error::ArgumentOutOfRange { param: "dest", .. })
        ));
        assert!(move_within(&mut data, 0, 0, 8).is_ok());
        assert!(matches!(
            move_within(&mut data, usize::MAX, 0, 2),
            Err(Error::ArgumentOutOfRange { .. })
        ));
    }
}
