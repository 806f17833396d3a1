#![no_main]

use libfuzzer_sys::fuzz_target;
use dotcorelib::memory::move_within;

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }
    let (header, payload) = data.split_at(3);
    let len = payload.len();
    if len == 0 {
        return;
    }
    let src = usize::from(header[0]) % len;
    let dest = usize::from(header[1]) % len;
    let count = usize::from(header[2]) % (len - src.max(dest) + 1);

    let mut actual = payload.to_vec();
    let mut expected = payload.to_vec();
    move_within(&mut actual, src, dest, count).unwrap();
    expected.copy_within(src..src + count, dest);
    assert_eq!(actual, expected);
});
