#![allow(unused_macros)]

/// Helper macro for reading locked items
///
/// ```rust, ignore
///  let state = read_lock!(self.state);
///  println!("{}", state.objects.len());
/// ```
macro_rules! read_lock {
    ($rwlock:expr) => {
        $rwlock.read().expect("Failed to acquire read lock")
    };
}

/// Helper macro for writing to locked items
///
/// ```rust, ignore
///  let mut state = write_lock!(self.state);
///  state.objects.insert(id, object);
/// ```
macro_rules! write_lock {
    ($rwlock:expr) => {
        $rwlock.write().expect("Failed to acquire write lock")
    };
}
