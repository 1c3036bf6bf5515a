/// Inclusive end address of a window starting at `base` spanning `size` bytes,
/// or `None` if the window is empty or runs past the end of the address space.
pub(crate) const fn window_end(base: usize, size: usize) -> Option<usize> {
    if size == 0 {
        return None;
    }
    base.checked_add(size - 1)
}

/// Whether the windows [a, a + a_size) and [b, b + b_size) intersect.
/// `None` if either window is not representable.
pub(crate) const fn windows_overlap(
    a: usize,
    a_size: usize,
    b: usize,
    b_size: usize,
) -> Option<bool> {
    match (window_end(a, a_size), window_end(b, b_size)) {
        (Some(a_end), Some(b_end)) => Some(a <= b_end && b <= a_end),
        _ => None,
    }
}
