use std::slice::SliceIndex;

/// Unchecked slice access that keeps the bounds check in debug builds.
/// Release builds trade it for speed; the structural indexes are produced by
/// stage 1 and are always in bounds for well-formed input.
pub(crate) trait GetSaferUnchecked<T> {
    unsafe fn get_kinda_unchecked<I>(&self, index: I) -> &<I as SliceIndex<[T]>>::Output
    where
        I: SliceIndex<[T]>;
}

impl<T> GetSaferUnchecked<T> for [T] {
    #[cfg_attr(not(feature = "no-inline"), inline)]
    unsafe fn get_kinda_unchecked<I>(&self, index: I) -> &<I as SliceIndex<[T]>>::Output
    where
        I: SliceIndex<[T]>,
    {
        if cfg!(debug_assertions) {
            &self[index]
        } else {
            self.get_unchecked(index)
        }
    }
}
