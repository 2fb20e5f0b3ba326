/// Branch layout hint. The stable toolchain has no `likely` intrinsic, so
/// this is an identity macro kept so the hot path reads the same as the
/// tuned builds.
macro_rules! likely {
    ($e:expr) => {
        $e
    };
}

/// See [`likely!`].
macro_rules! unlikely {
    ($e:expr) => {
        $e
    };
}

macro_rules! static_cast_i64 {
    ($v:expr) => {
        ($v) as i64
    };
}

macro_rules! static_cast_u64 {
    ($v:expr) => {
        ($v) as u64
    };
}
