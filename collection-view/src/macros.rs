#[cfg(feature = "tracing")]
macro_rules! cvtrace {
    ($($tt:tt)*) => {
        tracing::trace!(target: "collection_view", $($tt)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! cvtrace {
    ($($tt:tt)*) => {};
}

#[cfg(feature = "tracing")]
macro_rules! cvdebug {
    ($($tt:tt)*) => {
        tracing::debug!(target: "collection_view", $($tt)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! cvdebug {
    ($($tt:tt)*) => {};
}

#[cfg(feature = "tracing")]
macro_rules! cvwarn {
    ($($tt:tt)*) => {
        tracing::warn!(target: "collection_view", $($tt)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! cvwarn {
    ($($tt:tt)*) => {};
}
