//! Optional tracy instrumentation.
//!
//! `gfx_span!("name")` opens a span for the rest of the scope when the
//! `profiling` feature is on and compiles to nothing otherwise. The application
//! is responsible for starting the tracy client.

#[cfg(feature = "profiling")]
pub use tracy_client;

#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! gfx_span {
    ($name:expr) => {
        let _gfx_span = $crate::profiling::tracy_client::span!($name);
    };
}

#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! gfx_span {
    ($name:expr) => {};
}
