//! Meson integration.

#[allow(clippy::module_inception)]
mod meson;
mod toolchain;

pub use meson::Meson;
pub use toolchain::{MesonToolchain, MesonValue, CROSS_FILE, NATIVE_FILE};
