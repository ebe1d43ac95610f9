//! CMake integration: toolchain, dependency configs and the build helper.

#[allow(clippy::module_inception)]
mod cmake;
mod deps;
mod toolchain;

pub use cmake::CMake;
pub use deps::CMakeDeps;
pub use toolchain::{CMakeToolchain, CMakeValue, PRESETS_FILE, TOOLCHAIN_FILE};
