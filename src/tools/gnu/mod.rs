//! GNU toolchain integration: Autotools and pkg-config.

mod autotools;
mod autotools_deps;
mod autotools_toolchain;
mod pkgconfig_deps;

pub use autotools::Autotools;
pub use autotools_deps::AutotoolsDeps;
pub use autotools_toolchain::{AutotoolsToolchain, ARGS_FILE, TOOLCHAIN_SCRIPT};
pub use pkgconfig_deps::PkgConfigDeps;
