//! Helpers recipes call from their hooks: file operations, source
//! retrieval, patches, platform checks, layouts and generators.

pub mod build;
pub mod cmake;
pub mod cuda;
pub mod download;
pub mod env;
pub mod files;
pub mod gnu;
pub mod layout;
pub mod meson;
pub mod patches;
pub mod platform;
pub mod utils;

pub use build::{
    build_jobs, can_run, check_max_cppstd, check_min_cppstd, check_min_cstd, check_min_vs,
    cross_building, stdcpp_library, valid_min_cppstd,
};
pub use download::{download, get};
pub use env::{VirtualBuildEnv, VirtualRunEnv};
pub use files::{
    chdir, collect_libs, copy, load, mkdir, move_folder_contents, rename, replace_in_file, rm,
    rmdir, save,
};
pub use layout::{basic_layout, cmake_layout};
pub use patches::{apply_conandata_patches, export_conandata_patches, patch};
pub use platform::{
    fix_apple_shared_install_name, get_gnu_triplet, is_apple_os, is_msvc, is_msvc_static_runtime,
    msvc_runtime_flag, unix_path,
};
