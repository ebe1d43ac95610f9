//! End-to-end recipe scenarios through the library API.
//!
//! Each test writes recipes to a temporary folder, resolves them against a
//! throwaway cache and checks what ends up in the package folders.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pantry::core::errors::as_invalid_configuration;
use pantry::core::manifest::load_recipe;
use pantry::core::options::OptionDomain;
use pantry::core::recipe::PackageType;
use pantry::core::settings::Settings;
use pantry::engine::Binary;
use pantry::tools::cmake::CMakeDeps;
use pantry::util::fs::{copy_dir_all, forward_slashes};
use pantry::{Cache, Engine, Hook, MemoryIndex, Profile, Recipe, RecipeError};
use tempfile::TempDir;

fn write(root: &Path, files: &[(&str, &str)]) {
    for (path, content) in files {
        let path = root.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

fn profile(pairs: &[(&str, &str)]) -> Profile {
    Profile {
        settings: Settings::from_pairs(pairs.iter().copied()),
        ..Profile::default()
    }
}

fn linux() -> Profile {
    profile(&[
        ("os", "Linux"),
        ("arch", "x86_64"),
        ("compiler", "gcc"),
        ("compiler.version", "11"),
        ("compiler.libcxx", "libstdc++11"),
        ("build_type", "Release"),
    ])
}

fn windows() -> Profile {
    profile(&[
        ("os", "Windows"),
        ("arch", "x86_64"),
        ("compiler", "msvc"),
        ("compiler.version", "192"),
        ("compiler.runtime", "dynamic"),
        ("build_type", "Release"),
    ])
}

fn with_options(mut profile: Profile, options: &[&str]) -> Profile {
    let options: Vec<String> = options.iter().map(|o| o.to_string()).collect();
    profile.apply_overrides(&[], &options, &[]).unwrap();
    profile
}

// ============================================================================
// S1: header-only, no dependencies
// ============================================================================

const MDSPAN: &str = r#"
[package]
name = "mdspan"
version = "0.6.0"
package_type = "header-library"
settings = ["os", "arch", "compiler", "build_type"]
exports_sources = ["include/*"]

[[package.copy]]
pattern = "*.hpp"
from = "export_sources"
src = "include"
dst = "include"
"#;

#[test]
fn test_header_only_id_is_profile_independent() {
    let tmp = TempDir::new().unwrap();
    let recipe_dir = tmp.path().join("mdspan");
    write(
        &recipe_dir,
        &[
            ("recipe.toml", MDSPAN),
            ("include/mdspan/mdspan.hpp", "#pragma once\n"),
        ],
    );
    let recipe = load_recipe(&recipe_dir).unwrap();
    let index = MemoryIndex::new();
    let cache = Cache::new(tmp.path().join("cache"));

    let on_linux = Engine::new(&index, cache.clone(), linux(), linux())
        .create(recipe.clone())
        .unwrap();
    let on_windows = Engine::new(&index, cache.clone(), windows(), windows())
        .create(recipe)
        .unwrap();

    let root = on_linux.root();
    let id = root.package_id.clone().unwrap();
    assert_eq!(on_windows.root().package_id.as_deref(), Some(id.as_str()));

    let folder = cache.package_dir(root.reference(), &id);
    assert!(folder.join("include/mdspan/mdspan.hpp").is_file());
    assert!(root.instance.cpp_info.root.libs.is_empty());
}

// ============================================================================
// S2: components reaching a transitive header-only dependency
// ============================================================================

fn eigen() -> Recipe {
    Recipe::builder("eigen")
        .version("3.4.0")
        .package_type(PackageType::HeaderLibrary)
        .hook(Hook::Package, |cx| {
            let dir = cx.package_folder().join("include/Eigen");
            fs::create_dir_all(&dir)?;
            fs::write(dir.join("Core"), "// eigen\n")?;
            Ok(())
        })
        .build()
        .unwrap()
}

fn mylib(transitive_headers: bool) -> Recipe {
    Recipe::builder("mylib")
        .version("1.0")
        .package_type(PackageType::StaticLibrary)
        .settings(["os", "arch", "compiler", "build_type"])
        .hook(Hook::Requirements, move |cx| {
            cx.requires("eigen/3.4.0")?
                .transitive_headers(transitive_headers);
            Ok(())
        })
        .hook(Hook::Package, |cx| {
            let dir = cx.package_folder().join("lib");
            fs::create_dir_all(&dir)?;
            fs::write(dir.join("libmylib_core.a"), "")?;
            fs::create_dir_all(cx.package_folder().join("include"))?;
            Ok(())
        })
        .hook(Hook::PackageInfo, |cx| {
            cx.cpp_info.root.includedirs.clear();
            cx.cpp_info.root.libdirs.clear();
            let core = cx.cpp_info.component("core");
            core.libs = vec!["mylib_core".into()];
            core.requires = vec!["eigen::eigen".into()];
            Ok(())
        })
        .build()
        .unwrap()
}

/// An application over mylib that ships the CMakeDeps output it generated.
fn cmake_consumer() -> Recipe {
    Recipe::builder("app")
        .version("0.1")
        .package_type(PackageType::Application)
        .settings(["os", "arch", "compiler", "build_type"])
        .hook(Hook::Requirements, |cx| {
            cx.requires("mylib/1.0")?;
            Ok(())
        })
        .hook(Hook::Generate, |cx| {
            CMakeDeps::new(cx).generate(cx)?;
            Ok(())
        })
        .hook(Hook::Package, |cx| {
            copy_dir_all(&cx.generators_folder(), &cx.package_folder().join("cmake"))
        })
        .build()
        .unwrap()
}

/// Create the consumer over mylib and return (generated cmake folder,
/// eigen's include folder in the cache).
fn create_cmake_consumer(tmp: &TempDir, transitive_headers: bool) -> (PathBuf, PathBuf) {
    let index = MemoryIndex::new()
        .with(eigen())
        .unwrap()
        .with(mylib(transitive_headers))
        .unwrap();
    let cache = Cache::new(tmp.path().join("cache"));
    let graph = Engine::new(&index, cache.clone(), linux(), linux())
        .create(cmake_consumer())
        .unwrap();

    let eigen = graph.find("eigen").unwrap();
    let eigen_include = cache
        .package_dir(eigen.reference(), eigen.package_id.as_deref().unwrap())
        .join("include");
    let root = graph.root();
    let generated = cache
        .package_dir(root.reference(), root.package_id.as_deref().unwrap())
        .join("cmake");
    (generated, eigen_include)
}

#[test]
fn test_consumer_sees_transitive_headers_through_components() {
    let tmp = TempDir::new().unwrap();
    let (generated, eigen_include) = create_cmake_consumer(&tmp, true);

    let config = fs::read_to_string(generated.join("mylibConfig.cmake")).unwrap();
    assert!(config.contains("add_library(mylib::core INTERFACE IMPORTED)"));
    assert!(config.contains("eigen::eigen"));
    assert!(config.contains(&forward_slashes(&eigen_include)));
    assert!(config.contains("find_dependency(eigen REQUIRED NO_MODULE)"));
    assert!(generated.join("eigenConfig.cmake").is_file());
}

#[test]
fn test_consumer_without_transitive_headers_never_sees_eigen() {
    let tmp = TempDir::new().unwrap();
    let (generated, eigen_include) = create_cmake_consumer(&tmp, false);

    let config = fs::read_to_string(generated.join("mylibConfig.cmake")).unwrap();
    assert!(config.contains("add_library(mylib::core INTERFACE IMPORTED)"));
    assert!(!config.contains(&forward_slashes(&eigen_include)));
    assert!(!config.contains("find_dependency(eigen"));
    assert!(!config.contains("eigen::eigen"));
    assert!(!generated.join("eigenConfig.cmake").exists());
}

// ============================================================================
// S3: option values outside the declared domain
// ============================================================================

#[test]
fn test_bad_option_value_fails_before_any_hook() {
    let tmp = TempDir::new().unwrap();
    let configured = Arc::new(AtomicBool::new(false));
    let seen = configured.clone();
    let recipe = Recipe::builder("pico")
        .version("1.0")
        .option("backend", OptionDomain::values(["c", "pico"]), "c")
        .hook(Hook::ConfigOptions, move |_| {
            seen.store(true, Ordering::SeqCst);
            Ok(())
        })
        .build()
        .unwrap();

    let index = MemoryIndex::new();
    let host = with_options(linux(), &["backend=tcp"]);
    let engine = Engine::new(&index, Cache::new(tmp.path()), host, linux());
    let err = engine.create(recipe).err().unwrap();

    let recipe_err = err
        .chain()
        .find_map(|e| e.downcast_ref::<RecipeError>())
        .expect("recipe error in chain");
    assert!(matches!(
        recipe_err,
        RecipeError::OptionValueNotAllowed { option, value, .. }
            if option == "backend" && value == "tcp"
    ));
    assert!(!configured.load(Ordering::SeqCst));
    assert!(engine.cache().list().unwrap().iter().all(|e| e.package_ids.is_empty()));
}

// ============================================================================
// S4: canned shared/fPIC handling
// ============================================================================

const ZSTD: &str = r#"
[package]
name = "zstd"
version = "1.5.6"
package_type = "library"
settings = ["os", "arch", "compiler", "build_type"]
implements = ["auto_shared_fpic"]
languages = ["C"]

[options]
shared = [true, false]
fPIC = [true, false]

[default_options]
shared = false
fPIC = true
"#;

#[test]
fn test_auto_shared_fpic() {
    let tmp = TempDir::new().unwrap();
    write(&tmp.path().join("zstd"), &[("recipe.toml", ZSTD)]);
    let recipe = load_recipe(&tmp.path().join("zstd")).unwrap();
    let index = MemoryIndex::new();
    let cache = Cache::new(tmp.path().join("cache"));

    let host = with_options(linux(), &["shared=True"]);
    let graph = Engine::new(&index, cache.clone(), host, linux())
        .graph(recipe.clone())
        .unwrap();
    let node = graph.root();
    assert!(node.instance.options.get_safe("fPIC").is_none());
    assert!(node.instance.options.is_true("shared"));
    assert_eq!(node.instance.package_type, PackageType::SharedLibrary);
    assert!(node.instance.settings.get_safe("compiler.libcxx").is_none());

    let host = with_options(windows(), &["shared=True"]);
    let graph = Engine::new(&index, cache, host, windows())
        .graph(recipe)
        .unwrap();
    let node = graph.root();
    assert!(node.instance.options.get_safe("fPIC").is_none());
    assert!(node.instance.options.get_safe("shared").is_none());
}

// ============================================================================
// S5: validate() rejecting a configuration
// ============================================================================

const LIBUV: &str = r#"
[package]
name = "libuv"
version = "1.47.0"
package_type = "static-library"
settings = ["os", "arch", "compiler", "build_type"]

[[invalid]]
when = { os = "Windows" }
message = "only Linux supported"
"#;

#[test]
fn test_invalid_configuration_skips_build() {
    let tmp = TempDir::new().unwrap();
    write(&tmp.path().join("libuv"), &[("recipe.toml", LIBUV)]);
    let libuv = load_recipe(&tmp.path().join("libuv")).unwrap();
    let index = MemoryIndex::new().with(libuv.clone()).unwrap();
    let cache = Cache::new(tmp.path().join("cache"));
    let engine = Engine::new(&index, cache, windows(), windows());

    // Exploration keeps going past the invalid node.
    let consumer = Recipe::builder("server")
        .version("2.0")
        .hook(Hook::Requirements, |cx| {
            cx.requires("libuv/1.47.0")?;
            Ok(())
        })
        .build()
        .unwrap();
    let graph = engine.graph(consumer).unwrap();
    let node = graph.find("libuv").unwrap();
    assert_eq!(node.binary, Binary::Invalid);
    assert!(node.invalid.as_deref().unwrap().contains("only Linux supported"));
    assert!(!node.instance.trace.contains(&Hook::Build));
    assert!(!node.instance.trace.contains(&Hook::Package));
    assert_eq!(graph.len(), 2);

    let err = engine.create(libuv).err().unwrap();
    let invalid = as_invalid_configuration(&err).expect("invalid configuration");
    assert!(invalid.reason.contains("only Linux supported"));
    assert!(engine.cache().list().unwrap().iter().all(|e| e.package_ids.is_empty()));
}

// ============================================================================
// S6: conandata patches
// ============================================================================

const HELLO: &str = r#"
[package]
name = "hello"
version = "1.0"
package_type = "static-library"
exports_sources = ["src/*"]

[[package.copy]]
pattern = "*.c"
dst = "src"
"#;

const CONANDATA: &str = r#"
patches:
  "1.0":
    - patch_file: "patches/0001-answer.patch"
      patch_description: "fix the answer"
"#;

const PATCH: &str = "\
--- a/hello.c
+++ b/hello.c
@@ -1,1 +1,1 @@
-int answer(void) { return 41; }
+int answer(void) { return 42; }
";

#[test]
fn test_conandata_patch_applied_once_per_build() {
    let tmp = TempDir::new().unwrap();
    let recipe_dir = tmp.path().join("hello");
    write(
        &recipe_dir,
        &[
            ("recipe.toml", HELLO),
            ("conandata.yml", CONANDATA),
            ("patches/0001-answer.patch", PATCH),
            ("src/hello.c", "int answer(void) { return 41; }\n"),
        ],
    );
    let recipe = load_recipe(&recipe_dir).unwrap();
    assert!(recipe.has_hook(Hook::Source));
    let index = MemoryIndex::new();
    let cache = Cache::new(tmp.path().join("cache"));
    let engine = Engine::new(&index, cache.clone(), linux(), linux());

    let mut packaged = Vec::new();
    for _ in 0..2 {
        let graph = engine.create(recipe.clone()).unwrap();
        let root = graph.root();
        assert!(root.instance.trace.contains(&Hook::Source));
        let folder = cache.package_dir(root.reference(), root.package_id.as_deref().unwrap());
        packaged.push(fs::read_to_string(folder.join("src/hello.c")).unwrap());
    }
    assert_eq!(packaged[0], "int answer(void) { return 42; }\n");
    assert_eq!(packaged[0], packaged[1]);

    // The recipe folder itself is never patched.
    let original = fs::read_to_string(recipe_dir.join("src/hello.c")).unwrap();
    assert!(original.contains("41"));
}
