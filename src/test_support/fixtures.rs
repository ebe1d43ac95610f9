//! Test fixtures: settings, instances, dependencies and small recipes.

use std::path::Path;
use std::sync::Arc;

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::core::conf::Conf;
use crate::core::cpp_info::CppInfo;
use crate::core::env_info::Environment;
use crate::core::hooks::Hook;
use crate::core::instance::{Dependency, Folders, Instance};
use crate::core::options::{OptionDomain, Options};
use crate::core::recipe::{Implement, Language, PackageType, Recipe, RecipeMetadata};
use crate::core::reference::ResolvedRef;
use crate::core::requirement::EdgeTraits;
use crate::core::settings::Settings;
use crate::core::version::Version;
use crate::core::errors::InvalidConfiguration;

/// Linux x86_64, gcc 11, libstdc++11, Release.
pub fn linux_settings() -> Settings {
    Settings::from_pairs([
        ("os", "Linux"),
        ("arch", "x86_64"),
        ("compiler", "gcc"),
        ("compiler.version", "11"),
        ("compiler.libcxx", "libstdc++11"),
        ("compiler.cppstd", "17"),
        ("build_type", "Release"),
    ])
}

/// Windows x86_64, msvc 193 with the dynamic runtime, Release.
pub fn windows_settings() -> Settings {
    Settings::from_pairs([
        ("os", "Windows"),
        ("arch", "x86_64"),
        ("compiler", "msvc"),
        ("compiler.version", "193"),
        ("compiler.runtime", "dynamic"),
        ("compiler.cppstd", "17"),
        ("build_type", "Release"),
    ])
}

/// A bare instance with no options and the host as build machine.
pub fn instance(name: &str, version: &str, settings: Settings) -> Instance {
    let metadata = RecipeMetadata {
        name: name.to_string(),
        version: Some(Version::new(version)),
        ..RecipeMetadata::default()
    };
    Instance::new(
        ResolvedRef::from((name, version)),
        Arc::new(metadata),
        settings.clone(),
        settings,
        Options::new(),
        Conf::new(),
    )
}

/// An instance of `recipe` with its default options.
pub fn instance_of(recipe: &Recipe, settings: Settings) -> Instance {
    let version = recipe
        .version()
        .map(|v| v.as_str().to_string())
        .unwrap_or_else(|| "1.0".to_string());
    let options = recipe.metadata.initial_options().unwrap();
    let mut cx = Instance::new(
        ResolvedRef::from((recipe.name(), version.as_str())),
        recipe.metadata.clone(),
        settings.clone(),
        settings,
        options,
        Conf::new(),
    );
    cx.package_type = recipe.metadata.package_type.resolve(&cx.options);
    cx.conan_data = recipe.conan_data.clone();
    cx.folders.recipe = recipe.recipe_folder.clone();
    cx
}

/// An instance whose folders live under `root`, all created, with the
/// working directory at the source folder.
pub fn sandboxed(root: &Path, name: &str, version: &str, settings: Settings) -> Instance {
    let mut cx = instance(name, version, settings);
    cx.folders = Folders::sandbox(root);
    for dir in [
        cx.folders.export_sources.clone(),
        cx.folders.base_source.clone(),
        cx.folders.base_build.clone(),
        cx.folders.package.clone(),
    ] {
        std::fs::create_dir_all(dir).unwrap();
    }
    cx.cwd = cx.source_folder();
    cx
}

/// A direct host dependency packaged at `/pkgs/<name>`.
pub fn dependency(name: &str, version: &str, package_type: PackageType) -> Dependency {
    Dependency {
        reference: ResolvedRef::from((name, version)),
        package_type,
        package_id: None,
        package_folder: Path::new("/pkgs").join(name),
        options: Options::new(),
        settings: linux_settings(),
        cpp_info: CppInfo::new(),
        buildenv_info: Environment::new(),
        runenv_info: Environment::new(),
        conf_info: Conf::new(),
        traits: EdgeTraits {
            headers: true,
            libs: true,
            run: false,
            visible: true,
            build: false,
            test: false,
            transitive_headers: false,
            transitive_libs: false,
        },
        direct: true,
        requires: Vec::new(),
    }
}

/// A gzipped tarball holding `(path, content)` entries.
pub fn tarball(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, content.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Header-only recipe that packages `include/<name>.h`.
pub fn header_only_recipe(name: &str, version: &str) -> Recipe {
    let header = format!("{}.h", name);
    Recipe::builder(name)
        .version(version)
        .package_type(PackageType::HeaderLibrary)
        .settings(["os", "arch", "compiler", "build_type"])
        .implements([Implement::AutoHeaderOnly])
        .hook(Hook::Package, move |cx| {
            let path = cx.package_folder().join("include").join(&header);
            std::fs::create_dir_all(path.parent().unwrap_or(cx.package_folder()))?;
            std::fs::write(path, "#pragma once\n")?;
            Ok(())
        })
        .hook(Hook::PackageInfo, |cx| {
            cx.cpp_info = CppInfo::header_only();
            Ok(())
        })
        .build()
        .unwrap()
}

/// C library with `shared`/`fPIC`, the shared/fPIC canned behavior and
/// one requirement per entry of `requires`.
pub fn library_recipe(name: &str, version: &str, requires: &[&str]) -> Recipe {
    let requires: Vec<String> = requires.iter().map(|r| r.to_string()).collect();
    let lib = name.to_string();
    let mut builder = Recipe::builder(name)
        .version(version)
        .package_type(PackageType::Library)
        .settings(["os", "arch", "compiler", "build_type"])
        .languages([Language::C])
        .shared_fpic_options()
        .implements([Implement::AutoSharedFpic])
        .hook(Hook::Package, {
            let lib = lib.clone();
            move |cx| {
                let dir = cx.package_folder().join("lib");
                std::fs::create_dir_all(&dir)?;
                std::fs::write(dir.join(format!("lib{}.a", lib)), "")?;
                Ok(())
            }
        })
        .hook(Hook::PackageInfo, move |cx| {
            cx.cpp_info.root.libs = vec![lib.clone()];
            Ok(())
        });
    if !requires.is_empty() {
        builder = builder.hook(Hook::Requirements, move |cx| {
            for r in &requires {
                cx.requires(r)?;
            }
            Ok(())
        });
    }
    builder.build().unwrap()
}

/// Library whose `validate()` rejects Windows.
pub fn posix_only_recipe(name: &str, version: &str) -> Recipe {
    Recipe::builder(name)
        .version(version)
        .package_type(PackageType::StaticLibrary)
        .settings(["os", "arch", "compiler", "build_type"])
        .hook(Hook::Validate, |cx| {
            if cx.settings.is("os", "Windows") {
                return Err(InvalidConfiguration::new(format!("{} requires a POSIX system", cx.reference)).into());
            }
            Ok(())
        })
        .build()
        .unwrap()
}

/// Recipe with a `backend` option limited to `c`/`pico`.
pub fn backend_recipe(name: &str, version: &str) -> Recipe {
    Recipe::builder(name)
        .version(version)
        .option("backend", OptionDomain::values(["c", "pico"]), "c")
        .build()
        .unwrap()
}
