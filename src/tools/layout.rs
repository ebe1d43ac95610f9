//! Canned folder layouts for `layout()`.

use crate::core::instance::Instance;

/// `build-<build_type>` with generators in `build-<build_type>/conan`.
pub fn basic_layout(cx: &mut Instance, src_folder: &str) {
    let build = match cx.settings.build_type() {
        Some(bt) => format!("build-{}", bt.to_lowercase()),
        None => "build".to_string(),
    };
    cx.folders.source = src_folder.to_string();
    cx.folders.generators = format!("{}/conan", build);
    cx.folders.build = build;
}

/// `build/<BuildType>` with generators in `build/<BuildType>/generators`.
///
/// Multi-config generators (Visual Studio, Ninja Multi-Config) share one
/// `build` folder across configurations.
pub fn cmake_layout(cx: &mut Instance, src_folder: &str) {
    let generator = cx
        .conf
        .get_str(crate::core::conf::keys::CMAKE_GENERATOR)
        .unwrap_or_default();
    let multi = generator.contains("Visual Studio")
        || generator.contains("Multi-Config")
        || (generator.is_empty() && cx.settings.compiler() == Some("msvc"));
    let build = match cx.settings.build_type() {
        Some(bt) if !multi => format!("build/{}", bt),
        _ => "build".to_string(),
    };
    cx.folders.source = src_folder.to_string();
    cx.folders.generators = format!("{}/generators", build);
    cx.folders.build = build;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixtures;

    #[test]
    fn test_basic_layout() {
        let mut cx = fixtures::instance("pkg", "1.0", fixtures::linux_settings());
        basic_layout(&mut cx, "src");
        assert_eq!(cx.folders.source, "src");
        assert_eq!(cx.folders.build, "build-release");
        assert_eq!(cx.folders.generators, "build-release/conan");
    }

    #[test]
    fn test_cmake_layout() {
        let mut cx = fixtures::instance("pkg", "1.0", fixtures::linux_settings());
        cmake_layout(&mut cx, ".");
        assert_eq!(cx.folders.build, "build/Release");
        assert_eq!(cx.folders.generators, "build/Release/generators");

        let mut win = fixtures::instance("pkg", "1.0", fixtures::windows_settings());
        cmake_layout(&mut win, "src");
        assert_eq!(win.folders.build, "build");
        assert_eq!(win.folders.generators, "build/generators");
    }
}
