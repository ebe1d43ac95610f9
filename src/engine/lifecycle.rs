//! The per-node state machine over the hook order.
//!
//! Every hook goes through [`call`], which records it in the instance
//! trace, points `cwd` at the folder the hook works in, and tags errors
//! with the hook name. The rest of this module strings hooks together for
//! the export, configure, build and package_info phases.

use std::path::Path;

use anyhow::{Context, Result};

use crate::core::errors::{as_invalid_configuration, RecipeError};
use crate::core::hooks::Hook;
use crate::core::instance::Instance;
use crate::core::options::OptionValue;
use crate::core::recipe::{Implement, PackageType, Recipe};
use crate::engine::analysis;
use crate::tools::files::{copy_with, CopyOptions};
use crate::util::fs::{copy_dir_all, ensure_dir};

/// An option value pushed onto a node before its `configure()`.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionOverride {
    pub name: String,
    pub value: OptionValue,
    /// Unknown options are an error instead of being skipped.
    pub strict: bool,
    /// Who asked for it, for messages.
    pub origin: String,
}

impl OptionOverride {
    pub fn new(name: &str, value: OptionValue, origin: impl Into<String>) -> Self {
        OptionOverride {
            name: name.to_string(),
            value,
            strict: false,
            origin: origin.into(),
        }
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }
}

/// Run one hook if the recipe defines it. Returns whether it ran.
pub fn call(recipe: &Recipe, cx: &mut Instance, hook: Hook) -> Result<bool> {
    let Some(f) = recipe.hook(hook) else {
        return Ok(false);
    };
    if let Some(cwd) = hook_cwd(cx, hook) {
        cx.cwd = cwd;
    }
    tracing::info!("{}: calling {}()", cx.reference, hook);
    cx.trace.push(hook);
    cx.current_hook = Some(hook);
    let result = f(cx);
    cx.current_hook = None;
    result.with_context(|| format!("{}: error in {}()", cx.reference, hook))?;
    Ok(true)
}

fn hook_cwd(cx: &Instance, hook: Hook) -> Option<std::path::PathBuf> {
    match hook {
        Hook::ExportSources => Some(cx.folders.export_sources.clone()),
        Hook::Source => Some(cx.source_folder()),
        Hook::Generate => Some(cx.generators_folder()),
        Hook::Build | Hook::Package => Some(cx.build_folder()),
        Hook::PackageInfo => Some(cx.folders.package.clone()),
        _ => cx.folders.recipe.clone(),
    }
}

/// Copy the recipe files into `export_dir` and run `export_sources()`.
///
/// `export_dir` must be freshly created (see `Cache::begin_export`).
pub fn export(recipe: &Recipe, cx: &mut Instance, export_dir: &Path) -> Result<()> {
    let recipe_out = export_dir.join("export");
    let sources_out = export_dir.join("export_sources");
    ensure_dir(&recipe_out)?;
    ensure_dir(&sources_out)?;
    cx.folders.export_sources = sources_out.clone();

    if let Some(folder) = &recipe.recipe_folder {
        let keep = CopyOptions {
            keep_path: true,
            excludes: Vec::new(),
        };
        let mut patterns = vec![
            crate::core::manifest::RECIPE_FILE.to_string(),
            crate::core::manifest::CONANDATA_FILE.to_string(),
        ];
        patterns.extend(recipe.metadata.exports.iter().cloned());
        for pattern in &patterns {
            copy_with(cx, pattern, folder, &recipe_out, &keep)?;
        }
        for pattern in &recipe.metadata.exports_sources {
            copy_with(cx, pattern, folder, &sources_out, &keep)?;
        }
    }
    call(recipe, cx, Hook::ExportSources)?;
    Ok(())
}

/// Reject override values outside their option's domain before any hook
/// runs.
pub fn check_overrides(cx: &Instance, overrides: &[OptionOverride]) -> Result<()> {
    for o in overrides {
        match cx.options.domain(&o.name) {
            Some(domain) if !domain.allows(&o.value) => {
                return Err(RecipeError::OptionValueNotAllowed {
                    option: o.name.clone(),
                    value: o.value.to_string(),
                    allowed: domain.describe(),
                })
                .with_context(|| format!("{}: invalid option from {}", cx.reference, o.origin));
            }
            None if o.strict => {
                return Err(RecipeError::UnknownOption {
                    option: o.name.clone(),
                })
                .with_context(|| format!("{}: invalid option from {}", cx.reference, o.origin));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Settle options and declare requirements: `config_options()`,
/// overrides, `configure()`, `layout()`, `requirements()`,
/// `build_requirements()`.
pub fn configure(recipe: &Recipe, cx: &mut Instance, overrides: &[OptionOverride]) -> Result<()> {
    check_overrides(cx, overrides)?;

    cx.options.set_removable(true);
    let result = configure_options(recipe, cx, overrides);
    cx.options.set_removable(false);
    result?;

    if recipe.metadata.is_c_only() {
        cx.settings.rm_safe("compiler.libcxx");
        cx.settings.rm_safe("compiler.cppstd");
    }
    cx.options
        .validate()
        .with_context(|| format!("{}: invalid options after configure()", cx.reference))?;
    cx.package_type = recipe.metadata.package_type.resolve(&cx.options);

    call(recipe, cx, Hook::Layout)?;
    call(recipe, cx, Hook::Requirements)?;
    call(recipe, cx, Hook::BuildRequirements)?;
    Ok(())
}

fn configure_options(recipe: &Recipe, cx: &mut Instance, overrides: &[OptionOverride]) -> Result<()> {
    let auto_fpic = recipe.metadata.implements(Implement::AutoSharedFpic);

    call(recipe, cx, Hook::ConfigOptions)?;
    if auto_fpic && cx.settings.os() == Some("Windows") {
        cx.options.rm_safe("fPIC")?;
    }

    for o in overrides {
        // Unknown strict overrides were rejected up front.
        if !cx.options.contains(&o.name) {
            tracing::debug!(
                "{}: skipping option `{}` from {}, not present",
                cx.reference,
                o.name,
                o.origin
            );
            continue;
        }
        cx.options
            .set(&o.name, o.value.clone())
            .with_context(|| format!("{}: option from {}", cx.reference, o.origin))?;
    }

    call(recipe, cx, Hook::Configure)?;
    if auto_fpic {
        let header_only = recipe.metadata.package_type.resolve(&cx.options) == PackageType::HeaderLibrary;
        if header_only || cx.settings.os() == Some("Windows") {
            cx.options.rm_safe("shared")?;
            cx.options.rm_safe("fPIC")?;
        } else if cx.options.is_true("shared") {
            cx.options.rm_safe("fPIC")?;
        }
    }
    Ok(())
}

/// Outcome of a validation hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validity {
    Valid,
    Invalid(String),
}

/// Run a validation hook, turning `InvalidConfiguration` into
/// [`Validity::Invalid`].
pub fn validate(recipe: &Recipe, cx: &mut Instance, hook: Hook) -> Result<Validity> {
    debug_assert!(hook.is_validation());
    match call(recipe, cx, hook) {
        Ok(_) => Ok(Validity::Valid),
        Err(e) => match as_invalid_configuration(&e) {
            Some(invalid) => {
                tracing::warn!("{}: invalid configuration: {}", cx.reference, invalid.reason);
                Ok(Validity::Invalid(invalid.reason.clone()))
            }
            None => Err(e),
        },
    }
}

/// `source()`, `generate()`, `build()`, `package()` in a prepared
/// sandbox.
pub fn build(recipe: &Recipe, cx: &mut Instance) -> Result<()> {
    let base_source = cx.folders.base_source.clone();
    ensure_dir(&base_source)?;
    if cx.folders.export_sources.is_dir() {
        copy_dir_all(&cx.folders.export_sources, &base_source).with_context(|| {
            format!("{}: failed to copy exported sources", cx.reference)
        })?;
    }
    ensure_dir(&cx.source_folder())?;
    call(recipe, cx, Hook::Source)?;

    ensure_dir(&cx.build_folder())?;
    ensure_dir(&cx.generators_folder())?;
    call(recipe, cx, Hook::Generate)?;
    call(recipe, cx, Hook::Build)?;

    ensure_dir(&cx.folders.package)?;
    call(recipe, cx, Hook::Package)?;
    Ok(())
}

/// Re-run `package_id()` after packaging; the id must not move.
pub fn confirm_package_id(recipe: &Recipe, cx: &mut Instance, expected: &str) -> Result<()> {
    cx.info = analysis::binary_info(recipe, cx);
    call(recipe, cx, Hook::PackageId)?;
    let actual = cx.info.package_id();
    if actual != expected {
        return Err(RecipeError::PackageIdChanged {
            reference: cx.reference.to_string(),
            before: expected.to_string(),
            after: actual,
        }
        .into());
    }
    Ok(())
}

/// `package_info()` plus the defaults and checks around it.
pub fn package_info(recipe: &Recipe, cx: &mut Instance) -> Result<()> {
    if !recipe.has_hook(Hook::PackageInfo) && cx.package_type == PackageType::HeaderLibrary {
        cx.cpp_info = crate::core::cpp_info::CppInfo::header_only();
    }
    call(recipe, cx, Hook::PackageInfo)?;
    cx.cpp_info.validate(
        cx.name(),
        cx.package_type == PackageType::HeaderLibrary,
        &cx.dependencies.component_names(),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::options::OptionDomain;
    use crate::core::recipe::Language;
    use crate::test_support::fixtures;
    use crate::test_support::assertions::assert_error_contains;

    #[test]
    fn test_shared_removes_fpic() {
        let recipe = fixtures::library_recipe("zlib", "1.3.1", &[]);
        let mut cx = fixtures::instance_of(&recipe, fixtures::linux_settings());
        let shared = OptionOverride::new("shared", true.into(), "profile");
        configure(&recipe, &mut cx, &[shared]).unwrap();
        assert!(cx.options.is_true("shared"));
        assert!(cx.options.get_safe("fPIC").is_none());
        assert_eq!(cx.package_type, PackageType::SharedLibrary);
    }

    #[test]
    fn test_windows_removes_both() {
        let recipe = fixtures::library_recipe("zlib", "1.3.1", &[]);
        let mut cx = fixtures::instance_of(&recipe, fixtures::windows_settings());
        let shared = OptionOverride::new("shared", true.into(), "profile");
        configure(&recipe, &mut cx, &[shared]).unwrap();
        assert!(cx.options.get_safe("shared").is_none());
        assert!(cx.options.get_safe("fPIC").is_none());
    }

    #[test]
    fn test_bad_override_runs_no_hook() {
        let recipe = fixtures::backend_recipe("pocketpy", "1.4.6");
        let mut cx = fixtures::instance_of(&recipe, fixtures::linux_settings());
        let bad = OptionOverride::new("backend", "tcp".into(), "profile");
        assert_error_contains(configure(&recipe, &mut cx, &[bad]), "backend");
        assert!(cx.trace.is_empty());
    }

    #[test]
    fn test_override_before_configure() {
        let recipe = Recipe::builder("libcurl")
            .version("8.5.0")
            .option("with_ssl", OptionDomain::boolean(), false)
            .option("with_zlib", OptionDomain::boolean(), true)
            .hook(Hook::Configure, |cx| {
                if cx.options.is_true("with_ssl") {
                    cx.options.set("with_zlib", false)?;
                }
                Ok(())
            })
            .build()
            .unwrap();
        let mut cx = fixtures::instance_of(&recipe, fixtures::linux_settings());
        let ssl = OptionOverride::new("with_ssl", true.into(), "consumer");
        configure(&recipe, &mut cx, &[ssl]).unwrap();
        assert!(!cx.options.is_true("with_zlib"));
        assert_eq!(cx.trace, vec![Hook::Configure]);
    }

    #[test]
    fn test_removed_option_override_is_skipped() {
        let recipe = fixtures::library_recipe("zlib", "1.3.1", &[]);
        let mut cx = fixtures::instance_of(&recipe, fixtures::windows_settings());
        let fpic = OptionOverride::new("fPIC", true.into(), "consumer");
        configure(&recipe, &mut cx, &[fpic]).unwrap();
        assert!(cx.options.get_safe("fPIC").is_none());
    }

    #[test]
    fn test_c_only_drops_cpp_settings() {
        let recipe = Recipe::builder("zlib")
            .version("1.3.1")
            .languages([Language::C])
            .build()
            .unwrap();
        let mut cx = fixtures::instance_of(&recipe, fixtures::linux_settings());
        configure(&recipe, &mut cx, &[]).unwrap();
        assert!(!cx.settings.contains("compiler.cppstd"));
        assert!(!cx.settings.contains("compiler.libcxx"));
        assert!(cx.settings.contains("compiler.version"));
    }

    #[test]
    fn test_remove_outside_configure_fails() {
        let recipe = Recipe::builder("zlib")
            .version("1.3.1")
            .shared_fpic_options()
            .hook(Hook::Layout, |cx| {
                cx.options.rm_safe("fPIC")?;
                Ok(())
            })
            .build()
            .unwrap();
        let mut cx = fixtures::instance_of(&recipe, fixtures::linux_settings());
        assert_error_contains(configure(&recipe, &mut cx, &[]), "error in layout()");
    }

    #[test]
    fn test_validate_invalid() {
        let recipe = fixtures::posix_only_recipe("libuv", "1.47.0");
        let mut cx = fixtures::instance_of(&recipe, fixtures::windows_settings());
        let validity = validate(&recipe, &mut cx, Hook::Validate).unwrap();
        assert_eq!(
            validity,
            Validity::Invalid("libuv/1.47.0 requires a POSIX system".into())
        );

        let mut cx = fixtures::instance_of(&recipe, fixtures::linux_settings());
        assert_eq!(validate(&recipe, &mut cx, Hook::Validate).unwrap(), Validity::Valid);
    }

    #[test]
    fn test_validate_other_error_propagates() {
        let recipe = Recipe::builder("broken")
            .version("1.0")
            .hook(Hook::Validate, |_| anyhow::bail!("boom"))
            .build()
            .unwrap();
        let mut cx = fixtures::instance_of(&recipe, fixtures::linux_settings());
        assert!(validate(&recipe, &mut cx, Hook::Validate).is_err());
    }

    #[test]
    fn test_build_runs_in_order() {
        let tmp = tempfile::TempDir::new().unwrap();
        let recipe = fixtures::header_only_recipe("mdspan", "0.6.0");
        let mut cx = fixtures::sandboxed(tmp.path(), "mdspan", "0.6.0", fixtures::linux_settings());
        cx.metadata = recipe.metadata.clone();
        cx.package_type = PackageType::HeaderLibrary;
        build(&recipe, &mut cx).unwrap();
        package_info(&recipe, &mut cx).unwrap();
        assert!(crate::core::hooks::is_ordered_trace(&cx.trace));
        assert!(cx.package_folder().join("include/mdspan.h").is_file());
        assert!(cx.cpp_info.root.libs.is_empty());
    }
}
