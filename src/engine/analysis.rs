//! Binary identity: the info view a package id is hashed from.

use anyhow::Result;

use crate::core::hooks::Hook;
use crate::core::instance::{Dependency, Instance};
use crate::core::package_info::{BinaryInfo, RequireInfo, RequireMode};
use crate::core::recipe::{Implement, PackageType, Recipe};
use crate::engine::lifecycle;

/// The default info view of a configured instance.
///
/// The view names the package itself. Settings are limited to the ones the
/// recipe declares, options are the settled values, and every non-test
/// host dependency contributes a requirement entry.
pub fn binary_info(recipe: &Recipe, cx: &Instance) -> BinaryInfo {
    let settings = cx.settings.filtered(&recipe.metadata.settings);
    let options = cx.options.sorted();
    let requires = cx
        .dependencies
        .host()
        .filter(|d| !d.traits.test)
        .map(|d| RequireInfo {
            name: d.name().to_string(),
            version: d.version().clone(),
            package_id: d.package_id.clone(),
            mode: require_mode(cx.package_type, d),
        })
        .collect();
    let mut info = BinaryInfo::new(cx.reference.to_string(), settings, options, requires);
    if recipe.metadata.implements(Implement::AutoHeaderOnly)
        && cx.package_type == PackageType::HeaderLibrary
    {
        info.clear();
    }
    info
}

/// How much of a dependency leaks into the consumer's id.
///
/// Static and header code linked into a shared library or application is
/// embedded in it, so the exact dependency binary matters. Anything else
/// only tracks the dependency's minor version.
fn require_mode(consumer: PackageType, dependency: &Dependency) -> RequireMode {
    let embeds = matches!(
        consumer,
        PackageType::SharedLibrary | PackageType::Application
    ) && matches!(
        dependency.package_type,
        PackageType::StaticLibrary | PackageType::HeaderLibrary
    );
    if embeds && (dependency.traits.libs || dependency.traits.headers) {
        RequireMode::PackageId
    } else {
        RequireMode::Minor
    }
}

/// Evaluate `package_id()` on a detached copy of the instance.
///
/// The copy's trace and any side effects of the hook are discarded; only
/// the resulting info view is returned.
pub fn compute(recipe: &Recipe, cx: &Instance) -> Result<(String, BinaryInfo)> {
    let mut detached = cx.clone();
    detached.info = binary_info(recipe, cx);
    lifecycle::call(recipe, &mut detached, Hook::PackageId)?;
    let id = detached.info.package_id();
    tracing::debug!("{}: package id {}", cx.reference, id);
    Ok((id, detached.info))
}
