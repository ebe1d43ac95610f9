//! Shared recipe helper modules, the stand-in for importing another recipe
//! as a code library.
//!
//! Modules live in a process-wide registry and are bound lazily the first
//! time any recipe asks for one. A recipe must declare the module in its
//! `python_requires` before it can look it up.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

use anyhow::{anyhow, Result};

/// A helper module recipes can call into.
pub trait RecipeModule: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}

type Registry = RwLock<HashMap<String, Arc<dyn RecipeModule>>>;

static REGISTRY: OnceLock<Registry> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(|| {
        let mut modules: HashMap<String, Arc<dyn RecipeModule>> = HashMap::new();
        let builtins: [Arc<dyn RecipeModule>; 2] = [
            Arc::new(crate::tools::cuda::CudaModule),
            Arc::new(crate::tools::utils::UtilsModule),
        ];
        for module in builtins {
            modules.insert(module.name().to_string(), module);
        }
        RwLock::new(modules)
    })
}

/// Register (or replace) a module under its name.
pub fn register_module(module: Arc<dyn RecipeModule>) {
    let mut modules = registry().write().unwrap_or_else(|e| e.into_inner());
    modules.insert(module.name().to_string(), module);
}

/// Look up a registered module.
pub fn lookup_module(name: &str) -> Option<Arc<dyn RecipeModule>> {
    let modules = registry().read().unwrap_or_else(|e| e.into_inner());
    modules.get(name).cloned()
}

/// Names of all registered modules, sorted.
pub fn module_names() -> Vec<String> {
    let modules = registry().read().unwrap_or_else(|e| e.into_inner());
    let mut names: Vec<String> = modules.keys().cloned().collect();
    names.sort();
    names
}

/// A module bound to a consumer, as returned by `python_requires(name)`.
#[derive(Clone)]
pub struct PythonRequire {
    module: Arc<dyn RecipeModule>,
}

impl PythonRequire {
    pub(crate) fn new(module: Arc<dyn RecipeModule>) -> Self {
        PythonRequire { module }
    }

    pub fn name(&self) -> &str {
        self.module.name()
    }

    /// The module as its concrete type.
    pub fn module<T: RecipeModule>(&self) -> Result<&T> {
        self.module
            .as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| anyhow!("module `{}` has an unexpected type", self.module.name()))
    }
}

impl fmt::Debug for PythonRequire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PythonRequire")
            .field("name", &self.module.name())
            .finish()
    }
}
