//! The authoritative table of loaded modules.
//!
//! [`ModuleRegistry`] maps normalized file names to [`Module`]s and keeps a
//! reverse index from base address to name, so both `GetModuleHandle`-class
//! queries and the handle-to-module step of `GetProcAddress` are O(1).
//!
//! The registry is plain data: it performs no locking of its own. Per the
//! concurrency model, the owning [`Loader`](crate::loader::Loader) serializes
//! all access behind a single `RwLock` so a half-registered module is never
//! observable.

use std::collections::HashMap;

use crate::{loader::Module, Error, Result};

/// Registry of currently loaded modules.
///
/// Invariants, enforced on [`register`](Self::register):
/// - every module has a unique normalized name
/// - every module has a unique base address
///
/// Lookups are case-insensitive; only the lower-cased canonical key is stored.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    /// Modules keyed by normalized name.
    modules: HashMap<String, Module>,
    /// Reverse index: base address to normalized name.
    by_base: HashMap<u64, String>,
}

impl ModuleRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a module. The module's name is lower-cased to form the
    /// canonical key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyRegistered`] if the module's name or base
    /// address is already taken. A module is never silently remapped.
    pub fn register(&mut self, mut module: Module) -> Result<()> {
        module.name.make_ascii_lowercase();

        if let Some(existing) = self.modules.get(&module.name) {
            return Err(Error::AlreadyRegistered {
                name: module.name.clone(),
                base: existing.base_address,
            });
        }
        if let Some(name) = self.by_base.get(&module.base_address) {
            return Err(Error::AlreadyRegistered {
                name: name.clone(),
                base: module.base_address,
            });
        }

        self.by_base.insert(module.base_address, module.name.clone());
        self.modules.insert(module.name.clone(), module);
        Ok(())
    }

    /// Returns the base address registered under `name`, case-insensitively.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<u64> {
        self.by_name(name).map(|module| module.base_address)
    }

    /// Returns the module registered under `name`, case-insensitively.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&Module> {
        if let Some(module) = self.modules.get(name) {
            return Some(module);
        }
        self.modules.get(&name.to_lowercase())
    }

    /// Returns the module whose base address equals `handle`.
    #[must_use]
    pub fn by_handle(&self, handle: u64) -> Option<&Module> {
        let name = self.by_base.get(&handle)?;
        self.modules.get(name)
    }

    /// Returns a mutable reference to the module registered under `name`.
    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut Module> {
        if self.modules.contains_key(name) {
            return self.modules.get_mut(name);
        }
        self.modules.get_mut(&name.to_lowercase())
    }

    /// Returns `true` if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name(name).is_some()
    }

    /// Number of registered modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` if no modules are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Iterates all registered modules in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }
}
