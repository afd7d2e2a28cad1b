//! Module registry
//!
//! Built once at startup, read-only afterwards. Declaration order is kept so
//! menu numbering is stable between runs.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::types::{Module, ModuleKind};

/// The set of modules available to a session
#[derive(Debug, Clone, Default)]
pub struct Registry {
    modules: Vec<Module>,
}

impl Registry {
    /// Create a registry from modules in declaration order
    pub fn new(modules: Vec<Module>) -> Result<Self> {
        let mut seen = HashSet::new();
        for module in &modules {
            if !seen.insert(module.id.as_str()) {
                return Err(Error::DuplicateModule {
                    id: module.id.clone(),
                });
            }
        }
        log::debug!("Registered {} modules", modules.len());
        Ok(Self { modules })
    }

    /// Find a module by id
    pub fn lookup(&self, id: &str) -> Result<&Module> {
        self.modules
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| Error::ModuleNotFound { id: id.to_string() })
    }

    /// All modules, in declaration order
    pub fn list(&self) -> &[Module] {
        &self.modules
    }

    /// Hardening modules only, in declaration order
    pub fn hardening(&self) -> impl Iterator<Item = &Module> {
        self.modules
            .iter()
            .filter(|m| m.kind == ModuleKind::Hardening)
    }

    /// The module that generates audit reports
    pub fn report_module(&self, id: &str) -> Result<&Module> {
        let module = self.lookup(id)?;
        if module.kind == ModuleKind::AuditReport {
            Ok(module)
        } else {
            log::warn!("Module '{}' is not an audit-report module", id);
            Err(Error::ModuleNotFound { id: id.to_string() })
        }
    }
}
