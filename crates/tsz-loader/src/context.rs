//! Build contexts.
//!
//! A host build may spawn child builds (for example a worker bundle compiled
//! alongside the main one). Children link to their parent, and every lookup
//! of a loader instance happens on the root so the whole tree shares one
//! compilation per instance name.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::instance::Instance;

pub struct BuildContext {
    name: String,
    parent: Option<Arc<BuildContext>>,
    instances: Mutex<FxHashMap<String, Arc<Instance>>>,
}

impl BuildContext {
    pub fn root(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            parent: None,
            instances: Mutex::new(FxHashMap::default()),
        })
    }

    pub fn child(parent: &Arc<Self>, name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            parent: Some(Arc::clone(parent)),
            instances: Mutex::new(FxHashMap::default()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<BuildContext>> {
        self.parent.as_ref()
    }

    /// Follow parent links to the top-level build.
    pub fn root_context(&self) -> &BuildContext {
        let mut context = self;
        while let Some(parent) = &context.parent {
            context = parent;
        }
        context
    }

    pub(crate) fn instances(&self) -> &Mutex<FxHashMap<String, Arc<Instance>>> {
        &self.root_context().instances
    }

    pub fn instance(&self, name: &str) -> Option<Arc<Instance>> {
        self.instances().lock().get(name).cloned()
    }

    /// Every instance of the build tree, ordered by name.
    pub fn all_instances(&self) -> Vec<Arc<Instance>> {
        let instances = self.instances().lock();
        let mut all: Vec<_> = instances.values().cloned().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    /// Drop an instance; the next request naming it starts from scratch.
    pub fn remove_instance(&self, name: &str) -> Option<Arc<Instance>> {
        self.instances().lock().remove(name)
    }
}

#[cfg(test)]
#[path = "../tests/context_tests.rs"]
mod context_tests;
