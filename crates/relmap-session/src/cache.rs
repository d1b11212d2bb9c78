//! Per-engine descriptor cache.

use crate::relation;
use relmap_core::{Model, ModelDescriptor, Result, TargetModel};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Resolves each model type's descriptor once and shares it afterwards.
///
/// A descriptor is cached only once it builds and every association on it
/// can be joined. Failed builds are not cached; the configuration error is
/// reported again on every use.
#[derive(Debug, Default)]
pub struct DescriptorCache {
    entries: RwLock<HashMap<TypeId, Arc<ModelDescriptor>>>,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<M: Model>(&self) -> Result<Arc<ModelDescriptor>> {
        self.get_or_describe(TypeId::of::<M>(), M::describe)
    }

    pub fn target(&self, target: &TargetModel) -> Result<Arc<ModelDescriptor>> {
        self.get_or_describe(target.type_id(), || target.describe())
    }

    fn get_or_describe(
        &self,
        type_id: TypeId,
        describe: impl FnOnce() -> Result<ModelDescriptor>,
    ) -> Result<Arc<ModelDescriptor>> {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(descriptor) = entries.get(&type_id) {
                return Ok(Arc::clone(descriptor));
            }
        }

        let descriptor = describe()?;
        relation::check_associations(&descriptor)?;
        let descriptor = Arc::new(descriptor);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(entries.entry(type_id).or_insert(descriptor)))
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
