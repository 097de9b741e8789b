// Dashboard module - mounts one data binding per block
//
// Stands in for the rendering layer: it owns the bindings of the blocks that
// are currently on screen and drives their start/stop lifecycle.

mod definition;

pub use definition::{BlockDescriptor, DashboardDefinition};

use crate::binding::{BindingState, BlockBinding};
use crate::source::{DataSourceDescriptor, Resolver};
use crate::{Result, VigilError};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Bindings of all mounted blocks, keyed by block id
pub struct Dashboard {
    resolver: Arc<dyn Resolver>,
    bindings: DashMap<String, BlockBinding>,
}

impl Dashboard {
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self {
            resolver,
            bindings: DashMap::new(),
        }
    }

    /// Mount a block and start its binding.
    ///
    /// Mounting an id that is already mounted tears the old binding down first.
    pub fn mount(&self, block: &BlockDescriptor) -> watch::Receiver<BindingState> {
        let mut binding = BlockBinding::new(
            block.id.clone(),
            block.data_source.clone(),
            self.resolver.clone(),
        );

        if let Some((_, mut previous)) = self.bindings.remove(&block.id) {
            previous.stop();
        }
        binding.start();
        let rx = binding.subscribe();
        self.bindings.insert(block.id.clone(), binding);

        info!(
            target: "dashboard",
            block = %block.id,
            bound = block.data_source.is_some(),
            "Mounted block"
        );
        rx
    }

    /// Mount every block of a definition.
    pub fn mount_all(&self, definition: &DashboardDefinition) {
        for block in &definition.blocks {
            self.mount(block);
        }
    }

    /// Unmount a block; returns whether it was mounted.
    pub fn unmount(&self, block_id: &str) -> bool {
        match self.bindings.remove(block_id) {
            Some((_, mut binding)) => {
                binding.stop();
                info!(target: "dashboard", block = %block_id, "Unmounted block");
                true
            }
            None => false,
        }
    }

    pub fn unmount_all(&self) {
        let ids: Vec<String> = self.block_ids();
        for id in ids {
            self.unmount(&id);
        }
    }

    /// Rebind a mounted block to a different data source.
    ///
    /// Returns `Ok(false)` when the descriptor is unchanged.
    pub fn update_source(
        &self,
        block_id: &str,
        descriptor: Option<DataSourceDescriptor>,
    ) -> Result<bool> {
        let mut binding = self.bindings.get_mut(block_id).ok_or_else(|| {
            VigilError::DashboardError(format!("block '{}' is not mounted", block_id))
        })?;

        let changed = binding.replace_descriptor(descriptor);
        if changed {
            // A block that had no source was never started
            binding.start();
            info!(target: "dashboard", block = %block_id, "Rebound block data source");
        }
        Ok(changed)
    }

    pub fn state(&self, block_id: &str) -> Option<BindingState> {
        self.bindings.get(block_id).map(|b| b.state())
    }

    pub fn subscribe(&self, block_id: &str) -> Option<watch::Receiver<BindingState>> {
        self.bindings.get(block_id).map(|b| b.subscribe())
    }

    pub fn is_mounted(&self, block_id: &str) -> bool {
        self.bindings.contains_key(block_id)
    }

    pub fn block_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.bindings.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.unmount_all();
    }
}
