//! A container that reads everything when it is bound.

use super::{Binding, ContainerStats, DataContainer, LoadSlot};
use crate::GridReader;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::{fmt, sync::Arc};
use tilestore_core::{LoadingPolicy, ReadOnlyBlob};
use uuid::Uuid;

/// Holds the full data of its reader for as long as it lives.
///
/// [`DataContainer::bind`] reads the data and counts as the one miss; every later lookup is a hit.
/// After [`DataContainer::clear`] the next lookup reads again.
#[derive(Default)]
pub struct MemoryContainer {
	binding: Binding,
	slot: LoadSlot,
}

impl MemoryContainer {
	pub fn new() -> MemoryContainer {
		MemoryContainer::default()
	}
}

#[async_trait]
impl DataContainer for MemoryContainer {
	async fn bind(&self, reader: Arc<dyn GridReader>) -> Result<()> {
		let bound = self.binding.bind(reader, |id| self.slot.reset(id));
		let lookup = self.slot.lookup(bound.id, bound.reader);
		self.binding.record(lookup.outcome());
		let data = lookup.wait().await.context("binding memory container")?;
		log::debug!("memory container {} holds {} bytes", bound.id, data.len());
		Ok(())
	}

	fn identifier(&self) -> Option<Uuid> {
		self.binding.id()
	}

	fn policy(&self) -> LoadingPolicy {
		LoadingPolicy::Memory
	}

	fn reader(&self) -> Option<Arc<dyn GridReader>> {
		self.binding.reader()
	}

	async fn get_read_only_data(&self) -> Result<ReadOnlyBlob> {
		let bound = self.binding.current()?;
		let lookup = self.slot.lookup(bound.id, bound.reader);
		self.binding.record(lookup.outcome());
		Ok(ReadOnlyBlob::from(lookup.wait().await?))
	}

	fn stats(&self) -> ContainerStats {
		self.binding.stats()
	}

	fn occupied_bytes(&self) -> u64 {
		self.slot.occupied_bytes()
	}

	fn clear(&self) -> u64 {
		self.slot.clear()
	}
}

impl fmt::Debug for MemoryContainer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MemoryContainer")
			.field("id", &self.binding.id())
			.field("occupied_bytes", &self.slot.occupied_bytes())
			.finish()
	}
}
