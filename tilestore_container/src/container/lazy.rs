//! A container that reads on first access and keeps the data without a budget.

use super::{Binding, ContainerStats, DataContainer, LoadSlot};
use crate::GridReader;
use anyhow::Result;
use async_trait::async_trait;
use std::{fmt, sync::Arc};
use tilestore_core::{LoadingPolicy, ReadOnlyBlob};
use uuid::Uuid;

#[derive(Default)]
pub struct LazyContainer {
	binding: Binding,
	slot: LoadSlot,
}

impl LazyContainer {
	pub fn new() -> LazyContainer {
		LazyContainer::default()
	}
}

#[async_trait]
impl DataContainer for LazyContainer {
	async fn bind(&self, reader: Arc<dyn GridReader>) -> Result<()> {
		self.binding.bind(reader, |id| self.slot.reset(id));
		Ok(())
	}

	fn identifier(&self) -> Option<Uuid> {
		self.binding.id()
	}

	fn policy(&self) -> LoadingPolicy {
		LoadingPolicy::Lazy
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

impl fmt::Debug for LazyContainer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LazyContainer")
			.field("id", &self.binding.id())
			.field("occupied_bytes", &self.slot.occupied_bytes())
			.finish()
	}
}
