use std::{fs, path::Path};

use log::info;
use rkyv::AlignedVec;

use crate::errors::{Error, Result};

use self::osm::Entity;

pub mod header;
pub mod osm;

/// One block of entities. Encoding takes ownership of the whole buffer.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Buffer {
    entities: Vec<Entity>,
}

impl Buffer {
    pub fn new() -> Self {
        Buffer::default()
    }

    pub fn push(&mut self, entity: impl Into<Entity>) {
        self.entities.push(entity.into());
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entity> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Splits a stream of entities into buffers of at most `block_size` entities,
    /// keeping their order.
    pub fn split_into_blocks(entities: Vec<Entity>, block_size: usize) -> Vec<Buffer> {
        let block_size = block_size.max(1);
        let mut blocks = Vec::with_capacity(entities.len().div_ceil(block_size));
        let mut iter = entities.into_iter();
        loop {
            let block: Vec<Entity> = iter.by_ref().take(block_size).collect();
            if block.is_empty() {
                break;
            }
            blocks.push(Buffer::from(block));
        }
        blocks
    }
}

impl From<Vec<Entity>> for Buffer {
    fn from(entities: Vec<Entity>) -> Self {
        Buffer { entities }
    }
}

impl<'a> IntoIterator for &'a Buffer {
    type Item = &'a Entity;
    type IntoIter = std::slice::Iter<'a, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.iter()
    }
}

/// Reads entities cached by an upstream parser as an rkyv archive.
pub fn load_entity_cache(path: &Path) -> Result<Vec<Entity>> {
    let bytes = fs::read(path)?;
    let mut aligned = AlignedVec::with_capacity(bytes.len());
    aligned.extend_from_slice(&bytes);
    let entities = rkyv::from_bytes::<Vec<Entity>>(&aligned)
        .map_err(|err| Error::decode(format!("Could not deserialize entity cache: {err:?}")))?;
    info!(path = path.display().to_string(), entities = entities.len(); "Loaded entity cache");
    Ok(entities)
}

#[allow(clippy::ptr_arg)]
pub fn save_entity_cache(path: &Path, entities: &Vec<Entity>) -> Result<()> {
    let bytes = rkyv::to_bytes::<_, 256>(entities)
        .map_err(|err| Error::decode(format!("Could not serialize entity cache: {err:?}")))?;
    fs::write(path, bytes.as_slice())?;
    Ok(())
}
