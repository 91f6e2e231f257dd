//! The stage registry: a fixed table of stage definitions.
//!
//! The registry is the single source of truth for canonical order and
//! prerequisites. It is assembled once through [`StageRegistryBuilder`],
//! closed, and never mutated afterwards. Definitions live in a vector
//! sorted by position, with an id -> slot index for lookups.

mod definition;
mod id;

pub use definition::StageDefinition;
pub use id::StageId;

use crate::errors::RegistryError;
use std::collections::HashMap;
use std::sync::LazyLock;

static CANONICAL: LazyLock<StageRegistry> =
    LazyLock::new(|| StageRegistry::from_sorted(canonical_definitions()));

/// The canonical stage table for the microscopy workflow.
fn canonical_definitions() -> Vec<StageDefinition> {
    vec![
        StageDefinition::new(StageId::DataSelection, 1),
        StageDefinition::new(StageId::Segmentation, 2).requires(StageId::DataSelection),
        StageDefinition::new(StageId::ProcessSingleCell, 3),
        StageDefinition::new(StageId::ThresholdGroupedCells, 4),
        StageDefinition::new(StageId::MeasureRoiArea, 5).requires(StageId::ProcessSingleCell),
        StageDefinition::new(StageId::Analysis, 6).requires(StageId::ThresholdGroupedCells),
        StageDefinition::new(StageId::Cleanup, 7).best_effort(),
    ]
}

/// A closed, immutable table of stage definitions.
#[derive(Debug, Clone)]
pub struct StageRegistry {
    /// Definitions sorted by position.
    definitions: Vec<StageDefinition>,
    /// Id to slot in `definitions`.
    index: HashMap<StageId, usize>,
}

impl StageRegistry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> StageRegistryBuilder {
        StageRegistryBuilder::new()
    }

    /// Returns the process-wide canonical registry.
    #[must_use]
    pub fn canonical() -> &'static Self {
        &CANONICAL
    }

    /// Builds the table from definitions already known to be valid.
    fn from_sorted(mut definitions: Vec<StageDefinition>) -> Self {
        definitions.sort_by_key(|d| d.position);
        let index = definitions.iter().enumerate().map(|(slot, d)| (d.id, slot)).collect();
        Self { definitions, index }
    }

    /// Gets the definition of a stage.
    #[must_use]
    pub fn get(&self, id: StageId) -> Option<&StageDefinition> {
        self.index.get(&id).map(|&slot| &self.definitions[slot])
    }

    /// Finds the stage at a canonical position.
    #[must_use]
    pub fn by_position(&self, position: u32) -> Option<&StageDefinition> {
        self.definitions
            .binary_search_by_key(&position, |d| d.position)
            .ok()
            .map(|slot| &self.definitions[slot])
    }

    /// Finds a stage by display name or id name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&StageDefinition> {
        self.definitions
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
            .or_else(|| name.parse::<StageId>().ok().and_then(|id| self.get(id)))
    }

    /// Returns true if the stage is registered.
    #[must_use]
    pub fn contains(&self, id: StageId) -> bool {
        self.index.contains_key(&id)
    }

    /// Returns the canonical position of a stage.
    #[must_use]
    pub fn position(&self, id: StageId) -> Option<u32> {
        self.get(id).map(|d| d.position)
    }

    /// Iterates over the definitions in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &StageDefinition> {
        self.definitions.iter()
    }

    /// Returns all registered ids in canonical order.
    #[must_use]
    pub fn ids(&self) -> Vec<StageId> {
        self.definitions.iter().map(|d| d.id).collect()
    }

    /// Returns the number of registered stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns true if no stages are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Collects stage definitions and validates them into a [`StageRegistry`].
#[derive(Debug, Default)]
pub struct StageRegistryBuilder {
    definitions: Vec<StageDefinition>,
    closed: bool,
}

impl StageRegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder pre-loaded with the canonical table.
    #[must_use]
    pub fn canonical() -> Self {
        Self {
            definitions: canonical_definitions(),
            closed: false,
        }
    }

    /// Registers a stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the builder is closed, or the id or position is
    /// already taken.
    pub fn register(&mut self, definition: StageDefinition) -> Result<&mut Self, RegistryError> {
        if self.closed {
            return Err(RegistryError::Closed(definition.id));
        }
        if self.definitions.iter().any(|d| d.id == definition.id) {
            return Err(RegistryError::DuplicateId(definition.id));
        }
        if let Some(existing) = self.definitions.iter().find(|d| d.position == definition.position) {
            return Err(RegistryError::DuplicatePosition {
                position: definition.position,
                existing: existing.id,
            });
        }

        self.definitions.push(definition);
        Ok(self)
    }

    /// Closes the builder and returns the registry.
    ///
    /// After this call every `register` fails with [`RegistryError::Closed`].
    ///
    /// # Errors
    ///
    /// Returns an error if a prerequisite is unregistered or does not come
    /// before the stage that needs it.
    pub fn close(&mut self) -> Result<StageRegistry, RegistryError> {
        let positions: HashMap<StageId, u32> =
            self.definitions.iter().map(|d| (d.id, d.position)).collect();

        for def in &self.definitions {
            for prerequisite in &def.prerequisites {
                match positions.get(prerequisite) {
                    None => {
                        return Err(RegistryError::UnknownPrerequisite {
                            stage: def.id,
                            prerequisite: *prerequisite,
                        })
                    }
                    Some(&position) if position >= def.position => {
                        return Err(RegistryError::PrerequisiteOrder {
                            stage: def.id,
                            prerequisite: *prerequisite,
                        })
                    }
                    Some(_) => {}
                }
            }
        }

        self.closed = true;
        Ok(StageRegistry::from_sorted(self.definitions.clone()))
    }

    /// Returns true once [`close`](Self::close) has succeeded.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
