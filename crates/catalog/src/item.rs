use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procura_core::{Aggregate, AggregateId, AggregateRoot, ProcurementError};
use procura_events::Event;

/// Catalog item identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogItemId(pub AggregateId);

impl CatalogItemId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for CatalogItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Item category identifier (budget lines and supplier capability
/// declarations are keyed by category).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemCategoryId(pub AggregateId);

impl ItemCategoryId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ItemCategoryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: CatalogItem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    id: CatalogItemId,
    code: String,
    name: String,
    unit: String,
    category: Option<ItemCategoryId>,
    active: bool,
    version: u64,
    created: bool,
}

impl CatalogItem {
    /// Empty aggregate for rehydration.
    pub fn empty(id: CatalogItemId) -> Self {
        Self {
            id,
            code: String::new(),
            name: String::new(),
            unit: String::new(),
            category: None,
            active: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> CatalogItemId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> Option<ItemCategoryId> {
        self.category
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl AggregateRoot for CatalogItem {
    type Id = CatalogItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterItem {
    pub item_id: CatalogItemId,
    pub code: String,
    pub name: String,
    pub unit: String,
    pub category: Option<ItemCategoryId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RenameItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameItem {
    pub item_id: CatalogItemId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeactivateItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateItem {
    pub item_id: CatalogItemId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogCommand {
    RegisterItem(RegisterItem),
    RenameItem(RenameItem),
    DeactivateItem(DeactivateItem),
}

/// Event: ItemRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRegistered {
    pub item_id: CatalogItemId,
    pub code: String,
    pub name: String,
    pub unit: String,
    pub category: Option<ItemCategoryId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemRenamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRenamed {
    pub item_id: CatalogItemId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemDeactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDeactivated {
    pub item_id: CatalogItemId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatalogEvent {
    ItemRegistered(ItemRegistered),
    ItemRenamed(ItemRenamed),
    ItemDeactivated(ItemDeactivated),
}

impl Event for CatalogEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CatalogEvent::ItemRegistered(_) => "catalog.item.registered",
            CatalogEvent::ItemRenamed(_) => "catalog.item.renamed",
            CatalogEvent::ItemDeactivated(_) => "catalog.item.deactivated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CatalogEvent::ItemRegistered(e) => e.occurred_at,
            CatalogEvent::ItemRenamed(e) => e.occurred_at,
            CatalogEvent::ItemDeactivated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for CatalogItem {
    type Command = CatalogCommand;
    type Event = CatalogEvent;
    type Error = ProcurementError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CatalogEvent::ItemRegistered(e) => {
                self.id = e.item_id;
                self.code = e.code.clone();
                self.name = e.name.clone();
                self.unit = e.unit.clone();
                self.category = e.category;
                self.active = true;
                self.created = true;
            }
            CatalogEvent::ItemRenamed(e) => {
                self.name = e.name.clone();
            }
            CatalogEvent::ItemDeactivated(_) => {
                self.active = false;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CatalogCommand::RegisterItem(cmd) => self.handle_register(cmd),
            CatalogCommand::RenameItem(cmd) => self.handle_rename(cmd),
            CatalogCommand::DeactivateItem(cmd) => self.handle_deactivate(cmd),
        }
    }
}

impl CatalogItem {
    fn handle_register(&self, cmd: &RegisterItem) -> Result<Vec<CatalogEvent>, ProcurementError> {
        if self.created {
            return Err(ProcurementError::conflict("catalog item already exists"));
        }
        if cmd.code.trim().is_empty() {
            return Err(ProcurementError::validation("item code cannot be empty"));
        }
        if cmd.name.trim().is_empty() {
            return Err(ProcurementError::validation("item name cannot be empty"));
        }
        Ok(vec![CatalogEvent::ItemRegistered(ItemRegistered {
            item_id: cmd.item_id,
            code: cmd.code.clone(),
            name: cmd.name.clone(),
            unit: cmd.unit.clone(),
            category: cmd.category,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_rename(&self, cmd: &RenameItem) -> Result<Vec<CatalogEvent>, ProcurementError> {
        if !self.created {
            return Err(ProcurementError::not_found());
        }
        if cmd.name.trim().is_empty() {
            return Err(ProcurementError::validation("item name cannot be empty"));
        }
        if cmd.name == self.name {
            return Ok(vec![]);
        }
        Ok(vec![CatalogEvent::ItemRenamed(ItemRenamed {
            item_id: cmd.item_id,
            name: cmd.name.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deactivate(
        &self,
        cmd: &DeactivateItem,
    ) -> Result<Vec<CatalogEvent>, ProcurementError> {
        if !self.created {
            return Err(ProcurementError::not_found());
        }
        if !self.active {
            return Ok(vec![]);
        }
        Ok(vec![CatalogEvent::ItemDeactivated(ItemDeactivated {
            item_id: cmd.item_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
