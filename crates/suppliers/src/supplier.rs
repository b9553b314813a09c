use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procura_catalog::ItemCategoryId;
use procura_core::{Aggregate, AggregateId, AggregateRoot, ProcurementError, UserId};
use procura_events::Event;

/// Supplier identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplierId(pub AggregateId);

impl SupplierId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SupplierId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Kinds of compliance documents a supplier attaches.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    TaxClearance,
    TradingLicense,
    Registration,
    BankDetails,
    Other,
}

/// Document metadata only; the file itself lives in external storage behind
/// the opaque `handle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierDocument {
    pub kind: DocumentKind,
    pub handle: String,
    pub verified: bool,
}

/// Aggregate root: Supplier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Supplier {
    id: SupplierId,
    name: String,
    categories: Vec<ItemCategoryId>,
    documents: Vec<SupplierDocument>,
    suspended: bool,
    version: u64,
    created: bool,
}

impl Supplier {
    /// Empty aggregate for rehydration.
    pub fn empty(id: SupplierId) -> Self {
        Self {
            id,
            name: String::new(),
            categories: Vec::new(),
            documents: Vec::new(),
            suspended: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SupplierId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn categories(&self) -> &[ItemCategoryId] {
        &self.categories
    }

    pub fn documents(&self) -> &[SupplierDocument] {
        &self.documents
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn can_supply(&self, category: ItemCategoryId) -> bool {
        !self.suspended && self.categories.contains(&category)
    }
}

impl AggregateRoot for Supplier {
    type Id = SupplierId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSupplier {
    pub supplier_id: SupplierId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclareCapability {
    pub supplier_id: SupplierId,
    pub category: ItemCategoryId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachDocument {
    pub supplier_id: SupplierId,
    pub kind: DocumentKind,
    pub handle: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyDocument {
    pub supplier_id: SupplierId,
    pub handle: String,
    pub verified_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspendSupplier {
    pub supplier_id: SupplierId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplierCommand {
    RegisterSupplier(RegisterSupplier),
    DeclareCapability(DeclareCapability),
    AttachDocument(AttachDocument),
    VerifyDocument(VerifyDocument),
    SuspendSupplier(SuspendSupplier),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierRegistered {
    pub supplier_id: SupplierId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDeclared {
    pub supplier_id: SupplierId,
    pub category: ItemCategoryId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAttached {
    pub supplier_id: SupplierId,
    pub kind: DocumentKind,
    pub handle: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentVerified {
    pub supplier_id: SupplierId,
    pub handle: String,
    pub verified_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierSuspended {
    pub supplier_id: SupplierId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplierEvent {
    SupplierRegistered(SupplierRegistered),
    CapabilityDeclared(CapabilityDeclared),
    DocumentAttached(DocumentAttached),
    DocumentVerified(DocumentVerified),
    SupplierSuspended(SupplierSuspended),
}

impl Event for SupplierEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SupplierEvent::SupplierRegistered(_) => "suppliers.supplier.registered",
            SupplierEvent::CapabilityDeclared(_) => "suppliers.supplier.capability_declared",
            SupplierEvent::DocumentAttached(_) => "suppliers.supplier.document_attached",
            SupplierEvent::DocumentVerified(_) => "suppliers.supplier.document_verified",
            SupplierEvent::SupplierSuspended(_) => "suppliers.supplier.suspended",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SupplierEvent::SupplierRegistered(e) => e.occurred_at,
            SupplierEvent::CapabilityDeclared(e) => e.occurred_at,
            SupplierEvent::DocumentAttached(e) => e.occurred_at,
            SupplierEvent::DocumentVerified(e) => e.occurred_at,
            SupplierEvent::SupplierSuspended(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Supplier {
    type Command = SupplierCommand;
    type Event = SupplierEvent;
    type Error = ProcurementError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SupplierEvent::SupplierRegistered(e) => {
                self.id = e.supplier_id;
                self.name = e.name.clone();
                self.created = true;
            }
            SupplierEvent::CapabilityDeclared(e) => {
                if !self.categories.contains(&e.category) {
                    self.categories.push(e.category);
                }
            }
            SupplierEvent::DocumentAttached(e) => {
                self.documents.push(SupplierDocument {
                    kind: e.kind,
                    handle: e.handle.clone(),
                    verified: false,
                });
            }
            SupplierEvent::DocumentVerified(e) => {
                if let Some(doc) = self.documents.iter_mut().find(|d| d.handle == e.handle) {
                    doc.verified = true;
                }
            }
            SupplierEvent::SupplierSuspended(_) => {
                self.suspended = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SupplierCommand::RegisterSupplier(cmd) => self.handle_register(cmd),
            SupplierCommand::DeclareCapability(cmd) => self.handle_declare(cmd),
            SupplierCommand::AttachDocument(cmd) => self.handle_attach(cmd),
            SupplierCommand::VerifyDocument(cmd) => self.handle_verify(cmd),
            SupplierCommand::SuspendSupplier(cmd) => self.handle_suspend(cmd),
        }
    }
}

impl Supplier {
    fn ensure_created(&self) -> Result<(), ProcurementError> {
        if !self.created {
            return Err(ProcurementError::not_found());
        }
        Ok(())
    }

    fn handle_register(
        &self,
        cmd: &RegisterSupplier,
    ) -> Result<Vec<SupplierEvent>, ProcurementError> {
        if self.created {
            return Err(ProcurementError::conflict("supplier already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(ProcurementError::validation("supplier name cannot be empty"));
        }
        Ok(vec![SupplierEvent::SupplierRegistered(SupplierRegistered {
            supplier_id: cmd.supplier_id,
            name: cmd.name.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_declare(
        &self,
        cmd: &DeclareCapability,
    ) -> Result<Vec<SupplierEvent>, ProcurementError> {
        self.ensure_created()?;
        if self.suspended {
            return Err(ProcurementError::invalid_transition("suspended", "declare capability"));
        }
        if self.categories.contains(&cmd.category) {
            return Ok(vec![]);
        }
        Ok(vec![SupplierEvent::CapabilityDeclared(CapabilityDeclared {
            supplier_id: cmd.supplier_id,
            category: cmd.category,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_attach(&self, cmd: &AttachDocument) -> Result<Vec<SupplierEvent>, ProcurementError> {
        self.ensure_created()?;
        if cmd.handle.trim().is_empty() {
            return Err(ProcurementError::validation("document handle cannot be empty"));
        }
        if self.documents.iter().any(|d| d.handle == cmd.handle) {
            return Err(ProcurementError::conflict("document handle already attached"));
        }
        Ok(vec![SupplierEvent::DocumentAttached(DocumentAttached {
            supplier_id: cmd.supplier_id,
            kind: cmd.kind,
            handle: cmd.handle.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_verify(&self, cmd: &VerifyDocument) -> Result<Vec<SupplierEvent>, ProcurementError> {
        self.ensure_created()?;
        let doc = self
            .documents
            .iter()
            .find(|d| d.handle == cmd.handle)
            .ok_or(ProcurementError::NotFound)?;
        if doc.verified {
            return Ok(vec![]);
        }
        Ok(vec![SupplierEvent::DocumentVerified(DocumentVerified {
            supplier_id: cmd.supplier_id,
            handle: cmd.handle.clone(),
            verified_by: cmd.verified_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_suspend(
        &self,
        cmd: &SuspendSupplier,
    ) -> Result<Vec<SupplierEvent>, ProcurementError> {
        self.ensure_created()?;
        if self.suspended {
            return Ok(vec![]);
        }
        Ok(vec![SupplierEvent::SupplierSuspended(SupplierSuspended {
            supplier_id: cmd.supplier_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered() -> (Supplier, SupplierId) {
        let id = SupplierId::new(AggregateId::new());
        let mut s = Supplier::empty(id);
        let events = s
            .handle(&SupplierCommand::RegisterSupplier(RegisterSupplier {
                supplier_id: id,
                name: "Acme Scientific Ltd".to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            s.apply(e);
        }
        (s, id)
    }

    #[test]
    fn capability_declaration_is_idempotent() {
        let (mut s, id) = registered();
        let category = ItemCategoryId::new(AggregateId::new());

        let cmd = SupplierCommand::DeclareCapability(DeclareCapability {
            supplier_id: id,
            category,
            occurred_at: Utc::now(),
        });
        let events = s.handle(&cmd).unwrap();
        assert_eq!(events.len(), 1);
        for e in &events {
            s.apply(e);
        }
        assert!(s.can_supply(category));

        assert!(s.handle(&cmd).unwrap().is_empty());
    }

    #[test]
    fn document_verification_targets_one_handle() {
        let (mut s, id) = registered();
        for handle in ["doc://tax", "doc://license"] {
            let events = s
                .handle(&SupplierCommand::AttachDocument(AttachDocument {
                    supplier_id: id,
                    kind: DocumentKind::TaxClearance,
                    handle: handle.to_string(),
                    occurred_at: Utc::now(),
                }))
                .unwrap();
            for e in &events {
                s.apply(e);
            }
        }

        let events = s
            .handle(&SupplierCommand::VerifyDocument(VerifyDocument {
                supplier_id: id,
                handle: "doc://tax".to_string(),
                verified_by: UserId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            s.apply(e);
        }

        assert!(s.documents()[0].verified);
        assert!(!s.documents()[1].verified);
    }

    #[test]
    fn suspended_supplier_cannot_declare() {
        let (mut s, id) = registered();
        let events = s
            .handle(&SupplierCommand::SuspendSupplier(SuspendSupplier {
                supplier_id: id,
                reason: "expired license".to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            s.apply(e);
        }

        let err = s
            .handle(&SupplierCommand::DeclareCapability(DeclareCapability {
                supplier_id: id,
                category: ItemCategoryId::new(AggregateId::new()),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, ProcurementError::InvalidTransition { .. }));
    }
}
