use std::sync::Arc;

use bytes::Bytes;

use crate::artifacts::ArtifactPipeline;
use crate::credentials::{CredentialStore, Registration};
use crate::error::Result;
use crate::kv::KvStore;
use crate::repository::{BoxFields, BoxRecord, BoxWithItems, Inventory, ItemFields, ItemRecord};
use crate::session::SessionAuthority;

/// Entry point for request handlers.
///
/// Every inventory call takes the caller's session token and resolves the
/// owner from it before the store is touched; an owner is never accepted
/// from the request itself.
pub struct BoxKeeper {
    credentials: CredentialStore,
    sessions: SessionAuthority,
    inventory: Inventory,
}

impl BoxKeeper {
    pub fn new(kv: Arc<dyn KvStore>, artifacts: Arc<dyn ArtifactPipeline>, sessions: SessionAuthority) -> Self {
        Self {
            credentials: CredentialStore::new(kv.clone()),
            sessions,
            inventory: Inventory::new(kv, artifacts),
        }
    }

    pub fn sessions(&self) -> &SessionAuthority {
        &self.sessions
    }

    pub async fn register(&self, registration: Registration) -> Result<()> {
        let r = registration.validate()?;
        self.credentials.register(&r.username, &r.email, &r.password).await
    }

    /// Checks credentials and issues a session token.
    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let username = self.credentials.verify(email, password).await?;
        let token = self.sessions.issue(&username)?;
        tracing::info!(username = %username, "Issued session");
        Ok(token)
    }

    pub async fn create_box(&self, token: &str, fields: &BoxFields) -> Result<BoxRecord> {
        let owner = self.sessions.verify(token)?;
        self.inventory.create_box(&owner, fields).await
    }

    pub async fn list_boxes(&self, token: &str) -> Result<Vec<BoxWithItems>> {
        let owner = self.sessions.verify(token)?;
        self.inventory.list_boxes(&owner).await
    }

    pub async fn get_box(&self, token: &str, box_id: &str) -> Result<BoxWithItems> {
        let owner = self.sessions.verify(token)?;
        self.inventory.get_box(&owner, box_id).await
    }

    pub async fn delete_box(&self, token: &str, box_id: &str) -> Result<()> {
        let owner = self.sessions.verify(token)?;
        self.inventory.delete_box(&owner, box_id).await
    }

    pub async fn add_item(&self, token: &str, box_id: &str, fields: &ItemFields, image: Bytes) -> Result<ItemRecord> {
        let owner = self.sessions.verify(token)?;
        fields.validate()?;
        self.inventory.add_item(&owner, box_id, fields, image).await
    }

    pub async fn update_item(&self, token: &str, box_id: &str, item_id: &str, fields: &ItemFields) -> Result<()> {
        let owner = self.sessions.verify(token)?;
        fields.validate()?;
        self.inventory.update_item(&owner, box_id, item_id, fields).await
    }
}
