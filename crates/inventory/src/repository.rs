use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::artifacts::ArtifactPipeline;
use crate::error::{Error, Result, StoreError};
use crate::keys::{self, IdGenerator};
use crate::kv::{scan_all, KeyType, KvStore};

pub const QUALITY_RANGE: std::ops::RangeInclusive<i64> = 1..=10;
const DEFAULT_SCAN_PAGE: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct BoxFields {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Mutable part of an item.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ItemFields {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub quality: i64,
    pub quantity: i64,
}

impl ItemFields {
    /// Boundary check; the repository itself stores whatever it is given.
    pub fn validate(&self) -> Result<()> {
        if !QUALITY_RANGE.contains(&self.quality) {
            return Err(Error::InvalidInput("quality must be between 1 and 10".into()));
        }
        if self.quantity < 1 {
            return Err(Error::InvalidInput("quantity must be a positive integer".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoxRecord {
    pub box_id: String,
    pub name: String,
    pub description: String,
    pub label_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemRecord {
    pub item_id: String,
    pub box_id: String,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub quality: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoxWithItems {
    #[serde(flatten)]
    pub record: BoxRecord,
    pub items: Vec<ItemRecord>,
}

impl BoxRecord {
    fn from_hash(box_id: &str, mut fields: HashMap<String, String>) -> Self {
        Self {
            box_id: box_id.to_string(),
            name: fields.remove("name").unwrap_or_default(),
            description: fields.remove("description").unwrap_or_default(),
            label_url: fields.remove("label_url").unwrap_or_default(),
        }
    }
}

impl ItemRecord {
    fn from_hash(key: &str, box_id: &str, item_id: &str, mut fields: HashMap<String, String>) -> Result<Self> {
        let mut number = |field: &str| -> Result<i64> {
            fields
                .remove(field)
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| StoreError::Backend(format!("{key} has a malformed {field} field")).into())
        };
        let quality = number("quality")?;
        let quantity = number("quantity")?;
        Ok(Self {
            item_id: item_id.to_string(),
            box_id: box_id.to_string(),
            name: fields.remove("name").unwrap_or_default(),
            description: fields.remove("description").unwrap_or_default(),
            image_url: fields.remove("image_url").unwrap_or_default(),
            quality,
            quantity,
        })
    }
}

/// Boxes and items of every owner.
///
/// Each operation is a sequence of single-key store calls with no transaction
/// around them. The order of those calls is chosen so that an interrupted
/// operation never leaves an item unreachable from a visible box, except for
/// the one window noted on [`Inventory::add_item`].
pub struct Inventory {
    kv: Arc<dyn KvStore>,
    artifacts: Arc<dyn ArtifactPipeline>,
    ids: IdGenerator,
    scan_page: usize,
}

impl Inventory {
    pub fn new(kv: Arc<dyn KvStore>, artifacts: Arc<dyn ArtifactPipeline>) -> Self {
        Self {
            kv,
            artifacts,
            ids: IdGenerator::new(),
            scan_page: DEFAULT_SCAN_PAGE,
        }
    }

    /// Page size hint for keyspace scans.
    pub fn with_scan_page(mut self, scan_page: usize) -> Self {
        self.scan_page = scan_page.max(1);
        self
    }

    /// Creates a box and its label. Nothing is written if the label fails.
    pub async fn create_box(&self, owner: &str, fields: &BoxFields) -> Result<BoxRecord> {
        let box_id = self.ids.box_id_new(owner);
        let label_url = self.artifacts.generate_label(&box_id).await?;

        let record = BoxRecord {
            box_id,
            name: fields.name.clone(),
            description: fields.description.clone(),
            label_url,
        };
        self.kv
            .set_hash(
                &keys::box_key(owner, &record.box_id),
                &[
                    ("box_id", record.box_id.clone()),
                    ("name", record.name.clone()),
                    ("description", record.description.clone()),
                    ("label_url", record.label_url.clone()),
                ],
            )
            .await?;

        tracing::info!(owner, box_id = %record.box_id, "Created box");
        Ok(record)
    }

    /// Every box of `owner` with its items. Box order is unspecified.
    pub async fn list_boxes(&self, owner: &str) -> Result<Vec<BoxWithItems>> {
        // SCAN may report a key more than once
        let found: BTreeSet<String> = scan_all(self.kv.as_ref(), &keys::owner_prefix(owner), self.scan_page)
            .await?
            .into_iter()
            .collect();

        let mut boxes = Vec::new();
        for key in &found {
            if self.kv.key_type(key).await? != KeyType::Hash {
                continue;
            }
            let Some(box_id) = keys::box_id_from_key(owner, key) else {
                continue;
            };
            let fields = self.kv.get_hash(key).await?;
            if fields.is_empty() {
                // deleted since the scan saw it
                continue;
            }
            let items = self.hydrate_items(owner, box_id).await?;
            boxes.push(BoxWithItems {
                record: BoxRecord::from_hash(box_id, fields),
                items,
            });
        }
        Ok(boxes)
    }

    pub async fn get_box(&self, owner: &str, box_id: &str) -> Result<BoxWithItems> {
        let key = self.owned_box_key(owner, box_id).await?;
        let fields = self.kv.get_hash(&key).await?;
        if fields.is_empty() {
            return Err(Error::NotFound);
        }
        let items = self.hydrate_items(owner, box_id).await?;
        Ok(BoxWithItems {
            record: BoxRecord::from_hash(box_id, fields),
            items,
        })
    }

    /// Deletes a box and every item it references.
    ///
    /// Items go first, then the item list, then the box itself. A failure
    /// part way leaves the box key in place so the delete can simply be
    /// repeated.
    pub async fn delete_box(&self, owner: &str, box_id: &str) -> Result<()> {
        let key = self.owned_box_key(owner, box_id).await?;
        let list_key = keys::box_items_list_key(owner, box_id);

        let item_ids = self.kv.list_range(&list_key, 0, -1).await?;
        for item_id in &item_ids {
            self.kv.delete(&keys::item_key(box_id, item_id)).await?;
        }
        self.kv.delete(&list_key).await?;
        self.kv.delete(&key).await?;

        tracing::info!(owner, box_id, items = item_ids.len(), "Deleted box");
        Ok(())
    }

    /// Uploads the image, writes the item, then links it into the box.
    ///
    /// A failed upload writes nothing. A failed link leaves an item record
    /// that no box lists; that record is unreachable but harmless.
    pub async fn add_item(&self, owner: &str, box_id: &str, fields: &ItemFields, image: Bytes) -> Result<ItemRecord> {
        self.owned_box_key(owner, box_id).await?;

        let image_url = self.artifacts.store_image(image).await?;
        let item_id = self.ids.item_id_new(box_id);

        let record = ItemRecord {
            item_id,
            box_id: box_id.to_string(),
            name: fields.name.clone(),
            description: fields.description.clone(),
            image_url,
            quality: fields.quality,
            quantity: fields.quantity,
        };
        self.kv
            .set_hash(
                &keys::item_key(box_id, &record.item_id),
                &[
                    ("item_id", record.item_id.clone()),
                    ("box_id", record.box_id.clone()),
                    ("name", record.name.clone()),
                    ("description", record.description.clone()),
                    ("image_url", record.image_url.clone()),
                    ("quality", record.quality.to_string()),
                    ("quantity", record.quantity.to_string()),
                ],
            )
            .await?;
        self.kv
            .list_append(&keys::box_items_list_key(owner, box_id), &record.item_id)
            .await?;

        tracing::info!(owner, box_id, item_id = %record.item_id, "Added item");
        Ok(record)
    }

    /// Overwrites name, description, quality and quantity. The image URL
    /// and the owning box are never touched.
    pub async fn update_item(&self, owner: &str, box_id: &str, item_id: &str, fields: &ItemFields) -> Result<()> {
        self.owned_box_key(owner, box_id).await?;
        if !keys::is_key_safe(item_id) {
            return Err(Error::NotFound);
        }
        let key = keys::item_key(box_id, item_id);
        if !self.kv.exists(&key).await? {
            return Err(Error::NotFound);
        }
        let listed = self
            .kv
            .list_range(&keys::box_items_list_key(owner, box_id), 0, -1)
            .await?;
        if !listed.iter().any(|id| id == item_id) {
            return Err(Error::NotFound);
        }

        self.kv
            .set_hash(
                &key,
                &[
                    ("name", fields.name.clone()),
                    ("description", fields.description.clone()),
                    ("quality", fields.quality.to_string()),
                    ("quantity", fields.quantity.to_string()),
                ],
            )
            .await?;

        tracing::info!(owner, box_id, item_id, "Updated item");
        Ok(())
    }

    /// Key of an existing box of `owner`; `NotFound` covers both a missing
    /// box and one that belongs to somebody else.
    async fn owned_box_key(&self, owner: &str, box_id: &str) -> Result<String> {
        if !keys::is_key_safe(box_id) {
            return Err(Error::NotFound);
        }
        let key = keys::box_key(owner, box_id);
        if !self.kv.exists(&key).await? {
            return Err(Error::NotFound);
        }
        Ok(key)
    }

    async fn hydrate_items(&self, owner: &str, box_id: &str) -> Result<Vec<ItemRecord>> {
        let item_ids = self
            .kv
            .list_range(&keys::box_items_list_key(owner, box_id), 0, -1)
            .await?;

        let mut items = Vec::with_capacity(item_ids.len());
        for item_id in &item_ids {
            let key = keys::item_key(box_id, item_id);
            let fields = self.kv.get_hash(&key).await?;
            if fields.is_empty() {
                tracing::warn!(box_id, item_id = %item_id, "Box lists a missing item");
                continue;
            }
            items.push(ItemRecord::from_hash(&key, box_id, item_id, fields)?);
        }
        Ok(items)
    }
}
