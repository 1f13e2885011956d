use std::collections::HashMap;

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, EntityTrait, QuerySelect};

use crate::entity::note;
use crate::store::StoreError;

/// Ownership lookup for the notes assets are attached to.
#[async_trait]
pub trait NoteAccess: Send + Sync {
    /// Owner of the note, `None` if it does not exist.
    async fn owner_of(&self, note_id: i64) -> Result<Option<i64>, StoreError>;
}

pub struct SeaOrmNoteAccess {
    db: DatabaseConnection,
}

impl SeaOrmNoteAccess {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NoteAccess for SeaOrmNoteAccess {
    async fn owner_of(&self, note_id: i64) -> Result<Option<i64>, StoreError> {
        let owner = note::Entity::find_by_id(note_id)
            .select_only()
            .column(note::Column::UserId)
            .into_tuple()
            .one(&self.db)
            .await?;
        Ok(owner)
    }
}

/// Fixed note -> owner map.
#[derive(Default)]
pub struct StaticNoteAccess {
    owners: HashMap<i64, i64>,
}

impl StaticNoteAccess {
    pub fn new(owners: impl IntoIterator<Item = (i64, i64)>) -> Self {
        Self {
            owners: owners.into_iter().collect(),
        }
    }
}

#[async_trait]
impl NoteAccess for StaticNoteAccess {
    async fn owner_of(&self, note_id: i64) -> Result<Option<i64>, StoreError> {
        Ok(self.owners.get(&note_id).copied())
    }
}
