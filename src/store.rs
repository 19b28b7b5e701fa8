use bson::{doc, oid::ObjectId};
use futures::TryStreamExt;
use mongodb::{
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::IndexOptions,
    Client, Collection, Database, IndexModel,
};

use crate::error::{ApiError, ApiResult};
use crate::schemas::{Expense, Group, GroupLedger, Settlement};

/// MongoDB access for groups, expenses and settlements.
///
/// Expenses and settlements live in their own collections and point back to
/// their group through `group_id`.
#[derive(Clone)]
pub struct Store {
    db: Database,
}

const DUPLICATE_KEY: i32 = 11000;

pub fn new_id() -> String {
    ObjectId::new().to_hex()
}

fn unique_id_index() -> IndexModel {
    IndexModel::builder()
        .keys(doc! { "id": 1 })
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}

impl Store {
    pub fn new(client: &Client, database: &str) -> Self {
        Self {
            db: client.database(database),
        }
    }

    fn groups(&self) -> Collection<Group> {
        self.db.collection("Groups")
    }

    fn expenses(&self) -> Collection<Expense> {
        self.db.collection("Expenses")
    }

    fn settlements(&self) -> Collection<Settlement> {
        self.db.collection("Settlements")
    }

    /// Group ids are chosen by the client, so uniqueness is left to the
    /// database.
    pub async fn ensure_indexes(&self) -> ApiResult<()> {
        self.groups().create_index(unique_id_index(), None).await?;
        Ok(())
    }

    pub async fn insert_group(&self, group: &Group) -> ApiResult<()> {
        match self.groups().insert_one(group, None).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => Err(ApiError::Conflict(format!(
                "group {} already exists",
                group.id
            ))),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn find_group(&self, id: &str) -> ApiResult<Group> {
        self.groups()
            .find_one(doc! { "id": id }, None)
            .await?
            .ok_or_else(|| ApiError::not_found("Couldn't find the desired group"))
    }

    pub async fn groups_for_member(&self, member: &str) -> ApiResult<Vec<Group>> {
        let cursor = self
            .groups()
            .find(doc! { "members.id": member }, None)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    /// Removes the group, then its expenses and settlements on a best-effort
    /// basis.
    pub async fn delete_group(&self, id: &str) -> ApiResult<()> {
        let deleted = self.groups().delete_one(doc! { "id": id }, None).await?;
        if deleted.deleted_count == 0 {
            return Err(ApiError::not_found("Couldn't find the desired group"));
        }
        let filter = doc! { "group_id": id };
        if let Err(err) = self.expenses().delete_many(filter.clone(), None).await {
            tracing::warn!(group = id, "failed to delete expenses of removed group: {err}");
        }
        if let Err(err) = self.settlements().delete_many(filter, None).await {
            tracing::warn!(group = id, "failed to delete settlements of removed group: {err}");
        }
        Ok(())
    }

    pub async fn expenses_for_group(&self, group_id: &str) -> ApiResult<Vec<Expense>> {
        let cursor = self
            .expenses()
            .find(doc! { "group_id": group_id }, None)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn find_expense(&self, group_id: &str, id: &str) -> ApiResult<Expense> {
        self.expenses()
            .find_one(doc! { "group_id": group_id, "id": id }, None)
            .await?
            .ok_or_else(|| ApiError::not_found("Couldn't find the desired expense"))
    }

    pub async fn insert_expense(&self, expense: &Expense) -> ApiResult<()> {
        self.expenses().insert_one(expense, None).await?;
        Ok(())
    }

    pub async fn replace_expense(&self, expense: &Expense) -> ApiResult<()> {
        let result = self
            .expenses()
            .replace_one(
                doc! { "group_id": expense.group_id.as_str(), "id": expense.id.as_str() },
                expense,
                None,
            )
            .await?;
        if result.matched_count == 0 {
            return Err(ApiError::not_found("Couldn't find the desired expense"));
        }
        Ok(())
    }

    pub async fn delete_expense(&self, group_id: &str, id: &str) -> ApiResult<()> {
        let deleted = self
            .expenses()
            .delete_one(doc! { "group_id": group_id, "id": id }, None)
            .await?;
        if deleted.deleted_count == 0 {
            return Err(ApiError::not_found("Couldn't find the desired expense"));
        }
        Ok(())
    }

    pub async fn settlements_for_group(&self, group_id: &str) -> ApiResult<Vec<Settlement>> {
        let cursor = self
            .settlements()
            .find(doc! { "group_id": group_id }, None)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn find_settlement(&self, group_id: &str, id: &str) -> ApiResult<Settlement> {
        self.settlements()
            .find_one(doc! { "group_id": group_id, "id": id }, None)
            .await?
            .ok_or_else(|| ApiError::not_found("Couldn't find the desired settlement"))
    }

    pub async fn insert_settlement(&self, settlement: &Settlement) -> ApiResult<()> {
        self.settlements().insert_one(settlement, None).await?;
        Ok(())
    }

    /// Flips `confirmed` to true. Already confirmed settlements are a conflict,
    /// the flag never goes back.
    pub async fn confirm_settlement(&self, group_id: &str, id: &str) -> ApiResult<()> {
        let result = self
            .settlements()
            .update_one(
                doc! { "group_id": group_id, "id": id, "confirmed": false },
                doc! { "$set": { "confirmed": true } },
                None,
            )
            .await?;
        if result.matched_count == 0 {
            return Err(ApiError::Conflict(format!(
                "settlement {id} is already confirmed"
            )));
        }
        Ok(())
    }

    pub async fn delete_settlement(&self, group_id: &str, id: &str) -> ApiResult<()> {
        let deleted = self
            .settlements()
            .delete_one(doc! { "group_id": group_id, "id": id }, None)
            .await?;
        if deleted.deleted_count == 0 {
            return Err(ApiError::not_found("Couldn't find the desired settlement"));
        }
        Ok(())
    }

    pub async fn load_ledger(&self, group_id: &str) -> ApiResult<GroupLedger> {
        let group = self.find_group(group_id).await?;
        self.ledger_for(group).await
    }

    /// Ledgers of every group `member` belongs to.
    pub async fn ledgers_for_member(&self, member: &str) -> ApiResult<Vec<GroupLedger>> {
        let mut ledgers = Vec::new();
        for group in self.groups_for_member(member).await? {
            ledgers.push(self.ledger_for(group).await?);
        }
        Ok(ledgers)
    }

    async fn ledger_for(&self, group: Group) -> ApiResult<GroupLedger> {
        let expenses = self.expenses_for_group(&group.id).await?;
        let settlements = self.settlements_for_group(&group.id).await?;
        Ok(GroupLedger {
            group,
            expenses,
            settlements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_ids_are_unique() {
        let index = unique_id_index();
        assert_eq!(index.keys, doc! { "id": 1 });
        assert_eq!(index.options.and_then(|o| o.unique), Some(true));
    }

    #[test]
    fn generated_ids_are_object_ids() {
        let id = new_id();
        assert_eq!(id.len(), 24);
        assert!(ObjectId::parse_str(&id).is_ok());
        assert_ne!(id, new_id());
    }
}
