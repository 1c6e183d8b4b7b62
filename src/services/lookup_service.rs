use crate::{
    db::LookupStore,
    error::{AppError, Result},
    models::LookupItem,
    notify::Notice,
};

/// Editor state over one id + name reference table. The same logic serves
/// contract types, stages and payment types; the store carries the table
/// parameterization.
pub struct LookupService {
    store: LookupStore,
    pub items: Vec<LookupItem>,
    pub selected: Option<usize>,
    pub new_name: String,
    pub search_text: String,
}

impl LookupService {
    pub fn new(store: LookupStore) -> Self {
        Self {
            store,
            items: Vec::new(),
            selected: None,
            new_name: String::new(),
            search_text: String::new(),
        }
    }

    pub async fn load(&mut self) -> Result<()> {
        self.items = self.store.list().await?;
        self.selected = None;
        Ok(())
    }

    /// The add action is enabled only for a non-blank candidate name.
    pub fn can_add(&self) -> bool {
        !self.new_name.trim().is_empty()
    }

    pub async fn add(&mut self) -> Result<()> {
        if !self.can_add() {
            return Err(AppError::Validation("the name must not be empty".to_string()));
        }

        let item = self.store.insert(&self.new_name).await?;
        self.items.push(item);
        self.new_name.clear();

        Ok(())
    }

    /// Delete the selected row. An id-0 row is removed from memory only;
    /// a referenced row fails with a conflict and stays untouched.
    pub async fn delete(&mut self) -> Result<()> {
        let Some(idx) = self.selected else {
            return Ok(());
        };
        // A stale index is cleared rather than acted on.
        let Some(item) = self.items.get(idx) else {
            self.selected = None;
            return Ok(());
        };

        if item.is_new() {
            self.items.remove(idx);
            self.selected = None;
            return Ok(());
        }

        self.store.delete(item.id).await?;
        self.items.remove(idx);
        self.selected = None;

        Ok(())
    }

    /// Update the name of every held item, then reload.
    pub async fn save(&mut self) -> Result<Notice> {
        self.store.save_names(&self.items).await?;
        self.load().await?;

        Ok(Notice::Saved("Saved.".to_string()))
    }

    /// Case-insensitive substring filter on the name.
    pub fn visible(&self) -> Vec<&LookupItem> {
        let text = self.search_text.trim().to_lowercase();
        self.items
            .iter()
            .filter(|item| text.is_empty() || item.name.to_lowercase().contains(&text))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn add_is_disabled_for_blank_candidate() {
        let pool = test_pool().await;
        let mut service = LookupService::new(LookupStore::contract_types(pool));

        service.new_name = "   ".to_string();
        assert!(!service.can_add());
        assert!(matches!(
            service.add().await.unwrap_err(),
            AppError::Validation(_)
        ));

        service.new_name = "Lease".to_string();
        assert!(service.can_add());
        service.add().await.unwrap();
        assert_eq!(service.items.len(), 1);
        assert!(service.items[0].id > 0);
        assert!(service.new_name.is_empty());
    }

    #[tokio::test]
    async fn save_updates_names_and_reloads_ordered() {
        let pool = test_pool().await;
        let mut service = LookupService::new(LookupStore::stages(pool));

        service.new_name = "Zulu".to_string();
        service.add().await.unwrap();
        service.new_name = "Alpha".to_string();
        service.add().await.unwrap();

        service.items[0].name = "Yankee".to_string();
        let notice = service.save().await.unwrap();
        assert_eq!(notice, Notice::Saved("Saved.".to_string()));

        let names: Vec<&str> = service.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Yankee"]);
    }

    #[tokio::test]
    async fn delete_of_unsaved_item_is_memory_only() {
        let pool = test_pool().await;
        let mut service = LookupService::new(LookupStore::payment_types(pool));

        service.items.push(LookupItem {
            id: 0,
            name: "Draft entry".to_string(),
        });
        service.selected = Some(0);
        service.delete().await.unwrap();

        assert!(service.items.is_empty());
        assert!(service.store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn name_filter_is_case_insensitive() {
        let pool = test_pool().await;
        let mut service = LookupService::new(LookupStore::contract_types(pool));

        for name in ["Supply", "Service", "Lease"] {
            service.new_name = name.to_string();
            service.add().await.unwrap();
        }

        service.search_text = "sE".to_string();
        let visible: Vec<&str> = service.visible().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(visible, vec!["Service", "Lease"]);
    }

    #[tokio::test]
    async fn stale_selection_delete_is_a_no_op() {
        let pool = test_pool().await;
        let mut service = LookupService::new(LookupStore::contract_types(pool));

        service.selected = Some(5);
        service.delete().await.unwrap();
        assert_eq!(service.selected, None);
    }
}
