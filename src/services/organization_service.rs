use crate::{
    db::OrganizationStore,
    error::Result,
    models::Organization,
    notify::Notice,
};

/// Editor state over the organization registry.
pub struct OrganizationService {
    store: OrganizationStore,
    pub items: Vec<Organization>,
    pub selected: Option<usize>,
    pub search_text: String,
}

impl OrganizationService {
    pub fn new(store: OrganizationStore) -> Self {
        Self {
            store,
            items: Vec::new(),
            selected: None,
            search_text: String::new(),
        }
    }

    pub async fn load(&mut self) -> Result<()> {
        self.items = self.store.list().await?;
        self.selected = None;
        Ok(())
    }

    pub fn add(&mut self) {
        self.items.push(Organization::new("New organization"));
    }

    /// Delete the selected organization. An id-0 row is removed from
    /// memory only; a row referenced by contracts is rejected by the store
    /// before the delete is attempted.
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

        self.store.delete(item.org_id).await?;
        self.items.remove(idx);
        self.selected = None;

        Ok(())
    }

    /// Persist all held organizations, then reload.
    pub async fn save(&mut self) -> Result<Notice> {
        self.store.save_all(&mut self.items).await?;
        self.load().await?;

        Ok(Notice::Saved("Saved.".to_string()))
    }

    /// Case-insensitive substring filter across every text field.
    pub fn matches(&self, org: &Organization) -> bool {
        let text = self.search_text.trim();
        if text.is_empty() {
            return true;
        }
        let needle = text.to_lowercase();
        let contains =
            |field: &Option<String>| field.as_deref().is_some_and(|s| s.to_lowercase().contains(&needle));

        org.name.to_lowercase().contains(&needle)
            || contains(&org.address)
            || contains(&org.phone)
            || contains(&org.inn)
            || contains(&org.bank_account)
            || contains(&org.bik)
    }

    pub fn visible(&self) -> Vec<&Organization> {
        self.items.iter().filter(|o| self.matches(o)).collect()
    }
}
