use crate::{
    db::VatRateStore,
    error::{AppError, Result},
    models::VatRate,
    notify::Notice,
};

/// Editor state over the VAT rate table. The candidate rate is free text
/// accepting both '.' and ',' as decimal separator and must land in
/// [0, 100]; it is validated for enabling the add action and again before
/// the insert runs.
pub struct VatRateService {
    store: VatRateStore,
    pub items: Vec<VatRate>,
    pub selected: Option<usize>,
    pub new_rate: String,
    pub search_text: String,
}

impl VatRateService {
    pub fn new(store: VatRateStore) -> Self {
        Self {
            store,
            items: Vec::new(),
            selected: None,
            new_rate: String::new(),
            search_text: String::new(),
        }
    }

    /// Parse a candidate rate, tolerating a comma as decimal separator.
    pub fn parse_rate(input: &str) -> Option<f64> {
        let normalized = input.trim().replace(',', ".");
        let rate: f64 = normalized.parse().ok()?;
        (0.0..=100.0).contains(&rate).then_some(rate)
    }

    pub fn can_add(&self) -> bool {
        Self::parse_rate(&self.new_rate).is_some()
    }

    pub async fn load(&mut self) -> Result<()> {
        self.items = self.store.list().await?;
        self.selected = None;
        Ok(())
    }

    pub async fn add(&mut self) -> Result<()> {
        let Some(rate) = Self::parse_rate(&self.new_rate) else {
            return Err(AppError::Validation(
                "enter a VAT rate between 0 and 100".to_string(),
            ));
        };

        let item = self.store.insert(rate).await?;
        self.items.push(item);
        self.new_rate.clear();

        Ok(())
    }

    /// Delete the selected rate. An id-0 row is removed from memory only;
    /// a referenced one fails with a conflict and stays untouched.
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

        self.store.delete(item.vat_id).await?;
        self.items.remove(idx);
        self.selected = None;

        Ok(())
    }

    /// Persist the list. Items with no rate are skipped silently; new ones
    /// adopt their generated identity. Unlike the other editors this does
    /// not reload afterwards.
    pub async fn save(&mut self) -> Result<Notice> {
        self.store.save_all(&mut self.items).await?;
        Ok(Notice::Saved("Saved.".to_string()))
    }

    /// Substring filter over the rate rendered as text.
    pub fn visible(&self) -> Vec<&VatRate> {
        let text = self.search_text.trim().to_lowercase();
        self.items
            .iter()
            .filter(|item| {
                text.is_empty()
                    || item
                        .rate
                        .map(|r| r.to_string().contains(&text))
                        .unwrap_or(false)
            })
            .collect()
    }
}
