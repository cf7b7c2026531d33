use std::sync::Arc;

use crate::errors::ServiceError;
use crate::storage::{load_json, save_json, LocalStore, COOKIE_CONSENT_KEY};

/// Cookie consent flag stored under `phk_cookie_consent`.
pub struct ConsentStore {
    store: Arc<dyn LocalStore>,
}

impl ConsentStore {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    pub fn needs_prompt(&self) -> Result<bool, ServiceError> {
        let accepted: Option<bool> = load_json(self.store.as_ref(), COOKIE_CONSENT_KEY)?;
        Ok(accepted != Some(true))
    }

    pub fn accept(&self) -> Result<(), ServiceError> {
        save_json(self.store.as_ref(), COOKIE_CONSENT_KEY, &true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn prompt_until_accepted() {
        let store = Arc::new(MemoryStore::new());
        let consent = ConsentStore::new(store.clone());
        assert!(consent.needs_prompt().unwrap());

        consent.accept().unwrap();
        assert!(!consent.needs_prompt().unwrap());
        assert_eq!(store.get(COOKIE_CONSENT_KEY).unwrap().as_deref(), Some("true"));
    }
}
