use std::sync::Arc;
use tracing::{info, instrument};

use crate::errors::ServiceError;
use crate::models::{default_catalog, Service, ServiceCategory};
use crate::storage::{load_json, save_json, LocalStore, SERVICES_KEY};

/// Service catalog, cached under `phk_services`.
pub struct CatalogStore {
    store: Arc<dyn LocalStore>,
    services: Vec<Service>,
}

impl CatalogStore {
    /// Uses the cached catalog when present; otherwise seeds and persists the defaults.
    pub fn load(store: Arc<dyn LocalStore>) -> Result<Self, ServiceError> {
        let cached: Option<Vec<Service>> = load_json(store.as_ref(), SERVICES_KEY)?;
        let services = match cached {
            Some(services) if !services.is_empty() => services,
            _ => {
                let seeded = default_catalog();
                save_json(store.as_ref(), SERVICES_KEY, &seeded)?;
                info!(count = seeded.len(), "Seeded default catalog");
                seeded
            }
        };
        Ok(Self { store, services })
    }

    /// Every service, inactive ones included.
    pub fn all(&self) -> &[Service] {
        &self.services
    }

    pub fn active(&self) -> impl Iterator<Item = &Service> {
        self.services.iter().filter(|s| s.active)
    }

    pub fn search(&self, query: &str) -> Vec<&Service> {
        self.active().filter(|s| s.matches(query)).collect()
    }

    pub fn by_category(&self, category: ServiceCategory) -> Vec<&Service> {
        self.active().filter(|s| s.category == category).collect()
    }

    pub fn find(&self, id: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.id == id)
    }

    /// Like [`find`](Self::find) but only for services that can be bought.
    pub fn find_active(&self, id: &str) -> Option<&Service> {
        self.active().find(|s| s.id == id)
    }

    pub fn categories(&self) -> Vec<ServiceCategory> {
        ServiceCategory::all()
    }

    /// Inserts or replaces a service by id.
    #[instrument(skip(self, service), fields(service_id = %service.id))]
    pub fn upsert(&mut self, service: Service) -> Result<(), ServiceError> {
        if service.name.trim().is_empty() {
            return Err(ServiceError::validation("Service name is required"));
        }
        if service.price.is_sign_negative() {
            return Err(ServiceError::validation("Price cannot be negative"));
        }
        let mut next = self.services.clone();
        match next.iter_mut().find(|s| s.id == service.id) {
            Some(existing) => *existing = service,
            None => next.push(service),
        }
        self.commit(next)
    }

    pub fn set_active(&mut self, id: &str, active: bool) -> Result<(), ServiceError> {
        let mut next = self.services.clone();
        let service = next
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| ServiceError::NotFound(format!("Service {} not found", id)))?;
        service.active = active;
        self.commit(next)
    }

    fn commit(&mut self, next: Vec<Service>) -> Result<(), ServiceError> {
        save_json(self.store.as_ref(), SERVICES_KEY, &next)?;
        self.services = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use rust_decimal_macros::dec;

    fn catalog() -> (Arc<MemoryStore>, CatalogStore) {
        let store = Arc::new(MemoryStore::new());
        let catalog = CatalogStore::load(store.clone()).unwrap();
        (store, catalog)
    }

    #[test]
    fn seeds_defaults_and_persists_them() {
        let (store, catalog) = catalog();
        assert_eq!(catalog.all().len(), 6);
        assert!(store.get(SERVICES_KEY).unwrap().is_some());
    }

    #[test]
    fn search_is_case_insensitive_over_name_and_category() {
        let (_, catalog) = catalog();
        assert_eq!(catalog.search("").len(), 6);
        assert!(!catalog.search("motion").is_empty());
        assert!(catalog.search("zzz").is_empty());
    }

    #[test]
    fn inactive_services_are_hidden_but_findable() {
        let (store, mut catalog) = catalog();
        catalog.set_active("6", false).unwrap();

        assert_eq!(catalog.search("").len(), 5);
        assert!(catalog.find("6").is_some());
        assert!(catalog.find_active("6").is_none());
        assert!(catalog.find_active("5").is_some());

        let reloaded = CatalogStore::load(store).unwrap();
        assert!(!reloaded.find("6").unwrap().active);
    }

    #[test]
    fn upsert_replaces_by_id() {
        let (_, mut catalog) = catalog();
        let mut service = catalog.find("2").unwrap().clone();
        service.price = dec!(180);
        catalog.upsert(service).unwrap();

        assert_eq!(catalog.all().len(), 6);
        assert_eq!(catalog.find("2").unwrap().price, dec!(180));
        assert!(catalog.set_active("missing", true).is_err());
    }

    #[test]
    fn by_category_filters() {
        let (_, catalog) = catalog();
        for category in catalog.categories() {
            assert!(catalog
                .by_category(category)
                .iter()
                .all(|s| s.category == category));
        }
    }
}
