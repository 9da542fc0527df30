//! Per-core service container and the per-request service storage.
//!
//! The container is deliberately `Rc` based: services resolve on the core
//! that owns them and never cross cores. Registration happens at startup;
//! at steady state the container is effectively read-only.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::errors::{HttpError, HttpResult};

/// How long a resolved service instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceLifetime {
    /// A fresh instance per resolution.
    Transient,
    /// One instance per service storage scope (one per request).
    StoragePersistent,
    /// One instance per container (per core).
    Singleton,
}

type AnyRc = Rc<dyn Any>;
type ServiceFactory = Rc<dyn Fn(&ServiceContainer, &ServiceStorage) -> AnyRc>;

/// One registration of a service type.
pub struct ServiceEntry {
    lifetime: ServiceLifetime,
    factory: ServiceFactory,
    singleton: RefCell<Option<AnyRc>>,
}

impl ServiceEntry {
    pub fn lifetime(&self) -> ServiceLifetime {
        self.lifetime
    }

    fn resolve(
        self: &Rc<Self>,
        container: &ServiceContainer,
        storage: &ServiceStorage,
    ) -> AnyRc {
        match self.lifetime {
            ServiceLifetime::Transient => (self.factory)(container, storage),
            ServiceLifetime::Singleton => {
                let mut cached = self.singleton.borrow_mut();
                match &*cached {
                    Some(instance) => instance.clone(),
                    None => {
                        let instance = (self.factory)(container, storage);
                        *cached = Some(instance.clone());
                        instance
                    },
                }
            },
            ServiceLifetime::StoragePersistent => {
                let key = Rc::as_ptr(self) as usize;
                if let Some(instance) = storage.get_raw(key) {
                    return instance;
                }
                let instance = (self.factory)(container, storage);
                storage.set_raw(key, instance.clone());
                instance
            },
        }
    }
}

/// Per-core dependency container.
#[derive(Clone, Default)]
pub struct ServiceContainer {
    services: Rc<RefCell<HashMap<TypeId, Vec<Rc<ServiceEntry>>>>>,
}

impl ServiceContainer {
    pub fn new() -> ServiceContainer {
        ServiceContainer::default()
    }

    /// Register a pre-built instance; resolving clones it.
    pub fn add_instance<T: Clone + 'static>(&self, instance: T) {
        self.add_entry::<T>(
            ServiceLifetime::Singleton,
            Rc::new(move |_, _| Rc::new(instance.clone()) as AnyRc),
        );
    }

    /// Register a factory with the given lifetime.
    pub fn add_factory<T, F>(&self, lifetime: ServiceLifetime, factory: F)
    where
        T: Clone + 'static,
        F: Fn(&ServiceContainer, &ServiceStorage) -> T + 'static,
    {
        self.add_entry::<T>(
            lifetime,
            Rc::new(move |container, storage| Rc::new(factory(container, storage)) as AnyRc),
        );
    }

    fn add_entry<T: 'static>(&self, lifetime: ServiceLifetime, factory: ServiceFactory) {
        self.services
            .borrow_mut()
            .entry(TypeId::of::<T>())
            .or_default()
            .push(Rc::new(ServiceEntry {
                lifetime,
                factory,
                singleton: RefCell::new(None),
            }));
    }

    /// Resolve the latest registration of `T`.
    pub fn get<T: Clone + 'static>(&self, storage: &ServiceStorage) -> HttpResult<T> {
        let entry = {
            let services = self.services.borrow();
            services
                .get(&TypeId::of::<T>())
                .and_then(|entries| entries.last())
                .cloned()
        };
        let Some(entry) = entry else {
            return Err(HttpError::Logic("service is not registered"));
        };
        let instance = entry.resolve(self, storage);
        match instance.downcast_ref::<T>() {
            Some(value) => Ok(value.clone()),
            None => Err(HttpError::Logic("service instance type mismatch")),
        }
    }

    /// Resolve every registration of `T`, in registration order.
    pub fn get_many<T: Clone + 'static>(
        &self,
        storage: &ServiceStorage,
        out: &mut Vec<T>,
    ) -> HttpResult<()> {
        let entries = {
            let services = self.services.borrow();
            services.get(&TypeId::of::<T>()).cloned().unwrap_or_default()
        };
        for entry in entries {
            let instance = entry.resolve(self, storage);
            match instance.downcast_ref::<T>() {
                Some(value) => out.push(value.clone()),
                None => return Err(HttpError::Logic("service instance type mismatch")),
            }
        }
        Ok(())
    }

    /// Remove all registrations of `T` and return them.
    pub fn remove<T: 'static>(&self) -> Vec<Rc<ServiceEntry>> {
        self.services
            .borrow_mut()
            .remove(&TypeId::of::<T>())
            .unwrap_or_default()
    }
}

/// Per-request cache for `StoragePersistent` services.
#[derive(Default)]
pub struct ServiceStorage {
    instances: RefCell<HashMap<usize, AnyRc>>,
}

impl ServiceStorage {
    pub fn new() -> ServiceStorage {
        ServiceStorage::default()
    }

    fn get_raw(&self, key: usize) -> Option<AnyRc> {
        self.instances.borrow().get(&key).cloned()
    }

    fn set_raw(&self, key: usize, instance: AnyRc) {
        self.instances.borrow_mut().insert(key, instance);
    }

    pub fn clear(&self) {
        self.instances.borrow_mut().clear();
    }
}
