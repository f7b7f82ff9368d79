use std::sync::Arc;

use crate::caddy::AdminApi;
use crate::certs::CertificateInventory;
use crate::reconcile::Reconciler;
use crate::registry::RegistryStore;

/// Application state injected into API handlers.
pub struct AppState<A> {
    pub reconciler: Arc<Reconciler<A>>,
    pub certificates: CertificateInventory,
}

impl<A: AdminApi> AppState<A> {
    pub fn new(reconciler: Arc<Reconciler<A>>, certificates: CertificateInventory) -> Self {
        Self {
            reconciler,
            certificates,
        }
    }

    pub fn admin(&self) -> &A {
        self.reconciler.admin()
    }

    pub fn store(&self) -> &RegistryStore {
        self.reconciler.store()
    }
}

impl<A> Clone for AppState<A> {
    fn clone(&self) -> Self {
        Self {
            reconciler: self.reconciler.clone(),
            certificates: self.certificates.clone(),
        }
    }
}
