//! Scoped realm entry.

use ferry_core::{CloneResult, RealmId};
use tracing::trace;

use crate::layer::SecurityLayer;

/// Keeps a realm entered for as long as it is alive.
///
/// Dropping the entry restores whichever realm was ambient when it was
/// created, including when the enclosing scope exits through `?` or a
/// panic.
#[must_use = "the realm is left as soon as the entry is dropped"]
pub struct RealmEntry<'a, L: SecurityLayer + ?Sized> {
    layer: &'a L,
    entered: RealmId,
    previous: RealmId,
}

impl<'a, L: SecurityLayer + ?Sized> RealmEntry<'a, L> {
    /// Enter `realm`.
    ///
    /// # Errors
    ///
    /// Returns an error if the layer does not know the realm. The ambient
    /// realm is unchanged in that case.
    pub fn enter(layer: &'a L, realm: RealmId) -> CloneResult<Self> {
        let previous = layer.enter_realm(realm)?;
        trace!(%realm, %previous, "entered realm");
        Ok(Self {
            layer,
            entered: realm,
            previous,
        })
    }

    /// The realm held entered by this guard.
    #[must_use]
    pub fn realm(&self) -> RealmId {
        self.entered
    }

    /// The realm that will be restored on drop.
    #[must_use]
    pub fn previous(&self) -> RealmId {
        self.previous
    }
}

impl<L: SecurityLayer + ?Sized> Drop for RealmEntry<'_, L> {
    fn drop(&mut self) {
        self.layer.restore_realm(self.previous);
        trace!(realm = %self.entered, restored = %self.previous, "left realm");
    }
}

impl<L: SecurityLayer + ?Sized> std::fmt::Debug for RealmEntry<'_, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealmEntry")
            .field("entered", &self.entered)
            .field("previous", &self.previous)
            .finish_non_exhaustive()
    }
}
