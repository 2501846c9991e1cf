//! Lazily-searchable queries.

use crate::catalog::ItemCollection;
use crate::engine::EngineError;

/// A lazily-searchable query over a catalog.
///
/// A search is opaque except for one capability: it can be executed to produce an
/// [`ItemCollection`]. The dispatch facade executes a search input and re-dispatches
/// on the result with all arguments forwarded unchanged.
pub trait ItemSearch {
    /// Execute the search and return the matching items.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if the search cannot be executed; remote failures
    /// are propagated unmodified.
    fn item_collection(&self) -> Result<ItemCollection, EngineError>;
}
