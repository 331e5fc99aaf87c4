//! Turning stored keys back into host entities.

use followable_common::{AppError, AppResult, ResolutionPolicy};
use tracing::warn;

use crate::store::EntityResolver;
use crate::types::EntityKey;

/// Resolve `keys` in order.
///
/// A key whose entity is gone either aborts the whole call with
/// [`AppError::Resolution`] or is logged and left out, depending on `policy`.
pub async fn resolve_all<R, I>(
    resolver: &R,
    keys: I,
    policy: ResolutionPolicy,
) -> AppResult<Vec<R::Entity>>
where
    R: EntityResolver + ?Sized,
    I: IntoIterator<Item = EntityKey> + Send,
    I::IntoIter: Send,
{
    let mut entities = Vec::new();
    for key in keys {
        match resolver.resolve(&key).await? {
            Some(entity) => entities.push(entity),
            None => match policy {
                ResolutionPolicy::Abort => return Err(AppError::Resolution(key.to_string())),
                ResolutionPolicy::Skip => {
                    warn!(key = %key, "Skipping entity that no longer resolves");
                }
            },
        }
    }
    Ok(entities)
}
