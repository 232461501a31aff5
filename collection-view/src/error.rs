use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum CollectionViewError {
    /// A view needs at least one view mode.
    #[error("at least one view mode must be specified")]
    NoViewModes,
}
