use thiserror::Error;

use mosaic_shared::MosaicError;
use mosaic_store::StoreError;

/// Errors from wiring the client together.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Mosaic(#[from] MosaicError),

    #[error("Local store error: {0}")]
    Store(#[from] StoreError),
}
