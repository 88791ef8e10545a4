pub mod comments;
pub mod config;
pub mod error;
pub mod feed;
pub mod mutation;
pub mod session;
pub mod state;
pub mod view;

use tracing_subscriber::{fmt, EnvFilter};

pub use config::ClientConfig;
pub use error::ClientError;
pub use mutation::{OptimisticCoordinator, ToggleError, ToggleSnapshot, ToggleStore};
pub use session::{ChatSession, SessionDeps, SessionState};
pub use state::AppState;
pub use view::{ViewScope, ViewState};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("mosaic_client=debug,mosaic_net=debug,mosaic_store=info,mosaic_media=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}
