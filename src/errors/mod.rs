pub mod error;

pub use error::{AppError, BroadcastError, BuildError, SignError, SubmitError, TrackingError};
