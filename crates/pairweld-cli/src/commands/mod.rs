pub mod decode;
pub mod encode;
pub mod train;

use pairweld::{Engine, PairweldError};

/// Acquire the engine, or fall back to host compute on machines without a
/// usable adapter.
pub fn try_engine() -> Result<Option<Engine>, Box<dyn std::error::Error>> {
    match Engine::init() {
        Ok(engine) => Ok(Some(engine)),
        Err(PairweldError::DeviceUnavailable) => {
            log::warn!("no GPU adapter available; running on the host");
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}
