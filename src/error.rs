// Error types for the location map.
//
// The data-plane operations (Set/Get/Discard/ScanCallback/GatherStats) are
// total on well-formed input and never return a `Result` — see spec §7.
// `LocMapError` exists only for the handful of things that actually can go
// wrong: standing up the background reorganization pool.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LocMapError {
    #[error("failed to spawn reorganization worker {index}: {source}")]
    WorkerSpawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, LocMapError>;
