pub mod orchestrator;
pub mod path_scanner;

pub use orchestrator::{
    FileFailure, FileReport, RunMode, RunObserver, RunReport, UpdateOrchestrator, UpdaterOutcome,
};
pub use path_scanner::PathScannerAgent;
