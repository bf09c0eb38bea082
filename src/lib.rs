pub mod clock;
pub mod detector;
pub mod job;
pub mod job_store;
pub mod merge;
pub mod orchestrator;
pub mod queue;
pub mod report_store;
pub mod settings;
pub mod status_sink;
pub mod sweeper;
pub mod trace;
