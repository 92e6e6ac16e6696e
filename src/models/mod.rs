pub mod analysis_job;
