pub mod analysis_jobs;
