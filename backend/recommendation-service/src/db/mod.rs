pub mod job_search_repo;

pub use job_search_repo::{JobSearchRepo, ScoredJobRow};
