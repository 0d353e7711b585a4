mod publisher_service;

pub use publisher_service::{check_candidates, PublisherService};
