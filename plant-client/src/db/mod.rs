pub mod reading_queries;
