//! Integration tests for crawl-agent
//!
//! Crawls run against wiremock servers through the real HTTP fetcher, with a
//! scripted chat client standing in for the language model.

mod common;
mod crawl_tests;
mod index_tests;
