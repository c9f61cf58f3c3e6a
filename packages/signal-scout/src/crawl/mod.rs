//! Crawl frontier, politeness and the crawl loop.

pub mod frontier;
pub mod politeness;
pub mod relevancy;
pub mod runner;

pub use frontier::{Admission, Frontier};
pub use politeness::Politeness;
pub use relevancy::LinkScorer;
pub use runner::{CrawlReport, SiteCrawler};
