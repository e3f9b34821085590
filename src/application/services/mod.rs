//! Application Services
//!
//! The scraper and the guild freshness analyzer. Long-running work is
//! driven by the job managers in `crate::application::jobs`.

pub mod analyzer;
pub mod scraper;

pub use analyzer::{
    analyze_guild, ChannelFreshness, ChannelStatus, FreshnessSummary, GuildAnalysis,
};
pub use scraper::{ScrapeOptions, ScrapeProgressEvent, ScrapeSummary, Scraper};
