//! State module for tracking crawl progress
//!
//! `UrlState` is the tag the visited registry keeps for every URL claimed
//! during a run.

mod url_state;

pub use url_state::UrlState;
