//! Common test infrastructure
//!
//! End-to-end tests drive the real pipeline against [`MockProvider`], an
//! in-process stand-in for the provider API that routes requests by path and
//! paginates its listings. Tests should only import from this module.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use catalog_harvester::pipeline::RunMode;
//! use common::{artist, TestHarness, DISCOVERY_QUERY, GROUP_1_ID};
//!
//! #[test]
//! fn test_discovers_group() {
//!     let harness = TestHarness::new();
//!     harness.provider.add_artist(artist(GROUP_1_ID, "TWICE", &["k-pop"], 80));
//!     harness.provider.add_artist_search(DISCOVERY_QUERY, &[GROUP_1_ID]);
//!     let stats = harness.run(RunMode::Full { revalidate: false });
//!     assert!(stats.stopped.is_none());
//! }
//! ```

mod constants;
mod fixtures;
mod harness;
mod mock_provider;

// Public API - this is what tests import
pub use constants::*;
pub use fixtures::{album, artist, listed_album};
pub use harness::TestHarness;
pub use mock_provider::MockProvider;
