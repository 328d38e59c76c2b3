//! # saved-feed
//!
//! Mirrors a Reddit account's saved posts and comments into a local store
//! and republishes them as an RSS feed.
//!
//! ## Architecture
//!
//! ```text
//! TokenManager → RedditClient → Synchronizer → Store → FeedSnapshot → FeedServer
//! ```
//!
//! - [`auth`]: OAuth password grant with a self-refreshing credential
//! - [`fetcher`]: Paginated access to the saved-items listing
//! - [`store`]: Append-only SQLite persistence with sequence ids
//! - [`cache`]: Periodic synchronization and the published snapshot
//! - [`server`]: HTTP delivery of the snapshot
//!
//! ## Quick Start
//!
//! ```bash
//! # Pull new saved items once
//! saved-feed sync
//!
//! # Print the feed built from the local store
//! saved-feed render
//!
//! # Keep syncing every 15 minutes, writing the feed to a file
//! saved-feed daemon --output saved.xml
//! ```

/// Application context and error handling.
///
/// [`AppContext`](app::AppContext) wires the token manager, client, store
/// and feed cache together and tears them down in order.
pub mod app;

/// OAuth credentials.
///
/// - [`TokenManager`](auth::TokenManager): keeps a fresh access token
/// - [`PasswordGrant`](auth::PasswordGrant): reqwest-based token exchange
pub mod auth;

/// Periodic synchronization and the published feed snapshot.
pub mod cache;

/// Command-line interface using clap.
///
/// - `daemon` - Keep the feed up to date until interrupted
/// - `sync` - Run one synchronization cycle
/// - `render` - Print the RSS document from the local store
/// - `list` - List stored items
pub mod cli;

/// Configuration loaded from `~/.config/saved-feed/config.toml`.
pub mod config;

/// Long-running mode driven by signals.
pub mod daemon;

/// Core domain models.
///
/// - [`Item`](domain::Item): one saved post or comment, kept as received
/// - [`FeedSnapshot`](domain::FeedSnapshot): renderable RSS channel
pub mod domain;

/// Saved-items listing.
///
/// - [`SavedSource`](fetcher::SavedSource): async trait for page fetching
/// - [`RedditClient`](fetcher::RedditClient): authenticated implementation
/// - [`SavedItems`](fetcher::SavedItems): lazy pagination
pub mod fetcher;

/// HTTP endpoint serving the feed at `/rss/reddit/{key}`.
pub mod server;

/// SQLite persistence layer.
///
/// - [`PostStore`](store::PostStore): trait defining storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;
