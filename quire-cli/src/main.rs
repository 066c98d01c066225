//! Quire CLI entry point.
//!
//! Runs a scripted reading-tracker walkthrough against the in-memory store
//! and prints each observed view as JSON.

mod config;
mod telemetry;

use quire_core::{BlobRef, NewReview, NewTrackedBook, ProfileDraft, QuireError};
use quire_storage::{MockBlobSource, MockIdentityProvider, MockRemoteStore, Session};
use serde::Serialize;
use std::sync::Arc;

/// PNG signature followed by filler, enough for MIME sniffing.
const COVER_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Quire(#[from] QuireError),
    #[error("Failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to init subscriber: {0}")]
    Telemetry(String),
    #[error("Identity provider declined the login")]
    LoginDeclined,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    telemetry::init(config::json_logs())?;
    let config = config::load()?;
    tracing::info!(
        latest_reviews_limit = config.latest_reviews_limit,
        stale_after_ms = config.cache.stale_after_ms,
        "Configuration loaded"
    );

    let store = MockRemoteStore::new();
    let cover = BlobRef::new("cover-dune");
    let blobs = MockBlobSource::new().with_bytes(&cover, COVER_BYTES.to_vec());
    let mut session = Session::new(config, Arc::new(store), Arc::new(blobs), None);

    let provider = MockIdentityProvider::new("reader-1");
    if session.login(&provider).await?.is_none() {
        return Err(CliError::LoginDeclined);
    }

    walkthrough(&session, cover).await?;

    let stats = session.cache_stats();
    tracing::info!(
        hits = stats.hits,
        misses = stats.misses,
        network_fetches = stats.network_fetches,
        invalidations = stats.invalidations,
        hit_rate = stats.hit_rate(),
        "Cache statistics"
    );

    session.logout(&provider).await?;
    Ok(())
}

async fn walkthrough(session: &Session, cover: BlobRef) -> Result<(), CliError> {
    session.load_caller_profile().await?;
    if session.needs_profile_setup() {
        session
            .save_profile(ProfileDraft {
                name: "Ada".to_string(),
                avatar: None,
            })
            .await?;
    }
    print_json("profile", &session.load_caller_profile().await?)?;

    let review_id = session
        .add_review(NewReview {
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            isbn: Some("9780441013593".to_string()),
            rating: 5,
            body: "The spice must flow.".to_string(),
            cover: Some(cover),
        })
        .await?;
    print_json("latest reviews", &session.load_latest_reviews().await?)?;

    let action = session.toggle_like(review_id).await?;
    tracing::info!(review_id = %review_id, action = ?action, "Toggled like");
    let review = session.load_review(review_id).await?;
    print_json("review", &review)?;

    session.add_comment(review_id, "Best opening chapter ever.").await?;
    print_json("comments", &session.load_comments(review_id).await?)?;

    let book_id = session
        .add_tracked_book(NewTrackedBook {
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            isbn: Some("9780441013593".to_string()),
        })
        .await?;
    session.start_reading_session(book_id).await?;
    session
        .update_book_progress(book_id, "in-progress", "150")
        .await?;
    session.finish_reading_session(book_id, "40", "2").await?;
    session.finish_book().await?;
    print_json("tracked books", &session.load_tracked_books().await?)?;
    print_json("reading metrics", &session.load_reading_metrics().await?)?;

    let mut slot = session.image_slot();
    slot.set_reference(review.as_ref().and_then(|r| r.cover.as_ref()));
    let url = slot.settled().await;
    print_json("cover url", &url)?;

    Ok(())
}

fn print_json<T: Serialize>(label: &str, value: &T) -> Result<(), CliError> {
    println!("# {label}");
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
