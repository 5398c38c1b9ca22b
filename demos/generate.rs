//! Generates one image through the studio and saves it next to the history.
//!
//! Run with: `cargo run --example generate -- "a lighthouse in a storm"`
//!
//! Uses `GENSTUDIO_BACKEND` (default `gemini`) and the matching API key:
//! `GOOGLE_API_KEY` or `STABILITY_API_KEY`.

use genstudio::{ImageSettings, NoticeLog, Studio, StudioConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() -> genstudio::Result<()> {
    let prompt = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "A golden retriever puppy playing in snow".into());

    let config = StudioConfig::from_env()?;
    let notices = Arc::new(NoticeLog::new());
    let mut studio = Studio::from_config(&config, notices.clone())?;

    println!("Provider: {}", studio.provider().name());

    let settings = ImageSettings::default();
    let result = studio
        .generate(&prompt, genstudio::image::DEFAULT_NEGATIVE_PROMPT, settings)
        .await;

    for notice in notices.take() {
        println!("{notice}");
    }

    let record = result?;
    let path = studio.download(&record.id)?.save_in(".")?;
    println!(
        "Saved {} ({} entries in history at {})",
        path.display(),
        studio.history().len(),
        config.data_dir.display()
    );

    Ok(())
}
