//! Terminal progress for preload passes.

use std::future::Future;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

use precache::Preloader;

/// Drive `work` while mirroring the preloader's progress on a bar.
pub async fn run_with_progress<F, T>(preloader: &Preloader, work: F) -> Result<T>
where
    F: Future<Output = T>,
{
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("##-"),
    );

    let mut progress = preloader.subscribe();
    let watcher = {
        let bar = bar.clone();
        tokio::spawn(async move {
            while progress.changed().await.is_ok() {
                let current = *progress.borrow_and_update();
                bar.set_length(current.total as u64);
                bar.set_position(current.completed as u64);
                bar.set_message(current.status_message());
            }
        })
    };

    let output = work.await;

    watcher.abort();
    bar.finish_and_clear();
    Ok(output)
}
