use anyhow::Result;

/// Everything in the application runs on a single thread: timer ticks, activity events and user
/// commands are handled one at a time.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
