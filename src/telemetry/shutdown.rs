use eyre::Result;

/// Registers a ctrl-c handler to gracefully shutdown the sync node
pub fn register_shutdown() -> Result<()> {
    ctrlc::set_handler(move || {
        println!();
        tracing::info!(target: "l2_sync", "shutting down...");
        std::process::exit(0);
    })?;
    Ok(())
}
