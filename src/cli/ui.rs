// src/cli/ui.rs
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message.
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Create the batch progress spinner.
pub fn create_batch_spinner(total: usize) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.set_message(format!("running {} task(s)", total));
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    pb
}

/// Render the single-task canonical output: the final agent message,
/// followed by a separator and the session id when one was reported.
pub fn display_task_output(message: &str, session_id: Option<&str>) {
    println!("{}", message);
    if let Some(id) = session_id {
        println!("{}", "-".repeat(40));
        println!("SESSION_ID: {}", id);
    }
}
