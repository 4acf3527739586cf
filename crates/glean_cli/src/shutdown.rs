use std::future::Future;

use console::Term;

/// Exit status for a run cut short by Ctrl+C.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Drive `command` to completion unless Ctrl+C arrives first.
///
/// On interrupt the in-flight request is dropped (which cancels it) and the
/// process exits with status 130.
pub(crate) async fn run_interruptible<F>(command: F) -> Result<(), Box<dyn std::error::Error>>
where
    F: Future<Output = Result<(), Box<dyn std::error::Error>>>,
{
    tokio::select! {
        result = command => result,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            if Term::stdout().is_term() {
                eprintln!("\nInterrupted");
            } else {
                tracing::warn!("Interrupted, request cancelled");
            }
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completed_command_result_is_returned() {
        assert!(run_interruptible(async { Ok(()) }).await.is_ok());

        let failed = run_interruptible(async { Err("boom".into()) }).await;
        assert_eq!(failed.unwrap_err().to_string(), "boom");
    }
}
