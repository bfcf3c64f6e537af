//! Terminal confirmations.

use std::io::{BufRead, Write};

use tokio::runtime::{Handle, RuntimeFlavor};

use docchat_core::Prompt;

/// Asks on stdout and reads a `y`/`yes` answer from stdin.
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn confirm(&self, message: &str) -> bool {
        print!("{} [y/N] ", message);
        if std::io::stdout().flush().is_err() {
            return false;
        }
        read_blocking(|| read_answer(std::io::stdin().lock()))
    }
}

/// Run a blocking read without stalling other tasks on a worker thread.
fn read_blocking<F: FnOnce() -> bool>(read: F) -> bool {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(read)
        }
        _ => read(),
    }
}

fn read_answer(mut reader: impl BufRead) -> bool {
    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(_) => is_yes(&line),
        Err(_) => false,
    }
}

pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_yes_answers() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
    }

    #[test]
    fn test_anything_else_is_no() {
        assert!(!is_yes(""));
        assert!(!is_yes("n"));
        assert!(!is_yes("sure"));
    }

    #[test]
    fn test_read_answer_first_line_only() {
        assert!(read_answer(Cursor::new("yes\nno\n")));
        assert!(!read_answer(Cursor::new("")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_read_on_worker_thread() {
        assert!(read_blocking(|| read_answer(Cursor::new("y\n"))));
    }

    #[tokio::test]
    async fn test_blocking_read_on_current_thread() {
        assert!(!read_blocking(|| read_answer(Cursor::new("n\n"))));
    }
}
