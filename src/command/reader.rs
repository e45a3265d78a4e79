//! The stdin-reading thread. Blocks on stdin line by line for the lifetime
//! of the process; every parsed command is handed to a caller-supplied
//! dispatcher. There is no way to signal this thread to stop other than the
//! process exiting - stdin closing ends the loop naturally.

use std::io::BufRead;

use super::{parse_line, Command};

/// Spawn the reader thread. `on_command` runs on the reader thread itself;
/// callers that need to touch shared state typically forward each command
/// onto another thread's work queue rather than doing the work inline here.
pub fn spawn<F>(on_command: F) -> std::thread::JoinHandle<()>
where
    F: Fn(Command) + Send + 'static,
{
    std::thread::Builder::new()
        .name("simulator-server-command-reader".into())
        .spawn(move || run(std::io::stdin().lock(), on_command))
        .expect("failed to spawn command reader thread")
}

fn run<R: BufRead, F: Fn(Command)>(reader: R, on_command: F) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "stdin read error, stopping command reader");
                return;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let command = parse_line(trimmed);
        if let Command::Unknown(raw) = &command {
            tracing::warn!(line = %raw, "unrecognized command line");
            continue;
        }
        on_command(command);
    }
    tracing::debug!("stdin closed, command reader exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn dispatches_each_recognized_line_once() {
        let input = b"touch began 0.1,0.1\nbogus\nshutdown\n" as &[u8];
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        run(input, move |cmd| seen_clone.lock().unwrap().push(cmd));
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(matches!(seen[1], Command::Shutdown));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let input = b"\n\n  \nshutdown\n" as &[u8];
        let count = Arc::new(Mutex::new(0usize));
        let count_clone = count.clone();
        run(input, move |_| *count_clone.lock().unwrap() += 1);
        assert_eq!(*count.lock().unwrap(), 1);
    }
}
