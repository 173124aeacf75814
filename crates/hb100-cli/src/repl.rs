//! The interactive command reader.
//!
//! One background thread reads stdin line by line, parses each line into a
//! task and enqueues it. EOF (or a read error) enqueues `quit` so closing
//! the terminal shuts the editor down cleanly.

use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::warn;

use hb100_engine::{Task, TaskKind, TaskQueue};

/// Spawn the stdin reader thread.
pub fn spawn(queue: Arc<TaskQueue>, stop: Arc<AtomicBool>) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("cli".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            let mut lines = stdin.lock().lines();
            loop {
                if stop.load(Ordering::SeqCst) {
                    return;
                }
                print!("HB100> ");
                let _ = std::io::stdout().flush();
                let Some(Ok(line)) = lines.next() else {
                    break;
                };
                let argv: Vec<&str> = line.split_whitespace().collect();
                if argv.is_empty() {
                    continue;
                }
                match Task::from_argv(&argv) {
                    Some(task) => queue.push(task),
                    None => warn!("invalid command, try 'help'"),
                }
            }
            queue.push(Task::new(TaskKind::Quit));
        })
        .expect("failed to spawn the CLI thread")
}
