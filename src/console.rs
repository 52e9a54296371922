//! Terminal implementations of the manager's collaborators.

use log::warn;
use shotlift_core::{DuplicateDecision, DuplicateRequest, DuplicateResolver, TransferError, TransferItem};
use shotlift_manager::NotificationSink;
use std::io::{self, BufRead, BufReader, Stdin, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

// ─── Duplicate prompt ────────────────────────────────────────────────

/// Asks on the terminal what to do about a duplicate.
///
/// Prompts are serialized so concurrent uploads never interleave.
/// End of input answers Ignore.
pub struct ConsoleResolver<R> {
    input: Mutex<R>,
}

impl ConsoleResolver<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(io::stdin()))
    }
}

impl<R: BufRead> ConsoleResolver<R> {
    pub fn new(input: R) -> Self {
        Self {
            input: Mutex::new(input),
        }
    }

    fn ask(&self, request: &DuplicateRequest) -> io::Result<DuplicateDecision> {
        let mut input = self.input.lock().unwrap_or_else(|e| e.into_inner());
        let mut err = io::stderr().lock();
        loop {
            write!(
                err,
                "'{}' already exists on {} as {}. [i]gnore, [r]eplace or [a]bort? ",
                request.item.original_file_name().unwrap_or_default(),
                request.hostname,
                request.candidate_path
            )?;
            err.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                return Ok(DuplicateDecision::Ignore);
            }
            if let Some(decision) = parse_answer(&line, request) {
                return Ok(decision);
            }
        }
    }
}

impl<R: BufRead + Send> DuplicateResolver for ConsoleResolver<R> {
    fn resolve(&self, request: &DuplicateRequest) -> DuplicateDecision {
        self.ask(request).unwrap_or_else(|e| {
            warn!("Could not read duplicate answer, ignoring duplicate: {}", e);
            DuplicateDecision::Ignore
        })
    }
}

fn parse_answer(line: &str, request: &DuplicateRequest) -> Option<DuplicateDecision> {
    match line.trim().to_ascii_lowercase().as_str() {
        "" | "i" | "ignore" => Some(DuplicateDecision::Ignore),
        "r" | "replace" => Some(request.replace()),
        "a" | "abort" => Some(DuplicateDecision::Abort),
        _ => None,
    }
}

// ─── Notifications ───────────────────────────────────────────────────

/// Prints links on stdout and failures on stderr, counting both.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }
}

impl NotificationSink for ConsoleSink {
    fn upload_succeeded(&self, _item: &TransferItem, url: &str) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
        println!("{}", url);
    }

    fn upload_failed(&self, item: &TransferItem, hostname: &str, error: &TransferError) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        let name = item
            .original_file_name()
            .unwrap_or_else(|| item.id().to_string());
        eprintln!("Upload of {} to {} failed: {}", name, hostname, error.message);
    }

    fn delete_succeeded(&self, item: &TransferItem) {
        eprintln!("Deleted {}", item.remote_path().unwrap_or_default());
    }

    fn delete_failed(&self, item: &TransferItem, hostname: &str) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        eprintln!("Could not delete upload {} from {}", item.id(), hostname);
    }
}
