//! Duplicate-file resolution protocol.
//!
//! Before bytes are sent, a backend may list the target directory and ask
//! a `DuplicateResolver` what to do about an existing entry. The resolver
//! is called synchronously on a blocking thread and the upload waits for
//! its answer.

use std::sync::Arc;

use crate::item::TransferItem;
use crate::paths;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateDecision {
    /// Upload to the original target.
    Ignore,
    /// Upload to this remote path instead, overwriting it.
    Replace(String),
    /// Give up without transferring anything.
    Abort,
}

#[derive(Debug, Clone)]
pub struct DuplicateRequest {
    pub item: Arc<TransferItem>,
    pub hostname: String,
    /// Name of the existing remote entry, as listed.
    pub candidate_name: String,
    /// Full remote path of the existing entry.
    pub candidate_path: String,
}

impl DuplicateRequest {
    /// The decision that overwrites the existing entry.
    pub fn replace(&self) -> DuplicateDecision {
        DuplicateDecision::Replace(self.candidate_path.clone())
    }
}

pub trait DuplicateResolver: Send + Sync {
    fn resolve(&self, request: &DuplicateRequest) -> DuplicateDecision;
}

impl<F> DuplicateResolver for F
where
    F: Fn(&DuplicateRequest) -> DuplicateDecision + Send + Sync,
{
    fn resolve(&self, request: &DuplicateRequest) -> DuplicateDecision {
        self(request)
    }
}

/// First listed entry whose name contains `original_name`.
///
/// Case-sensitive substring match on the full file name, extension
/// included, so `shot.png` matches `old_shot.png` but not `shot_old.png`.
/// The stem is never compared on its own: `shot.jpg` is not a duplicate
/// of `shot.png`.
pub fn find_duplicate<'a>(listing: &'a [String], original_name: &str) -> Option<&'a str> {
    if original_name.is_empty() {
        return None;
    }
    listing
        .iter()
        .map(|entry| paths::remote_file_name(entry.trim_end_matches('/')))
        .filter(|name| *name != "." && *name != "..")
        .find(|name| name.contains(original_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn prefix_sharing_name_does_not_match() {
        let l = listing(&["shot_old.png", "other.jpg"]);
        assert_eq!(find_duplicate(&l, "shot.png"), None);
    }

    #[test]
    fn same_stem_with_other_extension_does_not_match() {
        let l = listing(&["shot.jpg", "shot"]);
        assert_eq!(find_duplicate(&l, "shot.png"), None);
    }

    #[test]
    fn substring_match_takes_first() {
        let l = listing(&[".", "..", "old_shot.png", "shot.png"]);
        assert_eq!(find_duplicate(&l, "shot.png"), Some("old_shot.png"));
    }

    #[test]
    fn match_is_case_sensitive() {
        let l = listing(&["SHOT.png"]);
        assert_eq!(find_duplicate(&l, "shot.png"), None);
    }

    #[test]
    fn full_paths_in_listing_are_reduced_to_names() {
        let l = listing(&["/public/shots/shot.png"]);
        assert_eq!(find_duplicate(&l, "shot.png"), Some("shot.png"));
    }

    #[test]
    fn empty_name_never_matches() {
        let l = listing(&["a.png"]);
        assert_eq!(find_duplicate(&l, ""), None);
    }
}
