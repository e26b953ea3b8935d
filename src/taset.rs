//! Trust anchor store (§4.7). Holds the current, committed set of DNSSEC
//! trust anchors plus a staging set accumulated while the resolver walks a
//! trust anchor through an RFC 5011 rollover. `diff_and_swap` is the only
//! way staging becomes current, so a rollover the resolver aborts partway
//! through never corrupts the committed set.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::info;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TrustAnchorSet(BTreeSet<String>);

impl TrustAnchorSet {
    pub fn from_lines(text: &str) -> Self {
        TrustAnchorSet(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with(';'))
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn to_lines(&self) -> String {
        self.0.iter().cloned().collect::<Vec<_>>().join("\n")
    }

    pub fn contains(&self, anchor: &str) -> bool {
        self.0.contains(anchor)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub struct TrustAnchorStore {
    path: PathBuf,
    current: TrustAnchorSet,
    staging: Option<BTreeSet<String>>,
}

impl TrustAnchorStore {
    pub fn new(path: impl Into<PathBuf>, current: TrustAnchorSet) -> Self {
        TrustAnchorStore {
            path: path.into(),
            current,
            staging: None,
        }
    }

    pub async fn load(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let text = match fs::read_to_string(&path).await {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e),
        };
        Ok(TrustAnchorStore::new(path, TrustAnchorSet::from_lines(&text)))
    }

    pub fn current(&self) -> &TrustAnchorSet {
        &self.current
    }

    /// Begin accumulating a new set of anchors; any anchors added before
    /// this call are discarded, mirroring `NEW_TAS_ABORT` resetting
    /// whatever was staged.
    pub fn begin_staging(&mut self) {
        self.staging = Some(BTreeSet::new());
    }

    pub fn stage(&mut self, anchor: String) {
        self.staging.get_or_insert_with(BTreeSet::new).insert(anchor);
    }

    pub fn abort_staging(&mut self) {
        self.staging = None;
    }

    /// Whether a staging round is currently in progress.
    pub fn is_staging(&self) -> bool {
        self.staging.is_some()
    }

    /// Commit the staged set as current, returning the anchors added and
    /// removed relative to the previous set so the caller can log the
    /// change.
    pub fn diff_and_swap(&mut self) -> (Vec<String>, Vec<String>) {
        let staged = self.staging.take().unwrap_or_default();
        let added: Vec<String> = staged.difference(&self.current.0).cloned().collect();
        let removed: Vec<String> = self.current.0.difference(&staged).cloned().collect();
        self.current = TrustAnchorSet(staged);
        (added, removed)
    }

    pub async fn persist(&self) -> io::Result<()> {
        persist_to(&self.path, &self.current).await
    }
}

async fn persist_to(path: &Path, anchors: &TrustAnchorSet) -> io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, anchors.to_lines()).await?;
    fs::rename(&tmp_path, path).await?;
    info!(count = anchors.len(), path = %path.display(), "trust anchors persisted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lines_ignoring_comments_and_blanks() {
        let set = TrustAnchorSet::from_lines(
            "; comment\n\nexample.com. IN DS 12345 8 2 ABCD\n",
        );
        assert_eq!(set.len(), 1);
        assert!(set.contains("example.com. IN DS 12345 8 2 ABCD"));
    }

    #[test]
    fn diff_and_swap_reports_added_and_removed() {
        let mut store = TrustAnchorStore::new(
            "/dev/null",
            TrustAnchorSet::from_lines("old-anchor\n"),
        );
        store.begin_staging();
        store.stage("new-anchor".to_string());
        let (added, removed) = store.diff_and_swap();
        assert_eq!(added, vec!["new-anchor".to_string()]);
        assert_eq!(removed, vec!["old-anchor".to_string()]);
        assert!(store.current().contains("new-anchor"));
        assert!(!store.current().contains("old-anchor"));
    }

    #[test]
    fn aborted_staging_is_not_reused_by_a_later_swap() {
        let mut store = TrustAnchorStore::new(
            "/dev/null",
            TrustAnchorSet::from_lines("old-anchor\n"),
        );
        store.begin_staging();
        store.stage("new-anchor".to_string());
        store.abort_staging();
        // No NEW_TAS_DONE followed the abort, so the caller must not call
        // diff_and_swap at all; if it does anyway, staging is empty rather
        // than silently containing the aborted anchor.
        let (added, _removed) = store.diff_and_swap();
        assert!(added.is_empty());
    }
}
