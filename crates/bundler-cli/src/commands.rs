//! Subcommand implementations
//!
//! Each command returns a serializable report; `main` decides whether to
//! print it as text or JSON.

use crate::config::BundlerConfig;
use anyhow::Context;
use bundler_codec::{check_ownership, check_references, external_refs, prune_unreachable};
use bundler_model::{ContentHash, Document, Iid, VersionId};
use bundler_resolve::{CachedStore, FsStore, Resolver};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Read and parse a document file
///
/// # Errors
/// Returns error if the file cannot be read or parsed
pub fn read_document(path: &Path) -> anyhow::Result<Document> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading document {}", path.display()))?;
    Document::from_json_str(&json).with_context(|| format!("parsing document {}", path.display()))
}

/// Summary of one document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectReport {
    /// Version stamp
    pub version: String,
    /// Root iid
    pub root: Iid,
    /// Number of entries in the map
    pub entries: usize,
    /// Declared dependency versions
    pub deps: Vec<VersionId>,
    /// Weak references leaving the document
    pub external_refs: usize,
    /// Blake3 of the canonical JSON, printed as hex
    pub fingerprint: ContentHash,
    /// Entry count per class tag
    pub classes: BTreeMap<String, usize>,
}

impl Display for InspectReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "version:       {}", self.version)?;
        writeln!(f, "root:          {}", self.root)?;
        writeln!(f, "entries:       {}", self.entries)?;
        writeln!(f, "external refs: {}", self.external_refs)?;
        writeln!(f, "fingerprint:   {}", self.fingerprint)?;
        if self.deps.is_empty() {
            writeln!(f, "deps:          (none)")?;
        } else {
            writeln!(f, "deps:")?;
            for dep in &self.deps {
                writeln!(f, "  {dep}")?;
            }
        }
        writeln!(f, "classes:")?;
        for (class, count) in &self.classes {
            writeln!(f, "  {class:<24} {count}")?;
        }
        Ok(())
    }
}

/// `bundler inspect`
///
/// # Errors
/// Returns error if the document cannot be fingerprinted
pub fn inspect(doc: &Document) -> anyhow::Result<InspectReport> {
    let fingerprint = doc.fingerprint().context("fingerprinting document")?;
    Ok(InspectReport {
        version: doc.version.clone(),
        root: doc.root,
        entries: doc.len(),
        deps: doc.deps.clone(),
        external_refs: external_refs(doc).len(),
        fingerprint,
        classes: doc
            .class_histogram()
            .into_iter()
            .map(|(class, n)| (class.as_str().to_string(), n))
            .collect(),
    })
}

/// Problems found by `bundler check`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    /// First unfollowable reference, if any
    pub reference_error: Option<String>,
    /// Ownership-tree violations (only when structure checks are on)
    pub violations: Vec<String>,
    /// External references whose version is not listed in `deps`
    pub undeclared_deps: bool,
    /// Set when the document does not hash to the expected fingerprint
    pub fingerprint_mismatch: Option<FingerprintMismatch>,
}

/// Expected and actual fingerprints of a changed document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FingerprintMismatch {
    /// Fingerprint the caller asked for
    pub expected: ContentHash,
    /// Fingerprint of the document as read
    pub actual: ContentHash,
}

impl CheckReport {
    /// No problem of any kind was found
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.reference_error.is_none()
            && self.violations.is_empty()
            && !self.undeclared_deps
            && self.fingerprint_mismatch.is_none()
    }
}

impl Display for CheckReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return writeln!(f, "ok");
        }
        if let Some(err) = &self.reference_error {
            writeln!(f, "reference error: {err}")?;
        }
        for violation in &self.violations {
            writeln!(f, "violation: {violation}")?;
        }
        if self.undeclared_deps {
            writeln!(f, "external references present but no dependencies declared")?;
        }
        if let Some(mismatch) = &self.fingerprint_mismatch {
            writeln!(
                f,
                "fingerprint mismatch: expected {}, found {}",
                mismatch.expected, mismatch.actual
            )?;
        }
        Ok(())
    }
}

/// `bundler check`
///
/// With `expected` set, the document must also hash to that fingerprint.
///
/// # Errors
/// Returns error if the document cannot be fingerprinted
pub fn check(
    doc: &Document,
    verify_structure: bool,
    expected: Option<ContentHash>,
) -> anyhow::Result<CheckReport> {
    let violations = if verify_structure {
        check_ownership(doc).iter().map(ToString::to_string).collect()
    } else {
        Vec::new()
    };
    let fingerprint_mismatch = match expected {
        Some(expected) => {
            let actual = doc.fingerprint().context("fingerprinting document")?;
            info!(fingerprint = %actual.short(), matches = actual == expected, "fingerprint checked");
            (actual != expected).then_some(FingerprintMismatch { expected, actual })
        }
        None => None,
    };
    Ok(CheckReport {
        reference_error: check_references(doc).err().map(|e| e.to_string()),
        violations,
        undeclared_deps: doc.deps.is_empty() && !external_refs(doc).is_empty(),
        fingerprint_mismatch,
    })
}

/// Result of `bundler prune`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    /// Iids dropped from the map
    pub removed: Vec<Iid>,
    /// Entries left
    pub remaining: usize,
    /// Where the pruned document was written
    pub output: PathBuf,
}

impl Display for PruneReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "removed {} entries, {} remain -> {}",
            self.removed.len(),
            self.remaining,
            self.output.display()
        )
    }
}

/// `bundler prune`: drop unreachable entries, writing to `output`
///
/// # Errors
/// Returns error if the result cannot be written
pub fn prune(mut doc: Document, output: &Path) -> anyhow::Result<PruneReport> {
    let removed = prune_unreachable(&mut doc);
    let json = doc.to_json_pretty().context("serializing pruned document")?;
    std::fs::write(output, json).with_context(|| format!("writing {}", output.display()))?;
    info!(removed = removed.len(), output = %output.display(), "document pruned");
    Ok(PruneReport {
        removed,
        remaining: doc.len(),
        output: output.to_path_buf(),
    })
}

/// Result of `bundler deps`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepsReport {
    /// Resolved dependencies, leaves first
    pub order: Vec<VersionId>,
    /// Set when resolution failed in loose mode
    pub unresolved: Option<String>,
}

impl Display for DepsReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, id) in self.order.iter().enumerate() {
            writeln!(f, "{:>3}. {id}", i + 1)?;
        }
        if let Some(reason) = &self.unresolved {
            writeln!(f, "unresolved: {reason}")?;
        }
        Ok(())
    }
}

/// `bundler deps`: resolve from a directory store
///
/// In loose mode a retryable failure (missing or unreachable dependency)
/// is reported rather than returned.
///
/// # Errors
/// Returns error if resolution fails
pub async fn deps(doc: &Document, store_dir: &Path, config: &BundlerConfig) -> anyhow::Result<DepsReport> {
    let store = CachedStore::new(FsStore::new(store_dir), config.cache_capacity);
    let resolver = Resolver::new(store).with_config(config.resolver);
    match resolver.resolve_dependencies(doc).await {
        Ok(resolved) => Ok(DepsReport {
            order: resolved.ids().cloned().collect(),
            unresolved: None,
        }),
        Err(e) if config.decode.loose && e.is_retryable() => {
            warn!(error = %e, "dependency resolution incomplete");
            Ok(DepsReport {
                order: Vec::new(),
                unresolved: Some(e.to_string()),
            })
        }
        Err(e) => Err(e).with_context(|| format!("resolving from {}", store_dir.display())),
    }
}
