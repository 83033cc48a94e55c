//! Planning local destinations for remote objects
//!
//! A remote object `gs://bucket/dir/file.bam` planned under `/out` lands at
//! `/out/bucket/dir/file.bam`, and the directory-level rule
//! `gs://bucket/dir -> /out/bucket/dir` is recorded so that file lists
//! referencing the same directory can be rewritten later.

use ahash::AHashMap;
use smallvec::SmallVec;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::ManifestError;

/// The only scheme recognized as a remote object.
pub const GS_SCHEME: &str = "gs://";

/// Companion suffix appended for each family of primary suffixes.
/// The first matching family wins.
const COMPANION_SUFFIXES: &[(&[&str], &str)] = &[
    (&[".bed.gz", ".vcf.gz", ".txt.gz"], ".tbi"),
    (&[".bed", ".vcf"], ".idx"),
    (&[".fa", ".fa.gz", ".fasta", ".fasta.gz"], ".fai"),
    (&[".bam"], ".bai"),
    (&[".cram"], ".crai"),
];

/// A validated `gs://container/object` identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteUri {
    uri: String,
}

impl RemoteUri {
    /// Recognize a remote object URI.
    ///
    /// Returns `None` for anything that is not `gs://` followed by a
    /// non-empty container and object name. Such values are opaque strings.
    pub fn parse(value: &str) -> Option<Self> {
        let path = value.strip_prefix(GS_SCHEME)?;
        let (container, object) = path.split_once('/')?;
        if container.is_empty() || object.is_empty() || object.ends_with('/') {
            return None;
        }
        Some(RemoteUri {
            uri: value.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.uri
    }

    /// The URI without its scheme (`container/dir/file`).
    pub fn object_path(&self) -> &str {
        &self.uri[GS_SCHEME.len()..]
    }

    /// URI of the directory containing the object.
    pub fn parent(&self) -> &str {
        match self.uri.rfind('/') {
            Some(i) => &self.uri[..i],
            None => &self.uri,
        }
    }

    pub fn file_name(&self) -> &str {
        match self.uri.rfind('/') {
            Some(i) => &self.uri[i + 1..],
            None => &self.uri,
        }
    }

    /// The implied index object, if the suffix belongs to a known family.
    pub fn companion(&self) -> Option<RemoteUri> {
        COMPANION_SUFFIXES
            .iter()
            .find(|(suffixes, _)| suffixes.iter().any(|s| self.uri.ends_with(s)))
            .map(|(_, companion)| RemoteUri {
                uri: format!("{}{}", self.uri, companion),
            })
    }

    fn check_safe(&self) -> Result<(), ManifestError> {
        if self
            .object_path()
            .split('/')
            .any(|segment| segment == "." || segment == "..")
        {
            return Err(ManifestError::UnsafeObjectPath(self.uri.clone()));
        }
        Ok(())
    }
}

impl fmt::Display for RemoteUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

/// Mapping from a remote source directory to its local destination directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteRule {
    pub source_directory_uri: String,
    pub destination_directory: PathBuf,
}

/// Rewrite rules of one run, unique by source directory, in creation order
#[derive(Debug, Clone, Default)]
pub struct RewriteRules {
    rules: Vec<RewriteRule>,
    index: AHashMap<String, usize>,
}

impl RewriteRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, source_directory_uri: &str) -> Option<&Path> {
        self.index
            .get(source_directory_uri)
            .map(|&i| self.rules[i].destination_directory.as_path())
    }

    /// Record a rule unless the source directory already has one.
    ///
    /// Returns the new rule, or `None` when an existing rule was kept.
    pub fn insert(
        &mut self,
        source_directory_uri: &str,
        destination_directory: &Path,
    ) -> Option<RewriteRule> {
        if self.index.contains_key(source_directory_uri) {
            return None;
        }
        let rule = RewriteRule {
            source_directory_uri: source_directory_uri.to_string(),
            destination_directory: destination_directory.to_path_buf(),
        };
        self.index
            .insert(source_directory_uri.to_string(), self.rules.len());
        self.rules.push(rule.clone());
        Some(rule)
    }

    /// Rewrite a URI through the rule with the longest matching source
    /// directory. Matches only on `/` boundaries.
    pub fn rewrite(&self, uri: &str) -> Option<PathBuf> {
        self.rules
            .iter()
            .filter_map(|rule| {
                let rest = uri.strip_prefix(rule.source_directory_uri.as_str())?;
                if rest.is_empty() {
                    Some((rule, ""))
                } else {
                    rest.strip_prefix('/').map(|rest| (rule, rest))
                }
            })
            .max_by_key(|(rule, _)| rule.source_directory_uri.len())
            .map(|(rule, rest)| {
                if rest.is_empty() {
                    rule.destination_directory.clone()
                } else {
                    rule.destination_directory.join(rest)
                }
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &RewriteRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// An object that must exist locally once the run completes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedObject {
    pub source: RemoteUri,
    pub destination: PathBuf,
    pub companion: bool,
}

impl PlannedObject {
    pub fn destination_directory(&self) -> &Path {
        self.destination.parent().unwrap_or(&self.destination)
    }
}

/// Result of planning one remote value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Local path replacing the remote value
    pub local_path: PathBuf,
    /// Rule created for the object's directory, if it was not seen before
    pub new_rule: Option<RewriteRule>,
    /// The primary object followed by its companion, if any
    pub objects: SmallVec<[PlannedObject; 2]>,
}

/// Plan a value. Returns `Ok(None)` when the value is not a remote object.
pub fn plan(
    value: &str,
    destination_root: &Path,
    rules: &mut RewriteRules,
    inspect_secondary_files: bool,
) -> Result<Option<Plan>, ManifestError> {
    let Some(uri) = RemoteUri::parse(value) else {
        return Ok(None);
    };

    let (local_path, new_rule) = plan_object(&uri, destination_root, rules)?;
    let mut objects = SmallVec::new();

    let companion = if inspect_secondary_files {
        uri.companion()
    } else {
        None
    };

    objects.push(PlannedObject {
        source: uri,
        destination: local_path.clone(),
        companion: false,
    });

    if let Some(companion) = companion {
        let (companion_path, _) = plan_object(&companion, destination_root, rules)?;
        debug!("Planned companion {} -> {:?}", companion, companion_path);
        objects.push(PlannedObject {
            source: companion,
            destination: companion_path,
            companion: true,
        });
    }

    Ok(Some(Plan {
        local_path,
        new_rule,
        objects,
    }))
}

fn plan_object(
    uri: &RemoteUri,
    destination_root: &Path,
    rules: &mut RewriteRules,
) -> Result<(PathBuf, Option<RewriteRule>), ManifestError> {
    uri.check_safe()?;

    if let Some(existing) = rules.get(uri.parent()) {
        return Ok((existing.join(uri.file_name()), None));
    }

    let local_path = destination_root.join(uri.object_path());
    let destination_directory = local_path
        .parent()
        .map_or_else(|| destination_root.to_path_buf(), Path::to_path_buf);
    let new_rule = rules.insert(uri.parent(), &destination_directory);
    if let Some(rule) = &new_rule {
        debug!(
            "New rewrite rule {} -> {:?}",
            rule.source_directory_uri, rule.destination_directory
        );
    }
    Ok((local_path, new_rule))
}
