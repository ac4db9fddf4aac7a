//! History walks over a local clone
//!
//! Shells out to `git` the same way the GitHub side shells out to `gh`.
//! Parsing is kept in free functions so it can be tested on fixture text.

use super::{IngestError, Result};
use crate::model::{Commit, Sha, User};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::process::Command;

/// One `%H %an %ae %P %B` record, separated by unit/record separators.
const LOG_FORMAT: &str = "--format=%H%x1f%an%x1f%ae%x1f%P%x1f%B%x1e";

lazy_static::lazy_static! {
    // bors: "Merge #123 #456", GitHub: "Merge pull request #123 from ..."
    static ref MERGE_RE: Regex = Regex::new(r"^Merge (?:pull request )?((?:#\d+\s*)+)").unwrap();
    static ref NUMBER_RE: Regex = Regex::new(r"#(\d+)").unwrap();
    // Squash merges: "sql: fix the thing (#123)"
    static ref SQUASH_RE: Regex = Regex::new(r"\(#(\d+)\)\s*$").unwrap();
    static ref VERSION_RE: Regex = Regex::new(r"\d+").unwrap();
}

/// A commit as printed by `git log`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCommit {
    pub sha: String,
    pub author: User,
    pub parents: Vec<String>,
    pub message: String,
}

impl RawCommit {
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    pub fn title(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }
}

/// `git` bound to one clone
#[derive(Debug, Clone)]
pub struct Git {
    path: PathBuf,
}

impl Git {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.path)
            .args(args)
            .output()?;

        if !output.status.success() {
            return Err(IngestError::CommandFailed {
                command: format!("git {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    pub fn fetch(&self, remote: &str) -> Result<()> {
        self.run(&["fetch", "--quiet", "--tags", "--prune", remote])?;
        Ok(())
    }

    /// Branch names under `refs/remotes/<remote>/`, without the remote prefix
    pub fn remote_branches(&self, remote: &str) -> Result<Vec<String>> {
        let refs = format!("refs/remotes/{}/", remote);
        let out = self.run(&["for-each-ref", "--format=%(refname:strip=3)", &refs])?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|b| !b.is_empty() && *b != "HEAD")
            .map(String::from)
            .collect())
    }

    pub fn merge_base(&self, a: &str, b: &str) -> Result<String> {
        Ok(self.run(&["merge-base", a, b])?.trim().to_string())
    }

    /// Common ancestor of all `shas`; for release branches of one trunk this
    /// is the oldest merge base.
    pub fn oldest_merge_base(&self, shas: &[String]) -> Result<String> {
        let mut args = vec!["merge-base", "--octopus"];
        args.extend(shas.iter().map(String::as_str));
        Ok(self.run(&args)?.trim().to_string())
    }

    /// History of `tip` in topological order, newest first.
    ///
    /// With `keep` set, stops after that commit (inclusive); with `exclude`
    /// set, stops before it.
    pub fn log(&self, tip: &str, keep: Option<&str>, exclude: Option<&str>) -> Result<Vec<RawCommit>> {
        let keep_parents = keep.map(|sha| format!("{}^@", sha));
        let mut args = vec!["log", "--topo-order", LOG_FORMAT, tip];
        if keep_parents.is_some() || exclude.is_some() {
            args.push("--not");
        }
        if let Some(parents) = keep_parents.as_deref() {
            args.push(parents);
        }
        if let Some(exclude) = exclude {
            args.push(exclude);
        }
        parse_log(&self.run(&args)?)
    }

    /// Commit sha → tag name
    pub fn tags(&self) -> Result<HashMap<String, String>> {
        let out = self.run(&[
            "for-each-ref",
            "--format=%(objectname)%1f%(*objectname)%1f%(refname:strip=2)",
            "refs/tags",
        ])?;
        Ok(parse_tags(&out))
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse output produced with [`LOG_FORMAT`].
pub fn parse_log(out: &str) -> Result<Vec<RawCommit>> {
    out.split('\x1e')
        .map(|record| record.trim_start_matches(['\n', '\r']))
        .filter(|record| !record.trim().is_empty())
        .map(|record| {
            let fields: Vec<&str> = record.splitn(5, '\x1f').collect();
            if fields.len() != 5 {
                return Err(IngestError::Parse(format!(
                    "malformed git log record: {:?}",
                    record.chars().take(80).collect::<String>()
                )));
            }
            Ok(RawCommit {
                sha: fields[0].trim().to_string(),
                author: User::new(fields[1], fields[2]),
                parents: fields[3].split_whitespace().map(String::from).collect(),
                message: fields[4].trim_end().to_string(),
            })
        })
        .collect()
}

/// Map commits to tag names from `for-each-ref` output.
///
/// Annotated tags are peeled to their commit. When several tags point at the
/// same commit the lexically smallest wins, which keeps runs deterministic.
pub fn parse_tags(out: &str) -> HashMap<String, String> {
    let mut tags: HashMap<String, String> = HashMap::new();
    for line in out.lines() {
        let fields: Vec<&str> = line.split('\x1f').collect();
        if fields.len() != 3 {
            continue;
        }
        let commit = if fields[1].is_empty() { fields[0] } else { fields[1] };
        let name = fields[2].trim();
        if commit.is_empty() || name.is_empty() {
            continue;
        }
        tags.entry(commit.to_string())
            .and_modify(|existing| {
                if name < existing.as_str() {
                    *existing = name.to_string();
                }
            })
            .or_insert_with(|| name.to_string());
    }
    tags
}

/// Pull request numbers named by a merge commit title
pub fn merge_pr_numbers(title: &str) -> Vec<u64> {
    MERGE_RE
        .captures(title)
        .and_then(|caps| caps.get(1))
        .map(|m| {
            NUMBER_RE
                .captures_iter(m.as_str())
                .filter_map(|c| c[1].parse().ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Pull request number at the end of a squash-merged commit title
pub fn squash_pr_number(title: &str) -> Option<u64> {
    SQUASH_RE
        .captures(title)
        .and_then(|caps| caps[1].parse().ok())
}

/// Sort release branches newest version first.
pub fn sort_release_branches(branches: &mut [String]) {
    fn version(branch: &str) -> Vec<u64> {
        VERSION_RE
            .find_iter(branch)
            .filter_map(|m| m.as_str().parse().ok())
            .collect()
    }
    branches.sort_by(|a, b| version(b).cmp(&version(a)).then_with(|| a.cmp(b)));
}

// ============================================================================
// Line walks
// ============================================================================

/// Commits that arrived through a merge naming several pull requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub numbers: Vec<u64>,
    pub commits: Vec<Sha>,
}

/// What a walk over one line of history learned
#[derive(Debug, Clone, Default)]
pub struct Line {
    /// Non-merge commits in log order, newest first
    pub commits: Vec<Commit>,
    /// Commit → pull request, where a single pull request is known
    pub attributed: HashMap<Sha, u64>,
    /// Commits whose pull request has to be looked up
    pub batches: Vec<Batch>,
}

/// Walk the first-parent chain of `log` from oldest to newest.
///
/// Every first-parent commit introduces itself plus whatever its other
/// parents bring in that the line has not seen yet. Those commits inherit the
/// merge's pull request and the oldest tag reached after them.
pub fn walk_line(log: &[RawCommit], tags: &HashMap<String, String>) -> Line {
    let by_sha: HashMap<&str, &RawCommit> = log.iter().map(|c| (c.sha.as_str(), c)).collect();

    let mut chain: Vec<&RawCommit> = Vec::new();
    let mut next = log.first();
    while let Some(c) = next {
        chain.push(c);
        next = c.parents.first().and_then(|p| by_sha.get(p.as_str()).copied());
    }
    chain.reverse();

    let mut seen: HashSet<&str> = HashSet::new();
    let mut pending: Vec<&str> = Vec::new();
    let mut oldest_tag: HashMap<&str, &str> = HashMap::new();
    let mut line = Line::default();

    for head in chain {
        let mut introduced: Vec<&RawCommit> = Vec::new();
        let mut stack = vec![head];
        while let Some(c) = stack.pop() {
            if !seen.insert(c.sha.as_str()) {
                continue;
            }
            introduced.push(c);
            stack.extend(c.parents.iter().filter_map(|p| by_sha.get(p.as_str()).copied()));
        }

        let numbers = if head.is_merge() {
            merge_pr_numbers(head.title())
        } else {
            Vec::new()
        };
        let mut batch = Vec::new();
        for c in introduced.iter().filter(|c| !c.is_merge()) {
            let sha = Sha::new(c.sha.clone());
            match numbers.as_slice() {
                [n] => {
                    line.attributed.insert(sha, *n);
                }
                [] => {
                    if let Some(n) = squash_pr_number(c.title()) {
                        line.attributed.insert(sha, n);
                    }
                }
                _ => batch.push(sha),
            }
        }
        if !batch.is_empty() {
            line.batches.push(Batch {
                numbers,
                commits: batch,
            });
        }

        pending.extend(introduced.iter().map(|c| c.sha.as_str()));
        let tag = tags
            .get(head.sha.as_str())
            .or_else(|| introduced.iter().find_map(|c| tags.get(c.sha.as_str())));
        if let Some(tag) = tag {
            for sha in pending.drain(..) {
                oldest_tag.insert(sha, tag.as_str());
            }
        }
    }

    line.commits = log
        .iter()
        .filter(|c| !c.is_merge())
        .map(|c| {
            let commit = Commit::new(Sha::new(c.sha.clone()), c.author.clone(), &c.message);
            match oldest_tag.get(c.sha.as_str()) {
                Some(tag) => commit.with_oldest_tag(*tag),
                None => commit,
            }
        })
        .collect();
    line
}
