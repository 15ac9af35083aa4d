//! Git working-tree status via the git CLI.
//!
//! Paths are relative to the repository top level. Line counts compare the
//! working tree (staged and unstaged together) against `HEAD`, or against
//! the empty tree in a repository without commits.

use std::collections::HashMap;
use std::path::Path;
use std::process::{Command, Output};

use tracing::debug;

use cc_base::error::{BackendError, BackendResult};
use cc_base::types::{GitChange, GitChangeType, GitStatusReport};

use crate::process::run_with_timeout;

/// Hash of git's empty tree; diff base for repositories without commits.
const EMPTY_TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

/// Maximum changes reported; the rest is flagged as truncated.
pub const MAX_GIT_CHANGES: usize = 1000;

#[derive(Debug, Clone, Copy)]
pub struct GitCli {
    timeout_secs: u64,
}

impl GitCli {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }

    fn run(&self, dir: &Path, args: &[&str]) -> BackendResult<Output> {
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(dir);
        Ok(run_with_timeout(cmd, self.timeout_secs)?)
    }

    /// Like [`GitCli::run`] but a non-zero exit is an error.
    fn run_ok(&self, dir: &Path, args: &[&str]) -> BackendResult<String> {
        let output = self.run(dir, args)?;
        if !output.status.success() {
            return Err(BackendError::Process(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Repository top level containing `dir`, or `None` outside a repository.
    pub fn toplevel(&self, dir: &str) -> BackendResult<Option<String>> {
        let path = Path::new(dir);
        if !path.is_dir() {
            return Err(BackendError::NotFound(dir.to_string()));
        }
        let output = self.run(path, &["rev-parse", "--show-toplevel"])?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
    }

    fn diff_base(&self, top: &Path) -> BackendResult<&'static str> {
        let head = self.run(top, &["rev-parse", "--verify", "--quiet", "HEAD"])?;
        Ok(if head.status.success() { "HEAD" } else { EMPTY_TREE })
    }

    /// Status of the repository containing `dir`; `None` if there is none.
    /// Token counts are left empty; see [`GitCli::diff_tokens`].
    pub fn status(&self, dir: &str) -> BackendResult<Option<GitStatusReport>> {
        let Some(top) = self.toplevel(dir)? else {
            return Ok(None);
        };
        let top = Path::new(&top);

        let porcelain = self.run_ok(top, &["status", "--porcelain", "-uall"])?;
        let mut changes: HashMap<String, (u32, u32, GitChangeType)> = parse_porcelain(&porcelain);

        if !changes.is_empty() {
            let base = self.diff_base(top)?;
            let numstat = self.run_ok(top, &["diff", base, "--numstat"])?;
            parse_numstat(&numstat, &mut changes);

            for (path, (added, _, change_type)) in changes.iter_mut() {
                if *change_type == GitChangeType::Untracked && *added == 0 {
                    if let Ok(content) = std::fs::read_to_string(top.join(path)) {
                        *added = content.lines().count() as u32;
                    }
                }
            }
        }

        let mut results: Vec<GitChange> = changes
            .into_iter()
            .map(|(path, (lines_added, lines_deleted, change_type))| GitChange {
                path,
                change_type,
                lines_added,
                lines_deleted,
                token_count: None,
            })
            .collect();
        results.sort_by(|a, b| a.path.cmp(&b.path));

        let truncated = results.len() > MAX_GIT_CHANGES;
        if truncated {
            debug!(dir, total = results.len(), "git status truncated");
            results.truncate(MAX_GIT_CHANGES);
        }
        Ok(Some(GitStatusReport { results, truncated }))
    }

    /// Unified diff of `paths` (all changes if empty), with pseudo-diffs for
    /// untracked files.
    pub fn diff_by_file(&self, dir: &str, paths: &[String]) -> BackendResult<HashMap<String, String>> {
        let Some(top) = self.toplevel(dir)? else {
            return Ok(HashMap::new());
        };
        let top = Path::new(&top);
        let base = self.diff_base(top)?;

        let mut args = vec!["diff", base, "--"];
        args.extend(paths.iter().map(|p| p.as_str()));
        let diff = self.run_ok(top, &args)?;
        let mut by_file = parse_diff_by_file(&diff);

        let mut untracked_args = vec!["ls-files", "--others", "--exclude-standard", "--"];
        untracked_args.extend(paths.iter().map(|p| p.as_str()));
        let untracked = self.run_ok(top, &untracked_args)?;
        for path in untracked.lines().filter(|l| !l.is_empty()) {
            if by_file.contains_key(path) {
                continue;
            }
            if let Ok(content) = std::fs::read_to_string(top.join(path)) {
                by_file.insert(path.to_string(), pseudo_diff(path, &content));
            }
        }
        Ok(by_file)
    }

    /// Diff text for the clipboard, in path order.
    pub fn diff_text(&self, dir: &str, paths: &[String]) -> BackendResult<String> {
        let by_file = self.diff_by_file(dir, paths)?;
        let mut keys: Vec<&String> = by_file.keys().collect();
        keys.sort();
        Ok(keys.into_iter().filter_map(|k| by_file.get(k)).map(|d| d.as_str()).collect::<Vec<_>>().join(""))
    }

    /// Tokens of each changed file's diff.
    pub fn diff_tokens(&self, dir: &str, estimate: impl Fn(&str) -> usize) -> BackendResult<HashMap<String, usize>> {
        let by_file = self.diff_by_file(dir, &[])?;
        Ok(by_file.into_iter().map(|(path, diff)| (path, estimate(&diff))).collect())
    }
}

fn parse_porcelain(output: &str) -> HashMap<String, (u32, u32, GitChangeType)> {
    let mut changes = HashMap::new();
    for line in output.lines() {
        if line.len() < 4 {
            continue;
        }
        let mut chars = line.chars();
        let x = chars.next().unwrap_or(' ');
        let y = chars.next().unwrap_or(' ');
        let path = line[3..].trim();
        let path = path.split(" -> ").last().unwrap_or(path).trim_matches('"').to_string();

        let change_type = match (x, y) {
            ('?', '?') => GitChangeType::Untracked,
            ('A', _) | (_, 'A') => GitChangeType::Added,
            ('D', _) | (_, 'D') => GitChangeType::Deleted,
            ('R', _) | (_, 'R') => GitChangeType::Renamed,
            _ => GitChangeType::Modified,
        };
        changes.entry(path).or_insert((0, 0, change_type));
    }
    changes
}

/// Fold `git diff --numstat` into the change map. Binary files report `-`
/// and count as zero lines.
fn parse_numstat(output: &str, changes: &mut HashMap<String, (u32, u32, GitChangeType)>) {
    for line in output.lines() {
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 3 {
            continue;
        }
        let added: u32 = parts[0].parse().unwrap_or(0);
        let deleted: u32 = parts[1].parse().unwrap_or(0);
        let path = parts[2];
        let path = if path.contains(" => ") {
            path.split(" => ").last().unwrap_or(path).trim_end_matches('}').to_string()
        } else {
            path.to_string()
        };
        if let Some(entry) = changes.get_mut(&path) {
            entry.0 = added;
            entry.1 = deleted;
        }
    }
}

fn parse_diff_by_file(diff: &str) -> HashMap<String, String> {
    let mut by_file = HashMap::new();
    let mut current_file: Option<String> = None;
    let mut current_diff = String::new();
    for line in diff.lines() {
        if line.starts_with("diff --git") {
            if let Some(file) = current_file.take() {
                by_file.insert(file, std::mem::take(&mut current_diff));
            }
            current_diff.clear();
            current_file = line.split(" b/").nth(1).map(|s| s.to_string());
        }
        if current_file.is_some() {
            current_diff.push_str(line);
            current_diff.push('\n');
        }
    }
    if let Some(file) = current_file {
        by_file.insert(file, current_diff);
    }
    by_file
}

fn pseudo_diff(path: &str, content: &str) -> String {
    let mut out = format!("diff --git a/{0} b/{0}\nnew file\n--- /dev/null\n+++ b/{0}\n", path);
    out.push_str(&format!("@@ -0,0 +1,{} @@\n", content.lines().count()));
    for line in content.lines() {
        out.push('+');
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn porcelain_classifies_changes() {
        let out = " M src/a.rs\n?? new.txt\nD  gone.rs\nR  old.rs -> renamed.rs\nA  added.rs\n";
        let changes = parse_porcelain(out);
        assert_eq!(changes["src/a.rs"].2, GitChangeType::Modified);
        assert_eq!(changes["new.txt"].2, GitChangeType::Untracked);
        assert_eq!(changes["gone.rs"].2, GitChangeType::Deleted);
        assert_eq!(changes["renamed.rs"].2, GitChangeType::Renamed);
        assert_eq!(changes["added.rs"].2, GitChangeType::Added);
    }

    #[test]
    fn numstat_fills_known_paths() {
        let mut changes = parse_porcelain(" M a.py\n");
        parse_numstat("3\t1\ta.py\n-\t-\tlogo.png\n", &mut changes);
        assert_eq!(changes["a.py"], (3, 1, GitChangeType::Modified));
        assert!(!changes.contains_key("logo.png"));
    }

    #[test]
    fn diff_split_per_file() {
        let diff = "diff --git a/a.py b/a.py\n--- a/a.py\n+++ b/a.py\n+x\ndiff --git a/b.py b/b.py\n-y\n";
        let by_file = parse_diff_by_file(diff);
        assert_eq!(by_file["a.py"], "diff --git a/a.py b/a.py\n--- a/a.py\n+++ b/a.py\n+x\n");
        assert_eq!(by_file["b.py"], "diff --git a/b.py b/b.py\n-y\n");
    }

    fn git_available() -> bool {
        Command::new("git").arg("--version").output().map(|o| o.status.success()).unwrap_or(false)
    }

    #[test]
    fn status_outside_repository_is_none() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let git = GitCli::new(10);
        let status = git.status(&dir.path().to_string_lossy()).expect("status");
        assert_eq!(status, None);
    }

    #[test]
    fn status_reports_untracked_lines() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let init = Command::new("git").args(["init", "-q"]).current_dir(dir.path()).status().expect("init");
        assert!(init.success());
        std::fs::write(dir.path().join("a.py"), "one\ntwo\n").expect("write");

        let git = GitCli::new(10);
        let report = git.status(&dir.path().to_string_lossy()).expect("status").expect("repo");
        assert_eq!(report.results.len(), 1);
        let a = &report.results[0];
        assert_eq!((a.path.as_str(), a.change_type, a.lines_added), ("a.py", GitChangeType::Untracked, 2));
        assert_eq!(a.token_count, None);

        let tokens = git.diff_tokens(&dir.path().to_string_lossy(), |s| s.len()).expect("tokens");
        assert!(tokens["a.py"] > 0);
    }
}
