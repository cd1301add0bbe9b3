//! `manage`: list, move, copy and delete downloaded datasets
//!
//! The instruction is parsed by the decision gateway with the datasets
//! directory tree as context; everything after that is plain filesystem work
//! kept in step with the index.

use crate::gateway::DecisionGateway;
use crate::output::format_size;
use crate::storage::{canonical_path, DatasetEntry, DatasetIndex};
use crate::AgentError;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const MANAGE_SYSTEM_PROMPT: &str = r#"You are a file management assistant. Parse the user's instruction about downloaded datasets.

Reply with a JSON object:
{
  "action": "list | move | copy | delete",
  "source": "source path",
  "target": "target path (move and copy only)"
}

Rules:
- Use the directory tree to work out which directory the user means; "snap" with a
  directory "snap_stanford_edu" present means <datasets dir>/snap_stanford_edu
- source and target are full paths starting with the datasets directory
- Moving a directory's content into one of its own subdirectories is allowed
- list needs neither source nor target"#;

/// Maximum files listed per directory in the tree context
const FILES_PER_DIR: usize = 5;

/// A parsed management instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManageAction {
    List,
    Move { source: String, target: String },
    Copy { source: String, target: String },
    Delete { source: String },
}

/// What a management action did
#[derive(Debug, Clone, PartialEq)]
pub enum ManageOutcome {
    Listed(Vec<DatasetEntry>),
    Moved {
        source: PathBuf,
        target: PathBuf,
        /// Top-level items moved (1 for a plain move)
        items: usize,
        /// Index entries whose path was rewritten
        reindexed: usize,
    },
    Copied {
        source: PathBuf,
        target: PathBuf,
    },
    Deleted {
        path: PathBuf,
        unindexed: usize,
    },
    /// The user declined the confirmation
    Cancelled,
}

fn required_str(obj: &serde_json::Map<String, Value>, field: &str) -> Result<String, String> {
    match obj.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(format!("'{}' must be a non-empty string", field)),
    }
}

/// Schema check for the management reply
pub fn validate_manage_intent(value: Value) -> Result<ManageAction, String> {
    let obj = value
        .as_object()
        .ok_or_else(|| "reply is not a JSON object".to_string())?;

    let action = obj
        .get("action")
        .and_then(Value::as_str)
        .ok_or_else(|| "'action' is required".to_string())?
        .trim()
        .to_lowercase();

    match action.as_str() {
        "list" => Ok(ManageAction::List),
        "move" => Ok(ManageAction::Move {
            source: required_str(obj, "source")?,
            target: required_str(obj, "target")?,
        }),
        "copy" => Ok(ManageAction::Copy {
            source: required_str(obj, "source")?,
            target: required_str(obj, "target")?,
        }),
        "delete" => Ok(ManageAction::Delete {
            source: required_str(obj, "source")?,
        }),
        other => Err(format!("unknown action '{}'", other)),
    }
}

/// Renders the datasets directory as a tree, directories first
///
/// At most [`FILES_PER_DIR`] files are shown per directory, with sizes.
pub fn directory_context(datasets_dir: &Path, max_depth: usize) -> String {
    let root = format!("{}/", datasets_dir.display());
    if !datasets_dir.is_dir() {
        return format!("{} (does not exist)", root);
    }

    let mut lines = vec![root.clone()];
    scan_dir(datasets_dir, "", 1, max_depth, &mut lines);

    if lines.len() == 1 {
        format!("{} (empty)", root)
    } else {
        lines.join("\n")
    }
}

fn scan_dir(path: &Path, prefix: &str, depth: usize, max_depth: usize, lines: &mut Vec<String>) {
    if depth > max_depth {
        return;
    }

    let Ok(read) = fs::read_dir(path) else {
        return;
    };

    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in read.flatten() {
        let p = entry.path();
        if p.is_dir() {
            dirs.push(p);
        } else {
            files.push(p);
        }
    }
    let by_name = |p: &PathBuf| {
        p.file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    };
    dirs.sort_by_key(by_name);
    files.sort_by_key(by_name);

    for (i, dir) in dirs.iter().enumerate() {
        let last = i + 1 == dirs.len() && files.is_empty();
        let name = dir.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        lines.push(format!("{}{}{}/", prefix, if last { "└── " } else { "├── " }, name));

        let child_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
        scan_dir(dir, &child_prefix, depth + 1, max_depth, lines);
    }

    let shown = files.len().min(FILES_PER_DIR);
    for (i, file) in files.iter().take(shown).enumerate() {
        let last = i + 1 == shown && files.len() <= FILES_PER_DIR;
        let name = file.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        let size = fs::metadata(file)
            .map(|m| format!(" ({})", format_size(m.len())))
            .unwrap_or_default();
        lines.push(format!("{}{}{}{}", prefix, if last { "└── " } else { "├── " }, name, size));
    }

    if files.len() > FILES_PER_DIR {
        lines.push(format!("{}└── ... {} more files", prefix, files.len() - FILES_PER_DIR));
    }
}

/// Executes management actions against the disk and the index
pub struct Manager<'a> {
    index: &'a mut dyn DatasetIndex,
    datasets_dir: &'a Path,
}

impl<'a> Manager<'a> {
    pub fn new(index: &'a mut dyn DatasetIndex, datasets_dir: &'a Path) -> Self {
        Self {
            index,
            datasets_dir,
        }
    }

    /// Runs one action
    ///
    /// # Arguments
    ///
    /// * `action` - The validated action
    /// * `confirm` - Asked before anything is changed on disk; `false` cancels
    pub fn execute(
        &mut self,
        action: ManageAction,
        confirm: &mut dyn FnMut(&str) -> bool,
    ) -> Result<ManageOutcome, AgentError> {
        match action {
            ManageAction::List => Ok(ManageOutcome::Listed(self.index.get_all()?)),
            ManageAction::Move { source, target } => {
                let source = self.resolve_source(&source)?;
                let target = self.resolve_target(&target)?;
                self.move_dataset(source, target, confirm)
            }
            ManageAction::Copy { source, target } => {
                let source = self.resolve_source(&source)?;
                let target = self.resolve_target(&target)?;
                self.copy_dataset(source, target, confirm)
            }
            ManageAction::Delete { source } => {
                let source = self.resolve_source(&source)?;
                self.delete_dataset(source, confirm)
            }
        }
    }

    /// Finds the canonical path a source string refers to
    ///
    /// Tried in order: an existing path, a path under the datasets directory,
    /// a unique index name match, a unique keyword search hit. The result must
    /// lie strictly beneath the datasets directory.
    fn resolve_source(&self, source: &str) -> Result<PathBuf, AgentError> {
        let found = self.locate_source(source)?;
        self.confine(canonical_path(&found), false)
    }

    fn locate_source(&self, source: &str) -> Result<PathBuf, AgentError> {
        let direct = PathBuf::from(source);
        if direct.exists() {
            return Ok(direct);
        }

        let prefixed = self.datasets_dir.join(source.trim_start_matches('/'));
        if prefixed.exists() {
            return Ok(prefixed);
        }

        let mut matches = self.index.find_by_name(source)?;
        if matches.is_empty() {
            let keywords: Vec<String> = source
                .split_whitespace()
                .map(str::to_lowercase)
                .collect();
            matches = self.index.search(&keywords)?;
        }
        matches.retain(|d| d.local_path.exists());

        match matches.as_slice() {
            [] => Err(AgentError::Manage(format!("cannot find '{}'", source))),
            [only] => Ok(only.local_path.clone()),
            many => {
                let names: Vec<String> = many
                    .iter()
                    .map(|d| format!("{} ({})", d.name, d.local_path.display()))
                    .collect();
                Err(AgentError::Manage(format!(
                    "'{}' matches several datasets: {}",
                    source,
                    names.join(", ")
                )))
            }
        }
    }

    /// Canonical target path; the datasets directory itself is allowed
    fn resolve_target(&self, target: &str) -> Result<PathBuf, AgentError> {
        let path = PathBuf::from(target);
        let path = if path.is_absolute() || path.starts_with(self.datasets_dir) {
            path
        } else {
            self.datasets_dir.join(target.trim_start_matches('/'))
        };
        self.confine(canonical_path(&path), true)
    }

    /// Rejects paths outside the datasets directory
    fn confine(&self, path: PathBuf, allow_root: bool) -> Result<PathBuf, AgentError> {
        let root = canonical_path(self.datasets_dir);
        if !path.starts_with(&root) {
            return Err(AgentError::Manage(format!(
                "{} is outside the datasets directory {}",
                path.display(),
                root.display()
            )));
        }
        if path == root && !allow_root {
            return Err(AgentError::Manage(format!(
                "refusing to operate on the datasets directory {} itself",
                root.display()
            )));
        }
        Ok(path)
    }

    fn move_dataset(
        &mut self,
        source: PathBuf,
        target: PathBuf,
        confirm: &mut dyn FnMut(&str) -> bool,
    ) -> Result<ManageOutcome, AgentError> {
        if source == target {
            return Err(AgentError::Manage(
                "source and target are the same path".to_string(),
            ));
        }

        if target.starts_with(&source) {
            return self.sink_move(source, target, confirm);
        }
        if source.starts_with(&target) {
            return self.float_move(source, target, confirm);
        }

        if target.exists() {
            return Err(AgentError::Manage(format!(
                "target {} already exists",
                target.display()
            )));
        }

        if !confirm(&format!(
            "Move {} to {}?",
            source.display(),
            target.display()
        )) {
            return Ok(ManageOutcome::Cancelled);
        }

        let moved = self.entries_beneath(&source)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        move_path(&source, &target)?;
        let reindexed = self.repath(moved, &target)?;
        info!("Moved {} to {}", source.display(), target.display());

        Ok(ManageOutcome::Moved {
            source,
            target,
            items: 1,
            reindexed,
        })
    }

    /// Moves a directory's content into one of its own subdirectories
    fn sink_move(
        &mut self,
        source: PathBuf,
        target: PathBuf,
        confirm: &mut dyn FnMut(&str) -> bool,
    ) -> Result<ManageOutcome, AgentError> {
        // the child of source that holds the target stays put
        let keep = target
            .strip_prefix(&source)
            .ok()
            .and_then(|rel| rel.components().next())
            .map(|c| source.join(c.as_os_str()));

        let items: Vec<PathBuf> = fs::read_dir(&source)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| Some(p) != keep.as_ref())
            .collect();

        if items.is_empty() {
            return Err(AgentError::Manage(format!(
                "nothing to move in {}",
                source.display()
            )));
        }

        if !confirm(&format!(
            "Move {} item(s) from {} into {}?",
            items.len(),
            source.display(),
            target.display()
        )) {
            return Ok(ManageOutcome::Cancelled);
        }

        fs::create_dir_all(&target)?;
        let mut reindexed = 0;
        for item in &items {
            let Some(name) = item.file_name() else {
                continue;
            };
            let dest = target.join(name);
            let moved = self.entries_beneath(item)?;
            move_path(item, &dest)?;
            reindexed += self.repath(moved, &dest)?;
        }

        Ok(ManageOutcome::Moved {
            source,
            target,
            items: items.len(),
            reindexed,
        })
    }

    /// Moves a directory's content up into one of its ancestors
    fn float_move(
        &mut self,
        source: PathBuf,
        target: PathBuf,
        confirm: &mut dyn FnMut(&str) -> bool,
    ) -> Result<ManageOutcome, AgentError> {
        let items: Vec<PathBuf> = fs::read_dir(&source)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();

        if items.is_empty() {
            return Err(AgentError::Manage(format!(
                "nothing to move in {}",
                source.display()
            )));
        }

        let mut overwritten = Vec::new();
        for item in &items {
            let Some(name) = item.file_name() else {
                continue;
            };
            let dest = target.join(name);
            if source.starts_with(&dest) {
                return Err(AgentError::Manage(format!(
                    "{} would replace its own parent {}",
                    item.display(),
                    dest.display()
                )));
            }
            if dest.exists() {
                overwritten.push(dest);
            }
        }

        let mut question = format!(
            "Move {} item(s) from {} up into {}?",
            items.len(),
            source.display(),
            target.display()
        );
        if !overwritten.is_empty() {
            question.push_str(&format!(" {} existing item(s) will be replaced.", overwritten.len()));
        }
        if !confirm(&question) {
            return Ok(ManageOutcome::Cancelled);
        }

        for dest in &overwritten {
            let replaced = self.index.find_by_path(dest)?;
            remove_path(dest)?;
            for entry in replaced {
                self.index.delete(&entry.id)?;
            }
        }

        let mut reindexed = 0;
        for item in &items {
            let Some(name) = item.file_name() else {
                continue;
            };
            let dest = target.join(name);
            let moved = self.entries_beneath(item)?;
            move_path(item, &dest)?;
            reindexed += self.repath(moved, &dest)?;
        }

        if fs::read_dir(&source)?.next().is_none() {
            fs::remove_dir(&source)?;
            debug!("Removed empty directory {}", source.display());
        }

        Ok(ManageOutcome::Moved {
            source,
            target,
            items: items.len(),
            reindexed,
        })
    }

    fn copy_dataset(
        &mut self,
        source: PathBuf,
        target: PathBuf,
        confirm: &mut dyn FnMut(&str) -> bool,
    ) -> Result<ManageOutcome, AgentError> {
        if target.starts_with(&source) {
            return Err(AgentError::Manage(
                "cannot copy a directory into itself".to_string(),
            ));
        }
        if target.exists() {
            return Err(AgentError::Manage(format!(
                "target {} already exists",
                target.display()
            )));
        }

        if !confirm(&format!(
            "Copy {} to {}?",
            source.display(),
            target.display()
        )) {
            return Ok(ManageOutcome::Cancelled);
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        copy_path(&source, &target)?;
        info!("Copied {} to {}", source.display(), target.display());

        Ok(ManageOutcome::Copied { source, target })
    }

    fn delete_dataset(
        &mut self,
        source: PathBuf,
        confirm: &mut dyn FnMut(&str) -> bool,
    ) -> Result<ManageOutcome, AgentError> {
        let (files, bytes) = tree_size(&source);
        if !confirm(&format!(
            "Delete {} ({} file(s), {})? This cannot be undone.",
            source.display(),
            files,
            format_size(bytes)
        )) {
            return Ok(ManageOutcome::Cancelled);
        }

        let entries = self.index.find_by_path(&source)?;
        remove_path(&source)?;

        for entry in &entries {
            self.index.delete(&entry.id)?;
        }
        info!("Deleted {}", source.display());

        Ok(ManageOutcome::Deleted {
            path: source,
            unindexed: entries.len(),
        })
    }

    /// Ids of entries at or beneath `root`, with their path relative to it
    ///
    /// Must be taken before `root` is moved, while the stored paths still resolve.
    fn entries_beneath(&self, root: &Path) -> Result<Vec<(String, PathBuf)>, AgentError> {
        let root = canonical_path(root);
        Ok(self
            .index
            .find_by_path(&root)?
            .into_iter()
            .filter_map(|entry| {
                let rel = canonical_path(&entry.local_path)
                    .strip_prefix(&root)
                    .ok()?
                    .to_path_buf();
                Some((entry.id, rel))
            })
            .collect())
    }

    /// Points each moved entry at its new location under `to`
    fn repath(&mut self, moved: Vec<(String, PathBuf)>, to: &Path) -> Result<usize, AgentError> {
        for (id, rel) in &moved {
            let new_path = if rel.as_os_str().is_empty() {
                to.to_path_buf()
            } else {
                to.join(rel)
            };
            self.index.update_path(id, &new_path)?;
        }
        Ok(moved.len())
    }
}

/// Parses a management instruction and executes it
pub async fn run_manage(
    gateway: &DecisionGateway,
    index: &mut dyn DatasetIndex,
    datasets_dir: &Path,
    instruction: &str,
    confirm: &mut dyn FnMut(&str) -> bool,
) -> Result<ManageOutcome, AgentError> {
    let prompt = format!(
        "Datasets directory: {}\n\nCurrent directory tree:\n{}\n\nInstruction: {}",
        datasets_dir.display(),
        directory_context(datasets_dir, 3),
        instruction
    );

    let action = gateway
        .request_json(MANAGE_SYSTEM_PROMPT, &prompt, validate_manage_intent)
        .await?;
    info!("Manage action: {:?}", action);

    Manager::new(index, datasets_dir).execute(action, confirm)
}

fn move_path(from: &Path, to: &Path) -> std::io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // rename fails across filesystems
    copy_path(from, to)?;
    remove_path(from)
}

fn copy_path(from: &Path, to: &Path) -> std::io::Result<()> {
    if !from.is_dir() {
        fs::copy(from, to)?;
        return Ok(());
    }

    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        copy_path(&entry.path(), &to.join(entry.file_name()))?;
    }
    Ok(())
}

fn remove_path(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// File count and total bytes under a path
fn tree_size(path: &Path) -> (usize, u64) {
    if !path.is_dir() {
        return (1, fs::metadata(path).map(|m| m.len()).unwrap_or(0));
    }

    let Ok(read) = fs::read_dir(path) else {
        return (0, 0);
    };
    read.flatten().fold((0, 0), |(count, bytes), entry| {
        let (c, b) = tree_size(&entry.path());
        (count + c, bytes + b)
    })
}
