//! Rendering a composition into one prompt text and placing it on the
//! system clipboard.

use std::fs;
use std::path::Path;
use std::process::Command;

use arboard::Clipboard;
use tracing::debug;

use cc_base::error::{BackendError, BackendResult};
use cc_base::types::{CompositionRequest, IdSet, SavedInstruction};

use crate::process::pipe_into;
use crate::render::render_tree;

const FILE_CONTENTS_OPENING_TAG: &str = "<file_contents>";
const FILE_CONTENTS_CLOSING_TAG: &str = "</file_contents>";

const TREE_OPENING_TAG: &str = "<file_tree>";
const TREE_CLOSING_TAG: &str = "</file_tree>";
const TREE_LEGEND: &str = "The contents of the files marked with an asterisk (*) are included below.";

const GIT_DIFF_OPENING_TAG: &str = "<git_diff>";
const GIT_DIFF_CLOSING_TAG: &str = "</git_diff>";

const WEB_PAGES_OPENING_TAG: &str = "<web_pages>";
const WEB_PAGES_CLOSING_TAG: &str = "</web_pages>";
const WEB_PAGES_SEPARATOR: &str = "\n\n* * *\n\n";

/// Content the composition pulls from the stores, resolved by the caller.
#[derive(Debug, Default)]
pub struct ResolvedSources {
    pub git_diff: String,
    /// `(url, body)` of every selected page.
    pub pages: Vec<(String, String)>,
    pub instructions: Vec<SavedInstruction>,
}

pub fn build_file_tree(rendered_tree: &str, root: &str) -> String {
    if rendered_tree.is_empty() {
        return String::new();
    }
    format!("{}\n{}\n{}\n\n{}\n{}\n", TREE_OPENING_TAG, root, rendered_tree, TREE_LEGEND, TREE_CLOSING_TAG)
}

/// Selected files in path order, each fenced by its extension. Directories
/// and vanished files are skipped.
pub fn concatenate_files(selected: &IdSet) -> BackendResult<String> {
    let mut out = String::new();
    for path in selected {
        let file = Path::new(path);
        if !file.is_file() {
            continue;
        }
        let bytes = fs::read(file)?;
        let ext = file.extension().and_then(|e| e.to_str()).unwrap_or("");
        out.push_str(&format!("File: {}\n```{}\n{}```", file.display(), ext, String::from_utf8_lossy(&bytes)));
    }
    Ok(out)
}

fn build_git_diff(diff: &str) -> String {
    if diff.is_empty() {
        return String::new();
    }
    format!("{}\n{}\n{}", GIT_DIFF_OPENING_TAG, diff, GIT_DIFF_CLOSING_TAG)
}

fn build_web_pages(pages: &[(String, String)]) -> String {
    if pages.is_empty() {
        return String::new();
    }
    let parts: Vec<String> =
        pages.iter().map(|(url, body)| format!("The following content was fetched from: {}\n{}", url, body)).collect();
    format!("{}\n{}\n{}\n", WEB_PAGES_OPENING_TAG, parts.join(WEB_PAGES_SEPARATOR), WEB_PAGES_CLOSING_TAG)
}

fn build_instructions(instructions: &[SavedInstruction], request: &CompositionRequest) -> String {
    let mut entries: Vec<(String, String)> =
        instructions.iter().map(|i| (i.name.clone(), i.content.clone())).collect();
    if let Some(draft) = &request.draft {
        if !draft.is_blank() {
            entries.push((draft.name.clone(), draft.content.clone()));
        }
    }
    entries
        .iter()
        .map(|(name, content)| format!("{}\n{}", name, content).trim().to_string())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Assemble the full prompt text. Empty sections are left out.
pub fn render_composition(request: &CompositionRequest, sources: &ResolvedSources) -> BackendResult<String> {
    let rendered_tree = render_tree(request.display_mode, &request.tree, &request.selected_nodes);
    let base = format!(
        "{}\n{}\n{}\n{}\n{}\n",
        build_file_tree(&rendered_tree, &request.root),
        FILE_CONTENTS_OPENING_TAG,
        concatenate_files(&request.selected_nodes)?,
        FILE_CONTENTS_CLOSING_TAG,
        build_git_diff(&sources.git_diff),
    );

    let sections = [base, build_web_pages(&sources.pages), build_instructions(&sources.instructions, request)];
    Ok(sections.into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join("\n\n"))
}

/// Clipboard commands used when the system clipboard cannot be opened
/// (headless X sessions, some Wayland compositors), most specific first.
fn clipboard_commands() -> Vec<(&'static str, Vec<&'static str>)> {
    if cfg!(target_os = "macos") {
        return vec![("pbcopy", vec![])];
    }
    let mut cmds = Vec::new();
    if std::env::var_os("WAYLAND_DISPLAY").is_some() {
        cmds.push(("wl-copy", vec![]));
    }
    cmds.push(("xclip", vec!["-selection", "clipboard"]));
    cmds
}

fn write_with_command(text: &str) -> BackendResult<Option<&'static str>> {
    for (program, args) in clipboard_commands() {
        let mut cmd = Command::new(program);
        cmd.args(&args);
        match pipe_into(cmd, text) {
            Ok(output) if output.status.success() => return Ok(Some(program)),
            Ok(output) => {
                return Err(BackendError::Process(format!(
                    "{} failed: {}",
                    program,
                    String::from_utf8_lossy(&output.stderr).trim()
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(program, "clipboard command not installed");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(None)
}

pub fn write_clipboard(text: &str) -> BackendResult<()> {
    let system = Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text));
    let Err(system_error) = system else {
        return Ok(());
    };
    debug!(error = %system_error, "system clipboard unavailable");
    match write_with_command(text)? {
        Some(program) => {
            debug!(program, "composition written through clipboard command");
            Ok(())
        }
        None => Err(BackendError::Process(format!("Failed to access system clipboard: {}", system_error))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cc_base::types::{InstructionDraft, TreeDisplayMode, TreeNode};
    use std::sync::Arc;

    #[test]
    fn composition_orders_sections() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("a.py");
        fs::write(&file, "print(1)\n").expect("write");
        let id = file.to_string_lossy().to_string();
        let root = dir.path().to_string_lossy().to_string();

        let request = CompositionRequest {
            root: root.clone(),
            display_mode: TreeDisplayMode::Selected,
            tree: Arc::new(vec![TreeNode::file(&id, "a.py")]),
            selected_nodes: [id.clone()].into_iter().collect(),
            git_diff_paths: IdSet::new(),
            urls: IdSet::new(),
            instruction_ids: IdSet::new(),
            draft: Some(InstructionDraft { name: "Task".into(), content: "Explain".into() }),
        };
        let sources = ResolvedSources {
            git_diff: "diff --git a/a.py b/a.py\n".into(),
            pages: vec![("https://a.dev".into(), "Page".into())],
            instructions: vec![],
        };
        let text = render_composition(&request, &sources).expect("render");

        let tree_at = text.find("<file_tree>").expect("tree");
        let files_at = text.find("<file_contents>").expect("files");
        let diff_at = text.find("<git_diff>").expect("diff");
        let pages_at = text.find("<web_pages>").expect("pages");
        let draft_at = text.find("Task\nExplain").expect("draft");
        assert!(tree_at < files_at && files_at < diff_at && diff_at < pages_at && pages_at < draft_at);
        assert!(text.contains("└── a.py *"));
        assert!(text.contains(&format!("File: {}\n```py\nprint(1)\n```", id)));
        assert!(text.contains(TREE_LEGEND));
    }

    #[test]
    fn blank_draft_is_left_out() {
        let request = CompositionRequest {
            root: "/p".into(),
            display_mode: TreeDisplayMode::None,
            tree: Arc::new(vec![]),
            selected_nodes: IdSet::new(),
            git_diff_paths: IdSet::new(),
            urls: IdSet::new(),
            instruction_ids: IdSet::new(),
            draft: Some(InstructionDraft::default()),
        };
        let text = render_composition(&request, &ResolvedSources::default()).expect("render");
        assert!(!text.contains("<file_tree>"));
        assert!(!text.contains("<web_pages>"));
        assert!(text.contains("<file_contents>"));
    }
}
