use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use cc_base::config::EngineConfig;
use cc_base::types::{DirectoryInfo, TreeDisplayMode};
use cc_local::LocalBackend;
use composer::Composer;

const USAGE: &str = "usage: composer <directory> [--select <path>]... [--tree none|selected|full] [--copy] [--json]";

/// How long to wait for outstanding requests before giving up.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

struct Args {
    directory: String,
    select: Vec<String>,
    tree: Option<TreeDisplayMode>,
    copy: bool,
    json: bool,
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut directory = None;
    let mut select = Vec::new();
    let mut tree = None;
    let mut copy = false;
    let mut json = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--select" => select.push(iter.next().ok_or("--select needs a path")?.clone()),
            "--tree" => {
                let mode = iter.next().ok_or("--tree needs a mode")?;
                tree = Some(TreeDisplayMode::parse(mode).ok_or_else(|| format!("unknown tree mode: {}", mode))?);
            }
            "--copy" => copy = true,
            "--json" => json = true,
            "-h" | "--help" => return Err(USAGE.to_string()),
            flag if flag.starts_with("--") => return Err(format!("unknown option: {}", flag)),
            path if directory.is_none() => directory = Some(path.to_string()),
            extra => return Err(format!("unexpected argument: {}", extra)),
        }
    }

    let directory = directory.ok_or_else(|| USAGE.to_string())?;
    Ok(Args { directory, select, tree, copy, json })
}

fn data_dir(config: &EngineConfig) -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_default().join(&config.data_dir)
}

fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&argv) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{}", msg);
            process::exit(2);
        }
    };

    let root = std::fs::canonicalize(&args.directory)?;
    let root_str = root.to_string_lossy().to_string();
    let config = EngineConfig::load();
    let backend = Arc::new(LocalBackend::new(data_dir(&config), config.clone()));
    let quiet = config.git_watch_settle();
    let mut composer = Composer::new(backend, config);

    composer.open_directory(DirectoryInfo::from_path(&root_str));
    composer.pump_until_idle(IDLE_TIMEOUT);

    if let Some(mode) = args.tree {
        composer.set_display_mode(mode);
    }
    for path in &args.select {
        let id = resolve(&root, path);
        composer.toggle_node(&id.to_string_lossy());
    }
    composer.pump_until_quiet(quiet, IDLE_TIMEOUT);

    if args.json {
        if let Some(snapshot) = composer.snapshot() {
            let out = serde_json::to_string_pretty(&snapshot).map_err(io::Error::other)?;
            println!("{}", out);
        }
    } else {
        print_summary(&composer);
    }

    if args.copy {
        composer.copy_to_clipboard();
        composer.pump_until_idle(IDLE_TIMEOUT);
    }

    let failures = composer.drain_notifications();
    for note in &failures {
        eprintln!("{}: {}", note.title, note.description);
    }
    if !failures.is_empty() {
        process::exit(1);
    }
    Ok(())
}

fn resolve(root: &Path, path: &str) -> PathBuf {
    let path = Path::new(path.trim_start_matches("./"));
    if path.is_absolute() { path.to_path_buf() } else { root.join(path) }
}

fn print_summary(composer: &Composer) {
    let Some(dir) = composer.directory() else {
        return;
    };
    println!("{} ({})", dir.name, dir.path);

    let root_prefix = format!("{}/", dir.path.trim_end_matches('/'));
    for file in composer.selected_files_by_tokens() {
        let tokens = file.token_count.map(|t| t.to_string()).unwrap_or_else(|| "?".to_string());
        println!("  {:>8}  {}", tokens, file.path.strip_prefix(&root_prefix).unwrap_or(&file.path));
    }

    let t = composer.tokens();
    println!("files         {:>8}", t.files);
    println!("tree          {:>8}", t.tree);
    println!("git diffs     {:>8}", t.git);
    println!("web pages     {:>8}", t.pages);
    println!("instructions  {:>8}", t.instructions);
    println!("total         {:>8}", t.total);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &[&str]) -> Vec<String> {
        s.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn parses_selection_and_mode() {
        let parsed = parse_args(&args(&["/p", "--select", "a.py", "--select", "b.py", "--tree", "full", "--copy"]))
            .expect("parse");
        assert_eq!(parsed.directory, "/p");
        assert_eq!(parsed.select, vec!["a.py", "b.py"]);
        assert_eq!(parsed.tree, Some(TreeDisplayMode::Full));
        assert!(parsed.copy);
        assert!(!parsed.json);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["/p", "--tree", "tall"])).is_err());
        assert!(parse_args(&args(&["/p", "--select"])).is_err());
        assert!(parse_args(&args(&["/p", "/q"])).is_err());
    }

    #[test]
    fn relative_paths_resolve_under_root() {
        assert_eq!(resolve(Path::new("/p"), "./src/a.rs"), PathBuf::from("/p/src/a.rs"));
        assert_eq!(resolve(Path::new("/p"), "/abs/b.rs"), PathBuf::from("/abs/b.rs"));
    }
}
