use std::fs;
use std::path::{Path, PathBuf};

use clap::CommandFactory;

// The clap tree has no dependencies beyond clap and clap_complete.
#[path = "src/cli.rs"]
#[allow(dead_code)]
mod cli;

fn main() {
    println!("cargo::rerun-if-changed=src/cli.rs");

    let out_dir: PathBuf = std::env::var_os("OUT_DIR")
        .expect("OUT_DIR not set by Cargo")
        .into();
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("failed to create man output directory");

    for (page, cmd) in pages(cli::Cli::command()) {
        write_page(&man_dir, &page, cmd);
    }

    println!("cargo::rustc-env=PREFIXMOVER_MAN_DIR={}", man_dir.display());
}

/// Flatten the command tree into `(page name, command)` pairs, depth first.
/// Nested pages are named after their path: `prefixmover-config-show`.
fn pages(root: clap::Command) -> Vec<(String, clap::Command)> {
    let mut out = Vec::new();
    let mut stack = vec![(root.get_name().to_owned(), root)];

    while let Some((page, cmd)) = stack.pop() {
        let children = cmd
            .get_subcommands()
            .filter(|sub| !sub.is_hide_set() && sub.get_name() != "help")
            .map(|sub| {
                let child = format!("{page}-{}", sub.get_name());
                (child.clone(), sub.clone().name(child))
            })
            .collect::<Vec<_>>();
        stack.extend(children.into_iter().rev());
        out.push((page, cmd));
    }

    out
}

fn write_page(dir: &Path, page: &str, cmd: clap::Command) {
    let mut roff = Vec::new();
    clap_mangen::Man::new(cmd)
        .render(&mut roff)
        .unwrap_or_else(|e| panic!("man page `{page}` did not render: {e}"));

    let path = dir.join(format!("{page}.1"));
    fs::write(&path, roff).unwrap_or_else(|e| panic!("cannot write {}: {e}", path.display()));
}
