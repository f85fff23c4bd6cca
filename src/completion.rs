//! Shell completion generation using clap_complete.
//!
//! Without `--stdout` or `--out-dir` the script is installed into the shell's
//! per-user completion directory, where bash-completion, zsh (with `~/.zfunc`
//! on `fpath`) and fish pick it up on the next start.

use anyhow::{Context, Result, anyhow};
use clap::{Command, CommandFactory};
use clap_complete::{Shell as CompletionShell, generate, generate_to};
use std::path::{Path, PathBuf};
use std::{fs, io};

use crate::cli::{AppContext, Cli, CompletionsArgs, Shell};
use crate::infra::io::expand_path;

const BIN_NAME: &str = "tgr";

impl From<Shell> for CompletionShell {
    fn from(shell: Shell) -> Self {
        match shell {
            Shell::Bash => CompletionShell::Bash,
            Shell::Zsh => CompletionShell::Zsh,
            Shell::Fish => CompletionShell::Fish,
            Shell::PowerShell => CompletionShell::PowerShell,
            Shell::Elvish => CompletionShell::Elvish,
        }
    }
}

/// Per-user completion directory; PowerShell and Elvish load scripts from a profile instead
pub fn user_dir(shell: &Shell) -> Option<&'static str> {
    match shell {
        Shell::Bash => Some("~/.local/share/bash-completion/completions"),
        Shell::Zsh => Some("~/.zfunc"),
        Shell::Fish => Some("~/.config/fish/completions"),
        Shell::PowerShell | Shell::Elvish => None,
    }
}

fn target_dir(shell: &Shell, out_dir: Option<PathBuf>) -> Result<PathBuf> {
    match out_dir {
        Some(dir) => expand_path(&dir),
        None => {
            let dir = user_dir(shell).ok_or_else(|| {
                anyhow!("--out-dir is required for {:?} unless --stdout is set", shell)
            })?;
            expand_path(Path::new(dir))
        }
    }
}

pub fn run(args: CompletionsArgs, ctx: &AppContext) -> Result<()> {
    let mut cmd: Command = Cli::command();

    if args.stdout {
        generate(CompletionShell::from(args.shell), &mut cmd, BIN_NAME, &mut io::stdout());
        return Ok(());
    }

    let dir = target_dir(&args.shell, args.out_dir)?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    let path = generate_to(CompletionShell::from(args.shell), &mut cmd, BIN_NAME, &dir)
        .context("generate completion file")?;

    if !ctx.quiet {
        eprintln!("Wrote completion to {}", path.display());
    }
    Ok(())
}
