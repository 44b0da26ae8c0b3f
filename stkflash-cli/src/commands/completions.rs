//! Shell completion generation.

use clap::CommandFactory;
use clap_complete::{Shell, generate};
use std::io;

use crate::Cli;

/// Generate shell completions to stdout.
pub(crate) fn cmd_completions(shell: Shell) {
    write_completions(shell, &mut io::stdout());
}

fn write_completions<W: io::Write>(shell: Shell, out: &mut W) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, out);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completions_mention_binary_and_subcommands() {
        for shell in [Shell::Bash, Shell::Zsh, Shell::Fish] {
            let mut buf = Vec::new();
            write_completions(shell, &mut buf);
            let output = String::from_utf8(buf).unwrap();
            assert!(output.contains("stkflash"), "{shell:?}");
            assert!(output.contains("list-ports"), "{shell:?}");
        }
    }

    #[test]
    fn test_completions_other_shells_not_empty() {
        for shell in [Shell::PowerShell, Shell::Elvish] {
            let mut buf = Vec::new();
            write_completions(shell, &mut buf);
            assert!(!buf.is_empty());
        }
    }
}
