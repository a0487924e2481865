use std::io::{self, Write};
use std::path::Path;

use clap::CommandFactory;
use clap_complete::aot::Generator;
use clap_complete::{generate, shells};

use crate::cli::{Cli, CompletionShell};
use crate::error::CliError;

/// Write the completion script for `shell` to `output_path`, or stdout
pub fn run_completions(shell: CompletionShell, output_path: Option<&Path>) -> Result<(), CliError> {
    let script = completion_script(shell);

    match output_path {
        Some(path) => {
            std::fs::write(path, &script)?;
            println!("{}", path.display());
        }
        None => io::stdout().write_all(&script)?,
    }
    Ok(())
}

fn completion_script(shell: CompletionShell) -> Vec<u8> {
    let mut command = Cli::command();
    match shell {
        CompletionShell::Bash => render(shells::Bash, &mut command),
        CompletionShell::Zsh => render(shells::Zsh, &mut command),
        CompletionShell::Fish => render(shells::Fish, &mut command),
    }
}

fn render<G: Generator>(generator: G, command: &mut clap::Command) -> Vec<u8> {
    let bin_name = command.get_name().to_string();
    let mut buffer = Vec::new();
    generate(generator, command, bin_name, &mut buffer);
    buffer
}
