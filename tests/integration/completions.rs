use clap::CommandFactory;
use clap_complete::aot::{generate, Shell};
use std::io::BufWriter;

fn completions(shell: Shell) -> String {
    let mut buf = BufWriter::new(Vec::new());
    generate(
        shell,
        &mut branchbox::cli::Cli::command(),
        "branchbox",
        &mut buf,
    );
    String::from_utf8(buf.into_inner().unwrap()).unwrap()
}

#[test]
fn completions_generate_for_common_shells() {
    for shell in [Shell::Bash, Shell::Zsh, Shell::Fish] {
        let output = completions(shell);
        assert!(!output.is_empty(), "{shell} completions should not be empty");
        assert!(
            output.contains("branchbox"),
            "{shell} completions should reference 'branchbox'"
        );
    }
}
