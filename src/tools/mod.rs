pub mod shell;

pub use shell::{run_code_line, wrap_shell_output, ShellExecutor, SystemShell};
