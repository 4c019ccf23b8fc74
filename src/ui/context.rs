//! Terminal detection for interactive vs scripted output

use std::io::IsTerminal;

/// CI systems that set their own marker variable
const CI_VARS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "BUILDKITE",
    "JENKINS_URL",
    "TF_BUILD",
];

/// Decides whether output can use progress bars and colors
#[derive(Debug, Clone, Copy)]
pub struct UiContext {
    interactive: bool,
}

impl UiContext {
    /// Inspect stdout and the environment
    pub fn detect() -> Self {
        let interactive = std::io::stdout().is_terminal()
            && !CI_VARS.iter().any(|var| std::env::var_os(var).is_some());
        Self { interactive }
    }

    /// Plain line-oriented output (tests, pipes, CI)
    pub fn non_interactive() -> Self {
        Self { interactive: false }
    }

    /// Whether to draw progress bars and styled markers
    pub fn use_fancy_output(&self) -> bool {
        self.interactive
    }
}
