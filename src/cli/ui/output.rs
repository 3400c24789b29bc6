use console::style;

/// Styled terminal output for command handlers
pub struct Output {
    quiet: bool,
}

impl Output {
    pub fn new() -> Self {
        Self { quiet: false }
    }

    /// Suppress everything except errors
    pub fn quiet(quiet: bool) -> Self {
        Self { quiet }
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("✓").green(), message);
        }
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("⚠").yellow(), message);
        }
    }

    pub fn header(&self, message: &str) {
        if !self.quiet {
            println!("\n{}", style(message).bold().underlined());
        }
    }

    /// Aligned `key: value` line
    pub fn field(&self, key: &str, value: impl std::fmt::Display) {
        if !self.quiet {
            println!("  {:<14} {}", style(format!("{}:", key)).dim(), value);
        }
    }

    pub fn item(&self, message: &str) {
        if !self.quiet {
            println!("  • {}", message);
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
