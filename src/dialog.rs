//! User confirmation and file-location prompts.

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice<T> {
    pub label: String,
    pub value: T,
}

impl<T> Choice<T> {
    pub fn new(label: impl Into<String>, value: T) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// A question with fixed answers. `dismissed` is returned when the user closes
/// the prompt without picking one.
#[derive(Debug, Clone)]
pub struct Prompt<T> {
    pub message: String,
    pub choices: Vec<Choice<T>>,
    pub dismissed: T,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    pub name: String,
    pub extensions: Vec<String>,
}

impl FileFilter {
    pub fn new(name: impl Into<String>, extensions: &[&str]) -> Self {
        Self {
            name: name.into(),
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
        }
    }

    pub fn all_files() -> Self {
        Self::new("All Files", &["*"])
    }
}

#[allow(async_fn_in_trait)]
pub trait Dialogs {
    async fn ask<T: Clone>(&self, prompt: Prompt<T>) -> T;
    /// `None` when the user cancels the chooser.
    async fn choose_save_location(&self, filters: &[FileFilter]) -> Option<PathBuf>;
    async fn choose_open_location(&self) -> Option<PathBuf>;
}

/// Prompts on stdout, answers read from the shell's input line stream.
#[derive(Debug, Clone)]
pub struct TerminalDialogs {
    input: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
}

impl TerminalDialogs {
    pub fn new(input: Arc<Mutex<mpsc::UnboundedReceiver<String>>>) -> Self {
        Self { input }
    }

    async fn read_line(&self) -> Option<String> {
        self.input.lock().await.recv().await
    }

    async fn read_path(&self, label: &str) -> Option<PathBuf> {
        say(&format!("{label} (empty to cancel): "));
        let line = self.read_line().await?;
        let line = line.trim();
        if line.is_empty() {
            None
        } else {
            Some(PathBuf::from(line))
        }
    }
}

impl Dialogs for TerminalDialogs {
    async fn ask<T: Clone>(&self, prompt: Prompt<T>) -> T {
        loop {
            println!("{}", prompt.message);
            for (idx, choice) in prompt.choices.iter().enumerate() {
                println!("  [{}] {}", idx + 1, choice.label);
            }
            say("> ");

            let Some(line) = self.read_line().await else {
                return prompt.dismissed;
            };
            let answer = line.trim();
            if answer.is_empty() {
                return prompt.dismissed;
            }

            let picked = answer
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|idx| prompt.choices.get(idx))
                .or_else(|| {
                    prompt
                        .choices
                        .iter()
                        .find(|c| c.label.to_lowercase().starts_with(&answer.to_lowercase()))
                });
            if let Some(choice) = picked {
                return choice.value.clone();
            }
            println!("unrecognised answer: {answer}");
        }
    }

    async fn choose_save_location(&self, filters: &[FileFilter]) -> Option<PathBuf> {
        let names: Vec<String> = filters
            .iter()
            .map(|f| format!("{} ({})", f.name, f.extensions.join(", ")))
            .collect();
        self.read_path(&format!("save as [{}]", names.join(" | ")))
            .await
    }

    async fn choose_open_location(&self) -> Option<PathBuf> {
        self.read_path("open").await
    }
}

fn say(text: &str) {
    print!("{text}");
    let _ = std::io::stdout().flush();
}
