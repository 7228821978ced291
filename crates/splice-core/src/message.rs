//! Handing text to git through its editor hooks.
//!
//! git asks an editor for commit messages (`GIT_EDITOR`) and for the rebase
//! todo list (`GIT_SEQUENCE_EDITOR`). Instead of an interactive editor, the
//! driver installs a command that copies a prepared file over the one git
//! wants edited.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::Result;

/// Environment variable git consults for commit messages.
pub const GIT_EDITOR: &str = "GIT_EDITOR";

/// Environment variable git consults for the rebase todo list.
pub const GIT_SEQUENCE_EDITOR: &str = "GIT_SEQUENCE_EDITOR";

/// Something that can stand in for git's editor.
pub trait MessageProvider {
    /// Shell command git runs with the path of the file to edit appended.
    fn editor_command(&self) -> String;
}

/// Leaves whatever git prepared untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepMessage;

impl MessageProvider for KeepMessage {
    fn editor_command(&self) -> String {
        ":".to_string()
    }
}

/// Prepared contents in a temporary file, copied over git's file on demand.
///
/// The file lives as long as the value, so keep it alive until the git
/// invocation that uses it has returned. Running the editor more than once
/// writes the same contents each time.
#[derive(Debug)]
pub struct EditorFile {
    file: NamedTempFile,
}

impl EditorFile {
    /// Write `contents` to a new temporary file.
    ///
    /// # Errors
    /// Returns error if the file cannot be created or written.
    pub fn new(contents: &str) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("splice-")
            .suffix(".txt")
            .tempfile()?;
        file.write_all(contents.as_bytes())?;
        file.flush()?;
        Ok(Self { file })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl MessageProvider for EditorFile {
    fn editor_command(&self) -> String {
        copy_command(self.path())
    }
}

/// `cat "<path>" >`, with the path escaped for a double-quoted sh string.
fn copy_command(path: &Path) -> String {
    let mut quoted = String::new();
    for ch in path.to_string_lossy().chars() {
        if matches!(ch, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    format!("cat \"{quoted}\" >")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn test_copy_command_escapes_shell_characters() {
        let cmd = copy_command(Path::new("/tmp/we\"ird $dir/`x`/file"));
        assert_eq!(cmd, r#"cat "/tmp/we\"ird \$dir/\`x\`/file" >"#);
    }

    #[test]
    fn test_keep_message_is_noop() {
        assert_eq!(KeepMessage.editor_command(), ":");
    }

    #[test]
    fn test_editor_file_overwrites_target_idempotently() {
        let provider = EditorFile::new("Summary\n\nBody\n").unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("COMMIT_EDITMSG");
        std::fs::write(&target, "# original\n").unwrap();

        for _ in 0..2 {
            let status = Command::new("sh")
                .arg("-c")
                .arg(format!("{} \"$1\"", provider.editor_command()))
                .arg("sh")
                .arg(&target)
                .status()
                .unwrap();
            assert!(status.success());
            assert_eq!(std::fs::read_to_string(&target).unwrap(), "Summary\n\nBody\n");
        }
    }
}
