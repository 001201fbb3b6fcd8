//! Password and free-text input.
//!
//! Terminal reads go through [`Prompter`] so tests can script the answers.

use std::io::{self, BufRead, Write};

use zeroize::Zeroizing;

use crate::error::AuthError;

/// Password substituted in no-password mode.
pub const NO_PASSWORD_PLACEHOLDER: &str = "nopassword";

/// A password held in memory that is wiped on drop.
#[derive(Clone)]
pub struct Passphrase(Zeroizing<String>);

impl Passphrase {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    pub fn placeholder() -> Self {
        Self::new(NO_PASSWORD_PLACEHOLDER)
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Passphrase(..)")
    }
}

/// Source of interactive answers.
pub trait Prompter: Send + Sync {
    /// Read a secret without echo.
    fn read_secret(&self, prompt: &str) -> io::Result<String>;

    /// Read one line of visible text.
    fn read_line(&self, prompt: &str) -> io::Result<String>;
}

/// Reads from the controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn read_secret(&self, prompt: &str) -> io::Result<String> {
        rpassword::prompt_password(prompt)
    }

    fn read_line(&self, prompt: &str) -> io::Result<String> {
        print!("{}", prompt);
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

#[cfg(test)]
pub use scripted::ScriptedPrompter;

#[cfg(test)]
mod scripted {
    use std::collections::VecDeque;
    use std::io;
    use std::sync::Mutex;

    use super::Prompter;

    /// Replays canned answers in order; both secrets and lines share one queue.
    #[derive(Debug, Default)]
    pub struct ScriptedPrompter {
        answers: Mutex<VecDeque<String>>,
    }

    impl ScriptedPrompter {
        pub fn new<I, S>(answers: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            }
        }

        fn next(&self) -> io::Result<String> {
            let mut answers = self
                .answers
                .lock()
                .map_err(|_| io::Error::new(io::ErrorKind::Other, "prompter poisoned"))?;
            answers.pop_front().ok_or_else(|| {
                io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted answer left")
            })
        }
    }

    impl Prompter for ScriptedPrompter {
        fn read_secret(&self, _prompt: &str) -> io::Result<String> {
            self.next()
        }

        fn read_line(&self, _prompt: &str) -> io::Result<String> {
            self.next()
        }
    }
}

/// Ask for a new password twice; both entries must match exactly.
pub fn create_passphrase(prompter: &dyn Prompter) -> Result<Passphrase, AuthError> {
    let first = Zeroizing::new(read_secret(
        prompter,
        "==> Insert a password for the secret encryption: ",
    )?);
    let second = Zeroizing::new(read_secret(
        prompter,
        "==> Please, insert the password again: ",
    )?);

    if first.as_bytes() != second.as_bytes() {
        return Err(AuthError::PasswordMismatch);
    }
    Ok(Passphrase::new(first.as_str()))
}

/// Ask once for the password of an existing registration.
pub fn existing_passphrase(prompter: &dyn Prompter) -> Result<Passphrase, AuthError> {
    let value = Zeroizing::new(read_secret(
        prompter,
        "==> Insert the password for the secrets decryption: ",
    )?);
    Ok(Passphrase::new(value.as_str()))
}

/// Ask a question, falling back to `default` on an empty answer.
pub fn ask_with_default(
    prompter: &dyn Prompter,
    question: &str,
    default: &str,
) -> Result<String, AuthError> {
    let prompt = format!("{}\npress enter for default [{}]\n", question, default);
    let answer = prompter
        .read_line(&prompt)
        .map_err(|e| AuthError::PasswordInput {
            message: e.to_string(),
        })?;
    let answer = answer.trim();
    if answer.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(answer.to_string())
    }
}

fn read_secret(prompter: &dyn Prompter, prompt: &str) -> Result<String, AuthError> {
    prompter
        .read_secret(prompt)
        .map_err(|e| AuthError::PasswordInput {
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_requires_matching_entries() {
        let prompter = ScriptedPrompter::new(["hunter2", "hunter2"]);
        let pass = create_passphrase(&prompter).unwrap();
        assert_eq!(pass.as_bytes(), b"hunter2");
    }

    #[test]
    fn test_create_rejects_mismatch() {
        let prompter = ScriptedPrompter::new(["hunter2", "hunter3"]);
        assert!(matches!(
            create_passphrase(&prompter),
            Err(AuthError::PasswordMismatch)
        ));
    }

    #[test]
    fn test_existing_reads_once() {
        let prompter = ScriptedPrompter::new(["only", "leftover"]);
        let pass = existing_passphrase(&prompter).unwrap();
        assert_eq!(pass.as_bytes(), b"only");
        assert_eq!(prompter.read_line("").unwrap(), "leftover");
    }

    #[test]
    fn test_exhausted_script_is_input_error() {
        let prompter = ScriptedPrompter::new(Vec::<String>::new());
        assert!(matches!(
            existing_passphrase(&prompter),
            Err(AuthError::PasswordInput { .. })
        ));
    }

    #[test]
    fn test_ask_with_default() {
        let prompter = ScriptedPrompter::new(["", "  https://iam.example.org  "]);
        assert_eq!(
            ask_with_default(&prompter, "IAM?", "https://default").unwrap(),
            "https://default"
        );
        assert_eq!(
            ask_with_default(&prompter, "IAM?", "https://default").unwrap(),
            "https://iam.example.org"
        );
    }

    #[test]
    fn test_debug_hides_secret() {
        let pass = Passphrase::new("top-secret");
        assert!(!format!("{:?}", pass).contains("top-secret"));
    }
}
