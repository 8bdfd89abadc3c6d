use std::fmt;
use std::io::{self, BufRead, IsTerminal, Write};
use tracing::info;

use crate::error::{InvoiceError, Result};
use crate::models::entry::Credentials;

/// Source of answers for an attended run.
///
/// `ask` returns `None` when nobody can answer (unattended run, closed stdin).
pub trait Prompter {
    fn ask(&mut self, question: &str) -> Option<String>;

    /// Like [`Prompter::ask`], but the answer must not be echoed.
    fn ask_secret(&mut self, question: &str) -> Option<String> {
        self.ask(question)
    }
}

/// Never answers; used for unattended runs.
pub struct NoPrompt;

impl Prompter for NoPrompt {
    fn ask(&mut self, _question: &str) -> Option<String> {
        None
    }
}

/// Reads answers from stdin, only when stdin is an interactive terminal.
pub struct TerminalPrompter;

impl TerminalPrompter {
    pub fn is_available() -> bool {
        io::stdin().is_terminal()
    }
}

impl Prompter for TerminalPrompter {
    fn ask(&mut self, question: &str) -> Option<String> {
        if !Self::is_available() {
            return None;
        }
        print!("{} ", question);
        io::stdout().flush().ok()?;

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }

    fn ask_secret(&mut self, question: &str) -> Option<String> {
        if !Self::is_available() {
            return None;
        }
        rpassword::prompt_password(format!("{} ", question))
            .ok()
            .map(|answer| answer.trim().to_string())
    }
}

/// Values supplied explicitly by the caller; any may be missing.
#[derive(Clone, Default)]
pub struct CredentialOverrides {
    pub company: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for CredentialOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialOverrides")
            .field("company", &self.company)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Explicit overrides first, then the prompter for whatever is still missing.
pub fn resolve_credentials(
    overrides: &CredentialOverrides,
    prompter: &mut dyn Prompter,
) -> Result<Credentials> {
    let mut field = |value: &Option<String>, name: &'static str, question: &str, secret: bool| {
        match value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => Ok(v.to_string()),
            None => {
                info!("No {} supplied; prompting", name);
                let answer = if secret {
                    prompter.ask_secret(question)
                } else {
                    prompter.ask(question)
                };
                answer
                    .filter(|v| !v.is_empty())
                    .ok_or(InvoiceError::MissingCredentials { field: name })
            }
        }
    };

    Ok(Credentials {
        company: field(&overrides.company, "company", "Company:", false)?,
        username: field(&overrides.username, "username", "Login name:", false)?,
        password: field(&overrides.password, "password", "Password:", true)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays canned answers, then behaves as unattended. Questions are
    /// recorded in order; hidden ones also land in `.2`.
    pub struct Scripted(pub VecDeque<String>, pub Vec<String>, pub Vec<String>);

    impl Scripted {
        pub fn new(answers: &[&str]) -> Self {
            Self(answers.iter().map(|s| s.to_string()).collect(), Vec::new(), Vec::new())
        }
    }

    impl Prompter for Scripted {
        fn ask(&mut self, question: &str) -> Option<String> {
            self.1.push(question.to_string());
            self.0.pop_front()
        }

        fn ask_secret(&mut self, question: &str) -> Option<String> {
            self.2.push(question.to_string());
            self.ask(question)
        }
    }

    #[test]
    fn test_overrides_win_without_prompting() {
        let overrides = CredentialOverrides {
            company: Some("acme".into()),
            username: Some("jp".into()),
            password: Some("secret".into()),
        };
        let mut prompt = Scripted::new(&[]);
        let creds = resolve_credentials(&overrides, &mut prompt).unwrap();
        assert_eq!(creds.company, "acme");
        assert!(prompt.1.is_empty());
    }

    #[test]
    fn test_missing_fields_are_prompted() {
        let overrides = CredentialOverrides {
            company: Some("acme".into()),
            username: Some("  ".into()),
            password: None,
        };
        let mut prompt = Scripted::new(&["jp", "secret"]);
        let creds = resolve_credentials(&overrides, &mut prompt).unwrap();
        assert_eq!(creds.username, "jp");
        assert_eq!(creds.password, "secret");
        assert_eq!(prompt.1, vec!["Login name:", "Password:"]);
        assert_eq!(prompt.2, vec!["Password:"]);
    }

    #[test]
    fn test_overrides_debug_hides_password() {
        let overrides = CredentialOverrides {
            company: Some("acme".into()),
            username: Some("jp".into()),
            password: Some("hunter2".into()),
        };
        let shown = format!("{:?}", overrides);
        assert!(shown.contains("acme"));
        assert!(shown.contains("<redacted>"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn test_unattended_missing_field_fails() {
        let err = resolve_credentials(&CredentialOverrides::default(), &mut NoPrompt).unwrap_err();
        assert!(matches!(err, InvoiceError::MissingCredentials { field: "company" }));
    }
}
