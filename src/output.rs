//! Terminal output
//!
//! - stdout = messages, formatted response bodies
//! - stderr = errors, verbose request/response dumps

use crate::error::{Result, ShipyardError};
use crate::format::{self, Presentation, Render};

/// Lines printed around a response depending on its status
#[derive(Debug, Clone, Default)]
pub struct Messages {
    pub success: Option<String>,
    pub failure: String,
}

impl Messages {
    pub fn new(success: impl Into<String>, failure: impl Into<String>) -> Self {
        Self {
            success: Some(success.into()),
            failure: failure.into(),
        }
    }

    pub fn failure_only(failure: impl Into<String>) -> Self {
        Self {
            success: None,
            failure: failure.into(),
        }
    }
}

/// Output handler
pub struct Output {
    verbose: bool,
}

impl Output {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Human message (stdout)
    pub fn say(&self, message: &str) {
        println!("{}", message);
    }

    /// Diagnostic dump, only shown with --verbose (stderr)
    pub fn dump(&self, message: &str) {
        if self.verbose {
            eprintln!("{}", message);
        }
    }

    /// Error output; exits with the category's code
    pub fn error(&self, err: &ShipyardError) -> ! {
        eprintln!("Error [{}]: {}", err.category(), err);
        std::process::exit(err.exit_code());
    }

    /// Print a response according to its status and the chosen presentation
    ///
    /// 2xx prints the success banner (only when the presentation asks for it)
    /// and the body. Anything else prints the failure line plus whatever the body says,
    /// and comes back as an error so the process exits non-zero.
    pub fn report(
        &self,
        operation: &str,
        status: u16,
        body: &[u8],
        messages: &Messages,
        presentation: Presentation,
    ) -> Result<()> {
        match status {
            200 | 201 | 204 => {
                for line in success_lines(body, messages, presentation)? {
                    self.say(&line);
                }
                Ok(())
            }
            401 => Err(ShipyardError::Unauthenticated),
            403 => {
                self.say(&messages.failure);
                if let Some(text) = format::render_body(Render::Raw, body)? {
                    self.say(&text);
                }
                Err(ShipyardError::api(operation, status))
            }
            404 => {
                self.say(&messages.failure);
                self.say("Received a 404. Resource not found.");
                Err(ShipyardError::api(operation, status))
            }
            _ => {
                self.say(&messages.failure);
                let render = presentation.render.unwrap_or(Render::Raw);
                // error bodies are often plain text even when JSON was asked for
                let text = format::render_body(render, body)
                    .or_else(|_| format::render_body(Render::Raw, body))?;
                if let Some(text) = text {
                    self.say(&text);
                }
                Err(ShipyardError::api(operation, status))
            }
        }
    }
}

/// What a 2xx response prints: the banner if asked for, then the rendered body
fn success_lines(body: &[u8], messages: &Messages, presentation: Presentation) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    if let (Some(success), true) = (&messages.success, presentation.banner) {
        lines.push(success.clone());
    }
    if let Some(render) = presentation.render {
        lines.extend(format::render_body(render, body)?);
    }
    Ok(lines)
}
