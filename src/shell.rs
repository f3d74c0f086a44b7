//! Terminal presentation shell.
//!
//! Reads ideas line by line, shows each report, optionally saves it as the
//! downloadable markdown file, and keeps one [`SessionState`] for the whole
//! run.

use crate::error::ValidatorError;
use crate::report::ReportDownload;
use crate::throttle::SessionState;
use crate::validator::{IdeaValidator, ValidationOutcome};
use anyhow::Result;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::info;

/// What happened to one submitted line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionStatus {
    Reported { cached: bool },
    Throttled,
    Failed,
}

pub struct Shell<'a> {
    validator: &'a IdeaValidator,
    output_dir: Option<PathBuf>,
    session: SessionState,
}

impl<'a> Shell<'a> {
    pub fn new(validator: &'a IdeaValidator, output_dir: Option<PathBuf>) -> Self {
        Self {
            validator,
            output_dir,
            session: SessionState::new(),
        }
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    // =========================================================================
    // Core methods with I/O injection (testable)
    // =========================================================================

    /// Validates one idea and writes the report or a user-facing message.
    ///
    /// # Errors
    ///
    /// Only I/O failures are returned; validation failures are reported to
    /// `output` and come back as [`SubmissionStatus::Failed`].
    pub async fn submit_with_io<W: Write>(&mut self, idea: &str, output: &mut W) -> Result<SubmissionStatus> {
        if idea.trim().is_empty() {
            writeln!(output, "⚠️  {}", ValidatorError::EmptyIdea)?;
            return Ok(SubmissionStatus::Failed);
        }

        writeln!(output, "🔎 Validating... scanning signals, scoring, writing recommendations")?;
        output.flush()?;

        match self.validator.validate(&mut self.session, idea).await {
            Ok(ValidationOutcome::Completed { result, cached }) => {
                writeln!(output)?;
                writeln!(output, "{}", result.report_text.trim_end())?;
                writeln!(output)?;
                if cached {
                    writeln!(output, "✅ Validation complete (cached result from {})", result.produced_by)?;
                } else {
                    writeln!(output, "✅ Validation complete (via {})", result.produced_by)?;
                }

                if let Some(dir) = &self.output_dir {
                    let path = ReportDownload::from_result(&result).save_to(dir)?;
                    writeln!(output, "📄 Report saved to {}", path.display())?;
                }
                self.write_session_usage(output)?;
                Ok(SubmissionStatus::Reported { cached })
            }
            Ok(ValidationOutcome::Throttled(rejection)) => {
                writeln!(output, "⏳ {}", rejection.user_message())?;
                Ok(SubmissionStatus::Throttled)
            }
            Err(e) => {
                writeln!(output, "❌ {}", e)?;
                Ok(SubmissionStatus::Failed)
            }
        }
    }

    /// Runs the interactive loop until end of input or `quit`.
    pub async fn run_with_io<R: BufRead, W: Write>(&mut self, input: &mut R, output: &mut W) -> Result<()> {
        writeln!(output, "🚀 Startup Idea Validator")?;
        writeln!(output, "Describe your startup idea on one line. Commands: reset, quit")?;

        loop {
            write!(output, "\nidea> ")?;
            output.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                break;
            }

            match line.trim() {
                "quit" | "exit" => break,
                "reset" => {
                    self.session.reset();
                    info!("Session reset by user");
                    writeln!(output, "🔄 Session reset.")?;
                }
                idea => {
                    self.submit_with_io(idea, output).await?;
                }
            }
        }

        writeln!(output, "👋 Bye")?;
        Ok(())
    }

    fn write_session_usage<W: Write>(&self, output: &mut W) -> Result<()> {
        writeln!(
            output,
            "Validations this session: {}/{}",
            self.session.validation_count,
            self.validator.throttle_config().session_limit
        )?;
        Ok(())
    }

    // =========================================================================
    // Convenience wrappers using stdin/stdout
    // =========================================================================

    pub async fn submit(&mut self, idea: &str) -> Result<SubmissionStatus> {
        let mut output = io::stdout();
        self.submit_with_io(idea, &mut output).await
    }

    pub async fn run(&mut self) -> Result<()> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stdout();
        self.run_with_io(&mut input, &mut output).await
    }
}
