//! Run driver
//!
//! Runs an [`Agent`] under a [`Session`] and performs the restart loop for
//! self-correction: when validation inside the agent signals
//! `Abort(Restart)`, the session is resumed from the last safe checkpoint
//! and the agent is invoked again with the corrected input.

use thiserror::Error;

use crate::error::{BumpersError, ValidationFailure};
use crate::session::Session;
use crate::signal::{AbortSignal, Interrupt, StopCause};

/// The agent being guarded
///
/// Implementations call `guard.validate(..)` at each validation point and
/// propagate any [`Interrupt`] they do not handle themselves.
pub trait Agent {
    fn run(&mut self, input: &str, guard: &mut Session) -> Result<String, Interrupt>;
}

impl<F> Agent for F
where
    F: FnMut(&str, &mut Session) -> Result<String, Interrupt>,
{
    fn run(&mut self, input: &str, guard: &mut Session) -> Result<String, Interrupt> {
        self(input, guard)
    }
}

/// How a driven run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunReport {
    Completed {
        output: String,
        attempts: u32,
    },
    Stopped {
        cause: StopCause,
        failure: ValidationFailure,
        attempts: u32,
    },
}

impl RunReport {
    pub fn attempts(&self) -> u32 {
        match self {
            RunReport::Completed { attempts, .. } | RunReport::Stopped { attempts, .. } => *attempts,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RunReport::Completed { .. })
    }
}

/// Errors that end a driven run without a report
#[derive(Error, Debug)]
pub enum DriveError {
    /// A `raise` failure escaped the agent
    #[error(transparent)]
    Raised(ValidationFailure),

    #[error(transparent)]
    Session(#[from] BumpersError),
}

/// Drive `agent` on `request` until it completes or is stopped
pub fn drive<A: Agent + ?Sized>(
    session: &mut Session,
    agent: &mut A,
    request: &str,
) -> Result<RunReport, DriveError> {
    session.start_run(request)?;
    let mut input = request.to_string();

    loop {
        match agent.run(&input, session) {
            Ok(output) => {
                session.complete_run()?;
                return Ok(RunReport::Completed {
                    output,
                    attempts: session.tracker().attempt(),
                });
            }
            Err(Interrupt::Raised(failure)) => {
                session.halt();
                return Err(DriveError::Raised(failure));
            }
            Err(Interrupt::Abort(AbortSignal::Stop { cause, failure })) => {
                return Ok(RunReport::Stopped {
                    cause,
                    failure,
                    attempts: session.tracker().attempt(),
                });
            }
            Err(Interrupt::Abort(AbortSignal::Restart(payload))) => {
                session.restart(&payload)?;
                input = payload.input;
            }
        }
    }
}
