use std::fmt;
use std::sync::Arc;

use super::{Context, ErrorCapsule, ExecutionError};

/// Non-fatal outcome of one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    /// Hand the context to the next command
    Continue,
    /// Stop the sequence; the command has already shaped the response
    Halt,
    /// Stop the sequence and report the capsule as the response
    ShortCircuit(ErrorCapsule),
}

/// Result of running one command; `Err` is the fatal case
pub type CommandResult = Result<Flow, ExecutionError>;

type CommandFn = dyn Fn(&mut Context) -> CommandResult + Send + Sync;

/// A named unit of work applied to a context
///
/// Commands are cheap to clone; clones share the same function.
#[derive(Clone)]
pub struct Command {
    name: Arc<str>,
    func: Arc<CommandFn>,
}

impl Command {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut Context) -> CommandResult + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name.into()),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the command against a context
    pub fn call(&self, context: &mut Context) -> CommandResult {
        (self.func)(context)
    }

    /// Whether two handles share the same underlying function
    pub fn same_as(&self, other: &Command) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("func", &"<function>")
            .finish()
    }
}

/// A node in a sequence declaration
#[derive(Debug, Clone)]
pub enum Step {
    Command(Command),
    /// Steps of another builder, inlined at flatten time
    Sequence { name: String, steps: Vec<Step> },
}

/// Flatten a step tree into execution order
///
/// Nested sequences are expanded depth-first in place, so the relative
/// order of every command is preserved.
pub fn flatten(steps: &[Step]) -> Vec<Command> {
    let mut commands = Vec::new();
    flatten_into(steps, &mut commands);
    commands
}

fn flatten_into(steps: &[Step], out: &mut Vec<Command>) {
    for step in steps {
        match step {
            Step::Command(command) => out.push(command.clone()),
            Step::Sequence { steps, .. } => flatten_into(steps, out),
        }
    }
}
