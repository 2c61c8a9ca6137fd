use std::sync::Arc;
use thiserror::Error;

use super::step::{flatten, Command, Step};

/// Errors raised while assembling a sequence
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    #[error("sequence '{0}' was already built")]
    AlreadyBuilt(String),

    #[error("sequence '{0}' has not been built yet")]
    NotBuilt(String),
}

/// A frozen, ordered list of commands
///
/// Produced once by [`SequenceBuilder::build`]; clones share the list.
#[derive(Debug, Clone)]
pub struct Sequence {
    name: Arc<str>,
    commands: Arc<[Command]>,
}

impl Sequence {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Fluent declaration of a sequence
///
/// # Example
/// ```
/// use brandmatch::pipeline::{Command, Flow, SequenceBuilder};
///
/// let auth = SequenceBuilder::new("auth")
///     .add_command(Command::new("require_auth", |_| Ok(Flow::Continue)));
///
/// let sequence = SequenceBuilder::new("get_brand")
///     .add_sequence(&auth)
///     .add_command(Command::new("get_by_id", |_| Ok(Flow::Continue)))
///     .finish()
///     .unwrap();
///
/// assert_eq!(sequence.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct SequenceBuilder {
    name: String,
    steps: Vec<Step>,
    resolved: Option<Sequence>,
}

impl SequenceBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            resolved: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append one command
    pub fn add_command(mut self, command: Command) -> Self {
        self.steps.push(Step::Command(command));
        self
    }

    /// Inline another builder's steps at this position
    pub fn add_sequence(mut self, other: &SequenceBuilder) -> Self {
        self.steps.push(Step::Sequence {
            name: other.name.clone(),
            steps: other.steps.clone(),
        });
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Flatten the declared steps; allowed exactly once
    pub fn build(&mut self) -> Result<(), SequenceError> {
        if self.resolved.is_some() {
            return Err(SequenceError::AlreadyBuilt(self.name.clone()));
        }

        let commands = flatten(&self.steps);
        tracing::trace!(sequence = %self.name, commands = commands.len(), "sequence built");
        self.resolved = Some(Sequence {
            name: Arc::from(self.name.as_str()),
            commands: Arc::from(commands),
        });
        Ok(())
    }

    /// The frozen sequence; fails if `build` has not run
    pub fn generate_sequence(&self) -> Result<Sequence, SequenceError> {
        self.resolved
            .clone()
            .ok_or_else(|| SequenceError::NotBuilt(self.name.clone()))
    }

    /// Build and return the sequence in one step
    pub fn finish(mut self) -> Result<Sequence, SequenceError> {
        self.build()?;
        self.generate_sequence()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Flow;

    fn noop(name: &str) -> Command {
        Command::new(name, |_| Ok(Flow::Continue))
    }

    fn names(sequence: &Sequence) -> Vec<&str> {
        sequence.commands().iter().map(Command::name).collect()
    }

    #[test]
    fn test_build_then_generate() {
        let mut builder = SequenceBuilder::new("s")
            .add_command(noop("a"))
            .add_command(noop("b"));
        builder.build().unwrap();

        let sequence = builder.generate_sequence().unwrap();
        assert_eq!(sequence.name(), "s");
        assert_eq!(names(&sequence), vec!["a", "b"]);
    }

    #[test]
    fn test_generate_before_build_fails() {
        let builder = SequenceBuilder::new("early").add_command(noop("a"));
        assert_eq!(
            builder.generate_sequence().unwrap_err(),
            SequenceError::NotBuilt("early".to_string())
        );
    }

    #[test]
    fn test_generate_before_build_fails_even_when_empty() {
        let builder = SequenceBuilder::new("empty");
        assert!(builder.generate_sequence().is_err());
    }

    #[test]
    fn test_second_build_fails() {
        let mut builder = SequenceBuilder::new("twice").add_command(noop("a"));
        builder.build().unwrap();
        assert_eq!(
            builder.build().unwrap_err(),
            SequenceError::AlreadyBuilt("twice".to_string())
        );
        assert_eq!(builder.generate_sequence().unwrap().len(), 1);
    }

    #[test]
    fn test_nested_builders_are_inlined_in_order() {
        let validate = SequenceBuilder::new("validate")
            .add_command(noop("require_auth"))
            .add_command(noop("validate_payload"));
        let enrich = SequenceBuilder::new("enrich")
            .add_sequence(&validate)
            .add_command(noop("enrich_from_identity"));

        let sequence = SequenceBuilder::new("create")
            .add_sequence(&enrich)
            .add_command(noop("create"))
            .add_sequence(&validate)
            .finish()
            .unwrap();

        assert_eq!(
            names(&sequence),
            vec![
                "require_auth",
                "validate_payload",
                "enrich_from_identity",
                "create",
                "require_auth",
                "validate_payload",
            ]
        );
    }

    #[test]
    fn test_later_changes_to_sub_builder_do_not_leak() {
        let sub = SequenceBuilder::new("sub").add_command(noop("a"));
        let parent = SequenceBuilder::new("parent").add_sequence(&sub);
        let _sub = sub.add_command(noop("b"));

        let sequence = parent.finish().unwrap();
        assert_eq!(names(&sequence), vec!["a"]);
    }
}
