/// Pipeline executor and collaborator interfaces
///
/// This module contains the engine that runs a built sequence against
/// one request context, plus the traits commands use to reach
/// repositories, image storage and the identity provider.

pub mod traits;

use serde_json::json;

use crate::pipeline::{Context, ErrorCapsule, ExecutionError, Flow, Sequence};
use crate::registry::Registry;

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunReport {
    /// Every command ran
    Completed,
    /// A command stopped the run
    ShortCircuited { command: String, index: usize },
}

/// The pipeline executor
///
/// The executor holds no per-request state: each call to [`run`] drives
/// one context through one sequence synchronously, calling every command
/// at most once and in order.
///
/// [`run`]: MiddlewarePipeline::run
pub struct MiddlewarePipeline<'a> {
    registry: &'a Registry,
}

impl<'a> MiddlewarePipeline<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Run the sequence registered for the context's route key
    ///
    /// An unknown route key produces a RouteNotFound response without
    /// running anything.
    pub fn dispatch(&self, context: &mut Context) -> Result<RunReport, ExecutionError> {
        match self.registry.sequence(&context.route_key) {
            Some(sequence) => Self::run(sequence, context),
            None => {
                tracing::warn!(route = %context.route_key, "no sequence registered for route");
                context.push_capsule(ErrorCapsule::route_not_found(&context.route_key));
                Self::apply_capsule(context);
                Ok(RunReport::ShortCircuited {
                    command: "route".to_string(),
                    index: 0,
                })
            }
        }
    }

    /// Run a sequence against a context
    ///
    /// After each command:
    /// 1. a returned capsule is appended to the context
    /// 2. if any capsule is pending, the most recent one becomes the
    ///    response and the run short-circuits
    /// 3. a set `short_circuit` flag stops the run
    ///
    /// A fatal error is returned immediately and no later command runs.
    pub fn run(sequence: &Sequence, context: &mut Context) -> Result<RunReport, ExecutionError> {
        for (index, command) in sequence.commands().iter().enumerate() {
            tracing::debug!(sequence = sequence.name(), command = command.name(), "running command");

            match command.call(context) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Halt) => context.short_circuit = true,
                Ok(Flow::ShortCircuit(capsule)) => context.push_capsule(capsule),
                Err(err) => {
                    tracing::error!(
                        sequence = sequence.name(),
                        command = command.name(),
                        error = %err,
                        "command failed"
                    );
                    return Err(err);
                }
            }

            Self::apply_capsule(context);

            if context.short_circuit {
                tracing::debug!(
                    sequence = sequence.name(),
                    command = command.name(),
                    status = context.response.status,
                    "sequence short-circuited"
                );
                return Ok(RunReport::ShortCircuited {
                    command: command.name().to_string(),
                    index,
                });
            }
        }

        Ok(RunReport::Completed)
    }

    fn apply_capsule(context: &mut Context) {
        if let Some(capsule) = context.pop_capsule() {
            tracing::warn!(
                route = %context.route_key,
                status = capsule.status,
                message = %capsule.message,
                "request short-circuited by capsule"
            );
            context.response.status = capsule.status;
            context.response.body = json!({ "message": capsule.message });
            context.short_circuit = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Command, SequenceBuilder};
    use crate::registry::RegistryBuilder;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    type Trace = Arc<Mutex<Vec<String>>>;

    fn recording(name: &str, trace: &Trace, flow: Flow) -> Command {
        let trace = trace.clone();
        let label = name.to_string();
        Command::new(name, move |_| {
            trace.lock().unwrap().push(label.clone());
            Ok(flow.clone())
        })
    }

    fn trace() -> Trace {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn calls(trace: &Trace) -> Vec<String> {
        trace.lock().unwrap().clone()
    }

    #[test]
    fn test_runs_every_command_in_order() {
        let t = trace();
        let sequence = SequenceBuilder::new("s")
            .add_command(recording("a", &t, Flow::Continue))
            .add_command(recording("b", &t, Flow::Continue))
            .add_command(recording("c", &t, Flow::Continue))
            .finish()
            .unwrap();
        let mut ctx = Context::new("GET /x");

        let report = MiddlewarePipeline::run(&sequence, &mut ctx).unwrap();

        assert_eq!(report, RunReport::Completed);
        assert_eq!(calls(&t), vec!["a", "b", "c"]);
        assert!(!ctx.short_circuit);
    }

    #[test]
    fn test_capsule_short_circuits_and_shapes_response() {
        let t = trace();
        let sequence = SequenceBuilder::new("s")
            .add_command(recording("a", &t, Flow::Continue))
            .add_command(recording(
                "guard",
                &t,
                Flow::ShortCircuit(ErrorCapsule::already_exists("Brand already exists")),
            ))
            .add_command(recording("write", &t, Flow::Continue))
            .finish()
            .unwrap();
        let mut ctx = Context::new("POST /brands");

        let report = MiddlewarePipeline::run(&sequence, &mut ctx).unwrap();

        assert_eq!(
            report,
            RunReport::ShortCircuited {
                command: "guard".to_string(),
                index: 1
            }
        );
        assert_eq!(calls(&t), vec!["a", "guard"]);
        assert_eq!(ctx.response.status, 400);
        assert_eq!(ctx.response.body, json!({"message": "Brand already exists"}));
        assert!(ctx.short_circuit);
        assert!(!ctx.has_capsule());
    }

    #[test]
    fn test_capsule_appended_to_context_is_honoured() {
        let t = trace();
        let pushes = Command::new("push", |ctx: &mut Context| {
            ctx.push_capsule(ErrorCapsule::not_found("older"));
            ctx.push_capsule(ErrorCapsule::forbidden("newest"));
            Ok(Flow::Continue)
        });
        let sequence = SequenceBuilder::new("s")
            .add_command(pushes)
            .add_command(recording("never", &t, Flow::Continue))
            .finish()
            .unwrap();
        let mut ctx = Context::new("GET /x");

        MiddlewarePipeline::run(&sequence, &mut ctx).unwrap();

        assert_eq!(ctx.response.status, 403);
        assert_eq!(ctx.response.body, json!({"message": "newest"}));
        assert!(calls(&t).is_empty());
    }

    #[test]
    fn test_halt_keeps_command_response() {
        let t = trace();
        let halt = Command::new("halt", |ctx: &mut Context| {
            ctx.response.status = 304;
            ctx.response.body = json!({});
            Ok(Flow::Halt)
        });
        let sequence = SequenceBuilder::new("s")
            .add_command(halt)
            .add_command(recording("never", &t, Flow::Continue))
            .finish()
            .unwrap();
        let mut ctx = Context::new("GET /x");

        MiddlewarePipeline::run(&sequence, &mut ctx).unwrap();

        assert_eq!(ctx.response.status, 304);
        assert_eq!(ctx.response.body, json!({}));
        assert!(calls(&t).is_empty());
    }

    #[test]
    fn test_short_circuit_flag_set_directly_stops() {
        let t = trace();
        let flag = Command::new("flag", |ctx: &mut Context| {
            ctx.short_circuit = true;
            Ok(Flow::Continue)
        });
        let sequence = SequenceBuilder::new("s")
            .add_command(recording("a", &t, Flow::Continue))
            .add_command(flag)
            .add_command(recording("never", &t, Flow::Continue))
            .finish()
            .unwrap();
        let mut ctx = Context::new("GET /x");

        let report = MiddlewarePipeline::run(&sequence, &mut ctx).unwrap();
        assert!(matches!(report, RunReport::ShortCircuited { index: 1, .. }));
        assert_eq!(calls(&t), vec!["a"]);
    }

    #[test]
    fn test_fatal_error_propagates_and_stops() {
        let t = trace();
        let boom = Command::new("boom", |_| Err(ExecutionError::custom("store unavailable")));
        let sequence = SequenceBuilder::new("s")
            .add_command(boom)
            .add_command(recording("never", &t, Flow::Continue))
            .finish()
            .unwrap();
        let mut ctx = Context::new("GET /x");

        let err = MiddlewarePipeline::run(&sequence, &mut ctx).unwrap_err();
        assert_eq!(err.to_string(), "store unavailable");
        assert!(calls(&t).is_empty());
    }

    #[test]
    fn test_each_command_runs_at_most_once_for_shared_commands() {
        let t = trace();
        let shared = recording("shared", &t, Flow::Continue);
        let sub = SequenceBuilder::new("sub").add_command(shared.clone());
        let sequence = SequenceBuilder::new("s")
            .add_sequence(&sub)
            .add_command(recording("stop", &t, Flow::Halt))
            .add_sequence(&sub)
            .finish()
            .unwrap();
        let mut ctx = Context::new("GET /x");

        MiddlewarePipeline::run(&sequence, &mut ctx).unwrap();
        assert_eq!(calls(&t), vec!["shared", "stop"]);
    }

    #[test]
    fn test_dispatch_unknown_route() {
        let registry = RegistryBuilder::new().build();
        let mut ctx = Context::new("DELETE /nowhere");

        let report = MiddlewarePipeline::new(&registry).dispatch(&mut ctx).unwrap();

        assert!(matches!(report, RunReport::ShortCircuited { .. }));
        assert_eq!(ctx.response.status, 404);
        assert_eq!(
            ctx.response.body,
            json!({"message": "No route matches 'DELETE /nowhere'"})
        );
    }

    #[test]
    fn test_dispatch_known_route() {
        let t = trace();
        let registry = RegistryBuilder::new()
            .route(
                "GET /ping",
                SequenceBuilder::new("ping").add_command(recording("pong", &t, Flow::Continue)),
            )
            .unwrap()
            .build();
        let mut ctx = Context::new("GET /ping");

        let report = MiddlewarePipeline::new(&registry).dispatch(&mut ctx).unwrap();
        assert_eq!(report, RunReport::Completed);
        assert_eq!(calls(&t), vec!["pong"]);
    }
}
