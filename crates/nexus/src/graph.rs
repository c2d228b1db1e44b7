//! The routing graph: which role runs next.
//!
//! ```text
//! Start -> Supervisor -> Enhancer   -> Supervisor
//!                     -> Researcher -> Validator
//!                     -> Coder      -> Validator
//! Validator -> Supervisor | End
//! ```

use std::fmt::{self, Display};

use nexus_core::StructuredOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::conversation::Origin;

/// A role in the routing graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Node {
    /// Picks the next worker.
    Supervisor,
    /// Rewrites vague queries.
    Enhancer,
    /// Answers with the help of web search.
    Researcher,
    /// Answers with the help of code execution.
    Coder,
    /// Accepts or rejects the latest answer.
    Validator,
}

impl Node {
    /// The node every run starts in.
    pub const START: Node = Node::Supervisor;

    /// Returns the origin tag of the messages this node appends.
    pub fn origin(self) -> Origin {
        match self {
            Node::Supervisor => Origin::Supervisor,
            Node::Enhancer => Origin::Enhancer,
            Node::Researcher => Origin::Researcher,
            Node::Coder => Origin::Coder,
            Node::Validator => Origin::Validator,
        }
    }

    /// Returns the lowercase name of the node.
    #[inline]
    pub fn name(self) -> &'static str {
        self.origin().as_str()
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a run goes after a node has appended its message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    /// Run the given node next.
    Goto(Node),
    /// The run is finished.
    End,
}

impl Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Goto(node) => Display::fmt(node, f),
            Step::End => f.write_str("end"),
        }
    }
}

/// The workers the supervisor can dispatch to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SupervisorRoute {
    /// Enhance the user prompt if it is unclear or vague.
    Enhancer,
    /// Gather additional information.
    Researcher,
    /// Solve technical, calculation or code-related problems.
    Coder,
}

impl From<SupervisorRoute> for Node {
    fn from(route: SupervisorRoute) -> Self {
        match route {
            SupervisorRoute::Enhancer => Node::Enhancer,
            SupervisorRoute::Researcher => Node::Researcher,
            SupervisorRoute::Coder => Node::Coder,
        }
    }
}

/// The verdicts the validator can reach.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, JsonSchema)]
pub enum ValidatorRoute {
    /// Route back to the supervisor for another attempt.
    #[serde(rename = "supervisor")]
    Supervisor,
    /// The answer is satisfactory; end the run.
    #[serde(rename = "FINISH")]
    Finish,
}

impl ValidatorRoute {
    /// Returns the step this verdict leads to.
    pub fn step(self) -> Step {
        match self {
            ValidatorRoute::Supervisor => Step::Goto(Node::Supervisor),
            ValidatorRoute::Finish => Step::End,
        }
    }
}

/// A routing decision as replied by the model.
///
/// Only `reason` ends up in the conversation; `next` decides the step.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, JsonSchema)]
pub struct RoutingDecision<R> {
    /// Specifies the next worker in the pipeline.
    pub next: R,
    /// The reason for the decision, providing context on why this choice
    /// was made.
    pub reason: String,
}

impl StructuredOutput for RoutingDecision<SupervisorRoute> {
    const NAME: &'static str = "supervisor_decision";
}

impl StructuredOutput for RoutingDecision<ValidatorRoute> {
    const NAME: &'static str = "validator_decision";
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_supervisor_routes() {
        for (raw, node) in [
            ("enhancer", Node::Enhancer),
            ("researcher", Node::Researcher),
            ("coder", Node::Coder),
        ] {
            let decision: RoutingDecision<SupervisorRoute> =
                serde_json::from_value(json!({ "next": raw, "reason": "r" }))
                    .unwrap();
            assert_eq!(Node::from(decision.next), node);
        }

        for raw in ["validator", "supervisor", "FINISH", "Coder"] {
            let result = serde_json::from_value::<
                RoutingDecision<SupervisorRoute>,
            >(json!({ "next": raw, "reason": "r" }));
            assert!(result.is_err(), "{raw} must be rejected");
        }
    }

    #[test]
    fn test_validator_routes() {
        let decision: RoutingDecision<ValidatorRoute> =
            serde_json::from_value(json!({ "next": "FINISH", "reason": "ok" }))
                .unwrap();
        assert_eq!(decision.next.step(), Step::End);

        let decision: RoutingDecision<ValidatorRoute> = serde_json::from_value(
            json!({ "next": "supervisor", "reason": "incomplete" }),
        )
        .unwrap();
        assert_eq!(decision.next.step(), Step::Goto(Node::Supervisor));
        assert_eq!(decision.reason, "incomplete");

        for raw in ["finish", "end", "coder", ""] {
            let result = serde_json::from_value::<
                RoutingDecision<ValidatorRoute>,
            >(json!({ "next": raw, "reason": "r" }));
            assert!(result.is_err(), "{raw} must be rejected");
        }
    }

    #[test]
    fn test_names() {
        assert_eq!(Node::Researcher.to_string(), "researcher");
        assert_eq!(Step::End.to_string(), "end");
        assert_eq!(Step::Goto(Node::Coder).to_string(), "coder");
        assert_eq!(Node::Validator.origin(), Origin::Validator);
        assert_eq!(Node::START, Node::Supervisor);
    }
}
