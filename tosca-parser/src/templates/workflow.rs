//! Imperative workflows
//!
//! Workflows hold steps over node or group targets; each step carries a
//! list of activities in the single-key shorthand form (`delegate`,
//! `set_state`, `call_operation`, `inline`), whose mapping value may carry
//! `inputs`. Preconditions are condition-clause trees over the constraint
//! evaluators.

use crate::context::ParseContext;
use tosca_core::constraints::{condition_constraint, Constraint};
use tosca_core::error::ToscaError;
use tosca_core::value::{Mapping, Value};

/// Recognized keys of a workflow definition
pub const WORKFLOW_KEYS: &[&str] = &[
    "type",
    "metadata",
    "description",
    "inputs",
    "preconditions",
    "steps",
    "implementation",
    "outputs",
];

/// Recognized keys of a workflow step
pub const STEP_KEYS: &[&str] = &[
    "target",
    "target_relationship",
    "operation_host",
    "filter",
    "activities",
    "on_success",
    "on_failure",
];

/// The activity kinds of a workflow step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    /// Delegate to a named workflow
    Delegate,
    /// Set the target's state
    SetState,
    /// Call an interface operation
    CallOperation,
    /// Inline another workflow
    Inline,
}

impl ActivityKind {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "delegate" => Some(Self::Delegate),
            "set_state" => Some(Self::SetState),
            "call_operation" => Some(Self::CallOperation),
            "inline" => Some(Self::Inline),
            _ => None,
        }
    }
}

/// One activity of a workflow step
#[derive(Debug, Clone)]
pub struct Activity {
    /// What the activity does
    pub kind: ActivityKind,
    /// The workflow, state or operation the activity names
    pub target: Option<String>,
    /// Activity inputs, when the mapping form was used
    pub inputs: Option<Mapping>,
}

impl Activity {
    /// Parse the single-key shorthand form
    ///
    /// The value is either the target directly or a mapping carrying
    /// `inputs` beside the target.
    #[must_use]
    pub fn new(ctx: &ParseContext, definition: &Value) -> Option<Self> {
        let entry = definition.as_map().filter(|map| map.len() == 1);
        let Some((key, value)) = entry.and_then(|map| map.iter().next()) else {
            ctx.collector
                .append(ToscaError::validation("invalid activity"));
            return None;
        };
        let Some(kind) = ActivityKind::from_key(key) else {
            ctx.collector
                .append(ToscaError::unknown_field("activity", key));
            return None;
        };
        match value {
            Value::Map(map) => {
                let inputs = map.get_map("inputs").cloned();
                let target = map
                    .iter()
                    .filter(|(name, _)| name.as_str() != "inputs")
                    .find_map(|(_, v)| v.as_str())
                    .map(str::to_string);
                Some(Self {
                    kind,
                    target,
                    inputs,
                })
            }
            Value::String(target) => Some(Self {
                kind,
                target: Some(target.clone()),
                inputs: None,
            }),
            other => {
                ctx.collector.append(ToscaError::validation(format!(
                    "invalid activity value: {other}"
                )));
                None
            }
        }
    }
}

/// A boolean clause tree over property constraints
#[derive(Debug, Clone)]
pub enum ConditionClause {
    /// Every sub-clause must hold
    And(Vec<ConditionClause>),
    /// At least one sub-clause must hold
    Or(Vec<ConditionClause>),
    /// No sub-clause may hold
    Not(Vec<ConditionClause>),
    /// Every sub-clause must hold (assertion form)
    Assert(Vec<ConditionClause>),
    /// Constraints over one named property
    Condition {
        /// The property the constraints apply to
        name: String,
        /// The constraint clauses
        constraints: Vec<Constraint>,
    },
}

impl ConditionClause {
    /// Parse a list of clause mappings
    #[must_use]
    pub fn parse_list(ctx: &ParseContext, clauses: &[Value]) -> Vec<ConditionClause> {
        let mut parsed = Vec::new();
        for clause in clauses {
            let entry = clause.as_map().and_then(|map| map.iter().next());
            let Some((key, value)) = entry else {
                ctx.collector.append(ToscaError::validation(format!(
                    "invalid condition clause: {clause}"
                )));
                continue;
            };
            let nested = |ctx: &ParseContext, value: &Value| match value.as_list() {
                Some(items) => Self::parse_list(ctx, items),
                None => Vec::new(),
            };
            match key.as_str() {
                "and" => parsed.push(Self::And(nested(ctx, value))),
                "or" => parsed.push(Self::Or(nested(ctx, value))),
                "not" => parsed.push(Self::Not(nested(ctx, value))),
                "assert" => parsed.push(Self::Assert(nested(ctx, value))),
                name => parsed.push(Self::parse_condition(ctx, name, value)),
            }
        }
        parsed
    }

    fn parse_condition(ctx: &ParseContext, name: &str, value: &Value) -> ConditionClause {
        let mut constraints = Vec::new();
        let mut add = |op: &str, argument: &Value| {
            let op = if op == "equals" { "equal" } else { op };
            if let Some(constraint) = condition_constraint(name, None, op, argument, &ctx.collector)
            {
                constraints.push(constraint);
            }
        };
        match value {
            Value::List(items) => {
                for item in items {
                    if let Some((op, argument)) = item.as_map().and_then(|map| map.iter().next()) {
                        add(op, argument);
                    }
                }
            }
            Value::Map(map) => {
                for (op, argument) in map {
                    add(op, argument);
                }
            }
            _ => ctx.collector.append(ToscaError::validation(format!(
                "invalid condition for \"{name}\": {value}"
            ))),
        }
        ConditionClause::Condition {
            name: name.to_string(),
            constraints,
        }
    }

    /// Evaluate the clause tree against a set of named values
    #[must_use]
    pub fn evaluate(&self, values: &Mapping) -> bool {
        match self {
            Self::And(clauses) | Self::Assert(clauses) => {
                clauses.iter().all(|clause| clause.evaluate(values))
            }
            Self::Or(clauses) => clauses.iter().any(|clause| clause.evaluate(values)),
            Self::Not(clauses) => !clauses.iter().any(|clause| clause.evaluate(values)),
            Self::Condition { name, constraints } => match values.get(name) {
                Some(value) => constraints.iter().all(|constraint| constraint.matches(value)),
                None => false,
            },
        }
    }
}

/// A workflow precondition
#[derive(Debug, Clone)]
pub struct Precondition {
    /// The node or group the precondition applies to
    pub target: Option<String>,
    /// A relationship of the target, when given
    pub target_relationship: Option<String>,
    /// The condition clause tree
    pub condition: Vec<ConditionClause>,
}

impl Precondition {
    /// Parse a precondition mapping
    #[must_use]
    pub fn new(ctx: &ParseContext, definition: &Mapping) -> Self {
        for key in definition.keys() {
            if !["target", "target_relationship", "condition"].contains(&key.as_str()) {
                ctx.collector
                    .append(ToscaError::unknown_field("precondition", key));
            }
        }
        let condition = match definition.get("condition") {
            Some(Value::List(clauses)) => ConditionClause::parse_list(ctx, clauses),
            _ => Vec::new(),
        };
        Self {
            target: definition.get_str("target").map(str::to_string),
            target_relationship: definition
                .get_str("target_relationship")
                .map(str::to_string),
            condition,
        }
    }
}

/// One step of a workflow
#[derive(Debug, Clone)]
pub struct Step {
    /// Step name
    pub name: String,
    /// The node or group the step operates on
    pub target: Option<String>,
    /// A relationship of the target, when given
    pub target_relationship: Option<String>,
    /// Host the operations run on
    pub operation_host: Option<String>,
    /// Condition clauses gating the step
    pub filter: Vec<ConditionClause>,
    /// The step's activities, in order
    pub activities: Vec<Activity>,
    /// Steps triggered on success
    pub on_success: Vec<String>,
    /// Steps triggered on failure
    pub on_failure: Vec<String>,
}

impl Step {
    /// Parse a step definition
    #[must_use]
    pub fn new(ctx: &ParseContext, name: &str, definition: &Mapping) -> Self {
        for key in definition.keys() {
            if !STEP_KEYS.contains(&key.as_str()) {
                ctx.collector
                    .append(ToscaError::unknown_field(format!("step \"{name}\""), key));
            }
        }
        if !definition.contains_key("target") {
            ctx.collector.append(ToscaError::missing_field(
                format!("step \"{name}\""),
                "target",
            ));
        }
        let activities = match definition.get("activities") {
            Some(Value::List(items)) => items
                .iter()
                .filter_map(|item| Activity::new(ctx, item))
                .collect(),
            _ => Vec::new(),
        };
        let names = |key: &str| match definition.get(key) {
            Some(Value::List(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };
        let filter = match definition.get("filter") {
            Some(Value::List(clauses)) => ConditionClause::parse_list(ctx, clauses),
            _ => Vec::new(),
        };
        Self {
            name: name.to_string(),
            target: definition.get_str("target").map(str::to_string),
            target_relationship: definition
                .get_str("target_relationship")
                .map(str::to_string),
            operation_host: definition.get_str("operation_host").map(str::to_string),
            filter,
            activities,
            on_success: names("on_success"),
            on_failure: names("on_failure"),
        }
    }
}

/// A workflow declared in a topology
#[derive(Debug, Clone)]
pub struct Workflow {
    /// Workflow name
    pub name: String,
    /// Workflow description
    pub description: Option<String>,
    /// Workflow metadata
    pub metadata: Option<Mapping>,
    /// Input definitions
    pub inputs: Mapping,
    /// Preconditions gating the workflow
    pub preconditions: Vec<Precondition>,
    /// Steps by name
    pub steps: indexmap::IndexMap<String, Step>,
    /// Output mappings
    pub outputs: Mapping,
}

impl Workflow {
    /// Parse a workflow definition
    #[must_use]
    pub fn new(ctx: &ParseContext, name: &str, definition: &Mapping) -> Self {
        for key in definition.keys() {
            if !WORKFLOW_KEYS.contains(&key.as_str()) {
                ctx.collector.append(ToscaError::unknown_field(
                    format!("workflow \"{name}\""),
                    key,
                ));
            }
        }
        let preconditions = match definition.get("preconditions") {
            Some(Value::List(items)) => items
                .iter()
                .filter_map(Value::as_map)
                .map(|item| Precondition::new(ctx, item))
                .collect(),
            _ => Vec::new(),
        };
        let steps = match definition.get_map("steps") {
            Some(steps) => steps
                .iter()
                .filter_map(|(step_name, step_def)| {
                    step_def
                        .as_map()
                        .map(|step_def| (step_name.clone(), Step::new(ctx, step_name, step_def)))
                })
                .collect(),
            None => indexmap::IndexMap::new(),
        };
        Self {
            name: name.to_string(),
            description: definition.get_str("description").map(str::to_string),
            metadata: definition.get_map("metadata").cloned(),
            inputs: definition.get_map("inputs").cloned().unwrap_or_default(),
            preconditions,
            steps,
            outputs: definition.get_map("outputs").cloned().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfig;

    fn parse_map(yaml: &str) -> Mapping {
        let tree: serde_yaml::Value = serde_yaml::from_str(yaml).expect("valid yaml");
        match Value::from_yaml(&tree, None) {
            Value::Map(map) => map,
            _ => panic!("expected a mapping"),
        }
    }

    #[test]
    fn test_workflow_with_steps_and_activities() {
        let ctx = ParseContext::new(ParserConfig::default());
        let workflow = Workflow::new(
            &ctx,
            "deploy",
            &parse_map(
                "description: bring the stack up\nsteps:\n  install:\n    target: server\n    activities:\n      - set_state: creating\n      - call_operation: Standard.create\n      - set_state: created\n    on_success: [configure]\n  configure:\n    target: server\n    activities:\n      - call_operation:\n          operation: Standard.configure\n          inputs: {mode: fast}\n",
            ),
        );
        assert_eq!(workflow.steps.len(), 2);
        let install = &workflow.steps["install"];
        assert_eq!(install.activities.len(), 3);
        assert_eq!(install.activities[0].kind, ActivityKind::SetState);
        assert_eq!(install.activities[0].target.as_deref(), Some("creating"));
        assert_eq!(install.on_success, vec!["configure"]);
        let configure = &workflow.steps["configure"];
        assert_eq!(configure.activities[0].kind, ActivityKind::CallOperation);
        assert_eq!(
            configure.activities[0].target.as_deref(),
            Some("Standard.configure")
        );
        assert!(configure.activities[0].inputs.is_some());
        assert!(ctx.collector.is_empty(), "{:?}", ctx.collector.report());
    }

    #[test]
    fn test_step_requires_target() {
        let ctx = ParseContext::new(ParserConfig::default());
        Workflow::new(
            &ctx,
            "broken",
            &parse_map("steps:\n  install:\n    activities: [{set_state: started}]\n"),
        );
        assert!(ctx
            .collector
            .report()
            .iter()
            .any(|line| line.contains("target")));
    }

    #[test]
    fn test_unknown_activity_kind() {
        let ctx = ParseContext::new(ParserConfig::default());
        Workflow::new(
            &ctx,
            "broken",
            &parse_map("steps:\n  s:\n    target: n\n    activities: [{do_things: x}]\n"),
        );
        assert!(ctx
            .collector
            .report()
            .iter()
            .any(|line| line.contains("do_things")));
    }

    #[test]
    fn test_condition_clause_evaluation() {
        let ctx = ParseContext::new(ParserConfig::default());
        let clauses = ConditionClause::parse_list(
            &ctx,
            parse_map(
                "wrapper:\n  - or:\n      - state: [{equal: started}]\n      - cpus: [{greater_than: 2}]\n",
            )
            .get_list("wrapper")
            .unwrap(),
        );
        let values = parse_map("state: stopped\ncpus: 4\n");
        assert!(clauses[0].evaluate(&values));
        let values = parse_map("state: stopped\ncpus: 1\n");
        assert!(!clauses[0].evaluate(&values));
    }

    #[test]
    fn test_precondition_parsing() {
        let ctx = ParseContext::new(ParserConfig::default());
        let precondition = Precondition::new(
            &ctx,
            &parse_map("target: server\ncondition:\n  - assert:\n      - state: [{equal: available}]\n"),
        );
        assert_eq!(precondition.target.as_deref(), Some("server"));
        assert_eq!(precondition.condition.len(), 1);
        assert!(ctx.collector.is_empty());
    }
}
