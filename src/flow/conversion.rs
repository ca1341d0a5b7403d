use super::definition::FlowDefinition;
use crate::error::FlowConversionError;

/// A trait for custom flowchart formats that can be converted into a `FlowDefinition`.
///
/// This is the extension point that keeps the structurer format-agnostic: a
/// loader for some editor's native file format only has to map its nodes and
/// connectors onto [`FlowDefinition`].
///
/// # Example
///
/// ```rust
/// use rapflow::error::FlowConversionError;
/// use rapflow::flow::{FlowDefinition, FlowEdgeDefinition, FlowNodeDefinition, IntoFlow};
///
/// struct Step { id: u32, shape: &'static str, label: &'static str }
/// struct Chart { steps: Vec<Step> }
///
/// impl IntoFlow for Chart {
///     fn into_flow(self) -> Result<FlowDefinition, FlowConversionError> {
///         let mut flow = FlowDefinition::default();
///         for pair in self.steps.windows(2) {
///             flow.edges.push(FlowEdgeDefinition::new(
///                 pair[0].id.to_string(),
///                 pair[1].id.to_string(),
///                 "next",
///             ));
///         }
///         for step in self.steps {
///             let mut node = FlowNodeDefinition::new(step.id.to_string(), step.shape);
///             if !step.label.is_empty() {
///                 node = node.with_text(step.label);
///             }
///             flow.nodes.push(node);
///         }
///         Ok(flow)
///     }
/// }
///
/// let chart = Chart {
///     steps: vec![
///         Step { id: 1, shape: "start", label: "" },
///         Step { id: 2, shape: "output", label: "\"hello\"" },
///         Step { id: 3, shape: "end", label: "" },
///     ],
/// };
/// let flow = chart.into_flow().unwrap();
/// assert_eq!(flow.nodes.len(), 3);
/// ```
pub trait IntoFlow {
    /// Consumes the object and converts it into a flow definition.
    fn into_flow(self) -> Result<FlowDefinition, FlowConversionError>;
}

impl IntoFlow for FlowDefinition {
    fn into_flow(self) -> Result<FlowDefinition, FlowConversionError> {
        Ok(self)
    }
}
