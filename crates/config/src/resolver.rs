//! Config resolver
//!
//! Turns an ordered list of operator entries into built, wired
//! operators in topological order:
//!
//! 1. plugin entries render into sub-pipelines and splice in place,
//!    recursively, namespaced by their instance id,
//! 2. ids default to the type; outputs default to the next entry,
//! 3. builders validate parameters and build operators,
//! 4. outputs are resolved against the built set,
//! 5. the graph is checked (duplicates, unknown targets, self-loops,
//!    cycles) and sorted topologically.
//!
//! Output defaulting runs back-to-front so an entry can point at the
//! first operator of whatever follows it, including the first operator
//! of a plugin expansion.

use std::sync::Arc;

use stave_operator::{BuildContext, Operator, OperatorBuilder, OperatorRegistry};
use stave_pipeline::topological_order;

use crate::error::{ConfigError, Result};
use crate::model::OperatorConfig;
use crate::plugin::PluginRegistry;

#[cfg(test)]
#[path = "resolver_test.rs"]
mod tests;

/// How deep plugin expansions may nest
const MAX_PLUGIN_DEPTH: usize = 10;

/// Resolve a pipeline configuration into wired operators
///
/// The returned operators are in topological order (sources first),
/// ready for the pipeline scheduler.
pub fn resolve_pipeline(
    entries: &[OperatorConfig],
    registry: &OperatorRegistry,
    plugins: &PluginRegistry,
    context: &BuildContext,
) -> Result<Vec<Arc<dyn Operator>>> {
    let builders = expand(entries, registry, plugins, 0, None)?;

    // Build every operator.
    let mut operators: Vec<Arc<dyn Operator>> = Vec::with_capacity(builders.len());
    for builder in &builders {
        operators.extend(builder.build(context)?);
    }

    // Wire outputs against the built set.
    for operator in &operators {
        if operator.can_output() {
            operator.set_outputs(&operators)?;
        }
    }

    // Validate the graph and order it sources-first.
    let nodes: Vec<(String, Vec<String>)> = operators
        .iter()
        .map(|op| {
            let outputs = op.outputs().iter().map(|o| o.id()).collect();
            (op.id(), outputs)
        })
        .collect();
    let order = topological_order(&nodes)?;

    Ok(order.into_iter().map(|i| operators[i].clone()).collect())
}

/// Expand entries into builders, splicing plugin renders in place
///
/// Entries are processed back-to-front so that the "output defaults to
/// the next operator" rule can use the first operator id of an already
/// expanded successor. `seed_next` is the default target for the final
/// entry: `None` at the top level (a terminal outputter must name its
/// output), the caller's downstream inside a plugin expansion.
fn expand(
    entries: &[OperatorConfig],
    registry: &OperatorRegistry,
    plugins: &PluginRegistry,
    depth: usize,
    seed_next: Option<String>,
) -> Result<Vec<Box<dyn OperatorBuilder>>> {
    let mut expanded: Vec<Vec<Box<dyn OperatorBuilder>>> = Vec::new();
    expanded.resize_with(entries.len(), Vec::new);

    // The id of the first operator of the entry after the current one.
    let mut next_id: Option<String> = seed_next;

    for (index, entry) in entries.iter().enumerate().rev() {
        let type_name = entry.operator_type(index)?;

        let builders = if registry.contains(&type_name) {
            let mut builder = registry.deserialize(&type_name, entry.raw().clone())?;
            if builder.can_output() && builder.output_ids().is_empty() {
                match &next_id {
                    Some(id) => builder.set_default_output(id.clone()),
                    None => return Err(ConfigError::MissingOutput(builder.id())),
                }
            }
            vec![builder]
        } else if plugins.contains(&type_name) {
            if depth >= MAX_PLUGIN_DEPTH {
                return Err(ConfigError::NestingTooDeep(type_name));
            }
            expand_plugin(entry, &type_name, registry, plugins, depth, &next_id)?
        } else {
            return Err(ConfigError::UnknownType(type_name));
        };

        if let Some(first) = builders.first() {
            next_id = Some(first.id());
        }
        expanded[index] = builders;
    }

    Ok(expanded.into_iter().flatten().collect())
}

/// Render one plugin entry and namespace its expansion
fn expand_plugin(
    entry: &OperatorConfig,
    type_name: &str,
    registry: &OperatorRegistry,
    plugins: &PluginRegistry,
    depth: usize,
    next_id: &Option<String>,
) -> Result<Vec<Box<dyn OperatorBuilder>>> {
    let instance_id = entry.id().unwrap_or_else(|| type_name.to_owned());

    // The caller-facing outputs: configured explicitly, or the operator
    // that follows this entry. They double as the template's `output`
    // parameter and as the namespacing exclusion list.
    let mut external_outputs = entry.output_ids();
    let mut params = entry.plugin_params();
    if external_outputs.is_empty() {
        if let Some(id) = next_id {
            external_outputs.push(id.clone());
            params.insert(
                serde_yaml::Value::String("output".to_owned()),
                serde_yaml::Value::String(id.clone()),
            );
        }
    }

    let rendered = plugins.render(type_name, &params)?;
    tracing::debug!(
        plugin = type_name,
        instance = %instance_id,
        operators = rendered.pipeline.len(),
        "rendered plugin template"
    );

    let mut builders = expand(
        &rendered.pipeline,
        registry,
        plugins,
        depth + 1,
        external_outputs.first().cloned(),
    )?;
    for builder in &mut builders {
        builder.set_namespace(&instance_id, &external_outputs);
    }
    Ok(builders)
}
