// Variant Materialization
// Turns admissible matrix cells into named build variants

use crate::expansion::matrix::MatrixCell;
use crate::expansion::models::{BuildVariant, CellValue};
use crate::parser::models::{AxisValue, BuildVariantDefinition, MatrixDefinition};

use std::collections::BTreeMap;

/// Materializes the cells of one matrix
pub struct VariantMaterializer<'a> {
    matrix: &'a MatrixDefinition,
}

impl<'a> VariantMaterializer<'a> {
    pub fn new(matrix: &'a MatrixDefinition) -> Self {
        Self { matrix }
    }

    /// Build the variant for one cell. Tasks are left empty for the resolver.
    pub fn materialize(&self, cell: &MatrixCell<'_>) -> BuildVariant {
        let mut expansions = BTreeMap::new();
        let mut tags = self.matrix.tags.clone();
        let mut run_on = self.matrix.run_on.clone().unwrap_or_default();
        let mut stepback = self.matrix.stepback;
        let mut batch_time = None;

        // Axis order: later axes override earlier ones
        for (axis, value) in cell.axes.iter().zip(&cell.values) {
            expansions.insert(axis.clone(), value.id.clone());
            expansions.extend(
                value
                    .expansions
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            );
            tags.extend(value.tags.iter().cloned());

            if let Some(distros) = &value.run_on {
                run_on = distros.clone();
            }
            if let Some(patch) = &value.variant {
                if patch.stepback.is_some() {
                    stepback = patch.stepback;
                }
                if let Some(distros) = &patch.run_on {
                    run_on = distros.clone();
                }
                if patch.batch_time.is_some() {
                    batch_time = patch.batch_time;
                }
            }
        }

        let display_name = match &self.matrix.display_name {
            Some(template) => render_display_name(template, cell, &expansions),
            None => cell
                .values
                .iter()
                .map(|v| v.label())
                .collect::<Vec<_>>()
                .join(" "),
        };

        BuildVariant {
            name: variant_name(&self.matrix.name, cell),
            display_name,
            matrix: Some(self.matrix.name.clone()),
            cell: cell
                .pairs()
                .map(|(axis, value)| CellValue {
                    axis: axis.to_string(),
                    value: value.to_string(),
                })
                .collect(),
            expansions,
            tags,
            run_on,
            batch_time,
            stepback,
            tasks: Vec::new(),
        }
    }
}

/// Deterministic variant name: `<matrix>__<axis>~<id>_<axis>~<id>...`
///
/// `%`, `_` and `~` inside a component are percent-encoded so distinct cells
/// never share a name.
pub fn variant_name(matrix: &str, cell: &MatrixCell<'_>) -> String {
    let parts: Vec<String> = cell
        .pairs()
        .map(|(axis, id)| format!("{}~{}", escape_component(axis), escape_component(id)))
        .collect();
    format!("{}__{}", escape_component(matrix), parts.join("_"))
}

fn escape_component(component: &str) -> String {
    let mut escaped = String::with_capacity(component.len());
    for c in component.chars() {
        match c {
            '%' | '_' | '~' => escaped.push_str(&format!("%{:02X}", c as u32)),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Substitute `${axis}` with the axis value's label and `${key}` with an
/// expansion. Unknown placeholders are kept verbatim.
fn render_display_name(
    template: &str,
    cell: &MatrixCell<'_>,
    expansions: &BTreeMap<String, String>,
) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        rendered.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find('}') else {
            rendered.push_str(&rest[start..]);
            return rendered;
        };

        let key = &after[..end];
        let value = cell
            .value(key)
            .map(AxisValue::label)
            .or_else(|| expansions.get(key).map(String::as_str));
        match value {
            Some(value) => rendered.push_str(value),
            None => rendered.push_str(&rest[start..start + end + 3]),
        }
        rest = &after[end + 1..];
    }

    rendered.push_str(rest);
    rendered
}

/// Copy a hand-declared variant through unchanged; tasks are attached later
pub fn regular_variant(definition: &BuildVariantDefinition) -> BuildVariant {
    BuildVariant {
        name: definition.name.clone(),
        display_name: definition
            .display_name
            .clone()
            .unwrap_or_else(|| definition.name.clone()),
        matrix: None,
        cell: Vec::new(),
        expansions: definition.expansions.clone(),
        tags: definition.tags.clone(),
        run_on: definition.run_on.clone(),
        batch_time: definition.batch_time,
        stepback: definition.stepback,
        tasks: Vec::new(),
    }
}
