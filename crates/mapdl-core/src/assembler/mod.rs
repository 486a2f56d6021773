//! Turns declared case values into the engine commands of one run.

mod quantities;

pub use quantities::{
    GLOBAL_GROUP, GLOBAL_QUANTITIES, QuantitySpec, quantities_for, value_name,
};

use crate::components::{ComponentCatalog, GroupKind};
use crate::domain::CommandSequence;
use crate::support::text::format_engine_number;
use crate::units::{Quantity, UnitSystem, convert_to_system};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Values the caller set for one case, by `<group>_<quantity>` name.
///
/// Model-wide quantities compare against a baseline (the model's initial
/// value); everything else compares against zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeclaredValues {
    #[serde(default)]
    values: BTreeMap<String, Quantity>,
    #[serde(default)]
    baselines: BTreeMap<String, f64>,
}

impl DeclaredValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, quantity: impl Into<Quantity>) {
        self.values.insert(name.into(), quantity.into());
    }

    pub fn with(mut self, name: impl Into<String>, quantity: impl Into<Quantity>) -> Self {
        self.set(name, quantity);
        self
    }

    pub fn set_baseline(&mut self, name: impl Into<String>, baseline: f64) {
        self.baselines.insert(name.into(), baseline);
    }

    pub fn get(&self, name: &str) -> Option<&Quantity> {
        self.values.get(name)
    }

    pub fn baseline(&self, name: &str) -> f64 {
        self.baselines.get(name).copied().unwrap_or(0.0)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Prescribed displacement of a single node, in engine length units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeDeflection {
    pub node: i64,
    #[serde(default)]
    pub ux: f64,
    #[serde(default)]
    pub uy: f64,
    #[serde(default)]
    pub uz: f64,
}

impl NodeDeflection {
    fn components(&self) -> [(&'static str, f64); 3] {
        [("UX", self.ux), ("UY", self.uy), ("UZ", self.uz)]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLine {
    Comment(String),
    Command(String),
}

/// Lines of a case's input file. Comments document the file; only commands
/// form the cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledInput {
    lines: Vec<InputLine>,
}

impl AssembledInput {
    pub fn lines(&self) -> &[InputLine] {
        &self.lines
    }

    pub fn commands(&self) -> CommandSequence {
        self.lines
            .iter()
            .filter_map(|line| match line {
                InputLine::Command(command) => Some(command.clone()),
                InputLine::Comment(_) => None,
            })
            .collect()
    }

    pub fn file_lines(&self) -> Vec<String> {
        self.lines
            .iter()
            .map(|line| match line {
                InputLine::Comment(text) => format!("! {}", text),
                InputLine::Command(command) => command.clone(),
            })
            .collect()
    }

    fn push(&mut self, comment: String, command: String) {
        self.lines.push(InputLine::Comment(comment));
        self.lines.push(InputLine::Command(command));
    }
}

/// Builds the input of one instance from its component catalog.
#[derive(Debug, Clone)]
pub struct InputAssembler<'a> {
    instance: &'a str,
    catalog: &'a ComponentCatalog,
    unit_system: Option<UnitSystem>,
}

impl<'a> InputAssembler<'a> {
    pub fn new(instance: &'a str, catalog: &'a ComponentCatalog) -> Self {
        let unit_system = catalog.unit_system();
        if unit_system.is_none() {
            warn!(
                instance,
                units = catalog.units,
                "unknown unit system code, values pass through unconverted"
            );
        }
        Self {
            instance,
            catalog,
            unit_system,
        }
    }

    pub fn with_unit_system(mut self, unit_system: UnitSystem) -> Self {
        self.unit_system = Some(unit_system);
        self
    }

    /// Every declared value that differs from its baseline becomes a comment
    /// and a command, visiting groups by kind, then globals, then node
    /// deflections. Pass-through lines go last, unchanged.
    pub fn build(
        &self,
        values: &DeclaredValues,
        deflections: &[NodeDeflection],
        pass_through: &[String],
    ) -> AssembledInput {
        let mut input = AssembledInput::default();

        for kind in GroupKind::ALL {
            for group in self.catalog.groups_of(kind) {
                for spec in quantities_for(kind) {
                    self.append_quantity(&mut input, values, &group.name, spec);
                }
            }
        }
        for spec in &GLOBAL_QUANTITIES {
            self.append_quantity(&mut input, values, GLOBAL_GROUP, spec);
        }
        for deflection in deflections {
            for (label, value) in deflection.components() {
                if value != 0.0 {
                    let rendered = format_engine_number(value);
                    input.push(
                        format!("node {} deflection {} = {}", deflection.node, label, rendered),
                        format!("D,{},{},{}", deflection.node, label, rendered),
                    );
                }
            }
        }
        for line in pass_through {
            input.lines.push(InputLine::Command(line.clone()));
        }

        self.warn_unmatched(values);
        debug!(
            instance = self.instance,
            commands = input.commands().len(),
            "input assembled"
        );
        input
    }

    fn append_quantity(
        &self,
        input: &mut AssembledInput,
        values: &DeclaredValues,
        group: &str,
        spec: &QuantitySpec,
    ) {
        let name = value_name(group, spec);
        let Some(quantity) = values.get(&name) else {
            return;
        };
        if quantity.value == values.baseline(&name) {
            return;
        }
        let converted = self.convert(&name, quantity, spec);
        let rendered = format_engine_number(converted);
        let comment = match self
            .unit_system
            .as_ref()
            .and_then(|system| system.unit_for(spec.category))
        {
            Some(unit) => format!("{} = {} [{}]", name, rendered, unit),
            None => format!("{} = {}", name, rendered),
        };
        input.push(comment, spec.render(group, &rendered));
    }

    fn convert(&self, name: &str, quantity: &Quantity, spec: &QuantitySpec) -> f64 {
        if quantity.unit.is_none() {
            return quantity.value;
        }
        let Some(system) = &self.unit_system else {
            return quantity.value;
        };
        match convert_to_system(quantity, spec.category, system) {
            Ok(value) => value,
            Err(error) => {
                warn!(
                    instance = self.instance,
                    value = name,
                    %error,
                    "unit conversion failed, value passes through unconverted"
                );
                quantity.value
            }
        }
    }

    fn warn_unmatched(&self, values: &DeclaredValues) {
        for name in values.names() {
            let known = GroupKind::ALL.iter().any(|kind| {
                self.catalog.groups_of(*kind).any(|group| {
                    quantities_for(*kind)
                        .iter()
                        .any(|spec| value_name(&group.name, spec) == name)
                })
            }) || GLOBAL_QUANTITIES
                .iter()
                .any(|spec| value_name(GLOBAL_GROUP, spec) == name);
            if !known {
                warn!(instance = self.instance, value = name, "declared value matches no quantity");
            }
        }
    }
}
