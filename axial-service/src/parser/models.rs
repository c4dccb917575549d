// Project Definition Models
// Immutable input types describing axes, matrices, regular variants and tasks

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Root of a project definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProjectDefinition {
    /// Named dimensions of variation
    #[serde(default)]
    pub axes: Vec<AxisDefinition>,

    /// Combinatorial generators over the axes
    #[serde(default)]
    pub matrices: Vec<MatrixDefinition>,

    /// Hand-declared, non-matrix build variants
    #[serde(default, rename = "buildvariants", alias = "build_variants")]
    pub build_variants: Vec<BuildVariantDefinition>,

    /// Optional project-level task catalog
    #[serde(default)]
    pub tasks: Vec<TaskDefinition>,
}

// =============================================================================
// Axes
// =============================================================================

/// A named axis with an ordered list of values
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AxisDefinition {
    #[serde(alias = "id")]
    pub name: String,

    /// Order is significant: it fixes enumeration order in the cross product
    #[serde(default)]
    pub values: Vec<AxisValue>,
}

/// One concrete choice along an axis
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AxisValue {
    pub id: String,

    pub display_name: Option<String>,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    #[serde(default, alias = "variables")]
    pub expansions: BTreeMap<String, String>,

    pub run_on: Option<Vec<String>>,

    /// Partial patch applied to every variant that selects this value
    pub variant: Option<VariantPatch>,
}

impl AxisValue {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_expansion(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.expansions.insert(key.into(), value.into());
        self
    }

    /// Name shown in generated display names
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

/// Variant settings an axis value may override
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VariantPatch {
    pub stepback: Option<bool>,
    pub run_on: Option<Vec<String>>,
    pub batch_time: Option<u32>,
}

// =============================================================================
// Matrices
// =============================================================================

/// A selector key value: one key, or any of several keys
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SelectorValue {
    One(String),
    Any(Vec<String>),
}

impl SelectorValue {
    pub fn keys(&self) -> &[String] {
        match self {
            SelectorValue::One(key) => std::slice::from_ref(key),
            SelectorValue::Any(keys) => keys,
        }
    }
}

impl From<&str> for SelectorValue {
    fn from(key: &str) -> Self {
        SelectorValue::One(key.to_string())
    }
}

/// Partial mapping axis name -> selector key(s)
pub type SelectorMap = BTreeMap<String, SelectorValue>;

/// A named combinatorial generator over a set of axes
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MatrixDefinition {
    #[serde(alias = "matrix_name")]
    pub name: String,

    /// Axis names; axis 0 varies slowest
    #[serde(default)]
    pub axes: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<SelectorMap>,

    /// Tasks every cell starts with, before any rule applies
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,

    #[serde(default)]
    pub rules: Vec<TaskSelectorRule>,

    /// Template with `${axis}` and `${expansion}` placeholders
    pub display_name: Option<String>,

    pub stepback: Option<bool>,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    pub run_on: Option<Vec<String>>,
}

/// Adds and removes tasks on every cell matching `selector`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TaskSelectorRule {
    #[serde(rename = "if", default)]
    pub selector: SelectorMap,

    #[serde(default)]
    pub add_tasks: Vec<TaskSpec>,

    #[serde(default)]
    pub remove_tasks: BTreeSet<String>,
}

// =============================================================================
// Tasks and dependencies
// =============================================================================

/// A task as referenced from a variant, matrix or rule
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "TaskSpecRepr")]
pub struct TaskSpec {
    pub name: String,
    /// Overrides the variant's run-on distros when set
    pub distros: Option<Vec<String>>,
    /// Overrides the catalog's dependencies when set
    pub depends_on: Option<Vec<DependencySelector>>,
}

impl TaskSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            distros: None,
            depends_on: None,
        }
    }

    pub fn with_distros<I, S>(mut self, distros: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.distros = Some(distros.into_iter().map(Into::into).collect());
        self
    }

    pub fn depends_on(mut self, selector: DependencySelector) -> Self {
        self.depends_on.get_or_insert_with(Vec::new).push(selector);
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TaskSpecRepr {
    Name(String),
    Full {
        name: String,
        #[serde(default, alias = "run_on")]
        distros: Option<Vec<String>>,
        #[serde(default)]
        depends_on: Option<Vec<DependencySelector>>,
    },
}

impl From<TaskSpecRepr> for TaskSpec {
    fn from(repr: TaskSpecRepr) -> Self {
        match repr {
            TaskSpecRepr::Name(name) => TaskSpec::new(name),
            TaskSpecRepr::Full {
                name,
                distros,
                depends_on,
            } => TaskSpec {
                name,
                distros,
                depends_on,
            },
        }
    }
}

/// Project-level task declaration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TaskDefinition {
    pub name: String,

    #[serde(default)]
    pub depends_on: Vec<DependencySelector>,

    #[serde(default, alias = "run_on")]
    pub distros: Option<Vec<String>>,
}

/// Task name that selects every task of the target variant(s)
pub const ALL_TASKS: &str = "*";

/// Unresolved reference to one or more (task, variant) pairs
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "DependencySelectorRepr")]
pub struct DependencySelector {
    pub name: String,
    pub variant: VariantSelector,
}

impl DependencySelector {
    /// Same task name in the dependent's own variant
    pub fn same_variant(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variant: VariantSelector::Same,
        }
    }

    pub fn new(name: impl Into<String>, variant: VariantSelector) -> Self {
        Self {
            name: name.into(),
            variant,
        }
    }

    pub fn is_all_tasks(&self) -> bool {
        self.name == ALL_TASKS
    }
}

impl fmt::Display for DependencySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all_tasks() {
            write!(f, "every task in {}", self.variant)
        } else {
            write!(f, "'{}' in {}", self.name, self.variant)
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DependencySelectorRepr {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        variant: VariantSelector,
    },
}

impl From<DependencySelectorRepr> for DependencySelector {
    fn from(repr: DependencySelectorRepr) -> Self {
        match repr {
            DependencySelectorRepr::Name(name) => DependencySelector::same_variant(name),
            DependencySelectorRepr::Full { name, variant } => DependencySelector { name, variant },
        }
    }
}

/// Which variant(s) a dependency points at
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "VariantSelectorRepr")]
pub enum VariantSelector {
    /// The dependent's own variant
    #[default]
    Same,
    /// One concrete variant by name
    Named(String),
    /// Every other variant carrying the tag
    Tagged(String),
    /// Every generated variant
    All,
    /// The variants of one matrix, optionally narrowed by a cell selector
    Matrix { matrix: String, cell: SelectorMap },
}

impl VariantSelector {
    /// `"*"` is every variant, `".tag"` is a tag, anything else a variant name
    pub fn parse(value: &str) -> Self {
        if value == "*" {
            VariantSelector::All
        } else if let Some(tag) = value.strip_prefix('.') {
            VariantSelector::Tagged(tag.to_string())
        } else {
            VariantSelector::Named(value.to_string())
        }
    }
}

impl fmt::Display for VariantSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantSelector::Same => write!(f, "the same variant"),
            VariantSelector::Named(name) => write!(f, "variant '{}'", name),
            VariantSelector::Tagged(tag) => write!(f, "variants tagged '{}'", tag),
            VariantSelector::All => write!(f, "all variants"),
            VariantSelector::Matrix { matrix, cell } if cell.is_empty() => {
                write!(f, "variants of matrix '{}'", matrix)
            }
            VariantSelector::Matrix { matrix, cell } => {
                let keys: Vec<String> = cell
                    .iter()
                    .map(|(axis, value)| format!("{}={}", axis, value.keys().join("|")))
                    .collect();
                write!(f, "variants of matrix '{}' where {}", matrix, keys.join(", "))
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VariantSelectorRepr {
    Name(String),
    Tag {
        tag: String,
    },
    Matrix {
        matrix: String,
        #[serde(default)]
        cell: SelectorMap,
    },
}

impl From<VariantSelectorRepr> for VariantSelector {
    fn from(repr: VariantSelectorRepr) -> Self {
        match repr {
            VariantSelectorRepr::Name(value) => VariantSelector::parse(&value),
            VariantSelectorRepr::Tag { tag } => VariantSelector::Tagged(tag),
            VariantSelectorRepr::Matrix { matrix, cell } => VariantSelector::Matrix { matrix, cell },
        }
    }
}

// =============================================================================
// Regular variants
// =============================================================================

/// A hand-declared variant that bypasses matrix expansion
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BuildVariantDefinition {
    pub name: String,

    pub display_name: Option<String>,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    #[serde(default, alias = "variables")]
    pub expansions: BTreeMap<String, String>,

    #[serde(default)]
    pub run_on: Vec<String>,

    pub stepback: Option<bool>,

    pub batch_time: Option<u32>,

    #[serde(default)]
    pub tasks: Vec<TaskSpec>,
}
