//! Rows, sections, and the profile template root.

use std::collections::BTreeSet;
use std::path::Path;

use geo_profile_metadata_models::TableRequest;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::design::Design;
use crate::evaluator::ExpressionEvaluator;
use crate::util::{insert_keyed, make_snake};
use crate::{DesignError, DesignTree, PopulateContext};

/// Release label shown on profiles unless the template sets one.
pub const DEFAULT_RELEASE: &str = "ACS 2021 5-year";

/// A row of charts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub title: Option<String>,
    pub documentation: Option<String>,
    /// Whether the row's top rule is removed.
    #[serde(default)]
    pub grouped: bool,
    #[serde(default)]
    pub designs: Vec<Design>,
}

impl Row {
    fn key(&self, position: usize) -> String {
        self.title
            .as_deref()
            .map_or_else(|| format!("row_{position}"), make_snake)
    }
}

impl DesignTree for Row {
    fn collect_shopping_list(
        &self,
        evaluator: &dyn ExpressionEvaluator,
    ) -> Result<BTreeSet<TableRequest>, DesignError> {
        union(self.designs.iter(), evaluator)
    }

    fn populate(&self, ctx: &PopulateContext<'_>) -> Result<Value, DesignError> {
        let mut designs = Map::new();
        for design in &self.designs {
            insert_keyed(
                &mut designs,
                make_snake(design.title()),
                design.populate(ctx)?,
            );
        }

        Ok(json!({
            "title": self.title,
            "documentation": self.documentation,
            "grouped": self.grouped,
            "designs": designs,
        }))
    }
}

/// A titled group of rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl DesignTree for Section {
    fn collect_shopping_list(
        &self,
        evaluator: &dyn ExpressionEvaluator,
    ) -> Result<BTreeSet<TableRequest>, DesignError> {
        union(self.rows.iter(), evaluator)
    }

    fn populate(&self, ctx: &PopulateContext<'_>) -> Result<Value, DesignError> {
        let mut rows = Map::new();
        for (position, row) in self.rows.iter().enumerate() {
            insert_keyed(&mut rows, row.key(position), row.populate(ctx)?);
        }

        Ok(json!({
            "title": self.title,
            "rows": rows,
        }))
    }
}

fn default_release() -> String {
    DEFAULT_RELEASE.to_string()
}

/// The whole profile design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileTemplate {
    pub title: String,
    #[serde(default = "default_release")]
    pub release: String,
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl ProfileTemplate {
    /// Parses a template from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`DesignError::Toml`] if the text is not a valid template.
    pub fn from_toml(text: &str) -> Result<Self, DesignError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a template file.
    ///
    /// # Errors
    ///
    /// Returns [`DesignError::Io`] if the file cannot be read, or
    /// [`DesignError::Toml`] if it is not a valid template.
    pub fn load(path: &Path) -> Result<Self, DesignError> {
        let text = std::fs::read_to_string(path)?;
        let template = Self::from_toml(&text)?;
        log::debug!(
            "Loaded template {:?} with {} section(s) from {}",
            template.title,
            template.sections.len(),
            path.display()
        );
        Ok(template)
    }
}

impl DesignTree for ProfileTemplate {
    fn collect_shopping_list(
        &self,
        evaluator: &dyn ExpressionEvaluator,
    ) -> Result<BTreeSet<TableRequest>, DesignError> {
        union(self.sections.iter(), evaluator)
    }

    fn populate(&self, ctx: &PopulateContext<'_>) -> Result<Value, DesignError> {
        let mut sections = Map::new();
        for section in &self.sections {
            insert_keyed(
                &mut sections,
                make_snake(&section.title),
                section.populate(ctx)?,
            );
        }

        Ok(json!({
            "geography": ctx.geography.wrap_up(),
            "sections": sections,
            "release": self.release,
        }))
    }
}

fn union<'a, T: DesignTree + 'a>(
    nodes: impl Iterator<Item = &'a T>,
    evaluator: &dyn ExpressionEvaluator,
) -> Result<BTreeSet<TableRequest>, DesignError> {
    let mut requests = BTreeSet::new();
    for node in nodes {
        requests.extend(node.collect_shopping_list(evaluator)?);
    }
    Ok(requests)
}
