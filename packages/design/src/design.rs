//! Chart designs.
//!
//! [`Design`] is a closed set of chart kinds. Every kind reads its tables
//! from its data points and populates to the JSON shape the profile page's
//! chart scripts expect.

use std::collections::BTreeSet;

use geo_profile_metadata_models::{ComparisonType, DataParadigm, TableMetadata, TableRequest};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::data_point::{DataPoint, populate_year};
use crate::evaluator::ExpressionEvaluator;
use crate::util::{insert_keyed, make_snake};
use crate::{DesignError, DesignTree, PopulateContext};

/// Share of a row a chart takes up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnWidth {
    Quarter,
    Third,
    Half,
    TwoThirds,
    ThreeQuarters,
    #[default]
    Full,
}

impl ColumnWidth {
    /// Width as a fraction of the row.
    #[must_use]
    pub const fn fraction(self) -> f64 {
        match self {
            Self::Quarter => 1.0 / 4.0,
            Self::Third => 1.0 / 3.0,
            Self::Half => 1.0 / 2.0,
            Self::TwoThirds => 2.0 / 3.0,
            Self::ThreeQuarters => 3.0 / 4.0,
            Self::Full => 1.0,
        }
    }

    /// CSS class, e.g. `"column-two-thirds"`.
    #[must_use]
    pub const fn hyphenated_name(self) -> &'static str {
        match self {
            Self::Quarter => "column-quarter",
            Self::Third => "column-third",
            Self::Half => "column-half",
            Self::TwoThirds => "column-two-thirds",
            Self::ThreeQuarters => "column-three-quarters",
            Self::Full => "column-full",
        }
    }
}

/// How a single statistic is formatted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatType {
    Number,
    Percentage,
    Dollar,
    #[default]
    Count,
}

impl StatType {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::Percentage => "percentage",
            Self::Dollar => "dollar",
            Self::Count => "count",
        }
    }
}

const fn default_true() -> bool {
    true
}

/// Fields every design has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignCommon {
    pub title: String,
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub width: ColumnWidth,
    #[serde(default)]
    pub comparison_type: ComparisonType,
    #[serde(default = "default_paradigm")]
    pub paradigm: DataParadigm,
    #[serde(default = "default_true")]
    pub compare_geographies: bool,
}

const fn default_paradigm() -> DataParadigm {
    DataParadigm::Cr
}

impl DesignCommon {
    fn requests<'a>(
        &self,
        points: impl IntoIterator<Item = &'a DataPoint>,
        evaluator: &dyn ExpressionEvaluator,
    ) -> Result<BTreeSet<TableRequest>, DesignError> {
        let mut requests = BTreeSet::new();
        for point in points {
            for table in point.shopping_list(evaluator)? {
                requests.insert(TableRequest::new(
                    table,
                    self.comparison_type,
                    self.paradigm,
                ));
            }
        }
        Ok(requests)
    }

    fn first_metadata(
        &self,
        first: Option<&DataPoint>,
        ctx: &PopulateContext<'_>,
    ) -> Result<TableMetadata, DesignError> {
        first
            .ok_or_else(|| DesignError::EmptyDesign {
                design: self.title.clone(),
            })?
            .table_metadata(ctx)
    }

    fn chart_metadata(
        &self,
        name: String,
        chart_type: &str,
        metadata: &TableMetadata,
        ctx: &PopulateContext<'_>,
    ) -> Result<Value, DesignError> {
        let year = populate_year(metadata, ctx.timeframe)?;
        Ok(json!({
            "name": name,
            "chart_type": chart_type,
            "column_width": self.width.hyphenated_name(),
            "table_id": metadata.table_name,
            "universe": metadata.universe,
            "acs_release": year,
            "year": year,
        }))
    }
}

/// A vertical bar chart, one bar per data point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnChart {
    #[serde(flatten)]
    pub common: DesignCommon,
    pub columns: Vec<DataPoint>,
}

impl ColumnChart {
    fn evaluate_columns(
        &self,
        ctx: &PopulateContext<'_>,
        out: &mut Map<String, Value>,
    ) -> Result<(), DesignError> {
        for column in &self.columns {
            insert_keyed(
                out,
                make_snake(&column.display_name),
                column.evaluate(ctx)?,
            );
        }
        Ok(())
    }

    /// The reduced form used inside a grouped chart.
    fn sub_populate(&self, ctx: &PopulateContext<'_>) -> Result<Value, DesignError> {
        let mut out = Map::new();
        out.insert("name".to_string(), json!(self.common.title));
        self.evaluate_columns(ctx, &mut out)?;
        out.insert("metadata".to_string(), json!({ "name": self.common.title }));
        Ok(Value::Object(out))
    }
}

/// A single statistic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleStat {
    #[serde(flatten)]
    pub common: DesignCommon,
    pub stat: DataPoint,
    #[serde(default)]
    pub stat_type: StatType,
}

/// Several column charts side by side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupedColumnChart {
    #[serde(flatten)]
    pub common: DesignCommon,
    pub sub_charts: Vec<ColumnChart>,
}

/// A pie chart, one slice per data point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoughnutChart {
    #[serde(flatten)]
    pub common: DesignCommon,
    pub slices: Vec<DataPoint>,
}

/// A chart on a profile page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Design {
    SingleStat(SingleStat),
    ColumnChart(ColumnChart),
    GroupedColumnChart(GroupedColumnChart),
    DoughnutChart(DoughnutChart),
}

impl Design {
    #[must_use]
    pub const fn common(&self) -> &DesignCommon {
        match self {
            Self::SingleStat(SingleStat { common, .. })
            | Self::ColumnChart(ColumnChart { common, .. })
            | Self::GroupedColumnChart(GroupedColumnChart { common, .. })
            | Self::DoughnutChart(DoughnutChart { common, .. }) => common,
        }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.common().title
    }
}

impl DesignTree for Design {
    fn collect_shopping_list(
        &self,
        evaluator: &dyn ExpressionEvaluator,
    ) -> Result<BTreeSet<TableRequest>, DesignError> {
        match self {
            Self::SingleStat(SingleStat { common, stat, .. }) => common.requests([stat], evaluator),
            Self::ColumnChart(chart) => chart.common.requests(&chart.columns, evaluator),
            Self::DoughnutChart(DoughnutChart { common, slices }) => common.requests(slices, evaluator),
            Self::GroupedColumnChart(GroupedColumnChart { sub_charts, .. }) => {
                let mut requests = BTreeSet::new();
                for chart in sub_charts {
                    requests.extend(chart.common.requests(&chart.columns, evaluator)?);
                }
                Ok(requests)
            }
        }
    }

    fn populate(&self, ctx: &PopulateContext<'_>) -> Result<Value, DesignError> {
        match self {
            Self::SingleStat(SingleStat {
                common,
                stat,
                stat_type,
            }) => {
                let table = common.first_metadata(Some(stat), ctx)?;

                let mut metadata = Map::new();
                metadata.insert("chart_type".to_string(), json!("stat_list"));
                metadata.insert("stat_type".to_string(), json!(stat_type.label()));
                if let Value::Object(fields) = table.to_json(ctx.timeframe) {
                    metadata.extend(fields);
                }
                metadata.insert(
                    "column_width".to_string(),
                    json!(common.width.hyphenated_name()),
                );
                let metadata = Value::Object(metadata);

                let mut evaluated = stat.evaluate(ctx)?;
                if let Value::Object(fields) = &mut evaluated {
                    fields.insert("metadata".to_string(), metadata.clone());
                }

                Ok(json!({ "stat": evaluated, "metadata": metadata }))
            }
            Self::ColumnChart(chart) => {
                let common = &chart.common;
                let table = common.first_metadata(chart.columns.first(), ctx)?;
                let year = populate_year(&table, ctx.timeframe)?;

                let mut out = Map::new();
                out.insert("name".to_string(), json!(common.title));
                chart.evaluate_columns(ctx, &mut out)?;
                out.insert(
                    "metadata".to_string(),
                    common.chart_metadata(
                        format!("{} ({year})", common.title),
                        "chart-column",
                        &table,
                        ctx,
                    )?,
                );
                Ok(Value::Object(out))
            }
            Self::DoughnutChart(DoughnutChart { common, slices }) => {
                let table = common.first_metadata(slices.first(), ctx)?;
                let year = populate_year(&table, ctx.timeframe)?;
                let name = format!("{} ({year})", common.title);

                let mut out = Map::new();
                out.insert("name".to_string(), json!(name));
                out.insert(
                    "metadata".to_string(),
                    common.chart_metadata(name, "chart-pie", &table, ctx)?,
                );
                for slice in slices {
                    insert_keyed(
                        &mut out,
                        make_snake(&slice.display_name),
                        slice.evaluate(ctx)?,
                    );
                }
                Ok(Value::Object(out))
            }
            Self::GroupedColumnChart(GroupedColumnChart { common, sub_charts }) => {
                let first = sub_charts.first().and_then(|chart| chart.columns.first());
                let table = common.first_metadata(first, ctx)?;

                let mut out = Map::new();
                out.insert("name".to_string(), json!(common.title));
                out.insert(
                    "metadata".to_string(),
                    common.chart_metadata(
                        common.title.clone(),
                        "chart-grouped_column",
                        &table,
                        ctx,
                    )?,
                );
                for chart in sub_charts {
                    insert_keyed(
                        &mut out,
                        make_snake(&chart.common.title),
                        chart.sub_populate(ctx)?,
                    );
                }
                Ok(Value::Object(out))
            }
        }
    }
}
