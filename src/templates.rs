//! Built-in starter snippets.
//!
//! Every snippet reads from `dataframes` (input file name -> DataFrame, in
//! load order) and binds its output to `result`.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Template {
    pub name: &'static str,
    pub description: &'static str,
    pub template: &'static str,
}

const DATA_CLEANING: &str = r#"# Basic data cleaning
df = dataframes[list(dataframes.keys())[0]]  # Use first file

# Remove duplicates
df = df.drop_duplicates()

# Fill numeric gaps with the mean, everything else with the mode
for col in df.columns:
    if df[col].dtype in ['int64', 'float64']:
        df[col] = df[col].fillna(df[col].mean())
    else:
        mode = df[col].mode()
        df[col] = df[col].fillna(mode[0] if not mode.empty else 'Unknown')

result = df"#;

const FILTER_ROWS: &str = r#"# Filter rows example
df = dataframes[list(dataframes.keys())[0]]  # Use first file

# Keep rows where column 'age' > 30
if 'age' in df.columns:
    result = df[df['age'] > 30]
else:
    result = df"#;

const GROUP_AGGREGATE: &str = r#"# Group by and aggregate
df = dataframes[list(dataframes.keys())[0]]  # Use first file

# Mean of 'value' per 'category'
if 'category' in df.columns and 'value' in df.columns:
    result = df.groupby('category')['value'].mean().reset_index()
else:
    result = df"#;

const MERGE_DATAFRAMES: &str = r#"# Merge multiple CSV files
files = list(dataframes.keys())
result = dataframes[files[0]]

for file in files[1:]:
    # Join on a shared 'id' column, otherwise stack the rows
    if 'id' in result.columns and 'id' in dataframes[file].columns:
        result = pd.merge(result, dataframes[file], on='id', how='inner')
    else:
        result = pd.concat([result, dataframes[file]], ignore_index=True)"#;

static TEMPLATES: [Template; 4] = [
    Template {
        name: "Basic Data Cleaning",
        description: "Remove duplicates and handle missing values",
        template: DATA_CLEANING,
    },
    Template {
        name: "Filter Rows",
        description: "Filter rows based on conditions",
        template: FILTER_ROWS,
    },
    Template {
        name: "Group By and Aggregate",
        description: "Group data and calculate aggregates",
        template: GROUP_AGGREGATE,
    },
    Template {
        name: "Merge DataFrames",
        description: "Merge multiple CSV files",
        template: MERGE_DATAFRAMES,
    },
];

/// The catalog, in display order.
pub fn list_templates() -> &'static [Template] {
    &TEMPLATES
}

/// Look a template up by its display name.
pub fn find_template(name: &str) -> Option<&'static Template> {
    TEMPLATES.iter().find(|t| t.name == name)
}
