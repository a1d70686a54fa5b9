use serde_json::Value;
use std::fmt;

/// One item of a select list.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// Every column of the relation (`*`).
    All,
    Column(String),
    /// A related row, embedded under the related relation's name.
    Embed { relation: String, selection: Selection },
}

/// Columns and nested relations to return, e.g. `*,companies(id,name)`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Selection {
    fields: Vec<Field>,
}

impl Selection {
    pub fn all() -> Self {
        Self {
            fields: vec![Field::All],
        }
    }

    pub fn columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: columns.into_iter().map(|c| Field::Column(c.into())).collect(),
        }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.fields.push(Field::Column(column.into()));
        self
    }

    pub fn embed(mut self, relation: impl Into<String>, selection: Selection) -> Self {
        self.fields.push(Field::Embed {
            relation: relation.into(),
            selection,
        });
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fields.is_empty() {
            return f.write_str("*");
        }
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match field {
                Field::All => f.write_str("*")?,
                Field::Column(name) => f.write_str(name)?,
                Field::Embed { relation, selection } => write!(f, "{}({})", relation, selection)?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = if self.ascending { "asc" } else { "desc" };
        write!(f, "{}.{}", self.column, direction)
    }
}

/// `column = value`.
#[derive(Debug, Clone, PartialEq)]
pub struct EqFilter {
    pub column: String,
    pub value: Value,
}

impl EqFilter {
    pub fn matches(&self, row: &serde_json::Map<String, Value>) -> bool {
        row.get(&self.column) == Some(&self.value)
    }
}

/// Read of one relation: selection, ordering and an optional equality filter.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectRequest {
    pub relation: String,
    pub selection: Selection,
    pub order: Option<Order>,
    pub filter: Option<EqFilter>,
}

impl SelectRequest {
    pub fn from_relation(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            selection: Selection::all(),
            order: None,
            filter: None,
        }
    }

    pub fn select(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    pub fn filter_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter = Some(EqFilter {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    /// PostgREST query string parameters for this request.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), self.selection.to_string())];
        if let Some(filter) = &self.filter {
            let value = match &filter.value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            pairs.push((filter.column.clone(), format!("eq.{}", value)));
        }
        if let Some(order) = &self.order {
            pairs.push(("order".to_string(), order.to_string()));
        }
        pairs
    }
}
