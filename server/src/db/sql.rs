use std::fmt::Display;

use portal_misc::api::Query;

/// Bind value for the SQL builders below.
#[derive(Debug, Clone)]
pub enum Value {
    Text(String),
    Integer(u64),
    Bool(bool),
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Text(text) => write!(f, "{text}"),
            Value::Integer(integer) => write!(f, "{integer}"),
            Value::Bool(boolean) => write!(f, "{boolean}"),
        }
    }
}

pub struct Select {
    fields: Vec<&'static str>,
    table: &'static str,

    wheres: Vec<String>,

    limit: bool,
    offset: bool,

    order_by: Vec<&'static str>,

    values: Vec<Value>,

    count: bool,
}

impl Select {
    pub fn new(fields: Vec<&'static str>, table: &'static str) -> Self {
        Self {
            fields,
            table,
            wheres: Vec::new(),
            limit: false,
            offset: false,
            order_by: Vec::new(),
            values: Vec::new(),
            count: false,
        }
    }

    pub fn count(table: &'static str) -> Self {
        Self {
            fields: vec!["COUNT(1)"],
            table,
            wheres: Vec::new(),
            limit: false,
            offset: false,
            order_by: Vec::new(),
            values: Vec::new(),
            count: true,
        }
    }

    pub fn add_order_by(&mut self, s: &'static str) {
        if self.count {
            return;
        }
        self.order_by.push(s);
    }

    pub fn add_where(&mut self, s: impl ToString, value: Value) {
        self.wheres.push(s.to_string());
        self.values.push(value);
    }

    /// Applies a list query: a LIKE filter over the given field plus
    /// pagination. The count variant skips pagination.
    pub fn set_query(&mut self, query: Query, search_field: &str) {
        if let Some(search) = query.search {
            let search = format!("%{search}%");
            self.add_where(format!("{search_field} LIKE ?"), Value::Text(search));
        }

        if self.count {
            return;
        }

        self.limit = true;
        self.values.push(Value::Integer(query.page_size));
        let offset = (query.page - 1) * query.page_size;
        if offset > 0 {
            self.offset = true;
            self.values.push(Value::Integer(offset));
        }
    }

    pub fn build(self) -> (String, Vec<Value>) {
        let mut sql = format!("SELECT {} FROM {}", self.fields.join(", "), self.table);

        if !self.wheres.is_empty() {
            let where_clause = self.wheres.join(" AND ");
            sql.push_str(&format!(" WHERE {}", where_clause));
        }

        if !self.order_by.is_empty() {
            let order_by = self.order_by.join(", ");
            sql.push_str(&format!(" ORDER BY {}", order_by));
        }

        if self.limit {
            sql.push_str(" LIMIT ?");
            if self.offset {
                sql.push_str(" OFFSET ?");
            }
        }

        (sql, self.values)
    }
}

pub struct Update {
    table: &'static str,

    fields: Vec<&'static str>,
    wheres: Vec<String>,
    values: Vec<Value>,
}

impl Update {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            fields: Vec::new(),
            wheres: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn add_field(&mut self, field: &'static str, value: Value) {
        self.fields.push(field);
        self.values.push(value);
    }

    pub fn add_where(&mut self, s: impl ToString, value: Value) {
        self.wheres.push(s.to_string());
        self.values.push(value);
    }

    pub fn build(self) -> (String, Vec<Value>) {
        if self.fields.is_empty() {
            return (String::new(), Vec::new());
        }
        let mut sql = format!("UPDATE {} SET ", self.table);
        let set = self
            .fields
            .iter()
            .map(|f| format!("{} = ?", f))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&set);

        if !self.wheres.is_empty() {
            let where_clause = self.wheres.join(" AND ");
            sql.push_str(&format!(" WHERE {}", where_clause));
        }

        (sql, self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_build() {
        let mut select = Select::new(vec!["id", "name"], "role");
        select.add_where("code = ?", Value::Text("QA".to_string()));
        select.add_order_by("create_time DESC");
        select.set_query(
            Query {
                page: 2,
                page_size: 10,
                search: Some("qa".to_string()),
                ..Default::default()
            },
            "name",
        );

        let (sql, values) = select.build();
        assert_eq!(
            sql,
            "SELECT id, name FROM role WHERE code = ? AND name LIKE ? \
             ORDER BY create_time DESC LIMIT ? OFFSET ?"
        );
        assert_eq!(values.len(), 4);
    }

    #[test]
    fn test_update_build() {
        let mut update = Update::new("role");
        update.add_field("name", Value::Text("QA team".to_string()));
        update.add_field("update_time", Value::Integer(100));
        update.add_where("id = ?", Value::Text("role-1".to_string()));

        let (sql, values) = update.build();
        assert_eq!(sql, "UPDATE role SET name = ?, update_time = ? WHERE id = ?");
        assert_eq!(values.len(), 3);

        let update = Update::new("role");
        let (sql, values) = update.build();
        assert!(sql.is_empty());
        assert!(values.is_empty());
    }
}
