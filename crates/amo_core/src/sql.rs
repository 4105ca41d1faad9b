use std::fmt;

/// Tables of the AMO database the query builder can alias and join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Files,
    Versions,
    Addons,
    AddonsUsers,
    Users,
}

impl Table {
    const ALL: [Table; 5] = [
        Table::Files,
        Table::Versions,
        Table::Addons,
        Table::AddonsUsers,
        Table::Users,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Table::Files => "files",
            Table::Versions => "versions",
            Table::Addons => "addons",
            Table::AddonsUsers => "addons_users",
            Table::Users => "users",
        }
    }

    pub fn alias(self) -> &'static str {
        match self {
            Table::Files => "f",
            Table::Versions => "v",
            Table::Addons => "a",
            Table::AddonsUsers => "au",
            Table::Users => "u",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Foreign key between two directly related tables, in either order.
fn relation(left: Table, right: Table) -> Option<&'static str> {
    use Table::*;
    match (left, right) {
        (Files, Versions) | (Versions, Files) => Some("v.id = f.version_id"),
        (Versions, Addons) | (Addons, Versions) => Some("a.id = v.addon_id"),
        (AddonsUsers, Addons) | (Addons, AddonsUsers) => Some("a.id = au.addon_id"),
        (AddonsUsers, Users) | (Users, AddonsUsers) => Some("u.id = au.user_id"),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SqlError {
    #[error("no known relation joins {to} to the query")]
    NoJoinPath { to: Table },
    #[error("{column} expects numeric ids, got {value:?}")]
    NonNumericId { column: &'static str, value: String },
    #[error("no ids given")]
    EmptyIdList,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Join {
    table: Table,
    on: String,
}

/// Incremental `SELECT` builder for read-only reporting queries.
///
/// Tables are always referenced through their fixed alias, so conditions
/// and fields are written as `a.guid`, `au.user_id` and so on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlBuilder {
    from: Table,
    fields: Vec<String>,
    joins: Vec<Join>,
    conditions: Vec<String>,
    group_by: Vec<String>,
    order_by: Vec<String>,
}

impl SqlBuilder {
    pub fn from(table: Table) -> Self {
        Self {
            from: table,
            fields: Vec::new(),
            joins: Vec::new(),
            conditions: Vec::new(),
            group_by: Vec::new(),
            order_by: Vec::new(),
        }
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Left joins `table` through its known relation to a table already in
    /// the query, adding one intermediate table when there is no direct one.
    /// Joining a table that is already present does nothing.
    pub fn join(self, table: Table) -> Result<Self, SqlError> {
        if self.contains(table) {
            return Ok(self);
        }
        if let Some(on) = self.direct_relation(table) {
            return Ok(self.join_on(table, on));
        }
        for via in Table::ALL {
            if self.contains(via) {
                continue;
            }
            if let (Some(first), Some(second)) = (self.direct_relation(via), relation(via, table)) {
                return Ok(self.join_on(via, first).join_on(table, second));
            }
        }
        Err(SqlError::NoJoinPath { to: table })
    }

    pub fn join_on(mut self, table: Table, on: impl Into<String>) -> Self {
        self.joins.push(Join {
            table,
            on: on.into(),
        });
        self
    }

    pub fn and_where(mut self, condition: impl Into<String>) -> Self {
        self.conditions.push(condition.into());
        self
    }

    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        self.group_by.push(field.into());
        self
    }

    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by.push(field.into());
        self
    }

    pub fn build(&self) -> String {
        self.to_string()
    }

    fn contains(&self, table: Table) -> bool {
        self.from == table || self.joins.iter().any(|join| join.table == table)
    }

    fn direct_relation(&self, table: Table) -> Option<&'static str> {
        std::iter::once(self.from)
            .chain(self.joins.iter().map(|join| join.table))
            .find_map(|present| relation(present, table))
    }
}

impl fmt::Display for SqlBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fields.is_empty() {
            write!(f, "SELECT *")?;
        } else {
            write!(f, "SELECT {}", self.fields.join(", "))?;
        }
        write!(f, "\nFROM {} {}", self.from.name(), self.from.alias())?;
        for join in &self.joins {
            write!(
                f,
                "\nLEFT JOIN {} {} ON ({})",
                join.table.name(),
                join.table.alias(),
                join.on
            )?;
        }
        if !self.conditions.is_empty() {
            write!(f, "\nWHERE {}", self.conditions.join("\n  AND "))?;
        }
        if !self.group_by.is_empty() {
            write!(f, "\nGROUP BY {}", self.group_by.join(", "))?;
        }
        if !self.order_by.is_empty() {
            write!(f, "\nORDER BY {}", self.order_by.join(", "))?;
        }
        Ok(())
    }
}

/// Single-quoted SQL string literal.
pub fn quote_literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        match ch {
            '\'' => quoted.push_str("''"),
            '\\' => quoted.push_str("\\\\"),
            _ => quoted.push(ch),
        }
    }
    quoted.push('\'');
    quoted
}
