// Static table and edge descriptors. Values are built once as consts and shared by reference.

/// Relation cardinality as seen from the edge owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rel {
    /// Many owners point at one target; the owner table holds the foreign key
    M2O,
    /// One owner has many targets; the target table holds the foreign key
    O2M,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub column: &'static str,
    pub nullable: bool,
}

/// Metadata for one entity table
#[derive(Debug)]
pub struct TableSchema {
    pub label: &'static str,
    pub table: &'static str,
    pub id_column: &'static str,
    /// Every declared column, primary key first
    pub columns: &'static [&'static str],
    /// Declared columns except the primary key
    pub fields: &'static [FieldSpec],
    pub edges: &'static [&'static EdgeSpec],
}

impl TableSchema {
    pub fn valid_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| *c == column)
    }

    pub fn field(&self, column: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.column == column)
    }

    pub fn edge(&self, name: &str) -> Option<&'static EdgeSpec> {
        self.edges.iter().copied().find(|e| e.name == name)
    }

    /// The required many-to-one edge stored in `column`, if any
    pub fn edge_for_column(&self, column: &str) -> Option<&'static EdgeSpec> {
        self.edges
            .iter()
            .copied()
            .find(|e| e.rel == Rel::M2O && e.column == column)
    }
}

/// Foreign-key backed association between two entity tables
#[derive(Debug)]
pub struct EdgeSpec {
    pub name: &'static str,
    pub rel: Rel,
    /// Label of the entity declaring the edge
    pub owner: &'static str,
    pub owner_table: &'static str,
    pub owner_id: &'static str,
    /// Label of the entity on the other end
    pub target: &'static str,
    pub target_table: &'static str,
    pub target_id: &'static str,
    /// Foreign key column; lives in `owner_table` for M2O and `target_table` for O2M
    pub column: &'static str,
    /// A required edge can never be left without a target
    pub required: bool,
}

impl EdgeSpec {
    /// Table that stores the foreign key column
    pub fn fk_table(&self) -> &'static str {
        match self.rel {
            Rel::M2O => self.owner_table,
            Rel::O2M => self.target_table,
        }
    }

    /// `Owner.edge`, used in messages
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.owner, self.name)
    }

    pub fn is_unique(&self) -> bool {
        self.rel == Rel::M2O
    }
}
