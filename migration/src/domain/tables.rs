use editorial_common::{
    ARTICLES_TABLE, ASSIGNMENTS_TABLE, AUDIT_LOG_TABLE, DRAFT_SNAPSHOTS_TABLE, PUBLISH_EVENTS_TABLE,
    SCHEDULE_ENTRIES_TABLE,
};

/// Represents table in a database, used for ddl generation
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub checks: Vec<CheckConstraint>,
    pub foreign_keys: Vec<ForeignKeyConstraint>,
    pub indexes: Vec<Index>,
}

/// Represents one column in the database table
pub struct Column {
    pub name: String,
    pub column_type: String,
    pub not_null: bool,
    pub unique: bool,
    pub primary_key: bool,
    pub default_value: Option<String>,
}

/// Represents a named CHECK constraint
pub struct CheckConstraint {
    pub name: String,
    pub expression: String,
}

/// Represents foreign key constraint in the database table
pub struct ForeignKeyConstraint {
    pub table_name: String,
    pub column_name: String,
    pub referenced_table_name: String,
    pub referenced_column_name: String,
}

/// Represents an index in the database table, optionally partial
pub struct Index {
    pub table_name: String,
    pub columns: Vec<String>,
    pub unique: bool,
    pub predicate: Option<String>,
}

impl Table {
    pub fn new<T: Into<String>>(name: T, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
            checks: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn check<T: Into<String>>(mut self, name: T, expression: T) -> Self {
        self.checks.push(CheckConstraint {
            name: name.into(),
            expression: expression.into(),
        });
        self
    }

    pub fn references(mut self, column_name: &str, referenced_table_name: &str, referenced_column_name: &str) -> Self {
        self.foreign_keys.push(ForeignKeyConstraint::new(
            self.name.as_str(),
            column_name,
            referenced_table_name,
            referenced_column_name,
        ));
        self
    }

    pub fn index(mut self, columns: Vec<&str>, unique: bool, predicate: Option<&str>) -> Self {
        let mut index = Index::new(self.name.as_str(), columns, unique);
        index.predicate = predicate.map(str::to_string);
        self.indexes.push(index);
        self
    }
}

impl Column {
    pub fn new<T: Into<String>>(
        name: T,
        column_type: T,
        not_null: bool,
        unique: bool,
        default_value: Option<T>,
    ) -> Self {
        let primary_key = false;
        Self {
            name: name.into(),
            column_type: column_type.into(),
            not_null,
            unique,
            primary_key,
            default_value: default_value.map(T::into),
        }
    }

    pub fn required<T: Into<String>>(name: T, column_type: T) -> Self {
        Self::new(name, column_type, true, false, None)
    }

    pub fn optional<T: Into<String>>(name: T, column_type: T) -> Self {
        Self::new(name, column_type, false, false, None)
    }

    pub fn primary_key<T: Into<String>>(name: T, column_type: T) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            not_null: false,
            unique: false,
            primary_key: true,
            default_value: None,
        }
    }
}

impl ForeignKeyConstraint {
    pub fn new<T: Into<String>>(
        table_name: T,
        column_name: T,
        referenced_table_name: T,
        referenced_column_name: T,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            column_name: column_name.into(),
            referenced_table_name: referenced_table_name.into(),
            referenced_column_name: referenced_column_name.into(),
        }
    }
}

impl Index {
    pub fn new<T: Into<String>>(table_name: T, columns: Vec<T>, unique: bool) -> Self {
        Self {
            table_name: table_name.into(),
            columns: columns.into_iter().map(T::into).collect(),
            unique,
            predicate: None,
        }
    }
}

/// returns the tables of the editorial workflow, sorted conform dependency order
pub fn editorial_tables() -> Vec<Table> {
    let articles = Table::new(
        ARTICLES_TABLE,
        vec![
            Column::primary_key("id", "UUID"),
            Column::required("title", "TEXT"),
            Column::required("content", "JSONB"),
            Column::new("status", "TEXT", true, false, Some("'draft'")),
            Column::optional("publish_at", "TIMESTAMPTZ"),
            Column::optional("revision_note", "TEXT"),
            Column::optional("published_at", "TIMESTAMPTZ"),
            Column::new("created_at", "TIMESTAMPTZ", true, false, Some("now()")),
            Column::required("last_edited_at", "TIMESTAMPTZ"),
            Column::required("last_edited_by", "TEXT"),
            Column::required("status_changed_at", "TIMESTAMPTZ"),
            Column::new("version", "BIGINT", true, false, Some("1")),
        ],
    )
    // publish_at exists exactly while the article is scheduled
    .check(
        "publish_at_only_when_scheduled",
        "(status = 'scheduled') = (publish_at IS NOT NULL)",
    )
    .check(
        "revision_note_only_when_needs_revision",
        "(status = 'needs_revision') = (revision_note IS NOT NULL)",
    )
    .index(vec!["status"], false, None);

    let assignments = Table::new(
        ASSIGNMENTS_TABLE,
        vec![
            Column::primary_key("id", "UUID"),
            Column::required("article_id", "UUID"),
            Column::required("assignee_id", "TEXT"),
            Column::required("role", "TEXT"),
            Column::optional("due_at", "TIMESTAMPTZ"),
            Column::new("status", "TEXT", true, false, Some("'pending'")),
            Column::optional("outcome", "TEXT"),
            Column::optional("instructions", "TEXT"),
            Column::required("assigned_by", "TEXT"),
            Column::new("created_at", "TIMESTAMPTZ", true, false, Some("now()")),
            Column::optional("resolved_at", "TIMESTAMPTZ"),
        ],
    )
    .references("article_id", ARTICLES_TABLE, "id")
    // at most one pending assignment per article and role
    .index(vec!["article_id", "role"], true, Some("status = 'pending'"))
    .index(vec!["assignee_id"], false, None);

    let schedule_entries = Table::new(
        SCHEDULE_ENTRIES_TABLE,
        vec![
            Column::primary_key("article_id", "UUID"),
            Column::required("publish_at", "TIMESTAMPTZ"),
            Column::required("channels", "JSONB"),
            Column::new("priority", "TEXT", true, false, Some("'medium'")),
            Column::optional("notes", "TEXT"),
            Column::required("created_by", "TEXT"),
            Column::new("created_at", "TIMESTAMPTZ", true, false, Some("now()")),
        ],
    )
    .references("article_id", ARTICLES_TABLE, "id")
    .index(vec!["publish_at"], false, None);

    let draft_snapshots = Table::new(
        DRAFT_SNAPSHOTS_TABLE,
        vec![
            Column::primary_key("owner_id", "TEXT"),
            Column::primary_key("article_key", "TEXT"),
            Column::required("fields", "JSONB"),
            Column::required("captured_at", "TIMESTAMPTZ"),
        ],
    );

    let publish_events = Table::new(
        PUBLISH_EVENTS_TABLE,
        vec![
            Column::primary_key("article_id", "UUID"),
            Column::required("triggered_at", "TIMESTAMPTZ"),
            Column::required("trigger", "JSONB"),
            Column::required("results", "JSONB"),
        ],
    )
    .references("article_id", ARTICLES_TABLE, "id");

    let audit_log = Table::new(
        AUDIT_LOG_TABLE,
        vec![
            Column::primary_key("id", "BIGSERIAL"),
            Column::optional("article_id", "UUID"),
            Column::required("actor_id", "TEXT"),
            Column::required("kind", "TEXT"),
            Column::required("detail", "JSONB"),
            Column::new("recorded_at", "TIMESTAMPTZ", true, false, Some("now()")),
        ],
    )
    .index(vec!["article_id"], false, None);

    vec![
        articles,
        assignments,
        schedule_entries,
        draft_snapshots,
        publish_events,
        audit_log,
    ]
}
