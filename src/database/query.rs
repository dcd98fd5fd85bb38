use uuid::Uuid;

use crate::database::models::record::TenantScopedRecord;

pub const RECORDS_TABLE: &str = "tenant_scoped_records";

const RECORD_COLUMNS: &str = r#""id", "tenant_id", "value", "created_at""#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Uuid(Uuid),
    BigInt(i64),
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<SqlParam>,
}

/// Read query over tenant-scoped records.
///
/// The tenant predicate is fixed when the query is built and cannot be
/// removed afterwards. Only the gateway constructs these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantQuery {
    tenant_id: Uuid,
    id: Option<Uuid>,
    order: SortDirection,
    limit: Option<i64>,
}

impl TenantQuery {
    pub(crate) fn new(tenant_id: Uuid) -> Self {
        Self {
            tenant_id,
            id: None,
            order: SortDirection::Desc,
            limit: None,
        }
    }

    pub fn by_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    /// Order by `created_at`; newest first unless changed
    pub fn order(mut self, direction: SortDirection) -> Self {
        self.order = direction;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit.max(0));
        self
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    pub fn direction(&self) -> SortDirection {
        self.order
    }

    pub fn max_rows(&self) -> Option<i64> {
        self.limit
    }

    /// Row predicate, for stores that filter in process
    pub fn matches(&self, record: &TenantScopedRecord) -> bool {
        record.tenant_id == self.tenant_id && self.id.map_or(true, |id| record.id == id)
    }

    pub fn to_sql(&self) -> SqlResult {
        let mut params = vec![SqlParam::Uuid(self.tenant_id)];
        let mut query = format!(
            "SELECT {} FROM \"{}\" WHERE \"tenant_id\" = $1",
            RECORD_COLUMNS, RECORDS_TABLE
        );

        if let Some(id) = self.id {
            params.push(SqlParam::Uuid(id));
            query.push_str(&format!(" AND \"id\" = ${}", params.len()));
        }

        query.push_str(&format!(" ORDER BY \"created_at\" {}", self.order.to_sql()));

        if let Some(limit) = self.limit {
            params.push(SqlParam::BigInt(limit));
            query.push_str(&format!(" LIMIT ${}", params.len()));
        }

        SqlResult { query, params }
    }
}
