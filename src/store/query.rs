//! Chainable query builder producing PostgREST query parameters.

/// A query against one table.
///
/// ```ignore
/// let query = Query::on("articles")
///   .select("id,title,slug")
///   .eq("published", "true")
///   .order("created_at", false)
///   .limit(10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
  table: String,
  columns: String,
  filters: Vec<(String, String)>,
  order: Option<String>,
  limit: Option<usize>,
}

impl Query {
  /// Start a query selecting every column of `table`.
  pub fn on(table: &str) -> Self {
    Self {
      table: table.to_string(),
      columns: "*".to_string(),
      filters: Vec::new(),
      order: None,
      limit: None,
    }
  }

  pub fn select(mut self, columns: &str) -> Self {
    self.columns = columns.to_string();
    self
  }

  /// Keep rows where `column` equals `value`.
  pub fn eq(mut self, column: &str, value: &str) -> Self {
    self
      .filters
      .push((column.to_string(), format!("eq.{}", value)));
    self
  }

  pub fn order(mut self, column: &str, ascending: bool) -> Self {
    let direction = if ascending { "asc" } else { "desc" };
    self.order = Some(format!("{}.{}", column, direction));
    self
  }

  pub fn limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }

  pub fn table(&self) -> &str {
    &self.table
  }

  /// Query parameters for a read.
  pub fn params(&self) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), self.columns.clone())];
    params.extend(self.filter_params());
    if let Some(order) = &self.order {
      params.push(("order".to_string(), order.clone()));
    }
    if let Some(limit) = self.limit {
      params.push(("limit".to_string(), limit.to_string()));
    }
    params
  }

  /// Only the row filters, used for writes that target matching rows.
  pub fn filter_params(&self) -> Vec<(String, String)> {
    self.filters.clone()
  }
}
