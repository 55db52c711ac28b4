use std::fmt;
use std::str::FromStr;

/// OData system query options understood by the ODA service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueryParameter {
    Top,
    Skip,
    Filter,
    Count,
    OrderBy,
    Select,
    Expand,
}

impl QueryParameter {
    /// Wire name including the `$` prefix.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Top => "$top",
            Self::Skip => "$skip",
            Self::Filter => "$filter",
            Self::Count => "$count",
            Self::OrderBy => "$orderby",
            Self::Select => "$select",
            Self::Expand => "$expand",
        }
    }
}

impl fmt::Display for QueryParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryParameter {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "$top" => Ok(Self::Top),
            "$skip" => Ok(Self::Skip),
            "$filter" => Ok(Self::Filter),
            "$count" => Ok(Self::Count),
            "$orderby" => Ok(Self::OrderBy),
            "$select" => Ok(Self::Select),
            "$expand" => Ok(Self::Expand),
            other => Err(other.to_owned()),
        }
    }
}

/// Allow-list for collection reads.
pub const COLLECTION_QUERY_PARAMETERS: &[QueryParameter] = &[
    QueryParameter::Top,
    QueryParameter::Skip,
    QueryParameter::Filter,
    QueryParameter::Count,
    QueryParameter::OrderBy,
    QueryParameter::Select,
    QueryParameter::Expand,
];

/// Allow-list for single-entity reads.
pub const ENTITY_QUERY_PARAMETERS: &[QueryParameter] =
    &[QueryParameter::Select, QueryParameter::Expand];

/// Allow-list for mutating operations.
pub const NO_QUERY_PARAMETERS: &[QueryParameter] = &[];

/// Query options for a single request.
///
/// `orderby`, `select` and `expand` accumulate and are sent comma-separated.
///
/// ```
/// use oda_client::QueryOptions;
///
/// let query = QueryOptions::new()
///     .filter("periodeid eq 160")
///     .order_by("opdateringsdato desc")
///     .expand("SagAktør")
///     .top(10);
/// assert_eq!(query.to_pairs()[0], ("$top", "10".to_owned()));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryOptions {
    top: Option<u32>,
    skip: Option<u32>,
    filter: Option<String>,
    count: Option<bool>,
    order_by: Vec<String>,
    select: Vec<String>,
    expand: Vec<String>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn top(mut self, top: u32) -> Self {
        self.top = Some(top);
        self
    }

    #[must_use]
    pub fn skip(mut self, skip: u32) -> Self {
        self.skip = Some(skip);
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Requests `@odata.count` in the collection envelope.
    #[must_use]
    pub fn count(mut self, count: bool) -> Self {
        self.count = Some(count);
        self
    }

    #[must_use]
    pub fn order_by(mut self, clause: impl Into<String>) -> Self {
        self.order_by.push(clause.into());
        self
    }

    #[must_use]
    pub fn select(mut self, field: impl Into<String>) -> Self {
        self.select.push(field.into());
        self
    }

    #[must_use]
    pub fn expand(mut self, navigation: impl Into<String>) -> Self {
        self.expand.push(navigation.into());
        self
    }

    /// Options that carry a value, in wire order.
    pub fn parameters(&self) -> Vec<QueryParameter> {
        self.to_pairs()
            .iter()
            .filter_map(|(name, _)| name.parse().ok())
            .collect()
    }

    /// Renders the options as query-string pairs.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(top) = self.top {
            pairs.push((QueryParameter::Top.as_str(), top.to_string()));
        }
        if let Some(skip) = self.skip {
            pairs.push((QueryParameter::Skip.as_str(), skip.to_string()));
        }
        if let Some(filter) = &self.filter {
            pairs.push((QueryParameter::Filter.as_str(), filter.clone()));
        }
        if let Some(count) = self.count {
            pairs.push((QueryParameter::Count.as_str(), count.to_string()));
        }
        if !self.order_by.is_empty() {
            pairs.push((QueryParameter::OrderBy.as_str(), self.order_by.join(",")));
        }
        if !self.select.is_empty() {
            pairs.push((QueryParameter::Select.as_str(), self.select.join(",")));
        }
        if !self.expand.is_empty() {
            pairs.push((QueryParameter::Expand.as_str(), self.expand.join(",")));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::{QueryOptions, QueryParameter};

    #[test]
    fn empty_options_render_nothing() {
        assert!(QueryOptions::new().to_pairs().is_empty());
    }

    #[test]
    fn list_options_are_joined_with_commas() {
        let query = QueryOptions::new()
            .select("id")
            .select("titel")
            .expand("Sagstype")
            .expand("SagAktør");
        assert_eq!(
            query.to_pairs(),
            vec![
                ("$select", "id,titel".to_owned()),
                ("$expand", "Sagstype,SagAktør".to_owned()),
            ]
        );
    }

    #[test]
    fn parameters_follow_populated_options() {
        let query = QueryOptions::new().count(true).skip(100).filter("id gt 5");
        assert_eq!(
            query.parameters(),
            vec![
                QueryParameter::Skip,
                QueryParameter::Filter,
                QueryParameter::Count
            ]
        );
    }

    #[test]
    fn parses_wire_names() {
        assert_eq!("$orderby".parse(), Ok(QueryParameter::OrderBy));
        assert_eq!("orderby".parse::<QueryParameter>(), Err("orderby".to_owned()));
    }
}
