use serde::Serialize;

/// Number of products requested per keyword query.
pub const PAGE_SIZE: u32 = 300;

/// Which product fields the search backend should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldProjection {
    /// Only `product_id`; cheap, but an empty answer is ambiguous.
    IdOnly,
    /// Every field; an empty answer is final.
    Full,
}

/// POST body sent to the search backend.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SearchQuery {
    pub query: String,
    pub size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_fields: Option<Vec<String>>,
}

impl SearchQuery {
    pub fn new(query: &str, projection: FieldProjection) -> Self {
        let include_fields = match projection {
            FieldProjection::IdOnly => Some(vec!["product_id".to_string()]),
            FieldProjection::Full => None,
        };
        Self {
            query: query.to_string(),
            size: PAGE_SIZE,
            include_fields,
        }
    }

    pub fn projection(&self) -> FieldProjection {
        if self.include_fields.is_some() {
            FieldProjection::IdOnly
        } else {
            FieldProjection::Full
        }
    }
}

/// The parts of a search response the counter cares about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchResponse {
    pub product_count: usize,
    /// The backend reported `timed_out_services` for this query.
    pub timed_out: bool,
}

impl SearchResponse {
    /// Reads `products` and the `timed_out_services` marker from a response body.
    ///
    /// The marker counts when the key is present, whatever its value.
    pub fn from_json(body: &serde_json::Value) -> Option<Self> {
        let object = body.as_object()?;
        let product_count = object
            .get("products")
            .and_then(|p| p.as_array())
            .map_or(0, Vec::len);
        Some(Self {
            product_count,
            timed_out: object.contains_key("timed_out_services"),
        })
    }
}
