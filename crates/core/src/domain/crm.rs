use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub String);

/// One column cell on a board item. The provider reports every column with
/// its id and a display text that may be absent for empty cells.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnValue {
    pub id: String,
    pub text: Option<String>,
}

/// A record on the configured CRM board. Owned entirely by the provider; an
/// instance only lives for the duration of the request that fetched it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrmItem {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub column_values: Vec<ColumnValue>,
}

impl CrmItem {
    pub fn column_text(&self, column_id: &str) -> Option<&str> {
        self.column_values
            .iter()
            .find(|column| column.id == column_id)
            .and_then(|column| column.text.as_deref())
    }
}

/// Account identity returned by the provider's `me` query, used by the
/// connection test.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrmAccount {
    pub name: String,
    pub email: Option<String>,
}
